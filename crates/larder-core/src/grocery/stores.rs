//! Store assignment by ingredient category.

use crate::catalog::{Catalog, TieBreak};

/// Store an item of `category` should be bought at, or `None` for the
/// "any store" bucket. Depends only on the catalog and the category.
pub fn assign_store<'a>(catalog: &'a Catalog, category: &str) -> Option<&'a str> {
    let category = category.trim();
    let rank = |priorities: &[String]| {
        priorities
            .iter()
            .position(|c| c.trim().eq_ignore_ascii_case(category))
    };

    let store = match catalog.tie_break {
        TieBreak::FirstListed => catalog
            .stores
            .iter()
            .find(|s| rank(&s.priority_categories).is_some()),
        TieBreak::HighestPriority => catalog
            .stores
            .iter()
            .enumerate()
            .filter_map(|(index, s)| rank(&s.priority_categories).map(|r| (r, index, s)))
            .min_by_key(|(r, index, _)| (*r, *index))
            .map(|(_, _, s)| s),
    };
    store.map(|s| s.id.as_str())
}
