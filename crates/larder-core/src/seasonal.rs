//! Seasonal produce calendar.

use chrono::{Datelike, NaiveDate};

use crate::catalog::Catalog;

/// Season lookups over the catalog's `[seasons]` tables.
#[derive(Debug, Clone, Copy)]
pub struct SeasonalCalendar<'a> {
    catalog: &'a Catalog,
}

impl<'a> SeasonalCalendar<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self { catalog }
    }

    /// Name of the season containing `date`, if any season lists its month.
    pub fn season_for(&self, date: NaiveDate) -> Option<&'a str> {
        let month = date.month();
        self.catalog
            .seasons
            .iter()
            .find(|(_, season)| season.months.contains(&month))
            .map(|(name, _)| name.as_str())
    }

    /// Produce at its peak on `date`: items of the current season whose own
    /// months include the date's month. Names are lowercased.
    pub fn peak_produce(&self, date: NaiveDate) -> Vec<String> {
        let month = date.month();
        let Some(name) = self.season_for(date) else {
            return Vec::new();
        };
        let mut produce: Vec<String> = self.catalog.seasons[name]
            .peak_produce
            .iter()
            .filter(|p| p.months.contains(&month))
            .map(|p| p.name.trim().to_lowercase())
            .collect();
        produce.sort();
        produce.dedup();
        produce
    }
}

/// Whether an ingredient name refers to a produce item. Either may contain
/// the other ("butternut squash" matches "squash", "peppers" matches
/// "pepper").
pub fn matches_produce(ingredient: &str, produce: &str) -> bool {
    let ingredient = ingredient.trim().to_lowercase();
    let produce = produce.trim().to_lowercase();
    if ingredient.is_empty() || produce.is_empty() {
        return false;
    }
    ingredient.contains(&produce) || produce.contains(&ingredient)
}
