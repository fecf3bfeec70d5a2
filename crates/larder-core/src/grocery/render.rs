//! Plain-text rendering of grocery lists, grouped by store.

use std::fmt::Write as _;

use larder_db::models::GroceryItem;

use crate::catalog::Catalog;

/// Format a quantity without trailing zeros: `2`, `1.5`, `0.333`.
pub fn format_quantity(quantity: f64) -> String {
    let text = format!("{quantity:.3}");
    let text = text.trim_end_matches('0').trim_end_matches('.');
    if text.is_empty() || text == "-" {
        "0".to_owned()
    } else {
        text.to_owned()
    }
}

/// `"2 cup milk"`; count items drop the `each` unit (`"3 egg"`).
pub fn format_item(item: &GroceryItem) -> String {
    let quantity = format_quantity(item.quantity);
    if item.unit == "each" || item.unit.is_empty() {
        format!("{quantity} {}", item.name)
    } else {
        format!("{quantity} {} {}", item.unit, item.name)
    }
}

/// Items grouped by store label: catalog stores in catalog order, stores
/// missing from the catalog after them by id, the "any store" bucket last.
pub fn group_by_store<'a>(
    items: &'a [GroceryItem],
    catalog: &Catalog,
) -> Vec<(String, Vec<&'a GroceryItem>)> {
    let mut store_ids: Vec<Option<&str>> = items.iter().map(|i| i.store.as_deref()).collect();
    store_ids.sort_by_key(|id| match id {
        Some(id) => match catalog.stores.iter().position(|s| s.id == *id) {
            Some(pos) => (0, pos, String::new()),
            None => (1, 0, (*id).to_owned()),
        },
        None => (2, 0, String::new()),
    });
    store_ids.dedup();

    store_ids
        .into_iter()
        .map(|id| {
            let group = items.iter().filter(|i| i.store.as_deref() == id).collect();
            (catalog.store_label(id), group)
        })
        .collect()
}

/// Render `items` as a checklist with one section per store.
pub fn render_list(title: &str, items: &[GroceryItem], catalog: &Catalog) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{title}");
    if items.is_empty() {
        let _ = writeln!(out, "  (nothing to buy)");
        return out;
    }
    for (label, group) in group_by_store(items, catalog) {
        let _ = writeln!(out, "\n{label} ({} items)", group.len());
        for item in group {
            let _ = writeln!(out, "  [ ] {}", format_item(item));
        }
    }
    out
}
