//! Grocery list aggregation.
//!
//! Turns the recipes of an approved meal plan into one line per item:
//! names and units are normalized, convertible quantities of the same item
//! are summed, every line gets a category and a store, and the result is
//! sorted by category, name and unit.

pub mod render;
pub mod service;
pub mod stores;
pub mod units;

use std::collections::HashMap;

use larder_db::models::{GroceryItem, Recipe};

use crate::catalog::Catalog;
use crate::error::{LarderError, Result};

use self::stores::assign_store;
use self::units::{Dimension, conversion, normalize_name, normalize_unit};

/// Category values that mean "not categorized".
const UNCATEGORIZED: &[&str] = &["", "general", "other"];

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum MergeKey {
    Convertible(Dimension),
    Unit(String),
}

struct Line {
    name: String,
    /// First-seen unit; the merged quantity is expressed in it.
    unit: String,
    /// Running total, in base units for convertible lines.
    total: f64,
    category: String,
    sources: Vec<String>,
}

fn resolve_category(raw: &str, name: &str, catalog: &Catalog) -> String {
    let category = raw.trim().to_lowercase();
    if UNCATEGORIZED.contains(&category.as_str()) {
        catalog.infer_category(name)
    } else {
        category
    }
}

fn round_quantity(quantity: f64) -> f64 {
    (quantity * 1000.0).round() / 1000.0
}

/// Aggregate the ingredients of `recipes`, listed once per planned day.
///
/// A recipe planned twice contributes its ingredients twice. Fails with a
/// validation error on negative or non-finite quantities.
pub fn aggregate(recipes: &[&Recipe], catalog: &Catalog) -> Result<Vec<GroceryItem>> {
    let mut lines: Vec<Line> = Vec::new();
    let mut index: HashMap<(String, MergeKey), usize> = HashMap::new();

    for recipe in recipes {
        for ingredient in recipe.ingredients.iter() {
            if !ingredient.quantity.is_finite() || ingredient.quantity < 0.0 {
                return Err(LarderError::validation(format!(
                    "ingredient {:?} of {:?} has invalid quantity {}",
                    ingredient.name, recipe.title, ingredient.quantity
                )));
            }

            let name = normalize_name(&ingredient.name);
            if name.is_empty() {
                continue;
            }
            let unit = normalize_unit(&ingredient.unit);
            let converted = conversion(&unit);
            let key = match converted {
                Some((dimension, _)) => MergeKey::Convertible(dimension),
                None => MergeKey::Unit(unit.clone()),
            };
            let amount = converted.map_or(ingredient.quantity, |(_, factor)| {
                ingredient.quantity * factor
            });

            let slot = *index.entry((name.clone(), key)).or_insert_with(|| {
                lines.push(Line {
                    category: resolve_category(&ingredient.category, &name, catalog),
                    name,
                    unit,
                    total: 0.0,
                    sources: Vec::new(),
                });
                lines.len() - 1
            });
            let line = &mut lines[slot];
            line.total += amount;
            if !line.sources.contains(&recipe.title) {
                line.sources.push(recipe.title.clone());
            }
        }
    }

    let mut items: Vec<GroceryItem> = lines
        .into_iter()
        .map(|line| {
            let quantity = match conversion(&line.unit) {
                Some((_, factor)) => line.total / factor,
                None => line.total,
            };
            GroceryItem {
                store: assign_store(catalog, &line.category).map(str::to_owned),
                quantity: round_quantity(quantity),
                name: line.name,
                unit: line.unit,
                category: line.category,
                recipe_sources: line.sources,
            }
        })
        .collect();

    sort_items(&mut items);
    Ok(items)
}

/// Canonical list order: category, then name, then unit.
pub fn sort_items(items: &mut [GroceryItem]) {
    items.sort_by(|a, b| {
        a.category
            .cmp(&b.category)
            .then_with(|| a.name.cmp(&b.name))
            .then_with(|| a.unit.cmp(&b.unit))
    });
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use larder_db::models::{ApprovalStatus, Ingredient, MemberRole};
    use sqlx::types::Json;
    use uuid::Uuid;

    use super::*;
    use crate::catalog::{CategoryConfig, StoreConfig};

    fn recipe(title: &str, ingredients: &[(&str, f64, &str, &str)]) -> Recipe {
        Recipe {
            id: Uuid::new_v4(),
            family_id: Uuid::nil(),
            title: title.into(),
            ingredients: Json(
                ingredients
                    .iter()
                    .map(|(name, quantity, unit, category)| Ingredient {
                        name: (*name).into(),
                        quantity: *quantity,
                        unit: (*unit).into(),
                        category: (*category).into(),
                    })
                    .collect(),
            ),
            preparation: String::new(),
            source_ref: None,
            protein: None,
            tags: vec![],
            favorite: false,
            created_by: Uuid::nil(),
            creator_role: MemberRole::Parent,
            status: ApprovalStatus::Approved,
            approved_by: None,
            approved_at: None,
            archived: false,
            created_at: Utc::now(),
        }
    }

    fn catalog() -> Catalog {
        let mut categories = std::collections::BTreeMap::new();
        categories.insert(
            "produce".to_string(),
            CategoryConfig {
                keywords: vec!["onion".into(), "tomato".into(), "garlic".into()],
            },
        );
        categories.insert(
            "dairy".to_string(),
            CategoryConfig {
                keywords: vec!["milk".into(), "butter".into()],
            },
        );
        Catalog {
            stores: vec![
                StoreConfig {
                    id: "a".into(),
                    name: "Store A".into(),
                    priority_categories: vec!["produce".into()],
                },
                StoreConfig {
                    id: "b".into(),
                    name: "Store B".into(),
                    priority_categories: vec!["dairy".into()],
                },
            ],
            categories,
            ..Catalog::default()
        }
    }

    fn find<'a>(items: &'a [GroceryItem], name: &str) -> Vec<&'a GroceryItem> {
        items.iter().filter(|i| i.name == name).collect()
    }

    #[test]
    fn shared_ingredient_is_merged_and_summed() {
        let tacos = recipe("Tacos", &[("Onions", 1.0, "each", "produce")]);
        let chili = recipe("Chili", &[("diced onion", 2.0, "", "produce")]);
        let items = aggregate(&[&tacos, &chili], &catalog()).unwrap();
        let onions = find(&items, "onion");
        assert_eq!(onions.len(), 1);
        assert_eq!(onions[0].quantity, 3.0);
        assert_eq!(onions[0].unit, "each");
        assert_eq!(onions[0].recipe_sources, vec!["Tacos", "Chili"]);
    }

    #[test]
    fn convertible_units_sum_in_first_seen_unit() {
        let a = recipe("A", &[("butter", 1.0, "tbsp", "dairy")]);
        let b = recipe("B", &[("butter", 3.0, "teaspoons", "dairy")]);
        let items = aggregate(&[&a, &b], &catalog()).unwrap();
        let butter = find(&items, "butter");
        assert_eq!(butter.len(), 1);
        assert_eq!(butter[0].unit, "tbsp");
        assert_eq!(butter[0].quantity, 2.0);

        let c = recipe("C", &[("beef", 1.0, "lb", "meat")]);
        let d = recipe("D", &[("beef", 8.0, "oz", "meat")]);
        let items = aggregate(&[&c, &d], &catalog()).unwrap();
        assert_eq!(find(&items, "beef")[0].quantity, 1.5);
    }

    #[test]
    fn incompatible_units_stay_separate() {
        let a = recipe("A", &[("milk", 1.0, "cup", "dairy")]);
        let b = recipe("B", &[("milk", 200.0, "g", "dairy")]);
        let c = recipe("C", &[("garlic", 2.0, "cloves", "")]);
        let d = recipe("D", &[("garlic", 1.0, "head", "")]);
        let items = aggregate(&[&a, &b, &c, &d], &catalog()).unwrap();
        assert_eq!(find(&items, "milk").len(), 2);
        assert_eq!(find(&items, "garlic").len(), 2);
    }

    #[test]
    fn repeated_recipe_counts_twice() {
        let a = recipe("A", &[("tomato", 2.0, "each", "produce")]);
        let items = aggregate(&[&a, &a], &catalog()).unwrap();
        assert_eq!(find(&items, "tomato")[0].quantity, 4.0);
        assert_eq!(find(&items, "tomato")[0].recipe_sources, vec!["A"]);
    }

    #[test]
    fn missing_category_is_inferred() {
        let a = recipe(
            "A",
            &[
                ("garlic cloves", 2.0, "clove", "general"),
                ("flour", 2.0, "cup", ""),
            ],
        );
        let items = aggregate(&[&a], &catalog()).unwrap();
        assert_eq!(find(&items, "garlic")[0].category, "produce");
        assert_eq!(find(&items, "garlic")[0].unit, "cloves");
        assert_eq!(find(&items, "flour")[0].category, "pantry");
    }

    #[test]
    fn produce_goes_to_the_produce_store() {
        let a = recipe(
            "A",
            &[
                ("onion", 1.0, "each", "produce"),
                ("tomatoes", 3.0, "each", ""),
                ("milk", 1.0, "cup", ""),
                ("rice", 1.0, "cup", "grain"),
            ],
        );
        let items = aggregate(&[&a], &catalog()).unwrap();
        for item in items.iter().filter(|i| i.category == "produce") {
            assert_eq!(item.store.as_deref(), Some("a"), "{item:?}");
        }
        assert_eq!(find(&items, "milk")[0].store.as_deref(), Some("b"));
        assert_eq!(find(&items, "rice")[0].store, None);
    }

    #[test]
    fn items_are_sorted_by_category_then_name() {
        let a = recipe(
            "A",
            &[
                ("tomato", 1.0, "each", "produce"),
                ("milk", 1.0, "cup", "dairy"),
                ("onion", 1.0, "each", "produce"),
            ],
        );
        let items = aggregate(&[&a], &catalog()).unwrap();
        let order: Vec<_> = items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(order, vec!["milk", "onion", "tomato"]);
    }

    #[test]
    fn negative_quantity_is_rejected() {
        let a = recipe("A", &[("salt", -1.0, "tsp", "")]);
        assert!(matches!(
            aggregate(&[&a], &catalog()),
            Err(LarderError::Validation(_))
        ));
    }

    #[test]
    fn aggregation_is_deterministic() {
        let a = recipe("A", &[("onion", 1.0, "each", ""), ("milk", 1.0, "cup", "")]);
        let b = recipe("B", &[("milk", 2.0, "tbsp", ""), ("rice", 1.0, "cup", "")]);
        let first = aggregate(&[&a, &b], &catalog()).unwrap();
        assert_eq!(aggregate(&[&a, &b], &catalog()).unwrap(), first);
    }
}
