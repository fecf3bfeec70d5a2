//! Store, category and seasonal catalog.
//!
//! The catalog is a TOML document describing the stores a family shops at
//! (and which ingredient categories each one is preferred for), keyword
//! lists used to categorize ingredients, the seasonal produce calendar and
//! the tuning knobs of the planner and preference model. Every section is
//! optional; a missing file yields [`Catalog::default`].
//!
//! ```toml
//! tie_break = "first_listed"
//!
//! [[stores]]
//! id = "trader_joes"
//! name = "Trader Joe's"
//! priority_categories = ["produce", "snacks"]
//!
//! [categories.produce]
//! keywords = ["tomato", "lettuce", "onion"]
//!
//! [seasons.fall]
//! months = [9, 10, 11]
//! peak_produce = [{ name = "squash", months = [9, 10, 11] }]
//! ```

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::{LarderError, Result};
use crate::planner::PlannerConfig;
use crate::preference::PreferenceConfig;

/// Category assigned to ingredients no keyword matches.
pub const FALLBACK_CATEGORY: &str = "pantry";

/// Label of the bucket for items no store is preferred for.
pub const ANY_STORE_LABEL: &str = "Any store";

/// How to pick a store when several list the same category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// The store listed first in the catalog wins.
    #[default]
    FirstListed,
    /// The store that ranks the category highest in its own priority list
    /// wins; ties fall back to catalog order.
    HighestPriority,
}

/// A store and the categories it is preferred for, most preferred first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub priority_categories: Vec<String>,
}

/// Keywords that put an ingredient into a category.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryConfig {
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// A produce item and the months (1-12) it peaks in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProduceConfig {
    pub name: String,
    pub months: Vec<u32>,
}

/// A season: the months it spans and its peak produce.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeasonConfig {
    pub months: Vec<u32>,
    #[serde(default)]
    pub peak_produce: Vec<ProduceConfig>,
}

/// The full catalog document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub tie_break: TieBreak,
    #[serde(default)]
    pub stores: Vec<StoreConfig>,
    #[serde(default)]
    pub categories: BTreeMap<String, CategoryConfig>,
    #[serde(default)]
    pub seasons: BTreeMap<String, SeasonConfig>,
    #[serde(default)]
    pub planner: PlannerConfig,
    #[serde(default)]
    pub preferences: PreferenceConfig,
}

impl Catalog {
    /// Parse and validate a catalog from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let catalog: Catalog = toml::from_str(content)
            .map_err(|e| LarderError::validation(format!("invalid catalog: {e}")))?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Read a catalog file. A missing file yields the default catalog.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no catalog file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read catalog {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    /// Check internal consistency: unique store ids, valid months and
    /// sane planner and preference settings.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for store in &self.stores {
            if store.id.trim().is_empty() {
                return Err(LarderError::validation("store id must not be empty"));
            }
            if !seen.insert(store.id.as_str()) {
                return Err(LarderError::validation(format!(
                    "duplicate store id {:?}",
                    store.id
                )));
            }
        }

        for (name, season) in &self.seasons {
            let produce_months = season.peak_produce.iter().flat_map(|p| p.months.iter());
            if let Some(month) = season
                .months
                .iter()
                .chain(produce_months)
                .find(|m| !(1..=12).contains(*m))
            {
                return Err(LarderError::validation(format!(
                    "season {name:?} has invalid month {month}"
                )));
            }
        }

        self.planner.validate()?;
        self.preferences.validate()?;
        Ok(())
    }

    /// Category for an ingredient name, by keyword match. Keywords match as
    /// substrings in either direction; categories are tried in name order.
    pub fn infer_category(&self, ingredient: &str) -> String {
        let name = ingredient.trim().to_lowercase();
        if name.is_empty() {
            return FALLBACK_CATEGORY.to_owned();
        }
        for (category, config) in &self.categories {
            let hit = config.keywords.iter().any(|keyword| {
                let keyword = keyword.to_lowercase();
                !keyword.is_empty() && (name.contains(&keyword) || keyword.contains(&name))
            });
            if hit {
                return category.clone();
            }
        }
        FALLBACK_CATEGORY.to_owned()
    }

    pub fn store(&self, id: &str) -> Option<&StoreConfig> {
        self.stores.iter().find(|s| s.id == id)
    }

    /// Display name for a store id, or the "any store" label for `None`.
    pub fn store_label(&self, id: Option<&str>) -> String {
        match id {
            Some(id) => self
                .store(id)
                .map(|s| s.name.clone())
                .unwrap_or_else(|| id.to_owned()),
            None => ANY_STORE_LABEL.to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
tie_break = "highest_priority"

[[stores]]
id = "trader_joes"
name = "Trader Joe's"
priority_categories = ["produce", "snacks"]

[[stores]]
id = "costco"
name = "Costco"
priority_categories = ["meat", "produce"]

[categories.produce]
keywords = ["tomato", "onion", "garlic"]

[categories.meat]
keywords = ["chicken", "beef"]

[seasons.fall]
months = [9, 10, 11]
peak_produce = [{ name = "squash", months = [9, 10] }]

[planner]
repeat_window_weeks = 3
"#;

    #[test]
    fn parses_full_document() {
        let catalog = Catalog::from_toml_str(SAMPLE).unwrap();
        assert_eq!(catalog.tie_break, TieBreak::HighestPriority);
        assert_eq!(catalog.stores.len(), 2);
        assert_eq!(catalog.stores[1].priority_categories, vec!["meat", "produce"]);
        assert_eq!(catalog.seasons["fall"].peak_produce[0].name, "squash");
        assert_eq!(catalog.planner.repeat_window_weeks, 3);
        // Unspecified sections keep their defaults.
        assert_eq!(catalog.planner.days.len(), 7);
        assert_eq!(catalog.preferences, PreferenceConfig::default());
    }

    #[test]
    fn empty_document_is_default() {
        assert_eq!(Catalog::from_toml_str("").unwrap(), Catalog::default());
    }

    #[test]
    fn rejects_duplicate_store_ids() {
        let doc = r#"
[[stores]]
id = "a"
name = "A"

[[stores]]
id = "a"
name = "Also A"
"#;
        let err = Catalog::from_toml_str(doc).unwrap_err();
        assert!(err.to_string().contains("duplicate store id"), "{err}");
    }

    #[test]
    fn rejects_bad_months() {
        let doc = r#"
[seasons.winter]
months = [12, 13]
"#;
        assert!(matches!(
            Catalog::from_toml_str(doc),
            Err(LarderError::Validation(_))
        ));
    }

    #[test]
    fn rejects_malformed_toml() {
        assert!(matches!(
            Catalog::from_toml_str("stores = 3"),
            Err(LarderError::Validation(_))
        ));
    }

    #[test]
    fn infers_category_by_keyword() {
        let catalog = Catalog::from_toml_str(SAMPLE).unwrap();
        assert_eq!(catalog.infer_category("Cherry Tomato"), "produce");
        assert_eq!(catalog.infer_category("chicken thighs"), "meat");
        assert_eq!(catalog.infer_category("flour"), FALLBACK_CATEGORY);
    }

    #[test]
    fn store_labels() {
        let catalog = Catalog::from_toml_str(SAMPLE).unwrap();
        assert_eq!(catalog.store_label(Some("costco")), "Costco");
        assert_eq!(catalog.store_label(Some("unknown")), "unknown");
        assert_eq!(catalog.store_label(None), ANY_STORE_LABEL);
    }

    #[test]
    fn load_missing_file_gives_default() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = Catalog::load(&dir.path().join("catalog.toml")).unwrap();
        assert_eq!(catalog, Catalog::default());
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.toml");
        std::fs::write(&path, SAMPLE).unwrap();
        let catalog = Catalog::load(&path).unwrap();
        assert_eq!(catalog.stores[0].id, "trader_joes");
    }
}
