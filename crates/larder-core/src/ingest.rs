//! The `RecipeIngestor` trait -- the adapter interface for recipe
//! extraction services.
//!
//! Extraction from web pages, free text or photos happens outside larder;
//! an ingestor turns a request into a structured [`IngestedRecipe`]. The
//! bundled [`TomlRecipeIngestor`] accepts recipes already written as TOML.

use anyhow::{Result, bail};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use larder_db::models::Ingredient;

/// What to extract a recipe from.
#[derive(Debug, Clone, PartialEq)]
pub enum IngestRequest {
    Url(String),
    Text(String),
    Image { bytes: Vec<u8>, media_type: String },
}

impl IngestRequest {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Url(_) => "url",
            Self::Text(_) => "text",
            Self::Image { .. } => "image",
        }
    }
}

/// A structured recipe produced by an ingestor, not yet stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestedRecipe {
    pub title: String,
    #[serde(default)]
    pub ingredients: Vec<Ingredient>,
    #[serde(default)]
    pub preparation: String,
    #[serde(default)]
    pub source_ref: Option<String>,
    #[serde(default)]
    pub protein: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Adapter interface for recipe extraction.
///
/// # Object Safety
///
/// The trait is object-safe so callers can hold a `Box<dyn RecipeIngestor>`
/// chosen at runtime.
#[async_trait]
pub trait RecipeIngestor: Send + Sync {
    /// Human-readable name used in logs and errors.
    fn name(&self) -> &str;

    /// Extract one recipe from `request`.
    async fn ingest(&self, request: &IngestRequest) -> Result<IngestedRecipe>;
}

// Compile-time assertion: RecipeIngestor must be object-safe.
const _: () = {
    fn _assert_object_safe(_: &dyn RecipeIngestor) {}
};

/// Ingestor for recipes written as TOML text.
///
/// ```toml
/// title = "Chicken Tacos"
/// protein = "chicken"
/// preparation = "Brown the chicken, warm the tortillas."
///
/// [[ingredients]]
/// name = "chicken thighs"
/// quantity = 1.5
/// unit = "lb"
/// category = "meat"
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct TomlRecipeIngestor;

#[async_trait]
impl RecipeIngestor for TomlRecipeIngestor {
    fn name(&self) -> &str {
        "toml"
    }

    async fn ingest(&self, request: &IngestRequest) -> Result<IngestedRecipe> {
        match request {
            IngestRequest::Text(text) => {
                let recipe: IngestedRecipe = toml::from_str(text)?;
                Ok(recipe)
            }
            other => bail!("the toml ingestor cannot read {} requests", other.kind()),
        }
    }
}
