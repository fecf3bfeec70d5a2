//! Recipe service layer: adding, ingesting, rating, archiving and
//! favoriting recipes.

use std::time::Duration;

use sqlx::PgPool;
use uuid::Uuid;

use larder_db::models::{KidReaction, MemberRole, Rating, Recipe};
use larder_db::queries::{ratings, recipes};

use crate::actor::Actor;
use crate::approval::{ApprovalStateMachine, EntityKind, load_recipe};
use crate::error::{LarderError, Result};
use crate::external::call_with_timeout;
use crate::ingest::{IngestRequest, IngestedRecipe, RecipeIngestor};

/// Check an ingested recipe before it is stored.
pub fn validate_recipe(recipe: &IngestedRecipe) -> Result<()> {
    if recipe.title.trim().is_empty() {
        return Err(LarderError::validation("recipe title must not be empty"));
    }
    for ingredient in &recipe.ingredients {
        if ingredient.name.trim().is_empty() {
            return Err(LarderError::validation(format!(
                "recipe {:?} has an ingredient without a name",
                recipe.title
            )));
        }
        if !ingredient.quantity.is_finite() || ingredient.quantity < 0.0 {
            return Err(LarderError::validation(format!(
                "ingredient {:?} of {:?} has invalid quantity {}",
                ingredient.name, recipe.title, ingredient.quantity
            )));
        }
    }
    Ok(())
}

/// What to do when the family already has a recipe with the same title.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DuplicatePolicy {
    /// Refuse with `Conflict`, naming the existing recipe.
    #[default]
    Reject,
    /// Store the recipe as a new version beside the existing one.
    SaveAsNewVersion,
}

/// Store a recipe for the actor's family. A parent's recipe is approved at
/// once; a kid's waits for a parent. A recipe whose title the family
/// already uses is refused.
pub async fn add_recipe(pool: &PgPool, actor: &Actor, recipe: &IngestedRecipe) -> Result<Recipe> {
    add_recipe_with(pool, actor, recipe, DuplicatePolicy::Reject).await
}

/// [`add_recipe`] with an explicit duplicate policy.
pub async fn add_recipe_with(
    pool: &PgPool,
    actor: &Actor,
    recipe: &IngestedRecipe,
    duplicates: DuplicatePolicy,
) -> Result<Recipe> {
    validate_recipe(recipe)?;
    if duplicates == DuplicatePolicy::Reject {
        if let Some(existing) =
            recipes::find_recipe_by_title(pool, actor.family_id, &recipe.title).await?
        {
            return Err(LarderError::conflict(
                format!("recipe:{}", existing.id),
                format!(
                    "the family already has a recipe called {:?}; save it as a new version instead",
                    existing.title
                ),
            ));
        }
    }
    let status = ApprovalStateMachine::initial_status(EntityKind::Recipe, actor.role);
    let protein = recipe
        .protein
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty());

    let stored = recipes::insert_recipe(
        pool,
        &recipes::NewRecipe {
            family_id: actor.family_id,
            title: recipe.title.trim(),
            ingredients: &recipe.ingredients,
            preparation: &recipe.preparation,
            source_ref: recipe.source_ref.as_deref(),
            protein,
            tags: &recipe.tags,
            created_by: actor.member_id,
            creator_role: actor.role,
            status,
        },
    )
    .await?;

    tracing::info!(
        family_id = %actor.family_id,
        recipe_id = %stored.id,
        title = %stored.title,
        status = %stored.status,
        "recipe added"
    );
    Ok(stored)
}

/// Extract a recipe through `ingestor` and store it.
pub async fn ingest_recipe(
    pool: &PgPool,
    ingestor: &dyn RecipeIngestor,
    actor: &Actor,
    request: &IngestRequest,
    timeout: Duration,
) -> Result<Recipe> {
    let mut recipe =
        call_with_timeout(ingestor.name(), timeout, ingestor.ingest(request)).await?;
    if recipe.source_ref.is_none() {
        if let IngestRequest::Url(url) = request {
            recipe.source_ref = Some(url.clone());
        }
    }
    add_recipe(pool, actor, &recipe).await
}

/// A member's rating: stars from adults, a reaction from kids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatingInput {
    Stars(u8),
    Reaction(KidReaction),
}

/// Record a rating. Ratings are append-only.
pub async fn rate_recipe(
    pool: &PgPool,
    actor: &Actor,
    recipe_id: Uuid,
    input: RatingInput,
    feedback: Option<&str>,
) -> Result<Rating> {
    let recipe = load_recipe(pool, recipe_id).await?;
    actor.ensure_family(recipe.family_id, "rate recipe")?;

    let (score, reaction) = match (actor.role, input) {
        (MemberRole::Parent, RatingInput::Stars(stars)) if (1..=5).contains(&stars) => {
            (i16::from(stars), None)
        }
        (MemberRole::Parent, RatingInput::Stars(stars)) => {
            return Err(LarderError::validation(format!(
                "star ratings go from 1 to 5, got {stars}"
            )));
        }
        (MemberRole::Kid, RatingInput::Reaction(reaction)) => (reaction.score(), Some(reaction)),
        (MemberRole::Parent, RatingInput::Reaction(_)) => {
            return Err(LarderError::validation("adults rate with stars (1-5)"));
        }
        (MemberRole::Kid, RatingInput::Stars(_)) => {
            return Err(LarderError::validation(
                "kids rate with a reaction: yummy, okay or yucky",
            ));
        }
    };

    let rating = ratings::insert_rating(
        pool,
        &ratings::NewRating {
            recipe_id,
            member_id: actor.member_id,
            rater_class: actor.role.rater_class(),
            score,
            kid_reaction: reaction,
            feedback: feedback.map(str::trim).filter(|f| !f.is_empty()),
        },
    )
    .await?;

    tracing::info!(%recipe_id, member = %actor.display_name, score, "recipe rated");
    Ok(rating)
}

/// Archive a recipe so it is never planned again. Parent only.
pub async fn archive_recipe(pool: &PgPool, actor: &Actor, recipe_id: Uuid) -> Result<Recipe> {
    actor.parent_capability("archive recipes")?;
    let recipe = load_recipe(pool, recipe_id).await?;
    actor.ensure_family(recipe.family_id, "archive recipe")?;
    recipes::archive_recipe(pool, recipe_id).await?;
    tracing::info!(%recipe_id, title = %recipe.title, "recipe archived");
    load_recipe(pool, recipe_id).await
}

/// Mark or unmark a recipe as a family favorite. Parent only.
pub async fn set_favorite(
    pool: &PgPool,
    actor: &Actor,
    recipe_id: Uuid,
    favorite: bool,
) -> Result<Recipe> {
    actor.parent_capability("change favorites")?;
    let recipe = load_recipe(pool, recipe_id).await?;
    actor.ensure_family(recipe.family_id, "change favorite")?;
    recipes::set_favorite(pool, recipe_id, favorite).await?;
    load_recipe(pool, recipe_id).await
}
