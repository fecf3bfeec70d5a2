//! Database query functions for the `recipes` table.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::types::Json;
use uuid::Uuid;

use crate::models::{ApprovalStatus, Ingredient, MemberRole, Recipe};

/// Fields for a new recipe.
#[derive(Debug, Clone)]
pub struct NewRecipe<'a> {
    pub family_id: Uuid,
    pub title: &'a str,
    pub ingredients: &'a [Ingredient],
    pub preparation: &'a str,
    pub source_ref: Option<&'a str>,
    pub protein: Option<&'a str>,
    pub tags: &'a [String],
    pub created_by: Uuid,
    pub creator_role: MemberRole,
    pub status: ApprovalStatus,
}

/// Insert a recipe. When `status` is `approved` the creator is recorded as
/// the approver.
pub async fn insert_recipe(pool: &PgPool, recipe: &NewRecipe<'_>) -> Result<Recipe> {
    let approved = recipe.status == ApprovalStatus::Approved;
    let row = sqlx::query_as::<_, Recipe>(
        "INSERT INTO recipes \
           (family_id, title, ingredients, preparation, source_ref, protein, tags, \
            created_by, creator_role, status, approved_by, approved_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, \
                 CASE WHEN $11 THEN $8 END, CASE WHEN $11 THEN now() END) \
         RETURNING *",
    )
    .bind(recipe.family_id)
    .bind(recipe.title)
    .bind(Json(recipe.ingredients))
    .bind(recipe.preparation)
    .bind(recipe.source_ref)
    .bind(recipe.protein)
    .bind(recipe.tags)
    .bind(recipe.created_by)
    .bind(recipe.creator_role)
    .bind(recipe.status)
    .bind(approved)
    .fetch_one(pool)
    .await
    .with_context(|| format!("failed to insert recipe {:?}", recipe.title))?;

    Ok(row)
}

/// Fetch a recipe by ID.
pub async fn get_recipe(pool: &PgPool, id: Uuid) -> Result<Option<Recipe>> {
    let recipe = sqlx::query_as::<_, Recipe>("SELECT * FROM recipes WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch recipe")?;

    Ok(recipe)
}

/// List the recipes of a family ordered by title. Archived recipes are
/// included only when `include_archived` is set.
pub async fn list_recipes(
    pool: &PgPool,
    family_id: Uuid,
    include_archived: bool,
) -> Result<Vec<Recipe>> {
    let recipes = sqlx::query_as::<_, Recipe>(
        "SELECT * FROM recipes \
         WHERE family_id = $1 AND ($2 OR NOT archived) \
         ORDER BY title, id",
    )
    .bind(family_id)
    .bind(include_archived)
    .fetch_all(pool)
    .await
    .context("failed to list recipes")?;

    Ok(recipes)
}

/// List recipes of a family waiting for a parent's decision.
pub async fn list_pending_recipes(pool: &PgPool, family_id: Uuid) -> Result<Vec<Recipe>> {
    let recipes = sqlx::query_as::<_, Recipe>(
        "SELECT * FROM recipes \
         WHERE family_id = $1 AND status = 'pending_approval' AND NOT archived \
         ORDER BY created_at, id",
    )
    .bind(family_id)
    .fetch_all(pool)
    .await
    .context("failed to list pending recipes")?;

    Ok(recipes)
}

/// Fetch the recipes with the given IDs. Missing IDs are silently absent
/// from the result.
pub async fn get_recipes_by_ids(pool: &PgPool, ids: &[Uuid]) -> Result<Vec<Recipe>> {
    let recipes = sqlx::query_as::<_, Recipe>(
        "SELECT * FROM recipes WHERE id = ANY($1) ORDER BY id",
    )
    .bind(ids)
    .fetch_all(pool)
    .await
    .context("failed to fetch recipes by id")?;

    Ok(recipes)
}

/// Case-insensitive substring search over recipe titles.
pub async fn search_recipes(pool: &PgPool, family_id: Uuid, query: &str) -> Result<Vec<Recipe>> {
    let pattern = format!("%{}%", query.replace('%', "\\%").replace('_', "\\_"));
    let recipes = sqlx::query_as::<_, Recipe>(
        "SELECT * FROM recipes \
         WHERE family_id = $1 AND title ILIKE $2 \
         ORDER BY title, id",
    )
    .bind(family_id)
    .bind(pattern)
    .fetch_all(pool)
    .await
    .context("failed to search recipes")?;

    Ok(recipes)
}

/// A live recipe of the family whose title matches `title` ignoring case
/// and surrounding whitespace. Archived and rejected recipes are skipped.
pub async fn find_recipe_by_title(
    pool: &PgPool,
    family_id: Uuid,
    title: &str,
) -> Result<Option<Recipe>> {
    let recipe = sqlx::query_as::<_, Recipe>(
        "SELECT * FROM recipes \
         WHERE family_id = $1 AND lower(trim(title)) = lower(trim($2)) \
           AND NOT archived AND status <> 'rejected' \
         ORDER BY created_at, id \
         LIMIT 1",
    )
    .bind(family_id)
    .bind(title)
    .fetch_optional(pool)
    .await
    .context("failed to look up recipe by title")?;

    Ok(recipe)
}

/// Atomically move a recipe from one status to another.
///
/// The `WHERE status = $from` clause makes this an optimistic lock: zero
/// rows affected means the recipe is missing or no longer in `from`.
/// `approved_by`/`approved_at` are written only when supplied.
pub async fn transition_recipe_status(
    pool: &PgPool,
    id: Uuid,
    from: ApprovalStatus,
    to: ApprovalStatus,
    approved_by: Option<Uuid>,
    approved_at: Option<DateTime<Utc>>,
) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE recipes \
         SET status = $1, \
             approved_by = COALESCE($2, approved_by), \
             approved_at = COALESCE($3, approved_at) \
         WHERE id = $4 AND status = $5",
    )
    .bind(to)
    .bind(approved_by)
    .bind(approved_at)
    .bind(id)
    .bind(from)
    .execute(pool)
    .await
    .context("failed to transition recipe status")?;

    Ok(result.rows_affected())
}

/// Archive a recipe. Archived recipes are kept but never planned again.
pub async fn archive_recipe(pool: &PgPool, id: Uuid) -> Result<()> {
    let result = sqlx::query("UPDATE recipes SET archived = true WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .context("failed to archive recipe")?;

    if result.rows_affected() == 0 {
        anyhow::bail!("recipe {id} not found");
    }

    Ok(())
}

/// Mark or unmark a recipe as a family favorite.
pub async fn set_favorite(pool: &PgPool, id: Uuid, favorite: bool) -> Result<()> {
    let result = sqlx::query("UPDATE recipes SET favorite = $1 WHERE id = $2")
        .bind(favorite)
        .bind(id)
        .execute(pool)
        .await
        .context("failed to update recipe favorite flag")?;

    if result.rows_affected() == 0 {
        anyhow::bail!("recipe {id} not found");
    }

    Ok(())
}
