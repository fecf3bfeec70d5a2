//! Database query functions for the `ratings` table.
//!
//! Ratings are append-only: this module has no update or delete.

use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{KidReaction, RaterClass, Rating};

/// Fields for a new rating.
#[derive(Debug, Clone)]
pub struct NewRating<'a> {
    pub recipe_id: Uuid,
    pub member_id: Uuid,
    pub rater_class: RaterClass,
    pub score: i16,
    pub kid_reaction: Option<KidReaction>,
    pub feedback: Option<&'a str>,
}

/// Insert a rating. Returns the inserted row.
pub async fn insert_rating(pool: &PgPool, rating: &NewRating<'_>) -> Result<Rating> {
    let row = sqlx::query_as::<_, Rating>(
        "INSERT INTO ratings (recipe_id, member_id, rater_class, score, kid_reaction, feedback) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         RETURNING *",
    )
    .bind(rating.recipe_id)
    .bind(rating.member_id)
    .bind(rating.rater_class)
    .bind(rating.score)
    .bind(rating.kid_reaction)
    .bind(rating.feedback)
    .fetch_one(pool)
    .await
    .context("failed to insert rating")?;

    Ok(row)
}

/// List every rating of a recipe, oldest first.
pub async fn list_ratings_for_recipe(pool: &PgPool, recipe_id: Uuid) -> Result<Vec<Rating>> {
    let rows = sqlx::query_as::<_, Rating>(
        "SELECT * FROM ratings WHERE recipe_id = $1 ORDER BY created_at ASC, id ASC",
    )
    .bind(recipe_id)
    .fetch_all(pool)
    .await
    .context("failed to list ratings for recipe")?;

    Ok(rows)
}

/// List every rating of every recipe belonging to a family.
pub async fn list_ratings_for_family(pool: &PgPool, family_id: Uuid) -> Result<Vec<Rating>> {
    let rows = sqlx::query_as::<_, Rating>(
        "SELECT r.* FROM ratings r \
         JOIN recipes rc ON rc.id = r.recipe_id \
         WHERE rc.family_id = $1 \
         ORDER BY r.created_at ASC, r.id ASC",
    )
    .bind(family_id)
    .fetch_all(pool)
    .await
    .context("failed to list ratings for family")?;

    Ok(rows)
}
