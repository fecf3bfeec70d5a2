//! Fixtures shared by the larder-core integration tests.

#![allow(dead_code)]

use sqlx::PgPool;

use larder_core::Actor;
use larder_core::ingest::IngestedRecipe;
use larder_core::recipes::add_recipe;
use larder_db::models::{Ingredient, MemberRole, Recipe};
use larder_test_utils::seed_family;

/// A family with one parent and one kid.
pub struct Household {
    pub parent: Actor,
    pub kid: Actor,
}

pub async fn household(pool: &PgPool, name: &str) -> Household {
    let (_, members) = seed_family(
        pool,
        name,
        &[("Alex", MemberRole::Parent), ("Sam", MemberRole::Kid)],
    )
    .await;
    Household {
        parent: Actor::from_member(&members[0]),
        kid: Actor::from_member(&members[1]),
    }
}

pub fn ingredient(name: &str, quantity: f64, unit: &str, category: &str) -> Ingredient {
    Ingredient {
        name: name.into(),
        quantity,
        unit: unit.into(),
        category: category.into(),
    }
}

pub fn recipe_input(title: &str, protein: &str, ingredients: Vec<Ingredient>) -> IngestedRecipe {
    IngestedRecipe {
        title: title.into(),
        ingredients,
        preparation: String::new(),
        source_ref: None,
        protein: Some(protein.into()),
        tags: vec![],
    }
}

/// Add a parent-approved recipe.
pub async fn approved_recipe(
    pool: &PgPool,
    parent: &Actor,
    title: &str,
    protein: &str,
    ingredients: Vec<Ingredient>,
) -> Recipe {
    add_recipe(pool, parent, &recipe_input(title, protein, ingredients))
        .await
        .expect("add recipe")
}

/// Add `n` simple approved recipes with distinct proteins.
pub async fn approved_recipes(pool: &PgPool, parent: &Actor, n: usize) -> Vec<Recipe> {
    let mut out = Vec::new();
    for i in 0..n {
        out.push(
            approved_recipe(
                pool,
                parent,
                &format!("Dinner {i}"),
                &format!("protein {i}"),
                vec![ingredient("onion", 1.0, "each", "produce")],
            )
            .await,
        );
    }
    out
}
