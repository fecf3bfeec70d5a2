//! Convenience dispatch helpers that wrap [`super::ApprovalStateMachine`]
//! transitions with semantic names and the checks each entity needs.

use sqlx::PgPool;
use uuid::Uuid;

use larder_db::models::{GroceryList, MealPlan, MemberRole, Recipe};
use larder_db::queries::meal_plans;

use super::{
    ApprovalAction, ApprovalStateMachine, EntityKind, load_list, load_plan, load_recipe,
};
use crate::actor::{Actor, ParentCapability};
use crate::error::{LarderError, Result};

fn ensure_capability_family(
    capability: &ParentCapability,
    family_id: Uuid,
    action: &str,
) -> Result<()> {
    if capability.family_id() != family_id {
        return Err(LarderError::Permission {
            member: capability.member_id().to_string(),
            role: MemberRole::Parent,
            action: format!("{action} for another family"),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Recipes
// ---------------------------------------------------------------------------

/// Approve a kid-submitted recipe: `pending_approval -> approved`.
pub async fn approve_recipe(
    pool: &PgPool,
    capability: &ParentCapability,
    recipe_id: Uuid,
) -> Result<Recipe> {
    let recipe = load_recipe(pool, recipe_id).await?;
    ensure_capability_family(capability, recipe.family_id, "approve recipe")?;
    ApprovalStateMachine::check(EntityKind::Recipe, recipe_id, recipe.status, ApprovalAction::Approve)?;
    ApprovalStateMachine::approve(pool, capability, EntityKind::Recipe, recipe_id).await?;
    load_recipe(pool, recipe_id).await
}

/// Reject a kid-submitted recipe: `pending_approval -> rejected`.
pub async fn reject_recipe(
    pool: &PgPool,
    capability: &ParentCapability,
    recipe_id: Uuid,
) -> Result<Recipe> {
    let recipe = load_recipe(pool, recipe_id).await?;
    ensure_capability_family(capability, recipe.family_id, "reject recipe")?;
    let to = ApprovalStateMachine::check(
        EntityKind::Recipe,
        recipe_id,
        recipe.status,
        ApprovalAction::Reject,
    )?;
    ApprovalStateMachine::transition(pool, EntityKind::Recipe, recipe_id, recipe.status, to).await?;
    load_recipe(pool, recipe_id).await
}

// ---------------------------------------------------------------------------
// Meal plans
// ---------------------------------------------------------------------------

/// Submit a draft plan for approval: `draft -> pending_approval`.
pub async fn submit_plan(pool: &PgPool, actor: &Actor, plan_id: Uuid) -> Result<MealPlan> {
    let plan = load_plan(pool, plan_id).await?;
    actor.ensure_family(plan.family_id, "submit meal plan")?;
    let to = ApprovalStateMachine::check(
        EntityKind::MealPlan,
        plan_id,
        plan.status,
        ApprovalAction::Submit,
    )?;
    ApprovalStateMachine::transition(pool, EntityKind::MealPlan, plan_id, plan.status, to).await?;
    load_plan(pool, plan_id).await
}

/// Approve a pending plan: `pending_approval -> approved`.
///
/// Every assigned recipe must still be approved and unarchived when the
/// approval commits; otherwise the plan stays pending and a validation
/// error names the offenders. The previously approved plan for the week is
/// superseded in the same transaction.
pub async fn approve_plan(
    pool: &PgPool,
    capability: &ParentCapability,
    plan_id: Uuid,
) -> Result<MealPlan> {
    let plan = load_plan(pool, plan_id).await?;
    ensure_capability_family(capability, plan.family_id, "approve meal plan")?;
    ApprovalStateMachine::check(EntityKind::MealPlan, plan_id, plan.status, ApprovalAction::Approve)?;

    ApprovalStateMachine::approve(pool, capability, EntityKind::MealPlan, plan_id).await?;
    load_plan(pool, plan_id).await
}

/// Reject a pending plan: `pending_approval -> rejected`. Only a later
/// regeneration brings it back to draft.
pub async fn reject_plan(
    pool: &PgPool,
    capability: &ParentCapability,
    plan_id: Uuid,
) -> Result<MealPlan> {
    let plan = load_plan(pool, plan_id).await?;
    ensure_capability_family(capability, plan.family_id, "reject meal plan")?;
    let to = ApprovalStateMachine::check(
        EntityKind::MealPlan,
        plan_id,
        plan.status,
        ApprovalAction::Reject,
    )?;
    ApprovalStateMachine::transition(pool, EntityKind::MealPlan, plan_id, plan.status, to).await?;
    load_plan(pool, plan_id).await
}

// ---------------------------------------------------------------------------
// Grocery lists
// ---------------------------------------------------------------------------

/// Submit a draft list for approval: `draft -> pending_approval`.
pub async fn submit_grocery_list(pool: &PgPool, actor: &Actor, list_id: Uuid) -> Result<GroceryList> {
    let list = load_list(pool, list_id).await?;
    actor.ensure_family(list.family_id, "submit grocery list")?;
    let to = ApprovalStateMachine::check(
        EntityKind::GroceryList,
        list_id,
        list.status,
        ApprovalAction::Submit,
    )?;
    ApprovalStateMachine::transition(pool, EntityKind::GroceryList, list_id, list.status, to)
        .await?;
    load_list(pool, list_id).await
}

/// Approve a pending list: `pending_approval -> approved`. Its source plan
/// must still be the week's current approved plan.
pub async fn approve_grocery_list(
    pool: &PgPool,
    capability: &ParentCapability,
    list_id: Uuid,
) -> Result<GroceryList> {
    let list = load_list(pool, list_id).await?;
    ensure_capability_family(capability, list.family_id, "approve grocery list")?;
    ApprovalStateMachine::check(
        EntityKind::GroceryList,
        list_id,
        list.status,
        ApprovalAction::Approve,
    )?;

    let plan = load_plan(pool, list.plan_id).await?;
    let current = meal_plans::get_current_approved_plan(pool, plan.family_id, &plan.week).await?;
    if current.map(|p| p.id) != Some(plan.id) {
        return Err(LarderError::validation(format!(
            "grocery list {list_id} was built from a plan that is no longer current for {}; \
             regenerate it",
            plan.week
        )));
    }

    ApprovalStateMachine::approve(pool, capability, EntityKind::GroceryList, list_id).await?;
    load_list(pool, list_id).await
}

/// Reject a pending list: `pending_approval -> rejected`.
pub async fn reject_grocery_list(
    pool: &PgPool,
    capability: &ParentCapability,
    list_id: Uuid,
) -> Result<GroceryList> {
    let list = load_list(pool, list_id).await?;
    ensure_capability_family(capability, list.family_id, "reject grocery list")?;
    let to = ApprovalStateMachine::check(
        EntityKind::GroceryList,
        list_id,
        list.status,
        ApprovalAction::Reject,
    )?;
    ApprovalStateMachine::transition(pool, EntityKind::GroceryList, list_id, list.status, to)
        .await?;
    load_list(pool, list_id).await
}
