//! Database query functions for the `meal_plans` table.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use sqlx::types::Json;
use uuid::Uuid;

use crate::models::{ApprovalStatus, MealPlan, PlannedDay, Recipe};

/// Fields for a new meal plan row.
#[derive(Debug, Clone)]
pub struct NewMealPlan<'a> {
    pub family_id: Uuid,
    pub week: &'a str,
    pub week_start: NaiveDate,
    pub days: &'a [PlannedDay],
    pub status: ApprovalStatus,
    pub created_by: Uuid,
}

/// Insert a new meal plan. Returns the inserted row.
///
/// Fails if the family already has an open draft for the week (the
/// `meal_plans_open_draft_uniq` index).
pub async fn insert_meal_plan(pool: &PgPool, plan: &NewMealPlan<'_>) -> Result<MealPlan> {
    let row = sqlx::query_as::<_, MealPlan>(
        "INSERT INTO meal_plans (family_id, week, week_start, days, status, created_by) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         RETURNING *",
    )
    .bind(plan.family_id)
    .bind(plan.week)
    .bind(plan.week_start)
    .bind(Json(plan.days))
    .bind(plan.status)
    .bind(plan.created_by)
    .fetch_one(pool)
    .await
    .with_context(|| format!("failed to insert meal plan for week {}", plan.week))?;

    Ok(row)
}

/// Fetch a meal plan by ID.
pub async fn get_meal_plan(pool: &PgPool, id: Uuid) -> Result<Option<MealPlan>> {
    let plan = sqlx::query_as::<_, MealPlan>("SELECT * FROM meal_plans WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch meal plan")?;

    Ok(plan)
}

/// Fetch the open (draft, pending or rejected) plan for a family's week.
pub async fn get_open_plan(pool: &PgPool, family_id: Uuid, week: &str) -> Result<Option<MealPlan>> {
    let plan = sqlx::query_as::<_, MealPlan>(
        "SELECT * FROM meal_plans \
         WHERE family_id = $1 AND week = $2 \
           AND status IN ('draft', 'pending_approval', 'rejected')",
    )
    .bind(family_id)
    .bind(week)
    .fetch_optional(pool)
    .await
    .context("failed to fetch open meal plan")?;

    Ok(plan)
}

/// Fetch the authoritative approved plan for a family's week.
pub async fn get_current_approved_plan(
    pool: &PgPool,
    family_id: Uuid,
    week: &str,
) -> Result<Option<MealPlan>> {
    let plan = sqlx::query_as::<_, MealPlan>(
        "SELECT * FROM meal_plans \
         WHERE family_id = $1 AND week = $2 \
           AND status = 'approved' AND superseded_at IS NULL",
    )
    .bind(family_id)
    .bind(week)
    .fetch_optional(pool)
    .await
    .context("failed to fetch approved meal plan")?;

    Ok(plan)
}

/// List all plans of a family, newest week first.
pub async fn list_plans(pool: &PgPool, family_id: Uuid) -> Result<Vec<MealPlan>> {
    let plans = sqlx::query_as::<_, MealPlan>(
        "SELECT * FROM meal_plans WHERE family_id = $1 \
         ORDER BY week_start DESC, created_at DESC",
    )
    .bind(family_id)
    .fetch_all(pool)
    .await
    .context("failed to list meal plans")?;

    Ok(plans)
}

/// Current approved plans of a family whose week starts in `[from, before)`.
///
/// This is the serving history the planner's repeat window and recent-use
/// counts are computed from.
pub async fn list_approved_plans_between(
    pool: &PgPool,
    family_id: Uuid,
    from: NaiveDate,
    before: NaiveDate,
) -> Result<Vec<MealPlan>> {
    let plans = sqlx::query_as::<_, MealPlan>(
        "SELECT * FROM meal_plans \
         WHERE family_id = $1 \
           AND status = 'approved' AND superseded_at IS NULL \
           AND week_start >= $2 AND week_start < $3 \
         ORDER BY week_start ASC",
    )
    .bind(family_id)
    .bind(from)
    .bind(before)
    .fetch_all(pool)
    .await
    .context("failed to list approved meal plans")?;

    Ok(plans)
}

/// Replace the days of a plan and set its status, provided the plan is
/// still in `expected` status. Returns the updated row, or `None` when the
/// optimistic check failed.
pub async fn replace_plan_days(
    pool: &PgPool,
    id: Uuid,
    expected: ApprovalStatus,
    days: &[PlannedDay],
    status: ApprovalStatus,
) -> Result<Option<MealPlan>> {
    let plan = sqlx::query_as::<_, MealPlan>(
        "UPDATE meal_plans \
         SET days = $1, status = $2, updated_at = now() \
         WHERE id = $3 AND status = $4 \
         RETURNING *",
    )
    .bind(Json(days))
    .bind(status)
    .bind(id)
    .bind(expected)
    .fetch_optional(pool)
    .await
    .context("failed to replace meal plan days")?;

    Ok(plan)
}

/// Atomically move a plan from one status to another (optimistic lock on
/// `from`). Returns the number of rows affected.
pub async fn transition_plan_status(
    pool: &PgPool,
    id: Uuid,
    from: ApprovalStatus,
    to: ApprovalStatus,
) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE meal_plans SET status = $1, updated_at = now() \
         WHERE id = $2 AND status = $3",
    )
    .bind(to)
    .bind(id)
    .bind(from)
    .execute(pool)
    .await
    .context("failed to transition meal plan status")?;

    Ok(result.rows_affected())
}

/// Outcome of [`approve_plan`].
#[derive(Debug)]
pub enum PlanApproval {
    Approved(MealPlan),
    /// The plan is missing or not `pending_approval`.
    NotPending,
    /// Assigned recipes that are no longer approved and unarchived: titles,
    /// or ids for recipes that no longer exist. Nothing was written.
    UnusableRecipes(Vec<String>),
}

impl PlanApproval {
    pub fn approved(self) -> Option<MealPlan> {
        match self {
            Self::Approved(plan) => Some(plan),
            _ => None,
        }
    }
}

/// Approve a pending plan and supersede the previously approved plan for
/// the same week, in one transaction.
///
/// The plan row is locked `FOR UPDATE` and its recipes `FOR SHARE`, so a
/// recipe cannot be archived or rejected between the check that every
/// assigned recipe is still plannable and the commit.
pub async fn approve_plan(
    pool: &PgPool,
    id: Uuid,
    approved_by: Uuid,
    approved_at: DateTime<Utc>,
) -> Result<PlanApproval> {
    let mut tx = pool.begin().await.context("failed to begin transaction")?;

    let pending = sqlx::query_as::<_, MealPlan>(
        "SELECT * FROM meal_plans WHERE id = $1 AND status = 'pending_approval' FOR UPDATE",
    )
    .bind(id)
    .fetch_optional(&mut *tx)
    .await
    .context("failed to lock meal plan")?;
    let Some(pending) = pending else {
        return Ok(PlanApproval::NotPending);
    };

    let mut ids: Vec<Uuid> = pending.days.iter().map(|d| d.recipe_id).collect();
    ids.sort();
    ids.dedup();
    let assigned = sqlx::query_as::<_, Recipe>(
        "SELECT * FROM recipes WHERE id = ANY($1) ORDER BY id FOR SHARE",
    )
    .bind(ids.as_slice())
    .fetch_all(&mut *tx)
    .await
    .context("failed to lock plan recipes")?;

    let mut unusable: Vec<String> = assigned
        .iter()
        .filter(|r| !r.is_plannable())
        .map(|r| r.title.clone())
        .collect();
    unusable.extend(
        ids.iter()
            .filter(|id| !assigned.iter().any(|r| r.id == **id))
            .map(Uuid::to_string),
    );
    if !unusable.is_empty() {
        return Ok(PlanApproval::UnusableRecipes(unusable));
    }

    // Clear the approved slot first so the partial unique index never sees
    // two current approvals for the week.
    sqlx::query(
        "UPDATE meal_plans \
         SET superseded_at = $3, updated_at = now() \
         WHERE family_id = $1 AND week = $2 \
           AND status = 'approved' AND superseded_at IS NULL",
    )
    .bind(pending.family_id)
    .bind(&pending.week)
    .bind(approved_at)
    .execute(&mut *tx)
    .await
    .context("failed to supersede previously approved plan")?;

    let plan = sqlx::query_as::<_, MealPlan>(
        "UPDATE meal_plans \
         SET status = 'approved', approved_by = $2, approved_at = $3, updated_at = now() \
         WHERE id = $1 AND status = 'pending_approval' \
         RETURNING *",
    )
    .bind(id)
    .bind(approved_by)
    .bind(approved_at)
    .fetch_optional(&mut *tx)
    .await
    .context("failed to approve meal plan")?;

    match plan {
        Some(p) => {
            tx.commit().await.context("failed to commit transaction")?;
            Ok(PlanApproval::Approved(p))
        }
        // Rolls back on drop.
        None => Ok(PlanApproval::NotPending),
    }
}
