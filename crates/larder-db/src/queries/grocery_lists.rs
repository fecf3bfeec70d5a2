//! Database query functions for the `grocery_lists` table.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::types::Json;
use uuid::Uuid;

use crate::models::{ApprovalStatus, GroceryItem, GroceryList};

/// Insert a new grocery list for a plan. Returns the inserted row.
pub async fn insert_grocery_list(
    pool: &PgPool,
    family_id: Uuid,
    plan_id: Uuid,
    items: &[GroceryItem],
    status: ApprovalStatus,
) -> Result<GroceryList> {
    let row = sqlx::query_as::<_, GroceryList>(
        "INSERT INTO grocery_lists (family_id, plan_id, items, status) \
         VALUES ($1, $2, $3, $4) \
         RETURNING *",
    )
    .bind(family_id)
    .bind(plan_id)
    .bind(Json(items))
    .bind(status)
    .fetch_one(pool)
    .await
    .with_context(|| format!("failed to insert grocery list for plan {plan_id}"))?;

    Ok(row)
}

/// Fetch a grocery list by ID.
pub async fn get_grocery_list(pool: &PgPool, id: Uuid) -> Result<Option<GroceryList>> {
    let list = sqlx::query_as::<_, GroceryList>("SELECT * FROM grocery_lists WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch grocery list")?;

    Ok(list)
}

/// Fetch the open (draft, pending or rejected) list for a plan.
pub async fn get_open_list_for_plan(pool: &PgPool, plan_id: Uuid) -> Result<Option<GroceryList>> {
    let list = sqlx::query_as::<_, GroceryList>(
        "SELECT * FROM grocery_lists \
         WHERE plan_id = $1 AND status IN ('draft', 'pending_approval', 'rejected')",
    )
    .bind(plan_id)
    .fetch_optional(pool)
    .await
    .context("failed to fetch open grocery list")?;

    Ok(list)
}

/// Fetch the authoritative approved list for a plan.
pub async fn get_current_approved_list_for_plan(
    pool: &PgPool,
    plan_id: Uuid,
) -> Result<Option<GroceryList>> {
    let list = sqlx::query_as::<_, GroceryList>(
        "SELECT * FROM grocery_lists \
         WHERE plan_id = $1 AND status = 'approved' AND superseded_at IS NULL",
    )
    .bind(plan_id)
    .fetch_optional(pool)
    .await
    .context("failed to fetch approved grocery list")?;

    Ok(list)
}

/// List all grocery lists of a family, newest first.
pub async fn list_grocery_lists(pool: &PgPool, family_id: Uuid) -> Result<Vec<GroceryList>> {
    let lists = sqlx::query_as::<_, GroceryList>(
        "SELECT * FROM grocery_lists WHERE family_id = $1 ORDER BY created_at DESC",
    )
    .bind(family_id)
    .fetch_all(pool)
    .await
    .context("failed to list grocery lists")?;

    Ok(lists)
}

/// Replace the items of a list and set its status, provided the list is
/// still in `expected` status. `None` means the optimistic check failed.
pub async fn replace_items(
    pool: &PgPool,
    id: Uuid,
    expected: ApprovalStatus,
    items: &[GroceryItem],
    status: ApprovalStatus,
) -> Result<Option<GroceryList>> {
    let list = sqlx::query_as::<_, GroceryList>(
        "UPDATE grocery_lists \
         SET items = $1, status = $2, updated_at = now() \
         WHERE id = $3 AND status = $4 \
         RETURNING *",
    )
    .bind(Json(items))
    .bind(status)
    .bind(id)
    .bind(expected)
    .fetch_optional(pool)
    .await
    .context("failed to replace grocery list items")?;

    Ok(list)
}

/// Atomically move a list from one status to another (optimistic lock on
/// `from`). Returns the number of rows affected.
pub async fn transition_list_status(
    pool: &PgPool,
    id: Uuid,
    from: ApprovalStatus,
    to: ApprovalStatus,
) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE grocery_lists SET status = $1, updated_at = now() \
         WHERE id = $2 AND status = $3",
    )
    .bind(to)
    .bind(id)
    .bind(from)
    .execute(pool)
    .await
    .context("failed to transition grocery list status")?;

    Ok(result.rows_affected())
}

/// Approve a pending list and supersede the previously approved list of
/// the same plan, in one transaction. `None` when the list is missing or
/// not `pending_approval`.
pub async fn approve_list(
    pool: &PgPool,
    id: Uuid,
    approved_by: Uuid,
    approved_at: DateTime<Utc>,
) -> Result<Option<GroceryList>> {
    let mut tx = pool.begin().await.context("failed to begin transaction")?;

    sqlx::query(
        "UPDATE grocery_lists AS old \
         SET superseded_at = $2, updated_at = now() \
         FROM grocery_lists AS new \
         WHERE new.id = $1 AND new.status = 'pending_approval' \
           AND old.plan_id = new.plan_id \
           AND old.status = 'approved' AND old.superseded_at IS NULL",
    )
    .bind(id)
    .bind(approved_at)
    .execute(&mut *tx)
    .await
    .context("failed to supersede previously approved grocery list")?;

    let list = sqlx::query_as::<_, GroceryList>(
        "UPDATE grocery_lists \
         SET status = 'approved', approved_by = $2, approved_at = $3, updated_at = now() \
         WHERE id = $1 AND status = 'pending_approval' \
         RETURNING *",
    )
    .bind(id)
    .bind(approved_by)
    .bind(approved_at)
    .fetch_optional(&mut *tx)
    .await
    .context("failed to approve grocery list")?;

    match list {
        Some(l) => {
            tx.commit().await.context("failed to commit transaction")?;
            Ok(Some(l))
        }
        None => Ok(None),
    }
}

/// Record that an approved list was handed to the task-sync service.
pub async fn mark_synced(pool: &PgPool, id: Uuid, synced_at: DateTime<Utc>) -> Result<()> {
    let result = sqlx::query(
        "UPDATE grocery_lists SET synced_at = $1 \
         WHERE id = $2 AND status = 'approved'",
    )
    .bind(synced_at)
    .bind(id)
    .execute(pool)
    .await
    .context("failed to mark grocery list synced")?;

    if result.rows_affected() == 0 {
        anyhow::bail!("grocery list {id} not found or not approved");
    }

    Ok(())
}
