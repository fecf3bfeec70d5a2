//! Database query functions for the `generation_locks` table.
//!
//! A row is a lease: the holder owns the key until it releases it or the
//! lease expires.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::GenerationLock;

/// Try to take the lease on `lock_key` for `holder`.
///
/// Succeeds when the key is free or its previous lease has expired. Returns
/// `None` while another holder's lease is live.
pub async fn try_acquire(
    pool: &PgPool,
    lock_key: &str,
    holder: Uuid,
    expires_at: DateTime<Utc>,
) -> Result<Option<GenerationLock>> {
    let lock = sqlx::query_as::<_, GenerationLock>(
        "INSERT INTO generation_locks (lock_key, holder, expires_at) \
         VALUES ($1, $2, $3) \
         ON CONFLICT (lock_key) DO UPDATE \
           SET holder = EXCLUDED.holder, \
               acquired_at = now(), \
               expires_at = EXCLUDED.expires_at \
           WHERE generation_locks.expires_at < now() \
         RETURNING *",
    )
    .bind(lock_key)
    .bind(holder)
    .bind(expires_at)
    .fetch_optional(pool)
    .await
    .with_context(|| format!("failed to acquire generation lock {lock_key:?}"))?;

    Ok(lock)
}

/// Release the lease on `lock_key` if `holder` still owns it. Returns
/// whether a row was removed.
pub async fn release(pool: &PgPool, lock_key: &str, holder: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM generation_locks WHERE lock_key = $1 AND holder = $2")
        .bind(lock_key)
        .bind(holder)
        .execute(pool)
        .await
        .with_context(|| format!("failed to release generation lock {lock_key:?}"))?;

    Ok(result.rows_affected() > 0)
}

/// Fetch the current lease on a key, expired or not.
pub async fn get_lock(pool: &PgPool, lock_key: &str) -> Result<Option<GenerationLock>> {
    let lock = sqlx::query_as::<_, GenerationLock>(
        "SELECT * FROM generation_locks WHERE lock_key = $1",
    )
    .bind(lock_key)
    .fetch_optional(pool)
    .await
    .context("failed to fetch generation lock")?;

    Ok(lock)
}
