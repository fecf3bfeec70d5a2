//! Single-writer leases for plan and grocery generation.
//!
//! Generation for a key (`plan:<family>:<week>` or `grocery:<plan>`) runs
//! only while holding a row in `generation_locks`. A second writer gets
//! [`LarderError::Conflict`] instead of waiting. Leases expire so a crashed
//! holder cannot block the key forever.

use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use larder_db::queries::generation_locks as db;

use crate::error::{LarderError, Result};

/// Lease duration used when the caller does not choose one.
pub const DEFAULT_LEASE_TTL: Duration = Duration::from_secs(120);

pub fn plan_key(family_id: Uuid, week: &str) -> String {
    format!("plan:{family_id}:{week}")
}

pub fn grocery_key(plan_id: Uuid) -> String {
    format!("grocery:{plan_id}")
}

/// A held lease. Release it with [`GenerationLease::release`].
#[derive(Debug)]
pub struct GenerationLease {
    key: String,
    holder: Uuid,
}

impl GenerationLease {
    /// Take the lease on `key` or fail with a conflict if it is held.
    pub async fn acquire(pool: &PgPool, key: &str, ttl: Duration) -> Result<Self> {
        let holder = Uuid::new_v4();
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| LarderError::validation(format!("invalid lease ttl: {e}")))?;
        match db::try_acquire(pool, key, holder, Utc::now() + ttl).await? {
            Some(_) => {
                tracing::debug!(key, %holder, "generation lease acquired");
                Ok(Self {
                    key: key.to_owned(),
                    holder,
                })
            }
            None => Err(LarderError::conflict(
                key,
                "generation already in progress",
            )),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn holder(&self) -> Uuid {
        self.holder
    }

    /// Give the lease back. Releasing an already-expired lease that someone
    /// else took over is not an error.
    pub async fn release(self, pool: &PgPool) -> Result<()> {
        if !db::release(pool, &self.key, self.holder).await? {
            tracing::warn!(key = %self.key, "generation lease expired before release");
        }
        Ok(())
    }
}

/// Run `work` while holding the lease on `key`, releasing it afterwards
/// whether or not `work` succeeded.
pub async fn with_lease<T, F, Fut>(pool: &PgPool, key: &str, ttl: Duration, work: F) -> Result<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let lease = GenerationLease::acquire(pool, key, ttl).await?;
    let result = work().await;
    if let Err(e) = lease.release(pool).await {
        tracing::warn!(key, error = %e, "failed to release generation lease");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lease_keys() {
        let family = Uuid::from_u128(7);
        assert_eq!(
            plan_key(family, "2026-W43"),
            "plan:00000000-0000-0000-0000-000000000007:2026-W43"
        );
        assert_eq!(
            grocery_key(Uuid::from_u128(9)),
            "grocery:00000000-0000-0000-0000-000000000009"
        );
    }
}
