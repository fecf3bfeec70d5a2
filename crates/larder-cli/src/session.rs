//! Per-invocation state shared by the command handlers: the pool, the
//! catalog and the acting member.

use anyhow::{Context, Result, bail};
use sqlx::PgPool;
use uuid::Uuid;

use larder_core::{Actor, Catalog};
use larder_db::models::Family;
use larder_db::queries::families;

use crate::config::{FAMILY_ENV_VAR, LarderConfig, MEMBER_ENV_VAR};

pub struct Session {
    pub pool: PgPool,
    pub catalog: Catalog,
    family: Option<String>,
    member: Option<String>,
}

impl Session {
    pub async fn open(config: &LarderConfig) -> Result<Self> {
        let catalog = Catalog::load(&config.catalog_path)?;
        let pool = larder_db::pool::create_pool(&config.db_config).await?;
        tracing::debug!(
            catalog = %config.catalog_path.display(),
            stores = catalog.stores.len(),
            "session opened"
        );
        Ok(Self {
            pool,
            catalog,
            family: config.family.clone(),
            member: config.member.clone(),
        })
    }

    pub async fn close(self) {
        self.pool.close().await;
    }

    /// The selected family. When none is configured and exactly one family
    /// exists, that one is used.
    pub async fn family(&self) -> Result<Family> {
        match self.family.as_deref() {
            Some(name) => families::get_family_by_name(&self.pool, name)
                .await?
                .with_context(|| format!("no family named {name:?}")),
            None => {
                let mut all = families::list_families(&self.pool).await?;
                match all.len() {
                    0 => bail!("no families yet; create one with `larder family create <name>`"),
                    1 => Ok(all.remove(0)),
                    _ => bail!("several families exist; pass --family or set {FAMILY_ENV_VAR}"),
                }
            }
        }
    }

    /// The acting member, required by every command that changes state.
    pub async fn actor(&self) -> Result<Actor> {
        let family = self.family().await?;
        let Some(name) = self.member.as_deref() else {
            bail!("no acting member; pass --as <name> or set {MEMBER_ENV_VAR}");
        };
        let member = families::get_member_by_name(&self.pool, family.id, name)
            .await?
            .with_context(|| format!("{name:?} is not a member of {}", family.name))?;
        Ok(Actor::from_member(&member))
    }
}

/// Parse an entity id given on the command line.
pub fn parse_id(kind: &str, input: &str) -> Result<Uuid> {
    input
        .trim()
        .parse()
        .with_context(|| format!("invalid {kind} ID: {input:?}"))
}
