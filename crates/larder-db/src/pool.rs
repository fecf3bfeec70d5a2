//! Connection pool, embedded migrations and the post-migration schema check.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{Executor, PgPool};
use tracing::info;

use crate::config::DbConfig;

/// Migrations embedded at compile time from `crates/larder-db/migrations/`.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!();

/// Tables the current schema must contain, in dependency order.
pub const LARDER_TABLES: &[&str] = &[
    "families",
    "family_members",
    "recipes",
    "ratings",
    "meal_plans",
    "grocery_lists",
    "generation_locks",
];

/// Connect to the configured database. Sessions identify themselves as
/// `larder` in `pg_stat_activity`.
pub async fn create_pool(config: &DbConfig) -> Result<PgPool> {
    let options: PgConnectOptions = config
        .database_url
        .parse()
        .with_context(|| format!("invalid database URL {}", config.database_url))?;
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(10))
        .connect_with(options.application_name("larder"))
        .await
        .with_context(|| format!("failed to connect to database at {}", config.database_url))?;
    Ok(pool)
}

/// Apply pending migrations, then check that every larder table exists.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    MIGRATOR
        .run(pool)
        .await
        .context("failed to run database migrations")?;
    verify_schema(pool).await?;

    info!(migrations = MIGRATOR.iter().count(), "schema up to date");
    Ok(())
}

/// Fail when any of [`LARDER_TABLES`] is absent from the current schema.
pub async fn verify_schema(pool: &PgPool) -> Result<()> {
    let present: Vec<String> = sqlx::query_scalar(
        "SELECT tablename::text FROM pg_tables \
         WHERE schemaname = current_schema() AND tablename = ANY($1)",
    )
    .bind(LARDER_TABLES)
    .fetch_all(pool)
    .await
    .context("failed to inspect schema")?;

    let missing: Vec<&str> = LARDER_TABLES
        .iter()
        .copied()
        .filter(|t| !present.iter().any(|p| p == t))
        .collect();
    if !missing.is_empty() {
        bail!("database schema is missing tables: {}", missing.join(", "));
    }
    Ok(())
}

/// Reject names that cannot be spliced into `CREATE DATABASE`.
pub fn validate_database_name(name: &str) -> Result<()> {
    let starts_ok = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if !starts_ok || name.len() > 63 || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        bail!("database name {name:?} must be an identifier of letters, digits and underscores");
    }
    Ok(())
}

/// Create the configured database through the server's `postgres`
/// database unless it already exists.
pub async fn ensure_database_exists(config: &DbConfig) -> Result<()> {
    let db_name = config
        .database_name()
        .context("could not determine database name from URL")?;
    validate_database_name(db_name)?;

    let maintenance_url = config.maintenance_url();
    let maint_pool = PgPoolOptions::new()
        .max_connections(1)
        .acquire_timeout(Duration::from_secs(10))
        .connect(&maintenance_url)
        .await
        .with_context(|| format!("failed to connect to maintenance database at {maintenance_url}"))?;

    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
            .bind(db_name)
            .fetch_one(&maint_pool)
            .await
            .context("failed to query pg_database")?;

    if exists {
        info!(db = db_name, "database already exists");
    } else {
        maint_pool
            .execute(format!("CREATE DATABASE {db_name}").as_str())
            .await
            .with_context(|| format!("failed to create database {db_name}"))?;
        info!(db = db_name, "database created");
    }

    maint_pool.close().await;
    Ok(())
}

/// Row count of each of [`LARDER_TABLES`], in that order.
pub async fn table_counts(pool: &PgPool) -> Result<Vec<(String, i64)>> {
    // The names are constants, so splicing them is safe.
    let query = LARDER_TABLES
        .iter()
        .enumerate()
        .map(|(i, t)| format!("SELECT {i}::int4 AS ord, '{t}'::text AS name, COUNT(*) AS n FROM {t}"))
        .collect::<Vec<_>>()
        .join(" UNION ALL ")
        + " ORDER BY ord";

    let rows: Vec<(i32, String, i64)> = sqlx::query_as(&query)
        .fetch_all(pool)
        .await
        .context("failed to count rows")?;
    Ok(rows.into_iter().map(|(_, name, n)| (name, n)).collect())
}
