//! Test support for larder: throwaway migrated databases and seeded
//! families.
//!
//! All tests of one binary share a PostgreSQL server. Point
//! `LARDER_TEST_PG_URL` at a running server (no database path), or leave it
//! unset to start a `postgres:17` container on first use.

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgPool};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;
use uuid::Uuid;

use larder_db::models::{Family, FamilyMember, MemberRole};
use larder_db::pool;
use larder_db::queries::families::{self, NewMember};

/// Environment variable naming an already running server.
pub const PG_URL_ENV_VAR: &str = "LARDER_TEST_PG_URL";

struct TestServer {
    url: String,
    _container: Option<ContainerAsync<Postgres>>,
}

static SERVER: OnceCell<TestServer> = OnceCell::const_new();

async fn start_server() -> TestServer {
    if let Ok(url) = std::env::var(PG_URL_ENV_VAR) {
        return TestServer {
            url: url.trim_end_matches('/').to_owned(),
            _container: None,
        };
    }

    let container = Postgres::default()
        .with_tag("17")
        .start()
        .await
        .expect("failed to start PostgreSQL container");
    let host = container.get_host().await.expect("container host");
    let port = container
        .get_host_port_ipv4(5432)
        .await
        .expect("container port");
    TestServer {
        url: format!("postgresql://postgres:postgres@{host}:{port}"),
        _container: Some(container),
    }
}

/// Server URL without a database name.
pub async fn pg_url() -> &'static str {
    &SERVER.get_or_init(start_server).await.url
}

async fn connect(db_name: &str, max_connections: u32) -> PgPool {
    let url = format!("{}/{db_name}", pg_url().await);
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(30))
        .connect(&url)
        .await
        .unwrap_or_else(|e| panic!("failed to connect to {db_name}: {e}"))
}

/// Create a uniquely named database and migrate it to the current larder
/// schema. Returns the pool and the name to hand to [`drop_test_db`].
pub async fn create_test_db() -> (PgPool, String) {
    let db_name = format!("larder_test_{}", Uuid::new_v4().simple());
    pool::validate_database_name(&db_name).expect("generated name is an identifier");

    let admin = connect("postgres", 1).await;
    admin
        .execute(format!("CREATE DATABASE {db_name}").as_str())
        .await
        .unwrap_or_else(|e| panic!("failed to create {db_name}: {e}"));
    admin.close().await;

    let db = connect(&db_name, 5).await;
    pool::run_migrations(&db)
        .await
        .expect("migrations should leave a complete schema");
    (db, db_name)
}

/// Drop a database made by [`create_test_db`], disconnecting stragglers
/// first. Errors are ignored.
pub async fn drop_test_db(db_name: &str) {
    let admin = connect("postgres", 1).await;
    let _ = sqlx::query(
        "SELECT pg_terminate_backend(pid) FROM pg_stat_activity \
         WHERE datname = $1 AND pid <> pg_backend_pid()",
    )
    .bind(db_name)
    .execute(&admin)
    .await;
    let _ = admin
        .execute(format!("DROP DATABASE IF EXISTS {db_name}").as_str())
        .await;
    admin.close().await;
}

/// Insert a family and its members, each with the default preference
/// weight of their role. Members come back in the order given.
pub async fn seed_family(
    pool: &PgPool,
    name: &str,
    members: &[(&str, MemberRole)],
) -> (Family, Vec<FamilyMember>) {
    let family = families::insert_family(pool, name)
        .await
        .expect("insert family");
    let mut seeded = Vec::with_capacity(members.len());
    for &(display_name, role) in members {
        let member = families::insert_member(
            pool,
            &NewMember {
                family_id: family.id,
                display_name,
                role,
                preference_weight: role.default_preference_weight(),
                chat_user_id: None,
            },
        )
        .await
        .expect("insert member");
        seeded.push(member);
    }
    (family, seeded)
}
