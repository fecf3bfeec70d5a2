//! Integration tests for grocery list generation, approval and sync.
//!
//! Requires PostgreSQL: set `LARDER_TEST_PG_URL` or let `larder-test-utils`
//! start a container.

mod common;

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Weekday;
use sqlx::PgPool;

use larder_core::approval::dispatch;
use larder_core::catalog::{Catalog, StoreConfig};
use larder_core::grocery::service::{ListChange, generate_grocery_list, move_item};
use larder_core::planner::service::generate_plan;
use larder_core::sync::{GroceryExport, SyncReceipt, TaskSync, sync_grocery_list};
use larder_core::{Actor, IsoWeek, LarderError};
use larder_db::models::{ApprovalStatus, MealPlan};
use larder_db::queries::grocery_lists;
use larder_test_utils::{create_test_db, drop_test_db};

use common::{approved_recipe, household, ingredient};

fn week() -> IsoWeek {
    "2026-W43".parse().unwrap()
}

/// Two planned days, a farmers market for produce and a warehouse store for
/// everything shelf-stable.
fn catalog() -> Catalog {
    let mut catalog = Catalog::default();
    catalog.planner.days = vec![Weekday::Mon, Weekday::Tue];
    catalog.stores = vec![
        StoreConfig {
            id: "market".into(),
            name: "Farmers Market".into(),
            priority_categories: vec!["produce".into()],
        },
        StoreConfig {
            id: "warehouse".into(),
            name: "Warehouse Club".into(),
            priority_categories: vec!["pantry".into(), "dairy".into()],
        },
    ];
    catalog
}

/// Two recipes sharing flour, planned and approved for the week.
async fn approved_plan(pool: &PgPool, parent: &Actor, catalog: &Catalog) -> MealPlan {
    approved_recipe(
        pool,
        parent,
        "Pancakes",
        "egg",
        vec![
            ingredient("flour", 2.0, "cups", "pantry"),
            ingredient("milk", 1.0, "cup", "dairy"),
        ],
    )
    .await;
    approved_recipe(
        pool,
        parent,
        "Apple Bread",
        "none",
        vec![
            ingredient("Flour", 1.0, "cup", ""),
            ingredient("apples", 3.0, "", "produce"),
        ],
    )
    .await;

    let generated = generate_plan(pool, catalog, parent, week()).await.unwrap();
    dispatch::submit_plan(pool, parent, generated.plan.id).await.unwrap();
    let cap = parent.parent_capability("approve meal plan").unwrap();
    dispatch::approve_plan(pool, &cap, generated.plan.id).await.unwrap()
}

#[derive(Default)]
struct RecordingSync {
    pushed: Mutex<Vec<GroceryExport>>,
}

#[async_trait]
impl TaskSync for RecordingSync {
    fn name(&self) -> &str {
        "recording"
    }

    async fn push(&self, export: &GroceryExport) -> anyhow::Result<SyncReceipt> {
        self.pushed.lock().unwrap().push(export.clone());
        Ok(SyncReceipt {
            tasks_created: export.lines.len(),
            location: None,
        })
    }
}

struct FailingSync;

#[async_trait]
impl TaskSync for FailingSync {
    fn name(&self) -> &str {
        "tasks"
    }

    async fn push(&self, _export: &GroceryExport) -> anyhow::Result<SyncReceipt> {
        anyhow::bail!("service unavailable")
    }
}

#[tokio::test]
async fn list_needs_an_approved_plan() {
    let (pool, db_name) = create_test_db().await;
    let home = household(&pool, "Okafor").await;
    let catalog = catalog();
    approved_recipe(&pool, &home.parent, "Soup", "beans", vec![]).await;

    let draft = generate_plan(&pool, &catalog, &home.parent, week()).await.unwrap();
    let err = generate_grocery_list(&pool, &catalog, &home.parent, draft.plan.id)
        .await
        .unwrap_err();
    assert!(matches!(err, LarderError::Validation(_)), "{err:?}");
    assert!(
        grocery_lists::list_grocery_lists(&pool, home.parent.family_id)
            .await
            .unwrap()
            .is_empty()
    );

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn merges_shared_ingredients_and_assigns_stores() {
    let (pool, db_name) = create_test_db().await;
    let home = household(&pool, "Okafor").await;
    let catalog = catalog();
    let plan = approved_plan(&pool, &home.parent, &catalog).await;

    let generated = generate_grocery_list(&pool, &catalog, &home.parent, plan.id)
        .await
        .unwrap();
    assert_eq!(generated.change, ListChange::Created);
    assert_eq!(generated.list.status, ApprovalStatus::Draft);

    let items = &generated.list.items.0;
    let flour: Vec<_> = items.iter().filter(|i| i.name == "flour").collect();
    assert_eq!(flour.len(), 1);
    assert_eq!(flour[0].quantity, 3.0);
    assert_eq!(flour[0].unit, "cup");
    assert_eq!(flour[0].category, "pantry");
    assert_eq!(flour[0].store.as_deref(), Some("warehouse"));
    assert_eq!(flour[0].recipe_sources.len(), 2);

    let apple = items.iter().find(|i| i.name == "apple").unwrap();
    assert_eq!(apple.quantity, 3.0);
    assert_eq!(apple.unit, "each");
    assert_eq!(apple.store.as_deref(), Some("market"));

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn regenerating_before_approval_is_idempotent() {
    let (pool, db_name) = create_test_db().await;
    let home = household(&pool, "Okafor").await;
    let catalog = catalog();
    let plan = approved_plan(&pool, &home.parent, &catalog).await;

    let first = generate_grocery_list(&pool, &catalog, &home.parent, plan.id)
        .await
        .unwrap();
    let again = generate_grocery_list(&pool, &catalog, &home.parent, plan.id)
        .await
        .unwrap();
    assert_eq!(again.change, ListChange::Unchanged);
    assert_eq!(again.list.id, first.list.id);

    dispatch::submit_grocery_list(&pool, &home.parent, first.list.id)
        .await
        .unwrap();
    let pending = generate_grocery_list(&pool, &catalog, &home.parent, plan.id)
        .await
        .unwrap();
    assert_eq!(pending.change, ListChange::Unchanged);
    assert_eq!(pending.list.status, ApprovalStatus::PendingApproval);
    assert_eq!(
        grocery_lists::list_grocery_lists(&pool, home.parent.family_id)
            .await
            .unwrap()
            .len(),
        1
    );

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn generating_after_approval_starts_a_new_draft() {
    let (pool, db_name) = create_test_db().await;
    let home = household(&pool, "Okafor").await;
    let catalog = catalog();
    let plan = approved_plan(&pool, &home.parent, &catalog).await;
    let cap = home.parent.parent_capability("approve grocery list").unwrap();

    let first = generate_grocery_list(&pool, &catalog, &home.parent, plan.id)
        .await
        .unwrap();
    dispatch::submit_grocery_list(&pool, &home.parent, first.list.id)
        .await
        .unwrap();
    let approved = dispatch::approve_grocery_list(&pool, &cap, first.list.id)
        .await
        .unwrap();
    assert_eq!(approved.status, ApprovalStatus::Approved);
    assert_eq!(approved.approved_by, Some(home.parent.member_id));

    let second = generate_grocery_list(&pool, &catalog, &home.parent, plan.id)
        .await
        .unwrap();
    assert_eq!(second.change, ListChange::Created);
    assert_ne!(second.list.id, approved.id);
    assert_eq!(second.list.status, ApprovalStatus::Draft);

    let current = grocery_lists::get_current_approved_list_for_plan(&pool, plan.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(current.id, approved.id);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn kid_cannot_approve_a_list() {
    let (pool, db_name) = create_test_db().await;
    let home = household(&pool, "Okafor").await;
    let catalog = catalog();
    let plan = approved_plan(&pool, &home.parent, &catalog).await;

    let generated = generate_grocery_list(&pool, &catalog, &home.kid, plan.id)
        .await
        .unwrap();
    assert_eq!(generated.list.status, ApprovalStatus::PendingApproval);

    let err = home.kid.parent_capability("approve grocery list").unwrap_err();
    assert!(matches!(err, LarderError::Permission { .. }), "{err:?}");
    let list = grocery_lists::get_grocery_list(&pool, generated.list.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(list.status, ApprovalStatus::PendingApproval);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn move_item_only_on_drafts() {
    let (pool, db_name) = create_test_db().await;
    let home = household(&pool, "Okafor").await;
    let catalog = catalog();
    let plan = approved_plan(&pool, &home.parent, &catalog).await;

    let generated = generate_grocery_list(&pool, &catalog, &home.parent, plan.id)
        .await
        .unwrap();
    let moved = move_item(
        &pool,
        &catalog,
        &home.parent,
        generated.list.id,
        "Milk",
        Some("market"),
    )
    .await
    .unwrap();
    let milk = moved.items.iter().find(|i| i.name == "milk").unwrap();
    assert_eq!(milk.store.as_deref(), Some("market"));

    let err = move_item(&pool, &catalog, &home.parent, generated.list.id, "milk", Some("mall"))
        .await
        .unwrap_err();
    assert!(matches!(err, LarderError::Validation(_)), "{err:?}");

    dispatch::submit_grocery_list(&pool, &home.parent, generated.list.id)
        .await
        .unwrap();
    let err = move_item(&pool, &catalog, &home.parent, generated.list.id, "milk", None)
        .await
        .unwrap_err();
    assert!(matches!(err, LarderError::InvalidTransition { .. }), "{err:?}");

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn sync_pushes_approved_list_and_records_time() {
    let (pool, db_name) = create_test_db().await;
    let home = household(&pool, "Okafor").await;
    let catalog = catalog();
    let plan = approved_plan(&pool, &home.parent, &catalog).await;
    let cap = home.parent.parent_capability("approve grocery list").unwrap();
    let sync = RecordingSync::default();

    let generated = generate_grocery_list(&pool, &catalog, &home.parent, plan.id)
        .await
        .unwrap();

    // Drafts are not exported.
    let err = sync_grocery_list(
        &pool,
        &catalog,
        &sync,
        &home.parent,
        generated.list.id,
        Duration::from_secs(5),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, LarderError::Validation(_)), "{err:?}");

    dispatch::submit_grocery_list(&pool, &home.parent, generated.list.id)
        .await
        .unwrap();
    dispatch::approve_grocery_list(&pool, &cap, generated.list.id)
        .await
        .unwrap();

    let err = sync_grocery_list(
        &pool,
        &catalog,
        &FailingSync,
        &home.parent,
        generated.list.id,
        Duration::from_secs(5),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, LarderError::ExternalService { .. }), "{err:?}");
    let list = grocery_lists::get_grocery_list(&pool, generated.list.id)
        .await
        .unwrap()
        .unwrap();
    assert!(list.synced_at.is_none());

    let receipt = sync_grocery_list(
        &pool,
        &catalog,
        &sync,
        &home.parent,
        generated.list.id,
        Duration::from_secs(5),
    )
    .await
    .unwrap();
    assert_eq!(receipt.tasks_created, generated.list.items.len());
    let pushed = sync.pushed.lock().unwrap();
    assert_eq!(pushed.len(), 1);
    assert_eq!(pushed[0].week, "2026-W43");
    drop(pushed);

    let list = grocery_lists::get_grocery_list(&pool, generated.list.id)
        .await
        .unwrap()
        .unwrap();
    assert!(list.synced_at.is_some());

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn sync_refuses_list_of_a_replaced_plan() {
    let (pool, db_name) = create_test_db().await;
    let home = household(&pool, "Lindqvist").await;
    let catalog = catalog();
    let plan = approved_plan(&pool, &home.parent, &catalog).await;
    let cap = home.parent.parent_capability("approve").unwrap();

    let generated = generate_grocery_list(&pool, &catalog, &home.parent, plan.id)
        .await
        .unwrap();
    dispatch::submit_grocery_list(&pool, &home.parent, generated.list.id)
        .await
        .unwrap();
    dispatch::approve_grocery_list(&pool, &cap, generated.list.id)
        .await
        .unwrap();

    // A newer plan for the same week is approved and replaces the old one.
    let replacement = generate_plan(&pool, &catalog, &home.parent, week())
        .await
        .unwrap();
    assert_ne!(replacement.plan.id, plan.id);
    dispatch::submit_plan(&pool, &home.parent, replacement.plan.id)
        .await
        .unwrap();
    dispatch::approve_plan(&pool, &cap, replacement.plan.id)
        .await
        .unwrap();

    let sync = RecordingSync::default();
    let err = sync_grocery_list(
        &pool,
        &catalog,
        &sync,
        &home.parent,
        generated.list.id,
        Duration::from_secs(5),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, LarderError::Validation(_)), "{err:?}");
    assert!(sync.pushed.lock().unwrap().is_empty());
    let list = grocery_lists::get_grocery_list(&pool, generated.list.id)
        .await
        .unwrap()
        .unwrap();
    assert!(list.synced_at.is_none());

    pool.close().await;
    drop_test_db(&db_name).await;
}
