//! Exporting approved grocery lists to an external task manager.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use larder_db::models::GroceryList;
use larder_db::queries::grocery_lists;

use crate::actor::Actor;
use crate::approval::{load_list, load_plan};
use crate::catalog::Catalog;
use crate::error::{LarderError, Result};
use crate::external::call_with_timeout;
use crate::grocery::render::{format_item, format_quantity};

/// One task to create: an item, how much of it, and where to buy it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportLine {
    pub item: String,
    pub quantity: String,
    pub store: String,
    /// Ready-made task title, e.g. `2 cup milk`.
    pub title: String,
}

/// An approved grocery list in task-sync form, lines in list order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroceryExport {
    pub list_id: Uuid,
    pub plan_id: Uuid,
    pub week: String,
    pub lines: Vec<ExportLine>,
}

/// Build the export of `list`. Only the current approved list of a plan
/// can be exported.
pub fn export_list(list: &GroceryList, week: &str, catalog: &Catalog) -> Result<GroceryExport> {
    if !list.is_current_approved() {
        return Err(LarderError::validation(format!(
            "grocery list {} is {}; only an approved list can be synced",
            list.id, list.status
        )));
    }
    let lines = list
        .items
        .iter()
        .map(|item| ExportLine {
            item: item.name.clone(),
            quantity: if item.unit == "each" {
                format_quantity(item.quantity)
            } else {
                format!("{} {}", format_quantity(item.quantity), item.unit)
            },
            store: catalog.store_label(item.store.as_deref()),
            title: format_item(item),
        })
        .collect();
    Ok(GroceryExport {
        list_id: list.id,
        plan_id: list.plan_id,
        week: week.to_owned(),
        lines,
    })
}

/// What the task manager reports back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReceipt {
    pub tasks_created: usize,
    /// Where the tasks landed, if the service says.
    pub location: Option<String>,
}

/// Adapter interface for the external task manager.
#[async_trait]
pub trait TaskSync: Send + Sync {
    fn name(&self) -> &str;

    /// Create tasks for every line of `export`.
    async fn push(&self, export: &GroceryExport) -> anyhow::Result<SyncReceipt>;
}

// Compile-time assertion: TaskSync must be object-safe.
const _: () = {
    fn _assert_object_safe(_: &dyn TaskSync) {}
};

/// Push an approved list to `sync` and record when it was synced.
pub async fn sync_grocery_list(
    pool: &PgPool,
    catalog: &Catalog,
    sync: &dyn TaskSync,
    actor: &Actor,
    list_id: Uuid,
    timeout: Duration,
) -> Result<SyncReceipt> {
    let list = load_list(pool, list_id).await?;
    actor.ensure_family(list.family_id, "sync grocery list")?;
    let plan = load_plan(pool, list.plan_id).await?;
    if !plan.is_current_approved() {
        return Err(LarderError::validation(format!(
            "grocery list {list_id} was built from a plan that is no longer current for {}; \
             regenerate it from the approved plan",
            plan.week
        )));
    }
    let export = export_list(&list, &plan.week, catalog)?;

    let receipt = call_with_timeout(sync.name(), timeout, sync.push(&export)).await?;
    grocery_lists::mark_synced(pool, list_id, Utc::now()).await?;

    tracing::info!(
        %list_id,
        service = sync.name(),
        tasks = receipt.tasks_created,
        "grocery list synced"
    );
    Ok(receipt)
}
