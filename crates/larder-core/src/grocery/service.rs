//! Grocery list service layer.

use std::collections::HashMap;

use sqlx::PgPool;
use uuid::Uuid;

use larder_db::models::{ApprovalStatus, GroceryList, Recipe};
use larder_db::queries::{grocery_lists, recipes};

use super::{aggregate, sort_items};
use crate::actor::Actor;
use crate::approval::{ApprovalAction, ApprovalStateMachine, EntityKind, load_list, load_plan};
use crate::catalog::Catalog;
use crate::error::{LarderError, Result};
use crate::lock::{self, DEFAULT_LEASE_TTL};

/// What a generation request did to storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListChange {
    /// A new list row was inserted.
    Created,
    /// An open list was rewritten with new items.
    Refreshed,
    /// The open list already had exactly these items.
    Unchanged,
}

#[derive(Debug, Clone)]
pub struct GeneratedList {
    pub list: GroceryList,
    pub change: ListChange,
}

/// Build the grocery list for an approved plan.
///
/// Before the list is approved, generating again is idempotent: the open
/// list is reused and only rewritten when the items differ. A pending list
/// whose items would change must be rejected first. Once a list has been
/// approved, generating creates a new draft that needs its own approval.
pub async fn generate_grocery_list(
    pool: &PgPool,
    catalog: &Catalog,
    actor: &Actor,
    plan_id: Uuid,
) -> Result<GeneratedList> {
    let plan = load_plan(pool, plan_id).await?;
    actor.ensure_family(plan.family_id, "build grocery list")?;
    if !plan.is_current_approved() {
        return Err(LarderError::validation(format!(
            "meal plan {plan_id} is {} and not the current approved plan for {}; \
             grocery lists need an approved plan",
            plan.status, plan.week
        )));
    }

    let key = lock::grocery_key(plan_id);
    lock::with_lease(pool, &key, DEFAULT_LEASE_TTL, || async {
        let mut ids: Vec<Uuid> = plan.days.iter().map(|d| d.recipe_id).collect();
        ids.sort();
        ids.dedup();
        let found: HashMap<Uuid, Recipe> = recipes::get_recipes_by_ids(pool, &ids)
            .await?
            .into_iter()
            .map(|r| (r.id, r))
            .collect();

        let mut planned: Vec<&Recipe> = Vec::with_capacity(plan.days.len());
        for day in plan.days.iter() {
            let recipe = found
                .get(&day.recipe_id)
                .ok_or_else(|| LarderError::not_found("recipe", day.recipe_id))?;
            planned.push(recipe);
        }
        let items = aggregate(&planned, catalog)?;
        let status = ApprovalStateMachine::initial_status(EntityKind::GroceryList, actor.role);

        let open = grocery_lists::get_open_list_for_plan(pool, plan_id).await?;
        let generated = match open {
            None => GeneratedList {
                list: grocery_lists::insert_grocery_list(
                    pool,
                    plan.family_id,
                    plan_id,
                    &items,
                    status,
                )
                .await?,
                change: ListChange::Created,
            },
            Some(list) if list.status != ApprovalStatus::Rejected && list.items.0 == items => {
                GeneratedList {
                    list,
                    change: ListChange::Unchanged,
                }
            }
            Some(list) if list.status == ApprovalStatus::PendingApproval => {
                return Err(LarderError::conflict(
                    &key,
                    format!(
                        "grocery list {} is awaiting approval with different items; \
                         reject it before regenerating",
                        list.id
                    ),
                ));
            }
            Some(list) => {
                ApprovalStateMachine::check(
                    EntityKind::GroceryList,
                    list.id,
                    list.status,
                    ApprovalAction::Regenerate,
                )?;
                let list = grocery_lists::replace_items(pool, list.id, list.status, &items, status)
                    .await?
                    .ok_or_else(|| {
                        LarderError::conflict(&key, "grocery list changed while regenerating")
                    })?;
                GeneratedList {
                    list,
                    change: ListChange::Refreshed,
                }
            }
        };

        tracing::info!(
            family_id = %plan.family_id,
            plan_id = %plan_id,
            list_id = %generated.list.id,
            items = generated.list.items.len(),
            change = ?generated.change,
            "grocery list generated"
        );
        Ok(generated)
    })
    .await
}

/// Move an item of a draft list to another store (`None` for any store).
pub async fn move_item(
    pool: &PgPool,
    catalog: &Catalog,
    actor: &Actor,
    list_id: Uuid,
    item_name: &str,
    store: Option<&str>,
) -> Result<GroceryList> {
    let list = load_list(pool, list_id).await?;
    actor.ensure_family(list.family_id, "edit grocery list")?;
    if list.status != ApprovalStatus::Draft {
        return Err(LarderError::InvalidTransition {
            entity: EntityKind::GroceryList.as_str(),
            id: list_id,
            status: list.status,
            action: "edit",
        });
    }
    if let Some(id) = store {
        if catalog.store(id).is_none() {
            return Err(LarderError::validation(format!("unknown store {id:?}")));
        }
    }

    let wanted = super::units::normalize_name(item_name);
    let mut items = list.items.0.clone();
    let mut moved = 0;
    for item in items.iter_mut().filter(|i| i.name == wanted) {
        item.store = store.map(str::to_owned);
        moved += 1;
    }
    if moved == 0 {
        return Err(LarderError::not_found("grocery item", item_name));
    }
    sort_items(&mut items);

    let updated = grocery_lists::replace_items(
        pool,
        list_id,
        ApprovalStatus::Draft,
        &items,
        ApprovalStatus::Draft,
    )
    .await?
    .ok_or_else(|| {
        LarderError::conflict(format!("grocery list {list_id}"), "list changed while editing")
    })?;

    tracing::info!(%list_id, item = %wanted, store = ?store, "grocery item moved");
    Ok(updated)
}
