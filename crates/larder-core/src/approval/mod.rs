//! Approval state machine for recipes, meal plans and grocery lists.
//!
//! All three entities share one transition graph:
//!
//! ```text
//! draft            -> pending_approval  (submit, any member)
//! pending_approval -> approved          (approve, parent only)
//! pending_approval -> rejected          (reject, parent only)
//! rejected         -> draft             (regeneration)
//! ```
//!
//! Approval and rejection take a [`ParentCapability`], which only a parent
//! [`crate::Actor`] can produce. Storage writes are optimistic: an update
//! only applies while the row still has the status it was read with.

pub mod dispatch;

use std::fmt;

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use larder_db::models::{ApprovalStatus, GroceryList, MealPlan, MemberRole, Recipe};
use larder_db::queries::meal_plans::PlanApproval;
use larder_db::queries::{grocery_lists, meal_plans, recipes};

use crate::actor::ParentCapability;
use crate::error::{LarderError, Result};

/// The kinds of record that go through approval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Recipe,
    MealPlan,
    GroceryList,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Recipe => "recipe",
            Self::MealPlan => "meal plan",
            Self::GroceryList => "grocery list",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Something a member asks the workflow to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApprovalAction {
    Submit,
    Approve,
    Reject,
    Regenerate,
}

impl ApprovalAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Submit => "submit",
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::Regenerate => "regenerate",
        }
    }

    /// Whether only a parent may perform this action.
    pub fn requires_parent(self) -> bool {
        matches!(self, Self::Approve | Self::Reject)
    }
}

impl fmt::Display for ApprovalAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The approval state machine.
pub struct ApprovalStateMachine;

impl ApprovalStateMachine {
    /// Whether `from -> to` is an edge of the graph.
    pub fn is_valid_transition(from: ApprovalStatus, to: ApprovalStatus) -> bool {
        use ApprovalStatus::*;
        matches!(
            (from, to),
            (Draft, PendingApproval)
                | (PendingApproval, Approved)
                | (PendingApproval, Rejected)
                | (Rejected, Draft)
        )
    }

    /// Status an entity moves to when `action` is applied in `from`, or
    /// `None` if the action is not allowed there. Regenerating a draft
    /// rewrites it in place and keeps it a draft.
    pub fn target(from: ApprovalStatus, action: ApprovalAction) -> Option<ApprovalStatus> {
        use ApprovalStatus::*;
        match (from, action) {
            (Draft, ApprovalAction::Submit) => Some(PendingApproval),
            (PendingApproval, ApprovalAction::Approve) => Some(Approved),
            (PendingApproval, ApprovalAction::Reject) => Some(Rejected),
            (Draft | Rejected, ApprovalAction::Regenerate) => Some(Draft),
            _ => None,
        }
    }

    /// Like [`Self::target`] but as an error naming the entity.
    pub fn check(
        kind: EntityKind,
        id: Uuid,
        from: ApprovalStatus,
        action: ApprovalAction,
    ) -> Result<ApprovalStatus> {
        Self::target(from, action).ok_or(LarderError::InvalidTransition {
            entity: kind.as_str(),
            id,
            status: from,
            action: action.as_str(),
        })
    }

    /// Status a freshly created entity starts in. Kids' recipes, plans and
    /// lists go straight to a parent; parents' recipes need no approval.
    pub fn initial_status(kind: EntityKind, creator: MemberRole) -> ApprovalStatus {
        match (kind, creator) {
            (EntityKind::Recipe, MemberRole::Parent) => ApprovalStatus::Approved,
            (_, MemberRole::Kid) => ApprovalStatus::PendingApproval,
            (_, MemberRole::Parent) => ApprovalStatus::Draft,
        }
    }

    /// Move an entity between two non-approved statuses with an optimistic
    /// lock on `from`.
    ///
    /// Approval itself goes through [`Self::approve`], which also
    /// supersedes the previous approval and records the approver.
    pub async fn transition(
        pool: &PgPool,
        kind: EntityKind,
        id: Uuid,
        from: ApprovalStatus,
        to: ApprovalStatus,
    ) -> Result<()> {
        if !Self::is_valid_transition(from, to) || to == ApprovalStatus::Approved {
            return Err(LarderError::validation(format!(
                "invalid state transition: {from} -> {to} for {kind} {id}"
            )));
        }

        let rows = match kind {
            EntityKind::Recipe => {
                recipes::transition_recipe_status(pool, id, from, to, None, None).await?
            }
            EntityKind::MealPlan => meal_plans::transition_plan_status(pool, id, from, to).await?,
            EntityKind::GroceryList => {
                grocery_lists::transition_list_status(pool, id, from, to).await?
            }
        };

        if rows == 0 {
            return Err(Self::lock_failure(pool, kind, id, from).await);
        }
        tracing::info!(entity = %kind, %id, %from, %to, "status changed");
        Ok(())
    }

    /// Approve a pending entity on behalf of a parent.
    pub async fn approve(
        pool: &PgPool,
        capability: &ParentCapability,
        kind: EntityKind,
        id: Uuid,
    ) -> Result<()> {
        let now = Utc::now();
        let by = capability.member_id();
        let applied = match kind {
            EntityKind::Recipe => {
                recipes::transition_recipe_status(
                    pool,
                    id,
                    ApprovalStatus::PendingApproval,
                    ApprovalStatus::Approved,
                    Some(by),
                    Some(now),
                )
                .await?
                    > 0
            }
            EntityKind::MealPlan => match meal_plans::approve_plan(pool, id, by, now).await? {
                PlanApproval::Approved(_) => true,
                PlanApproval::NotPending => false,
                PlanApproval::UnusableRecipes(names) => {
                    return Err(LarderError::validation(format!(
                        "meal plan {id} uses recipes that are no longer approved: {}; regenerate it",
                        names.join(", ")
                    )));
                }
            },
            EntityKind::GroceryList => {
                grocery_lists::approve_list(pool, id, by, now).await?.is_some()
            }
        };

        if !applied {
            return Err(Self::lock_failure(pool, kind, id, ApprovalStatus::PendingApproval).await);
        }
        tracing::info!(entity = %kind, %id, approved_by = %by, "approved");
        Ok(())
    }

    /// Explain why an optimistic update touched no rows.
    async fn lock_failure(
        pool: &PgPool,
        kind: EntityKind,
        id: Uuid,
        expected: ApprovalStatus,
    ) -> LarderError {
        match current_status(pool, kind, id).await {
            Ok(None) => LarderError::not_found(kind.as_str(), id),
            Ok(Some(actual)) => LarderError::conflict(
                format!("{kind} {id}"),
                format!("status is {actual}, expected {expected}"),
            ),
            Err(e) => e,
        }
    }
}

/// Fetch a recipe or fail with [`LarderError::NotFound`].
pub async fn load_recipe(pool: &PgPool, id: Uuid) -> Result<Recipe> {
    recipes::get_recipe(pool, id)
        .await?
        .ok_or_else(|| LarderError::not_found("recipe", id))
}

/// Fetch a meal plan or fail with [`LarderError::NotFound`].
pub async fn load_plan(pool: &PgPool, id: Uuid) -> Result<MealPlan> {
    meal_plans::get_meal_plan(pool, id)
        .await?
        .ok_or_else(|| LarderError::not_found("meal plan", id))
}

/// Fetch a grocery list or fail with [`LarderError::NotFound`].
pub async fn load_list(pool: &PgPool, id: Uuid) -> Result<GroceryList> {
    grocery_lists::get_grocery_list(pool, id)
        .await?
        .ok_or_else(|| LarderError::not_found("grocery list", id))
}

/// Current status of an entity, `None` when it does not exist.
pub async fn current_status(
    pool: &PgPool,
    kind: EntityKind,
    id: Uuid,
) -> Result<Option<ApprovalStatus>> {
    let status = match kind {
        EntityKind::Recipe => recipes::get_recipe(pool, id).await?.map(|r| r.status),
        EntityKind::MealPlan => meal_plans::get_meal_plan(pool, id).await?.map(|p| p.status),
        EntityKind::GroceryList => grocery_lists::get_grocery_list(pool, id)
            .await?
            .map(|l| l.status),
    };
    Ok(status)
}
