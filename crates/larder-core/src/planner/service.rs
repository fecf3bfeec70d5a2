//! Plan service layer.
//!
//! Loads the generator's inputs from storage, runs it under the week's
//! generation lease and writes the result according to the approval rules:
//! a draft is rewritten in place, a rejected plan returns to draft, a
//! pending plan must be rejected first and an approved plan is never
//! touched (the new draft sits beside it until approved).

use std::collections::HashMap;

use chrono::{Utc, Weekday};
use sqlx::PgPool;
use uuid::Uuid;

use larder_db::models::{ApprovalStatus, MealPlan, PlannedDay, Recipe};
use larder_db::queries::{families, meal_plans, ratings, recipes};

use super::{
    PlanContext, PlanOutcome, PlanSummary, UsageStats, generate, reselect_day, summarize,
    usage_from_history,
};
use crate::actor::Actor;
use crate::approval::{ApprovalAction, ApprovalStateMachine, EntityKind, load_plan};
use crate::catalog::Catalog;
use crate::error::{LarderError, Result};
use crate::lock::{self, DEFAULT_LEASE_TTL};
use crate::preference::{RecipeScore, score_recipes};
use crate::seasonal::SeasonalCalendar;
use crate::week::IsoWeek;

/// Result of a generation request.
#[derive(Debug, Clone)]
pub struct GeneratedPlan {
    pub plan: MealPlan,
    pub outcome: PlanOutcome,
    /// Whether an existing draft or rejected plan was rewritten rather than
    /// a new row inserted.
    pub replaced: bool,
}

/// Everything the generator reads, loaded once per request.
struct PlanInputs {
    recipes: Vec<Recipe>,
    scores: HashMap<Uuid, RecipeScore>,
    usage: HashMap<Uuid, UsageStats>,
    peak_produce: Vec<String>,
}

impl PlanInputs {
    fn context<'a>(&'a self, week: IsoWeek, catalog: &'a Catalog) -> PlanContext<'a> {
        PlanContext {
            week,
            recipes: &self.recipes,
            scores: &self.scores,
            usage: &self.usage,
            peak_produce: &self.peak_produce,
            neutral_prior: catalog.preferences.neutral_prior,
            config: &catalog.planner,
        }
    }
}

async fn load_inputs(
    pool: &PgPool,
    catalog: &Catalog,
    family_id: Uuid,
    week: IsoWeek,
) -> Result<PlanInputs> {
    let recipes = recipes::list_recipes(pool, family_id, false).await?;
    let members = families::list_members(pool, family_id).await?;
    let family_ratings = ratings::list_ratings_for_family(pool, family_id).await?;

    let ids: Vec<Uuid> = recipes.iter().map(|r| r.id).collect();
    let scores = score_recipes(
        &ids,
        &family_ratings,
        &members,
        &catalog.preferences,
        Utc::now(),
    );

    let history_start = week.weeks_before(catalog.planner.history_weeks).monday();
    let history =
        meal_plans::list_approved_plans_between(pool, family_id, history_start, week.monday())
            .await?;
    let usage = usage_from_history(&history, week, &catalog.planner);
    let peak_produce = SeasonalCalendar::new(catalog).peak_produce(week.monday());

    Ok(PlanInputs {
        recipes,
        scores,
        usage,
        peak_produce,
    })
}

/// Generate (or regenerate) the plan for `week` of the actor's family.
///
/// Fails with:
/// - `Conflict` while another generation for the week holds the lease, or
///   when the open plan is pending approval;
/// - `InsufficientData` when no recipe is eligible, leaving storage as it
///   was.
pub async fn generate_plan(
    pool: &PgPool,
    catalog: &Catalog,
    actor: &Actor,
    week: IsoWeek,
) -> Result<GeneratedPlan> {
    let week_key = week.to_string();
    let key = lock::plan_key(actor.family_id, &week_key);
    lock::with_lease(pool, &key, DEFAULT_LEASE_TTL, || async {
        let open = meal_plans::get_open_plan(pool, actor.family_id, &week_key).await?;
        if let Some(plan) = &open {
            if plan.status == ApprovalStatus::PendingApproval {
                return Err(LarderError::conflict(
                    &key,
                    format!(
                        "meal plan {} is awaiting approval; reject it before regenerating",
                        plan.id
                    ),
                ));
            }
        }

        let inputs = load_inputs(pool, catalog, actor.family_id, week).await?;
        let outcome = generate(&inputs.context(week, catalog))?;
        let status = ApprovalStateMachine::initial_status(EntityKind::MealPlan, actor.role);

        let (plan, replaced) = match open {
            None => {
                let plan = meal_plans::insert_meal_plan(
                    pool,
                    &meal_plans::NewMealPlan {
                        family_id: actor.family_id,
                        week: &week_key,
                        week_start: week.monday(),
                        days: &outcome.days,
                        status,
                        created_by: actor.member_id,
                    },
                )
                .await?;
                (plan, false)
            }
            Some(existing) => {
                let plan = rewrite_open_plan(pool, &key, &existing, &outcome.days, status).await?;
                (plan, true)
            }
        };

        tracing::info!(
            family_id = %actor.family_id,
            week = %week_key,
            plan_id = %plan.id,
            status = %plan.status,
            replaced,
            relaxed_days = outcome.relaxed_days.len(),
            "meal plan generated"
        );

        Ok(GeneratedPlan {
            plan,
            outcome,
            replaced,
        })
    })
    .await
}

/// Rewrite an open plan's days through the approval graph: a rejected plan
/// first returns to draft, the days are written while it is a draft, and a
/// kid's plan is then submitted.
async fn rewrite_open_plan(
    pool: &PgPool,
    key: &str,
    existing: &MealPlan,
    days: &[PlannedDay],
    status: ApprovalStatus,
) -> Result<MealPlan> {
    let kind = EntityKind::MealPlan;
    let draft = ApprovalStateMachine::check(
        kind,
        existing.id,
        existing.status,
        ApprovalAction::Regenerate,
    )?;
    if existing.status != draft {
        ApprovalStateMachine::transition(pool, kind, existing.id, existing.status, draft).await?;
    }

    let mut plan = meal_plans::replace_plan_days(pool, existing.id, draft, days, draft)
        .await?
        .ok_or_else(|| LarderError::conflict(key, "meal plan changed while regenerating"))?;

    if status == ApprovalStatus::PendingApproval {
        let pending =
            ApprovalStateMachine::check(kind, plan.id, plan.status, ApprovalAction::Submit)?;
        ApprovalStateMachine::transition(pool, kind, plan.id, plan.status, pending).await?;
        plan = load_plan(pool, plan.id).await?;
    }
    Ok(plan)
}

/// Pick a different recipe for one day of a draft plan.
pub async fn swap_day(
    pool: &PgPool,
    catalog: &Catalog,
    actor: &Actor,
    plan_id: Uuid,
    weekday: Weekday,
) -> Result<MealPlan> {
    let plan = load_plan(pool, plan_id).await?;
    actor.ensure_family(plan.family_id, "edit meal plan")?;
    let week: IsoWeek = plan
        .week
        .parse()
        .map_err(|e| LarderError::validation(format!("{e}")))?;

    let key = lock::plan_key(plan.family_id, &plan.week);
    lock::with_lease(pool, &key, DEFAULT_LEASE_TTL, || async {
        let plan = load_plan(pool, plan_id).await?;
        if plan.status != ApprovalStatus::Draft {
            return Err(LarderError::InvalidTransition {
                entity: EntityKind::MealPlan.as_str(),
                id: plan_id,
                status: plan.status,
                action: "edit",
            });
        }

        let inputs = load_inputs(pool, catalog, plan.family_id, week).await?;
        let replacement = reselect_day(&inputs.context(week, catalog), &plan.days, weekday)?;
        let days: Vec<_> = plan
            .days
            .iter()
            .map(|d| {
                if d.weekday == weekday {
                    replacement.clone()
                } else {
                    d.clone()
                }
            })
            .collect();

        let updated = meal_plans::replace_plan_days(
            pool,
            plan_id,
            ApprovalStatus::Draft,
            &days,
            ApprovalStatus::Draft,
        )
        .await?
        .ok_or_else(|| LarderError::conflict(&key, "meal plan changed while editing"))?;

        tracing::info!(
            plan_id = %plan_id,
            %weekday,
            recipe = %replacement.recipe_title,
            "meal plan day swapped"
        );
        Ok(updated)
    })
    .await
}

/// Summarize a stored plan.
pub async fn plan_summary(
    pool: &PgPool,
    catalog: &Catalog,
    actor: &Actor,
    plan_id: Uuid,
) -> Result<PlanSummary> {
    let plan = load_plan(pool, plan_id).await?;
    actor.ensure_family(plan.family_id, "view meal plan")?;

    let mut ids: Vec<Uuid> = plan.days.iter().map(|d| d.recipe_id).collect();
    ids.sort();
    ids.dedup();
    let recipes = recipes::get_recipes_by_ids(pool, &ids).await?;
    let peak = SeasonalCalendar::new(catalog).peak_produce(plan.week_start);

    Ok(summarize(&plan.week, &plan.days, &recipes, &peak, &catalog.planner))
}
