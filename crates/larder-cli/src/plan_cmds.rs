//! CLI handlers for `larder plan` subcommands.

use anyhow::{Context, Result, anyhow};
use chrono::{Local, NaiveDate, Weekday};

use larder_core::approval::{EntityKind, dispatch, load_plan};
use larder_core::external::DEFAULT_TIMEOUT;
use larder_core::feedback::{summary_notification, weekly_feedback};
use larder_core::notify::{approval_prompt, notify_family, notify_parents, rating_prompt};
use larder_core::planner::service::{generate_plan, plan_summary, swap_day};
use larder_core::{Actor, IsoWeek};
use larder_db::models::{ApprovalStatus, MealPlan};
use larder_db::queries::meal_plans;

use crate::PlanCommands;
use crate::adapters::StdoutNotifier;
use crate::session::{Session, parse_id};

// -----------------------------------------------------------------------
// Public entry point
// -----------------------------------------------------------------------

pub async fn run_plan_command(command: PlanCommands, session: &Session) -> Result<()> {
    match command {
        PlanCommands::Generate { week } => cmd_generate(session, week.as_deref()).await,
        PlanCommands::Show { plan_id: None } => cmd_list(session).await,
        PlanCommands::Show {
            plan_id: Some(plan_id),
        } => cmd_show(session, &plan_id).await,
        PlanCommands::Submit { plan_id } => {
            let actor = session.actor().await?;
            let id = parse_id("plan", &plan_id)?;
            let plan = dispatch::submit_plan(&session.pool, &actor, id).await?;
            println!("Plan for {} submitted for approval.", plan.week);
            notify_pending(session, &actor, &plan).await
        }
        PlanCommands::Approve { plan_id } => {
            let actor = session.actor().await?;
            let cap = actor.parent_capability("approve meal plans")?;
            let id = parse_id("plan", &plan_id)?;
            let plan = dispatch::approve_plan(&session.pool, &cap, id).await?;
            println!("Plan for {} approved.", plan.week);
            println!();
            println!("Next: `larder grocery generate {}`", plan.id);
            Ok(())
        }
        PlanCommands::Reject { plan_id } => {
            let actor = session.actor().await?;
            let cap = actor.parent_capability("reject meal plans")?;
            let id = parse_id("plan", &plan_id)?;
            let plan = dispatch::reject_plan(&session.pool, &cap, id).await?;
            println!("Plan for {} rejected. Regenerate it to get a new draft.", plan.week);
            Ok(())
        }
        PlanCommands::Swap { plan_id, day } => {
            let actor = session.actor().await?;
            let id = parse_id("plan", &plan_id)?;
            let weekday: Weekday = day
                .trim()
                .parse()
                .map_err(|_| anyhow!("invalid day: {day:?} (expected e.g. wed)"))?;
            let plan = swap_day(&session.pool, &session.catalog, &actor, id, weekday).await?;
            if let Some(entry) = plan.days.iter().find(|d| d.weekday == weekday) {
                println!("{weekday} is now {}.", entry.recipe_title);
            }
            Ok(())
        }
        PlanCommands::Summary { plan_id } => {
            let actor = session.actor().await?;
            let id = parse_id("plan", &plan_id)?;
            let summary = plan_summary(&session.pool, &session.catalog, &actor, id).await?;
            print!("{summary}");
            Ok(())
        }
        PlanCommands::RatePrompt { date } => cmd_rate_prompt(session, date.as_deref()).await,
        PlanCommands::Feedback { week } => cmd_feedback(session, week.as_deref()).await,
    }
}

// -----------------------------------------------------------------------
// larder plan generate
// -----------------------------------------------------------------------

async fn cmd_generate(session: &Session, week: Option<&str>) -> Result<()> {
    let actor = session.actor().await?;
    let week: IsoWeek = match week {
        Some(w) => w.parse()?,
        None => IsoWeek::containing(Local::now().date_naive()).next(),
    };

    let generated = generate_plan(&session.pool, &session.catalog, &actor, week).await?;
    let plan = &generated.plan;
    let verb = if generated.replaced { "regenerated" } else { "generated" };
    println!("Plan {verb}: {} ({})", plan.id, plan.status);
    println!();

    let summary = plan_summary(&session.pool, &session.catalog, &actor, plan.id).await?;
    print!("{summary}");

    let health = &generated.outcome.health;
    if !health.proteins_met || !health.vegetables_met {
        println!();
        println!(
            "warning: health targets not met ({} proteins, {} vegetable days)",
            health.distinct_proteins, health.vegetable_days
        );
    }
    if !generated.outcome.relaxed_days.is_empty() {
        println!(
            "note: * marks days filled by relaxing the repeat or variety rules; add more recipes for a stricter plan"
        );
    }

    notify_pending(session, &actor, plan).await
}

/// Ask the parents to review a plan that is waiting for them.
async fn notify_pending(session: &Session, actor: &Actor, plan: &MealPlan) -> Result<()> {
    if plan.status != ApprovalStatus::PendingApproval {
        return Ok(());
    }
    let summary = plan_summary(&session.pool, &session.catalog, actor, plan.id).await?;
    let text = format!("{} wants the family to eat this week:\n{summary}", actor.display_name);
    let prompt = approval_prompt(EntityKind::MealPlan, plan.id, &text);
    let report = notify_parents(
        &session.pool,
        &StdoutNotifier,
        actor.family_id,
        &prompt,
        DEFAULT_TIMEOUT,
    )
    .await?;
    if !report.all_delivered() {
        eprintln!("warning: {} parent(s) could not be notified", report.failed.len());
    }
    Ok(())
}

// -----------------------------------------------------------------------
// larder plan show
// -----------------------------------------------------------------------

async fn cmd_list(session: &Session) -> Result<()> {
    let family = session.family().await?;
    let plans = meal_plans::list_plans(&session.pool, family.id).await?;
    if plans.is_empty() {
        println!("No plans found. Use `larder plan generate` to create one.");
        return Ok(());
    }

    println!("{:<36}  {:<8}  {:<16}  {:<10}", "ID", "WEEK", "STATUS", "CREATED");
    for plan in &plans {
        let mut status = plan.status.to_string();
        if plan.superseded_at.is_some() {
            status = "superseded".into();
        }
        println!(
            "{:<36}  {:<8}  {:<16}  {:<10}",
            plan.id,
            plan.week,
            status,
            plan.created_at.format("%Y-%m-%d"),
        );
    }
    Ok(())
}

async fn cmd_show(session: &Session, plan_id: &str) -> Result<()> {
    let id = parse_id("plan", plan_id)?;
    let plan = load_plan(&session.pool, id)
        .await
        .with_context(|| format!("failed to load plan {id}"))?;
    let family = session.family().await?;
    if plan.family_id != family.id {
        anyhow::bail!("plan {id} belongs to another family");
    }

    println!("Plan: {}", plan.id);
    println!("  Week:     {} (from {})", plan.week, plan.week_start);
    println!("  Status:   {}", plan.status);
    if let Some(at) = plan.approved_at {
        println!("  Approved: {}", at.format("%Y-%m-%d %H:%M"));
    }
    if let Some(at) = plan.superseded_at {
        println!("  Replaced: {}", at.format("%Y-%m-%d %H:%M"));
    }
    println!();
    for day in plan.days.iter() {
        let relaxed = if day.relaxed.is_empty() {
            String::new()
        } else {
            let names: Vec<String> = day.relaxed.iter().map(ToString::to_string).collect();
            format!("  (relaxed: {})", names.join(", "))
        };
        println!(
            "  {} {}  {}{relaxed}",
            day.weekday,
            day.date.format("%b %d"),
            day.recipe_title
        );
    }
    Ok(())
}

// -----------------------------------------------------------------------
// larder plan rate-prompt / feedback
// -----------------------------------------------------------------------

async fn cmd_rate_prompt(session: &Session, date: Option<&str>) -> Result<()> {
    let family = session.family().await?;
    let date = match date {
        Some(d) => NaiveDate::parse_from_str(d.trim(), "%Y-%m-%d")
            .with_context(|| format!("invalid date: {d:?} (expected YYYY-MM-DD)"))?,
        None => Local::now().date_naive(),
    };
    let week = IsoWeek::containing(date);

    let Some(plan) =
        meal_plans::get_current_approved_plan(&session.pool, family.id, &week.to_string()).await?
    else {
        println!("No approved plan for {week}.");
        return Ok(());
    };
    let Some(prompt) = rating_prompt(&plan, date) else {
        println!("No dinner planned for {date}.");
        return Ok(());
    };

    let report = notify_family(
        &session.pool,
        &StdoutNotifier,
        family.id,
        &prompt,
        DEFAULT_TIMEOUT,
    )
    .await?;
    if !report.all_delivered() {
        eprintln!("warning: {} member(s) could not be notified", report.failed.len());
    }
    Ok(())
}

async fn cmd_feedback(session: &Session, week: Option<&str>) -> Result<()> {
    let family = session.family().await?;
    let week: IsoWeek = match week {
        Some(w) => w.parse()?,
        None => IsoWeek::containing(Local::now().date_naive()),
    };

    let feedback = weekly_feedback(&session.pool, family.id, week).await?;
    let report = notify_family(
        &session.pool,
        &StdoutNotifier,
        family.id,
        &summary_notification(&feedback),
        DEFAULT_TIMEOUT,
    )
    .await?;
    if !report.all_delivered() {
        eprintln!("warning: {} member(s) could not be notified", report.failed.len());
    }
    Ok(())
}
