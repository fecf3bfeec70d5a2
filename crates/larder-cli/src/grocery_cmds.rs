//! CLI handlers for `larder grocery` subcommands.

use anyhow::Result;

use larder_core::Actor;
use larder_core::approval::{EntityKind, dispatch, load_list, load_plan};
use larder_core::external::DEFAULT_TIMEOUT;
use larder_core::grocery::render::render_list;
use larder_core::grocery::service::{ListChange, generate_grocery_list, move_item};
use larder_core::notify::{approval_prompt, notify_parents};
use larder_core::sync::sync_grocery_list;
use larder_db::models::{ApprovalStatus, GroceryList};
use larder_db::queries::grocery_lists;

use crate::GroceryCommands;
use crate::adapters::{JsonFileSync, StdoutNotifier};
use crate::session::{Session, parse_id};

// -----------------------------------------------------------------------
// Public entry point
// -----------------------------------------------------------------------

pub async fn run_grocery_command(command: GroceryCommands, session: &Session) -> Result<()> {
    match command {
        GroceryCommands::Generate { plan_id } => cmd_generate(session, &plan_id).await,
        GroceryCommands::Show { list_id: None } => cmd_list(session).await,
        GroceryCommands::Show {
            list_id: Some(list_id),
        } => cmd_show(session, &list_id).await,
        GroceryCommands::Submit { list_id } => {
            let actor = session.actor().await?;
            let id = parse_id("grocery list", &list_id)?;
            let list = dispatch::submit_grocery_list(&session.pool, &actor, id).await?;
            println!("Grocery list {} submitted for approval.", list.id);
            notify_pending(session, &actor, &list).await
        }
        GroceryCommands::Approve { list_id } => {
            let actor = session.actor().await?;
            let cap = actor.parent_capability("approve grocery lists")?;
            let id = parse_id("grocery list", &list_id)?;
            let list = dispatch::approve_grocery_list(&session.pool, &cap, id).await?;
            println!("Grocery list {} approved.", list.id);
            println!();
            println!("Next: `larder grocery sync {}`", list.id);
            Ok(())
        }
        GroceryCommands::Reject { list_id } => {
            let actor = session.actor().await?;
            let cap = actor.parent_capability("reject grocery lists")?;
            let id = parse_id("grocery list", &list_id)?;
            let list = dispatch::reject_grocery_list(&session.pool, &cap, id).await?;
            println!("Grocery list {} rejected.", list.id);
            Ok(())
        }
        GroceryCommands::Move {
            list_id,
            item,
            store,
        } => {
            let actor = session.actor().await?;
            let id = parse_id("grocery list", &list_id)?;
            move_item(
                &session.pool,
                &session.catalog,
                &actor,
                id,
                &item,
                store.as_deref(),
            )
            .await?;
            println!(
                "Moved {item} to {}.",
                session.catalog.store_label(store.as_deref())
            );
            Ok(())
        }
        GroceryCommands::Sync { list_id, out } => {
            let actor = session.actor().await?;
            let id = parse_id("grocery list", &list_id)?;
            let sync = JsonFileSync { path: out.into() };
            let receipt = sync_grocery_list(
                &session.pool,
                &session.catalog,
                &sync,
                &actor,
                id,
                DEFAULT_TIMEOUT,
            )
            .await?;
            println!("Synced {} items.", receipt.tasks_created);
            if let Some(location) = receipt.location {
                println!("  Written to {location}");
            }
            Ok(())
        }
    }
}

// -----------------------------------------------------------------------
// larder grocery generate <plan-id>
// -----------------------------------------------------------------------

async fn cmd_generate(session: &Session, plan_id: &str) -> Result<()> {
    let actor = session.actor().await?;
    let id = parse_id("plan", plan_id)?;
    let generated = generate_grocery_list(&session.pool, &session.catalog, &actor, id).await?;
    let list = &generated.list;

    match generated.change {
        ListChange::Created => println!("Grocery list created: {} ({})", list.id, list.status),
        ListChange::Refreshed => println!("Grocery list updated: {} ({})", list.id, list.status),
        ListChange::Unchanged => println!("Grocery list unchanged: {} ({})", list.id, list.status),
    }
    println!();
    print!("{}", render_list("Shopping list", &list.items, &session.catalog));

    notify_pending(session, &actor, list).await
}

/// Ask the parents to review a list that is waiting for them.
async fn notify_pending(session: &Session, actor: &Actor, list: &GroceryList) -> Result<()> {
    if list.status != ApprovalStatus::PendingApproval {
        return Ok(());
    }
    let rendered = render_list("Shopping list", &list.items, &session.catalog);
    let text = format!("{} put together a shopping list:\n{rendered}", actor.display_name);
    let prompt = approval_prompt(EntityKind::GroceryList, list.id, &text);
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
// larder grocery show
// -----------------------------------------------------------------------

async fn cmd_list(session: &Session) -> Result<()> {
    let family = session.family().await?;
    let lists = grocery_lists::list_grocery_lists(&session.pool, family.id).await?;
    if lists.is_empty() {
        println!("No grocery lists found. Use `larder grocery generate <plan-id>` to build one.");
        return Ok(());
    }

    println!("{:<36}  {:<36}  {:<16}  {:>5}  {:<6}", "ID", "PLAN", "STATUS", "ITEMS", "SYNCED");
    for list in &lists {
        let status = if list.superseded_at.is_some() {
            "superseded".to_owned()
        } else {
            list.status.to_string()
        };
        let synced = if list.synced_at.is_some() { "yes" } else { "no" };
        println!(
            "{:<36}  {:<36}  {:<16}  {:>5}  {:<6}",
            list.id,
            list.plan_id,
            status,
            list.items.len(),
            synced,
        );
    }
    Ok(())
}

async fn cmd_show(session: &Session, list_id: &str) -> Result<()> {
    let id = parse_id("grocery list", list_id)?;
    let list = load_list(&session.pool, id).await?;
    let family = session.family().await?;
    if list.family_id != family.id {
        anyhow::bail!("grocery list {id} belongs to another family");
    }
    let plan = load_plan(&session.pool, list.plan_id).await?;

    let title = format!("Shopping list for {} [{}]", plan.week, list.status);
    print!("{}", render_list(&title, &list.items, &session.catalog));
    if let Some(at) = list.synced_at {
        println!();
        println!("Synced {}", at.format("%Y-%m-%d %H:%M"));
    }
    Ok(())
}
