//! CLI handlers for `larder recipe` subcommands and `larder rate`.

use anyhow::{Context, Result, anyhow, bail};
use chrono::Utc;

use larder_core::approval::{EntityKind, dispatch};
use larder_core::external::DEFAULT_TIMEOUT;
use larder_core::ingest::{IngestRequest, RecipeIngestor, TomlRecipeIngestor};
use larder_core::notify::{approval_prompt, notify_parents};
use larder_core::preference::score_recipes;
use larder_core::recipes::{self, DuplicatePolicy, RatingInput};
use larder_db::models::{ApprovalStatus, KidReaction, Recipe};
use larder_db::queries::{families, ratings, recipes as recipe_queries};

use crate::RecipeCommands;
use crate::adapters::StdoutNotifier;
use crate::session::{Session, parse_id};

// -----------------------------------------------------------------------
// Public entry point
// -----------------------------------------------------------------------

pub async fn run_recipe_command(command: RecipeCommands, session: &Session) -> Result<()> {
    match command {
        RecipeCommands::Add {
            file,
            source,
            new_version,
        } => cmd_add(session, &file, source, new_version).await,
        RecipeCommands::List { all } => cmd_list(session, all).await,
        RecipeCommands::Pending => cmd_pending(session).await,
        RecipeCommands::Show { recipe_id } => cmd_show(session, &recipe_id).await,
        RecipeCommands::Search { query } => cmd_search(session, &query).await,
        RecipeCommands::Approve { recipe_id } => {
            let actor = session.actor().await?;
            let cap = actor.parent_capability("approve recipes")?;
            let id = parse_id("recipe", &recipe_id)?;
            let recipe = dispatch::approve_recipe(&session.pool, &cap, id).await?;
            println!("Recipe {:?} approved.", recipe.title);
            Ok(())
        }
        RecipeCommands::Reject { recipe_id } => {
            let actor = session.actor().await?;
            let cap = actor.parent_capability("reject recipes")?;
            let id = parse_id("recipe", &recipe_id)?;
            let recipe = dispatch::reject_recipe(&session.pool, &cap, id).await?;
            println!("Recipe {:?} rejected.", recipe.title);
            Ok(())
        }
        RecipeCommands::Archive { recipe_id } => {
            let actor = session.actor().await?;
            let id = parse_id("recipe", &recipe_id)?;
            let recipe = recipes::archive_recipe(&session.pool, &actor, id).await?;
            println!("Recipe {:?} archived.", recipe.title);
            Ok(())
        }
        RecipeCommands::Favorite { recipe_id, off } => {
            let actor = session.actor().await?;
            let id = parse_id("recipe", &recipe_id)?;
            let recipe = recipes::set_favorite(&session.pool, &actor, id, !off).await?;
            let state = if recipe.favorite { "is" } else { "is no longer" };
            println!("{:?} {state} a favorite.", recipe.title);
            Ok(())
        }
    }
}

// -----------------------------------------------------------------------
// larder recipe add <file>
// -----------------------------------------------------------------------

async fn cmd_add(
    session: &Session,
    file: &str,
    source: Option<String>,
    new_version: bool,
) -> Result<()> {
    let actor = session.actor().await?;
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read recipe file: {file}"))?;

    let request = IngestRequest::Text(content);
    let recipe = if source.is_none() && !new_version {
        recipes::ingest_recipe(
            &session.pool,
            &TomlRecipeIngestor,
            &actor,
            &request,
            DEFAULT_TIMEOUT,
        )
        .await?
    } else {
        let mut parsed = TomlRecipeIngestor.ingest(&request).await?;
        if source.is_some() {
            parsed.source_ref = source;
        }
        let policy = if new_version {
            DuplicatePolicy::SaveAsNewVersion
        } else {
            DuplicatePolicy::Reject
        };
        recipes::add_recipe_with(&session.pool, &actor, &parsed, policy).await?
    };

    println!("Recipe added.");
    println!();
    print_recipe_header(&recipe);

    if recipe.status == ApprovalStatus::PendingApproval {
        let prompt = approval_prompt(
            EntityKind::Recipe,
            recipe.id,
            &format!("{} suggested a new recipe: {}", actor.display_name, recipe.title),
        );
        notify_parents(
            &session.pool,
            &StdoutNotifier,
            actor.family_id,
            &prompt,
            DEFAULT_TIMEOUT,
        )
        .await?;
    }
    Ok(())
}

// -----------------------------------------------------------------------
// Listing
// -----------------------------------------------------------------------

async fn cmd_list(session: &Session, include_archived: bool) -> Result<()> {
    let family = session.family().await?;
    let all = recipe_queries::list_recipes(&session.pool, family.id, include_archived).await?;
    if all.is_empty() {
        println!("No recipes yet. Use `larder recipe add <file>` to add one.");
        return Ok(());
    }

    let members = families::list_members(&session.pool, family.id).await?;
    let family_ratings = ratings::list_ratings_for_family(&session.pool, family.id).await?;
    let ids: Vec<_> = all.iter().map(|r| r.id).collect();
    let scores = score_recipes(
        &ids,
        &family_ratings,
        &members,
        &session.catalog.preferences,
        Utc::now(),
    );

    let title_w = all.iter().map(|r| r.title.len()).max().unwrap_or(5).max(5);
    println!(
        "{:<36}  {:<title_w$}  {:<16}  {:>5}  {:>7}",
        "ID", "TITLE", "STATUS", "SCORE", "RATINGS",
    );
    for recipe in &all {
        let (score, count) = scores
            .get(&recipe.id)
            .map(|s| (s.score, s.rating_count))
            .unwrap_or((session.catalog.preferences.neutral_prior, 0));
        let mut status = recipe.status.to_string();
        if recipe.archived {
            status.push_str(" (arch)");
        }
        let star = if recipe.favorite { " *" } else { "" };
        println!(
            "{:<36}  {:<title_w$}  {:<16}  {:>5.2}  {:>7}{star}",
            recipe.id, recipe.title, status, score, count,
        );
    }
    Ok(())
}

async fn cmd_pending(session: &Session) -> Result<()> {
    let family = session.family().await?;
    let pending = recipe_queries::list_pending_recipes(&session.pool, family.id).await?;
    if pending.is_empty() {
        println!("No recipes waiting for approval.");
        return Ok(());
    }
    for recipe in &pending {
        let by = families::get_member(&session.pool, recipe.created_by)
            .await?
            .map(|m| m.display_name)
            .unwrap_or_else(|| "unknown".into());
        println!("{}  {}  (from {by})", recipe.id, recipe.title);
    }
    Ok(())
}

async fn cmd_search(session: &Session, query: &str) -> Result<()> {
    let family = session.family().await?;
    let hits = recipe_queries::search_recipes(&session.pool, family.id, query).await?;
    if hits.is_empty() {
        println!("No recipes match {query:?}.");
    }
    for recipe in &hits {
        println!("{}  {}  [{}]", recipe.id, recipe.title, recipe.status);
    }
    Ok(())
}

fn print_recipe_header(recipe: &Recipe) {
    println!("Recipe: {}", recipe.title);
    println!("  ID:           {}", recipe.id);
    println!("  Status:       {}", recipe.status);
    if let Some(protein) = &recipe.protein {
        println!("  Protein:      {protein}");
    }
    if let Some(source) = &recipe.source_ref {
        println!("  Source:       {source}");
    }
    if !recipe.tags.is_empty() {
        println!("  Tags:         {}", recipe.tags.join(", "));
    }
    println!("  Ingredients:  {}", recipe.ingredients.len());
}

async fn cmd_show(session: &Session, recipe_id: &str) -> Result<()> {
    let id = parse_id("recipe", recipe_id)?;
    let recipe = recipe_queries::get_recipe(&session.pool, id)
        .await?
        .with_context(|| format!("recipe not found: {id}"))?;
    let family = session.family().await?;
    if recipe.family_id != family.id {
        bail!("recipe {id} belongs to another family");
    }

    print_recipe_header(&recipe);
    if recipe.favorite {
        println!("  Favorite:     yes");
    }
    if recipe.archived {
        println!("  Archived:     yes");
    }
    println!();
    for ingredient in recipe.ingredients.iter() {
        let unit = if ingredient.unit.is_empty() {
            String::new()
        } else {
            format!(" {}", ingredient.unit)
        };
        println!("  - {}{unit} {}", ingredient.quantity, ingredient.name);
    }
    let prep = recipe.preparation.trim();
    if !prep.is_empty() {
        println!();
        for line in prep.lines() {
            println!("  {line}");
        }
    }

    let history = ratings::list_ratings_for_recipe(&session.pool, id).await?;
    if !history.is_empty() {
        println!();
        println!("Ratings:");
        for rating in &history {
            let what = match rating.kid_reaction {
                Some(reaction) => reaction.to_string(),
                None => format!("{} stars", rating.score),
            };
            let feedback = rating.feedback.as_deref().unwrap_or("");
            println!(
                "  {}  {what:<8} {feedback}",
                rating.created_at.format("%Y-%m-%d")
            );
        }
    }
    Ok(())
}

// -----------------------------------------------------------------------
// larder rate
// -----------------------------------------------------------------------

pub async fn cmd_rate(
    session: &Session,
    recipe_id: &str,
    stars: Option<u8>,
    reaction: Option<&str>,
    feedback: Option<&str>,
) -> Result<()> {
    let actor = session.actor().await?;
    let id = parse_id("recipe", recipe_id)?;
    let input = match (stars, reaction) {
        (Some(stars), None) => RatingInput::Stars(stars),
        (None, Some(reaction)) => {
            let reaction: KidReaction = reaction.parse().map_err(|e| anyhow!("{e}"))?;
            RatingInput::Reaction(reaction)
        }
        _ => bail!("give either --stars (adults) or --reaction (kids)"),
    };

    let rating = recipes::rate_recipe(&session.pool, &actor, id, input, feedback).await?;
    println!("Thanks, {}! Rating recorded ({}).", actor.display_name, rating.score);
    Ok(())
}
