mod adapters;
mod config;
mod family_cmds;
mod grocery_cmds;
mod plan_cmds;
mod recipe_cmds;
mod session;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use larder_core::LarderError;
use larder_db::pool;

use config::{LarderConfig, Overrides};
use session::Session;

#[derive(Parser)]
#[command(name = "larder", about = "Family meal plans, grocery lists and parent approval")]
struct Cli {
    /// Database URL (overrides LARDER_DATABASE_URL env var)
    #[arg(long, global = true)]
    database_url: Option<String>,

    /// Catalog file with stores, categories and seasons (overrides LARDER_CATALOG)
    #[arg(long, global = true)]
    catalog: Option<String>,

    /// Family name (overrides LARDER_FAMILY)
    #[arg(long, global = true)]
    family: Option<String>,

    /// Act as this family member (overrides LARDER_MEMBER)
    #[arg(long = "as", global = true, value_name = "MEMBER")]
    member: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a larder config file (no database required)
    Init {
        /// PostgreSQL connection URL
        #[arg(long, default_value = "postgresql://localhost:5432/larder")]
        db_url: String,
        /// Catalog file to record in the config
        #[arg(long)]
        catalog_path: Option<String>,
        /// Default family name
        #[arg(long)]
        default_family: Option<String>,
        /// Default acting member
        #[arg(long)]
        default_member: Option<String>,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Initialize the larder database (requires config file or env vars)
    DbInit,
    /// Print shell completions
    Completions {
        shell: Shell,
    },
    /// Family management
    Family {
        #[command(subcommand)]
        command: FamilyCommands,
    },
    /// Family member management
    Member {
        #[command(subcommand)]
        command: MemberCommands,
    },
    /// Recipe management
    Recipe {
        #[command(subcommand)]
        command: RecipeCommands,
    },
    /// Rate a recipe: stars for adults, a reaction for kids
    Rate {
        /// Recipe ID
        recipe_id: String,
        /// 1-5 stars (adults)
        #[arg(long, conflicts_with = "reaction")]
        stars: Option<u8>,
        /// yummy, okay or yucky (kids)
        #[arg(long)]
        reaction: Option<String>,
        /// Free-text feedback
        #[arg(long)]
        feedback: Option<String>,
    },
    /// Weekly meal plans
    Plan {
        #[command(subcommand)]
        command: PlanCommands,
    },
    /// Grocery lists
    Grocery {
        #[command(subcommand)]
        command: GroceryCommands,
    },
}

#[derive(Subcommand)]
pub enum FamilyCommands {
    /// Create a family
    Create {
        name: String,
    },
    /// List families
    List,
}

#[derive(Subcommand)]
pub enum MemberCommands {
    /// Add a member to the family (the first parent needs no --as)
    Add {
        /// Display name
        name: String,
        /// parent or kid
        #[arg(long)]
        role: String,
        /// Preference weight (default: 1.0 for parents, 1.5 for kids)
        #[arg(long)]
        weight: Option<f64>,
        /// Chat user ID for notifications
        #[arg(long)]
        chat_id: Option<String>,
    },
    /// List the family's members
    List,
}

#[derive(Subcommand)]
pub enum RecipeCommands {
    /// Add a recipe from a TOML file
    Add {
        /// Path to the recipe TOML file
        file: String,
        /// Where the recipe came from (URL or book)
        #[arg(long)]
        source: Option<String>,
        /// Save even when a recipe with the same title exists
        #[arg(long)]
        new_version: bool,
    },
    /// List recipes with their scores
    List {
        /// Include archived recipes
        #[arg(long)]
        all: bool,
    },
    /// List recipes waiting for a parent
    Pending,
    /// Show one recipe
    Show {
        recipe_id: String,
    },
    /// Search recipe titles
    Search {
        query: String,
    },
    /// Approve a pending recipe (parents only)
    Approve {
        recipe_id: String,
    },
    /// Reject a pending recipe (parents only)
    Reject {
        recipe_id: String,
    },
    /// Archive a recipe so it is never planned again (parents only)
    Archive {
        recipe_id: String,
    },
    /// Mark a recipe as a family favorite (parents only)
    Favorite {
        recipe_id: String,
        /// Remove the favorite mark instead
        #[arg(long)]
        off: bool,
    },
}

#[derive(Subcommand)]
pub enum PlanCommands {
    /// Generate or regenerate the plan for a week
    Generate {
        /// ISO week, e.g. 2026-W43 (default: next week)
        #[arg(long)]
        week: Option<String>,
    },
    /// Show plan details (or list all plans)
    Show {
        /// Plan ID to show (omit to list all)
        plan_id: Option<String>,
    },
    /// Submit a draft plan for approval
    Submit {
        plan_id: String,
    },
    /// Approve a pending plan (parents only)
    Approve {
        plan_id: String,
    },
    /// Reject a pending plan (parents only)
    Reject {
        plan_id: String,
    },
    /// Pick a different recipe for one day of a draft plan
    Swap {
        plan_id: String,
        /// Day to change, e.g. wed
        day: String,
    },
    /// Print the plan summary
    Summary {
        plan_id: String,
    },
    /// Ask the family to rate the dinner planned for a day
    RatePrompt {
        /// Date of the dinner, e.g. 2026-10-19 (default: today)
        #[arg(long)]
        date: Option<String>,
    },
    /// Send the week's ratings, adults and kids averaged separately
    Feedback {
        /// ISO week, e.g. 2026-W43 (default: this week)
        #[arg(long)]
        week: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum GroceryCommands {
    /// Build the grocery list for an approved plan
    Generate {
        plan_id: String,
    },
    /// Show a list grouped by store (or list all lists)
    Show {
        /// List ID to show (omit to list all)
        list_id: Option<String>,
    },
    /// Submit a draft list for approval
    Submit {
        list_id: String,
    },
    /// Approve a pending list (parents only)
    Approve {
        list_id: String,
    },
    /// Reject a pending list (parents only)
    Reject {
        list_id: String,
    },
    /// Move an item of a draft list to another store
    Move {
        list_id: String,
        /// Item name
        item: String,
        /// Store ID; omit for any store
        #[arg(long)]
        store: Option<String>,
    },
    /// Export an approved list to a JSON task file
    Sync {
        list_id: String,
        /// Output file
        #[arg(long, default_value = "groceries.json")]
        out: String,
    },
}

/// Execute the `larder init` command: write config file.
fn cmd_init(
    db_url: &str,
    catalog_path: Option<String>,
    family: Option<String>,
    member: Option<String>,
    force: bool,
) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let cfg = config::ConfigFile {
        database: config::DatabaseSection {
            url: db_url.to_string(),
        },
        catalog: config::CatalogSection {
            path: catalog_path.map(Into::into),
        },
        household: config::HouseholdSection { family, member },
    };

    config::save_config(&cfg)?;

    println!("Config written to {}", path.display());
    println!("  database.url = {db_url}");
    if let Some(catalog) = &cfg.catalog.path {
        println!("  catalog.path = {}", catalog.display());
    }
    println!();
    println!("Next: run `larder db-init` to create and migrate the database.");

    Ok(())
}

/// Execute the `larder db-init` command: create database and run migrations.
async fn cmd_db_init(config: &LarderConfig) -> anyhow::Result<()> {
    println!("Initializing larder database...");

    pool::ensure_database_exists(&config.db_config).await?;
    let db_pool = pool::create_pool(&config.db_config).await?;
    pool::run_migrations(&db_pool).await?;

    let counts = pool::table_counts(&db_pool).await?;
    println!("Database ready. Tables:");
    for (table, count) in &counts {
        println!("  {table}: {count} rows");
    }

    db_pool.close().await;

    println!("larder db-init complete.");
    Ok(())
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = LarderConfig::resolve(Overrides {
        database_url: cli.database_url.as_deref(),
        catalog: cli.catalog.as_deref(),
        family: cli.family.as_deref(),
        member: cli.member.as_deref(),
    });

    match cli.command {
        Commands::Init {
            db_url,
            catalog_path,
            default_family,
            default_member,
            force,
        } => cmd_init(&db_url, catalog_path, default_family, default_member, force),
        Commands::DbInit => cmd_db_init(&config).await,
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "larder", &mut std::io::stdout());
            Ok(())
        }
        Commands::Family { command } => {
            let session = Session::open(&config).await?;
            let result = family_cmds::run_family_command(command, &session).await;
            session.close().await;
            result
        }
        Commands::Member { command } => {
            let session = Session::open(&config).await?;
            let result = family_cmds::run_member_command(command, &session).await;
            session.close().await;
            result
        }
        Commands::Recipe { command } => {
            let session = Session::open(&config).await?;
            let result = recipe_cmds::run_recipe_command(command, &session).await;
            session.close().await;
            result
        }
        Commands::Rate {
            recipe_id,
            stars,
            reaction,
            feedback,
        } => {
            let session = Session::open(&config).await?;
            let result = recipe_cmds::cmd_rate(
                &session,
                &recipe_id,
                stars,
                reaction.as_deref(),
                feedback.as_deref(),
            )
            .await;
            session.close().await;
            result
        }
        Commands::Plan { command } => {
            let session = Session::open(&config).await?;
            let result = plan_cmds::run_plan_command(command, &session).await;
            session.close().await;
            result
        }
        Commands::Grocery { command } => {
            let session = Session::open(&config).await?;
            let result = grocery_cmds::run_grocery_command(command, &session).await;
            session.close().await;
            result
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("error: {e:#}");
        if let Some(hint) = e.downcast_ref::<LarderError>().and_then(LarderError::retry_hint) {
            eprintln!("hint: {hint}");
        }
        std::process::exit(1);
    }
}
