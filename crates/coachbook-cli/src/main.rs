mod assign_cmds;
mod budget_cmds;
mod config;
mod history_cmd;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use uuid::Uuid;

use coachbook_db::pool;

use config::CoachbookConfig;

#[derive(Parser)]
#[command(name = "coachbook", about = "Coaching CRM: budget templates and generated plans")]
struct Cli {
    /// Database URL (overrides COACHBOOK_DATABASE_URL env var)
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a coachbook config file (no database required)
    Init {
        /// PostgreSQL connection URL
        #[arg(long, default_value = "postgresql://localhost:5432/coachbook")]
        db_url: String,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Initialize the coachbook database (requires config file or env vars)
    DbInit,
    /// Budget template management
    Budget {
        #[command(subcommand)]
        command: BudgetCommands,
    },
    /// Assign a budget to a subscriber and generate their plans
    Assign {
        /// Subscriber ID
        subscriber_id: String,
        /// Budget ID
        budget_id: String,
    },
    /// Remove an assignment (prints an affected-plan preview first)
    Unassign {
        /// Assignment ID
        assignment_id: String,
        /// Hard-delete the subscriber's generated plans for this budget
        /// instead of detaching them
        #[arg(long)]
        delete_plans: bool,
    },
    /// Edit a budget from a subscriber's context (forks when shared)
    Edit {
        /// Assignment ID the edit is made through
        assignment_id: String,
        /// New budget name
        #[arg(long)]
        name: Option<String>,
        /// New description
        #[arg(long)]
        description: Option<String>,
        /// New workout template ID
        #[arg(long)]
        workout_template: Option<String>,
        /// New nutrition template ID
        #[arg(long)]
        nutrition_template: Option<String>,
        /// New daily calorie target
        #[arg(long)]
        calories: Option<i32>,
        /// New daily protein target (grams)
        #[arg(long)]
        protein: Option<i32>,
        /// New daily carb target (grams)
        #[arg(long)]
        carbs: Option<i32>,
        /// New daily fat target (grams)
        #[arg(long)]
        fat: Option<i32>,
        /// New daily step goal
        #[arg(long)]
        steps_goal: Option<i32>,
        /// New step instructions
        #[arg(long)]
        steps_instructions: Option<String>,
        /// Supplement prescription, repeatable: "name[:dosage[:timing]]"
        #[arg(long = "supplement")]
        supplements: Vec<String>,
        /// New eating order
        #[arg(long)]
        eating_order: Option<String>,
        /// New eating rules
        #[arg(long)]
        eating_rules: Option<String>,
    },
    /// List a subscriber's generated plans
    Plans {
        /// Subscriber ID
        subscriber_id: String,
        /// Restrict to one kind: workout, nutrition, supplement, steps
        #[arg(long)]
        kind: Option<String>,
    },
    /// Show a subscriber's consolidated plan history
    History {
        /// Subscriber ID
        subscriber_id: String,
        /// Restrict to one kind: workout, nutrition, supplement, steps
        #[arg(long)]
        kind: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum BudgetCommands {
    /// Create a budget template
    Create {
        /// Budget name
        name: String,
        /// Owner (coach) ID
        #[arg(long)]
        owner: String,
        /// Description
        #[arg(long)]
        description: Option<String>,
        /// Workout template ID
        #[arg(long)]
        workout_template: Option<String>,
        /// Nutrition template ID
        #[arg(long)]
        nutrition_template: Option<String>,
        /// Daily calorie target
        #[arg(long)]
        calories: Option<i32>,
        /// Daily protein target (grams)
        #[arg(long)]
        protein: Option<i32>,
        /// Daily carb target (grams)
        #[arg(long)]
        carbs: Option<i32>,
        /// Daily fat target (grams)
        #[arg(long)]
        fat: Option<i32>,
        /// Daily step goal
        #[arg(long)]
        steps_goal: Option<i32>,
        /// Step instructions
        #[arg(long)]
        steps_instructions: Option<String>,
        /// Supplement prescription, repeatable: "name[:dosage[:timing]]"
        #[arg(long = "supplement")]
        supplements: Vec<String>,
        /// Eating order
        #[arg(long)]
        eating_order: Option<String>,
        /// Eating rules
        #[arg(long)]
        eating_rules: Option<String>,
    },
    /// Show one budget with its assignments
    Show {
        /// Budget ID
        budget_id: String,
    },
    /// List shared budget templates
    List,
}

/// Parse a UUID argument with a labelled error message.
pub fn parse_id(label: &str, input: &str) -> Result<Uuid> {
    Uuid::parse_str(input).with_context(|| format!("invalid {label}: {input:?}"))
}

/// Execute the `coachbook init` command: write config file.
fn cmd_init(db_url: &str, force: bool) -> Result<()> {
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
    };
    config::save_config(&cfg)?;

    println!("Config written to {}", path.display());
    println!("  database.url = {db_url}");
    println!();
    println!("Next: run `coachbook db-init` to create and migrate the database.");

    Ok(())
}

/// Execute the `coachbook db-init` command: create database and run
/// migrations.
async fn cmd_db_init(cli_db_url: Option<&str>) -> Result<()> {
    let resolved = CoachbookConfig::resolve(cli_db_url)?;

    println!("Initializing coachbook database...");

    pool::ensure_database_exists(&resolved.db_config).await?;
    let db_pool = pool::create_pool(&resolved.db_config).await?;
    pool::run_migrations(&db_pool).await?;

    let counts = pool::table_counts(&db_pool).await?;
    println!("Database ready. Tables:");
    for (table, count) in &counts {
        println!("  {table}: {count} rows");
    }

    db_pool.close().await;
    println!("coachbook db-init complete.");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { db_url, force } => {
            cmd_init(&db_url, force)?;
            return Ok(());
        }
        Commands::DbInit => {
            cmd_db_init(cli.database_url.as_deref()).await?;
            return Ok(());
        }
        command => {
            let resolved = CoachbookConfig::resolve(cli.database_url.as_deref())?;
            let db_pool = pool::create_pool(&resolved.db_config).await?;

            let result = match command {
                Commands::Budget { command } => {
                    budget_cmds::run_budget_command(command, &db_pool).await
                }
                Commands::Assign {
                    subscriber_id,
                    budget_id,
                } => assign_cmds::cmd_assign(&db_pool, &subscriber_id, &budget_id).await,
                Commands::Unassign {
                    assignment_id,
                    delete_plans,
                } => assign_cmds::cmd_unassign(&db_pool, &assignment_id, delete_plans).await,
                Commands::Edit {
                    assignment_id,
                    name,
                    description,
                    workout_template,
                    nutrition_template,
                    calories,
                    protein,
                    carbs,
                    fat,
                    steps_goal,
                    steps_instructions,
                    supplements,
                    eating_order,
                    eating_rules,
                } => {
                    assign_cmds::cmd_edit(
                        &db_pool,
                        assign_cmds::EditArgs {
                            assignment_id,
                            name,
                            description,
                            workout_template,
                            nutrition_template,
                            calories,
                            protein,
                            carbs,
                            fat,
                            steps_goal,
                            steps_instructions,
                            supplements,
                            eating_order,
                            eating_rules,
                        },
                    )
                    .await
                }
                Commands::Plans {
                    subscriber_id,
                    kind,
                } => history_cmd::cmd_plans(&db_pool, &subscriber_id, kind.as_deref()).await,
                Commands::History {
                    subscriber_id,
                    kind,
                } => history_cmd::cmd_history(&db_pool, &subscriber_id, kind.as_deref()).await,
                Commands::Init { .. } | Commands::DbInit => unreachable!("handled above"),
            };

            db_pool.close().await;
            result?;
        }
    }

    Ok(())
}
