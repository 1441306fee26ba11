//! Operator-mode CLI handlers for `coachbook budget` subcommands.
//!
//! Implements:
//! - `coachbook budget create <name> --owner <id> [...]`
//! - `coachbook budget show <budget-id>`
//! - `coachbook budget list`

use anyhow::{Context, Result};
use sqlx::PgPool;

use coachbook_db::models::{NutritionTargets, Supplement};
use coachbook_db::queries::assignments;
use coachbook_db::queries::budgets::{self, NewBudget};

use crate::{parse_id, BudgetCommands};

/// Dispatch a `BudgetCommands` variant to the appropriate handler.
pub async fn run_budget_command(command: BudgetCommands, pool: &PgPool) -> Result<()> {
    match command {
        BudgetCommands::Create {
            name,
            owner,
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
            let owner_id = parse_id("owner ID", &owner)?;
            let workout_template_id = workout_template
                .as_deref()
                .map(|s| parse_id("workout template ID", s))
                .transpose()?;
            let nutrition_template_id = nutrition_template
                .as_deref()
                .map(|s| parse_id("nutrition template ID", s))
                .transpose()?;

            let targets = if calories.is_some()
                || protein.is_some()
                || carbs.is_some()
                || fat.is_some()
            {
                Some(NutritionTargets {
                    calories,
                    protein_g: protein,
                    carbs_g: carbs,
                    fat_g: fat,
                })
            } else {
                None
            };

            let supplements = supplements
                .iter()
                .map(|s| parse_supplement(s))
                .collect::<Result<Vec<_>>>()?;

            let budget = budgets::insert_budget(
                pool,
                &NewBudget {
                    name: &name,
                    description: description.as_deref(),
                    workout_template_id,
                    nutrition_template_id,
                    nutrition_targets: targets.as_ref(),
                    steps_goal,
                    steps_instructions: steps_instructions.as_deref(),
                    supplements: &supplements,
                    eating_order: eating_order.as_deref(),
                    eating_rules: eating_rules.as_deref(),
                    is_public: true,
                    owner_id,
                },
            )
            .await?;

            println!("Budget created.");
            println!();
            println!("  Budget ID: {}", budget.id);
            println!("  Name:      {}", budget.name);
            println!("  Owner:     {}", budget.owner_id);
            Ok(())
        }
        BudgetCommands::Show { budget_id } => cmd_show(pool, &budget_id).await,
        BudgetCommands::List => cmd_list(pool).await,
    }
}

/// Parse a `--supplement` argument of the form `name[:dosage[:timing]]`.
pub(crate) fn parse_supplement(input: &str) -> Result<Supplement> {
    let mut parts = input.splitn(3, ':');
    let name = parts
        .next()
        .filter(|s| !s.is_empty())
        .with_context(|| format!("supplement {input:?} has no name"))?;

    Ok(Supplement {
        name: name.to_owned(),
        dosage: parts.next().filter(|s| !s.is_empty()).map(str::to_owned),
        timing: parts.next().filter(|s| !s.is_empty()).map(str::to_owned),
        notes: None,
    })
}

async fn cmd_show(pool: &PgPool, budget_id: &str) -> Result<()> {
    let id = parse_id("budget ID", budget_id)?;
    let budget = budgets::get_budget(pool, id)
        .await?
        .with_context(|| format!("budget {id} not found"))?;

    println!("Budget {}", budget.id);
    println!("  Name:        {}", budget.name);
    if let Some(description) = &budget.description {
        println!("  Description: {description}");
    }
    println!("  Visibility:  {}", if budget.is_public { "shared" } else { "private fork" });
    println!("  Owner:       {}", budget.owner_id);
    if let Some(id) = budget.workout_template_id {
        println!("  Workout template:   {id}");
    }
    if let Some(id) = budget.nutrition_template_id {
        println!("  Nutrition template: {id}");
    }
    if let Some(targets) = &budget.nutrition_targets {
        println!("  Nutrition targets:  {}", serde_json::to_string(&targets.0)?);
    }
    if let Some(goal) = budget.steps_goal {
        println!("  Steps goal:         {goal}");
    }
    if !budget.supplements.0.is_empty() {
        println!("  Supplements:");
        for s in &budget.supplements.0 {
            let dosage = s.dosage.as_deref().unwrap_or("-");
            let timing = s.timing.as_deref().unwrap_or("-");
            println!("    - {} (dosage: {dosage}, timing: {timing})", s.name);
        }
    }

    let assigned = assignments::list_assignments_for_budget(pool, budget.id).await?;
    println!("  Assignments: {}", assigned.len());
    for a in &assigned {
        println!("    - {} -> subscriber {}", a.id, a.subscriber_id);
    }

    Ok(())
}

async fn cmd_list(pool: &PgPool) -> Result<()> {
    let shared = budgets::list_shared_budgets(pool).await?;
    if shared.is_empty() {
        println!("No shared budget templates.");
        return Ok(());
    }

    println!("{} shared budget template(s):", shared.len());
    for budget in &shared {
        println!(
            "  {}  {}  (created {})",
            budget.id,
            budget.name,
            budget.created_at.format("%Y-%m-%d")
        );
    }
    Ok(())
}
