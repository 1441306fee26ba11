//! Operator-mode CLI handlers for assignment commands: assign, unassign,
//! and edit-from-assignment.

use anyhow::Result;
use sqlx::PgPool;

use coachbook_core::assignment::{self, UnassignOptions};
use coachbook_core::fork::{self, BudgetChanges};
use coachbook_core::sync::{SyncAction, SyncReport};
use coachbook_db::models::NutritionTargets;

use crate::parse_id;

/// `coachbook assign <subscriber-id> <budget-id>`
pub async fn cmd_assign(pool: &PgPool, subscriber_id: &str, budget_id: &str) -> Result<()> {
    let subscriber = parse_id("subscriber ID", subscriber_id)?;
    let budget = parse_id("budget ID", budget_id)?;

    let (assignment, report) = assignment::assign(pool, subscriber, budget).await?;

    println!("Budget assigned.");
    println!();
    println!("  Assignment ID: {}", assignment.id);
    println!("  Budget:        {}", assignment.budget_id);
    println!("  Subscriber:    {}", assignment.subscriber_id);
    print_sync_report(&report);

    Ok(())
}

/// `coachbook unassign <assignment-id> [--delete-plans]`
///
/// Prints the affected-plan preview before acting; the engine itself
/// performs the requested action unconditionally.
pub async fn cmd_unassign(pool: &PgPool, assignment_id: &str, delete_plans: bool) -> Result<()> {
    let id = parse_id("assignment ID", assignment_id)?;

    let affected = assignment::preview_unassign(pool, id).await?;
    if delete_plans {
        println!("Deleting {affected} generated plan(s) along with the assignment.");
    } else {
        println!("Detaching {affected} generated plan(s); they stay in history without a budget.");
    }

    let report = assignment::unassign(
        pool,
        id,
        UnassignOptions {
            delete_generated_plans: delete_plans,
        },
    )
    .await?;

    println!();
    println!("Assignment {} removed.", report.assignment_id);
    if report.deleted_plans > 0 {
        println!("  Plans deleted:  {}", report.deleted_plans);
    }
    if report.detached_plans > 0 {
        println!("  Plans detached: {}", report.detached_plans);
    }

    Ok(())
}

/// Arguments for [`cmd_edit`], matching the `coachbook edit` flags.
pub struct EditArgs {
    pub assignment_id: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub workout_template: Option<String>,
    pub nutrition_template: Option<String>,
    pub calories: Option<i32>,
    pub protein: Option<i32>,
    pub carbs: Option<i32>,
    pub fat: Option<i32>,
    pub steps_goal: Option<i32>,
    pub steps_instructions: Option<String>,
    pub supplements: Vec<String>,
    pub eating_order: Option<String>,
    pub eating_rules: Option<String>,
}

/// `coachbook edit <assignment-id> [field flags...]`
pub async fn cmd_edit(pool: &PgPool, args: EditArgs) -> Result<()> {
    let assignment_id = parse_id("assignment ID", &args.assignment_id)?;

    let workout_template_id = args
        .workout_template
        .as_deref()
        .map(|s| parse_id("workout template ID", s))
        .transpose()?;
    let nutrition_template_id = args
        .nutrition_template
        .as_deref()
        .map(|s| parse_id("nutrition template ID", s))
        .transpose()?;
    let supplements = if args.supplements.is_empty() {
        None
    } else {
        Some(
            args.supplements
                .iter()
                .map(|s| crate::budget_cmds::parse_supplement(s))
                .collect::<Result<Vec<_>>>()?,
        )
    };

    let nutrition_targets = if args.calories.is_some()
        || args.protein.is_some()
        || args.carbs.is_some()
        || args.fat.is_some()
    {
        Some(NutritionTargets {
            calories: args.calories,
            protein_g: args.protein,
            carbs_g: args.carbs,
            fat_g: args.fat,
        })
    } else {
        None
    };

    let changes = BudgetChanges {
        name: args.name,
        description: args.description,
        workout_template_id,
        nutrition_template_id,
        nutrition_targets,
        steps_goal: args.steps_goal,
        steps_instructions: args.steps_instructions,
        supplements,
        eating_order: args.eating_order,
        eating_rules: args.eating_rules,
    };

    if changes.is_empty() {
        anyhow::bail!("no changes given; pass at least one field flag");
    }

    let report = fork::edit_budget(pool, assignment_id, &changes).await?;

    if report.target.forked {
        println!("Budget was shared: edit applied to a private fork.");
    } else {
        println!("Budget edited in place (exclusive reference).");
    }
    println!();
    println!("  Target budget: {}", report.target.budget_id);
    for sync in &report.sync {
        println!("  Re-synced subscriber {}:", sync.subscriber_id);
        print_sync_report(sync);
    }

    Ok(())
}

/// Print the per-kind outcomes of a sync batch.
fn print_sync_report(report: &SyncReport) {
    for outcome in &report.outcomes {
        match &outcome.action {
            SyncAction::Created { created } => {
                println!("    {}: new plan {created}", outcome.kind);
            }
            SyncAction::Replaced { retired, created } => {
                println!(
                    "    {}: plan {created} replaces retired {retired}",
                    outcome.kind
                );
            }
            SyncAction::ManualOverrideSkipped => {
                println!(
                    "    {}: manual override preserved, not synced",
                    outcome.kind
                );
            }
        }
    }
}
