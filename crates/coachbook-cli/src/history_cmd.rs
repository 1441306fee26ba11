//! Operator-mode CLI handlers for plan listing and the consolidated
//! history view.

use anyhow::{Context, Result};
use sqlx::PgPool;

use coachbook_core::history::{self, HistoryEntry};
use coachbook_db::models::{GeneratedPlan, PlanKind};
use coachbook_db::queries::generated_plans;

use crate::parse_id;

fn parse_kind(input: Option<&str>) -> Result<Option<PlanKind>> {
    input
        .map(|s| {
            s.parse::<PlanKind>()
                .with_context(|| format!("invalid plan kind: {s:?}"))
        })
        .transpose()
}

/// `coachbook plans <subscriber-id> [--kind <kind>]` -- raw plan listing.
pub async fn cmd_plans(pool: &PgPool, subscriber_id: &str, kind: Option<&str>) -> Result<()> {
    let subscriber = parse_id("subscriber ID", subscriber_id)?;
    let kind = parse_kind(kind)?;

    let plans = generated_plans::list_plans_for_subscriber(pool, subscriber, kind).await?;
    if plans.is_empty() {
        println!("No generated plans for subscriber {subscriber}.");
        return Ok(());
    }

    println!("{} generated plan(s):", plans.len());
    for plan in &plans {
        println!("  {}", describe_plan(plan));
    }
    Ok(())
}

/// `coachbook history <subscriber-id> [--kind <kind>]` -- deduplicated,
/// repaired history view.
pub async fn cmd_history(pool: &PgPool, subscriber_id: &str, kind: Option<&str>) -> Result<()> {
    let subscriber = parse_id("subscriber ID", subscriber_id)?;
    let kind = parse_kind(kind)?;

    let plans = generated_plans::list_plans_for_subscriber(pool, subscriber, kind).await?;
    let entries: Vec<HistoryEntry> = plans.into_iter().map(HistoryEntry::from).collect();
    let consolidated = history::consolidate(entries);

    if consolidated.entries.is_empty() {
        println!("No plan history for subscriber {subscriber}.");
        return Ok(());
    }

    for entry in &consolidated.entries {
        let marker = if entry.is_current { "*" } else { " " };
        let started = entry
            .start_date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "unknown".to_owned());
        let ended = entry
            .end_date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "open".to_owned());
        let source = match entry.budget_id {
            Some(budget) => format!("budget {budget}"),
            None => "manual".to_owned(),
        };
        println!(
            "{marker} {}  {} -> {}  [{}]",
            entry.kind, started, ended, source
        );
    }

    if !consolidated.duplicate_active.is_empty() {
        println!();
        println!(
            "Warning: {} extra active entr(ies) found; flag for integrity check:",
            consolidated.duplicate_active.len()
        );
        for key in &consolidated.duplicate_active {
            println!("  - {key}");
        }
    }

    Ok(())
}

fn describe_plan(plan: &GeneratedPlan) -> String {
    let status = if plan.is_active { "active" } else { "retired" };
    let source = match plan.budget_id {
        Some(budget) => format!("budget {budget}"),
        None => "manual".to_owned(),
    };
    format!(
        "{}  {}  {} since {}  [{}]",
        plan.id,
        plan.kind,
        status,
        plan.start_date.format("%Y-%m-%d"),
        source
    )
}
