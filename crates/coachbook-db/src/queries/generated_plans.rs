//! Database query functions for the `generated_plans` table.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{GeneratedPlan, PlanKind};

/// Parameters for inserting a new generated plan row.
///
/// A `budget_id` of `None` creates a manual override: a plan the
/// synchronizer will refuse to retire or replace.
#[derive(Debug, Clone)]
pub struct NewGeneratedPlan {
    pub subscriber_id: Uuid,
    pub kind: PlanKind,
    pub budget_id: Option<Uuid>,
    pub payload: Value,
    pub start_date: DateTime<Utc>,
}

/// Insert a new active generated plan row. Returns the inserted row.
pub async fn insert_generated_plan(pool: &PgPool, new: &NewGeneratedPlan) -> Result<GeneratedPlan> {
    let plan = sqlx::query_as::<_, GeneratedPlan>(
        "INSERT INTO generated_plans (subscriber_id, kind, budget_id, payload, start_date) \
         VALUES ($1, $2, $3, $4, $5) \
         RETURNING *",
    )
    .bind(new.subscriber_id)
    .bind(new.kind)
    .bind(new.budget_id)
    .bind(&new.payload)
    .bind(new.start_date)
    .fetch_one(pool)
    .await
    .with_context(|| {
        format!(
            "failed to insert {} plan for subscriber {}",
            new.kind, new.subscriber_id
        )
    })?;

    Ok(plan)
}

/// Fetch a generated plan by its ID.
pub async fn get_generated_plan(pool: &PgPool, id: Uuid) -> Result<Option<GeneratedPlan>> {
    let plan = sqlx::query_as::<_, GeneratedPlan>("SELECT * FROM generated_plans WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch generated plan")?;

    Ok(plan)
}

/// Fetch the current active plan of a kind for a subscriber.
///
/// The store enforces at most one active row per `(subscriber, kind)`; the
/// ORDER BY is defensive against data older than that constraint.
pub async fn get_active_plan(
    pool: &PgPool,
    subscriber_id: Uuid,
    kind: PlanKind,
) -> Result<Option<GeneratedPlan>> {
    let plan = sqlx::query_as::<_, GeneratedPlan>(
        "SELECT * FROM generated_plans \
         WHERE subscriber_id = $1 AND kind = $2 AND is_active = TRUE \
         ORDER BY start_date DESC \
         LIMIT 1",
    )
    .bind(subscriber_id)
    .bind(kind)
    .fetch_optional(pool)
    .await
    .with_context(|| format!("failed to fetch active {kind} plan for subscriber {subscriber_id}"))?;

    Ok(plan)
}

/// List a subscriber's plans, optionally filtered by kind, newest first.
/// This is the raw feed the history consolidator works over.
pub async fn list_plans_for_subscriber(
    pool: &PgPool,
    subscriber_id: Uuid,
    kind: Option<PlanKind>,
) -> Result<Vec<GeneratedPlan>> {
    let plans = if let Some(kind) = kind {
        sqlx::query_as::<_, GeneratedPlan>(
            "SELECT * FROM generated_plans \
             WHERE subscriber_id = $1 AND kind = $2 \
             ORDER BY start_date DESC",
        )
        .bind(subscriber_id)
        .bind(kind)
        .fetch_all(pool)
        .await
    } else {
        sqlx::query_as::<_, GeneratedPlan>(
            "SELECT * FROM generated_plans \
             WHERE subscriber_id = $1 \
             ORDER BY start_date DESC",
        )
        .bind(subscriber_id)
        .fetch_all(pool)
        .await
    }
    .with_context(|| format!("failed to list plans for subscriber {subscriber_id}"))?;

    Ok(plans)
}

/// Count plans that belong to a given budget/subscriber pair.
///
/// Callers use this to preview the impact of a destructive unassign before
/// invoking it.
pub async fn count_plans_for_assignment(
    pool: &PgPool,
    budget_id: Uuid,
    subscriber_id: Uuid,
) -> Result<i64> {
    let row: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM generated_plans \
         WHERE budget_id = $1 AND subscriber_id = $2",
    )
    .bind(budget_id)
    .bind(subscriber_id)
    .fetch_one(pool)
    .await
    .context("failed to count plans for assignment")?;

    Ok(row.0)
}

/// Hard-delete every plan belonging to a budget/subscriber pair.
/// Returns the number of rows removed.
pub async fn delete_plans_for_assignment(
    pool: &PgPool,
    budget_id: Uuid,
    subscriber_id: Uuid,
) -> Result<u64> {
    let result = sqlx::query(
        "DELETE FROM generated_plans \
         WHERE budget_id = $1 AND subscriber_id = $2",
    )
    .bind(budget_id)
    .bind(subscriber_id)
    .execute(pool)
    .await
    .context("failed to delete plans for assignment")?;

    Ok(result.rows_affected())
}

/// Detach every plan belonging to a budget/subscriber pair by clearing its
/// `budget_id`. The plans remain in history, ownerless. Returns the number
/// of rows detached.
pub async fn detach_plans_for_assignment(
    pool: &PgPool,
    budget_id: Uuid,
    subscriber_id: Uuid,
) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE generated_plans SET budget_id = NULL \
         WHERE budget_id = $1 AND subscriber_id = $2",
    )
    .bind(budget_id)
    .bind(subscriber_id)
    .execute(pool)
    .await
    .context("failed to detach plans for assignment")?;

    Ok(result.rows_affected())
}
