//! Database query functions for the `budget_assignments` table.

use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::BudgetAssignment;

/// Insert a new active assignment linking a budget to a subscriber.
/// Returns the inserted row with server-generated defaults (id,
/// assigned_at, is_active).
pub async fn insert_assignment(
    pool: &PgPool,
    budget_id: Uuid,
    subscriber_id: Uuid,
) -> Result<BudgetAssignment> {
    let assignment = sqlx::query_as::<_, BudgetAssignment>(
        "INSERT INTO budget_assignments (budget_id, subscriber_id) \
         VALUES ($1, $2) \
         RETURNING *",
    )
    .bind(budget_id)
    .bind(subscriber_id)
    .fetch_one(pool)
    .await
    .with_context(|| {
        format!("failed to insert assignment of budget {budget_id} to subscriber {subscriber_id}")
    })?;

    Ok(assignment)
}

/// Fetch an assignment by its ID.
pub async fn get_assignment(pool: &PgPool, id: Uuid) -> Result<Option<BudgetAssignment>> {
    let assignment =
        sqlx::query_as::<_, BudgetAssignment>("SELECT * FROM budget_assignments WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .context("failed to fetch assignment")?;

    Ok(assignment)
}

/// List all assignments referencing a budget, oldest first.
pub async fn list_assignments_for_budget(
    pool: &PgPool,
    budget_id: Uuid,
) -> Result<Vec<BudgetAssignment>> {
    let assignments = sqlx::query_as::<_, BudgetAssignment>(
        "SELECT * FROM budget_assignments WHERE budget_id = $1 ORDER BY assigned_at ASC",
    )
    .bind(budget_id)
    .fetch_all(pool)
    .await
    .context("failed to list assignments for budget")?;

    Ok(assignments)
}

/// List all assignments for a subscriber, newest first.
pub async fn list_assignments_for_subscriber(
    pool: &PgPool,
    subscriber_id: Uuid,
) -> Result<Vec<BudgetAssignment>> {
    let assignments = sqlx::query_as::<_, BudgetAssignment>(
        "SELECT * FROM budget_assignments WHERE subscriber_id = $1 ORDER BY assigned_at DESC",
    )
    .bind(subscriber_id)
    .fetch_all(pool)
    .await
    .context("failed to list assignments for subscriber")?;

    Ok(assignments)
}

/// Count assignments referencing a budget, excluding one assignment.
///
/// The fork resolver uses this to decide whether an assignment holds an
/// exclusive reference to its budget. The read is a plain snapshot; it is
/// not linearizable with respect to concurrent assigns.
pub async fn count_other_assignments(
    pool: &PgPool,
    budget_id: Uuid,
    exclude_assignment_id: Uuid,
) -> Result<i64> {
    let row: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM budget_assignments \
         WHERE budget_id = $1 AND id != $2",
    )
    .bind(budget_id)
    .bind(exclude_assignment_id)
    .fetch_one(pool)
    .await
    .context("failed to count other assignments")?;

    Ok(row.0)
}

/// Point an assignment at a different budget.
///
/// Returns the number of rows affected (0 means the assignment no longer
/// exists); the caller decides how to surface that.
pub async fn repoint_assignment(
    pool: &PgPool,
    assignment_id: Uuid,
    new_budget_id: Uuid,
) -> Result<u64> {
    let result = sqlx::query("UPDATE budget_assignments SET budget_id = $1 WHERE id = $2")
        .bind(new_budget_id)
        .bind(assignment_id)
        .execute(pool)
        .await
        .with_context(|| {
            format!("failed to repoint assignment {assignment_id} to budget {new_budget_id}")
        })?;

    Ok(result.rows_affected())
}

/// Delete an assignment by its ID.
pub async fn delete_assignment(pool: &PgPool, id: Uuid) -> Result<()> {
    let result = sqlx::query("DELETE FROM budget_assignments WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .context("failed to delete assignment")?;

    if result.rows_affected() == 0 {
        anyhow::bail!("assignment {id} not found");
    }

    Ok(())
}
