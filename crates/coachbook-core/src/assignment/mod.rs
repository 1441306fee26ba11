//! Assignment lifecycle: linking a budget to a subscriber and unwinding
//! the link later.
//!
//! Assigning triggers the first plan sync. Unassigning either hard-deletes
//! the subscriber's generated plans for that budget or detaches them
//! (plans stay in history with no budget); the caller chooses, and is
//! expected to show [`preview_unassign`]'s count before the destructive
//! variant. The engine itself performs the requested action
//! unconditionally.

use anyhow::{Context, Result};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use coachbook_db::models::BudgetAssignment;
use coachbook_db::queries::{assignments, budgets, generated_plans};

use crate::error::EngineError;
use crate::sync::{self, SyncReport};

/// Options for [`unassign`].
#[derive(Debug, Clone, Copy)]
pub struct UnassignOptions {
    /// `true`: hard-delete every generated plan with the assignment's
    /// budget and subscriber. `false`: clear `budget_id` on those plans,
    /// leaving them in history as ownerless records.
    pub delete_generated_plans: bool,
}

/// What an [`unassign`] call did.
#[derive(Debug, Clone)]
pub struct UnassignReport {
    pub assignment_id: Uuid,
    pub budget_id: Uuid,
    pub subscriber_id: Uuid,
    pub deleted_plans: u64,
    pub detached_plans: u64,
}

/// Link a budget to a subscriber and run the first sync.
///
/// Fails with [`EngineError::NotFound`] when the budget does not exist;
/// nothing is inserted in that case.
pub async fn assign(
    pool: &PgPool,
    subscriber_id: Uuid,
    budget_id: Uuid,
) -> Result<(BudgetAssignment, SyncReport), EngineError> {
    let budget = budgets::get_budget(pool, budget_id)
        .await?
        .ok_or(EngineError::NotFound {
            entity: "budget",
            id: budget_id,
        })?;

    let assignment = assignments::insert_assignment(pool, budget.id, subscriber_id).await?;

    info!(
        assignment = %assignment.id,
        budget = %budget.id,
        subscriber = %subscriber_id,
        "budget assigned"
    );

    let report = sync::generate(pool, subscriber_id, budget.id).await?;
    Ok((assignment, report))
}

/// Count the generated plans an unassignment would touch.
///
/// Callers should surface this before invoking [`unassign`] with
/// `delete_generated_plans = true`; the engine performs no confirmation
/// step of its own.
pub async fn preview_unassign(pool: &PgPool, assignment_id: Uuid) -> Result<i64, EngineError> {
    let assignment =
        assignments::get_assignment(pool, assignment_id)
            .await?
            .ok_or(EngineError::NotFound {
                entity: "assignment",
                id: assignment_id,
            })?;

    let count = generated_plans::count_plans_for_assignment(
        pool,
        assignment.budget_id,
        assignment.subscriber_id,
    )
    .await?;
    Ok(count)
}

/// Remove the link between a budget and a subscriber.
///
/// Resolves the assignment first ([`EngineError::NotFound`] otherwise),
/// then deletes or detaches the matching generated plans and removes the
/// assignment row, all inside one transaction.
pub async fn unassign(
    pool: &PgPool,
    assignment_id: Uuid,
    options: UnassignOptions,
) -> Result<UnassignReport, EngineError> {
    let assignment =
        assignments::get_assignment(pool, assignment_id)
            .await?
            .ok_or(EngineError::NotFound {
                entity: "assignment",
                id: assignment_id,
            })?;

    let (deleted, detached) =
        apply_unassign(pool, &assignment, options.delete_generated_plans).await?;

    info!(
        assignment = %assignment_id,
        budget = %assignment.budget_id,
        subscriber = %assignment.subscriber_id,
        deleted,
        detached,
        "assignment removed"
    );

    Ok(UnassignReport {
        assignment_id,
        budget_id: assignment.budget_id,
        subscriber_id: assignment.subscriber_id,
        deleted_plans: deleted,
        detached_plans: detached,
    })
}

/// The transactional body of [`unassign`]: plan cleanup and assignment
/// removal commit together or not at all.
async fn apply_unassign(
    pool: &PgPool,
    assignment: &BudgetAssignment,
    delete_plans: bool,
) -> Result<(u64, u64)> {
    let mut tx = pool.begin().await.context("failed to begin transaction")?;

    let (deleted, detached) = if delete_plans {
        let deleted = sqlx::query(
            "DELETE FROM generated_plans \
             WHERE budget_id = $1 AND subscriber_id = $2",
        )
        .bind(assignment.budget_id)
        .bind(assignment.subscriber_id)
        .execute(&mut *tx)
        .await
        .context("failed to delete generated plans")?
        .rows_affected();
        (deleted, 0)
    } else {
        let detached = sqlx::query(
            "UPDATE generated_plans SET budget_id = NULL \
             WHERE budget_id = $1 AND subscriber_id = $2",
        )
        .bind(assignment.budget_id)
        .bind(assignment.subscriber_id)
        .execute(&mut *tx)
        .await
        .context("failed to detach generated plans")?
        .rows_affected();
        (0, detached)
    };

    let removed = sqlx::query("DELETE FROM budget_assignments WHERE id = $1")
        .bind(assignment.id)
        .execute(&mut *tx)
        .await
        .context("failed to delete assignment")?
        .rows_affected();
    if removed == 0 {
        anyhow::bail!("assignment {} vanished mid-removal", assignment.id);
    }

    tx.commit().await.context("failed to commit transaction")?;
    Ok((deleted, detached))
}
