//! Plan synchronization: derive per-subscriber generated plans from a
//! budget.
//!
//! One [`generate`] call upserts a plan for every kind the budget
//! prescribes, inside a single database transaction: either every
//! retirement and insertion commits, or none do. Plans are append-only --
//! retiring sets `is_active = FALSE` and `end_date`, never rewriting a
//! payload -- and manual overrides (plans with no budget) are left alone.

use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use coachbook_db::models::{Budget, GeneratedPlan, PlanKind, PlanPayload};
use coachbook_db::queries::{assignments, budgets};

use crate::error::EngineError;

/// What happened for one kind within a sync batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncAction {
    /// A fresh active plan was inserted; no prior active plan existed.
    Created { created: Uuid },
    /// The prior sync-originated active plan was retired and replaced.
    Replaced { retired: Uuid, created: Uuid },
    /// The current active plan is a manual override; it was preserved and
    /// nothing was written for this kind.
    ManualOverrideSkipped,
}

/// Per-kind outcome of a sync batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    pub kind: PlanKind,
    pub action: SyncAction,
}

/// Result of one [`generate`] call.
#[derive(Debug, Clone)]
pub struct SyncReport {
    pub subscriber_id: Uuid,
    pub budget_id: Uuid,
    pub outcomes: Vec<SyncOutcome>,
}

impl SyncReport {
    /// Kinds for which a manual override was preserved.
    pub fn skipped_kinds(&self) -> Vec<PlanKind> {
        self.outcomes
            .iter()
            .filter(|o| o.action == SyncAction::ManualOverrideSkipped)
            .map(|o| o.kind)
            .collect()
    }
}

/// Build the payload a budget prescribes for one kind, if any.
///
/// This is the single place budget fields are mapped to plan payloads;
/// the match is exhaustive over [`PlanKind`].
pub fn prescription_for(budget: &Budget, kind: PlanKind) -> Option<PlanPayload> {
    match kind {
        PlanKind::Workout => budget
            .workout_template_id
            .map(|template_id| PlanPayload::Workout { template_id }),
        PlanKind::Nutrition => {
            if budget.nutrition_template_id.is_none() && budget.nutrition_targets.is_none() {
                return None;
            }
            Some(PlanPayload::Nutrition {
                template_id: budget.nutrition_template_id,
                targets: budget.nutrition_targets.as_ref().map(|t| t.0.clone()),
                eating_order: budget.eating_order.clone(),
                eating_rules: budget.eating_rules.clone(),
            })
        }
        PlanKind::Supplement => {
            if budget.supplements.0.is_empty() {
                None
            } else {
                Some(PlanPayload::Supplement {
                    supplements: budget.supplements.0.clone(),
                })
            }
        }
        PlanKind::Steps => budget.steps_goal.map(|goal| PlanPayload::Steps {
            goal,
            instructions: budget.steps_instructions.clone(),
        }),
    }
}

/// All payloads a budget prescribes, in kind order.
pub fn prescriptions(budget: &Budget) -> Vec<PlanPayload> {
    PlanKind::ALL
        .iter()
        .filter_map(|kind| prescription_for(budget, *kind))
        .collect()
}

/// Derive and upsert generated plans for one subscriber from one budget.
///
/// For each kind the budget prescribes: if the subscriber's current active
/// plan of that kind is a manual override (`budget_id IS NULL`), the kind
/// is skipped and reported; otherwise any sync-originated active plans are
/// retired and a fresh active plan is inserted. All kinds are applied
/// within one transaction -- a failure rolls the whole batch back and
/// surfaces [`EngineError::SyncPartialFailure`], leaving the prior active
/// plans in effect.
pub async fn generate(
    pool: &PgPool,
    subscriber_id: Uuid,
    budget_id: Uuid,
) -> Result<SyncReport, EngineError> {
    let budget = budgets::get_budget(pool, budget_id)
        .await?
        .ok_or(EngineError::NotFound {
            entity: "budget",
            id: budget_id,
        })?;

    match apply_sync(pool, subscriber_id, &budget).await {
        Ok(report) => Ok(report),
        Err(source) => Err(EngineError::SyncPartialFailure {
            subscriber: subscriber_id,
            budget: budget_id,
            source,
        }),
    }
}

/// The transactional body of [`generate`].
///
/// The transaction rolls back on drop if any statement fails, so a partial
/// kind set is never observable by a subsequent read.
async fn apply_sync(pool: &PgPool, subscriber_id: Uuid, budget: &Budget) -> Result<SyncReport> {
    // One timestamp for the whole batch: it closes retired plans and opens
    // new ones, and concurrent batches resolve last-writer-wins on it.
    let now = Utc::now();

    let mut tx = pool.begin().await.context("failed to begin transaction")?;
    let mut outcomes = Vec::new();

    for payload in prescriptions(budget) {
        let kind = payload.kind();

        let active: Option<GeneratedPlan> = sqlx::query_as(
            "SELECT * FROM generated_plans \
             WHERE subscriber_id = $1 AND kind = $2 AND is_active = TRUE \
             ORDER BY start_date DESC \
             LIMIT 1",
        )
        .bind(subscriber_id)
        .bind(kind)
        .fetch_optional(&mut *tx)
        .await
        .with_context(|| format!("failed to fetch active {kind} plan"))?;

        if let Some(active) = &active {
            if active.is_manual_override() {
                debug!(
                    subscriber = %subscriber_id,
                    %kind,
                    plan = %active.id,
                    "manual override preserved, kind skipped"
                );
                outcomes.push(SyncOutcome {
                    kind,
                    action: SyncAction::ManualOverrideSkipped,
                });
                continue;
            }
        }

        // Retire every sync-originated active plan of this kind. The WHERE
        // clause leaves manual overrides untouched even if the store holds
        // more active rows than it should.
        let retired = sqlx::query(
            "UPDATE generated_plans \
             SET is_active = FALSE, end_date = $1 \
             WHERE subscriber_id = $2 AND kind = $3 \
               AND is_active = TRUE AND budget_id IS NOT NULL",
        )
        .bind(now)
        .bind(subscriber_id)
        .bind(kind)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("failed to retire active {kind} plans"))?
        .rows_affected();

        let inserted: GeneratedPlan = sqlx::query_as(
            "INSERT INTO generated_plans (subscriber_id, kind, budget_id, payload, start_date) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING *",
        )
        .bind(subscriber_id)
        .bind(kind)
        .bind(budget.id)
        .bind(payload.to_value())
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .with_context(|| format!("failed to insert {kind} plan"))?;

        let action = match active {
            Some(prior) if retired > 0 => SyncAction::Replaced {
                retired: prior.id,
                created: inserted.id,
            },
            _ => SyncAction::Created {
                created: inserted.id,
            },
        };
        outcomes.push(SyncOutcome { kind, action });
    }

    tx.commit().await.context("failed to commit transaction")?;

    debug!(
        subscriber = %subscriber_id,
        budget = %budget.id,
        kinds = outcomes.len(),
        "sync batch committed"
    );

    Ok(SyncReport {
        subscriber_id,
        budget_id: budget.id,
        outcomes,
    })
}

/// Re-sync every assignment currently pointing at a budget.
///
/// Invoked after an edit is persisted: after a fork this is exactly the
/// one repointed assignment; without a fork it is every assignment that
/// shares the budget.
pub async fn resync_assignments(
    pool: &PgPool,
    budget_id: Uuid,
) -> Result<Vec<SyncReport>, EngineError> {
    let targets = assignments::list_assignments_for_budget(pool, budget_id).await?;

    let mut reports = Vec::with_capacity(targets.len());
    for assignment in targets {
        reports.push(generate(pool, assignment.subscriber_id, budget_id).await?);
    }
    Ok(reports)
}
