//! Copy-on-write resolution for budget edits made from a subscriber's
//! context.
//!
//! An edit to budget B initiated from subscriber A's assignment must never
//! be observable by any other subscriber sharing B. When A holds the only
//! reference, B is edited in place; otherwise B is deep-copied into a
//! private fork and A's assignment is repointed at the copy before the
//! edit lands.
//!
//! The shared-count read is a plain snapshot: two subscribers editing
//! concurrently may both observe the budget as shared and both fork. That
//! yields two independent forks, each isolating its own assignment, which
//! is the only guarantee made.

use anyhow::anyhow;
use sqlx::PgPool;
use tracing::{debug, info};
use uuid::Uuid;

use coachbook_db::models::{Budget, NutritionTargets, Supplement};
use coachbook_db::queries::{assignments, budgets};

use crate::error::EngineError;
use crate::sync::{self, SyncReport};

/// Where an edit may be applied, as decided by [`resolve_edit_target`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditTarget {
    /// The budget the edit must be applied to: the original when the
    /// assignment held an exclusive reference, the fresh fork otherwise.
    pub budget_id: Uuid,
    /// Whether a fork was created (and the assignment repointed).
    pub forked: bool,
}

/// A field-by-field patch to a budget, carried as an explicit command
/// object. Absent fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct BudgetChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub workout_template_id: Option<Uuid>,
    pub nutrition_template_id: Option<Uuid>,
    pub nutrition_targets: Option<NutritionTargets>,
    pub steps_goal: Option<i32>,
    pub steps_instructions: Option<String>,
    pub supplements: Option<Vec<Supplement>>,
    pub eating_order: Option<String>,
    pub eating_rules: Option<String>,
}

impl BudgetChanges {
    /// Whether the patch changes anything at all.
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.workout_template_id.is_none()
            && self.nutrition_template_id.is_none()
            && self.nutrition_targets.is_none()
            && self.steps_goal.is_none()
            && self.steps_instructions.is_none()
            && self.supplements.is_none()
            && self.eating_order.is_none()
            && self.eating_rules.is_none()
    }

    /// Apply the patch to a budget value.
    pub fn apply(&self, budget: &mut Budget) {
        if let Some(name) = &self.name {
            budget.name = name.clone();
        }
        if let Some(description) = &self.description {
            budget.description = Some(description.clone());
        }
        if let Some(id) = self.workout_template_id {
            budget.workout_template_id = Some(id);
        }
        if let Some(id) = self.nutrition_template_id {
            budget.nutrition_template_id = Some(id);
        }
        if let Some(targets) = &self.nutrition_targets {
            budget.nutrition_targets = Some(sqlx::types::Json(targets.clone()));
        }
        if let Some(goal) = self.steps_goal {
            budget.steps_goal = Some(goal);
        }
        if let Some(instructions) = &self.steps_instructions {
            budget.steps_instructions = Some(instructions.clone());
        }
        if let Some(supplements) = &self.supplements {
            budget.supplements = sqlx::types::Json(supplements.clone());
        }
        if let Some(order) = &self.eating_order {
            budget.eating_order = Some(order.clone());
        }
        if let Some(rules) = &self.eating_rules {
            budget.eating_rules = Some(rules.clone());
        }
    }
}

/// Result of a full edit-from-assignment: where the edit landed and the
/// sync reports for every assignment re-synced afterwards.
#[derive(Debug)]
pub struct EditReport {
    pub target: EditTarget,
    pub sync: Vec<SyncReport>,
}

/// Decide whether an edit through an assignment may mutate its budget in
/// place or must go to a private fork.
///
/// 1. Resolve the assignment ([`EngineError::NotFound`] otherwise).
/// 2. Count other assignments referencing the same budget.
/// 3. Zero: the budget is exclusively referenced and is returned as the
///    in-place target; its id is stable and no new budget is created.
/// 4. Nonzero: the budget is cloned with `is_public = FALSE`, the
///    assignment is repointed at the clone, and the clone is the target.
///
/// If the repoint fails after the clone was created, the distinct
/// [`EngineError::ForkRepointFailed`] carries the fork id so a retry can
/// reuse it; the orphaned private budget is a tolerated leak. The original
/// budget and every other assignment are untouched on every path.
pub async fn resolve_edit_target(
    pool: &PgPool,
    assignment_id: Uuid,
) -> Result<EditTarget, EngineError> {
    let assignment =
        assignments::get_assignment(pool, assignment_id)
            .await?
            .ok_or(EngineError::NotFound {
                entity: "assignment",
                id: assignment_id,
            })?;

    let others =
        assignments::count_other_assignments(pool, assignment.budget_id, assignment_id).await?;

    if others == 0 {
        debug!(
            assignment = %assignment_id,
            budget = %assignment.budget_id,
            "exclusive reference, editing in place"
        );
        return Ok(EditTarget {
            budget_id: assignment.budget_id,
            forked: false,
        });
    }

    let fork = budgets::clone_budget(pool, assignment.budget_id)
        .await?
        .ok_or(EngineError::NotFound {
            entity: "budget",
            id: assignment.budget_id,
        })?;

    let repointed = match assignments::repoint_assignment(pool, assignment_id, fork.id).await {
        Ok(rows) => rows,
        Err(source) => {
            return Err(EngineError::ForkRepointFailed {
                original: assignment.budget_id,
                fork: fork.id,
                assignment: assignment_id,
                source,
            });
        }
    };
    if repointed == 0 {
        return Err(EngineError::ForkRepointFailed {
            original: assignment.budget_id,
            fork: fork.id,
            assignment: assignment_id,
            source: anyhow!("assignment row no longer exists"),
        });
    }

    info!(
        assignment = %assignment_id,
        original = %assignment.budget_id,
        fork = %fork.id,
        shared_with = others,
        "budget forked for isolated edit"
    );

    Ok(EditTarget {
        budget_id: fork.id,
        forked: true,
    })
}

/// Apply a budget edit from a subscriber's context, end to end.
///
/// Resolves the edit target (forking when shared), persists the patch on
/// the target, then re-syncs once per assignment still pointing at the
/// edited budget id -- after a fork that is exactly the one repointed
/// assignment, so subscribers remaining on the original are untouched.
pub async fn edit_budget(
    pool: &PgPool,
    assignment_id: Uuid,
    changes: &BudgetChanges,
) -> Result<EditReport, EngineError> {
    let target = resolve_edit_target(pool, assignment_id).await?;

    let mut budget = budgets::get_budget(pool, target.budget_id)
        .await?
        .ok_or(EngineError::NotFound {
            entity: "budget",
            id: target.budget_id,
        })?;

    changes.apply(&mut budget);
    budgets::update_budget(pool, &budget).await?;

    let sync = sync::resync_assignments(pool, budget.id).await?;

    Ok(EditReport { target, sync })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sqlx::types::Json;

    fn budget_fixture() -> Budget {
        Budget {
            id: Uuid::new_v4(),
            name: "base".to_owned(),
            description: None,
            workout_template_id: None,
            nutrition_template_id: None,
            nutrition_targets: None,
            steps_goal: Some(7000),
            steps_instructions: None,
            supplements: Json(Vec::new()),
            eating_order: None,
            eating_rules: None,
            is_public: true,
            owner_id: Uuid::new_v4(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn empty_changes_change_nothing() {
        let changes = BudgetChanges::default();
        assert!(changes.is_empty());

        let mut budget = budget_fixture();
        let before_goal = budget.steps_goal;
        let before_name = budget.name.clone();
        changes.apply(&mut budget);
        assert_eq!(budget.steps_goal, before_goal);
        assert_eq!(budget.name, before_name);
    }

    #[test]
    fn patch_applies_only_named_fields() {
        let changes = BudgetChanges {
            steps_goal: Some(8000),
            ..Default::default()
        };
        assert!(!changes.is_empty());

        let mut budget = budget_fixture();
        changes.apply(&mut budget);
        assert_eq!(budget.steps_goal, Some(8000));
        assert_eq!(budget.name, "base");
        assert!(budget.description.is_none());
    }
}
