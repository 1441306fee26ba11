//! Database query functions for the `budgets` table.

use anyhow::{Context, Result};
use sqlx::PgPool;
use sqlx::types::Json;
use uuid::Uuid;

use crate::models::{Budget, NutritionTargets, Supplement};

/// Parameters for inserting a new budget row.
#[derive(Debug, Clone)]
pub struct NewBudget<'a> {
    pub name: &'a str,
    pub description: Option<&'a str>,
    pub workout_template_id: Option<Uuid>,
    pub nutrition_template_id: Option<Uuid>,
    pub nutrition_targets: Option<&'a NutritionTargets>,
    pub steps_goal: Option<i32>,
    pub steps_instructions: Option<&'a str>,
    pub supplements: &'a [Supplement],
    pub eating_order: Option<&'a str>,
    pub eating_rules: Option<&'a str>,
    pub is_public: bool,
    pub owner_id: Uuid,
}

/// Insert a new budget row. Returns the inserted budget with
/// server-generated defaults (id, created_at).
pub async fn insert_budget(pool: &PgPool, new: &NewBudget<'_>) -> Result<Budget> {
    let budget = sqlx::query_as::<_, Budget>(
        "INSERT INTO budgets (name, description, workout_template_id, \
         nutrition_template_id, nutrition_targets, steps_goal, \
         steps_instructions, supplements, eating_order, eating_rules, \
         is_public, owner_id) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
         RETURNING *",
    )
    .bind(new.name)
    .bind(new.description)
    .bind(new.workout_template_id)
    .bind(new.nutrition_template_id)
    .bind(new.nutrition_targets.map(Json))
    .bind(new.steps_goal)
    .bind(new.steps_instructions)
    .bind(Json(new.supplements))
    .bind(new.eating_order)
    .bind(new.eating_rules)
    .bind(new.is_public)
    .bind(new.owner_id)
    .fetch_one(pool)
    .await
    .with_context(|| format!("failed to insert budget {:?}", new.name))?;

    Ok(budget)
}

/// Fetch a budget by its ID.
pub async fn get_budget(pool: &PgPool, id: Uuid) -> Result<Option<Budget>> {
    let budget = sqlx::query_as::<_, Budget>("SELECT * FROM budgets WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch budget")?;

    Ok(budget)
}

/// List shared budget templates, newest first.
///
/// Private forks (`is_public = false`) are excluded: they are visible only
/// through the assignment that owns them.
pub async fn list_shared_budgets(pool: &PgPool) -> Result<Vec<Budget>> {
    let budgets = sqlx::query_as::<_, Budget>(
        "SELECT * FROM budgets WHERE is_public = TRUE ORDER BY created_at DESC",
    )
    .fetch_all(pool)
    .await
    .context("failed to list shared budgets")?;

    Ok(budgets)
}

/// List all budgets created by a given owner, newest first. Includes
/// private forks, which a coach may want to inspect directly.
pub async fn list_budgets_for_owner(pool: &PgPool, owner_id: Uuid) -> Result<Vec<Budget>> {
    let budgets = sqlx::query_as::<_, Budget>(
        "SELECT * FROM budgets WHERE owner_id = $1 ORDER BY created_at DESC",
    )
    .bind(owner_id)
    .fetch_all(pool)
    .await
    .context("failed to list budgets for owner")?;

    Ok(budgets)
}

/// Update the mutable fields of a budget in place.
///
/// `id`, `owner_id`, and `created_at` are never rewritten. Callers must go
/// through the fork resolver before updating a budget that may be shared.
pub async fn update_budget(pool: &PgPool, budget: &Budget) -> Result<()> {
    let result = sqlx::query(
        "UPDATE budgets \
         SET name = $1, description = $2, workout_template_id = $3, \
             nutrition_template_id = $4, nutrition_targets = $5, \
             steps_goal = $6, steps_instructions = $7, supplements = $8, \
             eating_order = $9, eating_rules = $10, is_public = $11 \
         WHERE id = $12",
    )
    .bind(&budget.name)
    .bind(&budget.description)
    .bind(budget.workout_template_id)
    .bind(budget.nutrition_template_id)
    .bind(&budget.nutrition_targets)
    .bind(budget.steps_goal)
    .bind(&budget.steps_instructions)
    .bind(&budget.supplements)
    .bind(&budget.eating_order)
    .bind(&budget.eating_rules)
    .bind(budget.is_public)
    .bind(budget.id)
    .execute(pool)
    .await
    .context("failed to update budget")?;

    if result.rows_affected() == 0 {
        anyhow::bail!("budget {} not found", budget.id);
    }

    Ok(())
}

/// Deep-copy a budget into a new private row.
///
/// Copies every prescription field; the copy gets a fresh id, the original
/// owner, `is_public = FALSE`, and a server-side `created_at`. A single
/// INSERT..SELECT, so the clone is atomic. Returns `None` when the source
/// budget does not exist.
pub async fn clone_budget(pool: &PgPool, id: Uuid) -> Result<Option<Budget>> {
    let budget = sqlx::query_as::<_, Budget>(
        "INSERT INTO budgets (name, description, workout_template_id, \
         nutrition_template_id, nutrition_targets, steps_goal, \
         steps_instructions, supplements, eating_order, eating_rules, \
         is_public, owner_id) \
         SELECT name, description, workout_template_id, \
                nutrition_template_id, nutrition_targets, steps_goal, \
                steps_instructions, supplements, eating_order, eating_rules, \
                FALSE, owner_id \
         FROM budgets WHERE id = $1 \
         RETURNING *",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .with_context(|| format!("failed to clone budget {id}"))?;

    Ok(budget)
}

/// Delete a budget by its ID.
///
/// Fails while any assignment still references it (foreign key); generated
/// plans are detached by the ON DELETE SET NULL constraint.
pub async fn delete_budget(pool: &PgPool, id: Uuid) -> Result<()> {
    let result = sqlx::query("DELETE FROM budgets WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .context("failed to delete budget")?;

    if result.rows_affected() == 0 {
        anyhow::bail!("budget {id} not found");
    }

    Ok(())
}
