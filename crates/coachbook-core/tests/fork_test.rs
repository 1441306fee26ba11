//! Integration tests for copy-on-write budget edits.
//!
//! The scenarios here are the isolation guarantees: an edit from one
//! subscriber's context must never leak into another subscriber's plans.

use sqlx::PgPool;
use uuid::Uuid;

use coachbook_core::fork::{self, BudgetChanges};
use coachbook_core::{sync, EngineError};
use coachbook_db::models::{Budget, PlanKind, PlanPayload};
use coachbook_db::queries::budgets::{self, NewBudget};
use coachbook_db::queries::{assignments, generated_plans};
use coachbook_test_utils::{create_test_db, drop_test_db};

async fn insert_steps_budget(pool: &PgPool, goal: i32) -> Budget {
    budgets::insert_budget(
        pool,
        &NewBudget {
            name: "walking program",
            description: None,
            workout_template_id: None,
            nutrition_template_id: None,
            nutrition_targets: None,
            steps_goal: Some(goal),
            steps_instructions: None,
            supplements: &[],
            eating_order: None,
            eating_rules: None,
            is_public: true,
            owner_id: Uuid::new_v4(),
        },
    )
    .await
    .expect("insert_budget should succeed")
}

/// Assign and run the first sync, returning the assignment id.
async fn assign_with_sync(pool: &PgPool, subscriber: Uuid, budget_id: Uuid) -> Uuid {
    let assignment = assignments::insert_assignment(pool, budget_id, subscriber)
        .await
        .unwrap();
    sync::generate(pool, subscriber, budget_id).await.unwrap();
    assignment.id
}

async fn active_steps_goal(pool: &PgPool, subscriber: Uuid) -> (i32, Option<Uuid>) {
    let plan = generated_plans::get_active_plan(pool, subscriber, PlanKind::Steps)
        .await
        .unwrap()
        .expect("active steps plan should exist");
    match plan.decoded_payload().unwrap() {
        PlanPayload::Steps { goal, .. } => (goal, plan.budget_id),
        other => panic!("expected steps payload, got {other:?}"),
    }
}

#[tokio::test]
async fn exclusive_reference_edits_in_place() {
    let (pool, db_name) = create_test_db().await;

    let budget = insert_steps_budget(&pool, 7000).await;
    let subscriber = Uuid::new_v4();
    let assignment_id = assign_with_sync(&pool, subscriber, budget.id).await;

    let report = fork::edit_budget(
        &pool,
        assignment_id,
        &BudgetChanges {
            steps_goal: Some(8000),
            ..Default::default()
        },
    )
    .await
    .expect("edit should succeed");

    // No new budget id: the record was mutated in place.
    assert!(!report.target.forked);
    assert_eq!(report.target.budget_id, budget.id);

    let updated = budgets::get_budget(&pool, budget.id).await.unwrap().unwrap();
    assert_eq!(updated.steps_goal, Some(8000));

    let (goal, plan_budget) = active_steps_goal(&pool, subscriber).await;
    assert_eq!(goal, 8000);
    assert_eq!(plan_budget, Some(budget.id));

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn shared_edit_forks_and_isolates() {
    let (pool, db_name) = create_test_db().await;

    // Budget shared by X and Y, steps goal 7000.
    let budget = insert_steps_budget(&pool, 7000).await;
    let x = Uuid::new_v4();
    let y = Uuid::new_v4();
    let x_assignment = assign_with_sync(&pool, x, budget.id).await;
    let y_assignment = assign_with_sync(&pool, y, budget.id).await;

    // Edit from X's context while Y is still assigned.
    let report = fork::edit_budget(
        &pool,
        x_assignment,
        &BudgetChanges {
            steps_goal: Some(8000),
            ..Default::default()
        },
    )
    .await
    .expect("edit should succeed");

    assert!(report.target.forked);
    let fork_id = report.target.budget_id;
    assert_ne!(fork_id, budget.id);

    // X's assignment now points at the fork; Y's is untouched.
    let x_row = assignments::get_assignment(&pool, x_assignment)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(x_row.budget_id, fork_id);
    let y_row = assignments::get_assignment(&pool, y_assignment)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(y_row.budget_id, budget.id);

    // The fork carries the edit; the original still prescribes 7000.
    let forked = budgets::get_budget(&pool, fork_id).await.unwrap().unwrap();
    assert_eq!(forked.steps_goal, Some(8000));
    assert!(!forked.is_public);
    let original = budgets::get_budget(&pool, budget.id).await.unwrap().unwrap();
    assert_eq!(original.steps_goal, Some(7000));

    // X's active steps plan reads 8000 from the fork; Y's still reads
    // 7000 and still points at the original.
    let (x_goal, x_budget) = active_steps_goal(&pool, x).await;
    assert_eq!(x_goal, 8000);
    assert_eq!(x_budget, Some(fork_id));
    let (y_goal, y_budget) = active_steps_goal(&pool, y).await;
    assert_eq!(y_goal, 7000);
    assert_eq!(y_budget, Some(budget.id));

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn fork_never_appears_in_shared_listing() {
    let (pool, db_name) = create_test_db().await;

    let budget = insert_steps_budget(&pool, 7000).await;
    let x_assignment = assign_with_sync(&pool, Uuid::new_v4(), budget.id).await;
    assign_with_sync(&pool, Uuid::new_v4(), budget.id).await;

    let report = fork::edit_budget(
        &pool,
        x_assignment,
        &BudgetChanges {
            steps_goal: Some(9000),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert!(report.target.forked);

    let shared = budgets::list_shared_budgets(&pool).await.unwrap();
    assert_eq!(shared.len(), 1);
    assert_eq!(shared[0].id, budget.id);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn edit_after_fork_is_exclusive_again() {
    let (pool, db_name) = create_test_db().await;

    let budget = insert_steps_budget(&pool, 7000).await;
    let x_assignment = assign_with_sync(&pool, Uuid::new_v4(), budget.id).await;
    let y_assignment = assign_with_sync(&pool, Uuid::new_v4(), budget.id).await;

    let first = fork::edit_budget(
        &pool,
        x_assignment,
        &BudgetChanges {
            steps_goal: Some(8000),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert!(first.target.forked);

    // X left the original, so Y now holds an exclusive reference and
    // edits land in place.
    let second = fork::edit_budget(
        &pool,
        y_assignment,
        &BudgetChanges {
            steps_goal: Some(6000),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert!(!second.target.forked);
    assert_eq!(second.target.budget_id, budget.id);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn resolve_edit_target_missing_assignment_is_not_found() {
    let (pool, db_name) = create_test_db().await;

    let err = fork::resolve_edit_target(&pool, Uuid::new_v4())
        .await
        .expect_err("missing assignment should fail");
    assert!(matches!(
        err,
        EngineError::NotFound {
            entity: "assignment",
            ..
        }
    ));

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn resync_after_edit_touches_only_remaining_assignments() {
    let (pool, db_name) = create_test_db().await;

    let budget = insert_steps_budget(&pool, 7000).await;
    let x = Uuid::new_v4();
    let y = Uuid::new_v4();
    let x_assignment = assign_with_sync(&pool, x, budget.id).await;
    assign_with_sync(&pool, y, budget.id).await;

    let report = fork::edit_budget(
        &pool,
        x_assignment,
        &BudgetChanges {
            steps_goal: Some(8000),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    // After the fork only X's repointed assignment was re-synced.
    assert_eq!(report.sync.len(), 1);
    assert_eq!(report.sync[0].subscriber_id, x);

    // Y still has exactly one steps plan (the original sync), not two.
    let y_plans = generated_plans::list_plans_for_subscriber(&pool, y, Some(PlanKind::Steps))
        .await
        .unwrap();
    assert_eq!(y_plans.len(), 1);

    pool.close().await;
    drop_test_db(&db_name).await;
}
