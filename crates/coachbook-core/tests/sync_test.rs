//! Integration tests for the plan synchronizer.
//!
//! Each test creates a temporary database via the shared test container,
//! so tests are fully isolated.

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use coachbook_core::sync::{self, SyncAction};
use coachbook_core::EngineError;
use coachbook_db::models::{Budget, NutritionTargets, PlanKind, PlanPayload, Supplement};
use coachbook_db::queries::budgets::{self, NewBudget};
use coachbook_db::queries::generated_plans::{self, NewGeneratedPlan};
use coachbook_test_utils::{create_test_db, drop_test_db};

async fn insert_full_budget(pool: &PgPool) -> Budget {
    let targets = NutritionTargets {
        calories: Some(2000),
        protein_g: Some(150),
        carbs_g: None,
        fat_g: None,
    };
    let supplements = vec![Supplement {
        name: "creatine".to_owned(),
        dosage: Some("5g".to_owned()),
        timing: None,
        notes: None,
    }];
    budgets::insert_budget(
        pool,
        &NewBudget {
            name: "full program",
            description: None,
            workout_template_id: Some(Uuid::new_v4()),
            nutrition_template_id: None,
            nutrition_targets: Some(&targets),
            steps_goal: Some(7000),
            steps_instructions: Some("spread through the day"),
            supplements: &supplements,
            eating_order: None,
            eating_rules: None,
            is_public: true,
            owner_id: Uuid::new_v4(),
        },
    )
    .await
    .expect("insert_budget should succeed")
}

async fn insert_steps_budget(pool: &PgPool, goal: i32) -> Budget {
    budgets::insert_budget(
        pool,
        &NewBudget {
            name: "steps only",
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

/// Count active plans per kind; the invariant is at most one.
async fn count_active(pool: &PgPool, subscriber: Uuid, kind: PlanKind) -> i64 {
    let row: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM generated_plans \
         WHERE subscriber_id = $1 AND kind = $2 AND is_active = TRUE",
    )
    .bind(subscriber)
    .bind(kind)
    .fetch_one(pool)
    .await
    .expect("count should succeed");
    row.0
}

#[tokio::test]
async fn generate_creates_plans_for_prescribed_kinds_only() {
    let (pool, db_name) = create_test_db().await;

    let budget = insert_full_budget(&pool).await;
    let subscriber = Uuid::new_v4();

    let report = sync::generate(&pool, subscriber, budget.id)
        .await
        .expect("generate should succeed");

    // Workout, nutrition, supplement, steps are prescribed; all created.
    assert_eq!(report.outcomes.len(), 4);
    assert!(report
        .outcomes
        .iter()
        .all(|o| matches!(o.action, SyncAction::Created { .. })));

    for kind in PlanKind::ALL {
        let active = generated_plans::get_active_plan(&pool, subscriber, kind)
            .await
            .unwrap()
            .expect("each prescribed kind should have an active plan");
        assert_eq!(active.budget_id, Some(budget.id));
    }

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn empty_budget_generates_nothing() {
    let (pool, db_name) = create_test_db().await;

    let budget = budgets::insert_budget(
        &pool,
        &NewBudget {
            name: "empty",
            description: None,
            workout_template_id: None,
            nutrition_template_id: None,
            nutrition_targets: None,
            steps_goal: None,
            steps_instructions: None,
            supplements: &[],
            eating_order: None,
            eating_rules: None,
            is_public: true,
            owner_id: Uuid::new_v4(),
        },
    )
    .await
    .unwrap();
    let subscriber = Uuid::new_v4();

    let report = sync::generate(&pool, subscriber, budget.id).await.unwrap();
    assert!(report.outcomes.is_empty());

    let plans = generated_plans::list_plans_for_subscriber(&pool, subscriber, None)
        .await
        .unwrap();
    assert!(plans.is_empty());

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn generate_missing_budget_is_not_found() {
    let (pool, db_name) = create_test_db().await;

    let err = sync::generate(&pool, Uuid::new_v4(), Uuid::new_v4())
        .await
        .expect_err("missing budget should fail");
    assert!(matches!(
        err,
        EngineError::NotFound {
            entity: "budget",
            ..
        }
    ));

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn regenerate_retires_and_keeps_single_active() {
    let (pool, db_name) = create_test_db().await;

    let budget = insert_steps_budget(&pool, 7000).await;
    let subscriber = Uuid::new_v4();

    let first = sync::generate(&pool, subscriber, budget.id).await.unwrap();
    let first_id = match first.outcomes[0].action {
        SyncAction::Created { created } => created,
        ref other => panic!("expected Created, got {other:?}"),
    };

    let second = sync::generate(&pool, subscriber, budget.id).await.unwrap();
    match second.outcomes[0].action {
        SyncAction::Replaced { retired, created } => {
            assert_eq!(retired, first_id);
            assert_ne!(created, first_id);
        }
        ref other => panic!("expected Replaced, got {other:?}"),
    }

    assert_eq!(count_active(&pool, subscriber, PlanKind::Steps).await, 1);

    // Append-only versioning: the retired row survives with its payload
    // untouched, closed out by end_date.
    let retired = generated_plans::get_generated_plan(&pool, first_id)
        .await
        .unwrap()
        .unwrap();
    assert!(!retired.is_active);
    assert!(retired.end_date.is_some());
    assert_eq!(
        retired.decoded_payload().unwrap(),
        PlanPayload::Steps {
            goal: 7000,
            instructions: None,
        }
    );

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn manual_override_is_never_clobbered() {
    let (pool, db_name) = create_test_db().await;

    let budget = insert_full_budget(&pool).await;
    let subscriber = Uuid::new_v4();

    // An operator-entered steps plan, not derived from any budget.
    let manual = generated_plans::insert_generated_plan(
        &pool,
        &NewGeneratedPlan {
            subscriber_id: subscriber,
            kind: PlanKind::Steps,
            budget_id: None,
            payload: PlanPayload::Steps {
                goal: 4000,
                instructions: Some("post-surgery limit".to_owned()),
            }
            .to_value(),
            start_date: Utc::now(),
        },
    )
    .await
    .unwrap();

    let report = sync::generate(&pool, subscriber, budget.id).await.unwrap();

    assert_eq!(report.skipped_kinds(), vec![PlanKind::Steps]);

    // The override is still the active steps plan, payload intact.
    let active = generated_plans::get_active_plan(&pool, subscriber, PlanKind::Steps)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(active.id, manual.id);
    assert_eq!(
        active.decoded_payload().unwrap(),
        PlanPayload::Steps {
            goal: 4000,
            instructions: Some("post-surgery limit".to_owned()),
        }
    );

    // Other kinds were synced normally.
    assert_eq!(count_active(&pool, subscriber, PlanKind::Workout).await, 1);
    assert_eq!(count_active(&pool, subscriber, PlanKind::Nutrition).await, 1);
    assert_eq!(count_active(&pool, subscriber, PlanKind::Supplement).await, 1);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn repeated_generate_holds_invariant_across_all_kinds() {
    let (pool, db_name) = create_test_db().await;

    let budget = insert_full_budget(&pool).await;
    let subscriber = Uuid::new_v4();

    for _ in 0..3 {
        sync::generate(&pool, subscriber, budget.id).await.unwrap();
    }

    for kind in PlanKind::ALL {
        assert_eq!(
            count_active(&pool, subscriber, kind).await,
            1,
            "exactly one active {kind} plan after repeated syncs"
        );
    }

    // Three syncs, four kinds: the full history is retained.
    let all = generated_plans::list_plans_for_subscriber(&pool, subscriber, None)
        .await
        .unwrap();
    assert_eq!(all.len(), 12);

    pool.close().await;
    drop_test_db(&db_name).await;
}
