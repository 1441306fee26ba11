//! Integration tests for database migrations and pool helpers.
//!
//! Uses a shared PostgreSQL container (or `COACHBOOK_TEST_PG_URL`); each
//! test gets its own temporary database so tests are fully isolated.

use coachbook_db::pool;
use coachbook_test_utils::{create_test_db, drop_test_db};

#[tokio::test]
async fn migrations_create_expected_tables() {
    let (pool, db_name) = create_test_db().await;

    let counts = pool::table_counts(&pool).await.expect("tables should exist");
    let names: Vec<&str> = counts.iter().map(|(name, _)| *name).collect();

    assert_eq!(names, vec!["budgets", "budget_assignments", "generated_plans"]);
    assert!(counts.iter().all(|(_, count)| *count == 0));

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn migrations_are_idempotent() {
    let (pool, db_name) = create_test_db().await;

    // Running the migrator again must be a no-op, not an error.
    pool::run_migrations(&pool)
        .await
        .expect("re-running migrations should succeed");

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn single_active_index_rejects_second_active_row() {
    let (pool, db_name) = create_test_db().await;

    let subscriber = uuid::Uuid::new_v4();
    let insert = "INSERT INTO generated_plans (subscriber_id, kind, payload) \
                  VALUES ($1, 'steps', '{\"kind\":\"steps\",\"goal\":5000}'::jsonb)";

    sqlx::query(insert)
        .bind(subscriber)
        .execute(&pool)
        .await
        .expect("first active row should insert");

    let second = sqlx::query(insert).bind(subscriber).execute(&pool).await;
    assert!(
        second.is_err(),
        "two active plans for one (subscriber, kind) must violate the index"
    );

    pool.close().await;
    drop_test_db(&db_name).await;
}
