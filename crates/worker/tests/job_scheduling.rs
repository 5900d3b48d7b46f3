//! Integration tests for job scheduling invariants
//!
//! ## Running Tests
//! ```bash
//! export DATABASE_URL="postgres://localhost/shepherd_test"
//! cargo test -p shepherd-worker --test job_scheduling -- --ignored --test-threads=1
//! ```

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;
use time::OffsetDateTime;

use shepherd_billing::{
    BillingEngine, BillingError, BillingResult, ChargeOutcome, PaymentGateway, PaymentSession,
};
use shepherd_shared::types::JobStatus;
use shepherd_worker::{JobExecutionService, JobRunner};

struct StubGateway;

#[async_trait]
impl PaymentGateway for StubGateway {
    async fn initialize_payment(
        &self,
        _email: &str,
        _amount_cents: i64,
        reference: &str,
    ) -> BillingResult<PaymentSession> {
        Ok(PaymentSession {
            authorization_url: format!("https://checkout.test/{}", reference),
            access_code: "access_test".to_string(),
            reference: reference.to_string(),
        })
    }

    async fn charge_authorization(
        &self,
        _authorization_code: &str,
        _email: &str,
        _amount_cents: i64,
        reference: &str,
    ) -> BillingResult<ChargeOutcome> {
        Ok(ChargeOutcome {
            success: true,
            transaction_id: Some(format!("txn-{}", reference)),
            message: None,
        })
    }
}

async fn setup() -> (JobRunner, PgPool) {
    let database_url =
        std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for integration tests");

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("Failed to connect to test database");

    shepherd_shared::db::run_migrations(&pool)
        .await
        .expect("Failed to run migrations");

    let engine = Arc::new(BillingEngine::with_gateway(
        pool.clone(),
        "whsec_test_secret".to_string(),
        Arc::new(StubGateway),
    ));

    (JobRunner::new(pool.clone(), engine), pool)
}

async fn create_suspended_church(pool: &PgPool, retention_end_days_ago: i64) -> i64 {
    let church_id: (i64,) = sqlx::query_as(
        "INSERT INTO churches (name, email, member_count) VALUES ('Expired Church', 'x@test.church', 50) RETURNING id",
    )
    .fetch_one(pool)
    .await
    .unwrap();

    let tier: (i64,) = sqlx::query_as("SELECT id FROM pricing_tiers WHERE tier_name = 'TIER_1'")
        .fetch_one(pool)
        .await
        .unwrap();

    let now = OffsetDateTime::now_utc();
    let today = now.date();

    sqlx::query(
        r#"
        INSERT INTO church_subscriptions
            (church_id, status, tier_id, billing_interval, suspended_at,
             data_retention_end_date, deletion_warning_sent_at)
        VALUES ($1, 'SUSPENDED', $2, 'MONTHLY', $3, $4, $5)
        "#,
    )
    .bind(church_id.0)
    .bind(tier.0)
    .bind(now - time::Duration::days(40))
    .bind(today - time::Duration::days(retention_end_days_ago))
    .bind(now - time::Duration::days(10))
    .execute(pool)
    .await
    .unwrap();

    church_id.0
}

#[tokio::test]
#[ignore] // Requires database
async fn second_start_while_running_is_rejected() {
    let (runner, _pool) = setup().await;
    let executions = runner.executions();

    let first = executions
        .start("deleteExpiredChurchData", "test", true, Some("tester"), None, 0)
        .await
        .unwrap();

    // The slot is held: a second start must be rejected, not queued
    let err = runner
        .trigger("deleteExpiredChurchData", true, Some("tester"))
        .await
        .unwrap_err();
    assert!(matches!(err, BillingError::JobAlreadyRunning(_)));

    // After the run closes, a new one is accepted
    executions.complete(first.id, 0, 0).await.unwrap();

    let execution_id = runner
        .trigger("deleteExpiredChurchData", true, Some("tester"))
        .await
        .unwrap();
    assert!(execution_id > first.id);
}

#[tokio::test]
#[ignore] // Requires database
async fn retry_creates_linked_execution_with_bumped_count() {
    let (runner, _pool) = setup().await;
    let executions = runner.executions();

    let failed = executions
        .start("weeklyCleanup", "test", false, None, None, 0)
        .await
        .unwrap();
    executions
        .fail(failed.id, &anyhow::anyhow!("simulated failure"))
        .await
        .unwrap();

    let retried_id = runner.retry(failed.id, "tester").await.unwrap();
    let retried = executions.get(retried_id).await.unwrap();

    assert_eq!(retried.retry_count, 1);
    assert_eq!(retried.retry_of, Some(failed.id));
    assert!(retried.manually_triggered);
    assert_eq!(retried.job_status(), JobStatus::Success);
}

#[tokio::test]
#[ignore] // Requires database
async fn retry_of_non_failed_execution_is_rejected() {
    let (runner, _pool) = setup().await;
    let executions = runner.executions();

    let execution = executions
        .start("weeklyCleanup", "test", false, None, None, 0)
        .await
        .unwrap();
    executions.complete(execution.id, 0, 0).await.unwrap();

    let err = runner.retry(execution.id, "tester").await.unwrap_err();
    assert!(matches!(err, BillingError::InvalidInput(_)));
}

#[tokio::test]
#[ignore] // Requires database
async fn deletion_job_removes_only_expired_churches() {
    let (runner, pool) = setup().await;

    // Three churches past their retention window, one still inside it
    let expired_a = create_suspended_church(&pool, 5).await;
    let expired_b = create_suspended_church(&pool, 3).await;
    let expired_c = create_suspended_church(&pool, 1).await;
    let future: i64 = {
        let id = create_suspended_church(&pool, 0).await;
        // Push the retention end 10 days into the future
        sqlx::query(
            "UPDATE church_subscriptions SET data_retention_end_date = CURRENT_DATE + 10 WHERE church_id = $1",
        )
        .bind(id)
        .execute(&pool)
        .await
        .unwrap();
        id
    };

    let execution_id = runner
        .trigger("deleteExpiredChurchData", true, Some("tester"))
        .await
        .unwrap();

    let execution = runner.executions().get(execution_id).await.unwrap();
    assert_eq!(execution.job_status(), JobStatus::Success);
    assert_eq!(execution.items_processed, Some(3));
    assert_eq!(execution.items_failed, Some(0));

    for id in [expired_a, expired_b, expired_c] {
        let gone: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM churches WHERE id = $1")
            .bind(id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(gone.0, 0, "church {} should be deleted", id);
    }

    let kept: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM churches WHERE id = $1")
        .bind(future)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(kept.0, 1, "church inside the retention window must be untouched");
}
