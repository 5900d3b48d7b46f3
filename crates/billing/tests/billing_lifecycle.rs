//! Integration tests for the billing lifecycle
//!
//! These exercise the real schema: webhook idempotency under duplicate
//! delivery, the suspension/retention timeline, and the no-auto-reactivation
//! rail.
//!
//! ## Running Tests
//! ```bash
//! export DATABASE_URL="postgres://localhost/shepherd_test"
//! cargo test -p shepherd-billing --test billing_lifecycle -- --ignored --test-threads=1
//! ```

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use sha2::Sha512;
use sqlx::PgPool;
use std::sync::Arc;
use time::OffsetDateTime;

use shepherd_billing::{
    BillingEngine, BillingResult, ChargeOutcome, PaymentGateway, PaymentSession, WebhookOutcome,
};
use shepherd_shared::types::SubscriptionStatus;

const WEBHOOK_SECRET: &str = "whsec_test_secret";

/// Gateway stub: every checkout opens, every charge succeeds
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

async fn setup() -> (BillingEngine, PgPool) {
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

    let engine =
        BillingEngine::with_gateway(pool.clone(), WEBHOOK_SECRET.to_string(), Arc::new(StubGateway));

    (engine, pool)
}

async fn create_test_church(pool: &PgPool) -> i64 {
    let id: (i64,) = sqlx::query_as(
        "INSERT INTO churches (name, email, member_count) VALUES ($1, $2, 150) RETURNING id",
    )
    .bind("Test Church")
    .bind("billing@test.church")
    .fetch_one(pool)
    .await
    .expect("Failed to create test church");

    id.0
}

async fn tier_id(pool: &PgPool, name: &str) -> i64 {
    let id: (i64,) = sqlx::query_as("SELECT id FROM pricing_tiers WHERE tier_name = $1")
        .bind(name)
        .fetch_one(pool)
        .await
        .expect("Seeded tier missing");
    id.0
}

fn sign(body: &[u8]) -> String {
    let mut mac = Hmac::<Sha512>::new_from_slice(WEBHOOK_SECRET.as_bytes()).unwrap();
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

fn charge_success_payload(reference: &str) -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({
        "event": "charge.success",
        "data": {
            "id": 123456,
            "reference": reference,
            "authorization": { "authorization_code": "AUTH_test" }
        }
    }))
    .unwrap()
}

#[tokio::test]
#[ignore] // Requires database
async fn addon_webhook_delivered_twice_activates_once() {
    let (engine, pool) = setup().await;
    let church_id = create_test_church(&pool).await;
    let tier = tier_id(&pool, "TIER_1").await;

    let today = OffsetDateTime::now_utc().date();
    engine
        .subscriptions
        .start_trial(church_id, tier, Default::default(), 14, today)
        .await
        .unwrap();

    let session = engine
        .addons
        .initiate_purchase(church_id, 1, "billing@test.church")
        .await
        .unwrap();

    let payload = charge_success_payload(&session.reference);
    let signature = sign(&payload);

    // First delivery applies the effect
    let first = engine.reconciler.handle_webhook(&payload, &signature).await.unwrap();
    assert_eq!(first, WebhookOutcome::Processed);

    // Simulated gateway retry: same payload, same signature
    let second = engine.reconciler.handle_webhook(&payload, &signature).await.unwrap();
    assert_eq!(second, WebhookOutcome::AlreadyProcessed);

    let intent = engine
        .intents
        .find_by_reference(&session.reference)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(intent.payment_status(), shepherd_shared::types::PaymentStatus::Success);

    let active: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM church_storage_addons WHERE church_id = $1 AND status = 'ACTIVE'",
    )
    .bind(church_id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(active.0, 1);
}

#[tokio::test]
#[ignore] // Requires database
async fn suspension_starts_thirty_day_retention_and_extension_adds_to_it() {
    let (engine, pool) = setup().await;
    let church_id = create_test_church(&pool).await;
    let tier = tier_id(&pool, "TIER_1").await;

    let today = OffsetDateTime::now_utc().date();

    sqlx::query(
        r#"
        INSERT INTO church_subscriptions
            (church_id, status, tier_id, billing_interval, next_billing_date)
        VALUES ($1, 'PAST_DUE', $2, 'MONTHLY', $3)
        "#,
    )
    .bind(church_id)
    .bind(tier)
    .bind(today - time::Duration::days(10))
    .execute(&pool)
    .await
    .unwrap();

    let suspended = engine
        .subscriptions
        .suspend(church_id, today, 30)
        .await
        .unwrap()
        .expect("should suspend");

    assert_eq!(suspended.subscription_status(), SubscriptionStatus::Suspended);
    assert_eq!(
        suspended.data_retention_end_date,
        Some(today + time::Duration::days(30))
    );

    let extended = engine
        .retention
        .extend(church_id, 14, "Pastor asked for more time", "ops@platform")
        .await
        .unwrap();

    assert_eq!(
        extended.data_retention_end_date,
        Some(today + time::Duration::days(44))
    );
    assert_eq!(extended.retention_extension_days, 14);
}

#[tokio::test]
#[ignore] // Requires database
async fn cancel_deletion_never_reactivates() {
    let (engine, pool) = setup().await;
    let church_id = create_test_church(&pool).await;
    let tier = tier_id(&pool, "TIER_1").await;

    let today = OffsetDateTime::now_utc().date();

    sqlx::query(
        r#"
        INSERT INTO church_subscriptions
            (church_id, status, tier_id, billing_interval, next_billing_date)
        VALUES ($1, 'PAST_DUE', $2, 'MONTHLY', $3)
        "#,
    )
    .bind(church_id)
    .bind(tier)
    .bind(today - time::Duration::days(10))
    .execute(&pool)
    .await
    .unwrap();

    engine.subscriptions.suspend(church_id, today, 30).await.unwrap();

    let after_cancel = engine
        .retention
        .cancel_deletion(church_id, "ops@platform")
        .await
        .unwrap();

    // Countdown cleared, status untouched
    assert_eq!(after_cancel.subscription_status(), SubscriptionStatus::Suspended);
    assert_eq!(after_cancel.data_retention_end_date, None);

    // Even a successful subscription payment does not bring it back
    let intent = engine
        .intents
        .create(shepherd_billing::NewPaymentIntent {
            church_id,
            amount_cents: 15_000,
            kind: shepherd_billing::ReferenceKind::Subscription,
            description: "Subscription payment".to_string(),
            metadata: serde_json::json!({ "tier_id": tier, "billing_interval": "MONTHLY" }),
        })
        .await
        .unwrap();

    let payload = charge_success_payload(&intent.reference);
    let outcome = engine
        .reconciler
        .handle_webhook(&payload, &sign(&payload))
        .await
        .unwrap();
    assert_eq!(outcome, WebhookOutcome::Processed);

    let still_suspended = engine.subscriptions.get(church_id).await.unwrap();
    assert_eq!(
        still_suspended.subscription_status(),
        SubscriptionStatus::Suspended
    );

    // Only the explicit manual operation reactivates
    let reactivated = engine
        .subscriptions
        .reactivate(church_id, 1, today, "ops@platform")
        .await
        .unwrap();
    assert_eq!(reactivated.subscription_status(), SubscriptionStatus::Active);
}

#[tokio::test]
#[ignore] // Requires database
async fn bad_signature_is_rejected_without_state_change() {
    let (engine, pool) = setup().await;
    let church_id = create_test_church(&pool).await;
    let tier = tier_id(&pool, "TIER_1").await;

    let today = OffsetDateTime::now_utc().date();
    engine
        .subscriptions
        .start_trial(church_id, tier, Default::default(), 14, today)
        .await
        .unwrap();

    let intent = engine
        .intents
        .create(shepherd_billing::NewPaymentIntent {
            church_id,
            amount_cents: 15_000,
            kind: shepherd_billing::ReferenceKind::Subscription,
            description: "Subscription payment".to_string(),
            metadata: serde_json::json!({ "tier_id": tier, "billing_interval": "MONTHLY" }),
        })
        .await
        .unwrap();

    let payload = charge_success_payload(&intent.reference);
    let err = engine
        .reconciler
        .handle_webhook(&payload, "00deadbeef")
        .await
        .unwrap_err();
    assert!(matches!(err, shepherd_billing::BillingError::InvalidSignature));

    let unchanged = engine.intents.find_by_reference(&intent.reference).await.unwrap().unwrap();
    assert_eq!(unchanged.status, "PENDING");

    let subscription = engine.subscriptions.get(church_id).await.unwrap();
    assert_eq!(subscription.subscription_status(), SubscriptionStatus::Trialing);
}
