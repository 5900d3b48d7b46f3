//! SMS credit wallets
//!
//! Churches prepay for outbound SMS. Top-ups arrive as gateway charges with
//! an UNPREFIXED reference; the reconciler routes them here once the intent
//! is settled. Balances only move through the ledgered transaction insert +
//! atomic balance update below.

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use time::OffsetDateTime;

use crate::error::{BillingError, BillingResult};
use crate::events::{ActorType, BillingEventBuilder, BillingEventLogger, BillingEventType};
use crate::gateway::{PaymentGateway, PaymentSession};
use crate::intents::{NewPaymentIntent, PaymentIntentLedger, ReferenceKind};
use std::sync::Arc;

/// A church's SMS credit wallet
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SmsCreditWallet {
    pub id: i64,
    pub church_id: i64,
    pub balance_cents: i64,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// SMS credit wallet service
pub struct SmsCreditService {
    pool: PgPool,
    events: BillingEventLogger,
    ledger: PaymentIntentLedger,
    gateway: Arc<dyn PaymentGateway>,
}

impl SmsCreditService {
    pub fn new(pool: PgPool, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self {
            events: BillingEventLogger::new(pool.clone()),
            ledger: PaymentIntentLedger::new(pool.clone()),
            pool,
            gateway,
        }
    }

    pub async fn get_or_create_wallet(&self, church_id: i64) -> BillingResult<SmsCreditWallet> {
        let wallet: SmsCreditWallet = sqlx::query_as(
            r#"
            INSERT INTO sms_credit_wallets (church_id, balance_cents)
            VALUES ($1, 0)
            ON CONFLICT (church_id) DO UPDATE SET church_id = EXCLUDED.church_id
            RETURNING *
            "#,
        )
        .bind(church_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(wallet)
    }

    pub async fn balance(&self, church_id: i64) -> BillingResult<i64> {
        let balance: Option<(i64,)> =
            sqlx::query_as("SELECT balance_cents FROM sms_credit_wallets WHERE church_id = $1")
                .bind(church_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(balance.map(|(b,)| b).unwrap_or(0))
    }

    /// Open a top-up purchase: unprefixed intent carrying the metadata the
    /// webhook will need, plus a hosted checkout session.
    pub async fn initiate_top_up(
        &self,
        church_id: i64,
        credit_amount_cents: i64,
        email: &str,
    ) -> BillingResult<PaymentSession> {
        if credit_amount_cents <= 0 {
            return Err(BillingError::InvalidInput(
                "Credit amount must be positive".to_string(),
            ));
        }

        self.get_or_create_wallet(church_id).await?;

        let intent = self
            .ledger
            .create(NewPaymentIntent {
                church_id,
                amount_cents: credit_amount_cents,
                kind: ReferenceKind::SmsCredit,
                description: "SMS credit top-up".to_string(),
                metadata: serde_json::json!({
                    "church_id": church_id,
                    "credit_amount_cents": credit_amount_cents,
                }),
            })
            .await?;

        self.gateway
            .initialize_payment(email, credit_amount_cents, &intent.reference)
            .await
    }

    /// Credit the wallet from a settled top-up intent.
    ///
    /// Requires `church_id` and `credit_amount_cents` in the intent metadata;
    /// the reconciler acknowledges without side effects when they are absent.
    pub async fn top_up_from_payment(
        &self,
        metadata: &serde_json::Value,
        reference: &str,
    ) -> BillingResult<SmsCreditWallet> {
        let church_id = metadata
            .get("church_id")
            .and_then(|v| v.as_i64())
            .ok_or_else(|| BillingError::MissingMetadata("church_id".to_string()))?;
        let credit_amount_cents = metadata
            .get("credit_amount_cents")
            .and_then(|v| v.as_i64())
            .ok_or_else(|| BillingError::MissingMetadata("credit_amount_cents".to_string()))?;

        self.get_or_create_wallet(church_id).await?;

        let wallet: SmsCreditWallet = sqlx::query_as(
            r#"
            UPDATE sms_credit_wallets
            SET balance_cents = balance_cents + $2, updated_at = NOW()
            WHERE church_id = $1
            RETURNING *
            "#,
        )
        .bind(church_id)
        .bind(credit_amount_cents)
        .fetch_one(&self.pool)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO sms_credit_transactions
                (church_id, amount_cents, balance_after_cents, transaction_type, reference)
            VALUES ($1, $2, $3, 'PURCHASE', $4)
            "#,
        )
        .bind(church_id)
        .bind(credit_amount_cents)
        .bind(wallet.balance_cents)
        .bind(reference)
        .execute(&self.pool)
        .await?;

        self.events
            .log_event(
                BillingEventBuilder::new(church_id, BillingEventType::SmsCreditsPurchased)
                    .actor(ActorType::Gateway)
                    .reference(reference)
                    .data(serde_json::json!({
                        "credit_amount_cents": credit_amount_cents,
                        "balance_cents": wallet.balance_cents,
                    })),
            )
            .await?;

        tracing::info!(
            church_id = church_id,
            credit_amount_cents = credit_amount_cents,
            balance_cents = wallet.balance_cents,
            reference = %reference,
            "SMS credits purchased"
        );

        Ok(wallet)
    }
}
