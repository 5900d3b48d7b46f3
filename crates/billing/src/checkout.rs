//! Subscription checkout
//!
//! Opens the hosted payment session that first activates (or recovers) a
//! subscription. The `SUB-` intent carries the target tier and interval in
//! its metadata; the webhook reconciler reads them back when the charge
//! settles.

use sqlx::PgPool;
use std::sync::Arc;

use crate::error::{BillingError, BillingResult};
use crate::gateway::{PaymentGateway, PaymentSession};
use crate::intents::{NewPaymentIntent, PaymentIntentLedger, ReferenceKind};
use shepherd_shared::types::{BillingInterval, PricingTier};

/// Subscription checkout service
pub struct CheckoutService {
    pool: PgPool,
    ledger: PaymentIntentLedger,
    gateway: Arc<dyn PaymentGateway>,
}

impl CheckoutService {
    pub fn new(pool: PgPool, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self {
            ledger: PaymentIntentLedger::new(pool.clone()),
            pool,
            gateway,
        }
    }

    /// Open a checkout session for `tier_id` at `interval`.
    ///
    /// The tier must cover the church's current member count. Activation
    /// itself happens only when the gateway confirms the charge.
    pub async fn initiate_subscription_checkout(
        &self,
        church_id: i64,
        tier_id: i64,
        interval: BillingInterval,
        email: &str,
    ) -> BillingResult<PaymentSession> {
        let tier: Option<PricingTier> =
            sqlx::query_as("SELECT * FROM pricing_tiers WHERE id = $1 AND is_active = TRUE")
                .bind(tier_id)
                .fetch_optional(&self.pool)
                .await?;

        let tier = tier
            .ok_or_else(|| BillingError::InvalidTier(format!("Tier not found: {}", tier_id)))?;

        let member_count: (i32,) =
            sqlx::query_as("SELECT member_count FROM churches WHERE id = $1")
                .bind(church_id)
                .fetch_one(&self.pool)
                .await?;

        if !tier.covers_member_count(member_count.0) {
            return Err(BillingError::IneligibleForUpgrade(format!(
                "Church has {} members; tier {} covers {}..{}",
                member_count.0,
                tier.tier_name,
                tier.min_members,
                tier.max_members.map_or("unbounded".to_string(), |m| m.to_string()),
            )));
        }

        let amount_cents = tier.price_for_interval(interval);

        let intent = self
            .ledger
            .create(NewPaymentIntent {
                church_id,
                amount_cents,
                kind: ReferenceKind::Subscription,
                description: format!("Subscription to {} ({})", tier.display_name, interval),
                metadata: serde_json::json!({
                    "tier_id": tier.id,
                    "billing_interval": interval.as_str(),
                }),
            })
            .await?;

        let session = self
            .gateway
            .initialize_payment(email, amount_cents, &intent.reference)
            .await?;

        tracing::info!(
            church_id = church_id,
            tier = %tier.tier_name,
            interval = %interval,
            reference = %intent.reference,
            amount_cents = amount_cents,
            "Subscription checkout initiated"
        );

        Ok(session)
    }
}
