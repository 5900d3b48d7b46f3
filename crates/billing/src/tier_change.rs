//! Tier and billing-interval changes
//!
//! Orchestrates the upgrade flow: preview the proration, initiate payment
//! for net-positive changes, apply net-zero/negative changes immediately,
//! and complete or roll back pending changes. Every attempt is recorded in
//! `tier_change_history`, which is append-only.
//!
//! Charge semantics:
//! - Tier-only change: both prices prorated over the remaining days; the
//!   next billing date stays put.
//! - Interval change (with or without a tier change): the FULL new interval
//!   price is charged, minus the unused credit from the old period; the next
//!   billing date extends from the current one by the new interval.

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::sync::Arc;
use time::{Date, OffsetDateTime};

use crate::error::{BillingError, BillingResult};
use crate::events::{ActorType, BillingEventBuilder, BillingEventLogger, BillingEventType};
use crate::gateway::{PaymentGateway, PaymentSession};
use crate::intents::{NewPaymentIntent, PaymentIntentLedger, ReferenceKind};
use crate::proration::prorate;
use crate::subscriptions::ChurchSubscription;
use shepherd_shared::types::{add_months, BillingInterval, PricingTier, SubscriptionStatus};

/// What kind of change is being made
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeType {
    TierUpgrade,
    IntervalChange,
    Combined,
}

impl std::fmt::Display for ChangeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ChangeType::TierUpgrade => "TIER_UPGRADE",
            ChangeType::IntervalChange => "INTERVAL_CHANGE",
            ChangeType::Combined => "COMBINED",
        };
        write!(f, "{}", s)
    }
}

/// Pure result of a change calculation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeCalculation {
    pub change_type: ChangeType,
    pub days_remaining: i64,
    pub days_used: i64,
    pub old_price_cents: i64,
    pub new_price_cents: i64,
    pub unused_credit_cents: i64,
    pub prorated_charge_cents: i64,
    pub net_charge_cents: i64,
    pub old_next_billing_date: Date,
    pub new_next_billing_date: Date,
}

/// Compute the financial breakdown for a tier/interval change.
///
/// `old_price_cents`/`new_price_cents` are the per-charge prices at the old
/// and new (tier, interval) pairs respectively.
pub fn calculate_change(
    change_type: ChangeType,
    old_price_cents: i64,
    new_price_cents: i64,
    period_start: Date,
    next_billing_date: Date,
    new_interval: BillingInterval,
    today: Date,
) -> BillingResult<ChangeCalculation> {
    let proration = prorate(
        old_price_cents,
        new_price_cents,
        period_start,
        next_billing_date,
        today,
    )?;

    let (prorated_charge_cents, new_next_billing_date) = match change_type {
        // Same interval: charge only the remaining-days share, keep the date
        ChangeType::TierUpgrade => (proration.new_charge_cents, next_billing_date),
        // New interval: charge the full new price, extend from the current date
        ChangeType::IntervalChange | ChangeType::Combined => (
            new_price_cents,
            add_months(next_billing_date, new_interval.months()),
        ),
    };

    Ok(ChangeCalculation {
        change_type,
        days_remaining: proration.days_remaining,
        days_used: proration.days_used,
        old_price_cents,
        new_price_cents,
        unused_credit_cents: proration.unused_credit_cents,
        prorated_charge_cents,
        net_charge_cents: prorated_charge_cents - proration.unused_credit_cents,
        old_next_billing_date: next_billing_date,
        new_next_billing_date,
    })
}

/// A `tier_change_history` row; the audit trail of every attempted change
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TierChangeHistory {
    pub id: i64,
    pub church_id: i64,
    pub subscription_id: i64,
    pub old_tier_id: i64,
    pub old_tier_name: String,
    pub new_tier_id: i64,
    pub new_tier_name: String,
    pub old_interval: String,
    pub new_interval: String,
    pub days_remaining: i32,
    pub days_used: i32,
    pub old_price_cents: i64,
    pub new_price_cents: i64,
    pub unused_credit_cents: i64,
    pub prorated_charge_cents: i64,
    pub net_charge_cents: i64,
    pub payment_reference: String,
    pub outcome: String,
    pub change_type: String,
    pub old_next_billing_date: Date,
    pub new_next_billing_date: Date,
    pub reason: Option<String>,
    pub requested_at: OffsetDateTime,
    pub completed_at: Option<OffsetDateTime>,
}

/// Preview returned to the client before committing to a change
#[derive(Debug, Clone, Serialize)]
pub struct UpgradePreview {
    pub current_tier: String,
    pub new_tier: String,
    pub current_interval: BillingInterval,
    pub new_interval: BillingInterval,
    pub change_type: ChangeType,
    pub days_remaining: i64,
    pub unused_credit_cents: i64,
    pub prorated_charge_cents: i64,
    pub net_charge_cents: i64,
    pub current_next_billing_date: Date,
    pub new_next_billing_date: Date,
    /// True when net <= 0: the change applies immediately with no payment
    pub applies_immediately: bool,
}

/// Result of initiating a change
#[derive(Debug)]
pub enum UpgradeInitiated {
    /// net <= 0: tier switched on the spot, no payment step
    AppliedImmediately(ChurchSubscription),
    /// net > 0: change is deferred behind this checkout session
    PaymentRequired(PaymentSession),
}

/// Orchestrates tier/interval changes end to end
pub struct TierChangeService {
    pool: PgPool,
    events: BillingEventLogger,
    ledger: PaymentIntentLedger,
    gateway: Arc<dyn PaymentGateway>,
}

impl TierChangeService {
    pub fn new(pool: PgPool, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self {
            events: BillingEventLogger::new(pool.clone()),
            ledger: PaymentIntentLedger::new(pool.clone()),
            pool,
            gateway,
        }
    }

    async fn load_tier(&self, tier_id: i64) -> BillingResult<PricingTier> {
        let tier: Option<PricingTier> =
            sqlx::query_as("SELECT * FROM pricing_tiers WHERE id = $1 AND is_active = TRUE")
                .bind(tier_id)
                .fetch_optional(&self.pool)
                .await?;

        tier.ok_or_else(|| BillingError::InvalidTier(format!("Tier not found: {}", tier_id)))
    }

    async fn load_active_subscription(&self, church_id: i64) -> BillingResult<ChurchSubscription> {
        let subscription: Option<ChurchSubscription> = sqlx::query_as(
            "SELECT * FROM church_subscriptions WHERE church_id = $1 AND status IN ('ACTIVE', 'PAST_DUE')",
        )
        .bind(church_id)
        .fetch_optional(&self.pool)
        .await?;

        subscription.ok_or(BillingError::SubscriptionNotFound(church_id))
    }

    /// A church may only select a tier whose member range covers its current
    /// congregation size.
    async fn validate_tier_eligibility(&self, church_id: i64, tier: &PricingTier) -> BillingResult<()> {
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

        Ok(())
    }

    fn classify(
        subscription: &ChurchSubscription,
        new_tier_id: i64,
        new_interval: Option<BillingInterval>,
    ) -> BillingResult<(ChangeType, BillingInterval)> {
        let tier_changed = subscription.tier_id != new_tier_id;
        let current_interval = subscription.interval();
        let target_interval = new_interval.unwrap_or(current_interval);
        let interval_changed = target_interval != current_interval;

        let change_type = match (tier_changed, interval_changed) {
            (true, true) => ChangeType::Combined,
            (true, false) => ChangeType::TierUpgrade,
            (false, true) => ChangeType::IntervalChange,
            (false, false) => {
                return Err(BillingError::InvalidInput(
                    "No change in tier or billing interval".to_string(),
                ))
            }
        };

        Ok((change_type, target_interval))
    }

    async fn calculate_for(
        &self,
        subscription: &ChurchSubscription,
        new_tier: &PricingTier,
        new_interval: Option<BillingInterval>,
        today: Date,
    ) -> BillingResult<(ChangeCalculation, BillingInterval)> {
        let (change_type, target_interval) =
            Self::classify(subscription, new_tier.id, new_interval)?;

        let old_tier = self.load_tier(subscription.tier_id).await?;
        let current_interval = subscription.interval();

        let (period_start, next_billing_date) = match (
            subscription.current_period_start,
            subscription.next_billing_date,
        ) {
            (Some(start), Some(next)) => (start, next),
            _ => {
                return Err(BillingError::InvalidProrationWindow(format!(
                    "Subscription for church {} has no billing period",
                    subscription.church_id
                )))
            }
        };

        let calculation = calculate_change(
            change_type,
            old_tier.price_for_interval(current_interval),
            new_tier.price_for_interval(target_interval),
            period_start,
            next_billing_date,
            target_interval,
            today,
        )?;

        Ok((calculation, target_interval))
    }

    /// Preview a change without committing anything
    pub async fn preview(
        &self,
        church_id: i64,
        new_tier_id: i64,
        new_interval: Option<BillingInterval>,
        today: Date,
    ) -> BillingResult<UpgradePreview> {
        let subscription = self.load_active_subscription(church_id).await?;
        let new_tier = self.load_tier(new_tier_id).await?;
        self.validate_tier_eligibility(church_id, &new_tier).await?;

        let old_tier = self.load_tier(subscription.tier_id).await?;
        let (calculation, target_interval) = self
            .calculate_for(&subscription, &new_tier, new_interval, today)
            .await?;

        Ok(UpgradePreview {
            current_tier: old_tier.tier_name,
            new_tier: new_tier.tier_name,
            current_interval: subscription.interval(),
            new_interval: target_interval,
            change_type: calculation.change_type,
            days_remaining: calculation.days_remaining,
            unused_credit_cents: calculation.unused_credit_cents,
            prorated_charge_cents: calculation.prorated_charge_cents,
            net_charge_cents: calculation.net_charge_cents,
            current_next_billing_date: calculation.old_next_billing_date,
            new_next_billing_date: calculation.new_next_billing_date,
            applies_immediately: calculation.net_charge_cents <= 0,
        })
    }

    /// Initiate a change.
    ///
    /// `net <= 0` (downgrades): applied immediately, history row COMPLETED,
    /// no payment intent. `net > 0`: history row PENDING, a `TIER_UPGRADE-`
    /// intent is opened and the change waits for webhook settlement.
    pub async fn initiate(
        &self,
        church_id: i64,
        new_tier_id: i64,
        new_interval: Option<BillingInterval>,
        email: &str,
        reason: Option<&str>,
        today: Date,
    ) -> BillingResult<UpgradeInitiated> {
        let subscription = self.load_active_subscription(church_id).await?;

        if subscription.has_pending_upgrade() {
            return Err(BillingError::PendingUpgradeExists(church_id));
        }

        let new_tier = self.load_tier(new_tier_id).await?;
        self.validate_tier_eligibility(church_id, &new_tier).await?;

        let old_tier = self.load_tier(subscription.tier_id).await?;
        let (calculation, target_interval) = self
            .calculate_for(&subscription, &new_tier, new_interval, today)
            .await?;

        let reference = ReferenceKind::TierUpgrade.new_reference();
        let immediate = calculation.net_charge_cents <= 0;

        self.insert_history(
            &subscription,
            &old_tier,
            &new_tier,
            target_interval,
            &calculation,
            &reference,
            if immediate { "COMPLETED" } else { "PENDING" },
            reason,
        )
        .await?;

        self.events
            .log_event(
                BillingEventBuilder::new(church_id, BillingEventType::TierChangeInitiated)
                    .actor(ActorType::User)
                    .reference(&reference)
                    .data(serde_json::json!({
                        "from_tier": old_tier.tier_name,
                        "to_tier": new_tier.tier_name,
                        "change_type": calculation.change_type.to_string(),
                        "net_charge_cents": calculation.net_charge_cents,
                    })),
            )
            .await?;

        if immediate {
            let updated = self
                .apply_change(
                    church_id,
                    new_tier.id,
                    target_interval,
                    calculation.new_next_billing_date,
                    &reference,
                )
                .await?;

            tracing::info!(
                church_id = church_id,
                from_tier = %old_tier.tier_name,
                to_tier = %new_tier.tier_name,
                net_charge_cents = calculation.net_charge_cents,
                "Tier change applied immediately (no payment required)"
            );

            return Ok(UpgradeInitiated::AppliedImmediately(updated));
        }

        // Deferred: the change only lands when the TIER_UPGRADE- intent settles
        self.ledger
            .create_with_reference(
                NewPaymentIntent {
                    church_id,
                    amount_cents: calculation.net_charge_cents,
                    kind: ReferenceKind::TierUpgrade,
                    description: format!(
                        "Tier change: {} -> {}",
                        old_tier.tier_name, new_tier.tier_name
                    ),
                    metadata: serde_json::json!({
                        "tier_id": new_tier.id,
                        "billing_interval": target_interval.as_str(),
                    }),
                },
                &reference,
            )
            .await?;

        sqlx::query(
            r#"
            UPDATE church_subscriptions
            SET pending_tier_id = $2, pending_interval = $3, updated_at = NOW()
            WHERE church_id = $1
            "#,
        )
        .bind(church_id)
        .bind(new_tier.id)
        .bind(target_interval.as_str())
        .execute(&self.pool)
        .await?;

        let session = self
            .gateway
            .initialize_payment(email, calculation.net_charge_cents, &reference)
            .await?;

        tracing::info!(
            church_id = church_id,
            reference = %reference,
            net_charge_cents = calculation.net_charge_cents,
            "Tier change payment initiated"
        );

        Ok(UpgradeInitiated::PaymentRequired(session))
    }

    /// Complete a pending change after its `TIER_UPGRADE-` intent settled.
    /// Called by the webhook reconciler; idempotent on the history outcome.
    pub async fn complete(&self, reference: &str) -> BillingResult<ChurchSubscription> {
        let history: Option<TierChangeHistory> =
            sqlx::query_as("SELECT * FROM tier_change_history WHERE payment_reference = $1")
                .bind(reference)
                .fetch_optional(&self.pool)
                .await?;

        let history = history.ok_or_else(|| {
            BillingError::NotFound(format!("Tier change history not found for {}", reference))
        })?;

        if history.outcome == "COMPLETED" {
            tracing::info!(reference = %reference, "Tier change already completed");
            return self.subscription_by_id(history.subscription_id).await;
        }

        let target_interval: BillingInterval = history
            .new_interval
            .parse()
            .map_err(BillingError::InvalidInput)?;

        let updated = self
            .apply_change(
                history.church_id,
                history.new_tier_id,
                target_interval,
                history.new_next_billing_date,
                reference,
            )
            .await?;

        sqlx::query(
            r#"
            UPDATE tier_change_history
            SET outcome = 'COMPLETED', completed_at = NOW()
            WHERE payment_reference = $1 AND outcome = 'PENDING'
            "#,
        )
        .bind(reference)
        .execute(&self.pool)
        .await?;

        self.events
            .log_event(
                BillingEventBuilder::new(history.church_id, BillingEventType::TierChangeCompleted)
                    .actor(ActorType::Gateway)
                    .reference(reference)
                    .data(serde_json::json!({
                        "from_tier": history.old_tier_name,
                        "to_tier": history.new_tier_name,
                    })),
            )
            .await?;

        tracing::info!(
            church_id = history.church_id,
            from_tier = %history.old_tier_name,
            to_tier = %history.new_tier_name,
            reference = %reference,
            "Tier change completed"
        );

        Ok(updated)
    }

    /// Roll back a pending change (operator action or abandoned payment).
    /// The history row is kept, marked ROLLED_BACK.
    pub async fn rollback(&self, church_id: i64, triggered_by: &str) -> BillingResult<()> {
        let cleared = sqlx::query(
            r#"
            UPDATE church_subscriptions
            SET pending_tier_id = NULL, pending_interval = NULL, updated_at = NOW()
            WHERE church_id = $1 AND pending_tier_id IS NOT NULL
            "#,
        )
        .bind(church_id)
        .execute(&self.pool)
        .await?;

        if cleared.rows_affected() == 0 {
            tracing::warn!(church_id = church_id, "No pending tier change to roll back");
            return Ok(());
        }

        sqlx::query(
            r#"
            UPDATE tier_change_history
            SET outcome = 'ROLLED_BACK', completed_at = NOW()
            WHERE church_id = $1 AND outcome = 'PENDING'
            "#,
        )
        .bind(church_id)
        .execute(&self.pool)
        .await?;

        self.events
            .log_event(
                BillingEventBuilder::new(church_id, BillingEventType::TierChangeRolledBack)
                    .actor_labeled(ActorType::Operator, triggered_by),
            )
            .await?;

        tracing::info!(
            church_id = church_id,
            triggered_by = triggered_by,
            "Pending tier change rolled back"
        );

        Ok(())
    }

    /// Mark the history row FAILED when the gateway reports a failed charge
    pub async fn mark_failed(&self, reference: &str) -> BillingResult<()> {
        sqlx::query(
            r#"
            UPDATE tier_change_history
            SET outcome = 'FAILED', completed_at = NOW()
            WHERE payment_reference = $1 AND outcome = 'PENDING'
            "#,
        )
        .bind(reference)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn history_for_church(&self, church_id: i64) -> BillingResult<Vec<TierChangeHistory>> {
        let rows: Vec<TierChangeHistory> = sqlx::query_as(
            "SELECT * FROM tier_change_history WHERE church_id = $1 ORDER BY requested_at DESC",
        )
        .bind(church_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    // ==================== internals ====================

    async fn subscription_by_id(&self, id: i64) -> BillingResult<ChurchSubscription> {
        let subscription: Option<ChurchSubscription> =
            sqlx::query_as("SELECT * FROM church_subscriptions WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        subscription.ok_or_else(|| BillingError::NotFound(format!("Subscription {}", id)))
    }

    /// Apply the new tier/interval and billing dates; clears any pending
    /// markers and recovers PAST_DUE (the paid change covers the cycle).
    async fn apply_change(
        &self,
        church_id: i64,
        new_tier_id: i64,
        new_interval: BillingInterval,
        new_next_billing_date: Date,
        reference: &str,
    ) -> BillingResult<ChurchSubscription> {
        let updated: Option<ChurchSubscription> = sqlx::query_as(
            r#"
            UPDATE church_subscriptions
            SET tier_id = $2,
                billing_interval = $3,
                next_billing_date = $4,
                current_period_end = $4,
                pending_tier_id = NULL,
                pending_interval = NULL,
                status = CASE WHEN status = 'PAST_DUE' THEN 'ACTIVE' ELSE status END,
                failed_payment_attempts = 0,
                updated_at = NOW()
            WHERE church_id = $1
            RETURNING *
            "#,
        )
        .bind(church_id)
        .bind(new_tier_id)
        .bind(new_interval.as_str())
        .bind(new_next_billing_date)
        .fetch_optional(&self.pool)
        .await?;

        let subscription = updated.ok_or(BillingError::SubscriptionNotFound(church_id))?;

        if subscription.subscription_status() == SubscriptionStatus::Active {
            tracing::debug!(
                church_id = church_id,
                reference = %reference,
                "Subscription active after tier change"
            );
        }

        Ok(subscription)
    }

    #[allow(clippy::too_many_arguments)]
    async fn insert_history(
        &self,
        subscription: &ChurchSubscription,
        old_tier: &PricingTier,
        new_tier: &PricingTier,
        target_interval: BillingInterval,
        calculation: &ChangeCalculation,
        reference: &str,
        outcome: &str,
        reason: Option<&str>,
    ) -> BillingResult<()> {
        sqlx::query(
            r#"
            INSERT INTO tier_change_history
                (church_id, subscription_id, old_tier_id, old_tier_name, new_tier_id, new_tier_name,
                 old_interval, new_interval, days_remaining, days_used,
                 old_price_cents, new_price_cents, unused_credit_cents,
                 prorated_charge_cents, net_charge_cents,
                 payment_reference, outcome, change_type,
                 old_next_billing_date, new_next_billing_date, reason,
                 completed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15,
                    $16, $17, $18, $19, $20, $21,
                    CASE WHEN $17 = 'COMPLETED' THEN NOW() ELSE NULL END)
            "#,
        )
        .bind(subscription.church_id)
        .bind(subscription.id)
        .bind(old_tier.id)
        .bind(&old_tier.tier_name)
        .bind(new_tier.id)
        .bind(&new_tier.tier_name)
        .bind(subscription.billing_interval.as_str())
        .bind(target_interval.as_str())
        .bind(calculation.days_remaining as i32)
        .bind(calculation.days_used as i32)
        .bind(calculation.old_price_cents)
        .bind(calculation.new_price_cents)
        .bind(calculation.unused_credit_cents)
        .bind(calculation.prorated_charge_cents)
        .bind(calculation.net_charge_cents)
        .bind(reference)
        .bind(outcome)
        .bind(calculation.change_type.to_string())
        .bind(calculation.old_next_billing_date)
        .bind(calculation.new_next_billing_date)
        .bind(reason)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn test_tier_only_change_keeps_billing_date() {
        // 30-day period, $10 -> $30, 20 days remaining
        let calc = calculate_change(
            ChangeType::TierUpgrade,
            1_000,
            3_000,
            date!(2026 - 03 - 01),
            date!(2026 - 03 - 31),
            BillingInterval::Monthly,
            date!(2026 - 03 - 11),
        )
        .unwrap();

        assert_eq!(calc.unused_credit_cents, 667);
        assert_eq!(calc.prorated_charge_cents, 2_000);
        assert_eq!(calc.net_charge_cents, 1_333);
        assert_eq!(calc.new_next_billing_date, date!(2026 - 03 - 31));
    }

    #[test]
    fn test_interval_change_charges_full_price_and_extends_date() {
        // Monthly $10 -> annual $108, 15 of 30 days remaining.
        // Full annual price minus the $5 credit; billing date jumps a year.
        let calc = calculate_change(
            ChangeType::IntervalChange,
            1_000,
            10_800,
            date!(2026 - 03 - 01),
            date!(2026 - 03 - 31),
            BillingInterval::Annual,
            date!(2026 - 03 - 16),
        )
        .unwrap();

        assert_eq!(calc.days_remaining, 15);
        assert_eq!(calc.unused_credit_cents, 500);
        assert_eq!(calc.prorated_charge_cents, 10_800);
        assert_eq!(calc.net_charge_cents, 10_300);
        assert_eq!(calc.new_next_billing_date, date!(2027 - 03 - 31));
    }

    #[test]
    fn test_combined_change_uses_new_tier_price() {
        let calc = calculate_change(
            ChangeType::Combined,
            1_000,
            15_000,
            date!(2026 - 03 - 01),
            date!(2026 - 03 - 31),
            BillingInterval::Quarterly,
            date!(2026 - 03 - 16),
        )
        .unwrap();

        assert_eq!(calc.prorated_charge_cents, 15_000);
        assert_eq!(calc.net_charge_cents, 15_000 - 500);
        assert_eq!(calc.new_next_billing_date, date!(2026 - 06 - 30));
    }

    #[test]
    fn test_downgrade_nets_non_positive() {
        let calc = calculate_change(
            ChangeType::TierUpgrade,
            3_000,
            1_000,
            date!(2026 - 03 - 01),
            date!(2026 - 03 - 31),
            BillingInterval::Monthly,
            date!(2026 - 03 - 11),
        )
        .unwrap();

        assert!(calc.net_charge_cents <= 0);
    }

    #[test]
    fn test_change_type_display() {
        assert_eq!(ChangeType::TierUpgrade.to_string(), "TIER_UPGRADE");
        assert_eq!(ChangeType::IntervalChange.to_string(), "INTERVAL_CHANGE");
        assert_eq!(ChangeType::Combined.to_string(), "COMBINED");
    }
}
