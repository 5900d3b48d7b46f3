//! Subscription state machine
//!
//! Owns every transition of the `church_subscriptions` aggregate. Webhook
//! reconciliation and scheduled jobs both land here, so each transition is a
//! single atomic conditional UPDATE (`... WHERE status = <expected>`); callers
//! never read-modify-write the aggregate.
//!
//! Status graph:
//! - TRIALING -> ACTIVE      first successful payment, or trial end with a stored card
//! - ACTIVE   -> PAST_DUE    renewal charge fails or is unconfirmed at the billing date
//! - PAST_DUE -> ACTIVE      a later charge for the same cycle succeeds
//! - PAST_DUE -> SUSPENDED   grace period elapses; starts the data-retention countdown
//! - SUSPENDED-> CANCELED    deletion job only, after the retention window
//! - any      -> CANCELED    explicit cancellation; usable until period end, then free tier
//! - CANCELED/SUSPENDED -> ACTIVE   manual reactivation ONLY, never from a payment

use sqlx::PgPool;
use time::{Date, OffsetDateTime};

use crate::error::{BillingError, BillingResult};
use crate::events::{ActorType, BillingEventBuilder, BillingEventLogger, BillingEventType};
use crate::intents::PaymentIntent;
use shepherd_shared::types::{add_months, BillingInterval, SubscriptionStatus};

/// Default data-retention window after suspension, in days
pub const DEFAULT_RETENTION_DAYS: i64 = 30;

/// Days before the retention end date at which the warning email goes out
pub const DELETION_WARNING_DAYS: i64 = 7;

/// The `church_subscriptions` row.
///
/// Mutated only through [`SubscriptionService`]; the methods here are pure
/// date predicates that take `today` explicitly so jobs and tests share the
/// same arithmetic.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ChurchSubscription {
    pub id: i64,
    pub church_id: i64,
    pub status: String,
    pub tier_id: i64,
    pub billing_interval: String,
    pub current_period_start: Option<Date>,
    pub current_period_end: Option<Date>,
    pub next_billing_date: Option<Date>,
    pub trial_end_date: Option<Date>,
    pub canceled_at: Option<OffsetDateTime>,
    pub ends_at: Option<Date>,
    pub auto_renew: bool,
    pub grace_period_days: i32,
    pub failed_payment_attempts: i32,
    pub authorization_code: Option<String>,
    pub free_months_remaining: i32,
    pub promotional_note: Option<String>,
    pub suspended_at: Option<OffsetDateTime>,
    pub data_retention_end_date: Option<Date>,
    pub retention_extension_days: i32,
    pub retention_extension_note: Option<String>,
    pub deletion_warning_sent_at: Option<OffsetDateTime>,
    pub pending_tier_id: Option<i64>,
    pub pending_interval: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl ChurchSubscription {
    pub fn subscription_status(&self) -> SubscriptionStatus {
        self.status.parse().unwrap_or(SubscriptionStatus::Canceled)
    }

    pub fn interval(&self) -> BillingInterval {
        self.billing_interval.parse().unwrap_or_default()
    }

    pub fn has_pending_upgrade(&self) -> bool {
        self.pending_tier_id.is_some()
    }

    pub fn has_promotional_credits(&self) -> bool {
        self.free_months_remaining > 0
    }

    /// PAST_DUE and still inside `next_billing_date + grace_period_days`
    pub fn is_in_grace_period(&self, today: Date) -> bool {
        if self.subscription_status() != SubscriptionStatus::PastDue {
            return false;
        }
        let Some(billing_date) = self.next_billing_date else {
            return false;
        };
        today < billing_date + time::Duration::days(self.grace_period_days as i64)
    }

    /// PAST_DUE with the grace period exhausted
    pub fn should_suspend(&self, today: Date) -> bool {
        self.subscription_status() == SubscriptionStatus::PastDue && !self.is_in_grace_period(today)
    }

    /// Days until permanent deletion; negative if overdue
    pub fn days_until_deletion(&self, today: Date) -> Option<i64> {
        self.data_retention_end_date
            .map(|end| (end - today).whole_days())
    }

    /// Whether the deletion job may permanently delete this tenant.
    ///
    /// Requires: SUSPENDED, retention countdown expired, and the warning
    /// email sent at least [`DELETION_WARNING_DAYS`] before `now`.
    pub fn is_eligible_for_deletion(&self, today: Date, now: OffsetDateTime) -> bool {
        if self.subscription_status() != SubscriptionStatus::Suspended {
            return false;
        }
        let Some(retention_end) = self.data_retention_end_date else {
            return false;
        };
        if retention_end > today {
            return false;
        }
        match self.deletion_warning_sent_at {
            Some(sent_at) => now - sent_at >= time::Duration::days(DELETION_WARNING_DAYS),
            None => false,
        }
    }
}

/// Result of a payment-driven activation attempt
#[derive(Debug)]
pub enum ActivationOutcome {
    /// The subscription transitioned to ACTIVE
    Activated(ChurchSubscription),
    /// Payment recorded, but the subscription is CANCELED or SUSPENDED and
    /// must be reactivated manually by an operator
    ManualReviewRequired(SubscriptionStatus),
}

/// Service owning all `church_subscriptions` transitions
pub struct SubscriptionService {
    pool: PgPool,
    events: BillingEventLogger,
}

impl SubscriptionService {
    pub fn new(pool: PgPool) -> Self {
        Self {
            events: BillingEventLogger::new(pool.clone()),
            pool,
        }
    }

    pub async fn get(&self, church_id: i64) -> BillingResult<ChurchSubscription> {
        let subscription: Option<ChurchSubscription> =
            sqlx::query_as("SELECT * FROM church_subscriptions WHERE church_id = $1")
                .bind(church_id)
                .fetch_optional(&self.pool)
                .await?;

        subscription.ok_or(BillingError::SubscriptionNotFound(church_id))
    }

    /// Create a trialing subscription for a newly onboarded church
    pub async fn start_trial(
        &self,
        church_id: i64,
        tier_id: i64,
        interval: BillingInterval,
        trial_days: i64,
        today: Date,
    ) -> BillingResult<ChurchSubscription> {
        let trial_end = today + time::Duration::days(trial_days);

        let subscription: ChurchSubscription = sqlx::query_as(
            r#"
            INSERT INTO church_subscriptions
                (church_id, status, tier_id, billing_interval, trial_end_date, next_billing_date)
            VALUES ($1, 'TRIALING', $2, $3, $4, $4)
            RETURNING *
            "#,
        )
        .bind(church_id)
        .bind(tier_id)
        .bind(interval.as_str())
        .bind(trial_end)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                BillingError::InvalidInput(format!(
                    "Subscription already exists for church {}",
                    church_id
                ))
            }
            other => BillingError::from(other),
        })?;

        self.events
            .log_event(
                BillingEventBuilder::new(church_id, BillingEventType::TrialStarted)
                    .data(serde_json::json!({ "tier_id": tier_id, "trial_end": trial_end.to_string() })),
            )
            .await?;

        tracing::info!(
            church_id = church_id,
            tier_id = tier_id,
            trial_end = %trial_end,
            "Started trial subscription"
        );

        Ok(subscription)
    }

    /// Activate a subscription from a settled `SUB-` payment intent.
    ///
    /// Only TRIALING and PAST_DUE transition here. CANCELED and SUSPENDED
    /// subscriptions stay put even when money arrives: reactivation is a
    /// separate manual operation, and the payment is surfaced for review.
    pub async fn activate_from_payment(
        &self,
        intent: &PaymentIntent,
        today: Date,
    ) -> BillingResult<ActivationOutcome> {
        let current = self.get(intent.church_id).await?;

        let tier_id = intent.metadata.get("tier_id").and_then(|v| v.as_i64());
        // Interval from the checkout metadata when present, otherwise
        // whatever the subscription is already on
        let interval: BillingInterval = intent
            .metadata
            .get("billing_interval")
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(|| current.interval());

        let period_end = add_months(today, interval.months());

        let updated: Option<ChurchSubscription> = sqlx::query_as(
            r#"
            UPDATE church_subscriptions
            SET status = 'ACTIVE',
                tier_id = COALESCE($2, tier_id),
                billing_interval = $3,
                current_period_start = $4,
                current_period_end = $5,
                next_billing_date = $5,
                trial_end_date = NULL,
                failed_payment_attempts = 0,
                auto_renew = TRUE,
                authorization_code = COALESCE($6, authorization_code),
                updated_at = NOW()
            WHERE church_id = $1 AND status IN ('TRIALING', 'PAST_DUE')
            RETURNING *
            "#,
        )
        .bind(intent.church_id)
        .bind(tier_id)
        .bind(interval.as_str())
        .bind(today)
        .bind(period_end)
        .bind(&intent.authorization_code)
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(subscription) => {
                self.events
                    .log_event(
                        BillingEventBuilder::new(
                            intent.church_id,
                            BillingEventType::SubscriptionActivated,
                        )
                        .actor(ActorType::Gateway)
                        .reference(&intent.reference)
                        .data(serde_json::json!({
                            "amount_cents": intent.amount_cents,
                            "period_end": period_end.to_string(),
                        })),
                    )
                    .await?;

                tracing::info!(
                    church_id = intent.church_id,
                    reference = %intent.reference,
                    period_end = %period_end,
                    "Subscription activated from payment"
                );

                Ok(ActivationOutcome::Activated(subscription))
            }
            None => {
                let current = self.get(intent.church_id).await?;
                let status = current.subscription_status();

                tracing::warn!(
                    church_id = intent.church_id,
                    status = %status,
                    reference = %intent.reference,
                    "Payment received for a subscription that requires manual reactivation"
                );

                Ok(ActivationOutcome::ManualReviewRequired(status))
            }
        }
    }

    /// ACTIVE/TRIALING -> PAST_DUE after a failed or unconfirmed renewal charge
    pub async fn mark_past_due(&self, church_id: i64, reason: &str) -> BillingResult<()> {
        let before = self.get(church_id).await?.subscription_status();

        let updated: Option<ChurchSubscription> = sqlx::query_as(
            r#"
            UPDATE church_subscriptions
            SET status = 'PAST_DUE',
                failed_payment_attempts = failed_payment_attempts + 1,
                updated_at = NOW()
            WHERE church_id = $1 AND status IN ('ACTIVE', 'TRIALING')
            RETURNING *
            "#,
        )
        .bind(church_id)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(subscription) = updated {
            self.events
                .log_event(
                    BillingEventBuilder::new(church_id, BillingEventType::SubscriptionPastDue)
                        .transition(before, SubscriptionStatus::PastDue)
                        .data(serde_json::json!({
                            "reason": reason,
                            "failed_attempts": subscription.failed_payment_attempts,
                        })),
                )
                .await?;

            tracing::warn!(
                church_id = church_id,
                failed_attempts = subscription.failed_payment_attempts,
                reason = reason,
                "Subscription marked past due"
            );
        }

        Ok(())
    }

    /// Roll the billing period forward after a successful renewal charge.
    /// Also recovers PAST_DUE subscriptions whose later charge succeeded.
    pub async fn record_renewal_success(
        &self,
        church_id: i64,
        interval: BillingInterval,
        today: Date,
        reference: &str,
    ) -> BillingResult<ChurchSubscription> {
        let period_end = add_months(today, interval.months());

        let updated: Option<ChurchSubscription> = sqlx::query_as(
            r#"
            UPDATE church_subscriptions
            SET status = 'ACTIVE',
                current_period_start = $2,
                current_period_end = $3,
                next_billing_date = $3,
                failed_payment_attempts = 0,
                updated_at = NOW()
            WHERE church_id = $1 AND status IN ('ACTIVE', 'PAST_DUE', 'TRIALING')
            RETURNING *
            "#,
        )
        .bind(church_id)
        .bind(today)
        .bind(period_end)
        .fetch_optional(&self.pool)
        .await?;

        let subscription = updated.ok_or(BillingError::SubscriptionNotFound(church_id))?;

        self.events
            .log_event(
                BillingEventBuilder::new(church_id, BillingEventType::RenewalSucceeded)
                    .reference(reference)
                    .data(serde_json::json!({ "period_end": period_end.to_string() })),
            )
            .await?;

        tracing::info!(
            church_id = church_id,
            period_end = %period_end,
            "Subscription renewed"
        );

        Ok(subscription)
    }

    /// PAST_DUE -> SUSPENDED once the grace period is exhausted.
    /// Starts the data-retention countdown.
    pub async fn suspend(
        &self,
        church_id: i64,
        today: Date,
        retention_days: i64,
    ) -> BillingResult<Option<ChurchSubscription>> {
        let retention_end = today + time::Duration::days(retention_days);

        let updated: Option<ChurchSubscription> = sqlx::query_as(
            r#"
            UPDATE church_subscriptions
            SET status = 'SUSPENDED',
                suspended_at = NOW(),
                data_retention_end_date = $2,
                updated_at = NOW()
            WHERE church_id = $1 AND status = 'PAST_DUE'
            RETURNING *
            "#,
        )
        .bind(church_id)
        .bind(retention_end)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(ref subscription) = updated {
            self.events
                .log_event(
                    BillingEventBuilder::new(church_id, BillingEventType::SubscriptionSuspended)
                        .transition(SubscriptionStatus::PastDue, SubscriptionStatus::Suspended)
                        .data(serde_json::json!({
                            "grace_period_days": subscription.grace_period_days,
                            "data_retention_end_date": retention_end.to_string(),
                        })),
                )
                .await?;

            tracing::warn!(
                church_id = church_id,
                grace_period_days = subscription.grace_period_days,
                data_retention_end_date = %retention_end,
                "Subscription suspended for non-payment"
            );
        }

        Ok(updated)
    }

    /// Soft cancel: the subscription stays usable until `current_period_end`,
    /// then the downgrade job moves it to the free tier. Never suspends.
    pub async fn cancel(&self, church_id: i64, actor: ActorType) -> BillingResult<ChurchSubscription> {
        let before = self.get(church_id).await?.subscription_status();

        let updated: Option<ChurchSubscription> = sqlx::query_as(
            r#"
            UPDATE church_subscriptions
            SET status = 'CANCELED',
                canceled_at = NOW(),
                ends_at = current_period_end,
                auto_renew = FALSE,
                suspended_at = NULL,
                data_retention_end_date = NULL,
                retention_extension_days = 0,
                retention_extension_note = NULL,
                deletion_warning_sent_at = NULL,
                updated_at = NOW()
            WHERE church_id = $1 AND status <> 'CANCELED'
            RETURNING *
            "#,
        )
        .bind(church_id)
        .fetch_optional(&self.pool)
        .await?;

        let subscription = updated.ok_or_else(|| {
            BillingError::InvalidInput(format!("Subscription for church {} is already canceled", church_id))
        })?;

        self.events
            .log_event(
                BillingEventBuilder::new(church_id, BillingEventType::SubscriptionCanceled)
                    .actor(actor)
                    .transition(before, SubscriptionStatus::Canceled)
                    .data(serde_json::json!({
                        "ends_at": subscription.ends_at.map(|d| d.to_string()),
                    })),
            )
            .await?;

        tracing::info!(
            church_id = church_id,
            status_before = %before,
            ends_at = ?subscription.ends_at,
            "Subscription canceled"
        );

        Ok(subscription)
    }

    /// Move CANCELED subscriptions past their `ends_at` to the free tier.
    /// Returns the number of downgrades applied.
    pub async fn downgrade_expired_cancellations(
        &self,
        free_tier_id: i64,
        today: Date,
    ) -> BillingResult<Vec<ChurchSubscription>> {
        let downgraded: Vec<ChurchSubscription> = sqlx::query_as(
            r#"
            UPDATE church_subscriptions
            SET tier_id = $1,
                current_period_start = NULL,
                current_period_end = NULL,
                next_billing_date = NULL,
                ends_at = NULL,
                updated_at = NOW()
            WHERE status = 'CANCELED' AND ends_at IS NOT NULL AND ends_at <= $2
            RETURNING *
            "#,
        )
        .bind(free_tier_id)
        .bind(today)
        .fetch_all(&self.pool)
        .await?;

        for subscription in &downgraded {
            self.events
                .log_event(
                    BillingEventBuilder::new(
                        subscription.church_id,
                        BillingEventType::SubscriptionDowngraded,
                    )
                    .data(serde_json::json!({ "free_tier_id": free_tier_id })),
                )
                .await?;

            tracing::info!(
                church_id = subscription.church_id,
                "Canceled subscription downgraded to free tier at period end"
            );
        }

        Ok(downgraded)
    }

    /// Manual reactivation, the ONLY path out of CANCELED/SUSPENDED.
    ///
    /// Deliberately never triggered by payments or jobs, so a lapsed tenant
    /// cannot slip back in without operator review.
    pub async fn reactivate(
        &self,
        church_id: i64,
        months: i32,
        today: Date,
        triggered_by: &str,
    ) -> BillingResult<ChurchSubscription> {
        let before = self.get(church_id).await?.subscription_status();
        let period_end = add_months(today, months);

        let updated: Option<ChurchSubscription> = sqlx::query_as(
            r#"
            UPDATE church_subscriptions
            SET status = 'ACTIVE',
                current_period_start = $2,
                current_period_end = $3,
                next_billing_date = $3,
                canceled_at = NULL,
                ends_at = NULL,
                suspended_at = NULL,
                data_retention_end_date = NULL,
                retention_extension_days = 0,
                retention_extension_note = NULL,
                deletion_warning_sent_at = NULL,
                failed_payment_attempts = 0,
                updated_at = NOW()
            WHERE church_id = $1 AND status IN ('CANCELED', 'SUSPENDED')
            RETURNING *
            "#,
        )
        .bind(church_id)
        .bind(today)
        .bind(period_end)
        .fetch_optional(&self.pool)
        .await?;

        let subscription = updated.ok_or_else(|| {
            BillingError::InvalidInput(format!(
                "Subscription for church {} is {} and cannot be reactivated",
                church_id, before
            ))
        })?;

        self.events
            .log_event(
                BillingEventBuilder::new(church_id, BillingEventType::SubscriptionReactivated)
                    .actor_labeled(ActorType::Operator, triggered_by)
                    .transition(before, SubscriptionStatus::Active)
                    .data(serde_json::json!({ "months": months })),
            )
            .await?;

        tracing::info!(
            church_id = church_id,
            status_before = %before,
            months = months,
            triggered_by = triggered_by,
            "Subscription manually reactivated"
        );

        Ok(subscription)
    }

    /// TRIALING subscriptions whose trial expired without a stored payment
    /// method become PAST_DUE; those with one are picked up by the renewal job.
    pub async fn expire_trials_without_payment_method(
        &self,
        today: Date,
    ) -> BillingResult<Vec<ChurchSubscription>> {
        let expired: Vec<ChurchSubscription> = sqlx::query_as(
            r#"
            UPDATE church_subscriptions
            SET status = 'PAST_DUE', updated_at = NOW()
            WHERE status = 'TRIALING'
              AND trial_end_date IS NOT NULL
              AND trial_end_date < $1
              AND authorization_code IS NULL
            RETURNING *
            "#,
        )
        .bind(today)
        .fetch_all(&self.pool)
        .await?;

        for subscription in &expired {
            self.events
                .log_event(
                    BillingEventBuilder::new(
                        subscription.church_id,
                        BillingEventType::SubscriptionPastDue,
                    )
                    .transition(SubscriptionStatus::Trialing, SubscriptionStatus::PastDue)
                    .data(serde_json::json!({ "reason": "trial expired without payment method" })),
                )
                .await?;
        }

        Ok(expired)
    }

    /// Renew by consuming one promotional free month instead of charging.
    ///
    /// Atomic on `free_months_remaining > 0`; returns None when there was no
    /// credit to consume (caller falls through to the paid renewal path).
    pub async fn renew_with_promotional_credit(
        &self,
        church_id: i64,
        interval: BillingInterval,
        today: Date,
    ) -> BillingResult<Option<ChurchSubscription>> {
        let period_end = add_months(today, interval.months());

        let updated: Option<ChurchSubscription> = sqlx::query_as(
            r#"
            UPDATE church_subscriptions
            SET free_months_remaining = free_months_remaining - 1,
                status = 'ACTIVE',
                current_period_start = $2,
                current_period_end = $3,
                next_billing_date = $3,
                failed_payment_attempts = 0,
                updated_at = NOW()
            WHERE church_id = $1
              AND status IN ('ACTIVE', 'PAST_DUE', 'TRIALING')
              AND free_months_remaining > 0
            RETURNING *
            "#,
        )
        .bind(church_id)
        .bind(today)
        .bind(period_end)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(ref subscription) = updated {
            self.events
                .log_event(
                    BillingEventBuilder::new(church_id, BillingEventType::RenewalSucceeded).data(
                        serde_json::json!({
                            "promotional_credit": true,
                            "free_months_remaining": subscription.free_months_remaining,
                            "period_end": period_end.to_string(),
                        }),
                    ),
                )
                .await?;

            tracing::info!(
                church_id = church_id,
                free_months_remaining = subscription.free_months_remaining,
                "Renewal covered by promotional credit"
            );
        }

        Ok(updated)
    }

    // ==================== Job queries ====================

    /// Subscriptions due for a renewal charge on or before `today`
    pub async fn due_for_renewal(&self, today: Date) -> BillingResult<Vec<ChurchSubscription>> {
        let due: Vec<ChurchSubscription> = sqlx::query_as(
            r#"
            SELECT * FROM church_subscriptions
            WHERE status IN ('ACTIVE', 'TRIALING')
              AND auto_renew = TRUE
              AND next_billing_date IS NOT NULL
              AND next_billing_date <= $1
            ORDER BY church_id
            "#,
        )
        .bind(today)
        .fetch_all(&self.pool)
        .await?;

        Ok(due)
    }

    pub async fn past_due(&self) -> BillingResult<Vec<ChurchSubscription>> {
        let rows: Vec<ChurchSubscription> = sqlx::query_as(
            "SELECT * FROM church_subscriptions WHERE status = 'PAST_DUE' ORDER BY church_id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// SUSPENDED subscriptions whose retention window ends within the warning
    /// horizon and that have not been warned yet
    pub async fn needing_deletion_warning(
        &self,
        warning_threshold: Date,
    ) -> BillingResult<Vec<ChurchSubscription>> {
        let rows: Vec<ChurchSubscription> = sqlx::query_as(
            r#"
            SELECT * FROM church_subscriptions
            WHERE status = 'SUSPENDED'
              AND data_retention_end_date IS NOT NULL
              AND data_retention_end_date <= $1
              AND deletion_warning_sent_at IS NULL
            ORDER BY data_retention_end_date
            "#,
        )
        .bind(warning_threshold)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// SUSPENDED subscriptions past their retention window whose warning was
    /// sent before `warning_cutoff`
    pub async fn eligible_for_deletion(
        &self,
        today: Date,
        warning_cutoff: OffsetDateTime,
    ) -> BillingResult<Vec<ChurchSubscription>> {
        let rows: Vec<ChurchSubscription> = sqlx::query_as(
            r#"
            SELECT * FROM church_subscriptions
            WHERE status = 'SUSPENDED'
              AND data_retention_end_date IS NOT NULL
              AND data_retention_end_date <= $1
              AND deletion_warning_sent_at IS NOT NULL
              AND deletion_warning_sent_at <= $2
            ORDER BY data_retention_end_date
            "#,
        )
        .bind(today)
        .bind(warning_cutoff)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn mark_deletion_warning_sent(&self, church_id: i64) -> BillingResult<()> {
        sqlx::query(
            r#"
            UPDATE church_subscriptions
            SET deletion_warning_sent_at = NOW(), updated_at = NOW()
            WHERE church_id = $1 AND status = 'SUSPENDED'
            "#,
        )
        .bind(church_id)
        .execute(&self.pool)
        .await?;

        self.events
            .log_event(BillingEventBuilder::new(
                church_id,
                BillingEventType::DeletionWarningSent,
            ))
            .await?;

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use time::macros::{date, datetime};

    fn subscription(status: &str) -> ChurchSubscription {
        ChurchSubscription {
            id: 1,
            church_id: 7,
            status: status.to_string(),
            tier_id: 2,
            billing_interval: "MONTHLY".to_string(),
            current_period_start: Some(date!(2026 - 02 - 01)),
            current_period_end: Some(date!(2026 - 03 - 01)),
            next_billing_date: Some(date!(2026 - 03 - 01)),
            trial_end_date: None,
            canceled_at: None,
            ends_at: None,
            auto_renew: true,
            grace_period_days: 7,
            failed_payment_attempts: 0,
            authorization_code: Some("AUTH_x9".to_string()),
            free_months_remaining: 0,
            promotional_note: None,
            suspended_at: None,
            data_retention_end_date: None,
            retention_extension_days: 0,
            retention_extension_note: None,
            deletion_warning_sent_at: None,
            pending_tier_id: None,
            pending_interval: None,
            created_at: datetime!(2026-01-01 0:00 UTC),
            updated_at: datetime!(2026-01-01 0:00 UTC),
        }
    }

    #[test]
    fn test_grace_period_boundary() {
        let sub = subscription("PAST_DUE");

        // Billing date 2026-03-01, grace 7 days: in grace through 03-07,
        // suspendable from 03-08
        assert!(sub.is_in_grace_period(date!(2026 - 03 - 01)));
        assert!(sub.is_in_grace_period(date!(2026 - 03 - 07)));
        assert!(!sub.is_in_grace_period(date!(2026 - 03 - 08)));

        assert!(!sub.should_suspend(date!(2026 - 03 - 07)));
        assert!(sub.should_suspend(date!(2026 - 03 - 08)));
    }

    #[test]
    fn test_active_subscription_is_never_suspendable() {
        let sub = subscription("ACTIVE");
        assert!(!sub.is_in_grace_period(date!(2026 - 03 - 10)));
        assert!(!sub.should_suspend(date!(2026 - 12 - 31)));
    }

    #[test]
    fn test_deletion_eligibility_requires_expired_countdown_and_warning() {
        let mut sub = subscription("SUSPENDED");
        sub.data_retention_end_date = Some(date!(2026 - 04 - 01));

        // Countdown expired but no warning ever sent
        assert!(!sub.is_eligible_for_deletion(date!(2026 - 04 - 02), datetime!(2026-04-02 0:00 UTC)));

        // Warning sent only yesterday: too recent
        sub.deletion_warning_sent_at = Some(datetime!(2026-04-01 0:00 UTC));
        assert!(!sub.is_eligible_for_deletion(date!(2026 - 04 - 02), datetime!(2026-04-02 0:00 UTC)));

        // Warning sent 7+ days ago and countdown expired
        sub.deletion_warning_sent_at = Some(datetime!(2026-03-25 0:00 UTC));
        assert!(sub.is_eligible_for_deletion(date!(2026 - 04 - 02), datetime!(2026-04-02 0:00 UTC)));

        // Countdown still running
        assert!(!sub.is_eligible_for_deletion(date!(2026 - 03 - 30), datetime!(2026-03-30 0:00 UTC)));
    }

    #[test]
    fn test_days_until_deletion() {
        let mut sub = subscription("SUSPENDED");
        sub.data_retention_end_date = Some(date!(2026 - 04 - 15));

        assert_eq!(sub.days_until_deletion(date!(2026 - 04 - 01)), Some(14));
        assert_eq!(sub.days_until_deletion(date!(2026 - 04 - 15)), Some(0));
        assert_eq!(sub.days_until_deletion(date!(2026 - 04 - 20)), Some(-5));

        sub.data_retention_end_date = None;
        assert_eq!(sub.days_until_deletion(date!(2026 - 04 - 01)), None);
    }
}
