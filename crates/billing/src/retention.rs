//! Data-retention tracking for suspended subscriptions
//!
//! Suspension starts a deletion countdown; operators can extend it or cancel
//! it entirely. Canceling the countdown never reactivates the subscription.
//! Reactivation is a separate manual operation, so nobody gets service back
//! for free by merely stopping a deletion.

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use time::{Date, OffsetDateTime};

use crate::error::{BillingError, BillingResult};
use crate::events::{ActorType, BillingEventBuilder, BillingEventLogger, BillingEventType};
use crate::subscriptions::ChurchSubscription;
use shepherd_shared::types::SubscriptionStatus;

/// Operator-dashboard urgency banding for a pending deletion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UrgencyLevel {
    Overdue,
    Critical,
    High,
    Medium,
    Low,
}

impl UrgencyLevel {
    /// Band `days_until_deletion` into an urgency level
    pub fn from_days_until_deletion(days: i64) -> Self {
        if days <= 0 {
            Self::Overdue
        } else if days <= 3 {
            Self::Critical
        } else if days <= 7 {
            Self::High
        } else if days <= 14 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

/// One row of the operator pending-deletions dashboard
#[derive(Debug, Clone, Serialize)]
pub struct PendingDeletion {
    pub church_id: i64,
    pub church_name: String,
    pub suspended_at: Option<OffsetDateTime>,
    pub data_retention_end_date: Date,
    pub days_until_deletion: i64,
    pub warning_sent: bool,
    pub retention_extension_days: i32,
    pub retention_extension_note: Option<String>,
    pub urgency: UrgencyLevel,
}

/// Tracks and adjusts deletion countdowns for suspended subscriptions
pub struct DataRetentionTracker {
    pool: PgPool,
    events: BillingEventLogger,
}

impl DataRetentionTracker {
    pub fn new(pool: PgPool) -> Self {
        Self {
            events: BillingEventLogger::new(pool.clone()),
            pool,
        }
    }

    /// Extend the retention countdown for a SUSPENDED subscription.
    ///
    /// Adds `extension_days` to `data_retention_end_date`, accumulates the
    /// total extension, and replaces the note. Also clears any sent warning
    /// so the warning job re-fires near the new date.
    pub async fn extend(
        &self,
        church_id: i64,
        extension_days: i32,
        note: &str,
        triggered_by: &str,
    ) -> BillingResult<ChurchSubscription> {
        if extension_days <= 0 {
            return Err(BillingError::InvalidInput(
                "Extension days must be positive".to_string(),
            ));
        }

        let updated: Option<ChurchSubscription> = sqlx::query_as(
            r#"
            UPDATE church_subscriptions
            SET data_retention_end_date = data_retention_end_date + $2,
                retention_extension_days = retention_extension_days + $2,
                retention_extension_note = $3,
                deletion_warning_sent_at = NULL,
                updated_at = NOW()
            WHERE church_id = $1
              AND status = 'SUSPENDED'
              AND data_retention_end_date IS NOT NULL
            RETURNING *
            "#,
        )
        .bind(church_id)
        .bind(extension_days)
        .bind(note)
        .fetch_optional(&self.pool)
        .await?;

        let subscription = updated.ok_or(BillingError::RetentionNotApplicable(church_id))?;

        self.events
            .log_event(
                BillingEventBuilder::new(church_id, BillingEventType::RetentionExtended)
                    .actor_labeled(ActorType::Operator, triggered_by)
                    .data(serde_json::json!({
                        "extension_days": extension_days,
                        "note": note,
                        "new_retention_end": subscription
                            .data_retention_end_date
                            .map(|d| d.to_string()),
                    })),
            )
            .await?;

        tracing::info!(
            church_id = church_id,
            extension_days = extension_days,
            new_retention_end = ?subscription.data_retention_end_date,
            triggered_by = triggered_by,
            "Extended data retention"
        );

        Ok(subscription)
    }

    /// Cancel the deletion countdown for a SUSPENDED subscription.
    ///
    /// The subscription REMAINS SUSPENDED; only an explicit manual
    /// reactivation restores service.
    pub async fn cancel_deletion(
        &self,
        church_id: i64,
        triggered_by: &str,
    ) -> BillingResult<ChurchSubscription> {
        let updated: Option<ChurchSubscription> = sqlx::query_as(
            r#"
            UPDATE church_subscriptions
            SET data_retention_end_date = NULL,
                retention_extension_days = 0,
                retention_extension_note = NULL,
                deletion_warning_sent_at = NULL,
                updated_at = NOW()
            WHERE church_id = $1 AND status = 'SUSPENDED'
            RETURNING *
            "#,
        )
        .bind(church_id)
        .fetch_optional(&self.pool)
        .await?;

        let subscription = updated.ok_or(BillingError::RetentionNotApplicable(church_id))?;

        self.events
            .log_event(
                BillingEventBuilder::new(church_id, BillingEventType::DeletionCanceled)
                    .actor_labeled(ActorType::Operator, triggered_by),
            )
            .await?;

        tracing::warn!(
            church_id = church_id,
            triggered_by = triggered_by,
            "Deletion canceled; subscription remains SUSPENDED pending manual reactivation"
        );

        Ok(subscription)
    }

    /// All churches with a running deletion countdown, most urgent first
    pub async fn pending_deletions(&self, today: Date) -> BillingResult<Vec<PendingDeletion>> {
        let rows: Vec<(i64, String, Option<OffsetDateTime>, Date, Option<OffsetDateTime>, i32, Option<String>)> =
            sqlx::query_as(
                r#"
                SELECT s.church_id,
                       c.name,
                       s.suspended_at,
                       s.data_retention_end_date,
                       s.deletion_warning_sent_at,
                       s.retention_extension_days,
                       s.retention_extension_note
                FROM church_subscriptions s
                JOIN churches c ON c.id = s.church_id
                WHERE s.status = 'SUSPENDED'
                  AND s.data_retention_end_date IS NOT NULL
                ORDER BY s.data_retention_end_date ASC
                "#,
            )
            .fetch_all(&self.pool)
            .await?;

        let pending = rows
            .into_iter()
            .map(
                |(church_id, name, suspended_at, retention_end, warning_sent_at, ext_days, ext_note)| {
                    let days = (retention_end - today).whole_days();
                    PendingDeletion {
                        church_id,
                        church_name: name,
                        suspended_at,
                        data_retention_end_date: retention_end,
                        days_until_deletion: days,
                        warning_sent: warning_sent_at.is_some(),
                        retention_extension_days: ext_days,
                        retention_extension_note: ext_note,
                        urgency: UrgencyLevel::from_days_until_deletion(days),
                    }
                },
            )
            .collect();

        Ok(pending)
    }

    /// Guard used by operator endpoints: the church must currently be
    /// suspended with a running countdown.
    pub async fn require_pending_deletion(&self, church_id: i64) -> BillingResult<ChurchSubscription> {
        let subscription: Option<ChurchSubscription> =
            sqlx::query_as("SELECT * FROM church_subscriptions WHERE church_id = $1")
                .bind(church_id)
                .fetch_optional(&self.pool)
                .await?;

        let subscription = subscription.ok_or(BillingError::SubscriptionNotFound(church_id))?;

        if subscription.subscription_status() != SubscriptionStatus::Suspended
            || subscription.data_retention_end_date.is_none()
        {
            return Err(BillingError::RetentionNotApplicable(church_id));
        }

        Ok(subscription)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urgency_banding() {
        assert_eq!(UrgencyLevel::from_days_until_deletion(-3), UrgencyLevel::Overdue);
        assert_eq!(UrgencyLevel::from_days_until_deletion(0), UrgencyLevel::Overdue);
        assert_eq!(UrgencyLevel::from_days_until_deletion(1), UrgencyLevel::Critical);
        assert_eq!(UrgencyLevel::from_days_until_deletion(3), UrgencyLevel::Critical);
        assert_eq!(UrgencyLevel::from_days_until_deletion(4), UrgencyLevel::High);
        assert_eq!(UrgencyLevel::from_days_until_deletion(7), UrgencyLevel::High);
        assert_eq!(UrgencyLevel::from_days_until_deletion(8), UrgencyLevel::Medium);
        assert_eq!(UrgencyLevel::from_days_until_deletion(14), UrgencyLevel::Medium);
        assert_eq!(UrgencyLevel::from_days_until_deletion(15), UrgencyLevel::Low);
        assert_eq!(UrgencyLevel::from_days_until_deletion(90), UrgencyLevel::Low);
    }
}
