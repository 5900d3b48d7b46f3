//! Billing event audit log
//!
//! Append-only record of every state-mutating billing operation. Events
//! capture the tenant, the operation, who triggered it, and the before/after
//! subscription status, and can be used to:
//! - Answer "why is this church on this tier?" questions
//! - Reconstruct a subscription's lifecycle
//! - Compliance and audit requirements

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::BillingResult;
use shepherd_shared::types::SubscriptionStatus;

/// Types of billing events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BillingEventType {
    // Subscription lifecycle
    TrialStarted,
    SubscriptionActivated,
    SubscriptionPastDue,
    SubscriptionSuspended,
    SubscriptionCanceled,
    SubscriptionReactivated,
    SubscriptionDowngraded,

    // Renewals
    RenewalSucceeded,
    RenewalFailed,

    // Tier changes
    TierChangeInitiated,
    TierChangeCompleted,
    TierChangeRolledBack,

    // Addons and credits
    AddonActivated,
    AddonSuspended,
    SmsCreditsPurchased,

    // Retention and deletion
    RetentionExtended,
    DeletionCanceled,
    DeletionWarningSent,
    DataDeleted,

    // Codes and payments
    PartnershipCodeApplied,
    PaymentFailed,
}

impl std::fmt::Display for BillingEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BillingEventType::TrialStarted => "TRIAL_STARTED",
            BillingEventType::SubscriptionActivated => "SUBSCRIPTION_ACTIVATED",
            BillingEventType::SubscriptionPastDue => "SUBSCRIPTION_PAST_DUE",
            BillingEventType::SubscriptionSuspended => "SUBSCRIPTION_SUSPENDED",
            BillingEventType::SubscriptionCanceled => "SUBSCRIPTION_CANCELED",
            BillingEventType::SubscriptionReactivated => "SUBSCRIPTION_REACTIVATED",
            BillingEventType::SubscriptionDowngraded => "SUBSCRIPTION_DOWNGRADED",
            BillingEventType::RenewalSucceeded => "RENEWAL_SUCCEEDED",
            BillingEventType::RenewalFailed => "RENEWAL_FAILED",
            BillingEventType::TierChangeInitiated => "TIER_CHANGE_INITIATED",
            BillingEventType::TierChangeCompleted => "TIER_CHANGE_COMPLETED",
            BillingEventType::TierChangeRolledBack => "TIER_CHANGE_ROLLED_BACK",
            BillingEventType::AddonActivated => "ADDON_ACTIVATED",
            BillingEventType::AddonSuspended => "ADDON_SUSPENDED",
            BillingEventType::SmsCreditsPurchased => "SMS_CREDITS_PURCHASED",
            BillingEventType::RetentionExtended => "RETENTION_EXTENDED",
            BillingEventType::DeletionCanceled => "DELETION_CANCELED",
            BillingEventType::DeletionWarningSent => "DELETION_WARNING_SENT",
            BillingEventType::DataDeleted => "DATA_DELETED",
            BillingEventType::PartnershipCodeApplied => "PARTNERSHIP_CODE_APPLIED",
            BillingEventType::PaymentFailed => "PAYMENT_FAILED",
        };
        write!(f, "{}", s)
    }
}

/// Who triggered the event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActorType {
    /// Church user through the app
    User,
    /// Platform operator (admin dashboard)
    Operator,
    /// System automation (scheduled jobs)
    System,
    /// Payment gateway webhook
    Gateway,
}

impl std::fmt::Display for ActorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActorType::User => write!(f, "user"),
            ActorType::Operator => write!(f, "operator"),
            ActorType::System => write!(f, "system"),
            ActorType::Gateway => write!(f, "gateway"),
        }
    }
}

/// A billing event record
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct BillingEvent {
    pub id: Uuid,
    pub church_id: i64,
    pub event_type: String,
    pub event_data: serde_json::Value,
    pub actor_type: String,
    pub actor_label: Option<String>,
    pub status_before: Option<String>,
    pub status_after: Option<String>,
    pub payment_reference: Option<String>,
    pub created_at: OffsetDateTime,
}

/// Builder for creating billing events
pub struct BillingEventBuilder {
    church_id: i64,
    event_type: BillingEventType,
    event_data: serde_json::Value,
    actor_type: ActorType,
    actor_label: Option<String>,
    status_before: Option<SubscriptionStatus>,
    status_after: Option<SubscriptionStatus>,
    payment_reference: Option<String>,
}

impl BillingEventBuilder {
    pub fn new(church_id: i64, event_type: BillingEventType) -> Self {
        Self {
            church_id,
            event_type,
            event_data: serde_json::json!({}),
            actor_type: ActorType::System,
            actor_label: None,
            status_before: None,
            status_after: None,
            payment_reference: None,
        }
    }

    pub fn data(mut self, data: serde_json::Value) -> Self {
        self.event_data = data;
        self
    }

    pub fn actor(mut self, actor_type: ActorType) -> Self {
        self.actor_type = actor_type;
        self
    }

    /// Actor with a label (operator username, job name)
    pub fn actor_labeled(mut self, actor_type: ActorType, label: impl Into<String>) -> Self {
        self.actor_type = actor_type;
        self.actor_label = Some(label.into());
        self
    }

    /// Record the status transition this operation performed
    pub fn transition(mut self, before: SubscriptionStatus, after: SubscriptionStatus) -> Self {
        self.status_before = Some(before);
        self.status_after = Some(after);
        self
    }

    pub fn reference(mut self, reference: impl Into<String>) -> Self {
        self.payment_reference = Some(reference.into());
        self
    }
}

/// Service for logging and querying billing events
#[derive(Clone)]
pub struct BillingEventLogger {
    pool: PgPool,
}

impl BillingEventLogger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Append a billing event
    pub async fn log_event(&self, builder: BillingEventBuilder) -> BillingResult<Uuid> {
        let event_id: (Uuid,) = sqlx::query_as(
            r#"
            INSERT INTO billing_events
                (church_id, event_type, event_data, actor_type, actor_label,
                 status_before, status_after, payment_reference)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            "#,
        )
        .bind(builder.church_id)
        .bind(builder.event_type.to_string())
        .bind(&builder.event_data)
        .bind(builder.actor_type.to_string())
        .bind(&builder.actor_label)
        .bind(builder.status_before.map(|s| s.to_string()))
        .bind(builder.status_after.map(|s| s.to_string()))
        .bind(&builder.payment_reference)
        .fetch_one(&self.pool)
        .await?;

        Ok(event_id.0)
    }

    /// Get recent events for a church
    pub async fn get_events_for_church(
        &self,
        church_id: i64,
        limit: i64,
    ) -> BillingResult<Vec<BillingEvent>> {
        let events: Vec<BillingEvent> = sqlx::query_as(
            r#"
            SELECT *
            FROM billing_events
            WHERE church_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(church_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(events)
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_display() {
        assert_eq!(
            BillingEventType::SubscriptionActivated.to_string(),
            "SUBSCRIPTION_ACTIVATED"
        );
        assert_eq!(
            BillingEventType::TierChangeCompleted.to_string(),
            "TIER_CHANGE_COMPLETED"
        );
        assert_eq!(BillingEventType::DataDeleted.to_string(), "DATA_DELETED");
    }

    #[test]
    fn test_actor_type_display() {
        assert_eq!(ActorType::User.to_string(), "user");
        assert_eq!(ActorType::Operator.to_string(), "operator");
        assert_eq!(ActorType::System.to_string(), "system");
        assert_eq!(ActorType::Gateway.to_string(), "gateway");
    }

    #[test]
    fn test_event_builder_transition() {
        let builder = BillingEventBuilder::new(42, BillingEventType::SubscriptionSuspended)
            .transition(SubscriptionStatus::PastDue, SubscriptionStatus::Suspended)
            .actor(ActorType::System);

        assert_eq!(builder.church_id, 42);
        assert_eq!(builder.status_before, Some(SubscriptionStatus::PastDue));
        assert_eq!(builder.status_after, Some(SubscriptionStatus::Suspended));
        assert_eq!(builder.actor_type, ActorType::System);
    }
}
