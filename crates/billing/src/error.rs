//! Billing error types

use thiserror::Error;

/// Billing-specific errors
///
/// Business-rule violations are terminal and reported to the caller without
/// retry; `Database` and `Gateway` are infrastructure errors and surface so
/// the caller (or the payment gateway, for webhooks) retries.
#[derive(Debug, Error)]
pub enum BillingError {
    #[error("Webhook signature verification failed")]
    InvalidSignature,

    #[error("Unrecognized payment reference: {0}")]
    UnrecognizedReference(String),

    #[error("Missing required webhook metadata: {0}")]
    MissingMetadata(String),

    #[error("Payment already processed: {0}")]
    AlreadyProcessed(String),

    #[error("Subscription not found for church: {0}")]
    SubscriptionNotFound(i64),

    #[error("Invalid proration window: {0}")]
    InvalidProrationWindow(String),

    #[error("Church not eligible for tier: {0}")]
    IneligibleForUpgrade(String),

    #[error("Retention tracking not applicable: subscription for church {0} is not suspended")]
    RetentionNotApplicable(i64),

    #[error("Job already running: {0}")]
    JobAlreadyRunning(String),

    #[error("Tier upgrade already in progress for church: {0}")]
    PendingUpgradeExists(i64),

    #[error("Invalid partnership code: {0}")]
    InvalidPartnershipCode(String),

    #[error("Invalid subscription tier: {0}")]
    InvalidTier(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Payment gateway error: {0}")]
    Gateway(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for BillingError {
    fn from(err: sqlx::Error) -> Self {
        BillingError::Database(err.to_string())
    }
}

impl From<reqwest::Error> for BillingError {
    fn from(err: reqwest::Error) -> Self {
        BillingError::Gateway(err.to_string())
    }
}

pub type BillingResult<T> = Result<T, BillingError>;
