//! API error types and handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use shepherd_billing::BillingError;

/// Application error type
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    // Authentication errors
    #[error("Authentication required")]
    Unauthorized,
    #[error("Insufficient permissions")]
    Forbidden,

    // Validation errors
    #[error("Invalid request: {0}")]
    BadRequest(String),

    // Resource errors
    #[error("Resource not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),

    // Webhook errors
    #[error("Invalid webhook signature")]
    InvalidSignature,

    // Billing rule violations (terminal, not retried)
    #[error("{0}")]
    BillingRule(String),

    // Internal errors
    #[error("Database error: {0}")]
    Database(String),
    #[error("Internal server error")]
    Internal,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", self.to_string()),
            ApiError::Forbidden => (StatusCode::FORBIDDEN, "FORBIDDEN", self.to_string()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
            ApiError::InvalidSignature => {
                (StatusCode::UNAUTHORIZED, "INVALID_SIGNATURE", self.to_string())
            }
            ApiError::BillingRule(msg) => (StatusCode::UNPROCESSABLE_ENTITY, "BILLING_RULE", msg.clone()),
            ApiError::Database(msg) => {
                tracing::error!(error = %msg, "Database error surfaced to API");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "Internal server error".to_string(),
                )
            }
            ApiError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                self.to_string(),
            ),
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

impl From<BillingError> for ApiError {
    fn from(err: BillingError) -> Self {
        match err {
            BillingError::InvalidSignature => ApiError::InvalidSignature,
            BillingError::SubscriptionNotFound(church_id) => {
                ApiError::NotFound(format!("Subscription for church {}", church_id))
            }
            BillingError::NotFound(msg) => ApiError::NotFound(msg),
            BillingError::JobAlreadyRunning(job) => {
                ApiError::Conflict(format!("Job already running: {}", job))
            }
            BillingError::PendingUpgradeExists(church_id) => {
                ApiError::Conflict(format!("Tier upgrade already in progress for church {}", church_id))
            }
            // Terminal business-rule violations: stable code, no retry
            BillingError::InvalidProrationWindow(_)
            | BillingError::IneligibleForUpgrade(_)
            | BillingError::RetentionNotApplicable(_)
            | BillingError::InvalidPartnershipCode(_)
            | BillingError::InvalidTier(_)
            | BillingError::UnrecognizedReference(_)
            | BillingError::MissingMetadata(_)
            | BillingError::AlreadyProcessed(_) => ApiError::BillingRule(err.to_string()),
            BillingError::InvalidInput(msg) => ApiError::BadRequest(msg),
            // Transient infrastructure errors surface as 500 so callers retry
            BillingError::Database(msg) => ApiError::Database(msg),
            BillingError::Gateway(msg) => ApiError::Database(msg),
            BillingError::Config(_) | BillingError::Internal(_) => ApiError::Internal,
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
