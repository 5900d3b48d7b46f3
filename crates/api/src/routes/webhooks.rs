//! Payment gateway webhook endpoint

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
};

use shepherd_billing::{BillingError, WebhookOutcome};

use crate::{error::ApiError, state::AppState};

/// Handle `POST /webhooks/{gateway}/events`.
///
/// Responses follow the gateway retry contract: 200 for processed or safely
/// ignored events, 401 for bad signatures (no retry), 500 for retryable
/// internal errors.
pub async fn gateway_events(
    State(state): State<AppState>,
    Path(gateway): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    if gateway != "paystack" {
        return Err(ApiError::NotFound(format!("Unknown gateway: {}", gateway)));
    }

    tracing::info!(body_len = body.len(), "Gateway webhook received");

    let signature = headers
        .get("x-paystack-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            tracing::warn!("Webhook missing signature header");
            ApiError::InvalidSignature
        })?;

    match state.billing.reconciler.handle_webhook(&body, signature).await {
        Ok(WebhookOutcome::Processed) => {
            tracing::info!("Webhook processed");
            Ok(StatusCode::OK)
        }
        Ok(WebhookOutcome::AlreadyProcessed) => {
            tracing::info!("Webhook was a duplicate delivery, no effects reapplied");
            Ok(StatusCode::OK)
        }
        Ok(WebhookOutcome::Ignored) => {
            tracing::info!("Webhook acknowledged without side effects");
            Ok(StatusCode::OK)
        }
        Err(BillingError::InvalidSignature) => Err(ApiError::InvalidSignature),
        // A payload the gateway keeps resending unchanged cannot become
        // parseable; acknowledge so it stops retrying.
        Err(BillingError::InvalidInput(msg)) => {
            tracing::warn!(error = %msg, "Unparseable webhook payload acknowledged");
            Ok(StatusCode::OK)
        }
        // Database and internal errors surface as 500 so the gateway retries
        Err(e) => {
            tracing::error!(error = %e, "Webhook handling error");
            Err(ApiError::from(e))
        }
    }
}
