//! Data retention routes (operator API)

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use serde::Deserialize;
use time::OffsetDateTime;

use shepherd_billing::PendingDeletion;

use crate::{auth::authorize, error::ApiError, state::AppState};

/// All churches with a running deletion countdown, most urgent first
pub async fn pending_deletions(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<PendingDeletion>>, ApiError> {
    authorize(&state, &headers, "retention.list")?;

    let today = OffsetDateTime::now_utc().date();
    let pending = state.billing.retention.pending_deletions(today).await?;

    Ok(Json(pending))
}

/// Deletion countdown details for one suspended church
pub async fn pending_deletion_details(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(church_id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    authorize(&state, &headers, "retention.read")?;

    let subscription = state.billing.retention.require_pending_deletion(church_id).await?;
    let today = OffsetDateTime::now_utc().date();

    Ok(Json(serde_json::json!({
        "church_id": subscription.church_id,
        "status": subscription.status,
        "suspended_at": subscription.suspended_at.map(|t| t.to_string()),
        "data_retention_end_date": subscription.data_retention_end_date.map(|d| d.to_string()),
        "days_until_deletion": subscription.days_until_deletion(today),
        "warning_sent": subscription.deletion_warning_sent_at.is_some(),
        "retention_extension_days": subscription.retention_extension_days,
        "retention_extension_note": subscription.retention_extension_note,
    })))
}

/// Request to extend a retention window
#[derive(Debug, Deserialize)]
pub struct ExtendRetentionRequest {
    pub extension_days: i32,
    pub note: String,
}

/// Extend the deletion countdown for a suspended church
pub async fn extend_retention(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(church_id): Path<i64>,
    Json(req): Json<ExtendRetentionRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let operator = authorize(&state, &headers, "retention.extend")?;

    let subscription = state
        .billing
        .retention
        .extend(church_id, req.extension_days, &req.note, &operator.name)
        .await?;

    Ok(Json(serde_json::json!({
        "church_id": subscription.church_id,
        "data_retention_end_date": subscription.data_retention_end_date.map(|d| d.to_string()),
        "retention_extension_days": subscription.retention_extension_days,
    })))
}

/// Cancel the deletion countdown. The subscription REMAINS SUSPENDED;
/// reactivation is a separate explicit operation.
pub async fn cancel_deletion(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(church_id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let operator = authorize(&state, &headers, "retention.cancel_deletion")?;

    let subscription = state
        .billing
        .retention
        .cancel_deletion(church_id, &operator.name)
        .await?;

    Ok(Json(serde_json::json!({
        "church_id": subscription.church_id,
        "status": subscription.status,
        "message": "Deletion canceled; subscription remains SUSPENDED until manually reactivated",
    })))
}
