//! Subscription and purchase routes (operator API)

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use shepherd_billing::{
    ActorType, ChurchSubscription, PaymentSession, UpgradeInitiated, UpgradePreview,
};
use shepherd_shared::types::BillingInterval;

use crate::{auth::authorize, error::ApiError, state::AppState};

/// Subscription info response
#[derive(Debug, Serialize)]
pub struct SubscriptionInfo {
    pub church_id: i64,
    pub status: String,
    pub tier_id: i64,
    pub billing_interval: String,
    pub current_period_start: Option<String>,
    pub current_period_end: Option<String>,
    pub next_billing_date: Option<String>,
    pub trial_end_date: Option<String>,
    pub failed_payment_attempts: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_retention_end_date: Option<String>,
    pub has_pending_upgrade: bool,
}

impl From<ChurchSubscription> for SubscriptionInfo {
    fn from(subscription: ChurchSubscription) -> Self {
        Self {
            church_id: subscription.church_id,
            has_pending_upgrade: subscription.has_pending_upgrade(),
            status: subscription.status,
            tier_id: subscription.tier_id,
            billing_interval: subscription.billing_interval,
            current_period_start: subscription.current_period_start.map(|d| d.to_string()),
            current_period_end: subscription.current_period_end.map(|d| d.to_string()),
            next_billing_date: subscription.next_billing_date.map(|d| d.to_string()),
            trial_end_date: subscription.trial_end_date.map(|d| d.to_string()),
            failed_payment_attempts: subscription.failed_payment_attempts,
            data_retention_end_date: subscription.data_retention_end_date.map(|d| d.to_string()),
        }
    }
}

/// Get a church's subscription
pub async fn get_subscription(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(church_id): Path<i64>,
) -> Result<Json<SubscriptionInfo>, ApiError> {
    authorize(&state, &headers, "subscriptions.read")?;

    let subscription = state.billing.subscriptions.get(church_id).await?;

    Ok(Json(subscription.into()))
}

/// Soft-cancel a subscription (remains usable until period end)
pub async fn cancel_subscription(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(church_id): Path<i64>,
) -> Result<Json<SubscriptionInfo>, ApiError> {
    let operator = authorize(&state, &headers, "subscriptions.cancel")?;

    tracing::info!(church_id = church_id, operator = %operator.name, "Cancel subscription requested");

    let subscription = state
        .billing
        .subscriptions
        .cancel(church_id, ActorType::Operator)
        .await?;

    Ok(Json(subscription.into()))
}

/// Request to reactivate a canceled/suspended subscription
#[derive(Debug, Deserialize)]
pub struct ReactivateRequest {
    /// Months of service to grant (defaults to 1)
    pub months: Option<i32>,
}

/// Manually reactivate a CANCELED or SUSPENDED subscription.
/// This is the only path back to ACTIVE for those states.
pub async fn reactivate_subscription(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(church_id): Path<i64>,
    Json(req): Json<ReactivateRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let operator = authorize(&state, &headers, "subscriptions.reactivate")?;

    let months = req.months.unwrap_or(1).max(1);
    let today = OffsetDateTime::now_utc().date();

    let subscription = state
        .billing
        .subscriptions
        .reactivate(church_id, months, today, &operator.name)
        .await?;

    Ok(Json(serde_json::json!({
        "church_id": subscription.church_id,
        "status": subscription.status,
        "current_period_end": subscription.current_period_end.map(|d| d.to_string()),
    })))
}

/// Request to open a subscription checkout session
#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub tier_id: i64,
    pub billing_interval: Option<String>,
    pub email: String,
}

/// Open a hosted checkout session for a subscription.
/// Activation happens when the gateway confirms the charge via webhook.
pub async fn subscription_checkout(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(church_id): Path<i64>,
    Json(req): Json<CheckoutRequest>,
) -> Result<Json<PaymentSession>, ApiError> {
    authorize(&state, &headers, "subscriptions.checkout")?;

    let interval = parse_interval(&req.billing_interval)?.unwrap_or_default();

    let session = state
        .billing
        .checkout
        .initiate_subscription_checkout(church_id, req.tier_id, interval, &req.email)
        .await?;

    Ok(Json(session))
}

/// Billing audit events for a church, newest first
pub async fn billing_events(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(church_id): Path<i64>,
) -> Result<Json<Vec<shepherd_billing::BillingEvent>>, ApiError> {
    authorize(&state, &headers, "subscriptions.events")?;

    let events = state.billing.events.get_events_for_church(church_id, 50).await?;

    Ok(Json(events))
}

/// Request to preview or initiate a tier change
#[derive(Debug, Deserialize)]
pub struct TierChangeRequest {
    pub new_tier_id: i64,
    pub new_interval: Option<String>,
    /// Billing email for the checkout session (initiate only)
    pub email: Option<String>,
    pub reason: Option<String>,
}

fn parse_interval(raw: &Option<String>) -> Result<Option<BillingInterval>, ApiError> {
    raw.as_deref()
        .map(|s| s.parse::<BillingInterval>())
        .transpose()
        .map_err(ApiError::BadRequest)
}

/// Preview the proration for a tier/interval change
pub async fn preview_tier_change(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(church_id): Path<i64>,
    Json(req): Json<TierChangeRequest>,
) -> Result<Json<UpgradePreview>, ApiError> {
    authorize(&state, &headers, "tier_changes.preview")?;

    let new_interval = parse_interval(&req.new_interval)?;
    let today = OffsetDateTime::now_utc().date();

    let preview = state
        .billing
        .tier_changes
        .preview(church_id, req.new_tier_id, new_interval, today)
        .await?;

    Ok(Json(preview))
}

/// Response from initiating a tier change
#[derive(Debug, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum TierChangeInitiatedResponse {
    AppliedImmediately { status: String, tier_id: i64 },
    PaymentRequired { session: PaymentSession },
}

/// Initiate a tier/interval change
pub async fn initiate_tier_change(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(church_id): Path<i64>,
    Json(req): Json<TierChangeRequest>,
) -> Result<Json<TierChangeInitiatedResponse>, ApiError> {
    authorize(&state, &headers, "tier_changes.initiate")?;

    let new_interval = parse_interval(&req.new_interval)?;
    let email = req
        .email
        .as_deref()
        .ok_or_else(|| ApiError::BadRequest("email is required".to_string()))?;
    let today = OffsetDateTime::now_utc().date();

    let initiated = state
        .billing
        .tier_changes
        .initiate(
            church_id,
            req.new_tier_id,
            new_interval,
            email,
            req.reason.as_deref(),
            today,
        )
        .await?;

    let response = match initiated {
        UpgradeInitiated::AppliedImmediately(subscription) => {
            TierChangeInitiatedResponse::AppliedImmediately {
                status: subscription.status,
                tier_id: subscription.tier_id,
            }
        }
        UpgradeInitiated::PaymentRequired(session) => {
            TierChangeInitiatedResponse::PaymentRequired { session }
        }
    };

    Ok(Json(response))
}

/// Roll back a pending tier change
pub async fn rollback_tier_change(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(church_id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let operator = authorize(&state, &headers, "tier_changes.rollback")?;

    state
        .billing
        .tier_changes
        .rollback(church_id, &operator.name)
        .await?;

    Ok(Json(serde_json::json!({ "rolled_back": true })))
}

/// Tier change history for a church, newest first
pub async fn tier_change_history(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(church_id): Path<i64>,
) -> Result<Json<Vec<shepherd_billing::TierChangeHistory>>, ApiError> {
    authorize(&state, &headers, "tier_changes.history")?;

    let history = state.billing.tier_changes.history_for_church(church_id).await?;

    Ok(Json(history))
}

/// Request to purchase a storage addon
#[derive(Debug, Deserialize)]
pub struct AddonPurchaseRequest {
    pub addon_id: i64,
    pub email: String,
}

/// Start a storage addon purchase
pub async fn purchase_addon(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(church_id): Path<i64>,
    Json(req): Json<AddonPurchaseRequest>,
) -> Result<Json<PaymentSession>, ApiError> {
    authorize(&state, &headers, "addons.purchase")?;

    let session = state
        .billing
        .addons
        .initiate_purchase(church_id, req.addon_id, &req.email)
        .await?;

    Ok(Json(session))
}

/// Request to top up SMS credits
#[derive(Debug, Deserialize)]
pub struct SmsTopUpRequest {
    pub credit_amount_cents: i64,
    pub email: String,
}

/// Start an SMS credit top-up
pub async fn top_up_sms_credits(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(church_id): Path<i64>,
    Json(req): Json<SmsTopUpRequest>,
) -> Result<Json<PaymentSession>, ApiError> {
    authorize(&state, &headers, "sms_credits.top_up")?;

    let session = state
        .billing
        .sms_credits
        .initiate_top_up(church_id, req.credit_amount_cents, &req.email)
        .await?;

    Ok(Json(session))
}

/// Current SMS credit balance
pub async fn sms_credit_balance(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(church_id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    authorize(&state, &headers, "sms_credits.read")?;

    let balance_cents = state.billing.sms_credits.balance(church_id).await?;

    Ok(Json(serde_json::json!({
        "church_id": church_id,
        "balance_cents": balance_cents,
    })))
}

/// Request to apply a partnership code
#[derive(Debug, Deserialize)]
pub struct PartnershipCodeRequest {
    pub code: String,
}

/// Apply a partnership code to a church's subscription
pub async fn apply_partnership_code(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(church_id): Path<i64>,
    Json(req): Json<PartnershipCodeRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    authorize(&state, &headers, "partnership_codes.apply")?;

    let subscription = state.billing.partnership.apply(church_id, &req.code).await?;

    Ok(Json(serde_json::json!({
        "church_id": subscription.church_id,
        "status": subscription.status,
        "current_period_end": subscription.current_period_end.map(|d| d.to_string()),
        "next_billing_date": subscription.next_billing_date.map(|d| d.to_string()),
    })))
}
