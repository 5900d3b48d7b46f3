//! API routes

pub mod billing;
pub mod health;
pub mod jobs;
pub mod retention;
pub mod webhooks;

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;

/// Create all API routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health (root level for infrastructure monitoring)
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        // Gateway webhooks
        .route("/webhooks/:gateway/events", post(webhooks::gateway_events))
        // Subscriptions
        .route("/api/churches/:church_id/subscription", get(billing::get_subscription))
        .route(
            "/api/churches/:church_id/subscription/checkout",
            post(billing::subscription_checkout),
        )
        .route(
            "/api/churches/:church_id/subscription/cancel",
            post(billing::cancel_subscription),
        )
        .route(
            "/api/churches/:church_id/subscription/reactivate",
            post(billing::reactivate_subscription),
        )
        .route(
            "/api/churches/:church_id/billing-events",
            get(billing::billing_events),
        )
        // Tier changes
        .route(
            "/api/churches/:church_id/tier-change/preview",
            post(billing::preview_tier_change),
        )
        .route(
            "/api/churches/:church_id/tier-change",
            post(billing::initiate_tier_change).delete(billing::rollback_tier_change),
        )
        .route(
            "/api/churches/:church_id/tier-change/history",
            get(billing::tier_change_history),
        )
        // Purchases
        .route("/api/churches/:church_id/addons", post(billing::purchase_addon))
        .route(
            "/api/churches/:church_id/sms-credits",
            get(billing::sms_credit_balance),
        )
        .route(
            "/api/churches/:church_id/sms-credits/top-up",
            post(billing::top_up_sms_credits),
        )
        .route(
            "/api/churches/:church_id/partnership-code",
            post(billing::apply_partnership_code),
        )
        // Data retention
        .route("/api/platform/data-retention/pending-deletions", get(retention::pending_deletions))
        .route(
            "/api/platform/data-retention/pending-deletions/:church_id",
            get(retention::pending_deletion_details),
        )
        .route(
            "/api/platform/data-retention/:church_id/extend",
            post(retention::extend_retention),
        )
        .route(
            "/api/platform/data-retention/:church_id/deletion",
            delete(retention::cancel_deletion),
        )
        // Jobs
        .route("/api/platform/jobs", get(jobs::list_jobs))
        .route("/api/platform/jobs/running", get(jobs::running_jobs))
        .route("/api/platform/jobs/executions", get(jobs::recent_executions))
        .route("/api/platform/jobs/:job_name/executions", get(jobs::job_executions))
        .route("/api/platform/jobs/:job_name/trigger", post(jobs::trigger_job))
        .route(
            "/api/platform/jobs/executions/:execution_id/retry",
            post(jobs::retry_execution),
        )
        .route(
            "/api/platform/jobs/executions/:execution_id/cancel",
            post(jobs::cancel_execution),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
