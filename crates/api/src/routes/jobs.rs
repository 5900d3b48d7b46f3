//! Job monitoring and control routes (operator API)

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use serde::Deserialize;

use shepherd_worker::{ScheduledJobExecution, JOBS};

use crate::{auth::authorize, error::ApiError, state::AppState};

/// Registered jobs and their cadences
pub async fn list_jobs(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    authorize(&state, &headers, "jobs.list")?;

    let jobs: Vec<serde_json::Value> = JOBS
        .iter()
        .map(|spec| {
            serde_json::json!({
                "name": spec.name,
                "description": spec.description,
                "cron": spec.cron,
            })
        })
        .collect();

    Ok(Json(serde_json::json!({ "jobs": jobs })))
}

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    /// Look-back window in hours (default 24)
    pub hours: Option<i32>,
}

/// Recent executions across all jobs
pub async fn recent_executions(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<RecentQuery>,
) -> Result<Json<Vec<ScheduledJobExecution>>, ApiError> {
    authorize(&state, &headers, "jobs.list")?;

    let hours = query.hours.unwrap_or(24).clamp(1, 24 * 30);
    let executions = state.jobs.executions().recent(hours).await?;

    Ok(Json(executions))
}

/// Currently RUNNING executions
pub async fn running_jobs(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<ScheduledJobExecution>>, ApiError> {
    authorize(&state, &headers, "jobs.list")?;

    let executions = state.jobs.executions().running().await?;

    Ok(Json(executions))
}

/// Execution history for one job
pub async fn job_executions(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(job_name): Path<String>,
) -> Result<Json<Vec<ScheduledJobExecution>>, ApiError> {
    authorize(&state, &headers, "jobs.list")?;

    let executions = state.jobs.executions().for_job(&job_name).await?;

    Ok(Json(executions))
}

/// Manually trigger a job.
/// Rejected with 409 while a prior run is still RUNNING.
pub async fn trigger_job(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(job_name): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let operator = authorize(&state, &headers, "jobs.trigger")?;

    let execution_id = state
        .jobs
        .trigger(&job_name, true, Some(&operator.name))
        .await?;

    Ok(Json(serde_json::json!({ "execution_id": execution_id })))
}

/// Retry a FAILED execution as a new linked execution
pub async fn retry_execution(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(execution_id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let operator = authorize(&state, &headers, "jobs.retry")?;

    let new_execution_id = state.jobs.retry(execution_id, &operator.name).await?;

    Ok(Json(serde_json::json!({ "execution_id": new_execution_id })))
}

/// Request cooperative cancellation of a RUNNING execution
pub async fn cancel_execution(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(execution_id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let operator = authorize(&state, &headers, "jobs.cancel")?;

    state
        .jobs
        .executions()
        .request_cancel(execution_id, &operator.name)
        .await?;

    Ok(Json(serde_json::json!({
        "canceled": true,
        "message": "Cancellation requested; the job stops at the next item boundary",
    })))
}
