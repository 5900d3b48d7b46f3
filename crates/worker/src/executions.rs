//! Scheduled job execution tracking
//!
//! Every job run gets a `scheduled_job_executions` row: RUNNING at start,
//! closed as SUCCESS/FAILED/CANCELED with timing and item counts. The start
//! insert is conditional on no other RUNNING row for the same job name, which
//! is the one-running-per-job invariant: a second start is rejected with
//! `JobAlreadyRunning`, never queued.

use serde::Serialize;
use sqlx::PgPool;
use time::OffsetDateTime;

use shepherd_billing::{BillingError, BillingResult};
use shepherd_shared::types::JobStatus;

/// A RUNNING claim older than this is considered abandoned (worker crash)
/// and no longer blocks new runs.
const STALE_RUNNING_HOURS: i32 = 6;

/// How long execution history is kept before weekly cleanup prunes it
const EXECUTION_RETENTION_DAYS: i32 = 90;

/// One job run
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ScheduledJobExecution {
    pub id: i64,
    pub job_name: String,
    pub description: Option<String>,
    pub status: String,
    pub start_time: OffsetDateTime,
    pub end_time: Option<OffsetDateTime>,
    pub duration_ms: Option<i64>,
    pub retry_count: i32,
    pub retry_of: Option<i64>,
    pub error_message: Option<String>,
    pub stack_trace: Option<String>,
    pub items_processed: Option<i32>,
    pub items_failed: Option<i32>,
    pub manually_triggered: bool,
    pub triggered_by: Option<String>,
    pub canceled: bool,
}

impl ScheduledJobExecution {
    pub fn job_status(&self) -> JobStatus {
        self.status.parse().unwrap_or(JobStatus::Failed)
    }
}

/// Tracks job executions and enforces one-running-per-job-name
#[derive(Clone)]
pub struct JobExecutionService {
    pool: PgPool,
}

impl JobExecutionService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Atomically claim the RUNNING slot for `job_name`.
    ///
    /// The INSERT only lands when no live RUNNING row exists for the job;
    /// stale claims (worker died mid-run) stop blocking after
    /// [`STALE_RUNNING_HOURS`]. Losing the race returns `JobAlreadyRunning`.
    pub async fn start(
        &self,
        job_name: &str,
        description: &str,
        manually_triggered: bool,
        triggered_by: Option<&str>,
        retry_of: Option<i64>,
        retry_count: i32,
    ) -> BillingResult<ScheduledJobExecution> {
        let claimed: Option<ScheduledJobExecution> = sqlx::query_as(
            r#"
            INSERT INTO scheduled_job_executions
                (job_name, description, status, start_time, manually_triggered,
                 triggered_by, retry_of, retry_count)
            SELECT $1, $2, 'RUNNING', NOW(), $3, $4, $5, $6
            WHERE NOT EXISTS (
                SELECT 1 FROM scheduled_job_executions
                WHERE job_name = $1
                  AND status = 'RUNNING'
                  AND start_time > NOW() - interval '1 hour' * $7
            )
            RETURNING *
            "#,
        )
        .bind(job_name)
        .bind(description)
        .bind(manually_triggered)
        .bind(triggered_by)
        .bind(retry_of)
        .bind(retry_count)
        .bind(STALE_RUNNING_HOURS)
        .fetch_optional(&self.pool)
        .await?;

        let execution = claimed.ok_or_else(|| BillingError::JobAlreadyRunning(job_name.to_string()))?;

        tracing::info!(
            job_name = job_name,
            execution_id = execution.id,
            manually_triggered = manually_triggered,
            retry_count = retry_count,
            "Job execution started"
        );

        Ok(execution)
    }

    /// Close a run as SUCCESS with its item counts
    pub async fn complete(
        &self,
        execution_id: i64,
        items_processed: i32,
        items_failed: i32,
    ) -> BillingResult<()> {
        sqlx::query(
            r#"
            UPDATE scheduled_job_executions
            SET status = 'SUCCESS',
                end_time = NOW(),
                duration_ms = (EXTRACT(EPOCH FROM (NOW() - start_time)) * 1000)::BIGINT,
                items_processed = $2,
                items_failed = $3
            WHERE id = $1 AND status = 'RUNNING'
            "#,
        )
        .bind(execution_id)
        .bind(items_processed)
        .bind(items_failed)
        .execute(&self.pool)
        .await?;

        tracing::info!(
            execution_id = execution_id,
            items_processed = items_processed,
            items_failed = items_failed,
            "Job execution completed"
        );

        Ok(())
    }

    /// Close a run as FAILED with the error and its chain
    pub async fn fail(&self, execution_id: i64, error: &anyhow::Error) -> BillingResult<()> {
        let error_message = error.to_string();
        let stack_trace = format!("{:?}", error);

        sqlx::query(
            r#"
            UPDATE scheduled_job_executions
            SET status = 'FAILED',
                end_time = NOW(),
                duration_ms = (EXTRACT(EPOCH FROM (NOW() - start_time)) * 1000)::BIGINT,
                error_message = $2,
                stack_trace = $3
            WHERE id = $1 AND status = 'RUNNING'
            "#,
        )
        .bind(execution_id)
        .bind(&error_message)
        .bind(&stack_trace)
        .execute(&self.pool)
        .await?;

        tracing::error!(
            execution_id = execution_id,
            error = %error_message,
            "Job execution failed"
        );

        Ok(())
    }

    /// Close a run as CANCELED after the job body observed the flag
    pub async fn close_canceled(
        &self,
        execution_id: i64,
        items_processed: i32,
        items_failed: i32,
    ) -> BillingResult<()> {
        sqlx::query(
            r#"
            UPDATE scheduled_job_executions
            SET status = 'CANCELED',
                end_time = NOW(),
                duration_ms = (EXTRACT(EPOCH FROM (NOW() - start_time)) * 1000)::BIGINT,
                items_processed = $2,
                items_failed = $3
            WHERE id = $1 AND status = 'RUNNING'
            "#,
        )
        .bind(execution_id)
        .bind(items_processed)
        .bind(items_failed)
        .execute(&self.pool)
        .await?;

        tracing::warn!(execution_id = execution_id, "Job execution canceled cooperatively");

        Ok(())
    }

    /// Request cooperative cancellation of a RUNNING execution.
    ///
    /// Only sets the flag; the job body polls it between items and stops
    /// early. In-flight work is not interrupted.
    pub async fn request_cancel(&self, execution_id: i64, canceled_by: &str) -> BillingResult<()> {
        let updated = sqlx::query(
            r#"
            UPDATE scheduled_job_executions
            SET canceled = TRUE
            WHERE id = $1 AND status = 'RUNNING'
            "#,
        )
        .bind(execution_id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if updated == 0 {
            return Err(BillingError::InvalidInput(format!(
                "Execution {} is not running",
                execution_id
            )));
        }

        tracing::warn!(
            execution_id = execution_id,
            canceled_by = canceled_by,
            "Job cancellation requested"
        );

        Ok(())
    }

    /// Poll the cooperative cancel flag (called between items by job bodies)
    pub async fn is_cancel_requested(&self, execution_id: i64) -> BillingResult<bool> {
        let row: Option<(bool,)> =
            sqlx::query_as("SELECT canceled FROM scheduled_job_executions WHERE id = $1")
                .bind(execution_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|(c,)| c).unwrap_or(false))
    }

    pub async fn get(&self, execution_id: i64) -> BillingResult<ScheduledJobExecution> {
        let execution: Option<ScheduledJobExecution> =
            sqlx::query_as("SELECT * FROM scheduled_job_executions WHERE id = $1")
                .bind(execution_id)
                .fetch_optional(&self.pool)
                .await?;

        execution.ok_or_else(|| BillingError::NotFound(format!("Execution {}", execution_id)))
    }

    /// Executions started in the last `hours_back` hours, newest first
    pub async fn recent(&self, hours_back: i32) -> BillingResult<Vec<ScheduledJobExecution>> {
        let executions: Vec<ScheduledJobExecution> = sqlx::query_as(
            r#"
            SELECT * FROM scheduled_job_executions
            WHERE start_time > NOW() - interval '1 hour' * $1
            ORDER BY start_time DESC
            "#,
        )
        .bind(hours_back)
        .fetch_all(&self.pool)
        .await?;

        Ok(executions)
    }

    pub async fn for_job(&self, job_name: &str) -> BillingResult<Vec<ScheduledJobExecution>> {
        let executions: Vec<ScheduledJobExecution> = sqlx::query_as(
            "SELECT * FROM scheduled_job_executions WHERE job_name = $1 ORDER BY start_time DESC",
        )
        .bind(job_name)
        .fetch_all(&self.pool)
        .await?;

        Ok(executions)
    }

    pub async fn running(&self) -> BillingResult<Vec<ScheduledJobExecution>> {
        let executions: Vec<ScheduledJobExecution> = sqlx::query_as(
            "SELECT * FROM scheduled_job_executions WHERE status = 'RUNNING' ORDER BY start_time",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(executions)
    }

    /// Prune execution history older than [`EXECUTION_RETENTION_DAYS`]
    pub async fn cleanup_old(&self) -> BillingResult<u64> {
        let deleted = sqlx::query(
            r#"
            DELETE FROM scheduled_job_executions
            WHERE start_time < NOW() - interval '1 day' * $1
              AND status <> 'RUNNING'
            "#,
        )
        .bind(EXECUTION_RETENTION_DAYS)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if deleted > 0 {
            tracing::info!(deleted = deleted, "Cleaned up old job execution records");
        }

        Ok(deleted)
    }
}
