//! Explicit job registry
//!
//! Every background job is declared here: name, description, and cadence.
//! Scheduled ticks and manual triggers both go through [`JobRunner::trigger`],
//! so the one-running-per-name invariant and the execution audit trail apply
//! to both paths identically.

use sqlx::PgPool;
use std::sync::Arc;

use shepherd_billing::{BillingEngine, BillingError, BillingResult};

use crate::executions::JobExecutionService;
use crate::jobs::{self, JobContext, JobReport};

/// A registered background job
#[derive(Debug, Clone, Copy)]
pub struct JobSpec {
    pub name: &'static str,
    pub description: &'static str,
    /// Six-field cron (sec min hour dom month dow), UTC
    pub cron: &'static str,
}

/// All background jobs, driven by one shared scheduler
pub const JOBS: &[JobSpec] = &[
    JobSpec {
        name: "sendDailyEventReminders",
        description: "Send event reminders for upcoming events",
        cron: "0 0 9 * * *",
    },
    JobSpec {
        name: "processSubscriptionRenewals",
        description: "Process subscription renewals and charges",
        cron: "0 0 2 * * *",
    },
    JobSpec {
        name: "suspendPastDueSubscriptions",
        description: "Suspend subscriptions that are past due",
        cron: "0 0 3 * * *",
    },
    JobSpec {
        name: "sendDeletionWarnings",
        description: "Send deletion warning emails to suspended churches",
        cron: "0 0 1 * * *",
    },
    JobSpec {
        name: "deleteExpiredChurchData",
        description: "Permanently delete church data after the retention period",
        cron: "0 0 4 * * *",
    },
    JobSpec {
        name: "weeklyCleanup",
        description: "Weekly cleanup of old job execution records",
        cron: "0 0 2 * * Sun",
    },
];

/// Look up a job by name
pub fn find_job(name: &str) -> Option<&'static JobSpec> {
    JOBS.iter().find(|spec| spec.name == name)
}

/// Runs registered jobs with execution auditing
#[derive(Clone)]
pub struct JobRunner {
    pool: PgPool,
    engine: Arc<BillingEngine>,
    executions: JobExecutionService,
}

impl JobRunner {
    pub fn new(pool: PgPool, engine: Arc<BillingEngine>) -> Self {
        Self {
            executions: JobExecutionService::new(pool.clone()),
            pool,
            engine,
        }
    }

    pub fn executions(&self) -> &JobExecutionService {
        &self.executions
    }

    /// Run a job by name, recording a fresh execution.
    ///
    /// Rejects with `JobAlreadyRunning` while a prior run holds the slot.
    pub async fn trigger(
        &self,
        job_name: &str,
        manually_triggered: bool,
        triggered_by: Option<&str>,
    ) -> BillingResult<i64> {
        self.run_internal(job_name, manually_triggered, triggered_by, None, 0)
            .await
    }

    /// Retry a FAILED execution: a NEW execution row linked to the old one,
    /// with `retry_count` bumped, re-running the same job logic.
    pub async fn retry(&self, execution_id: i64, triggered_by: &str) -> BillingResult<i64> {
        let failed = self.executions.get(execution_id).await?;

        if failed.job_status() != shepherd_shared::types::JobStatus::Failed {
            return Err(BillingError::InvalidInput(format!(
                "Execution {} is {} and cannot be retried; only FAILED executions can",
                execution_id, failed.status
            )));
        }

        tracing::info!(
            job_name = %failed.job_name,
            failed_execution_id = execution_id,
            triggered_by = triggered_by,
            "Retrying failed job"
        );

        self.run_internal(
            &failed.job_name,
            true,
            Some(triggered_by),
            Some(execution_id),
            failed.retry_count + 1,
        )
        .await
    }

    async fn run_internal(
        &self,
        job_name: &str,
        manually_triggered: bool,
        triggered_by: Option<&str>,
        retry_of: Option<i64>,
        retry_count: i32,
    ) -> BillingResult<i64> {
        let spec = find_job(job_name)
            .ok_or_else(|| BillingError::NotFound(format!("Unknown job: {}", job_name)))?;

        let execution = self
            .executions
            .start(
                spec.name,
                spec.description,
                manually_triggered,
                triggered_by,
                retry_of,
                retry_count,
            )
            .await?;

        let ctx = JobContext {
            pool: self.pool.clone(),
            engine: self.engine.clone(),
            executions: self.executions.clone(),
            execution_id: execution.id,
        };

        let result = self.dispatch(spec.name, &ctx).await;

        match result {
            Ok(report) if report.canceled => {
                self.executions
                    .close_canceled(execution.id, report.processed, report.failed)
                    .await?;
            }
            Ok(report) => {
                self.executions
                    .complete(execution.id, report.processed, report.failed)
                    .await?;
            }
            Err(error) => {
                self.executions.fail(execution.id, &error).await?;
            }
        }

        Ok(execution.id)
    }

    async fn dispatch(&self, job_name: &str, ctx: &JobContext) -> anyhow::Result<JobReport> {
        match job_name {
            "sendDailyEventReminders" => jobs::send_daily_event_reminders(ctx).await,
            "processSubscriptionRenewals" => jobs::process_subscription_renewals(ctx).await,
            "suspendPastDueSubscriptions" => jobs::suspend_past_due_subscriptions(ctx).await,
            "sendDeletionWarnings" => jobs::send_deletion_warnings(ctx).await,
            "deleteExpiredChurchData" => jobs::delete_expired_church_data(ctx).await,
            "weeklyCleanup" => jobs::weekly_cleanup(ctx).await,
            other => anyhow::bail!("No handler registered for job {}", other),
        }
    }
}
