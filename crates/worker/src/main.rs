//! Worker binary: schedules all registered background jobs
//!
//! One shared scheduler drives the registry; every tick goes through
//! `JobRunner::trigger`, so a tick that lands while the previous run is still
//! RUNNING is rejected by the one-running-per-job invariant and skipped.

use std::sync::Arc;

use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use shepherd_billing::{BillingEngine, BillingError};
use shepherd_worker::{JobRunner, JOBS};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .json()
        .init();

    let database_url = std::env::var("DATABASE_URL")
        .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?;

    let pool = shepherd_shared::db::create_pool(&database_url).await?;
    let engine = Arc::new(BillingEngine::from_env(pool.clone())?);
    let runner = JobRunner::new(pool, engine);

    let mut scheduler = JobScheduler::new().await?;

    for spec in JOBS {
        let runner = runner.clone();
        let job_name = spec.name;

        let job = Job::new_async(spec.cron, move |_uuid, _lock| {
            let runner = runner.clone();
            Box::pin(async move {
                match runner.trigger(job_name, false, None).await {
                    Ok(execution_id) => {
                        info!(job_name = job_name, execution_id = execution_id, "Scheduled job run finished");
                    }
                    Err(BillingError::JobAlreadyRunning(_)) => {
                        warn!(job_name = job_name, "Previous run still in progress, tick skipped");
                    }
                    Err(e) => {
                        error!(job_name = job_name, error = %e, "Scheduled job run failed to start");
                    }
                }
            })
        })?;

        scheduler.add(job).await?;
    }

    scheduler.start().await?;
    info!(jobs = JOBS.len(), "Worker started");

    tokio::signal::ctrl_c().await?;
    info!("Shutting down worker");
    scheduler.shutdown().await?;

    Ok(())
}
