// Test code patterns (expected in test files):
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Shepherd Worker
//!
//! Background job engine: an explicit job registry driven by a single
//! scheduler, with per-run execution auditing, one-running-per-job-name
//! enforcement, and manual trigger/retry/cancel support. The operator API
//! consumes [`registry::JobRunner`] and [`executions::JobExecutionService`]
//! for manual control.

pub mod executions;
pub mod jobs;
pub mod registry;

pub use executions::{JobExecutionService, ScheduledJobExecution};
pub use jobs::{JobContext, JobReport};
pub use registry::{find_job, JobRunner, JobSpec, JOBS};
