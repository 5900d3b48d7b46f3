//! Shared application state

use sqlx::PgPool;
use std::sync::Arc;

use shepherd_billing::BillingEngine;
use shepherd_worker::JobRunner;

use crate::config::Config;

/// State shared by all request handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub pool: PgPool,
    pub billing: Arc<BillingEngine>,
    pub jobs: JobRunner,
}

impl AppState {
    pub fn new(config: Config, pool: PgPool, billing: Arc<BillingEngine>) -> Self {
        Self {
            jobs: JobRunner::new(pool.clone(), billing.clone()),
            config: Arc::new(config),
            pool,
            billing,
        }
    }
}
