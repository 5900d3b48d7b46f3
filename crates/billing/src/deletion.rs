//! Permanent deletion of suspended tenants
//!
//! After the retention window (plus the 7-day warning lead) elapses, the
//! deletion job removes the tenant entirely. Deletion is irreversible; the
//! eligibility guard re-checks the subscription row so a concurrent extension
//! or cancellation always wins.

use sqlx::PgPool;
use time::{Date, OffsetDateTime};

use crate::email::BillingEmailService;
use crate::error::{BillingError, BillingResult};
use crate::events::{BillingEventBuilder, BillingEventLogger, BillingEventType};
use crate::subscriptions::ChurchSubscription;
use shepherd_shared::types::Church;

/// Permanent data deletion service
pub struct DataDeletionService {
    pool: PgPool,
    events: BillingEventLogger,
    email: BillingEmailService,
}

impl DataDeletionService {
    pub fn new(pool: PgPool, email: BillingEmailService) -> Self {
        Self {
            events: BillingEventLogger::new(pool.clone()),
            pool,
            email,
        }
    }

    /// Permanently delete all data for a church.
    ///
    /// The subscription row is deleted first, then the church row; all
    /// tenant-scoped tables cascade from `churches` via foreign keys.
    pub async fn delete_church_data(
        &self,
        subscription: &ChurchSubscription,
        today: Date,
        now: OffsetDateTime,
    ) -> BillingResult<()> {
        let church_id = subscription.church_id;

        if !subscription.is_eligible_for_deletion(today, now) {
            return Err(BillingError::InvalidInput(format!(
                "Church {} is not eligible for deletion (status {}, retention end {:?})",
                church_id, subscription.status, subscription.data_retention_end_date
            )));
        }

        tracing::warn!(
            church_id = church_id,
            retention_end = ?subscription.data_retention_end_date,
            "PERMANENT data deletion starting; this is irreversible"
        );

        // Audit first: the event must survive the tenant row it describes,
        // so it is keyed by church_id without a foreign key.
        self.events
            .log_event(
                BillingEventBuilder::new(church_id, BillingEventType::DataDeleted).data(
                    serde_json::json!({
                        "retention_end": subscription
                            .data_retention_end_date
                            .map(|d| d.to_string()),
                        "suspended_at": subscription.suspended_at.map(|t| t.to_string()),
                    }),
                ),
            )
            .await?;

        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM church_subscriptions WHERE church_id = $1")
            .bind(church_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM churches WHERE id = $1")
            .bind(church_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::warn!(church_id = church_id, "Permanent data deletion completed");

        Ok(())
    }

    /// Send the deletion warning email to the church's billing address.
    /// Notification failure is non-fatal and does not block the countdown.
    pub async fn send_deletion_warning(
        &self,
        subscription: &ChurchSubscription,
        today: Date,
    ) -> BillingResult<bool> {
        let church_id = subscription.church_id;

        let church: Option<Church> = sqlx::query_as("SELECT * FROM churches WHERE id = $1")
            .bind(church_id)
            .fetch_optional(&self.pool)
            .await?;

        let Some(church) = church else {
            return Err(BillingError::NotFound(format!("Church {}", church_id)));
        };

        let Some(email) = church.email.as_deref() else {
            tracing::warn!(church_id = church_id, "No billing email; deletion warning skipped");
            return Ok(false);
        };

        let Some(deletion_date) = subscription.data_retention_end_date else {
            return Err(BillingError::RetentionNotApplicable(church_id));
        };

        let days_remaining = subscription.days_until_deletion(today).unwrap_or(0);

        let sent = self
            .email
            .send_deletion_warning(email, &church.name, deletion_date, days_remaining)
            .await?;

        if sent {
            tracing::info!(
                church_id = church_id,
                deletion_date = %deletion_date,
                days_remaining = days_remaining,
                "Deletion warning email sent"
            );
        }

        Ok(sent)
    }
}
