//! Storage addon purchases and lifecycle
//!
//! Addons are purchased at a locked price, billed alongside the base
//! subscription, and move in lockstep with it: suspending a subscription
//! suspends its addons, reactivating brings them back, and the renewal job
//! keeps their renewal dates aligned with the subscription period.

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use time::{Date, OffsetDateTime};

use crate::error::{BillingError, BillingResult};
use crate::events::{ActorType, BillingEventBuilder, BillingEventLogger, BillingEventType};
use crate::gateway::{PaymentGateway, PaymentSession};
use crate::intents::{NewPaymentIntent, PaymentIntent, PaymentIntentLedger, ReferenceKind};
use std::sync::Arc;

/// A purchasable addon from the catalog
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct StorageAddon {
    pub id: i64,
    pub name: String,
    pub storage_mb: i64,
    pub monthly_price_cents: i64,
    pub is_active: bool,
}

/// An addon owned by a church
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ChurchStorageAddon {
    pub id: i64,
    pub church_id: i64,
    pub addon_id: i64,
    /// Price locked at purchase time; catalog price changes never reprice it
    pub purchase_price_cents: i64,
    pub storage_mb: i64,
    pub status: String,
    pub payment_reference: Option<String>,
    pub current_period_end: Option<Date>,
    pub next_billing_date: Option<Date>,
    pub purchased_at: OffsetDateTime,
    pub suspended_at: Option<OffsetDateTime>,
}

/// Storage addon service
pub struct AddonService {
    pool: PgPool,
    events: BillingEventLogger,
    ledger: PaymentIntentLedger,
    gateway: Arc<dyn PaymentGateway>,
}

impl AddonService {
    pub fn new(pool: PgPool, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self {
            events: BillingEventLogger::new(pool.clone()),
            ledger: PaymentIntentLedger::new(pool.clone()),
            pool,
            gateway,
        }
    }

    /// Start an addon purchase: PENDING ownership row + `ADDON-` intent +
    /// hosted checkout session.
    pub async fn initiate_purchase(
        &self,
        church_id: i64,
        addon_id: i64,
        email: &str,
    ) -> BillingResult<PaymentSession> {
        let addon: Option<StorageAddon> =
            sqlx::query_as("SELECT * FROM storage_addons WHERE id = $1 AND is_active = TRUE")
                .bind(addon_id)
                .fetch_optional(&self.pool)
                .await?;

        let addon = addon
            .ok_or_else(|| BillingError::NotFound(format!("Storage addon {}", addon_id)))?;

        let reference = ReferenceKind::Addon.new_reference();

        let owned: (i64,) = sqlx::query_as(
            r#"
            INSERT INTO church_storage_addons
                (church_id, addon_id, purchase_price_cents, storage_mb, status, payment_reference)
            VALUES ($1, $2, $3, $4, 'PENDING', $5)
            RETURNING id
            "#,
        )
        .bind(church_id)
        .bind(addon.id)
        .bind(addon.monthly_price_cents)
        .bind(addon.storage_mb)
        .bind(&reference)
        .fetch_one(&self.pool)
        .await?;

        self.ledger
            .create_with_reference(
                NewPaymentIntent {
                    church_id,
                    amount_cents: addon.monthly_price_cents,
                    kind: ReferenceKind::Addon,
                    description: format!("Storage addon: {}", addon.name),
                    metadata: serde_json::json!({ "church_addon_id": owned.0 }),
                },
                &reference,
            )
            .await?;

        let session = self
            .gateway
            .initialize_payment(email, addon.monthly_price_cents, &reference)
            .await?;

        tracing::info!(
            church_id = church_id,
            addon_id = addon.id,
            reference = %reference,
            "Addon purchase initiated"
        );

        Ok(session)
    }

    /// Activate a PENDING addon from its settled `ADDON-` intent.
    /// Conditional on PENDING so a replayed settlement cannot re-activate.
    pub async fn activate_from_payment(
        &self,
        intent: &PaymentIntent,
        period_end: Date,
    ) -> BillingResult<Option<ChurchStorageAddon>> {
        let church_addon_id = intent
            .metadata
            .get("church_addon_id")
            .and_then(|v| v.as_i64())
            .ok_or_else(|| BillingError::MissingMetadata("church_addon_id".to_string()))?;

        let activated: Option<ChurchStorageAddon> = sqlx::query_as(
            r#"
            UPDATE church_storage_addons
            SET status = 'ACTIVE', current_period_end = $2, next_billing_date = $2
            WHERE id = $1 AND status = 'PENDING'
            RETURNING *
            "#,
        )
        .bind(church_addon_id)
        .bind(period_end)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(ref addon) = activated {
            self.update_storage_limit(addon.church_id).await?;

            self.events
                .log_event(
                    BillingEventBuilder::new(addon.church_id, BillingEventType::AddonActivated)
                        .actor(ActorType::Gateway)
                        .reference(&intent.reference)
                        .data(serde_json::json!({
                            "addon_id": addon.addon_id,
                            "storage_mb": addon.storage_mb,
                        })),
                )
                .await?;

            tracing::info!(
                church_id = addon.church_id,
                addon_id = addon.addon_id,
                reference = %intent.reference,
                "Storage addon activated"
            );
        }

        Ok(activated)
    }

    /// Active addons billed with the subscription renewal
    pub async fn active_addons(&self, church_id: i64) -> BillingResult<Vec<ChurchStorageAddon>> {
        let addons: Vec<ChurchStorageAddon> = sqlx::query_as(
            "SELECT * FROM church_storage_addons WHERE church_id = $1 AND status = 'ACTIVE' ORDER BY id",
        )
        .bind(church_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(addons)
    }

    /// Suspend all active addons when the subscription is suspended
    pub async fn suspend_for_church(&self, church_id: i64) -> BillingResult<u64> {
        let suspended = sqlx::query(
            r#"
            UPDATE church_storage_addons
            SET status = 'SUSPENDED', suspended_at = NOW()
            WHERE church_id = $1 AND status = 'ACTIVE'
            "#,
        )
        .bind(church_id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if suspended > 0 {
            self.update_storage_limit(church_id).await?;

            self.events
                .log_event(
                    BillingEventBuilder::new(church_id, BillingEventType::AddonSuspended)
                        .data(serde_json::json!({ "count": suspended })),
                )
                .await?;

            tracing::warn!(
                church_id = church_id,
                count = suspended,
                "Suspended addons alongside subscription"
            );
        }

        Ok(suspended)
    }

    /// Reactivate suspended addons when the subscription comes back
    pub async fn reactivate_for_church(&self, church_id: i64, period_end: Date) -> BillingResult<u64> {
        let reactivated = sqlx::query(
            r#"
            UPDATE church_storage_addons
            SET status = 'ACTIVE', suspended_at = NULL,
                current_period_end = $2, next_billing_date = $2
            WHERE church_id = $1 AND status = 'SUSPENDED'
            "#,
        )
        .bind(church_id)
        .bind(period_end)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if reactivated > 0 {
            self.update_storage_limit(church_id).await?;

            tracing::info!(
                church_id = church_id,
                count = reactivated,
                "Reactivated addons alongside subscription"
            );
        }

        Ok(reactivated)
    }

    /// Keep addon renewal dates in lockstep with the subscription period
    pub async fn sync_renewal_dates(&self, church_id: i64, period_end: Date) -> BillingResult<()> {
        sqlx::query(
            r#"
            UPDATE church_storage_addons
            SET current_period_end = $2, next_billing_date = $2
            WHERE church_id = $1 AND status = 'ACTIVE'
            "#,
        )
        .bind(church_id)
        .bind(period_end)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Recompute the church's effective storage limit from its tier base
    /// plus all ACTIVE addons.
    async fn update_storage_limit(&self, church_id: i64) -> BillingResult<()> {
        sqlx::query(
            r#"
            UPDATE churches
            SET storage_limit_mb = base_storage_mb + COALESCE(
                (SELECT SUM(storage_mb)
                 FROM church_storage_addons
                 WHERE church_id = $1 AND status = 'ACTIVE'), 0)
            WHERE id = $1
            "#,
        )
        .bind(church_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
