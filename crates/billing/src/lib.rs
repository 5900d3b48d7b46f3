// Billing crate clippy configuration
// These are intentional patterns in this crate:
#![allow(clippy::too_many_arguments)] // Proration and history records carry many financial fields
// Test code patterns (expected in test files):
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Shepherd Billing Module
//!
//! Subscription billing and lifecycle engine for the platform.
//!
//! ## Features
//!
//! - **Subscription state machine**: trial, activation, past-due, suspension,
//!   cancellation, manual reactivation
//! - **Proration**: mid-cycle tier and billing-interval changes
//! - **Payment intents**: reference-keyed ledger with atomic settlement
//! - **Webhook reconciliation**: HMAC-verified, idempotent gateway events
//! - **Data retention**: deletion countdown with operator extend/cancel
//! - **Addons and SMS credits**: purchases riding the same intent ledger
//! - **Partnership codes**: operator-issued service extensions
//! - **Audit events**: append-only log of every mutating operation

pub mod addons;
pub mod checkout;
pub mod deletion;
pub mod email;
pub mod error;
pub mod events;
pub mod gateway;
pub mod intents;
pub mod partnership;
pub mod proration;
pub mod reconciler;
pub mod retention;
pub mod sms_credits;
pub mod subscriptions;
pub mod tier_change;

// Addons
pub use addons::{AddonService, ChurchStorageAddon, StorageAddon};

// Checkout
pub use checkout::CheckoutService;

// Deletion
pub use deletion::DataDeletionService;

// Email
pub use email::{BillingEmailService, EmailConfig};

// Error
pub use error::{BillingError, BillingResult};

// Events
pub use events::{ActorType, BillingEvent, BillingEventBuilder, BillingEventLogger, BillingEventType};

// Gateway
pub use gateway::{ChargeOutcome, GatewayConfig, PaymentGateway, PaymentSession, PaystackGateway};

// Intents
pub use intents::{NewPaymentIntent, PaymentIntent, PaymentIntentLedger, ReferenceKind, Settlement};

// Partnership codes
pub use partnership::{PartnershipCode, PartnershipCodeService};

// Proration
pub use proration::{prorate, Proration};

// Reconciler
pub use reconciler::{
    parse_event, verify_signature, GatewayEvent, PaymentGatewayReconciler, WebhookOutcome,
};

// Retention
pub use retention::{DataRetentionTracker, PendingDeletion, UrgencyLevel};

// SMS credits
pub use sms_credits::{SmsCreditService, SmsCreditWallet};

// Subscriptions
pub use subscriptions::{
    ActivationOutcome, ChurchSubscription, SubscriptionService, DEFAULT_RETENTION_DAYS,
    DELETION_WARNING_DAYS,
};

// Tier changes
pub use tier_change::{
    calculate_change, ChangeCalculation, ChangeType, TierChangeHistory, TierChangeService,
    UpgradeInitiated, UpgradePreview,
};

use sqlx::PgPool;
use std::sync::Arc;

/// Main billing engine combining all billing services
pub struct BillingEngine {
    pub subscriptions: SubscriptionService,
    pub checkout: CheckoutService,
    pub intents: PaymentIntentLedger,
    pub tier_changes: TierChangeService,
    pub retention: DataRetentionTracker,
    pub deletion: DataDeletionService,
    pub addons: AddonService,
    pub sms_credits: SmsCreditService,
    pub partnership: PartnershipCodeService,
    pub reconciler: PaymentGatewayReconciler,
    pub email: BillingEmailService,
    pub events: BillingEventLogger,
    pub gateway: Arc<dyn PaymentGateway>,
}

impl BillingEngine {
    /// Create the engine from environment variables
    pub fn from_env(pool: PgPool) -> BillingResult<Self> {
        let config = GatewayConfig::from_env()?;
        Ok(Self::new(config, pool))
    }

    /// Create the engine with explicit gateway config
    pub fn new(config: GatewayConfig, pool: PgPool) -> Self {
        let webhook_secret = config.webhook_secret.clone();
        let gateway: Arc<dyn PaymentGateway> = Arc::new(PaystackGateway::new(config));
        Self::with_gateway(pool, webhook_secret, gateway)
    }

    /// Create the engine with an injected gateway (tests, alternate gateways)
    pub fn with_gateway(
        pool: PgPool,
        webhook_secret: String,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        let email = BillingEmailService::from_env();

        Self {
            subscriptions: SubscriptionService::new(pool.clone()),
            checkout: CheckoutService::new(pool.clone(), gateway.clone()),
            intents: PaymentIntentLedger::new(pool.clone()),
            tier_changes: TierChangeService::new(pool.clone(), gateway.clone()),
            retention: DataRetentionTracker::new(pool.clone()),
            deletion: DataDeletionService::new(pool.clone(), email.clone()),
            addons: AddonService::new(pool.clone(), gateway.clone()),
            sms_credits: SmsCreditService::new(pool.clone(), gateway.clone()),
            partnership: PartnershipCodeService::new(pool.clone()),
            reconciler: PaymentGatewayReconciler::new(pool.clone(), webhook_secret, gateway.clone()),
            email,
            events: BillingEventLogger::new(pool),
            gateway,
        }
    }
}
