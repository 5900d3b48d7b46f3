//! Payment intent ledger
//!
//! Every charge this platform initiates (subscription checkout, addon
//! purchase, renewal, tier upgrade, SMS credit top-up) is recorded here as a
//! PENDING intent before the gateway is contacted. The webhook reconciler
//! settles intents exactly once via an atomic conditional update, which is
//! what makes duplicated gateway deliveries safe.

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::{BillingError, BillingResult};
use shepherd_shared::types::PaymentStatus;

/// Intent type, encoded as the reference prefix.
///
/// The prefix is the sole dispatch key for inbound webhooks and must remain
/// stable: `{TYPE_PREFIX}-{uuid}`, or a bare uuid for SMS credit purchases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReferenceKind {
    Subscription,
    Addon,
    Renewal,
    TierUpgrade,
    SmsCredit,
}

impl ReferenceKind {
    /// Reference prefix for this kind; `None` for SMS credits (unprefixed)
    pub fn prefix(&self) -> Option<&'static str> {
        match self {
            Self::Subscription => Some("SUB"),
            Self::Addon => Some("ADDON"),
            Self::Renewal => Some("RENEWAL"),
            Self::TierUpgrade => Some("TIER_UPGRADE"),
            Self::SmsCredit => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Subscription => "SUBSCRIPTION",
            Self::Addon => "ADDON",
            Self::Renewal => "RENEWAL",
            Self::TierUpgrade => "TIER_UPGRADE",
            Self::SmsCredit => "SMS_CREDIT",
        }
    }

    /// Classify a gateway reference by its prefix.
    ///
    /// Anything without a recognized prefix is an SMS credit purchase.
    pub fn from_reference(reference: &str) -> Self {
        match reference.split_once('-') {
            Some(("SUB", _)) => Self::Subscription,
            Some(("ADDON", _)) => Self::Addon,
            Some(("RENEWAL", _)) => Self::Renewal,
            _ if reference.starts_with("TIER_UPGRADE-") => Self::TierUpgrade,
            _ => Self::SmsCredit,
        }
    }

    /// Generate a fresh reference for this intent kind
    pub fn new_reference(&self) -> String {
        match self.prefix() {
            Some(prefix) => format!("{}-{}", prefix, Uuid::new_v4()),
            None => Uuid::new_v4().to_string(),
        }
    }
}

/// A payment intent row.
///
/// Created PENDING by the initiating flow; settled to SUCCESS or FAILED
/// exactly once by the reconciler.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PaymentIntent {
    pub id: Uuid,
    pub church_id: i64,
    pub reference: String,
    pub amount_cents: i64,
    pub currency: String,
    pub status: String,
    pub kind: String,
    pub description: Option<String>,
    pub metadata: serde_json::Value,
    pub gateway_transaction_id: Option<String>,
    pub authorization_code: Option<String>,
    pub failure_reason: Option<String>,
    pub created_at: OffsetDateTime,
    pub settled_at: Option<OffsetDateTime>,
}

impl PaymentIntent {
    pub fn payment_status(&self) -> PaymentStatus {
        self.status.parse().unwrap_or(PaymentStatus::Pending)
    }

    pub fn reference_kind(&self) -> ReferenceKind {
        ReferenceKind::from_reference(&self.reference)
    }
}

/// Parameters for creating a new intent
#[derive(Debug, Clone)]
pub struct NewPaymentIntent {
    pub church_id: i64,
    pub amount_cents: i64,
    pub kind: ReferenceKind,
    pub description: String,
    pub metadata: serde_json::Value,
}

/// Outcome of an attempt to settle an intent
#[derive(Debug)]
pub enum Settlement {
    /// This caller won the atomic claim; side effects should be applied now
    Claimed(PaymentIntent),
    /// The intent was already settled by an earlier delivery; no-op
    AlreadySettled,
}

/// Service managing the payment intent ledger
pub struct PaymentIntentLedger {
    pool: PgPool,
}

impl PaymentIntentLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a PENDING intent with a freshly generated reference
    pub async fn create(&self, params: NewPaymentIntent) -> BillingResult<PaymentIntent> {
        let reference = params.kind.new_reference();
        self.create_with_reference(params, &reference).await
    }

    /// Create a PENDING intent under a caller-supplied reference.
    ///
    /// Used when the reference must be recorded elsewhere first (tier change
    /// history stores it before the gateway session is opened).
    pub async fn create_with_reference(
        &self,
        params: NewPaymentIntent,
        reference: &str,
    ) -> BillingResult<PaymentIntent> {
        let intent: PaymentIntent = sqlx::query_as(
            r#"
            INSERT INTO payment_intents
                (church_id, reference, amount_cents, currency, status, kind, description, metadata)
            VALUES ($1, $2, $3, 'GHS', 'PENDING', $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(params.church_id)
        .bind(reference)
        .bind(params.amount_cents)
        .bind(params.kind.as_str())
        .bind(&params.description)
        .bind(&params.metadata)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(
            church_id = intent.church_id,
            reference = %intent.reference,
            amount_cents = intent.amount_cents,
            kind = %intent.kind,
            "Created payment intent"
        );

        Ok(intent)
    }

    pub async fn find_by_reference(&self, reference: &str) -> BillingResult<Option<PaymentIntent>> {
        let intent: Option<PaymentIntent> =
            sqlx::query_as("SELECT * FROM payment_intents WHERE reference = $1")
                .bind(reference)
                .fetch_optional(&self.pool)
                .await?;

        Ok(intent)
    }

    /// Atomically settle a PENDING intent to SUCCESS.
    ///
    /// The `WHERE status = 'PENDING'` guard is the idempotency primitive:
    /// under concurrent duplicate deliveries exactly one caller gets
    /// `Claimed`, everyone else gets `AlreadySettled`. Never read-then-write.
    pub async fn settle_success(
        &self,
        reference: &str,
        gateway_transaction_id: Option<&str>,
        authorization_code: Option<&str>,
    ) -> BillingResult<Settlement> {
        let claimed: Option<PaymentIntent> = sqlx::query_as(
            r#"
            UPDATE payment_intents
            SET status = 'SUCCESS',
                gateway_transaction_id = COALESCE($2, gateway_transaction_id),
                authorization_code = COALESCE($3, authorization_code),
                settled_at = NOW()
            WHERE reference = $1 AND status = 'PENDING'
            RETURNING *
            "#,
        )
        .bind(reference)
        .bind(gateway_transaction_id)
        .bind(authorization_code)
        .fetch_optional(&self.pool)
        .await?;

        match claimed {
            Some(intent) => Ok(Settlement::Claimed(intent)),
            None => self.classify_unclaimed(reference).await,
        }
    }

    /// Atomically settle a PENDING intent to FAILED
    pub async fn settle_failure(&self, reference: &str, reason: &str) -> BillingResult<Settlement> {
        let claimed: Option<PaymentIntent> = sqlx::query_as(
            r#"
            UPDATE payment_intents
            SET status = 'FAILED', failure_reason = $2, settled_at = NOW()
            WHERE reference = $1 AND status = 'PENDING'
            RETURNING *
            "#,
        )
        .bind(reference)
        .bind(reason)
        .fetch_optional(&self.pool)
        .await?;

        match claimed {
            Some(intent) => Ok(Settlement::Claimed(intent)),
            None => self.classify_unclaimed(reference).await,
        }
    }

    /// An update matched no PENDING row: either the intent was settled by an
    /// earlier delivery, or the reference was never ours.
    async fn classify_unclaimed(&self, reference: &str) -> BillingResult<Settlement> {
        match self.find_by_reference(reference).await? {
            Some(intent) => {
                tracing::info!(
                    reference = %reference,
                    status = %intent.status,
                    "Duplicate settlement attempt, intent already settled"
                );
                Ok(Settlement::AlreadySettled)
            }
            None => Err(BillingError::UnrecognizedReference(reference.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_kind_prefixes() {
        assert_eq!(
            ReferenceKind::from_reference("SUB-1f0a2b"),
            ReferenceKind::Subscription
        );
        assert_eq!(
            ReferenceKind::from_reference("ADDON-abc123"),
            ReferenceKind::Addon
        );
        assert_eq!(
            ReferenceKind::from_reference("RENEWAL-9d8c"),
            ReferenceKind::Renewal
        );
        assert_eq!(
            ReferenceKind::from_reference("TIER_UPGRADE-55aa"),
            ReferenceKind::TierUpgrade
        );
    }

    #[test]
    fn test_unprefixed_reference_is_sms_credit() {
        assert_eq!(
            ReferenceKind::from_reference("0b5c9f4e-1111-2222-3333-444455556666"),
            ReferenceKind::SmsCredit
        );
        // Unknown prefixes are not an error, they fall through to SMS credit
        assert_eq!(
            ReferenceKind::from_reference("PCS-donation-ref"),
            ReferenceKind::SmsCredit
        );
    }

    #[test]
    fn test_generated_references_round_trip() {
        for kind in [
            ReferenceKind::Subscription,
            ReferenceKind::Addon,
            ReferenceKind::Renewal,
            ReferenceKind::TierUpgrade,
            ReferenceKind::SmsCredit,
        ] {
            let reference = kind.new_reference();
            assert_eq!(ReferenceKind::from_reference(&reference), kind);
        }
    }
}
