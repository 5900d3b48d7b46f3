//! Payment gateway webhook reconciliation
//!
//! Verifies inbound webhook signatures, matches events to locally-created
//! payment intents by reference prefix, and applies each effect exactly once.
//! The gateway retries deliveries, so every branch settles through the
//! ledger's atomic claim before touching any other state.
//!
//! Response contract (mapped to HTTP by the API layer):
//! - `InvalidSignature`            -> 401, no state change
//! - `Processed` / `AlreadyProcessed` / `Ignored` -> 200
//! - `Database` / `Internal`       -> 500, gateway retries

use hmac::{Hmac, Mac};
use sha2::Sha512;
use sqlx::PgPool;
use std::sync::Arc;
use time::OffsetDateTime;

use crate::addons::AddonService;
use crate::error::{BillingError, BillingResult};
use crate::events::{ActorType, BillingEventBuilder, BillingEventLogger, BillingEventType};
use crate::gateway::PaymentGateway;
use crate::intents::{PaymentIntent, PaymentIntentLedger, ReferenceKind, Settlement};
use crate::sms_credits::SmsCreditService;
use crate::subscriptions::{ActivationOutcome, SubscriptionService};
use crate::tier_change::TierChangeService;
use shepherd_shared::types::add_months;

type HmacSha512 = Hmac<Sha512>;

/// Verify a gateway signature: HMAC-SHA512 over the raw payload bytes,
/// hex-encoded in the signature header.
///
/// `Mac::verify_slice` performs a constant-time comparison; never compare
/// the hex strings directly.
pub fn verify_signature(secret: &str, raw_body: &[u8], signature_hex: &str) -> BillingResult<()> {
    let signature = hex::decode(signature_hex.trim()).map_err(|_| BillingError::InvalidSignature)?;

    let mut mac =
        HmacSha512::new_from_slice(secret.as_bytes()).map_err(|_| BillingError::InvalidSignature)?;
    mac.update(raw_body);

    mac.verify_slice(&signature)
        .map_err(|_| BillingError::InvalidSignature)
}

/// A parsed gateway event envelope
#[derive(Debug, Clone)]
pub struct GatewayEvent {
    pub event_type: String,
    pub data: serde_json::Value,
}

/// Parse the webhook payload into its event envelope
pub fn parse_event(raw_body: &[u8]) -> BillingResult<GatewayEvent> {
    let payload: serde_json::Value = serde_json::from_slice(raw_body)
        .map_err(|e| BillingError::InvalidInput(format!("Malformed webhook payload: {}", e)))?;

    let event_type = payload
        .get("event")
        .and_then(|v| v.as_str())
        .ok_or_else(|| BillingError::InvalidInput("Webhook payload missing event type".to_string()))?
        .to_string();

    let data = payload.get("data").cloned().unwrap_or(serde_json::json!({}));

    Ok(GatewayEvent { event_type, data })
}

/// Result of handling one webhook delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// The event was matched and its side effects applied
    Processed,
    /// Duplicate delivery; the intent was already settled, nothing re-applied
    AlreadyProcessed,
    /// Acknowledged without side effects (unhandled type, unknown reference,
    /// missing metadata) so the gateway stops retrying
    Ignored,
}

/// Reconciles gateway webhook events against the payment intent ledger
pub struct PaymentGatewayReconciler {
    webhook_secret: String,
    ledger: PaymentIntentLedger,
    subscriptions: SubscriptionService,
    tier_changes: TierChangeService,
    addons: AddonService,
    sms_credits: SmsCreditService,
    events: BillingEventLogger,
}

impl PaymentGatewayReconciler {
    pub fn new(pool: PgPool, webhook_secret: String, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self {
            webhook_secret,
            ledger: PaymentIntentLedger::new(pool.clone()),
            subscriptions: SubscriptionService::new(pool.clone()),
            tier_changes: TierChangeService::new(pool.clone(), gateway.clone()),
            addons: AddonService::new(pool.clone(), gateway.clone()),
            sms_credits: SmsCreditService::new(pool.clone(), gateway),
            events: BillingEventLogger::new(pool),
        }
    }

    /// Handle one raw webhook delivery.
    ///
    /// Signature and parse failures are synchronous and fast; no state is
    /// touched before the signature is verified.
    pub async fn handle_webhook(
        &self,
        raw_body: &[u8],
        signature_header: &str,
    ) -> BillingResult<WebhookOutcome> {
        verify_signature(&self.webhook_secret, raw_body, signature_header)?;

        let event = parse_event(raw_body)?;

        tracing::info!(event_type = %event.event_type, "Gateway webhook event verified");

        match event.event_type.as_str() {
            "charge.success" => self.handle_charge_success(&event.data).await,
            "charge.failed" => self.handle_charge_failed(&event.data).await,
            other => {
                tracing::info!(event_type = %other, "Unhandled gateway event type, acknowledged");
                Ok(WebhookOutcome::Ignored)
            }
        }
    }

    async fn handle_charge_success(&self, data: &serde_json::Value) -> BillingResult<WebhookOutcome> {
        let Some(reference) = data.get("reference").and_then(|v| v.as_str()) else {
            tracing::warn!("charge.success without reference, acknowledged as no-op");
            return Ok(WebhookOutcome::Ignored);
        };

        let transaction_id = data.get("id").and_then(|v| v.as_i64()).map(|id| id.to_string());
        let authorization_code = data
            .get("authorization")
            .and_then(|a| a.get("authorization_code"))
            .and_then(|v| v.as_str());

        // Settle the intent BEFORE any side effect; losing the claim means a
        // concurrent or earlier delivery already did the work.
        let settlement = match self
            .ledger
            .settle_success(reference, transaction_id.as_deref(), authorization_code)
            .await
        {
            Ok(settlement) => settlement,
            Err(BillingError::UnrecognizedReference(_)) => {
                tracing::warn!(reference = %reference, "charge.success for unknown reference, acknowledged");
                return Ok(WebhookOutcome::Ignored);
            }
            Err(e) => return Err(e),
        };

        let intent = match settlement {
            Settlement::Claimed(intent) => intent,
            Settlement::AlreadySettled => return Ok(WebhookOutcome::AlreadyProcessed),
        };

        match intent.reference_kind() {
            ReferenceKind::Subscription => self.apply_subscription_payment(&intent).await,
            ReferenceKind::Addon => self.apply_addon_payment(&intent).await,
            // Renewal charges are applied synchronously by the renewal job;
            // the webhook only confirms the settlement we just recorded.
            ReferenceKind::Renewal => {
                tracing::info!(reference = %intent.reference, "Renewal charge confirmed by gateway");
                Ok(WebhookOutcome::Processed)
            }
            ReferenceKind::TierUpgrade => {
                self.tier_changes.complete(&intent.reference).await?;
                Ok(WebhookOutcome::Processed)
            }
            ReferenceKind::SmsCredit => self.apply_sms_credit_payment(&intent).await,
        }
    }

    async fn apply_subscription_payment(&self, intent: &PaymentIntent) -> BillingResult<WebhookOutcome> {
        let today = OffsetDateTime::now_utc().date();

        let activation = match self.subscriptions.activate_from_payment(intent, today).await {
            Ok(activation) => activation,
            Err(BillingError::SubscriptionNotFound(church_id)) => {
                tracing::warn!(
                    church_id = church_id,
                    reference = %intent.reference,
                    "Payment for a church with no subscription record, acknowledged"
                );
                return Ok(WebhookOutcome::Ignored);
            }
            Err(e) => return Err(e),
        };

        match activation {
            ActivationOutcome::Activated(subscription) => {
                // Bring suspended addons back in the window where a PAST_DUE
                // recovery raced a suspension.
                if let Some(period_end) = subscription.current_period_end {
                    self.addons
                        .reactivate_for_church(subscription.church_id, period_end)
                        .await?;
                }
                Ok(WebhookOutcome::Processed)
            }
            // Payment recorded, subscription intentionally untouched:
            // CANCELED/SUSPENDED require manual reactivation.
            ActivationOutcome::ManualReviewRequired(_) => Ok(WebhookOutcome::Processed),
        }
    }

    async fn apply_addon_payment(&self, intent: &PaymentIntent) -> BillingResult<WebhookOutcome> {
        let today = OffsetDateTime::now_utc().date();

        // Addon periods follow the subscription period when one is running
        let period_end = match self.subscriptions.get(intent.church_id).await {
            Ok(subscription) => subscription
                .current_period_end
                .unwrap_or_else(|| add_months(today, 1)),
            Err(BillingError::SubscriptionNotFound(_)) => add_months(today, 1),
            Err(e) => return Err(e),
        };

        match self.addons.activate_from_payment(intent, period_end).await {
            Ok(Some(_)) => Ok(WebhookOutcome::Processed),
            // Addon row already active or gone: settlement held, nothing to redo
            Ok(None) => Ok(WebhookOutcome::AlreadyProcessed),
            Err(BillingError::MissingMetadata(field)) => {
                tracing::warn!(
                    reference = %intent.reference,
                    missing = %field,
                    "Addon payment missing metadata, acknowledged as no-op"
                );
                Ok(WebhookOutcome::Ignored)
            }
            Err(e) => Err(e),
        }
    }

    async fn apply_sms_credit_payment(&self, intent: &PaymentIntent) -> BillingResult<WebhookOutcome> {
        match self
            .sms_credits
            .top_up_from_payment(&intent.metadata, &intent.reference)
            .await
        {
            Ok(_) => Ok(WebhookOutcome::Processed),
            Err(BillingError::MissingMetadata(field)) => {
                tracing::warn!(
                    reference = %intent.reference,
                    missing = %field,
                    "SMS credit payment missing metadata, acknowledged as no-op"
                );
                Ok(WebhookOutcome::Ignored)
            }
            Err(e) => Err(e),
        }
    }

    /// `charge.failed` is record-only: the intent and any pending tier change
    /// are marked FAILED, but no subscription transition happens here. The
    /// renewal job owns the retry policy for failed renewal charges.
    async fn handle_charge_failed(&self, data: &serde_json::Value) -> BillingResult<WebhookOutcome> {
        let Some(reference) = data.get("reference").and_then(|v| v.as_str()) else {
            tracing::warn!("charge.failed without reference, acknowledged as no-op");
            return Ok(WebhookOutcome::Ignored);
        };

        let reason = data
            .get("gateway_response")
            .and_then(|v| v.as_str())
            .unwrap_or("charge failed");

        let settlement = match self.ledger.settle_failure(reference, reason).await {
            Ok(settlement) => settlement,
            Err(BillingError::UnrecognizedReference(_)) => {
                tracing::warn!(reference = %reference, "charge.failed for unknown reference, acknowledged");
                return Ok(WebhookOutcome::Ignored);
            }
            Err(e) => return Err(e),
        };

        let intent = match settlement {
            Settlement::Claimed(intent) => intent,
            Settlement::AlreadySettled => return Ok(WebhookOutcome::AlreadyProcessed),
        };

        if intent.reference_kind() == ReferenceKind::TierUpgrade {
            self.tier_changes.mark_failed(&intent.reference).await?;
            self.tier_changes
                .rollback(intent.church_id, "gateway:charge.failed")
                .await?;
        }

        self.events
            .log_event(
                BillingEventBuilder::new(intent.church_id, BillingEventType::PaymentFailed)
                    .actor(ActorType::Gateway)
                    .reference(&intent.reference)
                    .data(serde_json::json!({
                        "kind": intent.kind,
                        "amount_cents": intent.amount_cents,
                        "reason": reason,
                    })),
            )
            .await?;

        tracing::warn!(
            church_id = intent.church_id,
            reference = %reference,
            reason = reason,
            "Gateway reported failed charge"
        );

        Ok(WebhookOutcome::Processed)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sign(secret: &str, body: &[u8]) -> String {
        let mut mac = HmacSha512::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn test_signature_round_trip() {
        let secret = "sk_test_webhook_secret";
        let body = br#"{"event":"charge.success","data":{"reference":"SUB-1"}}"#;

        let signature = sign(secret, body);
        assert!(verify_signature(secret, body, &signature).is_ok());
        // Header whitespace is tolerated
        assert!(verify_signature(secret, body, &format!(" {}\n", signature)).is_ok());
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let secret = "sk_test_webhook_secret";
        let body = br#"{"event":"charge.success","data":{"reference":"SUB-1"}}"#;
        let tampered = br#"{"event":"charge.success","data":{"reference":"SUB-2"}}"#;

        let signature = sign(secret, body);
        let err = verify_signature(secret, tampered, &signature).unwrap_err();
        assert!(matches!(err, BillingError::InvalidSignature));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let body = br#"{"event":"charge.success"}"#;
        let signature = sign("secret_a", body);
        let err = verify_signature("secret_b", body, &signature).unwrap_err();
        assert!(matches!(err, BillingError::InvalidSignature));
    }

    #[test]
    fn test_garbage_signature_rejected() {
        let err = verify_signature("secret", b"{}", "not-hex!").unwrap_err();
        assert!(matches!(err, BillingError::InvalidSignature));
    }

    #[test]
    fn test_parse_event_envelope() {
        let body = br#"{"event":"charge.success","data":{"reference":"ADDON-abc123","amount":5000}}"#;
        let event = parse_event(body).unwrap();
        assert_eq!(event.event_type, "charge.success");
        assert_eq!(event.data["reference"], "ADDON-abc123");
    }

    #[test]
    fn test_parse_event_requires_type() {
        assert!(parse_event(br#"{"data":{}}"#).is_err());
        assert!(parse_event(b"not json").is_err());
    }
}
