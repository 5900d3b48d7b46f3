//! Partnership codes
//!
//! Operator-issued codes granting a church extra days of service. Applying a
//! valid code extends the current period and next billing date by the code's
//! grace days; it never changes the subscription status. Codes carry a
//! validity window, a global usage cap, and a per-church cap (default 1), so
//! re-applying the same code is rejected rather than silently extending twice.

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use time::OffsetDateTime;

use crate::error::{BillingError, BillingResult};
use crate::events::{ActorType, BillingEventBuilder, BillingEventLogger, BillingEventType};
use crate::subscriptions::ChurchSubscription;

/// A partnership code row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PartnershipCode {
    pub id: i64,
    pub code: String,
    pub grace_period_days: i32,
    pub is_active: bool,
    pub expires_at: Option<OffsetDateTime>,
    pub max_uses: Option<i32>,
    pub current_uses: i32,
    pub max_uses_per_church: i32,
    pub created_at: OffsetDateTime,
}

impl PartnershipCode {
    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        self.expires_at.is_some_and(|at| now > at)
    }

    pub fn is_exhausted(&self) -> bool {
        self.max_uses.is_some_and(|max| self.current_uses >= max)
    }
}

/// Partnership code service
pub struct PartnershipCodeService {
    pool: PgPool,
    events: BillingEventLogger,
}

impl PartnershipCodeService {
    pub fn new(pool: PgPool) -> Self {
        Self {
            events: BillingEventLogger::new(pool.clone()),
            pool,
        }
    }

    /// Look up a code and check it is currently usable
    pub async fn validate(&self, code: &str) -> BillingResult<PartnershipCode> {
        let found: Option<PartnershipCode> =
            sqlx::query_as("SELECT * FROM partnership_codes WHERE UPPER(code) = UPPER($1)")
                .bind(code)
                .fetch_optional(&self.pool)
                .await?;

        let found = found
            .ok_or_else(|| BillingError::InvalidPartnershipCode("code not found".to_string()))?;

        if !found.is_active {
            return Err(BillingError::InvalidPartnershipCode(
                "code is no longer active".to_string(),
            ));
        }
        if found.is_expired(OffsetDateTime::now_utc()) {
            return Err(BillingError::InvalidPartnershipCode("code has expired".to_string()));
        }
        if found.is_exhausted() {
            return Err(BillingError::InvalidPartnershipCode(
                "code has reached its usage limit".to_string(),
            ));
        }

        Ok(found)
    }

    /// Apply a code to a church's subscription.
    ///
    /// Extends `current_period_end` and `next_billing_date` by the code's
    /// grace days. Status is untouched: a PAST_DUE subscription stays
    /// PAST_DUE (with more runway), a SUSPENDED one stays SUSPENDED.
    pub async fn apply(&self, church_id: i64, code: &str) -> BillingResult<ChurchSubscription> {
        let partnership_code = self.validate(code).await?;

        let church_uses: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM partnership_code_usages
            WHERE partnership_code_id = $1 AND church_id = $2
            "#,
        )
        .bind(partnership_code.id)
        .bind(church_id)
        .fetch_one(&self.pool)
        .await?;

        if church_uses.0 >= partnership_code.max_uses_per_church as i64 {
            return Err(BillingError::InvalidPartnershipCode(
                "code already used by this church".to_string(),
            ));
        }

        // Claim a use atomically; loses the race cleanly if the global cap
        // was consumed between validate and here.
        let claimed = sqlx::query(
            r#"
            UPDATE partnership_codes
            SET current_uses = current_uses + 1
            WHERE id = $1 AND (max_uses IS NULL OR current_uses < max_uses)
            "#,
        )
        .bind(partnership_code.id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if claimed == 0 {
            return Err(BillingError::InvalidPartnershipCode(
                "code has reached its usage limit".to_string(),
            ));
        }

        let updated: Option<ChurchSubscription> = sqlx::query_as(
            r#"
            UPDATE church_subscriptions
            SET current_period_end = COALESCE(current_period_end, CURRENT_DATE) + $2,
                next_billing_date = COALESCE(next_billing_date, CURRENT_DATE) + $2,
                updated_at = NOW()
            WHERE church_id = $1
            RETURNING *
            "#,
        )
        .bind(church_id)
        .bind(partnership_code.grace_period_days)
        .fetch_optional(&self.pool)
        .await?;

        let subscription = updated.ok_or(BillingError::SubscriptionNotFound(church_id))?;

        sqlx::query(
            r#"
            INSERT INTO partnership_code_usages
                (partnership_code_id, church_id, grace_period_days_granted)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(partnership_code.id)
        .bind(church_id)
        .bind(partnership_code.grace_period_days)
        .execute(&self.pool)
        .await?;

        self.events
            .log_event(
                BillingEventBuilder::new(church_id, BillingEventType::PartnershipCodeApplied)
                    .actor(ActorType::User)
                    .data(serde_json::json!({
                        "code": partnership_code.code,
                        "grace_period_days": partnership_code.grace_period_days,
                        "new_period_end": subscription
                            .current_period_end
                            .map(|d| d.to_string()),
                    })),
            )
            .await?;

        tracing::info!(
            church_id = church_id,
            code = %partnership_code.code,
            grace_period_days = partnership_code.grace_period_days,
            status = %subscription.status,
            "Partnership code applied"
        );

        Ok(subscription)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn code(max_uses: Option<i32>, current_uses: i32, expires_at: Option<OffsetDateTime>) -> PartnershipCode {
        PartnershipCode {
            id: 1,
            code: "PARTNER-2026".to_string(),
            grace_period_days: 90,
            is_active: true,
            expires_at,
            max_uses,
            current_uses,
            max_uses_per_church: 1,
            created_at: datetime!(2026-01-01 0:00 UTC),
        }
    }

    #[test]
    fn test_code_expiry() {
        let c = code(None, 0, Some(datetime!(2026-06-01 0:00 UTC)));
        assert!(!c.is_expired(datetime!(2026-05-31 0:00 UTC)));
        assert!(c.is_expired(datetime!(2026-06-02 0:00 UTC)));

        let never_expires = code(None, 0, None);
        assert!(!never_expires.is_expired(datetime!(2099-01-01 0:00 UTC)));
    }

    #[test]
    fn test_code_exhaustion() {
        assert!(!code(None, 1_000, None).is_exhausted());
        assert!(!code(Some(5), 4, None).is_exhausted());
        assert!(code(Some(5), 5, None).is_exhausted());
    }
}
