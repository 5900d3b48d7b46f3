//! Core domain types shared across the Shepherd platform
//!
//! The billing engine, worker jobs, and API all speak in these types.
//! Status fields are modeled as enums with explicit string mappings so the
//! database representation stays stable even if variants are renamed.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use time::Date;

/// Subscription lifecycle status for a church (tenant).
///
/// Transitions are owned by the subscription state machine in the billing
/// crate; nothing else writes this field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionStatus {
    Trialing,
    Active,
    PastDue,
    Suspended,
    Canceled,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trialing => "TRIALING",
            Self::Active => "ACTIVE",
            Self::PastDue => "PAST_DUE",
            Self::Suspended => "SUSPENDED",
            Self::Canceled => "CANCELED",
        }
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SubscriptionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TRIALING" => Ok(Self::Trialing),
            "ACTIVE" => Ok(Self::Active),
            "PAST_DUE" => Ok(Self::PastDue),
            "SUSPENDED" => Ok(Self::Suspended),
            "CANCELED" => Ok(Self::Canceled),
            other => Err(format!("Unknown subscription status: {}", other)),
        }
    }
}

/// Billing cadence for a subscription.
///
/// All intervals charge the same per-month rate; the interval only controls
/// how many months are bought per charge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BillingInterval {
    #[default]
    Monthly,
    Quarterly,
    Biannual,
    Annual,
}

impl BillingInterval {
    /// Number of calendar months covered by one charge at this interval
    pub fn months(&self) -> i32 {
        match self {
            Self::Monthly => 1,
            Self::Quarterly => 3,
            Self::Biannual => 6,
            Self::Annual => 12,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Monthly => "MONTHLY",
            Self::Quarterly => "QUARTERLY",
            Self::Biannual => "BIANNUAL",
            Self::Annual => "ANNUAL",
        }
    }
}

impl fmt::Display for BillingInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for BillingInterval {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "MONTHLY" | "MONTH" => Ok(Self::Monthly),
            "QUARTERLY" | "QUARTER" => Ok(Self::Quarterly),
            "BIANNUAL" | "SEMIANNUAL" => Ok(Self::Biannual),
            "ANNUAL" | "YEARLY" | "YEAR" => Ok(Self::Annual),
            other => Err(format!("Unknown billing interval: {}", other)),
        }
    }
}

/// Payment intent settlement status.
///
/// An intent is created PENDING and settled exactly once by the webhook
/// reconciler; SUCCESS and FAILED are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Success,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "SUCCESS" => Ok(Self::Success),
            "FAILED" => Ok(Self::Failed),
            other => Err(format!("Unknown payment status: {}", other)),
        }
    }
}

/// Scheduled job execution status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Running,
    Success,
    Failed,
    Canceled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "RUNNING",
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
            Self::Canceled => "CANCELED",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RUNNING" => Ok(Self::Running),
            "SUCCESS" => Ok(Self::Success),
            "FAILED" => Ok(Self::Failed),
            "CANCELED" => Ok(Self::Canceled),
            other => Err(format!("Unknown job status: {}", other)),
        }
    }
}

/// A pricing tier from the tier catalog.
///
/// Tiers are bounded by a congregation member-count range: a church may only
/// select a tier whose range covers its current member count. Prices are
/// stored per billing interval in minor units (pesewas).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PricingTier {
    pub id: i64,
    pub tier_name: String,
    pub display_name: String,
    pub min_members: i32,
    /// NULL means unbounded (largest tier)
    pub max_members: Option<i32>,
    pub monthly_price_cents: i64,
    pub quarterly_price_cents: i64,
    pub biannual_price_cents: i64,
    pub annual_price_cents: i64,
    pub is_active: bool,
}

impl PricingTier {
    /// Price for one charge at the given interval, in minor units
    pub fn price_for_interval(&self, interval: BillingInterval) -> i64 {
        match interval {
            BillingInterval::Monthly => self.monthly_price_cents,
            BillingInterval::Quarterly => self.quarterly_price_cents,
            BillingInterval::Biannual => self.biannual_price_cents,
            BillingInterval::Annual => self.annual_price_cents,
        }
    }

    /// Whether a congregation of `member_count` falls inside this tier's range
    pub fn covers_member_count(&self, member_count: i32) -> bool {
        if member_count < self.min_members {
            return false;
        }
        match self.max_members {
            Some(max) => member_count <= max,
            None => true,
        }
    }
}

/// Minimal tenant record used by billing and jobs for logging and notifications
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Church {
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
    pub member_count: i32,
}

/// Add months to a calendar date, clamping the day to the target month's length.
///
/// `2025-01-31 + 1 month` is `2025-02-28`; billing dates never skip a month.
pub fn add_months(date: Date, months: i32) -> Date {
    let zero_based = date.month() as i32 - 1 + months;
    let year = date.year() + zero_based.div_euclid(12);
    let month_number = (zero_based.rem_euclid(12) + 1) as u8;
    let month = time::Month::try_from(month_number).unwrap_or(time::Month::January);
    let max_day = month.length(year);
    let day = date.day().min(max_day);
    Date::from_calendar_date(year, month, day).unwrap_or(date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn test_subscription_status_round_trip() {
        for status in [
            SubscriptionStatus::Trialing,
            SubscriptionStatus::Active,
            SubscriptionStatus::PastDue,
            SubscriptionStatus::Suspended,
            SubscriptionStatus::Canceled,
        ] {
            assert_eq!(status.as_str().parse::<SubscriptionStatus>(), Ok(status));
        }
    }

    #[test]
    fn test_billing_interval_months() {
        assert_eq!(BillingInterval::Monthly.months(), 1);
        assert_eq!(BillingInterval::Quarterly.months(), 3);
        assert_eq!(BillingInterval::Biannual.months(), 6);
        assert_eq!(BillingInterval::Annual.months(), 12);
    }

    #[test]
    fn test_billing_interval_parse_aliases() {
        assert_eq!("yearly".parse::<BillingInterval>(), Ok(BillingInterval::Annual));
        assert_eq!("MONTH".parse::<BillingInterval>(), Ok(BillingInterval::Monthly));
        assert!("fortnightly".parse::<BillingInterval>().is_err());
    }

    #[test]
    fn test_tier_member_range() {
        let tier = PricingTier {
            id: 1,
            tier_name: "TIER_1".to_string(),
            display_name: "Tier 1".to_string(),
            min_members: 1,
            max_members: Some(200),
            monthly_price_cents: 15_000,
            quarterly_price_cents: 45_000,
            biannual_price_cents: 90_000,
            annual_price_cents: 180_000,
            is_active: true,
        };
        assert!(tier.covers_member_count(150));
        assert!(tier.covers_member_count(200));
        assert!(!tier.covers_member_count(201));
        assert!(!tier.covers_member_count(0));
    }

    #[test]
    fn test_add_months_clamps_day() {
        assert_eq!(add_months(date!(2025 - 01 - 31), 1), date!(2025 - 02 - 28));
        assert_eq!(add_months(date!(2024 - 01 - 31), 1), date!(2024 - 02 - 29));
        assert_eq!(add_months(date!(2025 - 11 - 15), 3), date!(2026 - 02 - 15));
        assert_eq!(add_months(date!(2025 - 06 - 30), 12), date!(2026 - 06 - 30));
    }
}
