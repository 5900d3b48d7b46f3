//! Email notifications for billing events
//!
//! Fire-and-forget transactional emails via the Resend API. Delivery failures
//! are reported as `Ok(false)` so state transitions never roll back because a
//! notification could not be sent.

use time::Date;

use crate::error::BillingResult;

/// Email configuration
#[derive(Debug, Clone)]
pub struct EmailConfig {
    /// Resend API key
    pub resend_api_key: String,
    /// From address for emails
    pub email_from: String,
    /// App name for branding
    pub app_name: String,
    /// Support email
    pub support_email: String,
    /// Billing dashboard URL used in renewal links
    pub billing_url: String,
}

impl EmailConfig {
    /// Create config from environment variables
    pub fn from_env() -> Self {
        Self {
            resend_api_key: std::env::var("RESEND_API_KEY").unwrap_or_default(),
            email_from: std::env::var("EMAIL_FROM")
                .unwrap_or_else(|_| "Shepherd <noreply@shepherd.church>".to_string()),
            app_name: std::env::var("APP_NAME").unwrap_or_else(|_| "Shepherd".to_string()),
            support_email: std::env::var("SUPPORT_EMAIL")
                .unwrap_or_else(|_| "support@shepherd.church".to_string()),
            billing_url: std::env::var("BILLING_URL")
                .unwrap_or_else(|_| "https://app.shepherd.church/billing".to_string()),
        }
    }

    /// Check if email sending is enabled
    pub fn is_enabled(&self) -> bool {
        !self.resend_api_key.is_empty()
    }
}

/// Billing email notification service
#[derive(Clone)]
pub struct BillingEmailService {
    config: EmailConfig,
    client: reqwest::Client,
}

impl BillingEmailService {
    pub fn new(config: EmailConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    pub fn from_env() -> Self {
        Self::new(EmailConfig::from_env())
    }

    /// Send an email via the Resend API.
    ///
    /// Returns `Ok(true)` if sent, `Ok(false)` if sending failed or email is
    /// not configured (non-fatal; callers never roll back on this).
    async fn send_email(&self, to: &str, subject: &str, html: &str) -> BillingResult<bool> {
        if !self.config.is_enabled() {
            tracing::warn!(
                to = %to,
                subject = %subject,
                "Email not configured, skipping"
            );
            return Ok(false);
        }

        let body = serde_json::json!({
            "from": self.config.email_from,
            "to": [to],
            "subject": subject,
            "html": html,
        });

        let result = self
            .client
            .post("https://api.resend.com/emails")
            .bearer_auth(&self.config.resend_api_key)
            .json(&body)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => Ok(true),
            Ok(response) => {
                tracing::error!(
                    to = %to,
                    subject = %subject,
                    status = %response.status(),
                    "Email send rejected"
                );
                Ok(false)
            }
            Err(e) => {
                tracing::error!(to = %to, subject = %subject, error = %e, "Email send failed");
                Ok(false)
            }
        }
    }

    /// Deletion warning: data will be permanently removed on `deletion_date`
    pub async fn send_deletion_warning(
        &self,
        to: &str,
        church_name: &str,
        deletion_date: Date,
        days_remaining: i64,
    ) -> BillingResult<bool> {
        let subject = format!(
            "URGENT: {} - Data deletion in {} days",
            church_name, days_remaining
        );
        let html = format!(
            "<p>Your {app} data for <strong>{church}</strong> will be permanently deleted on \
             <strong>{date}</strong> ({days} days from now).</p>\
             <p>This includes all member records, events, attendance, donations and users, \
             and cannot be undone.</p>\
             <p><a href=\"{url}\">Renew your subscription</a> to cancel the deletion, or \
             contact {support} for help.</p>",
            app = self.config.app_name,
            church = church_name,
            date = deletion_date,
            days = days_remaining,
            url = self.config.billing_url,
            support = self.config.support_email,
        );

        self.send_email(to, &subject, &html).await
    }

    /// Renewal receipt after a successful renewal charge
    pub async fn send_renewal_receipt(
        &self,
        to: &str,
        church_name: &str,
        amount_cents: i64,
        next_billing_date: Date,
    ) -> BillingResult<bool> {
        let subject = format!("{} subscription renewed", self.config.app_name);
        let html = format!(
            "<p>The subscription for <strong>{church}</strong> renewed successfully.</p>\
             <p>Amount charged: GHS {amount:.2}<br>Next billing date: {next}</p>",
            church = church_name,
            amount = amount_cents as f64 / 100.0,
            next = next_billing_date,
        );

        self.send_email(to, &subject, &html).await
    }

    /// Renewal failure notice with the grace-period deadline
    pub async fn send_renewal_failed(
        &self,
        to: &str,
        church_name: &str,
        grace_period_days: i32,
    ) -> BillingResult<bool> {
        let subject = format!("{} payment failed", self.config.app_name);
        let html = format!(
            "<p>We could not charge the renewal for <strong>{church}</strong>.</p>\
             <p>Please <a href=\"{url}\">update your payment method</a> within {days} days \
             to avoid suspension.</p>",
            church = church_name,
            url = self.config.billing_url,
            days = grace_period_days,
        );

        self.send_email(to, &subject, &html).await
    }

    /// Suspension notice with the data-retention end date
    pub async fn send_suspension_notice(
        &self,
        to: &str,
        church_name: &str,
        retention_end_date: Date,
    ) -> BillingResult<bool> {
        let subject = format!("{} subscription suspended", self.config.app_name);
        let html = format!(
            "<p>The subscription for <strong>{church}</strong> has been suspended for \
             non-payment.</p>\
             <p>Your data is retained until <strong>{date}</strong>. \
             <a href=\"{url}\">Renew now</a> to restore access.</p>",
            church = church_name,
            date = retention_end_date,
            url = self.config.billing_url,
        );

        self.send_email(to, &subject, &html).await
    }
}
