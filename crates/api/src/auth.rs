//! Operator authorization
//!
//! Explicit per-operation checks: a declarative table maps each operator
//! operation to the capability it requires, and [`authorize`] evaluates it
//! before the handler touches the core. Default-deny: an operation missing
//! from the table is rejected.

use axum::http::HeaderMap;

use crate::error::ApiError;
use crate::state::AppState;

/// Capabilities an operator credential can hold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    ManageBilling,
    ManageJobs,
    ManageRetention,
}

/// Operation -> required capability. The single source of truth for what the
/// operator API may do; every handler names its operation here.
pub const OPERATION_CAPABILITIES: &[(&str, Capability)] = &[
    // Subscriptions
    ("subscriptions.read", Capability::ManageBilling),
    ("subscriptions.checkout", Capability::ManageBilling),
    ("subscriptions.cancel", Capability::ManageBilling),
    ("subscriptions.reactivate", Capability::ManageBilling),
    ("subscriptions.events", Capability::ManageBilling),
    // Tier changes
    ("tier_changes.preview", Capability::ManageBilling),
    ("tier_changes.initiate", Capability::ManageBilling),
    ("tier_changes.rollback", Capability::ManageBilling),
    ("tier_changes.history", Capability::ManageBilling),
    // Purchases
    ("addons.purchase", Capability::ManageBilling),
    ("sms_credits.top_up", Capability::ManageBilling),
    ("sms_credits.read", Capability::ManageBilling),
    ("partnership_codes.apply", Capability::ManageBilling),
    // Retention
    ("retention.list", Capability::ManageRetention),
    ("retention.read", Capability::ManageRetention),
    ("retention.extend", Capability::ManageRetention),
    ("retention.cancel_deletion", Capability::ManageRetention),
    // Jobs
    ("jobs.list", Capability::ManageJobs),
    ("jobs.trigger", Capability::ManageJobs),
    ("jobs.retry", Capability::ManageJobs),
    ("jobs.cancel", Capability::ManageJobs),
];

/// Look up the capability an operation requires
pub fn required_capability(operation: &str) -> Option<Capability> {
    OPERATION_CAPABILITIES
        .iter()
        .find(|(op, _)| *op == operation)
        .map(|(_, cap)| *cap)
}

/// The authenticated operator performing a request
#[derive(Debug, Clone)]
pub struct OperatorContext {
    pub name: String,
}

/// Authorize an operator request for `operation`.
///
/// Validates the bearer token and checks the operation against the
/// capability table. Tenant identity is never ambient: handlers receive the
/// church id explicitly from the route.
pub fn authorize(
    state: &AppState,
    headers: &HeaderMap,
    operation: &str,
) -> Result<OperatorContext, ApiError> {
    let token = headers
        .get("x-operator-token")
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::Unauthorized)?;

    if token != state.config.operator_token {
        return Err(ApiError::Unauthorized);
    }

    let capability = required_capability(operation).ok_or(ApiError::Forbidden)?;

    let name = headers
        .get("x-operator-name")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("operator")
        .to_string();

    tracing::info!(
        operator = %name,
        operation = operation,
        capability = ?capability,
        "Operator operation authorized"
    );

    Ok(OperatorContext { name })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_operation_has_a_capability() {
        for (operation, _) in OPERATION_CAPABILITIES {
            assert!(required_capability(operation).is_some());
        }
    }

    #[test]
    fn test_unknown_operation_is_denied() {
        assert!(required_capability("subscriptions.delete_all").is_none());
    }

    #[test]
    fn test_capability_mapping() {
        assert_eq!(required_capability("jobs.trigger"), Some(Capability::ManageJobs));
        assert_eq!(
            required_capability("retention.extend"),
            Some(Capability::ManageRetention)
        );
        assert_eq!(
            required_capability("subscriptions.cancel"),
            Some(Capability::ManageBilling)
        );
    }
}
