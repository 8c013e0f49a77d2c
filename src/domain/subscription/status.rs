//! Gateway subscription status vocabulary.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Subscription status as reported by the gateway.
///
/// Mirrors the gateway vocabulary; unknown values are preserved verbatim
/// rather than coerced, so new gateway states survive a round trip.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SubscriptionStatus {
    Active,
    PastDue,
    Unpaid,
    Canceled,
    Incomplete,
    IncompleteExpired,
    Trialing,
    Paused,
    Other(String),
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::PastDue => "past_due",
            SubscriptionStatus::Unpaid => "unpaid",
            SubscriptionStatus::Canceled => "canceled",
            SubscriptionStatus::Incomplete => "incomplete",
            SubscriptionStatus::IncompleteExpired => "incomplete_expired",
            SubscriptionStatus::Trialing => "trialing",
            SubscriptionStatus::Paused => "paused",
            SubscriptionStatus::Other(s) => s,
        }
    }

    /// Check if the subscription currently grants access.
    pub fn has_access(&self) -> bool {
        matches!(
            self,
            SubscriptionStatus::Active | SubscriptionStatus::Trialing | SubscriptionStatus::PastDue
        )
    }
}

impl From<&str> for SubscriptionStatus {
    fn from(value: &str) -> Self {
        match value {
            "active" => SubscriptionStatus::Active,
            "past_due" => SubscriptionStatus::PastDue,
            "unpaid" => SubscriptionStatus::Unpaid,
            "canceled" => SubscriptionStatus::Canceled,
            "incomplete" => SubscriptionStatus::Incomplete,
            "incomplete_expired" => SubscriptionStatus::IncompleteExpired,
            "trialing" => SubscriptionStatus::Trialing,
            "paused" => SubscriptionStatus::Paused,
            other => SubscriptionStatus::Other(other.to_string()),
        }
    }
}

impl From<String> for SubscriptionStatus {
    fn from(value: String) -> Self {
        SubscriptionStatus::from(value.as_str())
    }
}

impl From<SubscriptionStatus> for String {
    fn from(value: SubscriptionStatus) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn known_statuses_parse() {
        assert_eq!(SubscriptionStatus::from("past_due"), SubscriptionStatus::PastDue);
        assert_eq!(SubscriptionStatus::from("unpaid"), SubscriptionStatus::Unpaid);
        assert_eq!(SubscriptionStatus::from("canceled"), SubscriptionStatus::Canceled);
    }

    #[test]
    fn unknown_status_is_preserved() {
        let status = SubscriptionStatus::from("on_hold");
        assert_eq!(status, SubscriptionStatus::Other("on_hold".to_string()));
        assert_eq!(serde_json::to_value(&status).unwrap(), json!("on_hold"));
    }

    #[test]
    fn serde_uses_gateway_strings() {
        let parsed: SubscriptionStatus = serde_json::from_value(json!("incomplete_expired")).unwrap();
        assert_eq!(parsed, SubscriptionStatus::IncompleteExpired);
        assert_eq!(
            serde_json::to_value(SubscriptionStatus::PastDue).unwrap(),
            json!("past_due")
        );
    }

    #[test]
    fn access_is_granted_while_active_trialing_or_past_due() {
        assert!(SubscriptionStatus::Active.has_access());
        assert!(SubscriptionStatus::PastDue.has_access());
        assert!(!SubscriptionStatus::Unpaid.has_access());
        assert!(!SubscriptionStatus::Canceled.has_access());
    }
}
