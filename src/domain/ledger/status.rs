//! Payment transaction status state machine.
//!
//! A transaction is created PENDING (checkout) or PROCESSING (renewal) and
//! moves to exactly one outcome. FAILED and TOKEN_AWARD_FAILED are terminal:
//! a retried payment is a new transaction, never a resurrected one.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::ValidationError;

/// Lifecycle status of a payment transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    /// Created before the customer paid (checkout initiated).
    Pending,

    /// Payment observed, ledger and crediting in progress.
    Processing,

    /// Payment succeeded and the ledger row is durable.
    Completed,

    /// Payment failed at the gateway.
    Failed,

    /// Payment succeeded but the wallet credit was rejected.
    /// Needs manual reconciliation.
    TokenAwardFailed,
}

impl PaymentStatus {
    /// Returns true if transition from self to target is valid.
    pub fn can_transition_to(&self, target: &Self) -> bool {
        use PaymentStatus::*;
        matches!(
            (self, target),
            (Pending, Processing)
                | (Pending, Completed)
                | (Pending, Failed)
                | (Processing, Completed)
                | (Processing, Failed)
                | (Completed, TokenAwardFailed)
        )
    }

    /// Returns all valid target states from the current state.
    pub fn valid_transitions(&self) -> Vec<Self> {
        use PaymentStatus::*;
        match self {
            Pending => vec![Processing, Completed, Failed],
            Processing => vec![Completed, Failed],
            Completed => vec![TokenAwardFailed],
            Failed | TokenAwardFailed => vec![],
        }
    }

    /// Performs the transition, returning an error if it is not allowed.
    pub fn transition_to(&self, target: Self) -> Result<Self, ValidationError> {
        if self.can_transition_to(&target) {
            Ok(target)
        } else {
            Err(ValidationError::invalid_format(
                "status",
                format!("Cannot transition from {} to {}", self, target),
            ))
        }
    }

    /// Checks whether no further transition is possible.
    pub fn is_terminal(&self) -> bool {
        self.valid_transitions().is_empty()
    }

    /// Returns true while the payment outcome has not been recorded.
    pub fn is_open(&self) -> bool {
        matches!(self, PaymentStatus::Pending | PaymentStatus::Processing)
    }

    /// Wire representation used by the store.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Processing => "PROCESSING",
            PaymentStatus::Completed => "COMPLETED",
            PaymentStatus::Failed => "FAILED",
            PaymentStatus::TokenAwardFailed => "TOKEN_AWARD_FAILED",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use PaymentStatus::*;

    const ALL: [PaymentStatus; 5] = [Pending, Processing, Completed, Failed, TokenAwardFailed];

    #[test]
    fn pending_can_complete() {
        assert_eq!(Pending.transition_to(Completed), Ok(Completed));
    }

    #[test]
    fn processing_can_fail() {
        assert_eq!(Processing.transition_to(Failed), Ok(Failed));
    }

    #[test]
    fn completed_can_only_move_to_token_award_failed() {
        assert_eq!(Completed.valid_transitions(), vec![TokenAwardFailed]);
        assert!(Completed.transition_to(Failed).is_err());
        assert!(Completed.transition_to(Pending).is_err());
    }

    #[test]
    fn failure_states_are_terminal() {
        assert!(Failed.is_terminal());
        assert!(TokenAwardFailed.is_terminal());
        assert!(Failed.transition_to(Completed).is_err());
        assert!(TokenAwardFailed.transition_to(Completed).is_err());
    }

    #[test]
    fn open_states_are_pending_and_processing() {
        assert!(Pending.is_open());
        assert!(Processing.is_open());
        assert!(!Completed.is_open());
        assert!(!Failed.is_open());
    }

    #[test]
    fn can_transition_to_is_consistent_with_valid_transitions() {
        for status in ALL {
            for target in ALL {
                assert_eq!(
                    status.can_transition_to(&target),
                    status.valid_transitions().contains(&target),
                    "{:?} -> {:?}",
                    status,
                    target
                );
            }
        }
    }

    #[test]
    fn serializes_in_store_vocabulary() {
        assert_eq!(
            serde_json::to_value(TokenAwardFailed).unwrap(),
            serde_json::json!("TOKEN_AWARD_FAILED")
        );
        let parsed: PaymentStatus = serde_json::from_value(serde_json::json!("PENDING")).unwrap();
        assert_eq!(parsed, Pending);
        for status in ALL {
            assert_eq!(
                serde_json::to_value(status).unwrap(),
                serde_json::json!(status.as_str())
            );
        }
    }
}
