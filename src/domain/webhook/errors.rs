//! Webhook processing error taxonomy.

use thiserror::Error;

use crate::domain::foundation::DomainError;

/// Why an incoming payload was rejected before any side effect.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerificationError {
    #[error("Missing webhook signature header")]
    MissingSignature,

    #[error("Malformed signature header: {0}")]
    MalformedSignature(String),

    #[error("Webhook signature does not match payload")]
    SignatureMismatch,

    #[error("Webhook timestamp outside tolerance ({age_secs}s)")]
    TimestampOutOfTolerance { age_secs: i64 },

    #[error("Event livemode does not match configuration")]
    LivemodeMismatch,

    #[error("Invalid webhook payload: {0}")]
    InvalidPayload(String),
}

/// Failure while processing a verified (or unverifiable) webhook.
///
/// Each variant maps to one HTTP status at the ingress and optionally
/// carries the id of the payment transaction it concerns.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WebhookError {
    /// Rejected before any write.
    #[error(transparent)]
    Verification(#[from] VerificationError),

    /// Checkout references a transaction the ledger does not hold.
    #[error("Payment transaction not found: {transaction_id}")]
    TransactionNotFound { transaction_id: String },

    /// A referenced owner (user subscription, wallet) is missing.
    #[error("{message}")]
    MissingLink {
        message: String,
        transaction_id: Option<String>,
    },

    /// Subscription checkout matched no catalog plan.
    #[error("{message}")]
    PlanNotFound {
        message: String,
        transaction_id: String,
    },

    /// The ledger could not be moved to COMPLETED; nothing was credited.
    #[error("Failed to update payment transaction {transaction_id}: {message}")]
    CriticalUpdateFailure {
        message: String,
        transaction_id: String,
    },

    /// The wallet service rejected the credit.
    #[error("Token award failed: {message}")]
    TokenAwardFailed {
        message: String,
        transaction_id: String,
    },

    /// Subscription state could not be written after the payment was recorded.
    #[error("Subscription sync failed: {message}")]
    SubscriptionSyncFailed {
        message: String,
        transaction_id: Option<String>,
    },

    /// Fetching an object from the gateway failed.
    #[error("Gateway request failed: {message}")]
    GatewayError {
        message: String,
        transaction_id: Option<String>,
    },

    /// Writing a catalog projection failed.
    #[error("Catalog sync failed: {message}")]
    CatalogSyncFailed { message: String },

    /// Anything unexpected. Details are logged, never returned to callers.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl WebhookError {
    /// The payment transaction this error concerns, if any.
    pub fn transaction_id(&self) -> Option<&str> {
        match self {
            WebhookError::TransactionNotFound { transaction_id }
            | WebhookError::PlanNotFound { transaction_id, .. }
            | WebhookError::CriticalUpdateFailure { transaction_id, .. }
            | WebhookError::TokenAwardFailed { transaction_id, .. } => Some(transaction_id),
            WebhookError::MissingLink { transaction_id, .. }
            | WebhookError::SubscriptionSyncFailed { transaction_id, .. }
            | WebhookError::GatewayError { transaction_id, .. } => transaction_id.as_deref(),
            WebhookError::Verification(_)
            | WebhookError::CatalogSyncFailed { .. }
            | WebhookError::Internal(_) => None,
        }
    }

    /// Missing referenced entity.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            WebhookError::TransactionNotFound { .. } | WebhookError::MissingLink { .. }
        )
    }

    pub fn is_critical(&self) -> bool {
        matches!(self, WebhookError::CriticalUpdateFailure { .. })
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, WebhookError::Internal(_))
    }

    pub fn missing_link(message: impl Into<String>) -> Self {
        WebhookError::MissingLink {
            message: message.into(),
            transaction_id: None,
        }
    }

    pub fn gateway(message: impl Into<String>, transaction_id: Option<String>) -> Self {
        WebhookError::GatewayError {
            message: message.into(),
            transaction_id,
        }
    }
}

impl From<DomainError> for WebhookError {
    fn from(err: DomainError) -> Self {
        WebhookError::Internal(err.to_string())
    }
}
