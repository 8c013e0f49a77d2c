//! Payment transaction record.
//!
//! One row per attempted monetary event. `(gateway_name,
//! gateway_transaction_id)` is unique when both are set and is the key for
//! "was this external event already processed".

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::foundation::{PaymentTransactionId, UserId, ValidationError, WalletId};

use super::PaymentStatus;

/// A persisted payment transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentTransaction {
    pub id: PaymentTransactionId,

    /// Gateway that reported the payment (e.g. "stripe").
    #[serde(default)]
    pub gateway_name: Option<String>,

    /// Checkout session id, invoice id, or failed-attempt key.
    #[serde(default)]
    pub gateway_transaction_id: Option<String>,

    pub user_id: UserId,

    pub target_wallet_id: WalletId,

    pub status: PaymentStatus,

    pub tokens_to_award: i64,

    #[serde(default)]
    pub organization_id: Option<String>,

    #[serde(default)]
    pub metadata: Map<String, Value>,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl PaymentTransaction {
    /// True when this row is the idempotent "already processed" signal.
    pub fn is_completed(&self) -> bool {
        self.status == PaymentStatus::Completed
    }
}

/// Insert payload for a payment transaction. The store assigns `id`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewPaymentTransaction {
    pub gateway_name: String,
    pub gateway_transaction_id: String,
    pub user_id: UserId,
    pub target_wallet_id: WalletId,
    pub status: PaymentStatus,
    pub tokens_to_award: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,
    pub metadata: Map<String, Value>,
}

impl NewPaymentTransaction {
    /// Builds a new transaction, rejecting negative token amounts.
    pub fn new(
        gateway_name: impl Into<String>,
        gateway_transaction_id: impl Into<String>,
        user_id: UserId,
        target_wallet_id: WalletId,
        status: PaymentStatus,
        tokens_to_award: i64,
    ) -> Result<Self, ValidationError> {
        if tokens_to_award < 0 {
            return Err(ValidationError::negative("tokens_to_award", tokens_to_award));
        }
        let gateway_transaction_id = gateway_transaction_id.into();
        if gateway_transaction_id.is_empty() {
            return Err(ValidationError::empty_field("gateway_transaction_id"));
        }

        Ok(Self {
            gateway_name: gateway_name.into(),
            gateway_transaction_id,
            user_id,
            target_wallet_id,
            status,
            tokens_to_award,
            organization_id: None,
            metadata: Map::new(),
        })
    }

    pub fn with_organization(mut self, organization_id: Option<String>) -> Self {
        self.organization_id = organization_id;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}
