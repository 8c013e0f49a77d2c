//! Token wallet credit value object.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{UserId, ValidationError, WalletId};

use super::PaymentTransaction;

/// Entity type recorded alongside `related_entity_id`.
pub const PAYMENT_TRANSACTION_ENTITY: &str = "payment_transactions";

/// Kind of wallet ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CreditType {
    CreditPurchase,
    CreditAdjustment,
    CreditRefund,
}

/// Credit request handed to the wallet service.
///
/// `amount` is a string-encoded integer. `related_entity_id` is the payment
/// transaction id and is the key the wallet service de-duplicates on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenWalletCredit {
    pub wallet_id: WalletId,
    #[serde(rename = "type")]
    pub credit_type: CreditType,
    pub amount: String,
    pub related_entity_id: String,
    pub related_entity_type: String,
    pub recorded_by_user_id: UserId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl TokenWalletCredit {
    /// Builds the purchase credit for a completed payment transaction.
    pub fn purchase(transaction: &PaymentTransaction) -> Result<Self, ValidationError> {
        if transaction.tokens_to_award <= 0 {
            return Err(ValidationError::invalid_format(
                "tokens_to_award",
                "credit amount must be positive",
            ));
        }

        let notes = transaction
            .gateway_transaction_id
            .as_ref()
            .map(|gateway_id| format!("Token purchase via {}", gateway_id));

        Ok(Self {
            wallet_id: transaction.target_wallet_id.clone(),
            credit_type: CreditType::CreditPurchase,
            amount: transaction.tokens_to_award.to_string(),
            related_entity_id: transaction.id.to_string(),
            related_entity_type: PAYMENT_TRANSACTION_ENTITY.to_string(),
            recorded_by_user_id: transaction.user_id.clone(),
            notes,
        })
    }
}
