//! Token wallet port - the external service that holds token balances.
//!
//! The wallet service de-duplicates credits by `related_entity_id`, so a
//! redelivered webhook that reaches the crediting step again is harmless.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{DomainError, UserId, WalletId};
use crate::domain::ledger::TokenWalletCredit;

/// Receipt for a recorded wallet transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletTransactionReceipt {
    pub transaction_id: String,
    pub wallet_id: WalletId,
    /// Balance after the credit, as a string-encoded integer.
    #[serde(default)]
    pub new_balance: Option<String>,
}

/// Port for the token wallet service.
#[async_trait]
pub trait TokenWalletService: Send + Sync {
    /// Wallet of a user, scoped to an organization when given.
    async fn find_wallet(
        &self,
        user_id: &UserId,
        organization_id: Option<&str>,
    ) -> Result<Option<WalletId>, DomainError>;

    /// Records a credit. Idempotent per `related_entity_id`.
    async fn record_transaction(
        &self,
        credit: &TokenWalletCredit,
    ) -> Result<WalletTransactionReceipt, DomainError>;
}
