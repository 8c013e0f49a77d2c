//! In-memory token wallet service.
//!
//! Honors the wallet contract the core relies on: a credit whose
//! `related_entity_id` was already recorded is acknowledged without
//! changing the balance.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::domain::foundation::{DomainError, ErrorCode, UserId, WalletId};
use crate::domain::ledger::TokenWalletCredit;
use crate::ports::{TokenWalletService, WalletTransactionReceipt};

#[derive(Default)]
struct WalletState {
    wallets: HashMap<(String, Option<String>), WalletId>,
    balances: HashMap<WalletId, i64>,
    accepted: Vec<(TokenWalletCredit, WalletTransactionReceipt)>,
    credit_calls: Vec<TokenWalletCredit>,
    failure: Option<String>,
}

/// Token wallet service backed by process memory.
#[derive(Default)]
pub struct InMemoryTokenWallet {
    state: Mutex<WalletState>,
}

impl InMemoryTokenWallet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a personal wallet for a user.
    pub fn with_wallet(self, user_id: &str, wallet_id: WalletId) -> Self {
        self.add_wallet(user_id, None, wallet_id);
        self
    }

    pub fn add_wallet(&self, user_id: &str, organization_id: Option<&str>, wallet: WalletId) {
        let mut state = self.lock();
        state.balances.entry(wallet.clone()).or_insert(0);
        state.wallets.insert(
            (user_id.to_string(), organization_id.map(str::to_string)),
            wallet,
        );
    }

    /// Makes every subsequent credit fail with `message`.
    pub fn fail_credits_with(&self, message: impl Into<String>) {
        self.lock().failure = Some(message.into());
    }

    pub fn clear_failure(&self) {
        self.lock().failure = None;
    }

    // === Test Helpers ===

    /// Every credit request received, including duplicates and failures.
    pub fn credit_calls(&self) -> Vec<TokenWalletCredit> {
        self.lock().credit_calls.clone()
    }

    /// Credits that changed a balance.
    pub fn accepted_credits(&self) -> Vec<TokenWalletCredit> {
        self.lock()
            .accepted
            .iter()
            .map(|(credit, _)| credit.clone())
            .collect()
    }

    pub fn balance(&self, wallet_id: &WalletId) -> i64 {
        self.lock()
            .balances
            .get(wallet_id)
            .copied()
            .unwrap_or(0)
    }

    fn lock(&self) -> MutexGuard<'_, WalletState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl TokenWalletService for InMemoryTokenWallet {
    async fn find_wallet(
        &self,
        user_id: &UserId,
        organization_id: Option<&str>,
    ) -> Result<Option<WalletId>, DomainError> {
        let state = self.lock();
        Ok(state
            .wallets
            .get(&(user_id.as_str().to_string(), organization_id.map(str::to_string)))
            .cloned())
    }

    async fn record_transaction(
        &self,
        credit: &TokenWalletCredit,
    ) -> Result<WalletTransactionReceipt, DomainError> {
        let mut state = self.lock();
        state.credit_calls.push(credit.clone());

        if let Some(message) = &state.failure {
            return Err(DomainError::new(ErrorCode::ExternalServiceError, message.clone()));
        }

        if let Some((_, receipt)) = state
            .accepted
            .iter()
            .find(|(seen, _)| seen.related_entity_id == credit.related_entity_id)
        {
            return Ok(receipt.clone());
        }

        let amount: i64 = credit.amount.parse().map_err(|_| {
            DomainError::new(
                ErrorCode::ValidationFailed,
                format!("Invalid credit amount: {}", credit.amount),
            )
        })?;

        let sequence = state.accepted.len() + 1;
        let balance = {
            let balance = state.balances.entry(credit.wallet_id.clone()).or_insert(0);
            *balance += amount;
            *balance
        };
        let receipt = WalletTransactionReceipt {
            transaction_id: format!("wtx_{}", sequence),
            wallet_id: credit.wallet_id.clone(),
            new_balance: Some(balance.to_string()),
        };
        state.accepted.push((credit.clone(), receipt.clone()));
        Ok(receipt)
    }
}
