//! LedgerService - sole writer of payment transactions and sole caller of
//! the wallet credit operation.
//!
//! Status changes are compare-and-set: an update only applies while the row
//! still holds the status the caller read. A concurrent delivery that loses
//! the race gets [`StatusChange::Superseded`] and must not credit.

use serde_json::{json, Value};
use std::sync::Arc;

use crate::domain::foundation::{DomainError, ErrorCode, PaymentTransactionId, UserId, WalletId};
use crate::domain::ledger::{NewPaymentTransaction, PaymentStatus, PaymentTransaction, TokenWalletCredit};
use crate::ports::{
    from_record, to_record, Conflict, Filter, Record, RecordStore, Table, TokenWalletService,
    WalletTransactionReceipt,
};

const IDEMPOTENCY_KEY: [&str; 2] = ["gateway_name", "gateway_transaction_id"];

/// Outcome of [`LedgerService::ensure_transaction`].
#[derive(Debug, Clone, PartialEq)]
pub enum EnsuredTransaction {
    /// This call inserted the row.
    Created(PaymentTransaction),
    /// A row with the same gateway key already existed.
    Existing(PaymentTransaction),
}

impl EnsuredTransaction {
    pub fn transaction(&self) -> &PaymentTransaction {
        match self {
            EnsuredTransaction::Created(tx) | EnsuredTransaction::Existing(tx) => tx,
        }
    }
}

/// Outcome of a guarded status change.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusChange {
    /// The row moved to the requested status.
    Applied(PaymentTransaction),
    /// Another writer changed the row first; this is its current state.
    Superseded(PaymentTransaction),
}

#[derive(Clone)]
pub struct LedgerService {
    store: Arc<dyn RecordStore>,
    wallet: Arc<dyn TokenWalletService>,
}

impl LedgerService {
    pub fn new(store: Arc<dyn RecordStore>, wallet: Arc<dyn TokenWalletService>) -> Self {
        Self { store, wallet }
    }

    pub async fn find_by_id(
        &self,
        id: &PaymentTransactionId,
    ) -> Result<Option<PaymentTransaction>, DomainError> {
        self.find_one(&[Filter::eq("id", id.to_string())]).await
    }

    pub async fn find_by_gateway_id(
        &self,
        gateway_name: &str,
        gateway_transaction_id: &str,
    ) -> Result<Option<PaymentTransaction>, DomainError> {
        self.find_one(&[
            Filter::eq("gateway_name", gateway_name),
            Filter::eq("gateway_transaction_id", gateway_transaction_id),
        ])
        .await
    }

    /// Inserts the transaction unless its gateway key is already present.
    ///
    /// Atomic against concurrent deliveries: the insert is an upsert that
    /// ignores conflicts on `(gateway_name, gateway_transaction_id)`, then
    /// the surviving row is read back.
    pub async fn ensure_transaction(
        &self,
        new: NewPaymentTransaction,
    ) -> Result<EnsuredTransaction, DomainError> {
        let gateway_name = new.gateway_name.clone();
        let gateway_id = new.gateway_transaction_id.clone();

        let inserted = self
            .store
            .upsert(
                Table::PaymentTransactions,
                vec![to_record(&new)?],
                Conflict::ignore_on(&IDEMPOTENCY_KEY),
            )
            .await?;

        if let Some(row) = inserted.into_iter().next() {
            let tx: PaymentTransaction = from_record(row)?;
            tracing::info!(
                transaction_id = %tx.id,
                gateway_transaction_id = %gateway_id,
                status = %tx.status,
                "Payment transaction created"
            );
            return Ok(EnsuredTransaction::Created(tx));
        }

        let existing = self
            .find_by_gateway_id(&gateway_name, &gateway_id)
            .await?
            .ok_or_else(|| {
                DomainError::new(
                    ErrorCode::InternalError,
                    format!(
                        "Payment transaction {}:{} neither inserted nor found",
                        gateway_name, gateway_id
                    ),
                )
            })?;

        tracing::info!(
            transaction_id = %existing.id,
            gateway_transaction_id = %gateway_id,
            status = %existing.status,
            "Payment transaction already recorded"
        );
        Ok(EnsuredTransaction::Existing(existing))
    }

    /// Records a failed payment attempt, overwriting a previous record of
    /// the same attempt.
    pub async fn record_failed_attempt(
        &self,
        new: NewPaymentTransaction,
    ) -> Result<PaymentTransaction, DomainError> {
        if new.status != PaymentStatus::Failed {
            return Err(DomainError::new(
                ErrorCode::ValidationFailed,
                format!("Failed attempt must be recorded as FAILED, got {}", new.status),
            ));
        }

        let row = self
            .store
            .upsert(
                Table::PaymentTransactions,
                vec![to_record(&new)?],
                Conflict::update_on(&IDEMPOTENCY_KEY),
            )
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                DomainError::new(ErrorCode::InternalError, "Failed attempt upsert returned no row")
            })?;

        let tx: PaymentTransaction = from_record(row)?;
        tracing::warn!(
            transaction_id = %tx.id,
            gateway_transaction_id = ?tx.gateway_transaction_id,
            "Payment attempt recorded as FAILED"
        );
        Ok(tx)
    }

    /// Moves an open transaction to COMPLETED, optionally stamping the
    /// gateway identity of the payment.
    pub async fn mark_completed(
        &self,
        tx: &PaymentTransaction,
        gateway: Option<(&str, &str)>,
    ) -> Result<StatusChange, DomainError> {
        let mut changes = Record::new();
        if let Some((gateway_name, gateway_transaction_id)) = gateway {
            changes.insert("gateway_name".to_string(), json!(gateway_name));
            changes.insert(
                "gateway_transaction_id".to_string(),
                json!(gateway_transaction_id),
            );
        }
        self.transition(tx, PaymentStatus::Completed, changes).await
    }

    pub async fn mark_failed(
        &self,
        tx: &PaymentTransaction,
        reason: &str,
    ) -> Result<StatusChange, DomainError> {
        let changes = metadata_change(tx, "failure_reason", reason);
        self.transition(tx, PaymentStatus::Failed, changes).await
    }

    pub async fn mark_token_award_failed(
        &self,
        tx: &PaymentTransaction,
        reason: &str,
    ) -> Result<StatusChange, DomainError> {
        let changes = metadata_change(tx, "token_award_error", reason);
        self.transition(tx, PaymentStatus::TokenAwardFailed, changes).await
    }

    /// Credits the transaction's tokens to its wallet.
    ///
    /// Returns `None` without calling the wallet when there is nothing to
    /// award. Only COMPLETED transactions may be credited.
    pub async fn award_tokens(
        &self,
        tx: &PaymentTransaction,
    ) -> Result<Option<WalletTransactionReceipt>, DomainError> {
        if !tx.is_completed() {
            return Err(DomainError::new(
                ErrorCode::InvalidStateTransition,
                format!("Cannot credit transaction {} in status {}", tx.id, tx.status),
            ));
        }
        if tx.tokens_to_award <= 0 {
            tracing::debug!(transaction_id = %tx.id, "No tokens to award");
            return Ok(None);
        }

        let credit = TokenWalletCredit::purchase(tx)?;
        let receipt = self.wallet.record_transaction(&credit).await?;
        tracing::info!(
            transaction_id = %tx.id,
            wallet_id = %tx.target_wallet_id,
            amount = %credit.amount,
            wallet_transaction_id = %receipt.transaction_id,
            "Tokens credited"
        );
        Ok(Some(receipt))
    }

    /// Wallet that receives credits for a user.
    pub async fn find_wallet(
        &self,
        user_id: &UserId,
        organization_id: Option<&str>,
    ) -> Result<Option<WalletId>, DomainError> {
        self.wallet.find_wallet(user_id, organization_id).await
    }

    async fn transition(
        &self,
        tx: &PaymentTransaction,
        target: PaymentStatus,
        mut changes: Record,
    ) -> Result<StatusChange, DomainError> {
        tx.status.transition_to(target).map_err(|e| {
            DomainError::new(ErrorCode::InvalidStateTransition, e.to_string())
                .with_detail("transaction_id", tx.id.to_string())
        })?;

        changes.insert("status".to_string(), json!(target));
        let updated = self
            .store
            .update(
                Table::PaymentTransactions,
                changes,
                &[
                    Filter::eq("id", tx.id.to_string()),
                    Filter::eq("status", tx.status.as_str()),
                ],
            )
            .await?;

        if let Some(row) = updated.into_iter().next() {
            let updated: PaymentTransaction = from_record(row)?;
            tracing::info!(
                transaction_id = %updated.id,
                from = %tx.status,
                to = %updated.status,
                "Payment transaction status changed"
            );
            return Ok(StatusChange::Applied(updated));
        }

        let current = self.find_by_id(&tx.id).await?.ok_or_else(|| {
            DomainError::new(
                ErrorCode::NotFound,
                format!("Payment transaction {} disappeared", tx.id),
            )
        })?;
        tracing::warn!(
            transaction_id = %tx.id,
            expected = %tx.status,
            actual = %current.status,
            "Payment transaction changed concurrently"
        );
        Ok(StatusChange::Superseded(current))
    }

    async fn find_one(&self, filters: &[Filter]) -> Result<Option<PaymentTransaction>, DomainError> {
        self.store
            .find(Table::PaymentTransactions, filters)
            .await?
            .into_iter()
            .next()
            .map(from_record::<PaymentTransaction>)
            .transpose()
    }
}

fn metadata_change(tx: &PaymentTransaction, key: &str, value: &str) -> Record {
    let mut metadata = tx.metadata.clone();
    metadata.insert(key.to_string(), Value::String(value.to_string()));

    let mut changes = Record::new();
    changes.insert("metadata".to_string(), Value::Object(metadata));
    changes
}
