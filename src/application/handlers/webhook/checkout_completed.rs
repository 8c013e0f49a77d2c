//! checkout.session.completed - completes the transaction created when the
//! checkout started and credits its tokens.

use std::str::FromStr;

use crate::application::services::StatusChange;
use crate::domain::catalog::{SubscriptionPlan, ITEM_ID_METADATA_KEY};
use crate::domain::foundation::{DomainError, PaymentTransactionId, PlanId};
use crate::domain::ledger::PaymentTransaction;
use crate::domain::subscription::UserSubscriptionUpsert;
use crate::domain::webhook::{
    CheckoutMode, CheckoutSession, GatewaySubscription, WebhookConfirmation, WebhookError,
    INTERNAL_PAYMENT_ID_KEY, PLAN_ID_KEY,
};

use super::GatewayWebhookHandler;

impl GatewayWebhookHandler {
    pub(super) async fn handle_checkout_completed(
        &self,
        session: &CheckoutSession,
    ) -> Result<WebhookConfirmation, WebhookError> {
        let Some(raw_id) = session.internal_payment_id() else {
            tracing::warn!(session_id = %session.id, "Checkout session carries no internal payment id");
            return Err(WebhookError::missing_link(format!(
                "Checkout session {} has no {} metadata",
                session.id, INTERNAL_PAYMENT_ID_KEY
            )));
        };

        let tx = self.load_transaction(raw_id).await?;
        if !tx.status.is_open() {
            tracing::info!(
                transaction_id = %tx.id,
                status = %tx.status,
                "Checkout already processed"
            );
            return Ok(WebhookConfirmation::already_processed(tx.id.to_string()));
        }

        match session.mode {
            CheckoutMode::Subscription => self.complete_subscription_checkout(session, tx).await,
            CheckoutMode::Payment | CheckoutMode::Other(_) => {
                self.complete_payment_checkout(session, tx).await
            }
        }
    }

    async fn load_transaction(&self, raw_id: &str) -> Result<PaymentTransaction, WebhookError> {
        let not_found = || WebhookError::TransactionNotFound {
            transaction_id: raw_id.to_string(),
        };

        let id = PaymentTransactionId::from_str(raw_id).map_err(|_| not_found())?;
        self.ledger.find_by_id(&id).await?.ok_or_else(|| {
            tracing::warn!(transaction_id = raw_id, "Checkout references unknown transaction");
            not_found()
        })
    }

    async fn complete_payment_checkout(
        &self,
        session: &CheckoutSession,
        tx: PaymentTransaction,
    ) -> Result<WebhookConfirmation, WebhookError> {
        let Some(completed) = self.complete_transaction(&tx, &session.id).await? else {
            return Ok(WebhookConfirmation::already_processed(tx.id.to_string()));
        };

        self.credit_tokens(&completed).await?;
        Ok(WebhookConfirmation::processed(Some(completed.id.to_string())))
    }

    async fn complete_subscription_checkout(
        &self,
        session: &CheckoutSession,
        tx: PaymentTransaction,
    ) -> Result<WebhookConfirmation, WebhookError> {
        let tx_id = tx.id.to_string();

        let Some(subscription_id) = session.subscription_id.as_deref() else {
            return Err(WebhookError::MissingLink {
                message: format!("Subscription checkout {} has no subscription", session.id),
                transaction_id: Some(tx_id),
            });
        };

        let subscription = self
            .gateway
            .fetch_subscription(subscription_id)
            .await
            .map_err(|e| {
                tracing::error!(
                    transaction_id = %tx_id,
                    subscription_id,
                    error = %e,
                    "Failed to fetch subscription for checkout"
                );
                WebhookError::gateway(e.message, Some(tx_id.clone()))
            })?;

        let Some(plan) = self.resolve_checkout_plan(session, &subscription).await? else {
            let reason = format!(
                "No subscription plan matches subscription {} (price {:?}, item {:?})",
                subscription.id,
                subscription.primary_price_id(),
                session.metadata_value(ITEM_ID_METADATA_KEY)
            );
            tracing::error!(transaction_id = %tx_id, %reason, "Plan lookup failed");
            if let Err(e) = self.ledger.mark_failed(&tx, &reason).await {
                tracing::error!(transaction_id = %tx_id, error = %e, "Failed to mark transaction FAILED");
            }
            return Err(WebhookError::PlanNotFound {
                message: reason,
                transaction_id: tx_id,
            });
        };

        let customer_id = session
            .customer_id
            .clone()
            .unwrap_or_else(|| subscription.customer_id.clone());
        let upserted = self
            .subscriptions
            .upsert(UserSubscriptionUpsert {
                user_id: tx.user_id.clone(),
                gateway_customer_id: customer_id,
                gateway_subscription_id: subscription.id.clone(),
                plan_id: plan.id,
                status: subscription.status.clone(),
                current_period_start: subscription.current_period_start,
                current_period_end: subscription.current_period_end,
                cancel_at_period_end: subscription.cancel_at_period_end,
            })
            .await;

        let Some(completed) = self.complete_transaction(&tx, &session.id).await? else {
            return Ok(WebhookConfirmation::already_processed(tx_id));
        };

        if let Err(e) = upserted {
            tracing::error!(
                transaction_id = %tx_id,
                subscription_id = %subscription.id,
                error = %e,
                "Payment recorded but user subscription could not be saved; tokens not credited"
            );
            return Err(WebhookError::SubscriptionSyncFailed {
                message: e.message,
                transaction_id: Some(tx_id),
            });
        }

        self.credit_tokens(&completed).await?;
        Ok(WebhookConfirmation::processed(Some(tx_id)))
    }

    /// Plan by `plan_id` metadata, then by `item_id` metadata, then by the
    /// subscription's price.
    ///
    /// An `item_id` that names no active plan is a miss even when the price
    /// is in the catalog.
    async fn resolve_checkout_plan(
        &self,
        session: &CheckoutSession,
        subscription: &GatewaySubscription,
    ) -> Result<Option<SubscriptionPlan>, DomainError> {
        if let Some(plan_id) = session
            .metadata_value(PLAN_ID_KEY)
            .and_then(|raw| PlanId::from_str(raw).ok())
        {
            if let Some(plan) = self.catalog.find_by_id(&plan_id).await? {
                return Ok(Some(plan));
            }
            tracing::warn!(%plan_id, "Checkout plan_id not in catalog, falling back");
        }

        let item_id = session.metadata_value(ITEM_ID_METADATA_KEY).or_else(|| {
            subscription
                .metadata
                .get(ITEM_ID_METADATA_KEY)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
        });
        if let Some(item_id) = item_id {
            return self.catalog.find_by_item_id(item_id).await;
        }

        match subscription.primary_price_id() {
            Some(price_id) => self.catalog.find_by_price_id(price_id).await,
            None => Ok(None),
        }
    }

    /// Moves the transaction to COMPLETED under this gateway's payment id.
    ///
    /// Returns `None` when a concurrent delivery completed it first.
    pub(super) async fn complete_transaction(
        &self,
        tx: &PaymentTransaction,
        gateway_transaction_id: &str,
    ) -> Result<Option<PaymentTransaction>, WebhookError> {
        let change = self
            .ledger
            .mark_completed(tx, Some((self.gateway.name(), gateway_transaction_id)))
            .await
            .map_err(|e| {
                tracing::error!(
                    transaction_id = %tx.id,
                    error = %e,
                    "Failed to mark transaction COMPLETED; nothing credited"
                );
                WebhookError::CriticalUpdateFailure {
                    message: e.message,
                    transaction_id: tx.id.to_string(),
                }
            })?;

        match change {
            StatusChange::Applied(completed) => Ok(Some(completed)),
            StatusChange::Superseded(current) => {
                tracing::info!(
                    transaction_id = %current.id,
                    status = %current.status,
                    "Transaction completed by a concurrent delivery"
                );
                Ok(None)
            }
        }
    }

    /// Credits a completed transaction, recording TOKEN_AWARD_FAILED when
    /// the wallet rejects it.
    pub(super) async fn credit_tokens(&self, tx: &PaymentTransaction) -> Result<(), WebhookError> {
        let err = match self.ledger.award_tokens(tx).await {
            Ok(_) => return Ok(()),
            Err(err) => err,
        };

        tracing::error!(
            transaction_id = %tx.id,
            wallet_id = %tx.target_wallet_id,
            tokens = tx.tokens_to_award,
            error = %err,
            "Token award failed"
        );
        if let Err(e) = self.ledger.mark_token_award_failed(tx, &err.message).await {
            tracing::error!(
                transaction_id = %tx.id,
                error = %e,
                "Failed to mark transaction TOKEN_AWARD_FAILED"
            );
        }

        Err(WebhookError::TokenAwardFailed {
            message: err.message,
            transaction_id: tx.id.to_string(),
        })
    }
}
