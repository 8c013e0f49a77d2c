//! invoice.payment_succeeded - records a subscription renewal and credits
//! the plan's tokens. The invoice that opens a subscription is paid through
//! checkout and is acknowledged without a ledger entry.

use crate::domain::foundation::{DomainError, WalletId};
use crate::domain::ledger::{NewPaymentTransaction, PaymentStatus};
use crate::domain::subscription::UserSubscription;
use crate::domain::webhook::{Invoice, WebhookConfirmation, WebhookError};

use super::GatewayWebhookHandler;

impl GatewayWebhookHandler {
    pub(super) async fn handle_invoice_succeeded(
        &self,
        invoice: &Invoice,
    ) -> Result<WebhookConfirmation, WebhookError> {
        if invoice.opens_subscription() {
            tracing::info!(
                invoice_id = %invoice.id,
                subscription_id = ?invoice.subscription_id,
                "First subscription invoice; checkout records and credits it"
            );
            return Ok(WebhookConfirmation::ignored());
        }

        let gateway = self.gateway.name();

        if let Some(existing) = self.ledger.find_by_gateway_id(gateway, &invoice.id).await? {
            if !existing.status.is_open() {
                tracing::info!(
                    invoice_id = %invoice.id,
                    transaction_id = %existing.id,
                    status = %existing.status,
                    "Invoice already recorded"
                );
                return Ok(WebhookConfirmation::already_processed(existing.id.to_string()));
            }
        }

        let (owner, wallet_id) = self.resolve_invoice_owner(invoice).await?;
        let tokens = self.tokens_for_invoice(invoice).await?;

        let new = NewPaymentTransaction::new(
            gateway,
            invoice.id.as_str(),
            owner.user_id.clone(),
            wallet_id,
            PaymentStatus::Processing,
            tokens,
        )
        .map_err(DomainError::from)?
        .with_metadata("amount_paid", invoice.amount_paid)
        .with_metadata("gateway_subscription_id", owner.gateway_subscription_id.clone());
        let new = match &invoice.currency {
            Some(currency) => new.with_metadata("currency", currency.clone()),
            None => new,
        };

        let ensured = self.ledger.ensure_transaction(new).await?;
        let tx = ensured.transaction().clone();
        let tx_id = tx.id.to_string();
        if !tx.status.is_open() {
            return Ok(WebhookConfirmation::already_processed(tx_id));
        }

        let Some(completed) = self.complete_transaction(&tx, &invoice.id).await? else {
            return Ok(WebhookConfirmation::already_processed(tx_id));
        };

        // The payment is recorded; subscription refresh runs even if the
        // credit failed, and the credit error wins when both fail.
        let credited = self.credit_tokens(&completed).await;
        let subscription_id = invoice
            .subscription_id
            .as_deref()
            .unwrap_or(&owner.gateway_subscription_id);
        let synced = self
            .sync_subscription_from_gateway(subscription_id, Some(tx_id.clone()))
            .await;

        credited?;
        synced?;
        Ok(WebhookConfirmation::processed(Some(tx_id)))
    }

    /// User subscription and wallet that an invoice belongs to.
    ///
    /// The invoice's own subscription id decides; the customer id is the
    /// fallback for invoices whose subscription is not tracked.
    pub(super) async fn resolve_invoice_owner(
        &self,
        invoice: &Invoice,
    ) -> Result<(UserSubscription, WalletId), WebhookError> {
        let tracked = match invoice.subscription_id.as_deref() {
            Some(subscription_id) => {
                self.subscriptions
                    .find_by_subscription_id(subscription_id)
                    .await?
            }
            None => None,
        };

        let owner = match tracked {
            Some(owner) => owner,
            None => self.find_owner_by_customer(invoice).await?,
        };

        let wallet_id = self
            .ledger
            .find_wallet(&owner.user_id, None)
            .await?
            .ok_or_else(|| {
                tracing::warn!(user_id = %owner.user_id, "No token wallet for user");
                WebhookError::missing_link(format!("No token wallet for user {}", owner.user_id))
            })?;

        Ok((owner, wallet_id))
    }

    async fn find_owner_by_customer(&self, invoice: &Invoice) -> Result<UserSubscription, WebhookError> {
        let customer_id = invoice.customer_id.as_deref().ok_or_else(|| {
            WebhookError::missing_link(format!("Invoice {} has no customer", invoice.id))
        })?;

        self.subscriptions
            .find_by_customer_id(customer_id)
            .await?
            .ok_or_else(|| {
                tracing::warn!(invoice_id = %invoice.id, customer_id, "No user subscription for invoice customer");
                WebhookError::missing_link(format!(
                    "No user subscription for customer {}",
                    customer_id
                ))
            })
    }

    /// Tokens granted by the plan of the invoice's first line; 0 when the
    /// price is not in the catalog.
    async fn tokens_for_invoice(&self, invoice: &Invoice) -> Result<i64, WebhookError> {
        let Some(price_id) = invoice.first_line_price_id() else {
            return Ok(0);
        };

        match self.catalog.find_by_price_id(price_id).await? {
            Some(plan) => Ok(plan.tokens()),
            None => {
                tracing::warn!(
                    invoice_id = %invoice.id,
                    price_id,
                    "Invoice price has no plan; recording renewal without tokens"
                );
                Ok(0)
            }
        }
    }
}
