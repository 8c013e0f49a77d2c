//! invoice.payment_failed - records the failed attempt and mirrors the
//! subscription's new status.

use crate::domain::foundation::DomainError;
use crate::domain::ledger::{NewPaymentTransaction, PaymentStatus};
use crate::domain::webhook::{Invoice, WebhookConfirmation, WebhookError};

use super::GatewayWebhookHandler;

impl GatewayWebhookHandler {
    pub(super) async fn handle_invoice_failed(
        &self,
        invoice: &Invoice,
    ) -> Result<WebhookConfirmation, WebhookError> {
        let (owner, wallet_id) = self.resolve_invoice_owner(invoice).await?;

        let attempt = NewPaymentTransaction::new(
            self.gateway.name(),
            invoice.failed_attempt_key(),
            owner.user_id.clone(),
            wallet_id,
            PaymentStatus::Failed,
            0,
        )
        .map_err(DomainError::from)?
        .with_metadata("invoice_id", invoice.id.clone())
        .with_metadata("attempt_count", invoice.attempt_count)
        .with_metadata("gateway_subscription_id", owner.gateway_subscription_id.clone());

        let tx = self.ledger.record_failed_attempt(attempt).await?;
        let tx_id = tx.id.to_string();

        let subscription_id = invoice
            .subscription_id
            .as_deref()
            .unwrap_or(&owner.gateway_subscription_id);
        self.sync_subscription_from_gateway(subscription_id, Some(tx_id.clone()))
            .await?;

        Ok(WebhookConfirmation::processed(Some(tx_id)))
    }
}
