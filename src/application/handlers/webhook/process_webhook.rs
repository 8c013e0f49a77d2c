//! GatewayWebhookHandler - verifies a gateway webhook and routes it to the
//! handler for its event kind.

use std::sync::Arc;

use crate::application::services::{CatalogSyncService, LedgerService, SubscriptionSyncService};
use crate::domain::webhook::{GatewayEventKind, WebhookConfirmation, WebhookError, WebhookEvent};
use crate::ports::PaymentGateway;

/// Command to process one webhook delivery.
#[derive(Debug, Clone)]
pub struct ProcessWebhookCommand {
    /// Raw request body, unmodified.
    pub payload: Vec<u8>,
    /// Value of the gateway's signature header, if present.
    pub signature: Option<String>,
}

/// Webhook processing for one payment gateway.
///
/// Verification happens before anything else; an event that fails it never
/// reaches a handler. Each event kind has one handler, and every handler is
/// safe to run again for a redelivered event.
pub struct GatewayWebhookHandler {
    pub(super) gateway: Arc<dyn PaymentGateway>,
    pub(super) ledger: LedgerService,
    pub(super) catalog: CatalogSyncService,
    pub(super) subscriptions: SubscriptionSyncService,
}

impl GatewayWebhookHandler {
    pub fn new(
        gateway: Arc<dyn PaymentGateway>,
        ledger: LedgerService,
        catalog: CatalogSyncService,
        subscriptions: SubscriptionSyncService,
    ) -> Self {
        Self {
            gateway,
            ledger,
            catalog,
            subscriptions,
        }
    }

    pub fn gateway_name(&self) -> &str {
        self.gateway.name()
    }

    /// Request header the gateway signs webhooks with.
    pub fn signature_header(&self) -> &str {
        self.gateway.signature_header()
    }

    pub async fn verify_and_parse(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> Result<WebhookEvent, WebhookError> {
        self.gateway
            .verify_and_parse(payload, signature)
            .await
            .map_err(|e| {
                tracing::warn!(
                    gateway = self.gateway.name(),
                    error = %e,
                    "Webhook verification failed"
                );
                WebhookError::from(e)
            })
    }

    /// Runs the handler for a verified event.
    pub async fn dispatch(&self, event: &WebhookEvent) -> Result<WebhookConfirmation, WebhookError> {
        tracing::info!(
            gateway = self.gateway.name(),
            event_id = %event.id,
            event_type = %event.event_type,
            "Processing webhook event"
        );

        let result = match &event.kind {
            GatewayEventKind::CheckoutCompleted(session) => {
                self.handle_checkout_completed(session).await
            }
            GatewayEventKind::InvoicePaymentSucceeded(invoice) => {
                self.handle_invoice_succeeded(invoice).await
            }
            GatewayEventKind::InvoicePaymentFailed(invoice) => {
                self.handle_invoice_failed(invoice).await
            }
            GatewayEventKind::SubscriptionCreated(subscription)
            | GatewayEventKind::SubscriptionUpdated(subscription) => {
                self.handle_subscription_changed(subscription).await
            }
            GatewayEventKind::SubscriptionDeleted(subscription) => {
                self.handle_subscription_deleted(subscription).await
            }
            GatewayEventKind::ProductCreated(product) => self.handle_product_created(product).await,
            GatewayEventKind::ProductUpdated(product) => self.handle_product_updated(product).await,
            GatewayEventKind::ProductDeleted(product) => self.handle_product_deleted(product).await,
            GatewayEventKind::PriceCreated(price) | GatewayEventKind::PriceUpdated(price) => {
                self.handle_price_changed(price).await
            }
            GatewayEventKind::PriceDeleted(price) => self.handle_price_deleted(price).await,
            GatewayEventKind::Unknown => {
                tracing::debug!(event_type = %event.event_type, "Ignoring unhandled event type");
                Ok(WebhookConfirmation::ignored())
            }
        };

        match &result {
            Ok(confirmation) => tracing::info!(
                event_id = %event.id,
                outcome = ?confirmation.outcome,
                transaction_id = ?confirmation.transaction_id,
                "Webhook event handled"
            ),
            Err(err) => tracing::error!(
                event_id = %event.id,
                event_type = %event.event_type,
                transaction_id = ?err.transaction_id(),
                error = %err,
                "Webhook event failed"
            ),
        }
        result
    }

    pub async fn handle(
        &self,
        cmd: ProcessWebhookCommand,
    ) -> Result<WebhookConfirmation, WebhookError> {
        let event = self
            .verify_and_parse(&cmd.payload, cmd.signature.as_deref())
            .await?;
        self.dispatch(&event).await
    }
}
