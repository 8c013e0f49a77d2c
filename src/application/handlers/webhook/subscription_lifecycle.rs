//! customer.subscription.* - keeps `user_subscriptions` in step with the
//! gateway.

use crate::domain::foundation::{DomainError, PlanId};
use crate::domain::subscription::UserSubscription;
use crate::domain::webhook::{GatewaySubscription, WebhookConfirmation, WebhookError};

use super::GatewayWebhookHandler;

impl GatewayWebhookHandler {
    /// created / updated: refresh the tracked row. Rows are created by
    /// checkout, so an untracked subscription is acknowledged and skipped.
    pub(super) async fn handle_subscription_changed(
        &self,
        subscription: &GatewaySubscription,
    ) -> Result<WebhookConfirmation, WebhookError> {
        match self.apply_subscription_state(subscription, None).await? {
            Some(_) => Ok(WebhookConfirmation::processed(None)),
            None => {
                tracing::info!(
                    subscription_id = %subscription.id,
                    "Subscription not tracked yet; waiting for checkout"
                );
                Ok(WebhookConfirmation::ignored())
            }
        }
    }

    pub(super) async fn handle_subscription_deleted(
        &self,
        subscription: &GatewaySubscription,
    ) -> Result<WebhookConfirmation, WebhookError> {
        let canceled = self
            .subscriptions
            .mark_canceled(&subscription.id)
            .await
            .map_err(|e| WebhookError::SubscriptionSyncFailed {
                message: e.message,
                transaction_id: None,
            })?;

        match canceled {
            Some(_) => Ok(WebhookConfirmation::processed(None)),
            None => Ok(WebhookConfirmation::ignored()),
        }
    }

    /// Re-fetches a subscription and copies its state onto the tracked row.
    pub(super) async fn sync_subscription_from_gateway(
        &self,
        subscription_id: &str,
        transaction_id: Option<String>,
    ) -> Result<Option<UserSubscription>, WebhookError> {
        let subscription = self
            .gateway
            .fetch_subscription(subscription_id)
            .await
            .map_err(|e| {
                tracing::error!(
                    subscription_id,
                    transaction_id = ?transaction_id,
                    error = %e,
                    "Failed to fetch subscription from gateway"
                );
                WebhookError::gateway(e.message, transaction_id.clone())
            })?;

        self.apply_subscription_state(&subscription, transaction_id)
            .await
    }

    async fn apply_subscription_state(
        &self,
        subscription: &GatewaySubscription,
        transaction_id: Option<String>,
    ) -> Result<Option<UserSubscription>, WebhookError> {
        let sync_failed = |e: DomainError| {
            tracing::error!(
                subscription_id = %subscription.id,
                transaction_id = ?transaction_id,
                error = %e,
                "Failed to update user subscription"
            );
            WebhookError::SubscriptionSyncFailed {
                message: e.message,
                transaction_id: transaction_id.clone(),
            }
        };

        let plan_id = self.plan_for(subscription).await.map_err(sync_failed)?;
        self.subscriptions
            .apply_gateway_state(subscription, plan_id)
            .await
            .map_err(sync_failed)
    }

    async fn plan_for(&self, subscription: &GatewaySubscription) -> Result<Option<PlanId>, DomainError> {
        let Some(price_id) = subscription.primary_price_id() else {
            return Ok(None);
        };
        Ok(self.catalog.find_by_price_id(price_id).await?.map(|plan| plan.id))
    }
}
