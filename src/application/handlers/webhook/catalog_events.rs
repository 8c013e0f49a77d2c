//! product.* and price.* - projects the gateway catalog into
//! `subscription_plans`.

use crate::domain::foundation::DomainError;
use crate::domain::webhook::{GatewayPrice, GatewayProduct, WebhookConfirmation, WebhookError};

use super::GatewayWebhookHandler;

fn catalog_failed(e: DomainError) -> WebhookError {
    tracing::error!(error = %e, "Catalog write failed");
    WebhookError::CatalogSyncFailed { message: e.message }
}

impl GatewayWebhookHandler {
    pub(super) async fn handle_product_created(
        &self,
        product: &GatewayProduct,
    ) -> Result<WebhookConfirmation, WebhookError> {
        let Some(price_id) = product.default_price_id.as_deref() else {
            tracing::info!(product_id = %product.id, "Product has no default price; plans arrive with price events");
            return Ok(WebhookConfirmation::ignored());
        };

        let price = self.gateway.fetch_price(price_id).await.map_err(|e| {
            tracing::error!(product_id = %product.id, price_id, error = %e, "Failed to fetch default price");
            WebhookError::gateway(e.message, None)
        })?;

        self.catalog
            .upsert_plan(product, &price)
            .await
            .map_err(catalog_failed)?;
        Ok(WebhookConfirmation::processed(None))
    }

    pub(super) async fn handle_product_updated(
        &self,
        product: &GatewayProduct,
    ) -> Result<WebhookConfirmation, WebhookError> {
        self.catalog
            .refresh_product(product)
            .await
            .map_err(catalog_failed)?;
        Ok(WebhookConfirmation::processed(None))
    }

    pub(super) async fn handle_product_deleted(
        &self,
        product: &GatewayProduct,
    ) -> Result<WebhookConfirmation, WebhookError> {
        self.catalog
            .deactivate_product(&product.id)
            .await
            .map_err(catalog_failed)?;
        Ok(WebhookConfirmation::processed(None))
    }

    /// price.created / price.updated: one plan per price, keyed by price id.
    pub(super) async fn handle_price_changed(
        &self,
        price: &GatewayPrice,
    ) -> Result<WebhookConfirmation, WebhookError> {
        let product = self
            .gateway
            .fetch_product(&price.product_id)
            .await
            .map_err(|e| {
                tracing::error!(price_id = %price.id, product_id = %price.product_id, error = %e, "Failed to fetch product");
                WebhookError::gateway(e.message, None)
            })?;

        self.catalog
            .upsert_plan(&product, price)
            .await
            .map_err(catalog_failed)?;
        Ok(WebhookConfirmation::processed(None))
    }

    pub(super) async fn handle_price_deleted(
        &self,
        price: &GatewayPrice,
    ) -> Result<WebhookConfirmation, WebhookError> {
        self.catalog
            .deactivate_price(&price.id)
            .await
            .map_err(catalog_failed)?;
        Ok(WebhookConfirmation::processed(None))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use crate::adapters::stripe::MockPaymentGateway;
    use crate::domain::catalog::PlanType;
    use crate::domain::webhook::{WebhookError, WebhookOutcome};
    use crate::ports::{PaymentError, Table};
    use serde_json::{json, Value};

    fn price_object(id: &str, active: bool, recurring: bool) -> Value {
        json!({
            "id": id,
            "object": "price",
            "product": "prod_1",
            "active": active,
            "unit_amount": 1999,
            "currency": "usd",
            "recurring": if recurring { json!({"interval": "month", "interval_count": 1}) } else { Value::Null },
            "metadata": {"tokens_to_award": "250"}
        })
    }

    fn product_object(active: bool) -> Value {
        json!({
            "id": "prod_1",
            "object": "product",
            "name": "Pro",
            "description": "[\"Unlimited chats\"]",
            "active": active,
            "default_price": "price_monthly",
            "metadata": {}
        })
    }

    fn with_catalog(fx: &Fixture) {
        fx.gateway.add_product(product());
        fx.gateway.add_price(price("price_monthly", true));
    }

    #[tokio::test]
    async fn price_created_upserts_plan() {
        let fx = Fixture::new();
        with_catalog(&fx);

        fx.handle(MockPaymentGateway::event_payload("price.created", price_object("price_once", true, false)))
            .await
            .unwrap();

        let plans = fx.plans();
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].gateway_price_id, "price_once");
        assert_eq!(plans[0].plan_type, PlanType::OneTimePurchase);
        assert_eq!(plans[0].tokens_awarded, Some(250));
    }

    #[tokio::test]
    async fn repeated_price_event_does_not_duplicate() {
        let fx = Fixture::new();
        with_catalog(&fx);
        let payload = || MockPaymentGateway::event_payload("price.updated", price_object("price_monthly", true, true));

        fx.handle(payload()).await.unwrap();
        let before = fx.plans();
        fx.handle(payload()).await.unwrap();
        let after = fx.plans();

        assert_eq!(after.len(), 1);
        assert_eq!(after[0].id, before[0].id);
        assert_eq!(after[0].active, before[0].active);
        assert_eq!(after[0].tokens_awarded, before[0].tokens_awarded);
    }

    #[tokio::test]
    async fn product_created_uses_default_price() {
        let fx = Fixture::new();
        with_catalog(&fx);

        fx.handle(MockPaymentGateway::event_payload("product.created", product_object(true)))
            .await
            .unwrap();

        let plans = fx.plans();
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].gateway_price_id, "price_monthly");
        assert_eq!(plans[0].description.as_ref().unwrap().features, vec!["Unlimited chats"]);
        assert!(fx.gateway.was_called("fetch_price"));
    }

    #[tokio::test]
    async fn repeated_product_created_keeps_one_plan() {
        let fx = Fixture::new();
        with_catalog(&fx);
        let payload = || MockPaymentGateway::event_payload("product.created", product_object(true));

        fx.handle(payload()).await.unwrap();
        let before = fx.plans();
        fx.handle(payload()).await.unwrap();
        let after = fx.plans();

        assert_eq!(after.len(), 1);
        assert_eq!(after[0].id, before[0].id);
        assert_eq!(after[0].active, before[0].active);
        assert_eq!(after[0].tokens_awarded, before[0].tokens_awarded);
        assert_eq!(fx.gateway.call_count("fetch_price"), 2);
    }

    #[tokio::test]
    async fn product_without_default_price_is_ignored() {
        let fx = Fixture::new();
        let mut object = product_object(true);
        object["default_price"] = Value::Null;

        let confirmation = fx
            .handle(MockPaymentGateway::event_payload("product.created", object))
            .await
            .unwrap();

        assert_eq!(confirmation.outcome, WebhookOutcome::Ignored);
        assert!(fx.plans().is_empty());
    }

    #[tokio::test]
    async fn price_deleted_only_deactivates() {
        let fx = Fixture::new();
        let before = fx.seed_plan("price_monthly", Some(300)).await;

        fx.handle(MockPaymentGateway::event_payload("price.deleted", price_object("price_monthly", false, true)))
            .await
            .unwrap();

        let after = &fx.plans()[0];
        assert!(!after.active);
        assert_eq!(after.name, before.name);
        assert_eq!(after.amount, before.amount);
        assert_eq!(after.tokens_awarded, before.tokens_awarded);
    }

    #[tokio::test]
    async fn product_deleted_spares_free_plan() {
        let fx = Fixture::new();
        fx.seed_plan("price_monthly", None).await;
        fx.seed_plan(FREE_PRICE, None).await;

        fx.handle(MockPaymentGateway::event_payload("product.deleted", product_object(false)))
            .await
            .unwrap();

        let plans = fx.plans();
        let free = plans.iter().find(|p| p.gateway_price_id == FREE_PRICE).unwrap();
        let paid = plans.iter().find(|p| p.gateway_price_id == "price_monthly").unwrap();
        assert!(free.active);
        assert!(!paid.active);
    }

    #[tokio::test]
    async fn archived_product_deactivates_plans() {
        let fx = Fixture::new();
        fx.seed_plan("price_monthly", None).await;

        fx.handle(MockPaymentGateway::event_payload("product.updated", product_object(false)))
            .await
            .unwrap();

        assert!(!fx.plans()[0].active);
    }

    #[tokio::test]
    async fn product_fetch_failure_is_gateway_error() {
        let fx = Fixture::new();
        fx.gateway.set_method_error("fetch_product", PaymentError::network("timeout"));

        let err = fx
            .handle(MockPaymentGateway::event_payload("price.created", price_object("price_1", true, true)))
            .await
            .unwrap_err();

        assert!(matches!(err, WebhookError::GatewayError { .. }));
        assert_eq!(fx.store.mutation_count(), 0);
    }

    #[tokio::test]
    async fn catalog_write_failure_is_reported() {
        let fx = Fixture::new();
        with_catalog(&fx);
        fx.store.fail_writes_to(Table::SubscriptionPlans);

        let err = fx
            .handle(MockPaymentGateway::event_payload("price.created", price_object("price_1", true, true)))
            .await
            .unwrap_err();

        assert!(matches!(err, WebhookError::CatalogSyncFailed { .. }));
    }
}
