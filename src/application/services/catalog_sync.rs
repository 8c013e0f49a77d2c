//! CatalogSyncService - projects gateway products and prices into plans.

use serde_json::{json, Map, Value};
use std::sync::Arc;

use crate::domain::catalog::{
    metadata_value, resolve_tokens_awarded, PlanDescription, PlanType, PlanUpsert,
    SubscriptionPlan, ITEM_ID_METADATA_KEY,
};
use crate::domain::foundation::{DomainError, PlanId};
use crate::domain::webhook::{GatewayPrice, GatewayProduct};
use crate::ports::{from_record, to_record, Conflict, Filter, Record, RecordStore, Table};

/// Sole writer of `subscription_plans`.
#[derive(Clone)]
pub struct CatalogSyncService {
    store: Arc<dyn RecordStore>,
    free_plan_price_id: String,
}

impl CatalogSyncService {
    pub fn new(store: Arc<dyn RecordStore>, free_plan_price_id: impl Into<String>) -> Self {
        Self {
            store,
            free_plan_price_id: free_plan_price_id.into(),
        }
    }

    pub async fn find_by_id(&self, id: &PlanId) -> Result<Option<SubscriptionPlan>, DomainError> {
        self.find_one(&[Filter::eq("id", id.to_string())]).await
    }

    pub async fn find_by_price_id(
        &self,
        gateway_price_id: &str,
    ) -> Result<Option<SubscriptionPlan>, DomainError> {
        self.find_one(&[Filter::eq("gateway_price_id", gateway_price_id)])
            .await
    }

    /// First active plan carrying the internal item id.
    pub async fn find_by_item_id(
        &self,
        item_id: &str,
    ) -> Result<Option<SubscriptionPlan>, DomainError> {
        self.find_one(&[
            Filter::eq("item_id_internal", item_id),
            Filter::eq("active", true),
        ])
        .await
    }

    /// Creates or refreshes the plan for one price of a product.
    ///
    /// Keyed by gateway price id, so repeating the same event rewrites the
    /// same row with the same values.
    pub async fn upsert_plan(
        &self,
        product: &GatewayProduct,
        price: &GatewayPrice,
    ) -> Result<SubscriptionPlan, DomainError> {
        let plan = build_plan(product, price);
        let row = self
            .store
            .upsert(
                Table::SubscriptionPlans,
                vec![to_record(&plan)?],
                Conflict::update_on(&["gateway_price_id"]),
            )
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| DomainError::database("Plan upsert returned no row"))?;

        let plan: SubscriptionPlan = from_record(row)?;
        tracing::info!(
            plan_id = %plan.id,
            gateway_price_id = %plan.gateway_price_id,
            active = plan.active,
            tokens_awarded = ?plan.tokens_awarded,
            "Subscription plan upserted"
        );
        Ok(plan)
    }

    /// Applies product-level changes to every plan of the product.
    ///
    /// Name and description always follow the product. An archived product
    /// deactivates its plans; reactivation arrives per price.
    pub async fn refresh_product(
        &self,
        product: &GatewayProduct,
    ) -> Result<Vec<SubscriptionPlan>, DomainError> {
        let description = PlanDescription::parse(product.description.as_deref(), &product.name);

        let mut changes = Record::new();
        changes.insert("name".to_string(), json!(product.name));
        changes.insert("description".to_string(), serde_json::to_value(&description)?);
        if !product.active {
            changes.insert("active".to_string(), json!(false));
        }

        let plans = self
            .update_plans(changes, &[Filter::eq("gateway_product_id", product.id.as_str())])
            .await?;
        tracing::info!(
            gateway_product_id = %product.id,
            plans = plans.len(),
            "Product refreshed on subscription plans"
        );
        Ok(plans)
    }

    /// Deactivates the plan for one price. Other columns are left as-is.
    pub async fn deactivate_price(
        &self,
        gateway_price_id: &str,
    ) -> Result<Vec<SubscriptionPlan>, DomainError> {
        let plans = self
            .update_plans(
                inactive(),
                &[Filter::eq("gateway_price_id", gateway_price_id)],
            )
            .await?;
        tracing::info!(gateway_price_id, plans = plans.len(), "Price plan deactivated");
        Ok(plans)
    }

    /// Deactivates every plan of a product except the reserved free plan.
    pub async fn deactivate_product(
        &self,
        gateway_product_id: &str,
    ) -> Result<Vec<SubscriptionPlan>, DomainError> {
        let plans = self
            .update_plans(
                inactive(),
                &[
                    Filter::eq("gateway_product_id", gateway_product_id),
                    Filter::not_eq("gateway_price_id", self.free_plan_price_id.as_str()),
                ],
            )
            .await?;
        tracing::info!(
            gateway_product_id,
            plans = plans.len(),
            "Product plans deactivated"
        );
        Ok(plans)
    }

    async fn update_plans(
        &self,
        changes: Record,
        filters: &[Filter],
    ) -> Result<Vec<SubscriptionPlan>, DomainError> {
        self.store
            .update(Table::SubscriptionPlans, changes, filters)
            .await?
            .into_iter()
            .map(from_record::<SubscriptionPlan>)
            .collect()
    }

    async fn find_one(&self, filters: &[Filter]) -> Result<Option<SubscriptionPlan>, DomainError> {
        self.store
            .find(Table::SubscriptionPlans, filters)
            .await?
            .into_iter()
            .next()
            .map(from_record::<SubscriptionPlan>)
            .transpose()
    }
}

fn inactive() -> Record {
    let mut changes = Record::new();
    changes.insert("active".to_string(), json!(false));
    changes
}

fn build_plan(product: &GatewayProduct, price: &GatewayPrice) -> PlanUpsert {
    let mut metadata = Map::new();
    for (key, value) in product.metadata.iter().chain(price.metadata.iter()) {
        metadata.insert(key.clone(), Value::String(value.clone()));
    }

    PlanUpsert {
        gateway_product_id: product.id.clone(),
        gateway_price_id: price.id.clone(),
        name: product.name.clone(),
        description: PlanDescription::parse(product.description.as_deref(), &product.name),
        amount: price.unit_amount,
        currency: price.currency.clone(),
        interval: price.recurring.as_ref().map(|r| r.interval.clone()),
        interval_count: price.recurring.as_ref().map(|r| r.interval_count),
        plan_type: PlanType::from_recurring(price.is_recurring()),
        active: product.active && price.active,
        tokens_awarded: resolve_tokens_awarded(&price.metadata, &product.metadata),
        item_id_internal: metadata_value(&price.metadata, &product.metadata, ITEM_ID_METADATA_KEY)
            .map(str::to_string),
        metadata,
    }
}
