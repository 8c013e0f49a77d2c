//! SubscriptionSyncService - projects gateway subscriptions onto
//! `user_subscriptions`.

use serde_json::json;
use std::sync::Arc;

use crate::domain::foundation::{DomainError, PlanId};
use crate::domain::subscription::{
    SubscriptionStateUpdate, SubscriptionStatus, UserSubscription, UserSubscriptionUpsert,
};
use crate::domain::webhook::GatewaySubscription;
use crate::ports::{from_record, to_record, Conflict, Filter, RecordStore, Table};

#[derive(Clone)]
pub struct SubscriptionSyncService {
    store: Arc<dyn RecordStore>,
}

impl SubscriptionSyncService {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Subscription owned by a gateway customer.
    ///
    /// When a customer holds several, one that still grants access wins.
    pub async fn find_by_customer_id(
        &self,
        gateway_customer_id: &str,
    ) -> Result<Option<UserSubscription>, DomainError> {
        let subscriptions = self
            .find(&[Filter::eq("gateway_customer_id", gateway_customer_id)])
            .await?;

        let preferred = subscriptions
            .iter()
            .position(|s| s.status.has_access())
            .unwrap_or(0);
        Ok(subscriptions.into_iter().nth(preferred))
    }

    pub async fn find_by_subscription_id(
        &self,
        gateway_subscription_id: &str,
    ) -> Result<Option<UserSubscription>, DomainError> {
        Ok(self
            .find(&[Filter::eq("gateway_subscription_id", gateway_subscription_id)])
            .await?
            .into_iter()
            .next())
    }

    /// Creates or replaces the row for a gateway subscription.
    pub async fn upsert(
        &self,
        subscription: UserSubscriptionUpsert,
    ) -> Result<UserSubscription, DomainError> {
        let row = self
            .store
            .upsert(
                Table::UserSubscriptions,
                vec![to_record(&subscription)?],
                Conflict::update_on(&["gateway_subscription_id"]),
            )
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| DomainError::database("Subscription upsert returned no row"))?;

        let saved: UserSubscription = from_record(row)?;
        tracing::info!(
            user_id = %saved.user_id,
            gateway_subscription_id = %saved.gateway_subscription_id,
            status = %saved.status,
            "User subscription upserted"
        );
        Ok(saved)
    }

    /// Copies status, period, and cancel flag from the gateway onto the
    /// existing row. Returns `None` when no row tracks the subscription.
    pub async fn apply_gateway_state(
        &self,
        subscription: &GatewaySubscription,
        plan_id: Option<PlanId>,
    ) -> Result<Option<UserSubscription>, DomainError> {
        let update = SubscriptionStateUpdate {
            status: subscription.status.clone(),
            current_period_start: subscription.current_period_start,
            current_period_end: subscription.current_period_end,
            cancel_at_period_end: Some(subscription.cancel_at_period_end),
            plan_id,
        };
        self.apply(&subscription.id, update).await
    }

    /// Marks the subscription as ended at the gateway.
    pub async fn mark_canceled(
        &self,
        gateway_subscription_id: &str,
    ) -> Result<Option<UserSubscription>, DomainError> {
        let mut update = SubscriptionStateUpdate::status_only(SubscriptionStatus::Canceled);
        update.cancel_at_period_end = Some(false);
        self.apply(gateway_subscription_id, update).await
    }

    async fn apply(
        &self,
        gateway_subscription_id: &str,
        update: SubscriptionStateUpdate,
    ) -> Result<Option<UserSubscription>, DomainError> {
        let updated = self
            .store
            .update(
                Table::UserSubscriptions,
                to_record(&update)?,
                &[Filter::eq("gateway_subscription_id", json!(gateway_subscription_id))],
            )
            .await?;

        let Some(row) = updated.into_iter().next() else {
            return Ok(None);
        };
        let saved: UserSubscription = from_record(row)?;
        tracing::info!(
            gateway_subscription_id,
            status = %saved.status,
            cancel_at_period_end = saved.cancel_at_period_end,
            "User subscription updated"
        );
        Ok(Some(saved))
    }

    async fn find(&self, filters: &[Filter]) -> Result<Vec<UserSubscription>, DomainError> {
        self.store
            .find(Table::UserSubscriptions, filters)
            .await?
            .into_iter()
            .map(from_record::<UserSubscription>)
            .collect()
    }
}
