//! Subscription plan catalog entries.
//!
//! One plan per gateway price. Deletion at the gateway flips `active` to
//! false; rows are never removed so historical subscriptions keep resolving.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::domain::foundation::PlanId;

use super::PlanDescription;

/// Metadata key carrying the number of tokens a plan awards.
pub const TOKENS_METADATA_KEY: &str = "tokens_to_award";

/// Metadata key carrying the internal business SKU.
pub const ITEM_ID_METADATA_KEY: &str = "item_id";

/// Whether a plan bills once or recurs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanType {
    Subscription,
    OneTimePurchase,
}

impl PlanType {
    /// Derives the plan type from the price's recurring flag.
    pub fn from_recurring(is_recurring: bool) -> Self {
        if is_recurring {
            PlanType::Subscription
        } else {
            PlanType::OneTimePurchase
        }
    }
}

/// A persisted catalog plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionPlan {
    pub id: PlanId,
    pub gateway_product_id: String,
    pub gateway_price_id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<PlanDescription>,
    /// Unit amount in minor currency units.
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub interval: Option<String>,
    #[serde(default)]
    pub interval_count: Option<i32>,
    pub plan_type: PlanType,
    pub active: bool,
    #[serde(default)]
    pub tokens_awarded: Option<i64>,
    #[serde(default)]
    pub item_id_internal: Option<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl SubscriptionPlan {
    /// Tokens to credit for one purchase of this plan; unset means none.
    pub fn tokens(&self) -> i64 {
        self.tokens_awarded.unwrap_or(0).max(0)
    }
}

/// Upsert payload for a plan, keyed by `gateway_price_id`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanUpsert {
    pub gateway_product_id: String,
    pub gateway_price_id: String,
    pub name: String,
    pub description: PlanDescription,
    pub amount: Option<i64>,
    pub currency: Option<String>,
    pub interval: Option<String>,
    pub interval_count: Option<i32>,
    pub plan_type: PlanType,
    pub active: bool,
    pub tokens_awarded: Option<i64>,
    pub item_id_internal: Option<String>,
    pub metadata: Map<String, Value>,
}

/// Looks up a metadata value, price-level taking precedence over product-level.
pub fn metadata_value<'a>(
    price_metadata: &'a HashMap<String, String>,
    product_metadata: &'a HashMap<String, String>,
    key: &str,
) -> Option<&'a str> {
    price_metadata
        .get(key)
        .or_else(|| product_metadata.get(key))
        .map(String::as_str)
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Resolves `tokens_awarded` from metadata. Unparsable values yield `None`.
pub fn resolve_tokens_awarded(
    price_metadata: &HashMap<String, String>,
    product_metadata: &HashMap<String, String>,
) -> Option<i64> {
    metadata_value(price_metadata, product_metadata, TOKENS_METADATA_KEY)
        .and_then(|raw| raw.parse::<i64>().ok())
        .filter(|tokens| *tokens >= 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn meta(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn price_metadata_wins_over_product_metadata() {
        let price = meta(&[("tokens_to_award", "500")]);
        let product = meta(&[("tokens_to_award", "100")]);
        assert_eq!(resolve_tokens_awarded(&price, &product), Some(500));
    }

    #[test]
    fn product_metadata_used_when_price_has_none() {
        let product = meta(&[("tokens_to_award", "100")]);
        assert_eq!(resolve_tokens_awarded(&HashMap::new(), &product), Some(100));
    }

    #[test]
    fn unparsable_or_negative_tokens_are_ignored() {
        assert_eq!(
            resolve_tokens_awarded(&meta(&[("tokens_to_award", "lots")]), &HashMap::new()),
            None
        );
        assert_eq!(
            resolve_tokens_awarded(&meta(&[("tokens_to_award", "-3")]), &HashMap::new()),
            None
        );
    }

    #[test]
    fn plan_type_follows_recurring_flag() {
        assert_eq!(PlanType::from_recurring(true), PlanType::Subscription);
        assert_eq!(PlanType::from_recurring(false), PlanType::OneTimePurchase);
        assert_eq!(
            serde_json::to_value(PlanType::OneTimePurchase).unwrap(),
            json!("one_time_purchase")
        );
    }

    #[test]
    fn plan_deserializes_with_sparse_row() {
        let id = PlanId::new();
        let plan: SubscriptionPlan = serde_json::from_value(json!({
            "id": id.to_string(),
            "gateway_product_id": "prod_1",
            "gateway_price_id": "price_1",
            "name": "Pro",
            "plan_type": "subscription",
            "active": true
        }))
        .unwrap();

        assert_eq!(plan.id, id);
        assert_eq!(plan.tokens(), 0);
        assert!(plan.description.is_none());
    }
}
