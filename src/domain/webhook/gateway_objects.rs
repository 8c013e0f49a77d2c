//! Gateway-agnostic views of the objects a payment gateway reports.
//!
//! Adapters map their wire formats into these; handlers only ever see these.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::domain::subscription::SubscriptionStatus;

/// A subscription as the gateway currently knows it.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewaySubscription {
    pub id: String,
    pub customer_id: String,
    pub status: SubscriptionStatus,
    pub current_period_start: Option<DateTime<Utc>>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub cancel_at_period_end: bool,
    /// Price ids of the subscription items, in gateway order.
    pub price_ids: Vec<String>,
    pub metadata: HashMap<String, String>,
}

impl GatewaySubscription {
    /// Price of the first subscription item, which determines the plan.
    pub fn primary_price_id(&self) -> Option<&str> {
        self.price_ids.first().map(String::as_str)
    }
}

/// A product in the gateway catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayProduct {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub active: bool,
    pub default_price_id: Option<String>,
    pub metadata: HashMap<String, String>,
}

/// Billing cadence of a recurring price.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecurringInterval {
    pub interval: String,
    pub interval_count: i32,
}

/// A price in the gateway catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayPrice {
    pub id: String,
    pub product_id: String,
    pub active: bool,
    /// Unit amount in minor currency units.
    pub unit_amount: Option<i64>,
    pub currency: Option<String>,
    pub recurring: Option<RecurringInterval>,
    pub metadata: HashMap<String, String>,
}

impl GatewayPrice {
    pub fn is_recurring(&self) -> bool {
        self.recurring.is_some()
    }
}
