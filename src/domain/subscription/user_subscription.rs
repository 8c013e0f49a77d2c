//! User subscription rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::foundation::{PlanId, UserId};

use super::SubscriptionStatus;

/// A persisted user subscription, one per gateway subscription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSubscription {
    pub id: Uuid,
    pub user_id: UserId,
    #[serde(default)]
    pub gateway_customer_id: Option<String>,
    pub gateway_subscription_id: String,
    #[serde(default)]
    pub plan_id: Option<PlanId>,
    pub status: SubscriptionStatus,
    #[serde(default)]
    pub current_period_start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub current_period_end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub cancel_at_period_end: bool,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Upsert payload keyed by `gateway_subscription_id`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserSubscriptionUpsert {
    pub user_id: UserId,
    pub gateway_customer_id: String,
    pub gateway_subscription_id: String,
    pub plan_id: PlanId,
    pub status: SubscriptionStatus,
    pub current_period_start: Option<DateTime<Utc>>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub cancel_at_period_end: bool,
}

/// Partial update applied on lifecycle and invoice events.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubscriptionStateUpdate {
    pub status: SubscriptionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_period_start: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_period_end: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancel_at_period_end: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<PlanId>,
}

impl SubscriptionStateUpdate {
    /// Status-only change, leaving period and plan untouched.
    pub fn status_only(status: SubscriptionStatus) -> Self {
        Self {
            status,
            current_period_start: None,
            current_period_end: None,
            cancel_at_period_end: None,
            plan_id: None,
        }
    }
}
