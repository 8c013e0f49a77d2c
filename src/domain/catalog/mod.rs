//! Catalog module - internal mirror of gateway products and prices.

mod description;
mod plan;

pub use description::PlanDescription;
pub use plan::{
    metadata_value, resolve_tokens_awarded, PlanType, PlanUpsert, SubscriptionPlan,
    ITEM_ID_METADATA_KEY, TOKENS_METADATA_KEY,
};
