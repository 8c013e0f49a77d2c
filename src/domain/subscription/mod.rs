//! Subscription module - user subscription lifecycle state.

mod status;
mod user_subscription;

pub use status::SubscriptionStatus;
pub use user_subscription::{SubscriptionStateUpdate, UserSubscription, UserSubscriptionUpsert};
