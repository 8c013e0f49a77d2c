//! HTTP adapter for gateway webhooks.
//!
//! - `POST /webhooks/{source}` - Verify, then process one gateway event
//!
//! The `{source}` segment selects the gateway handler from the
//! `WebhookAdapterRegistry`. The raw body is handed to the gateway untouched
//! so its signature can be checked.

mod cors;
mod dto;
mod handlers;
mod registry;
mod routes;

pub use cors::{cors_middleware, CorsPolicy};
pub use dto::{ErrorResponse, WebhookResponse};
pub use handlers::{handle_webhook, missing_source, WebhookApiError, WebhookAppState};
pub use registry::WebhookAdapterRegistry;
pub use routes::{webhook_router, webhook_routes};
