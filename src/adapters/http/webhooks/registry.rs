//! Lookup from the `{source}` path segment to the handler for that gateway.

use std::collections::HashMap;
use std::sync::Arc;

use crate::application::handlers::GatewayWebhookHandler;

/// Registered webhook sources. Built once at startup and read-only after.
#[derive(Clone, Default)]
pub struct WebhookAdapterRegistry {
    adapters: HashMap<String, Arc<GatewayWebhookHandler>>,
}

impl WebhookAdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler under its gateway name (`stripe`, ...).
    pub fn with_handler(mut self, handler: GatewayWebhookHandler) -> Self {
        let source = handler.gateway_name().to_ascii_lowercase();
        self.adapters.insert(source, Arc::new(handler));
        self
    }

    /// Case-insensitive lookup.
    pub fn get(&self, source: &str) -> Option<Arc<GatewayWebhookHandler>> {
        self.adapters.get(&source.to_ascii_lowercase()).cloned()
    }

    pub fn sources(&self) -> Vec<&str> {
        let mut sources: Vec<&str> = self.adapters.keys().map(String::as_str).collect();
        sources.sort_unstable();
        sources
    }
}

impl std::fmt::Debug for WebhookAdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookAdapterRegistry")
            .field("sources", &self.sources())
            .finish()
    }
}
