//! Successful webhook outcomes.

/// What a handler did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// State was changed.
    Processed,
    /// The event had already been applied; nothing was written.
    AlreadyProcessed,
    /// Valid event with nothing to do.
    Ignored,
}

/// Result of dispatching one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookConfirmation {
    pub outcome: WebhookOutcome,
    pub transaction_id: Option<String>,
}

impl WebhookConfirmation {
    pub fn processed(transaction_id: Option<String>) -> Self {
        Self {
            outcome: WebhookOutcome::Processed,
            transaction_id,
        }
    }

    pub fn already_processed(transaction_id: impl Into<String>) -> Self {
        Self {
            outcome: WebhookOutcome::AlreadyProcessed,
            transaction_id: Some(transaction_id.into()),
        }
    }

    pub fn ignored() -> Self {
        Self {
            outcome: WebhookOutcome::Ignored,
            transaction_id: None,
        }
    }

    pub fn with_transaction(mut self, transaction_id: impl Into<String>) -> Self {
        self.transaction_id = Some(transaction_id.into());
        self
    }
}
