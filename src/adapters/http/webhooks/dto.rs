//! Response bodies for the webhook ingress.

use serde::Serialize;

use crate::domain::webhook::WebhookConfirmation;

/// Body returned once an event has been handled (or safely skipped).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
}

impl From<WebhookConfirmation> for WebhookResponse {
    fn from(confirmation: WebhookConfirmation) -> Self {
        Self {
            message: "Webhook processed".to_string(),
            transaction_id: confirmation.transaction_id,
        }
    }
}

/// Error body. `transactionId` is present when the failure concerns a
/// known ledger row so operators can reconcile it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            transaction_id: None,
        }
    }

    pub fn with_transaction(mut self, transaction_id: Option<String>) -> Self {
        self.transaction_id = transaction_id;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn success_body_uses_camel_case() {
        let body = WebhookResponse::from(WebhookConfirmation::processed(Some("tx-1".to_string())));
        assert_eq!(
            serde_json::to_value(body).unwrap(),
            json!({"message": "Webhook processed", "transactionId": "tx-1"})
        );
    }

    #[test]
    fn error_body_omits_missing_transaction() {
        let body = ErrorResponse::new("Missing source");
        assert_eq!(serde_json::to_value(body).unwrap(), json!({"error": "Missing source"}));
    }
}
