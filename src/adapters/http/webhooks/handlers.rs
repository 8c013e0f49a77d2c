//! HTTP handlers for the webhook ingress.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Json, Path, State};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::application::handlers::ProcessWebhookCommand;
use crate::domain::webhook::WebhookError;

use super::dto::{ErrorResponse, WebhookResponse};
use super::registry::WebhookAdapterRegistry;

/// Shared state for the webhook routes.
#[derive(Clone)]
pub struct WebhookAppState {
    pub registry: Arc<WebhookAdapterRegistry>,
}

impl WebhookAppState {
    pub fn new(registry: WebhookAdapterRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }
}

/// `POST /webhooks/{source}`
pub async fn handle_webhook(
    State(state): State<WebhookAppState>,
    Path(source): Path<String>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, WebhookApiError> {
    if method != Method::POST {
        return Err(WebhookApiError::MethodNotAllowed);
    }

    let source = source.trim();
    if source.is_empty() {
        return Err(WebhookApiError::MissingSource);
    }

    let handler = state
        .registry
        .get(source)
        .ok_or_else(|| WebhookApiError::UnknownSource(source.to_string()))?;

    let signature = headers
        .get(handler.signature_header())
        .and_then(|v| v.to_str().ok())
        .map(String::from);

    let cmd = ProcessWebhookCommand {
        payload: body.to_vec(),
        signature,
    };

    let confirmation = handler.handle(cmd).await?;
    Ok(Json(WebhookResponse::from(confirmation)))
}

/// `/webhooks` and `/webhooks/` with no source segment.
pub async fn missing_source(method: Method) -> WebhookApiError {
    if method != Method::POST {
        WebhookApiError::MethodNotAllowed
    } else {
        WebhookApiError::MissingSource
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

/// Everything the ingress can answer with besides success.
#[derive(Debug)]
pub enum WebhookApiError {
    MethodNotAllowed,
    MissingSource,
    UnknownSource(String),
    Webhook(WebhookError),
}

impl From<WebhookError> for WebhookApiError {
    fn from(err: WebhookError) -> Self {
        Self::Webhook(err)
    }
}

impl IntoResponse for WebhookApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            WebhookApiError::MethodNotAllowed => (
                StatusCode::METHOD_NOT_ALLOWED,
                ErrorResponse::new("Method not allowed"),
            ),
            WebhookApiError::MissingSource => (
                StatusCode::BAD_REQUEST,
                ErrorResponse::new("Missing webhook source"),
            ),
            WebhookApiError::UnknownSource(source) => (
                StatusCode::NOT_FOUND,
                ErrorResponse::new(format!("Unknown webhook source: {}", source)),
            ),
            WebhookApiError::Webhook(err) => webhook_error_response(err),
        };

        (status, Json(body)).into_response()
    }
}

fn webhook_error_response(err: WebhookError) -> (StatusCode, ErrorResponse) {
    let transaction_id = err.transaction_id().map(String::from);

    let status = match &err {
        WebhookError::Internal(details) => {
            tracing::error!(error = %details, "Unexpected webhook failure");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse::new("Internal server error"),
            );
        }
        WebhookError::CriticalUpdateFailure { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        WebhookError::TransactionNotFound { .. } | WebhookError::MissingLink { .. } => {
            StatusCode::NOT_FOUND
        }
        WebhookError::Verification(_)
        | WebhookError::PlanNotFound { .. }
        | WebhookError::TokenAwardFailed { .. }
        | WebhookError::SubscriptionSyncFailed { .. }
        | WebhookError::GatewayError { .. }
        | WebhookError::CatalogSyncFailed { .. } => StatusCode::BAD_REQUEST,
    };

    (
        status,
        ErrorResponse::new(err.to_string()).with_transaction(transaction_id),
    )
}
