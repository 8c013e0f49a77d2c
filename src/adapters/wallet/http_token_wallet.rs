//! HTTP client for the token wallet service.
//!
//! # Configuration
//!
//! ```ignore
//! let config = WalletServiceConfig::new("https://wallet.internal", api_key);
//! let wallet = HttpTokenWalletService::new(config);
//! ```

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::domain::foundation::{DomainError, ErrorCode, UserId, WalletId};
use crate::domain::ledger::TokenWalletCredit;
use crate::ports::{TokenWalletService, WalletTransactionReceipt};

/// Connection settings for the wallet service.
#[derive(Clone)]
pub struct WalletServiceConfig {
    base_url: String,
    api_key: SecretString,
}

impl WalletServiceConfig {
    pub fn new(base_url: impl Into<String>, api_key: SecretString) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }
}

/// `TokenWalletService` backed by the wallet service's REST API.
pub struct HttpTokenWalletService {
    config: WalletServiceConfig,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct WalletSummary {
    id: WalletId,
}

/// The lookup endpoint answers with either one wallet or a list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WalletLookupResponse {
    List(Vec<WalletSummary>),
    Single(WalletSummary),
}

impl WalletLookupResponse {
    fn into_wallet_id(self) -> Option<WalletId> {
        match self {
            WalletLookupResponse::List(wallets) => wallets.into_iter().next().map(|w| w.id),
            WalletLookupResponse::Single(wallet) => Some(wallet.id),
        }
    }
}

impl HttpTokenWalletService {
    pub fn new(config: WalletServiceConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }

    fn wallets_url(&self) -> String {
        format!("{}/wallets", self.config.base_url)
    }

    fn transactions_url(&self) -> String {
        format!("{}/wallets/transactions", self.config.base_url)
    }
}

fn network_error(err: reqwest::Error) -> DomainError {
    DomainError::new(
        ErrorCode::ExternalServiceError,
        format!("Wallet service unreachable: {}", err),
    )
}

async fn service_error(response: Response) -> DomainError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let code = match status {
        StatusCode::NOT_FOUND => ErrorCode::NotFound,
        StatusCode::CONFLICT => ErrorCode::Conflict,
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => ErrorCode::ValidationFailed,
        _ => ErrorCode::ExternalServiceError,
    };

    DomainError::new(code, format!("Wallet service returned {}: {}", status, body))
        .with_detail("status", status.as_u16().to_string())
}

#[async_trait]
impl TokenWalletService for HttpTokenWalletService {
    async fn find_wallet(
        &self,
        user_id: &UserId,
        organization_id: Option<&str>,
    ) -> Result<Option<WalletId>, DomainError> {
        let mut query = vec![("user_id", user_id.as_str())];
        if let Some(org) = organization_id {
            query.push(("organization_id", org));
        }

        let response = self
            .client
            .get(self.wallets_url())
            .bearer_auth(self.config.api_key.expose_secret())
            .query(&query)
            .send()
            .await
            .map_err(network_error)?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(service_error(response).await);
        }

        let lookup: WalletLookupResponse = response.json().await.map_err(|e| {
            DomainError::new(
                ErrorCode::SerializationError,
                format!("Unexpected wallet lookup response: {}", e),
            )
        })?;
        Ok(lookup.into_wallet_id())
    }

    async fn record_transaction(
        &self,
        credit: &TokenWalletCredit,
    ) -> Result<WalletTransactionReceipt, DomainError> {
        let response = self
            .client
            .post(self.transactions_url())
            .bearer_auth(self.config.api_key.expose_secret())
            .json(credit)
            .send()
            .await
            .map_err(network_error)?;

        if !response.status().is_success() {
            let err = service_error(response).await;
            tracing::warn!(
                wallet_id = %credit.wallet_id,
                related_entity_id = %credit.related_entity_id,
                error = %err,
                "Wallet service rejected credit"
            );
            return Err(err);
        }

        response.json().await.map_err(|e| {
            DomainError::new(
                ErrorCode::SerializationError,
                format!("Unexpected wallet transaction response: {}", e),
            )
        })
    }
}
