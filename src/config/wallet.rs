//! Token wallet service configuration

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::error::ValidationError;
use super::server::Environment;

#[derive(Debug, Clone, Deserialize)]
pub struct WalletConfig {
    /// Base URL of the wallet service API
    pub base_url: String,

    /// Bearer key for the wallet service
    pub api_key: SecretString,
}

impl WalletConfig {
    pub fn validate(&self, environment: &Environment) -> Result<(), ValidationError> {
        if self.base_url.is_empty() {
            return Err(ValidationError::MissingRequired("WALLET__BASE_URL"));
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(ValidationError::InvalidWalletUrl);
        }
        if *environment == Environment::Production && !self.base_url.starts_with("https://") {
            return Err(ValidationError::WalletUrlMustBeHttps);
        }
        if self.api_key.expose_secret().is_empty() {
            return Err(ValidationError::MissingRequired("WALLET__API_KEY"));
        }
        Ok(())
    }
}
