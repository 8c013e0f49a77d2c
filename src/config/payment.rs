//! Payment gateway configuration (Stripe)

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::error::ValidationError;

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfig {
    /// Stripe secret key (`sk_test_...` / `sk_live_...`)
    pub stripe_api_key: SecretString,

    /// Stripe webhook signing secret (`whsec_...`)
    pub stripe_webhook_secret: SecretString,

    /// Override for the Stripe REST base URL
    #[serde(default)]
    pub stripe_api_base_url: Option<String>,

    /// Reject events whose `livemode` is false
    #[serde(default)]
    pub require_livemode: bool,

    /// Price id of the free plan, never deactivated by product deletion
    #[serde(default = "default_free_plan_price_id")]
    pub free_plan_price_id: String,
}

impl PaymentConfig {
    pub fn is_test_mode(&self) -> bool {
        self.stripe_api_key.expose_secret().starts_with("sk_test_")
    }

    pub fn is_live_mode(&self) -> bool {
        self.stripe_api_key.expose_secret().starts_with("sk_live_")
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let api_key = self.stripe_api_key.expose_secret();
        let webhook_secret = self.stripe_webhook_secret.expose_secret();

        if api_key.is_empty() {
            return Err(ValidationError::MissingRequired("PAYMENT__STRIPE_API_KEY"));
        }
        if webhook_secret.is_empty() {
            return Err(ValidationError::MissingRequired(
                "PAYMENT__STRIPE_WEBHOOK_SECRET",
            ));
        }
        // Restricted keys (rk_) can read subscriptions, products and prices.
        if !api_key.starts_with("sk_") && !api_key.starts_with("rk_") {
            return Err(ValidationError::InvalidStripeKey);
        }
        if !webhook_secret.starts_with("whsec_") {
            return Err(ValidationError::InvalidStripeWebhookSecret);
        }
        if self.require_livemode && self.is_test_mode() {
            return Err(ValidationError::LiveKeyRequired);
        }
        Ok(())
    }
}

fn default_free_plan_price_id() -> String {
    "price_FREE".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(api_key: &str, webhook_secret: &str) -> PaymentConfig {
        PaymentConfig {
            stripe_api_key: SecretString::new(api_key.to_string()),
            stripe_webhook_secret: SecretString::new(webhook_secret.to_string()),
            stripe_api_base_url: None,
            require_livemode: false,
            free_plan_price_id: default_free_plan_price_id(),
        }
    }

    #[test]
    fn test_mode_detection() {
        assert!(config("sk_test_xxx", "whsec_xxx").is_test_mode());
        assert!(config("sk_live_xxx", "whsec_xxx").is_live_mode());
    }

    #[test]
    fn test_validation_missing_values() {
        assert_eq!(
            config("", "whsec_xxx").validate(),
            Err(ValidationError::MissingRequired("PAYMENT__STRIPE_API_KEY"))
        );
        assert_eq!(
            config("sk_test_xxx", "").validate(),
            Err(ValidationError::MissingRequired("PAYMENT__STRIPE_WEBHOOK_SECRET"))
        );
    }

    #[test]
    fn test_validation_key_prefixes() {
        assert_eq!(
            config("pk_test_xxx", "whsec_xxx").validate(),
            Err(ValidationError::InvalidStripeKey)
        );
        assert_eq!(
            config("sk_test_xxx", "secret_xxx").validate(),
            Err(ValidationError::InvalidStripeWebhookSecret)
        );
        assert!(config("rk_live_xxx", "whsec_xxx").validate().is_ok());
    }

    #[test]
    fn test_livemode_needs_live_key() {
        let mut cfg = config("sk_test_xxx", "whsec_xxx");
        cfg.require_livemode = true;
        assert_eq!(cfg.validate(), Err(ValidationError::LiveKeyRequired));

        let mut cfg = config("sk_live_xxx", "whsec_xxx");
        cfg.require_livemode = true;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_secrets_are_redacted_in_debug() {
        let debug = format!("{:?}", config("sk_test_topsecret", "whsec_xxx"));
        assert!(!debug.contains("topsecret"));
    }
}
