//! Checkout configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `MEDCART_BACKEND_URL` - Ordering backend GraphQL endpoint
//! - `MEDCART_BACKEND_TOKEN` - Backend API token (high entropy)
//! - `MEDCART_TAX_URL` - Tax calculation service endpoint
//! - `MEDCART_TAX_API_KEY` - Tax service API key
//! - `MEDCART_PAYMENT_URL` - Payment processing service endpoint
//! - `MEDCART_PAYMENT_API_KEY` - Payment service API key
//!
//! ## Optional
//! - `MEDCART_ADDRESS_URL` - Address autocomplete endpoint
//! - `MEDCART_ADDRESS_API_KEY` - Address autocomplete API key

use std::collections::HashMap;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Checkout engine configuration.
#[derive(Debug, Clone)]
pub struct CheckoutConfig {
    /// Ordering backend (GraphQL) configuration
    pub backend: BackendConfig,
    /// Tax calculation service configuration
    pub tax: TaxConfig,
    /// Payment processing service configuration
    pub payment: PaymentConfig,
    /// Address autocomplete configuration, if enabled
    pub address: Option<AddressConfig>,
}

/// Ordering backend configuration.
///
/// Implements `Debug` manually to redact the API token.
#[derive(Clone)]
pub struct BackendConfig {
    /// GraphQL endpoint URL
    pub endpoint: Url,
    /// API token (server-issued, per doctor account)
    pub api_token: SecretString,
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("endpoint", &self.endpoint.as_str())
            .field("api_token", &"[REDACTED]")
            .finish()
    }
}

/// Tax calculation service configuration.
#[derive(Clone)]
pub struct TaxConfig {
    pub endpoint: Url,
    pub api_key: SecretString,
}

impl std::fmt::Debug for TaxConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaxConfig")
            .field("endpoint", &self.endpoint.as_str())
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

/// Payment processing service configuration.
#[derive(Clone)]
pub struct PaymentConfig {
    pub endpoint: Url,
    pub api_key: SecretString,
}

impl std::fmt::Debug for PaymentConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentConfig")
            .field("endpoint", &self.endpoint.as_str())
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

/// Address autocomplete configuration.
#[derive(Clone)]
pub struct AddressConfig {
    pub endpoint: Url,
    pub api_key: Option<SecretString>,
}

impl std::fmt::Debug for AddressConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AddressConfig")
            .field("endpoint", &self.endpoint.as_str())
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl CheckoutConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Ok(Self {
            backend: BackendConfig {
                endpoint: get_url("MEDCART_BACKEND_URL")?,
                api_token: get_validated_secret("MEDCART_BACKEND_TOKEN")?,
            },
            tax: TaxConfig {
                endpoint: get_url("MEDCART_TAX_URL")?,
                api_key: get_validated_secret("MEDCART_TAX_API_KEY")?,
            },
            payment: PaymentConfig {
                endpoint: get_url("MEDCART_PAYMENT_URL")?,
                api_key: get_validated_secret("MEDCART_PAYMENT_API_KEY")?,
            },
            address: get_optional_env("MEDCART_ADDRESS_URL")
                .map(|raw| {
                    Ok(AddressConfig {
                        endpoint: parse_url("MEDCART_ADDRESS_URL", &raw)?,
                        api_key: get_optional_env("MEDCART_ADDRESS_API_KEY")
                            .map(SecretString::from),
                    })
                })
                .transpose()?,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get a required environment variable parsed as a URL.
fn get_url(key: &str) -> Result<Url, ConfigError> {
    let raw = get_required_env(key)?;
    parse_url(key, &raw)
}

fn parse_url(key: &str, raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw).map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    // Check blocklist
    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    // Check entropy (real secrets like API keys have high entropy)
    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_single_char() {
        // All same character = 0 entropy
        assert!((shannon_entropy("aaaaaaa") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        // "ab" has entropy of 1 bit per char (50% a, 50% b)
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_shannon_entropy_high() {
        // Random-looking string should have high entropy
        let entropy = shannon_entropy("aB3$xY9!mK2@nL5#");
        assert!(entropy > 3.3);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("your-api-key-here", "TEST_VAR");
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
    }

    #[test]
    fn test_validate_secret_strength_changeme() {
        let result = validate_secret_strength("changeme123", "TEST_VAR");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR");
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        // High-entropy random string
        let result = validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "TEST_VAR");
        assert!(result.is_ok());
    }

    #[test]
    fn test_backend_config_debug_redacts_token() {
        let config = BackendConfig {
            endpoint: Url::parse("https://api.medcart.test/graphql").unwrap(),
            api_token: SecretString::from("super_secret_api_token"),
        };

        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("https://api.medcart.test/graphql"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_secret_api_token"));
    }

    #[test]
    fn test_parse_url_rejects_garbage() {
        let err = parse_url("TEST_URL", "not a url").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(_, _)));
    }
}
