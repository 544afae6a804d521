//! Tax calculation service client.
//!
//! One POST per quote attempt; quoting is idempotent, so failures retry up
//! to twice with linearly increasing backoff (1s, 2s) before the quote is
//! reported unavailable. Every attempt carries a fresh client mutation id.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{instrument, warn};
use uuid::Uuid;

use medcart_core::types::Money;

use crate::config::TaxConfig;

/// Additional attempts after the first failure.
pub const TAX_RETRY_LIMIT: u32 = 2;

/// Linear backoff before retry `n` (1-based): 1s, 2s.
#[must_use]
pub const fn retry_backoff(attempt: u32) -> Duration {
    Duration::from_secs(attempt as u64)
}

/// Errors from the tax service.
#[derive(Debug, Error)]
pub enum TaxError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Service returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Service answered but declined to quote.
    #[error("tax quote rejected: {0}")]
    Rejected(String),

    /// All attempts failed; the quote is unavailable for now.
    #[error("tax service unavailable after retries")]
    Unavailable,
}

impl TaxError {
    /// Transient failures worth another attempt.
    const fn is_retryable(&self) -> bool {
        match self {
            Self::Http(_) | Self::Unavailable => true,
            Self::Api { status, .. } => *status >= 500,
            Self::Rejected(_) => false,
        }
    }
}

/// A successful quote from the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaxBreakdown {
    pub tax_amount: Money,
    pub total_price: Money,
}

/// The tax quoting contract; implemented by [`TaxClient`] over HTTP and by
/// in-memory fakes in tests.
pub trait TaxService {
    /// Quote tax for a subtotal shipped to a postal code.
    fn calculate(
        &self,
        subtotal: Money,
        postal_code: &str,
    ) -> impl Future<Output = Result<TaxBreakdown, TaxError>> + Send;
}

/// Quote with the standard retry policy: up to [`TAX_RETRY_LIMIT`] extra
/// attempts, backing off linearly between them.
///
/// # Errors
///
/// [`TaxError::Rejected`] immediately on a non-retryable answer;
/// [`TaxError::Unavailable`] once every attempt has failed.
pub async fn calculate_with_retry<S: TaxService>(
    service: &S,
    subtotal: Money,
    postal_code: &str,
) -> Result<TaxBreakdown, TaxError> {
    for attempt in 0..=TAX_RETRY_LIMIT {
        if attempt > 0 {
            tokio::time::sleep(retry_backoff(attempt)).await;
        }
        match service.calculate(subtotal, postal_code).await {
            Ok(breakdown) => return Ok(breakdown),
            Err(error) if error.is_retryable() => {
                warn!(%error, attempt, "tax quote attempt failed");
            }
            Err(error) => return Err(error),
        }
    }
    Err(TaxError::Unavailable)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TaxRequest<'a> {
    subtotal_price: Money,
    postal_code: &'a str,
    client_mutation_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaxResponse {
    success: bool,
    tax_amount: Option<Money>,
    total_price: Option<Money>,
    message: Option<String>,
}

/// HTTP client for the tax calculation service.
#[derive(Clone)]
pub struct TaxClient {
    client: reqwest::Client,
    endpoint: String,
}

impl TaxClient {
    /// Create a new tax service client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &TaxConfig) -> Result<Self, TaxError> {
        let mut headers = HeaderMap::new();
        let auth_value = format!("Bearer {}", config.api_key.expose_secret());
        headers.insert(
            "Authorization",
            HeaderValue::from_str(&auth_value).map_err(|e| TaxError::Api {
                status: 0,
                message: format!("Invalid API key format: {e}"),
            })?,
        );

        let client = reqwest::Client::builder().default_headers(headers).build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.to_string(),
        })
    }
}

impl TaxService for TaxClient {
    #[instrument(skip(self), fields(postal_code = %postal_code))]
    async fn calculate(
        &self,
        subtotal: Money,
        postal_code: &str,
    ) -> Result<TaxBreakdown, TaxError> {
        let body = TaxRequest {
            subtotal_price: subtotal,
            postal_code,
            client_mutation_id: Uuid::new_v4().to_string(),
        };

        let response = self.client.post(&self.endpoint).json(&body).send().await?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(TaxError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let payload: TaxResponse = response.json().await?;
        if !payload.success {
            return Err(TaxError::Rejected(
                payload.message.unwrap_or_else(|| "no reason given".to_string()),
            ));
        }

        match (payload.tax_amount, payload.total_price) {
            (Some(tax_amount), Some(total_price)) => Ok(TaxBreakdown {
                tax_amount,
                total_price,
            }),
            _ => Err(TaxError::Rejected(
                "success response missing amounts".to_string(),
            )),
        }
    }
}
