//! Address autocomplete service client.

use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;

use crate::config::AddressConfig;

/// A structured mailing address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub street1: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
}

/// Errors from the address autocomplete service.
#[derive(Debug, Error)]
pub enum AddressError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Service returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },
}

#[derive(Deserialize)]
struct SuggestResponse {
    suggestions: Vec<Address>,
}

/// HTTP client for address autocomplete.
#[derive(Clone)]
pub struct AddressClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl AddressClient {
    /// Create a new autocomplete client.
    #[must_use]
    pub fn new(config: &AddressConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: config.endpoint.to_string(),
            api_key: config
                .api_key
                .as_ref()
                .map(|key| key.expose_secret().to_string()),
        }
    }

    /// Suggest structured addresses for free-text input.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self))]
    pub async fn suggest(&self, query: &str) -> Result<Vec<Address>, AddressError> {
        let mut request = self.client.get(&self.endpoint).query(&[("q", query)]);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(AddressError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let payload: SuggestResponse = response.json().await?;
        Ok(payload.suggestions)
    }
}
