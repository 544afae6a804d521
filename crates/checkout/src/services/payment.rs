//! Payment submission and card tokenization.
//!
//! Raw card data exists in exactly one place: a [`CardDetails`] value handed
//! to a [`CardTokenizer`]. Everything downstream - the payment request, the
//! wire format, log output - carries only the opaque descriptor/value pair
//! the tokenizer returns. `CardDetails` keeps its sensitive fields in
//! `SecretString` so a stray `Debug` cannot leak them.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;

use medcart_core::types::{Money, OrderId};

use crate::config::PaymentConfig;

use super::address::Address;

/// Errors from the payment service.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Service returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// The processor declined the charge. Surfaced to the user as a generic
    /// "unable to process payment" message.
    #[error("unable to process payment")]
    Declined,
}

/// Card tokenization failure; fatal to the current submission attempt.
#[derive(Debug, Error)]
#[error("card tokenization failed: {0}")]
pub struct TokenizationError(pub String);

/// Raw card input, held only long enough to tokenize.
#[derive(Debug, Clone)]
pub struct CardDetails {
    pub card_number: SecretString,
    pub expiry_month: u8,
    pub expiry_year: u16,
    pub cvv: SecretString,
}

impl CardDetails {
    /// Network detected from the card number's leading digits.
    #[must_use]
    pub fn network(&self) -> medcart_core::card::CardNetwork {
        let digits = medcart_core::card::strip_non_digits(self.card_number.expose_secret());
        medcart_core::card::detect(&digits).network
    }

    /// Whether the digit count is a complete number for the detected network.
    #[must_use]
    pub fn has_complete_number(&self) -> bool {
        let digits = medcart_core::card::strip_non_digits(self.card_number.expose_secret());
        medcart_core::card::detect(&digits).is_valid_length(digits.len())
    }
}

/// Tokenized card data from the payment SDK.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpaqueToken {
    pub data_descriptor: String,
    pub data_value: String,
}

impl std::fmt::Debug for OpaqueToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpaqueToken")
            .field("data_descriptor", &self.data_descriptor)
            .field("data_value", &"[REDACTED]")
            .finish()
    }
}

/// The final payment submission, built once all validations pass.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub order_id: OrderId,
    pub amount: Money,
    pub tax_amount: Money,
    pub opaque_data: OpaqueToken,
    pub billing_address: Address,
    pub shipping_address: Address,
}

/// The tokenization SDK contract: raw card data in, opaque token out.
pub trait CardTokenizer {
    fn tokenize(
        &self,
        card: &CardDetails,
    ) -> impl Future<Output = Result<OpaqueToken, TokenizationError>> + Send;
}

/// The payment processing contract; implemented by [`PaymentClient`] over
/// HTTP and by in-memory fakes in tests.
pub trait PaymentGateway {
    fn submit(
        &self,
        request: &PaymentRequest,
    ) -> impl Future<Output = Result<(), PaymentError>> + Send;
}

#[derive(Deserialize)]
struct PaymentResponse {
    success: bool,
}

/// HTTP client for the payment processing service.
#[derive(Clone)]
pub struct PaymentClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl PaymentClient {
    /// Create a new payment service client.
    #[must_use]
    pub fn new(config: &PaymentConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: config.endpoint.to_string(),
            api_key: config.api_key.expose_secret().to_string(),
        }
    }
}

impl PaymentGateway for PaymentClient {
    #[instrument(skip(self, request), fields(order_id = %request.order_id))]
    async fn submit(&self, request: &PaymentRequest) -> Result<(), PaymentError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(PaymentError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let payload: PaymentResponse = response.json().await?;
        if payload.success {
            Ok(())
        } else {
            Err(PaymentError::Declined)
        }
    }
}
