//! Medcart order/cart GraphQL backend client.
//!
//! # Architecture
//!
//! - Hand-written GraphQL documents with typed serde variables and response
//!   records; the `graphql_client` response envelope handles the
//!   data/errors framing
//! - The backend is the source of truth - no local sync, direct API calls
//! - Tier-price reads are cached via `moka` (5 minute TTL); cart and order
//!   mutations are never cached

mod client;
pub mod queries;
pub mod types;

pub use client::OrdersClient;

use thiserror::Error;

use medcart_core::cart::RemoteCartLine;
use medcart_core::tier::TierSchedule;
use medcart_core::types::{CartItemId, OrderId, VariantId};

use types::OrderDraft;

/// Errors that can occur when interacting with the ordering backend.
#[derive(Debug, Error)]
pub enum OrdersError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// GraphQL query returned errors.
    #[error("GraphQL errors: {}", format_graphql_errors(.0))]
    GraphQL(Vec<GraphQLError>),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rate limited by the backend.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// User error from a mutation (e.g., invalid input).
    #[error("User error: {0}")]
    UserError(String),

    /// A response field did not decode into its domain type.
    #[error("Invalid response data: {0}")]
    InvalidData(String),
}

/// A GraphQL error returned by the backend.
#[derive(Debug, Clone)]
pub struct GraphQLError {
    /// Error message.
    pub message: String,
    /// Source locations in the query.
    pub locations: Vec<GraphQLErrorLocation>,
    /// Path to the error in the response.
    pub path: Vec<serde_json::Value>,
}

/// Location in a GraphQL query where an error occurred.
#[derive(Debug, Clone)]
pub struct GraphQLErrorLocation {
    /// Line number (1-indexed).
    pub line: i64,
    /// Column number (1-indexed).
    pub column: i64,
}

fn format_graphql_errors(errors: &[GraphQLError]) -> String {
    if errors.is_empty() {
        return "(no error details provided)".to_string();
    }

    errors
        .iter()
        .enumerate()
        .map(|(i, e)| {
            let mut parts = Vec::new();

            if !e.message.is_empty() {
                parts.push(e.message.clone());
            }

            if !e.path.is_empty() {
                let path_str = e
                    .path
                    .iter()
                    .map(|p| match p {
                        serde_json::Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join(".");
                parts.push(format!("path: {path_str}"));
            }

            if let Some(loc) = e.locations.first() {
                parts.push(format!("at line {}:{}", loc.line, loc.column));
            }

            if parts.is_empty() {
                format!("[error {}]: (no details)", i + 1)
            } else {
                parts.join(" ")
            }
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// The slice of the ordering backend a checkout session drives.
///
/// [`OrdersClient`] is the production implementation; the integration tests
/// substitute in-memory fakes.
pub trait OrdersApi {
    /// Fetch the shared cart's current line set.
    fn shared_cart(
        &self,
    ) -> impl Future<Output = Result<Vec<RemoteCartLine>, OrdersError>> + Send;

    /// Fetch tier rules for a variant.
    fn tier_prices(
        &self,
        variant_id: &VariantId,
    ) -> impl Future<Output = Result<TierSchedule, OrdersError>> + Send;

    /// Remove an item from the shared cart.
    fn remove_cart_item(
        &self,
        cart_item_id: &CartItemId,
    ) -> impl Future<Output = Result<(), OrdersError>> + Send;

    /// Create an order from a draft, returning its id.
    fn create_order(
        &self,
        draft: &OrderDraft,
    ) -> impl Future<Output = Result<OrderId, OrdersError>> + Send;
}
