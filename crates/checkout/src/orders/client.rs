//! Ordering backend client implementation.
//!
//! Hand-written GraphQL documents over `reqwest`, decoded through the
//! `graphql_client` response envelope. Tier prices are cached with `moka`
//! (5-minute TTL); everything else goes to the backend every time.

use std::sync::Arc;
use std::time::Duration;

use graphql_client::Response;
use moka::future::Cache;
use secrecy::ExposeSecret;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use medcart_core::cart::RemoteCartLine;
use medcart_core::tier::TierSchedule;
use medcart_core::types::{
    CartItemId, OrderId, OrderStatus, RequestId, RequestStatus, VariantId,
};

use crate::config::BackendConfig;

use super::queries::{
    UserErrorRecord, add_cart_item, approve_request, cancel_order, create_order, deny_request,
    get_orders, get_requests, remove_cart_item, shared_cart, tier_prices, update_cart_item,
};
use super::types::{Connection, OrderDraft, OrderSummary, RequestSummary, into_tier_schedule};
use super::{OrdersApi, OrdersError};

/// Tier rules change rarely; cache lookups briefly.
const TIER_CACHE_TTL: Duration = Duration::from_secs(300);
const TIER_CACHE_CAPACITY: u64 = 1000;

/// Client for the Medcart ordering backend.
///
/// Cheap to clone; all clones share one HTTP connection pool and cache.
#[derive(Clone)]
pub struct OrdersClient {
    inner: Arc<OrdersClientInner>,
}

struct OrdersClientInner {
    client: reqwest::Client,
    endpoint: String,
    api_token: String,
    tier_cache: Cache<VariantId, TierSchedule>,
}

impl OrdersClient {
    /// Create a new backend client.
    #[must_use]
    pub fn new(config: &BackendConfig) -> Self {
        let tier_cache = Cache::builder()
            .max_capacity(TIER_CACHE_CAPACITY)
            .time_to_live(TIER_CACHE_TTL)
            .build();

        Self {
            inner: Arc::new(OrdersClientInner {
                client: reqwest::Client::new(),
                endpoint: config.endpoint.to_string(),
                api_token: config.api_token.expose_secret().to_string(),
                tier_cache,
            }),
        }
    }

    /// Execute a GraphQL operation.
    async fn execute<V: Serialize, D: DeserializeOwned>(
        &self,
        operation_name: &'static str,
        query: &'static str,
        variables: &V,
    ) -> Result<D, OrdersError> {
        let request_body = serde_json::json!({
            "operationName": operation_name,
            "query": query,
            "variables": variables,
        });

        let response = self
            .inner
            .client
            .post(&self.inner.endpoint)
            .bearer_auth(&self.inner.api_token)
            .header("Content-Type", "application/json")
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();

        // Check for rate limiting
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(OrdersError::RateLimited(retry_after));
        }

        // Get response body as text first for better error diagnostics
        let response_text = response.text().await?;

        if !status.is_success() {
            tracing::error!(
                status = %status,
                body = %response_text.chars().take(500).collect::<String>(),
                "Ordering backend returned non-success status"
            );
            return Err(OrdersError::GraphQL(vec![super::GraphQLError {
                message: format!(
                    "HTTP {status}: {}",
                    response_text.chars().take(200).collect::<String>()
                ),
                locations: vec![],
                path: vec![],
            }]));
        }

        let response: Response<D> = match serde_json::from_str(&response_text) {
            Ok(r) => r,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    body = %response_text.chars().take(500).collect::<String>(),
                    "Failed to parse GraphQL response"
                );
                return Err(OrdersError::Parse(e));
            }
        };

        if let Some(errors) = response.errors
            && !errors.is_empty()
        {
            tracing::debug!(errors = ?errors, "GraphQL errors in response");

            return Err(OrdersError::GraphQL(
                errors
                    .into_iter()
                    .map(|e| super::GraphQLError {
                        message: e.message,
                        locations: e.locations.map_or_else(Vec::new, |locs| {
                            locs.into_iter()
                                .map(|l| super::GraphQLErrorLocation {
                                    line: i64::from(l.line),
                                    column: i64::from(l.column),
                                })
                                .collect()
                        }),
                        path: e.path.map_or_else(Vec::new, |p| {
                            p.into_iter()
                                .map(|fragment| match fragment {
                                    graphql_client::PathFragment::Key(s) => {
                                        serde_json::Value::String(s)
                                    }
                                    graphql_client::PathFragment::Index(i) => {
                                        serde_json::Value::Number(i.into())
                                    }
                                })
                                .collect()
                        }),
                    })
                    .collect(),
            ));
        }

        response.data.ok_or_else(|| {
            tracing::error!(
                body = %response_text.chars().take(500).collect::<String>(),
                "GraphQL response has no data and no errors"
            );
            OrdersError::GraphQL(vec![super::GraphQLError {
                message: "No data in response".to_string(),
                locations: vec![],
                path: vec![],
            }])
        })
    }

    // =========================================================================
    // Shared cart
    // =========================================================================

    /// Fetch the shared cart's line set.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or a line fails to decode.
    #[instrument(skip(self))]
    pub async fn get_shared_cart(&self) -> Result<Vec<RemoteCartLine>, OrdersError> {
        let data: shared_cart::ResponseData = self
            .execute(
                shared_cart::OPERATION_NAME,
                shared_cart::QUERY,
                &shared_cart::Variables,
            )
            .await?;

        data.cart
            .map_or_else(Vec::new, |cart| cart.items)
            .into_iter()
            .map(super::types::CartItemRecord::into_remote_line)
            .collect()
    }

    /// Add an item to the shared cart, returning the resulting line.
    ///
    /// # Errors
    ///
    /// Returns an error on request failure or mutation user errors.
    #[instrument(skip(self), fields(variant_id = %variant_id))]
    pub async fn add_cart_item(
        &self,
        variant_id: &VariantId,
        quantity: u32,
    ) -> Result<RemoteCartLine, OrdersError> {
        let data: add_cart_item::ResponseData = self
            .execute(
                add_cart_item::OPERATION_NAME,
                add_cart_item::QUERY,
                &add_cart_item::Variables {
                    variant_id: variant_id.clone(),
                    quantity,
                },
            )
            .await?;

        let payload = data
            .cart_item_add
            .ok_or_else(|| OrdersError::NotFound(format!("Variant not found: {variant_id}")))?;
        check_user_errors(payload.user_errors)?;
        payload
            .item
            .ok_or_else(|| OrdersError::InvalidData("cartItemAdd returned no item".to_string()))?
            .into_remote_line()
    }

    /// Update a shared-cart item's quantity.
    ///
    /// # Errors
    ///
    /// Returns an error on request failure or mutation user errors.
    #[instrument(skip(self), fields(cart_item_id = %cart_item_id))]
    pub async fn update_cart_item(
        &self,
        cart_item_id: &CartItemId,
        quantity: u32,
    ) -> Result<(), OrdersError> {
        let data: update_cart_item::ResponseData = self
            .execute(
                update_cart_item::OPERATION_NAME,
                update_cart_item::QUERY,
                &update_cart_item::Variables {
                    cart_item_id: cart_item_id.clone(),
                    quantity,
                },
            )
            .await?;

        let payload = data
            .cart_item_update
            .ok_or_else(|| OrdersError::NotFound(format!("Cart item not found: {cart_item_id}")))?;
        check_user_errors(payload.user_errors)
    }

    /// Remove an item from the shared cart.
    ///
    /// # Errors
    ///
    /// Returns an error on request failure or mutation user errors.
    #[instrument(skip(self), fields(cart_item_id = %cart_item_id))]
    pub async fn remove_cart_item(&self, cart_item_id: &CartItemId) -> Result<(), OrdersError> {
        let data: remove_cart_item::ResponseData = self
            .execute(
                remove_cart_item::OPERATION_NAME,
                remove_cart_item::QUERY,
                &remove_cart_item::Variables {
                    cart_item_id: cart_item_id.clone(),
                },
            )
            .await?;

        let payload = data
            .cart_item_remove
            .ok_or_else(|| OrdersError::NotFound(format!("Cart item not found: {cart_item_id}")))?;
        check_user_errors(payload.user_errors)
    }

    // =========================================================================
    // Pricing
    // =========================================================================

    /// Fetch tier rules for a variant (cached for 5 minutes).
    ///
    /// # Errors
    ///
    /// Returns an error if the variant is unknown, the request fails, or the
    /// backend returns a malformed rule set.
    #[instrument(skip(self), fields(variant_id = %variant_id))]
    pub async fn get_tier_prices(&self, variant_id: &VariantId) -> Result<TierSchedule, OrdersError> {
        if let Some(schedule) = self.inner.tier_cache.get(variant_id).await {
            debug!("Cache hit for tier prices");
            return Ok(schedule);
        }

        let data: tier_prices::ResponseData = self
            .execute(
                tier_prices::OPERATION_NAME,
                tier_prices::QUERY,
                &tier_prices::Variables {
                    variant_id: variant_id.clone(),
                },
            )
            .await?;

        let payload = data
            .variant
            .ok_or_else(|| OrdersError::NotFound(format!("Variant not found: {variant_id}")))?;
        let schedule = into_tier_schedule(payload.tier_prices)?;

        self.inner
            .tier_cache
            .insert(variant_id.clone(), schedule.clone())
            .await;

        Ok(schedule)
    }

    // =========================================================================
    // Orders and requests
    // =========================================================================

    /// Fetch a page of the order history.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self))]
    pub async fn get_orders(
        &self,
        first: i64,
        after: Option<String>,
        status: Option<OrderStatus>,
    ) -> Result<Connection<OrderSummary>, OrdersError> {
        let data: get_orders::ResponseData = self
            .execute(
                get_orders::OPERATION_NAME,
                get_orders::QUERY,
                &get_orders::Variables {
                    first,
                    after,
                    status,
                },
            )
            .await?;
        Ok(data.orders)
    }

    /// Fetch a page of patient product requests.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self))]
    pub async fn get_requests(
        &self,
        first: i64,
        after: Option<String>,
        status: Option<RequestStatus>,
    ) -> Result<Connection<RequestSummary>, OrdersError> {
        let data: get_requests::ResponseData = self
            .execute(
                get_requests::OPERATION_NAME,
                get_requests::QUERY,
                &get_requests::Variables {
                    first,
                    after,
                    status,
                },
            )
            .await?;
        Ok(data.product_requests)
    }

    /// Create an order from a draft.
    ///
    /// # Errors
    ///
    /// Returns an error on request failure or mutation user errors.
    #[instrument(skip(self, draft))]
    pub async fn create_order(&self, draft: &OrderDraft) -> Result<OrderId, OrdersError> {
        let data: create_order::ResponseData = self
            .execute(
                create_order::OPERATION_NAME,
                create_order::QUERY,
                &create_order::Variables {
                    input: draft.clone(),
                },
            )
            .await?;

        let payload = data
            .order_create
            .ok_or_else(|| OrdersError::InvalidData("orderCreate returned nothing".to_string()))?;
        check_user_errors(payload.user_errors)?;
        payload
            .order
            .map(|order| order.id)
            .ok_or_else(|| OrdersError::InvalidData("orderCreate returned no order".to_string()))
    }

    /// Cancel an order.
    ///
    /// # Errors
    ///
    /// Returns an error on request failure or mutation user errors.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn cancel_order(&self, order_id: &OrderId) -> Result<(), OrdersError> {
        let data: cancel_order::ResponseData = self
            .execute(
                cancel_order::OPERATION_NAME,
                cancel_order::QUERY,
                &cancel_order::Variables {
                    order_id: order_id.clone(),
                },
            )
            .await?;

        let payload = data
            .order_cancel
            .ok_or_else(|| OrdersError::NotFound(format!("Order not found: {order_id}")))?;
        check_user_errors(payload.user_errors)
    }

    /// Approve a patient's product request.
    ///
    /// # Errors
    ///
    /// Returns an error on request failure or mutation user errors.
    #[instrument(skip(self), fields(request_id = %request_id))]
    pub async fn approve_request(&self, request_id: &RequestId) -> Result<(), OrdersError> {
        let data: approve_request::ResponseData = self
            .execute(
                approve_request::OPERATION_NAME,
                approve_request::QUERY,
                &approve_request::Variables {
                    request_id: request_id.clone(),
                },
            )
            .await?;

        let payload = data
            .request_approve
            .ok_or_else(|| OrdersError::NotFound(format!("Request not found: {request_id}")))?;
        check_user_errors(payload.user_errors)
    }

    /// Deny a patient's product request.
    ///
    /// # Errors
    ///
    /// Returns an error on request failure or mutation user errors.
    #[instrument(skip(self), fields(request_id = %request_id))]
    pub async fn deny_request(
        &self,
        request_id: &RequestId,
        reason: Option<String>,
    ) -> Result<(), OrdersError> {
        let data: deny_request::ResponseData = self
            .execute(
                deny_request::OPERATION_NAME,
                deny_request::QUERY,
                &deny_request::Variables {
                    request_id: request_id.clone(),
                    reason,
                },
            )
            .await?;

        let payload = data
            .request_deny
            .ok_or_else(|| OrdersError::NotFound(format!("Request not found: {request_id}")))?;
        check_user_errors(payload.user_errors)
    }

    /// Drop all cached tier prices (e.g. after a pricing update).
    pub async fn invalidate_tier_prices(&self) {
        self.inner.tier_cache.invalidate_all();
        self.inner.tier_cache.run_pending_tasks().await;
    }
}

impl OrdersApi for OrdersClient {
    fn shared_cart(&self) -> impl Future<Output = Result<Vec<RemoteCartLine>, OrdersError>> + Send {
        self.get_shared_cart()
    }

    fn tier_prices(
        &self,
        variant_id: &VariantId,
    ) -> impl Future<Output = Result<TierSchedule, OrdersError>> + Send {
        self.get_tier_prices(variant_id)
    }

    fn remove_cart_item(
        &self,
        cart_item_id: &CartItemId,
    ) -> impl Future<Output = Result<(), OrdersError>> + Send {
        Self::remove_cart_item(self, cart_item_id)
    }

    fn create_order(
        &self,
        draft: &OrderDraft,
    ) -> impl Future<Output = Result<OrderId, OrdersError>> + Send {
        Self::create_order(self, draft)
    }
}

fn check_user_errors(errors: Vec<UserErrorRecord>) -> Result<(), OrdersError> {
    if errors.is_empty() {
        return Ok(());
    }
    Err(OrdersError::UserError(
        errors
            .into_iter()
            .map(|e| e.message)
            .collect::<Vec<_>>()
            .join("; "),
    ))
}
