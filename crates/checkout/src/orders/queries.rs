//! GraphQL operations for the ordering backend.
//!
//! The backend schema is private, so the documents are hand-written consts
//! with typed serde variables and response records, one module per
//! operation (mirroring the `graphql_client` codegen layout). Responses are
//! decoded through the shared `graphql_client::Response` envelope in the
//! client.

use serde::{Deserialize, Serialize};

use medcart_core::types::{
    CartItemId, OrderId, OrderStatus, RequestId, RequestStatus, VariantId,
};

use super::types::{
    CartItemRecord, Connection, OrderDraft, OrderSummary, RequestSummary, TierRuleRecord,
};

/// A mutation-level user error (invalid input, state conflicts).
#[derive(Debug, Clone, Deserialize)]
pub struct UserErrorRecord {
    pub field: Option<Vec<String>>,
    pub message: String,
}

pub mod shared_cart {
    use super::{CartItemRecord, Deserialize, Serialize};

    pub const OPERATION_NAME: &str = "SharedCart";
    pub const QUERY: &str = "\
query SharedCart {
  cart {
    items {
      id
      quantity
      unitPrice
      product {
        id
        name
        basePrice
        customPrice
        hasPriceHistory
        latestMarkedUpPrice
        hasTierPricing
      }
      variant { id }
    }
  }
}";

    #[derive(Debug, Serialize)]
    pub struct Variables;

    #[derive(Debug, Deserialize)]
    pub struct ResponseData {
        pub cart: Option<CartPayload>,
    }

    #[derive(Debug, Deserialize)]
    pub struct CartPayload {
        pub items: Vec<CartItemRecord>,
    }
}

pub mod tier_prices {
    use super::{Deserialize, Serialize, TierRuleRecord, VariantId};

    pub const OPERATION_NAME: &str = "TierPrices";
    pub const QUERY: &str = "\
query TierPrices($variantId: ID!) {
  variant(id: $variantId) {
    tierPrices {
      startCount
      endCount
      tieredPrice
    }
  }
}";

    #[derive(Debug, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Variables {
        pub variant_id: VariantId,
    }

    #[derive(Debug, Deserialize)]
    pub struct ResponseData {
        pub variant: Option<VariantPayload>,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct VariantPayload {
        pub tier_prices: Vec<TierRuleRecord>,
    }
}

pub mod add_cart_item {
    use super::{CartItemRecord, Deserialize, Serialize, UserErrorRecord, VariantId};

    pub const OPERATION_NAME: &str = "AddCartItem";
    pub const QUERY: &str = "\
mutation AddCartItem($variantId: ID!, $quantity: Int!) {
  cartItemAdd(variantId: $variantId, quantity: $quantity) {
    item {
      id
      quantity
      unitPrice
      product {
        id
        name
        basePrice
        customPrice
        hasPriceHistory
        latestMarkedUpPrice
        hasTierPricing
      }
      variant { id }
    }
    userErrors { field message }
  }
}";

    #[derive(Debug, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Variables {
        pub variant_id: VariantId,
        pub quantity: u32,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ResponseData {
        pub cart_item_add: Option<Payload>,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Payload {
        pub item: Option<CartItemRecord>,
        pub user_errors: Vec<UserErrorRecord>,
    }
}

pub mod update_cart_item {
    use super::{CartItemId, Deserialize, Serialize, UserErrorRecord};

    pub const OPERATION_NAME: &str = "UpdateCartItem";
    pub const QUERY: &str = "\
mutation UpdateCartItem($cartItemId: ID!, $quantity: Int!) {
  cartItemUpdate(cartItemId: $cartItemId, quantity: $quantity) {
    userErrors { field message }
  }
}";

    #[derive(Debug, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Variables {
        pub cart_item_id: CartItemId,
        pub quantity: u32,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ResponseData {
        pub cart_item_update: Option<Payload>,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Payload {
        pub user_errors: Vec<UserErrorRecord>,
    }
}

pub mod remove_cart_item {
    use super::{CartItemId, Deserialize, Serialize, UserErrorRecord};

    pub const OPERATION_NAME: &str = "RemoveCartItem";
    pub const QUERY: &str = "\
mutation RemoveCartItem($cartItemId: ID!) {
  cartItemRemove(cartItemId: $cartItemId) {
    userErrors { field message }
  }
}";

    #[derive(Debug, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Variables {
        pub cart_item_id: CartItemId,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ResponseData {
        pub cart_item_remove: Option<Payload>,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Payload {
        pub user_errors: Vec<UserErrorRecord>,
    }
}

pub mod create_order {
    use super::{Deserialize, OrderDraft, OrderId, Serialize, UserErrorRecord};

    pub const OPERATION_NAME: &str = "CreateOrder";
    pub const QUERY: &str = "\
mutation CreateOrder($input: OrderInput!) {
  orderCreate(input: $input) {
    order { id }
    userErrors { field message }
  }
}";

    #[derive(Debug, Serialize)]
    pub struct Variables {
        pub input: OrderDraft,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ResponseData {
        pub order_create: Option<Payload>,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Payload {
        pub order: Option<OrderRef>,
        pub user_errors: Vec<UserErrorRecord>,
    }

    #[derive(Debug, Deserialize)]
    pub struct OrderRef {
        pub id: OrderId,
    }
}

pub mod cancel_order {
    use super::{Deserialize, OrderId, Serialize, UserErrorRecord};

    pub const OPERATION_NAME: &str = "CancelOrder";
    pub const QUERY: &str = "\
mutation CancelOrder($orderId: ID!) {
  orderCancel(orderId: $orderId) {
    userErrors { field message }
  }
}";

    #[derive(Debug, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Variables {
        pub order_id: OrderId,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ResponseData {
        pub order_cancel: Option<Payload>,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Payload {
        pub user_errors: Vec<UserErrorRecord>,
    }
}

pub mod get_orders {
    use super::{Connection, Deserialize, OrderStatus, OrderSummary, Serialize};

    pub const OPERATION_NAME: &str = "GetOrders";
    pub const QUERY: &str = "\
query GetOrders($first: Int!, $after: String, $status: OrderStatus) {
  orders(first: $first, after: $after, status: $status) {
    nodes {
      id
      displayId
      status
      createdAt
      totalPrice
      lineCount
    }
    pageInfo { hasNextPage endCursor }
  }
}";

    #[derive(Debug, Serialize)]
    pub struct Variables {
        pub first: i64,
        pub after: Option<String>,
        pub status: Option<OrderStatus>,
    }

    #[derive(Debug, Deserialize)]
    pub struct ResponseData {
        pub orders: Connection<OrderSummary>,
    }
}

pub mod get_requests {
    use super::{Connection, Deserialize, RequestStatus, RequestSummary, Serialize};

    pub const OPERATION_NAME: &str = "GetRequests";
    pub const QUERY: &str = "\
query GetRequests($first: Int!, $after: String, $status: RequestStatus) {
  productRequests(first: $first, after: $after, status: $status) {
    nodes {
      id
      productName
      patientName
      status
      requestedAt
    }
    pageInfo { hasNextPage endCursor }
  }
}";

    #[derive(Debug, Serialize)]
    pub struct Variables {
        pub first: i64,
        pub after: Option<String>,
        pub status: Option<RequestStatus>,
    }

    #[derive(Debug, Deserialize)]
    pub struct ResponseData {
        #[serde(rename = "productRequests")]
        pub product_requests: Connection<RequestSummary>,
    }
}

pub mod approve_request {
    use super::{Deserialize, RequestId, Serialize, UserErrorRecord};

    pub const OPERATION_NAME: &str = "ApproveRequest";
    pub const QUERY: &str = "\
mutation ApproveRequest($requestId: ID!) {
  requestApprove(requestId: $requestId) {
    userErrors { field message }
  }
}";

    #[derive(Debug, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Variables {
        pub request_id: RequestId,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ResponseData {
        pub request_approve: Option<Payload>,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Payload {
        pub user_errors: Vec<UserErrorRecord>,
    }
}

pub mod deny_request {
    use super::{Deserialize, RequestId, Serialize, UserErrorRecord};

    pub const OPERATION_NAME: &str = "DenyRequest";
    pub const QUERY: &str = "\
mutation DenyRequest($requestId: ID!, $reason: String) {
  requestDeny(requestId: $requestId, reason: $reason) {
    userErrors { field message }
  }
}";

    #[derive(Debug, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Variables {
        pub request_id: RequestId,
        pub reason: Option<String>,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ResponseData {
        pub request_deny: Option<Payload>,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Payload {
        pub user_errors: Vec<UserErrorRecord>,
    }
}
