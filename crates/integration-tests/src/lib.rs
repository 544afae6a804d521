//! Test support for the Medcart checkout engine.
//!
//! In-memory fakes for every remote service a [`medcart_checkout::session::CheckoutSession`]
//! touches. The fakes record calls and can be scripted to fail, which is how
//! the tests drive retry, fallback, and supersession paths without a network.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use medcart_core::cart::RemoteCartLine;
use medcart_core::tier::TierSchedule;
use medcart_core::types::{CartItemId, Money, OrderId, VariantId};

use medcart_checkout::orders::types::OrderDraft;
use medcart_checkout::orders::{OrdersApi, OrdersError};
use medcart_checkout::services::payment::{
    CardDetails, CardTokenizer, OpaqueToken, PaymentError, PaymentGateway, PaymentRequest,
    TokenizationError,
};
use medcart_checkout::services::tax::{TaxBreakdown, TaxError, TaxService};

/// Initialize test logging once; safe to call from every test.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// =============================================================================
// Ordering backend fake
// =============================================================================

/// In-memory ordering backend.
#[derive(Default)]
pub struct FakeOrders {
    /// What `shared_cart` returns.
    pub cart: Mutex<Vec<RemoteCartLine>>,
    /// Tier rules per variant.
    pub tiers: Mutex<HashMap<VariantId, TierSchedule>>,
    /// Cart items removed via `remove_cart_item`.
    pub removed: Mutex<Vec<CartItemId>>,
    /// Drafts received by `create_order`.
    pub created: Mutex<Vec<OrderDraft>>,
    pub cart_fetches: AtomicU32,
    pub tier_fetches: AtomicU32,
}

impl FakeOrders {
    #[must_use]
    pub fn with_cart(lines: Vec<RemoteCartLine>) -> Self {
        Self {
            cart: Mutex::new(lines),
            ..Self::default()
        }
    }

    pub fn set_cart(&self, lines: Vec<RemoteCartLine>) {
        *self.cart.lock().expect("cart lock") = lines;
    }

    pub fn set_tiers(&self, variant_id: VariantId, schedule: TierSchedule) {
        self.tiers.lock().expect("tiers lock").insert(variant_id, schedule);
    }

    #[must_use]
    pub fn removed_items(&self) -> Vec<CartItemId> {
        self.removed.lock().expect("removed lock").clone()
    }

    #[must_use]
    pub fn created_orders(&self) -> Vec<OrderDraft> {
        self.created.lock().expect("created lock").clone()
    }
}

impl OrdersApi for FakeOrders {
    async fn shared_cart(&self) -> Result<Vec<RemoteCartLine>, OrdersError> {
        self.cart_fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.cart.lock().expect("cart lock").clone())
    }

    async fn tier_prices(&self, variant_id: &VariantId) -> Result<TierSchedule, OrdersError> {
        self.tier_fetches.fetch_add(1, Ordering::SeqCst);
        self.tiers
            .lock()
            .expect("tiers lock")
            .get(variant_id)
            .cloned()
            .ok_or_else(|| OrdersError::NotFound(format!("Variant not found: {variant_id}")))
    }

    async fn remove_cart_item(&self, cart_item_id: &CartItemId) -> Result<(), OrdersError> {
        self.removed
            .lock()
            .expect("removed lock")
            .push(cart_item_id.clone());
        Ok(())
    }

    async fn create_order(&self, draft: &OrderDraft) -> Result<OrderId, OrdersError> {
        let mut created = self.created.lock().expect("created lock");
        created.push(draft.clone());
        Ok(OrderId::new(format!("ord_{}", created.len())))
    }
}

// =============================================================================
// Tax service fake
// =============================================================================

/// Scripted tax service: pops one script entry per call; once the script is
/// exhausted, every call succeeds with a fixed tax amount.
pub struct FakeTax {
    /// Per-call scripted outcomes, consumed front to back.
    pub script: Mutex<VecDeque<Result<TaxBreakdown, TaxError>>>,
    /// Tax amount returned for every unscripted call.
    pub flat_tax: Money,
    pub calls: AtomicU32,
}

impl Default for FakeTax {
    fn default() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            flat_tax: Money::from_cents(875),
            calls: AtomicU32::new(0),
        }
    }
}

impl FakeTax {
    #[must_use]
    pub fn with_script(outcomes: Vec<Result<TaxBreakdown, TaxError>>) -> Self {
        Self {
            script: Mutex::new(outcomes.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TaxService for FakeTax {
    async fn calculate(
        &self,
        subtotal: Money,
        _postal_code: &str,
    ) -> Result<TaxBreakdown, TaxError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(outcome) = self.script.lock().expect("script lock").pop_front() {
            return outcome;
        }
        Ok(TaxBreakdown {
            tax_amount: self.flat_tax,
            total_price: (subtotal + self.flat_tax).rounded(),
        })
    }
}

/// A tax service whose every call fails with a retryable error.
#[derive(Default)]
pub struct DownTax {
    pub calls: AtomicU32,
}

impl DownTax {
    #[must_use]
    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TaxService for DownTax {
    async fn calculate(
        &self,
        _subtotal: Money,
        _postal_code: &str,
    ) -> Result<TaxBreakdown, TaxError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(TaxError::Api {
            status: 503,
            message: "service unavailable".to_string(),
        })
    }
}

// =============================================================================
// Payment fakes
// =============================================================================

/// Tokenizer returning a fixed opaque token.
#[derive(Default)]
pub struct FakeTokenizer {
    pub fail: bool,
}

impl CardTokenizer for FakeTokenizer {
    async fn tokenize(&self, _card: &CardDetails) -> Result<OpaqueToken, TokenizationError> {
        if self.fail {
            return Err(TokenizationError("SDK rejected the card".to_string()));
        }
        Ok(OpaqueToken {
            data_descriptor: "COMMON.ACCEPT.INAPP.PAYMENT".to_string(),
            data_value: "tok_test".to_string(),
        })
    }
}

/// Gateway recording submissions; declines while `decline` is set.
#[derive(Default)]
pub struct FakeGateway {
    pub decline: std::sync::atomic::AtomicBool,
    pub submissions: Mutex<Vec<PaymentRequest>>,
}

impl FakeGateway {
    pub fn set_decline(&self, decline: bool) {
        self.decline.store(decline, Ordering::SeqCst);
    }

    #[must_use]
    pub fn submissions(&self) -> Vec<PaymentRequest> {
        self.submissions.lock().expect("submissions lock").clone()
    }
}

impl PaymentGateway for FakeGateway {
    async fn submit(&self, request: &PaymentRequest) -> Result<(), PaymentError> {
        self.submissions
            .lock()
            .expect("submissions lock")
            .push(request.clone());
        if self.decline.load(Ordering::SeqCst) {
            return Err(PaymentError::Declined);
        }
        Ok(())
    }
}

// =============================================================================
// Builders
// =============================================================================

/// A remote cart line with marked-up pricing (base 50.00, marked up 75.00,
/// remote price 60.00).
#[must_use]
pub fn marked_up_line(product: &str, quantity: u32) -> RemoteCartLine {
    use medcart_core::cart::ProductPricing;
    RemoteCartLine {
        cart_item_id: CartItemId::new(format!("ci_{product}")),
        product_id: medcart_core::types::ProductId::new(product),
        variant_id: VariantId::new(format!("var_{product}")),
        name: product.to_string(),
        quantity,
        unit_price: Money::from_cents(6000),
        has_tier_pricing: false,
        pricing: ProductPricing {
            base_price: Money::from_cents(5000),
            custom_price: Some(Money::from_cents(7500)),
            has_price_history: true,
            latest_marked_up_price: Some(Money::from_cents(7500)),
        },
    }
}
