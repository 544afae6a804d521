//! The checkout session state machine.
//!
//! [`CheckoutSession`] owns the cart ledger, the tax tracker, and the
//! submission guard for one checkout. State transitions are synchronous;
//! anything that talks to the network is either a free async helper
//! ([`fetch_tier_prices_debounced`], [`mirror_cart_removals`],
//! [`tax::calculate_with_retry`]) or the [`CheckoutSession::submit`] driver.
//!
//! Mutating operations hand back tickets for the follow-up lookups they
//! trigger (a tax re-quote after a subtotal change, a debounced tier-price
//! lookup after a quantity change). Every ticket carries a generation id;
//! by the time its response arrives, a newer edit may have superseded it,
//! in which case applying the ticket is a silent no-op. The latest request
//! for a concern always wins.

use std::time::Duration;

use tracing::{debug, info, instrument};

use medcart_core::cart::{CartBook, CartLine, ModeSwitch, OrderMode, ProductPricing};
use medcart_core::tax::{QuoteDisposition, QuoteTicket, TaxState, TaxTracker};
use medcart_core::tier::TierSchedule;
use medcart_core::types::{CustomerId, Money, OrderId, ProductId, VariantId};
use medcart_core::validate::validate_cart;

use crate::error::CheckoutError;
use crate::orders::OrdersApi;
use crate::orders::types::{OrderDraft, OrderDraftLine};
use crate::services::address::Address;
use crate::services::payment::{CardDetails, CardTokenizer, PaymentGateway, PaymentRequest};
use crate::services::tax;

/// Quantity edits settle for this long before a tier-price lookup fires.
pub const TIER_LOOKUP_DEBOUNCE: Duration = Duration::from_millis(500);

/// Permission to run one debounced tier-price lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierLookupTicket {
    generation: u64,
    pub variant_id: VariantId,
}

/// Follow-up lookups a cart mutation triggered.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PendingLookups {
    /// Re-quote tax at the new subtotal, if the postal code is quotable.
    pub tax: Option<QuoteTicket>,
    /// Run a debounced tier-price lookup for the edited line.
    pub tier: Option<TierLookupTicket>,
}

/// What became of an applied tier lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TierLookupOutcome {
    /// The rules were attached; re-quote tax if a ticket is returned.
    Applied { tax: Option<QuoteTicket> },
    /// A newer quantity edit superseded this lookup; nothing changed.
    Superseded,
}

/// Outcome of requesting an order-mode change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModeChange {
    /// The switch applied and prices re-derived.
    Applied { tax: Option<QuoteTicket> },
    /// Clinic -> Customer would drop these lines; confirm via
    /// [`CheckoutSession::confirm_switch_to_customer`] or abandon.
    NeedsConfirmation { lines_to_remove: Vec<ProductId> },
}

/// Submission progress for this session.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SubmissionState {
    #[default]
    Idle,
    /// A submission is outstanding; further submits are rejected.
    InFlight,
    /// The order went through; this session is done.
    Completed(OrderId),
}

/// One checkout, from cart hydration to payment submission.
#[derive(Debug, Clone, Default)]
pub struct CheckoutSession {
    book: CartBook,
    tax: TaxTracker,
    postal_input: String,
    customer: Option<CustomerId>,
    tier_generation: u64,
    submission: SubmissionState,
}

impl CheckoutSession {
    #[must_use]
    pub fn new(mode: OrderMode) -> Self {
        Self {
            book: CartBook::new(mode),
            ..Self::default()
        }
    }

    /// Start a session that may fall back to a previously known order-level
    /// tax figure if the tax service goes down.
    #[must_use]
    pub fn with_last_known_tax(mode: OrderMode, last_known_tax: Money) -> Self {
        Self {
            book: CartBook::new(mode),
            tax: TaxTracker::new(Some(last_known_tax)),
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn cart(&self) -> &CartBook {
        &self.book
    }

    #[must_use]
    pub const fn tax_state(&self) -> &TaxState {
        self.tax.state()
    }

    #[must_use]
    pub const fn submission_state(&self) -> &SubmissionState {
        &self.submission
    }

    #[must_use]
    pub fn subtotal(&self) -> Money {
        self.book.subtotal()
    }

    /// Select the customer a customer-mode order bills.
    pub fn set_customer(&mut self, customer: Option<CustomerId>) {
        self.customer = customer;
    }

    // =========================================================================
    // Hydration and cart edits
    // =========================================================================

    /// Load (or refresh) the shared cart from the backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the fetch fails; the hydration gate stays closed
    /// until a fetch succeeds.
    #[instrument(skip(self, orders))]
    pub async fn hydrate<O: OrdersApi>(
        &mut self,
        orders: &O,
    ) -> Result<Option<QuoteTicket>, CheckoutError> {
        let lines = orders.shared_cart().await?;
        debug!(line_count = lines.len(), "shared cart hydrated");
        self.book.apply_remote(lines);
        Ok(self.requote())
    }

    /// Add a product to the cart (merging with an existing line).
    ///
    /// # Errors
    ///
    /// Propagates [`medcart_core::cart::CartError`] from the ledger.
    pub fn add_product(
        &mut self,
        product_id: ProductId,
        variant_id: VariantId,
        name: impl Into<String>,
        quantity: u32,
        pricing: ProductPricing,
        has_tier_pricing: bool,
    ) -> Result<PendingLookups, CheckoutError> {
        self.book.add_product(
            product_id.clone(),
            variant_id,
            name,
            quantity,
            pricing,
            has_tier_pricing,
        )?;
        Ok(PendingLookups {
            tier: self.tier_ticket_for(&product_id),
            tax: self.requote(),
        })
    }

    /// Change a line's quantity.
    ///
    /// # Errors
    ///
    /// Propagates [`medcart_core::cart::CartError`] from the ledger.
    pub fn edit_quantity(
        &mut self,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<PendingLookups, CheckoutError> {
        self.book.edit_quantity(product_id, quantity)?;
        Ok(PendingLookups {
            tier: self.tier_ticket_for(product_id),
            tax: self.requote(),
        })
    }

    /// Change a line's unit price.
    ///
    /// # Errors
    ///
    /// Propagates [`medcart_core::cart::CartError`] from the ledger.
    pub fn edit_price(
        &mut self,
        product_id: &ProductId,
        price: Money,
    ) -> Result<Option<QuoteTicket>, CheckoutError> {
        self.book.edit_price(product_id, price)?;
        Ok(self.requote())
    }

    /// Remove a line, returning it (its `source_cart_item_id` lets the
    /// caller mirror the deletion remotely).
    ///
    /// # Errors
    ///
    /// Propagates [`medcart_core::cart::CartError`] from the ledger.
    pub fn remove_line(
        &mut self,
        product_id: &ProductId,
    ) -> Result<(CartLine, Option<QuoteTicket>), CheckoutError> {
        let line = self.book.remove_line(product_id)?;
        let ticket = self.requote();
        Ok((line, ticket))
    }

    // =========================================================================
    // Order mode
    // =========================================================================

    /// Request an order-mode change.
    ///
    /// # Errors
    ///
    /// Propagates [`medcart_core::cart::CartError`] (notably the hydration
    /// gate) from the ledger.
    pub fn set_mode(&mut self, mode: OrderMode) -> Result<ModeChange, CheckoutError> {
        match self.book.set_mode(mode)? {
            ModeSwitch::Applied => Ok(ModeChange::Applied { tax: self.requote() }),
            ModeSwitch::NeedsConfirmation { lines_to_remove } => {
                Ok(ModeChange::NeedsConfirmation { lines_to_remove })
            }
        }
    }

    /// Complete a confirmed Clinic -> Customer switch.
    ///
    /// Returns the removed lines (mirror them remotely via
    /// [`mirror_cart_removals`]) and a tax re-quote ticket.
    ///
    /// # Errors
    ///
    /// Propagates [`medcart_core::cart::CartError`] from the ledger.
    pub fn confirm_switch_to_customer(
        &mut self,
    ) -> Result<(Vec<CartLine>, Option<QuoteTicket>), CheckoutError> {
        let removed = self.book.confirm_switch_to_customer()?;
        info!(removed = removed.len(), "switched to customer order");
        let ticket = self.requote();
        Ok((removed, ticket))
    }

    // =========================================================================
    // Tax
    // =========================================================================

    /// Record postal code input and open a quote if it is complete.
    pub fn set_postal_code(&mut self, raw: &str) -> Option<QuoteTicket> {
        self.postal_input = raw.to_string();
        self.requote()
    }

    /// Apply the result of a quote attempt issued under `ticket`.
    ///
    /// A stale ticket (superseded by a newer edit) is discarded silently.
    pub fn apply_tax_result(
        &mut self,
        ticket: &QuoteTicket,
        result: Result<tax::TaxBreakdown, tax::TaxError>,
    ) -> QuoteDisposition {
        match result {
            Ok(breakdown) => self.tax.complete(ticket, breakdown.tax_amount),
            Err(error) => {
                debug!(%error, "tax quote failed after retries");
                self.tax.fail(ticket)
            }
        }
    }

    fn requote(&mut self) -> Option<QuoteTicket> {
        self.tax.begin_quote(&self.postal_input, self.book.subtotal())
    }

    // =========================================================================
    // Tier lookups
    // =========================================================================

    fn tier_ticket_for(&mut self, product_id: &ProductId) -> Option<TierLookupTicket> {
        self.tier_generation += 1;
        let line = self.book.line(product_id)?;
        (self.book.mode() == OrderMode::Clinic && line.has_tier_pricing).then(|| {
            TierLookupTicket {
                generation: self.tier_generation,
                variant_id: line.variant_id.clone(),
            }
        })
    }

    /// Attach tier rules fetched under `ticket`.
    ///
    /// A ticket superseded by a newer quantity edit is discarded.
    pub fn apply_tier_lookup(
        &mut self,
        ticket: &TierLookupTicket,
        schedule: TierSchedule,
    ) -> TierLookupOutcome {
        if ticket.generation != self.tier_generation {
            return TierLookupOutcome::Superseded;
        }
        self.book.apply_tier_schedule(&ticket.variant_id, schedule);
        // the re-derived price may have moved the subtotal
        TierLookupOutcome::Applied { tax: self.requote() }
    }

    // =========================================================================
    // Submission
    // =========================================================================

    /// Final gate, tokenization, and payment submission.
    ///
    /// Validates every line, requires a usable tax figure, builds the order
    /// draft, tokenizes the card, and submits the payment request. The cart
    /// clears only after the payment call succeeds; on any failure the cart
    /// and session state are left intact so the user can retry.
    ///
    /// # Errors
    ///
    /// Gate failures ([`CheckoutError::Validation`],
    /// [`CheckoutError::TaxUnavailable`], [`CheckoutError::EmptyCart`],
    /// [`CheckoutError::CustomerRequired`],
    /// [`CheckoutError::SubmissionInFlight`],
    /// [`CheckoutError::AlreadySubmitted`]) and service failures.
    #[instrument(skip_all)]
    pub async fn submit<O, T, G>(
        &mut self,
        orders: &O,
        tokenizer: &T,
        gateway: &G,
        card: &CardDetails,
        billing_address: Address,
        shipping_address: Address,
    ) -> Result<OrderId, CheckoutError>
    where
        O: OrdersApi,
        T: CardTokenizer,
        G: PaymentGateway,
    {
        match self.submission {
            SubmissionState::InFlight => return Err(CheckoutError::SubmissionInFlight),
            SubmissionState::Completed(_) => return Err(CheckoutError::AlreadySubmitted),
            SubmissionState::Idle => {}
        }

        if !self.book.is_hydrated() {
            return Err(medcart_core::cart::CartError::NotHydrated.into());
        }
        if self.book.lines().is_empty() {
            return Err(CheckoutError::EmptyCart);
        }
        if self.book.mode() == OrderMode::Customer && self.customer.is_none() {
            return Err(CheckoutError::CustomerRequired);
        }
        let failures = validate_cart(&self.book);
        if !failures.is_empty() {
            return Err(CheckoutError::Validation(failures));
        }
        let tax_amount = self
            .tax
            .usable_tax()
            .ok_or(CheckoutError::TaxUnavailable)?
            .rounded();

        self.submission = SubmissionState::InFlight;
        let result = self
            .run_submission(
                orders,
                tokenizer,
                gateway,
                card,
                billing_address,
                shipping_address,
                tax_amount,
            )
            .await;

        match result {
            Ok(order_id) => {
                info!(%order_id, "order submitted");
                self.book.clear();
                self.submission = SubmissionState::Completed(order_id.clone());
                Ok(order_id)
            }
            Err(error) => {
                self.submission = SubmissionState::Idle;
                Err(error)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_submission<O, T, G>(
        &self,
        orders: &O,
        tokenizer: &T,
        gateway: &G,
        card: &CardDetails,
        billing_address: Address,
        shipping_address: Address,
        tax_amount: Money,
    ) -> Result<OrderId, CheckoutError>
    where
        O: OrdersApi,
        T: CardTokenizer,
        G: PaymentGateway,
    {
        let draft = OrderDraft {
            mode: self.book.mode(),
            customer_id: self.customer.clone(),
            lines: self
                .book
                .lines()
                .iter()
                .map(|line| OrderDraftLine {
                    variant_id: line.variant_id.clone(),
                    quantity: line.effective_quantity(),
                    unit_price: line.effective_price(),
                })
                .collect(),
        };

        let order_id = orders.create_order(&draft).await?;
        let token = tokenizer.tokenize(card).await?;

        let request = PaymentRequest {
            order_id: order_id.clone(),
            amount: (self.book.subtotal() + tax_amount).rounded(),
            tax_amount,
            opaque_data: token,
            billing_address,
            shipping_address,
        };
        gateway.submit(&request).await?;

        Ok(order_id)
    }
}

/// Debounce, then fetch tier rules for the ticket's variant.
///
/// Cancellation is advisory: if the user keeps typing, the ticket simply
/// goes stale and [`CheckoutSession::apply_tier_lookup`] ignores the result.
///
/// # Errors
///
/// Propagates the backend error from the lookup.
pub async fn fetch_tier_prices_debounced<O: OrdersApi>(
    orders: &O,
    ticket: &TierLookupTicket,
) -> Result<TierSchedule, crate::orders::OrdersError> {
    tokio::time::sleep(TIER_LOOKUP_DEBOUNCE).await;
    orders.tier_prices(&ticket.variant_id).await
}

/// Mirror confirmed line removals to the shared remote cart.
///
/// # Errors
///
/// Propagates the first backend error; already-mirrored removals stand.
pub async fn mirror_cart_removals<O: OrdersApi>(
    orders: &O,
    removed: &[CartLine],
) -> Result<(), crate::orders::OrdersError> {
    for line in removed {
        if let Some(cart_item_id) = &line.source_cart_item_id {
            orders.remove_cart_item(cart_item_id).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use medcart_core::cart::RemoteCartLine;
    use medcart_core::types::CartItemId;

    fn pricing(base: u64, marked: Option<u64>) -> ProductPricing {
        ProductPricing {
            base_price: Money::from_cents(base),
            custom_price: marked.map(Money::from_cents),
            has_price_history: marked.is_some(),
            latest_marked_up_price: marked.map(Money::from_cents),
        }
    }

    fn hydrated_session(mode: OrderMode) -> CheckoutSession {
        let mut session = CheckoutSession::new(mode);
        session.book.apply_remote(vec![]);
        session
    }

    #[test]
    fn test_postal_and_subtotal_changes_supersede_quotes() {
        let mut session = hydrated_session(OrderMode::Customer);
        session
            .add_product(
                ProductId::new("p1"),
                VariantId::new("v1"),
                "CoQ10",
                1,
                pricing(10000, Some(10000)),
                false,
            )
            .unwrap();

        assert!(session.set_postal_code("941").is_none());
        let first = session.set_postal_code("94107").unwrap();

        // an edit supersedes the in-flight quote
        let lookups = session
            .edit_quantity(&ProductId::new("p1"), 2)
            .unwrap();
        let second = lookups.tax.unwrap();

        assert_eq!(
            session.apply_tax_result(
                &first,
                Ok(tax::TaxBreakdown {
                    tax_amount: Money::from_cents(875),
                    total_price: Money::from_cents(10875),
                })
            ),
            QuoteDisposition::Stale
        );
        assert_eq!(
            session.apply_tax_result(
                &second,
                Ok(tax::TaxBreakdown {
                    tax_amount: Money::from_cents(1750),
                    total_price: Money::from_cents(21750),
                })
            ),
            QuoteDisposition::Applied
        );

        let TaxState::Quoted(quote) = session.tax_state() else {
            panic!("expected quoted state");
        };
        assert_eq!(quote.total, Money::from_cents(21750));
    }

    #[test]
    fn test_tier_ticket_only_for_clinic_tier_lines() {
        let mut session = hydrated_session(OrderMode::Customer);
        session
            .add_product(
                ProductId::new("p1"),
                VariantId::new("v1"),
                "CoQ10",
                1,
                pricing(10000, Some(10000)),
                true,
            )
            .unwrap();
        // customer mode: no tier lookup
        let lookups = session.edit_quantity(&ProductId::new("p1"), 2).unwrap();
        assert!(lookups.tier.is_none());

        let mut session = hydrated_session(OrderMode::Clinic);
        session
            .add_product(
                ProductId::new("p1"),
                VariantId::new("v1"),
                "CoQ10",
                1,
                pricing(10000, None),
                true,
            )
            .unwrap();
        let lookups = session.edit_quantity(&ProductId::new("p1"), 2).unwrap();
        assert!(lookups.tier.is_some());
    }

    #[test]
    fn test_stale_tier_lookup_superseded() {
        let mut session = hydrated_session(OrderMode::Clinic);
        session
            .add_product(
                ProductId::new("p1"),
                VariantId::new("v1"),
                "CoQ10",
                2,
                pricing(1000, None),
                true,
            )
            .unwrap();

        let first = session
            .edit_quantity(&ProductId::new("p1"), 3)
            .unwrap()
            .tier
            .unwrap();
        let second = session
            .edit_quantity(&ProductId::new("p1"), 6)
            .unwrap()
            .tier
            .unwrap();

        let schedule = TierSchedule::new(vec![medcart_core::tier::TierRule {
            start_count: 1,
            end_count: None,
            tiered_price: Money::from_cents(800),
        }])
        .unwrap();

        assert_eq!(
            session.apply_tier_lookup(&first, schedule.clone()),
            TierLookupOutcome::Superseded
        );
        assert!(matches!(
            session.apply_tier_lookup(&second, schedule),
            TierLookupOutcome::Applied { .. }
        ));
        assert_eq!(
            session.cart().lines()[0].effective_price(),
            Money::from_cents(800)
        );
    }

    #[test]
    fn test_remote_line_hydration_via_apply_remote() {
        let mut session = CheckoutSession::new(OrderMode::Customer);
        assert!(!session.cart().is_hydrated());
        session.book.apply_remote(vec![RemoteCartLine {
            cart_item_id: CartItemId::new("ci_1"),
            product_id: ProductId::new("p1"),
            variant_id: VariantId::new("v1"),
            name: "CoQ10".to_string(),
            quantity: 1,
            unit_price: Money::from_cents(6000),
            has_tier_pricing: false,
            pricing: pricing(5000, Some(7500)),
        }]);
        assert!(session.cart().is_hydrated());
        // the remote price is the starting point, not a re-derived one
        assert_eq!(session.subtotal(), Money::from_cents(6000));
    }
}
