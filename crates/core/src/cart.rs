//! Cart lines, local-edit tracking, and reconciliation against the shared
//! remote cart.
//!
//! The shared cart is mutated by other sessions of the same doctor, so every
//! hydration cycle re-delivers the full remote line set. [`CartBook`] merges
//! those refreshes without clobbering in-progress edits: each editable field
//! is an [`Edited`] pair of `{remote, local_override}`, and the override wins
//! until it is explicitly cleared. Whether a field "has been edited" is a
//! stored fact, never inferred by diffing values against a prior snapshot.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tier::TierSchedule;
use crate::types::{CartItemId, Money, ProductId, VariantId};

/// Which kind of order this cart is building.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderMode {
    /// An order billed to a patient at marked-up pricing.
    #[default]
    Customer,
    /// A house order for the clinic itself at base/tiered pricing.
    Clinic,
}

/// A remote value with an optional local override.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edited<T> {
    remote: T,
    local_override: Option<T>,
}

impl<T> Edited<T> {
    pub const fn new(remote: T) -> Self {
        Self {
            remote,
            local_override: None,
        }
    }

    /// The value in effect: the override if present, else the remote value.
    pub const fn effective(&self) -> &T {
        match &self.local_override {
            Some(value) => value,
            None => &self.remote,
        }
    }

    pub const fn is_edited(&self) -> bool {
        self.local_override.is_some()
    }

    pub fn set_override(&mut self, value: T) {
        self.local_override = Some(value);
    }

    /// Drop the override and fall back to the remote value.
    pub fn clear_override(&mut self) {
        self.local_override = None;
    }

    /// Take a fresh remote value without disturbing any override.
    pub fn sync_remote(&mut self, remote: T) {
        self.remote = remote;
    }

    /// Replace the remote value and drop the override (used when a price is
    /// re-derived wholesale, e.g. on an order-mode switch).
    pub fn reset(&mut self, remote: T) {
        self.remote = remote;
        self.local_override = None;
    }
}

/// Pricing facts for a product, as reported by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductPricing {
    /// The list price before any doctor markup.
    pub base_price: Money,
    /// A custom price the doctor set for their patients, if any.
    pub custom_price: Option<Money>,
    /// Whether the product carries any price-change history entries.
    pub has_price_history: bool,
    /// Ceiling for customer-mode price edits; the most recent marked-up
    /// price when one exists.
    pub latest_marked_up_price: Option<Money>,
}

impl ProductPricing {
    /// The single definition of "marked up" used everywhere: any price
    /// history entry, or a custom price on file.
    #[must_use]
    pub const fn is_marked_up(&self) -> bool {
        self.custom_price.is_some() || self.has_price_history
    }
}

/// One line of the checkout cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub variant_id: VariantId,
    pub name: String,
    pub quantity: Edited<u32>,
    pub unit_price: Edited<Money>,
    pub original_price: Money,
    pub latest_marked_up_price: Option<Money>,
    pub has_tier_pricing: bool,
    pub is_marked_up: bool,
    /// The remote cart item this line mirrors, if it came from the shared
    /// cart rather than a purely local add.
    pub source_cart_item_id: Option<CartItemId>,
    /// Remote tier rules for this variant once the async lookup lands.
    pub tier_schedule: Option<TierSchedule>,
}

impl CartLine {
    #[must_use]
    pub fn effective_quantity(&self) -> u32 {
        *self.quantity.effective()
    }

    #[must_use]
    pub fn effective_price(&self) -> Money {
        *self.unit_price.effective()
    }

    #[must_use]
    pub fn line_total(&self) -> Money {
        self.effective_price() * self.effective_quantity()
    }

    /// The unit price this line should carry under `mode`, at `quantity`.
    ///
    /// Clinic mode prefers the remote tier schedule, then the local fallback
    /// table; with tier pricing but no covering rule the price is left at
    /// `current` (a rule gap is a backend data problem, not a user error).
    fn derived_price(
        &self,
        mode: OrderMode,
        quantity: u32,
        current: Money,
        local_tiers: &HashMap<VariantId, TierSchedule>,
    ) -> Money {
        match mode {
            OrderMode::Customer => self.latest_marked_up_price.unwrap_or(self.original_price),
            OrderMode::Clinic => {
                if !self.has_tier_pricing {
                    return self.original_price;
                }
                self.tier_schedule
                    .as_ref()
                    .and_then(|schedule| schedule.price_for(quantity))
                    .or_else(|| {
                        local_tiers
                            .get(&self.variant_id)
                            .and_then(|schedule| schedule.price_for(quantity))
                    })
                    .unwrap_or(current)
            }
        }
    }
}

/// A line as delivered by a hydration/refresh of the shared remote cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteCartLine {
    pub cart_item_id: CartItemId,
    pub product_id: ProductId,
    pub variant_id: VariantId,
    pub name: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub has_tier_pricing: bool,
    pub pricing: ProductPricing,
}

/// Cart operations that cannot proceed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CartError {
    /// The shared cart has not finished its first load; no reconciliation
    /// or removal decision may be taken on incomplete data.
    #[error("shared cart not hydrated yet")]
    NotHydrated,

    /// No line exists for the product.
    #[error("product {0} is not in the cart")]
    UnknownProduct(ProductId),

    /// Quantities start at one.
    #[error("quantity must be at least 1")]
    InvalidQuantity,
}

/// Outcome of requesting an order-mode switch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModeSwitch {
    /// The switch was applied and every line's price re-derived.
    Applied,
    /// Clinic -> Customer would drop these non-marked-up lines; nothing has
    /// changed yet. Call [`CartBook::confirm_switch_to_customer`] to proceed.
    NeedsConfirmation { lines_to_remove: Vec<ProductId> },
}

/// The local cart ledger: reconciles remote refreshes with local edits and
/// owns the order-mode state.
#[derive(Debug, Clone, Default)]
pub struct CartBook {
    mode: OrderMode,
    hydrated: bool,
    lines: Vec<CartLine>,
    /// Fallback tier tables keyed by variant, used until remote tier data
    /// arrives for a line.
    local_tiers: HashMap<VariantId, TierSchedule>,
}

impl CartBook {
    #[must_use]
    pub fn new(mode: OrderMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn mode(&self) -> OrderMode {
        self.mode
    }

    #[must_use]
    pub const fn is_hydrated(&self) -> bool {
        self.hydrated
    }

    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    #[must_use]
    pub fn line(&self, product_id: &ProductId) -> Option<&CartLine> {
        self.lines.iter().find(|line| line.product_id == *product_id)
    }

    #[must_use]
    pub fn subtotal(&self) -> Money {
        self.lines.iter().map(CartLine::line_total).sum()
    }

    /// Install a local fallback tier table for a variant.
    pub fn set_local_tiers(&mut self, variant_id: VariantId, schedule: TierSchedule) {
        self.local_tiers.insert(variant_id, schedule);
    }

    /// Apply a full remote cart snapshot.
    ///
    /// The first call flips the hydration gate; every call reconciles:
    /// - lines present remotely sync their remote quantity/price, keeping
    ///   any local overrides in effect;
    /// - remote lines not seen before are added with their remote price;
    /// - local lines that vanished remotely are dropped unless they carry
    ///   local edits (eventual consistency: an edited line that briefly
    ///   disappears must not lose the user's work).
    pub fn apply_remote(&mut self, remote: Vec<RemoteCartLine>) {
        self.hydrated = true;

        let mut incoming: HashMap<ProductId, RemoteCartLine> = remote
            .into_iter()
            .map(|line| (line.product_id.clone(), line))
            .collect();

        self.lines.retain_mut(|line| {
            if let Some(remote_line) = incoming.remove(&line.product_id) {
                line.source_cart_item_id = Some(remote_line.cart_item_id);
                line.quantity.sync_remote(remote_line.quantity);
                line.unit_price.sync_remote(remote_line.unit_price);
                line.original_price = remote_line.pricing.base_price;
                line.latest_marked_up_price = remote_line.pricing.latest_marked_up_price;
                line.is_marked_up = remote_line.pricing.is_marked_up();
                true
            } else {
                line.quantity.is_edited() || line.unit_price.is_edited()
            }
        });

        for (_, remote_line) in incoming {
            let line = Self::line_from_remote(remote_line);
            self.lines.push(line);
        }
    }

    // The remote cart is the source of truth for a line it delivers: its
    // quantity and price come through as-is. Mode switches and tier lookups
    // re-derive prices afterwards.
    fn line_from_remote(remote: RemoteCartLine) -> CartLine {
        CartLine {
            product_id: remote.product_id,
            variant_id: remote.variant_id,
            name: remote.name,
            quantity: Edited::new(remote.quantity),
            unit_price: Edited::new(remote.unit_price),
            original_price: remote.pricing.base_price,
            latest_marked_up_price: remote.pricing.latest_marked_up_price,
            has_tier_pricing: remote.has_tier_pricing,
            is_marked_up: remote.pricing.is_marked_up(),
            source_cart_item_id: Some(remote.cart_item_id),
            tier_schedule: None,
        }
    }

    /// Add a product to the cart.
    ///
    /// Adding a product already present merges by summing quantities and
    /// re-derives the price at the combined quantity; it never creates a
    /// duplicate line.
    ///
    /// # Errors
    ///
    /// [`CartError::NotHydrated`] before the first remote snapshot,
    /// [`CartError::InvalidQuantity`] for a zero quantity.
    pub fn add_product(
        &mut self,
        product_id: ProductId,
        variant_id: VariantId,
        name: impl Into<String>,
        quantity: u32,
        pricing: ProductPricing,
        has_tier_pricing: bool,
    ) -> Result<(), CartError> {
        if !self.hydrated {
            return Err(CartError::NotHydrated);
        }
        if quantity == 0 {
            return Err(CartError::InvalidQuantity);
        }

        if let Some(index) = self.index_of(&product_id) {
            let mode = self.mode;
            let local_tiers = &self.local_tiers;
            let line = self
                .lines
                .get_mut(index)
                .ok_or(CartError::UnknownProduct(product_id))?;
            let combined = line.effective_quantity().saturating_add(quantity);
            let price = line.derived_price(mode, combined, line.effective_price(), local_tiers);
            line.quantity.set_override(combined);
            line.unit_price.reset(price);
            return Ok(());
        }

        let mut line = CartLine {
            product_id,
            variant_id,
            name: name.into(),
            quantity: Edited::new(quantity),
            unit_price: Edited::new(pricing.base_price),
            original_price: pricing.base_price,
            latest_marked_up_price: pricing.latest_marked_up_price,
            has_tier_pricing,
            is_marked_up: pricing.is_marked_up(),
            source_cart_item_id: None,
            tier_schedule: None,
        };
        let price = line.derived_price(self.mode, quantity, pricing.base_price, &self.local_tiers);
        line.unit_price = Edited::new(price);
        self.lines.push(line);
        Ok(())
    }

    /// Override a line's quantity.
    ///
    /// # Errors
    ///
    /// [`CartError::InvalidQuantity`] for zero,
    /// [`CartError::UnknownProduct`] for an absent line.
    pub fn edit_quantity(&mut self, product_id: &ProductId, quantity: u32) -> Result<(), CartError> {
        if quantity == 0 {
            return Err(CartError::InvalidQuantity);
        }
        let mode = self.mode;
        let local_tiers = self.local_tiers.clone();
        let line = self.line_mut(product_id)?;
        line.quantity.set_override(quantity);
        // Clinic tier pricing follows the quantity immediately from local
        // data; the remote tier lookup may refine it later.
        if mode == OrderMode::Clinic && line.has_tier_pricing {
            let price = line.derived_price(mode, quantity, line.effective_price(), &local_tiers);
            line.unit_price.reset(price);
        }
        Ok(())
    }

    /// Override a line's unit price.
    ///
    /// # Errors
    ///
    /// [`CartError::UnknownProduct`] for an absent line.
    pub fn edit_price(&mut self, product_id: &ProductId, price: Money) -> Result<(), CartError> {
        self.line_mut(product_id)?.unit_price.set_override(price);
        Ok(())
    }

    /// Remove a line outright, returning it.
    ///
    /// # Errors
    ///
    /// [`CartError::UnknownProduct`] for an absent line.
    pub fn remove_line(&mut self, product_id: &ProductId) -> Result<CartLine, CartError> {
        let index = self
            .index_of(product_id)
            .ok_or_else(|| CartError::UnknownProduct(product_id.clone()))?;
        Ok(self.lines.remove(index))
    }

    /// Attach remote tier rules for a variant and re-derive affected prices
    /// in clinic mode.
    pub fn apply_tier_schedule(&mut self, variant_id: &VariantId, schedule: TierSchedule) {
        let mode = self.mode;
        let local_tiers = self.local_tiers.clone();
        for line in &mut self.lines {
            if line.variant_id == *variant_id {
                line.tier_schedule = Some(schedule.clone());
                if mode == OrderMode::Clinic && line.has_tier_pricing {
                    let price = line.derived_price(
                        mode,
                        line.effective_quantity(),
                        line.effective_price(),
                        &local_tiers,
                    );
                    line.unit_price.reset(price);
                }
            }
        }
    }

    /// Request an order-mode switch.
    ///
    /// Customer -> Clinic (and no-op switches) apply immediately and
    /// re-derive every price. Clinic -> Customer is destructive when the
    /// cart holds non-marked-up lines: those may not appear on a customer
    /// order, so the switch is returned as
    /// [`ModeSwitch::NeedsConfirmation`] and nothing changes until
    /// [`Self::confirm_switch_to_customer`].
    ///
    /// # Errors
    ///
    /// [`CartError::NotHydrated`] before the first remote snapshot - a
    /// removal decision must never be based on incomplete data.
    pub fn set_mode(&mut self, mode: OrderMode) -> Result<ModeSwitch, CartError> {
        if !self.hydrated {
            return Err(CartError::NotHydrated);
        }
        if mode == self.mode {
            return Ok(ModeSwitch::Applied);
        }
        if mode == OrderMode::Customer {
            let lines_to_remove: Vec<ProductId> = self
                .lines
                .iter()
                .filter(|line| !line.is_marked_up)
                .map(|line| line.product_id.clone())
                .collect();
            if !lines_to_remove.is_empty() {
                return Ok(ModeSwitch::NeedsConfirmation { lines_to_remove });
            }
        }
        self.mode = mode;
        self.rederive_all_prices();
        Ok(ModeSwitch::Applied)
    }

    /// Complete a confirmed Clinic -> Customer switch, returning the removed
    /// lines so the caller can mirror the deletions to the remote cart.
    ///
    /// # Errors
    ///
    /// [`CartError::NotHydrated`] before the first remote snapshot.
    pub fn confirm_switch_to_customer(&mut self) -> Result<Vec<CartLine>, CartError> {
        if !self.hydrated {
            return Err(CartError::NotHydrated);
        }
        let mut removed = Vec::new();
        self.lines.retain_mut(|line| {
            if line.is_marked_up {
                true
            } else {
                removed.push(line.clone());
                false
            }
        });
        self.mode = OrderMode::Customer;
        self.rederive_all_prices();
        Ok(removed)
    }

    fn rederive_all_prices(&mut self) {
        let mode = self.mode;
        let local_tiers = self.local_tiers.clone();
        for line in &mut self.lines {
            let price = line.derived_price(
                mode,
                line.effective_quantity(),
                line.effective_price(),
                &local_tiers,
            );
            line.unit_price.reset(price);
        }
    }

    /// Drop every line. Called only after an order submission succeeds -
    /// cart state must never be cleared on a failed or partial submission.
    pub fn clear(&mut self) {
        self.lines.clear();
    }

    fn index_of(&self, product_id: &ProductId) -> Option<usize> {
        self.lines
            .iter()
            .position(|line| line.product_id == *product_id)
    }

    fn line_mut(&mut self, product_id: &ProductId) -> Result<&mut CartLine, CartError> {
        let index = self
            .index_of(product_id)
            .ok_or_else(|| CartError::UnknownProduct(product_id.clone()))?;
        self.lines
            .get_mut(index)
            .ok_or_else(|| CartError::UnknownProduct(product_id.clone()))
    }
}
