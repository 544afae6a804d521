//! Medcart Core - Checkout domain logic.
//!
//! This crate holds the pure half of the Medcart checkout engine, shared by
//! the `checkout` client crate and the integration tests:
//! - [`types`] - Newtype IDs, money, and order/request status enums
//! - [`card`] - Card network detection and display grouping
//! - [`tier`] - Quantity-tiered price lookup
//! - [`validate`] - Per-line price validation rules
//! - [`cart`] - Cart lines, local-edit tracking, and reconciliation
//! - [`tax`] - Tax quote state machine and postal code normalization
//!
//! # Architecture
//!
//! The core crate contains only types and logic - no I/O, no HTTP clients,
//! no async runtime. Every remote interaction (cart hydration, tax quoting,
//! payment submission) lives in the `checkout` crate; what lives here is the
//! arithmetic and the rules, so they can be tested in isolation.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod card;
pub mod cart;
pub mod tax;
pub mod tier;
pub mod types;
pub mod validate;

pub use types::*;
