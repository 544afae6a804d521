//! Clients for the non-GraphQL services a checkout touches.

pub mod address;
pub mod payment;
pub mod tax;

pub use address::{Address, AddressClient, AddressError};
pub use payment::{
    CardDetails, CardTokenizer, OpaqueToken, PaymentClient, PaymentError, PaymentGateway,
    PaymentRequest, TokenizationError,
};
pub use tax::{TaxBreakdown, TaxClient, TaxError, TaxService};
