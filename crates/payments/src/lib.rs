//! `lms-payments` — bridge to the external payment processor.
//!
//! Two halves:
//! - outbound: [`PaymentGateway`] creates hosted checkout sessions
//! - inbound: [`WebhookVerifier`] authenticates processor callbacks before
//!   any field of the payload is trusted

pub mod checkout;
pub mod error;
pub mod offline;
pub mod stripe;
pub mod webhook;

pub use checkout::{
    CheckoutMetadata, CheckoutRequest, CheckoutSession, DEFAULT_PRICE, PaymentGateway,
    price_in_cents,
};
pub use error::{PaymentError, WebhookError};
pub use offline::OfflineGateway;
pub use stripe::StripeGateway;
pub use webhook::{
    CHECKOUT_COMPLETED, CheckoutCompleted, DEFAULT_TOLERANCE_SECS, WebhookEvent, WebhookVerifier,
};
