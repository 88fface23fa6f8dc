//! Business logic services for storefront.
//!
//! # Services
//!
//! - `cart` - Cart store CRUD with in-transaction stock checks
//! - `merge` - Guest-to-user cart merge at sign-in
//! - `checkout` - Cart-to-order pipeline (COD finalizes inline)
//! - `payments` - Gateway order creation, callback verification, webhooks
//!
//! Services borrow the pool (and, for payments, the gateway client) from
//! `AppState`; each call owns its transaction.

pub mod cart;
pub mod checkout;
pub mod merge;
pub mod payments;

pub use cart::{CartError, CartService};
pub use checkout::{CheckoutError, CheckoutService};
pub use merge::{MergeError, MergeOutcome, MergeService};
pub use payments::{PaymentError, PaymentService, WebhookOutcome};
