//! Domain models for storefront.
//!
//! Persistent rows live next to their queries in `db`; this module holds the
//! values kept in the session.

pub mod session;

pub use session::{CurrentUser, keys as session_keys};
