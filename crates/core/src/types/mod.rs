//! Core types for Pantry.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod id;
pub mod owner;
pub mod price;
pub mod status;

pub use id::*;
pub use owner::{Owner, OwnerParseError};
pub use price::{CurrencyCode, Money};
pub use status::*;
