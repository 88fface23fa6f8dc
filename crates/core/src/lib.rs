//! Pantry Core - Shared domain types and rules.
//!
//! This crate provides the types and pure rules used across all Pantry components:
//! - `storefront` - Cart, order and payment HTTP service
//! - `cart-client` - Optimistic client-side cart cache
//! - `cli` - Command-line tools for migrations and catalog management
//!
//! # Architecture
//!
//! The core crate contains only types and rules - no I/O, no database access,
//! no HTTP clients. Decisions that must hold on both sides of the wire (stock
//! checks, merge clamping, order pricing) live here so they can be tested
//! without a database.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for ids, owners, money and statuses
//! - [`cart`] - Cart wire types and quantity rules
//! - [`merge`] - Guest-to-user cart merge planning
//! - [`checkout`] - Order pricing and stock validation
//! - [`order`] - Order wire types and shipping address validation
//! - [`payment`] - Payment wire types

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod checkout;
pub mod merge;
pub mod order;
pub mod payment;
pub mod types;

pub use types::*;
