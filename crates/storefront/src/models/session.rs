//! Session-related types.
//!
//! The authentication service signs users in by writing `current_user`; the
//! storefront only reads it. The guest identity is minted here.

use serde::{Deserialize, Serialize};

use pantry_core::UserId;

/// Session-stored user identity.
///
/// Minimal data stored in the session to identify the logged-in user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    /// User's database ID.
    pub id: UserId,
}

/// Session keys for identity data.
pub mod keys {
    /// Key for storing the current logged-in user (`CurrentUser`).
    pub const CURRENT_USER: &str = "current_user";

    /// Key for the anonymous shopper's id (`pantry_core::GuestSessionId`).
    pub const GUEST_SESSION_ID: &str = "guest_session_id";
}
