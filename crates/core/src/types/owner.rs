//! Cart ownership.
//!
//! A cart line belongs to exactly one identity: a signed-in user or a guest
//! session. Modelling the owner as a sum type makes "both" and "neither"
//! unrepresentable; the database stores the same pair as
//! `(owner_kind, owner_key)`.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use super::id::{GuestSessionId, UserId};
use super::status::OwnerKind;

/// The identity a cart line or order belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Owner {
    /// A signed-in user.
    User(UserId),
    /// An anonymous guest session.
    Guest(GuestSessionId),
}

/// Error returned when a stored `(owner_kind, owner_key)` pair is malformed.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid {kind} owner key: {key}")]
pub struct OwnerParseError {
    /// Owner kind that failed to parse.
    pub kind: OwnerKind,
    /// The offending key.
    pub key: String,
}

impl Owner {
    /// Discriminant stored in the `owner_kind` column.
    #[must_use]
    pub const fn kind(&self) -> OwnerKind {
        match self {
            Self::User(_) => OwnerKind::User,
            Self::Guest(_) => OwnerKind::Guest,
        }
    }

    /// Key stored in the `owner_key` column.
    #[must_use]
    pub fn key(&self) -> String {
        match self {
            Self::User(id) => id.to_string(),
            Self::Guest(id) => id.to_string(),
        }
    }

    /// Rebuild an owner from its stored column pair.
    ///
    /// # Errors
    ///
    /// Returns `OwnerParseError` if the key does not parse for the given kind.
    pub fn from_parts(kind: OwnerKind, key: &str) -> Result<Self, OwnerParseError> {
        let err = || OwnerParseError {
            kind,
            key: key.to_owned(),
        };
        match kind {
            OwnerKind::User => UserId::from_str(key).map(Self::User).map_err(|_| err()),
            OwnerKind::Guest => GuestSessionId::from_str(key)
                .map(Self::Guest)
                .map_err(|_| err()),
        }
    }

    /// The user id, if this owner is a signed-in user.
    #[must_use]
    pub const fn user_id(&self) -> Option<UserId> {
        match self {
            Self::User(id) => Some(*id),
            Self::Guest(_) => None,
        }
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.key())
    }
}

impl From<UserId> for Owner {
    fn from(id: UserId) -> Self {
        Self::User(id)
    }
}

impl From<GuestSessionId> for Owner {
    fn from(id: GuestSessionId) -> Self {
        Self::Guest(id)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parts_roundtrip() {
        let guest = Owner::Guest(GuestSessionId::generate());
        let rebuilt = Owner::from_parts(guest.kind(), &guest.key()).unwrap();
        assert_eq!(rebuilt, guest);

        let user = Owner::User(UserId::new(12));
        assert_eq!(user.key(), "12");
        assert_eq!(Owner::from_parts(OwnerKind::User, "12").unwrap(), user);
    }

    #[test]
    fn test_from_parts_rejects_mismatched_key() {
        assert!(Owner::from_parts(OwnerKind::User, "not-a-number").is_err());
        assert!(Owner::from_parts(OwnerKind::Guest, "17").is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(Owner::User(UserId::new(3)).to_string(), "user:3");
    }

    #[test]
    fn test_user_id() {
        assert_eq!(Owner::User(UserId::new(3)).user_id(), Some(UserId::new(3)));
        assert_eq!(Owner::Guest(GuestSessionId::generate()).user_id(), None);
    }
}
