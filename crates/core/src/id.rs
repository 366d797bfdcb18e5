//! Strongly-typed identifiers.
//!
//! Principal ids come from the identity layer; user and team ids are keys of
//! the directory stores. Mixing them up is a type error.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Fresh time-ordered (v7) id.
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<Uuid> for $name {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }

        impl From<$name> for Uuid {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl FromStr for $name {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s.trim())
                    .map(Self)
                    .map_err(|e| DomainError::invalid_id(format!("{}: {e}", stringify!($name))))
            }
        }
    };
}

uuid_id! {
    /// Identity of an authenticated principal, as issued by the identity layer.
    ///
    /// Record ownership is expressed in terms of this id.
    PrincipalId
}

uuid_id! {
    /// Internal user record id (profile store key, role-assignment store key).
    UserId
}

uuid_id! {
    /// Sales team id.
    TeamId
}
