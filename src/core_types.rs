//! Core identifier types
//!
//! ULID-backed identifiers for every persisted record. ULIDs are monotonic,
//! sortable and need no coordination between nodes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// User identifier issued by the external identity provider.
///
/// The identity verifier extracts this from a bearer credential; the core
/// never mints user ids itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for UserId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

macro_rules! ulid_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(ulid::Ulid);

        impl $name {
            /// Generate a new unique identifier.
            pub fn new() -> Self {
                Self(ulid::Ulid::new())
            }

            /// Get the inner ULID value.
            pub fn inner(&self) -> ulid::Ulid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ulid::DecodeError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(ulid::Ulid::from_string(s)?))
            }
        }
    };
}

ulid_id! {
    /// Ledger account identifier.
    AccountId
}

ulid_id! {
    /// Transfer record identifier.
    TransferId
}

ulid_id! {
    /// TAN challenge identifier.
    ChallengeId
}

ulid_id! {
    /// Ledger entry identifier.
    EntryId
}

ulid_id! {
    /// Standing order identifier.
    OrderId
}
