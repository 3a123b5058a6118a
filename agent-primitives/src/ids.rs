//! Identifier types for decisions, ledger entries, and capability tokens.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Error;

/// Prefix carried by every capability token identifier.
pub const TOKEN_ID_PREFIX: &str = "cap_";

const TOKEN_ID_BODY_LEN: usize = 32;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generates a random identifier.
            #[must_use]
            pub fn random() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates an identifier from an existing UUID.
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the underlying UUID.
            #[must_use]
            pub const fn as_uuid(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::random()
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
                Display::fmt(&self.0, f)
            }
        }

        impl From<Uuid> for $name {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let uuid = Uuid::parse_str(s).map_err(Error::from)?;
                Ok(Self::from_uuid(uuid))
            }
        }
    };
}

uuid_id!(
    /// Identifier assigned to a single decision round trip.
    RequestId
);

uuid_id!(
    /// Identifier of a ledger entry.
    EntryId
);

/// Opaque, prefixed identifier of a capability token (`cap_` + 32 hex chars).
#[derive(Clone, Debug, Eq, Hash, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TokenId(String);

impl TokenId {
    /// Generates a fresh random token identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("{TOKEN_ID_PREFIX}{}", Uuid::new_v4().simple()))
    }

    /// Validates and wraps an existing token identifier.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTokenId`] if the prefix is missing or the body
    /// is not 32 lowercase hex characters.
    pub fn new(id: impl Into<String>) -> crate::Result<Self> {
        let id = id.into();
        let Some(body) = id.strip_prefix(TOKEN_ID_PREFIX) else {
            return Err(Error::InvalidTokenId {
                id,
                reason: format!("identifier must start with `{TOKEN_ID_PREFIX}`"),
            });
        };

        if body.len() != TOKEN_ID_BODY_LEN
            || !body.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f'))
        {
            return Err(Error::InvalidTokenId {
                id,
                reason: format!("identifier body must be {TOKEN_ID_BODY_LEN} lowercase hex characters"),
            });
        }

        Ok(Self(id))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for TokenId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TokenId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for TokenId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TokenId> for String {
    fn from(value: TokenId) -> Self {
        value.0
    }
}
