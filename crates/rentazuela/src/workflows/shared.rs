use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a marketplace account (buyer, seller or publisher).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

/// Identifier of a persisted listing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ListingId(pub String);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for ListingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Who is invoking an operation, resolved upstream by the auth provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallerIdentity {
    Anonymous,
    Authenticated(UserId),
}

impl CallerIdentity {
    pub fn user(id: impl Into<String>) -> Self {
        Self::Authenticated(UserId(id.into()))
    }

    pub fn user_id(&self) -> Option<&UserId> {
        match self {
            CallerIdentity::Anonymous => None,
            CallerIdentity::Authenticated(id) => Some(id),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Currency {
    #[default]
    #[serde(rename = "USD")]
    Usd,
    #[serde(rename = "VES")]
    Ves,
}

impl Currency {
    pub const fn code(self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Ves => "VES",
        }
    }
}

/// Error enumeration for relational store failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Coarse failure classes shared by every workflow, used to pick HTTP statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Unauthenticated,
    NotFound,
    Forbidden,
    ValidationFailed,
    PersistenceFailure,
}
