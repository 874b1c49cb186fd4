//! Cached validation outcomes.
use chrono::{DateTime, Utc};

/// Why a record was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOrigin {
    /// The validation resource accepted the token (positive cache).
    Confirmed,
    /// The validation resource answered with a non-200 status. Applies to every claimant.
    Rejected,
    /// The token is valid but belongs to someone other than `owner_id`.
    /// Applies only to that claimant.
    OwnerMismatch,
}

/// A validation outcome stored in one of the validator's caches.
///
/// `expiration` is not optional: a record that cannot be given a deadline is never built,
/// so it can never be cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRecord {
    pub token: String,
    pub owner_id: Option<String>,
    pub expiration: DateTime<Utc>,
    pub origin: RecordOrigin,
}

impl TokenRecord {
    pub fn confirmed(
        token: impl Into<String>,
        owner_id: Option<String>,
        expiration: DateTime<Utc>,
    ) -> Self {
        Self {
            token: token.into(),
            owner_id,
            expiration,
            origin: RecordOrigin::Confirmed,
        }
    }

    pub fn rejected(
        token: impl Into<String>,
        owner_id: Option<String>,
        expiration: DateTime<Utc>,
    ) -> Self {
        Self {
            token: token.into(),
            owner_id,
            expiration,
            origin: RecordOrigin::Rejected,
        }
    }

    pub fn owner_mismatch(
        token: impl Into<String>,
        claimant: impl Into<String>,
        expiration: DateTime<Utc>,
    ) -> Self {
        Self {
            token: token.into(),
            owner_id: Some(claimant.into()),
            expiration,
            origin: RecordOrigin::OwnerMismatch,
        }
    }

    /// A record is fresh strictly before its expiration.
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expiration > now
    }

    /// Whether a negative record should answer for `claimant`.
    ///
    /// - `Rejected`: the token itself is bad, so it answers for everyone.
    /// - `OwnerMismatch`: only the claimant that was caught using someone else's token.
    /// - `Confirmed` records never answer negatively.
    pub fn rejects(&self, claimant: Option<&str>) -> bool {
        match self.origin {
            RecordOrigin::Rejected => true,
            RecordOrigin::OwnerMismatch => {
                claimant.is_some() && self.owner_id.as_deref() == claimant
            }
            RecordOrigin::Confirmed => false,
        }
    }

    /// Identity binding on a positive hit.
    ///
    /// A record without an owner was validated without an identity concept and is bound
    /// to the token alone.
    pub fn accepts(&self, claimant: Option<&str>) -> bool {
        match (self.owner_id.as_deref(), claimant) {
            (_, None) | (None, _) => true,
            (Some(owner), Some(claimant)) => owner == claimant,
        }
    }
}
