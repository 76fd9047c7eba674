//! Core types used throughout the system
//!
//! These are fundamental type aliases used by all modules.
//! They provide semantic meaning and enable future type evolution.

use std::fmt;
use std::str::FromStr;

/// Account ID - local primary key of an account in the tier hierarchy.
///
/// # Constraints:
/// - **Immutable**: Once assigned, NEVER changes
/// - **Ordered**: Used to order row locks (lowest id first)
pub type AccountId = i64;

/// Identifier issued by the remote wagering platform for an account.
///
/// Players are addressed by `playerId`, agents by `affiliateId`; both are
/// numeric on the remote side.
pub type ExternalId = i64;

/// Remote transaction identifier returned by a successful money leg.
///
/// `0` never identifies a real remote transaction; it is what the ledger
/// table stores for a leg that was skipped or failed.
pub type RemoteTxId = i64;

/// Amount in minor currency units (cents). Signed: balances and
/// settlement adjustments may be negative.
pub type MinorUnits = i64;

/// Movement ID - ULID correlating every log line and the ledger entry of a
/// single money movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MovementId(ulid::Ulid);

impl MovementId {
    /// Generate a new unique MovementId
    pub fn new() -> Self {
        Self(ulid::Ulid::new())
    }

    /// Get the inner ULID value
    pub fn inner(&self) -> ulid::Ulid {
        self.0
    }
}

impl Default for MovementId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MovementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MovementId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(ulid::Ulid::from_string(s)?))
    }
}
