//! Data models for the account hierarchy

use chrono::{DateTime, Utc};
use std::fmt;

use crate::core_types::{AccountId, ExternalId, MinorUnits};

/// Account tier in the hierarchy
///
/// Tier IDs are stored in PostgreSQL as SMALLINT and double as the rank:
/// a higher id sits higher in the tree. The super agent is the root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(i16)]
pub enum Tier {
    Player = 1,
    Agent = 2,
    MasterAgent = 3,
    SuperAgent = 4,
}

impl Tier {
    pub const ALL: [Tier; 4] = [
        Tier::Player,
        Tier::Agent,
        Tier::MasterAgent,
        Tier::SuperAgent,
    ];

    /// Get the numeric tier ID for PostgreSQL storage
    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    /// Zero-based index, for tier-pair lookup tables
    #[inline]
    pub fn index(&self) -> usize {
        (*self as i16 - 1) as usize
    }

    /// Convert from PostgreSQL tier ID
    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            1 => Some(Tier::Player),
            2 => Some(Tier::Agent),
            3 => Some(Tier::MasterAgent),
            4 => Some(Tier::SuperAgent),
            _ => None,
        }
    }

    #[inline]
    pub fn is_player(&self) -> bool {
        matches!(self, Tier::Player)
    }

    /// Root of the hierarchy; has no upstream ledger on the remote platform
    #[inline]
    pub fn is_root(&self) -> bool {
        matches!(self, Tier::SuperAgent)
    }

    /// Tier an account of this tier must be created under
    pub fn parent_tier(&self) -> Option<Tier> {
        match self {
            Tier::Player => Some(Tier::Agent),
            Tier::Agent => Some(Tier::MasterAgent),
            Tier::MasterAgent => Some(Tier::SuperAgent),
            Tier::SuperAgent => None,
        }
    }

    /// `agentRole` code expected by the remote CreateAgent call
    pub fn api_role(&self) -> Option<i32> {
        match self {
            Tier::SuperAgent => Some(1),
            Tier::MasterAgent => Some(2),
            Tier::Agent => Some(3),
            Tier::Player => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Player => "player",
            Tier::Agent => "agent",
            Tier::MasterAgent => "master_agent",
            Tier::SuperAgent => "super_agent",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "player" => Some(Tier::Player),
            "agent" => Some(Tier::Agent),
            "master" | "master_agent" => Some(Tier::MasterAgent),
            "super" | "super_agent" => Some(Tier::SuperAgent),
            _ => None,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<i16> for Tier {
    type Error = ();

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        Tier::from_id(value).ok_or(())
    }
}

/// Financial limits a parent hands down to its children
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AccountLimits {
    /// Revenue share ("bank") percentage, 0-100
    pub revenue_share_pct: i32,
    /// Discount limit percentage, 0-100
    pub discount_limit_pct: i32,
    /// Minimum bet limit in minor units
    pub bet_limit: MinorUnits,
}

/// One party in the hierarchy
#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    pub account_id: AccountId,
    pub username: String,
    pub email: String,
    pub tier: Tier,
    /// Owning account; `None` only for the root super agent
    pub parent_id: Option<AccountId>,
    /// Identifier on the remote wagering platform
    pub external_id: ExternalId,
    pub currency: String,
    pub limits: AccountLimits,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_id_roundtrip() {
        for tier in Tier::ALL {
            assert_eq!(Tier::from_id(tier.id()), Some(tier));
        }
        assert!(Tier::from_id(0).is_none());
        assert!(Tier::try_from(9).is_err());
    }

    #[test]
    fn test_tier_ordering_is_rank() {
        assert!(Tier::SuperAgent > Tier::MasterAgent);
        assert!(Tier::MasterAgent > Tier::Agent);
        assert!(Tier::Agent > Tier::Player);
        assert_eq!(Tier::Player.index(), 0);
        assert_eq!(Tier::SuperAgent.index(), 3);
    }

    #[test]
    fn test_parent_tier() {
        assert_eq!(Tier::Player.parent_tier(), Some(Tier::Agent));
        assert_eq!(Tier::Agent.parent_tier(), Some(Tier::MasterAgent));
        assert_eq!(Tier::MasterAgent.parent_tier(), Some(Tier::SuperAgent));
        assert_eq!(Tier::SuperAgent.parent_tier(), None);
        assert!(Tier::SuperAgent.is_root());
    }

    #[test]
    fn test_tier_parse() {
        assert_eq!(Tier::parse("Master-Agent"), Some(Tier::MasterAgent));
        assert_eq!(Tier::parse("super"), Some(Tier::SuperAgent));
        assert_eq!(Tier::parse("PLAYER"), Some(Tier::Player));
        assert_eq!(Tier::parse("admin"), None);
        assert_eq!(Tier::MasterAgent.to_string(), "master_agent");
    }
}
