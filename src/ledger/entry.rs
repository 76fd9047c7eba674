//! Ledger entry types
//!
//! One `LedgerEntry` is written per committed movement. Entries are
//! immutable: there is no update or delete path.

use chrono::{DateTime, Utc};
use std::fmt;

use crate::account::Tier;
use crate::core_types::{AccountId, MinorUnits, MovementId, RemoteTxId};

/// Direction of a movement relative to the hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i16)]
pub enum MovementType {
    /// Funds flow down the tree (parent side to child side)
    Deposit = 1,
    /// Funds flow up the tree
    Cashout = 2,
}

impl MovementType {
    /// Sender above receiver is a deposit, anything else a cash-out
    pub fn between(sender: Tier, receiver: Tier) -> Self {
        if sender > receiver {
            MovementType::Deposit
        } else {
            MovementType::Cashout
        }
    }

    pub fn id(&self) -> i16 {
        *self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            1 => Some(MovementType::Deposit),
            2 => Some(MovementType::Cashout),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::Deposit => "DEPOSIT",
            MovementType::Cashout => "CASHOUT",
        }
    }
}

impl fmt::Display for MovementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why the money moved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i16)]
pub enum DepositCategory {
    /// Ad-hoc operator movement outside the settlement cycle
    Additional = 1,
    /// Scheduled settlement, including the funding of a new account
    WeeklySettlement = 2,
}

impl DepositCategory {
    pub fn id(&self) -> i16 {
        *self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            1 => Some(DepositCategory::Additional),
            2 => Some(DepositCategory::WeeklySettlement),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DepositCategory::Additional => "ADDITIONAL",
            DepositCategory::WeeklySettlement => "WEEKLY_SETTLEMENT",
        }
    }
}

impl fmt::Display for DepositCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where a movement was initiated from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    /// Operator's client address
    Ip(String),
    /// Scheduled job, no human operator
    System,
}

impl Origin {
    const SYSTEM_MARKER: &'static str = "system";

    pub fn as_str(&self) -> &str {
        match self {
            Origin::Ip(ip) => ip,
            Origin::System => Self::SYSTEM_MARKER,
        }
    }

    pub fn parse(s: &str) -> Self {
        if s.is_empty() || s == Self::SYSTEM_MARKER {
            Origin::System
        } else {
            Origin::Ip(s.to_string())
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Entry content before the store assigns id and timestamp
#[derive(Debug, Clone, PartialEq)]
pub struct NewLedgerEntry {
    pub movement_id: MovementId,
    pub amount: MinorUnits,
    pub sender_id: AccountId,
    pub receiver_id: AccountId,
    pub operator_id: AccountId,
    pub withdraw_tx_id: Option<RemoteTxId>,
    pub deposit_tx_id: Option<RemoteTxId>,
    pub movement_type: MovementType,
    pub category: DepositCategory,
    pub currency: String,
    pub comment: String,
    pub origin: Origin,
}

/// A committed local+remote money movement
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEntry {
    pub entry_id: i64,
    pub movement_id: MovementId,
    pub amount: MinorUnits,
    pub sender_id: AccountId,
    pub receiver_id: AccountId,
    pub operator_id: AccountId,
    /// Remote id of the withdraw leg; `None` if skipped or failed
    pub withdraw_tx_id: Option<RemoteTxId>,
    /// Remote id of the deposit leg; `None` if skipped or failed
    pub deposit_tx_id: Option<RemoteTxId>,
    pub movement_type: MovementType,
    pub category: DepositCategory,
    pub currency: String,
    pub comment: String,
    pub origin: Origin,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn from_new(entry_id: i64, new: NewLedgerEntry, created_at: DateTime<Utc>) -> Self {
        Self {
            entry_id,
            movement_id: new.movement_id,
            amount: new.amount,
            sender_id: new.sender_id,
            receiver_id: new.receiver_id,
            operator_id: new.operator_id,
            withdraw_tx_id: new.withdraw_tx_id,
            deposit_tx_id: new.deposit_tx_id,
            movement_type: new.movement_type,
            category: new.category,
            currency: new.currency,
            comment: new.comment,
            origin: new.origin,
            created_at,
        }
    }

    /// Withdraw leg id as stored in the ledger table (0 when absent)
    pub fn withdraw_tx_raw(&self) -> RemoteTxId {
        self.withdraw_tx_id.unwrap_or(0)
    }

    /// Deposit leg id as stored in the ledger table (0 when absent)
    pub fn deposit_tx_raw(&self) -> RemoteTxId {
        self.deposit_tx_id.unwrap_or(0)
    }
}

/// Inverse of the `0 = absent` storage convention
pub fn tx_id_from_raw(raw: RemoteTxId) -> Option<RemoteTxId> {
    (raw != 0).then_some(raw)
}
