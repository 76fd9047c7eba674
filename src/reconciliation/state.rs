//! Movement FSM states
//!
//! A movement runs forward only:
//! `Init -> Validated -> WithdrawSettled -> DepositSettled -> Committed`.
//! "Settled" means the leg has a known outcome (completed, skipped or
//! failed), not that it moved money.
//!
//! Terminal states: COMMITTED (40), REJECTED (-10), REMOTE_FAILED (-20),
//! RECONCILIATION_PENDING (-30). Only the last one leaves the local ledger
//! diverged from the remote platform.

use std::fmt;

use super::error::ReconciliationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i16)]
pub enum MovementState {
    /// Request received
    Init = 0,

    /// Preconditions hold, no remote call made yet
    Validated = 10,

    /// Withdraw leg outcome known
    WithdrawSettled = 20,

    /// Both leg outcomes known, at least one remote transaction exists
    DepositSettled = 30,

    /// Terminal: entry and both balances persisted
    Committed = 40,

    /// Terminal: precondition failed, nothing happened anywhere
    Rejected = -10,

    /// Terminal: no remote leg produced a transaction, nothing persisted
    RemoteFailed = -20,

    /// Terminal: remote money moved but the local commit failed
    ReconciliationPending = -30,
}

impl MovementState {
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            MovementState::Committed
                | MovementState::Rejected
                | MovementState::RemoteFailed
                | MovementState::ReconciliationPending
        )
    }

    /// Remote side may differ from the local ledger
    #[inline]
    pub fn is_diverged(&self) -> bool {
        matches!(
            self,
            MovementState::WithdrawSettled
                | MovementState::DepositSettled
                | MovementState::ReconciliationPending
        )
    }

    pub fn can_transition_to(&self, next: MovementState) -> bool {
        use MovementState::*;
        matches!(
            (self, next),
            (Init, Validated)
                | (Init, Rejected)
                | (Validated, WithdrawSettled)
                | (Validated, RemoteFailed)
                | (WithdrawSettled, DepositSettled)
                | (WithdrawSettled, RemoteFailed)
                | (DepositSettled, Committed)
                | (DepositSettled, ReconciliationPending)
        )
    }

    pub fn transition(self, next: MovementState) -> Result<MovementState, ReconciliationError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(ReconciliationError::InvalidStateTransition(format!(
                "{} -> {}",
                self, next
            )))
        }
    }

    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            0 => Some(MovementState::Init),
            10 => Some(MovementState::Validated),
            20 => Some(MovementState::WithdrawSettled),
            30 => Some(MovementState::DepositSettled),
            40 => Some(MovementState::Committed),
            -10 => Some(MovementState::Rejected),
            -20 => Some(MovementState::RemoteFailed),
            -30 => Some(MovementState::ReconciliationPending),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MovementState::Init => "INIT",
            MovementState::Validated => "VALIDATED",
            MovementState::WithdrawSettled => "WITHDRAW_SETTLED",
            MovementState::DepositSettled => "DEPOSIT_SETTLED",
            MovementState::Committed => "COMMITTED",
            MovementState::Rejected => "REJECTED",
            MovementState::RemoteFailed => "REMOTE_FAILED",
            MovementState::ReconciliationPending => "RECONCILIATION_PENDING",
        }
    }
}

impl fmt::Display for MovementState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<i16> for MovementState {
    type Error = ();

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        MovementState::from_id(value).ok_or(())
    }
}
