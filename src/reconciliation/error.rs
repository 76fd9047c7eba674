//! Reconciliation error taxonomy
//!
//! Every failure is returned to the caller as a value. Nothing here is
//! retried automatically; the caller may retry the whole movement.

use thiserror::Error;

use super::legs::LegOutcome;
use super::state::MovementState;
use crate::account::PolicyViolation;
use crate::core_types::{AccountId, ExternalId, MinorUnits, MovementId, RemoteTxId};
use crate::ledger::{BalanceRecord, DepositCategory, StoreError};
use crate::money::format_amount;
use crate::remote::RemoteError;

/// Everything needed to replay a movement whose remote legs executed but
/// whose local commit failed
#[derive(Debug, Clone, PartialEq)]
pub struct PendingReconciliation {
    pub movement_id: MovementId,
    pub sender: AccountId,
    pub receiver: AccountId,
    pub operator: AccountId,
    pub amount: MinorUnits,
    pub currency: String,
    pub category: DepositCategory,
    pub withdraw_tx_id: Option<RemoteTxId>,
    pub deposit_tx_id: Option<RemoteTxId>,
    pub cause: StoreError,
    /// Persisted balances reloaded after the rollback (`None` if the reload
    /// failed as well)
    pub sender_balance: Option<BalanceRecord>,
    pub receiver_balance: Option<BalanceRecord>,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReconciliationError {
    #[error("Insufficient funds on account {account}: available {}, requested {}", fmt_minor(.available), fmt_minor(.requested))]
    InsufficientFunds {
        account: AccountId,
        available: MinorUnits,
        requested: MinorUnits,
    },

    #[error("Policy violation: {0}")]
    PolicyViolation(#[from] PolicyViolation),

    #[error("Remote ledger failure: withdraw {withdraw}, deposit {deposit}")]
    RemoteLedgerFailure {
        withdraw: LegOutcome,
        deposit: LegOutcome,
    },

    #[error("Local commit of movement {} failed after remote legs executed: {}", .0.movement_id, .0.cause)]
    PersistenceFailure(Box<PendingReconciliation>),

    #[error("Funding of new account {account} failed: {source}")]
    FundingFailure {
        account: AccountId,
        /// Remote account left in place
        external_id: ExternalId,
        source: Box<ReconciliationError>,
    },

    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Remote provisioning failed: {0}")]
    Provisioning(RemoteError),

    #[error("Password hashing failed: {0}")]
    PasswordHash(String),

    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),
}

fn fmt_minor(value: &MinorUnits) -> String {
    format_amount(*value)
}

impl ReconciliationError {
    pub fn code(&self) -> &'static str {
        match self {
            ReconciliationError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            ReconciliationError::PolicyViolation(_) => "POLICY_VIOLATION",
            ReconciliationError::RemoteLedgerFailure { .. } => "REMOTE_LEDGER_FAILURE",
            ReconciliationError::PersistenceFailure(_) => "PERSISTENCE_FAILURE",
            ReconciliationError::FundingFailure { .. } => "FUNDING_FAILURE",
            ReconciliationError::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            ReconciliationError::Store(_) => "STORE_ERROR",
            ReconciliationError::Provisioning(_) => "PROVISIONING_FAILURE",
            ReconciliationError::PasswordHash(_) => "PASSWORD_HASH_FAILURE",
            ReconciliationError::InvalidStateTransition(_) => "INVALID_STATE_TRANSITION",
        }
    }

    /// State the movement ended in
    pub fn terminal_state(&self) -> MovementState {
        match self {
            ReconciliationError::RemoteLedgerFailure { .. } => MovementState::RemoteFailed,
            ReconciliationError::PersistenceFailure(_) => MovementState::ReconciliationPending,
            ReconciliationError::FundingFailure { source, .. } => source.terminal_state(),
            _ => MovementState::Rejected,
        }
    }

    /// Remote and local state may disagree and need manual attention
    pub fn needs_manual_reconciliation(&self) -> bool {
        self.terminal_state().is_diverged()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_and_states() {
        let e = ReconciliationError::InsufficientFunds {
            account: 1,
            available: 100,
            requested: 250,
        };
        assert_eq!(e.code(), "INSUFFICIENT_FUNDS");
        assert_eq!(e.terminal_state(), MovementState::Rejected);
        assert_eq!(
            e.to_string(),
            "Insufficient funds on account 1: available 1.00, requested 2.50"
        );

        let e = ReconciliationError::RemoteLedgerFailure {
            withdraw: LegOutcome::Skipped,
            deposit: LegOutcome::Skipped,
        };
        assert_eq!(e.terminal_state(), MovementState::RemoteFailed);
        assert!(!e.needs_manual_reconciliation());
    }

    #[test]
    fn test_funding_failure_inherits_inner_state() {
        let pending = PendingReconciliation {
            movement_id: MovementId::new(),
            sender: 1,
            receiver: 2,
            operator: 1,
            amount: 500,
            currency: "USD".to_string(),
            category: DepositCategory::WeeklySettlement,
            withdraw_tx_id: None,
            deposit_tx_id: Some(77),
            cause: StoreError::Database("down".to_string()),
            sender_balance: None,
            receiver_balance: None,
        };
        let e = ReconciliationError::FundingFailure {
            account: 2,
            external_id: 900,
            source: Box::new(ReconciliationError::PersistenceFailure(Box::new(pending))),
        };
        assert_eq!(e.code(), "FUNDING_FAILURE");
        assert_eq!(e.terminal_state(), MovementState::ReconciliationPending);
        assert!(e.needs_manual_reconciliation());
    }
}
