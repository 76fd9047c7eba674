//! Storage seam for accounts, balances and ledger entries

use async_trait::async_trait;
use thiserror::Error;

use super::balance::{BalanceDelta, BalanceError, BalanceRecord};
use super::entry::{LedgerEntry, NewLedgerEntry};
use crate::account::{Account, AccountLimits, Tier};
use crate::core_types::{AccountId, ExternalId};

/// Maximum parent hops from any account to the root
const MAX_TREE_DEPTH: usize = 8;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    #[error(transparent)]
    Balance(#[from] BalanceError),

    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

/// Everything one movement persists, built as plain values up front
#[derive(Debug, Clone, PartialEq)]
pub struct MovementCommit {
    pub entry: NewLedgerEntry,
    pub sender: BalanceDelta,
    pub receiver: BalanceDelta,
}

/// Local account row to insert (a zeroed balance record goes with it)
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub tier: Tier,
    pub parent_id: Option<AccountId>,
    pub username: String,
    pub email: String,
    pub external_id: ExternalId,
    pub currency: String,
    pub limits: AccountLimits,
    pub password_hash: String,
    pub phone: Option<String>,
}

/// Persistence operations used by the reconciliation core
///
/// `commit_movement` is all-or-nothing: the entry and both balance updates
/// are persisted together or not at all.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn account(&self, account_id: AccountId) -> Result<Option<Account>, StoreError>;

    async fn balance(&self, account_id: AccountId) -> Result<Option<BalanceRecord>, StoreError>;

    /// Insert an account together with its zeroed balance record
    async fn insert_account(&self, account: &NewAccount) -> Result<Account, StoreError>;

    /// Remove an account and its balance record
    async fn delete_account(&self, account_id: AccountId) -> Result<(), StoreError>;

    /// Atomically write the entry and apply both balance deltas
    async fn commit_movement(&self, commit: &MovementCommit) -> Result<LedgerEntry, StoreError>;

    /// Latest entries where the account is sender or receiver, newest first
    async fn entries_for(
        &self,
        account_id: AccountId,
        limit: usize,
    ) -> Result<Vec<LedgerEntry>, StoreError>;

    /// Walk parent links up to the root super agent
    async fn root_account(&self, account_id: AccountId) -> Result<Account, StoreError> {
        let mut current = self
            .account(account_id)
            .await?
            .ok_or(StoreError::AccountNotFound(account_id))?;

        for _ in 0..MAX_TREE_DEPTH {
            match current.parent_id {
                None => return Ok(current),
                Some(parent_id) => {
                    current = self
                        .account(parent_id)
                        .await?
                        .ok_or(StoreError::AccountNotFound(parent_id))?;
                }
            }
        }

        Err(StoreError::Corrupt(format!(
            "account {} is more than {} levels below any root",
            account_id, MAX_TREE_DEPTH
        )))
    }
}
