//! In-memory ledger store for tests
//!
//! Mirrors the all-or-nothing contract of the PostgreSQL store: both
//! deltas are applied to copies first and written back only if both
//! succeed. Commit failures can be injected to exercise the
//! reconciliation-pending path.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use super::balance::BalanceRecord;
use super::entry::LedgerEntry;
use super::store::{LedgerStore, MovementCommit, NewAccount, StoreError};
use crate::account::{Account, AccountLimits, Tier};
use crate::core_types::{AccountId, ExternalId, MinorUnits};

#[derive(Default)]
struct State {
    accounts: BTreeMap<AccountId, Account>,
    password_hashes: HashMap<AccountId, String>,
    balances: HashMap<AccountId, BalanceRecord>,
    entries: Vec<LedgerEntry>,
    next_account_id: AccountId,
    next_entry_id: i64,
}

pub struct MemoryLedgerStore {
    state: Mutex<State>,
    fail_commits: AtomicBool,
    fail_next_commit: AtomicBool,
    fail_inserts: AtomicBool,
    commit_count: AtomicUsize,
}

impl Default for MemoryLedgerStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                next_account_id: 1,
                next_entry_id: 1,
                ..State::default()
            }),
            fail_commits: AtomicBool::new(false),
            fail_next_commit: AtomicBool::new(false),
            fail_inserts: AtomicBool::new(false),
            commit_count: AtomicUsize::new(0),
        }
    }

    /// Every subsequent commit fails until reset
    pub fn set_fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }

    /// Only the next commit fails
    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }

    pub fn set_fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }

    /// Commit attempts, successful or not
    pub fn commit_count(&self) -> usize {
        self.commit_count.load(Ordering::SeqCst)
    }

    pub fn entry_count(&self) -> usize {
        self.state.lock().unwrap().entries.len()
    }

    pub fn account_count(&self) -> usize {
        self.state.lock().unwrap().accounts.len()
    }

    pub fn password_hash(&self, account_id: AccountId) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .password_hashes
            .get(&account_id)
            .cloned()
    }

    /// Insert an account directly, bypassing provisioning
    pub fn seed_account(
        &self,
        tier: Tier,
        parent_id: Option<AccountId>,
        external_id: ExternalId,
        available_balance: MinorUnits,
        limits: AccountLimits,
    ) -> Account {
        let mut state = self.state.lock().unwrap();
        let account_id = state.next_account_id;
        state.next_account_id += 1;

        let username = format!("{}{}", tier.as_str(), account_id);
        let account = Account {
            account_id,
            email: format!("{}@agents.local", username),
            username,
            tier,
            parent_id,
            external_id,
            currency: "USD".to_string(),
            limits,
            created_at: Utc::now(),
        };
        let mut balance = BalanceRecord::new(account_id);
        balance.available_balance = available_balance;

        state.accounts.insert(account_id, account.clone());
        state.balances.insert(account_id, balance);
        account
    }

    /// Overwrite a balance record
    pub fn set_balance(&self, record: BalanceRecord) {
        self.state
            .lock()
            .unwrap()
            .balances
            .insert(record.account_id, record);
    }

    pub fn entries(&self) -> Vec<LedgerEntry> {
        self.state.lock().unwrap().entries.clone()
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn account(&self, account_id: AccountId) -> Result<Option<Account>, StoreError> {
        Ok(self.state.lock().unwrap().accounts.get(&account_id).cloned())
    }

    async fn balance(&self, account_id: AccountId) -> Result<Option<BalanceRecord>, StoreError> {
        Ok(self.state.lock().unwrap().balances.get(&account_id).cloned())
    }

    async fn insert_account(&self, new: &NewAccount) -> Result<Account, StoreError> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(StoreError::Database("injected insert failure".to_string()));
        }

        let mut state = self.state.lock().unwrap();
        if state.accounts.values().any(|a| a.username == new.username) {
            return Err(StoreError::Database(format!(
                "duplicate username {}",
                new.username
            )));
        }

        let account_id = state.next_account_id;
        state.next_account_id += 1;

        let account = Account {
            account_id,
            username: new.username.clone(),
            email: new.email.clone(),
            tier: new.tier,
            parent_id: new.parent_id,
            external_id: new.external_id,
            currency: new.currency.clone(),
            limits: new.limits,
            created_at: Utc::now(),
        };
        state.accounts.insert(account_id, account.clone());
        state
            .password_hashes
            .insert(account_id, new.password_hash.clone());
        state
            .balances
            .insert(account_id, BalanceRecord::new(account_id));
        Ok(account)
    }

    async fn delete_account(&self, account_id: AccountId) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        if state.accounts.remove(&account_id).is_none() {
            return Err(StoreError::AccountNotFound(account_id));
        }
        state.balances.remove(&account_id);
        state.password_hashes.remove(&account_id);
        Ok(())
    }

    async fn commit_movement(&self, commit: &MovementCommit) -> Result<LedgerEntry, StoreError> {
        self.commit_count.fetch_add(1, Ordering::SeqCst);
        if self.fail_commits.load(Ordering::SeqCst)
            || self.fail_next_commit.swap(false, Ordering::SeqCst)
        {
            return Err(StoreError::Database("injected commit failure".to_string()));
        }

        let mut state = self.state.lock().unwrap();

        let sender = state
            .balances
            .get(&commit.sender.account_id)
            .ok_or(StoreError::AccountNotFound(commit.sender.account_id))?
            .apply(&commit.sender)?;
        let receiver = state
            .balances
            .get(&commit.receiver.account_id)
            .ok_or(StoreError::AccountNotFound(commit.receiver.account_id))?
            .apply(&commit.receiver)?;

        let entry_id = state.next_entry_id;
        state.next_entry_id += 1;
        let entry = LedgerEntry::from_new(entry_id, commit.entry.clone(), Utc::now());

        state.balances.insert(sender.account_id, sender);
        state.balances.insert(receiver.account_id, receiver);
        state.entries.push(entry.clone());
        Ok(entry)
    }

    async fn entries_for(
        &self,
        account_id: AccountId,
        limit: usize,
    ) -> Result<Vec<LedgerEntry>, StoreError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .entries
            .iter()
            .rev()
            .filter(|e| e.sender_id == account_id || e.receiver_id == account_id)
            .take(limit)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::balance::{BalanceDelta, CounterBump, CreditChange};
    use crate::ledger::entry::{DepositCategory, MovementType, NewLedgerEntry, Origin};
    use crate::core_types::MovementId;

    fn commit(sender: AccountId, receiver: AccountId, amount: MinorUnits) -> MovementCommit {
        MovementCommit {
            entry: NewLedgerEntry {
                movement_id: MovementId::new(),
                amount,
                sender_id: sender,
                receiver_id: receiver,
                operator_id: sender,
                withdraw_tx_id: Some(1),
                deposit_tx_id: Some(2),
                movement_type: MovementType::Deposit,
                category: DepositCategory::Additional,
                currency: "USD".to_string(),
                comment: String::new(),
                origin: Origin::System,
            },
            sender: BalanceDelta {
                account_id: sender,
                available: -amount,
                counter: CounterBump::DepositSent,
                counter_amount: amount,
                credit: CreditChange::Keep,
                reset_discount: false,
            },
            receiver: BalanceDelta {
                account_id: receiver,
                available: amount,
                counter: CounterBump::DepositReceived,
                counter_amount: amount,
                credit: CreditChange::Keep,
                reset_discount: false,
            },
        }
    }

    #[tokio::test]
    async fn test_commit_applies_both_sides() {
        let store = MemoryLedgerStore::new();
        let a = store.seed_account(Tier::Agent, None, 1, 1_000, AccountLimits::default());
        let p = store.seed_account(Tier::Player, Some(a.account_id), 2, 0, AccountLimits::default());

        let entry = store
            .commit_movement(&commit(a.account_id, p.account_id, 400))
            .await
            .unwrap();
        assert_eq!(entry.entry_id, 1);

        let a_bal = store.balance(a.account_id).await.unwrap().unwrap();
        let p_bal = store.balance(p.account_id).await.unwrap().unwrap();
        assert_eq!(a_bal.available_balance, 600);
        assert_eq!(p_bal.available_balance, 400);
        assert_eq!(store.entries_for(p.account_id, 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_receiver_leaves_sender_untouched() {
        let store = MemoryLedgerStore::new();
        let a = store.seed_account(Tier::Agent, None, 1, 1_000, AccountLimits::default());

        let result = store.commit_movement(&commit(a.account_id, 99, 400)).await;
        assert_eq!(result, Err(StoreError::AccountNotFound(99)));

        let a_bal = store.balance(a.account_id).await.unwrap().unwrap();
        assert_eq!(a_bal.available_balance, 1_000);
        assert_eq!(store.entry_count(), 0);
    }

    #[tokio::test]
    async fn test_injected_failure_is_one_shot() {
        let store = MemoryLedgerStore::new();
        let a = store.seed_account(Tier::Agent, None, 1, 1_000, AccountLimits::default());
        let p = store.seed_account(Tier::Player, Some(a.account_id), 2, 0, AccountLimits::default());

        store.fail_next_commit();
        assert!(
            store
                .commit_movement(&commit(a.account_id, p.account_id, 1))
                .await
                .is_err()
        );
        assert!(
            store
                .commit_movement(&commit(a.account_id, p.account_id, 1))
                .await
                .is_ok()
        );
        assert_eq!(store.commit_count(), 2);
    }

    #[tokio::test]
    async fn test_root_account_walk() {
        let store = MemoryLedgerStore::new();
        let s = store.seed_account(Tier::SuperAgent, None, 1, 0, AccountLimits::default());
        let m = store.seed_account(Tier::MasterAgent, Some(s.account_id), 2, 0, AccountLimits::default());
        let a = store.seed_account(Tier::Agent, Some(m.account_id), 3, 0, AccountLimits::default());

        let root = store.root_account(a.account_id).await.unwrap();
        assert_eq!(root.account_id, s.account_id);
    }
}
