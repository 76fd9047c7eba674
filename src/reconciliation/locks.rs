//! Per-account movement locks
//!
//! A movement holds the locks of both its accounts from the balance check
//! through the local commit, so two movements on the same account cannot
//! both pass the funds check against the same pre-movement balance.
//!
//! An account's entry lives only while some movement holds or waits for
//! it; the last guard to release it removes it from the map.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::core_types::AccountId;

#[derive(Default)]
pub struct AccountLocks {
    locks: DashMap<AccountId, Arc<Mutex<()>>>,
}

/// Held for the duration of one movement
pub struct PairGuard<'a> {
    locks: &'a AccountLocks,
    ids: (AccountId, AccountId),
    first: Option<OwnedMutexGuard<()>>,
    second: Option<OwnedMutexGuard<()>>,
}

impl Drop for PairGuard<'_> {
    fn drop(&mut self) {
        self.second.take();
        self.first.take();
        self.locks.prune(self.ids.0);
        if self.ids.1 != self.ids.0 {
            self.locks.prune(self.ids.1);
        }
    }
}

impl AccountLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn handle(&self, account_id: AccountId) -> Arc<Mutex<()>> {
        self.locks
            .entry(account_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop the entry unless a movement still holds or awaits it
    ///
    /// `handle` clones under the same shard lock, so a clone taken before
    /// this runs keeps the count above one.
    fn prune(&self, account_id: AccountId) {
        self.locks
            .remove_if(&account_id, |_, lock| Arc::strong_count(lock) == 1);
    }

    /// Lock two accounts, lowest id first
    pub async fn lock_pair(&self, a: AccountId, b: AccountId) -> PairGuard<'_> {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };

        let first = self.handle(low).lock_owned().await;
        let second = if high != low {
            Some(self.handle(high).lock_owned().await)
        } else {
            None
        };

        PairGuard {
            locks: self,
            ids: (low, high),
            first: Some(first),
            second,
        }
    }

    pub fn tracked(&self) -> usize {
        self.locks.len()
    }
}
