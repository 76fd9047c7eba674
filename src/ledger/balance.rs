//! Balance records and the deltas a movement applies to them
//!
//! A movement never mutates a `BalanceRecord` in place. The engine builds a
//! `BalanceDelta` per side as a plain value and the store applies both with
//! [`BalanceRecord::apply`] inside one transaction.

use thiserror::Error;

use crate::core_types::{AccountId, MinorUnits};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum BalanceError {
    #[error("Balance of account {account_id} would go negative: available {available}, change {change}")]
    WouldGoNegative {
        account_id: AccountId,
        available: MinorUnits,
        change: MinorUnits,
    },

    #[error("Balance arithmetic overflow on account {0}")]
    Overflow(AccountId),

    #[error("Delta for account {delta} applied to account {record}")]
    AccountMismatch { record: AccountId, delta: AccountId },
}

/// Persisted balance and aggregate counters of one account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceRecord {
    pub account_id: AccountId,
    pub available_balance: MinorUnits,
    /// Ad-hoc funding received outside the weekly settlement cycle
    pub additional_credit: MinorUnits,
    pub discount_status: bool,
    pub deposits_sent_count: i64,
    pub deposits_sent_amount: MinorUnits,
    pub deposits_received_count: i64,
    pub deposits_received_amount: MinorUnits,
    pub cashouts_sent_count: i64,
    pub cashouts_sent_amount: MinorUnits,
    pub cashouts_received_count: i64,
    pub cashouts_received_amount: MinorUnits,
}

/// Which running counter pair a delta bumps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterBump {
    DepositSent,
    DepositReceived,
    CashoutSent,
    CashoutReceived,
}

/// Effect on `additional_credit`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreditChange {
    Keep,
    Add(MinorUnits),
    Reset,
}

/// Mutation of one balance record, built before anything is persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceDelta {
    pub account_id: AccountId,
    /// Signed change to `available_balance`
    pub available: MinorUnits,
    pub counter: CounterBump,
    /// Always the (positive) movement amount
    pub counter_amount: MinorUnits,
    pub credit: CreditChange,
    pub reset_discount: bool,
}

impl BalanceRecord {
    /// Zeroed record for a freshly created account
    pub fn new(account_id: AccountId) -> Self {
        Self {
            account_id,
            available_balance: 0,
            additional_credit: 0,
            discount_status: false,
            deposits_sent_count: 0,
            deposits_sent_amount: 0,
            deposits_received_count: 0,
            deposits_received_amount: 0,
            cashouts_sent_count: 0,
            cashouts_sent_amount: 0,
            cashouts_received_count: 0,
            cashouts_received_amount: 0,
        }
    }

    /// Balance that may be handed down to new children: everything except
    /// the additional credit received on top of the settlement allowance.
    pub fn spendable(&self) -> MinorUnits {
        (self.available_balance - self.additional_credit).max(0)
    }

    /// Apply a delta, producing the new record.
    ///
    /// A debit may never take the balance below zero.
    pub fn apply(&self, delta: &BalanceDelta) -> Result<BalanceRecord, BalanceError> {
        if delta.account_id != self.account_id {
            return Err(BalanceError::AccountMismatch {
                record: self.account_id,
                delta: delta.account_id,
            });
        }

        let overflow = || BalanceError::Overflow(self.account_id);
        let mut next = self.clone();

        next.available_balance = self
            .available_balance
            .checked_add(delta.available)
            .ok_or_else(overflow)?;
        if delta.available < 0 && next.available_balance < 0 {
            return Err(BalanceError::WouldGoNegative {
                account_id: self.account_id,
                available: self.available_balance,
                change: delta.available,
            });
        }

        let (count, amount) = match delta.counter {
            CounterBump::DepositSent => {
                (&mut next.deposits_sent_count, &mut next.deposits_sent_amount)
            }
            CounterBump::DepositReceived => (
                &mut next.deposits_received_count,
                &mut next.deposits_received_amount,
            ),
            CounterBump::CashoutSent => {
                (&mut next.cashouts_sent_count, &mut next.cashouts_sent_amount)
            }
            CounterBump::CashoutReceived => (
                &mut next.cashouts_received_count,
                &mut next.cashouts_received_amount,
            ),
        };
        *count = count.checked_add(1).ok_or_else(overflow)?;
        *amount = amount
            .checked_add(delta.counter_amount)
            .ok_or_else(overflow)?;

        next.additional_credit = match delta.credit {
            CreditChange::Keep => self.additional_credit,
            CreditChange::Add(value) => self
                .additional_credit
                .checked_add(value)
                .ok_or_else(overflow)?,
            CreditChange::Reset => 0,
        };

        if delta.reset_discount {
            next.discount_status = false;
        }

        Ok(next)
    }
}
