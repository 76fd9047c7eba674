//! Ledger persistence
//!
//! Balance records, immutable ledger entries and the `LedgerStore` seam
//! with its PostgreSQL and in-memory implementations.

pub mod balance;
pub mod entry;
pub mod postgres;
pub mod schema;
pub mod store;

#[cfg(any(test, feature = "mock-api"))]
pub mod memory;

pub use balance::{BalanceDelta, BalanceError, BalanceRecord, CounterBump, CreditChange};
pub use entry::{DepositCategory, LedgerEntry, MovementType, NewLedgerEntry, Origin};
pub use postgres::PgLedgerStore;
pub use store::{LedgerStore, MovementCommit, NewAccount, StoreError};

#[cfg(any(test, feature = "mock-api"))]
pub use memory::MemoryLedgerStore;
