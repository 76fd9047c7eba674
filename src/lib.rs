//! tier_ledger - back-office ledger reconciliation for a tiered betting platform
//!
//! Super agents own master agents, masters own agents, agents own players.
//! Every money movement between two accounts is mirrored on a remote
//! wagering platform that is not transactional with the local database;
//! this crate keeps the two consistent.
//!
//! # Modules
//!
//! - [`core_types`] - Core type definitions (AccountId, MovementId, etc.)
//! - [`money`] - Minor/major unit conversion
//! - [`config`] - YAML application config
//! - [`logging`] - tracing subscriber setup
//! - [`db`] - PostgreSQL pool
//! - [`account`] - Tier hierarchy, creation policy, provisioning
//! - [`remote`] - Remote wagering platform client
//! - [`ledger`] - Balances, ledger entries and their stores
//! - [`reconciliation`] - Movement engine, settlement, operator operations

// Core types - must be first!
pub mod core_types;

pub mod config;
pub mod db;
pub mod logging;
pub mod money;

pub mod account;
pub mod ledger;
pub mod reconciliation;
pub mod remote;

// Convenient re-exports at crate root
pub use account::{Account, AccountLimits, AccountProvisioner, NewAccountRequest, Tier};
pub use core_types::{AccountId, ExternalId, MinorUnits, MovementId, RemoteTxId};
pub use ledger::{BalanceRecord, LedgerEntry, LedgerStore, PgLedgerStore};
pub use reconciliation::{
    MovementRequest, OperatorContext, ReconciliationEngine, ReconciliationError, SettlementKind,
};
pub use remote::{HttpRemoteLedger, RemoteLedger};
