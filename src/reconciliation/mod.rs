//! Money movement reconciliation
//!
//! Keeps the local ledger consistent with the remote wagering platform,
//! which is not transactional with the local database.
//!
//! # Movement flow
//! ```text
//! validate ─► withdraw leg ─► deposit leg ─► local commit
//!    │             │               │              │
//!    └ Rejected    └───────┬───────┘              └ ReconciliationPending
//!                          └ RemoteFailed (no leg produced a transaction)
//! ```

pub mod engine;
pub mod error;
pub mod legs;
pub mod locks;
pub mod operations;
pub mod settlement;
pub mod state;

pub use engine::{MovementRequest, OperatorContext, ProfileReset, ReconciliationEngine};
pub use error::{PendingReconciliation, ReconciliationError};
pub use legs::{LEG_TABLE, LegOutcome, LegPlan, plan_for};
pub use locks::AccountLocks;
pub use settlement::SettlementKind;
pub use state::MovementState;
