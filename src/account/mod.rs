//! Account hierarchy
//!
//! Tiers, account profiles, creation policy and the provisioning workflow.

pub mod models;
pub mod password;
pub mod provisioning;
pub mod validation;

pub use models::{Account, AccountLimits, Tier};
pub use password::{hash_password, verify_password};
pub use provisioning::AccountProvisioner;
pub use validation::{NewAccountRequest, PolicyViolation, check_creation_policy};
