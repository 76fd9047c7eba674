//! Remote wagering platform ledger
//!
//! The remote platform keeps its own balances per player and per agent.
//! Every local movement is mirrored by up to two remote legs: a withdraw
//! from the sender and a deposit to the receiver. Amounts cross this seam
//! as positive minor units; implementations convert to the wire format.

pub mod error;
pub mod http;

#[cfg(any(test, feature = "mock-api"))]
pub mod mock;

pub use error::RemoteError;
pub use http::HttpRemoteLedger;

#[cfg(any(test, feature = "mock-api"))]
pub use mock::MockRemoteLedger;

use async_trait::async_trait;
use std::fmt;

use crate::account::Tier;
use crate::config::ApiCredentials;
use crate::core_types::{ExternalId, MinorUnits, RemoteTxId};

/// Short-lived token from `connect`
///
/// Valid for one movement at most; never cached across movements.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(***)")
    }
}

/// One remote money operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteOp {
    TransferToUser,
    TransferToAgent,
    WithdrawFromPlayer,
    WithdrawFromAgent,
}

impl RemoteOp {
    /// Path segment of the remote data endpoint
    pub fn endpoint(&self) -> &'static str {
        match self {
            RemoteOp::TransferToUser => "TransferMoneyToUser",
            // Spelling is the remote platform's
            RemoteOp::TransferToAgent => "TransferMoneyToAgant",
            RemoteOp::WithdrawFromPlayer => "WithdrawFromPlayer",
            RemoteOp::WithdrawFromAgent => "WithdrawFromAgent",
        }
    }

    /// Whether the target is addressed as a player (`playerId`)
    pub fn targets_player(&self) -> bool {
        matches!(self, RemoteOp::TransferToUser | RemoteOp::WithdrawFromPlayer)
    }

    pub fn is_withdraw(&self) -> bool {
        matches!(self, RemoteOp::WithdrawFromPlayer | RemoteOp::WithdrawFromAgent)
    }

    /// `moneyStatus` the remote platform expects for the target kind
    pub fn money_status(&self) -> i32 {
        if self.targets_player() { 5 } else { 3 }
    }
}

impl fmt::Display for RemoteOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.endpoint())
    }
}

/// Profile sent to the remote provisioning calls
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteProfile {
    pub username: String,
    pub email: String,
    pub password: String,
    pub nickname: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub currency: String,
}

/// Client for the remote wagering platform's ledger and provisioning API
#[async_trait]
pub trait RemoteLedger: Send + Sync {
    /// Name for logging
    fn name(&self) -> &'static str;

    async fn connect(&self, credentials: &ApiCredentials) -> Result<SessionToken, RemoteError>;

    async fn transfer_to_user(
        &self,
        token: &SessionToken,
        player: ExternalId,
        amount: MinorUnits,
        comment: &str,
        currency: &str,
    ) -> Result<RemoteTxId, RemoteError>;

    async fn transfer_to_agent(
        &self,
        token: &SessionToken,
        agent: ExternalId,
        amount: MinorUnits,
        comment: &str,
        currency: &str,
    ) -> Result<RemoteTxId, RemoteError>;

    /// `amount` is positive; the wire value is negated
    async fn withdraw_from_player(
        &self,
        token: &SessionToken,
        player: ExternalId,
        amount: MinorUnits,
        comment: &str,
        currency: &str,
    ) -> Result<RemoteTxId, RemoteError>;

    /// `amount` is positive; the wire value is negated
    async fn withdraw_from_agent(
        &self,
        token: &SessionToken,
        agent: ExternalId,
        amount: MinorUnits,
        comment: &str,
        currency: &str,
    ) -> Result<RemoteTxId, RemoteError>;

    async fn create_agent_account(
        &self,
        token: &SessionToken,
        profile: &RemoteProfile,
        tier: Tier,
        parent: ExternalId,
    ) -> Result<ExternalId, RemoteError>;

    async fn create_player_account(
        &self,
        token: &SessionToken,
        profile: &RemoteProfile,
        parent: ExternalId,
    ) -> Result<ExternalId, RemoteError>;

    /// Dispatch one leg by operation
    async fn execute(
        &self,
        op: RemoteOp,
        token: &SessionToken,
        target: ExternalId,
        amount: MinorUnits,
        comment: &str,
        currency: &str,
    ) -> Result<RemoteTxId, RemoteError> {
        match op {
            RemoteOp::TransferToUser => {
                self.transfer_to_user(token, target, amount, comment, currency)
                    .await
            }
            RemoteOp::TransferToAgent => {
                self.transfer_to_agent(token, target, amount, comment, currency)
                    .await
            }
            RemoteOp::WithdrawFromPlayer => {
                self.withdraw_from_player(token, target, amount, comment, currency)
                    .await
            }
            RemoteOp::WithdrawFromAgent => {
                self.withdraw_from_agent(token, target, amount, comment, currency)
                    .await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_op_wire_attributes() {
        assert_eq!(RemoteOp::TransferToUser.money_status(), 5);
        assert_eq!(RemoteOp::WithdrawFromPlayer.money_status(), 5);
        assert_eq!(RemoteOp::TransferToAgent.money_status(), 3);
        assert_eq!(RemoteOp::WithdrawFromAgent.money_status(), 3);
        assert!(RemoteOp::WithdrawFromAgent.is_withdraw());
        assert!(!RemoteOp::TransferToAgent.is_withdraw());
        assert_eq!(RemoteOp::TransferToAgent.endpoint(), "TransferMoneyToAgant");
    }

    #[test]
    fn test_token_debug_is_redacted() {
        let token = SessionToken::new("abc123");
        assert_eq!(format!("{:?}", token), "SessionToken(***)");
        assert_eq!(token.as_str(), "abc123");
    }
}
