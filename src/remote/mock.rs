//! Call-counting remote ledger for tests

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};

use super::{RemoteError, RemoteLedger, RemoteOp, RemoteProfile, SessionToken};
use crate::account::Tier;
use crate::config::ApiCredentials;
use crate::core_types::{ExternalId, MinorUnits, RemoteTxId};

/// One recorded money leg
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedLeg {
    pub op: RemoteOp,
    pub target: ExternalId,
    pub amount: MinorUnits,
    pub currency: String,
    /// Transaction id handed out, `None` if the leg was made to fail
    pub tx_id: Option<RemoteTxId>,
}

pub struct MockRemoteLedger {
    legs: Mutex<Vec<RecordedLeg>>,
    created: Mutex<Vec<(String, Option<Tier>, ExternalId)>>,
    connect_count: AtomicUsize,
    create_count: AtomicUsize,
    next_tx_id: AtomicI64,
    next_external_id: AtomicI64,
    fail_connect: AtomicBool,
    fail_withdraw: AtomicBool,
    fail_deposit: AtomicBool,
    fail_create: AtomicBool,
    failing_ops: Mutex<HashSet<RemoteOp>>,
}

impl Default for MockRemoteLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRemoteLedger {
    pub fn new() -> Self {
        Self {
            legs: Mutex::new(Vec::new()),
            created: Mutex::new(Vec::new()),
            connect_count: AtomicUsize::new(0),
            create_count: AtomicUsize::new(0),
            next_tx_id: AtomicI64::new(1000),
            next_external_id: AtomicI64::new(5000),
            fail_connect: AtomicBool::new(false),
            fail_withdraw: AtomicBool::new(false),
            fail_deposit: AtomicBool::new(false),
            fail_create: AtomicBool::new(false),
            failing_ops: Mutex::new(HashSet::new()),
        }
    }

    pub fn set_fail_connect(&self, fail: bool) {
        self.fail_connect.store(fail, Ordering::SeqCst);
    }

    /// Fail every withdraw leg
    pub fn set_fail_withdraw(&self, fail: bool) {
        self.fail_withdraw.store(fail, Ordering::SeqCst);
    }

    /// Fail every deposit leg
    pub fn set_fail_deposit(&self, fail: bool) {
        self.fail_deposit.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    /// Fail one specific operation
    pub fn fail_op(&self, op: RemoteOp) {
        self.failing_ops.lock().unwrap().insert(op);
    }

    pub fn connect_count(&self) -> usize {
        self.connect_count.load(Ordering::SeqCst)
    }

    /// Money legs attempted, failed ones included
    pub fn leg_count(&self) -> usize {
        self.legs.lock().unwrap().len()
    }

    pub fn create_count(&self) -> usize {
        self.create_count.load(Ordering::SeqCst)
    }

    /// Every remote call of any kind
    pub fn total_calls(&self) -> usize {
        self.connect_count() + self.leg_count() + self.create_count()
    }

    pub fn legs(&self) -> Vec<RecordedLeg> {
        self.legs.lock().unwrap().clone()
    }

    pub fn created_accounts(&self) -> Vec<(String, Option<Tier>, ExternalId)> {
        self.created.lock().unwrap().clone()
    }

    fn should_fail(&self, op: RemoteOp) -> bool {
        let by_direction = if op.is_withdraw() {
            self.fail_withdraw.load(Ordering::SeqCst)
        } else {
            self.fail_deposit.load(Ordering::SeqCst)
        };
        by_direction || self.failing_ops.lock().unwrap().contains(&op)
    }

    fn record(
        &self,
        op: RemoteOp,
        target: ExternalId,
        amount: MinorUnits,
        currency: &str,
    ) -> Result<RemoteTxId, RemoteError> {
        let failed = self.should_fail(op);
        let tx_id = (!failed).then(|| self.next_tx_id.fetch_add(1, Ordering::SeqCst));

        self.legs.lock().unwrap().push(RecordedLeg {
            op,
            target,
            amount,
            currency: currency.to_string(),
            tx_id,
        });

        tx_id.ok_or_else(|| RemoteError::Api(format!("Mock {} failure", op)))
    }

    fn provision(&self, username: &str, tier: Option<Tier>) -> Result<ExternalId, RemoteError> {
        self.create_count.fetch_add(1, Ordering::SeqCst);
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(RemoteError::Api("Mock provisioning failure".to_string()));
        }
        let id = self.next_external_id.fetch_add(1, Ordering::SeqCst);
        self.created
            .lock()
            .unwrap()
            .push((username.to_string(), tier, id));
        Ok(id)
    }
}

#[async_trait]
impl RemoteLedger for MockRemoteLedger {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn connect(&self, credentials: &ApiCredentials) -> Result<SessionToken, RemoteError> {
        self.connect_count.fetch_add(1, Ordering::SeqCst);
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(RemoteError::Connect("Mock connect failure".to_string()));
        }
        Ok(SessionToken::new(format!("token-{}", credentials.username)))
    }

    async fn transfer_to_user(
        &self,
        _token: &SessionToken,
        player: ExternalId,
        amount: MinorUnits,
        _comment: &str,
        currency: &str,
    ) -> Result<RemoteTxId, RemoteError> {
        self.record(RemoteOp::TransferToUser, player, amount, currency)
    }

    async fn transfer_to_agent(
        &self,
        _token: &SessionToken,
        agent: ExternalId,
        amount: MinorUnits,
        _comment: &str,
        currency: &str,
    ) -> Result<RemoteTxId, RemoteError> {
        self.record(RemoteOp::TransferToAgent, agent, amount, currency)
    }

    async fn withdraw_from_player(
        &self,
        _token: &SessionToken,
        player: ExternalId,
        amount: MinorUnits,
        _comment: &str,
        currency: &str,
    ) -> Result<RemoteTxId, RemoteError> {
        self.record(RemoteOp::WithdrawFromPlayer, player, amount, currency)
    }

    async fn withdraw_from_agent(
        &self,
        _token: &SessionToken,
        agent: ExternalId,
        amount: MinorUnits,
        _comment: &str,
        currency: &str,
    ) -> Result<RemoteTxId, RemoteError> {
        self.record(RemoteOp::WithdrawFromAgent, agent, amount, currency)
    }

    async fn create_agent_account(
        &self,
        _token: &SessionToken,
        profile: &RemoteProfile,
        tier: Tier,
        _parent: ExternalId,
    ) -> Result<ExternalId, RemoteError> {
        self.provision(&profile.username, Some(tier))
    }

    async fn create_player_account(
        &self,
        _token: &SessionToken,
        profile: &RemoteProfile,
        _parent: ExternalId,
    ) -> Result<ExternalId, RemoteError> {
        self.provision(&profile.username, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds() -> ApiCredentials {
        ApiCredentials {
            username: "super1".to_string(),
            password: "pw".to_string(),
        }
    }

    #[tokio::test]
    async fn test_mock_counts_and_ids() {
        let remote = MockRemoteLedger::new();
        let token = remote.connect(&creds()).await.unwrap();

        let a = remote
            .withdraw_from_agent(&token, 1, 500, "", "USD")
            .await
            .unwrap();
        let b = remote
            .transfer_to_user(&token, 2, 500, "", "USD")
            .await
            .unwrap();
        assert_ne!(a, b);
        assert_eq!(remote.connect_count(), 1);
        assert_eq!(remote.leg_count(), 2);
        assert_eq!(remote.total_calls(), 3);
    }

    #[tokio::test]
    async fn test_mock_failure_toggles() {
        let remote = MockRemoteLedger::new();
        let token = remote.connect(&creds()).await.unwrap();

        remote.set_fail_withdraw(true);
        assert!(
            remote
                .withdraw_from_player(&token, 1, 10, "", "USD")
                .await
                .is_err()
        );
        assert!(remote.transfer_to_agent(&token, 2, 10, "", "USD").await.is_ok());

        remote.fail_op(RemoteOp::TransferToAgent);
        assert!(remote.transfer_to_agent(&token, 2, 10, "", "USD").await.is_err());

        let legs = remote.legs();
        assert_eq!(legs.len(), 3);
        assert!(legs[0].tx_id.is_none());
        assert!(legs[1].tx_id.is_some());
    }
}
