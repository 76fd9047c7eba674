//! Reconciliation engine
//!
//! Executes one money movement as a best-effort two-phase operation:
//! remote legs first (irreversible), then a single atomic local commit of
//! the ledger entry and both balance deltas.
//!
//! Once any remote leg has produced a transaction id the remote platform is
//! the source of truth, so the local commit proceeds even if the other leg
//! failed or was skipped.

use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::error::{PendingReconciliation, ReconciliationError};
use super::legs::{LegOutcome, plan_for};
use super::locks::AccountLocks;
use super::state::MovementState;
use crate::account::{Account, PolicyViolation};
use crate::config::ApiCredentials;
use crate::core_types::{AccountId, MinorUnits, MovementId};
use crate::ledger::{
    BalanceDelta, BalanceRecord, CounterBump, CreditChange, DepositCategory, LedgerEntry,
    LedgerStore, MovementCommit, MovementType, NewLedgerEntry, Origin,
};
use crate::remote::{RemoteLedger, RemoteOp, SessionToken};

/// Who initiates a movement and from where
#[derive(Debug, Clone)]
pub struct OperatorContext {
    pub operator: Account,
    pub origin: Origin,
    /// Remote API credentials of the operator's root super agent
    pub credentials: ApiCredentials,
}

impl OperatorContext {
    pub fn new(operator: Account, origin: Origin, credentials: ApiCredentials) -> Self {
        Self {
            operator,
            origin,
            credentials,
        }
    }

    /// Scheduled jobs act as the root super agent with no client address
    pub fn system(root: Account, credentials: ApiCredentials) -> Self {
        Self::new(root, Origin::System, credentials)
    }

    pub fn operator_id(&self) -> AccountId {
        self.operator.account_id
    }
}

/// Profile fields cleared by a settlement commit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProfileReset {
    pub additional_credit: bool,
    pub discount: bool,
}

impl ProfileReset {
    pub const NONE: ProfileReset = ProfileReset {
        additional_credit: false,
        discount: false,
    };

    pub const ALL: ProfileReset = ProfileReset {
        additional_credit: true,
        discount: true,
    };
}

#[derive(Debug, Clone)]
pub struct MovementRequest {
    pub sender: AccountId,
    pub receiver: AccountId,
    pub amount: MinorUnits,
    pub comment: String,
    /// Defaults to the sender's currency
    pub currency: Option<String>,
    pub category: DepositCategory,
    /// Also book the amount as additional credit on the receiver
    pub receiver_additional_credit: bool,
    pub sender_reset: ProfileReset,
    pub receiver_reset: ProfileReset,
}

impl MovementRequest {
    pub fn new(
        sender: AccountId,
        receiver: AccountId,
        amount: MinorUnits,
        category: DepositCategory,
    ) -> Self {
        Self {
            sender,
            receiver,
            amount,
            comment: String::new(),
            currency: None,
            category,
            receiver_additional_credit: false,
            sender_reset: ProfileReset::NONE,
            receiver_reset: ProfileReset::NONE,
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    pub fn with_currency(mut self, currency: Option<String>) -> Self {
        self.currency = currency
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
        self
    }
}

/// ISO 4217 style: three ASCII letters
fn check_currency(currency: &str) -> Result<(), PolicyViolation> {
    if currency.len() == 3 && currency.chars().all(|c| c.is_ascii_alphabetic()) {
        Ok(())
    } else {
        Err(PolicyViolation::InvalidField {
            field: "currency",
            reason: "must be a three-letter currency code",
        })
    }
}

pub struct ReconciliationEngine {
    store: Arc<dyn LedgerStore>,
    remote: Arc<dyn RemoteLedger>,
    locks: AccountLocks,
}

impl ReconciliationEngine {
    pub fn new(store: Arc<dyn LedgerStore>, remote: Arc<dyn RemoteLedger>) -> Self {
        Self {
            store,
            remote,
            locks: AccountLocks::new(),
        }
    }

    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    pub fn remote(&self) -> &Arc<dyn RemoteLedger> {
        &self.remote
    }

    pub(crate) async fn load_account(
        &self,
        account_id: AccountId,
    ) -> Result<Account, ReconciliationError> {
        self.store
            .account(account_id)
            .await?
            .ok_or(ReconciliationError::AccountNotFound(account_id))
    }

    pub(crate) async fn load_balance(
        &self,
        account_id: AccountId,
    ) -> Result<BalanceRecord, ReconciliationError> {
        self.store
            .balance(account_id)
            .await?
            .ok_or(ReconciliationError::AccountNotFound(account_id))
    }

    /// Move `amount` from sender to receiver on both ledgers
    ///
    /// Identical requests are never deduplicated: each call that succeeds
    /// writes its own entry and applies its own deltas.
    pub async fn move_money(
        &self,
        ctx: &OperatorContext,
        req: &MovementRequest,
    ) -> Result<LedgerEntry, ReconciliationError> {
        let movement_id = MovementId::new();
        let mut state = MovementState::Init;

        debug!(
            movement_id = %movement_id,
            sender = req.sender,
            receiver = req.receiver,
            amount = req.amount,
            category = %req.category,
            operator = ctx.operator_id(),
            "Movement requested"
        );

        if req.amount <= 0 {
            return Err(PolicyViolation::NonPositiveAmount { amount: req.amount }.into());
        }
        if req.sender == req.receiver {
            return Err(PolicyViolation::SameAccount(req.sender).into());
        }
        if let Some(currency) = &req.currency {
            check_currency(currency)?;
        }

        let sender = self.load_account(req.sender).await?;
        let receiver = self.load_account(req.receiver).await?;

        // Held through the commit: the funds check must stay valid
        let _guard = self.locks.lock_pair(sender.account_id, receiver.account_id).await;

        let sender_balance = self.load_balance(sender.account_id).await?;
        if sender_balance.available_balance < req.amount {
            debug!(
                movement_id = %movement_id,
                available = sender_balance.available_balance,
                "Movement rejected: insufficient funds"
            );
            return Err(ReconciliationError::InsufficientFunds {
                account: sender.account_id,
                available: sender_balance.available_balance,
                requested: req.amount,
            });
        }
        state = state.transition(MovementState::Validated)?;

        let currency = req
            .currency
            .clone()
            .unwrap_or_else(|| sender.currency.clone());

        let plan = plan_for(sender.tier, receiver.tier);
        if plan.is_fully_skipped() {
            warn!(
                movement_id = %movement_id,
                sender_tier = %sender.tier,
                receiver_tier = %receiver.tier,
                "Movement has no remote counterpart"
            );
            state.transition(MovementState::RemoteFailed)?;
            return Err(ReconciliationError::RemoteLedgerFailure {
                withdraw: LegOutcome::Skipped,
                deposit: LegOutcome::Skipped,
            });
        }

        // One token for both legs of this movement only
        let (withdraw, deposit) = match self.remote.connect(&ctx.credentials).await {
            Ok(token) => {
                let withdraw = self
                    .run_leg(movement_id, plan.withdraw, &token, &sender, req, &currency)
                    .await;
                state = state.transition(MovementState::WithdrawSettled)?;
                let deposit = self
                    .run_leg(movement_id, plan.deposit, &token, &receiver, req, &currency)
                    .await;
                (withdraw, deposit)
            }
            Err(e) => {
                warn!(movement_id = %movement_id, error = %e, "Remote connect failed");
                state = state.transition(MovementState::WithdrawSettled)?;
                let failed = |op: Option<RemoteOp>| match op {
                    Some(_) => LegOutcome::Failed(e.to_string()),
                    None => LegOutcome::Skipped,
                };
                (failed(plan.withdraw), failed(plan.deposit))
            }
        };

        if !withdraw.is_completed() && !deposit.is_completed() {
            state.transition(MovementState::RemoteFailed)?;
            warn!(
                movement_id = %movement_id,
                withdraw = %withdraw,
                deposit = %deposit,
                "No remote leg completed, nothing persisted"
            );
            return Err(ReconciliationError::RemoteLedgerFailure { withdraw, deposit });
        }
        state = state.transition(MovementState::DepositSettled)?;

        if !withdraw.is_completed() || !deposit.is_completed() {
            warn!(
                movement_id = %movement_id,
                withdraw = %withdraw,
                deposit = %deposit,
                "Committing movement with a single remote leg"
            );
        }

        let commit = build_commit(
            movement_id,
            ctx,
            req,
            &sender,
            &receiver,
            currency,
            withdraw.tx_id(),
            deposit.tx_id(),
        );

        match self.store.commit_movement(&commit).await {
            Ok(entry) => {
                state.transition(MovementState::Committed)?;
                info!(
                    movement_id = %movement_id,
                    entry_id = entry.entry_id,
                    sender = entry.sender_id,
                    receiver = entry.receiver_id,
                    amount = entry.amount,
                    movement_type = %entry.movement_type,
                    "Movement committed"
                );
                Ok(entry)
            }
            Err(cause) => {
                state.transition(MovementState::ReconciliationPending)?;

                // Nothing was applied; refresh from what is actually persisted
                let sender_balance = self.store.balance(sender.account_id).await.ok().flatten();
                let receiver_balance = self
                    .store
                    .balance(receiver.account_id)
                    .await
                    .ok()
                    .flatten();

                let pending = PendingReconciliation {
                    movement_id,
                    sender: sender.account_id,
                    receiver: receiver.account_id,
                    operator: ctx.operator_id(),
                    amount: req.amount,
                    currency: commit.entry.currency.clone(),
                    category: req.category,
                    withdraw_tx_id: commit.entry.withdraw_tx_id,
                    deposit_tx_id: commit.entry.deposit_tx_id,
                    cause,
                    sender_balance,
                    receiver_balance,
                };
                error!(
                    movement_id = %movement_id,
                    sender = pending.sender,
                    receiver = pending.receiver,
                    operator = pending.operator,
                    amount = pending.amount,
                    currency = %pending.currency,
                    withdraw_tx_id = pending.withdraw_tx_id.unwrap_or(0),
                    deposit_tx_id = pending.deposit_tx_id.unwrap_or(0),
                    cause = %pending.cause,
                    "RECONCILIATION PENDING: remote legs executed but local commit failed"
                );
                Err(ReconciliationError::PersistenceFailure(Box::new(pending)))
            }
        }
    }

    async fn run_leg(
        &self,
        movement_id: MovementId,
        op: Option<RemoteOp>,
        token: &SessionToken,
        target: &Account,
        req: &MovementRequest,
        currency: &str,
    ) -> LegOutcome {
        let Some(op) = op else {
            debug!(movement_id = %movement_id, account = target.account_id, "Leg skipped");
            return LegOutcome::Skipped;
        };

        match self
            .remote
            .execute(
                op,
                token,
                target.external_id,
                req.amount,
                &req.comment,
                currency,
            )
            .await
        {
            Ok(tx_id) => {
                debug!(movement_id = %movement_id, op = %op, tx_id, "Leg completed");
                LegOutcome::Completed(tx_id)
            }
            Err(e) => {
                warn!(
                    movement_id = %movement_id,
                    op = %op,
                    account = target.account_id,
                    external_id = target.external_id,
                    error = %e,
                    "Leg failed"
                );
                LegOutcome::Failed(e.to_string())
            }
        }
    }
}

fn credit_change(reset: ProfileReset) -> CreditChange {
    if reset.additional_credit {
        CreditChange::Reset
    } else {
        CreditChange::Keep
    }
}

/// Entry and both deltas as plain values, nothing persisted yet
#[allow(clippy::too_many_arguments)]
pub(crate) fn build_commit(
    movement_id: MovementId,
    ctx: &OperatorContext,
    req: &MovementRequest,
    sender: &Account,
    receiver: &Account,
    currency: String,
    withdraw_tx_id: Option<i64>,
    deposit_tx_id: Option<i64>,
) -> MovementCommit {
    let movement_type = MovementType::between(sender.tier, receiver.tier);
    let (sent, received) = match movement_type {
        MovementType::Deposit => (CounterBump::DepositSent, CounterBump::DepositReceived),
        MovementType::Cashout => (CounterBump::CashoutSent, CounterBump::CashoutReceived),
    };

    let receiver_credit = if req.receiver_additional_credit {
        CreditChange::Add(req.amount)
    } else {
        credit_change(req.receiver_reset)
    };

    MovementCommit {
        entry: NewLedgerEntry {
            movement_id,
            amount: req.amount,
            sender_id: sender.account_id,
            receiver_id: receiver.account_id,
            operator_id: ctx.operator_id(),
            withdraw_tx_id,
            deposit_tx_id,
            movement_type,
            category: req.category,
            currency,
            comment: req.comment.clone(),
            origin: ctx.origin.clone(),
        },
        sender: BalanceDelta {
            account_id: sender.account_id,
            available: -req.amount,
            counter: sent,
            counter_amount: req.amount,
            credit: credit_change(req.sender_reset),
            reset_discount: req.sender_reset.discount,
        },
        receiver: BalanceDelta {
            account_id: receiver.account_id,
            available: req.amount,
            counter: received,
            counter_amount: req.amount,
            credit: receiver_credit,
            reset_discount: req.receiver_reset.discount,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::{AccountLimits, Tier};
    use crate::ledger::MemoryLedgerStore;
    use crate::remote::MockRemoteLedger;

    fn creds() -> ApiCredentials {
        ApiCredentials {
            username: "super1".to_string(),
            password: "pw".to_string(),
        }
    }

    struct Harness {
        store: Arc<MemoryLedgerStore>,
        remote: Arc<MockRemoteLedger>,
        engine: ReconciliationEngine,
        agent: Account,
        player: Account,
        ctx: OperatorContext,
    }

    fn harness() -> Harness {
        let store = Arc::new(MemoryLedgerStore::new());
        let remote = Arc::new(MockRemoteLedger::new());
        let engine = ReconciliationEngine::new(store.clone(), remote.clone());
        let agent = store.seed_account(Tier::Agent, None, 700, 10_000, AccountLimits::default());
        let player = store.seed_account(
            Tier::Player,
            Some(agent.account_id),
            800,
            10_000,
            AccountLimits::default(),
        );
        let ctx = OperatorContext::new(agent.clone(), Origin::Ip("10.1.1.1".into()), creds());
        Harness {
            store,
            remote,
            engine,
            agent,
            player,
            ctx,
        }
    }

    #[test]
    fn test_build_commit_deposit_counters() {
        let h = harness();
        let req = MovementRequest::new(
            h.agent.account_id,
            h.player.account_id,
            2_500,
            DepositCategory::Additional,
        );
        let commit = build_commit(
            MovementId::new(),
            &h.ctx,
            &req,
            &h.agent,
            &h.player,
            "USD".into(),
            Some(1),
            None,
        );
        assert_eq!(commit.entry.movement_type, MovementType::Deposit);
        assert_eq!(commit.sender.available, -2_500);
        assert_eq!(commit.sender.counter, CounterBump::DepositSent);
        assert_eq!(commit.receiver.available, 2_500);
        assert_eq!(commit.receiver.counter, CounterBump::DepositReceived);
        assert_eq!(commit.receiver.credit, CreditChange::Keep);
    }

    #[test]
    fn test_build_commit_additional_credit_and_resets() {
        let h = harness();
        let mut req = MovementRequest::new(
            h.player.account_id,
            h.agent.account_id,
            100,
            DepositCategory::WeeklySettlement,
        );
        req.sender_reset = ProfileReset::ALL;
        req.receiver_reset = ProfileReset {
            additional_credit: false,
            discount: true,
        };
        let commit = build_commit(
            MovementId::new(),
            &h.ctx,
            &req,
            &h.player,
            &h.agent,
            "USD".into(),
            None,
            Some(2),
        );
        assert_eq!(commit.entry.movement_type, MovementType::Cashout);
        assert_eq!(commit.sender.counter, CounterBump::CashoutSent);
        assert_eq!(commit.sender.credit, CreditChange::Reset);
        assert!(commit.sender.reset_discount);
        assert_eq!(commit.receiver.credit, CreditChange::Keep);
        assert!(commit.receiver.reset_discount);

        req.receiver_additional_credit = true;
        let commit = build_commit(
            MovementId::new(),
            &h.ctx,
            &req,
            &h.player,
            &h.agent,
            "USD".into(),
            None,
            Some(2),
        );
        assert_eq!(commit.receiver.credit, CreditChange::Add(100));
    }

    #[tokio::test]
    async fn test_move_money_uses_sender_currency_by_default() {
        let h = harness();
        let req = MovementRequest::new(
            h.agent.account_id,
            h.player.account_id,
            100,
            DepositCategory::Additional,
        )
        .with_currency(Some("  ".into()));
        let entry = h.engine.move_money(&h.ctx, &req).await.unwrap();
        assert_eq!(entry.currency, "USD");
        assert!(h.remote.legs().iter().all(|l| l.currency == "USD"));
    }

    #[tokio::test]
    async fn test_connect_failure_is_remote_failure() {
        let h = harness();
        h.remote.set_fail_connect(true);
        let req = MovementRequest::new(
            h.agent.account_id,
            h.player.account_id,
            100,
            DepositCategory::Additional,
        );
        let err = h.engine.move_money(&h.ctx, &req).await.unwrap_err();
        assert!(matches!(
            err,
            ReconciliationError::RemoteLedgerFailure {
                withdraw: LegOutcome::Failed(_),
                deposit: LegOutcome::Failed(_)
            }
        ));
        assert_eq!(h.remote.leg_count(), 0);
        assert_eq!(h.store.commit_count(), 0);
    }

    #[tokio::test]
    async fn test_malformed_currency_rejected_before_remote() {
        let h = harness();
        for bad in ["EURO-CASH", "US", "U$D"] {
            let req = MovementRequest::new(
                h.agent.account_id,
                h.player.account_id,
                100,
                DepositCategory::Additional,
            )
            .with_currency(Some(bad.into()));
            let err = h.engine.move_money(&h.ctx, &req).await.unwrap_err();
            assert_eq!(
                err,
                ReconciliationError::PolicyViolation(PolicyViolation::InvalidField {
                    field: "currency",
                    reason: "must be a three-letter currency code",
                })
            );
        }
        assert_eq!(h.remote.total_calls(), 0);
        assert_eq!(h.store.commit_count(), 0);

        let req = MovementRequest::new(
            h.agent.account_id,
            h.player.account_id,
            100,
            DepositCategory::Additional,
        )
        .with_currency(Some(" EUR ".into()));
        let entry = h.engine.move_money(&h.ctx, &req).await.unwrap();
        assert_eq!(entry.currency, "EUR");
    }

    #[tokio::test]
    async fn test_same_account_rejected() {
        let h = harness();
        let req = MovementRequest::new(
            h.agent.account_id,
            h.agent.account_id,
            100,
            DepositCategory::Additional,
        );
        let err = h.engine.move_money(&h.ctx, &req).await.unwrap_err();
        assert_eq!(
            err,
            ReconciliationError::PolicyViolation(PolicyViolation::SameAccount(h.agent.account_id))
        );
        assert_eq!(h.remote.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_unknown_account() {
        let h = harness();
        let req = MovementRequest::new(h.agent.account_id, 999, 100, DepositCategory::Additional);
        let err = h.engine.move_money(&h.ctx, &req).await.unwrap_err();
        assert_eq!(err, ReconciliationError::AccountNotFound(999));
    }
}
