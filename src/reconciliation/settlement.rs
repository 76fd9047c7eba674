//! Weekly settlement
//!
//! Moves a signed spend-allowance adjustment between a parent and one of
//! its direct children. A negative adjustment funds the child from the
//! parent; a positive one returns funds from the child to the parent.
//! The same flow funds a freshly created account.

use tracing::info;

use super::engine::{MovementRequest, OperatorContext, ProfileReset, ReconciliationEngine};
use super::error::ReconciliationError;
use crate::account::PolicyViolation;
use crate::core_types::{AccountId, MinorUnits};
use crate::ledger::{DepositCategory, LedgerEntry, Origin};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlementKind {
    /// Scheduled weekly reset, recorded with a system origin
    Periodic,
    /// Initial funding of a just-created account
    AccountFunding,
}

impl SettlementKind {
    fn default_comment(&self) -> &'static str {
        match self {
            SettlementKind::Periodic => "Weekly settlement",
            SettlementKind::AccountFunding => "Initial spend allowance",
        }
    }
}

impl ReconciliationEngine {
    /// Settle `adjustment` between `parent_id` and its child `child_id`.
    ///
    /// Returns `Ok(None)` for a zero adjustment. Both profiles get their
    /// discount flag and additional credit cleared, except that account
    /// funding leaves the parent's additional credit alone.
    pub async fn settle_weekly(
        &self,
        ctx: &OperatorContext,
        parent_id: AccountId,
        child_id: AccountId,
        adjustment: MinorUnits,
        kind: SettlementKind,
    ) -> Result<Option<LedgerEntry>, ReconciliationError> {
        if adjustment == 0 {
            return Ok(None);
        }

        let child = self.load_account(child_id).await?;
        match child.parent_id {
            Some(p) if p == parent_id => {}
            Some(_) => {
                return Err(PolicyViolation::NotParent {
                    parent: parent_id,
                    child: child_id,
                }
                .into());
            }
            None => return Err(PolicyViolation::MissingParent(child_id).into()),
        }

        let parent_reset = match kind {
            SettlementKind::Periodic => ProfileReset::ALL,
            SettlementKind::AccountFunding => ProfileReset {
                additional_credit: false,
                discount: true,
            },
        };
        let child_reset = ProfileReset::ALL;

        let amount = adjustment.abs();
        let mut req = if adjustment < 0 {
            let mut req = MovementRequest::new(
                parent_id,
                child_id,
                amount,
                DepositCategory::WeeklySettlement,
            );
            req.sender_reset = parent_reset;
            req.receiver_reset = child_reset;
            req
        } else {
            let mut req = MovementRequest::new(
                child_id,
                parent_id,
                amount,
                DepositCategory::WeeklySettlement,
            );
            req.sender_reset = child_reset;
            req.receiver_reset = parent_reset;
            req
        };
        req.comment = kind.default_comment().to_string();

        let entry = match kind {
            SettlementKind::Periodic => {
                let system_ctx = OperatorContext {
                    origin: Origin::System,
                    ..ctx.clone()
                };
                self.move_money(&system_ctx, &req).await?
            }
            SettlementKind::AccountFunding => self.move_money(ctx, &req).await?,
        };

        info!(
            parent = parent_id,
            child = child_id,
            adjustment,
            kind = ?kind,
            entry_id = entry.entry_id,
            "Settlement applied"
        );
        Ok(Some(entry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::{AccountLimits, Tier};
    use crate::config::ApiCredentials;
    use crate::ledger::{BalanceRecord, LedgerStore, MemoryLedgerStore};
    use crate::remote::MockRemoteLedger;
    use std::sync::Arc;

    fn setup() -> (Arc<MemoryLedgerStore>, ReconciliationEngine, OperatorContext) {
        let store = Arc::new(MemoryLedgerStore::new());
        let remote = Arc::new(MockRemoteLedger::new());
        let engine = ReconciliationEngine::new(store.clone(), remote);
        let master = store.seed_account(Tier::MasterAgent, None, 300, 10_000, AccountLimits::default());
        let ctx = OperatorContext::new(
            master,
            Origin::Ip("127.0.0.1".into()),
            ApiCredentials {
                username: "super1".into(),
                password: "pw".into(),
            },
        );
        (store, engine, ctx)
    }

    #[tokio::test]
    async fn test_negative_adjustment_funds_child() {
        let (store, engine, ctx) = setup();
        let parent = ctx.operator.account_id;
        let child = store.seed_account(Tier::Agent, Some(parent), 301, 0, AccountLimits::default());

        let mut child_balance = BalanceRecord::new(child.account_id);
        child_balance.additional_credit = 50;
        child_balance.discount_status = true;
        store.set_balance(child_balance);

        let entry = engine
            .settle_weekly(&ctx, parent, child.account_id, -2_000, SettlementKind::Periodic)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.sender_id, parent);
        assert_eq!(entry.receiver_id, child.account_id);
        assert_eq!(entry.category, DepositCategory::WeeklySettlement);
        assert_eq!(entry.origin, Origin::System);

        let child_balance = store.balance(child.account_id).await.unwrap().unwrap();
        assert_eq!(child_balance.available_balance, 2_000);
        assert_eq!(child_balance.additional_credit, 0);
        assert!(!child_balance.discount_status);
    }

    #[tokio::test]
    async fn test_positive_adjustment_returns_funds() {
        let (store, engine, ctx) = setup();
        let parent = ctx.operator.account_id;
        let child = store.seed_account(Tier::Agent, Some(parent), 301, 1_500, AccountLimits::default());

        let entry = engine
            .settle_weekly(&ctx, parent, child.account_id, 1_500, SettlementKind::Periodic)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.sender_id, child.account_id);
        assert_eq!(entry.receiver_id, parent);

        let parent_balance = store.balance(parent).await.unwrap().unwrap();
        assert_eq!(parent_balance.available_balance, 11_500);
    }

    #[tokio::test]
    async fn test_funding_keeps_parent_additional_credit() {
        let (store, engine, ctx) = setup();
        let parent = ctx.operator.account_id;
        let child = store.seed_account(Tier::Agent, Some(parent), 301, 0, AccountLimits::default());

        let mut parent_balance = store.balance(parent).await.unwrap().unwrap();
        parent_balance.additional_credit = 400;
        store.set_balance(parent_balance);

        let entry = engine
            .settle_weekly(&ctx, parent, child.account_id, -1_000, SettlementKind::AccountFunding)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.origin, Origin::Ip("127.0.0.1".into()));

        let parent_balance = store.balance(parent).await.unwrap().unwrap();
        assert_eq!(parent_balance.additional_credit, 400);
        assert_eq!(parent_balance.available_balance, 9_000);
    }

    #[tokio::test]
    async fn test_rejects_non_child() {
        let (store, engine, ctx) = setup();
        let stranger = store.seed_account(Tier::Agent, Some(999), 302, 0, AccountLimits::default());
        let err = engine
            .settle_weekly(
                &ctx,
                ctx.operator.account_id,
                stranger.account_id,
                -10,
                SettlementKind::Periodic,
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "POLICY_VIOLATION");
    }

    #[tokio::test]
    async fn test_zero_adjustment_is_noop() {
        let (store, engine, ctx) = setup();
        let child = store.seed_account(
            Tier::Agent,
            Some(ctx.operator.account_id),
            301,
            0,
            AccountLimits::default(),
        );
        let result = engine
            .settle_weekly(
                &ctx,
                ctx.operator.account_id,
                child.account_id,
                0,
                SettlementKind::Periodic,
            )
            .await
            .unwrap();
        assert!(result.is_none());
        assert_eq!(store.commit_count(), 0);
    }
}
