//! Operator deposit and cash-out
//!
//! Super and master agents move money on behalf of the target's parent;
//! agents move it from or to their own balance.

use super::engine::{MovementRequest, OperatorContext, ReconciliationEngine};
use super::error::ReconciliationError;
use crate::account::{Account, PolicyViolation, Tier};
use crate::core_types::{AccountId, MinorUnits};
use crate::ledger::{DepositCategory, LedgerEntry};

impl ReconciliationEngine {
    /// Account on the other side of an operator movement
    fn counterparty(
        ctx: &OperatorContext,
        target: &Account,
    ) -> Result<AccountId, ReconciliationError> {
        match ctx.operator.tier {
            Tier::SuperAgent | Tier::MasterAgent => target
                .parent_id
                .ok_or_else(|| PolicyViolation::MissingParent(target.account_id).into()),
            _ => {
                if target.parent_id != Some(ctx.operator_id()) {
                    return Err(PolicyViolation::NotParent {
                        parent: ctx.operator_id(),
                        child: target.account_id,
                    }
                    .into());
                }
                Ok(ctx.operator_id())
            }
        }
    }

    /// Fund `target` outside the settlement cycle
    ///
    /// The amount is also booked as additional credit on the target.
    pub async fn deposit(
        &self,
        ctx: &OperatorContext,
        target_id: AccountId,
        amount: MinorUnits,
        comment: &str,
        currency: Option<String>,
    ) -> Result<LedgerEntry, ReconciliationError> {
        let target = self.load_account(target_id).await?;
        let sender = Self::counterparty(ctx, &target)?;

        let mut req = MovementRequest::new(sender, target_id, amount, DepositCategory::Additional)
            .with_comment(comment)
            .with_currency(currency);
        req.receiver_additional_credit = true;
        self.move_money(ctx, &req).await
    }

    /// Take funds back from `target`
    pub async fn cash_out(
        &self,
        ctx: &OperatorContext,
        target_id: AccountId,
        amount: MinorUnits,
        comment: &str,
        currency: Option<String>,
    ) -> Result<LedgerEntry, ReconciliationError> {
        let target = self.load_account(target_id).await?;
        let receiver = Self::counterparty(ctx, &target)?;

        let req = MovementRequest::new(target_id, receiver, amount, DepositCategory::Additional)
            .with_comment(comment)
            .with_currency(currency);
        self.move_money(ctx, &req).await
    }
}
