//! Remote leg selection
//!
//! The remote platform only models specific role transitions, so which
//! remote calls mirror a movement depends on the (sender tier, receiver
//! tier) pair. The policy is a lookup table rather than conditionals.

use std::fmt;

use crate::account::Tier;
use crate::core_types::RemoteTxId;
use crate::remote::RemoteOp;

/// Remote calls for one tier pair; `None` means the leg is skipped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LegPlan {
    pub withdraw: Option<RemoteOp>,
    pub deposit: Option<RemoteOp>,
}

impl LegPlan {
    const fn new(withdraw: Option<RemoteOp>, deposit: Option<RemoteOp>) -> Self {
        Self { withdraw, deposit }
    }

    /// No remote counterpart at all
    pub fn is_fully_skipped(&self) -> bool {
        self.withdraw.is_none() && self.deposit.is_none()
    }
}

const FROM_PLAYER: Option<RemoteOp> = Some(RemoteOp::WithdrawFromPlayer);
const FROM_AGENT: Option<RemoteOp> = Some(RemoteOp::WithdrawFromAgent);
const TO_USER: Option<RemoteOp> = Some(RemoteOp::TransferToUser);
const TO_AGENT: Option<RemoteOp> = Some(RemoteOp::TransferToAgent);
const SKIP: Option<RemoteOp> = None;

/// `LEG_TABLE[sender][receiver]`, indexed by [`Tier::index`]
/// (player, agent, master agent, super agent).
///
/// The super agent has no upstream ledger to debit remotely, and a direct
/// super -> master settlement has no remote-visible counterpart at all.
pub const LEG_TABLE: [[LegPlan; 4]; 4] = [
    // sender: player
    [
        LegPlan::new(FROM_PLAYER, TO_USER),
        LegPlan::new(FROM_PLAYER, TO_AGENT),
        LegPlan::new(FROM_PLAYER, TO_AGENT),
        LegPlan::new(FROM_PLAYER, TO_AGENT),
    ],
    // sender: agent
    [
        LegPlan::new(FROM_AGENT, TO_USER),
        LegPlan::new(FROM_AGENT, TO_AGENT),
        LegPlan::new(FROM_AGENT, TO_AGENT),
        LegPlan::new(FROM_AGENT, TO_AGENT),
    ],
    // sender: master agent
    [
        LegPlan::new(FROM_AGENT, TO_USER),
        LegPlan::new(FROM_AGENT, TO_AGENT),
        LegPlan::new(FROM_AGENT, TO_AGENT),
        LegPlan::new(FROM_AGENT, TO_AGENT),
    ],
    // sender: super agent
    [
        LegPlan::new(FROM_AGENT, TO_USER),
        LegPlan::new(SKIP, TO_AGENT),
        LegPlan::new(SKIP, SKIP),
        LegPlan::new(SKIP, TO_AGENT),
    ],
];

pub fn plan_for(sender: Tier, receiver: Tier) -> LegPlan {
    LEG_TABLE[sender.index()][receiver.index()]
}

/// What happened to one leg
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LegOutcome {
    Skipped,
    Completed(RemoteTxId),
    Failed(String),
}

impl LegOutcome {
    pub fn tx_id(&self) -> Option<RemoteTxId> {
        match self {
            LegOutcome::Completed(id) => Some(*id),
            _ => None,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, LegOutcome::Completed(_))
    }
}

impl fmt::Display for LegOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LegOutcome::Skipped => write!(f, "skipped"),
            LegOutcome::Completed(id) => write!(f, "completed (tx {})", id),
            LegOutcome::Failed(reason) => write!(f, "failed ({})", reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_sender_withdraws_from_player() {
        for receiver in Tier::ALL {
            let plan = plan_for(Tier::Player, receiver);
            assert_eq!(plan.withdraw, FROM_PLAYER);
        }
        assert_eq!(plan_for(Tier::Player, Tier::Player).deposit, TO_USER);
        assert_eq!(plan_for(Tier::Player, Tier::Agent).deposit, TO_AGENT);
    }

    #[test]
    fn test_player_receiver_gets_transfer_to_user() {
        for sender in [Tier::Agent, Tier::MasterAgent, Tier::SuperAgent] {
            assert_eq!(
                plan_for(sender, Tier::Player),
                LegPlan::new(FROM_AGENT, TO_USER)
            );
        }
    }

    #[test]
    fn test_root_sender_skips_withdraw() {
        assert_eq!(
            plan_for(Tier::SuperAgent, Tier::Agent),
            LegPlan::new(SKIP, TO_AGENT)
        );
        assert!(plan_for(Tier::SuperAgent, Tier::MasterAgent).is_fully_skipped());
    }

    #[test]
    fn test_only_super_to_master_is_fully_skipped() {
        for sender in Tier::ALL {
            for receiver in Tier::ALL {
                let skipped = plan_for(sender, receiver).is_fully_skipped();
                let expected = sender == Tier::SuperAgent && receiver == Tier::MasterAgent;
                assert_eq!(skipped, expected, "{} -> {}", sender, receiver);
            }
        }
    }

    #[test]
    fn test_agent_pairs() {
        assert_eq!(
            plan_for(Tier::Agent, Tier::MasterAgent),
            LegPlan::new(FROM_AGENT, TO_AGENT)
        );
        assert_eq!(
            plan_for(Tier::MasterAgent, Tier::SuperAgent),
            LegPlan::new(FROM_AGENT, TO_AGENT)
        );
    }

    #[test]
    fn test_outcome_tx_id() {
        assert_eq!(LegOutcome::Completed(9).tx_id(), Some(9));
        assert_eq!(LegOutcome::Skipped.tx_id(), None);
        assert_eq!(LegOutcome::Failed("x".into()).tx_id(), None);
    }
}
