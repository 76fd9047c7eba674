//! Account creation policy
//!
//! A new child account may never be granted more than its parent holds:
//! spend allowance, revenue share and discount are capped by the parent,
//! the bet limit is floored by it. All checks run before anything is
//! created on the remote platform.

use super::models::{Account, AccountLimits, Tier};
use crate::core_types::{AccountId, MinorUnits};
use crate::ledger::BalanceRecord;
use crate::money::format_amount;
use crate::reconciliation::plan_for;

// ============================================================================
// Policy Violations
// ============================================================================

/// The specific bound a request violated
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum PolicyViolation {
    #[error("Amount must be greater than zero (got {amount})")]
    NonPositiveAmount { amount: MinorUnits },

    #[error("Sender and receiver cannot be the same account ({0})")]
    SameAccount(AccountId),

    #[error("Total to spend must be between 0 and {} (requested {})", fmt_minor(.max), fmt_minor(.requested))]
    SpendAllowance {
        max: MinorUnits,
        requested: MinorUnits,
    },

    #[error("Revenue share must be between 0% and {max}% (requested {requested}%)")]
    RevenueShare { max: i32, requested: i32 },

    #[error("Discount limit must be between 0% and {max}% (requested {requested}%)")]
    DiscountLimit { max: i32, requested: i32 },

    #[error("Bet limit must be at least {} (requested {})", fmt_minor(.min), fmt_minor(.requested))]
    BetLimit {
        min: MinorUnits,
        requested: MinorUnits,
    },

    #[error("A {tier} must be created under a {expected}, not a {actual}")]
    WrongParentTier {
        tier: Tier,
        expected: Tier,
        actual: Tier,
    },

    #[error("A {child} cannot be funded by a {parent}: no remote transfer exists between them")]
    UnfundableTier { parent: Tier, child: Tier },

    #[error("A {0} cannot be created from the back office")]
    UnsupportedTier(Tier),

    #[error("Account {0} has no parent")]
    MissingParent(AccountId),

    #[error("Account {child} is not a child of {parent}")]
    NotParent { parent: AccountId, child: AccountId },

    #[error("Invalid {field}: {reason}")]
    InvalidField {
        field: &'static str,
        reason: &'static str,
    },
}

fn fmt_minor(value: &MinorUnits) -> String {
    format_amount(*value)
}

// ============================================================================
// New Account Request
// ============================================================================

/// Operator request to create a child account
#[derive(Debug, Clone)]
pub struct NewAccountRequest {
    pub tier: Tier,
    /// Required for agents and players; master agents default to the
    /// operator's super agent
    pub parent_id: Option<AccountId>,
    pub username: String,
    /// Sent in clear to the remote platform only, stored as a hash locally
    pub password: String,
    pub nickname: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    /// Initial spend allowance funded from the parent
    pub total_to_spend: MinorUnits,
    pub limits: AccountLimits,
}

impl NewAccountRequest {
    /// Non-players carry their username as first and last name
    pub fn display_names(&self) -> (String, String) {
        if self.tier.is_player() {
            (self.first_name.clone(), self.last_name.clone())
        } else {
            (self.username.clone(), self.username.clone())
        }
    }

    /// Field-level checks that need no parent
    ///
    /// # Validation Rules
    /// - username: 3-32 characters of `[A-Za-z0-9_.]`
    /// - password: at least 6 characters
    pub fn validate_fields(&self) -> Result<(), PolicyViolation> {
        let username = self.username.trim();
        if username.len() < 3 || username.len() > 32 {
            return Err(PolicyViolation::InvalidField {
                field: "username",
                reason: "must be 3-32 characters",
            });
        }
        if !username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
        {
            return Err(PolicyViolation::InvalidField {
                field: "username",
                reason: "only letters, digits, '_' and '.' are allowed",
            });
        }
        if self.password.len() < 6 {
            return Err(PolicyViolation::InvalidField {
                field: "password",
                reason: "must be at least 6 characters",
            });
        }
        if self.tier.is_root() {
            return Err(PolicyViolation::UnsupportedTier(self.tier));
        }
        Ok(())
    }
}

/// Check a creation request against its parent's profile and balance
pub fn check_creation_policy(
    req: &NewAccountRequest,
    parent: &Account,
    parent_balance: &BalanceRecord,
) -> Result<(), PolicyViolation> {
    let expected = req
        .tier
        .parent_tier()
        .ok_or(PolicyViolation::UnsupportedTier(req.tier))?;
    if parent.tier != expected {
        return Err(PolicyViolation::WrongParentTier {
            tier: req.tier,
            expected,
            actual: parent.tier,
        });
    }

    let spendable = parent_balance.spendable();
    if req.total_to_spend < 0 || req.total_to_spend > spendable {
        return Err(PolicyViolation::SpendAllowance {
            max: spendable,
            requested: req.total_to_spend,
        });
    }
    // Funding would fail after the remote account already exists
    if req.total_to_spend > 0 && plan_for(parent.tier, req.tier).is_fully_skipped() {
        return Err(PolicyViolation::UnfundableTier {
            parent: parent.tier,
            child: req.tier,
        });
    }

    let limits = &req.limits;
    if limits.revenue_share_pct < 0 || limits.revenue_share_pct > parent.limits.revenue_share_pct
    {
        return Err(PolicyViolation::RevenueShare {
            max: parent.limits.revenue_share_pct,
            requested: limits.revenue_share_pct,
        });
    }

    if limits.discount_limit_pct < 0
        || limits.discount_limit_pct > parent.limits.discount_limit_pct
    {
        return Err(PolicyViolation::DiscountLimit {
            max: parent.limits.discount_limit_pct,
            requested: limits.discount_limit_pct,
        });
    }

    if limits.bet_limit < parent.limits.bet_limit {
        return Err(PolicyViolation::BetLimit {
            min: parent.limits.bet_limit,
            requested: limits.bet_limit,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn master(limits: AccountLimits) -> Account {
        Account {
            account_id: 10,
            username: "master1".to_string(),
            email: "master1@agents.local".to_string(),
            tier: Tier::MasterAgent,
            parent_id: Some(1),
            external_id: 9010,
            currency: "USD".to_string(),
            limits,
            created_at: Utc::now(),
        }
    }

    fn parent_limits() -> AccountLimits {
        AccountLimits {
            revenue_share_pct: 40,
            discount_limit_pct: 10,
            bet_limit: 500,
        }
    }

    fn balance(available: MinorUnits, additional: MinorUnits) -> BalanceRecord {
        let mut record = BalanceRecord::new(10);
        record.available_balance = available;
        record.additional_credit = additional;
        record
    }

    fn agent_request(total_to_spend: MinorUnits) -> NewAccountRequest {
        NewAccountRequest {
            tier: Tier::Agent,
            parent_id: Some(10),
            username: "agent7".to_string(),
            password: "hunter22".to_string(),
            nickname: String::new(),
            first_name: String::new(),
            last_name: String::new(),
            phone: None,
            total_to_spend,
            limits: AccountLimits {
                revenue_share_pct: 30,
                discount_limit_pct: 5,
                bet_limit: 500,
            },
        }
    }

    #[test]
    fn test_policy_accepts_within_bounds() {
        let parent = master(parent_limits());
        let req = agent_request(3000);
        assert_eq!(check_creation_policy(&req, &parent, &balance(3000, 0)), Ok(()));
    }

    #[test]
    fn test_spend_allowance_above_parent_spendable() {
        let parent = master(parent_limits());
        let req = agent_request(5000);
        assert_eq!(
            check_creation_policy(&req, &parent, &balance(3000, 0)),
            Err(PolicyViolation::SpendAllowance {
                max: 3000,
                requested: 5000
            })
        );
    }

    #[test]
    fn test_spend_allowance_excludes_additional_credit() {
        let parent = master(parent_limits());
        let req = agent_request(2500);
        let result = check_creation_policy(&req, &parent, &balance(3000, 1000));
        assert_eq!(
            result,
            Err(PolicyViolation::SpendAllowance {
                max: 2000,
                requested: 2500
            })
        );
    }

    #[test]
    fn test_negative_spend_allowance() {
        let parent = master(parent_limits());
        let req = agent_request(-1);
        assert!(matches!(
            check_creation_policy(&req, &parent, &balance(3000, 0)),
            Err(PolicyViolation::SpendAllowance { .. })
        ));
    }

    #[test]
    fn test_percentage_and_bet_limit_bounds() {
        let parent = master(parent_limits());

        let mut req = agent_request(0);
        req.limits.revenue_share_pct = 41;
        assert_eq!(
            check_creation_policy(&req, &parent, &balance(0, 0)),
            Err(PolicyViolation::RevenueShare {
                max: 40,
                requested: 41
            })
        );

        let mut req = agent_request(0);
        req.limits.discount_limit_pct = -1;
        assert!(matches!(
            check_creation_policy(&req, &parent, &balance(0, 0)),
            Err(PolicyViolation::DiscountLimit { .. })
        ));

        let mut req = agent_request(0);
        req.limits.bet_limit = 499;
        assert_eq!(
            check_creation_policy(&req, &parent, &balance(0, 0)),
            Err(PolicyViolation::BetLimit {
                min: 500,
                requested: 499
            })
        );
    }

    #[test]
    fn test_wrong_parent_tier() {
        let parent = master(parent_limits());
        let mut req = agent_request(0);
        req.tier = Tier::Player;
        assert_eq!(
            check_creation_policy(&req, &parent, &balance(0, 0)),
            Err(PolicyViolation::WrongParentTier {
                tier: Tier::Player,
                expected: Tier::Agent,
                actual: Tier::MasterAgent
            })
        );
    }

    #[test]
    fn test_master_under_super_cannot_be_funded() {
        let mut root = master(parent_limits());
        root.tier = Tier::SuperAgent;
        root.parent_id = None;
        let mut req = agent_request(1000);
        req.tier = Tier::MasterAgent;
        assert_eq!(
            check_creation_policy(&req, &root, &balance(3000, 0)),
            Err(PolicyViolation::UnfundableTier {
                parent: Tier::SuperAgent,
                child: Tier::MasterAgent
            })
        );

        req.total_to_spend = 0;
        assert_eq!(check_creation_policy(&req, &root, &balance(3000, 0)), Ok(()));
    }

    #[test]
    fn test_validate_fields() {
        assert!(agent_request(0).validate_fields().is_ok());

        let mut req = agent_request(0);
        req.username = "a b".to_string();
        assert!(req.validate_fields().is_err());

        let mut req = agent_request(0);
        req.password = "123".to_string();
        assert!(matches!(
            req.validate_fields(),
            Err(PolicyViolation::InvalidField {
                field: "password",
                ..
            })
        ));

        let mut req = agent_request(0);
        req.tier = Tier::SuperAgent;
        assert_eq!(
            req.validate_fields(),
            Err(PolicyViolation::UnsupportedTier(Tier::SuperAgent))
        );
    }

    #[test]
    fn test_display_names() {
        let req = agent_request(0);
        assert_eq!(
            req.display_names(),
            ("agent7".to_string(), "agent7".to_string())
        );
    }

    #[test]
    fn test_violation_message() {
        let v = PolicyViolation::SpendAllowance {
            max: 3000,
            requested: 5000,
        };
        assert_eq!(
            v.to_string(),
            "Total to spend must be between 0 and 30.00 (requested 50.00)"
        );
    }
}
