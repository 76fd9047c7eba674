//! Account creation workflow
//!
//! 1. Validate the request against the parent's profile and balance.
//! 2. Create the account on the remote platform.
//! 3. Persist the local account and its zeroed balance record.
//! 4. Fund it from the parent through a weekly settlement.
//!
//! If step 4 fails the local account is deleted again. The remote account
//! stays: the remote API has no delete call, so its external id is logged
//! for manual cleanup.

use std::sync::Arc;
use tracing::{error, info};

use super::models::{Account, Tier};
use super::password::hash_password;
use super::validation::{NewAccountRequest, PolicyViolation, check_creation_policy};
use crate::config::BackofficeConfig;
use crate::ledger::NewAccount;
use crate::reconciliation::{
    OperatorContext, ReconciliationEngine, ReconciliationError, SettlementKind,
};
use crate::remote::RemoteProfile;

pub struct AccountProvisioner {
    engine: Arc<ReconciliationEngine>,
    settings: BackofficeConfig,
}

impl AccountProvisioner {
    pub fn new(engine: Arc<ReconciliationEngine>, settings: BackofficeConfig) -> Self {
        Self { engine, settings }
    }

    /// Parent the new account hangs under
    async fn resolve_parent(
        &self,
        ctx: &OperatorContext,
        req: &NewAccountRequest,
    ) -> Result<Account, ReconciliationError> {
        // Masters always belong to the operator's root super agent
        if req.tier == Tier::MasterAgent {
            return Ok(self
                .engine
                .store()
                .root_account(ctx.operator_id())
                .await?);
        }

        let parent_id = req.parent_id.ok_or(PolicyViolation::InvalidField {
            field: "parent_id",
            reason: "required for agents and players",
        })?;
        self.engine.load_account(parent_id).await
    }

    pub async fn create_account(
        &self,
        ctx: &OperatorContext,
        req: &NewAccountRequest,
    ) -> Result<Account, ReconciliationError> {
        req.validate_fields()?;

        let parent = self.resolve_parent(ctx, req).await?;
        let parent_balance = self.engine.load_balance(parent.account_id).await?;
        check_creation_policy(req, &parent, &parent_balance)?;

        let username = req.username.trim().to_string();
        let email = format!("{}@{}", username.to_lowercase(), self.settings.email_domain);
        let (first_name, last_name) = req.display_names();
        let currency = if parent.currency.is_empty() {
            self.settings.default_currency.clone()
        } else {
            parent.currency.clone()
        };

        let password_hash = hash_password(&req.password)
            .map_err(|e| ReconciliationError::PasswordHash(e.to_string()))?;

        let profile = RemoteProfile {
            username: username.clone(),
            email: email.clone(),
            password: req.password.clone(),
            nickname: req.nickname.clone(),
            first_name,
            last_name,
            phone: req.phone.clone(),
            currency: currency.clone(),
        };

        let remote = self.engine.remote();
        let token = remote
            .connect(&ctx.credentials)
            .await
            .map_err(ReconciliationError::Provisioning)?;
        let external_id = if req.tier.is_player() {
            remote
                .create_player_account(&token, &profile, parent.external_id)
                .await
        } else {
            remote
                .create_agent_account(&token, &profile, req.tier, parent.external_id)
                .await
        }
        .map_err(ReconciliationError::Provisioning)?;

        let new = NewAccount {
            tier: req.tier,
            parent_id: Some(parent.account_id),
            username,
            email,
            external_id,
            currency,
            limits: req.limits,
            password_hash,
            phone: req.phone.clone(),
        };
        let account = match self.engine.store().insert_account(&new).await {
            Ok(account) => account,
            Err(e) => {
                error!(
                    username = %new.username,
                    external_id,
                    error = %e,
                    "Local insert failed, remote account left orphaned"
                );
                return Err(e.into());
            }
        };

        if req.total_to_spend > 0 {
            let funding = self
                .engine
                .settle_weekly(
                    ctx,
                    parent.account_id,
                    account.account_id,
                    -req.total_to_spend,
                    SettlementKind::AccountFunding,
                )
                .await;

            if let Err(source) = funding {
                if let Err(e) = self.engine.store().delete_account(account.account_id).await {
                    error!(
                        account_id = account.account_id,
                        error = %e,
                        "Compensating delete failed"
                    );
                }
                error!(
                    account_id = account.account_id,
                    external_id,
                    username = %account.username,
                    error = %source,
                    "Funding failed, local account removed; remote account left orphaned"
                );
                return Err(ReconciliationError::FundingFailure {
                    account: account.account_id,
                    external_id,
                    source: Box::new(source),
                });
            }
        }

        info!(
            account_id = account.account_id,
            username = %account.username,
            tier = %account.tier,
            parent = parent.account_id,
            external_id,
            total_to_spend = req.total_to_spend,
            "Account created"
        );
        Ok(account)
    }
}
