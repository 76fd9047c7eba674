//! reqwest client for the remote wagering API
//!
//! Endpoints:
//! - `GET  {base}/user/{host}/connect/{username}/{password}` -> raw token
//! - `POST {base}/data/{host}/{op}/{token}` -> `{"result":{"records":[{"transactionID":..}]}}`
//! - `POST {base}/user/{host}/CreateAgent/{token}` -> `{"result": id}`
//! - `POST {base}/user/{host}/CreateUser/{token}` -> `{"result":{"records":[{"playerId":..}]}}`
//!
//! Failures come back as `{"error": "..."}` with a 2xx status as often as
//! with an error status, so bodies are always inspected.
//!
//! Path segments are percent-encoded. Errors never carry the request URL,
//! which holds the password or the session token.

use async_trait::async_trait;
use reqwest::Url;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{RemoteError, RemoteLedger, RemoteOp, RemoteProfile, SessionToken};
use crate::account::Tier;
use crate::config::{ApiCredentials, RemoteConfig};
use crate::core_types::{ExternalId, MinorUnits, RemoteTxId};
use crate::money::to_major_units;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LegBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    player_id: Option<ExternalId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    affiliate_id: Option<ExternalId>,
    money_status: i32,
    #[serde(with = "rust_decimal::serde::float")]
    amount: Decimal,
    comment: &'a str,
    currency_code: &'a str,
}

impl<'a> LegBody<'a> {
    fn new(
        op: RemoteOp,
        target: ExternalId,
        amount: MinorUnits,
        comment: &'a str,
        currency: &'a str,
    ) -> Self {
        let signed = if op.is_withdraw() { -amount } else { amount };
        let (player_id, affiliate_id) = if op.targets_player() {
            (Some(target), None)
        } else {
            (None, Some(target))
        };
        Self {
            player_id,
            affiliate_id,
            money_status: op.money_status(),
            amount: to_major_units(signed),
            comment,
            currency_code: currency,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AffiliateBody<'a> {
    name: &'a str,
    email: &'a str,
    second_name: &'a str,
    last_name: &'a str,
    second_last_name: &'a str,
    username: &'a str,
    password: &'a str,
    agent_role: i32,
    parent_affiliate_id: ExternalId,
    main_currency: &'a str,
    terms_and_cond: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateAgentBody<'a> {
    affiliate: AffiliateBody<'a>,
    is_agent: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateUserBody<'a> {
    firstname: &'a str,
    middle_name: &'a str,
    lastname: &'a str,
    login: &'a str,
    phone_number: &'a str,
    email: &'a str,
    #[serde(rename = "ParentId")]
    parent_id: ExternalId,
    password: &'a str,
    country_code: &'a str,
}

pub struct HttpRemoteLedger {
    client: reqwest::Client,
    base_url: Url,
    api_host: String,
}

impl HttpRemoteLedger {
    pub fn new(config: &RemoteConfig) -> Result<Self, RemoteError> {
        info!(
            "Initializing remote ledger client for {} (host {})",
            config.base_url, config.api_host
        );

        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(|e| RemoteError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        let base_url = Url::parse(&config.base_url)
            .map_err(|e| RemoteError::Endpoint(format!("{}: {}", config.base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(RemoteError::Endpoint(format!(
                "{} cannot be a base URL",
                config.base_url
            )));
        }

        Ok(Self {
            client,
            base_url,
            api_host: config.api_host.clone(),
        })
    }

    /// Base URL with `segments` appended, each percent-encoded
    fn endpoint(&self, segments: &[&str]) -> Result<Url, RemoteError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| RemoteError::Endpoint("cannot be a base URL".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn url(&self, area: &str, op: &str, token: &SessionToken) -> Result<Url, RemoteError> {
        self.endpoint(&[area, &self.api_host, op, token.as_str()])
    }

    async fn post<B: Serialize>(&self, url: Url, body: &B) -> Result<Value, RemoteError> {
        let response = self.client.post(url).json(body).send().await?;
        let status = response.status();
        let text = response.text().await?;

        let value: Value = match serde_json::from_str(&text) {
            Ok(v) => v,
            Err(_) if !status.is_success() => {
                return Err(RemoteError::Api(format!("HTTP {}: {}", status, truncate(&text))));
            }
            Err(e) => return Err(e.into()),
        };

        if let Some(message) = api_error(&value) {
            return Err(RemoteError::Api(message));
        }
        if !status.is_success() {
            return Err(RemoteError::Api(format!("HTTP {}", status)));
        }
        Ok(value)
    }

    async fn leg(
        &self,
        op: RemoteOp,
        token: &SessionToken,
        target: ExternalId,
        amount: MinorUnits,
        comment: &str,
        currency: &str,
    ) -> Result<RemoteTxId, RemoteError> {
        let body = LegBody::new(op, target, amount, comment, currency);
        debug!(op = %op, target, amount = %body.amount, currency, "Remote leg request");

        let value = self.post(self.url("data", op.endpoint(), token)?, &body).await?;
        let tx_id = decode_transaction_id(&value)?;

        debug!(op = %op, target, tx_id, "Remote leg settled");
        Ok(tx_id)
    }
}

fn connect_error(e: reqwest::Error) -> RemoteError {
    RemoteError::Connect(e.without_url().to_string())
}

fn truncate(text: &str) -> &str {
    match text.char_indices().nth(200) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// `{"error": "..."}` bodies
fn api_error(value: &Value) -> Option<String> {
    match value.get("error")? {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Ids arrive as JSON numbers or numeric strings
fn as_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn first_record(value: &Value) -> Option<&Value> {
    value.get("result")?.get("records")?.get(0)
}

/// Connect returns the token as the raw body, sometimes JSON-quoted
pub(crate) fn decode_token(body: &str) -> Result<SessionToken, RemoteError> {
    let trimmed = body.trim();
    if trimmed.starts_with('{') {
        let value: Value = serde_json::from_str(trimmed)?;
        let message = api_error(&value).unwrap_or_else(|| "unexpected response".to_string());
        return Err(RemoteError::Connect(message));
    }

    let token = trimmed.trim_matches('"');
    if token.is_empty() {
        return Err(RemoteError::Connect("empty token".to_string()));
    }
    Ok(SessionToken::new(token))
}

/// A zero id is treated as absent
pub(crate) fn decode_transaction_id(value: &Value) -> Result<RemoteTxId, RemoteError> {
    first_record(value)
        .and_then(|r| r.get("transactionID"))
        .and_then(as_id)
        .filter(|id| *id != 0)
        .ok_or(RemoteError::MissingTransactionId)
}

pub(crate) fn decode_agent_id(value: &Value) -> Result<ExternalId, RemoteError> {
    value
        .get("result")
        .and_then(as_id)
        .filter(|id| *id > 0)
        .ok_or_else(|| RemoteError::Decode("CreateAgent response has no agent id".to_string()))
}

pub(crate) fn decode_player_id(value: &Value) -> Result<ExternalId, RemoteError> {
    first_record(value)
        .and_then(|r| r.get("playerId"))
        .and_then(as_id)
        .filter(|id| *id > 0)
        .ok_or_else(|| RemoteError::Decode("CreateUser response has no player id".to_string()))
}

#[async_trait]
impl RemoteLedger for HttpRemoteLedger {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn connect(&self, credentials: &ApiCredentials) -> Result<SessionToken, RemoteError> {
        let url = self.endpoint(&[
            "user",
            &self.api_host,
            "connect",
            &credentials.username,
            &credentials.password,
        ])?;

        let response = self.client.get(url).send().await.map_err(connect_error)?;
        let status = response.status();
        let body = response.text().await.map_err(connect_error)?;

        if !status.is_success() {
            warn!(username = %credentials.username, %status, "Remote connect rejected");
            return Err(RemoteError::Connect(format!("HTTP {}", status)));
        }

        let token = decode_token(&body)?;
        debug!(username = %credentials.username, "Remote session opened");
        Ok(token)
    }

    async fn transfer_to_user(
        &self,
        token: &SessionToken,
        player: ExternalId,
        amount: MinorUnits,
        comment: &str,
        currency: &str,
    ) -> Result<RemoteTxId, RemoteError> {
        self.leg(RemoteOp::TransferToUser, token, player, amount, comment, currency)
            .await
    }

    async fn transfer_to_agent(
        &self,
        token: &SessionToken,
        agent: ExternalId,
        amount: MinorUnits,
        comment: &str,
        currency: &str,
    ) -> Result<RemoteTxId, RemoteError> {
        self.leg(RemoteOp::TransferToAgent, token, agent, amount, comment, currency)
            .await
    }

    async fn withdraw_from_player(
        &self,
        token: &SessionToken,
        player: ExternalId,
        amount: MinorUnits,
        comment: &str,
        currency: &str,
    ) -> Result<RemoteTxId, RemoteError> {
        self.leg(RemoteOp::WithdrawFromPlayer, token, player, amount, comment, currency)
            .await
    }

    async fn withdraw_from_agent(
        &self,
        token: &SessionToken,
        agent: ExternalId,
        amount: MinorUnits,
        comment: &str,
        currency: &str,
    ) -> Result<RemoteTxId, RemoteError> {
        self.leg(RemoteOp::WithdrawFromAgent, token, agent, amount, comment, currency)
            .await
    }

    async fn create_agent_account(
        &self,
        token: &SessionToken,
        profile: &RemoteProfile,
        tier: Tier,
        parent: ExternalId,
    ) -> Result<ExternalId, RemoteError> {
        let agent_role = tier
            .api_role()
            .ok_or_else(|| RemoteError::Api(format!("{} is not an agent tier", tier)))?;

        let body = CreateAgentBody {
            affiliate: AffiliateBody {
                name: &profile.first_name,
                email: &profile.email,
                second_name: &profile.nickname,
                last_name: &profile.last_name,
                second_last_name: &profile.username,
                username: &profile.username,
                password: &profile.password,
                agent_role,
                parent_affiliate_id: parent,
                main_currency: &profile.currency,
                terms_and_cond: true,
            },
            is_agent: true,
        };

        let value = self
            .post(self.url("user", "CreateAgent", token)?, &body)
            .await?;
        let id = decode_agent_id(&value)?;
        info!(username = %profile.username, %tier, external_id = id, "Remote agent created");
        Ok(id)
    }

    async fn create_player_account(
        &self,
        token: &SessionToken,
        profile: &RemoteProfile,
        parent: ExternalId,
    ) -> Result<ExternalId, RemoteError> {
        let body = CreateUserBody {
            firstname: &profile.first_name,
            middle_name: "",
            lastname: &profile.last_name,
            login: &profile.username,
            phone_number: profile.phone.as_deref().unwrap_or(""),
            email: &profile.email,
            parent_id: parent,
            password: &profile.password,
            country_code: "",
        };

        let value = self
            .post(self.url("user", "CreateUser", token)?, &body)
            .await?;
        let id = decode_player_id(&value)?;
        info!(username = %profile.username, external_id = id, "Remote player created");
        Ok(id)
    }
}
