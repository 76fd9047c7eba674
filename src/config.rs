use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::time::Duration;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    /// PostgreSQL connection URL for accounts, balances and the ledger
    #[serde(default)]
    pub postgres_url: Option<String>,
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,
    pub remote: RemoteConfig,
    #[serde(default)]
    pub backoffice: BackofficeConfig,
}

/// Remote wagering API endpoint and credentials
#[derive(Serialize, Deserialize, Clone)]
pub struct RemoteConfig {
    pub base_url: String,
    pub api_host: String,
    /// Per-call network timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// API username -> password. Operators authenticate with the username of
    /// the super agent at the root of their tree.
    #[serde(default)]
    pub users: HashMap<String, String>,
}

fn default_db_max_connections() -> u32 {
    5
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}

impl fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut users: Vec<&str> = self.users.keys().map(String::as_str).collect();
        users.sort_unstable();
        f.debug_struct("RemoteConfig")
            .field("base_url", &self.base_url)
            .field("api_host", &self.api_host)
            .field("timeout_secs", &self.timeout_secs)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("users", &users)
            .finish()
    }
}

/// Credentials for the remote `connect` call
#[derive(Clone, PartialEq, Eq)]
pub struct ApiCredentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for ApiCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

impl RemoteConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Look up the configured password for an API username
    pub fn credentials_for(&self, username: &str) -> Option<ApiCredentials> {
        self.users.get(username).map(|password| ApiCredentials {
            username: username.to_string(),
            password: password.clone(),
        })
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BackofficeConfig {
    /// Domain used to synthesise e-mail addresses of new accounts
    pub email_domain: String,
    /// Currency for accounts created without a parent (master agents)
    pub default_currency: String,
}

impl Default for BackofficeConfig {
    fn default() -> Self {
        Self {
            email_domain: "agents.local".to_string(),
            default_currency: "USD".to_string(),
        }
    }
}

impl AppConfig {
    pub fn load(env: &str) -> Result<Self> {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path))?;
        Self::from_yaml(&content).with_context(|| format!("Failed to parse {}", config_path))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }
}
