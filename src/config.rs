use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;

use crate::core_types::{Amount, UserId};
use crate::fee::FeeSchedule;
use crate::money::Currency;
use crate::otp::{NotifierConfig, OtpConfig};
use crate::transaction::{EngineConfig, GateConfig, WorkerConfig};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    /// Keep sqlx statement logging when true
    #[serde(default)]
    pub enable_tracing: bool,
    pub gateway: GatewayConfig,
    /// PostgreSQL connection URL. Absent means in-memory backends.
    #[serde(default)]
    pub postgres_url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub db_max_connections: u32,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub fees: FeeSchedule,
    #[serde(default)]
    pub otp: OtpConfig,
    #[serde(default)]
    pub gate: GateConfig,
    #[serde(default)]
    pub notifier: NotifierConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub bootstrap: BootstrapConfig,
}

fn default_max_connections() -> u32 {
    10
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
}

/// System accounts and fixtures provisioned once at startup
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct BootstrapConfig {
    /// Account that collects fees. Fees are extinguished when unset.
    pub fee_sink: Option<SeedAccount>,
    /// Accounts opened on startup if their number is not taken yet
    pub seed_accounts: Vec<SeedAccount>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SeedAccount {
    pub owner: UserId,
    pub number: String,
    #[serde(default = "default_account_kind")]
    pub kind: String,
    #[serde(default)]
    pub currency: Currency,
    #[serde(default)]
    pub opening_balance: Amount,
}

fn default_account_kind() -> String {
    "CHECKING".to_string()
}

impl AppConfig {
    pub fn load(env: &str) -> anyhow::Result<Self> {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path))?;
        Self::from_yaml(&content).with_context(|| format!("Invalid config: {}", config_path))
    }

    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        let config: AppConfig =
            serde_yaml::from_str(content).context("Failed to parse config yaml")?;
        config.fees.validate()?;
        if config.engine.min_amount == 0 {
            anyhow::bail!("engine.min_amount must be positive");
        }
        if config.otp.max_attempts == 0 {
            anyhow::bail!("otp.max_attempts must be positive");
        }
        Ok(config)
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.gateway.host, self.gateway.port)
    }
}
