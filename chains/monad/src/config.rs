use anyhow::Result;
use config::{Config, Environment, File};
use core_logic::config::WalletEntry;
use core_logic::{ConfigError, GasConfig, GasConfigToml};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct MonadConfig {
    pub rpc_url: String,
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,
    #[serde(default = "default_arb_rpc_url")]
    pub arb_rpc_url: String,
    #[serde(default = "default_arb_chain_id")]
    pub arb_chain_id: u64,
    #[serde(default = "default_db_path")]
    pub db_path: String,
    #[serde(default = "default_private_key_file")]
    pub private_key_file: String,
    #[serde(default = "default_csv_file")]
    pub csv_file: String,
    #[serde(default = "default_proxy_file")]
    pub proxy_file: String,
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    #[serde(default = "default_min_balance")]
    pub min_balance: f64,
    #[serde(default)]
    pub default_delay_secs: f64,
    #[serde(default = "default_true")]
    pub wait_for_receipt: bool,
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,
    pub blink_api_key: Option<String>,
    #[serde(default)]
    pub gas: GasConfigToml,
    #[serde(default)]
    pub wallets: Vec<WalletEntry>,
}

fn default_chain_id() -> u64 {
    10143
}
fn default_arb_rpc_url() -> String {
    "https://arb1.arbitrum.io/rpc".to_string()
}
fn default_arb_chain_id() -> u64 {
    42161
}
fn default_db_path() -> String {
    "monad.db".to_string()
}
fn default_private_key_file() -> String {
    "private_key.txt".to_string()
}
fn default_csv_file() -> String {
    "new_addresses.csv".to_string()
}
fn default_proxy_file() -> String {
    "proxies.txt".to_string()
}
fn default_max_workers() -> usize {
    5
}
fn default_min_balance() -> f64 {
    0.1
}
fn default_true() -> bool {
    true
}
fn default_http_timeout() -> u64 {
    15
}

impl MonadConfig {
    /// Loads `path`, then applies `MONAD_*` environment overrides
    /// (e.g. `MONAD_RPC_URL`).
    pub fn load(path: &str) -> Result<Self> {
        let settings = Config::builder()
            .add_source(File::with_name(path))
            .add_source(Environment::with_prefix("MONAD").try_parsing(true))
            .build()?;

        let config: Self = settings.try_deserialize().map_err(|e| anyhow::anyhow!(e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for url in [&self.rpc_url, &self.arb_rpc_url] {
            if url::Url::parse(url).is_err() {
                return Err(ConfigError::InvalidRpcUrl { url: url.clone() });
            }
        }
        if self.max_workers == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_workers".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.min_balance < 0.0 || self.default_delay_secs < 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "min_balance/default_delay_secs".to_string(),
                reason: "must not be negative".to_string(),
            });
        }
        Ok(())
    }

    pub fn gas_config(&self) -> GasConfig {
        self.gas.clone().into()
    }
}
