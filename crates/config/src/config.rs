//! Core configuration structures for the dataset marketplace pipeline

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Network profile (gas policy, explorer links, logging)
    #[serde(default)]
    pub network: NetworkConfig,

    /// Ledger node and contract addresses
    pub ledger: LedgerConfig,

    /// Ingestion service endpoint
    pub ingestion: IngestionConfig,

    /// Local bundle storage
    #[serde(default)]
    pub storage: StorageConfig,

    /// Confirmation polling
    #[serde(default)]
    pub polling: PollingConfig,

    /// Address registry file
    #[serde(default)]
    pub addresses: AddressesConfig,
}

/// Network environment configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Environment type (mainnet, testnet)
    pub environment: Environment,

    /// Gas estimate multiplier applied on test networks
    #[serde(default = "default_gas_multiplier")]
    pub gas_multiplier: f64,

    /// Upper bound for the inflated gas limit on test networks
    #[serde(default = "default_gas_ceiling")]
    pub gas_ceiling: u64,

    /// Transaction explorer prefix; the hash is appended
    #[serde(default)]
    pub explorer_tx_url: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Environment types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Mainnet,
    Testnet,
}

/// Ledger node configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// JSON-RPC endpoint URL
    pub rpc_url: String,

    /// Marketplace registry contract address
    pub registry_contract: String,

    /// Token contract address
    pub token_contract: String,

    /// Decimal places of the token's base unit
    #[serde(default = "default_token_decimals")]
    pub token_decimals: u32,

    /// Request timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum retry attempts for read calls
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

/// Ingestion service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionConfig {
    /// Base URL of the ingestion service
    pub base_url: String,

    /// Request timeout in milliseconds; applies to headers, not the streamed body
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

/// Local bundle storage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory holding one folder per dataset
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,

    /// Where downloaded parts are staged; defaults to `<root>/.temp`
    #[serde(default)]
    pub temp_dir: Option<PathBuf>,
}

/// Confirmation polling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Seconds slept per unit
    #[serde(default = "default_poll_interval_secs")]
    pub interval_secs: u64,

    /// Units slept between receipt queries
    #[serde(default = "default_poll_batch_size")]
    pub batch_size: u32,

    /// Give up after this many seconds; 0 waits forever
    #[serde(default = "default_max_wait_secs")]
    pub max_wait_secs: u64,
}

/// Address registry location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddressesConfig {
    #[serde(default = "default_addresses_path")]
    pub path: PathBuf,
}

impl StorageConfig {
    pub fn temp_root(&self) -> PathBuf {
        self.temp_dir
            .clone()
            .unwrap_or_else(|| self.root.join(".temp"))
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn max_wait(&self) -> Option<Duration> {
        (self.max_wait_secs > 0).then(|| Duration::from_secs(self.max_wait_secs))
    }
}

impl NetworkConfig {
    pub fn is_testnet(&self) -> bool {
        self.environment == Environment::Testnet
    }

    pub fn explorer_link(&self, tx_hash: &str) -> Option<String> {
        self.explorer_tx_url
            .as_ref()
            .map(|prefix| format!("{}{}", prefix, tx_hash))
    }
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_gas_multiplier() -> f64 {
    1.5
}

fn default_gas_ceiling() -> u64 {
    4_700_000
}

fn default_token_decimals() -> u32 {
    8
}

fn default_timeout_ms() -> u64 {
    30000
}

fn default_max_retries() -> u32 {
    3
}

fn default_poll_interval_secs() -> u64 {
    1
}

fn default_poll_batch_size() -> u32 {
    10
}

fn default_max_wait_secs() -> u64 {
    1800 // 30 minutes
}

fn default_storage_root() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("datamarket")
        .join("bundles")
}

fn default_addresses_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("datamarket")
        .join("addresses.json")
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            environment: Environment::Mainnet,
            gas_multiplier: default_gas_multiplier(),
            gas_ceiling: default_gas_ceiling(),
            explorer_tx_url: None,
            log_level: default_log_level(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
            temp_dir: None,
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_poll_interval_secs(),
            batch_size: default_poll_batch_size(),
            max_wait_secs: default_max_wait_secs(),
        }
    }
}

impl Default for AddressesConfig {
    fn default() -> Self {
        Self {
            path: default_addresses_path(),
        }
    }
}

impl LedgerConfig {
    pub fn new(
        rpc_url: impl Into<String>,
        registry_contract: impl Into<String>,
        token_contract: impl Into<String>,
    ) -> Self {
        Self {
            rpc_url: rpc_url.into(),
            registry_contract: registry_contract.into(),
            token_contract: token_contract.into(),
            token_decimals: default_token_decimals(),
            timeout_ms: default_timeout_ms(),
            max_retries: default_max_retries(),
        }
    }
}

impl IngestionConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout_ms: default_timeout_ms(),
        }
    }
}
