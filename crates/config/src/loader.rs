//! Configuration loading from multiple sources

use crate::{AppConfig, ConfigError, Result};
use config::{Config, ConfigBuilder, Environment, File, FileFormat};
use datamarket_types::{AddressEntry, AddressError, AddressRegistry};
use std::path::Path;

/// Default environment variable prefix
pub const ENV_PREFIX: &str = "DATAMARKET";

/// Configuration loader with support for multiple formats and sources
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a file
    ///
    /// Supports TOML, YAML, and JSON formats based on file extension
    pub fn from_file(path: &Path) -> Result<AppConfig> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| ConfigError::LoadError("No file extension found".to_string()))?;

        let content = std::fs::read_to_string(path)?;

        match extension {
            "toml" => Self::from_toml(&content),
            "yaml" | "yml" => Self::from_yaml(&content),
            "json" => Self::from_json(&content),
            _ => Err(ConfigError::LoadError(format!(
                "Unsupported file extension: {}",
                extension
            ))),
        }
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<AppConfig> {
        toml::from_str(content).map_err(ConfigError::from)
    }

    /// Load configuration from YAML string
    pub fn from_yaml(content: &str) -> Result<AppConfig> {
        serde_yaml::from_str(content).map_err(ConfigError::from)
    }

    /// Load configuration from JSON string
    pub fn from_json(content: &str) -> Result<AppConfig> {
        serde_json::from_str(content).map_err(ConfigError::from)
    }

    /// Load configuration from file with environment variable overrides
    ///
    /// Variables use a double underscore between path segments, for example
    /// `DATAMARKET__LEDGER__RPC_URL=http://localhost:8545`.
    pub fn from_file_with_env(path: &Path, env_prefix: &str) -> Result<AppConfig> {
        Self::builder()
            .add_file(path, true)
            .add_env(env_prefix)
            .build()
    }

    /// Build configuration using the config crate's builder pattern
    pub fn builder() -> ConfigLoaderBuilder {
        ConfigLoaderBuilder {
            builder: Config::builder(),
        }
    }

    /// Load the address registry file (a JSON array of address entries)
    pub fn load_addresses(path: &Path) -> Result<AddressRegistry> {
        let source_name = path.display().to_string();

        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AddressError::ConfigurationMissing { source_name }.into());
            }
            Err(e) => return Err(e.into()),
        };

        let entries: Vec<AddressEntry> = serde_json::from_str(&content)?;
        tracing::debug!(path = %source_name, count = entries.len(), "Loaded address registry");

        AddressRegistry::new(entries, source_name).map_err(ConfigError::from)
    }
}

/// Builder for complex configuration loading scenarios
pub struct ConfigLoaderBuilder {
    builder: ConfigBuilder<config::builder::DefaultState>,
}

impl ConfigLoaderBuilder {
    /// Add a configuration file source
    pub fn add_file(mut self, path: &Path, required: bool) -> Self {
        let format = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => FileFormat::Toml,
            Some("yaml") | Some("yml") => FileFormat::Yaml,
            Some("json") => FileFormat::Json,
            _ => FileFormat::Toml, // Default to TOML
        };

        self.builder = self
            .builder
            .add_source(File::from(path).format(format).required(required));
        self
    }

    /// Add environment variable source with prefix
    pub fn add_env(mut self, prefix: &str) -> Self {
        self.builder = self.builder.add_source(
            Environment::with_prefix(prefix)
                .separator("__")
                .try_parsing(true),
        );
        self
    }

    /// Set a default value for a key
    pub fn set_default(mut self, key: &str, value: &str) -> Result<Self> {
        self.builder = self.builder.set_default(key, value)?;
        Ok(self)
    }

    /// Build the final configuration
    pub fn build(self) -> Result<AppConfig> {
        let config = self.builder.build()?;
        config.try_deserialize().map_err(ConfigError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Environment as NetworkEnvironment;
    use std::io::Write;

    const TOML: &str = r#"
        [network]
        environment = "testnet"
        log_level = "debug"
        explorer_tx_url = "https://ropsten.etherscan.io/tx/"

        [ledger]
        rpc_url = "http://localhost:8545"
        registry_contract = "0x0000000000000000000000000000000000000aaa"
        token_contract = "0x0000000000000000000000000000000000000bbb"

        [ingestion]
        base_url = "http://localhost:5000"

        [storage]
        root = "/tmp/datamarket"

        [polling]
        interval_secs = 2
        batch_size = 5
        max_wait_secs = 0
    "#;

    #[test]
    fn test_load_from_toml() {
        let config = ConfigLoader::from_toml(TOML).unwrap();

        assert_eq!(config.network.environment, NetworkEnvironment::Testnet);
        assert_eq!(config.network.gas_multiplier, 1.5);
        assert_eq!(config.network.gas_ceiling, 4_700_000);
        assert_eq!(config.ledger.token_decimals, 8);
        assert_eq!(config.polling.batch_size, 5);
        assert_eq!(config.polling.max_wait(), None);
        assert_eq!(
            config.storage.temp_root(),
            std::path::PathBuf::from("/tmp/datamarket/.temp")
        );
    }

    #[test]
    fn test_load_from_yaml() {
        let yaml = r#"
network:
  environment: mainnet
ledger:
  rpc_url: "https://mainnet.example.org"
  registry_contract: "0x0000000000000000000000000000000000000aaa"
  token_contract: "0x0000000000000000000000000000000000000bbb"
  token_decimals: 18
ingestion:
  base_url: "https://data.example.org"
        "#;

        let config = ConfigLoader::from_yaml(yaml).unwrap();
        assert_eq!(config.network.environment, NetworkEnvironment::Mainnet);
        assert_eq!(config.ledger.token_decimals, 18);
        assert_eq!(config.polling.max_wait_secs, 1800);
    }

    #[test]
    fn test_load_from_json() {
        let json = r#"
{
  "ledger": {
    "rpc_url": "http://localhost:8545",
    "registry_contract": "0x0000000000000000000000000000000000000aaa",
    "token_contract": "0x0000000000000000000000000000000000000bbb"
  },
  "ingestion": { "base_url": "http://localhost:5000", "timeout_ms": 1000 }
}
        "#;

        let config = ConfigLoader::from_json(json).unwrap();
        assert_eq!(config.network.environment, NetworkEnvironment::Mainnet);
        assert_eq!(config.ingestion.timeout_ms, 1000);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        file.write_all(TOML.as_bytes()).unwrap();

        let config = ConfigLoader::from_file(file.path()).unwrap();
        assert_eq!(config.network.log_level, "debug");
        assert_eq!(
            config.network.explorer_link("0xabc").as_deref(),
            Some("https://ropsten.etherscan.io/tx/0xabc")
        );
    }

    #[test]
    fn test_unsupported_extension() {
        let file = tempfile::Builder::new().suffix(".ini").tempfile().unwrap();
        let err = ConfigLoader::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::LoadError(_)));
    }

    #[test]
    fn test_load_addresses() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"pubAddr": "0x52908400098527886E0F7030069857D2E4169EE7", "desc": "main"}}]"#
        )
        .unwrap();

        let registry = ConfigLoader::load_addresses(file.path()).unwrap();
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_load_addresses_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = ConfigLoader::load_addresses(&dir.path().join("addresses.json")).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Address(AddressError::ConfigurationMissing { .. })
        ));
    }

    #[test]
    fn test_load_addresses_empty_default() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"[{{"pubAddr": "", "desc": ""}}]"#).unwrap();

        let err = ConfigLoader::load_addresses(file.path()).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Address(AddressError::ConfigurationMissing { .. })
        ));
    }
}
