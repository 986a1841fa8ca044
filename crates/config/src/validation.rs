//! Configuration validation

use crate::{AppConfig, ConfigError, Result};
use datamarket_types::Address;

/// Validation error details
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate the entire application configuration
pub fn validate_config(config: &AppConfig) -> Result<()> {
    let mut errors = Vec::new();

    // Validate network config
    if let Err(e) = validate_log_level(&config.network.log_level) {
        errors.push(e);
    }

    if config.network.gas_multiplier.is_nan() || config.network.gas_multiplier < 1.0 {
        errors.push(ValidationError::new(
            "network.gas_multiplier",
            "must be >= 1.0",
        ));
    }

    if config.network.gas_ceiling == 0 {
        errors.push(ValidationError::new(
            "network.gas_ceiling",
            "must be greater than 0",
        ));
    }

    if let Some(explorer) = &config.network.explorer_tx_url {
        if let Err(e) = validate_url(explorer) {
            errors.push(ValidationError::new("network.explorer_tx_url", e));
        }
    }

    // Validate ledger config
    if let Err(e) = validate_url(&config.ledger.rpc_url) {
        errors.push(ValidationError::new("ledger.rpc_url", e));
    }

    if let Err(e) = config.ledger.registry_contract.parse::<Address>() {
        errors.push(ValidationError::new(
            "ledger.registry_contract",
            e.to_string(),
        ));
    }

    if let Err(e) = config.ledger.token_contract.parse::<Address>() {
        errors.push(ValidationError::new(
            "ledger.token_contract",
            e.to_string(),
        ));
    }

    if config.ledger.token_decimals > 30 {
        errors.push(ValidationError::new(
            "ledger.token_decimals",
            "must be <= 30",
        ));
    }

    if config.ledger.timeout_ms == 0 {
        errors.push(ValidationError::new(
            "ledger.timeout_ms",
            "must be greater than 0",
        ));
    }

    // Validate ingestion config
    if let Err(e) = validate_url(&config.ingestion.base_url) {
        errors.push(ValidationError::new("ingestion.base_url", e));
    }

    if config.ingestion.timeout_ms == 0 {
        errors.push(ValidationError::new(
            "ingestion.timeout_ms",
            "must be greater than 0",
        ));
    }

    // Validate polling config
    if config.polling.interval_secs == 0 {
        errors.push(ValidationError::new(
            "polling.interval_secs",
            "must be greater than 0",
        ));
    }

    if config.polling.batch_size == 0 {
        errors.push(ValidationError::new(
            "polling.batch_size",
            "must be greater than 0",
        ));
    }

    // Validate storage config
    if config.storage.root.as_os_str().is_empty() {
        errors.push(ValidationError::new(
            "storage.root",
            "storage root is required",
        ));
    }

    // Return all errors if any were found
    if !errors.is_empty() {
        let error_msg = errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        return Err(ConfigError::ValidationError(error_msg));
    }

    Ok(())
}

/// Validate a URL
pub fn validate_url(url: &str) -> std::result::Result<(), String> {
    if url.is_empty() {
        return Err("URL cannot be empty".to_string());
    }

    // Basic URL validation - check for scheme
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err("URL must start with http:// or https://".to_string());
    }

    Ok(())
}

/// Validate log level
fn validate_log_level(level: &str) -> std::result::Result<(), ValidationError> {
    match level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ValidationError::new(
            "network.log_level",
            format!(
                "invalid log level '{level}', must be one of: trace, debug, info, warn, error"
            ),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        AddressesConfig, Environment, IngestionConfig, LedgerConfig, NetworkConfig,
        PollingConfig, StorageConfig,
    };

    fn valid_config() -> AppConfig {
        AppConfig {
            network: NetworkConfig {
                environment: Environment::Testnet,
                ..Default::default()
            },
            ledger: LedgerConfig::new(
                "http://localhost:8545",
                "0x0000000000000000000000000000000000000aaa",
                "0x0000000000000000000000000000000000000bbb",
            ),
            ingestion: IngestionConfig::new("http://localhost:5000"),
            storage: StorageConfig::default(),
            polling: PollingConfig::default(),
            addresses: AddressesConfig::default(),
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(validate_config(&valid_config()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = valid_config();
        config.network.gas_multiplier = 0.5;
        config.ledger.registry_contract = "not-an-address".to_string();
        config.ingestion.base_url = "ftp://example.org".to_string();
        config.polling.batch_size = 0;

        let err = validate_config(&config).unwrap_err().to_string();
        assert!(err.contains("network.gas_multiplier"));
        assert!(err.contains("ledger.registry_contract"));
        assert!(err.contains("ingestion.base_url"));
        assert!(err.contains("polling.batch_size"));
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = valid_config();
        config.network.log_level = "loud".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_nan_multiplier_rejected() {
        let mut config = valid_config();
        config.network.gas_multiplier = f64::NAN;
        assert!(validate_config(&config).is_err());
    }
}
