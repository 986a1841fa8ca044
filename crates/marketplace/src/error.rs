use datamarket_bundle::BundleError;
use datamarket_ingestion::IngestionError;
use datamarket_ledger::LedgerError;
use datamarket_orchestrator::OrchestratorError;
use datamarket_types::{Address, AddressError, DataFrequency, DatasetId, TxHash};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MarketplaceError {
    /// No usable public address; fatal at startup
    #[error("no usable public address configured in {source_name}")]
    AddressConfigurationMissing { source_name: String },

    #[error("address index {index} out of range, {available} configured")]
    InvalidSelection { index: usize, available: usize },

    #[error("invalid address {value}: {reason}")]
    InvalidAddress { value: String, reason: String },

    #[error("dataset {dataset} is not registered")]
    DatasetNotRegistered { dataset: DatasetId },

    #[error("dataset {dataset} is already registered")]
    DatasetAlreadyRegistered { dataset: DatasetId },

    #[error("dataset {dataset} is owned by {owner}, which is not a configured address")]
    OwnerMismatch { dataset: DatasetId, owner: Address },

    #[error("subscription record does not match query (address: {address}, dataset: {dataset})")]
    SubscriptionMismatch { address: Address, dataset: DatasetId },

    #[error("subscription of {address} to {dataset} is not active (expiry: {expiry_timestamp})")]
    SubscriptionExpired {
        address: Address,
        dataset: DatasetId,
        expiry_timestamp: u64,
    },

    #[error("balance of {address} is {balance}, more than {price} is needed to subscribe to {dataset}")]
    InsufficientBalance {
        address: Address,
        dataset: DatasetId,
        balance: u128,
        price: u128,
    },

    #[error("subscription to {dataset} was not confirmed")]
    NotConfirmed { dataset: DatasetId },

    /// Nothing reached the ledger
    #[error("transaction submission failed: {0}")]
    TransactionSubmission(#[source] OrchestratorError),

    /// Mined but reverted; not retried
    #[error("transaction {hash} failed")]
    TransactionFailed { hash: TxHash },

    #[error("transaction {hash} not confirmed within {waited:?}")]
    TransactionTimeout { hash: TxHash, waited: Duration },

    #[error(transparent)]
    Transaction(OrchestratorError),

    /// The allowance is confirmed and stays on-chain
    #[error("subscribe call for {dataset} failed after approval {approval}: {source}")]
    SubscribeIncomplete {
        dataset: DatasetId,
        approval: TxHash,
        #[source]
        source: Box<MarketplaceError>,
    },

    #[error("{request} request failed with status {status}{}", payload_suffix(.payload))]
    IngestionRequestFailed {
        request: String,
        status: u16,
        payload: Option<serde_json::Value>,
    },

    #[error("no credentials available for {address}")]
    CredentialsUnavailable { address: Address },

    #[error("no CSV files found in {}", .dir.display())]
    NoFilesFound { dir: PathBuf },

    /// Registration transaction `tx_hash` is confirmed and stays on-chain
    #[error("dataset {dataset} registered on-chain in {tx_hash} but metadata was rejected: {source}")]
    MetadataRegistrationFailed {
        dataset: DatasetId,
        tx_hash: TxHash,
        #[source]
        source: IngestionError,
    },

    #[error("no {frequency} bundle for {dataset}")]
    BundleNotFound {
        dataset: DatasetId,
        frequency: DataFrequency,
    },

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Ingestion(IngestionError),

    #[error(transparent)]
    Bundle(#[from] BundleError),

    #[error("invalid file pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

fn payload_suffix(payload: &Option<serde_json::Value>) -> String {
    match payload {
        Some(value) => format!(": {}", value),
        None => String::new(),
    }
}

impl MarketplaceError {
    /// Hash of a transaction that reached the ledger, for manual inspection
    pub fn tx_hash(&self) -> Option<&TxHash> {
        match self {
            Self::TransactionFailed { hash } | Self::TransactionTimeout { hash, .. } => Some(hash),
            Self::MetadataRegistrationFailed { tx_hash, .. } => Some(tx_hash),
            Self::SubscribeIncomplete { source, .. } => source.tx_hash(),
            Self::Transaction(e) | Self::TransactionSubmission(e) => e.tx_hash(),
            _ => None,
        }
    }

    /// The user can fix this and try again without any on-chain cleanup
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            Self::AddressConfigurationMissing { .. }
                | Self::TransactionFailed { .. }
                | Self::SubscribeIncomplete { .. }
                | Self::MetadataRegistrationFailed { .. }
        )
    }
}

impl From<AddressError> for MarketplaceError {
    fn from(e: AddressError) -> Self {
        match e {
            AddressError::ConfigurationMissing { source_name } => {
                Self::AddressConfigurationMissing { source_name }
            }
            AddressError::InvalidSelection { index, len } => Self::InvalidSelection {
                index,
                available: len,
            },
            AddressError::Invalid { value, reason } => Self::InvalidAddress { value, reason },
        }
    }
}

impl From<OrchestratorError> for MarketplaceError {
    fn from(e: OrchestratorError) -> Self {
        match e {
            OrchestratorError::Failed { hash } => Self::TransactionFailed { hash },
            OrchestratorError::Timeout { hash, waited } => Self::TransactionTimeout { hash, waited },
            OrchestratorError::Receipt { .. } => Self::Transaction(e),
            OrchestratorError::Build { .. }
            | OrchestratorError::Signing(_)
            | OrchestratorError::InvalidSignedPayload(_)
            | OrchestratorError::Submission { .. } => Self::TransactionSubmission(e),
        }
    }
}

impl From<IngestionError> for MarketplaceError {
    fn from(e: IngestionError) -> Self {
        match e {
            IngestionError::SubscriptionMismatch { address, dataset } => {
                Self::SubscriptionMismatch { address, dataset }
            }
            IngestionError::SubscriptionExpired {
                address,
                dataset,
                expiry_timestamp,
            } => Self::SubscriptionExpired {
                address,
                dataset,
                expiry_timestamp,
            },
            IngestionError::CredentialsUnavailable { address } => {
                Self::CredentialsUnavailable { address }
            }
            IngestionError::RequestFailed {
                request,
                status,
                payload,
            } => Self::IngestionRequestFailed {
                request,
                status,
                payload,
            },
            IngestionError::Ledger(e) => Self::Ledger(e),
            other => Self::Ingestion(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orchestrator_errors_map_to_kinds() {
        let hash = TxHash::new("0xabc");
        let failed: MarketplaceError = OrchestratorError::Failed { hash: hash.clone() }.into();
        assert!(matches!(failed, MarketplaceError::TransactionFailed { .. }));
        assert_eq!(failed.tx_hash(), Some(&hash));
        assert!(!failed.is_recoverable());

        let timeout: MarketplaceError = OrchestratorError::Timeout {
            hash,
            waited: Duration::from_secs(5),
        }
        .into();
        assert!(matches!(timeout, MarketplaceError::TransactionTimeout { .. }));
        assert!(timeout.is_recoverable());

        let signing: MarketplaceError = OrchestratorError::Signing("declined".into()).into();
        assert!(matches!(signing, MarketplaceError::TransactionSubmission(_)));
        assert_eq!(signing.tx_hash(), None);
    }

    #[test]
    fn test_ingestion_request_failure_keeps_payload() {
        let payload = serde_json::json!({"error": "nope"});
        let err: MarketplaceError =
            IngestionError::request_failed("ingest dataset", 200, Some(payload.clone())).into();

        match err {
            MarketplaceError::IngestionRequestFailed {
                status, payload: p, ..
            } => {
                assert_eq!(status, 200);
                assert_eq!(p, Some(payload));
            }
            other => panic!("unexpected: {other}"),
        }
    }

    #[test]
    fn test_address_selection_error() {
        let err: MarketplaceError = AddressError::InvalidSelection { index: 4, len: 2 }.into();
        assert_eq!(err.to_string(), "address index 4 out of range, 2 configured");
    }
}
