use datamarket_ledger::LedgerError;
use datamarket_types::{Address, DatasetId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestionError {
    /// The registry answered for a different address or dataset
    #[error("subscription record does not match query (address: {address}, dataset: {dataset})")]
    SubscriptionMismatch { address: Address, dataset: DatasetId },

    #[error("subscription of {address} to {dataset} is not active (expiry: {expiry_timestamp})")]
    SubscriptionExpired {
        address: Address,
        dataset: DatasetId,
        expiry_timestamp: u64,
    },

    #[error("no credentials available for {address}")]
    CredentialsUnavailable { address: Address },

    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    /// Non-200 status, or a service-reported error envelope
    #[error("{request} request failed with status {status}{}", payload_suffix(.payload))]
    RequestFailed {
        request: String,
        status: u16,
        payload: Option<serde_json::Value>,
    },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("malformed multipart response: {0}")]
    Multipart(#[from] multer::Error),

    #[error("invalid part filename: {0:?}")]
    InvalidFilename(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

fn payload_suffix(payload: &Option<serde_json::Value>) -> String {
    match payload {
        Some(value) => format!(": {}", value),
        None => String::new(),
    }
}

impl IngestionError {
    pub fn request_failed(request: &str, status: u16, payload: Option<serde_json::Value>) -> Self {
        Self::RequestFailed {
            request: request.to_string(),
            status,
            payload,
        }
    }
}
