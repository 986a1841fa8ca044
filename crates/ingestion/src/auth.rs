//! Request signing for the ingestion service

use async_trait::async_trait;
use datamarket_types::{AddressEntry, Credentials, DatasetId};
use hmac::{Hmac, Mac};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use sha2::Sha512;

use crate::IngestionError;

type HmacSha512 = Hmac<Sha512>;

/// Authentication headers for one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedHeaders {
    pub key: String,
    pub nonce: String,
    pub dataset: String,
    pub signature: String,
}

impl SignedHeaders {
    /// Sign with the current millisecond timestamp as nonce
    pub fn new(dataset: &DatasetId, credentials: &Credentials) -> Result<Self, IngestionError> {
        let nonce = chrono::Utc::now().timestamp_millis().to_string();
        Self::with_nonce(dataset, credentials, nonce)
    }

    /// `Sign` is the hex HMAC-SHA512 of the dataset name followed by the nonce
    pub fn with_nonce(
        dataset: &DatasetId,
        credentials: &Credentials,
        nonce: String,
    ) -> Result<Self, IngestionError> {
        let mut mac = HmacSha512::new_from_slice(credentials.secret.as_bytes())
            .map_err(|e| IngestionError::InvalidCredentials(e.to_string()))?;
        mac.update(dataset.as_str().as_bytes());
        mac.update(nonce.as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());

        Ok(Self {
            key: credentials.key.clone(),
            nonce,
            dataset: dataset.as_str().to_string(),
            signature,
        })
    }

    pub fn to_header_map(&self) -> Result<HeaderMap, IngestionError> {
        let mut headers = HeaderMap::new();
        for (name, value) in [
            ("sign", &self.signature),
            ("key", &self.key),
            ("nonce", &self.nonce),
            ("dataset", &self.dataset),
        ] {
            let value = HeaderValue::from_str(value).map_err(|_| {
                IngestionError::InvalidCredentials(format!("{} is not a valid header value", name))
            })?;
            headers.insert(HeaderName::from_static(name), value);
        }
        Ok(headers)
    }
}

/// Supplies the key/secret pair used to sign requests for a dataset
#[async_trait]
pub trait CredentialSource: Send + Sync {
    async fn credentials(
        &self,
        entry: &AddressEntry,
        dataset: &DatasetId,
    ) -> Result<Credentials, IngestionError>;
}

/// Credentials stored alongside the address in the local address file
///
/// Obtaining credentials through a signature exchange with the service is
/// not supported; entries without a key/secret pair are rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfiguredCredentials;

#[async_trait]
impl CredentialSource for ConfiguredCredentials {
    async fn credentials(
        &self,
        entry: &AddressEntry,
        _dataset: &DatasetId,
    ) -> Result<Credentials, IngestionError> {
        let address = entry
            .address()
            .map_err(|e| IngestionError::InvalidCredentials(e.to_string()))?;
        entry
            .credentials()
            .ok_or(IngestionError::CredentialsUnavailable { address })
    }
}
