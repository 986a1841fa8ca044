use datamarket_ledger::MarketplaceRegistry;
use datamarket_types::{Address, AddressEntry, Credentials, DatasetId, SubscriptionStatus};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::{CredentialSource, DownloadedPart, IngestionClient, IngestionError, PartStream};

/// Checks subscriptions on-chain and downloads dataset parts
pub struct IngestionRetriever {
    registry: MarketplaceRegistry,
    client: IngestionClient,
    credentials: Arc<dyn CredentialSource>,
    temp_root: PathBuf,
}

impl IngestionRetriever {
    pub fn new(
        registry: MarketplaceRegistry,
        client: IngestionClient,
        credentials: Arc<dyn CredentialSource>,
        temp_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            registry,
            client,
            credentials,
            temp_root: temp_root.into(),
        }
    }

    pub fn client(&self) -> &IngestionClient {
        &self.client
    }

    /// Fetch the subscription record and check it answers this exact query
    ///
    /// A record for another address or dataset is a protocol violation and
    /// is reported as a mismatch whatever its `is_active` flag says.
    pub async fn verify_subscription(
        &self,
        address: &Address,
        dataset: &DatasetId,
    ) -> Result<SubscriptionStatus, IngestionError> {
        let status = self.registry.check_subscription(address, dataset).await?;

        if !status.matches(address, dataset) {
            tracing::warn!(
                address = %address,
                dataset = %dataset,
                reported_address = %status.subscriber,
                "Registry returned a subscription for a different query"
            );
            return Err(IngestionError::SubscriptionMismatch {
                address: *address,
                dataset: dataset.clone(),
            });
        }

        if !status.is_active {
            return Err(IngestionError::SubscriptionExpired {
                address: *address,
                dataset: dataset.clone(),
                expiry_timestamp: status.expiry_timestamp,
            });
        }

        tracing::debug!(
            address = %address,
            dataset = %dataset,
            expiry = status.expiry_timestamp,
            "Subscription verified"
        );
        Ok(status)
    }

    pub async fn credentials_for(
        &self,
        entry: &AddressEntry,
        dataset: &DatasetId,
    ) -> Result<Credentials, IngestionError> {
        self.credentials.credentials(entry, dataset).await
    }

    /// Open the authenticated download; parts are produced lazily
    pub async fn fetch_dataset(
        &self,
        dataset: &DatasetId,
        credentials: &Credentials,
    ) -> Result<DatasetDownload, IngestionError> {
        let dir = self
            .temp_root
            .join(format!("download-{}-{}", dataset, uuid::Uuid::new_v4()));
        tokio::fs::create_dir_all(&dir).await?;

        match self.client.open_ingest(dataset, credentials, &dir).await {
            Ok(parts) => Ok(DatasetDownload {
                dataset: dataset.clone(),
                parts,
                dir,
            }),
            Err(e) => {
                let _ = tokio::fs::remove_dir_all(&dir).await;
                Err(e)
            }
        }
    }
}

/// An in-progress download
///
/// Downloaded part files live in a private directory that is removed when
/// the download is dropped; consumers must move or copy each part before
/// asking for the next one or dropping the download.
pub struct DatasetDownload {
    dataset: DatasetId,
    parts: PartStream,
    dir: PathBuf,
}

impl DatasetDownload {
    pub fn dataset(&self) -> &DatasetId {
        &self.dataset
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn next_part(&mut self) -> Result<Option<DownloadedPart>, IngestionError> {
        self.parts.next_part().await
    }

    pub fn received(&self) -> usize {
        self.parts.received()
    }
}

impl Drop for DatasetDownload {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_dir_all(&self.dir) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(dir = %self.dir.display(), error = %e, "Failed to remove download directory");
            }
        }
    }
}
