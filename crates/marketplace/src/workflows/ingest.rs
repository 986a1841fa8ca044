use datamarket_bundle::{merge_part, MergeOutcome};
use datamarket_types::{Address, DatasetId};

use crate::{MarketplaceError, MarketplaceSession, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedPart {
    pub file_name: String,
    pub outcome: MergeOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub dataset: DatasetId,
    pub address: Address,
    pub parts: Vec<MergedPart>,
}

impl MarketplaceSession {
    /// Download every part of `dataset` and merge each into its bundle
    ///
    /// Parts are merged as they arrive; if the download fails partway, the
    /// parts merged so far stay merged.
    pub async fn ingest(&self, dataset: &DatasetId, address_index: usize) -> Result<IngestReport> {
        let selected = self.select(address_index)?;
        let address = selected.address;

        let info = self.registry.provider_info(dataset).await?;
        if !info.is_registered {
            return Err(MarketplaceError::DatasetNotRegistered {
                dataset: dataset.clone(),
            });
        }

        self.retriever.verify_subscription(&address, dataset).await?;
        let credentials = self.retriever.credentials_for(selected.entry, dataset).await?;

        let mut download = self.retriever.fetch_dataset(dataset, &credentials).await?;
        let mut report = IngestReport {
            dataset: dataset.clone(),
            address,
            parts: Vec::new(),
        };

        loop {
            let part = match download.next_part().await {
                Ok(Some(part)) => part,
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(
                        dataset = %dataset,
                        merged = report.parts.len(),
                        error = %e,
                        "Download interrupted; merged parts are kept"
                    );
                    return Err(e.into());
                }
            };

            let engine = self.bundles.clone();
            let target = dataset.clone();
            let path = part.path.clone();
            let outcome =
                tokio::task::spawn_blocking(move || merge_part(&engine, &path, &target)).await??;

            tracing::info!(
                dataset = %dataset,
                file = %part.file_name,
                bundle = %outcome.bundle().display(),
                "Part merged"
            );
            report.parts.push(MergedPart {
                file_name: part.file_name,
                outcome,
            });
        }

        tracing::info!(dataset = %dataset, parts = report.parts.len(), "Ingestion complete");
        Ok(report)
    }
}
