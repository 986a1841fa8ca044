use datamarket_bundle::BundleData;
use datamarket_types::{DataFrequency, DatasetId};

use crate::{MarketplaceError, MarketplaceSession, Result};

impl MarketplaceSession {
    /// Delete a dataset's local bundles, or only one frequency's
    ///
    /// Returns whether anything was removed.
    pub async fn clean(&self, dataset: &DatasetId, frequency: Option<DataFrequency>) -> Result<bool> {
        let engine = self.bundles.clone();
        let target = dataset.clone();
        let removed = tokio::task::spawn_blocking(move || engine.remove(&target, frequency)).await??;

        if removed {
            tracing::info!(dataset = %dataset, frequency = ?frequency, "Cleaned bundles");
        } else {
            tracing::info!(dataset = %dataset, "No bundles to clean");
        }
        Ok(removed)
    }

    /// Rows of a local bundle, optionally only those dated on or after `start`
    pub async fn show(
        &self,
        dataset: &DatasetId,
        frequency: DataFrequency,
        start: Option<i64>,
    ) -> Result<BundleData> {
        let engine = self.bundles.clone();
        let target = dataset.clone();
        let bundle = tokio::task::spawn_blocking(move || engine.read(&target, frequency))
            .await??
            .ok_or_else(|| MarketplaceError::BundleNotFound {
                dataset: dataset.clone(),
                frequency,
            })?;

        Ok(match start {
            Some(start) => {
                let rows = bundle.since(start).cloned().collect();
                BundleData { rows, ..bundle }
            }
            None => bundle,
        })
    }
}
