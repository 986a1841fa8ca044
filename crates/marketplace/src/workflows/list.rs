use datamarket_types::DatasetId;

use crate::{MarketplaceSession, Result};

impl MarketplaceSession {
    /// Names of every registered dataset
    ///
    /// The registry keeps a sentinel entry at index 0, which is skipped.
    /// Identifiers that do not decode to a name are logged and left out.
    pub async fn list(&self) -> Result<Vec<DatasetId>> {
        let providers = self.registry.all_providers().await?;

        let datasets = providers
            .iter()
            .skip(1)
            .filter_map(|raw| match DatasetId::from_bytes32(raw) {
                Ok(dataset) => Some(dataset),
                Err(e) => {
                    tracing::warn!(raw = %hex_id(raw), error = %e, "Skipping undecodable provider id");
                    None
                }
            })
            .collect::<Vec<_>>();

        tracing::debug!(count = datasets.len(), "Listed datasets");
        Ok(datasets)
    }
}

fn hex_id(raw: &[u8; 32]) -> String {
    raw.iter().map(|b| format!("{:02x}", b)).collect()
}
