use datamarket_ingestion::DatasetMetadata;
use datamarket_ledger::MarketplaceRegistry;
use datamarket_types::{Address, DataFrequency, DatasetId, TxHash};

use crate::{MarketplaceError, MarketplaceSession, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterRequest {
    pub dataset: DatasetId,
    pub description: String,
    /// Monthly price in whole tokens
    pub monthly_price: u128,
    pub frequency: DataFrequency,
    pub has_history: bool,
    pub has_live: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterOutcome {
    pub dataset: DatasetId,
    pub owner: Address,
    pub tx_hash: TxHash,
}

impl MarketplaceSession {
    /// Register a dataset owned by the address at `address_index`
    ///
    /// The on-chain registration is confirmed before the metadata is sent to
    /// the ingestion service. A rejected metadata request leaves the dataset
    /// registered on-chain.
    pub async fn register(
        &self,
        request: &RegisterRequest,
        address_index: usize,
    ) -> Result<RegisterOutcome> {
        let dataset = &request.dataset;
        let selected = self.select(address_index)?;
        let owner = selected.address;
        let credentials = self.retriever.credentials_for(selected.entry, dataset).await?;

        let info = self.registry.provider_info(dataset).await?;
        if info.is_registered {
            return Err(MarketplaceError::DatasetAlreadyRegistered {
                dataset: dataset.clone(),
            });
        }

        let payload = MarketplaceRegistry::register_calldata(dataset, request.monthly_price, &owner);
        let tx_hash = self
            .orchestrator
            .submit_call(owner, self.registry.address(), payload)
            .await?;
        self.orchestrator
            .await_confirmation(&tx_hash)
            .await?
            .into_result()?;
        tracing::info!(dataset = %dataset, owner = %owner, tx_hash = %tx_hash, "Dataset registered on-chain");

        let metadata = DatasetMetadata {
            dataset: dataset.clone(),
            desc: request.description.clone(),
            data_frequency: request.frequency,
            has_history: request.has_history,
            has_live: request.has_live,
        };
        if let Err(source) = self
            .retriever
            .client()
            .register_metadata(&credentials, &metadata)
            .await
        {
            tracing::warn!(
                dataset = %dataset,
                tx_hash = %tx_hash,
                error = %source,
                "Metadata rejected; on-chain registration stands"
            );
            return Err(MarketplaceError::MetadataRegistrationFailed {
                dataset: dataset.clone(),
                tx_hash,
                source,
            });
        }

        Ok(RegisterOutcome {
            dataset: dataset.clone(),
            owner,
            tx_hash,
        })
    }
}
