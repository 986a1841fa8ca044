use datamarket_bundle::{BundleLayout, MergeEngine, ParquetBundleStore};
use datamarket_config::{AppConfig, NetworkConfig};
use datamarket_ingestion::{
    ConfiguredCredentials, CredentialSource, IngestionClient, IngestionRetriever,
};
use datamarket_ledger::{LedgerClient, MarketplaceRegistry, TokenContract};
use datamarket_orchestrator::{GasPolicy, PollConfig, ProgressSink, Signer, TransactionOrchestrator};
use datamarket_types::{Address, AddressRegistry, SelectedAddress, TxHash};
use std::sync::Arc;
use std::time::Duration;

use crate::Result;

/// Everything one workflow invocation needs, built once from configuration
pub struct MarketplaceSession {
    pub(crate) registry: MarketplaceRegistry,
    pub(crate) token: TokenContract,
    pub(crate) orchestrator: TransactionOrchestrator,
    pub(crate) retriever: IngestionRetriever,
    pub(crate) bundles: Arc<MergeEngine>,
    pub(crate) addresses: AddressRegistry,
    pub(crate) network: NetworkConfig,
}

impl MarketplaceSession {
    pub fn from_config(
        config: &AppConfig,
        addresses: AddressRegistry,
        ledger: Arc<dyn LedgerClient>,
        signer: Arc<dyn Signer>,
        progress: Arc<dyn ProgressSink>,
    ) -> Result<Self> {
        Self::with_credentials(
            config,
            addresses,
            ledger,
            signer,
            progress,
            Arc::new(ConfiguredCredentials),
        )
    }

    pub fn with_credentials(
        config: &AppConfig,
        addresses: AddressRegistry,
        ledger: Arc<dyn LedgerClient>,
        signer: Arc<dyn Signer>,
        progress: Arc<dyn ProgressSink>,
        credentials: Arc<dyn CredentialSource>,
    ) -> Result<Self> {
        let registry_address: Address = config.ledger.registry_contract.parse()?;
        let token_address: Address = config.ledger.token_contract.parse()?;

        let registry = MarketplaceRegistry::new(ledger.clone(), registry_address);
        let token = TokenContract::new(ledger.clone(), token_address, config.ledger.token_decimals);

        let network = config.network.clone();
        let gas = GasPolicy::for_network(
            network.is_testnet(),
            network.gas_multiplier,
            network.gas_ceiling,
        );
        let poll = PollConfig {
            interval: config.polling.interval(),
            batch_size: config.polling.batch_size,
            max_wait: config.polling.max_wait(),
        };
        let orchestrator =
            TransactionOrchestrator::new(ledger.clone(), signer, token_address, gas, poll)
                .with_progress(Arc::new(ExplorerLinks::new(network.clone(), progress)));

        let temp_root = config.storage.temp_root();
        let client = IngestionClient::new(
            config.ingestion.base_url.as_str(),
            Duration::from_millis(config.ingestion.timeout_ms),
        )?;
        let retriever = IngestionRetriever::new(registry.clone(), client, credentials, &temp_root);

        let layout = BundleLayout::new(&config.storage.root, temp_root);
        let bundles = Arc::new(MergeEngine::new(layout, Arc::new(ParquetBundleStore)));

        tracing::debug!(
            environment = ?network.environment,
            registry = %registry_address,
            token = %token_address,
            addresses = addresses.len(),
            "Marketplace session ready"
        );

        Ok(Self {
            registry,
            token,
            orchestrator,
            retriever,
            bundles,
            addresses,
            network,
        })
    }

    pub fn addresses(&self) -> &AddressRegistry {
        &self.addresses
    }

    pub fn network(&self) -> &NetworkConfig {
        &self.network
    }

    pub fn bundles(&self) -> &MergeEngine {
        &self.bundles
    }

    pub(crate) fn select(&self, index: usize) -> Result<SelectedAddress<'_>> {
        Ok(self.addresses.select(index)?)
    }
}

/// Logs an explorer link for every broadcast, then forwards to `inner`
pub struct ExplorerLinks {
    network: NetworkConfig,
    inner: Arc<dyn ProgressSink>,
}

impl ExplorerLinks {
    pub fn new(network: NetworkConfig, inner: Arc<dyn ProgressSink>) -> Self {
        Self { network, inner }
    }

    pub fn link(&self, hash: &TxHash) -> Option<String> {
        self.network.explorer_link(hash.as_str())
    }
}

impl ProgressSink for ExplorerLinks {
    fn submitted(&self, hash: &TxHash) {
        match self.link(hash) {
            Some(url) => tracing::info!(tx_hash = %hash, url = %url, "Track transaction"),
            None => tracing::info!(tx_hash = %hash, "Track transaction"),
        }
        self.inner.submitted(hash);
    }

    fn tick(&self) {
        self.inner.tick();
    }

    fn finish(&self) {
        self.inner.finish();
    }
}
