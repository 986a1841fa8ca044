use datamarket_ledger::MarketplaceRegistry;
use datamarket_orchestrator::{Phase, TwoPhaseError, TwoPhaseFlow};
use datamarket_types::{Address, DatasetId, TxHash};

use crate::{Confirmer, MarketplaceError, MarketplaceSession, Result, SubscriptionQuote};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribeOutcome {
    pub dataset: DatasetId,
    pub address: Address,
    pub price: u128,
    /// Token allowance for the registry
    pub approval: TxHash,
    pub subscription: TxHash,
}

impl MarketplaceSession {
    /// Pay for and subscribe to `dataset` from the address at `address_index`
    ///
    /// The price is approved first and the subscribe call is only built once
    /// that approval is confirmed. If the subscribe call fails, the
    /// allowance stays on-chain and is reported in
    /// [`MarketplaceError::SubscribeIncomplete`].
    pub async fn subscribe(
        &self,
        dataset: &DatasetId,
        address_index: usize,
        confirmer: &dyn Confirmer,
    ) -> Result<SubscribeOutcome> {
        let address = self.select(address_index)?.address;

        let info = self.registry.provider_info(dataset).await?;
        if !info.is_registered {
            return Err(MarketplaceError::DatasetNotRegistered {
                dataset: dataset.clone(),
            });
        }
        let price = info.monthly_price;

        let raw_balance = self.token.balance_of(&address).await?;
        let balance = self.token.to_whole_units(raw_balance);
        if balance <= price {
            tracing::warn!(
                dataset = %dataset,
                address = %address,
                balance,
                price,
                "Insufficient balance to subscribe"
            );
            return Err(MarketplaceError::InsufficientBalance {
                address,
                dataset: dataset.clone(),
                balance,
                price,
            });
        }

        let quote = SubscriptionQuote {
            dataset: dataset.clone(),
            address,
            price,
            balance,
        };
        if !confirmer.confirm(&quote).await {
            tracing::info!(dataset = %dataset, "Subscription cancelled before any transaction");
            return Err(MarketplaceError::NotConfirmed {
                dataset: dataset.clone(),
            });
        }

        let registry = self.registry.address();
        let report = TwoPhaseFlow::new(&self.orchestrator, address)
            .execute(
                Phase::Payment {
                    to_contract: registry,
                    amount: price,
                },
                Phase::Call {
                    to_contract: registry,
                    payload: MarketplaceRegistry::subscribe_calldata(dataset),
                },
            )
            .await
            .map_err(|e| match e {
                TwoPhaseError::First(source) => MarketplaceError::from(source),
                TwoPhaseError::Second { first, source } => MarketplaceError::SubscribeIncomplete {
                    dataset: dataset.clone(),
                    approval: first.hash,
                    source: Box::new(source.into()),
                },
            })?;

        tracing::info!(
            dataset = %dataset,
            address = %address,
            price,
            approval = %report.first.hash,
            subscription = %report.second.hash,
            "Subscribed"
        );

        Ok(SubscribeOutcome {
            dataset: dataset.clone(),
            address,
            price,
            approval: report.first.hash,
            subscription: report.second.hash,
        })
    }
}
