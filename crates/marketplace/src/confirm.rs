use async_trait::async_trait;
use datamarket_types::{Address, DatasetId};

/// What a subscription will cost, shown before any transaction is built
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionQuote {
    pub dataset: DatasetId,
    pub address: Address,
    /// Monthly price in whole tokens
    pub price: u128,
    /// Current balance in whole tokens
    pub balance: u128,
}

/// Explicit go-ahead for a fee-bearing workflow
#[async_trait]
pub trait Confirmer: Send + Sync {
    async fn confirm(&self, quote: &SubscriptionQuote) -> bool;
}

/// Accepts every quote; for non-interactive runs
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoConfirm;

#[async_trait]
impl Confirmer for AutoConfirm {
    async fn confirm(&self, _quote: &SubscriptionQuote) -> bool {
        true
    }
}
