//! Typed wrappers over the marketplace registry and token contracts

use datamarket_types::{Address, DatasetId, ProviderInfo, SubscriptionStatus};
use std::sync::Arc;

use crate::abi::{encode_call, Decoder, Token};
use crate::{CallRequest, LedgerClient, LedgerError};

pub const GET_ALL_PROVIDERS: &str = "getAllProviders()";
pub const GET_PROVIDER_INFO: &str = "getDataProviderInfo(bytes32)";
pub const CHECK_SUBSCRIPTION: &str = "checkAddressSubscription(address,bytes32)";
pub const SUBSCRIBE: &str = "subscribe(bytes32)";
pub const REGISTER: &str = "register(bytes32,uint256,address)";
pub const BALANCE_OF: &str = "balanceOf(address)";
pub const APPROVE: &str = "approve(address,uint256)";

/// On-chain dataset registry
#[derive(Clone)]
pub struct MarketplaceRegistry {
    ledger: Arc<dyn LedgerClient>,
    address: Address,
}

impl MarketplaceRegistry {
    pub fn new(ledger: Arc<dyn LedgerClient>, address: Address) -> Self {
        Self { ledger, address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Raw provider identifiers in registry order, sentinel included
    pub async fn all_providers(&self) -> Result<Vec<[u8; 32]>, LedgerError> {
        let data = encode_call(GET_ALL_PROVIDERS, &[]);
        let result = self
            .ledger
            .call(&CallRequest::new(self.address, data))
            .await?;
        Decoder::new(&result).bytes32_array(0)
    }

    pub async fn provider_info(&self, dataset: &DatasetId) -> Result<ProviderInfo, LedgerError> {
        let data = encode_call(GET_PROVIDER_INFO, &[Token::Bytes32(dataset.to_bytes32())]);
        let result = self
            .ledger
            .call(&CallRequest::new(self.address, data))
            .await?;

        let decoder = Decoder::new(&result);
        Ok(ProviderInfo {
            owner: decoder.address(0)?,
            monthly_price: decoder.uint(1)?,
            frequency_hint: decoder.uint64(2)?,
            has_history: decoder.boolean(3)?,
            is_registered: decoder.boolean(4)?,
        })
    }

    pub async fn check_subscription(
        &self,
        subscriber: &Address,
        dataset: &DatasetId,
    ) -> Result<SubscriptionStatus, LedgerError> {
        let data = encode_call(
            CHECK_SUBSCRIPTION,
            &[
                Token::Address(*subscriber),
                Token::Bytes32(dataset.to_bytes32()),
            ],
        );
        let result = self
            .ledger
            .call(&CallRequest::new(self.address, data).with_from(*subscriber))
            .await?;

        // Word 3 is unused by the pipeline.
        let decoder = Decoder::new(&result);
        Ok(SubscriptionStatus {
            subscriber: decoder.address(0)?,
            dataset: decoder.bytes32(1)?,
            start_timestamp: decoder.uint64(2)?,
            expiry_timestamp: decoder.uint64(4)?,
            is_active: decoder.boolean(5)?,
        })
    }

    pub fn subscribe_calldata(dataset: &DatasetId) -> Vec<u8> {
        encode_call(SUBSCRIBE, &[Token::Bytes32(dataset.to_bytes32())])
    }

    pub fn register_calldata(dataset: &DatasetId, monthly_price: u128, owner: &Address) -> Vec<u8> {
        encode_call(
            REGISTER,
            &[
                Token::Bytes32(dataset.to_bytes32()),
                Token::Uint(monthly_price),
                Token::Address(*owner),
            ],
        )
    }
}

/// Fungible token used to pay for subscriptions
#[derive(Clone)]
pub struct TokenContract {
    ledger: Arc<dyn LedgerClient>,
    address: Address,
    decimals: u32,
}

impl TokenContract {
    pub fn new(ledger: Arc<dyn LedgerClient>, address: Address, decimals: u32) -> Self {
        Self {
            ledger,
            address,
            decimals,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Balance in base units
    pub async fn balance_of(&self, owner: &Address) -> Result<u128, LedgerError> {
        let data = encode_call(BALANCE_OF, &[Token::Address(*owner)]);
        let result = self
            .ledger
            .call(&CallRequest::new(self.address, data).with_from(*owner))
            .await?;
        Decoder::new(&result).uint(0)
    }

    /// Truncating conversion from base units to whole tokens
    pub fn to_whole_units(&self, raw: u128) -> u128 {
        match 10u128.checked_pow(self.decimals) {
            Some(scale) => raw / scale,
            None => 0,
        }
    }

    pub fn approve_calldata(spender: &Address, amount: u128) -> Vec<u8> {
        encode_call(APPROVE, &[Token::Address(*spender), Token::Uint(amount)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MockLedger;

    fn addr(last: u8) -> Address {
        let mut bytes = [0u8; 20];
        bytes[19] = last;
        Address::from_bytes(bytes)
    }

    #[test]
    fn test_whole_units_truncate() {
        let token = TokenContract::new(Arc::new(MockLedger::new()), addr(1), 8);
        assert_eq!(token.to_whole_units(1_999_999_999), 19);
        assert_eq!(token.to_whole_units(99_999_999), 0);

        let huge = TokenContract::new(Arc::new(MockLedger::new()), addr(1), 60);
        assert_eq!(huge.to_whole_units(u128::MAX), 0);
    }

    #[test]
    fn test_register_calldata_layout() {
        let dataset = DatasetId::new("marketcap").unwrap();
        let data = MarketplaceRegistry::register_calldata(&dataset, 10, &addr(9));

        assert_eq!(data.len(), 4 + 3 * 32);
        assert_eq!(&data[4..13], b"marketcap");
        assert_eq!(data[4 + 63], 10);
        assert_eq!(data[4 + 95], 9);
    }

    #[tokio::test]
    async fn test_provider_info_from_mock() {
        let mock = Arc::new(MockLedger::new());
        let dataset = DatasetId::new("github").unwrap();
        mock.register_provider(&dataset, addr(5), 25);

        let registry = MarketplaceRegistry::new(mock.clone(), mock.registry_address());
        let info = registry.provider_info(&dataset).await.unwrap();

        assert!(info.is_registered);
        assert_eq!(info.owner, addr(5));
        assert_eq!(info.monthly_price, 25);

        let missing = registry
            .provider_info(&DatasetId::new("nothing").unwrap())
            .await
            .unwrap();
        assert!(!missing.is_registered);
    }

    #[tokio::test]
    async fn test_all_providers_keeps_sentinel() {
        let mock = Arc::new(MockLedger::new());
        mock.register_provider(&DatasetId::new("github").unwrap(), addr(5), 1);

        let registry = MarketplaceRegistry::new(mock.clone(), mock.registry_address());
        let providers = registry.all_providers().await.unwrap();

        assert_eq!(providers.len(), 2);
        assert_eq!(
            DatasetId::from_bytes32(&providers[1]).unwrap().as_str(),
            "github"
        );
    }

    #[tokio::test]
    async fn test_balance_of() {
        let mock = Arc::new(MockLedger::new());
        mock.set_balance(addr(3), 5_000_000_000);

        let token = TokenContract::new(mock.clone(), mock.token_address(), 8);
        let raw = token.balance_of(&addr(3)).await.unwrap();

        assert_eq!(raw, 5_000_000_000);
        assert_eq!(token.to_whole_units(raw), 50);
        assert_eq!(token.balance_of(&addr(4)).await.unwrap(), 0);
    }
}
