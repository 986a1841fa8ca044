pub mod abi;
pub mod client;
pub mod contracts;
pub mod error;
pub mod mock;

pub use client::{CallRequest, JsonRpcLedgerClient, LedgerClient};
pub use contracts::{MarketplaceRegistry, TokenContract};
pub use error::LedgerError;
pub use mock::MockLedger;
