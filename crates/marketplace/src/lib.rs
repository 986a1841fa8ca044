//! Pipeline coordinator for the dataset marketplace
//!
//! A [`MarketplaceSession`] owns every handle a workflow needs (ledger,
//! contracts, transaction orchestrator, ingestion retriever, bundle merge
//! engine, address registry) and exposes the user-facing workflows as
//! methods:
//!
//! - `list`: registered dataset names
//! - `subscribe`: approve the price, then subscribe (two transactions)
//! - `ingest`: verify the subscription, download and merge every part
//! - `register`: register a dataset on-chain, then describe it to the service
//! - `publish`: upload a directory of CSV files as the dataset owner
//! - `clean` / `show`: manage local bundles

pub mod confirm;
pub mod error;
pub mod session;
pub mod workflows;

pub use confirm::{AutoConfirm, Confirmer, SubscriptionQuote};
pub use error::MarketplaceError;
pub use session::{ExplorerLinks, MarketplaceSession};
pub use workflows::{
    IngestReport, MergedPart, PublishOutcome, RegisterOutcome, RegisterRequest, SubscribeOutcome,
};

pub type Result<T> = std::result::Result<T, MarketplaceError>;
