//! On-disk dataset bundles
//!
//! A bundle is the durable columnar store for one dataset/frequency pair,
//! laid out as `<root>/<dataset>/<frequency>/data.parquet`. Downloaded parts
//! become temp bundles, which the [`MergeEngine`] either adopts as a new
//! bundle or merges into the existing one.

pub mod error;
pub mod layout;
pub mod lock;
pub mod merge;
pub mod row;
pub mod store;
pub mod temp;

pub use error::BundleError;
pub use layout::BundleLayout;
pub use lock::BundleLock;
pub use merge::{merge_part, MergeEngine, MergeOutcome};
pub use row::{BundleData, Row, RowKey};
pub use store::{BundleHeader, BundleStore, ParquetBundleStore};
pub use temp::TempBundle;

pub type Result<T> = std::result::Result<T, BundleError>;
