pub mod address;
pub mod dataset;
pub mod transaction;

pub use address::*;
pub use dataset::*;
pub use transaction::*;

/// Width of an on-chain dataset identifier in bytes
pub const DATASET_ID_WIDTH: usize = 32;
