pub mod auth;
pub mod client;
pub mod error;
pub mod parts;
pub mod retriever;

pub use auth::{CredentialSource, ConfiguredCredentials, SignedHeaders};
pub use client::{DatasetMetadata, IngestionClient};
pub use error::IngestionError;
pub use parts::{DownloadedPart, PartStream};
pub use retriever::{DatasetDownload, IngestionRetriever};
