//! User-facing workflows, one module each

mod bundles;
mod ingest;
mod list;
mod publish;
mod register;
mod subscribe;

pub use ingest::{IngestReport, MergedPart};
pub use publish::PublishOutcome;
pub use register::{RegisterOutcome, RegisterRequest};
pub use subscribe::SubscribeOutcome;
