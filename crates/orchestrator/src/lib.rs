pub mod error;
pub mod gas;
pub mod poll;
pub mod signer;
pub mod transaction;
pub mod two_phase;

pub use error::OrchestratorError;
pub use gas::GasPolicy;
pub use poll::{await_confirmation, Confirmation, NoProgress, PollConfig, ProgressSink};
pub use signer::{describe_transaction, LoopbackSigner, Signer};
pub use transaction::TransactionOrchestrator;
pub use two_phase::{Phase, PhaseReceipt, TwoPhaseError, TwoPhaseFlow, TwoPhaseReport};
