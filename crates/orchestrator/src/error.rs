use datamarket_ledger::LedgerError;
use datamarket_types::{Address, TransactionError, TxHash};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("failed to build transaction from {from}: {source}")]
    Build {
        from: Address,
        #[source]
        source: LedgerError,
    },

    #[error("signer failed: {0}")]
    Signing(String),

    #[error("signed payload is unusable: {0}")]
    InvalidSignedPayload(#[from] TransactionError),

    /// Broadcast was rejected; nothing reached the ledger
    #[error("transaction submission failed: {source}")]
    Submission {
        #[source]
        source: LedgerError,
    },

    /// Mined with a failed status
    #[error("transaction {hash} reverted")]
    Failed { hash: TxHash },

    #[error("transaction {hash} not confirmed within {waited:?}")]
    Timeout { hash: TxHash, waited: Duration },

    #[error("receipt query for {hash} failed: {source}")]
    Receipt {
        hash: TxHash,
        #[source]
        source: LedgerError,
    },
}

impl OrchestratorError {
    /// Hash of a transaction that did reach the ledger, if any
    pub fn tx_hash(&self) -> Option<&TxHash> {
        match self {
            Self::Failed { hash } | Self::Timeout { hash, .. } | Self::Receipt { hash, .. } => {
                Some(hash)
            }
            _ => None,
        }
    }
}
