use async_trait::async_trait;
use datamarket_types::PendingTransaction;

use crate::OrchestratorError;

/// External signing capability
///
/// Receives the unsigned transaction and returns the signed payload as hex.
/// A leading `0x` is optional. Implementations may block on a human.
#[async_trait]
pub trait Signer: Send + Sync {
    async fn sign(&self, tx: &PendingTransaction) -> Result<String, OrchestratorError>;
}

/// Human-readable rendering of the fields a signer needs
pub fn describe_transaction(tx: &PendingTransaction) -> String {
    format!(
        "From:\t\t{}\nTo:\t\t{}\nValue:\t\t{}\nGas:\t\t{}\nNonce:\t\t{}\nData:\t\t{}\n",
        tx.from,
        tx.to,
        tx.value,
        tx.gas_limit,
        tx.nonce,
        tx.data_hex()
    )
}

/// Signs by encoding the transaction itself as JSON
///
/// Only the in-memory mock ledger understands this payload; used for tests
/// and dry runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoopbackSigner;

#[async_trait]
impl Signer for LoopbackSigner {
    async fn sign(&self, tx: &PendingTransaction) -> Result<String, OrchestratorError> {
        let encoded =
            serde_json::to_vec(tx).map_err(|e| OrchestratorError::Signing(e.to_string()))?;
        Ok(format!("0x{}", hex::encode(encoded)))
    }
}
