//! Confirmation polling
//!
//! The wait is a plain sleep-and-recheck loop, so dropping the future between
//! polls cancels it without touching ledger state.

use datamarket_ledger::LedgerClient;
use datamarket_types::{TxHash, TxReceipt};
use std::time::Duration;
use tokio::time::Instant;

use crate::OrchestratorError;

/// Receives one tick per unit slept while waiting for a receipt
pub trait ProgressSink: Send + Sync {
    /// A transaction was broadcast
    fn submitted(&self, _hash: &TxHash) {}

    fn tick(&self);

    /// The wait ended, whatever the outcome
    fn finish(&self) {}
}

/// Discards progress
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn tick(&self) {}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollConfig {
    /// Length of one sleep unit
    pub interval: Duration,
    /// Units slept between receipt queries
    pub batch_size: u32,
    /// Give up after this long; `None` waits forever
    pub max_wait: Option<Duration>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            batch_size: 10,
            max_wait: Some(Duration::from_secs(1800)),
        }
    }
}

/// Outcome of a mined transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Confirmation {
    Confirmed(TxReceipt),
    /// Executed but reverted
    Failed(TxReceipt),
}

impl Confirmation {
    pub fn receipt(&self) -> &TxReceipt {
        match self {
            Self::Confirmed(receipt) | Self::Failed(receipt) => receipt,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self, Self::Confirmed(_))
    }

    /// Treat a revert as an error
    pub fn into_result(self) -> Result<TxReceipt, OrchestratorError> {
        match self {
            Self::Confirmed(receipt) => Ok(receipt),
            Self::Failed(receipt) => Err(OrchestratorError::Failed { hash: receipt.hash }),
        }
    }
}

/// Poll for the receipt of `hash` until it is mined
///
/// A missing receipt and a transient query failure both mean "not yet";
/// any other query failure ends the wait.
pub async fn await_confirmation(
    ledger: &dyn LedgerClient,
    hash: &TxHash,
    config: &PollConfig,
    progress: &dyn ProgressSink,
) -> Result<Confirmation, OrchestratorError> {
    let started = Instant::now();
    let batch = config.batch_size.max(1);

    let outcome = loop {
        match ledger.get_transaction_receipt(hash).await {
            Ok(Some(receipt)) if receipt.status => break Ok(Confirmation::Confirmed(receipt)),
            Ok(Some(receipt)) => break Ok(Confirmation::Failed(receipt)),
            Ok(None) => {
                tracing::trace!(tx_hash = %hash, "Receipt not yet available");
            }
            Err(e) if e.is_transient() => {
                tracing::warn!(tx_hash = %hash, error = %e, "Receipt query failed, will retry");
            }
            Err(e) => {
                break Err(OrchestratorError::Receipt {
                    hash: hash.clone(),
                    source: e,
                })
            }
        }

        if let Some(limit) = exceeded(started, config.max_wait) {
            break Err(OrchestratorError::Timeout {
                hash: hash.clone(),
                waited: limit,
            });
        }

        for _ in 0..batch {
            tokio::time::sleep(config.interval).await;
            progress.tick();
        }
    };

    progress.finish();
    match &outcome {
        Ok(Confirmation::Confirmed(_)) => {
            tracing::info!(tx_hash = %hash, elapsed = ?started.elapsed(), "Transaction confirmed")
        }
        Ok(Confirmation::Failed(_)) => {
            tracing::warn!(tx_hash = %hash, "Transaction reverted")
        }
        Err(e) => tracing::warn!(tx_hash = %hash, error = %e, "Stopped waiting for transaction"),
    }
    outcome
}

fn exceeded(started: Instant, max_wait: Option<Duration>) -> Option<Duration> {
    max_wait.filter(|limit| started.elapsed() >= *limit)
}
