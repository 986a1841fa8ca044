//! Terminal implementations of the signer, confirmer and progress capabilities

use async_trait::async_trait;
use datamarket_marketplace::{Confirmer, SubscriptionQuote};
use datamarket_orchestrator::{describe_transaction, OrchestratorError, ProgressSink, Signer};
use datamarket_types::{PendingTransaction, TxHash};
use std::io::{BufRead, Write};

fn prompt_line(prompt: String) -> std::io::Result<String> {
    let mut stderr = std::io::stderr().lock();
    write!(stderr, "{}", prompt)?;
    stderr.flush()?;

    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

/// Shows the transaction and reads the signed hex back from the operator
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleSigner;

#[async_trait]
impl Signer for ConsoleSigner {
    async fn sign(&self, tx: &PendingTransaction) -> Result<String, OrchestratorError> {
        let prompt = format!(
            "\nSign this transaction offline:\n{}\n\nSigned transaction: ",
            describe_transaction(tx)
        );
        let signed = tokio::task::spawn_blocking(move || prompt_line(prompt))
            .await
            .map_err(|e| OrchestratorError::Signing(e.to_string()))?
            .map_err(|e| OrchestratorError::Signing(e.to_string()))?;

        if signed.is_empty() {
            return Err(OrchestratorError::Signing(
                "no signed transaction entered".to_string(),
            ));
        }
        Ok(signed)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleConfirmer;

#[async_trait]
impl Confirmer for ConsoleConfirmer {
    async fn confirm(&self, quote: &SubscriptionQuote) -> bool {
        let prompt = format!(
            "Subscribe {} to {} for {} tokens per month (balance {})? [y/N] ",
            quote.address, quote.dataset, quote.price, quote.balance
        );
        match tokio::task::spawn_blocking(move || prompt_line(prompt)).await {
            Ok(Ok(answer)) => matches!(answer.to_lowercase().as_str(), "y" | "yes"),
            _ => false,
        }
    }
}

/// One dot per polling interval
#[derive(Debug, Clone, Copy, Default)]
pub struct DotProgress;

impl ProgressSink for DotProgress {
    fn submitted(&self, hash: &TxHash) {
        eprintln!("Submitted {}, waiting for confirmation", hash);
    }

    fn tick(&self) {
        eprint!(".");
        let _ = std::io::stderr().flush();
    }

    fn finish(&self) {
        eprintln!();
    }
}
