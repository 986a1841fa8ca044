use datamarket_ledger::{CallRequest, LedgerClient, TokenContract};
use datamarket_types::{Address, PendingTransaction, SignedTransaction, TxHash};
use std::sync::Arc;

use crate::poll::{await_confirmation, Confirmation, NoProgress, PollConfig, ProgressSink};
use crate::{GasPolicy, OrchestratorError, Signer};

/// Builds, signs, submits and confirms ledger transactions
///
/// Each submission is a fresh build with the current pending nonce; a failed
/// or reverted transaction is never resent.
pub struct TransactionOrchestrator {
    ledger: Arc<dyn LedgerClient>,
    signer: Arc<dyn Signer>,
    token: Address,
    gas: GasPolicy,
    poll: PollConfig,
    progress: Arc<dyn ProgressSink>,
}

impl TransactionOrchestrator {
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        signer: Arc<dyn Signer>,
        token: Address,
        gas: GasPolicy,
        poll: PollConfig,
    ) -> Self {
        Self {
            ledger,
            signer,
            token,
            gas,
            poll,
            progress: Arc::new(NoProgress),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    pub fn poll_config(&self) -> &PollConfig {
        &self.poll
    }

    /// Compose an unsigned transaction with the next nonce and a policy gas limit
    pub async fn build(
        &self,
        from: Address,
        to: Address,
        value: u128,
        data: Vec<u8>,
    ) -> Result<PendingTransaction, OrchestratorError> {
        let nonce = self
            .ledger
            .get_transaction_count(&from)
            .await
            .map_err(|source| OrchestratorError::Build { from, source })?;

        let request = CallRequest::new(to, data)
            .with_from(from)
            .with_value(value);
        let estimate = self
            .ledger
            .estimate_gas(&request)
            .await
            .map_err(|source| OrchestratorError::Build { from, source })?;
        let gas_limit = self.gas.apply(estimate);

        tracing::debug!(
            from = %from,
            to = %to,
            nonce,
            estimate,
            gas_limit,
            "Built transaction"
        );

        Ok(PendingTransaction {
            from,
            to,
            value,
            gas_limit,
            nonce,
            data: request.data,
        })
    }

    /// Hand the transaction to the signer and broadcast the result
    pub async fn sign_and_submit(&self, tx: &PendingTransaction) -> Result<TxHash, OrchestratorError> {
        let signed = self.signer.sign(tx).await?;
        let signed = SignedTransaction::from_hex(&signed)?;

        let hash = self
            .ledger
            .send_raw_transaction(&signed)
            .await
            .map_err(|source| {
                tracing::warn!(from = %tx.from, nonce = tx.nonce, error = %source, "Submission failed");
                OrchestratorError::Submission { source }
            })?;

        tracing::info!(tx_hash = %hash, from = %tx.from, to = %tx.to, "Transaction submitted");
        self.progress.submitted(&hash);
        Ok(hash)
    }

    /// Allow `to_contract` to spend `amount` of the payment token on behalf of `from`
    pub async fn submit_payment(
        &self,
        from: Address,
        to_contract: Address,
        amount: u128,
    ) -> Result<TxHash, OrchestratorError> {
        let data = TokenContract::approve_calldata(&to_contract, amount);
        let tx = self.build(from, self.token, 0, data).await?;
        self.sign_and_submit(&tx).await
    }

    /// Call `to_contract` with an encoded function payload
    pub async fn submit_call(
        &self,
        from: Address,
        to_contract: Address,
        payload: Vec<u8>,
    ) -> Result<TxHash, OrchestratorError> {
        let tx = self.build(from, to_contract, 0, payload).await?;
        self.sign_and_submit(&tx).await
    }

    pub async fn await_confirmation(&self, hash: &TxHash) -> Result<Confirmation, OrchestratorError> {
        await_confirmation(self.ledger.as_ref(), hash, &self.poll, self.progress.as_ref()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LoopbackSigner;
    use async_trait::async_trait;
    use datamarket_ledger::MockLedger;
    use std::time::Duration;

    fn addr(last: u8) -> Address {
        let mut bytes = [0u8; 20];
        bytes[19] = last;
        Address::from_bytes(bytes)
    }

    fn orchestrator(mock: Arc<MockLedger>, gas: GasPolicy) -> TransactionOrchestrator {
        let token = mock.token_address();
        TransactionOrchestrator::new(
            mock,
            Arc::new(LoopbackSigner),
            token,
            gas,
            PollConfig {
                interval: Duration::from_millis(1),
                batch_size: 1,
                max_wait: None,
            },
        )
    }

    struct BrokenSigner;

    #[async_trait]
    impl Signer for BrokenSigner {
        async fn sign(&self, _tx: &PendingTransaction) -> Result<String, OrchestratorError> {
            Ok("0xnot-hex".to_string())
        }
    }

    #[tokio::test]
    async fn test_build_uses_pending_nonce_and_policy() {
        let mock = Arc::new(MockLedger::new());
        mock.set_gas_estimate(100_000);
        let orchestrator = orchestrator(
            mock.clone(),
            GasPolicy::Inflated {
                multiplier: 1.5,
                ceiling: 4_700_000,
            },
        );

        let tx = orchestrator.build(addr(1), addr(2), 0, vec![1]).await.unwrap();
        assert_eq!(tx.nonce, 0);
        assert_eq!(tx.gas_limit, 150_000);
        assert_eq!(mock.estimates()[0].from, Some(addr(1)));
    }

    #[tokio::test]
    async fn test_payment_is_token_approval() {
        let mock = Arc::new(MockLedger::new());
        let orchestrator = orchestrator(mock.clone(), GasPolicy::Exact);
        let registry = mock.registry_address();

        let hash = orchestrator.submit_payment(addr(1), registry, 12).await.unwrap();
        let outcome = orchestrator.await_confirmation(&hash).await.unwrap();

        assert!(outcome.is_confirmed());
        assert_eq!(mock.allowance(&addr(1), &registry), 12);
        assert_eq!(mock.submitted()[0].to, mock.token_address());
    }

    #[tokio::test]
    async fn test_consecutive_submissions_take_fresh_nonces() {
        let mock = Arc::new(MockLedger::new());
        let orchestrator = orchestrator(mock.clone(), GasPolicy::Exact);

        orchestrator.submit_call(addr(1), addr(2), vec![]).await.unwrap();
        orchestrator.submit_call(addr(1), addr(2), vec![]).await.unwrap();

        let nonces: Vec<u64> = mock.submitted().iter().map(|tx| tx.nonce).collect();
        assert_eq!(nonces, vec![0, 1]);
    }

    #[tokio::test]
    async fn test_rejected_broadcast_is_submission_error() {
        let mock = Arc::new(MockLedger::new());
        mock.set_fail_submissions(true);
        let orchestrator = orchestrator(mock.clone(), GasPolicy::Exact);

        let err = orchestrator
            .submit_call(addr(1), addr(2), vec![])
            .await
            .unwrap_err();

        assert!(matches!(err, OrchestratorError::Submission { .. }));
        assert!(err.tx_hash().is_none());
    }

    #[tokio::test]
    async fn test_malformed_signature_never_broadcasts() {
        let mock = Arc::new(MockLedger::new());
        let token = mock.token_address();
        let orchestrator = TransactionOrchestrator::new(
            mock.clone(),
            Arc::new(BrokenSigner),
            token,
            GasPolicy::Exact,
            PollConfig::default(),
        );

        let err = orchestrator
            .submit_call(addr(1), addr(2), vec![])
            .await
            .unwrap_err();

        assert!(matches!(err, OrchestratorError::InvalidSignedPayload(_)));
        assert!(mock.submitted().is_empty());
    }
}
