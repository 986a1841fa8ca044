use datamarket_types::{Address, TxHash, TxReceipt};
use thiserror::Error;

use crate::{OrchestratorError, TransactionOrchestrator};

/// One build/sign/submit/confirm cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    /// Token allowance for `to_contract`
    Payment { to_contract: Address, amount: u128 },
    /// Contract function call
    Call {
        to_contract: Address,
        payload: Vec<u8>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseReceipt {
    pub hash: TxHash,
    pub receipt: TxReceipt,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TwoPhaseReport {
    pub first: PhaseReceipt,
    pub second: PhaseReceipt,
}

#[derive(Debug, Error)]
pub enum TwoPhaseError {
    /// Nothing from this flow is durable beyond a possibly reverted first transaction
    #[error("first phase failed: {0}")]
    First(#[source] OrchestratorError),

    /// The first phase is confirmed and stays in effect
    #[error("second phase failed after {first} was confirmed: {source}")]
    Second {
        first: PhaseReceipt,
        #[source]
        source: OrchestratorError,
    },
}

impl TwoPhaseError {
    pub fn orchestrator_error(&self) -> &OrchestratorError {
        match self {
            Self::First(e) | Self::Second { source: e, .. } => e,
        }
    }

    pub fn into_orchestrator_error(self) -> OrchestratorError {
        match self {
            Self::First(e) | Self::Second { source: e, .. } => e,
        }
    }
}

impl std::fmt::Display for PhaseReceipt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.hash)
    }
}

/// Two dependent transactions from the same address
///
/// The second phase is built only once the first is confirmed. If the
/// second phase fails or the flow is dropped in between, the first phase's
/// effect (typically an allowance) remains on-chain.
pub struct TwoPhaseFlow<'a> {
    orchestrator: &'a TransactionOrchestrator,
    from: Address,
}

impl<'a> TwoPhaseFlow<'a> {
    pub fn new(orchestrator: &'a TransactionOrchestrator, from: Address) -> Self {
        Self { orchestrator, from }
    }

    pub async fn execute(&self, first: Phase, second: Phase) -> Result<TwoPhaseReport, TwoPhaseError> {
        // ═══ PHASE 1 ═══
        tracing::info!(from = %self.from, "Starting first phase");
        let first = self.run(first).await.map_err(TwoPhaseError::First)?;

        // ═══ PHASE 2 ═══
        tracing::info!(from = %self.from, first = %first.hash, "First phase confirmed, starting second phase");
        let second = match self.run(second).await {
            Ok(second) => second,
            Err(source) => {
                tracing::warn!(
                    first = %first.hash,
                    error = %source,
                    "Second phase failed; first phase remains in effect"
                );
                return Err(TwoPhaseError::Second { first, source });
            }
        };

        Ok(TwoPhaseReport { first, second })
    }

    async fn run(&self, phase: Phase) -> Result<PhaseReceipt, OrchestratorError> {
        let hash = match phase {
            Phase::Payment {
                to_contract,
                amount,
            } => {
                self.orchestrator
                    .submit_payment(self.from, to_contract, amount)
                    .await?
            }
            Phase::Call {
                to_contract,
                payload,
            } => {
                self.orchestrator
                    .submit_call(self.from, to_contract, payload)
                    .await?
            }
        };

        let receipt = self
            .orchestrator
            .await_confirmation(&hash)
            .await?
            .into_result()?;
        Ok(PhaseReceipt { hash, receipt })
    }
}
