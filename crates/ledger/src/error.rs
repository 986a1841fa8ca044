/// Ledger error types
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("encoding error: {0}")]
    Encoding(String),
}

impl LedgerError {
    /// Errors that say nothing about the ledger's state, only about reaching it
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::ConnectionFailed(_) | Self::Timeout(_))
    }
}

impl From<reqwest::Error> for LedgerError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LedgerError::Timeout(err.to_string())
        } else if err.is_connect() || err.is_request() {
            LedgerError::ConnectionFailed(err.to_string())
        } else if err.is_decode() {
            LedgerError::InvalidResponse(err.to_string())
        } else {
            LedgerError::ConnectionFailed(err.to_string())
        }
    }
}
