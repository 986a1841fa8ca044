use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::Address;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransactionError {
    #[error("signed transaction is empty")]
    EmptySignedTransaction,

    #[error("invalid hex payload: {0}")]
    InvalidHex(String),
}

/// Unsigned transaction handed to the external signer
///
/// Never persisted; it exists between build and signature only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTransaction {
    pub from: Address,
    pub to: Address,
    pub value: u128,
    pub gas_limit: u64,
    pub nonce: u64,
    #[serde(with = "hex_bytes")]
    pub data: Vec<u8>,
}

impl PendingTransaction {
    pub fn data_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.data))
    }
}

/// Opaque signed transaction bytes ready for broadcast
#[derive(Clone, PartialEq, Eq)]
pub struct SignedTransaction(Vec<u8>);

impl SignedTransaction {
    pub fn new(bytes: Vec<u8>) -> Result<Self, TransactionError> {
        if bytes.is_empty() {
            return Err(TransactionError::EmptySignedTransaction);
        }
        Ok(Self(bytes))
    }

    /// Parse signer output; a leading `0x` is optional
    pub fn from_hex(input: &str) -> Result<Self, TransactionError> {
        let trimmed = input.trim();
        let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        let bytes = hex::decode(digits).map_err(|e| TransactionError::InvalidHex(e.to_string()))?;
        Self::new(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.0))
    }
}

impl fmt::Debug for SignedTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SignedTransaction({} bytes)", self.0.len())
    }
}

/// Transaction hash, normalised to lower-case with a `0x` prefix
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct TxHash(String);

impl TxHash {
    pub fn new(raw: &str) -> Self {
        let trimmed = raw.trim();
        let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        Self(format!("0x{}", digits.to_lowercase()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(format!("0x{}", hex::encode(bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for TxHash {
    fn from(raw: String) -> Self {
        Self::new(&raw)
    }
}

impl From<TxHash> for String {
    fn from(hash: TxHash) -> Self {
        hash.0
    }
}

/// Receipt of a mined transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    pub hash: TxHash,
    /// False when the transaction executed but reverted
    pub status: bool,
    pub block_number: Option<u64>,
    pub gas_used: Option<u64>,
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        let digits = raw.strip_prefix("0x").unwrap_or(&raw);
        hex::decode(digits).map_err(serde::de::Error::custom)
    }
}
