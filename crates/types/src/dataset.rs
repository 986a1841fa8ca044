use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::{Address, DATASET_ID_WIDTH};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DatasetError {
    #[error("dataset name is empty")]
    Empty,

    #[error("dataset name {name} is {len} bytes, limit is {DATASET_ID_WIDTH}")]
    TooLong { name: String, len: usize },

    #[error("dataset name contains a NUL byte")]
    ContainsNul,

    #[error("dataset identifier is not valid UTF-8")]
    InvalidUtf8,

    #[error("unknown data frequency: {0}")]
    UnknownFrequency(String),
}

/// Canonical lower-cased dataset name
///
/// On-chain lookups use the name right-padded with zero bytes to 32 bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DatasetId(String);

impl DatasetId {
    pub fn new(name: &str) -> Result<Self, DatasetError> {
        let name = name.trim().to_lowercase();

        if name.is_empty() {
            return Err(DatasetError::Empty);
        }
        if name.len() > DATASET_ID_WIDTH {
            return Err(DatasetError::TooLong {
                len: name.len(),
                name,
            });
        }
        if name.contains('\0') {
            return Err(DatasetError::ContainsNul);
        }

        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn to_bytes32(&self) -> [u8; DATASET_ID_WIDTH] {
        let mut out = [0u8; DATASET_ID_WIDTH];
        out[..self.0.len()].copy_from_slice(self.0.as_bytes());
        out
    }

    /// Decode an on-chain identifier, stripping the trailing zero padding
    pub fn from_bytes32(raw: &[u8; DATASET_ID_WIDTH]) -> Result<Self, DatasetError> {
        let end = raw
            .iter()
            .rposition(|b| *b != 0)
            .map(|i| i + 1)
            .unwrap_or(0);
        let name = std::str::from_utf8(&raw[..end]).map_err(|_| DatasetError::InvalidUtf8)?;
        Self::new(name)
    }
}

impl fmt::Display for DatasetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for DatasetId {
    type Err = DatasetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for DatasetId {
    type Error = DatasetError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<DatasetId> for String {
    fn from(id: DatasetId) -> Self {
        id.0
    }
}

/// Sampling frequency of a dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataFrequency {
    Daily,
    Hourly,
    Minute,
}

impl DataFrequency {
    pub const ALL: [DataFrequency; 3] = [Self::Daily, Self::Hourly, Self::Minute];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Hourly => "hourly",
            Self::Minute => "minute",
        }
    }
}

impl fmt::Display for DataFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataFrequency {
    type Err = DatasetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "daily" => Ok(Self::Daily),
            "hourly" => Ok(Self::Hourly),
            "minute" => Ok(Self::Minute),
            other => Err(DatasetError::UnknownFrequency(other.to_string())),
        }
    }
}

/// On-chain provider record, fetched fresh on every call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderInfo {
    pub owner: Address,
    /// Monthly subscription price in whole tokens
    pub monthly_price: u128,
    pub frequency_hint: u64,
    pub has_history: bool,
    pub is_registered: bool,
}

/// Subscription record as reported by the registry
///
/// The dataset is kept as the raw on-chain identifier so a record for a
/// different (or undecodable) dataset can never be mistaken for the one that
/// was asked about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionStatus {
    pub subscriber: Address,
    pub dataset: [u8; DATASET_ID_WIDTH],
    pub start_timestamp: u64,
    pub expiry_timestamp: u64,
    pub is_active: bool,
}

impl SubscriptionStatus {
    /// Whether this record answers a query for `address` and `dataset`
    pub fn matches(&self, address: &Address, dataset: &DatasetId) -> bool {
        self.subscriber == *address && self.dataset == dataset.to_bytes32()
    }

    pub fn dataset_id(&self) -> Option<DatasetId> {
        DatasetId::from_bytes32(&self.dataset).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dataset_id_lowercases() {
        let id = DatasetId::new("MarketCap").unwrap();
        assert_eq!(id.as_str(), "marketcap");
    }

    #[test]
    fn test_dataset_id_padding() {
        let id = DatasetId::new("github").unwrap();
        let raw = id.to_bytes32();

        assert_eq!(&raw[..6], b"github");
        assert!(raw[6..].iter().all(|b| *b == 0));
        assert_eq!(DatasetId::from_bytes32(&raw).unwrap(), id);
    }

    #[test]
    fn test_dataset_id_limits() {
        assert_eq!(DatasetId::new("  "), Err(DatasetError::Empty));
        assert!(matches!(
            DatasetId::new(&"a".repeat(33)),
            Err(DatasetError::TooLong { len: 33, .. })
        ));
        assert!(DatasetId::new(&"a".repeat(32)).is_ok());
    }

    #[test]
    fn test_dataset_id_rejects_invalid_utf8() {
        let mut raw = [0u8; 32];
        raw[0] = 0xff;
        assert_eq!(DatasetId::from_bytes32(&raw), Err(DatasetError::InvalidUtf8));
    }

    #[test]
    fn test_frequency_parse() {
        assert_eq!("Daily".parse::<DataFrequency>().unwrap(), DataFrequency::Daily);
        assert_eq!("minute".parse::<DataFrequency>().unwrap(), DataFrequency::Minute);
        assert!("weekly".parse::<DataFrequency>().is_err());
    }

    #[test]
    fn test_subscription_matches() {
        let addr: Address = "0x0000000000000000000000000000000000000001".parse().unwrap();
        let other: Address = "0x0000000000000000000000000000000000000002".parse().unwrap();
        let ds = DatasetId::new("marketcap").unwrap();

        let status = SubscriptionStatus {
            subscriber: addr,
            dataset: ds.to_bytes32(),
            start_timestamp: 1,
            expiry_timestamp: 2,
            is_active: false,
        };

        assert!(status.matches(&addr, &ds));
        assert!(!status.matches(&other, &ds));
        assert!(!status.matches(&addr, &DatasetId::new("github").unwrap()));
    }
}
