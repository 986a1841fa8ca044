use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressError {
    #[error("no usable public address configured in {source_name}")]
    ConfigurationMissing { source_name: String },

    #[error("invalid address {value}: {reason}")]
    Invalid { value: String, reason: String },

    #[error("address index {index} out of range (0..{len})")]
    InvalidSelection { index: usize, len: usize },
}

/// 20-byte account address
///
/// Parsing accepts mixed case with or without a `0x` prefix; display is
/// always lower-case and prefixed, so two addresses that differ only in
/// checksum casing compare equal.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; 20]);

impl Address {
    pub const ZERO: Address = Address([0u8; 20]);

    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Hex form without the `0x` prefix
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);

        if digits.len() != 40 {
            return Err(AddressError::Invalid {
                value: s.to_string(),
                reason: format!("expected 40 hex digits, got {}", digits.len()),
            });
        }

        let mut bytes = [0u8; 20];
        hex::decode_to_slice(digits, &mut bytes).map_err(|e| AddressError::Invalid {
            value: s.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self(bytes))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// One entry of the local address file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressEntry {
    #[serde(rename = "pubAddr")]
    pub public_address: String,

    #[serde(rename = "desc", default)]
    pub description: String,

    #[serde(rename = "key", default, skip_serializing_if = "Option::is_none")]
    pub credential_key: Option<String>,

    #[serde(rename = "secret", default, skip_serializing_if = "Option::is_none")]
    pub credential_secret: Option<String>,
}

impl AddressEntry {
    pub fn new(public_address: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            public_address: public_address.into(),
            description: description.into(),
            credential_key: None,
            credential_secret: None,
        }
    }

    pub fn with_credentials(mut self, key: impl Into<String>, secret: impl Into<String>) -> Self {
        self.credential_key = Some(key.into());
        self.credential_secret = Some(secret.into());
        self
    }

    pub fn address(&self) -> Result<Address, AddressError> {
        self.public_address.parse()
    }

    /// Pre-configured ingestion credentials, if both halves are present
    pub fn credentials(&self) -> Option<Credentials> {
        match (&self.credential_key, &self.credential_secret) {
            (Some(key), Some(secret)) if !key.is_empty() && !secret.is_empty() => {
                Some(Credentials::new(key.clone(), secret.clone()))
            }
            _ => None,
        }
    }
}

/// API key/secret pair used to sign ingestion service requests
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub key: String,
    pub secret: String,
}

impl Credentials {
    pub fn new(key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            secret: secret.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("key", &self.key)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// An address picked from the registry for one workflow invocation
#[derive(Debug, Clone)]
pub struct SelectedAddress<'a> {
    pub index: usize,
    pub address: Address,
    pub entry: &'a AddressEntry,
}

/// Known public addresses usable for transactions
///
/// Loaded once at startup and immutable for the rest of the session.
#[derive(Debug, Clone)]
pub struct AddressRegistry {
    entries: Vec<AddressEntry>,
}

impl AddressRegistry {
    /// The first entry is the default account and must carry an address.
    pub fn new(
        entries: Vec<AddressEntry>,
        source_name: impl Into<String>,
    ) -> Result<Self, AddressError> {
        let usable = entries
            .first()
            .map(|e| !e.public_address.trim().is_empty())
            .unwrap_or(false);

        if !usable {
            return Err(AddressError::ConfigurationMissing {
                source_name: source_name.into(),
            });
        }

        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[AddressEntry] {
        &self.entries
    }

    pub fn default_address(&self) -> Result<Address, AddressError> {
        self.select(0).map(|s| s.address)
    }

    pub fn select(&self, index: usize) -> Result<SelectedAddress<'_>, AddressError> {
        let entry = self
            .entries
            .get(index)
            .ok_or(AddressError::InvalidSelection {
                index,
                len: self.entries.len(),
            })?;

        Ok(SelectedAddress {
            index,
            address: entry.address()?,
            entry,
        })
    }

    /// Entry whose public address equals `address`; unparsable entries never match
    pub fn find(&self, address: &Address) -> Option<SelectedAddress<'_>> {
        self.entries.iter().enumerate().find_map(|(index, entry)| {
            let parsed = entry.address().ok()?;
            (parsed == *address).then_some(SelectedAddress {
                index,
                address: parsed,
                entry,
            })
        })
    }
}
