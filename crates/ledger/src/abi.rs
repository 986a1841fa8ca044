//! Minimal contract ABI codec
//!
//! Covers the static word types used by the marketplace contracts plus
//! `bytes32[]` results. Amounts are carried as `u128`; a word whose upper
//! sixteen bytes are non-zero is rejected rather than truncated.

use datamarket_types::Address;
use sha3::{Digest, Keccak256};

use crate::LedgerError;

pub const WORD: usize = 32;

/// Argument or return value of a contract function
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Address(Address),
    Uint(u128),
    Bool(bool),
    Bytes32([u8; 32]),
}

pub fn keccak256(data: &[u8]) -> [u8; 32] {
    Keccak256::digest(data).into()
}

/// First four bytes of the keccak-256 hash of a canonical signature
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

pub fn encode_word(token: &Token) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    match token {
        Token::Address(address) => word[12..].copy_from_slice(address.as_bytes()),
        Token::Uint(value) => word[16..].copy_from_slice(&value.to_be_bytes()),
        Token::Bool(value) => word[31] = u8::from(*value),
        Token::Bytes32(bytes) => word.copy_from_slice(bytes),
    }
    word
}

/// Head-only encoding of static tokens
pub fn encode_tokens(tokens: &[Token]) -> Vec<u8> {
    tokens.iter().flat_map(encode_word).collect()
}

pub fn encode_call(signature: &str, args: &[Token]) -> Vec<u8> {
    let mut data = selector(signature).to_vec();
    data.extend(encode_tokens(args));
    data
}

/// Encoding of a single `bytes32[]` return value
pub fn encode_bytes32_array(items: &[[u8; 32]]) -> Vec<u8> {
    let mut data = Vec::with_capacity((items.len() + 2) * WORD);
    data.extend(encode_word(&Token::Uint(WORD as u128)));
    data.extend(encode_word(&Token::Uint(items.len() as u128)));
    for item in items {
        data.extend_from_slice(item);
    }
    data
}

/// Split calldata into its selector and argument words
pub fn split_call(calldata: &[u8]) -> Result<([u8; 4], &[u8]), LedgerError> {
    if calldata.len() < 4 {
        return Err(LedgerError::Decode(format!(
            "calldata too short: {} bytes",
            calldata.len()
        )));
    }
    let mut sel = [0u8; 4];
    sel.copy_from_slice(&calldata[..4]);
    Ok((sel, &calldata[4..]))
}

/// Word-indexed reader over ABI-encoded data
pub struct Decoder<'a> {
    data: &'a [u8],
}

impl<'a> Decoder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    pub fn word_count(&self) -> usize {
        self.data.len() / WORD
    }

    pub fn word(&self, index: usize) -> Result<&'a [u8; WORD], LedgerError> {
        let range = index
            .checked_mul(WORD)
            .and_then(|start| Some(start..start.checked_add(WORD)?));
        range
            .and_then(|range| self.data.get(range))
            .and_then(|slice| slice.try_into().ok())
            .ok_or_else(|| {
                LedgerError::Decode(format!(
                    "word {} out of range ({} bytes)",
                    index,
                    self.data.len()
                ))
            })
    }

    pub fn uint(&self, index: usize) -> Result<u128, LedgerError> {
        let word = self.word(index)?;
        if word[..16].iter().any(|b| *b != 0) {
            return Err(LedgerError::Decode(format!(
                "word {} exceeds 128 bits",
                index
            )));
        }
        let mut low = [0u8; 16];
        low.copy_from_slice(&word[16..]);
        Ok(u128::from_be_bytes(low))
    }

    pub fn uint64(&self, index: usize) -> Result<u64, LedgerError> {
        let value = self.uint(index)?;
        u64::try_from(value)
            .map_err(|_| LedgerError::Decode(format!("word {} exceeds 64 bits", index)))
    }

    pub fn address(&self, index: usize) -> Result<Address, LedgerError> {
        let word = self.word(index)?;
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&word[12..]);
        Ok(Address::from_bytes(bytes))
    }

    pub fn boolean(&self, index: usize) -> Result<bool, LedgerError> {
        Ok(self.uint(index)? != 0)
    }

    pub fn bytes32(&self, index: usize) -> Result<[u8; 32], LedgerError> {
        Ok(*self.word(index)?)
    }

    /// Dynamic `bytes32[]` whose offset is stored at `index`
    pub fn bytes32_array(&self, index: usize) -> Result<Vec<[u8; 32]>, LedgerError> {
        let offset = self.offset_word(index)?;
        if offset % WORD != 0 {
            return Err(LedgerError::Decode(format!(
                "unaligned array offset {}",
                offset
            )));
        }
        let head = offset / WORD;
        let len = self.offset_word(head)?;
        if len > self.word_count() {
            return Err(LedgerError::Decode(format!(
                "array length {} exceeds {} available words",
                len,
                self.word_count()
            )));
        }
        (0..len)
            .map(|i| {
                let position = head
                    .checked_add(1)
                    .and_then(|first| first.checked_add(i))
                    .ok_or_else(|| LedgerError::Decode(format!("array item {} out of range", i)))?;
                self.bytes32(position)
            })
            .collect()
    }

    /// Offset or length word, rejected if it does not fit the platform's `usize`
    fn offset_word(&self, index: usize) -> Result<usize, LedgerError> {
        let value = self.uint(index)?;
        usize::try_from(value)
            .map_err(|_| LedgerError::Decode(format!("word {} does not fit in usize", index)))
    }
}

/// Parse a JSON-RPC hex quantity; the `0x` prefix is optional
pub fn parse_quantity(raw: &str) -> Result<u64, LedgerError> {
    let digits = raw.trim().trim_start_matches("0x");
    if digits.is_empty() {
        return Err(LedgerError::Decode(format!("empty quantity {:?}", raw)));
    }
    u64::from_str_radix(digits, 16)
        .map_err(|e| LedgerError::Decode(format!("bad quantity {:?}: {}", raw, e)))
}

/// Parse JSON-RPC hex data; the `0x` prefix is optional
pub fn parse_data(raw: &str) -> Result<Vec<u8>, LedgerError> {
    let digits = raw.trim().trim_start_matches("0x");
    hex::decode(digits).map_err(|e| LedgerError::Decode(format!("bad hex data: {}", e)))
}

pub fn to_quantity(value: u128) -> String {
    format!("0x{:x}", value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(last: u8) -> Address {
        let mut bytes = [0u8; 20];
        bytes[19] = last;
        Address::from_bytes(bytes)
    }

    #[test]
    fn test_well_known_selectors() {
        assert_eq!(hex::encode(selector("balanceOf(address)")), "70a08231");
        assert_eq!(hex::encode(selector("approve(address,uint256)")), "095ea7b3");
        assert_eq!(hex::encode(selector("transfer(address,uint256)")), "a9059cbb");
    }

    #[test]
    fn test_encode_call_layout() {
        let data = encode_call(
            "approve(address,uint256)",
            &[Token::Address(addr(0xaa)), Token::Uint(500)],
        );

        assert_eq!(data.len(), 4 + 2 * WORD);
        assert_eq!(data[4 + 31], 0xaa);
        assert_eq!(&data[4 + WORD + 30..], &[0x01, 0xf4]);
    }

    #[test]
    fn test_decoder_static_words() {
        let encoded = encode_tokens(&[
            Token::Address(addr(7)),
            Token::Uint(42),
            Token::Bool(true),
            Token::Bytes32([9u8; 32]),
        ]);
        let decoder = Decoder::new(&encoded);

        assert_eq!(decoder.address(0).unwrap(), addr(7));
        assert_eq!(decoder.uint(1).unwrap(), 42);
        assert!(decoder.boolean(2).unwrap());
        assert_eq!(decoder.bytes32(3).unwrap(), [9u8; 32]);
        assert!(decoder.word(4).is_err());
    }

    #[test]
    fn test_decoder_rejects_oversized_uint() {
        let word = [0xffu8; 32];
        assert!(Decoder::new(&word).uint(0).is_err());
    }

    #[test]
    fn test_bytes32_array() {
        let items = [[1u8; 32], [2u8; 32], [3u8; 32]];
        let encoded = encode_bytes32_array(&items);
        let decoded = Decoder::new(&encoded).bytes32_array(0).unwrap();

        assert_eq!(decoded, items.to_vec());
    }

    fn array_with_offset(offset: u128) -> Vec<u8> {
        let mut data = encode_word(&Token::Uint(offset)).to_vec();
        data.extend(encode_word(&Token::Uint(1)));
        data.extend_from_slice(&[7u8; 32]);
        data
    }

    #[test]
    fn test_bytes32_array_offset_near_usize_max_is_decode_error() {
        let encoded = array_with_offset(0xFFFF_FFFF_FFFF_FFE0);
        assert!(matches!(
            Decoder::new(&encoded).bytes32_array(0),
            Err(LedgerError::Decode(_))
        ));
    }

    #[test]
    fn test_bytes32_array_offset_beyond_64_bits_is_decode_error() {
        let encoded = array_with_offset((1u128 << 64) + 32);
        assert!(matches!(
            Decoder::new(&encoded).bytes32_array(0),
            Err(LedgerError::Decode(_))
        ));
    }

    #[test]
    fn test_bytes32_array_oversized_length_is_decode_error() {
        let mut encoded = encode_word(&Token::Uint(WORD as u128)).to_vec();
        encoded.extend(encode_word(&Token::Uint(u64::MAX as u128)));
        assert!(matches!(
            Decoder::new(&encoded).bytes32_array(0),
            Err(LedgerError::Decode(_))
        ));
    }

    #[test]
    fn test_word_index_overflow_is_decode_error() {
        let encoded = encode_tokens(&[Token::Uint(1)]);
        assert!(matches!(
            Decoder::new(&encoded).word(usize::MAX),
            Err(LedgerError::Decode(_))
        ));
    }

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity("0x10").unwrap(), 16);
        assert_eq!(parse_quantity("ff").unwrap(), 255);
        assert!(parse_quantity("0x").is_err());
        assert!(parse_quantity("0xzz").is_err());
    }

    #[test]
    fn test_split_call() {
        let data = encode_call("subscribe(bytes32)", &[Token::Bytes32([0u8; 32])]);
        let (sel, args) = split_call(&data).unwrap();

        assert_eq!(sel, selector("subscribe(bytes32)"));
        assert_eq!(args.len(), WORD);
        assert!(split_call(&[1, 2]).is_err());
    }
}
