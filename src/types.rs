// Wire types shared by the chain client and the verifier

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Error parsing a fixed-width hex value (address, hash, quantity)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HexParseError {
    #[error("Missing 0x prefix")]
    MissingPrefix,

    #[error("Expected {expected} hex characters, got {got}")]
    BadLength { expected: usize, got: usize },

    #[error("Invalid hex: {0}")]
    InvalidHex(String),
}

fn decode_fixed<const N: usize>(s: &str) -> Result<[u8; N], HexParseError> {
    let hex_part = s.strip_prefix("0x").ok_or(HexParseError::MissingPrefix)?;
    if hex_part.len() != N * 2 {
        return Err(HexParseError::BadLength {
            expected: N * 2,
            got: hex_part.len(),
        });
    }
    let bytes = hex::decode(hex_part).map_err(|e| HexParseError::InvalidHex(e.to_string()))?;
    let mut arr = [0u8; N];
    arr.copy_from_slice(&bytes);
    Ok(arr)
}

/// 20-byte chain address, parsed from 0x-prefixed hex
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address(pub [u8; 20]);

impl Address {
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl FromStr for Address {
    type Err = HexParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_fixed::<20>(s).map(Address)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl Serialize for Address {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// 32-byte transaction hash
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TxHash(pub [u8; 32]);

impl FromStr for TxHash {
    type Err = HexParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_fixed::<32>(s).map(TxHash)
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl Serialize for TxHash {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for TxHash {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// JSON-RPC quantity: a u64 carried on the wire as 0x-prefixed hex
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Quantity(pub u64);

/// Parse a 0x-prefixed hex quantity ("0x1a4" -> 420)
pub fn parse_quantity(s: &str) -> Result<u64, HexParseError> {
    let hex_part = s.strip_prefix("0x").ok_or(HexParseError::MissingPrefix)?;
    u64::from_str_radix(hex_part, 16).map_err(|e| HexParseError::InvalidHex(e.to_string()))
}

impl Serialize for Quantity {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("0x{:x}", self.0))
    }
}

impl<'de> Deserialize<'de> for Quantity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_quantity(&s)
            .map(Quantity)
            .map_err(serde::de::Error::custom)
    }
}

/// Receipt returned by eth_getTransactionReceipt once the transaction is mined
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub transaction_hash: TxHash,
    /// Set only for contract-creation transactions
    pub contract_address: Option<Address>,
    pub block_number: Quantity,
    /// 1 = success, 0 = reverted
    pub status: Quantity,
    pub gas_used: Option<Quantity>,
}

/// Request body for eth_sendTransaction (node-managed signing)
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    pub from: Address,
    /// Absent for contract creation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<Address>,
    /// 0x-prefixed creation code (bytecode ++ encoded constructor args)
    pub data: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas: Option<Quantity>,
}

/// Encode raw bytes as a 0x-prefixed hex string
pub fn to_hex_prefixed(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}
