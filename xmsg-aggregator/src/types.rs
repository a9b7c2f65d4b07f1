//! Core identifiers and message shapes shared by the aggregator and every
//! gateway adapter.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha3::{Digest as _, Keccak256};

use crate::error::CodecError;

// ═══════════════════════════════════════════════════════════════════════════════
// ATTRIBUTE KEYS
// ═══════════════════════════════════════════════════════════════════════════════

/// Destination gas limit requested by the sender (u64, big-endian, 8 bytes)
pub const ATTR_GAS_LIMIT: &str = "gasLimit";

/// Transport finality level requested by the sender (1 byte)
pub const ATTR_CONSISTENCY_LEVEL: &str = "consistencyLevel";

// ═══════════════════════════════════════════════════════════════════════════════
// CHAIN IDENTIFIERS
// ═══════════════════════════════════════════════════════════════════════════════

/// CAIP-2 chain identifier, e.g. `eip155:1`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChainId(String);

impl ChainId {
    /// Parse a CAIP-2 identifier (`namespace:reference`)
    pub fn parse(value: &str) -> Result<Self, CodecError> {
        let mut parts = value.split(':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(namespace), Some(reference), None)
                if !namespace.is_empty() && !reference.is_empty() =>
            {
                Ok(Self(value.to_string()))
            }
            _ => Err(CodecError::InvalidChainId(value.to_string())),
        }
    }

    /// Shorthand for EVM chains (`eip155:<chain_id>`)
    pub fn eip155(chain_id: u64) -> Self {
        Self(format!("eip155:{chain_id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn namespace(&self) -> &str {
        self.0.split(':').next().unwrap_or_default()
    }

    pub fn reference(&self) -> &str {
        self.0.split(':').nth(1).unwrap_or_default()
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ChainId {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ChainId {
    type Error = CodecError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ChainId> for String {
    fn from(value: ChainId) -> Self {
        value.0
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ACCOUNTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Opaque account or contract address on some chain.
///
/// `0x`-prefixed hex addresses are compared case-insensitively, so they are
/// normalised to lowercase on construction. Anything else is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Account(String);

impl Account {
    pub fn new(value: impl Into<String>) -> Self {
        let value = value.into();
        if value.starts_with("0x") || value.starts_with("0X") {
            Self(value.to_lowercase())
        } else {
            Self(value)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Account {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for Account {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<Account> for String {
    fn from(value: Account) -> Self {
        value.0
    }
}

/// An account qualified by the chain it lives on
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InteropAddress {
    pub chain: ChainId,
    pub account: Account,
}

impl InteropAddress {
    pub fn new(chain: ChainId, account: impl Into<Account>) -> Self {
        Self {
            chain,
            account: account.into(),
        }
    }
}

impl fmt::Display for InteropAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.account, self.chain)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// IDENTIFIERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Aggregator-assigned message identifier, unique within one aggregator instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub u64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Adapter-assigned identifier of one gateway-level send
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SendId(pub u64);

impl fmt::Display for SendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a gateway adapter (its local address)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GatewayId(String);

impl GatewayId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GatewayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for GatewayId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Transport-level delivery identifier (Axelar command id, Wormhole VAA hash, ...)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DeliveryId(#[serde(with = "hex_bytes")] pub Vec<u8>);

impl DeliveryId {
    pub fn from_hex(value: &str) -> Result<Self, CodecError> {
        hex_bytes::parse(value).map(Self)
    }
}

impl fmt::Display for DeliveryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(&self.0))
    }
}

/// Keccak-256 digest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Digest(#[serde(with = "hex_array")] pub [u8; 32]);

impl Digest {
    pub fn keccak(parts: &[&[u8]]) -> Self {
        let mut hasher = Keccak256::new();
        for part in parts {
            hasher.update(part);
        }
        Self(hasher.finalize().into())
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// MESSAGES
// ═══════════════════════════════════════════════════════════════════════════════

/// Key/value attribute attached to a send request
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Attribute {
    pub key: String,
    #[serde(with = "hex_bytes")]
    pub value: Vec<u8>,
}

impl Attribute {
    pub fn new(key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn gas_limit(limit: u64) -> Self {
        Self::new(ATTR_GAS_LIMIT, limit.to_be_bytes().to_vec())
    }

    pub fn consistency_level(level: u8) -> Self {
        Self::new(ATTR_CONSISTENCY_LEVEL, vec![level])
    }

    /// Interpret the value as a big-endian u64 (shorter values are left-padded)
    pub fn as_u64(&self) -> Option<u64> {
        if self.value.len() > 8 {
            return None;
        }
        let mut buf = [0u8; 8];
        buf[8 - self.value.len()..].copy_from_slice(&self.value);
        Some(u64::from_be_bytes(buf))
    }
}

/// Find the first attribute with the given key
pub fn find_attribute<'a>(attributes: &'a [Attribute], key: &str) -> Option<&'a Attribute> {
    attributes.iter().find(|a| a.key == key)
}

/// Logical message as submitted to an aggregator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub source: InteropAddress,
    pub destination: InteropAddress,
    #[serde(with = "hex_bytes")]
    pub payload: Vec<u8>,
    pub attributes: Vec<Attribute>,
}

/// Aggregator-level payload fanned out over every gateway.
///
/// The gateway-level recipient of an envelope is always the peer aggregator;
/// the end receiver travels inside as `recipient`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub id: MessageId,
    pub sender: Account,
    pub recipient: Account,
    #[serde(with = "hex_bytes")]
    pub payload: Vec<u8>,
}

/// A message authenticated by a destination adapter and forwarded to the aggregator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayMessage {
    /// Transport-level delivery this message arrived in
    pub delivery_id: DeliveryId,
    /// Origin chain, already translated from the transport's naming
    pub source_chain: ChainId,
    /// Gateway-level sender (the remote aggregator)
    pub sender: Account,
    /// Gateway-level recipient (the local aggregator)
    pub recipient: Account,
    #[serde(with = "hex_bytes")]
    pub payload: Vec<u8>,
    pub attributes: Vec<Attribute>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// SERDE HELPERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Serialize byte vectors as `0x`-prefixed hex strings
pub mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::error::CodecError;

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let value = String::deserialize(deserializer)?;
        parse(&value).map_err(serde::de::Error::custom)
    }

    /// Decode hex with an optional `0x` prefix
    pub fn parse(value: &str) -> Result<Vec<u8>, CodecError> {
        let stripped = value.strip_prefix("0x").unwrap_or(value);
        hex::decode(stripped).map_err(|e| CodecError::Decoding(format!("invalid hex: {e}")))
    }
}

mod hex_array {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error> {
        super::hex_bytes::serialize(bytes, serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<[u8; 32], D::Error> {
        let value = String::deserialize(deserializer)?;
        let bytes = super::hex_bytes::parse(&value).map_err(serde::de::Error::custom)?;
        bytes
            .try_into()
            .map_err(|v: Vec<u8>| serde::de::Error::custom(format!("expected 32 bytes, got {}", v.len())))
    }
}
