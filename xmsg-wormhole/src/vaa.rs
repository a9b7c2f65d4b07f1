//! VAA body and gateway payload wire format
//!
//! Body layout (big-endian):
//! `timestamp u32 | nonce u32 | emitter_chain u16 | emitter_address [32] |
//! sequence u64 | consistency_level u8 | payload`
//!
//! Guardians sign `keccak256(keccak256(body))`, which is also the delivery id.

use sha3::{Digest, Keccak256};

use xmsg_aggregator::codec::{decode_gateway_payload, encode_gateway_payload, GatewayPayload};
use xmsg_aggregator::{CodecError, GatewayId};

const BODY_HEADER_LEN: usize = 4 + 4 + 2 + 32 + 8 + 1;
const TARGET_LEN: usize = 2 + 32;

/// Finality requested from guardians
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConsistencyLevel {
    /// Standard confirmation (1 block)
    Confirmed = 1,
    /// Full finality
    Finalized = 32,
}

impl TryFrom<u8> for ConsistencyLevel {
    type Error = CodecError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Confirmed),
            32 => Ok(Self::Finalized),
            other => Err(CodecError::Decoding(format!(
                "invalid consistency level: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaaBody {
    pub timestamp: u32,
    pub nonce: u32,
    pub emitter_chain: u16,
    pub emitter_address: [u8; 32],
    pub sequence: u64,
    pub consistency_level: u8,
    pub payload: Vec<u8>,
}

impl VaaBody {
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(BODY_HEADER_LEN + self.payload.len());
        out.extend_from_slice(&self.timestamp.to_be_bytes());
        out.extend_from_slice(&self.nonce.to_be_bytes());
        out.extend_from_slice(&self.emitter_chain.to_be_bytes());
        out.extend_from_slice(&self.emitter_address);
        out.extend_from_slice(&self.sequence.to_be_bytes());
        out.push(self.consistency_level);
        out.extend_from_slice(&self.payload);
        out
    }

    pub fn parse(bytes: &[u8]) -> Result<Self, CodecError> {
        if bytes.len() < BODY_HEADER_LEN {
            return Err(CodecError::Decoding(format!(
                "vaa body too short: {} < {}",
                bytes.len(),
                BODY_HEADER_LEN
            )));
        }

        let (timestamp, rest) = bytes.split_at(4);
        let (nonce, rest) = rest.split_at(4);
        let (emitter_chain, rest) = rest.split_at(2);
        let (emitter_address, rest) = rest.split_at(32);
        let (sequence, rest) = rest.split_at(8);
        let (consistency_level, payload) = rest.split_at(1);

        Ok(Self {
            timestamp: u32::from_be_bytes(array(timestamp)),
            nonce: u32::from_be_bytes(array(nonce)),
            emitter_chain: u16::from_be_bytes(array(emitter_chain)),
            emitter_address: array(emitter_address),
            sequence: u64::from_be_bytes(array(sequence)),
            consistency_level: consistency_level[0],
            payload: payload.to_vec(),
        })
    }

    /// Double keccak of the serialized body
    pub fn digest(&self) -> [u8; 32] {
        let inner = Keccak256::digest(self.serialize());
        Keccak256::digest(inner).into()
    }
}

fn array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[..N]);
    out
}

/// Emitter address of a gateway: `keccak256(gateway id)`
pub fn emitter_address(gateway: &GatewayId) -> [u8; 32] {
    Keccak256::digest(gateway.as_str().as_bytes()).into()
}

pub fn emitter_hex(gateway: &GatewayId) -> String {
    format!("0x{}", hex::encode(emitter_address(gateway)))
}

// ═══════════════════════════════════════════════════════════════════════════════
// PAYLOAD
// ═══════════════════════════════════════════════════════════════════════════════

/// Gateway payload addressed to one emitter on one Wormhole chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WormholePayload {
    pub target_chain: u16,
    pub target_emitter: [u8; 32],
    pub message: GatewayPayload,
}

impl WormholePayload {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.target_chain.to_be_bytes());
        out.extend_from_slice(&self.target_emitter);
        out.extend_from_slice(&encode_gateway_payload(&self.message));
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        if bytes.len() < TARGET_LEN {
            return Err(CodecError::Decoding(format!(
                "wormhole payload too short: {} < {}",
                bytes.len(),
                TARGET_LEN
            )));
        }
        let (target_chain, rest) = bytes.split_at(2);
        let (target_emitter, message) = rest.split_at(32);

        Ok(Self {
            target_chain: u16::from_be_bytes(array(target_chain)),
            target_emitter: array(target_emitter),
            message: decode_gateway_payload(message)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xmsg_aggregator::Account;

    fn body() -> VaaBody {
        VaaBody {
            timestamp: 1_700_000_000,
            nonce: 7,
            emitter_chain: 2,
            emitter_address: [0x11; 32],
            sequence: 42,
            consistency_level: ConsistencyLevel::Finalized as u8,
            payload: b"hello".to_vec(),
        }
    }

    #[test]
    fn test_body_layout() {
        let bytes = body().serialize();
        assert_eq!(bytes.len(), BODY_HEADER_LEN + 5);
        assert_eq!(&bytes[8..10], &2u16.to_be_bytes());
        assert_eq!(&bytes[42..50], &42u64.to_be_bytes());
        assert_eq!(bytes[50], 32);
        assert_eq!(VaaBody::parse(&bytes).unwrap(), body());
    }

    #[test]
    fn test_truncated_body() {
        assert!(VaaBody::parse(&[0u8; BODY_HEADER_LEN - 1]).is_err());
        // An empty payload is still a valid body
        assert!(VaaBody::parse(&[0u8; BODY_HEADER_LEN]).is_ok());
    }

    #[test]
    fn test_digest_covers_every_field() {
        let mut other = body();
        other.sequence += 1;
        assert_ne!(body().digest(), other.digest());
        assert_eq!(body().digest(), body().digest());
    }

    #[test]
    fn test_payload_targets() {
        let payload = WormholePayload {
            target_chain: 23,
            target_emitter: emitter_address(&GatewayId::new("wormhole-arb")),
            message: GatewayPayload {
                sender: Account::new("0xa"),
                recipient: Account::new("0xb"),
                payload: vec![1, 2, 3],
                attributes: vec![],
            },
        };
        assert_eq!(WormholePayload::decode(&payload.encode()).unwrap(), payload);
        assert!(WormholePayload::decode(&[0u8; 10]).is_err());
    }

    #[test]
    fn test_consistency_levels() {
        assert_eq!(ConsistencyLevel::try_from(1).unwrap(), ConsistencyLevel::Confirmed);
        assert!(ConsistencyLevel::try_from(5).is_err());
    }
}
