//! Axelar GMP identifiers and payload encoding
//!
//! The GMP payload is the shared ABI-encoded gateway payload. Axelar itself
//! identifies an approved call by its `commandId`, which destination adapters
//! use as the delivery id for replay protection.

use sha3::{Digest, Keccak256};

use xmsg_aggregator::codec::{decode_gateway_payload, encode_gateway_payload, GatewayPayload};
use xmsg_aggregator::{CodecError, GatewayId, SendId};

pub fn encode_gmp_payload(payload: &GatewayPayload) -> Vec<u8> {
    encode_gateway_payload(payload)
}

pub fn decode_gmp_payload(bytes: &[u8]) -> Result<GatewayPayload, CodecError> {
    decode_gateway_payload(bytes)
}

/// `keccak256(payload)`, the hash Axelar approves on the destination gateway
pub fn payload_hash(payload: &[u8]) -> [u8; 32] {
    Keccak256::digest(payload).into()
}

/// GMP message id for a send, in Axelar's `<hash>-<index>` form
pub fn message_id(gateway: &GatewayId, send_id: SendId) -> String {
    let tx_hash = Keccak256::digest(gateway.as_str().as_bytes());
    format!("0x{}-{}", hex::encode(tx_hash), send_id.0)
}

/// `keccak256(source_chain ‖ "_" ‖ message_id)`
pub fn command_id(source_chain: &str, message_id: &str) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(source_chain.as_bytes());
    hasher.update(b"_");
    hasher.update(message_id.as_bytes());
    hasher.finalize().into()
}

/// Convert a hex string to bytes32
pub fn hex_to_bytes32(value: &str) -> Result<[u8; 32], CodecError> {
    let stripped = value.strip_prefix("0x").unwrap_or(value);
    let bytes =
        hex::decode(stripped).map_err(|e| CodecError::Decoding(format!("invalid hex: {e}")))?;

    if bytes.len() != 32 {
        return Err(CodecError::Decoding(format!(
            "expected 32 bytes, got {}",
            bytes.len()
        )));
    }

    let mut result = [0u8; 32];
    result.copy_from_slice(&bytes);
    Ok(result)
}

pub fn bytes32_to_hex(bytes: &[u8; 32]) -> String {
    format!("0x{}", hex::encode(bytes))
}
