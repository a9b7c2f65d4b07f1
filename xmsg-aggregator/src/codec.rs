//! ABI-style encoding for envelopes and gateway payloads
//!
//! Layout follows Solidity ABI conventions: a head of 32-byte words holding
//! static values (right-aligned) and offsets to dynamic sections, followed by
//! length-prefixed, zero-padded dynamic sections.

use crate::error::CodecError;
use crate::types::{Account, Attribute, Digest, Envelope, GatewayMessage, MessageId, SendId};

const WORD: usize = 32;

/// Encode a u64 as a right-aligned 32-byte word
pub fn word(value: u64) -> [u8; WORD] {
    let mut bytes = [0u8; WORD];
    bytes[24..].copy_from_slice(&value.to_be_bytes());
    bytes
}

fn padding(len: usize) -> usize {
    (WORD - len % WORD) % WORD
}

/// Encode static words followed by dynamic byte sections
pub fn encode(statics: &[u64], dynamics: &[&[u8]]) -> Vec<u8> {
    let head_len = (statics.len() + dynamics.len()) * WORD;
    let mut head = Vec::with_capacity(head_len);
    let mut tail = Vec::new();

    for value in statics {
        head.extend_from_slice(&word(*value));
    }

    for section in dynamics {
        head.extend_from_slice(&word((head_len + tail.len()) as u64));
        tail.extend_from_slice(&word(section.len() as u64));
        tail.extend_from_slice(section);
        tail.resize(tail.len() + padding(section.len()), 0);
    }

    head.extend_from_slice(&tail);
    head
}

fn read_word(bytes: &[u8], offset: usize) -> Result<u64, CodecError> {
    let end = offset
        .checked_add(WORD)
        .filter(|end| *end <= bytes.len())
        .ok_or_else(|| {
            CodecError::Decoding(format!(
                "word at offset {} exceeds payload of {} bytes",
                offset,
                bytes.len()
            ))
        })?;

    let slot = &bytes[offset..end];
    if slot[..24].iter().any(|b| *b != 0) {
        return Err(CodecError::Decoding(format!(
            "value at offset {offset} does not fit in 64 bits"
        )));
    }

    let mut value = [0u8; 8];
    value.copy_from_slice(&slot[24..]);
    Ok(u64::from_be_bytes(value))
}

fn read_section(bytes: &[u8], offset: u64) -> Result<Vec<u8>, CodecError> {
    let offset = usize::try_from(offset)
        .map_err(|_| CodecError::Decoding(format!("offset {offset} out of range")))?;
    let len = read_word(bytes, offset)?;
    let len = usize::try_from(len)
        .map_err(|_| CodecError::Decoding(format!("length {len} out of range")))?;
    let start = offset + WORD;

    start
        .checked_add(len)
        .filter(|end| *end <= bytes.len())
        .map(|end| bytes[start..end].to_vec())
        .ok_or_else(|| {
            CodecError::Decoding(format!(
                "section of {} bytes at offset {} exceeds payload of {} bytes",
                len,
                offset,
                bytes.len()
            ))
        })
}

/// Decode a buffer produced by [`encode`] with the given shape
pub fn decode(
    bytes: &[u8],
    statics: usize,
    dynamics: usize,
) -> Result<(Vec<u64>, Vec<Vec<u8>>), CodecError> {
    let head_len = (statics + dynamics)
        .checked_mul(WORD)
        .ok_or_else(|| CodecError::Decoding("head size overflow".into()))?;
    if bytes.len() < head_len {
        return Err(CodecError::Decoding(format!(
            "payload too short: {} < {}",
            bytes.len(),
            head_len
        )));
    }

    let values = (0..statics)
        .map(|i| read_word(bytes, i * WORD))
        .collect::<Result<Vec<_>, _>>()?;

    let sections = (statics..statics + dynamics)
        .map(|i| read_word(bytes, i * WORD).and_then(|offset| read_section(bytes, offset)))
        .collect::<Result<Vec<_>, _>>()?;

    Ok((values, sections))
}

fn utf8(bytes: Vec<u8>, field: &str) -> Result<String, CodecError> {
    String::from_utf8(bytes).map_err(|_| CodecError::Decoding(format!("{field} is not valid UTF-8")))
}

// ═══════════════════════════════════════════════════════════════════════════════
// ENVELOPE
// ═══════════════════════════════════════════════════════════════════════════════

/// Encode an aggregator envelope.
///
/// Layout: `uint64 id | offset(sender) | offset(recipient) | offset(payload)`
pub fn encode_envelope(envelope: &Envelope) -> Vec<u8> {
    encode(
        &[envelope.id.0],
        &[
            envelope.sender.as_bytes(),
            envelope.recipient.as_bytes(),
            &envelope.payload,
        ],
    )
}

/// Decode an aggregator envelope
pub fn decode_envelope(bytes: &[u8]) -> Result<Envelope, CodecError> {
    let (values, mut sections) = decode(bytes, 1, 3)?;
    let payload = sections.pop().unwrap_or_default();
    let recipient = utf8(sections.pop().unwrap_or_default(), "recipient")?;
    let sender = utf8(sections.pop().unwrap_or_default(), "sender")?;

    Ok(Envelope {
        id: MessageId(values[0]),
        sender: Account::new(sender),
        recipient: Account::new(recipient),
        payload,
    })
}

// ═══════════════════════════════════════════════════════════════════════════════
// ATTRIBUTES
// ═══════════════════════════════════════════════════════════════════════════════

/// Encode an ordered attribute list as `uint64 count | key_0 | value_0 | ...`
pub fn encode_attributes(attributes: &[Attribute]) -> Vec<u8> {
    let sections: Vec<&[u8]> = attributes
        .iter()
        .flat_map(|a| [a.key.as_bytes(), a.value.as_slice()])
        .collect();
    encode(&[attributes.len() as u64], &sections)
}

/// Decode an attribute list
pub fn decode_attributes(bytes: &[u8]) -> Result<Vec<Attribute>, CodecError> {
    let count = read_word(bytes, 0)?;
    // Each attribute needs at least two head words; reject counts the buffer cannot hold
    let count = usize::try_from(count)
        .ok()
        .filter(|c| c.saturating_mul(2 * WORD) <= bytes.len())
        .ok_or_else(|| CodecError::Decoding(format!("attribute count {count} exceeds payload")))?;

    let (_, sections) = decode(bytes, 1, count * 2)?;
    let mut attributes = Vec::with_capacity(count);
    let mut iter = sections.into_iter();
    while let (Some(key), Some(value)) = (iter.next(), iter.next()) {
        attributes.push(Attribute {
            key: utf8(key, "attribute key")?,
            value,
        });
    }
    Ok(attributes)
}

// ═══════════════════════════════════════════════════════════════════════════════
// GATEWAY PAYLOAD
// ═══════════════════════════════════════════════════════════════════════════════

/// Gateway-level message as carried over a transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayPayload {
    pub sender: Account,
    pub recipient: Account,
    pub payload: Vec<u8>,
    pub attributes: Vec<Attribute>,
}

/// Encode a gateway payload.
///
/// Layout: `offset(sender) | offset(recipient) | offset(payload) | offset(attributes)`
pub fn encode_gateway_payload(message: &GatewayPayload) -> Vec<u8> {
    let attributes = encode_attributes(&message.attributes);
    encode(
        &[],
        &[
            message.sender.as_bytes(),
            message.recipient.as_bytes(),
            &message.payload,
            &attributes,
        ],
    )
}

/// Decode a gateway payload
pub fn decode_gateway_payload(bytes: &[u8]) -> Result<GatewayPayload, CodecError> {
    let (_, mut sections) = decode(bytes, 0, 4)?;
    let attributes = decode_attributes(&sections.pop().unwrap_or_default())?;
    let payload = sections.pop().unwrap_or_default();
    let recipient = utf8(sections.pop().unwrap_or_default(), "recipient")?;
    let sender = utf8(sections.pop().unwrap_or_default(), "sender")?;

    Ok(GatewayPayload {
        sender: Account::new(sender),
        recipient: Account::new(recipient),
        payload,
        attributes,
    })
}

/// Frame a gateway payload with the source send id it was committed under.
///
/// Layout: `send_id | offset(wire)`. Destinations recompute the transport
/// delivery id from the send id, so a body cannot be replayed under a fresh id.
pub fn encode_sequenced(send_id: SendId, wire: &[u8]) -> Vec<u8> {
    encode(&[send_id.0], &[wire])
}

pub fn decode_sequenced(bytes: &[u8]) -> Result<(SendId, Vec<u8>), CodecError> {
    let (values, mut sections) = decode(bytes, 1, 1)?;
    let send_id = values.first().copied().unwrap_or_default();
    Ok((SendId(send_id), sections.pop().unwrap_or_default()))
}

/// Digest identifying a "matching copy" of an aggregator message.
///
/// Two deliveries match when both the envelope bytes and the attributes agree.
pub fn copy_digest(payload: &[u8], attributes: &[Attribute]) -> Digest {
    Digest::keccak(&[payload, &encode_attributes(attributes)])
}

/// Digest binding a gateway message to the delivery it arrived in
pub fn gateway_message_digest(message: &GatewayMessage) -> Digest {
    Digest::keccak(&[
        &message.delivery_id.0,
        message.source_chain.as_str().as_bytes(),
        message.sender.as_bytes(),
        message.recipient.as_bytes(),
        &message.payload,
        &encode_attributes(&message.attributes),
    ])
}
