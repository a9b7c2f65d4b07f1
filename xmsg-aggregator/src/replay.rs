//! Destination-side replay protection and passive-mode attestations

use std::collections::{BTreeSet, HashMap};

use crate::error::GatewayError;
use crate::types::{DeliveryId, Digest};

/// Append-only set of transport delivery ids already accepted
#[derive(Debug, Clone, Default)]
pub struct ExecutedSet {
    ids: BTreeSet<DeliveryId>,
}

impl ExecutedSet {
    pub fn contains(&self, id: &DeliveryId) -> bool {
        self.ids.contains(id)
    }

    /// Returns false if the id was already present
    pub fn insert(&mut self, id: DeliveryId) -> bool {
        self.ids.insert(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[derive(Debug, Clone)]
struct Attestation {
    digest: Digest,
    consumed: bool,
}

/// Messages attested by a passive gateway, awaiting validation
#[derive(Debug, Clone, Default)]
pub struct PassiveInbox {
    attestations: HashMap<DeliveryId, Attestation>,
}

impl PassiveInbox {
    pub fn attest(&mut self, id: DeliveryId, digest: Digest) {
        self.attestations.entry(id).or_insert(Attestation {
            digest,
            consumed: false,
        });
    }

    /// Consume the attestation for `id` if it matches `digest`
    pub fn consume(&mut self, id: &DeliveryId, digest: &Digest) -> Result<(), GatewayError> {
        let attestation = self
            .attestations
            .get_mut(id)
            .filter(|a| a.digest == *digest)
            .ok_or(GatewayError::NotAttested)?;

        if attestation.consumed {
            return Err(GatewayError::AlreadyConsumed);
        }
        attestation.consumed = true;
        Ok(())
    }

    pub fn pending(&self) -> usize {
        self.attestations.values().filter(|a| !a.consumed).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_executed_set_is_idempotent() {
        let mut set = ExecutedSet::default();
        assert!(set.insert(DeliveryId(vec![1])));
        assert!(!set.insert(DeliveryId(vec![1])));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_passive_inbox_consumes_once() {
        let mut inbox = PassiveInbox::default();
        let id = DeliveryId(vec![9]);
        let digest = Digest::keccak(&[b"message"]);
        inbox.attest(id.clone(), digest);

        assert_eq!(
            inbox.consume(&id, &Digest::keccak(&[b"other"])),
            Err(GatewayError::NotAttested)
        );
        assert_eq!(inbox.consume(&id, &digest), Ok(()));
        assert_eq!(inbox.consume(&id, &digest), Err(GatewayError::AlreadyConsumed));
        assert_eq!(inbox.pending(), 0);
        assert_eq!(
            inbox.consume(&DeliveryId(vec![0]), &digest),
            Err(GatewayError::NotAttested)
        );
    }
}
