//! Source and destination capabilities implemented by every gateway adapter
//!
//! Adapters are injected into the aggregator as `Box<dyn Gateway>`. Sending is
//! split in two phases so a fan-out over several gateways is all-or-nothing:
//! [`GatewaySource::prepare_send`] performs every fallible check without side
//! effects, and [`GatewaySource::commit_send`] cannot fail.

use std::collections::BTreeSet;
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::adapter::GatewayCore;
use crate::error::GatewayError;
use crate::lifecycle::{PendingSend, RelayRequest};
use crate::types::{hex_bytes, Account, Attribute, DeliveryId, GatewayId, GatewayMessage, InteropAddress, SendId};

// ═══════════════════════════════════════════════════════════════════════════════
// SOURCE SIDE
// ═══════════════════════════════════════════════════════════════════════════════

/// Gateway-level send request. `destination` is always the peer aggregator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendRequest {
    pub sender: Account,
    pub destination: InteropAddress,
    #[serde(with = "hex_bytes")]
    pub payload: Vec<u8>,
    pub attributes: Vec<Attribute>,
}

/// A validated send, ready to be committed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedSend {
    pub request: SendRequest,
    /// Destination chain in the transport's naming
    pub transport_chain: String,
    /// Transport wire payload
    pub wire: Vec<u8>,
}

pub trait GatewaySource {
    fn id(&self) -> &GatewayId;

    fn supports_attribute(&self, key: &str) -> bool;

    /// Validate a send without touching any state
    fn prepare_send(&self, request: &SendRequest) -> Result<PreparedSend, GatewayError>;

    /// Record a prepared send
    fn commit_send(&mut self, prepared: PreparedSend) -> SendId;

    /// Finance (or re-finance) the transport hand-off of a send.
    /// Returns the new transport handle.
    fn request_relay(&mut self, send_id: SendId, request: RelayRequest) -> Result<String, GatewayError>;

    /// The delivery a relayer would carry to the destination chain, once the
    /// send is far enough along its lifecycle to be picked up
    fn outbound_delivery(&self, send_id: SendId) -> Option<Delivery>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// DESTINATION SIDE
// ═══════════════════════════════════════════════════════════════════════════════

/// A raw transport delivery as handed to the destination adapter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delivery {
    /// Transport-level id (Axelar command id, Wormhole VAA hash, ...)
    pub delivery_id: DeliveryId,
    /// Origin chain in the transport's naming
    pub source_chain: String,
    /// Origin address as reported by the transport
    pub source_address: String,
    #[serde(with = "hex_bytes")]
    pub body: Vec<u8>,
}

/// What a destination adapter did with a delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// Authenticated; forward to the aggregator
    Forward(GatewayMessage),
    /// Already accepted once; absorbed
    Replayed(DeliveryId),
    /// Stored for passive validation
    Attested(DeliveryId),
}

/// How authenticated deliveries are handed on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InboundMode {
    #[default]
    Active,
    Passive,
}

pub trait GatewayDestination {
    /// Authenticate a delivery against the transport and replay set
    fn receive(&mut self, delivery: &Delivery) -> Result<Inbound, GatewayError>;

    /// Passive mode: assert that `message` was attested in `delivery_id` and
    /// consume the attestation
    fn validate_received_message(
        &mut self,
        delivery_id: &DeliveryId,
        message: &GatewayMessage,
    ) -> Result<(), GatewayError>;
}

/// Transport proof checking (guardian signatures, gateway approvals, ...)
pub trait DeliveryVerifier: Send + Sync {
    fn verify(&self, delivery: &Delivery) -> bool;
}

/// Accepts every delivery; origin is still checked against the remote gateway table
#[derive(Debug, Clone, Copy, Default)]
pub struct TrustTransport;

impl DeliveryVerifier for TrustTransport {
    fn verify(&self, _delivery: &Delivery) -> bool {
        true
    }
}

/// Accepts only deliveries whose id has been approved out of band.
///
/// Clones share one approval set, so a handle kept outside the adapter can
/// approve ids after the verifier has been installed.
#[derive(Debug, Clone, Default)]
pub struct ApprovedDeliveries {
    approved: Arc<RwLock<BTreeSet<DeliveryId>>>,
}

impl ApprovedDeliveries {
    /// Returns `false` if `id` was already approved
    pub fn approve(&self, id: DeliveryId) -> bool {
        self.approved
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id)
    }

    pub fn is_approved(&self, id: &DeliveryId) -> bool {
        self.approved
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(id)
    }

    pub fn len(&self) -> usize {
        self.approved.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DeliveryVerifier for ApprovedDeliveries {
    fn verify(&self, delivery: &Delivery) -> bool {
        self.is_approved(&delivery.delivery_id)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// GATEWAY
// ═══════════════════════════════════════════════════════════════════════════════

/// A complete adapter: both sides plus access to the shared state machine
pub trait Gateway: GatewaySource + GatewayDestination + Send + Sync {
    /// Short transport name (`axelar`, `wormhole`, ...)
    fn transport(&self) -> &'static str;

    fn core(&self) -> &GatewayCore;

    fn core_mut(&mut self) -> &mut GatewayCore;

    fn pending_send(&self, send_id: SendId) -> Option<&PendingSend> {
        self.core().pending(send_id)
    }

    /// Expire sends older than the relay window
    fn expire_stale(&mut self, now: u64) -> Vec<SendId> {
        self.core_mut().expire_stale(now)
    }
}
