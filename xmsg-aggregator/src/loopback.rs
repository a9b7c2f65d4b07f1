//! In-process gateway adapter
//!
//! Carries gateway payloads between aggregators without an external network.
//! Chains are named by their CAIP-2 id, sends are posted immediately and the
//! remote gateway address is the peer adapter's id. Used by the rail for
//! local deployments and by the test suites.

use crate::adapter::{GatewayCore, LifecycleConfig};
use crate::codec::{
    decode_gateway_payload, decode_sequenced, encode_gateway_payload, encode_sequenced, GatewayPayload,
};
use crate::error::GatewayError;
use crate::gateway::{
    Delivery, DeliveryVerifier, Gateway, GatewayDestination, GatewaySource, Inbound, PreparedSend,
    SendRequest, TrustTransport,
};
use crate::lifecycle::{RelayRequest, RelayState};
use crate::types::{Account, ChainId, DeliveryId, Digest, GatewayId, GatewayMessage, SendId};

pub struct LoopbackGateway {
    core: GatewayCore,
    chain: ChainId,
    supported: Vec<String>,
    verifier: Box<dyn DeliveryVerifier>,
}

impl LoopbackGateway {
    pub fn new(id: impl Into<GatewayId>, chain: ChainId, owner: impl Into<Account>) -> Self {
        Self::with_config(id, chain, owner, LifecycleConfig::default())
    }

    pub fn with_config(
        id: impl Into<GatewayId>,
        chain: ChainId,
        owner: impl Into<Account>,
        config: LifecycleConfig,
    ) -> Self {
        Self {
            core: GatewayCore::new(id.into(), owner.into(), config),
            chain,
            supported: Vec::new(),
            verifier: Box::new(TrustTransport),
        }
    }

    /// Declare an attribute key this gateway honours
    pub fn supporting(mut self, key: &str) -> Self {
        self.supported.push(key.to_string());
        self
    }

    pub fn with_verifier(mut self, verifier: impl DeliveryVerifier + 'static) -> Self {
        self.verifier = Box::new(verifier);
        self
    }

    /// Register the peer adapter on `chain` as this gateway's counterpart
    pub fn with_remote_gateway(mut self, chain: ChainId, peer: &GatewayId) -> Result<Self, GatewayError> {
        let owner = self.core.owner().clone();
        self.core.register_remote_gateway(&owner, chain, peer.as_str())?;
        Ok(self)
    }

    fn delivery_id(&self, send_id: SendId) -> DeliveryId {
        delivery_id(&self.chain, self.core.id().as_str(), send_id)
    }
}

/// `keccak(chain ‖ gateway ‖ send_id)`
fn delivery_id(chain: &ChainId, gateway: &str, send_id: SendId) -> DeliveryId {
    let digest = Digest::keccak(&[
        chain.as_str().as_bytes(),
        gateway.as_bytes(),
        &send_id.0.to_be_bytes(),
    ]);
    DeliveryId(digest.0.to_vec())
}

impl GatewaySource for LoopbackGateway {
    fn id(&self) -> &GatewayId {
        self.core.id()
    }

    fn supports_attribute(&self, key: &str) -> bool {
        self.supported.iter().any(|k| k == key)
    }

    fn prepare_send(&self, request: &SendRequest) -> Result<PreparedSend, GatewayError> {
        let supported: Vec<&str> = self.supported.iter().map(String::as_str).collect();
        self.core.check_attributes(&request.attributes, &supported)?;
        self.core.check_payload(&request.payload)?;
        self.core.require_remote_gateway(&request.destination.chain)?;

        let wire = encode_gateway_payload(&GatewayPayload {
            sender: request.sender.clone(),
            recipient: request.destination.account.clone(),
            payload: request.payload.clone(),
            attributes: request.attributes.clone(),
        });

        Ok(PreparedSend {
            request: request.clone(),
            transport_chain: request.destination.chain.to_string(),
            wire,
        })
    }

    fn commit_send(&mut self, prepared: PreparedSend) -> SendId {
        let send_id = self.core.commit(prepared);
        let handle = self.delivery_id(send_id).to_string();
        self.core.post(send_id, handle);
        send_id
    }

    fn request_relay(&mut self, send_id: SendId, request: RelayRequest) -> Result<String, GatewayError> {
        let gateway = self.core.id().clone();
        self.core.relay_with(send_id, request, |pending, attempt| {
            Digest::keccak(&[
                gateway.as_str().as_bytes(),
                &pending.send_id.0.to_be_bytes(),
                &attempt.to_be_bytes(),
            ])
            .to_string()
        })
    }

    fn outbound_delivery(&self, send_id: SendId) -> Option<Delivery> {
        let pending = self.core.pending(send_id)?;
        if matches!(pending.state, RelayState::Created | RelayState::Expired) {
            return None;
        }
        Some(Delivery {
            delivery_id: self.delivery_id(send_id),
            source_chain: self.chain.to_string(),
            source_address: self.core.id().to_string(),
            body: encode_sequenced(send_id, &pending.wire),
        })
    }
}

impl GatewayDestination for LoopbackGateway {
    fn receive(&mut self, delivery: &Delivery) -> Result<Inbound, GatewayError> {
        let origin = ChainId::parse(&delivery.source_chain)
            .map_err(|_| self.core.reject(GatewayError::UnknownTransportChain(delivery.source_chain.clone())))?;
        let (send_id, wire) = decode_sequenced(&delivery.body).map_err(|e| self.core.reject(e.into()))?;
        if delivery.delivery_id != delivery_id(&origin, &delivery.source_address, send_id) {
            return Err(self.core.reject(GatewayError::VerificationFailed(format!(
                "delivery id {} does not match send {send_id}",
                delivery.delivery_id
            ))));
        }
        let payload = decode_gateway_payload(&wire).map_err(|e| self.core.reject(e.into()))?;

        let message = GatewayMessage {
            delivery_id: delivery.delivery_id.clone(),
            source_chain: origin.clone(),
            sender: payload.sender,
            recipient: payload.recipient,
            payload: payload.payload,
            attributes: payload.attributes,
        };

        let verifier = &self.verifier;
        self.core.accept(
            &origin,
            &delivery.source_address,
            || verifier.verify(delivery),
            message,
        )
    }

    fn validate_received_message(
        &mut self,
        delivery_id: &DeliveryId,
        message: &GatewayMessage,
    ) -> Result<(), GatewayError> {
        self.core.validate(delivery_id, message)
    }
}

impl Gateway for LoopbackGateway {
    fn transport(&self) -> &'static str {
        "loopback"
    }

    fn core(&self) -> &GatewayCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut GatewayCore {
        &mut self.core
    }
}
