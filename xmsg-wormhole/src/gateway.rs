//! Wormhole-backed gateway adapter
//!
//! Source side: publishing a message posts it immediately; the guardian
//! network observes it under `(chain, emitter, sequence)`. Relay requests
//! model a delivery provider: each paid attempt yields a new delivery hash.
//!
//! Destination side: a delivery carries the VAA body. Its double-keccak
//! digest is the delivery id, the emitter must be the registered remote
//! gateway for the emitter chain and the payload must target this emitter.
//! Remote gateways are registered by their 32-byte emitter address.

use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use tracing::debug;

use xmsg_aggregator::codec::GatewayPayload;
use xmsg_aggregator::types::find_attribute;
use xmsg_aggregator::{
    Account, AdminAction, ChainId, CodecError, Delivery, DeliveryId, DeliveryVerifier, Event,
    Gateway, GatewayCore, GatewayDestination, GatewayError, GatewayId, GatewayMessage,
    GatewaySource, Inbound, LifecycleConfig, PendingSend, PreparedSend, RelayRequest, RelayState, SendId,
    SendRequest, TrustTransport, ATTR_CONSISTENCY_LEVEL, ATTR_GAS_LIMIT,
};

use crate::chains::ChainEquivalence;
use crate::vaa::{emitter_address, ConsistencyLevel, VaaBody, WormholePayload};

const SUPPORTED_ATTRIBUTES: &[&str] = &[ATTR_GAS_LIMIT, ATTR_CONSISTENCY_LEVEL];

// ═══════════════════════════════════════════════════════════════════════════════
// CONFIGURATION
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WormholeConfig {
    /// Used when a send carries no `consistencyLevel` attribute
    pub default_consistency: u8,
    /// Nonce stamped on every published body
    pub nonce: u32,
    pub lifecycle: LifecycleConfig,
}

impl Default for WormholeConfig {
    fn default() -> Self {
        Self {
            default_consistency: ConsistencyLevel::Finalized as u8,
            nonce: 0,
            lifecycle: LifecycleConfig::default(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ADAPTER
// ═══════════════════════════════════════════════════════════════════════════════

pub struct WormholeGateway {
    core: GatewayCore,
    config: WormholeConfig,
    /// Local chain in Wormhole numbering
    chain_id: u16,
    emitter: [u8; 32],
    equivalence: ChainEquivalence,
    verifier: Box<dyn DeliveryVerifier>,
}

impl WormholeGateway {
    pub fn new(
        id: impl Into<GatewayId>,
        local_chain: &ChainId,
        owner: impl Into<Account>,
    ) -> Result<Self, GatewayError> {
        Self::with_config(id, local_chain, owner, WormholeConfig::default())
    }

    pub fn with_config(
        id: impl Into<GatewayId>,
        local_chain: &ChainId,
        owner: impl Into<Account>,
        config: WormholeConfig,
    ) -> Result<Self, GatewayError> {
        ConsistencyLevel::try_from(config.default_consistency)?;

        let equivalence = ChainEquivalence::default();
        let chain_id = equivalence
            .to_wormhole(local_chain)
            .ok_or_else(|| GatewayError::UnknownChain(local_chain.clone()))?;
        let id = id.into();

        Ok(Self {
            emitter: emitter_address(&id),
            core: GatewayCore::new(id, owner.into(), config.lifecycle.clone()),
            config,
            chain_id,
            equivalence,
            verifier: Box::new(TrustTransport),
        })
    }

    /// Check guardian signatures with `verifier` instead of trusting the transport
    pub fn with_verifier(mut self, verifier: impl DeliveryVerifier + 'static) -> Self {
        self.verifier = Box::new(verifier);
        self
    }

    pub fn chain_id(&self) -> u16 {
        self.chain_id
    }

    pub fn emitter(&self) -> [u8; 32] {
        self.emitter
    }

    pub fn config(&self) -> &WormholeConfig {
        &self.config
    }

    /// Map an additional CAIP-2 chain to a Wormhole chain id (write-once)
    pub fn register_chain_equivalence(
        &mut self,
        caller: &Account,
        chain: ChainId,
        chain_id: u16,
    ) -> Result<(), GatewayError> {
        self.core.authorize(caller, AdminAction::RegisterChainEquivalence)?;
        self.equivalence.register(chain.clone(), chain_id)?;
        let gateway = self.core.id().clone();
        self.core.emit(Event::ChainEquivalenceRegistered {
            gateway,
            chain,
            transport_chain: chain_id.to_string(),
        });
        Ok(())
    }

    /// VAA body published for one of this adapter's sends
    pub fn vaa_body(&self, send_id: SendId) -> Option<VaaBody> {
        self.core
            .pending(send_id)
            .map(|pending| self.body_for(pending))
    }

    fn body_for(&self, pending: &PendingSend) -> VaaBody {
        let consistency_level = find_attribute(&pending.attributes, ATTR_CONSISTENCY_LEVEL)
            .and_then(|a| a.value.first().copied())
            .unwrap_or(self.config.default_consistency);

        VaaBody {
            timestamp: u32::try_from(pending.created_at).unwrap_or(u32::MAX),
            nonce: self.config.nonce,
            emitter_chain: self.chain_id,
            emitter_address: self.emitter,
            sequence: pending.send_id.0,
            consistency_level,
            payload: pending.wire.clone(),
        }
    }

    fn target_emitter(&self, chain: &ChainId) -> Result<[u8; 32], GatewayError> {
        let registered = self.core.require_remote_gateway(chain)?;
        let bytes = hex::decode(registered.trim_start_matches("0x"))
            .map_err(|_| GatewayError::InvalidAddress(registered.to_string()))?;
        <[u8; 32]>::try_from(bytes.as_slice())
            .map_err(|_| GatewayError::InvalidAddress(registered.to_string()))
    }
}

fn check_consistency(request: &SendRequest) -> Result<(), GatewayError> {
    let Some(attribute) = find_attribute(&request.attributes, ATTR_CONSISTENCY_LEVEL) else {
        return Ok(());
    };
    match attribute.value.as_slice() {
        [level] => {
            ConsistencyLevel::try_from(*level)?;
            Ok(())
        }
        other => Err(CodecError::Decoding(format!(
            "consistencyLevel must be one byte, got {}",
            other.len()
        ))
        .into()),
    }
}

impl GatewaySource for WormholeGateway {
    fn id(&self) -> &GatewayId {
        self.core.id()
    }

    fn supports_attribute(&self, key: &str) -> bool {
        SUPPORTED_ATTRIBUTES.contains(&key)
    }

    fn prepare_send(&self, request: &SendRequest) -> Result<PreparedSend, GatewayError> {
        self.core
            .check_attributes(&request.attributes, SUPPORTED_ATTRIBUTES)?;
        check_consistency(request)?;
        self.core.check_payload(&request.payload)?;

        let target_chain = self
            .equivalence
            .to_wormhole(&request.destination.chain)
            .ok_or_else(|| GatewayError::UnknownChain(request.destination.chain.clone()))?;
        let target_emitter = self.target_emitter(&request.destination.chain)?;

        let wire = WormholePayload {
            target_chain,
            target_emitter,
            message: GatewayPayload {
                sender: request.sender.clone(),
                recipient: request.destination.account.clone(),
                payload: request.payload.clone(),
                attributes: request.attributes.clone(),
            },
        }
        .encode();

        Ok(PreparedSend {
            request: request.clone(),
            transport_chain: target_chain.to_string(),
            wire,
        })
    }

    fn commit_send(&mut self, prepared: PreparedSend) -> SendId {
        let send_id = self.core.commit(prepared);
        let handle = format!("{}/{}/{}", self.chain_id, hex::encode(self.emitter), send_id.0);
        self.core.post(send_id, handle);
        send_id
    }

    fn request_relay(&mut self, send_id: SendId, request: RelayRequest) -> Result<String, GatewayError> {
        let gas_budget = request.gas_budget;
        let vaa_hash = self
            .vaa_body(send_id)
            .map(|body| body.digest())
            .ok_or(GatewayError::UnknownSend(send_id))?;

        self.core.relay_with(send_id, request, |_, attempt| {
            debug!(%send_id, attempt, gas_budget, "requesting wormhole delivery");

            let mut hasher = Keccak256::new();
            hasher.update(vaa_hash);
            hasher.update(attempt.to_be_bytes());
            hasher.update(gas_budget.to_be_bytes());
            format!("0x{}", hex::encode(hasher.finalize()))
        })
    }

    fn outbound_delivery(&self, send_id: SendId) -> Option<Delivery> {
        let pending = self.core.pending(send_id)?;
        if !matches!(pending.state, RelayState::Posted { .. } | RelayState::Relayed { .. }) {
            return None;
        }
        let body = self.body_for(pending);
        Some(Delivery {
            delivery_id: DeliveryId(body.digest().to_vec()),
            source_chain: self.chain_id.to_string(),
            source_address: format!("0x{}", hex::encode(self.emitter)),
            body: body.serialize(),
        })
    }
}

impl GatewayDestination for WormholeGateway {
    fn receive(&mut self, delivery: &Delivery) -> Result<Inbound, GatewayError> {
        let body = VaaBody::parse(&delivery.body).map_err(|e| self.core.reject(e.into()))?;

        if delivery.delivery_id.0 != body.digest() {
            return Err(self.core.reject(GatewayError::VerificationFailed(format!(
                "delivery id {} does not match vaa hash",
                delivery.delivery_id
            ))));
        }

        let Some(origin) = self.equivalence.from_wormhole(body.emitter_chain) else {
            return Err(self
                .core
                .reject(GatewayError::UnknownTransportChain(body.emitter_chain.to_string())));
        };

        let payload = WormholePayload::decode(&body.payload).map_err(|e| self.core.reject(e.into()))?;
        if payload.target_chain != self.chain_id || payload.target_emitter != self.emitter {
            return Err(self.core.reject(GatewayError::Misdirected(format!(
                "{}/{}",
                payload.target_chain,
                hex::encode(payload.target_emitter)
            ))));
        }

        let message = GatewayMessage {
            delivery_id: delivery.delivery_id.clone(),
            source_chain: origin.clone(),
            sender: payload.message.sender,
            recipient: payload.message.recipient,
            payload: payload.message.payload,
            attributes: payload.message.attributes,
        };

        let emitter = format!("0x{}", hex::encode(body.emitter_address));
        let verifier = &self.verifier;
        self.core
            .accept(&origin, &emitter, || verifier.verify(delivery), message)
    }

    fn validate_received_message(
        &mut self,
        delivery_id: &DeliveryId,
        message: &GatewayMessage,
    ) -> Result<(), GatewayError> {
        self.core.validate(delivery_id, message)
    }
}

impl Gateway for WormholeGateway {
    fn transport(&self) -> &'static str {
        crate::TRANSPORT
    }

    fn core(&self) -> &GatewayCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut GatewayCore {
        &mut self.core
    }
}
