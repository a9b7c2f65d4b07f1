//! Axelar-backed gateway adapter
//!
//! Source side: `callContract` records the send as `Created`; relayers only
//! pick it up once gas has been paid to the gas service, which is what
//! `request_relay` models. Re-paying with a larger budget (`addGas`) produces a
//! new handle for the same send.
//!
//! Destination side: deliveries are identified by their Axelar `commandId`,
//! recomputed from the origin chain and the message id carried in the body.
//! The origin chain name is translated back to CAIP-2 and the source address
//! must be the registered remote gateway for that chain.

use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use tracing::debug;

use xmsg_aggregator::codec::{decode_sequenced, encode_sequenced, GatewayPayload};
use xmsg_aggregator::{
    Account, AdminAction, ChainId, Delivery, DeliveryId, DeliveryVerifier, Event, Gateway,
    GatewayCore, GatewayDestination, GatewayError, GatewayId, GatewayMessage, GatewaySource,
    Inbound, LifecycleConfig, PreparedSend, RelayRequest, RelayState, SendId, SendRequest,
    TrustTransport, ATTR_GAS_LIMIT,
};

use crate::chains::{self, ChainEquivalence};
use crate::encoding::{command_id, decode_gmp_payload, encode_gmp_payload, message_id, payload_hash};

const SUPPORTED_ATTRIBUTES: &[&str] = &[ATTR_GAS_LIMIT];

// ═══════════════════════════════════════════════════════════════════════════════
// CONFIGURATION
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AxelarConfig {
    /// Axelar gateway contract on the local chain
    pub gateway_contract: Option<String>,
    /// Gas service contract on the local chain
    pub gas_service: String,
    pub lifecycle: LifecycleConfig,
}

impl Default for AxelarConfig {
    fn default() -> Self {
        Self {
            gateway_contract: None,
            gas_service: chains::GAS_SERVICE.to_string(),
            lifecycle: LifecycleConfig::default(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ADAPTER
// ═══════════════════════════════════════════════════════════════════════════════

pub struct AxelarGateway {
    core: GatewayCore,
    config: AxelarConfig,
    /// Local chain in Axelar naming
    chain_name: String,
    equivalence: ChainEquivalence,
    verifier: Box<dyn DeliveryVerifier>,
}

impl AxelarGateway {
    pub fn new(
        id: impl Into<GatewayId>,
        local_chain: &ChainId,
        owner: impl Into<Account>,
    ) -> Result<Self, GatewayError> {
        Self::with_config(id, local_chain, owner, AxelarConfig::default())
    }

    pub fn with_config(
        id: impl Into<GatewayId>,
        local_chain: &ChainId,
        owner: impl Into<Account>,
        mut config: AxelarConfig,
    ) -> Result<Self, GatewayError> {
        let equivalence = ChainEquivalence::default();
        let chain_name = equivalence
            .to_axelar(local_chain)
            .ok_or_else(|| GatewayError::UnknownChain(local_chain.clone()))?;

        if config.gateway_contract.is_none() {
            config.gateway_contract = chains::get_gateway_address(&chain_name).map(str::to_string);
        }

        Ok(Self {
            core: GatewayCore::new(id.into(), owner.into(), config.lifecycle.clone()),
            config,
            chain_name,
            equivalence,
            verifier: Box::new(TrustTransport),
        })
    }

    /// Check Axelar approvals with `verifier` instead of trusting the transport
    pub fn with_verifier(mut self, verifier: impl DeliveryVerifier + 'static) -> Self {
        self.verifier = Box::new(verifier);
        self
    }

    pub fn chain_name(&self) -> &str {
        &self.chain_name
    }

    pub fn config(&self) -> &AxelarConfig {
        &self.config
    }

    /// Map an additional CAIP-2 chain to an Axelar chain name (write-once)
    pub fn register_chain_equivalence(
        &mut self,
        caller: &Account,
        chain: ChainId,
        chain_name: &str,
    ) -> Result<(), GatewayError> {
        self.core.authorize(caller, AdminAction::RegisterChainEquivalence)?;
        self.equivalence.register(chain.clone(), chain_name)?;
        let gateway = self.core.id().clone();
        self.core.emit(Event::ChainEquivalenceRegistered {
            gateway,
            chain,
            transport_chain: chain_name.to_string(),
        });
        Ok(())
    }

    /// Axelar message id and command id of one of this adapter's sends
    pub fn command_id_for(&self, send_id: SendId) -> DeliveryId {
        let message_id = message_id(self.core.id(), send_id);
        DeliveryId(command_id(&self.chain_name, &message_id).to_vec())
    }
}

impl GatewaySource for AxelarGateway {
    fn id(&self) -> &GatewayId {
        self.core.id()
    }

    fn supports_attribute(&self, key: &str) -> bool {
        SUPPORTED_ATTRIBUTES.contains(&key)
    }

    fn prepare_send(&self, request: &SendRequest) -> Result<PreparedSend, GatewayError> {
        self.core
            .check_attributes(&request.attributes, SUPPORTED_ATTRIBUTES)?;
        self.core.check_payload(&request.payload)?;

        let destination_chain = self
            .equivalence
            .to_axelar(&request.destination.chain)
            .ok_or_else(|| GatewayError::UnknownChain(request.destination.chain.clone()))?;
        self.core.require_remote_gateway(&request.destination.chain)?;

        let wire = encode_gmp_payload(&GatewayPayload {
            sender: request.sender.clone(),
            recipient: request.destination.account.clone(),
            payload: request.payload.clone(),
            attributes: request.attributes.clone(),
        });

        Ok(PreparedSend {
            request: request.clone(),
            transport_chain: destination_chain,
            wire,
        })
    }

    fn commit_send(&mut self, prepared: PreparedSend) -> SendId {
        // Stays Created until gas is paid
        self.core.commit(prepared)
    }

    fn request_relay(&mut self, send_id: SendId, request: RelayRequest) -> Result<String, GatewayError> {
        let gas_service = self.config.gas_service.clone();
        let message_id = message_id(self.core.id(), send_id);

        self.core.relay_with(send_id, request, |pending, attempt| {
            let gas = match &pending.state {
                RelayState::Relayed { gas_budget, .. } => *gas_budget,
                _ => 0,
            };
            debug!(%send_id, attempt, previous_gas = gas, "paying axelar gas service");

            let mut hasher = Keccak256::new();
            hasher.update(gas_service.as_bytes());
            hasher.update(message_id.as_bytes());
            hasher.update(payload_hash(&pending.wire));
            hasher.update(attempt.to_be_bytes());
            format!("0x{}", hex::encode(hasher.finalize()))
        })
    }

    fn outbound_delivery(&self, send_id: SendId) -> Option<Delivery> {
        let pending = self.core.pending(send_id)?;
        if !matches!(pending.state, RelayState::Relayed { .. }) {
            return None;
        }
        Some(Delivery {
            delivery_id: self.command_id_for(send_id),
            source_chain: self.chain_name.clone(),
            source_address: self.core.id().to_string(),
            body: encode_sequenced(send_id, &pending.wire),
        })
    }
}

impl GatewayDestination for AxelarGateway {
    fn receive(&mut self, delivery: &Delivery) -> Result<Inbound, GatewayError> {
        let Some(origin) = self.equivalence.from_axelar(&delivery.source_chain) else {
            return Err(self
                .core
                .reject(GatewayError::UnknownTransportChain(delivery.source_chain.clone())));
        };
        let (send_id, wire) = decode_sequenced(&delivery.body).map_err(|e| self.core.reject(e.into()))?;
        let source_gateway = GatewayId::new(delivery.source_address.as_str());
        let expected = command_id(&delivery.source_chain, &message_id(&source_gateway, send_id));
        if delivery.delivery_id.0 != expected {
            return Err(self.core.reject(GatewayError::VerificationFailed(format!(
                "command id {} does not match message {send_id}",
                delivery.delivery_id
            ))));
        }
        let payload = decode_gmp_payload(&wire).map_err(|e| self.core.reject(e.into()))?;

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

impl Gateway for AxelarGateway {
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

#[cfg(test)]
mod tests {
    use super::*;
    use xmsg_aggregator::{ApprovedDeliveries, Attribute, InteropAddress};

    const OWNER: &str = "0xowner";
    const GATEWAY_ETH: &str = "0x1111111111111111111111111111111111111111";
    const GATEWAY_ARB: &str = "0x2222222222222222222222222222222222222222";

    fn ethereum() -> ChainId {
        ChainId::eip155(1)
    }

    fn arbitrum() -> ChainId {
        ChainId::eip155(42161)
    }

    fn pair() -> (AxelarGateway, AxelarGateway) {
        let owner = Account::new(OWNER);
        let mut source = AxelarGateway::new(GATEWAY_ETH, &ethereum(), OWNER).unwrap();
        source
            .core_mut()
            .register_remote_gateway(&owner, arbitrum(), GATEWAY_ARB)
            .unwrap();

        let mut destination = AxelarGateway::new(GATEWAY_ARB, &arbitrum(), OWNER).unwrap();
        destination
            .core_mut()
            .register_remote_gateway(&owner, ethereum(), GATEWAY_ETH)
            .unwrap();
        (source, destination)
    }

    fn request(attributes: Vec<Attribute>) -> SendRequest {
        SendRequest {
            sender: Account::new("0xaggregator-eth"),
            destination: InteropAddress::new(arbitrum(), "0xaggregator-arb"),
            payload: b"envelope".to_vec(),
            attributes,
        }
    }

    fn relay(gas: u64) -> RelayRequest {
        RelayRequest {
            gas_budget: gas,
            payer: Account::new("0xsponsor"),
            refund_address: Account::new("0xsponsor"),
        }
    }

    #[test]
    fn test_config_defaults_from_json() {
        let config: AxelarConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, AxelarConfig::default());
        assert_eq!(config.gas_service, chains::GAS_SERVICE);

        let config: AxelarConfig =
            serde_json::from_str(r#"{"lifecycle": {"max_relay_attempts": 2}}"#).unwrap();
        assert_eq!(config.lifecycle.max_relay_attempts, 2);
        assert_eq!(config.lifecycle.relay_window_secs, 86400);
    }

    #[test]
    fn test_local_chain_must_be_known() {
        let err = AxelarGateway::new(GATEWAY_ETH, &ChainId::eip155(999_999), OWNER)
            .err()
            .unwrap();
        assert_eq!(err, GatewayError::UnknownChain(ChainId::eip155(999_999)));

        let gateway = AxelarGateway::new(GATEWAY_ETH, &ethereum(), OWNER).unwrap();
        assert_eq!(gateway.chain_name(), chains::ETHEREUM);
        assert_eq!(
            gateway.config().gateway_contract.as_deref(),
            Some(chains::gateway_addresses::ETHEREUM)
        );
    }

    #[test]
    fn test_delivery_requires_paid_gas() {
        let (mut source, mut destination) = pair();
        let prepared = source.prepare_send(&request(vec![Attribute::gas_limit(300_000)])).unwrap();
        assert_eq!(prepared.transport_chain, chains::ARBITRUM);

        let send_id = source.commit_send(prepared);
        assert_eq!(source.pending_send(send_id).unwrap().state, RelayState::Created);
        assert!(source.outbound_delivery(send_id).is_none());

        source.request_relay(send_id, relay(300_000)).unwrap();
        let delivery = source.outbound_delivery(send_id).unwrap();
        assert_eq!(delivery.source_chain, chains::ETHEREUM);
        assert_eq!(delivery.delivery_id, source.command_id_for(send_id));

        match destination.receive(&delivery).unwrap() {
            Inbound::Forward(message) => {
                assert_eq!(message.source_chain, ethereum());
                assert_eq!(message.attributes, vec![Attribute::gas_limit(300_000)]);
            }
            other => panic!("unexpected inbound: {other:?}"),
        }
        assert!(matches!(destination.receive(&delivery), Ok(Inbound::Replayed(_))));
    }

    #[test]
    fn test_add_gas_supersedes_handle() {
        let (mut source, _) = pair();
        let send_id = source.commit_send(source.prepare_send(&request(vec![])).unwrap());

        let first = source.request_relay(send_id, relay(100_000)).unwrap();
        let second = source.request_relay(send_id, relay(250_000)).unwrap();
        assert_ne!(first, second);
        assert!(matches!(
            source.request_relay(send_id, relay(250_000)),
            Err(GatewayError::RelayUnderpriced { .. })
        ));
    }

    #[test]
    fn test_unsupported_destination_and_attribute() {
        let (source, _) = pair();

        let mut req = request(vec![]);
        req.destination.chain = ChainId::parse("eip155:31337").unwrap();
        assert_eq!(
            source.prepare_send(&req),
            Err(GatewayError::UnknownChain(ChainId::parse("eip155:31337").unwrap()))
        );

        let req = request(vec![Attribute::consistency_level(1)]);
        assert!(matches!(
            source.prepare_send(&req),
            Err(GatewayError::UnsupportedAttribute(_))
        ));
        assert!(!source.supports_attribute("consistencyLevel"));
    }

    #[test]
    fn test_unknown_axelar_chain_rejected() {
        let (mut source, mut destination) = pair();
        let send_id = source.commit_send(source.prepare_send(&request(vec![])).unwrap());
        source.request_relay(send_id, relay(1)).unwrap();

        let mut delivery = source.outbound_delivery(send_id).unwrap();
        delivery.source_chain = "not-a-chain".into();
        assert_eq!(
            destination.receive(&delivery),
            Err(GatewayError::UnknownTransportChain("not-a-chain".into()))
        );
    }

    #[test]
    fn test_unapproved_command_rejected() {
        let (mut source, destination) = pair();
        let send_id = source.commit_send(source.prepare_send(&request(vec![])).unwrap());
        source.request_relay(send_id, relay(1)).unwrap();
        let delivery = source.outbound_delivery(send_id).unwrap();

        let approvals = ApprovedDeliveries::default();
        let mut destination = destination.with_verifier(approvals.clone());
        assert!(matches!(
            destination.receive(&delivery),
            Err(GatewayError::VerificationFailed(_))
        ));

        approvals.approve(delivery.delivery_id.clone());
        assert!(matches!(destination.receive(&delivery), Ok(Inbound::Forward(_))));
    }

    #[test]
    fn test_command_id_recomputed_on_receive() {
        let (mut source, mut destination) = pair();
        let send_id = source.commit_send(source.prepare_send(&request(vec![])).unwrap());
        source.request_relay(send_id, relay(1)).unwrap();
        let delivery = source.outbound_delivery(send_id).unwrap();

        let mut renamed = delivery.clone();
        renamed.delivery_id = DeliveryId(vec![0xde, 0xad]);
        assert!(matches!(
            destination.receive(&renamed),
            Err(GatewayError::VerificationFailed(_))
        ));

        assert!(matches!(destination.receive(&delivery), Ok(Inbound::Forward(_))));
        renamed.delivery_id = source.command_id_for(SendId(7));
        assert!(matches!(
            destination.receive(&renamed),
            Err(GatewayError::VerificationFailed(_))
        ));
        assert_eq!(destination.core().executed_count(), 1);
    }

    #[test]
    fn test_chain_equivalence_admin() {
        let (mut source, _) = pair();
        let flow = ChainId::parse("eip155:747").unwrap();

        assert!(matches!(
            source.register_chain_equivalence(&Account::new("0xmallory"), flow.clone(), "flow"),
            Err(GatewayError::Unauthorized(_))
        ));
        source
            .register_chain_equivalence(&Account::new(OWNER), flow.clone(), "flow")
            .unwrap();

        source
            .core_mut()
            .register_remote_gateway(&Account::new(OWNER), flow.clone(), "0x3333")
            .unwrap();
        let mut req = request(vec![]);
        req.destination.chain = flow;
        assert_eq!(source.prepare_send(&req).unwrap().transport_chain, "flow");
    }
}
