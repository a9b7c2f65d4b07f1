//! Quorum aggregator: fans messages out over every trusted gateway and
//! executes inbound messages once a threshold of gateways agree.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::codec::{copy_digest, decode_envelope, encode_envelope};
use crate::error::{AggregatorError, ErrorClass};
use crate::events::{Event, EventLog};
use crate::gateway::{Delivery, Gateway, Inbound, SendRequest};
use crate::lifecycle::RelayRequest;
use crate::receiver::{receive_message_selector, ReceiveCall, ReceiverDirectory, ReceiverTable};
use crate::registry::{AdminAction, Authorizer, GatewayRegistry, OwnerAuthority};
use crate::tally::{ExecutionOutcome, QueuedCall, TallyState, VoteResult, VoteTally};
use crate::types::{
    Account, Attribute, ChainId, DeliveryId, Digest, Envelope, GatewayId, GatewayMessage,
    InteropAddress, Message, MessageId, SendId,
};

// ═══════════════════════════════════════════════════════════════════════════════
// CONFIGURATION
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatorConfig {
    /// Chain this aggregator lives on
    pub chain: ChainId,
    /// This aggregator's own address; peers register it as their remote router
    pub address: Account,
    /// Administrator used when no other authorizer is supplied
    pub owner: Account,
    pub threshold: usize,
}

// ═══════════════════════════════════════════════════════════════════════════════
// RECORDS
// ═══════════════════════════════════════════════════════════════════════════════

/// One gateway-level send produced by a fan-out
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FanOut {
    pub gateway: GatewayId,
    pub send_id: SendId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentMessage {
    pub message: Message,
    pub fan_out: Vec<FanOut>,
}

/// What an inbound delivery did to the destination state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeliveryOutcome {
    /// Vote recorded; quorum not reached yet
    Collecting {
        id: MessageId,
        votes: usize,
        threshold: usize,
    },
    /// This vote reached quorum and the receiver was called
    Executed {
        id: MessageId,
        outcome: ExecutionOutcome,
    },
    /// Vote arrived after execution; bookkeeping only
    AlreadyExecuted { id: MessageId },
    /// Same gateway delivered the same copy again
    Duplicate { id: MessageId },
    /// Same gateway delivered a different copy; ignored
    Conflicting { id: MessageId },
    /// Transport delivery already seen by the adapter
    Replayed { delivery_id: DeliveryId },
    /// Passive adapter stored the message for validation
    Attested { delivery_id: DeliveryId },
}

// ═══════════════════════════════════════════════════════════════════════════════
// BUILDER
// ═══════════════════════════════════════════════════════════════════════════════

pub struct AggregatorBuilder {
    config: AggregatorConfig,
    authorizer: Option<Box<dyn Authorizer>>,
    receivers: Option<Box<dyn ReceiverDirectory>>,
    gateways: Vec<Box<dyn Gateway>>,
    routers: Vec<(ChainId, Account)>,
}

impl AggregatorBuilder {
    pub fn new(config: AggregatorConfig) -> Self {
        Self {
            config,
            authorizer: None,
            receivers: None,
            gateways: Vec::new(),
            routers: Vec::new(),
        }
    }

    pub fn authorizer(mut self, authorizer: impl Authorizer + 'static) -> Self {
        self.authorizer = Some(Box::new(authorizer));
        self
    }

    pub fn receivers(mut self, receivers: impl ReceiverDirectory + 'static) -> Self {
        self.receivers = Some(Box::new(receivers));
        self
    }

    pub fn gateway(mut self, gateway: impl Gateway + 'static) -> Self {
        self.gateways.push(Box::new(gateway));
        self
    }

    pub fn boxed_gateway(mut self, gateway: Box<dyn Gateway>) -> Self {
        self.gateways.push(gateway);
        self
    }

    pub fn remote_router(mut self, chain: ChainId, router: impl Into<Account>) -> Self {
        self.routers.push((chain, router.into()));
        self
    }

    /// Build the aggregator, validating `1 ≤ threshold ≤ |gateways|`
    pub fn build(self) -> Result<Aggregator, AggregatorError> {
        let mut events = EventLog::new();
        let mut registry = GatewayRegistry::new(self.config.threshold);
        let mut gateways = BTreeMap::new();

        for mut gateway in self.gateways {
            let id = gateway.id().clone();
            registry.add_gateway(id.clone())?;
            events.extend(gateway.core_mut().drain_events());
            events.emit(Event::GatewayAdded {
                gateway: id.clone(),
            });
            gateways.insert(id, gateway);
        }
        registry.validate()?;

        for (chain, router) in self.routers {
            registry.register_remote_router(chain.clone(), router.clone())?;
            events.emit(Event::RemoteRouterRegistered { chain, router });
        }

        let authorizer = self
            .authorizer
            .unwrap_or_else(|| Box::new(OwnerAuthority::new(self.config.owner.clone())));
        let receivers = self
            .receivers
            .unwrap_or_else(|| Box::new(ReceiverTable::new()));

        Ok(Aggregator {
            config: self.config,
            registry,
            gateways,
            authorizer,
            receivers,
            next_id: 1,
            sent: BTreeMap::new(),
            tallies: BTreeMap::new(),
            events,
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// AGGREGATOR
// ═══════════════════════════════════════════════════════════════════════════════

pub struct Aggregator {
    config: AggregatorConfig,
    registry: GatewayRegistry,
    gateways: BTreeMap<GatewayId, Box<dyn Gateway>>,
    authorizer: Box<dyn Authorizer>,
    receivers: Box<dyn ReceiverDirectory>,
    next_id: u64,
    sent: BTreeMap<MessageId, SentMessage>,
    tallies: BTreeMap<(ChainId, MessageId), VoteTally>,
    events: EventLog,
}

fn collect_events(events: &mut EventLog, gateway: &mut Box<dyn Gateway>) {
    events.extend(gateway.core_mut().drain_events());
}

impl Aggregator {
    pub fn builder(config: AggregatorConfig) -> AggregatorBuilder {
        AggregatorBuilder::new(config)
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    pub fn chain(&self) -> &ChainId {
        &self.config.chain
    }

    pub fn address(&self) -> &Account {
        &self.config.address
    }

    pub fn threshold(&self) -> usize {
        self.registry.threshold()
    }

    pub fn gateway_ids(&self) -> &[GatewayId] {
        self.registry.gateways()
    }

    pub fn gateway(&self, id: &GatewayId) -> Option<&dyn Gateway> {
        self.gateways.get(id).map(|g| g.as_ref())
    }

    pub fn gateway_mut(&mut self, id: &GatewayId) -> Option<&mut Box<dyn Gateway>> {
        self.gateways.get_mut(id)
    }

    pub fn remote_router(&self, chain: &ChainId) -> Option<&Account> {
        self.registry.remote_router(chain)
    }

    pub fn remote_routers(&self) -> &BTreeMap<ChainId, Account> {
        self.registry.remote_routers()
    }

    pub fn sent_message(&self, id: MessageId) -> Option<&SentMessage> {
        self.sent.get(&id)
    }

    pub fn tally(&self, source_chain: &ChainId, id: MessageId) -> Option<&VoteTally> {
        self.tallies.get(&(source_chain.clone(), id))
    }

    pub fn tally_state(&self, source_chain: &ChainId, id: MessageId) -> TallyState {
        self.tally(source_chain, id)
            .map(|t| t.state)
            .unwrap_or_default()
    }

    pub fn events(&self) -> &[Event] {
        self.events.events()
    }

    pub fn drain_events(&mut self) -> Vec<Event> {
        self.events.drain()
    }

    /// An attribute is supported only if every registered gateway supports it
    pub fn supports_attribute(&self, key: &str) -> bool {
        !self.gateways.is_empty() && self.gateways.values().all(|g| g.supports_attribute(key))
    }

    // ── Source side ──────────────────────────────────────────────────────────

    /// Fan a message out over every trusted gateway.
    ///
    /// Either every gateway records the send or none does.
    pub fn send_message(
        &mut self,
        sender: Account,
        destination: InteropAddress,
        payload: Vec<u8>,
        attributes: Vec<Attribute>,
    ) -> Result<MessageId, AggregatorError> {
        let chain = destination.chain.clone();
        let result = self.fan_out(sender, destination, payload, attributes);
        if let Err(err) = &result {
            self.events.emit(Event::SendRejected {
                destination: chain,
                reason: err.to_string(),
            });
        }
        result
    }

    fn fan_out(
        &mut self,
        sender: Account,
        destination: InteropAddress,
        payload: Vec<u8>,
        attributes: Vec<Attribute>,
    ) -> Result<MessageId, AggregatorError> {
        let router = self
            .registry
            .remote_router(&destination.chain)
            .cloned()
            .ok_or_else(|| AggregatorError::UnknownRoute(destination.chain.clone()))?;

        if self.registry.gateways().is_empty() {
            return Err(AggregatorError::NoGateways);
        }
        if let Some(attribute) = attributes.iter().find(|a| !self.supports_attribute(&a.key)) {
            return Err(AggregatorError::UnsupportedAttribute(attribute.key.clone()));
        }

        let id = MessageId(self.next_id);
        let envelope = Envelope {
            id,
            sender: sender.clone(),
            recipient: destination.account.clone(),
            payload: payload.clone(),
        };
        let request = SendRequest {
            sender: self.config.address.clone(),
            destination: InteropAddress::new(destination.chain.clone(), router),
            payload: encode_envelope(&envelope),
            attributes: attributes.clone(),
        };

        // Phase 1: every gateway validates; nothing is recorded yet
        let mut prepared = Vec::with_capacity(self.registry.gateways().len());
        for gateway_id in self.registry.gateways() {
            let gateway = self
                .gateways
                .get(gateway_id)
                .ok_or_else(|| AggregatorError::UnknownGateway(gateway_id.clone()))?;
            let send = gateway
                .prepare_send(&request)
                .map_err(|source| AggregatorError::Gateway {
                    gateway: gateway_id.clone(),
                    source,
                })?;
            prepared.push((gateway_id.clone(), send));
        }

        // Phase 2: commit everywhere
        self.next_id += 1;
        let message = Message {
            id,
            source: InteropAddress::new(self.config.chain.clone(), sender),
            destination,
            payload,
            attributes,
        };
        self.events.emit(Event::MessageCreated {
            id,
            message: message.clone(),
        });

        let mut fan_out = Vec::with_capacity(prepared.len());
        for (gateway_id, send) in prepared {
            if let Some(gateway) = self.gateways.get_mut(&gateway_id) {
                let send_id = gateway.commit_send(send);
                collect_events(&mut self.events, gateway);
                fan_out.push(FanOut {
                    gateway: gateway_id,
                    send_id,
                });
            }
        }

        self.sent.insert(id, SentMessage { message, fan_out });
        Ok(id)
    }

    /// Finance a relay attempt on one gateway. Any account may pay.
    pub fn request_relay(
        &mut self,
        gateway_id: &GatewayId,
        send_id: SendId,
        request: RelayRequest,
    ) -> Result<String, AggregatorError> {
        let gateway = self
            .gateways
            .get_mut(gateway_id)
            .ok_or_else(|| AggregatorError::UnknownGateway(gateway_id.clone()))?;
        let result = gateway.request_relay(send_id, request);
        collect_events(&mut self.events, gateway);
        result.map_err(|source| AggregatorError::Gateway {
            gateway: gateway_id.clone(),
            source,
        })
    }

    /// The delivery a relayer would carry for one of this aggregator's sends
    pub fn outbound_delivery(&self, gateway_id: &GatewayId, send_id: SendId) -> Option<Delivery> {
        self.gateways.get(gateway_id)?.outbound_delivery(send_id)
    }

    /// Expire stale sends on every gateway
    pub fn expire_stale(&mut self, now: u64) -> Vec<FanOut> {
        let mut expired = Vec::new();
        for (gateway_id, gateway) in self.gateways.iter_mut() {
            expired.extend(gateway.expire_stale(now).into_iter().map(|send_id| FanOut {
                gateway: gateway_id.clone(),
                send_id,
            }));
            collect_events(&mut self.events, gateway);
        }
        expired
    }

    // ── Destination side ─────────────────────────────────────────────────────

    /// Route a raw transport delivery through a trusted adapter into the tally
    pub fn deliver(
        &mut self,
        gateway_id: &GatewayId,
        delivery: &Delivery,
    ) -> Result<DeliveryOutcome, AggregatorError> {
        if !self.registry.is_trusted(gateway_id) || !self.gateways.contains_key(gateway_id) {
            let err = AggregatorError::UntrustedGateway(gateway_id.clone());
            self.reject(gateway_id, &err);
            return Err(err);
        }

        let gateway = self
            .gateways
            .get_mut(gateway_id)
            .ok_or_else(|| AggregatorError::UntrustedGateway(gateway_id.clone()))?;
        let inbound = gateway.receive(delivery);
        collect_events(&mut self.events, gateway);

        match inbound.map_err(|source| AggregatorError::Gateway {
            gateway: gateway_id.clone(),
            source,
        })? {
            Inbound::Forward(message) => self.on_receive(gateway_id, message),
            Inbound::Replayed(delivery_id) => Ok(DeliveryOutcome::Replayed { delivery_id }),
            Inbound::Attested(delivery_id) => Ok(DeliveryOutcome::Attested { delivery_id }),
        }
    }

    /// Count one authenticated gateway message towards quorum
    pub fn on_receive(
        &mut self,
        from: &GatewayId,
        message: GatewayMessage,
    ) -> Result<DeliveryOutcome, AggregatorError> {
        let result = self.tally_vote(from, message);
        if let Err(err) = &result {
            if matches!(err.class(), ErrorClass::Trust | ErrorClass::Malformed) {
                self.reject(from, err);
            }
        }
        result
    }

    fn tally_vote(
        &mut self,
        from: &GatewayId,
        message: GatewayMessage,
    ) -> Result<DeliveryOutcome, AggregatorError> {
        if !self.registry.is_trusted(from) {
            return Err(AggregatorError::UntrustedGateway(from.clone()));
        }
        if self.registry.remote_router(&message.source_chain) != Some(&message.sender) {
            return Err(AggregatorError::UnknownSender {
                chain: message.source_chain,
                sender: message.sender,
            });
        }
        if message.recipient != self.config.address {
            return Err(AggregatorError::Misrouted(message.recipient));
        }

        let envelope = decode_envelope(&message.payload)?;
        let id = envelope.id;
        let source_chain = message.source_chain.clone();
        let digest = copy_digest(&message.payload, &message.attributes);

        let tally = self
            .tallies
            .entry((source_chain.clone(), id))
            .or_default();

        if tally.is_executed() {
            tally.record(from, digest);
            self.events.emit(Event::LateVote {
                source_chain,
                id,
                gateway: from.clone(),
            });
            return Ok(DeliveryOutcome::AlreadyExecuted { id });
        }

        match tally.record(from, digest) {
            VoteResult::Duplicate => {
                self.events.emit(Event::DuplicateVote {
                    source_chain,
                    id,
                    gateway: from.clone(),
                });
                return Ok(DeliveryOutcome::Duplicate { id });
            }
            VoteResult::Conflicting => {
                self.events.emit(Event::ConflictingVote {
                    source_chain,
                    id,
                    gateway: from.clone(),
                });
                return Ok(DeliveryOutcome::Conflicting { id });
            }
            VoteResult::New => {}
        }

        tally.copies.entry(digest).or_insert_with(|| QueuedCall {
            receiver: envelope.recipient,
            call: ReceiveCall {
                message_id: id,
                source: InteropAddress::new(source_chain.clone(), envelope.sender),
                payload: envelope.payload,
                attributes: message.attributes,
            },
        });

        let votes = tally.count_matching(&digest, self.registry.gateways());
        let threshold = self.registry.threshold();
        self.events.emit(Event::VoteRecorded {
            source_chain: source_chain.clone(),
            id,
            gateway: from.clone(),
            votes,
            threshold,
        });

        if votes < threshold {
            debug!(%source_chain, %id, votes, threshold, "collecting votes");
            return Ok(DeliveryOutcome::Collecting {
                id,
                votes,
                threshold,
            });
        }

        Ok(self.execute(source_chain, id, digest, votes))
    }

    /// Mark a tally executed, then dispatch the copy identified by `digest`
    fn execute(
        &mut self,
        source_chain: ChainId,
        id: MessageId,
        digest: Digest,
        votes: usize,
    ) -> DeliveryOutcome {
        let Some(tally) = self.tallies.get_mut(&(source_chain.clone(), id)) else {
            return DeliveryOutcome::AlreadyExecuted { id };
        };
        if tally.is_executed() {
            return DeliveryOutcome::AlreadyExecuted { id };
        }
        let Some(QueuedCall { receiver, call }) = tally.copies.remove(&digest) else {
            return DeliveryOutcome::Collecting {
                id,
                votes,
                threshold: self.registry.threshold(),
            };
        };
        // Executed is set before the receiver runs
        tally.mark_executed();
        tally.copies.clear();
        self.events.emit(Event::QuorumReached {
            source_chain: source_chain.clone(),
            id,
            votes,
        });

        let outcome = match self.receivers.dispatch(&receiver, &call) {
            Ok(selector) if selector == receive_message_selector() => ExecutionOutcome::Succeeded,
            Ok(other) => ExecutionOutcome::Failed {
                reason: format!("unexpected return value 0x{}", hex::encode(other)),
            },
            Err(err) => ExecutionOutcome::Failed {
                reason: err.to_string(),
            },
        };
        tally.set_outcome(outcome.clone());

        match &outcome {
            ExecutionOutcome::Succeeded => self.events.emit(Event::ExecutionSucceeded {
                source_chain,
                id,
                receiver,
            }),
            ExecutionOutcome::Failed { reason } => self.events.emit(Event::ExecutionFailed {
                source_chain,
                id,
                receiver,
                reason: reason.clone(),
            }),
        }

        DeliveryOutcome::Executed { id, outcome }
    }

    /// Execute every collecting tally whose recorded votes meet the current
    /// threshold. Called after the threshold or the gateway set changes.
    fn reevaluate_pending(&mut self) -> Vec<DeliveryOutcome> {
        let threshold = self.registry.threshold();
        let trusted = self.registry.gateways();
        let ready: Vec<_> = self
            .tallies
            .iter()
            .filter(|(_, tally)| tally.state == TallyState::Collecting)
            .filter_map(|((chain, id), tally)| {
                tally
                    .leading(trusted)
                    .filter(|(_, votes)| *votes >= threshold)
                    .map(|(digest, votes)| (chain.clone(), *id, digest, votes))
            })
            .collect();

        ready
            .into_iter()
            .map(|(chain, id, digest, votes)| self.execute(chain, id, digest, votes))
            .collect()
    }

    /// Passive mode: assert that `message` was attested by a trusted gateway
    pub fn validate_received_message(
        &mut self,
        gateway_id: &GatewayId,
        delivery_id: &DeliveryId,
        message: &GatewayMessage,
    ) -> Result<(), AggregatorError> {
        if !self.registry.is_trusted(gateway_id) {
            return Err(AggregatorError::UntrustedGateway(gateway_id.clone()));
        }
        let gateway = self
            .gateways
            .get_mut(gateway_id)
            .ok_or_else(|| AggregatorError::UntrustedGateway(gateway_id.clone()))?;
        let result = gateway.validate_received_message(delivery_id, message);
        collect_events(&mut self.events, gateway);
        result.map_err(|source| AggregatorError::Gateway {
            gateway: gateway_id.clone(),
            source,
        })
    }

    fn reject(&mut self, gateway: &GatewayId, err: &AggregatorError) {
        self.events.emit(Event::DeliveryRejected {
            gateway: gateway.clone(),
            reason: err.to_string(),
        });
    }

    // ── Administration ───────────────────────────────────────────────────────

    /// Check `caller` against the configured [`Authorizer`]
    pub fn authorize(&self, caller: &Account, action: AdminAction) -> Result<(), AggregatorError> {
        if self.authorizer.authorize(caller, action) {
            Ok(())
        } else {
            Err(AggregatorError::Unauthorized {
                caller: caller.clone(),
                action,
            })
        }
    }

    pub fn register_remote_router(
        &mut self,
        caller: &Account,
        chain: ChainId,
        router: Account,
    ) -> Result<(), AggregatorError> {
        self.authorize(caller, AdminAction::RegisterRemoteRouter)?;
        self.registry
            .register_remote_router(chain.clone(), router.clone())?;
        self.events
            .emit(Event::RemoteRouterRegistered { chain, router });
        Ok(())
    }

    /// Redirect a chain to a new peer aggregator, returning the previous one
    pub fn replace_remote_router(
        &mut self,
        caller: &Account,
        chain: ChainId,
        router: Account,
    ) -> Result<Account, AggregatorError> {
        self.authorize(caller, AdminAction::ReplaceRemoteRouter)?;
        let previous = self
            .registry
            .replace_remote_router(chain.clone(), router.clone())?;
        self.events.emit(Event::RemoteRouterReplaced {
            chain,
            previous: previous.clone(),
            current: router,
        });
        Ok(previous)
    }

    pub fn add_gateway(
        &mut self,
        caller: &Account,
        mut gateway: Box<dyn Gateway>,
    ) -> Result<(), AggregatorError> {
        self.authorize(caller, AdminAction::AddGateway)?;
        let id = gateway.id().clone();
        self.registry.add_gateway(id.clone())?;
        collect_events(&mut self.events, &mut gateway);
        self.gateways.insert(id.clone(), gateway);
        self.events.emit(Event::GatewayAdded { gateway: id });
        Ok(())
    }

    /// Stop trusting a gateway and hand the adapter back
    pub fn remove_gateway(
        &mut self,
        caller: &Account,
        gateway_id: &GatewayId,
    ) -> Result<Box<dyn Gateway>, AggregatorError> {
        self.authorize(caller, AdminAction::RemoveGateway)?;
        self.registry.remove_gateway(gateway_id)?;
        let gateway = self
            .gateways
            .remove(gateway_id)
            .ok_or_else(|| AggregatorError::UnknownGateway(gateway_id.clone()))?;
        self.events.emit(Event::GatewayRemoved {
            gateway: gateway_id.clone(),
        });
        self.reevaluate_pending();
        Ok(gateway)
    }

    /// Change the quorum threshold. Collecting tallies that already meet the
    /// new threshold execute immediately; their outcomes are returned.
    pub fn set_threshold(
        &mut self,
        caller: &Account,
        threshold: usize,
    ) -> Result<Vec<DeliveryOutcome>, AggregatorError> {
        self.authorize(caller, AdminAction::SetThreshold)?;
        let previous = self.registry.threshold();
        self.registry.set_threshold(threshold)?;
        self.events.emit(Event::ThresholdUpdated {
            previous,
            current: threshold,
        });
        Ok(self.reevaluate_pending())
    }

    /// Register the counterpart of one of this aggregator's gateways on `chain`.
    ///
    /// Authorized by this aggregator's [`Authorizer`] only; the gateway's own
    /// owner is not consulted.
    pub fn register_remote_gateway(
        &mut self,
        caller: &Account,
        gateway_id: &GatewayId,
        chain: ChainId,
        address: &str,
    ) -> Result<(), AggregatorError> {
        self.authorize(caller, AdminAction::RegisterRemoteGateway)?;
        let gateway = self
            .gateways
            .get_mut(gateway_id)
            .ok_or_else(|| AggregatorError::UnknownGateway(gateway_id.clone()))?;
        let result = gateway.core_mut().insert_remote_gateway(chain, address);
        collect_events(&mut self.events, gateway);
        result.map_err(|source| AggregatorError::Gateway {
            gateway: gateway_id.clone(),
            source,
        })
    }

    pub fn replace_remote_gateway(
        &mut self,
        caller: &Account,
        gateway_id: &GatewayId,
        chain: ChainId,
        address: &str,
    ) -> Result<String, AggregatorError> {
        self.authorize(caller, AdminAction::ReplaceRemoteGateway)?;
        let gateway = self
            .gateways
            .get_mut(gateway_id)
            .ok_or_else(|| AggregatorError::UnknownGateway(gateway_id.clone()))?;
        let result = gateway.core_mut().swap_remote_gateway(chain, address);
        collect_events(&mut self.events, gateway);
        result.map_err(|source| AggregatorError::Gateway {
            gateway: gateway_id.clone(),
            source,
        })
    }
}
