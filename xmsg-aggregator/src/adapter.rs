//! Generic gateway adapter state, composed into every concrete adapter
//!
//! [`GatewayCore`] owns everything that is the same across transports: the
//! send-id counter and pending-send records, the remote gateway table, the
//! executed-id set, the passive inbox and the adapter's event log. Concrete
//! adapters only add wire formats and chain naming.

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::codec::gateway_message_digest;
use crate::error::GatewayError;
use crate::events::{Event, EventLog};
use crate::gateway::{Inbound, InboundMode, PreparedSend};
use crate::lifecycle::{PendingSend, RelayRequest, RelayState};
use crate::registry::{AdminAction, Authorizer, OwnerAuthority};
use crate::replay::{ExecutedSet, PassiveInbox};
use crate::types::{Account, Attribute, ChainId, DeliveryId, GatewayId, GatewayMessage, SendId};

/// Seconds since the unix epoch
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

// ═══════════════════════════════════════════════════════════════════════════════
// CONFIGURATION
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Sends older than this can no longer be relayed
    pub relay_window_secs: u64,
    /// Relay attempts allowed per send, retries included
    pub max_relay_attempts: u32,
    pub inbound_mode: InboundMode,
    pub max_payload_len: usize,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            relay_window_secs: 86400, // 24 hours
            max_relay_attempts: 5,
            inbound_mode: InboundMode::Active,
            max_payload_len: 64 * 1024,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CORE
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug)]
pub struct GatewayCore {
    id: GatewayId,
    authority: OwnerAuthority,
    config: LifecycleConfig,
    next_send_id: u64,
    pending: BTreeMap<SendId, PendingSend>,
    remote_gateways: BTreeMap<ChainId, String>,
    executed: ExecutedSet,
    inbox: PassiveInbox,
    events: EventLog,
}

impl GatewayCore {
    pub fn new(id: GatewayId, owner: Account, config: LifecycleConfig) -> Self {
        Self {
            id,
            authority: OwnerAuthority::new(owner),
            config,
            next_send_id: 1,
            pending: BTreeMap::new(),
            remote_gateways: BTreeMap::new(),
            executed: ExecutedSet::default(),
            inbox: PassiveInbox::default(),
            events: EventLog::new(),
        }
    }

    pub fn id(&self) -> &GatewayId {
        &self.id
    }

    pub fn owner(&self) -> &Account {
        &self.authority.owner
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    pub fn authorize(&self, caller: &Account, action: AdminAction) -> Result<(), GatewayError> {
        if self.authority.authorize(caller, action) {
            Ok(())
        } else {
            Err(GatewayError::Unauthorized(caller.clone()))
        }
    }

    pub fn emit(&mut self, event: Event) {
        self.events.emit(event);
    }

    pub fn events(&self) -> &[Event] {
        self.events.events()
    }

    pub fn drain_events(&mut self) -> Vec<Event> {
        self.events.drain()
    }

    // ── Send checks ──────────────────────────────────────────────────────────

    pub fn check_payload(&self, payload: &[u8]) -> Result<(), GatewayError> {
        if payload.len() > self.config.max_payload_len {
            return Err(GatewayError::PayloadTooLarge {
                len: payload.len(),
                max: self.config.max_payload_len,
            });
        }
        Ok(())
    }

    pub fn check_attributes(
        &self,
        attributes: &[Attribute],
        supported: &[&str],
    ) -> Result<(), GatewayError> {
        match attributes.iter().find(|a| !supported.contains(&a.key.as_str())) {
            Some(unsupported) => Err(GatewayError::UnsupportedAttribute(unsupported.key.clone())),
            None => Ok(()),
        }
    }

    // ── Remote gateways ──────────────────────────────────────────────────────

    pub fn remote_gateway(&self, chain: &ChainId) -> Option<&str> {
        self.remote_gateways.get(chain).map(String::as_str)
    }

    pub fn remote_gateways(&self) -> &BTreeMap<ChainId, String> {
        &self.remote_gateways
    }

    pub fn require_remote_gateway(&self, chain: &ChainId) -> Result<&str, GatewayError> {
        self.remote_gateway(chain)
            .ok_or_else(|| GatewayError::RemoteGatewayNotRegistered(chain.clone()))
    }

    /// Register the counterpart adapter on `chain`. Never overwrites.
    pub fn register_remote_gateway(
        &mut self,
        caller: &Account,
        chain: ChainId,
        address: &str,
    ) -> Result<(), GatewayError> {
        self.authorize(caller, AdminAction::RegisterRemoteGateway)?;
        self.insert_remote_gateway(chain, address)
    }

    /// Register without the owner check; the aggregator authorizes through its own [`Authorizer`]
    ///
    /// [`Authorizer`]: crate::registry::Authorizer
    pub(crate) fn insert_remote_gateway(&mut self, chain: ChainId, address: &str) -> Result<(), GatewayError> {
        if self.remote_gateways.contains_key(&chain) {
            return Err(GatewayError::RemoteGatewayAlreadyRegistered(chain));
        }

        let address = normalise_address(address);
        self.remote_gateways.insert(chain.clone(), address.clone());
        self.emit(Event::RemoteGatewayRegistered {
            gateway: self.id.clone(),
            chain,
            address,
        });
        Ok(())
    }

    /// Explicitly replace a registered remote gateway, returning the previous address
    pub fn replace_remote_gateway(
        &mut self,
        caller: &Account,
        chain: ChainId,
        address: &str,
    ) -> Result<String, GatewayError> {
        self.authorize(caller, AdminAction::ReplaceRemoteGateway)?;
        self.swap_remote_gateway(chain, address)
    }

    pub(crate) fn swap_remote_gateway(&mut self, chain: ChainId, address: &str) -> Result<String, GatewayError> {
        let address = normalise_address(address);
        let slot = self
            .remote_gateways
            .get_mut(&chain)
            .ok_or_else(|| GatewayError::RemoteGatewayNotRegistered(chain.clone()))?;
        let previous = std::mem::replace(slot, address.clone());

        self.emit(Event::RemoteGatewayReplaced {
            gateway: self.id.clone(),
            chain,
            previous: previous.clone(),
            current: address,
        });
        Ok(previous)
    }

    // ── Pending sends ────────────────────────────────────────────────────────

    /// The id the next committed send will receive
    pub fn peek_send_id(&self) -> SendId {
        SendId(self.next_send_id)
    }

    /// Record a prepared send in the `Created` state
    pub fn commit(&mut self, prepared: PreparedSend) -> SendId {
        let send_id = SendId(self.next_send_id);
        self.next_send_id += 1;

        let PreparedSend {
            request,
            transport_chain,
            wire,
        } = prepared;

        self.emit(Event::GatewayMessageCreated {
            gateway: self.id.clone(),
            send_id,
            destination: request.destination.clone(),
        });

        self.pending.insert(
            send_id,
            PendingSend {
                send_id,
                sender: request.sender,
                destination: request.destination,
                payload: request.payload,
                attributes: request.attributes,
                transport_chain,
                wire,
                state: RelayState::Created,
                created_at: unix_now(),
                relay_attempts: 0,
            },
        );
        send_id
    }

    /// Mark a send as discoverable by relayers
    pub fn post(&mut self, send_id: SendId, handle: String) {
        let posted = self
            .pending
            .get_mut(&send_id)
            .map(|p| p.post(handle.clone()))
            .unwrap_or(false);
        if posted {
            self.emit(Event::MessagePosted {
                gateway: self.id.clone(),
                send_id,
                handle,
            });
        }
    }

    /// Run a relay attempt, deriving the transport handle with `handle_for`
    pub fn relay_with(
        &mut self,
        send_id: SendId,
        request: RelayRequest,
        handle_for: impl FnOnce(&PendingSend, u32) -> String,
    ) -> Result<String, GatewayError> {
        let max_attempts = self.config.max_relay_attempts;
        let payer = request.payer.clone();
        let gas_budget = request.gas_budget;

        let pending = self
            .pending
            .get_mut(&send_id)
            .ok_or(GatewayError::UnknownSend(send_id))?;

        match pending.relay(request, max_attempts, handle_for) {
            Ok(handle) => {
                let attempt = pending.relay_attempts;
                self.emit(Event::RelayRequested {
                    gateway: self.id.clone(),
                    send_id,
                    handle: handle.clone(),
                    gas_budget,
                    payer,
                    attempt,
                });
                Ok(handle)
            }
            Err(err @ GatewayError::RelayAttemptsExhausted(_)) => {
                self.emit(Event::SendExpired {
                    gateway: self.id.clone(),
                    send_id,
                });
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    pub fn pending(&self, send_id: SendId) -> Option<&PendingSend> {
        self.pending.get(&send_id)
    }

    pub fn pending_sends(&self) -> impl Iterator<Item = &PendingSend> {
        self.pending.values()
    }

    /// Expire every send that outlived the relay window
    pub fn expire_stale(&mut self, now: u64) -> Vec<SendId> {
        let window = self.config.relay_window_secs;
        let expired: Vec<SendId> = self
            .pending
            .values_mut()
            .filter_map(|p| p.expire_if_stale(now, window).then_some(p.send_id))
            .collect();

        for send_id in &expired {
            self.emit(Event::SendExpired {
                gateway: self.id.clone(),
                send_id: *send_id,
            });
        }
        expired
    }

    // ── Inbound ──────────────────────────────────────────────────────────────

    pub fn is_executed(&self, delivery_id: &DeliveryId) -> bool {
        self.executed.contains(delivery_id)
    }

    pub fn executed_count(&self) -> usize {
        self.executed.len()
    }

    /// Accept an inbound delivery after transport decoding.
    ///
    /// Order: replay check, origin against the registered remote gateway,
    /// transport verification, then the id is recorded and the message is
    /// either forwarded or attested for passive validation.
    pub fn accept(
        &mut self,
        origin: &ChainId,
        origin_address: &str,
        verified: impl FnOnce() -> bool,
        message: GatewayMessage,
    ) -> Result<Inbound, GatewayError> {
        let delivery_id = message.delivery_id.clone();
        if self.executed.contains(&delivery_id) {
            self.emit(Event::DeliveryReplayed {
                gateway: self.id.clone(),
                delivery_id: delivery_id.clone(),
            });
            return Ok(Inbound::Replayed(delivery_id));
        }

        let origin_address = normalise_address(origin_address);
        if self.remote_gateway(origin) != Some(origin_address.as_str()) {
            return Err(self.reject(GatewayError::UnknownRemoteGateway {
                chain: origin.clone(),
                address: origin_address,
            }));
        }

        if !verified() {
            return Err(self.reject(GatewayError::VerificationFailed(delivery_id.to_string())));
        }

        self.executed.insert(delivery_id.clone());

        match self.config.inbound_mode {
            InboundMode::Active => Ok(Inbound::Forward(message)),
            InboundMode::Passive => {
                self.inbox
                    .attest(delivery_id.clone(), gateway_message_digest(&message));
                self.emit(Event::MessageAttested {
                    gateway: self.id.clone(),
                    delivery_id: delivery_id.clone(),
                });
                Ok(Inbound::Attested(delivery_id))
            }
        }
    }

    /// Consume a passive attestation for exactly `message`
    pub fn validate(
        &mut self,
        delivery_id: &DeliveryId,
        message: &GatewayMessage,
    ) -> Result<(), GatewayError> {
        if message.delivery_id != *delivery_id {
            return Err(GatewayError::NotAttested);
        }
        self.inbox
            .consume(delivery_id, &gateway_message_digest(message))?;
        self.emit(Event::MessageValidated {
            gateway: self.id.clone(),
            delivery_id: delivery_id.clone(),
        });
        Ok(())
    }

    /// Record a rejected delivery and hand the error back
    pub fn reject(&mut self, err: GatewayError) -> GatewayError {
        self.emit(Event::DeliveryRejected {
            gateway: self.id.clone(),
            reason: err.to_string(),
        });
        err
    }
}

fn normalise_address(address: &str) -> String {
    Account::new(address).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::SendRequest;
    use crate::types::InteropAddress;

    fn core(mode: InboundMode) -> GatewayCore {
        let mut core = GatewayCore::new(
            GatewayId::new("gw-test"),
            Account::new("0xowner"),
            LifecycleConfig {
                inbound_mode: mode,
                ..LifecycleConfig::default()
            },
        );
        core.register_remote_gateway(&Account::new("0xowner"), ChainId::eip155(1), "0xREMOTE")
            .unwrap();
        core
    }

    fn message(delivery: u8) -> GatewayMessage {
        GatewayMessage {
            delivery_id: DeliveryId(vec![delivery]),
            source_chain: ChainId::eip155(1),
            sender: Account::new("0xpeer"),
            recipient: Account::new("0xlocal"),
            payload: b"envelope".to_vec(),
            attributes: vec![],
        }
    }

    fn prepared() -> PreparedSend {
        PreparedSend {
            request: SendRequest {
                sender: Account::new("0xlocal"),
                destination: InteropAddress::new(ChainId::eip155(1), "0xpeer"),
                payload: vec![1],
                attributes: vec![],
            },
            transport_chain: "ethereum".into(),
            wire: vec![1],
        }
    }

    #[test]
    fn test_remote_gateway_admin() {
        let mut core = core(InboundMode::Active);
        let owner = Account::new("0xowner");

        assert_eq!(core.remote_gateway(&ChainId::eip155(1)), Some("0xremote"));
        assert!(matches!(
            core.register_remote_gateway(&owner, ChainId::eip155(1), "0xother"),
            Err(GatewayError::RemoteGatewayAlreadyRegistered(_))
        ));
        assert!(matches!(
            core.register_remote_gateway(&Account::new("0xmallory"), ChainId::eip155(2), "0x1"),
            Err(GatewayError::Unauthorized(_))
        ));

        let previous = core
            .replace_remote_gateway(&owner, ChainId::eip155(1), "0xother")
            .unwrap();
        assert_eq!(previous, "0xremote");
        assert!(core
            .events()
            .iter()
            .any(|e| matches!(e, Event::RemoteGatewayReplaced { .. })));
    }

    #[test]
    fn test_send_ids_are_monotonic() {
        let mut core = core(InboundMode::Active);
        assert_eq!(core.peek_send_id(), SendId(1));
        assert_eq!(core.commit(prepared()), SendId(1));
        assert_eq!(core.commit(prepared()), SendId(2));
        assert_eq!(core.pending(SendId(2)).unwrap().state, RelayState::Created);
    }

    #[test]
    fn test_relay_unknown_send() {
        let mut core = core(InboundMode::Active);
        let err = core
            .relay_with(
                SendId(7),
                RelayRequest {
                    gas_budget: 1,
                    payer: Account::new("0xanyone"),
                    refund_address: Account::new("0xanyone"),
                },
                |_, _| String::new(),
            )
            .unwrap_err();
        assert_eq!(err, GatewayError::UnknownSend(SendId(7)));
    }

    #[test]
    fn test_expire_stale_emits_once() {
        let mut core = core(InboundMode::Active);
        let send_id = core.commit(prepared());
        let later = unix_now() + LifecycleConfig::default().relay_window_secs;

        assert_eq!(core.expire_stale(later), vec![send_id]);
        assert!(core.expire_stale(later).is_empty());
        assert!(core.pending(send_id).unwrap().state.is_expired());
    }

    #[test]
    fn test_accept_rejects_spoofed_origin() {
        let mut core = core(InboundMode::Active);
        let err = core
            .accept(&ChainId::eip155(1), "0xattacker", || true, message(1))
            .unwrap_err();
        assert!(matches!(err, GatewayError::UnknownRemoteGateway { .. }));
        assert!(!core.is_executed(&DeliveryId(vec![1])));

        let err = core
            .accept(&ChainId::eip155(99), "0xremote", || true, message(1))
            .unwrap_err();
        assert!(matches!(err, GatewayError::UnknownRemoteGateway { .. }));
    }

    #[test]
    fn test_accept_then_replay() {
        let mut core = core(InboundMode::Active);
        let first = core
            .accept(&ChainId::eip155(1), "0xRemote", || true, message(1))
            .unwrap();
        assert!(matches!(first, Inbound::Forward(_)));

        let second = core
            .accept(&ChainId::eip155(1), "0xremote", || true, message(1))
            .unwrap();
        assert_eq!(second, Inbound::Replayed(DeliveryId(vec![1])));
        assert_eq!(core.executed_count(), 1);
    }

    #[test]
    fn test_failed_verification_is_not_recorded() {
        let mut core = core(InboundMode::Active);
        let err = core
            .accept(&ChainId::eip155(1), "0xremote", || false, message(3))
            .unwrap_err();
        assert!(matches!(err, GatewayError::VerificationFailed(_)));
        assert!(!core.is_executed(&DeliveryId(vec![3])));
    }

    #[test]
    fn test_passive_mode_validation() {
        let mut core = core(InboundMode::Passive);
        let inbound = core
            .accept(&ChainId::eip155(1), "0xremote", || true, message(5))
            .unwrap();
        assert_eq!(inbound, Inbound::Attested(DeliveryId(vec![5])));

        let mut tampered = message(5);
        tampered.payload = b"other".to_vec();
        assert_eq!(
            core.validate(&DeliveryId(vec![5]), &tampered),
            Err(GatewayError::NotAttested)
        );

        core.validate(&DeliveryId(vec![5]), &message(5)).unwrap();
        assert_eq!(
            core.validate(&DeliveryId(vec![5]), &message(5)),
            Err(GatewayError::AlreadyConsumed)
        );
    }
}
