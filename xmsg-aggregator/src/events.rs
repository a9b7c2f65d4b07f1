//! Observable events emitted by the aggregator and its gateways
//!
//! Each failure class has its own variant so operators can alert on them
//! without replaying state: `SendRejected` (routing), `DeliveryRejected`
//! (trust), `DeliveryReplayed` (replay) and `ExecutionFailed` (receiver).

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::types::{Account, ChainId, DeliveryId, GatewayId, InteropAddress, Message, MessageId, SendId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    // ── Source side ──────────────────────────────────────────────────────────
    MessageCreated {
        id: MessageId,
        message: Message,
    },
    SendRejected {
        destination: ChainId,
        reason: String,
    },
    GatewayMessageCreated {
        gateway: GatewayId,
        send_id: SendId,
        destination: InteropAddress,
    },
    MessagePosted {
        gateway: GatewayId,
        send_id: SendId,
        handle: String,
    },
    RelayRequested {
        gateway: GatewayId,
        send_id: SendId,
        handle: String,
        gas_budget: u64,
        payer: Account,
        attempt: u32,
    },
    SendExpired {
        gateway: GatewayId,
        send_id: SendId,
    },

    // ── Destination side ─────────────────────────────────────────────────────
    DeliveryReplayed {
        gateway: GatewayId,
        delivery_id: DeliveryId,
    },
    DeliveryRejected {
        gateway: GatewayId,
        reason: String,
    },
    VoteRecorded {
        source_chain: ChainId,
        id: MessageId,
        gateway: GatewayId,
        votes: usize,
        threshold: usize,
    },
    DuplicateVote {
        source_chain: ChainId,
        id: MessageId,
        gateway: GatewayId,
    },
    ConflictingVote {
        source_chain: ChainId,
        id: MessageId,
        gateway: GatewayId,
    },
    LateVote {
        source_chain: ChainId,
        id: MessageId,
        gateway: GatewayId,
    },
    QuorumReached {
        source_chain: ChainId,
        id: MessageId,
        votes: usize,
    },
    ExecutionSucceeded {
        source_chain: ChainId,
        id: MessageId,
        receiver: Account,
    },
    ExecutionFailed {
        source_chain: ChainId,
        id: MessageId,
        receiver: Account,
        reason: String,
    },
    MessageAttested {
        gateway: GatewayId,
        delivery_id: DeliveryId,
    },
    MessageValidated {
        gateway: GatewayId,
        delivery_id: DeliveryId,
    },

    // ── Administration ───────────────────────────────────────────────────────
    RemoteRouterRegistered {
        chain: ChainId,
        router: Account,
    },
    RemoteRouterReplaced {
        chain: ChainId,
        previous: Account,
        current: Account,
    },
    RemoteGatewayRegistered {
        gateway: GatewayId,
        chain: ChainId,
        address: String,
    },
    RemoteGatewayReplaced {
        gateway: GatewayId,
        chain: ChainId,
        previous: String,
        current: String,
    },
    GatewayAdded {
        gateway: GatewayId,
    },
    GatewayRemoved {
        gateway: GatewayId,
    },
    ThresholdUpdated {
        previous: usize,
        current: usize,
    },
    ChainEquivalenceRegistered {
        gateway: GatewayId,
        chain: ChainId,
        transport_chain: String,
    },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::MessageCreated { .. } => "message_created",
            Event::SendRejected { .. } => "send_rejected",
            Event::GatewayMessageCreated { .. } => "gateway_message_created",
            Event::MessagePosted { .. } => "message_posted",
            Event::RelayRequested { .. } => "relay_requested",
            Event::SendExpired { .. } => "send_expired",
            Event::DeliveryReplayed { .. } => "delivery_replayed",
            Event::DeliveryRejected { .. } => "delivery_rejected",
            Event::VoteRecorded { .. } => "vote_recorded",
            Event::DuplicateVote { .. } => "duplicate_vote",
            Event::ConflictingVote { .. } => "conflicting_vote",
            Event::LateVote { .. } => "late_vote",
            Event::QuorumReached { .. } => "quorum_reached",
            Event::ExecutionSucceeded { .. } => "execution_succeeded",
            Event::ExecutionFailed { .. } => "execution_failed",
            Event::MessageAttested { .. } => "message_attested",
            Event::MessageValidated { .. } => "message_validated",
            Event::RemoteRouterRegistered { .. } => "remote_router_registered",
            Event::RemoteRouterReplaced { .. } => "remote_router_replaced",
            Event::RemoteGatewayRegistered { .. } => "remote_gateway_registered",
            Event::RemoteGatewayReplaced { .. } => "remote_gateway_replaced",
            Event::GatewayAdded { .. } => "gateway_added",
            Event::GatewayRemoved { .. } => "gateway_removed",
            Event::ThresholdUpdated { .. } => "threshold_updated",
            Event::ChainEquivalenceRegistered { .. } => "chain_equivalence_registered",
        }
    }

    /// Events an operator should be alerted on
    pub fn is_alert(&self) -> bool {
        matches!(
            self,
            Event::SendRejected { .. }
                | Event::DeliveryRejected { .. }
                | Event::ConflictingVote { .. }
                | Event::ExecutionFailed { .. }
                | Event::SendExpired { .. }
                | Event::RemoteRouterReplaced { .. }
                | Event::RemoteGatewayReplaced { .. }
        )
    }
}

/// Events kept before the oldest are discarded
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Bounded event buffer mirrored to `tracing`.
///
/// Once `capacity` events are buffered the oldest are dropped; every event has
/// already been written to the tracing subscriber by then.
#[derive(Debug, Clone)]
pub struct EventLog {
    events: Vec<Event>,
    capacity: usize,
    dropped: u64,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: Vec::new(),
            capacity: capacity.max(1),
            dropped: 0,
        }
    }

    pub fn emit(&mut self, event: Event) {
        if event.is_alert() {
            warn!(event = event.name(), details = ?event, "aggregator alert");
        } else {
            info!(event = event.name(), details = ?event, "aggregator event");
        }
        self.events.push(event);
        self.trim();
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Take every buffered event, leaving the log empty
    pub fn drain(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    /// Append already-emitted events without logging them twice
    pub fn extend(&mut self, events: Vec<Event>) {
        self.events.extend(events);
        self.trim();
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Events discarded since the log was created
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    fn trim(&mut self) {
        let excess = self.events.len().saturating_sub(self.capacity);
        if excess > 0 {
            self.events.drain(..excess);
            self.dropped += excess as u64;
            debug!(excess, capacity = self.capacity, "event log full, dropped oldest");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_json_is_tagged() {
        let event = Event::ThresholdUpdated {
            previous: 2,
            current: 3,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "threshold_updated");
        assert_eq!(json["current"], 3);
        assert_eq!(event.name(), "threshold_updated");
    }

    #[test]
    fn test_failure_classes_are_alerts() {
        let gateway = GatewayId::new("gw");
        assert!(Event::DeliveryRejected {
            gateway: gateway.clone(),
            reason: "untrusted".into()
        }
        .is_alert());
        assert!(!Event::DeliveryReplayed {
            gateway,
            delivery_id: DeliveryId(vec![1])
        }
        .is_alert());
    }

    #[test]
    fn test_drain_empties_log() {
        let mut log = EventLog::new();
        log.emit(Event::GatewayAdded {
            gateway: GatewayId::new("gw"),
        });
        assert_eq!(log.len(), 1);
        assert_eq!(log.drain().len(), 1);
        assert!(log.is_empty());
    }

    #[test]
    fn test_log_keeps_newest_events_within_capacity() {
        let mut log = EventLog::with_capacity(3);
        for current in 1..=10 {
            log.emit(Event::ThresholdUpdated {
                previous: current - 1,
                current,
            });
        }
        assert_eq!(log.len(), 3);
        assert_eq!(log.dropped(), 7);
        assert_eq!(
            log.events()[0],
            Event::ThresholdUpdated {
                previous: 7,
                current: 8
            }
        );

        log.extend(vec![Event::GatewayAdded {
            gateway: GatewayId::new("gw"),
        }]);
        assert_eq!(log.len(), 3);
        assert!(matches!(log.events()[2], Event::GatewayAdded { .. }));
        assert_eq!(EventLog::new().capacity(), DEFAULT_EVENT_CAPACITY);
    }
}
