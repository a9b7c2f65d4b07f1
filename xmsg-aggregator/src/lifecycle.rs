//! Pending-send lifecycle shared by every gateway adapter
//!
//! ```text
//! Created ──► Posted ──► Relayed ──► Relayed (retry, higher gas)
//!    │          │           │
//!    └──────────┴───────────┴──────► Expired (terminal)
//! ```

use serde::{Deserialize, Serialize};

use crate::error::GatewayError;
use crate::types::{hex_bytes, Account, Attribute, InteropAddress, SendId};

/// Parameters for financing a relay attempt. Any account may pay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayRequest {
    pub gas_budget: u64,
    pub payer: Account,
    pub refund_address: Account,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RelayState {
    /// Accepted, transport hand-off not yet paid for
    Created,
    /// Discoverable by off-chain relayers
    Posted { handle: String },
    /// Delivery explicitly triggered; `handle` is the latest attempt
    Relayed {
        handle: String,
        gas_budget: u64,
        payer: Account,
        refund_address: Account,
    },
    Expired,
}

impl RelayState {
    pub fn name(&self) -> &'static str {
        match self {
            RelayState::Created => "created",
            RelayState::Posted { .. } => "posted",
            RelayState::Relayed { .. } => "relayed",
            RelayState::Expired => "expired",
        }
    }

    pub fn handle(&self) -> Option<&str> {
        match self {
            RelayState::Posted { handle } | RelayState::Relayed { handle, .. } => Some(handle),
            RelayState::Created | RelayState::Expired => None,
        }
    }

    pub fn is_expired(&self) -> bool {
        matches!(self, RelayState::Expired)
    }
}

/// Gateway-owned record of one send, kept until it can no longer be relayed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingSend {
    pub send_id: SendId,
    pub sender: Account,
    pub destination: InteropAddress,
    #[serde(with = "hex_bytes")]
    pub payload: Vec<u8>,
    pub attributes: Vec<Attribute>,
    /// Destination chain in the transport's own naming
    pub transport_chain: String,
    /// Transport wire payload
    #[serde(with = "hex_bytes")]
    pub wire: Vec<u8>,
    #[serde(flatten)]
    pub state: RelayState,
    pub created_at: u64,
    pub relay_attempts: u32,
}

impl PendingSend {
    /// `Created → Posted`. Returns false if the send already moved past `Created`.
    pub fn post(&mut self, handle: String) -> bool {
        if self.state != RelayState::Created {
            return false;
        }
        self.state = RelayState::Posted { handle };
        true
    }

    /// Record a relay attempt.
    ///
    /// `handle_for` derives the transport handle from the record and the
    /// 1-based attempt number. Exhausting `max_attempts` expires the send.
    pub fn relay(
        &mut self,
        request: RelayRequest,
        max_attempts: u32,
        handle_for: impl FnOnce(&PendingSend, u32) -> String,
    ) -> Result<String, GatewayError> {
        if self.state.is_expired() {
            return Err(GatewayError::SendExpired(self.send_id));
        }
        if self.relay_attempts >= max_attempts {
            self.state = RelayState::Expired;
            return Err(GatewayError::RelayAttemptsExhausted(self.send_id));
        }
        if let RelayState::Relayed { gas_budget, .. } = &self.state {
            if request.gas_budget <= *gas_budget {
                return Err(GatewayError::RelayUnderpriced {
                    send_id: self.send_id,
                    previous: *gas_budget,
                    offered: request.gas_budget,
                });
            }
        }

        let attempt = self.relay_attempts + 1;
        let handle = handle_for(self, attempt);
        self.relay_attempts = attempt;
        self.state = RelayState::Relayed {
            handle: handle.clone(),
            gas_budget: request.gas_budget,
            payer: request.payer,
            refund_address: request.refund_address,
        };
        Ok(handle)
    }

    /// Expire the send if it has outlived the relay window
    pub fn expire_if_stale(&mut self, now: u64, relay_window_secs: u64) -> bool {
        if self.state.is_expired() || now.saturating_sub(self.created_at) < relay_window_secs {
            return false;
        }
        self.state = RelayState::Expired;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChainId;

    fn pending() -> PendingSend {
        PendingSend {
            send_id: SendId(1),
            sender: Account::new("0xsender"),
            destination: InteropAddress::new(ChainId::eip155(10), "0xpeer"),
            payload: vec![1, 2, 3],
            attributes: vec![],
            transport_chain: "optimism".into(),
            wire: vec![],
            state: RelayState::Created,
            created_at: 1_000,
            relay_attempts: 0,
        }
    }

    fn relay(gas: u64) -> RelayRequest {
        RelayRequest {
            gas_budget: gas,
            payer: Account::new("0xrelayer"),
            refund_address: Account::new("0xrefund"),
        }
    }

    #[test]
    fn test_retry_requires_higher_gas() {
        let mut send = pending();
        let first = send
            .relay(relay(100), 3, |_, attempt| format!("h{attempt}"))
            .unwrap();
        assert_eq!(first, "h1");

        let err = send
            .relay(relay(100), 3, |_, attempt| format!("h{attempt}"))
            .unwrap_err();
        assert!(matches!(err, GatewayError::RelayUnderpriced { previous: 100, .. }));
        assert_eq!(send.relay_attempts, 1);

        let second = send
            .relay(relay(200), 3, |_, attempt| format!("h{attempt}"))
            .unwrap();
        assert_eq!(second, "h2");
        assert_eq!(send.state.handle(), Some("h2"));
    }

    #[test]
    fn test_attempts_exhausted_expires() {
        let mut send = pending();
        send.relay(relay(1), 1, |_, _| "h".into()).unwrap();
        let err = send.relay(relay(2), 1, |_, _| "h".into()).unwrap_err();
        assert_eq!(err, GatewayError::RelayAttemptsExhausted(SendId(1)));
        assert!(send.state.is_expired());

        let err = send.relay(relay(3), 5, |_, _| "h".into()).unwrap_err();
        assert_eq!(err, GatewayError::SendExpired(SendId(1)));
    }

    #[test]
    fn test_post_only_from_created() {
        let mut send = pending();
        assert!(send.post("seq-1".into()));
        assert!(!send.post("seq-2".into()));
        assert_eq!(send.state.handle(), Some("seq-1"));
    }

    #[test]
    fn test_expire_if_stale() {
        let mut send = pending();
        assert!(!send.expire_if_stale(1_500, 600));
        assert!(send.expire_if_stale(1_600, 600));
        assert!(!send.expire_if_stale(9_999, 600));
        assert_eq!(send.state, RelayState::Expired);
    }
}
