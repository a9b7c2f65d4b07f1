//! Receiver-side execution contract
//!
//! Once quorum is reached the aggregator calls the destination account's
//! `receiveMessage` entry point exactly once. The receiver signals success by
//! returning its own function selector; anything else counts as failure.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use thiserror::Error;

use crate::types::{hex_bytes, Account, Attribute, InteropAddress, MessageId};

pub const RECEIVE_MESSAGE_SIGNATURE: &str = "receiveMessage(bytes32,string,bytes,bytes[])";

/// First four bytes of `keccak256(RECEIVE_MESSAGE_SIGNATURE)`
pub fn receive_message_selector() -> [u8; 4] {
    let hash = Keccak256::digest(RECEIVE_MESSAGE_SIGNATURE.as_bytes());
    let mut selector = [0u8; 4];
    selector.copy_from_slice(&hash[..4]);
    selector
}

/// Arguments passed to a receiver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveCall {
    pub message_id: MessageId,
    /// Original sender on the source chain
    pub source: InteropAddress,
    #[serde(with = "hex_bytes")]
    pub payload: Vec<u8>,
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReceiverError {
    #[error("receiver reverted: {0}")]
    Reverted(String),

    #[error("no receiver deployed at {0}")]
    NoReceiver(Account),
}

pub trait Receiver: Send + Sync {
    fn receive_message(&mut self, call: &ReceiveCall) -> Result<[u8; 4], ReceiverError>;
}

/// Resolves destination accounts to receivers
pub trait ReceiverDirectory: Send + Sync {
    fn dispatch(&mut self, account: &Account, call: &ReceiveCall) -> Result<[u8; 4], ReceiverError>;
}

/// Map-backed receiver directory
#[derive(Default)]
pub struct ReceiverTable {
    receivers: HashMap<Account, Box<dyn Receiver>>,
}

impl ReceiverTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, account: impl Into<Account>, receiver: impl Receiver + 'static) -> Self {
        self.insert(account, receiver);
        self
    }

    pub fn insert(&mut self, account: impl Into<Account>, receiver: impl Receiver + 'static) {
        self.receivers.insert(account.into(), Box::new(receiver));
    }

    pub fn contains(&self, account: &Account) -> bool {
        self.receivers.contains_key(account)
    }
}

impl ReceiverDirectory for ReceiverTable {
    fn dispatch(&mut self, account: &Account, call: &ReceiveCall) -> Result<[u8; 4], ReceiverError> {
        match self.receivers.get_mut(account) {
            Some(receiver) => receiver.receive_message(call),
            None => Err(ReceiverError::NoReceiver(account.clone())),
        }
    }
}

/// Shared handle to the calls an [`InboxReceiver`] accepted
pub type Inbox = Arc<Mutex<Vec<ReceiveCall>>>;

/// Receiver that stores every call it accepts
pub struct InboxReceiver {
    inbox: Inbox,
    fail_with: Option<String>,
}

impl InboxReceiver {
    pub fn new(inbox: Inbox) -> Self {
        Self {
            inbox,
            fail_with: None,
        }
    }

    /// A receiver that always reverts with `reason`
    pub fn reverting(inbox: Inbox, reason: impl Into<String>) -> Self {
        Self {
            inbox,
            fail_with: Some(reason.into()),
        }
    }

    pub fn inbox(&self) -> Inbox {
        Arc::clone(&self.inbox)
    }
}

impl Receiver for InboxReceiver {
    fn receive_message(&mut self, call: &ReceiveCall) -> Result<[u8; 4], ReceiverError> {
        if let Some(reason) = &self.fail_with {
            return Err(ReceiverError::Reverted(reason.clone()));
        }
        self.inbox
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call.clone());
        Ok(receive_message_selector())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChainId;

    fn call() -> ReceiveCall {
        ReceiveCall {
            message_id: MessageId(1),
            source: InteropAddress::new(ChainId::eip155(1), "0xsender"),
            payload: b"ping".to_vec(),
            attributes: vec![],
        }
    }

    #[test]
    fn test_selector_is_stable() {
        let selector = receive_message_selector();
        assert_eq!(selector, receive_message_selector());
        assert_ne!(selector, [0u8; 4]);
    }

    #[test]
    fn test_table_dispatch() {
        let inbox = Inbox::default();
        let mut table = ReceiverTable::new().with("0xreceiver", InboxReceiver::new(inbox.clone()));

        let result = table.dispatch(&Account::new("0xRECEIVER"), &call());
        assert_eq!(result, Ok(receive_message_selector()));
        assert_eq!(inbox.lock().unwrap().len(), 1);

        let missing = table.dispatch(&Account::new("0xnobody"), &call());
        assert!(matches!(missing, Err(ReceiverError::NoReceiver(_))));
    }

    #[test]
    fn test_reverting_receiver_stores_nothing() {
        let inbox = Inbox::default();
        let mut receiver = InboxReceiver::reverting(inbox.clone(), "out of gas");
        assert!(receiver.receive_message(&call()).is_err());
        assert!(inbox.lock().unwrap().is_empty());
    }
}
