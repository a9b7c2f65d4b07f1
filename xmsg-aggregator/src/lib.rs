//! xmsg-aggregator
//!
//! Quorum-based cross-chain messaging. A message sent through an
//! [`Aggregator`] is fanned out over every trusted gateway (one adapter per
//! transport: Axelar, Wormhole, ...). The peer aggregator on the destination
//! chain counts one vote per gateway and calls the receiver exactly once,
//! as soon as a threshold of distinct gateways delivered matching copies.
//!
//! Transport adapters implement [`Gateway`] and compose a [`GatewayCore`],
//! which owns the pending-send lifecycle, the executed-delivery set, the
//! remote gateway table and the passive-validation inbox.

pub mod adapter;
pub mod aggregator;
pub mod codec;
pub mod error;
pub mod events;
pub mod gateway;
pub mod lifecycle;
pub mod loopback;
pub mod receiver;
pub mod registry;
pub mod replay;
pub mod tally;
pub mod types;

pub use adapter::{unix_now, GatewayCore, LifecycleConfig};
pub use aggregator::{
    Aggregator, AggregatorBuilder, AggregatorConfig, DeliveryOutcome, FanOut, SentMessage,
};
pub use error::{AggregatorError, CodecError, ErrorClass, GatewayError};
pub use events::{Event, EventLog, DEFAULT_EVENT_CAPACITY};
pub use gateway::{
    ApprovedDeliveries, Delivery, DeliveryVerifier, Gateway, GatewayDestination, GatewaySource,
    Inbound, InboundMode, PreparedSend, SendRequest, TrustTransport,
};
pub use lifecycle::{PendingSend, RelayRequest, RelayState};
pub use loopback::LoopbackGateway;
pub use receiver::{
    receive_message_selector, Inbox, InboxReceiver, ReceiveCall, Receiver, ReceiverDirectory,
    ReceiverError, ReceiverTable,
};
pub use registry::{AdminAction, Authorizer, GatewayRegistry, OwnerAuthority};
pub use tally::{ExecutionOutcome, QueuedCall, TallyState, VoteTally};
pub use types::{
    Account, Attribute, ChainId, DeliveryId, Digest, Envelope, GatewayId, GatewayMessage,
    InteropAddress, Message, MessageId, SendId, ATTR_CONSISTENCY_LEVEL, ATTR_GAS_LIMIT,
};
