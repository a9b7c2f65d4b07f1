use thiserror::Error;

use crate::registry::AdminAction;
use crate::types::{Account, ChainId, GatewayId, SendId};

/// Encoding and parsing failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("decoding error: {0}")]
    Decoding(String),

    #[error("invalid chain id: {0}")]
    InvalidChainId(String),
}

/// Failures raised by a single gateway adapter
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("unsupported attribute: {0}")]
    UnsupportedAttribute(String),

    #[error("chain {0} has no equivalent on this transport")]
    UnknownChain(ChainId),

    #[error("transport chain {0} is not mapped to a known chain")]
    UnknownTransportChain(String),

    #[error("chain equivalence already registered: {0}")]
    ChainEquivalenceAlreadyRegistered(String),

    #[error("no remote gateway registered for chain {0}")]
    RemoteGatewayNotRegistered(ChainId),

    #[error("remote gateway already registered for chain {0}")]
    RemoteGatewayAlreadyRegistered(ChainId),

    #[error("delivery from unregistered remote gateway: chain={chain}, address={address}")]
    UnknownRemoteGateway { chain: ChainId, address: String },

    #[error("delivery is not addressed to this gateway: {0}")]
    Misdirected(String),

    #[error("transport verification failed: {0}")]
    VerificationFailed(String),

    #[error("unknown send: {0}")]
    UnknownSend(SendId),

    #[error("send {0} has expired")]
    SendExpired(SendId),

    #[error("send {0} has exhausted its relay attempts")]
    RelayAttemptsExhausted(SendId),

    #[error("relay for send {send_id} must raise the gas budget above {previous}, got {offered}")]
    RelayUnderpriced {
        send_id: SendId,
        previous: u64,
        offered: u64,
    },

    #[error("payload too large: {len} > {max}")]
    PayloadTooLarge { len: usize, max: usize },

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("message was not attested by this gateway")]
    NotAttested,

    #[error("attested message was already consumed")]
    AlreadyConsumed,

    #[error("unauthorized caller: {0}")]
    Unauthorized(Account),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Failures raised by the aggregator
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AggregatorError {
    #[error("no remote router registered for chain {0}")]
    UnknownRoute(ChainId),

    #[error("no gateways registered")]
    NoGateways,

    #[error("unsupported attribute: {0}")]
    UnsupportedAttribute(String),

    #[error("gateway {0} is not trusted by this aggregator")]
    UntrustedGateway(GatewayId),

    #[error("sender {sender} is not the registered router for chain {chain}")]
    UnknownSender { chain: ChainId, sender: Account },

    #[error("message addressed to {0}, not to this aggregator")]
    Misrouted(Account),

    #[error("gateway {gateway}: {source}")]
    Gateway {
        gateway: GatewayId,
        #[source]
        source: GatewayError,
    },

    #[error("unauthorized: {caller} may not {action}")]
    Unauthorized { caller: Account, action: AdminAction },

    #[error("remote router already registered for chain {0}")]
    RouterAlreadyRegistered(ChainId),

    #[error("gateway already registered: {0}")]
    GatewayAlreadyRegistered(GatewayId),

    #[error("unknown gateway: {0}")]
    UnknownGateway(GatewayId),

    #[error("invalid threshold {threshold} for {gateways} gateways")]
    InvalidThreshold { threshold: usize, gateways: usize },

    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Coarse error classes surfaced to operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Unknown destination chain or missing route; nothing was persisted
    Routing,
    /// Untrusted gateway, spoofed origin or sender
    Trust,
    /// Authorization or registry invariant violation
    Admin,
    /// Malformed input
    Malformed,
    /// Adapter-specific lifecycle failure (relay, expiry, passive validation)
    Lifecycle,
}

impl GatewayError {
    pub fn class(&self) -> ErrorClass {
        match self {
            GatewayError::UnsupportedAttribute(_)
            | GatewayError::UnknownChain(_)
            | GatewayError::RemoteGatewayNotRegistered(_) => ErrorClass::Routing,
            GatewayError::UnknownTransportChain(_)
            | GatewayError::UnknownRemoteGateway { .. }
            | GatewayError::Misdirected(_)
            | GatewayError::VerificationFailed(_) => ErrorClass::Trust,
            GatewayError::ChainEquivalenceAlreadyRegistered(_)
            | GatewayError::RemoteGatewayAlreadyRegistered(_)
            | GatewayError::Unauthorized(_) => ErrorClass::Admin,
            GatewayError::PayloadTooLarge { .. }
            | GatewayError::InvalidAddress(_)
            | GatewayError::Codec(_) => ErrorClass::Malformed,
            GatewayError::UnknownSend(_)
            | GatewayError::SendExpired(_)
            | GatewayError::RelayAttemptsExhausted(_)
            | GatewayError::RelayUnderpriced { .. }
            | GatewayError::NotAttested
            | GatewayError::AlreadyConsumed => ErrorClass::Lifecycle,
        }
    }
}

impl AggregatorError {
    pub fn class(&self) -> ErrorClass {
        match self {
            AggregatorError::UnknownRoute(_)
            | AggregatorError::NoGateways
            | AggregatorError::UnsupportedAttribute(_) => ErrorClass::Routing,
            AggregatorError::UntrustedGateway(_)
            | AggregatorError::UnknownSender { .. }
            | AggregatorError::Misrouted(_) => ErrorClass::Trust,
            AggregatorError::Gateway { source, .. } => source.class(),
            AggregatorError::Unauthorized { .. }
            | AggregatorError::RouterAlreadyRegistered(_)
            | AggregatorError::GatewayAlreadyRegistered(_)
            | AggregatorError::UnknownGateway(_)
            | AggregatorError::InvalidThreshold { .. } => ErrorClass::Admin,
            AggregatorError::Codec(_) => ErrorClass::Malformed,
        }
    }
}
