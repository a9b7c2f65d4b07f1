//! xmsg-wormhole
//!
//! Wormhole adapter for the xmsg aggregator: the Wormhole chain id table,
//! the VAA body format and the [`WormholeGateway`] adapter.

pub mod chains;
pub mod gateway;
pub mod vaa;

pub use chains::{ChainEquivalence, WormholeChain};
pub use gateway::{WormholeConfig, WormholeGateway};
pub use vaa::{emitter_address, emitter_hex, ConsistencyLevel, VaaBody, WormholePayload};

/// Transport name used in configuration (`XMSG_GATEWAYS=wormhole`)
pub const TRANSPORT: &str = "wormhole";
