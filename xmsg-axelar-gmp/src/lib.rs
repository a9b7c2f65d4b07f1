//! xmsg-axelar-gmp
//!
//! Axelar General Message Passing adapter for the xmsg aggregator. Provides
//! the Axelar chain table (with CAIP-2 equivalents), GMP identifiers and the
//! [`AxelarGateway`] adapter itself.

pub mod chains;
pub mod encoding;
pub mod gateway;

pub use chains::{ChainEquivalence, ChainInfo};
pub use gateway::{AxelarConfig, AxelarGateway};

/// Transport name used in configuration (`XMSG_GATEWAYS=axelar`)
pub const TRANSPORT: &str = "axelar";
