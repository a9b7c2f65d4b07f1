//! Rail configuration.

use std::env;
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use thiserror::Error;

use xmsg_aggregator::{Account, ChainId, LifecycleConfig};

// ═══════════════════════════════════════════════════════════════════════════════
// ENVIRONMENT VARIABLES
// ═══════════════════════════════════════════════════════════════════════════════

pub const CHAIN_ENV: &str = "XMSG_CHAIN";
pub const ADDRESS_ENV: &str = "XMSG_ADDRESS";
pub const OWNER_ENV: &str = "XMSG_OWNER";
pub const THRESHOLD_ENV: &str = "XMSG_THRESHOLD";
pub const GATEWAYS_ENV: &str = "XMSG_GATEWAYS";
pub const APPROVED_GATEWAYS_ENV: &str = "XMSG_APPROVED_GATEWAYS";
pub const REMOTE_ROUTERS_ENV: &str = "XMSG_REMOTE_ROUTERS";
pub const RECEIVERS_ENV: &str = "XMSG_RECEIVERS";
pub const RELAY_WINDOW_ENV: &str = "XMSG_RELAY_WINDOW_SECS";
pub const MAX_RELAY_ATTEMPTS_ENV: &str = "XMSG_MAX_RELAY_ATTEMPTS";
pub const PORT_ENV: &str = "PORT";

const DEFAULT_CHAIN: &str = "eip155:1";
const DEFAULT_GATEWAYS: &str = "loopback";
const DEFAULT_PORT: u16 = 3010;

// ═══════════════════════════════════════════════════════════════════════════════
// GATEWAY SPECS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayKind {
    Axelar,
    Wormhole,
    Loopback,
}

impl GatewayKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GatewayKind::Axelar => xmsg_axelar_gmp::TRANSPORT,
            GatewayKind::Wormhole => xmsg_wormhole::TRANSPORT,
            GatewayKind::Loopback => "loopback",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpecError {
    #[error("empty gateway entry")]
    Empty,

    #[error("unknown transport: {0}")]
    UnknownTransport(String),

    #[error("invalid remote router entry (expected chain=address): {0}")]
    InvalidRouter(String),
}

/// One `kind[:id]` entry of `XMSG_GATEWAYS`. The id defaults to the kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewaySpec {
    pub kind: GatewayKind,
    pub id: String,
}

impl FromStr for GatewaySpec {
    type Err = SpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(SpecError::Empty);
        }
        let (kind, id) = match s.split_once(':') {
            Some((kind, id)) => (kind, id.trim()),
            None => (s, s),
        };
        let kind = match kind.trim().to_ascii_lowercase().as_str() {
            "axelar" => GatewayKind::Axelar,
            "wormhole" => GatewayKind::Wormhole,
            "loopback" => GatewayKind::Loopback,
            other => return Err(SpecError::UnknownTransport(other.to_string())),
        };
        Ok(Self {
            kind,
            id: id.to_string(),
        })
    }
}

fn parse_router(entry: &str) -> Result<(ChainId, Account), SpecError> {
    let (chain, address) = entry
        .split_once('=')
        .ok_or_else(|| SpecError::InvalidRouter(entry.to_string()))?;
    let chain = ChainId::parse(chain.trim()).map_err(|_| SpecError::InvalidRouter(entry.to_string()))?;
    Ok((chain, Account::new(address.trim())))
}

// ═══════════════════════════════════════════════════════════════════════════════
// RAIL CONFIG
// ═══════════════════════════════════════════════════════════════════════════════

/// Rail configuration.
#[derive(Clone, Debug)]
pub struct RailConfig {
    /// Chain the aggregator lives on (CAIP-2).
    pub chain: ChainId,
    /// Aggregator address; peers register it as their remote router.
    pub address: Account,
    /// Administrator of the aggregator and its gateways.
    pub owner: Account,
    pub threshold: usize,
    pub gateways: Vec<GatewaySpec>,
    /// Gateway ids that only accept deliveries approved through the admin route.
    pub approved_gateways: Vec<String>,
    /// Peer aggregators known at start-up.
    pub remote_routers: Vec<(ChainId, Account)>,
    /// Accounts served by the in-memory inbox receiver.
    pub receivers: Vec<Account>,
    pub lifecycle: LifecycleConfig,
    pub port: u16,
}

impl RailConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup` instead of the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let chain = lookup(CHAIN_ENV).unwrap_or_else(|| DEFAULT_CHAIN.to_string());
        let chain = ChainId::parse(&chain).with_context(|| format!("{CHAIN_ENV} is not CAIP-2: {chain}"))?;

        let address = lookup(ADDRESS_ENV).with_context(|| format!("{ADDRESS_ENV} must be set"))?;
        let owner = lookup(OWNER_ENV).with_context(|| format!("{OWNER_ENV} must be set"))?;

        let gateways = lookup(GATEWAYS_ENV)
            .unwrap_or_else(|| DEFAULT_GATEWAYS.to_string())
            .split(',')
            .map(str::parse)
            .collect::<Result<Vec<GatewaySpec>, _>>()
            .with_context(|| format!("invalid {GATEWAYS_ENV}"))?;

        let approved_gateways: Vec<String> = lookup(APPROVED_GATEWAYS_ENV)
            .map(|value| {
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        if let Some(unknown) = approved_gateways
            .iter()
            .find(|id| !gateways.iter().any(|spec| &spec.id == *id))
        {
            bail!("{APPROVED_GATEWAYS_ENV} names unknown gateway {unknown}");
        }

        let threshold = match lookup(THRESHOLD_ENV) {
            Some(value) => value
                .trim()
                .parse()
                .with_context(|| format!("{THRESHOLD_ENV} must be an integer"))?,
            None => gateways.len(),
        };

        let remote_routers = lookup(REMOTE_ROUTERS_ENV)
            .map(|value| {
                value
                    .split(',')
                    .filter(|entry| !entry.trim().is_empty())
                    .map(parse_router)
                    .collect::<Result<Vec<_>, _>>()
            })
            .transpose()
            .with_context(|| format!("invalid {REMOTE_ROUTERS_ENV}"))?
            .unwrap_or_default();

        let receivers = lookup(RECEIVERS_ENV)
            .map(|value| {
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(Account::new)
                    .collect()
            })
            .unwrap_or_default();

        let defaults = LifecycleConfig::default();
        let lifecycle = LifecycleConfig {
            relay_window_secs: lookup(RELAY_WINDOW_ENV)
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.relay_window_secs),
            max_relay_attempts: lookup(MAX_RELAY_ATTEMPTS_ENV)
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_relay_attempts),
            ..defaults
        };

        let port: u16 = lookup(PORT_ENV)
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        Ok(Self {
            chain,
            address: Account::new(address),
            owner: Account::new(owner),
            threshold,
            gateways,
            approved_gateways,
            remote_routers,
            receivers,
            lifecycle,
            port,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<RailConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        RailConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_gateway_specs() {
        assert_eq!(
            "wormhole".parse::<GatewaySpec>().unwrap(),
            GatewaySpec {
                kind: GatewayKind::Wormhole,
                id: "wormhole".into()
            }
        );
        assert_eq!(
            " axelar:0xabc ".parse::<GatewaySpec>().unwrap(),
            GatewaySpec {
                kind: GatewayKind::Axelar,
                id: "0xabc".into()
            }
        );
        assert_eq!(
            "ccip".parse::<GatewaySpec>(),
            Err(SpecError::UnknownTransport("ccip".into()))
        );
        assert_eq!("".parse::<GatewaySpec>(), Err(SpecError::Empty));
    }

    #[test]
    fn test_defaults() {
        let config = config(&[(ADDRESS_ENV, "0xAgg"), (OWNER_ENV, "0xowner")]).unwrap();
        assert_eq!(config.chain, ChainId::eip155(1));
        assert_eq!(config.address, Account::new("0xagg"));
        assert_eq!(config.gateways.len(), 1);
        assert_eq!(config.gateways[0].kind, GatewayKind::Loopback);
        assert!(config.approved_gateways.is_empty());
        assert_eq!(config.threshold, 1);
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.lifecycle, LifecycleConfig::default());
    }

    #[test]
    fn test_full_config() {
        let config = config(&[
            (CHAIN_ENV, "eip155:10"),
            (ADDRESS_ENV, "0xagg"),
            (OWNER_ENV, "0xowner"),
            (GATEWAYS_ENV, "axelar,wormhole,loopback:local"),
            (APPROVED_GATEWAYS_ENV, "axelar, local"),
            (THRESHOLD_ENV, "2"),
            (REMOTE_ROUTERS_ENV, "eip155:1=0xpeer, eip155:8453=0xbase"),
            (RECEIVERS_ENV, "0xapp,0xother"),
            (RELAY_WINDOW_ENV, "600"),
            (MAX_RELAY_ATTEMPTS_ENV, "2"),
            (PORT_ENV, "8080"),
        ])
        .unwrap();

        assert_eq!(config.gateways.len(), 3);
        assert_eq!(config.gateways[2].id, "local");
        assert_eq!(config.approved_gateways, vec!["axelar", "local"]);
        assert_eq!(config.threshold, 2);
        assert_eq!(config.remote_routers[1], (ChainId::eip155(8453), Account::new("0xbase")));
        assert_eq!(config.receivers.len(), 2);
        assert_eq!(config.lifecycle.relay_window_secs, 600);
        assert_eq!(config.lifecycle.max_relay_attempts, 2);
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn test_required_and_invalid_values() {
        assert!(config(&[(OWNER_ENV, "0xowner")]).is_err());
        assert!(config(&[(ADDRESS_ENV, "0xagg"), (OWNER_ENV, "0xowner"), (CHAIN_ENV, "mainnet")]).is_err());
        assert!(config(&[(ADDRESS_ENV, "0xagg"), (OWNER_ENV, "0xowner"), (THRESHOLD_ENV, "two")]).is_err());
        assert!(config(&[
            (ADDRESS_ENV, "0xagg"),
            (OWNER_ENV, "0xowner"),
            (REMOTE_ROUTERS_ENV, "eip155:1")
        ])
        .is_err());
        assert!(config(&[
            (ADDRESS_ENV, "0xagg"),
            (OWNER_ENV, "0xowner"),
            (APPROVED_GATEWAYS_ENV, "wormhole")
        ])
        .is_err());
    }
}
