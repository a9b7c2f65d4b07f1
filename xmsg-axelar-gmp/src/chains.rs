//! Axelar chain names and their CAIP-2 equivalents
//!
//! Axelar addresses chains by lowercase names (`ethereum`, `arbitrum`, ...).
//! The aggregator speaks CAIP-2, so every adapter keeps an equivalence table:
//! the built-in entries below plus extra ones registered by the owner.

use std::collections::BTreeMap;

use xmsg_aggregator::{ChainId, GatewayError};

// ═══════════════════════════════════════════════════════════════════════════════
// EVM CHAIN IDENTIFIERS
// ═══════════════════════════════════════════════════════════════════════════════

pub const ETHEREUM: &str = "ethereum";
pub const ETHEREUM_SEPOLIA: &str = "ethereum-sepolia";
pub const ARBITRUM: &str = "arbitrum";
pub const OPTIMISM: &str = "optimism";
pub const BASE: &str = "base";
pub const POLYGON: &str = "polygon";
pub const AVALANCHE: &str = "avalanche";
pub const BINANCE: &str = "binance";
pub const SCROLL: &str = "scroll";
pub const LINEA: &str = "linea";
pub const BLAST: &str = "blast";

// ═══════════════════════════════════════════════════════════════════════════════
// COSMOS CHAIN IDENTIFIERS
// ═══════════════════════════════════════════════════════════════════════════════

pub const OSMOSIS: &str = "osmosis";
pub const NEUTRON: &str = "neutron";

// ═══════════════════════════════════════════════════════════════════════════════
// CHAIN INFO
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainInfo {
    /// Axelar chain identifier
    pub chain_name: &'static str,
    pub display_name: &'static str,
    /// CAIP-2 identifier
    pub caip2: &'static str,
    /// Default gas limit for GMP calls
    pub default_gas: u64,
    pub production_ready: bool,
}

const KNOWN_CHAINS: &[ChainInfo] = &[
    ChainInfo {
        chain_name: ETHEREUM,
        display_name: "Ethereum",
        caip2: "eip155:1",
        default_gas: 200_000,
        production_ready: true,
    },
    ChainInfo {
        chain_name: ETHEREUM_SEPOLIA,
        display_name: "Ethereum Sepolia",
        caip2: "eip155:11155111",
        default_gas: 200_000,
        production_ready: false,
    },
    ChainInfo {
        chain_name: ARBITRUM,
        display_name: "Arbitrum One",
        caip2: "eip155:42161",
        default_gas: 1_000_000,
        production_ready: true,
    },
    ChainInfo {
        chain_name: OPTIMISM,
        display_name: "Optimism",
        caip2: "eip155:10",
        default_gas: 500_000,
        production_ready: true,
    },
    ChainInfo {
        chain_name: BASE,
        display_name: "Base",
        caip2: "eip155:8453",
        default_gas: 500_000,
        production_ready: true,
    },
    ChainInfo {
        chain_name: POLYGON,
        display_name: "Polygon",
        caip2: "eip155:137",
        default_gas: 300_000,
        production_ready: true,
    },
    ChainInfo {
        chain_name: AVALANCHE,
        display_name: "Avalanche",
        caip2: "eip155:43114",
        default_gas: 300_000,
        production_ready: true,
    },
    ChainInfo {
        chain_name: BINANCE,
        display_name: "BNB Chain",
        caip2: "eip155:56",
        default_gas: 300_000,
        production_ready: true,
    },
    ChainInfo {
        chain_name: SCROLL,
        display_name: "Scroll",
        caip2: "eip155:534352",
        default_gas: 500_000,
        production_ready: true,
    },
    ChainInfo {
        chain_name: LINEA,
        display_name: "Linea",
        caip2: "eip155:59144",
        default_gas: 500_000,
        production_ready: true,
    },
    ChainInfo {
        chain_name: BLAST,
        display_name: "Blast",
        caip2: "eip155:81457",
        default_gas: 500_000,
        production_ready: true,
    },
    ChainInfo {
        chain_name: OSMOSIS,
        display_name: "Osmosis",
        caip2: "cosmos:osmosis-1",
        default_gas: 500_000,
        production_ready: true,
    },
    ChainInfo {
        chain_name: NEUTRON,
        display_name: "Neutron",
        caip2: "cosmos:neutron-1",
        default_gas: 500_000,
        production_ready: true,
    },
];

/// Get info for a known Axelar chain name
pub fn get_chain_info(chain_name: &str) -> Option<&'static ChainInfo> {
    KNOWN_CHAINS.iter().find(|c| c.chain_name == chain_name)
}

/// Get info for a known CAIP-2 chain
pub fn chain_info_for(chain: &ChainId) -> Option<&'static ChainInfo> {
    KNOWN_CHAINS.iter().find(|c| c.caip2 == chain.as_str())
}

pub fn production_chains() -> impl Iterator<Item = &'static ChainInfo> {
    KNOWN_CHAINS.iter().filter(|c| c.production_ready)
}

// ═══════════════════════════════════════════════════════════════════════════════
// AXELAR CONTRACT ADDRESSES
// ═══════════════════════════════════════════════════════════════════════════════

/// Axelar Gateway contract addresses (mainnet)
pub mod gateway_addresses {
    pub const ETHEREUM: &str = "0x4F4495243837681061C4743b74B3eEdf548D56A5";
    pub const ARBITRUM: &str = "0xe432150cce91c13a887f7D836923d5597adD8E31";
    pub const OPTIMISM: &str = "0xe432150cce91c13a887f7D836923d5597adD8E31";
    pub const BASE: &str = "0xe432150cce91c13a887f7D836923d5597adD8E31";
    pub const POLYGON: &str = "0x6f015F16De9fC8791b234eF68D486d2bF203FBA8";
    pub const AVALANCHE: &str = "0x5029C0EFf6C34351a0CEc334542cDb22c7928f78";
}

/// Axelar Gas Service contract address, identical on every EVM mainnet
pub const GAS_SERVICE: &str = "0x2d5d7d31F671F86C782533cc367F14109a082712";

pub fn get_gateway_address(chain_name: &str) -> Option<&'static str> {
    match chain_name {
        ETHEREUM => Some(gateway_addresses::ETHEREUM),
        ARBITRUM => Some(gateway_addresses::ARBITRUM),
        OPTIMISM => Some(gateway_addresses::OPTIMISM),
        BASE => Some(gateway_addresses::BASE),
        POLYGON => Some(gateway_addresses::POLYGON),
        AVALANCHE => Some(gateway_addresses::AVALANCHE),
        _ => None,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// EQUIVALENCE TABLE
// ═══════════════════════════════════════════════════════════════════════════════

/// Two-way CAIP-2 ↔ Axelar name mapping. Extra entries are write-once.
#[derive(Debug, Clone, Default)]
pub struct ChainEquivalence {
    to_axelar: BTreeMap<ChainId, String>,
    from_axelar: BTreeMap<String, ChainId>,
}

impl ChainEquivalence {
    pub fn to_axelar(&self, chain: &ChainId) -> Option<String> {
        chain_info_for(chain)
            .map(|info| info.chain_name.to_string())
            .or_else(|| self.to_axelar.get(chain).cloned())
    }

    pub fn from_axelar(&self, chain_name: &str) -> Option<ChainId> {
        get_chain_info(chain_name)
            .and_then(|info| ChainId::parse(info.caip2).ok())
            .or_else(|| self.from_axelar.get(chain_name).cloned())
    }

    pub fn register(&mut self, chain: ChainId, chain_name: &str) -> Result<(), GatewayError> {
        if self.to_axelar(&chain).is_some() {
            return Err(GatewayError::ChainEquivalenceAlreadyRegistered(chain.to_string()));
        }
        if self.from_axelar(chain_name).is_some() {
            return Err(GatewayError::ChainEquivalenceAlreadyRegistered(chain_name.to_string()));
        }
        self.to_axelar.insert(chain.clone(), chain_name.to_string());
        self.from_axelar.insert(chain_name.to_string(), chain);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_info() {
        let eth = get_chain_info(ETHEREUM).unwrap();
        assert_eq!(eth.caip2, "eip155:1");
        assert!(eth.production_ready);

        let arbitrum = chain_info_for(&ChainId::eip155(42161)).unwrap();
        assert_eq!(arbitrum.chain_name, ARBITRUM);
        assert!(get_chain_info("unknown").is_none());
        assert!(production_chains().all(|c| c.chain_name != ETHEREUM_SEPOLIA));
    }

    #[test]
    fn test_gateway_addresses() {
        assert!(get_gateway_address(ETHEREUM).is_some());
        assert!(get_gateway_address("unknown").is_none());
    }

    #[test]
    fn test_builtin_equivalence_round_trips() {
        let table = ChainEquivalence::default();
        for info in production_chains() {
            let chain = table.from_axelar(info.chain_name).unwrap();
            assert_eq!(table.to_axelar(&chain).as_deref(), Some(info.chain_name));
        }
    }

    #[test]
    fn test_extra_equivalence_is_write_once() {
        let mut table = ChainEquivalence::default();
        let flow = ChainId::parse("eip155:747").unwrap();

        table.register(flow.clone(), "flow").unwrap();
        assert_eq!(table.to_axelar(&flow).as_deref(), Some("flow"));
        assert_eq!(table.from_axelar("flow"), Some(flow.clone()));

        assert!(table.register(flow, "flow-evm").is_err());
        assert!(table
            .register(ChainId::eip155(1), "mainnet")
            .is_err());
        assert!(table
            .register(ChainId::parse("eip155:999").unwrap(), ETHEREUM)
            .is_err());
    }
}
