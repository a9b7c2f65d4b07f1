//! Wormhole chain ids and their CAIP-2 equivalents

use std::collections::BTreeMap;

use xmsg_aggregator::{ChainId, GatewayError};

pub const SOLANA: u16 = 1;
pub const ETHEREUM: u16 = 2;
pub const BSC: u16 = 4;
pub const POLYGON: u16 = 5;
pub const AVALANCHE: u16 = 6;
pub const ARBITRUM: u16 = 23;
pub const OPTIMISM: u16 = 24;
pub const BASE: u16 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WormholeChain {
    pub chain_id: u16,
    pub name: &'static str,
    pub caip2: &'static str,
}

const KNOWN_CHAINS: &[WormholeChain] = &[
    WormholeChain {
        chain_id: SOLANA,
        name: "solana",
        caip2: "solana:5eykt4UsFv8P8NJdTREpY1vzqKqZKvdp",
    },
    WormholeChain {
        chain_id: ETHEREUM,
        name: "ethereum",
        caip2: "eip155:1",
    },
    WormholeChain {
        chain_id: BSC,
        name: "bsc",
        caip2: "eip155:56",
    },
    WormholeChain {
        chain_id: POLYGON,
        name: "polygon",
        caip2: "eip155:137",
    },
    WormholeChain {
        chain_id: AVALANCHE,
        name: "avalanche",
        caip2: "eip155:43114",
    },
    WormholeChain {
        chain_id: ARBITRUM,
        name: "arbitrum",
        caip2: "eip155:42161",
    },
    WormholeChain {
        chain_id: OPTIMISM,
        name: "optimism",
        caip2: "eip155:10",
    },
    WormholeChain {
        chain_id: BASE,
        name: "base",
        caip2: "eip155:8453",
    },
];

pub fn known_chains() -> &'static [WormholeChain] {
    KNOWN_CHAINS
}

/// Two-way CAIP-2 ↔ Wormhole chain id mapping. Extra entries are write-once.
#[derive(Debug, Clone, Default)]
pub struct ChainEquivalence {
    to_wormhole: BTreeMap<ChainId, u16>,
    from_wormhole: BTreeMap<u16, ChainId>,
}

impl ChainEquivalence {
    pub fn to_wormhole(&self, chain: &ChainId) -> Option<u16> {
        KNOWN_CHAINS
            .iter()
            .find(|c| c.caip2 == chain.as_str())
            .map(|c| c.chain_id)
            .or_else(|| self.to_wormhole.get(chain).copied())
    }

    pub fn from_wormhole(&self, chain_id: u16) -> Option<ChainId> {
        KNOWN_CHAINS
            .iter()
            .find(|c| c.chain_id == chain_id)
            .and_then(|c| ChainId::parse(c.caip2).ok())
            .or_else(|| self.from_wormhole.get(&chain_id).cloned())
    }

    pub fn register(&mut self, chain: ChainId, chain_id: u16) -> Result<(), GatewayError> {
        if self.to_wormhole(&chain).is_some() {
            return Err(GatewayError::ChainEquivalenceAlreadyRegistered(chain.to_string()));
        }
        if self.from_wormhole(chain_id).is_some() {
            return Err(GatewayError::ChainEquivalenceAlreadyRegistered(chain_id.to_string()));
        }
        self.to_wormhole.insert(chain.clone(), chain_id);
        self.from_wormhole.insert(chain_id, chain);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_chain_ids() {
        let table = ChainEquivalence::default();
        assert_eq!(table.to_wormhole(&ChainId::eip155(1)), Some(ETHEREUM));
        assert_eq!(table.to_wormhole(&ChainId::eip155(8453)), Some(BASE));
        assert_eq!(table.from_wormhole(ARBITRUM), Some(ChainId::eip155(42161)));
        assert_eq!(table.from_wormhole(SOLANA).unwrap().namespace(), "solana");
        assert_eq!(table.from_wormhole(9999), None);
    }

    #[test]
    fn test_extra_equivalence() {
        let mut table = ChainEquivalence::default();
        let sei = ChainId::parse("eip155:1329").unwrap();

        table.register(sei.clone(), 40).unwrap();
        assert_eq!(table.from_wormhole(40), Some(sei.clone()));
        assert!(table.register(sei, 41).is_err());
        assert!(table.register(ChainId::parse("eip155:7").unwrap(), ETHEREUM).is_err());
    }
}
