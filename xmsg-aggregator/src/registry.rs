//! Gateway registry and administrative authorization
//!
//! Holds the remote router table (one peer aggregator per chain), the ordered
//! set of trusted local gateways and the quorum threshold. Every mutation is
//! checked here; authorization is decided by an injected [`Authorizer`].

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::AggregatorError;
use crate::types::{Account, ChainId, GatewayId};

// ═══════════════════════════════════════════════════════════════════════════════
// AUTHORIZATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Administrative operations subject to authorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminAction {
    RegisterRemoteRouter,
    ReplaceRemoteRouter,
    AddGateway,
    RemoveGateway,
    SetThreshold,
    RegisterRemoteGateway,
    ReplaceRemoteGateway,
    RegisterChainEquivalence,
    ApproveDelivery,
}

impl fmt::Display for AdminAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AdminAction::RegisterRemoteRouter => "register remote router",
            AdminAction::ReplaceRemoteRouter => "replace remote router",
            AdminAction::AddGateway => "add gateway",
            AdminAction::RemoveGateway => "remove gateway",
            AdminAction::SetThreshold => "set threshold",
            AdminAction::RegisterRemoteGateway => "register remote gateway",
            AdminAction::ReplaceRemoteGateway => "replace remote gateway",
            AdminAction::RegisterChainEquivalence => "register chain equivalence",
            AdminAction::ApproveDelivery => "approve delivery",
        };
        f.write_str(name)
    }
}

/// Decides whether a caller may perform an administrative action
pub trait Authorizer: Send + Sync {
    fn authorize(&self, caller: &Account, action: AdminAction) -> bool;
}

/// Single-owner authorization: the owner may do everything, nobody else anything
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerAuthority {
    pub owner: Account,
}

impl OwnerAuthority {
    pub fn new(owner: impl Into<Account>) -> Self {
        Self {
            owner: owner.into(),
        }
    }
}

impl Authorizer for OwnerAuthority {
    fn authorize(&self, caller: &Account, _action: AdminAction) -> bool {
        *caller == self.owner
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// REGISTRY
// ═══════════════════════════════════════════════════════════════════════════════

/// Remote routers, trusted gateways and the quorum threshold
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayRegistry {
    remote_routers: BTreeMap<ChainId, Account>,
    gateways: Vec<GatewayId>,
    threshold: usize,
}

impl GatewayRegistry {
    /// Create an empty registry. The threshold is validated once gateways exist.
    pub fn new(threshold: usize) -> Self {
        Self {
            remote_routers: BTreeMap::new(),
            gateways: Vec::new(),
            threshold,
        }
    }

    pub fn remote_router(&self, chain: &ChainId) -> Option<&Account> {
        self.remote_routers.get(chain)
    }

    pub fn remote_routers(&self) -> &BTreeMap<ChainId, Account> {
        &self.remote_routers
    }

    pub fn gateways(&self) -> &[GatewayId] {
        &self.gateways
    }

    pub fn is_trusted(&self, gateway: &GatewayId) -> bool {
        self.gateways.contains(gateway)
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Register the peer aggregator for a chain. Never overwrites.
    pub fn register_remote_router(
        &mut self,
        chain: ChainId,
        router: Account,
    ) -> Result<(), AggregatorError> {
        if self.remote_routers.contains_key(&chain) {
            return Err(AggregatorError::RouterAlreadyRegistered(chain));
        }
        self.remote_routers.insert(chain, router);
        Ok(())
    }

    /// Explicitly replace an existing router, returning the previous one
    pub fn replace_remote_router(
        &mut self,
        chain: ChainId,
        router: Account,
    ) -> Result<Account, AggregatorError> {
        match self.remote_routers.get_mut(&chain) {
            Some(current) => Ok(std::mem::replace(current, router)),
            None => Err(AggregatorError::UnknownRoute(chain)),
        }
    }

    pub fn add_gateway(&mut self, gateway: GatewayId) -> Result<(), AggregatorError> {
        if self.is_trusted(&gateway) {
            return Err(AggregatorError::GatewayAlreadyRegistered(gateway));
        }
        self.gateways.push(gateway);
        Ok(())
    }

    /// Remove a gateway. Refuses if the remaining set could no longer reach the threshold.
    pub fn remove_gateway(&mut self, gateway: &GatewayId) -> Result<(), AggregatorError> {
        let index = self
            .gateways
            .iter()
            .position(|g| g == gateway)
            .ok_or_else(|| AggregatorError::UnknownGateway(gateway.clone()))?;

        let remaining = self.gateways.len() - 1;
        if self.threshold > remaining {
            return Err(AggregatorError::InvalidThreshold {
                threshold: self.threshold,
                gateways: remaining,
            });
        }

        self.gateways.remove(index);
        Ok(())
    }

    /// Set the quorum threshold (`1 ≤ threshold ≤ |gateways|`)
    pub fn set_threshold(&mut self, threshold: usize) -> Result<(), AggregatorError> {
        validate_threshold(threshold, self.gateways.len())?;
        self.threshold = threshold;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), AggregatorError> {
        validate_threshold(self.threshold, self.gateways.len())
    }
}

fn validate_threshold(threshold: usize, gateways: usize) -> Result<(), AggregatorError> {
    if threshold == 0 || threshold > gateways {
        return Err(AggregatorError::InvalidThreshold {
            threshold,
            gateways,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_with(n: usize, threshold: usize) -> GatewayRegistry {
        let mut registry = GatewayRegistry::new(threshold);
        for i in 1..=n {
            registry.add_gateway(GatewayId::new(format!("gw-{i}"))).unwrap();
        }
        registry
    }

    #[test]
    fn test_remote_router_is_write_once() {
        let mut registry = GatewayRegistry::new(1);
        let chain = ChainId::eip155(10);

        registry
            .register_remote_router(chain.clone(), Account::new("0xaaa"))
            .unwrap();
        let err = registry
            .register_remote_router(chain.clone(), Account::new("0xbbb"))
            .unwrap_err();
        assert_eq!(err, AggregatorError::RouterAlreadyRegistered(chain.clone()));
        assert_eq!(registry.remote_router(&chain), Some(&Account::new("0xaaa")));

        let previous = registry
            .replace_remote_router(chain.clone(), Account::new("0xbbb"))
            .unwrap();
        assert_eq!(previous, Account::new("0xaaa"));
        assert_eq!(registry.remote_router(&chain), Some(&Account::new("0xbbb")));
    }

    #[test]
    fn test_replace_requires_existing_router() {
        let mut registry = GatewayRegistry::new(1);
        let err = registry
            .replace_remote_router(ChainId::eip155(1), Account::new("0x01"))
            .unwrap_err();
        assert!(matches!(err, AggregatorError::UnknownRoute(_)));
    }

    #[test]
    fn test_threshold_bounds() {
        let mut registry = registry_with(3, 2);
        assert!(registry.validate().is_ok());

        assert!(registry.set_threshold(0).is_err());
        assert!(registry.set_threshold(4).is_err());
        registry.set_threshold(3).unwrap();
        assert_eq!(registry.threshold(), 3);
    }

    #[test]
    fn test_remove_gateway_keeps_threshold_reachable() {
        let mut registry = registry_with(3, 3);
        let err = registry.remove_gateway(&GatewayId::new("gw-1")).unwrap_err();
        assert_eq!(
            err,
            AggregatorError::InvalidThreshold {
                threshold: 3,
                gateways: 2
            }
        );

        registry.set_threshold(2).unwrap();
        registry.remove_gateway(&GatewayId::new("gw-1")).unwrap();
        assert!(!registry.is_trusted(&GatewayId::new("gw-1")));
        assert!(matches!(
            registry.remove_gateway(&GatewayId::new("gw-1")),
            Err(AggregatorError::UnknownGateway(_))
        ));
    }

    #[test]
    fn test_duplicate_gateway_rejected() {
        let mut registry = registry_with(1, 1);
        assert!(matches!(
            registry.add_gateway(GatewayId::new("gw-1")),
            Err(AggregatorError::GatewayAlreadyRegistered(_))
        ));
    }

    #[test]
    fn test_owner_authority() {
        let authority = OwnerAuthority::new("0xowner");
        assert!(authority.authorize(&Account::new("0xOWNER"), AdminAction::SetThreshold));
        assert!(!authority.authorize(&Account::new("0xmallory"), AdminAction::SetThreshold));
    }
}
