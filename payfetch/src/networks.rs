//! Well-known network and USDC deployment tables.
//!
//! Maps the human-readable network names that appear in V1 wire formats
//! (`"base"`) to CAIP chain ids, and records where USDC lives on each
//! supported chain. Addresses stay opaque strings here: the engine reads
//! balances and forwards addresses, it never constructs on-chain types.

use crate::chain::ChainId;

/// A known network definition with its chain id and human-readable name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkInfo {
    /// Human-readable network name (e.g. "base-sepolia").
    pub name: &'static str,
    /// CAIP namespace (e.g. "eip155", "solana").
    pub namespace: &'static str,
    /// Chain reference (e.g. "8453", or the Solana genesis hash).
    pub reference: &'static str,
}

impl NetworkInfo {
    /// Creates a [`ChainId`] from this network info.
    #[must_use]
    pub fn chain_id(&self) -> ChainId {
        ChainId::new(self.namespace, self.reference)
    }
}

/// Solana mainnet genesis hash reference.
pub const SOLANA_MAINNET: &str = "5eykt4UsFv8P8NJdTREpY1vzqKqZKvdp";

/// Solana devnet genesis hash reference.
pub const SOLANA_DEVNET: &str = "EtWTRABZaYq6iMfeYKouRu166VU2xqa1";

/// Networks the engine knows by name.
pub static KNOWN_NETWORKS: &[NetworkInfo] = &[
    NetworkInfo {
        name: "base",
        namespace: "eip155",
        reference: "8453",
    },
    NetworkInfo {
        name: "base-sepolia",
        namespace: "eip155",
        reference: "84532",
    },
    NetworkInfo {
        name: "solana",
        namespace: "solana",
        reference: SOLANA_MAINNET,
    },
    NetworkInfo {
        name: "solana-devnet",
        namespace: "solana",
        reference: SOLANA_DEVNET,
    },
];

/// USDC contract addresses on EVM chains, keyed by `eip155` reference.
pub static EVM_USDC_CONTRACTS: &[(&str, &str)] = &[
    ("8453", "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913"),
    ("84532", "0x036CbD53842c5426634e7929541eC2318f3dCF7e"),
];

/// USDC mint addresses on Solana chains, keyed by genesis reference.
pub static SOLANA_USDC_MINTS: &[(&str, &str)] = &[
    (SOLANA_MAINNET, "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v"),
    (SOLANA_DEVNET, "4zMMC9srt5Ri5X14GAgXhaHii3GnPAEERYPJgZJDncDU"),
];

/// Looks up a [`ChainId`] by its human-readable network name.
#[must_use]
pub fn chain_id_by_name(name: &str) -> Option<ChainId> {
    KNOWN_NETWORKS
        .iter()
        .find(|info| info.name == name)
        .map(NetworkInfo::chain_id)
}

/// Looks up the human-readable name of a chain id, if it has one.
#[must_use]
pub fn name_by_chain_id(chain_id: &ChainId) -> Option<&'static str> {
    KNOWN_NETWORKS
        .iter()
        .find(|info| info.namespace == chain_id.namespace() && info.reference == chain_id.reference())
        .map(|info| info.name)
}

/// Returns the USDC contract or mint address on the given chain, if known.
///
/// Unknown chains return `None`; balance queries then degrade to an
/// unknown balance instead of failing.
#[must_use]
pub fn usdc_deployment(chain_id: &ChainId) -> Option<&'static str> {
    let table = match chain_id.namespace() {
        "eip155" => EVM_USDC_CONTRACTS,
        "solana" => SOLANA_USDC_MINTS,
        _ => return None,
    };
    table
        .iter()
        .find(|(reference, _)| *reference == chain_id.reference())
        .map(|(_, address)| *address)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_id_by_name() {
        let base = chain_id_by_name("base").unwrap();
        assert_eq!(base.to_string(), "eip155:8453");

        let base_sepolia = chain_id_by_name("base-sepolia").unwrap();
        assert_eq!(base_sepolia.to_string(), "eip155:84532");

        let solana = chain_id_by_name("solana").unwrap();
        assert_eq!(solana.namespace(), "solana");
        assert_eq!(solana.reference(), SOLANA_MAINNET);

        assert!(chain_id_by_name("unknown").is_none());
    }

    #[test]
    fn test_name_by_chain_id() {
        let id = ChainId::new("eip155", "8453");
        assert_eq!(name_by_chain_id(&id), Some("base"));

        let unknown = ChainId::new("eip155", "999999");
        assert!(name_by_chain_id(&unknown).is_none());
    }

    #[test]
    fn test_usdc_deployment_lookup() {
        let base = ChainId::new("eip155", "8453");
        assert_eq!(
            usdc_deployment(&base),
            Some("0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913")
        );

        let solana = ChainId::new("solana", SOLANA_MAINNET);
        assert_eq!(
            usdc_deployment(&solana),
            Some("EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v")
        );

        assert!(usdc_deployment(&ChainId::new("eip155", "1")).is_none());
        assert!(usdc_deployment(&ChainId::new("cosmos", "hub")).is_none());
    }
}
