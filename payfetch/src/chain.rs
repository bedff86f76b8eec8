//! Chain identifiers for the payment rails.
//!
//! The engine speaks CAIP-style network ids (`eip155:8453`,
//! `solana:5eykt4UsFv8P8NJdTREpY1vzqKqZKvdp`) and groups them into two
//! [`ChainNamespace`] families. Servers offering chains outside these
//! families are tolerated: their offers are dropped, never an error.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

/// A chain family the engine can pay on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChainNamespace {
    /// EVM chains, CAIP namespace `eip155`.
    Evm,
    /// Solana chains, CAIP namespace `solana`.
    Svm,
}

impl ChainNamespace {
    /// Maps a CAIP namespace to a chain family, or `None` for namespaces
    /// the engine cannot pay on.
    #[must_use]
    pub fn from_caip(namespace: &str) -> Option<Self> {
        match namespace {
            "eip155" => Some(Self::Evm),
            "solana" => Some(Self::Svm),
            _ => None,
        }
    }

    /// Returns the CAIP namespace string.
    #[must_use]
    pub const fn as_caip(self) -> &'static str {
        match self {
            Self::Evm => "eip155",
            Self::Svm => "solana",
        }
    }

    /// Returns the short family name used in configuration.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Evm => "evm",
            Self::Svm => "svm",
        }
    }
}

impl fmt::Display for ChainNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown chain family name.
#[derive(Debug, thiserror::Error)]
#[error("unknown chain family {0:?}, expected \"evm\" or \"svm\"")]
pub struct ChainNamespaceParseError(String);

impl FromStr for ChainNamespace {
    type Err = ChainNamespaceParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "evm" => Ok(Self::Evm),
            "svm" => Ok(Self::Svm),
            other => Err(ChainNamespaceParseError(other.into())),
        }
    }
}

impl Serialize for ChainNamespace {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ChainNamespace {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// A CAIP-style chain identifier: `namespace:reference`.
///
/// # Serialization
///
/// Serializes to/from the colon-separated string form: `"eip155:8453"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChainId {
    namespace: String,
    reference: String,
}

impl ChainId {
    /// Creates a chain id from namespace and reference components.
    pub fn new<N: Into<String>, R: Into<String>>(namespace: N, reference: R) -> Self {
        Self {
            namespace: namespace.into(),
            reference: reference.into(),
        }
    }

    /// Returns the namespace component.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Returns the reference component.
    #[must_use]
    pub fn reference(&self) -> &str {
        &self.reference
    }

    /// Returns the chain family this id belongs to, if the engine can pay
    /// on it.
    #[must_use]
    pub fn family(&self) -> Option<ChainNamespace> {
        ChainNamespace::from_caip(&self.namespace)
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.reference)
    }
}

/// Error returned when parsing an invalid chain id string.
///
/// A valid chain id is `namespace:reference` with both components
/// non-empty.
#[derive(Debug, thiserror::Error)]
#[error("invalid chain id format {0:?}")]
pub struct ChainIdFormatError(String);

impl FromStr for ChainId {
    type Err = ChainIdFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (namespace, reference) = s
            .split_once(':')
            .ok_or_else(|| ChainIdFormatError(s.into()))?;
        if namespace.is_empty() || reference.is_empty() {
            return Err(ChainIdFormatError(s.into()));
        }
        Ok(Self {
            namespace: namespace.into(),
            reference: reference.into(),
        })
    }
}

impl Serialize for ChainId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ChainId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_str(&s).map_err(de::Error::custom)
    }
}

/// Resolves a server-provided network string to a chain family.
///
/// Accepts both CAIP form (`eip155:8453`) and the bare V1 network names
/// resolved through [`crate::networks`]. Unknown strings are `None`.
#[must_use]
pub fn family_of_network(network: &str) -> Option<ChainNamespace> {
    canonical_chain_id(network).and_then(|id| id.family())
}

/// Canonicalises a server-provided network string into a [`ChainId`].
///
/// CAIP-form strings parse directly; bare names (`"base"`) resolve through
/// the known-network table. Returns `None` for anything else.
#[must_use]
pub fn canonical_chain_id(network: &str) -> Option<ChainId> {
    if network.contains(':') {
        network.parse().ok()
    } else {
        crate::networks::chain_id_by_name(network)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespace_from_caip() {
        assert_eq!(ChainNamespace::from_caip("eip155"), Some(ChainNamespace::Evm));
        assert_eq!(ChainNamespace::from_caip("solana"), Some(ChainNamespace::Svm));
        assert_eq!(ChainNamespace::from_caip("cosmos"), None);
    }

    #[test]
    fn test_namespace_serde() {
        assert_eq!(
            serde_json::to_string(&ChainNamespace::Evm).unwrap(),
            "\"evm\""
        );
        let ns: ChainNamespace = serde_json::from_str("\"svm\"").unwrap();
        assert_eq!(ns, ChainNamespace::Svm);
    }

    #[test]
    fn test_chain_id_roundtrip() {
        let id: ChainId = "eip155:8453".parse().unwrap();
        assert_eq!(id.namespace(), "eip155");
        assert_eq!(id.reference(), "8453");
        assert_eq!(id.to_string(), "eip155:8453");
        assert_eq!(id.family(), Some(ChainNamespace::Evm));
    }

    #[test]
    fn test_chain_id_rejects_empty_components() {
        assert!("eip155:".parse::<ChainId>().is_err());
        assert!(":8453".parse::<ChainId>().is_err());
        assert!("plain".parse::<ChainId>().is_err());
    }

    #[test]
    fn test_family_of_network_accepts_caip_and_names() {
        assert_eq!(family_of_network("eip155:84532"), Some(ChainNamespace::Evm));
        assert_eq!(
            family_of_network("solana:5eykt4UsFv8P8NJdTREpY1vzqKqZKvdp"),
            Some(ChainNamespace::Svm)
        );
        assert_eq!(family_of_network("base"), Some(ChainNamespace::Evm));
        assert_eq!(family_of_network("cosmos:hub"), None);
        assert_eq!(family_of_network("lightning"), None);
    }

    #[test]
    fn test_canonical_chain_id_resolves_names() {
        assert_eq!(
            canonical_chain_id("base").unwrap().to_string(),
            "eip155:8453"
        );
        assert_eq!(
            canonical_chain_id("eip155:1").unwrap().to_string(),
            "eip155:1"
        );
        assert!(canonical_chain_id("unknown-net").is_none());
    }
}
