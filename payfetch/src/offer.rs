//! Normalised payment offers.
//!
//! Whatever wire format a server speaks, probing reduces it to a
//! [`ProtocolQuote`]: the primary price plus, for multi-chain servers, the
//! full list of [`AcceptOption`]s so chain selection can pick a better
//! rail.

use serde::{Deserialize, Serialize};

use crate::chain::ChainNamespace;
use crate::money::Money;

/// The payment protocol family behind a quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    /// Stablecoin-on-blockchain payments (x402 wire formats).
    X402,
    /// Lightning Network invoice payments (L402/LSAT challenges).
    L402,
}

impl Protocol {
    /// Returns the stable protocol tag used in records and events.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::X402 => "x402",
            Self::L402 => "l402",
        }
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Protocol {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Protocol {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        match s.as_str() {
            "x402" => Ok(Self::X402),
            "l402" => Ok(Self::L402),
            other => Err(serde::de::Error::custom(format!(
                "unknown protocol tag {other:?}"
            ))),
        }
    }
}

/// One chain-specific payment offer from a server's `accepts` list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptOption {
    /// The chain family of this offer.
    pub namespace: ChainNamespace,
    /// Canonical CAIP network id, e.g. `eip155:8453`.
    pub network: String,
    /// Price in USD cents.
    pub amount: Money,
    /// Recipient address, kept opaque.
    pub pay_to: String,
    /// Asset tag, kept opaque (empty when the server omitted it).
    pub asset: String,
    /// Scheme tag, kept opaque (`"exact"` when the server omitted it).
    pub scheme: String,
}

/// Metadata a server volunteers about how the endpoint expects to be
/// called.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputHints {
    /// HTTP method the endpoint expects.
    pub method: Option<String>,
    /// Expected query parameters.
    pub query_params: Option<serde_json::Value>,
    /// Expected JSON body fields.
    pub body_fields: Option<serde_json::Value>,
    /// Human-readable description of the resource.
    pub description: Option<String>,
    /// Example of the endpoint's output.
    pub output_example: Option<serde_json::Value>,
}

impl InputHints {
    /// Returns `true` when no hint field is populated.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.method.is_none()
            && self.query_params.is_none()
            && self.body_fields.is_none()
            && self.description.is_none()
            && self.output_example.is_none()
    }
}

/// A normalised probe result.
///
/// The primary `(amount, network, pay_to)` mirrors the first element of
/// `all_accepts` whenever that list is present; callers that never look at
/// the list still see a coherent single-offer quote.
#[derive(Debug, Clone)]
pub struct ProtocolQuote {
    /// The protocol family that produced this quote.
    pub protocol: Protocol,
    /// Primary price.
    pub amount: Money,
    /// Primary network id, when the protocol has one.
    pub network: Option<String>,
    /// Primary recipient, when the protocol exposes one.
    pub pay_to: Option<String>,
    /// Every parsed offer, ordered as the server sent them. Present only
    /// when at least one offer parsed.
    pub all_accepts: Option<Vec<AcceptOption>>,
    /// Server-provided call-shape metadata, when present.
    pub input_hints: Option<InputHints>,
}

impl ProtocolQuote {
    /// Builds a quote from a non-empty accept list; the head of the list
    /// becomes the primary offer.
    #[must_use]
    pub fn from_accepts(
        protocol: Protocol,
        accepts: Vec<AcceptOption>,
        input_hints: Option<InputHints>,
    ) -> Option<Self> {
        let primary = accepts.first()?;
        Some(Self {
            protocol,
            amount: primary.amount.clone(),
            network: Some(primary.network.clone()),
            pay_to: Some(primary.pay_to.clone()),
            all_accepts: Some(accepts),
            input_hints,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accept(network: &str, cents: u64) -> AcceptOption {
        AcceptOption {
            namespace: ChainNamespace::Evm,
            network: network.into(),
            amount: Money::from_cents(cents),
            pay_to: "0xabc".into(),
            asset: String::new(),
            scheme: "exact".into(),
        }
    }

    #[test]
    fn test_protocol_tags() {
        assert_eq!(Protocol::X402.as_str(), "x402");
        assert_eq!(Protocol::L402.as_str(), "l402");
    }

    #[test]
    fn test_protocol_serde_roundtrip() {
        let json = serde_json::to_string(&Protocol::L402).unwrap();
        assert_eq!(json, "\"l402\"");
        let back: Protocol = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Protocol::L402);
    }

    #[test]
    fn test_quote_primary_mirrors_first_accept() {
        let accepts = vec![accept("eip155:8453", 50), accept("eip155:1", 10)];
        let quote = ProtocolQuote::from_accepts(Protocol::X402, accepts, None).unwrap();
        assert_eq!(quote.amount, Money::from_cents(50u64));
        assert_eq!(quote.network.as_deref(), Some("eip155:8453"));
        assert_eq!(quote.pay_to.as_deref(), Some("0xabc"));
        assert_eq!(quote.all_accepts.as_ref().unwrap().len(), 2);
    }

    #[test]
    fn test_quote_from_empty_accepts_is_none() {
        assert!(ProtocolQuote::from_accepts(Protocol::X402, vec![], None).is_none());
    }
}
