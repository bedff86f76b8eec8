//! Wire formats of the x402 payment-required challenge.
//!
//! A 402 response can carry its payment terms in three places, tried in
//! priority order:
//!
//! 1. the `payment-required` header, base64 of JSON, in the V2 accept
//!    shape ([`v2`]) or the V1 accept shape ([`v1`]);
//! 2. a `www-authenticate` realm of `x402 key="value"` pairs ([`realm`]);
//! 3. the response body as V1 JSON ([`v1`]).
//!
//! Whatever the source, parsing yields a [`ParsedPaymentRequired`]: the
//! raw server object (what the signer signs, untouched), the wire version
//! (which decides the outbound payload header), the transport, the
//! normalised accepts, and any input hints the server volunteered.

use http::HeaderMap;
use serde::Deserialize;

use crate::encoding;
use crate::offer::{AcceptOption, InputHints};

pub mod hints;
pub mod realm;
pub mod v1;
pub mod v2;

/// Server→client header naming the payment terms (V2 transport).
pub const PAYMENT_REQUIRED_HEADER: &str = "payment-required";

/// Server→client header reporting settlement of a paid request.
pub const PAYMENT_RESPONSE_HEADER: &str = "payment-response";

/// Standard challenge/realm header.
pub const WWW_AUTHENTICATE_HEADER: &str = "www-authenticate";

/// Client→server payload header for V2 deliveries.
pub const PAYMENT_SIGNATURE_HEADER: &str = "PAYMENT-SIGNATURE";

/// Client→server payload header for V1 deliveries.
pub const X_PAYMENT_HEADER: &str = "X-PAYMENT";

/// Which wire generation the server's challenge followed.
///
/// The version is decided by the *shape of the accepts*, not by the
/// `x402Version` field alone: a `payment-required` header can carry
/// V1-shaped accepts, and such hybrids sign and deliver as V1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireVersion {
    /// Original body-era shape: network names, `maxAmountRequired`.
    V1,
    /// Header-era shape: CAIP networks, `amount`.
    V2,
}

impl WireVersion {
    /// The outbound header under which the signed payload must be
    /// returned for this version.
    #[must_use]
    pub const fn response_header(self) -> &'static str {
        match self {
            Self::V1 => X_PAYMENT_HEADER,
            Self::V2 => PAYMENT_SIGNATURE_HEADER,
        }
    }

    /// The outbound header of the *other* version, used as a last-resort
    /// delivery attempt.
    #[must_use]
    pub const fn alternate_header(self) -> &'static str {
        match self {
            Self::V1 => PAYMENT_SIGNATURE_HEADER,
            Self::V2 => X_PAYMENT_HEADER,
        }
    }
}

/// Where in the 402 response the usable challenge was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    /// The `payment-required` header.
    Header,
    /// The response body.
    Body,
    /// A `www-authenticate: x402 …` realm.
    RealmHeader,
}

/// A decoded and normalised payment-required challenge.
#[derive(Debug, Clone)]
pub struct ParsedPaymentRequired {
    /// The raw server object. This is exactly what the signer signs;
    /// field names are never rewritten.
    pub raw: serde_json::Value,
    /// Wire generation, decided by accept shape.
    pub version: WireVersion,
    /// Where the challenge was found.
    pub transport: Transport,
    /// Offers whose network resolved to a supported family, in server
    /// order. May be empty when every offer was dropped.
    pub accepts: Vec<AcceptOption>,
    /// Call-shape metadata the server volunteered.
    pub hints: Option<InputHints>,
}

impl ParsedPaymentRequired {
    /// Returns `true` when at least one offer survived normalisation.
    #[must_use]
    pub const fn has_accepts(&self) -> bool {
        !self.accepts.is_empty()
    }
}

/// Runs the full parser cascade over a buffered 402 response.
///
/// Returns `None` for non-402 statuses and for responses carrying no
/// recognisable challenge in any of the three wire sources.
#[must_use]
pub fn parse_payment_required(
    status: u16,
    headers: &HeaderMap,
    body: &[u8],
) -> Option<ParsedPaymentRequired> {
    if status != 402 {
        return None;
    }

    if let Some(value) = headers
        .get(PAYMENT_REQUIRED_HEADER)
        .and_then(|v| v.to_str().ok())
        && let Some(raw) = encoding::decode_json(value)
    {
        if let Some(accepts) = v2::accepts_from_value(&raw) {
            let parsed_hints = hints::extract(&raw, WireVersion::V2);
            return Some(ParsedPaymentRequired {
                raw,
                version: WireVersion::V2,
                transport: Transport::Header,
                accepts,
                hints: parsed_hints,
            });
        }
        if let Some(accepts) = v1::accepts_from_value(&raw) {
            let parsed_hints = hints::extract(&raw, WireVersion::V1);
            return Some(ParsedPaymentRequired {
                raw,
                version: WireVersion::V1,
                transport: Transport::Header,
                accepts,
                hints: parsed_hints,
            });
        }
    }

    if let Some(value) = headers
        .get(WWW_AUTHENTICATE_HEADER)
        .and_then(|v| v.to_str().ok())
        && let Some(parsed) = realm::parse(value)
    {
        return Some(parsed);
    }

    if let Ok(raw) = serde_json::from_slice::<serde_json::Value>(body)
        && let Some(accepts) = v1::accepts_from_value(&raw)
    {
        let parsed_hints = hints::extract(&raw, WireVersion::V1);
        return Some(ParsedPaymentRequired {
            raw,
            version: WireVersion::V1,
            transport: Transport::Body,
            accepts,
            hints: parsed_hints,
        });
    }

    None
}

/// Settlement information reported in a `payment-response` header.
#[derive(Debug, Clone, Deserialize)]
pub struct Settlement {
    /// Whether the server considers the payment settled.
    #[serde(default)]
    pub success: bool,
    /// Settlement transaction identifier.
    #[serde(default)]
    pub transaction: Option<String>,
    /// Network the settlement landed on.
    #[serde(default)]
    pub network: Option<String>,
}

/// Reads and decodes the `payment-response` header.
///
/// A malformed header degrades to `None`; a successful delivery is never
/// failed retroactively over settlement metadata.
#[must_use]
pub fn settlement_from_headers(headers: &HeaderMap) -> Option<Settlement> {
    let value = headers
        .get(PAYMENT_RESPONSE_HEADER)
        .and_then(|v| v.to_str().ok())?;
    let raw = encoding::decode_json(value)?;
    serde_json::from_value(raw).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD as b64;
    use http::HeaderValue;

    fn headers_with(name: &'static str, value: String) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(name, HeaderValue::from_str(&value).unwrap());
        headers
    }

    fn b64_json(value: &serde_json::Value) -> String {
        b64.encode(value.to_string())
    }

    #[test]
    fn test_non_402_never_parses() {
        let raw = serde_json::json!({
            "x402Version": 2,
            "accepts": [{
                "scheme": "exact", "network": "eip155:8453",
                "amount": "10000", "asset": "0xusdc", "payTo": "0xabc"
            }]
        });
        let headers = headers_with(PAYMENT_REQUIRED_HEADER, b64_json(&raw));
        assert!(parse_payment_required(200, &headers, b"").is_none());
    }

    #[test]
    fn test_v2_header_wins_over_body() {
        let raw = serde_json::json!({
            "x402Version": 2,
            "accepts": [{
                "scheme": "exact", "network": "eip155:84532",
                "amount": "10000", "asset": "0xusdc", "payTo": "0xabc"
            }]
        });
        let headers = headers_with(PAYMENT_REQUIRED_HEADER, b64_json(&raw));
        let parsed = parse_payment_required(402, &headers, b"not json").unwrap();
        assert_eq!(parsed.version, WireVersion::V2);
        assert_eq!(parsed.transport, Transport::Header);
        assert_eq!(parsed.accepts.len(), 1);
        assert_eq!(parsed.accepts[0].network, "eip155:84532");
    }

    #[test]
    fn test_hybrid_v1_in_v2_header() {
        let raw = serde_json::json!({
            "x402Version": 1,
            "accepts": [{
                "scheme": "exact", "network": "base",
                "maxAmountRequired": "550000", "asset": "0xUSDC", "payTo": "0xH"
            }]
        });
        let headers = headers_with(PAYMENT_REQUIRED_HEADER, b64_json(&raw));
        let parsed = parse_payment_required(402, &headers, b"").unwrap();
        assert_eq!(parsed.version, WireVersion::V1);
        assert_eq!(parsed.transport, Transport::Header);
        assert_eq!(parsed.version.response_header(), X_PAYMENT_HEADER);
        // $0.55 from 550000 atomic units
        assert_eq!(
            parsed.accepts[0].amount,
            crate::money::Money::from_cents(55u64)
        );
        // The raw object keeps its V1 field names for signing.
        assert!(parsed.raw["accepts"][0].get("maxAmountRequired").is_some());
    }

    #[test]
    fn test_body_v1_fallback() {
        let body = serde_json::json!({
            "x402Version": 1,
            "accepts": [{
                "network": "base-sepolia", "payTo": "0xabc",
                "maxAmountRequired": "10000"
            }]
        })
        .to_string();
        let parsed = parse_payment_required(402, &HeaderMap::new(), body.as_bytes()).unwrap();
        assert_eq!(parsed.version, WireVersion::V1);
        assert_eq!(parsed.transport, Transport::Body);
        assert_eq!(parsed.accepts[0].network, "eip155:84532");
        assert_eq!(parsed.accepts[0].scheme, "exact");
        assert_eq!(parsed.accepts[0].asset, "");
    }

    #[test]
    fn test_realm_header_beats_body() {
        let headers = headers_with(
            WWW_AUTHENTICATE_HEADER,
            "x402 address=\"0xabc\", amount=\"0.01\"".to_string(),
        );
        let body = serde_json::json!({
            "x402Version": 1,
            "accepts": [{"network": "base", "payTo": "0xother", "amount": "990000"}]
        })
        .to_string();
        let parsed = parse_payment_required(402, &headers, body.as_bytes()).unwrap();
        assert_eq!(parsed.transport, Transport::RealmHeader);
        assert_eq!(parsed.accepts[0].pay_to, "0xabc");
    }

    #[test]
    fn test_unparseable_everything_is_none() {
        assert!(parse_payment_required(402, &HeaderMap::new(), b"payment required").is_none());
    }

    #[test]
    fn test_settlement_header_roundtrip() {
        let headers = headers_with(
            PAYMENT_RESPONSE_HEADER,
            b64_json(&serde_json::json!({"success": true, "transaction": "0xtx"})),
        );
        let settlement = settlement_from_headers(&headers).unwrap();
        assert!(settlement.success);
        assert_eq!(settlement.transaction.as_deref(), Some("0xtx"));
        assert!(settlement.network.is_none());
    }

    #[test]
    fn test_settlement_malformed_degrades() {
        let headers = headers_with(PAYMENT_RESPONSE_HEADER, "%%%".to_string());
        assert!(settlement_from_headers(&headers).is_none());
    }
}
