//! Renegotiation from an in-flight 402.
//!
//! `execute` never trusts a quote obtained earlier: the decisive payment
//! terms are re-derived from the 402 the paid request itself provoked,
//! since the server may have re-priced or rotated its accepted rails in
//! between.

use payfetch::adapter::CapturedResponse;
use payfetch::offer::AcceptOption;
use payfetch::proto::{self, Transport, WireVersion};

/// The negotiated terms a delivery runs against.
#[derive(Debug, Clone)]
pub struct Negotiation {
    /// The raw server object handed to the signer, untouched.
    pub raw: serde_json::Value,
    /// Wire generation, decided by accept shape.
    pub version: WireVersion,
    /// Where the challenge was found.
    pub transport: Transport,
    /// The outbound header the signed payload is delivered under.
    pub response_header: &'static str,
    /// Offers that survived normalisation.
    pub accepts: Vec<AcceptOption>,
}

/// Derives a [`Negotiation`] from a buffered 402 response.
///
/// Returns `None` when the cascade finds no challenge; the caller then
/// fails the payment with "no payment information".
#[must_use]
pub fn renegotiate(response: &CapturedResponse) -> Option<Negotiation> {
    let parsed = proto::parse_payment_required(response.status, &response.headers, &response.body)?;
    Some(Negotiation {
        response_header: parsed.version.response_header(),
        raw: parsed.raw,
        version: parsed.version,
        transport: parsed.transport,
        accepts: parsed.accepts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD as b64;
    use http::{HeaderMap, HeaderValue};

    fn captured(status: u16, headers: HeaderMap, body: &str) -> CapturedResponse {
        CapturedResponse {
            url: "https://api.example/paid".into(),
            status,
            headers,
            body: body.as_bytes().to_vec(),
        }
    }

    #[test]
    fn test_renegotiate_v2_header() {
        let raw = serde_json::json!({
            "x402Version": 2,
            "accepts": [{
                "scheme": "exact", "network": "eip155:84532",
                "amount": "10000", "asset": "0xusdc", "payTo": "0xabc"
            }]
        });
        let mut headers = HeaderMap::new();
        headers.insert(
            proto::PAYMENT_REQUIRED_HEADER,
            HeaderValue::from_str(&b64.encode(raw.to_string())).unwrap(),
        );
        let negotiation = renegotiate(&captured(402, headers, "")).unwrap();
        assert_eq!(negotiation.version, WireVersion::V2);
        assert_eq!(negotiation.response_header, proto::PAYMENT_SIGNATURE_HEADER);
    }

    #[test]
    fn test_renegotiate_hybrid_signs_raw_v1_shape() {
        let raw = serde_json::json!({
            "x402Version": 1,
            "accepts": [{
                "scheme": "exact", "network": "base",
                "maxAmountRequired": "550000", "asset": "0xUSDC", "payTo": "0xH"
            }]
        });
        let mut headers = HeaderMap::new();
        headers.insert(
            proto::PAYMENT_REQUIRED_HEADER,
            HeaderValue::from_str(&b64.encode(raw.to_string())).unwrap(),
        );
        let negotiation = renegotiate(&captured(402, headers, "")).unwrap();
        assert_eq!(negotiation.version, WireVersion::V1);
        assert_eq!(negotiation.response_header, proto::X_PAYMENT_HEADER);
        assert_eq!(negotiation.raw, raw);
    }

    #[test]
    fn test_renegotiate_nothing_parseable() {
        assert!(renegotiate(&captured(402, HeaderMap::new(), "payment required")).is_none());
    }
}
