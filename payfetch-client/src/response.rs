//! The payment-annotated response handed back to callers.

use http::HeaderMap;

use payfetch::adapter::{CapturedResponse, ProtocolResult};
use payfetch::error::{Error, ErrorKind};
use payfetch::money::Money;
use payfetch::offer::Protocol;

/// What was paid to obtain a response.
#[derive(Debug, Clone)]
pub struct PaymentInfo {
    /// Amount paid, in the protocol's native currency.
    pub amount: Money,
    /// Protocol family that carried the payment.
    pub protocol: Protocol,
    /// Settlement transaction id, when the server reported one.
    pub tx_hash: Option<String>,
    /// Network the payment settled on, when known.
    pub network: Option<String>,
}

/// An HTTP response, possibly obtained through a payment.
///
/// The body is fully buffered; `text` and `json` decode it lazily on
/// demand.
#[derive(Debug, Clone)]
pub struct PaidResponse {
    url: String,
    status: u16,
    headers: HeaderMap,
    body: Vec<u8>,
    payment: Option<PaymentInfo>,
}

impl PaidResponse {
    /// Wraps a raw response no payment was made for.
    #[must_use]
    pub fn unpaid(response: CapturedResponse) -> Self {
        Self {
            url: response.url,
            status: response.status,
            headers: response.headers,
            body: response.body,
            payment: None,
        }
    }

    /// Wraps an adapter result together with its payment metadata.
    #[must_use]
    pub fn paid(url: String, result: ProtocolResult, payment: PaymentInfo) -> Self {
        Self {
            url,
            status: result.status,
            headers: result.headers,
            body: result.body,
            payment: Some(payment),
        }
    }

    /// The request URL this response answered.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// HTTP status code.
    #[must_use]
    pub const fn status(&self) -> u16 {
        self.status
    }

    /// Returns `true` for 2xx statuses.
    #[must_use]
    pub const fn ok(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// Response headers.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The raw response body.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.body
    }

    /// Payment metadata, absent when the resource was free.
    #[must_use]
    pub const fn payment(&self) -> Option<&PaymentInfo> {
        self.payment.as_ref()
    }

    /// Decodes the body as UTF-8 text, lossily.
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Decodes the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns `protocol-unsupported` carrying the decode error when the
    /// body is not the expected JSON.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, Error> {
        serde_json::from_slice(&self.body).map_err(|err| {
            Error::new(
                ErrorKind::ProtocolUnsupported,
                format!("response body is not the expected JSON: {err}"),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn captured(status: u16, body: &str) -> CapturedResponse {
        CapturedResponse {
            url: "https://api.example/data".into(),
            status,
            headers: HeaderMap::new(),
            body: body.as_bytes().to_vec(),
        }
    }

    #[test]
    fn test_unpaid_wrapper() {
        let response = PaidResponse::unpaid(captured(402, "payment required"));
        assert_eq!(response.status(), 402);
        assert!(!response.ok());
        assert!(response.payment().is_none());
        assert_eq!(response.text(), "payment required");
    }

    #[test]
    fn test_json_decoding() {
        let response = PaidResponse::unpaid(captured(200, r#"{"price": 42}"#));
        let value: serde_json::Value = response.json().unwrap();
        assert_eq!(value["price"], 42);

        let response = PaidResponse::unpaid(captured(200, "not json"));
        assert!(response.json::<serde_json::Value>().is_err());
    }
}
