//! The protocol adapter contract.
//!
//! Each payment family implements [`ProtocolAdapter`]: probe a resource
//! for its challenge (`detect`), price it (`quote`), re-derive a quote
//! from an already-received response (`quote_from_response`, pure), and
//! carry a payment through to delivery (`execute`). The router iterates
//! adapters in registration order and knows nothing about their wire
//! formats.

use async_trait::async_trait;
use http::{HeaderMap, Method};
use url::Url;

use crate::error::Error;
use crate::money::Money;
use crate::offer::{Protocol, ProtocolQuote};

/// A fully buffered HTTP response.
///
/// Buffering keeps `quote_from_response` pure and lets the orchestrator
/// hand one response to several adapters.
#[derive(Debug, Clone)]
pub struct CapturedResponse {
    /// The request URL the response answered.
    pub url: String,
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: HeaderMap,
    /// Complete response body.
    pub body: Vec<u8>,
}

impl CapturedResponse {
    /// Returns the named header as text, if present and valid UTF-8.
    #[must_use]
    pub fn header_str(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// A payment request handed to an adapter's `execute`.
#[derive(Debug, Clone)]
pub struct ProtocolRequest {
    /// Target resource.
    pub url: Url,
    /// The caller's HTTP method.
    pub method: Method,
    /// The caller's headers, forwarded on every outbound request.
    pub headers: HeaderMap,
    /// The caller's body, forwarded on every outbound request.
    pub body: Option<Vec<u8>>,
    /// The quoted amount being paid.
    pub amount: Money,
    /// Network selected for the payment, when the protocol has one.
    pub network: Option<String>,
    /// Recipient selected for the payment, when the protocol exposes one.
    pub pay_to: Option<String>,
}

/// The outcome of an adapter `execute`.
///
/// `success` means the final HTTP exchange came back 2xx. A result with
/// `success == false` still carries the response so the orchestrator can
/// diagnose what the server did with the payment.
#[derive(Debug, Clone)]
pub struct ProtocolResult {
    /// Whether the final response was 2xx.
    pub success: bool,
    /// HTTP status of the final response.
    pub status: u16,
    /// Headers of the final response.
    pub headers: HeaderMap,
    /// Body of the final response.
    pub body: Vec<u8>,
    /// Settlement transaction id reported by the server, if any.
    pub tx_hash: Option<String>,
    /// Settlement network reported by the server, if any.
    pub network: Option<String>,
    /// Delivery attempts made before this result, oldest first.
    pub attempts: Vec<AttemptResult>,
}

/// A planned delivery attempt: which verb to use and which header carries
/// the signed payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryAttempt {
    /// HTTP method of the attempt.
    pub method: Method,
    /// Header name carrying the payment payload.
    pub header_name: &'static str,
}

/// What a delivery attempt observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptResult {
    /// HTTP method used.
    pub method: Method,
    /// Payload header name used.
    pub header_name: String,
    /// HTTP status the server answered.
    pub status: u16,
    /// Server-provided message, truncated to 500 characters.
    pub server_message: Option<String>,
}

impl std::fmt::Display for AttemptResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} + {} → {}", self.method, self.header_name, self.status)
    }
}

/// Maximum length of a retained server message, in characters.
pub const SERVER_MESSAGE_LIMIT: usize = 500;

/// Extracts a short server message from an error-response body.
///
/// Prefers JSON `.error`, then `.message`, then `.error.message`; falls
/// back to the raw text truncated to [`SERVER_MESSAGE_LIMIT`] characters
/// with a trailing ellipsis. Returns `None` for empty bodies.
#[must_use]
pub fn server_message_from_body(body: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(text) {
        if let Some(msg) = value.get("error").and_then(|v| v.as_str()) {
            return Some(truncate(msg));
        }
        if let Some(msg) = value.get("message").and_then(|v| v.as_str()) {
            return Some(truncate(msg));
        }
        if let Some(msg) = value
            .get("error")
            .and_then(|v| v.get("message"))
            .and_then(|v| v.as_str())
        {
            return Some(truncate(msg));
        }
    }
    Some(truncate(text))
}

fn truncate(text: &str) -> String {
    if text.chars().count() <= SERVER_MESSAGE_LIMIT {
        text.to_string()
    } else {
        let mut out: String = text.chars().take(SERVER_MESSAGE_LIMIT).collect();
        out.push('…');
        out
    }
}

/// A payment protocol implementation.
///
/// Implementations must not assume `detect` ran before `quote`; each
/// operation stands alone. All HTTP the adapter performs disables
/// redirects.
#[async_trait]
pub trait ProtocolAdapter: Send + Sync {
    /// The protocol family this adapter speaks.
    fn protocol(&self) -> Protocol;

    /// Probes the resource for a payment challenge this adapter can
    /// satisfy. A clean "no challenge" answer is `Ok(false)`; transport
    /// failures are errors because they say nothing about the endpoint
    /// being free.
    async fn detect(&self, url: &Url, headers: Option<&HeaderMap>) -> Result<bool, Error>;

    /// Retrieves and normalises the resource's payment terms.
    async fn quote(&self, url: &Url, headers: Option<&HeaderMap>)
    -> Result<ProtocolQuote, Error>;

    /// Re-derives a quote from an already-received response without any
    /// network traffic. Returns `None` when the response carries no
    /// challenge this adapter understands.
    fn quote_from_response(&self, response: &CapturedResponse) -> Option<ProtocolQuote>;

    /// Carries a payment through to delivery and returns the final
    /// response.
    async fn execute(&self, request: &ProtocolRequest) -> Result<ProtocolResult, Error>;
}
