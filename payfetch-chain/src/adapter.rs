//! The stablecoin (x402) protocol adapter.

use std::sync::Arc;

use async_trait::async_trait;
use http::HeaderMap;
use url::Url;

use payfetch::adapter::{
    CapturedResponse, ProtocolAdapter, ProtocolRequest, ProtocolResult,
};
use payfetch::error::{DeliveryDiagnosis, DiagnosisPhase, Error, ErrorKind};
use payfetch::offer::{Protocol, ProtocolQuote};
use payfetch::proto::{self, ParsedPaymentRequired};

use crate::delivery::{deliver, result_from_captured};
use crate::http::{build_client, capture, send_with_deadline};
use crate::negotiation::renegotiate;
use crate::signer::PaymentSigner;

/// Deadline for challenge detection.
pub const DETECT_TIMEOUT_SECS: u64 = 10;

/// Deadline for quote retrieval.
pub const QUOTE_TIMEOUT_SECS: u64 = 15;

/// Deadline for the unsigned first call of an execution.
pub const FIRST_CALL_TIMEOUT_SECS: u64 = 30;

/// Pays x402 challenges on EVM and Solana rails.
///
/// The adapter works without a signer for `detect` and `quote`; `execute`
/// requires one as soon as the endpoint actually demands payment.
pub struct ChainAdapter {
    http: reqwest::Client,
    signer: Option<Arc<dyn PaymentSigner>>,
}

impl std::fmt::Debug for ChainAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainAdapter")
            .field("signer", &self.signer.as_ref().map(|_| "<dyn PaymentSigner>"))
            .finish_non_exhaustive()
    }
}

impl ChainAdapter {
    /// Creates an adapter with a signer.
    ///
    /// # Errors
    ///
    /// Returns `bad-config` when the HTTP client cannot be built.
    pub fn try_new(signer: Arc<dyn PaymentSigner>) -> Result<Self, Error> {
        Ok(Self {
            http: build_client()?,
            signer: Some(signer),
        })
    }

    /// Creates a probe-only adapter without a signer; `execute` on a
    /// paying endpoint will fail with `credentials-missing`.
    ///
    /// # Errors
    ///
    /// Returns `bad-config` when the HTTP client cannot be built.
    pub fn try_new_unsigned() -> Result<Self, Error> {
        Ok(Self {
            http: build_client()?,
            signer: None,
        })
    }

    fn quote_from_parsed(parsed: ParsedPaymentRequired) -> Option<ProtocolQuote> {
        ProtocolQuote::from_accepts(Protocol::X402, parsed.accepts, parsed.hints)
    }

    /// GETs the resource and buffers the response under one total
    /// deadline covering both dispatch and body read.
    async fn fetch_challenge(
        &self,
        url: &Url,
        headers: Option<&HeaderMap>,
        secs: u64,
        operation: &str,
        timeout_kind: ErrorKind,
    ) -> Result<CapturedResponse, Error> {
        let mut request = self.http.get(url.clone());
        if let Some(headers) = headers {
            request = request.headers(headers.clone());
        }
        let exchange = async {
            let response = request.send().await.map_err(|err| {
                Error::new(
                    ErrorKind::EndpointUnreachable,
                    format!("{operation} request failed: {err}"),
                )
            })?;
            capture(response).await
        };
        match tokio::time::timeout(std::time::Duration::from_secs(secs), exchange).await {
            Ok(result) => result,
            Err(_) => Err(Error::new(
                timeout_kind,
                format!("{operation} timed out after {secs} s"),
            )),
        }
    }
}

#[async_trait]
impl ProtocolAdapter for ChainAdapter {
    fn protocol(&self) -> Protocol {
        Protocol::X402
    }

    async fn detect(&self, url: &Url, headers: Option<&HeaderMap>) -> Result<bool, Error> {
        let captured = self
            .fetch_challenge(
                url,
                headers,
                DETECT_TIMEOUT_SECS,
                "challenge detection",
                ErrorKind::NetworkTimeout,
            )
            .await?;
        if captured.status != 402 {
            return Ok(false);
        }
        let detected =
            proto::parse_payment_required(captured.status, &captured.headers, &captured.body)
                .is_some_and(|parsed| parsed.has_accepts());
        Ok(detected)
    }

    async fn quote(
        &self,
        url: &Url,
        headers: Option<&HeaderMap>,
    ) -> Result<ProtocolQuote, Error> {
        let captured = self
            .fetch_challenge(
                url,
                headers,
                QUOTE_TIMEOUT_SECS,
                "quote request",
                ErrorKind::ChainQuoteFailed,
            )
            .await?;
        if captured.status != 402 {
            return Err(Error::new(
                ErrorKind::ChainQuoteFailed,
                format!("expected 402 from {url}, got {}", captured.status),
            ));
        }
        proto::parse_payment_required(captured.status, &captured.headers, &captured.body)
            .and_then(Self::quote_from_parsed)
            .ok_or_else(|| {
                Error::new(
                    ErrorKind::ChainQuoteFailed,
                    format!("no parseable payment offer in 402 response from {url}"),
                )
            })
    }

    fn quote_from_response(&self, response: &CapturedResponse) -> Option<ProtocolQuote> {
        proto::parse_payment_required(response.status, &response.headers, &response.body)
            .and_then(Self::quote_from_parsed)
    }

    async fn execute(&self, request: &ProtocolRequest) -> Result<ProtocolResult, Error> {
        let mut first = self
            .http
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.clone());
        if let Some(body) = &request.body {
            first = first.body(body.clone());
        }
        let response = send_with_deadline(
            first,
            FIRST_CALL_TIMEOUT_SECS,
            "initial request",
            ErrorKind::ChainPaymentFailed,
        )
        .await?;

        if response.status().as_u16() != 402 {
            let captured = capture(response).await?;
            return Ok(result_from_captured(&captured, vec![]));
        }

        let captured = capture(response).await?;
        let Some(negotiation) = renegotiate(&captured) else {
            return Err(Error::payment_failed("no payment information").with_diagnosis(
                DeliveryDiagnosis::for_phase(DiagnosisPhase::Payment).with_status(402),
            ));
        };

        let signer = self.signer.as_ref().ok_or_else(|| {
            Error::new(
                ErrorKind::CredentialsMissing,
                "no chain signer configured for paid request",
            )
        })?;

        deliver(&self.http, request, &negotiation, signer.as_ref()).await
    }
}
