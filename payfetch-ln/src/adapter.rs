//! The Lightning (L402/LSAT) protocol adapter.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use http::{HeaderMap, HeaderValue, Method};
use url::Url;

use payfetch::adapter::{CapturedResponse, ProtocolAdapter, ProtocolRequest, ProtocolResult};
use payfetch::error::{Error, ErrorKind};
use payfetch::money::Money;
use payfetch::offer::{Protocol, ProtocolQuote};
use payfetch::proto::{WWW_AUTHENTICATE_HEADER, settlement_from_headers};

use crate::challenge::{Challenge, ChallengeKind, is_challenge, parse_challenge};
use crate::invoice::{Bolt11Decoder, Bolt11DecoderFactory, amount_sats_from_sections};
use crate::wallet::{LnWalletManager, PaidInvoice};

/// Synthetic network label carried by Lightning quotes.
pub const LIGHTNING_NETWORK: &str = "lightning";

/// Deadline for challenge detection.
pub const DETECT_TIMEOUT_SECS: u64 = 10;

/// Deadline for quote retrieval.
pub const QUOTE_TIMEOUT_SECS: u64 = 15;

/// Deadline for each HTTP exchange during execution.
pub const REQUEST_TIMEOUT_SECS: u64 = 15;

/// Deadline for paying the invoice through the wallet.
pub const PAY_TIMEOUT_SECS: u64 = 60;

/// Pays L402/LSAT challenges over the Lightning Network.
///
/// The BOLT11 decoder is injected and loaded lazily, once per adapter
/// instance; the wallet handle is optional until a payment is actually
/// attempted.
pub struct LightningAdapter {
    http: reqwest::Client,
    decoder_factory: Option<Arc<dyn Bolt11DecoderFactory>>,
    decoder: OnceLock<Arc<dyn Bolt11Decoder>>,
    wallet: Option<Arc<LnWalletManager>>,
}

impl std::fmt::Debug for LightningAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LightningAdapter")
            .field("has_decoder_factory", &self.decoder_factory.is_some())
            .field("has_wallet", &self.wallet.is_some())
            .finish_non_exhaustive()
    }
}

impl LightningAdapter {
    /// Creates an adapter.
    ///
    /// Without a decoder factory the adapter can still `detect`; without
    /// a wallet it can also `quote` but `execute` fails with
    /// `credentials-missing`.
    ///
    /// # Errors
    ///
    /// Returns `bad-config` when the HTTP client cannot be built.
    pub fn try_new(
        decoder_factory: Option<Arc<dyn Bolt11DecoderFactory>>,
        wallet: Option<Arc<LnWalletManager>>,
    ) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|err| Error::bad_config(format!("failed to build HTTP client: {err}")))?;
        Ok(Self {
            http,
            decoder_factory,
            decoder: OnceLock::new(),
            wallet,
        })
    }

    fn resolve_decoder(&self) -> Result<Arc<dyn Bolt11Decoder>, Error> {
        if let Some(decoder) = self.decoder.get() {
            return Ok(Arc::clone(decoder));
        }
        let factory = self.decoder_factory.as_ref().ok_or_else(|| {
            Error::new(
                ErrorKind::LnQuoteFailed,
                "no BOLT11 decoder configured for Lightning quotes",
            )
        })?;
        // Loading faults keep their original kind.
        let decoder = factory.load()?;
        let _ = self.decoder.set(Arc::clone(&decoder));
        Ok(decoder)
    }

    fn quote_from_challenge(&self, challenge: &Challenge) -> Result<ProtocolQuote, Error> {
        let decoder = self.resolve_decoder()?;
        let sections = decoder.decode(challenge.invoice())?;
        let sats = amount_sats_from_sections(&sections)?;
        Ok(ProtocolQuote {
            protocol: Protocol::L402,
            amount: Money::from_satoshis(sats),
            network: Some(LIGHTNING_NETWORK.to_string()),
            pay_to: None,
            all_accepts: None,
            input_hints: None,
        })
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        secs: u64,
        operation: &str,
        timeout_kind: ErrorKind,
    ) -> Result<reqwest::Response, Error> {
        match tokio::time::timeout(Duration::from_secs(secs), request.send()).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(err)) => Err(Error::new(
                ErrorKind::EndpointUnreachable,
                format!("{operation} request failed: {err}"),
            )),
            Err(_) => Err(Error::new(
                timeout_kind,
                format!("{operation} timed out after {secs} s"),
            )),
        }
    }

    fn retry_request(
        &self,
        request: &ProtocolRequest,
        challenge: &Challenge,
        paid: &PaidInvoice,
    ) -> reqwest::RequestBuilder {
        match &challenge.kind {
            ChallengeKind::Standard { macaroon, .. } => {
                let mut headers = request.headers.clone();
                let authorization =
                    format!("{} {}:{}", challenge.prefix, macaroon, paid.preimage);
                headers.insert(
                    http::header::AUTHORIZATION,
                    HeaderValue::from_str(&authorization)
                        .expect("macaroon and preimage form a valid header value"),
                );
                let mut outbound = self
                    .http
                    .request(request.method.clone(), request.url.clone())
                    .headers(headers);
                if let Some(body) = &request.body {
                    outbound = outbound.body(body.clone());
                }
                outbound
            }
            ChallengeKind::InvoiceOnly { payment_hash, .. } => {
                // No Authorization here: the hash in the body is the proof.
                let method = if request.method == Method::GET {
                    Method::POST
                } else {
                    request.method.clone()
                };
                let mut headers = request.headers.clone();
                headers.insert(
                    http::header::CONTENT_TYPE,
                    HeaderValue::from_static("application/json"),
                );
                let body = json_body_with_hash(request.body.as_deref(), payment_hash);
                self.http
                    .request(method, request.url.clone())
                    .headers(headers)
                    .body(body)
            }
        }
    }
}

/// Injects `payment_hash` into the caller's JSON body, or builds a fresh
/// one-field object when the body is absent or not a JSON object.
fn json_body_with_hash(body: Option<&[u8]>, payment_hash: &str) -> Vec<u8> {
    let base = body
        .and_then(|bytes| serde_json::from_slice::<serde_json::Value>(bytes).ok())
        .and_then(|value| match value {
            serde_json::Value::Object(map) => Some(map),
            _ => None,
        });
    let mut object = base.unwrap_or_default();
    object.insert(
        "payment_hash".to_string(),
        serde_json::Value::String(payment_hash.to_string()),
    );
    serde_json::Value::Object(object).to_string().into_bytes()
}

async fn capture(response: reqwest::Response) -> Result<CapturedResponse, Error> {
    let url = response.url().to_string();
    let status = response.status().as_u16();
    let headers = response.headers().clone();
    let body = response.bytes().await.map_err(|err| {
        Error::new(
            ErrorKind::EndpointUnreachable,
            format!("failed reading response body: {err}"),
        )
    })?;
    Ok(CapturedResponse {
        url,
        status,
        headers,
        body: body.to_vec(),
    })
}

fn build_result(captured: CapturedResponse) -> ProtocolResult {
    let settlement = settlement_from_headers(&captured.headers);
    let (tx_hash, network) = settlement
        .map(|s| (s.transaction, s.network))
        .unwrap_or((None, None));
    ProtocolResult {
        success: (200..300).contains(&captured.status),
        status: captured.status,
        headers: captured.headers,
        body: captured.body,
        tx_hash,
        network,
        attempts: vec![],
    }
}

#[async_trait]
impl ProtocolAdapter for LightningAdapter {
    fn protocol(&self) -> Protocol {
        Protocol::L402
    }

    async fn detect(&self, url: &Url, headers: Option<&HeaderMap>) -> Result<bool, Error> {
        let mut request = self.http.get(url.clone());
        if let Some(headers) = headers {
            request = request.headers(headers.clone());
        }
        let response = self
            .send(
                request,
                DETECT_TIMEOUT_SECS,
                "lightning challenge detection",
                ErrorKind::LnDetectionFailed,
            )
            .await?;
        if response.status().as_u16() != 402 {
            return Ok(false);
        }
        let detected = response
            .headers()
            .get(WWW_AUTHENTICATE_HEADER)
            .and_then(|v| v.to_str().ok())
            .is_some_and(is_challenge);
        Ok(detected)
    }

    async fn quote(
        &self,
        url: &Url,
        headers: Option<&HeaderMap>,
    ) -> Result<ProtocolQuote, Error> {
        let mut request = self.http.get(url.clone());
        if let Some(headers) = headers {
            request = request.headers(headers.clone());
        }
        let response = self
            .send(
                request,
                QUOTE_TIMEOUT_SECS,
                "lightning quote request",
                ErrorKind::LnQuoteFailed,
            )
            .await?;
        if response.status().as_u16() != 402 {
            return Err(Error::new(
                ErrorKind::LnQuoteFailed,
                format!("expected 402 from {url}, got {}", response.status().as_u16()),
            ));
        }
        let header = response
            .headers()
            .get(WWW_AUTHENTICATE_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                Error::new(
                    ErrorKind::LnQuoteFailed,
                    "402 response carries no www-authenticate challenge",
                )
            })?;
        let challenge = parse_challenge(header)
            .map_err(|err| Error::new(ErrorKind::LnQuoteFailed, err.to_string()))?;
        self.quote_from_challenge(&challenge)
    }

    fn quote_from_response(&self, response: &CapturedResponse) -> Option<ProtocolQuote> {
        if response.status != 402 {
            return None;
        }
        let header = response.header_str(WWW_AUTHENTICATE_HEADER)?;
        let challenge = parse_challenge(header).ok()?;
        self.quote_from_challenge(&challenge).ok()
    }

    async fn execute(&self, request: &ProtocolRequest) -> Result<ProtocolResult, Error> {
        let wallet_manager = self.wallet.as_ref().ok_or_else(|| {
            Error::new(
                ErrorKind::CredentialsMissing,
                "no Lightning wallet configured for paid request",
            )
        })?;

        let mut first = self
            .http
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.clone());
        if let Some(body) = &request.body {
            first = first.body(body.clone());
        }
        let response = self
            .send(
                first,
                REQUEST_TIMEOUT_SECS,
                "lightning initial request",
                ErrorKind::LnPaymentFailed,
            )
            .await?;

        if response.status().as_u16() != 402 {
            return Ok(build_result(capture(response).await?));
        }

        let header = response
            .headers()
            .get(WWW_AUTHENTICATE_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                Error::new(
                    ErrorKind::LnPaymentFailed,
                    "402 response carries no www-authenticate challenge",
                )
            })?;
        let challenge = parse_challenge(&header)
            .map_err(|err| Error::new(ErrorKind::LnPaymentFailed, err.to_string()))?;

        let wallet = wallet_manager.get_or_connect().await?;
        let paid = match tokio::time::timeout(
            Duration::from_secs(PAY_TIMEOUT_SECS),
            wallet.pay_invoice(challenge.invoice()),
        )
        .await
        {
            Ok(Ok(paid)) => paid,
            Ok(Err(err)) => return Err(err),
            Err(_) => {
                return Err(Error::new(
                    ErrorKind::LnPaymentFailed,
                    format!("invoice payment timed out after {PAY_TIMEOUT_SECS} s"),
                ));
            }
        };
        tracing::debug!(prefix = %challenge.prefix, "invoice paid, retrying request");

        let retry = self.retry_request(request, &challenge, &paid);
        let response = self
            .send(
                retry,
                REQUEST_TIMEOUT_SECS,
                "lightning paid retry",
                ErrorKind::LnPaymentFailed,
            )
            .await?;
        Ok(build_result(capture(response).await?))
    }
}
