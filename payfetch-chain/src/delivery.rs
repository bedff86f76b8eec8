//! Delivery planning and adaptive delivery.
//!
//! A signed payload is not always accepted on the first try: V1 servers
//! commonly insist on POST, some deployments read the other generation's
//! header, and a few reject with 400 on recoverable shape problems. The
//! delivery plan enumerates (method, header) attempts in an order that
//! never wastes a nonce, and the adaptive loop re-signs only when the
//! method changes or the previous attempt consumed the nonce.

use http::{HeaderValue, Method};

use payfetch::adapter::{
    AttemptResult, CapturedResponse, DeliveryAttempt, ProtocolRequest, ProtocolResult,
    server_message_from_body,
};
use payfetch::encoding;
use payfetch::error::{DeliveryDiagnosis, DiagnosisPhase, Error, ErrorKind};
use payfetch::proto::{WireVersion, settlement_from_headers};

use crate::http::{capture, send_with_deadline};
use crate::negotiation::Negotiation;
use crate::signer::{PaymentSigner, signing_failure};

/// Per-attempt delivery deadline.
pub const DELIVERY_TIMEOUT_SECS: u64 = 30;

/// Statuses worth retrying with a different (method, header) pair.
const RETRYABLE_STATUSES: [u16; 3] = [400, 402, 405];

/// Statuses after which the signed nonce is believed reusable under the
/// same HTTP method: the server refused before processing the payment.
/// A 400 is treated as nonce-consumed.
const NONCE_SAFE_STATUSES: [u16; 3] = [402, 404, 405];

/// Builds the ordered (method, header) attempt plan for a negotiation.
///
/// V1 servers answering GET get a POST-first plan: many only accept POST
/// and would consume the nonce on a 405 if GET went out signed first.
#[must_use]
pub fn build_plan(version: WireVersion, caller_method: &Method) -> Vec<DeliveryAttempt> {
    let natural = version.response_header();
    let alternate = version.alternate_header();

    if version == WireVersion::V1 && *caller_method == Method::GET {
        return vec![
            DeliveryAttempt {
                method: Method::POST,
                header_name: natural,
            },
            DeliveryAttempt {
                method: Method::GET,
                header_name: natural,
            },
            DeliveryAttempt {
                method: Method::GET,
                header_name: alternate,
            },
        ];
    }

    let mut plan = vec![DeliveryAttempt {
        method: caller_method.clone(),
        header_name: natural,
    }];
    if *caller_method == Method::GET {
        plan.push(DeliveryAttempt {
            method: Method::POST,
            header_name: natural,
        });
    }
    plan.push(DeliveryAttempt {
        method: caller_method.clone(),
        header_name: alternate,
    });
    plan
}

/// Runs the adaptive delivery loop to completion.
///
/// # Errors
///
/// Returns `payment-failed` when signing fails or the plan exhausts on
/// retryable statuses, `chain-payment-failed` on a per-attempt deadline,
/// and `endpoint-unreachable` on transport failures.
pub(crate) async fn deliver(
    http: &reqwest::Client,
    request: &ProtocolRequest,
    negotiation: &Negotiation,
    signer: &dyn PaymentSigner,
) -> Result<ProtocolResult, Error> {
    let plan = build_plan(negotiation.version, &request.method);
    let mut cached_payload: Option<String> = None;
    let mut last_method: Option<Method> = None;
    let mut attempts: Vec<AttemptResult> = Vec::new();

    for attempt in plan {
        if cached_payload.is_none() || last_method.as_ref() != Some(&attempt.method) {
            let payload = signer
                .sign_payment(&negotiation.raw)
                .await
                .map_err(|err| signing_failure(&err))?;
            cached_payload = Some(encoding::encode_json(&payload));
            tracing::debug!(method = %attempt.method, "signed fresh payment payload");
        }
        let payload = cached_payload.clone().expect("payload cached above");

        let mut headers = request.headers.clone();
        headers.insert(
            http::HeaderName::from_bytes(attempt.header_name.as_bytes())
                .expect("payload header name is valid"),
            HeaderValue::from_str(&payload).expect("base64 payload is a valid header value"),
        );

        let mut outbound = http
            .request(attempt.method.clone(), request.url.clone())
            .headers(headers);
        if let Some(body) = &request.body {
            outbound = outbound.body(body.clone());
        }
        let response = send_with_deadline(
            outbound,
            DELIVERY_TIMEOUT_SECS,
            "payment delivery attempt",
            ErrorKind::ChainPaymentFailed,
        )
        .await?;
        let status = response.status().as_u16();

        if !RETRYABLE_STATUSES.contains(&status) {
            let captured = capture(response).await?;
            return Ok(result_from_captured(&captured, attempts));
        }

        let captured = capture(response).await?;
        let server_message = if status == 400 {
            server_message_from_body(&captured.body)
        } else {
            None
        };
        if !NONCE_SAFE_STATUSES.contains(&status) {
            cached_payload = None;
        }
        tracing::debug!(
            method = %attempt.method,
            header = attempt.header_name,
            status,
            "delivery attempt rejected, trying next"
        );
        last_method = Some(attempt.method.clone());
        attempts.push(AttemptResult {
            method: attempt.method,
            header_name: attempt.header_name.to_string(),
            status,
            server_message,
        });
    }

    Err(exhausted(attempts))
}

/// Builds a [`ProtocolResult`] from the final response of a delivery.
#[must_use]
pub(crate) fn result_from_captured(
    captured: &CapturedResponse,
    attempts: Vec<AttemptResult>,
) -> ProtocolResult {
    let settlement = settlement_from_headers(&captured.headers);
    let (tx_hash, network) = settlement
        .map(|s| (s.transaction, s.network))
        .unwrap_or((None, None));
    ProtocolResult {
        success: (200..300).contains(&captured.status),
        status: captured.status,
        headers: captured.headers.clone(),
        body: captured.body.clone(),
        tx_hash,
        network,
        attempts,
    }
}

fn exhausted(attempts: Vec<AttemptResult>) -> Error {
    let trail = attempts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    let suggestion = exhaustion_suggestion(&attempts);
    let last_status = attempts.last().map(|a| a.status);
    let mut diagnosis = DeliveryDiagnosis::for_phase(DiagnosisPhase::Delivery)
        .sent()
        .with_suggestion(suggestion)
        .with_attempts(attempts);
    if let Some(status) = last_status {
        diagnosis = diagnosis.with_status(status);
    }
    Error::payment_failed(format!("payment delivery exhausted all attempts: {trail}"))
        .with_diagnosis(diagnosis)
}

/// Picks a remediation hint from the attempt trail; the first matching
/// rule wins.
#[must_use]
pub fn exhaustion_suggestion(attempts: &[AttemptResult]) -> String {
    let any_405 = attempts.iter().any(|a| a.status == 405);
    let any_post_402 = attempts
        .iter()
        .any(|a| a.method == Method::POST && a.status == 402);
    if any_405 && any_post_402 {
        return "the endpoint appears to require POST with a JSON body; retry with method \
                POST and the parameters the endpoint documents"
            .to_string();
    }

    if let Some(message) = attempts
        .iter()
        .filter(|a| a.status == 400)
        .find_map(|a| a.server_message.as_deref())
    {
        return format!("the server rejected the payment: {message}");
    }

    let any_400 = attempts.iter().any(|a| a.status == 400);
    if any_400 && attempts.iter().all(|a| a.status == 400) {
        return "the endpoint appears to require specific parameters; check the expected \
                query and body fields"
            .to_string();
    }
    if any_400 {
        return "the endpoint appears to use a non-standard payment verification flow"
            .to_string();
    }

    if !attempts.is_empty() && attempts.iter().all(|a| a.status == 402) {
        return "the server recognises no payment format this client can produce".to_string();
    }

    "the endpoint rejected every delivery attempt".to_string()
}
