//! The chain signer contract.
//!
//! Signing is an injected opaque handle: the engine hands the signer the
//! raw payment-required object exactly as the server sent it and gets
//! back a payload object to base64 into the payment header. The engine
//! never constructs chain transactions itself.

use async_trait::async_trait;

use payfetch::error::{DeliveryDiagnosis, DiagnosisPhase, Error};

/// Signs payment-required objects into deliverable payment payloads.
///
/// The `payment_required` argument is the raw server object with its
/// field names untouched; V1 servers verify against the exact shape they
/// emitted, so renaming fields before signing breaks them.
#[async_trait]
pub trait PaymentSigner: Send + Sync {
    /// Produces the payment payload for the given challenge.
    async fn sign_payment(
        &self,
        payment_required: &serde_json::Value,
    ) -> Result<serde_json::Value, Error>;
}

/// Wraps a signing failure into `payment-failed` with a heuristic
/// suggestion drawn from the error text.
#[must_use]
pub fn signing_failure(err: &Error) -> Error {
    let mut diagnosis = DeliveryDiagnosis::for_phase(DiagnosisPhase::Payment);
    if let Some(suggestion) = suggestion_for_signature_error(err.message()) {
        diagnosis = diagnosis.with_suggestion(suggestion);
    }
    Error::payment_failed(format!("payment signing failed: {}", err.message()))
        .with_diagnosis(diagnosis)
}

/// Maps well-known failure phrases to remediation hints.
#[must_use]
pub fn suggestion_for_signature_error(text: &str) -> Option<String> {
    let lower = text.to_lowercase();
    if lower.contains("eip-712") || lower.contains("eip712") || lower.contains("domain") {
        return Some(
            "the signer rejected the EIP-712 domain; check that the wallet is configured \
             for the network being paid on"
                .to_string(),
        );
    }
    if lower.contains("timeout") || lower.contains("terminated") {
        return Some(
            "the signer timed out; the wallet process may be hung or unreachable".to_string(),
        );
    }
    if lower.contains("insufficient") || lower.contains("balance") {
        return Some(
            "the wallet balance may not cover the payment; fund the account and retry"
                .to_string(),
        );
    }
    None
}
