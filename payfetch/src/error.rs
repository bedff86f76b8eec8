//! Error taxonomy for the payfetch engine.
//!
//! Errors are plain values: a stable [`ErrorKind`] code, a human-readable
//! message, and (for delivery failures) an optional [`DeliveryDiagnosis`]
//! describing what the server did with the payment. Kinds carry an HTTP-ish
//! status class used only as a caller hint, never on the wire.

use std::fmt;

use crate::adapter::AttemptResult;

/// Stable error categories exposed to callers.
///
/// The kebab-case code of each kind (see [`ErrorKind::code`]) is part of the
/// public contract and never changes between releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Invalid client configuration.
    BadConfig,
    /// Required credentials were not configured.
    MissingCredentials,
    /// The configured chain account cannot cover the payment.
    InsufficientBalance,
    /// The Lightning wallet cannot cover the invoice.
    InsufficientLightningBalance,
    /// No registered adapter recognised a payment challenge.
    DetectionFailed,
    /// A challenge was recognised but its protocol is not supported.
    ProtocolUnsupported,
    /// Payment delivery failed.
    PaymentFailed,
    /// No offered chain is compatible with the caller's preference.
    NoCompatibleChain,
    /// Chain payment execution failed.
    ChainPaymentFailed,
    /// Chain quote retrieval failed.
    ChainQuoteFailed,
    /// Lightning payment execution failed.
    LnPaymentFailed,
    /// Lightning quote retrieval failed.
    LnQuoteFailed,
    /// Lightning challenge detection failed.
    LnDetectionFailed,
    /// The adapter has no signer or wallet to pay with.
    CredentialsMissing,
    /// Wallet account provisioning failed.
    ProvisioningFailed,
    /// The daily budget limit would be exceeded.
    DailyExceeded,
    /// The monthly budget limit would be exceeded.
    MonthlyExceeded,
    /// The per-transaction limit (configured or per-request) would be exceeded.
    PerTransactionExceeded,
    /// An HTTP deadline fired.
    NetworkTimeout,
    /// The endpoint could not be reached at all.
    EndpointUnreachable,
    /// An unclassified blockchain-side failure.
    BlockchainError,
    /// The caller's cancellation signal fired.
    Aborted,
}

impl ErrorKind {
    /// Returns the stable kebab-case code for this kind.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::BadConfig => "bad-config",
            Self::MissingCredentials => "missing-credentials",
            Self::InsufficientBalance => "insufficient-balance",
            Self::InsufficientLightningBalance => "insufficient-lightning-balance",
            Self::DetectionFailed => "detection-failed",
            Self::ProtocolUnsupported => "protocol-unsupported",
            Self::PaymentFailed => "payment-failed",
            Self::NoCompatibleChain => "no-compatible-chain",
            Self::ChainPaymentFailed => "chain-payment-failed",
            Self::ChainQuoteFailed => "chain-quote-failed",
            Self::LnPaymentFailed => "ln-payment-failed",
            Self::LnQuoteFailed => "ln-quote-failed",
            Self::LnDetectionFailed => "ln-detection-failed",
            Self::CredentialsMissing => "credentials-missing",
            Self::ProvisioningFailed => "provisioning-failed",
            Self::DailyExceeded => "daily-exceeded",
            Self::MonthlyExceeded => "monthly-exceeded",
            Self::PerTransactionExceeded => "per-transaction-exceeded",
            Self::NetworkTimeout => "network-timeout",
            Self::EndpointUnreachable => "endpoint-unreachable",
            Self::BlockchainError => "blockchain-error",
            Self::Aborted => "aborted",
        }
    }

    /// HTTP-ish status class for caller hinting.
    ///
    /// This never appears on the wire; it groups kinds into configuration
    /// (400), funds (402), budget (429), protocol (502), and network (503)
    /// classes. `aborted` maps to 499 (client closed request).
    #[must_use]
    pub const fn status_hint(self) -> u16 {
        match self {
            Self::BadConfig | Self::MissingCredentials => 400,
            Self::InsufficientBalance | Self::InsufficientLightningBalance => 402,
            Self::DailyExceeded | Self::MonthlyExceeded | Self::PerTransactionExceeded => 429,
            Self::NetworkTimeout | Self::EndpointUnreachable | Self::BlockchainError => 503,
            Self::Aborted => 499,
            _ => 502,
        }
    }

    /// Returns `true` for the budget-gate kinds, which must never be
    /// swallowed or retried by adapter fallback.
    #[must_use]
    pub const fn is_budget(self) -> bool {
        matches!(
            self,
            Self::DailyExceeded | Self::MonthlyExceeded | Self::PerTransactionExceeded
        )
    }

    /// Returns `true` for kinds the orchestrator boundary passes through
    /// unwrapped: protocol, funds, budget, and network categories plus
    /// `aborted`.
    #[must_use]
    pub const fn is_recognised_at_boundary(self) -> bool {
        !matches!(self, Self::BadConfig | Self::MissingCredentials)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Which stage of a payment attempt produced a diagnosis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosisPhase {
    /// Probing for a payment challenge.
    Detection,
    /// Creating or signing the payment proof.
    Payment,
    /// Delivering the signed proof to the resource.
    Delivery,
}

/// Structured context attached to `payment-failed` errors.
///
/// Tells the caller whether a payment proof actually left the client, what
/// the server answered, and what to try next.
#[derive(Debug, Clone, Default)]
pub struct DeliveryDiagnosis {
    /// Stage that failed.
    pub phase: Option<DiagnosisPhase>,
    /// Whether a signed payment proof was sent to the server.
    pub payment_sent: bool,
    /// HTTP status of the decisive server response, if any.
    pub server_status: Option<u16>,
    /// Server-provided message, truncated to 500 characters.
    pub server_message: Option<String>,
    /// A human-readable remediation hint.
    pub suggestion: Option<String>,
    /// The full delivery attempt trail, when adaptive delivery ran.
    pub delivery_attempts: Option<Vec<AttemptResult>>,
}

impl DeliveryDiagnosis {
    /// Creates a diagnosis for the given phase.
    #[must_use]
    pub fn for_phase(phase: DiagnosisPhase) -> Self {
        Self {
            phase: Some(phase),
            ..Self::default()
        }
    }

    /// Marks the payment proof as having been sent.
    #[must_use]
    pub const fn sent(mut self) -> Self {
        self.payment_sent = true;
        self
    }

    /// Attaches the decisive server status.
    #[must_use]
    pub const fn with_status(mut self, status: u16) -> Self {
        self.server_status = Some(status);
        self
    }

    /// Attaches a server message.
    #[must_use]
    pub fn with_server_message(mut self, message: impl Into<String>) -> Self {
        self.server_message = Some(message.into());
        self
    }

    /// Attaches a remediation suggestion.
    #[must_use]
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Attaches the delivery attempt trail.
    #[must_use]
    pub fn with_attempts(mut self, attempts: Vec<AttemptResult>) -> Self {
        self.delivery_attempts = Some(attempts);
        self
    }
}

/// The error type of the payfetch engine.
#[derive(Debug, Clone, thiserror::Error)]
#[error("[{}] {message}", .kind.code())]
pub struct Error {
    kind: ErrorKind,
    message: String,
    diagnosis: Option<Box<DeliveryDiagnosis>>,
}

impl Error {
    /// Creates a new error of the given kind.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            diagnosis: None,
        }
    }

    /// Shorthand for a `bad-config` error.
    pub fn bad_config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadConfig, message)
    }

    /// Shorthand for a `payment-failed` error.
    pub fn payment_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::PaymentFailed, message)
    }

    /// Attaches a delivery diagnosis.
    #[must_use]
    pub fn with_diagnosis(mut self, diagnosis: DeliveryDiagnosis) -> Self {
        self.diagnosis = Some(Box::new(diagnosis));
        self
    }

    /// Returns the error kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the stable code of the error kind.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.kind.code()
    }

    /// Returns the human-readable message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the attached diagnosis, if any.
    #[must_use]
    pub fn diagnosis(&self) -> Option<&DeliveryDiagnosis> {
        self.diagnosis.as_deref()
    }

    /// Consumes the error and returns the attached diagnosis, if any.
    #[must_use]
    pub fn into_diagnosis(self) -> Option<DeliveryDiagnosis> {
        self.diagnosis.map(|d| *d)
    }

    /// Translates an adapter error at the orchestrator boundary.
    ///
    /// Budget, protocol, funds, and network kinds pass through unwrapped so
    /// their codes stay observable. Anything else collapses to
    /// `payment-failed` with the original message preserved.
    #[must_use]
    pub fn into_boundary(self) -> Self {
        if self.kind.is_recognised_at_boundary() {
            self
        } else {
            Self {
                kind: ErrorKind::PaymentFailed,
                message: self.message,
                diagnosis: self.diagnosis,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(ErrorKind::BadConfig.code(), "bad-config");
        assert_eq!(ErrorKind::DetectionFailed.code(), "detection-failed");
        assert_eq!(ErrorKind::NoCompatibleChain.code(), "no-compatible-chain");
        assert_eq!(ErrorKind::LnQuoteFailed.code(), "ln-quote-failed");
        assert_eq!(
            ErrorKind::PerTransactionExceeded.code(),
            "per-transaction-exceeded"
        );
        assert_eq!(
            ErrorKind::InsufficientLightningBalance.code(),
            "insufficient-lightning-balance"
        );
    }

    #[test]
    fn test_status_hints() {
        assert_eq!(ErrorKind::BadConfig.status_hint(), 400);
        assert_eq!(ErrorKind::InsufficientBalance.status_hint(), 402);
        assert_eq!(ErrorKind::DailyExceeded.status_hint(), 429);
        assert_eq!(ErrorKind::PaymentFailed.status_hint(), 502);
        assert_eq!(ErrorKind::NetworkTimeout.status_hint(), 503);
    }

    #[test]
    fn test_display_includes_code_and_message() {
        let err = Error::new(ErrorKind::ChainQuoteFailed, "expected 402, got 200");
        assert_eq!(err.to_string(), "[chain-quote-failed] expected 402, got 200");
    }

    #[test]
    fn test_budget_kinds_pass_boundary_unchanged() {
        let err = Error::new(ErrorKind::DailyExceeded, "limit hit");
        assert_eq!(err.into_boundary().kind(), ErrorKind::DailyExceeded);
    }

    #[test]
    fn test_config_kinds_collapse_to_payment_failed() {
        let err = Error::new(ErrorKind::BadConfig, "bogus");
        let translated = err.into_boundary();
        assert_eq!(translated.kind(), ErrorKind::PaymentFailed);
        assert_eq!(translated.message(), "bogus");
    }

    #[test]
    fn test_diagnosis_builder() {
        let diag = DeliveryDiagnosis::for_phase(DiagnosisPhase::Delivery)
            .sent()
            .with_status(400)
            .with_server_message("invalid signature")
            .with_suggestion("check the signer network");
        let err = Error::payment_failed("delivery failed").with_diagnosis(diag);
        let diag = err.diagnosis().expect("diagnosis attached");
        assert_eq!(diag.phase, Some(DiagnosisPhase::Delivery));
        assert!(diag.payment_sent);
        assert_eq!(diag.server_status, Some(400));
    }
}
