//! L402/LSAT challenge parsing.
//!
//! Two dialects appear in the wild, both in `www-authenticate`:
//!
//! - **Standard**: `L402 macaroon="..", invoice=".."`; the paid retry
//!   authorises with `Authorization: L402 <macaroon>:<preimage>`.
//! - **Invoice-only**: `L402 invoice="..", payment_hash=".."`; the paid
//!   retry proves payment by echoing the payment hash in a JSON body.
//!
//! The scheme prefix is matched case-insensitively and preserved
//! upper-cased, because the retry must echo the dialect the server chose.
//! When both dialects match one header, Standard wins.

use std::sync::LazyLock;

use regex::Regex;

/// A parsed Lightning payment challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    /// The scheme prefix the server used, upper-cased: `L402` or `LSAT`.
    pub prefix: String,
    /// Which dialect the server spoke.
    pub kind: ChallengeKind,
}

/// The challenge dialect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChallengeKind {
    /// Macaroon + invoice; retry carries an Authorization header.
    Standard {
        /// The opaque capability token.
        macaroon: String,
        /// The BOLT11 invoice to pay.
        invoice: String,
    },
    /// Invoice + payment hash; retry carries the hash in a JSON body.
    InvoiceOnly {
        /// The BOLT11 invoice to pay.
        invoice: String,
        /// 64-hex payment hash, as the server sent it.
        payment_hash: String,
    },
}

impl Challenge {
    /// The invoice to pay, whichever dialect carried it.
    #[must_use]
    pub fn invoice(&self) -> &str {
        match &self.kind {
            ChallengeKind::Standard { invoice, .. }
            | ChallengeKind::InvoiceOnly { invoice, .. } => invoice,
        }
    }
}

/// Why a header failed to parse as a challenge.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChallengeParseError {
    /// The header carries no L402/LSAT challenge at all.
    #[error("no L402 challenge in www-authenticate header")]
    NoChallenge,
    /// The macaroon is not base64/base64url.
    #[error("macaroon is not valid base64 content")]
    BadMacaroon,
    /// The payment hash is not 64 hex characters.
    #[error("payment_hash is not a 64-character hex string")]
    BadPaymentHash,
}

static STANDARD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\b(L402|LSAT)\s+macaroon="([A-Za-z0-9+/\-_=]+)",\s*invoice="(.+?)""#)
        .expect("standard challenge regex compiles")
});

static MACAROON_FORM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9+/\-_]*={0,2}$").expect("macaroon form regex compiles")
});

static INVOICE_ONLY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\b(L402|LSAT)\s+invoice="(.+?)",\s*payment_hash="([^"]*)""#)
        .expect("invoice-only challenge regex compiles")
});

static PAYMENT_HASH_FORM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9a-fA-F]{64}$").expect("payment hash regex compiles"));

/// Returns `true` when the header matches either challenge dialect with
/// all constraints satisfied. This is the detection predicate.
#[must_use]
pub fn is_challenge(header: &str) -> bool {
    parse_challenge(header).is_ok()
}

/// Parses a `www-authenticate` value into a [`Challenge`].
///
/// # Errors
///
/// [`ChallengeParseError::NoChallenge`] when neither dialect matches;
/// [`ChallengeParseError::BadMacaroon`] / [`ChallengeParseError::BadPaymentHash`]
/// when a dialect matched but its token fails validation.
pub fn parse_challenge(header: &str) -> Result<Challenge, ChallengeParseError> {
    if let Some(captures) = STANDARD.captures(header) {
        let (_, [prefix, macaroon, invoice]) = captures.extract();
        if !MACAROON_FORM.is_match(macaroon) {
            return Err(ChallengeParseError::BadMacaroon);
        }
        return Ok(Challenge {
            prefix: prefix.to_uppercase(),
            kind: ChallengeKind::Standard {
                macaroon: macaroon.to_string(),
                invoice: invoice.to_string(),
            },
        });
    }

    if let Some(captures) = INVOICE_ONLY.captures(header) {
        let (_, [prefix, invoice, payment_hash]) = captures.extract();
        if !PAYMENT_HASH_FORM.is_match(payment_hash) {
            return Err(ChallengeParseError::BadPaymentHash);
        }
        return Ok(Challenge {
            prefix: prefix.to_uppercase(),
            kind: ChallengeKind::InvoiceOnly {
                invoice: invoice.to_string(),
                payment_hash: payment_hash.to_string(),
            },
        });
    }

    Err(ChallengeParseError::NoChallenge)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_challenge() {
        let header = r#"L402 macaroon="AgEDbG5kAvgBAwoQ", invoice="lnbc200n1pexample""#;
        let challenge = parse_challenge(header).unwrap();
        assert_eq!(challenge.prefix, "L402");
        assert_eq!(challenge.invoice(), "lnbc200n1pexample");
        match challenge.kind {
            ChallengeKind::Standard { macaroon, .. } => {
                assert_eq!(macaroon, "AgEDbG5kAvgBAwoQ");
            }
            ChallengeKind::InvoiceOnly { .. } => panic!("expected standard dialect"),
        }
    }

    #[test]
    fn test_lsat_prefix_preserved_uppercase() {
        let header = r#"lsat macaroon="AgE=", invoice="lnbc1""#;
        let challenge = parse_challenge(header).unwrap();
        assert_eq!(challenge.prefix, "LSAT");
    }

    #[test]
    fn test_invoice_only_challenge() {
        let hash = "ced2".repeat(16);
        let header = format!(r#"L402 invoice="lnbc1pexample", payment_hash="{hash}""#);
        let challenge = parse_challenge(&header).unwrap();
        match challenge.kind {
            ChallengeKind::InvoiceOnly {
                invoice,
                payment_hash,
            } => {
                assert_eq!(invoice, "lnbc1pexample");
                assert_eq!(payment_hash, hash);
            }
            ChallengeKind::Standard { .. } => panic!("expected invoice-only dialect"),
        }
    }

    #[test]
    fn test_payment_hash_case_insensitive() {
        let hash = "CED2".repeat(16);
        let header = format!(r#"LSAT invoice="lnbc1", payment_hash="{hash}""#);
        let challenge = parse_challenge(&header).unwrap();
        match challenge.kind {
            ChallengeKind::InvoiceOnly { payment_hash, .. } => assert_eq!(payment_hash, hash),
            ChallengeKind::Standard { .. } => panic!("expected invoice-only dialect"),
        }
    }

    #[test]
    fn test_wrong_length_hash_is_bad_challenge() {
        let header = r#"L402 invoice="lnbc1", payment_hash="abc123""#;
        assert_eq!(
            parse_challenge(header),
            Err(ChallengeParseError::BadPaymentHash)
        );
        assert!(!is_challenge(header));
    }

    #[test]
    fn test_non_hex_hash_is_bad_challenge() {
        let hash = "zzzz".repeat(16);
        let header = format!(r#"L402 invoice="lnbc1", payment_hash="{hash}""#);
        assert_eq!(
            parse_challenge(&header),
            Err(ChallengeParseError::BadPaymentHash)
        );
    }

    #[test]
    fn test_standard_wins_when_both_match() {
        let hash = "ab12".repeat(16);
        let header = format!(
            r#"L402 macaroon="AgE=", invoice="lnbc1", payment_hash="{hash}""#
        );
        let challenge = parse_challenge(&header).unwrap();
        assert!(matches!(challenge.kind, ChallengeKind::Standard { .. }));
    }

    #[test]
    fn test_unrelated_header_is_no_challenge() {
        assert_eq!(
            parse_challenge(r#"Bearer realm="api""#),
            Err(ChallengeParseError::NoChallenge)
        );
        assert!(!is_challenge("Basic xyz"));
    }
}
