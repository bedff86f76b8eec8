//! BOLT11 invoice decoding contract.
//!
//! Decoding a BOLT11 invoice is heavy, so the concrete decoder is an
//! injected dependency resolved lazily: the adapter takes a
//! [`Bolt11DecoderFactory`] and only loads the decoder the first time a
//! Lightning quote or payment is actually attempted. Decoders expose the
//! invoice as named sections; the engine only reads the `amount` section.

use std::sync::Arc;

use payfetch::error::{Error, ErrorKind};

/// Millisatoshis per satoshi.
const MSATS_PER_SAT: u64 = 1000;

/// One named section of a decoded BOLT11 invoice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceSection {
    /// Section name, e.g. `"amount"`, `"payment_hash"`.
    pub name: String,
    /// Section value; the `amount` section is a millisatoshi string.
    pub value: serde_json::Value,
}

/// Decodes BOLT11 invoices into named sections.
pub trait Bolt11Decoder: Send + Sync {
    /// Decodes the invoice.
    ///
    /// # Errors
    ///
    /// Returns an adapter-level error when the invoice is malformed.
    fn decode(&self, invoice: &str) -> Result<Vec<InvoiceSection>, Error>;
}

/// Loads a [`Bolt11Decoder`] on first use.
///
/// Loading failures keep their original kind so configuration problems
/// stay distinguishable from quote problems.
pub trait Bolt11DecoderFactory: Send + Sync {
    /// Resolves the decoder.
    ///
    /// # Errors
    ///
    /// Propagates whatever the underlying loader reports.
    fn load(&self) -> Result<Arc<dyn Bolt11Decoder>, Error>;
}

/// Extracts the invoice amount in satoshis from decoded sections.
///
/// The `amount` section carries millisatoshis as a string; amounts are
/// rejected when missing, non-string, non-numeric, or not positive, and
/// rounded up to whole satoshis.
///
/// # Errors
///
/// Returns `ln-quote-failed` on any of the rejections above.
pub fn amount_sats_from_sections(sections: &[InvoiceSection]) -> Result<u64, Error> {
    let value = sections
        .iter()
        .find(|section| section.name == "amount")
        .map(|section| &section.value)
        .ok_or_else(|| {
            Error::new(
                ErrorKind::LnQuoteFailed,
                "invoice has no amount section; amountless invoices are not payable here",
            )
        })?;
    let msats_text = value.as_str().ok_or_else(|| {
        Error::new(
            ErrorKind::LnQuoteFailed,
            "invoice amount section is not a string",
        )
    })?;
    let msats: u64 = msats_text.parse().map_err(|_| {
        Error::new(
            ErrorKind::LnQuoteFailed,
            format!("invoice amount {msats_text:?} is not a millisatoshi count"),
        )
    })?;
    if msats == 0 {
        return Err(Error::new(
            ErrorKind::LnQuoteFailed,
            "invoice amount must be positive",
        ));
    }
    Ok(msats.div_ceil(MSATS_PER_SAT))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sections(amount: serde_json::Value) -> Vec<InvoiceSection> {
        vec![
            InvoiceSection {
                name: "payment_hash".into(),
                value: serde_json::json!("ab".repeat(32)),
            },
            InvoiceSection {
                name: "amount".into(),
                value: amount,
            },
        ]
    }

    #[test]
    fn test_exact_sats() {
        let sats = amount_sats_from_sections(&sections(serde_json::json!("200000"))).unwrap();
        assert_eq!(sats, 200);
    }

    #[test]
    fn test_partial_sat_rounds_up() {
        let sats = amount_sats_from_sections(&sections(serde_json::json!("200001"))).unwrap();
        assert_eq!(sats, 201);
        let sats = amount_sats_from_sections(&sections(serde_json::json!("1"))).unwrap();
        assert_eq!(sats, 1);
    }

    #[test]
    fn test_missing_amount_section() {
        let sections = vec![InvoiceSection {
            name: "description".into(),
            value: serde_json::json!("coffee"),
        }];
        let err = amount_sats_from_sections(&sections).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LnQuoteFailed);
    }

    #[test]
    fn test_non_string_amount() {
        let err = amount_sats_from_sections(&sections(serde_json::json!(200_000))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LnQuoteFailed);
    }

    #[test]
    fn test_zero_amount_rejected() {
        let err = amount_sats_from_sections(&sections(serde_json::json!("0"))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LnQuoteFailed);
    }

    #[test]
    fn test_garbage_amount_rejected() {
        let err = amount_sats_from_sections(&sections(serde_json::json!("12abc"))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LnQuoteFailed);
    }
}
