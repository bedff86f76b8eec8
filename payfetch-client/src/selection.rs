//! Chain selection over multi-accept quotes.
//!
//! When a server offers several rails, the engine picks one by: position
//! in the preference list first, then the cheaper amount, then EVM over
//! SVM as the final tie-break. A per-request preference narrows the
//! choice to exactly that family.

use std::collections::HashSet;

use payfetch::chain::{ChainNamespace, family_of_network};
use payfetch::error::{Error, ErrorKind};
use payfetch::offer::{AcceptOption, ProtocolQuote};

/// Applies chain selection to a probe's quote.
///
/// Returns a quote that differs from the input only in amount, network,
/// and recipient. Quotes without an accept list pass through unchanged
/// unless they directly contradict the per-request preference.
///
/// # Errors
///
/// Returns `no-compatible-chain` when no offered rail satisfies the
/// preferences, naming the namespaces the endpoint does offer.
pub fn select_chain(
    quote: &ProtocolQuote,
    per_request: Option<ChainNamespace>,
    configured: &[ChainNamespace],
) -> Result<ProtocolQuote, Error> {
    let accepts = match &quote.all_accepts {
        Some(accepts) if !accepts.is_empty() => accepts,
        _ => {
            if let Some(wanted) = per_request
                && let Some(actual) = quote.network.as_deref().and_then(family_of_network)
                && actual != wanted
            {
                return Err(Error::new(
                    ErrorKind::NoCompatibleChain,
                    format!(
                        "requested {wanted} but the endpoint pays on {actual} only"
                    ),
                ));
            }
            return Ok(quote.clone());
        }
    };

    let supported: HashSet<ChainNamespace> = configured
        .iter()
        .copied()
        .chain(per_request)
        .collect();
    let preferences: Vec<ChainNamespace> = match per_request {
        Some(wanted) => vec![wanted],
        None => configured.to_vec(),
    };

    let mut candidates: Vec<&AcceptOption> = accepts
        .iter()
        .filter(|accept| supported.is_empty() || supported.contains(&accept.namespace))
        .collect();
    if candidates.is_empty() {
        return Err(no_compatible(accepts, per_request));
    }

    candidates.sort_by(|a, b| {
        let position = |accept: &AcceptOption| {
            preferences
                .iter()
                .position(|p| *p == accept.namespace)
                .unwrap_or(usize::MAX)
        };
        position(a)
            .cmp(&position(b))
            .then_with(|| a.amount.minor_units().cmp(&b.amount.minor_units()))
            .then_with(|| a.namespace.cmp(&b.namespace))
    });
    let winner = candidates[0];

    if let Some(wanted) = per_request
        && winner.namespace != wanted
    {
        return Err(no_compatible(accepts, per_request));
    }

    Ok(ProtocolQuote {
        protocol: quote.protocol,
        amount: winner.amount.clone(),
        network: Some(winner.network.clone()),
        pay_to: Some(winner.pay_to.clone()),
        all_accepts: quote.all_accepts.clone(),
        input_hints: quote.input_hints.clone(),
    })
}

fn no_compatible(accepts: &[AcceptOption], per_request: Option<ChainNamespace>) -> Error {
    let mut offered: Vec<&str> = accepts
        .iter()
        .map(|accept| accept.namespace.as_str())
        .collect();
    offered.sort_unstable();
    offered.dedup();
    let wanted = per_request.map_or_else(
        || "the configured preferences".to_string(),
        |ns| format!("{ns}"),
    );
    Error::new(
        ErrorKind::NoCompatibleChain,
        format!(
            "no offered chain matches {wanted}; the endpoint offers: {}",
            offered.join(", ")
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use payfetch::money::Money;
    use payfetch::offer::Protocol;

    fn accept(namespace: ChainNamespace, network: &str, cents: u64, pay_to: &str) -> AcceptOption {
        AcceptOption {
            namespace,
            network: network.into(),
            amount: Money::from_cents(cents),
            pay_to: pay_to.into(),
            asset: String::new(),
            scheme: "exact".into(),
        }
    }

    fn multi_quote() -> ProtocolQuote {
        ProtocolQuote::from_accepts(
            Protocol::X402,
            vec![
                accept(ChainNamespace::Evm, "eip155:8453", 50, "0xEvm"),
                accept(
                    ChainNamespace::Svm,
                    "solana:5eykt4UsFv8P8NJdTREpY1vzqKqZKvdp",
                    30,
                    "Sol",
                ),
            ],
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_cheapest_wins_without_preferences() {
        let selected = select_chain(&multi_quote(), None, &[]).unwrap();
        assert_eq!(selected.amount, Money::from_cents(30u64));
        assert_eq!(selected.pay_to.as_deref(), Some("Sol"));
        assert!(selected.network.as_deref().unwrap().starts_with("solana:"));
    }

    #[test]
    fn test_configured_preference_beats_price() {
        let selected = select_chain(&multi_quote(), None, &[ChainNamespace::Evm]).unwrap();
        assert_eq!(selected.amount, Money::from_cents(50u64));
        assert_eq!(selected.pay_to.as_deref(), Some("0xEvm"));
    }

    #[test]
    fn test_per_request_overrides_configured() {
        let selected = select_chain(
            &multi_quote(),
            Some(ChainNamespace::Svm),
            &[ChainNamespace::Evm],
        )
        .unwrap();
        assert_eq!(selected.pay_to.as_deref(), Some("Sol"));
    }

    #[test]
    fn test_evm_tie_break_on_equal_price() {
        let quote = ProtocolQuote::from_accepts(
            Protocol::X402,
            vec![
                accept(
                    ChainNamespace::Svm,
                    "solana:5eykt4UsFv8P8NJdTREpY1vzqKqZKvdp",
                    30,
                    "Sol",
                ),
                accept(ChainNamespace::Evm, "eip155:8453", 30, "0xEvm"),
            ],
            None,
        )
        .unwrap();
        let selected = select_chain(&quote, None, &[]).unwrap();
        assert_eq!(selected.pay_to.as_deref(), Some("0xEvm"));
    }

    #[test]
    fn test_incompatible_per_request_fails_with_offered_list() {
        let quote = ProtocolQuote::from_accepts(
            Protocol::X402,
            vec![accept(ChainNamespace::Evm, "eip155:8453", 50, "0xEvm")],
            None,
        )
        .unwrap();
        let err = select_chain(&quote, Some(ChainNamespace::Svm), &[]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoCompatibleChain);
        assert!(err.message().contains("evm"));
    }

    #[test]
    fn test_no_accepts_passthrough() {
        let quote = ProtocolQuote {
            protocol: Protocol::L402,
            amount: Money::from_satoshis(200u64),
            network: Some("lightning".into()),
            pay_to: None,
            all_accepts: None,
            input_hints: None,
        };
        let selected = select_chain(&quote, None, &[ChainNamespace::Evm]).unwrap();
        assert_eq!(selected.amount, Money::from_satoshis(200u64));
    }

    #[test]
    fn test_no_accepts_with_contradicting_per_request() {
        let quote = ProtocolQuote {
            protocol: Protocol::X402,
            amount: Money::from_cents(10u64),
            network: Some("eip155:8453".into()),
            pay_to: Some("0x".into()),
            all_accepts: None,
            input_hints: None,
        };
        let err = select_chain(&quote, Some(ChainNamespace::Svm), &[]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoCompatibleChain);
    }

    #[test]
    fn test_unparseable_network_passes_per_request() {
        let quote = ProtocolQuote {
            protocol: Protocol::L402,
            amount: Money::from_satoshis(5u64),
            network: Some("lightning".into()),
            pay_to: None,
            all_accepts: None,
            input_hints: None,
        };
        assert!(select_chain(&quote, Some(ChainNamespace::Evm), &[]).is_ok());
    }
}
