//! Realm-style challenges: `www-authenticate: x402 key="value", …`.
//!
//! Some servers announce payment terms as a quoted key/value realm
//! instead of a JSON object. The amount arrives in human display units
//! (`"0.01"` dollars) and is scaled to atomic units by exact decimal
//! string arithmetic. Parsing synthesises a V1-shaped raw object so the
//! signer and delivery path treat realm servers like any V1 server.

use std::collections::HashMap;
use std::sync::LazyLock;

use alloy_primitives::U256;
use regex::Regex;

use crate::chain::canonical_chain_id;
use crate::money::{Money, usdc_atomic_to_cents};
use crate::offer::AcceptOption;
use crate::proto::{ParsedPaymentRequired, Transport, WireVersion};

/// Chain assumed when the realm omits `chainId`.
pub const DEFAULT_REALM_CHAIN: &str = "eip155:8453";

/// Maximum accepted length of a display-unit amount string.
const MAX_AMOUNT_LEN: usize = 40;

/// Decimals of the atomic unit.
const ATOMIC_DECIMALS: usize = 6;

static KEY_VALUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([A-Za-z_][A-Za-z0-9_]*)="([^"]*)""#).expect("key-value regex compiles")
});

/// Parses a `www-authenticate` value carrying an `x402` realm.
///
/// Requires `address` and `amount` keys; `chainId` and `token` are
/// optional. Returns `None` when the realm token is absent or the
/// required keys are missing or malformed.
#[must_use]
pub fn parse(header: &str) -> Option<ParsedPaymentRequired> {
    let lower = header.to_ascii_lowercase();
    let start = lower.find("x402 ")?;
    let params = &header[start + "x402 ".len()..];

    let mut pairs: HashMap<&str, &str> = HashMap::new();
    for capture in KEY_VALUE.captures_iter(params) {
        let (_, [key, value]) = capture.extract();
        pairs.entry(key).or_insert(value);
    }

    let address = *pairs.get("address")?;
    let display_amount = *pairs.get("amount")?;
    let atomic = display_to_atomic(display_amount)?;

    let network = match pairs.get("chainId") {
        Some(chain_id) if chain_id.contains(':') => (*chain_id).to_string(),
        Some(chain_id) => format!("eip155:{chain_id}"),
        None => DEFAULT_REALM_CHAIN.to_string(),
    };
    let asset = pairs.get("token").copied().unwrap_or_default();

    let raw = serde_json::json!({
        "x402Version": 1,
        "accepts": [{
            "scheme": "exact",
            "network": network,
            "maxAmountRequired": atomic.to_string(),
            "payTo": address,
            "asset": asset,
        }]
    });

    let accepts = canonical_chain_id(&network)
        .and_then(|chain_id| {
            let namespace = chain_id.family()?;
            Some(vec![AcceptOption {
                namespace,
                network: chain_id.to_string(),
                amount: Money::from_cents(usdc_atomic_to_cents(atomic)),
                pay_to: address.to_string(),
                asset: asset.to_string(),
                scheme: "exact".to_string(),
            }])
        })
        .unwrap_or_default();

    Some(ParsedPaymentRequired {
        raw,
        version: WireVersion::V1,
        transport: Transport::RealmHeader,
        accepts,
        hints: None,
    })
}

/// Scales a display-unit amount string to atomic units by exact decimal
/// string arithmetic.
///
/// Rejects negative values, strings longer than 40 characters, and more
/// than one decimal point. The fractional part is scaled to six digits,
/// truncating anything finer.
#[must_use]
pub fn display_to_atomic(amount: &str) -> Option<U256> {
    if amount.is_empty() || amount.starts_with('-') || amount.len() > MAX_AMOUNT_LEN {
        return None;
    }
    if amount.matches('.').count() > 1 {
        return None;
    }
    let (whole, frac) = match amount.split_once('.') {
        Some((w, f)) => (w, f),
        None => (amount, ""),
    };
    let whole = if whole.is_empty() { "0" } else { whole };
    let whole: U256 = whole.parse().ok()?;

    if !frac.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let mut frac_digits: String = frac.chars().take(ATOMIC_DECIMALS).collect();
    while frac_digits.len() < ATOMIC_DECIMALS {
        frac_digits.push('0');
    }
    let frac: U256 = frac_digits.parse().ok()?;

    whole
        .checked_mul(U256::from(10u64).pow(U256::from(ATOMIC_DECIMALS)))
        .and_then(|scaled| scaled.checked_add(frac))
}
