//! V2 accept shape: CAIP networks and atomic `amount` strings.

use alloy_primitives::U256;
use serde::Deserialize;

use crate::chain::canonical_chain_id;
use crate::money::{Money, usdc_atomic_to_cents};
use crate::offer::AcceptOption;

/// One V2 accept entry as the server sends it.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptV2 {
    /// Payment scheme tag.
    pub scheme: String,
    /// Network id, CAIP form.
    pub network: String,
    /// Price in atomic token units, decimal string.
    pub amount: String,
    /// Asset tag.
    pub asset: String,
    /// Recipient address.
    pub pay_to: String,
}

/// Checks the V2 shape and normalises its accepts.
///
/// The shape is valid when `x402Version` is numeric and `accepts` is a
/// non-empty array whose every entry carries the five V2 string fields.
/// Returns `None` on shape mismatch so the cascade can try the V1 shape;
/// returns `Some(vec![])` when the shape held but every offer was dropped
/// (unknown namespace or unparseable amount).
#[must_use]
pub fn accepts_from_value(raw: &serde_json::Value) -> Option<Vec<AcceptOption>> {
    raw.get("x402Version")?.as_u64()?;
    let accepts = raw.get("accepts")?.as_array()?;
    if accepts.is_empty() {
        return None;
    }
    let typed: Vec<AcceptV2> = accepts
        .iter()
        .map(|entry| serde_json::from_value(entry.clone()).ok())
        .collect::<Option<_>>()?;
    Some(typed.iter().filter_map(normalise).collect())
}

fn normalise(accept: &AcceptV2) -> Option<AcceptOption> {
    let chain_id = canonical_chain_id(&accept.network)?;
    let namespace = chain_id.family()?;
    let atomic: U256 = accept.amount.parse().ok()?;
    Some(AcceptOption {
        namespace,
        network: chain_id.to_string(),
        amount: Money::from_cents(usdc_atomic_to_cents(atomic)),
        pay_to: accept.pay_to.clone(),
        asset: accept.asset.clone(),
        scheme: accept.scheme.clone(),
    })
}
