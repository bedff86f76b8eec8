//! V1 accept shape: network names and `maxAmountRequired` strings.

use alloy_primitives::U256;
use serde::Deserialize;

use crate::chain::canonical_chain_id;
use crate::money::{Money, usdc_atomic_to_cents};
use crate::offer::AcceptOption;

/// Default scheme tag when a V1 accept omits one.
pub const DEFAULT_SCHEME: &str = "exact";

/// One V1 accept entry as the server sends it.
///
/// The amount may arrive as `maxAmountRequired` or plain `amount`; both
/// are atomic-unit decimal strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptV1 {
    /// Network, either a V1 name ("base") or CAIP form.
    pub network: String,
    /// Recipient address.
    pub pay_to: String,
    /// Price in atomic token units, decimal string.
    #[serde(alias = "amount")]
    pub max_amount_required: String,
    /// Payment scheme tag, defaulting to `"exact"`.
    #[serde(default)]
    pub scheme: Option<String>,
    /// Asset tag, defaulting to empty.
    #[serde(default)]
    pub asset: Option<String>,
}

/// Checks the V1 shape and normalises its accepts.
///
/// The shape is valid when `x402Version` is a number ≥ 1 and `accepts` is
/// a non-empty array whose every entry carries string `network`, `payTo`,
/// and an amount under `maxAmountRequired` or `amount`. Returns
/// `Some(vec![])` when the shape held but every offer was dropped.
#[must_use]
pub fn accepts_from_value(raw: &serde_json::Value) -> Option<Vec<AcceptOption>> {
    let version = raw.get("x402Version")?.as_u64()?;
    if version < 1 {
        return None;
    }
    let accepts = raw.get("accepts")?.as_array()?;
    if accepts.is_empty() {
        return None;
    }
    let typed: Vec<AcceptV1> = accepts
        .iter()
        .map(|entry| serde_json::from_value(entry.clone()).ok())
        .collect::<Option<_>>()?;
    Some(typed.iter().filter_map(normalise).collect())
}

fn normalise(accept: &AcceptV1) -> Option<AcceptOption> {
    let chain_id = canonical_chain_id(&accept.network)?;
    let namespace = chain_id.family()?;
    let atomic: U256 = accept.max_amount_required.parse().ok()?;
    Some(AcceptOption {
        namespace,
        network: chain_id.to_string(),
        amount: Money::from_cents(usdc_atomic_to_cents(atomic)),
        pay_to: accept.pay_to.clone(),
        asset: accept.asset.clone().unwrap_or_default(),
        scheme: accept
            .scheme
            .clone()
            .unwrap_or_else(|| DEFAULT_SCHEME.to_string()),
    })
}
