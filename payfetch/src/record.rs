//! Completed-payment records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::money::Money;
use crate::offer::Protocol;

/// One completed payment. Append-only: a record is never mutated after
/// construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRecord {
    /// Unique record id.
    pub id: String,
    /// The resource that was paid for.
    pub url: String,
    /// Protocol family that carried the payment.
    pub protocol: Protocol,
    /// Amount paid, in the protocol's native currency.
    pub amount: Money,
    /// When the payment completed.
    pub timestamp: DateTime<Utc>,
    /// Settlement transaction id, when the server reported one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    /// Network the payment settled on, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
}

impl PaymentRecord {
    /// Creates a record for a payment completed now, with a fresh id.
    #[must_use]
    pub fn new(
        url: impl Into<String>,
        protocol: Protocol,
        amount: Money,
        tx_hash: Option<String>,
        network: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            url: url.into(),
            protocol,
            amount,
            timestamp: Utc::now(),
            tx_hash,
            network,
        }
    }
}
