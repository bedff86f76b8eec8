//! Composite wallet status snapshot.

use payfetch::money::Money;

use crate::budget::BudgetSnapshot;

/// Status of one chain family's wallet.
#[derive(Debug, Clone, Default)]
pub struct FamilyStatus {
    /// Account address, when provisioned.
    pub address: Option<String>,
    /// USDC-equivalent balance in USD cents; `None` when unknown.
    pub balance: Option<Money>,
}

/// Status of the Lightning wallet.
#[derive(Debug, Clone, Default)]
pub struct LightningStatus {
    /// Spendable balance in satoshis; `None` when unknown.
    pub balance: Option<Money>,
}

/// Everything a caller can know about the client's ability to pay.
///
/// Every field degrades independently: a dead RPC or an unprovisioned
/// wallet shows up as `None`, never as an error.
#[derive(Debug, Clone)]
pub struct WalletStatus {
    /// EVM wallet status, when an EVM wallet manager is configured.
    pub evm: Option<FamilyStatus>,
    /// Solana wallet status, when an SVM wallet manager is configured.
    pub svm: Option<FamilyStatus>,
    /// Lightning wallet status, when a Lightning wallet is configured.
    pub lightning: Option<LightningStatus>,
    /// Current budget accounting.
    pub budget: BudgetSnapshot,
}
