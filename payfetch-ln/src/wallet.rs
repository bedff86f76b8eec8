//! Lightning wallet contract and single-flight connection manager.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use payfetch::error::{Error, ErrorKind};

/// Deadline for establishing the wallet connection.
pub const CONNECT_TIMEOUT_SECS: u64 = 15;

/// Deadline for a balance query.
pub const BALANCE_TIMEOUT_SECS: u64 = 15;

/// Proof that an invoice was paid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaidInvoice {
    /// Hex preimage revealed by the payment.
    pub preimage: String,
}

/// An opaque Lightning wallet handle.
#[async_trait]
pub trait LightningWallet: Send + Sync {
    /// Pays a BOLT11 invoice and returns the preimage.
    async fn pay_invoice(&self, invoice: &str) -> Result<PaidInvoice, Error>;

    /// Returns the spendable balance in satoshis.
    async fn balance_sats(&self) -> Result<u64, Error>;
}

/// Establishes the wallet connection on first use.
#[async_trait]
pub trait LightningConnector: Send + Sync {
    /// Connects to the wallet backend.
    async fn connect(&self) -> Result<Arc<dyn LightningWallet>, Error>;
}

/// Single-flight Lightning wallet manager.
///
/// The mutex serialises first-time connection so concurrent callers share
/// one connect call and the same cached handle.
pub struct LnWalletManager {
    connector: Arc<dyn LightningConnector>,
    cached: Mutex<Option<Arc<dyn LightningWallet>>>,
}

impl std::fmt::Debug for LnWalletManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LnWalletManager").finish_non_exhaustive()
    }
}

impl LnWalletManager {
    /// Creates a manager over the given connector.
    #[must_use]
    pub fn new(connector: Arc<dyn LightningConnector>) -> Self {
        Self {
            connector,
            cached: Mutex::new(None),
        }
    }

    /// Returns the cached wallet, connecting on first use under a
    /// 15-second deadline.
    ///
    /// # Errors
    ///
    /// Connection failures wrap to `provisioning-failed` unless they
    /// already carry that kind; the deadline maps to `network-timeout`.
    pub async fn get_or_connect(&self) -> Result<Arc<dyn LightningWallet>, Error> {
        let mut cached = self.cached.lock().await;
        if let Some(wallet) = cached.as_ref() {
            return Ok(Arc::clone(wallet));
        }
        let connect = self.connector.connect();
        let wallet = match tokio::time::timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS), connect)
            .await
        {
            Ok(Ok(wallet)) => wallet,
            Ok(Err(err)) if err.kind() == ErrorKind::ProvisioningFailed => return Err(err),
            Ok(Err(err)) => {
                return Err(Error::new(
                    ErrorKind::ProvisioningFailed,
                    format!("lightning wallet connection failed: {}", err.message()),
                ));
            }
            Err(_) => {
                return Err(Error::new(
                    ErrorKind::NetworkTimeout,
                    format!("lightning wallet connect timed out after {CONNECT_TIMEOUT_SECS} s"),
                ));
            }
        };
        tracing::info!("connected lightning wallet");
        *cached = Some(Arc::clone(&wallet));
        Ok(wallet)
    }

    /// Best-effort balance of the cached wallet, in satoshis.
    ///
    /// Returns `None` when no wallet is connected yet, the query fails,
    /// or its 15-second deadline fires.
    pub async fn balance_sats(&self) -> Option<u64> {
        let wallet = { self.cached.lock().await.clone() }?;
        match tokio::time::timeout(
            Duration::from_secs(BALANCE_TIMEOUT_SECS),
            wallet.balance_sats(),
        )
        .await
        {
            Ok(Ok(sats)) => Some(sats),
            Ok(Err(err)) => {
                tracing::debug!(error = %err, "lightning balance query failed");
                None
            }
            Err(_) => {
                tracing::debug!("lightning balance query timed out");
                None
            }
        }
    }
}
