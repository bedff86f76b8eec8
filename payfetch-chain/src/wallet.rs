//! Wallet account provisioning and balance queries.
//!
//! One [`WalletManager`] per chain family. Provisioning is single-flight:
//! the per-family mutex guarantees that concurrent first callers share
//! one provisioning call and the same cached account. Balance queries
//! are strictly best-effort and read-only: they never provision and
//! never propagate a failure.

use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::U256;
use async_trait::async_trait;
use tokio::sync::Mutex;

use payfetch::chain::{ChainId, ChainNamespace};
use payfetch::error::{Error, ErrorKind};
use payfetch::money::{Money, usdc_atomic_to_cents};
use payfetch::networks::usdc_deployment;

/// Deadline for a single balance query.
pub const BALANCE_TIMEOUT_SECS: u64 = 15;

/// A provisioned chain account, kept opaque beyond its address.
#[derive(Debug, Clone)]
pub struct ProvisionedAccount {
    /// The account's on-chain address.
    pub address: String,
}

/// Provisions the chain account for one family.
///
/// Implementations wrap whatever SDK actually creates or unlocks the
/// account; the engine only requires idempotence per manager, which the
/// manager's mutex enforces.
#[async_trait]
pub trait AccountProvisioner: Send + Sync {
    /// Creates or loads the account.
    async fn provision(&self) -> Result<ProvisionedAccount, Error>;
}

/// Reads USDC balances for provisioned accounts.
#[async_trait]
pub trait BalanceSource: Send + Sync {
    /// Returns the account's balance of the given token in atomic units.
    async fn usdc_balance(
        &self,
        network: &ChainId,
        token: &str,
        address: &str,
    ) -> Result<U256, Error>;
}

/// A best-effort balance snapshot for one chain family.
#[derive(Debug, Clone, Default)]
pub struct WalletBalance {
    /// The cached account's address, when one has been provisioned.
    pub address: Option<String>,
    /// USDC-equivalent balance in USD cents; `None` when the account is
    /// not provisioned, the network is unknown, or the query failed.
    pub balance: Option<Money>,
}

/// Single-flight account manager for one chain family.
pub struct WalletManager {
    family: ChainNamespace,
    provisioner: Arc<dyn AccountProvisioner>,
    balance_source: Option<Arc<dyn BalanceSource>>,
    cached: Mutex<Option<Arc<ProvisionedAccount>>>,
}

impl std::fmt::Debug for WalletManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletManager")
            .field("family", &self.family)
            .finish_non_exhaustive()
    }
}

impl WalletManager {
    /// Creates a manager for the given family.
    #[must_use]
    pub fn new(
        family: ChainNamespace,
        provisioner: Arc<dyn AccountProvisioner>,
        balance_source: Option<Arc<dyn BalanceSource>>,
    ) -> Self {
        Self {
            family,
            provisioner,
            balance_source,
            cached: Mutex::new(None),
        }
    }

    /// Returns the chain family this manager serves.
    #[must_use]
    pub const fn family(&self) -> ChainNamespace {
        self.family
    }

    /// Returns the cached account, provisioning it on first use.
    ///
    /// Concurrent callers on a fresh manager queue on the family mutex
    /// and all receive the account provisioned by the first of them.
    ///
    /// # Errors
    ///
    /// Provisioning failures wrap to `provisioning-failed` unless they
    /// already carry that kind.
    pub async fn get_or_provision_account(&self) -> Result<Arc<ProvisionedAccount>, Error> {
        let mut cached = self.cached.lock().await;
        if let Some(account) = cached.as_ref() {
            return Ok(Arc::clone(account));
        }
        let account = self.provisioner.provision().await.map_err(|err| {
            if err.kind() == ErrorKind::ProvisioningFailed {
                err
            } else {
                Error::new(
                    ErrorKind::ProvisioningFailed,
                    format!("{} account provisioning failed: {}", self.family, err.message()),
                )
            }
        })?;
        tracing::info!(family = %self.family, address = %account.address, "provisioned account");
        let account = Arc::new(account);
        *cached = Some(Arc::clone(&account));
        Ok(account)
    }

    /// Reads the cached account's USDC balance on the given network.
    ///
    /// Degrades instead of failing: an unprovisioned account, an unknown
    /// network, a missing balance source, and a query failure all yield
    /// `balance: None`.
    pub async fn balances(&self, network: &ChainId) -> WalletBalance {
        let account = { self.cached.lock().await.clone() };
        let Some(account) = account else {
            return WalletBalance::default();
        };
        let address = Some(account.address.clone());

        let Some(source) = &self.balance_source else {
            return WalletBalance {
                address,
                balance: None,
            };
        };
        let Some(token) = usdc_deployment(network) else {
            return WalletBalance {
                address,
                balance: None,
            };
        };

        let query = source.usdc_balance(network, token, &account.address);
        let balance = match tokio::time::timeout(Duration::from_secs(BALANCE_TIMEOUT_SECS), query)
            .await
        {
            Ok(Ok(atomic)) => Some(Money::from_cents(usdc_atomic_to_cents(atomic))),
            Ok(Err(err)) => {
                tracing::debug!(family = %self.family, error = %err, "balance query failed");
                None
            }
            Err(_) => {
                tracing::debug!(family = %self.family, "balance query timed out");
                None
            }
        };
        WalletBalance { address, balance }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct SlowProvisioner {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl AccountProvisioner for SlowProvisioner {
        async fn provision(&self) -> Result<ProvisionedAccount, Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(ProvisionedAccount {
                address: "0xaccount".into(),
            })
        }
    }

    struct FailingProvisioner;

    #[async_trait]
    impl AccountProvisioner for FailingProvisioner {
        async fn provision(&self) -> Result<ProvisionedAccount, Error> {
            Err(Error::new(ErrorKind::BlockchainError, "rpc down"))
        }
    }

    struct FixedBalance(u64);

    #[async_trait]
    impl BalanceSource for FixedBalance {
        async fn usdc_balance(
            &self,
            _network: &ChainId,
            _token: &str,
            _address: &str,
        ) -> Result<U256, Error> {
            Ok(U256::from(self.0))
        }
    }

    struct FailingBalance;

    #[async_trait]
    impl BalanceSource for FailingBalance {
        async fn usdc_balance(
            &self,
            _network: &ChainId,
            _token: &str,
            _address: &str,
        ) -> Result<U256, Error> {
            Err(Error::new(ErrorKind::EndpointUnreachable, "rpc refused"))
        }
    }

    #[tokio::test]
    async fn test_concurrent_provisioning_is_single_flight() {
        let provisioner = Arc::new(SlowProvisioner {
            calls: AtomicUsize::new(0),
        });
        let manager = Arc::new(WalletManager::new(
            ChainNamespace::Evm,
            Arc::clone(&provisioner) as Arc<dyn AccountProvisioner>,
            None,
        ));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let manager = Arc::clone(&manager);
                tokio::spawn(async move { manager.get_or_provision_account().await })
            })
            .collect();
        for handle in handles {
            let account = handle.await.unwrap().unwrap();
            assert_eq!(account.address, "0xaccount");
        }
        assert_eq!(provisioner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_provisioning_error_wraps_kind() {
        let manager = WalletManager::new(
            ChainNamespace::Svm,
            Arc::new(FailingProvisioner),
            None,
        );
        let err = manager.get_or_provision_account().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProvisioningFailed);
        assert!(err.message().contains("rpc down"));
    }

    #[tokio::test]
    async fn test_balances_unprovisioned_is_empty() {
        let manager = WalletManager::new(
            ChainNamespace::Evm,
            Arc::new(SlowProvisioner {
                calls: AtomicUsize::new(0),
            }),
            Some(Arc::new(FixedBalance(1_000_000))),
        );
        let balance = manager.balances(&ChainId::new("eip155", "8453")).await;
        assert!(balance.address.is_none());
        assert!(balance.balance.is_none());
    }

    #[tokio::test]
    async fn test_balances_converts_atomic_to_cents() {
        let manager = WalletManager::new(
            ChainNamespace::Evm,
            Arc::new(SlowProvisioner {
                calls: AtomicUsize::new(0),
            }),
            Some(Arc::new(FixedBalance(1_000_000))),
        );
        manager.get_or_provision_account().await.unwrap();
        let balance = manager.balances(&ChainId::new("eip155", "8453")).await;
        assert_eq!(balance.address.as_deref(), Some("0xaccount"));
        assert_eq!(balance.balance, Some(Money::from_cents(100u64)));
    }

    #[tokio::test]
    async fn test_balances_unknown_network_degrades() {
        let manager = WalletManager::new(
            ChainNamespace::Evm,
            Arc::new(SlowProvisioner {
                calls: AtomicUsize::new(0),
            }),
            Some(Arc::new(FixedBalance(1_000_000))),
        );
        manager.get_or_provision_account().await.unwrap();
        let balance = manager.balances(&ChainId::new("eip155", "999999")).await;
        assert_eq!(balance.address.as_deref(), Some("0xaccount"));
        assert!(balance.balance.is_none());
    }

    #[tokio::test]
    async fn test_balances_query_failure_degrades() {
        let manager = WalletManager::new(
            ChainNamespace::Evm,
            Arc::new(SlowProvisioner {
                calls: AtomicUsize::new(0),
            }),
            Some(Arc::new(FailingBalance)),
        );
        manager.get_or_provision_account().await.unwrap();
        let balance = manager.balances(&ChainId::new("eip155", "8453")).await;
        assert!(balance.balance.is_none());
    }
}
