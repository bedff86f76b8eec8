//! Budget accounting.
//!
//! All accounting is integer cents; the SATS→USD conversion and the
//! warning-threshold comparison are scaled-integer arithmetic so no
//! binary float ever meets a monetary value. State is persisted after
//! every mutation via a temp-file-and-rename write, so a crash mid-write
//! can never reduce recorded spending.

use std::path::PathBuf;

use alloy_primitives::U256;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use payfetch::config::BudgetLimits;
use payfetch::money::Money;

/// Scale used for fixed-point rate and threshold arithmetic.
const MICRO: u64 = 1_000_000;

/// Basis points per unit fraction.
const BASIS_POINTS: u64 = 10_000;

/// A budget accounting period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetPeriod {
    /// Resets at the UTC day boundary.
    Daily,
    /// Resets at the UTC month boundary.
    Monthly,
}

impl std::fmt::Display for BudgetPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Daily => f.write_str("daily"),
            Self::Monthly => f.write_str("monthly"),
        }
    }
}

/// Spending crossed the warning threshold of a period limit.
#[derive(Debug, Clone)]
pub struct BudgetWarning {
    /// The period under pressure. Daily shadows monthly: when both
    /// periods warn, only the daily warning is reported.
    pub period: BudgetPeriod,
    /// Spending so far in the period.
    pub spent: Money,
    /// The period's limit.
    pub limit: Money,
    /// The configured threshold fraction.
    pub threshold: f64,
}

/// The outcome of a pre-payment budget check.
#[derive(Debug, Clone)]
pub enum BudgetCheck {
    /// The payment fits every active limit.
    Within,
    /// The amount alone exceeds the per-transaction limit.
    PerTransaction {
        /// Attempted amount.
        amount: Money,
        /// The per-transaction limit.
        limit: Money,
    },
    /// Spending plus the amount would exceed the daily limit.
    Daily {
        /// Spending so far today.
        spent: Money,
        /// Attempted amount.
        amount: Money,
        /// The daily limit.
        limit: Money,
    },
    /// Spending plus the amount would exceed the monthly limit.
    Monthly {
        /// Spending so far this month.
        spent: Money,
        /// Attempted amount.
        amount: Money,
        /// The monthly limit.
        limit: Money,
    },
}

/// A read-only snapshot of budget state.
#[derive(Debug, Clone)]
pub struct BudgetSnapshot {
    /// Spending so far today.
    pub daily_spent: Money,
    /// Spending so far this month.
    pub monthly_spent: Money,
    /// The daily limit, when configured.
    pub daily_limit: Option<Money>,
    /// Remaining daily headroom (zero-floored), when a limit is set.
    pub daily_remaining: Option<Money>,
    /// The monthly limit, when configured.
    pub monthly_limit: Option<Money>,
    /// Remaining monthly headroom (zero-floored), when a limit is set.
    pub monthly_remaining: Option<Money>,
    /// The per-transaction limit, when configured.
    pub per_transaction_limit: Option<Money>,
}

#[derive(Debug, Clone)]
struct BudgetState {
    daily_spent: Money,
    monthly_spent: Money,
    last_daily_reset: NaiveDate,
    last_monthly_reset: String,
}

impl BudgetState {
    fn fresh() -> Self {
        let today = Utc::now().date_naive();
        Self {
            daily_spent: Money::from_cents(0u64),
            monthly_spent: Money::from_cents(0u64),
            last_daily_reset: today,
            last_monthly_reset: month_key(today),
        }
    }

    /// Zeroes counters whose reset key has rolled over.
    fn roll_over(&mut self) {
        let today = Utc::now().date_naive();
        if self.last_daily_reset != today {
            self.daily_spent = Money::from_cents(0u64);
            self.last_daily_reset = today;
        }
        let month = month_key(today);
        if self.last_monthly_reset != month {
            self.monthly_spent = Money::from_cents(0u64);
            self.last_monthly_reset = month;
        }
    }
}

fn month_key(date: NaiveDate) -> String {
    date.format("%Y-%m").to_string()
}

/// The persisted wire shape of `budget.json`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedBudget {
    daily_spent: String,
    monthly_spent: String,
    last_daily_reset: String,
    last_monthly_reset: String,
}

/// Limit checks, spend accounting, warnings, and persistence.
///
/// All mutation happens under the caller's payment lock; the internal
/// mutex only protects the snapshot reads that run outside it.
#[derive(Debug)]
pub struct BudgetManager {
    limits: BudgetLimits,
    state: Mutex<BudgetState>,
    path: Option<PathBuf>,
}

impl BudgetManager {
    /// Creates a manager, loading persisted state from `path` when given.
    ///
    /// A corrupt or missing file yields fresh zero state. Counters whose
    /// reset key no longer matches today are zeroed on load.
    pub async fn load(limits: BudgetLimits, path: Option<PathBuf>) -> Self {
        let mut state = match &path {
            Some(path) => match tokio::fs::read(path).await {
                Ok(bytes) => parse_persisted(&bytes).unwrap_or_else(BudgetState::fresh),
                Err(_) => BudgetState::fresh(),
            },
            None => BudgetState::fresh(),
        };
        state.roll_over();
        Self {
            limits,
            state: Mutex::new(state),
            path,
        }
    }

    /// The configured limits.
    #[must_use]
    pub const fn limits(&self) -> &BudgetLimits {
        &self.limits
    }

    /// Converts an amount to USD cents for budget accounting.
    ///
    /// USD passes through. SATS convert by scaled-integer arithmetic
    /// with the configured rate, flooring, but never below one cent for
    /// a positive amount: payments must not vanish from accounting.
    #[must_use]
    pub fn convert_to_usd(&self, amount: &Money) -> Money {
        match amount.currency() {
            payfetch::money::Currency::Usd => amount.clone(),
            payfetch::money::Currency::Sats => {
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let rate_scaled = (self.limits.sat_to_usd_rate * 100.0 * MICRO as f64).round()
                    as u128;
                let cents =
                    amount.minor_units() * U256::from(rate_scaled) / U256::from(MICRO);
                if cents.is_zero() && !amount.minor_units().is_zero() {
                    Money::from_cents(1u64)
                } else {
                    Money::from_cents(cents)
                }
            }
        }
    }

    /// Checks a USD amount against every active limit, returning the
    /// first violation in per-transaction → daily → monthly order.
    pub async fn check_transaction(&self, amount: &Money) -> BudgetCheck {
        let mut state = self.state.lock().await;
        state.roll_over();

        if let Some(limit) = &self.limits.per_transaction
            && amount.greater_than(limit)
        {
            return BudgetCheck::PerTransaction {
                amount: amount.clone(),
                limit: limit.clone(),
            };
        }
        if let Some(limit) = &self.limits.daily
            && state.daily_spent.add(amount).greater_than(limit)
        {
            return BudgetCheck::Daily {
                spent: state.daily_spent.clone(),
                amount: amount.clone(),
                limit: limit.clone(),
            };
        }
        if let Some(limit) = &self.limits.monthly
            && state.monthly_spent.add(amount).greater_than(limit)
        {
            return BudgetCheck::Monthly {
                spent: state.monthly_spent.clone(),
                amount: amount.clone(),
                limit: limit.clone(),
            };
        }
        BudgetCheck::Within
    }

    /// Records a completed payment in both period counters and persists.
    ///
    /// Persistence failures are logged, never raised: the payment
    /// already happened and must not be reported as failed.
    pub async fn record_spending(&self, amount: &Money) {
        let mut state = self.state.lock().await;
        state.roll_over();
        state.daily_spent = state.daily_spent.add(amount);
        state.monthly_spent = state.monthly_spent.add(amount);
        self.persist(&state).await;
    }

    /// Reports the most pressing warning, daily shadowing monthly.
    ///
    /// Comparisons run in basis points so the threshold fraction never
    /// multiplies a monetary value as a float.
    pub async fn check_warning(&self) -> Option<BudgetWarning> {
        let mut state = self.state.lock().await;
        state.roll_over();
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let threshold_bp =
            U256::from((self.limits.warning_threshold * BASIS_POINTS as f64).round() as u64);

        let warn = |spent: &Money, limit: &Money| -> bool {
            spent.minor_units() * U256::from(BASIS_POINTS) >= limit.minor_units() * threshold_bp
        };

        if let Some(limit) = &self.limits.daily
            && warn(&state.daily_spent, limit)
        {
            return Some(BudgetWarning {
                period: BudgetPeriod::Daily,
                spent: state.daily_spent.clone(),
                limit: limit.clone(),
                threshold: self.limits.warning_threshold,
            });
        }
        if let Some(limit) = &self.limits.monthly
            && warn(&state.monthly_spent, limit)
        {
            return Some(BudgetWarning {
                period: BudgetPeriod::Monthly,
                spent: state.monthly_spent.clone(),
                limit: limit.clone(),
                threshold: self.limits.warning_threshold,
            });
        }
        None
    }

    /// Zeroes the daily counter and persists.
    pub async fn reset_daily(&self) {
        let mut state = self.state.lock().await;
        state.daily_spent = Money::from_cents(0u64);
        state.last_daily_reset = Utc::now().date_naive();
        self.persist(&state).await;
    }

    /// Takes a snapshot with remaining headroom per period.
    pub async fn snapshot(&self) -> BudgetSnapshot {
        let mut state = self.state.lock().await;
        state.roll_over();
        let remaining = |limit: &Option<Money>, spent: &Money| -> Option<Money> {
            limit.as_ref().map(|l| l.saturating_subtract(spent))
        };
        BudgetSnapshot {
            daily_spent: state.daily_spent.clone(),
            monthly_spent: state.monthly_spent.clone(),
            daily_limit: self.limits.daily.clone(),
            daily_remaining: remaining(&self.limits.daily, &state.daily_spent),
            monthly_limit: self.limits.monthly.clone(),
            monthly_remaining: remaining(&self.limits.monthly, &state.monthly_spent),
            per_transaction_limit: self.limits.per_transaction.clone(),
        }
    }

    async fn persist(&self, state: &BudgetState) {
        let Some(path) = &self.path else { return };
        let persisted = PersistedBudget {
            daily_spent: state.daily_spent.minor_units().to_string(),
            monthly_spent: state.monthly_spent.minor_units().to_string(),
            last_daily_reset: state.last_daily_reset.format("%Y-%m-%d").to_string(),
            last_monthly_reset: state.last_monthly_reset.clone(),
        };
        let json = serde_json::to_vec_pretty(&persisted).expect("budget state serialises");

        if let Some(parent) = path.parent()
            && let Err(err) = tokio::fs::create_dir_all(parent).await
        {
            tracing::warn!(error = %err, "failed creating budget state directory");
            return;
        }
        let tmp = path.with_extension("json.tmp");
        if let Err(err) = tokio::fs::write(&tmp, &json).await {
            tracing::warn!(error = %err, "failed writing budget state");
            return;
        }
        if let Err(err) = tokio::fs::rename(&tmp, path).await {
            tracing::warn!(error = %err, "failed replacing budget state file");
        }
    }
}

fn parse_persisted(bytes: &[u8]) -> Option<BudgetState> {
    let persisted: PersistedBudget = serde_json::from_slice(bytes).ok()?;
    Some(BudgetState {
        daily_spent: Money::from_cents(persisted.daily_spent.parse::<U256>().ok()?),
        monthly_spent: Money::from_cents(persisted.monthly_spent.parse::<U256>().ok()?),
        last_daily_reset: NaiveDate::parse_from_str(&persisted.last_daily_reset, "%Y-%m-%d")
            .ok()?,
        last_monthly_reset: persisted.last_monthly_reset,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits(daily: Option<u64>, monthly: Option<u64>, per_tx: Option<u64>) -> BudgetLimits {
        BudgetLimits {
            daily: daily.map(Money::from_cents),
            monthly: monthly.map(Money::from_cents),
            per_transaction: per_tx.map(Money::from_cents),
            ..BudgetLimits::default()
        }
    }

    #[tokio::test]
    async fn test_convert_usd_passthrough() {
        let manager = BudgetManager::load(BudgetLimits::default(), None).await;
        let usd = Money::from_cents(123u64);
        assert_eq!(manager.convert_to_usd(&usd), usd);
    }

    #[tokio::test]
    async fn test_convert_sats_default_rate() {
        let manager = BudgetManager::load(BudgetLimits::default(), None).await;
        // 1000 sats at 0.001 $/sat = $1.00
        assert_eq!(
            manager.convert_to_usd(&Money::from_satoshis(1000u64)),
            Money::from_cents(100u64)
        );
    }

    #[tokio::test]
    async fn test_convert_sats_never_rounds_to_free() {
        let manager = BudgetManager::load(BudgetLimits::default(), None).await;
        // 5 sats at the default rate is half a cent; accounting charges 1.
        assert_eq!(
            manager.convert_to_usd(&Money::from_satoshis(5u64)),
            Money::from_cents(1u64)
        );
        assert!(manager.convert_to_usd(&Money::from_satoshis(0u64)).is_zero());
    }

    #[tokio::test]
    async fn test_check_transaction_order() {
        let manager = BudgetManager::load(limits(Some(100), Some(1000), Some(50)), None).await;
        // Per-transaction violation wins even though daily would also trip.
        match manager.check_transaction(&Money::from_cents(200u64)).await {
            BudgetCheck::PerTransaction { limit, .. } => {
                assert_eq!(limit, Money::from_cents(50u64));
            }
            other => panic!("expected per-transaction violation, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_daily_gate_counts_accumulated_spending() {
        let manager = BudgetManager::load(limits(Some(100), None, None), None).await;
        manager.record_spending(&Money::from_cents(80u64)).await;
        match manager.check_transaction(&Money::from_cents(30u64)).await {
            BudgetCheck::Daily { spent, .. } => assert_eq!(spent, Money::from_cents(80u64)),
            other => panic!("expected daily violation, got {other:?}"),
        }
        // Exactly reaching the limit is allowed: the gate is strict-greater.
        assert!(matches!(
            manager.check_transaction(&Money::from_cents(20u64)).await,
            BudgetCheck::Within
        ));
    }

    #[tokio::test]
    async fn test_warning_at_threshold_daily_shadows_monthly() {
        let manager = BudgetManager::load(limits(Some(100), Some(100), None), None).await;
        manager.record_spending(&Money::from_cents(80u64)).await;
        let warning = manager.check_warning().await.unwrap();
        assert_eq!(warning.period, BudgetPeriod::Daily);
        assert_eq!(warning.spent, Money::from_cents(80u64));
    }

    #[tokio::test]
    async fn test_no_warning_below_threshold() {
        let manager = BudgetManager::load(limits(Some(100), None, None), None).await;
        manager.record_spending(&Money::from_cents(79u64)).await;
        assert!(manager.check_warning().await.is_none());
    }

    #[tokio::test]
    async fn test_reset_daily_zeroes_counter() {
        let manager = BudgetManager::load(limits(Some(100), None, None), None).await;
        manager.record_spending(&Money::from_cents(60u64)).await;
        manager.reset_daily().await;
        let snapshot = manager.snapshot().await;
        assert!(snapshot.daily_spent.is_zero());
    }

    #[tokio::test]
    async fn test_snapshot_remaining_is_zero_floored() {
        let manager = BudgetManager::load(limits(Some(50), None, None), None).await;
        manager.record_spending(&Money::from_cents(50u64)).await;
        let snapshot = manager.snapshot().await;
        assert!(snapshot.daily_remaining.unwrap().is_zero());
    }

    #[tokio::test]
    async fn test_persistence_roundtrip_same_day() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("budget.json");

        let manager = BudgetManager::load(limits(Some(1000), None, None), Some(path.clone())).await;
        manager.record_spending(&Money::from_cents(42u64)).await;
        drop(manager);

        let reloaded = BudgetManager::load(limits(Some(1000), None, None), Some(path)).await;
        let snapshot = reloaded.snapshot().await;
        assert_eq!(snapshot.daily_spent, Money::from_cents(42u64));
        assert_eq!(snapshot.monthly_spent, Money::from_cents(42u64));
    }

    #[tokio::test]
    async fn test_load_resets_stale_day() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("budget.json");
        let stale = serde_json::json!({
            "dailySpent": "500",
            "monthlySpent": "700",
            "lastDailyReset": "2001-01-01",
            "lastMonthlyReset": month_key(Utc::now().date_naive()),
        });
        std::fs::write(&path, serde_json::to_vec_pretty(&stale).unwrap()).unwrap();

        let manager = BudgetManager::load(BudgetLimits::default(), Some(path)).await;
        let snapshot = manager.snapshot().await;
        assert!(snapshot.daily_spent.is_zero());
        // The month key still matches, so monthly spending survives.
        assert_eq!(snapshot.monthly_spent, Money::from_cents(700u64));
    }

    #[tokio::test]
    async fn test_corrupt_file_yields_fresh_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("budget.json");
        std::fs::write(&path, b"{{{{ not json").unwrap();

        let manager = BudgetManager::load(BudgetLimits::default(), Some(path)).await;
        let snapshot = manager.snapshot().await;
        assert!(snapshot.daily_spent.is_zero());
        assert!(snapshot.monthly_spent.is_zero());
    }

    #[tokio::test]
    async fn test_persisted_shape() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("budget.json");
        let manager = BudgetManager::load(BudgetLimits::default(), Some(path.clone())).await;
        manager.record_spending(&Money::from_cents(7u64)).await;

        let bytes = std::fs::read(&path).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["dailySpent"], "7");
        assert_eq!(value["monthlySpent"], "7");
        assert!(
            value["lastDailyReset"]
                .as_str()
                .unwrap()
                .chars()
                .filter(|c| *c == '-')
                .count()
                == 2
        );
    }
}
