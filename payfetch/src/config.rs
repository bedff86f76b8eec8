//! Client configuration.
//!
//! Configuration is plain serde data so callers can load it from any
//! source. Validation collects every per-field issue before failing, so a
//! misconfigured client reports all problems in one `bad-config` error.

use std::path::PathBuf;

use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::{Deserialize, Serialize};

use crate::chain::{ChainId, ChainNamespace};
use crate::error::Error;
use crate::money::Money;
use crate::networks::chain_id_by_name;

/// Default warning threshold as a fraction of a budget limit.
pub const DEFAULT_WARNING_THRESHOLD: f64 = 0.8;

/// Default SATS → USD conversion rate used for budget accounting.
pub const DEFAULT_SAT_TO_USD_RATE: f64 = 0.001;

/// Default bound on retained history records.
pub const DEFAULT_HISTORY_MAX_RECORDS: usize = 500;

/// Default target network for balance queries.
pub const DEFAULT_NETWORK: &str = "base";

/// Name of the hidden data directory under the user's home.
const DATA_DIR_NAME: &str = ".payfetch";

/// Top-level client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientConfig {
    /// Target network name for balance queries (`base` or `base-sepolia`).
    pub network: String,
    /// Chain-selection preference list, most preferred first.
    pub preferred_chains: Vec<ChainNamespace>,
    /// Budget limits and accounting knobs.
    pub budget: BudgetConfig,
    /// Persistence of budget state and payment history.
    pub persistence: PersistenceConfig,
    /// Threshold for the stderr logger.
    pub log_level: LogLevel,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            network: DEFAULT_NETWORK.to_string(),
            preferred_chains: Vec::new(),
            budget: BudgetConfig::default(),
            persistence: PersistenceConfig::default(),
            log_level: LogLevel::default(),
        }
    }
}

/// Budget limits; absent limits mean unlimited.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BudgetConfig {
    /// Daily spending limit in USD.
    pub daily: Option<LimitValue>,
    /// Monthly spending limit in USD.
    pub monthly: Option<LimitValue>,
    /// Per-transaction limit in USD.
    pub per_transaction: Option<LimitValue>,
    /// Warn when spending reaches this fraction of a limit, in `[0, 1]`.
    pub warning_threshold: f64,
    /// SATS → USD conversion rate for budget accounting.
    pub sat_to_usd_rate: f64,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            daily: None,
            monthly: None,
            per_transaction: None,
            warning_threshold: DEFAULT_WARNING_THRESHOLD,
            sat_to_usd_rate: DEFAULT_SAT_TO_USD_RATE,
        }
    }
}

/// A configured monetary limit: a dollar string (`"1.50"`) or a positive
/// number.
///
/// Numbers are routed through decimal string formatting before becoming
/// cents, so a binary float never scales directly into the money type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LimitValue {
    /// A dollar string of the form `d(.d{1,2})?`.
    Text(String),
    /// A positive dollar amount as a JSON number.
    Number(f64),
}

impl LimitValue {
    /// Coerces the configured value to USD cents.
    ///
    /// # Errors
    ///
    /// Returns `bad-config` for malformed strings and non-positive or
    /// non-finite numbers.
    pub fn to_money(&self) -> Result<Money, Error> {
        match self {
            Self::Text(s) => Money::from_dollars(s),
            Self::Number(n) => {
                if !n.is_finite() || *n <= 0.0 {
                    return Err(Error::bad_config(format!(
                        "limit must be a positive finite number, got {n}"
                    )));
                }
                let decimal = Decimal::from_f64(*n)
                    .ok_or_else(|| {
                        Error::bad_config(format!("limit {n} is not representable as a decimal"))
                    })?
                    .round_dp(2);
                Money::from_dollars(&decimal.to_string())
            }
        }
    }
}

/// Persistence of budget state and payment history.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PersistenceConfig {
    /// Whether `budget.json` and `history.jsonl` are written at all.
    pub enabled: bool,
    /// Data directory; defaults to `~/.payfetch`.
    pub directory: Option<PathBuf>,
    /// Bound on retained history records.
    pub history_max_records: usize,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: None,
            history_max_records: DEFAULT_HISTORY_MAX_RECORDS,
        }
    }
}

/// Threshold for the stderr logger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Everything, including per-attempt delivery traces.
    Debug,
    /// Lifecycle events.
    #[default]
    Info,
    /// Degradations and fallbacks.
    Warn,
    /// Failures only.
    Error,
    /// No output.
    Silent,
}

impl LogLevel {
    /// Returns the `tracing` filter directive for this level, or `None`
    /// for `silent`.
    #[must_use]
    pub const fn as_filter_str(self) -> Option<&'static str> {
        match self {
            Self::Debug => Some("debug"),
            Self::Info => Some("info"),
            Self::Warn => Some("warn"),
            Self::Error => Some("error"),
            Self::Silent => None,
        }
    }
}

/// Resolved budget limits, ready for the budget manager.
#[derive(Debug, Clone)]
pub struct BudgetLimits {
    /// Daily limit in USD cents.
    pub daily: Option<Money>,
    /// Monthly limit in USD cents.
    pub monthly: Option<Money>,
    /// Per-transaction limit in USD cents.
    pub per_transaction: Option<Money>,
    /// Warning fraction in `[0, 1]`.
    pub warning_threshold: f64,
    /// SATS → USD conversion rate.
    pub sat_to_usd_rate: f64,
}

impl Default for BudgetLimits {
    fn default() -> Self {
        Self {
            daily: None,
            monthly: None,
            per_transaction: None,
            warning_threshold: DEFAULT_WARNING_THRESHOLD,
            sat_to_usd_rate: DEFAULT_SAT_TO_USD_RATE,
        }
    }
}

impl ClientConfig {
    /// Validates every field, collecting all issues into one `bad-config`
    /// error.
    ///
    /// # Errors
    ///
    /// Returns `bad-config` listing each offending field and its problem.
    pub fn validate(&self) -> Result<(), Error> {
        let mut issues: Vec<String> = Vec::new();

        if chain_id_by_name(&self.network).is_none() {
            issues.push(format!(
                "network: unknown network name {:?}",
                self.network
            ));
        }

        for (field, limit) in [
            ("budget.daily", &self.budget.daily),
            ("budget.monthly", &self.budget.monthly),
            ("budget.perTransaction", &self.budget.per_transaction),
        ] {
            if let Some(limit) = limit
                && let Err(err) = limit.to_money()
            {
                issues.push(format!("{field}: {}", err.message()));
            }
        }

        let threshold = self.budget.warning_threshold;
        if !threshold.is_finite() || !(0.0..=1.0).contains(&threshold) {
            issues.push(format!(
                "budget.warningThreshold: must be within [0, 1], got {threshold}"
            ));
        }

        let rate = self.budget.sat_to_usd_rate;
        if !rate.is_finite() || rate <= 0.0 {
            issues.push(format!(
                "budget.satToUsdRate: must be a positive number, got {rate}"
            ));
        }

        if self.persistence.history_max_records == 0 {
            issues.push("persistence.historyMaxRecords: must be greater than zero".to_string());
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(Error::bad_config(format!(
                "invalid configuration:\n{}",
                issues
                    .iter()
                    .map(|issue| format!("  - {issue}"))
                    .collect::<Vec<_>>()
                    .join("\n")
            )))
        }
    }

    /// Resolves the budget section into concrete limits.
    ///
    /// # Errors
    ///
    /// Returns `bad-config` when a limit fails to coerce; call
    /// [`ClientConfig::validate`] first for the aggregated report.
    pub fn budget_limits(&self) -> Result<BudgetLimits, Error> {
        Ok(BudgetLimits {
            daily: self.budget.daily.as_ref().map(LimitValue::to_money).transpose()?,
            monthly: self
                .budget
                .monthly
                .as_ref()
                .map(LimitValue::to_money)
                .transpose()?,
            per_transaction: self
                .budget
                .per_transaction
                .as_ref()
                .map(LimitValue::to_money)
                .transpose()?,
            warning_threshold: self.budget.warning_threshold,
            sat_to_usd_rate: self.budget.sat_to_usd_rate,
        })
    }

    /// The data directory for persisted state.
    #[must_use]
    pub fn data_directory(&self) -> PathBuf {
        self.persistence.directory.clone().unwrap_or_else(|| {
            std::env::var_os("HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("."))
                .join(DATA_DIR_NAME)
        })
    }

    /// The chain id of the configured balance-query network.
    ///
    /// # Errors
    ///
    /// Returns `bad-config` for unknown network names.
    pub fn network_chain_id(&self) -> Result<ChainId, Error> {
        chain_id_by_name(&self.network).ok_or_else(|| {
            Error::bad_config(format!("network: unknown network name {:?}", self.network))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ClientConfig::default();
        config.validate().unwrap();
        assert_eq!(config.network, "base");
        assert_eq!(config.budget.warning_threshold, DEFAULT_WARNING_THRESHOLD);
        assert_eq!(config.persistence.history_max_records, 500);
    }

    #[test]
    fn test_limit_value_text() {
        let limit = LimitValue::Text("1.50".into());
        assert_eq!(limit.to_money().unwrap(), Money::from_cents(150u64));
    }

    #[test]
    fn test_limit_value_number_routes_through_decimal() {
        let limit = LimitValue::Number(0.1);
        assert_eq!(limit.to_money().unwrap(), Money::from_cents(10u64));
        let limit = LimitValue::Number(2.0);
        assert_eq!(limit.to_money().unwrap(), Money::from_cents(200u64));
    }

    #[test]
    fn test_limit_value_rejects_non_positive() {
        assert!(LimitValue::Number(0.0).to_money().is_err());
        assert!(LimitValue::Number(-1.0).to_money().is_err());
        assert!(LimitValue::Number(f64::NAN).to_money().is_err());
    }

    #[test]
    fn test_validate_collects_all_issues() {
        let config = ClientConfig {
            network: "mars".into(),
            budget: BudgetConfig {
                daily: Some(LimitValue::Text("nope".into())),
                warning_threshold: 1.5,
                sat_to_usd_rate: 0.0,
                ..BudgetConfig::default()
            },
            persistence: PersistenceConfig {
                history_max_records: 0,
                ..PersistenceConfig::default()
            },
            ..ClientConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::BadConfig);
        let message = err.message().to_string();
        for needle in [
            "network:",
            "budget.daily:",
            "budget.warningThreshold:",
            "budget.satToUsdRate:",
            "persistence.historyMaxRecords:",
        ] {
            assert!(message.contains(needle), "missing {needle} in {message}");
        }
    }

    #[test]
    fn test_config_deserializes_from_camel_case() {
        let config: ClientConfig = serde_json::from_value(serde_json::json!({
            "network": "base-sepolia",
            "preferredChains": ["svm", "evm"],
            "budget": {"daily": "5.00", "perTransaction": 0.25},
            "persistence": {"enabled": false, "historyMaxRecords": 10},
            "logLevel": "warn"
        }))
        .unwrap();
        config.validate().unwrap();
        assert_eq!(
            config.preferred_chains,
            vec![ChainNamespace::Svm, ChainNamespace::Evm]
        );
        let limits = config.budget_limits().unwrap();
        assert_eq!(limits.daily, Some(Money::from_cents(500u64)));
        assert_eq!(limits.per_transaction, Some(Money::from_cents(25u64)));
        assert_eq!(config.log_level, LogLevel::Warn);
        assert!(!config.persistence.enabled);
    }

    #[test]
    fn test_data_directory_override() {
        let config = ClientConfig {
            persistence: PersistenceConfig {
                directory: Some(PathBuf::from("/tmp/payfetch-test")),
                ..PersistenceConfig::default()
            },
            ..ClientConfig::default()
        };
        assert_eq!(config.data_directory(), PathBuf::from("/tmp/payfetch-test"));
    }
}
