use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::decimal::Rate;
use crate::errors::{LedgerError, Result};
use crate::interest::DEFAULT_PENALTY_RATE;
use crate::types::OverpaymentPolicy;

/// engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// annual rate for loans built without an explicit penalty rate
    pub default_penalty_rate: Rate,
    pub overpayment_policy: OverpaymentPolicy,
    pub collections: CollectionsConfig,
    pub risk: RiskConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_penalty_rate: DEFAULT_PENALTY_RATE,
            overpayment_policy: OverpaymentPolicy::default(),
            collections: CollectionsConfig::default(),
            risk: RiskConfig::default(),
        }
    }
}

impl EngineConfig {
    /// parse from JSON; missing fields take their defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json)
            .map_err(|e| LedgerError::invalid_argument(format!("engine config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_penalty_rate.is_negative() {
            return Err(LedgerError::invalid_argument(format!(
                "default penalty rate must not be negative, got {}",
                self.default_penalty_rate
            )));
        }
        self.collections.validate()?;
        self.risk.validate()
    }
}

/// collections job tuning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionsConfig {
    /// reminders cover installments due within this many days from today
    pub reminder_window_days: u32,
    /// days past due after which an unpaid installment defaults its loan
    pub default_threshold_days: u32,
    /// attempts per loan when the repository reports a transient failure
    pub max_attempts: u32,
    /// wall-clock budget per loan across all attempts
    pub loan_timeout_ms: u64,
    /// pause before the first retry, doubled on each further retry
    pub retry_backoff_ms: u64,
}

impl Default for CollectionsConfig {
    fn default() -> Self {
        Self {
            reminder_window_days: 3,
            default_threshold_days: 90,
            max_attempts: 3,
            loan_timeout_ms: 5_000,
            retry_backoff_ms: 10,
        }
    }
}

impl CollectionsConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(LedgerError::invalid_argument("max_attempts must be at least 1"));
        }
        if self.loan_timeout_ms == 0 {
            return Err(LedgerError::invalid_argument("loan_timeout_ms must be positive"));
        }
        Ok(())
    }
}

/// risk score weights, must sum to one
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    pub payment_history_weight: Decimal,
    pub exposure_weight: Decimal,
    pub tenure_weight: Decimal,
    pub concurrency_weight: Decimal,
    pub default_history_weight: Decimal,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            payment_history_weight: dec!(0.40),
            exposure_weight: dec!(0.20),
            tenure_weight: dec!(0.15),
            concurrency_weight: dec!(0.15),
            default_history_weight: dec!(0.10),
        }
    }
}

impl RiskConfig {
    fn weights(&self) -> [Decimal; 5] {
        [
            self.payment_history_weight,
            self.exposure_weight,
            self.tenure_weight,
            self.concurrency_weight,
            self.default_history_weight,
        ]
    }

    pub fn validate(&self) -> Result<()> {
        let weights = self.weights();
        if weights.iter().any(|w| *w < Decimal::ZERO) {
            return Err(LedgerError::invalid_argument("risk weights must not be negative"));
        }
        let total: Decimal = weights.iter().sum();
        if total != Decimal::ONE {
            return Err(LedgerError::invalid_argument(format!(
                "risk weights must sum to 1, got {total}"
            )));
        }
        Ok(())
    }
}
