use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, MathematicalOps};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::decimal::{Money, Rate};
use crate::errors::{LedgerError, Result};
use crate::interest::{checked, validate_terms};

/// compounding frequency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum CompoundingFrequency {
    Daily,
    Weekly,
    #[default]
    Monthly,
    Quarterly,
    SemiAnnual,
    Annual,
}

impl CompoundingFrequency {
    /// get number of compounding periods per year
    pub fn periods_per_year(&self) -> u32 {
        match self {
            CompoundingFrequency::Daily => 365,
            CompoundingFrequency::Weekly => 52,
            CompoundingFrequency::Monthly => 12,
            CompoundingFrequency::Quarterly => 4,
            CompoundingFrequency::SemiAnnual => 2,
            CompoundingFrequency::Annual => 1,
        }
    }
}

/// compound interest: P × (1 + r/n)^(n×t) − P, with t in years
pub fn compound_interest(
    principal: Money,
    annual_rate: Rate,
    term_months: u32,
    frequency: CompoundingFrequency,
) -> Result<Money> {
    validate_terms(principal, annual_rate, term_months)?;
    debug!(%principal, %annual_rate, term_months, ?frequency, "calculating compound interest");

    if annual_rate.is_zero() {
        return Ok(Money::ZERO);
    }

    let n = Decimal::from(frequency.periods_per_year());
    let base = Decimal::ONE + annual_rate.as_decimal() / n;
    let periods = n * Decimal::from(term_months) / Decimal::from(12);

    // whole periods stay on exact integer powers
    let factor = if periods.fract().is_zero() {
        let whole = periods
            .to_u64()
            .ok_or_else(|| LedgerError::invalid_argument("compounding periods out of range"))?;
        checked(base.checked_powu(whole), "compound factor")?
    } else {
        checked(base.checked_powd(periods), "compound factor")?
    };

    let amount = checked(principal.as_decimal().checked_mul(factor), "compound amount")?;
    Ok(Money::from_decimal(amount - principal.as_decimal()))
}
