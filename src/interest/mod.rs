//! Pure interest and EMI arithmetic.
//!
//! Every function validates its inputs, computes at full decimal precision and
//! rounds the result half-up to cents exactly once.

pub mod compound;
pub mod emi;
pub mod penalty;

use rust_decimal::Decimal;
use tracing::debug;

use crate::decimal::{Money, Rate};
use crate::errors::{LedgerError, Result};

pub use compound::{compound_interest, CompoundingFrequency};
pub use emi::{
    emi_breakdown, flat_rate_emi, reducing_balance_emi, total_interest_reducing_balance,
    total_payable, EmiBreakdown,
};
pub use penalty::{late_payment_penalty, DEFAULT_PENALTY_RATE};

/// reject terms that would make any formula blow up
pub fn validate_terms(principal: Money, annual_rate: Rate, term_months: u32) -> Result<()> {
    if !principal.is_positive() {
        return Err(LedgerError::invalid_argument(format!(
            "principal must be positive, got {principal}"
        )));
    }
    validate_rate(annual_rate)?;
    if term_months < 1 {
        return Err(LedgerError::invalid_argument("term must be at least 1 month"));
    }
    Ok(())
}

pub(crate) fn validate_rate(annual_rate: Rate) -> Result<()> {
    if annual_rate.is_negative() {
        return Err(LedgerError::invalid_argument(format!(
            "rate must not be negative, got {annual_rate}"
        )));
    }
    Ok(())
}

/// unwrap a checked decimal operation
pub(crate) fn checked(value: Option<Decimal>, what: &str) -> Result<Decimal> {
    value.ok_or_else(|| LedgerError::invalid_argument(format!("{what} overflows decimal range")))
}

/// simple interest: P × R × (months / 12)
pub fn simple_interest(principal: Money, annual_rate: Rate, term_months: u32) -> Result<Money> {
    validate_terms(principal, annual_rate, term_months)?;
    debug!(%principal, %annual_rate, term_months, "calculating simple interest");

    let yearly = checked(
        principal.as_decimal().checked_mul(annual_rate.as_decimal()),
        "simple interest",
    )?;
    let interest = checked(
        yearly.checked_mul(Decimal::from(term_months)),
        "simple interest",
    )? / Decimal::from(12);

    Ok(Money::from_decimal(interest))
}

/// Interest saved by prepaying part of the outstanding principal.
///
/// This is simple interest on the prepaid amount over the remaining tenure,
/// an approximation that does not re-amortize the rest of the schedule.
pub fn prepayment_savings(
    remaining_principal: Money,
    prepayment_amount: Money,
    annual_rate: Rate,
    remaining_months: u32,
) -> Result<Money> {
    validate_terms(remaining_principal, annual_rate, remaining_months)?;
    if !prepayment_amount.is_positive() {
        return Err(LedgerError::invalid_argument(format!(
            "prepayment must be positive, got {prepayment_amount}"
        )));
    }
    if prepayment_amount > remaining_principal {
        return Err(LedgerError::invalid_argument(format!(
            "prepayment {prepayment_amount} exceeds remaining principal {remaining_principal}"
        )));
    }
    debug!(%remaining_principal, %prepayment_amount, %annual_rate, remaining_months, "calculating prepayment savings");

    simple_interest(prepayment_amount, annual_rate, remaining_months)
}
