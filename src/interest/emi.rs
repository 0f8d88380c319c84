use rust_decimal::{Decimal, MathematicalOps, RoundingStrategy};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::decimal::{Money, Rate, MONEY_DP};
use crate::errors::{LedgerError, Result};
use crate::interest::{checked, simple_interest, validate_rate, validate_terms};
use crate::types::EmiType;

/// interest/principal split of one equal installment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmiBreakdown {
    pub interest_component: Money,
    pub principal_component: Money,
}

impl EmiBreakdown {
    /// the installment does not even cover the month's interest
    pub fn is_underwater(&self) -> bool {
        self.principal_component.is_negative()
    }
}

/// EMI = P·r·(1+r)^N / ((1+r)^N − 1), r the monthly rate
pub fn reducing_balance_emi(principal: Money, annual_rate: Rate, term_months: u32) -> Result<Money> {
    validate_terms(principal, annual_rate, term_months)?;
    debug!(%principal, %annual_rate, term_months, "calculating reducing balance emi");

    let months = Decimal::from(term_months);
    if annual_rate.is_zero() {
        return Ok(Money::from_decimal(principal.as_decimal() / months));
    }

    let r = annual_rate.monthly_rate();
    let compound = checked((Decimal::ONE + r).checked_powu(term_months as u64), "emi compound factor")?;
    let numerator = checked(
        principal
            .as_decimal()
            .checked_mul(r)
            .and_then(|v| v.checked_mul(compound)),
        "emi numerator",
    )?;
    let denominator = compound - Decimal::ONE;
    let exact = checked(numerator.checked_div(denominator), "emi")?;

    let emi = Money::from_decimal(exact);
    // half-up can round a tiny-rate EMI below P/N; bump to the next cent instead
    if emi.as_decimal() * months < principal.as_decimal() {
        let ceiling = exact.round_dp_with_strategy(MONEY_DP, RoundingStrategy::AwayFromZero);
        return Ok(Money::from_decimal(ceiling));
    }
    Ok(emi)
}

/// EMI = (P + simple interest) / N
pub fn flat_rate_emi(principal: Money, annual_rate: Rate, term_months: u32) -> Result<Money> {
    debug!(%principal, %annual_rate, term_months, "calculating flat rate emi");
    let interest = simple_interest(principal, annual_rate, term_months)?;
    let total = principal + interest;
    Ok(total / Decimal::from(term_months))
}

/// total interest over the term: EMI × N − P
pub fn total_interest_reducing_balance(
    principal: Money,
    annual_rate: Rate,
    term_months: u32,
) -> Result<Money> {
    let emi = reducing_balance_emi(principal, annual_rate, term_months)?;
    Ok(emi * Decimal::from(term_months) - principal)
}

/// everything the borrower pays over the term under the given method
pub fn total_payable(
    principal: Money,
    annual_rate: Rate,
    term_months: u32,
    emi_type: EmiType,
) -> Result<Money> {
    let emi = match emi_type {
        EmiType::ReducingBalance => reducing_balance_emi(principal, annual_rate, term_months)?,
        EmiType::Flat => flat_rate_emi(principal, annual_rate, term_months)?,
    };
    Ok(emi * Decimal::from(term_months))
}

/// Split one installment into interest on the outstanding balance and the
/// remaining principal portion.
///
/// A negative principal component is returned as-is; callers decide whether
/// that is an error (see [`EmiBreakdown::is_underwater`]).
pub fn emi_breakdown(
    outstanding_principal: Money,
    annual_rate: Rate,
    emi_amount: Money,
) -> Result<EmiBreakdown> {
    if outstanding_principal.is_negative() {
        return Err(LedgerError::invalid_argument(format!(
            "outstanding principal must not be negative, got {outstanding_principal}"
        )));
    }
    validate_rate(annual_rate)?;
    if !emi_amount.is_positive() {
        return Err(LedgerError::invalid_argument(format!(
            "emi must be positive, got {emi_amount}"
        )));
    }

    let interest = checked(
        outstanding_principal
            .as_decimal()
            .checked_mul(annual_rate.monthly_rate()),
        "emi interest component",
    )?;
    let interest_component = Money::from_decimal(interest);

    Ok(EmiBreakdown {
        interest_component,
        principal_component: emi_amount - interest_component,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_reducing_balance_emi_reference_case() {
        let emi = reducing_balance_emi(Money::from_major(12_000), Rate::from_percentage(12), 12).unwrap();
        assert_eq!(emi.as_decimal(), dec!(1066.19));

        let interest =
            total_interest_reducing_balance(Money::from_major(12_000), Rate::from_percentage(12), 12).unwrap();
        assert_eq!(interest.as_decimal(), dec!(794.28));
    }

    #[test]
    fn test_reducing_balance_emi_long_term() {
        // 500k at 8.5% for 20 years
        let emi = reducing_balance_emi(Money::from_major(500_000), Rate::from_percent(dec!(8.5)), 240).unwrap();
        assert_eq!(emi.as_decimal(), dec!(4339.12));
    }

    #[test]
    fn test_zero_rate_emi_is_plain_division() {
        let emi = reducing_balance_emi(Money::from_major(12_000), Rate::ZERO, 12).unwrap();
        assert_eq!(emi, Money::from_major(1_000));

        let thirds = reducing_balance_emi(Money::from_major(1_000), Rate::ZERO, 3).unwrap();
        assert_eq!(thirds.as_decimal(), dec!(333.33));
    }

    #[test]
    fn test_emi_covers_principal_for_tiny_rates() {
        let principal = Money::from_major(1);
        let emi = reducing_balance_emi(principal, Rate::from_bps(1), 3).unwrap();
        assert!(emi * Decimal::from(3) >= principal);
    }

    #[test]
    fn test_flat_rate_emi() {
        // (12000 + 1440) / 12
        let emi = flat_rate_emi(Money::from_major(12_000), Rate::from_percentage(12), 12).unwrap();
        assert_eq!(emi, Money::from_major(1_120));
    }

    #[test]
    fn test_total_payable_by_method() {
        let principal = Money::from_major(12_000);
        let rate = Rate::from_percentage(12);
        let reducing = total_payable(principal, rate, 12, EmiType::ReducingBalance).unwrap();
        let flat = total_payable(principal, rate, 12, EmiType::Flat).unwrap();
        assert_eq!(reducing.as_decimal(), dec!(12794.28));
        assert_eq!(flat, Money::from_major(13_440));
        assert!(flat > reducing);
    }

    #[test]
    fn test_emi_breakdown_first_month() {
        let breakdown = emi_breakdown(
            Money::from_major(12_000),
            Rate::from_percentage(12),
            Money::from_str_exact("1066.19").unwrap(),
        )
        .unwrap();
        assert_eq!(breakdown.interest_component.as_decimal(), dec!(120.00));
        assert_eq!(breakdown.principal_component.as_decimal(), dec!(946.19));
        assert!(!breakdown.is_underwater());
    }

    #[test]
    fn test_emi_breakdown_underwater_is_reported() {
        let breakdown = emi_breakdown(
            Money::from_major(100_000),
            Rate::from_percentage(24),
            Money::from_major(1_000),
        )
        .unwrap();
        assert_eq!(breakdown.interest_component, Money::from_major(2_000));
        assert!(breakdown.is_underwater());
    }

    #[test]
    fn test_emi_rejects_bad_input() {
        assert!(reducing_balance_emi(Money::ZERO, Rate::from_percentage(5), 12).is_err());
        assert!(flat_rate_emi(Money::from_major(100), Rate::from_percentage(5), 0).is_err());
        assert!(emi_breakdown(Money::from_major(100), Rate::from_percentage(5), Money::ZERO).is_err());
    }
}
