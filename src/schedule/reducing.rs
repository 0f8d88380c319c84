use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::decimal::{Money, Rate};
use crate::errors::{LedgerError, Result};
use crate::interest::{emi_breakdown, reducing_balance_emi};
use crate::schedule::{due_date, AmortizationStrategy, ScheduleRow};
use crate::types::EmiType;

/// interest charged on the outstanding balance each month
#[derive(Debug, Clone, Copy, Default)]
pub struct ReducingBalance;

impl AmortizationStrategy for ReducingBalance {
    fn emi_type(&self) -> EmiType {
        EmiType::ReducingBalance
    }

    fn monthly_payment(&self, principal: Money, annual_rate: Rate, term_months: u32) -> Result<Money> {
        reducing_balance_emi(principal, annual_rate, term_months)
    }

    fn total_interest(
        &self,
        principal: Money,
        _annual_rate: Rate,
        term_months: u32,
        monthly_payment: Money,
    ) -> Result<Money> {
        Ok(monthly_payment * Decimal::from(term_months) - principal)
    }

    fn rows(
        &self,
        principal: Money,
        annual_rate: Rate,
        term_months: u32,
        monthly_payment: Money,
        start: NaiveDate,
    ) -> Result<Vec<ScheduleRow>> {
        let mut rows = Vec::with_capacity(term_months as usize);
        let mut outstanding = principal;

        for sequence in 1..=term_months {
            let breakdown = emi_breakdown(outstanding.clamp_non_negative(), annual_rate, monthly_payment)?;
            if breakdown.is_underwater() {
                return Err(LedgerError::invalid_argument(format!(
                    "emi {monthly_payment} does not cover interest {} in period {sequence}",
                    breakdown.interest_component
                )));
            }

            let mut principal_component = breakdown.principal_component;
            outstanding -= principal_component;

            // final period absorbs the rounding residue, whichever way it went,
            // and its amount is what its components add up to
            if sequence == term_months && !outstanding.is_zero() {
                principal_component += outstanding;
                outstanding = Money::ZERO;
            }

            rows.push(ScheduleRow {
                sequence,
                due_date: due_date(start, sequence)?,
                emi_amount: principal_component + breakdown.interest_component,
                principal_component,
                interest_component: breakdown.interest_component,
                outstanding_principal: outstanding.clamp_non_negative(),
            });
        }

        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    #[test]
    fn test_final_row_absorbs_residue() {
        let principal = Money::from_major(12_000);
        let rate = Rate::from_percentage(12);
        let emi = ReducingBalance.monthly_payment(principal, rate, 12).unwrap();
        let rows = ReducingBalance.rows(principal, rate, 12, emi, start()).unwrap();

        let before_last = rows[10].outstanding_principal;
        let last = &rows[11];
        assert_eq!(last.principal_component, before_last);
        assert_eq!(last.outstanding_principal, Money::ZERO);
        assert!(rows[..11].iter().all(|r| r.emi_amount == emi));
        assert_eq!(last.emi_amount, last.principal_component + last.interest_component);
        assert_eq!(last.emi_amount.as_decimal(), dec!(1066.14));
    }

    #[test]
    fn test_zero_rate_splits_principal_evenly() {
        let principal = Money::from_major(1_000);
        let emi = ReducingBalance.monthly_payment(principal, Rate::ZERO, 3).unwrap();
        let rows = ReducingBalance.rows(principal, Rate::ZERO, 3, emi, start()).unwrap();

        assert!(rows.iter().all(|r| r.interest_component.is_zero()));
        assert_eq!(rows[0].principal_component.as_decimal(), dec!(333.33));
        assert_eq!(rows[2].principal_component.as_decimal(), dec!(333.34));
        let total: Money = rows.iter().map(|r| r.principal_component).sum();
        assert_eq!(total, principal);
    }

    #[test]
    fn test_interest_declines_each_period() {
        let principal = Money::from_major(50_000);
        let rate = Rate::from_percentage(10);
        let emi = ReducingBalance.monthly_payment(principal, rate, 24).unwrap();
        let rows = ReducingBalance.rows(principal, rate, 24, emi, start()).unwrap();
        assert!(rows.windows(2).all(|w| w[1].interest_component <= w[0].interest_component));
    }

    #[test]
    fn test_underwater_emi_is_an_error() {
        let result = ReducingBalance.rows(
            Money::from_major(100_000),
            Rate::from_percentage(24),
            12,
            Money::from_major(1_000),
            start(),
        );
        assert!(matches!(result, Err(LedgerError::InvalidArgument { .. })));
    }
}
