use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::decimal::{Money, Rate};
use crate::errors::Result;
use crate::interest::{flat_rate_emi, simple_interest};
use crate::schedule::{due_date, AmortizationStrategy, ScheduleRow};
use crate::types::EmiType;

/// Interest on the original principal for the full term, spread evenly.
///
/// Principal and interest components are constant, except that the last
/// period takes whatever principal the rounded shares left over.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlatRate;

impl AmortizationStrategy for FlatRate {
    fn emi_type(&self) -> EmiType {
        EmiType::Flat
    }

    fn monthly_payment(&self, principal: Money, annual_rate: Rate, term_months: u32) -> Result<Money> {
        flat_rate_emi(principal, annual_rate, term_months)
    }

    fn total_interest(
        &self,
        principal: Money,
        annual_rate: Rate,
        term_months: u32,
        _monthly_payment: Money,
    ) -> Result<Money> {
        simple_interest(principal, annual_rate, term_months)
    }

    fn rows(
        &self,
        principal: Money,
        annual_rate: Rate,
        term_months: u32,
        _monthly_payment: Money,
        start: NaiveDate,
    ) -> Result<Vec<ScheduleRow>> {
        let months = Decimal::from(term_months);
        let total_interest = simple_interest(principal, annual_rate, term_months)?;
        let interest_component = total_interest / months;
        let share = principal / months;

        let mut outstanding = principal;
        let mut rows = Vec::with_capacity(term_months as usize);
        for sequence in 1..=term_months {
            let principal_component = if sequence == term_months { outstanding } else { share };
            outstanding -= principal_component;
            rows.push(ScheduleRow {
                sequence,
                due_date: due_date(start, sequence)?,
                emi_amount: principal_component + interest_component,
                principal_component,
                interest_component,
                outstanding_principal: outstanding,
            });
        }

        Ok(rows)
    }
}
