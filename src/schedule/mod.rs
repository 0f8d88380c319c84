//! EMI schedule generation.
//!
//! The amortization method is chosen once per loan through [`strategy_for`];
//! both persisted schedules and previews run through the same strategy code.

mod flat;
mod reducing;

use chrono::{Months, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::decimal::{Money, Rate};
use crate::errors::{LedgerError, Result};
use crate::interest;
use crate::loan::{Installment, LoanAggregate};
use crate::types::{EmiType, InstallmentStatus, LoanStatus};

pub use flat::FlatRate;
pub use reducing::ReducingBalance;

/// one computed period of a schedule, before it becomes an installment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleRow {
    pub sequence: u32,
    pub due_date: NaiveDate,
    pub emi_amount: Money,
    pub principal_component: Money,
    pub interest_component: Money,
    pub outstanding_principal: Money,
}

/// shared contract of every amortization method
pub trait AmortizationStrategy: Send + Sync {
    fn emi_type(&self) -> EmiType;

    /// the constant installment amount
    fn monthly_payment(&self, principal: Money, annual_rate: Rate, term_months: u32) -> Result<Money>;

    /// interest over the whole term
    fn total_interest(
        &self,
        principal: Money,
        annual_rate: Rate,
        term_months: u32,
        monthly_payment: Money,
    ) -> Result<Money>;

    /// per-period split, due dates one month apart starting a month after `start`
    fn rows(
        &self,
        principal: Money,
        annual_rate: Rate,
        term_months: u32,
        monthly_payment: Money,
        start: NaiveDate,
    ) -> Result<Vec<ScheduleRow>>;
}

static FLAT_RATE: FlatRate = FlatRate;
static REDUCING_BALANCE: ReducingBalance = ReducingBalance;

/// pick the strategy for an EMI type
pub fn strategy_for(emi_type: EmiType) -> &'static dyn AmortizationStrategy {
    match emi_type {
        EmiType::Flat => &FLAT_RATE,
        EmiType::ReducingBalance => &REDUCING_BALANCE,
    }
}

/// start + n calendar months, clamped to the last day of shorter months
pub fn due_date(start: NaiveDate, months: u32) -> Result<NaiveDate> {
    start.checked_add_months(Months::new(months)).ok_or_else(|| {
        LedgerError::invalid_argument(format!("due date {months} months after {start} is out of range"))
    })
}

/// loan-less view of a schedule, for quoting terms before a loan exists
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulePreview {
    pub emi_type: EmiType,
    pub monthly_emi: Money,
    pub total_interest: Money,
    pub total_payable: Money,
    pub rows: Vec<ScheduleRow>,
}

pub struct ScheduleGenerator;

impl ScheduleGenerator {
    /// Materialize the installments of a pending loan and fill in the loan's
    /// derived fields. The aggregate is only modified when every step succeeds.
    pub fn generate(aggregate: &mut LoanAggregate, today: NaiveDate) -> Result<()> {
        let loan = &aggregate.loan;
        if aggregate.is_scheduled() {
            return Err(LedgerError::AlreadyScheduled { loan_id: loan.id });
        }
        if loan.status != LoanStatus::Pending {
            return Err(LedgerError::invalid_state(loan.status, "PENDING"));
        }

        let strategy = strategy_for(loan.emi_type);
        let emi = strategy.monthly_payment(loan.principal, loan.annual_rate, loan.term_months)?;
        let total_interest =
            strategy.total_interest(loan.principal, loan.annual_rate, loan.term_months, emi)?;
        let start = loan.start_date.unwrap_or(today);
        let end = due_date(start, loan.term_months)?;
        let rows = strategy.rows(loan.principal, loan.annual_rate, loan.term_months, emi, start)?;

        let loan_id = loan.id;
        let installments: Vec<Installment> = rows
            .into_iter()
            .map(|row| Installment {
                id: Uuid::new_v4(),
                loan_id,
                sequence: row.sequence,
                due_date: row.due_date,
                principal_component: row.principal_component,
                interest_component: row.interest_component,
                emi_amount: row.emi_amount,
                outstanding_principal: row.outstanding_principal,
                penalty_amount: Money::ZERO,
                amount_paid: Money::ZERO,
                status: InstallmentStatus::Pending,
                paid_date: None,
            })
            .collect();

        let loan = &mut aggregate.loan;
        loan.monthly_payment = Some(emi);
        loan.total_interest = Some(total_interest);
        loan.start_date = Some(start);
        loan.end_date = Some(end);
        loan.remaining_balance = loan.principal;
        loan.status = LoanStatus::Active;
        aggregate.installments = installments;

        info!(
            loan_id = %loan_id,
            emi_type = %strategy.emi_type(),
            %emi,
            %total_interest,
            installments = aggregate.installments.len(),
            "generated emi schedule"
        );
        Ok(())
    }

    /// quote a schedule without creating a loan
    pub fn preview(
        principal: Money,
        annual_rate: Rate,
        term_months: u32,
        emi_type: EmiType,
        start: NaiveDate,
    ) -> Result<SchedulePreview> {
        interest::validate_terms(principal, annual_rate, term_months)?;
        let strategy = strategy_for(emi_type);
        let monthly_emi = strategy.monthly_payment(principal, annual_rate, term_months)?;
        let total_interest = strategy.total_interest(principal, annual_rate, term_months, monthly_emi)?;
        let rows = strategy.rows(principal, annual_rate, term_months, monthly_emi, start)?;

        Ok(SchedulePreview {
            emi_type,
            monthly_emi,
            total_interest,
            total_payable: monthly_emi * Decimal::from(term_months),
            rows,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loan::Loan;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn pending_loan(principal: i64, rate: u32, term: u32, emi_type: EmiType) -> LoanAggregate {
        let loan = Loan::builder()
            .borrower(Uuid::new_v4())
            .principal(Money::from_major(principal))
            .rate(Rate::from_percentage(rate))
            .term_months(term)
            .emi_type(emi_type)
            .start_date(date(2024, 1, 15))
            .build()
            .unwrap();
        LoanAggregate::new(loan, Vec::new())
    }

    #[test]
    fn test_generate_sets_loan_fields() {
        let mut aggregate = pending_loan(12_000, 12, 12, EmiType::ReducingBalance);
        ScheduleGenerator::generate(&mut aggregate, date(2030, 1, 1)).unwrap();

        let loan = &aggregate.loan;
        assert_eq!(loan.status, LoanStatus::Active);
        assert_eq!(loan.monthly_payment.unwrap().as_decimal(), dec!(1066.19));
        assert_eq!(loan.total_interest.unwrap().as_decimal(), dec!(794.28));
        assert_eq!(loan.start_date, Some(date(2024, 1, 15)));
        assert_eq!(loan.end_date, Some(date(2025, 1, 15)));
        assert_eq!(loan.remaining_balance, Money::from_major(12_000));

        assert_eq!(aggregate.installments.len(), 12);
        let first = &aggregate.installments[0];
        assert_eq!(first.sequence, 1);
        assert_eq!(first.due_date, date(2024, 2, 15));
        assert_eq!(first.interest_component.as_decimal(), dec!(120.00));
        assert_eq!(first.principal_component.as_decimal(), dec!(946.19));
        assert!(aggregate
            .installments
            .iter()
            .all(|i| i.status == InstallmentStatus::Pending && i.penalty_amount.is_zero()));
    }

    #[test]
    fn test_reducing_balance_principal_sums_exactly() {
        for (principal, rate, term) in [(12_000, 12, 12), (500_000, 9, 240), (7_777, 17, 7)] {
            let mut aggregate = pending_loan(principal, rate, term, EmiType::ReducingBalance);
            ScheduleGenerator::generate(&mut aggregate, date(2024, 1, 1)).unwrap();

            let repaid: Money = aggregate.installments.iter().map(|i| i.principal_component).sum();
            assert_eq!(repaid, Money::from_major(principal));

            let last = aggregate.installments.last().unwrap();
            assert_eq!(last.outstanding_principal, Money::ZERO);
            assert!(aggregate
                .installments
                .iter()
                .all(|i| !i.outstanding_principal.is_negative()));
        }
    }

    #[test]
    fn test_missing_start_date_uses_today() {
        let mut aggregate = pending_loan(1_000, 10, 3, EmiType::Flat);
        aggregate.loan.start_date = None;
        ScheduleGenerator::generate(&mut aggregate, date(2024, 5, 10)).unwrap();
        assert_eq!(aggregate.loan.start_date, Some(date(2024, 5, 10)));
        assert_eq!(aggregate.installments[0].due_date, date(2024, 6, 10));
        assert_eq!(aggregate.loan.end_date, Some(date(2024, 8, 10)));
    }

    #[test]
    fn test_due_dates_clamp_to_month_end() {
        let start = date(2024, 1, 31);
        assert_eq!(due_date(start, 1).unwrap(), date(2024, 2, 29));
        assert_eq!(due_date(start, 2).unwrap(), date(2024, 3, 31));
        assert_eq!(due_date(start, 3).unwrap(), date(2024, 4, 30));
    }

    #[test]
    fn test_generate_twice_fails() {
        let mut aggregate = pending_loan(12_000, 12, 12, EmiType::ReducingBalance);
        ScheduleGenerator::generate(&mut aggregate, date(2024, 1, 1)).unwrap();
        let result = ScheduleGenerator::generate(&mut aggregate, date(2024, 1, 1));
        assert!(matches!(result, Err(LedgerError::AlreadyScheduled { .. })));
        assert_eq!(aggregate.installments.len(), 12);
    }

    #[test]
    fn test_cancelled_loan_cannot_be_scheduled() {
        let mut aggregate = pending_loan(12_000, 12, 12, EmiType::ReducingBalance);
        aggregate.loan.cancel().unwrap();
        let result = ScheduleGenerator::generate(&mut aggregate, date(2024, 1, 1));
        assert!(matches!(result, Err(LedgerError::InvalidState { .. })));
        assert!(aggregate.installments.is_empty());
    }

    #[test]
    fn test_preview_matches_generated_schedule() {
        let start = date(2024, 1, 15);
        let preview = ScheduleGenerator::preview(
            Money::from_major(12_000),
            Rate::from_percentage(12),
            12,
            EmiType::ReducingBalance,
            start,
        )
        .unwrap();
        assert_eq!(preview.monthly_emi.as_decimal(), dec!(1066.19));
        assert_eq!(preview.total_interest.as_decimal(), dec!(794.28));
        assert_eq!(preview.total_payable.as_decimal(), dec!(12794.28));

        let mut aggregate = pending_loan(12_000, 12, 12, EmiType::ReducingBalance);
        ScheduleGenerator::generate(&mut aggregate, start).unwrap();
        let generated: Vec<Money> = aggregate.installments.iter().map(|i| i.principal_component).collect();
        let previewed: Vec<Money> = preview.rows.iter().map(|r| r.principal_component).collect();
        assert_eq!(generated, previewed);
    }

    #[test]
    fn test_preview_rejects_invalid_terms() {
        let result = ScheduleGenerator::preview(
            Money::from_major(1_000),
            Rate::from_percentage(5),
            0,
            EmiType::Flat,
            date(2024, 1, 1),
        );
        assert!(matches!(result, Err(LedgerError::InvalidArgument { .. })));
    }
}
