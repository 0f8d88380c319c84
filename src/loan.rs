use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decimal::{Money, Rate};
use crate::errors::{LedgerError, Result};
use crate::interest::{self, DEFAULT_PENALTY_RATE};
use crate::types::{
    BorrowerId, EmiType, InstallmentId, InstallmentStatus, LenderId, LoanId, LoanStatus,
};

/// loan terms plus the fields derived when its schedule is generated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loan {
    pub id: LoanId,
    pub borrower_id: BorrowerId,
    pub lender_id: Option<LenderId>,

    // terms
    pub principal: Money,
    pub annual_rate: Rate,
    pub term_months: u32,
    pub emi_type: EmiType,
    pub penalty_rate: Rate,
    pub start_date: Option<NaiveDate>,

    // derived at schedule generation
    pub end_date: Option<NaiveDate>,
    pub monthly_payment: Option<Money>,
    pub total_interest: Option<Money>,
    pub remaining_balance: Money,
    pub total_penalty_accrued: Money,

    pub status: LoanStatus,
}

impl Loan {
    pub fn builder() -> LoanBuilder {
        LoanBuilder::new()
    }

    /// withdraw an offer that was never activated
    pub fn cancel(&mut self) -> Result<()> {
        if self.status != LoanStatus::Pending {
            return Err(LedgerError::invalid_state(self.status, "PENDING"));
        }
        self.status = LoanStatus::Cancelled;
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.status == LoanStatus::Active
    }
}

/// builder for creating loans
#[derive(Debug, Default)]
pub struct LoanBuilder {
    borrower_id: Option<BorrowerId>,
    lender_id: Option<LenderId>,
    principal: Option<Money>,
    annual_rate: Option<Rate>,
    term_months: Option<u32>,
    emi_type: EmiType,
    penalty_rate: Option<Rate>,
    start_date: Option<NaiveDate>,
}

impl LoanBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn borrower(mut self, borrower_id: BorrowerId) -> Self {
        self.borrower_id = Some(borrower_id);
        self
    }

    pub fn lender(mut self, lender_id: LenderId) -> Self {
        self.lender_id = Some(lender_id);
        self
    }

    pub fn principal(mut self, principal: Money) -> Self {
        self.principal = Some(principal);
        self
    }

    pub fn rate(mut self, annual_rate: Rate) -> Self {
        self.annual_rate = Some(annual_rate);
        self
    }

    pub fn term_months(mut self, term_months: u32) -> Self {
        self.term_months = Some(term_months);
        self
    }

    pub fn emi_type(mut self, emi_type: EmiType) -> Self {
        self.emi_type = emi_type;
        self
    }

    pub fn penalty_rate(mut self, penalty_rate: Rate) -> Self {
        self.penalty_rate = Some(penalty_rate);
        self
    }

    pub fn start_date(mut self, start_date: NaiveDate) -> Self {
        self.start_date = Some(start_date);
        self
    }

    pub fn build(self) -> Result<Loan> {
        let borrower_id = self
            .borrower_id
            .ok_or_else(|| LedgerError::invalid_argument("borrower is required"))?;
        let principal = self
            .principal
            .ok_or_else(|| LedgerError::invalid_argument("principal is required"))?;
        let annual_rate = self
            .annual_rate
            .ok_or_else(|| LedgerError::invalid_argument("interest rate is required"))?;
        let term_months = self
            .term_months
            .ok_or_else(|| LedgerError::invalid_argument("term is required"))?;
        interest::validate_terms(principal, annual_rate, term_months)?;

        let penalty_rate = self.penalty_rate.unwrap_or(DEFAULT_PENALTY_RATE);
        if penalty_rate.is_negative() {
            return Err(LedgerError::invalid_argument(format!(
                "penalty rate must not be negative, got {penalty_rate}"
            )));
        }

        Ok(Loan {
            id: Uuid::new_v4(),
            borrower_id,
            lender_id: self.lender_id,
            principal,
            annual_rate,
            term_months,
            emi_type: self.emi_type,
            penalty_rate,
            start_date: self.start_date,
            end_date: None,
            monthly_payment: None,
            total_interest: None,
            remaining_balance: principal,
            total_penalty_accrued: Money::ZERO,
            status: LoanStatus::Pending,
        })
    }
}

/// one entry of a loan's EMI schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Installment {
    pub id: InstallmentId,
    pub loan_id: LoanId,
    /// 1-based, contiguous per loan
    pub sequence: u32,
    pub due_date: NaiveDate,
    pub principal_component: Money,
    pub interest_component: Money,
    pub emi_amount: Money,
    /// loan principal still owed after this period
    pub outstanding_principal: Money,
    pub penalty_amount: Money,
    pub amount_paid: Money,
    pub status: InstallmentStatus,
    pub paid_date: Option<NaiveDate>,
}

impl Installment {
    /// installment amount plus accrued penalty
    pub fn total_due(&self) -> Money {
        self.emi_amount + self.penalty_amount
    }

    /// negative once the borrower has overpaid
    pub fn remaining_amount(&self) -> Money {
        self.total_due() - self.amount_paid
    }

    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.status != InstallmentStatus::Paid && today > self.due_date
    }

    pub fn days_overdue(&self, today: NaiveDate) -> i64 {
        (today - self.due_date).num_days()
    }

    pub fn is_paid_on_time(&self) -> bool {
        self.status == InstallmentStatus::Paid
            && self.paid_date.map_or(false, |paid| paid <= self.due_date)
    }
}

/// a loan together with the installments it owns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanAggregate {
    pub loan: Loan,
    pub installments: Vec<Installment>,
}

impl LoanAggregate {
    pub fn new(loan: Loan, mut installments: Vec<Installment>) -> Self {
        installments.sort_by_key(|i| i.sequence);
        Self { loan, installments }
    }

    pub fn id(&self) -> LoanId {
        self.loan.id
    }

    pub fn is_scheduled(&self) -> bool {
        !self.installments.is_empty()
    }

    pub fn installment(&self, id: InstallmentId) -> Result<&Installment> {
        self.installments
            .iter()
            .find(|i| i.id == id)
            .ok_or_else(|| LedgerError::installment_not_found(id))
    }

    pub fn installment_mut(&mut self, id: InstallmentId) -> Result<&mut Installment> {
        self.installments
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| LedgerError::installment_not_found(id))
    }

    /// principal minus the principal components of paid installments, floored at zero
    pub fn expected_remaining_balance(&self) -> Money {
        let repaid: Money = self
            .installments
            .iter()
            .filter(|i| i.status == InstallmentStatus::Paid)
            .map(|i| i.principal_component)
            .sum();
        (self.loan.principal - repaid).clamp_non_negative()
    }

    /// earliest installment that is not yet paid
    pub fn next_unpaid(&self) -> Option<&Installment> {
        self.installments
            .iter()
            .find(|i| i.status != InstallmentStatus::Paid)
    }
}
