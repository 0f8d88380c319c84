//! Persistence contract consumed by the engine and the collections job.

use std::collections::HashMap;

use chrono::NaiveDate;
use parking_lot::RwLock;

use crate::errors::{LedgerError, Result};
use crate::loan::{Installment, Loan, LoanAggregate};
use crate::types::{BorrowerId, InstallmentId, LoanId, LoanStatus};

/// Set-returning storage operations. Implementations must be safe to call
/// from several threads; the engine serializes writes per loan.
pub trait LoanRepository: Send + Sync {
    fn load_loan(&self, loan_id: LoanId) -> Result<Loan>;

    fn save_loan(&self, loan: &Loan) -> Result<()>;

    /// installments of a loan ordered by sequence, empty when unscheduled
    fn load_installments(&self, loan_id: LoanId) -> Result<Vec<Installment>>;

    fn save_installments(&self, installments: &[Installment]) -> Result<()>;

    fn find_installment(&self, installment_id: InstallmentId) -> Result<Installment>;

    /// unsettled installments due strictly before `as_of`
    fn find_overdue_installments(&self, as_of: NaiveDate) -> Result<Vec<Installment>>;

    /// installments with `start <= due_date <= end`
    fn find_due_in_range(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<Installment>>;

    fn find_active_loans(&self) -> Result<Vec<Loan>>;

    fn find_loans_by_borrower(&self, borrower_id: BorrowerId) -> Result<Vec<Loan>>;

    fn load_aggregate(&self, loan_id: LoanId) -> Result<LoanAggregate> {
        let loan = self.load_loan(loan_id)?;
        let installments = self.load_installments(loan_id)?;
        Ok(LoanAggregate::new(loan, installments))
    }

    /// persist installments first, then the loan fields derived from them
    fn save_aggregate(&self, aggregate: &LoanAggregate) -> Result<()> {
        self.save_installments(&aggregate.installments)?;
        self.save_loan(&aggregate.loan)
    }
}

#[derive(Debug, Default)]
struct Tables {
    loans: HashMap<LoanId, Loan>,
    installments: HashMap<InstallmentId, Installment>,
}

/// in-memory repository behind a single read/write lock
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    tables: RwLock<Tables>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn loan_count(&self) -> usize {
        self.tables.read().loans.len()
    }
}

fn by_due_date(mut installments: Vec<Installment>) -> Vec<Installment> {
    installments.sort_by_key(|i| (i.due_date, i.loan_id, i.sequence));
    installments
}

impl LoanRepository for InMemoryRepository {
    fn load_loan(&self, loan_id: LoanId) -> Result<Loan> {
        self.tables
            .read()
            .loans
            .get(&loan_id)
            .cloned()
            .ok_or_else(|| LedgerError::loan_not_found(loan_id))
    }

    fn save_loan(&self, loan: &Loan) -> Result<()> {
        self.tables.write().loans.insert(loan.id, loan.clone());
        Ok(())
    }

    fn load_installments(&self, loan_id: LoanId) -> Result<Vec<Installment>> {
        let mut installments: Vec<Installment> = self
            .tables
            .read()
            .installments
            .values()
            .filter(|i| i.loan_id == loan_id)
            .cloned()
            .collect();
        installments.sort_by_key(|i| i.sequence);
        Ok(installments)
    }

    fn save_installments(&self, installments: &[Installment]) -> Result<()> {
        let mut tables = self.tables.write();
        for installment in installments {
            tables.installments.insert(installment.id, installment.clone());
        }
        Ok(())
    }

    fn find_installment(&self, installment_id: InstallmentId) -> Result<Installment> {
        self.tables
            .read()
            .installments
            .get(&installment_id)
            .cloned()
            .ok_or_else(|| LedgerError::installment_not_found(installment_id))
    }

    fn find_overdue_installments(&self, as_of: NaiveDate) -> Result<Vec<Installment>> {
        let found = self
            .tables
            .read()
            .installments
            .values()
            .filter(|i| i.due_date < as_of && !i.status.is_settled())
            .cloned()
            .collect();
        Ok(by_due_date(found))
    }

    fn find_due_in_range(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<Installment>> {
        let found = self
            .tables
            .read()
            .installments
            .values()
            .filter(|i| i.due_date >= start && i.due_date <= end)
            .cloned()
            .collect();
        Ok(by_due_date(found))
    }

    fn find_active_loans(&self) -> Result<Vec<Loan>> {
        let mut loans: Vec<Loan> = self
            .tables
            .read()
            .loans
            .values()
            .filter(|l| l.status == LoanStatus::Active)
            .cloned()
            .collect();
        loans.sort_by_key(|l| l.id);
        Ok(loans)
    }

    fn find_loans_by_borrower(&self, borrower_id: BorrowerId) -> Result<Vec<Loan>> {
        let mut loans: Vec<Loan> = self
            .tables
            .read()
            .loans
            .values()
            .filter(|l| l.borrower_id == borrower_id)
            .cloned()
            .collect();
        loans.sort_by_key(|l| l.id);
        Ok(loans)
    }

    /// both tables change under one write lock
    fn save_aggregate(&self, aggregate: &LoanAggregate) -> Result<()> {
        let mut tables = self.tables.write();
        for installment in &aggregate.installments {
            tables.installments.insert(installment.id, installment.clone());
        }
        tables.loans.insert(aggregate.loan.id, aggregate.loan.clone());
        Ok(())
    }
}
