use chrono::NaiveDate;
use hourglass_rs::SafeTimeProvider;
use tracing::info;

use crate::collections::{CollectionsJob, JobReport};
use crate::config::EngineConfig;
use crate::decimal::{Money, Rate};
use crate::errors::{LedgerError, Result};
use crate::events::Notifier;
use crate::lifecycle::{self, LoanSummary, PaymentOutcome};
use crate::loan::{Installment, Loan, LoanAggregate, LoanBuilder};
use crate::locks::LoanLocks;
use crate::repository::LoanRepository;
use crate::risk::{RiskAssessment, RiskScorer};
use crate::schedule::{ScheduleGenerator, SchedulePreview};
use crate::types::{BorrowerId, EmiType, InstallmentId, LoanId};

/// Entry point for the application layer.
///
/// Every write loads the loan aggregate, changes it under the loan's lock,
/// saves it and only then hands the resulting events to the notifier.
pub struct LoanEngine<'t, R: LoanRepository, N: Notifier> {
    repository: R,
    notifier: N,
    time: &'t SafeTimeProvider,
    config: EngineConfig,
    locks: LoanLocks,
}

impl<'t, R: LoanRepository, N: Notifier> LoanEngine<'t, R, N> {
    pub fn new(repository: R, notifier: N, time: &'t SafeTimeProvider) -> Self {
        Self {
            repository,
            notifier,
            time,
            config: EngineConfig::default(),
            locks: LoanLocks::new(),
        }
    }

    pub fn with_config(
        repository: R,
        notifier: N,
        time: &'t SafeTimeProvider,
        config: EngineConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            repository,
            notifier,
            time,
            config,
            locks: LoanLocks::new(),
        })
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// calendar date of the injected clock
    pub fn today(&self) -> NaiveDate {
        self.time.now().date_naive()
    }

    /// builder preloaded with the configured penalty rate
    pub fn loan_builder(&self) -> LoanBuilder {
        Loan::builder().penalty_rate(self.config.default_penalty_rate)
    }

    /// Generate and persist the schedule of a pending loan, activating it.
    pub fn generate_schedule(&self, loan: Loan) -> Result<LoanAggregate> {
        let today = self.today();
        self.locks.with_loan(loan.id, || -> Result<LoanAggregate> {
            let existing = self.repository.load_installments(loan.id)?;
            let mut aggregate = LoanAggregate::new(loan, existing);
            ScheduleGenerator::generate(&mut aggregate, today)?;
            self.repository.save_aggregate(&aggregate)?;
            Ok(aggregate)
        })
    }

    /// quote a schedule starting today without creating a loan
    pub fn preview_schedule(
        &self,
        principal: Money,
        annual_rate: Rate,
        term_months: u32,
        emi_type: EmiType,
    ) -> Result<SchedulePreview> {
        ScheduleGenerator::preview(principal, annual_rate, term_months, emi_type, self.today())
    }

    pub fn cancel_loan(&self, loan_id: LoanId) -> Result<Loan> {
        self.locks.with_loan(loan_id, || -> Result<Loan> {
            let mut loan = self.repository.load_loan(loan_id)?;
            loan.cancel()?;
            self.repository.save_loan(&loan)?;
            info!(loan_id = %loan_id, "loan cancelled");
            Ok(loan)
        })
    }

    /// Record a payment against an installment. Not idempotent: callers must
    /// deduplicate deliveries before calling.
    pub fn record_payment(&self, installment_id: InstallmentId, amount: Money) -> Result<PaymentOutcome> {
        let today = self.today();
        let policy = self.config.overpayment_policy;
        let outcome = self.update_installment_loan(installment_id, |aggregate| {
            lifecycle::record_payment(aggregate, installment_id, amount, today, policy)
        })?;
        self.notifier.notify_all(outcome.events());
        Ok(outcome)
    }

    /// Penalize one installment if it is past due; returns its current state.
    pub fn mark_overdue(&self, installment_id: InstallmentId) -> Result<Installment> {
        let today = self.today();
        let (installment, event) = self.update_installment_loan(installment_id, |aggregate| {
            let event = lifecycle::apply_overdue_penalty(aggregate, installment_id, today)?;
            Ok((aggregate.installment(installment_id)?.clone(), event))
        })?;
        if let Some(event) = event {
            self.notifier.notify(event);
        }
        Ok(installment)
    }

    /// forgive an installment's penalty; returns the amount waived
    pub fn waive_penalty(&self, installment_id: InstallmentId) -> Result<Money> {
        self.update_installment_loan(installment_id, |aggregate| {
            lifecycle::waive_penalty(aggregate, installment_id)
        })
    }

    pub fn loan_summary(&self, loan_id: LoanId) -> Result<LoanSummary> {
        let aggregate = self.repository.load_aggregate(loan_id)?;
        Ok(LoanSummary::from_aggregate(&aggregate))
    }

    pub fn run_overdue_sweep(&self) -> Result<JobReport> {
        self.collections().run_overdue_sweep(self.today())
    }

    pub fn run_reminder_pass(&self) -> Result<JobReport> {
        self.collections().run_reminder_pass(self.today())
    }

    pub fn run_due_today_pass(&self) -> Result<JobReport> {
        self.collections().run_due_today_pass(self.today())
    }

    pub fn run_default_check(&self) -> Result<JobReport> {
        self.collections().run_default_check(self.today())
    }

    pub fn score_risk(&self, borrower_id: BorrowerId) -> Result<RiskAssessment> {
        RiskScorer::new(&self.repository, &self.config.risk).score(borrower_id, self.today())
    }

    fn collections(&self) -> CollectionsJob<'_, R, N> {
        CollectionsJob::new(&self.repository, &self.notifier, &self.locks, &self.config.collections)
    }

    /// load the installment's loan, apply `f` under the loan lock and save
    fn update_installment_loan<T>(
        &self,
        installment_id: InstallmentId,
        f: impl FnOnce(&mut LoanAggregate) -> Result<T>,
    ) -> Result<T> {
        let loan_id = self.repository.find_installment(installment_id)?.loan_id;
        self.locks.with_loan(loan_id, || -> Result<T> {
            let mut aggregate = self.repository.load_aggregate(loan_id)?;
            if !aggregate.installments.iter().any(|i| i.id == installment_id) {
                return Err(LedgerError::installment_not_found(installment_id));
            }
            let value = f(&mut aggregate)?;
            self.repository.save_aggregate(&aggregate)?;
            Ok(value)
        })
    }
}
