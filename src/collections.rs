//! Periodic collections work: overdue sweep, reminders, due-today pass and
//! default detection.
//!
//! Each pass is a plain call; the host decides when to run it. Loans are
//! processed in parallel, each under its own lock, and a failing loan is
//! reported without stopping the rest of the pass.

use std::collections::BTreeSet;
use std::fmt;
use std::thread;
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::config::CollectionsConfig;
use crate::errors::{LedgerError, Result};
use crate::events::{Event, Notifier};
use crate::lifecycle;
use crate::loan::LoanAggregate;
use crate::locks::LoanLocks;
use crate::repository::LoanRepository;
use crate::types::{InstallmentStatus, LoanId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    OverdueSweep,
    ReminderPass,
    DueTodayPass,
    DefaultCheck,
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobKind::OverdueSweep => "overdue_sweep",
            JobKind::ReminderPass => "reminder_pass",
            JobKind::DueTodayPass => "due_today_pass",
            JobKind::DefaultCheck => "default_check",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanFailure {
    pub loan_id: LoanId,
    pub error: String,
}

/// what one pass did
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobReport {
    pub kind: JobKind,
    pub run_date: NaiveDate,
    pub loans_scanned: usize,
    /// loans whose aggregate was written back
    pub loans_updated: usize,
    pub notifications_sent: usize,
    pub failures: Vec<LoanFailure>,
}

impl JobReport {
    fn new(kind: JobKind, run_date: NaiveDate) -> Self {
        Self {
            kind,
            run_date,
            loans_scanned: 0,
            loans_updated: 0,
            notifications_sent: 0,
            failures: Vec::new(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct CollectionsJob<'a, R: LoanRepository, N: Notifier> {
    repository: &'a R,
    notifier: &'a N,
    locks: &'a LoanLocks,
    config: &'a CollectionsConfig,
}

impl<'a, R: LoanRepository, N: Notifier> CollectionsJob<'a, R, N> {
    pub fn new(
        repository: &'a R,
        notifier: &'a N,
        locks: &'a LoanLocks,
        config: &'a CollectionsConfig,
    ) -> Self {
        Self {
            repository,
            notifier,
            locks,
            config,
        }
    }

    /// Penalize every unsettled installment past its due date. Re-running on
    /// the same day recomputes the same penalties and notifies nothing new.
    pub fn run_overdue_sweep(&self, today: NaiveDate) -> Result<JobReport> {
        let loan_ids: BTreeSet<LoanId> = self
            .repository
            .find_overdue_installments(today)?
            .into_iter()
            .map(|i| i.loan_id)
            .collect();

        Ok(self.process_loans(JobKind::OverdueSweep, today, loan_ids, |aggregate| {
            lifecycle::apply_overdue_penalties(aggregate, today)
        }))
    }

    /// Notify about installments due within the reminder window that are still
    /// pending, or already marked due today. Nothing is written, so the pass
    /// gives the same result before or after the due-today pass.
    pub fn run_reminder_pass(&self, today: NaiveDate) -> Result<JobReport> {
        let until = today + chrono::Duration::days(i64::from(self.config.reminder_window_days));
        let due_soon: Vec<_> = self
            .repository
            .find_due_in_range(today, until)?
            .into_iter()
            .filter(|i| {
                i.status == InstallmentStatus::Pending
                    || (i.status == InstallmentStatus::Due && i.due_date == today)
            })
            .collect();

        let mut report = JobReport::new(JobKind::ReminderPass, today);
        report.loans_scanned = due_soon.iter().map(|i| i.loan_id).collect::<BTreeSet<_>>().len();
        for installment in due_soon {
            self.notifier.notify(Event::EmiReminder {
                loan_id: installment.loan_id,
                installment_no: installment.sequence,
                amount: installment.total_due(),
                due_date: installment.due_date,
            });
            report.notifications_sent += 1;
        }

        info!(
            job = %report.kind,
            run_date = %today,
            reminders = report.notifications_sent,
            "reminder pass finished"
        );
        Ok(report)
    }

    /// Move pending installments due today to DUE and announce them.
    pub fn run_due_today_pass(&self, today: NaiveDate) -> Result<JobReport> {
        let loan_ids: BTreeSet<LoanId> = self
            .repository
            .find_due_in_range(today, today)?
            .into_iter()
            .filter(|i| i.status == InstallmentStatus::Pending)
            .map(|i| i.loan_id)
            .collect();

        Ok(self.process_loans(JobKind::DueTodayPass, today, loan_ids, |aggregate| {
            Ok(lifecycle::mark_due(aggregate, today))
        }))
    }

    /// Default active loans holding an installment unpaid beyond the threshold.
    pub fn run_default_check(&self, today: NaiveDate) -> Result<JobReport> {
        let threshold = self.config.default_threshold_days;
        let loan_ids: BTreeSet<LoanId> = self
            .repository
            .find_active_loans()?
            .into_iter()
            .map(|l| l.id)
            .collect();

        Ok(self.process_loans(JobKind::DefaultCheck, today, loan_ids, |aggregate| {
            let event = lifecycle::check_default(aggregate, today, threshold);
            if let Some(Event::LoanDefaulted { loan_id, oldest_due_date }) = &event {
                warn!(loan_id = %loan_id, oldest_due_date = %oldest_due_date, "loan defaulted");
            }
            Ok(event.into_iter().collect())
        }))
    }

    fn process_loans<F>(
        &self,
        kind: JobKind,
        today: NaiveDate,
        loan_ids: BTreeSet<LoanId>,
        work: F,
    ) -> JobReport
    where
        F: Fn(&mut LoanAggregate) -> Result<Vec<Event>> + Sync,
    {
        let loan_ids: Vec<LoanId> = loan_ids.into_iter().collect();
        let outcomes: Vec<(LoanId, Result<usize>)> = loan_ids
            .par_iter()
            .map(|&loan_id| {
                let outcome = self.run_for_loan(loan_id, &work).map(|events| {
                    let sent = events.len();
                    // only after the aggregate is committed
                    self.notifier.notify_all(events);
                    sent
                });
                (loan_id, outcome)
            })
            .collect();

        let mut report = JobReport::new(kind, today);
        report.loans_scanned = loan_ids.len();
        for (loan_id, outcome) in outcomes {
            match outcome {
                Ok(0) => {}
                Ok(sent) => {
                    report.loans_updated += 1;
                    report.notifications_sent += sent;
                }
                Err(e) => {
                    error!(job = %kind, loan_id = %loan_id, error = %e, "loan failed");
                    report.failures.push(LoanFailure {
                        loan_id,
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            job = %kind,
            run_date = %today,
            loans_scanned = report.loans_scanned,
            loans_updated = report.loans_updated,
            notifications = report.notifications_sent,
            failures = report.failures.len(),
            "collections pass finished"
        );
        report
    }

    /// Load, change and save one aggregate under its lock, retrying transient
    /// repository failures with a doubling pause. An attempt that overruns the
    /// loan's budget is abandoned before it saves.
    fn run_for_loan<F>(&self, loan_id: LoanId, work: &F) -> Result<Vec<Event>>
    where
        F: Fn(&mut LoanAggregate) -> Result<Vec<Event>> + Sync,
    {
        let started = Instant::now();
        let budget = Duration::from_millis(self.config.loan_timeout_ms);
        let over_budget = || -> Result<()> {
            let elapsed = started.elapsed();
            if elapsed >= budget {
                return Err(LedgerError::Timeout {
                    loan_id,
                    elapsed_ms: elapsed.as_millis() as u64,
                });
            }
            Ok(())
        };
        let mut backoff = Duration::from_millis(self.config.retry_backoff_ms);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let result = self.locks.with_loan(loan_id, || -> Result<Vec<Event>> {
                let mut aggregate = self.repository.load_aggregate(loan_id)?;
                let events = work(&mut aggregate)?;
                over_budget()?;
                if !events.is_empty() {
                    self.repository.save_aggregate(&aggregate)?;
                }
                Ok(events)
            });

            match result {
                Err(e) if e.is_transient() && attempt < self.config.max_attempts => {
                    over_budget()?;
                    warn!(
                        loan_id = %loan_id,
                        attempt,
                        error = %e,
                        backoff_ms = backoff.as_millis() as u64,
                        "retrying loan"
                    );
                    let left = budget.saturating_sub(started.elapsed());
                    thread::sleep(backoff.min(left));
                    backoff *= 2;
                }
                other => return other,
            }
        }
    }
}
