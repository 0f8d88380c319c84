//! Per-installment state machine.
//!
//! Functions here mutate a [`LoanAggregate`] in memory and report what
//! changed. Persisting the aggregate and dispatching the returned events is
//! left to the caller, in that order.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::decimal::{Money, Rate};
use crate::errors::{LedgerError, Result};
use crate::events::Event;
use crate::interest::late_payment_penalty;
use crate::loan::{Installment, LoanAggregate};
use crate::types::{InstallmentId, InstallmentStatus, LoanId, LoanStatus, OverpaymentPolicy};

/// result of recording one payment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentOutcome {
    pub loan_id: LoanId,
    pub installment_id: InstallmentId,
    pub installment_status: InstallmentStatus,
    pub loan_status: LoanStatus,
    pub remaining_balance: Money,
    /// amount paid beyond the installment's total due
    pub excess: Money,
    pub loan_completed: bool,
}

impl PaymentOutcome {
    pub fn events(&self) -> Vec<Event> {
        if self.loan_completed {
            vec![Event::LoanCompleted { loan_id: self.loan_id }]
        } else {
            Vec::new()
        }
    }
}

/// Apply a payment to one installment.
///
/// Full settlement marks the installment paid and debits the loan's remaining
/// balance by its principal component, once. The loan completes when that
/// balance reaches zero.
pub fn record_payment(
    aggregate: &mut LoanAggregate,
    installment_id: InstallmentId,
    amount: Money,
    today: NaiveDate,
    policy: OverpaymentPolicy,
) -> Result<PaymentOutcome> {
    if !amount.is_positive() {
        return Err(LedgerError::invalid_argument(format!(
            "payment amount must be positive, got {amount}"
        )));
    }
    if matches!(aggregate.loan.status, LoanStatus::Pending | LoanStatus::Cancelled) {
        return Err(LedgerError::invalid_state(aggregate.loan.status, "ACTIVE"));
    }

    let loan_id = aggregate.loan.id;
    let installment = aggregate.installment_mut(installment_id)?;
    let already_paid = installment.status == InstallmentStatus::Paid;
    if already_paid && policy == OverpaymentPolicy::RejectOnPaid {
        return Err(LedgerError::invalid_state(installment.status, "unpaid installment"));
    }

    installment.amount_paid += amount;
    let settled = installment.amount_paid >= installment.total_due();
    let excess = (-installment.remaining_amount()).clamp_non_negative();
    let principal_component = installment.principal_component;
    let sequence = installment.sequence;

    if settled {
        installment.status = InstallmentStatus::Paid;
        if installment.paid_date.is_none() {
            installment.paid_date = Some(today);
        }
    } else if installment.status != InstallmentStatus::Waived {
        // a waived installment stays waived until settled, out of the sweep's reach
        installment.status = InstallmentStatus::Partial;
    }
    let installment_status = installment.status;

    let loan = &mut aggregate.loan;
    let mut loan_completed = false;
    if settled && !already_paid {
        loan.remaining_balance = (loan.remaining_balance - principal_component).clamp_non_negative();
        if loan.remaining_balance.is_zero()
            && matches!(loan.status, LoanStatus::Active | LoanStatus::Defaulted)
        {
            loan.status = LoanStatus::Completed;
            loan_completed = true;
        }
    }

    info!(
        loan_id = %loan_id,
        installment_no = sequence,
        %amount,
        status = %installment_status,
        remaining_balance = %loan.remaining_balance,
        "recorded payment"
    );
    if loan_completed {
        info!(loan_id = %loan_id, "loan completed");
    }

    Ok(PaymentOutcome {
        loan_id,
        installment_id,
        installment_status,
        loan_status: loan.status,
        remaining_balance: loan.remaining_balance,
        excess,
        loan_completed,
    })
}

fn penalize(installment: &mut Installment, penalty_rate: Rate, today: NaiveDate) -> Result<Option<Money>> {
    if installment.status.is_settled() {
        return Ok(None);
    }
    let days = installment.days_overdue(today);
    if days <= 0 {
        return Ok(None);
    }

    let penalty = late_payment_penalty(installment.emi_amount, Some(penalty_rate), days)?;
    let delta = penalty - installment.penalty_amount;
    if delta.is_zero() && installment.status == InstallmentStatus::Overdue {
        return Ok(None);
    }

    debug!(
        loan_id = %installment.loan_id,
        installment_no = installment.sequence,
        days_overdue = days,
        %penalty,
        "penalizing overdue installment"
    );
    installment.penalty_amount = penalty;
    installment.status = InstallmentStatus::Overdue;
    Ok(Some(delta))
}

/// Mark one installment overdue and recompute its penalty from the full day
/// count. Returns the notification when anything changed.
pub fn apply_overdue_penalty(
    aggregate: &mut LoanAggregate,
    installment_id: InstallmentId,
    today: NaiveDate,
) -> Result<Option<Event>> {
    let penalty_rate = aggregate.loan.penalty_rate;
    let loan_id = aggregate.loan.id;
    let installment = aggregate.installment_mut(installment_id)?;

    let Some(delta) = penalize(installment, penalty_rate, today)? else {
        return Ok(None);
    };
    let event = Event::PaymentOverdue {
        loan_id,
        installment_no: installment.sequence,
        amount: installment.remaining_amount(),
        penalty: installment.penalty_amount,
    };
    aggregate.loan.total_penalty_accrued += delta;
    Ok(Some(event))
}

/// run [`apply_overdue_penalty`] over every installment of the loan
pub fn apply_overdue_penalties(aggregate: &mut LoanAggregate, today: NaiveDate) -> Result<Vec<Event>> {
    let overdue: Vec<InstallmentId> = aggregate
        .installments
        .iter()
        .filter(|i| !i.status.is_settled() && i.due_date < today)
        .map(|i| i.id)
        .collect();

    let mut events = Vec::new();
    for id in overdue {
        if let Some(event) = apply_overdue_penalty(aggregate, id, today)? {
            events.push(event);
        }
    }
    Ok(events)
}

/// Forgive the accrued penalty of an unpaid installment. The installment
/// stays payable for its EMI amount and keeps WAIVED through short payments.
pub fn waive_penalty(aggregate: &mut LoanAggregate, installment_id: InstallmentId) -> Result<Money> {
    let loan_id = aggregate.loan.id;
    let installment = aggregate.installment_mut(installment_id)?;
    if installment.status.is_settled() {
        return Err(LedgerError::invalid_state(installment.status, "unsettled installment"));
    }

    let waived = installment.penalty_amount;
    installment.penalty_amount = Money::ZERO;
    installment.status = InstallmentStatus::Waived;
    let sequence = installment.sequence;

    let loan = &mut aggregate.loan;
    loan.total_penalty_accrued = (loan.total_penalty_accrued - waived).clamp_non_negative();

    info!(loan_id = %loan_id, installment_no = sequence, %waived, "waived penalty");
    Ok(waived)
}

/// Move pending installments due today to DUE.
pub fn mark_due(aggregate: &mut LoanAggregate, today: NaiveDate) -> Vec<Event> {
    let loan_id = aggregate.loan.id;
    aggregate
        .installments
        .iter_mut()
        .filter(|i| i.status == InstallmentStatus::Pending && i.due_date == today)
        .map(|installment| {
            installment.status = InstallmentStatus::Due;
            Event::EmiDueToday {
                loan_id,
                installment_no: installment.sequence,
                amount: installment.total_due(),
                due_date: installment.due_date,
            }
        })
        .collect()
}

/// Default the loan when an unpaid installment is more than `threshold_days`
/// past due. Never reverts an existing default.
pub fn check_default(
    aggregate: &mut LoanAggregate,
    today: NaiveDate,
    threshold_days: u32,
) -> Option<Event> {
    if aggregate.loan.status != LoanStatus::Active {
        return None;
    }
    let cutoff = today - chrono::Duration::days(i64::from(threshold_days));
    let oldest_due_date = aggregate
        .installments
        .iter()
        .filter(|i| i.status != InstallmentStatus::Paid && i.due_date < cutoff)
        .map(|i| i.due_date)
        .min()?;

    aggregate.loan.status = LoanStatus::Defaulted;
    Some(Event::LoanDefaulted {
        loan_id: aggregate.loan.id,
        oldest_due_date,
    })
}

/// point-in-time view of where a loan stands
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanSummary {
    pub loan_id: LoanId,
    pub status: LoanStatus,
    pub principal: Money,
    pub monthly_payment: Option<Money>,
    pub remaining_balance: Money,
    pub total_outstanding: Money,
    pub total_penalties: Money,
    pub installments_total: usize,
    pub installments_paid: usize,
    pub next_installment: Option<NextInstallment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NextInstallment {
    pub installment_id: InstallmentId,
    pub sequence: u32,
    pub due_date: NaiveDate,
    pub amount_due: Money,
    pub status: InstallmentStatus,
}

impl LoanSummary {
    pub fn from_aggregate(aggregate: &LoanAggregate) -> Self {
        let unpaid = || {
            aggregate
                .installments
                .iter()
                .filter(|i| i.status != InstallmentStatus::Paid)
        };

        Self {
            loan_id: aggregate.loan.id,
            status: aggregate.loan.status,
            principal: aggregate.loan.principal,
            monthly_payment: aggregate.loan.monthly_payment,
            remaining_balance: aggregate.loan.remaining_balance,
            total_outstanding: unpaid().map(|i| i.remaining_amount().clamp_non_negative()).sum(),
            total_penalties: aggregate.installments.iter().map(|i| i.penalty_amount).sum(),
            installments_total: aggregate.installments.len(),
            installments_paid: aggregate.installments.len() - unpaid().count(),
            next_installment: aggregate.next_unpaid().map(|i| NextInstallment {
                installment_id: i.id,
                sequence: i.sequence,
                due_date: i.due_date,
                amount_due: i.remaining_amount().clamp_non_negative(),
                status: i.status,
            }),
        }
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| LedgerError::invalid_argument(format!("loan summary serialization: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loan::Loan;
    use crate::schedule::ScheduleGenerator;
    use crate::types::EmiType;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn scheduled(principal: i64, rate: u32, term: u32) -> LoanAggregate {
        let loan = Loan::builder()
            .borrower(Uuid::new_v4())
            .principal(Money::from_major(principal))
            .rate(Rate::from_percentage(rate))
            .term_months(term)
            .emi_type(EmiType::ReducingBalance)
            .start_date(date(2024, 1, 1))
            .build()
            .unwrap();
        let mut aggregate = LoanAggregate::new(loan, Vec::new());
        ScheduleGenerator::generate(&mut aggregate, date(2024, 1, 1)).unwrap();
        aggregate
    }

    fn pay_in_full(aggregate: &mut LoanAggregate, index: usize, today: NaiveDate) -> PaymentOutcome {
        let installment = &aggregate.installments[index];
        let (id, due) = (installment.id, installment.total_due());
        record_payment(aggregate, id, due, today, OverpaymentPolicy::RejectOnPaid).unwrap()
    }

    #[test]
    fn test_full_payment_debits_principal() {
        let mut aggregate = scheduled(12_000, 12, 12);
        let outcome = pay_in_full(&mut aggregate, 0, date(2024, 2, 1));

        assert_eq!(outcome.installment_status, InstallmentStatus::Paid);
        assert_eq!(outcome.remaining_balance.as_decimal(), dec!(11053.81));
        assert_eq!(outcome.excess, Money::ZERO);
        assert!(!outcome.loan_completed);
        assert_eq!(aggregate.installments[0].paid_date, Some(date(2024, 2, 1)));
    }

    #[test]
    fn test_partial_then_full_payment() {
        let mut aggregate = scheduled(12_000, 12, 12);
        let id = aggregate.installments[0].id;
        let today = date(2024, 2, 1);

        let first = record_payment(&mut aggregate, id, Money::from_major(500), today, OverpaymentPolicy::RejectOnPaid).unwrap();
        assert_eq!(first.installment_status, InstallmentStatus::Partial);
        assert_eq!(first.remaining_balance, Money::from_major(12_000));

        let rest = aggregate.installments[0].remaining_amount();
        let second = record_payment(&mut aggregate, id, rest, today, OverpaymentPolicy::RejectOnPaid).unwrap();
        assert_eq!(second.installment_status, InstallmentStatus::Paid);
        assert_eq!(second.remaining_balance.as_decimal(), dec!(11053.81));
    }

    #[test]
    fn test_overpayment_is_reported_as_excess() {
        let mut aggregate = scheduled(12_000, 12, 12);
        let id = aggregate.installments[0].id;
        let outcome = record_payment(
            &mut aggregate,
            id,
            Money::from_major(1_100),
            date(2024, 2, 1),
            OverpaymentPolicy::RejectOnPaid,
        )
        .unwrap();
        assert_eq!(outcome.excess.as_decimal(), dec!(33.81));
        assert!(aggregate.installments[0].remaining_amount().is_negative());
    }

    #[test]
    fn test_paying_paid_installment_follows_policy() {
        let mut aggregate = scheduled(12_000, 12, 12);
        pay_in_full(&mut aggregate, 0, date(2024, 2, 1));
        let id = aggregate.installments[0].id;
        let balance = aggregate.loan.remaining_balance;

        let rejected = record_payment(&mut aggregate, id, Money::from_major(10), date(2024, 2, 2), OverpaymentPolicy::RejectOnPaid);
        assert!(matches!(rejected, Err(LedgerError::InvalidState { .. })));

        let allowed = record_payment(&mut aggregate, id, Money::from_major(10), date(2024, 2, 2), OverpaymentPolicy::AllowOnPaid).unwrap();
        assert_eq!(allowed.remaining_balance, balance);
        assert_eq!(allowed.excess, Money::from_major(10));
        assert_eq!(aggregate.installments[0].paid_date, Some(date(2024, 2, 1)));
    }

    #[test]
    fn test_invalid_payments_rejected() {
        let mut aggregate = scheduled(12_000, 12, 12);
        let id = aggregate.installments[0].id;
        let today = date(2024, 2, 1);
        assert!(matches!(
            record_payment(&mut aggregate, id, Money::ZERO, today, OverpaymentPolicy::RejectOnPaid),
            Err(LedgerError::InvalidArgument { .. })
        ));
        assert!(matches!(
            record_payment(&mut aggregate, Uuid::new_v4(), Money::ONE, today, OverpaymentPolicy::RejectOnPaid),
            Err(LedgerError::NotFound { entity: "installment", .. })
        ));
    }

    #[test]
    fn test_paying_every_installment_completes_loan() {
        let mut aggregate = scheduled(12_000, 12, 12);
        let mut completions = 0;
        for index in 0..12 {
            let outcome = pay_in_full(&mut aggregate, index, date(2024, 2, 1));
            completions += outcome.events().len();
        }
        assert_eq!(aggregate.loan.remaining_balance, Money::ZERO);
        assert_eq!(aggregate.loan.status, LoanStatus::Completed);
        assert_eq!(completions, 1);
    }

    #[test]
    fn test_overdue_penalty_is_recomputed_not_added() {
        let mut aggregate = scheduled(12_000, 12, 12);
        let id = aggregate.installments[0].id;
        let today = date(2024, 3, 2); // 30 days after 2024-02-01

        let event = apply_overdue_penalty(&mut aggregate, id, today).unwrap();
        assert!(matches!(event, Some(Event::PaymentOverdue { installment_no: 1, .. })));
        let installment = aggregate.installment(id).unwrap();
        assert_eq!(installment.status, InstallmentStatus::Overdue);
        assert_eq!(installment.penalty_amount.as_decimal(), dec!(1.75));
        assert_eq!(aggregate.loan.total_penalty_accrued.as_decimal(), dec!(1.75));

        // same day again: nothing changes
        assert_eq!(apply_overdue_penalty(&mut aggregate, id, today).unwrap(), None);
        assert_eq!(aggregate.loan.total_penalty_accrued.as_decimal(), dec!(1.75));

        // ten days later the penalty reflects 40 days, the total only the delta
        apply_overdue_penalty(&mut aggregate, id, date(2024, 3, 12)).unwrap();
        let penalty = aggregate.installment(id).unwrap().penalty_amount;
        assert_eq!(penalty.as_decimal(), dec!(2.34));
        assert_eq!(aggregate.loan.total_penalty_accrued, penalty);
    }

    #[test]
    fn test_not_yet_due_is_untouched() {
        let mut aggregate = scheduled(12_000, 12, 12);
        let id = aggregate.installments[0].id;
        assert_eq!(apply_overdue_penalty(&mut aggregate, id, date(2024, 2, 1)).unwrap(), None);
        assert_eq!(aggregate.installments[0].status, InstallmentStatus::Pending);
    }

    #[test]
    fn test_waived_installment_skips_penalty_and_can_be_paid() {
        let mut aggregate = scheduled(12_000, 12, 12);
        let id = aggregate.installments[0].id;
        apply_overdue_penalty(&mut aggregate, id, date(2024, 3, 2)).unwrap();

        let waived = waive_penalty(&mut aggregate, id).unwrap();
        assert_eq!(waived.as_decimal(), dec!(1.75));
        assert_eq!(aggregate.loan.total_penalty_accrued, Money::ZERO);
        assert_eq!(apply_overdue_penalty(&mut aggregate, id, date(2024, 4, 1)).unwrap(), None);
        assert!(matches!(waive_penalty(&mut aggregate, id), Err(LedgerError::InvalidState { .. })));

        let outcome = pay_in_full(&mut aggregate, 0, date(2024, 4, 1));
        assert_eq!(outcome.installment_status, InstallmentStatus::Paid);
    }

    #[test]
    fn test_short_payment_keeps_waiver() {
        let mut aggregate = scheduled(12_000, 12, 12);
        let id = aggregate.installments[0].id;
        apply_overdue_penalties(&mut aggregate, date(2024, 3, 2)).unwrap();
        assert_eq!(waive_penalty(&mut aggregate, id).unwrap().as_decimal(), dec!(1.75));

        let outcome = record_payment(&mut aggregate, id, Money::from_major(100), date(2024, 3, 3), OverpaymentPolicy::RejectOnPaid).unwrap();
        assert_eq!(outcome.installment_status, InstallmentStatus::Waived);

        apply_overdue_penalties(&mut aggregate, date(2024, 3, 4)).unwrap();
        let installment = aggregate.installment(id).unwrap();
        assert_eq!(installment.status, InstallmentStatus::Waived);
        assert!(installment.penalty_amount.is_zero());
        // only installment 2 still accrues
        assert_eq!(aggregate.loan.total_penalty_accrued, aggregate.installments[1].penalty_amount);

        let rest = aggregate.installment(id).unwrap().remaining_amount();
        let settled = record_payment(&mut aggregate, id, rest, date(2024, 3, 5), OverpaymentPolicy::RejectOnPaid).unwrap();
        assert_eq!(settled.installment_status, InstallmentStatus::Paid);
    }

    #[test]
    fn test_flat_loan_completes_when_every_installment_is_paid() {
        let loan = Loan::builder()
            .borrower(Uuid::new_v4())
            .principal(Money::from_major(1_000))
            .rate(Rate::from_percentage(6))
            .term_months(3)
            .emi_type(EmiType::Flat)
            .start_date(date(2024, 1, 1))
            .build()
            .unwrap();
        let mut aggregate = LoanAggregate::new(loan, Vec::new());
        ScheduleGenerator::generate(&mut aggregate, date(2024, 1, 1)).unwrap();

        for index in 0..3 {
            pay_in_full(&mut aggregate, index, date(2024, 2, 1));
        }
        assert_eq!(aggregate.loan.remaining_balance, Money::ZERO);
        assert_eq!(aggregate.loan.status, LoanStatus::Completed);
    }

    #[test]
    fn test_remaining_balance_tracks_paid_principal() {
        let mut aggregate = scheduled(12_000, 12, 12);
        let today = date(2024, 2, 1);
        pay_in_full(&mut aggregate, 0, today);
        pay_in_full(&mut aggregate, 3, today);
        let partial = aggregate.installments[1].id;
        record_payment(&mut aggregate, partial, Money::from_major(200), today, OverpaymentPolicy::RejectOnPaid).unwrap();
        let first = aggregate.installments[0].id;
        record_payment(&mut aggregate, first, Money::from_major(50), today, OverpaymentPolicy::AllowOnPaid).unwrap();

        let repaid = aggregate.installments[0].principal_component + aggregate.installments[3].principal_component;
        assert_eq!(aggregate.loan.remaining_balance, aggregate.expected_remaining_balance());
        assert_eq!(aggregate.loan.remaining_balance, aggregate.loan.principal - repaid);
    }

    #[test]
    fn test_mark_due_only_touches_todays_pending() {
        let mut aggregate = scheduled(12_000, 12, 12);
        let events = mark_due(&mut aggregate, date(2024, 2, 1));
        assert_eq!(events.len(), 1);
        assert_eq!(aggregate.installments[0].status, InstallmentStatus::Due);
        assert_eq!(aggregate.installments[1].status, InstallmentStatus::Pending);
        assert!(mark_due(&mut aggregate, date(2024, 2, 1)).is_empty());
    }

    #[test]
    fn test_default_after_threshold() {
        let mut aggregate = scheduled(12_000, 12, 12);
        // first due 2024-02-01; 90 days later is 2024-05-01
        assert_eq!(check_default(&mut aggregate, date(2024, 5, 1), 90), None);
        let event = check_default(&mut aggregate, date(2024, 5, 2), 90);
        assert_eq!(
            event,
            Some(Event::LoanDefaulted {
                loan_id: aggregate.loan.id,
                oldest_due_date: date(2024, 2, 1),
            })
        );
        assert_eq!(aggregate.loan.status, LoanStatus::Defaulted);
        assert_eq!(check_default(&mut aggregate, date(2024, 9, 1), 90), None);
    }

    #[test]
    fn test_loan_summary() {
        let mut aggregate = scheduled(12_000, 12, 12);
        pay_in_full(&mut aggregate, 0, date(2024, 2, 1));
        let summary = LoanSummary::from_aggregate(&aggregate);

        assert_eq!(summary.installments_paid, 1);
        assert_eq!(summary.installments_total, 12);
        assert_eq!(summary.next_installment.as_ref().unwrap().sequence, 2);
        assert_eq!(summary.total_outstanding.as_decimal(), dec!(11728.04));
        assert!(summary.to_json_pretty().unwrap().contains("\"installments_paid\": 1"));
    }
}
