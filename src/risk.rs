//! Borrower risk scoring.
//!
//! The score is a weighted sum of five sub-scores, each 0 to 100, computed
//! fresh from the borrower's loans and installments on every call.

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::RiskConfig;
use crate::decimal::{round_money, Money};
use crate::errors::Result;
use crate::loan::LoanAggregate;
use crate::repository::LoanRepository;
use crate::types::{BorrowerId, InstallmentStatus, LoanStatus, RiskLevel};

/// named sub-scores, each in 0..=100
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskComponents {
    pub payment_history: Decimal,
    pub exposure: Decimal,
    pub tenure: Decimal,
    pub concurrency: Decimal,
    pub default_history: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub borrower_id: BorrowerId,
    /// 0..=100, two decimals
    pub score: Decimal,
    pub level: RiskLevel,
    pub components: RiskComponents,
    pub recommendation: String,
}

pub struct RiskScorer<'a, R: LoanRepository> {
    repository: &'a R,
    config: &'a RiskConfig,
}

impl<'a, R: LoanRepository> RiskScorer<'a, R> {
    pub fn new(repository: &'a R, config: &'a RiskConfig) -> Self {
        Self { repository, config }
    }

    pub fn score(&self, borrower_id: BorrowerId, today: NaiveDate) -> Result<RiskAssessment> {
        let history = self
            .repository
            .find_loans_by_borrower(borrower_id)?
            .into_iter()
            .map(|loan| {
                let installments = self.repository.load_installments(loan.id)?;
                Ok(LoanAggregate::new(loan, installments))
            })
            .collect::<Result<Vec<_>>>()?;

        let assessment = assess(borrower_id, &history, today, self.config);
        info!(
            borrower_id = %borrower_id,
            score = %assessment.score,
            level = %assessment.level,
            loans = history.len(),
            "scored borrower risk"
        );
        Ok(assessment)
    }
}

/// score a borrower from an already loaded history
pub fn assess(
    borrower_id: BorrowerId,
    history: &[LoanAggregate],
    today: NaiveDate,
    config: &RiskConfig,
) -> RiskAssessment {
    let components = RiskComponents {
        payment_history: payment_history_score(history, today),
        exposure: exposure_score(history),
        tenure: tenure_score(history, today),
        concurrency: concurrency_score(history),
        default_history: default_history_score(history),
    };

    let weighted = components.payment_history * config.payment_history_weight
        + components.exposure * config.exposure_weight
        + components.tenure * config.tenure_weight
        + components.concurrency * config.concurrency_weight
        + components.default_history * config.default_history_weight;
    let score = round_money(weighted.max(Decimal::ZERO).min(Decimal::ONE_HUNDRED));
    let level = risk_level(score);

    RiskAssessment {
        borrower_id,
        score,
        level,
        recommendation: recommendation(level, &components),
        components,
    }
}

pub fn risk_level(score: Decimal) -> RiskLevel {
    if score <= dec!(30) {
        RiskLevel::Low
    } else if score <= dec!(60) {
        RiskLevel::Medium
    } else if score <= dec!(80) {
        RiskLevel::High
    } else {
        RiskLevel::Critical
    }
}

/// share of late or missed payments; 50 when there is nothing to judge yet
fn payment_history_score(history: &[LoanAggregate], today: NaiveDate) -> Decimal {
    let judged: Vec<_> = history
        .iter()
        .flat_map(|a| a.installments.iter())
        .filter(|i| i.status == InstallmentStatus::Paid || i.due_date < today)
        .collect();
    if judged.is_empty() {
        return dec!(50);
    }

    let on_time = judged.iter().filter(|i| i.is_paid_on_time()).count();
    let ratio = Decimal::from(on_time) / Decimal::from(judged.len());
    (Decimal::ONE - ratio) * Decimal::ONE_HUNDRED
}

fn exposure_score(history: &[LoanAggregate]) -> Decimal {
    let borrowed: Vec<Money> = history
        .iter()
        .map(|a| &a.loan)
        .filter(|l| {
            matches!(
                l.status,
                LoanStatus::Active | LoanStatus::Completed | LoanStatus::Defaulted
            )
        })
        .map(|l| l.principal)
        .collect();
    if borrowed.is_empty() {
        return Decimal::ZERO;
    }

    let total: Money = borrowed.into_iter().sum();
    let total = total.as_decimal();
    if total < dec!(10_000) {
        dec!(20)
    } else if total < dec!(50_000) {
        dec!(40)
    } else if total < dec!(100_000) {
        dec!(60)
    } else if total < dec!(250_000) {
        dec!(80)
    } else {
        dec!(100)
    }
}

/// whole calendar months from `from` to `to`, zero when `to` has passed
fn months_between(from: NaiveDate, to: NaiveDate) -> u32 {
    let mut months = (to.year() - from.year()) * 12 + to.month() as i32 - from.month() as i32;
    if to.day() < from.day() {
        months -= 1;
    }
    months.max(0) as u32
}

fn tenure_score(history: &[LoanAggregate], today: NaiveDate) -> Decimal {
    let active: Vec<_> = history.iter().filter(|a| a.loan.is_active()).collect();
    if active.is_empty() {
        return Decimal::ZERO;
    }

    let remaining: u32 = active
        .iter()
        .filter_map(|a| a.loan.end_date)
        .map(|end| months_between(today, end))
        .sum();
    match remaining {
        0..=11 => dec!(20),
        12..=35 => dec!(40),
        36..=59 => dec!(60),
        60..=119 => dec!(80),
        _ => dec!(100),
    }
}

fn concurrency_score(history: &[LoanAggregate]) -> Decimal {
    if history.is_empty() {
        return Decimal::ZERO;
    }
    match history.iter().filter(|a| a.loan.is_active()).count() {
        0 | 1 => dec!(20),
        2 => dec!(40),
        3 => dec!(70),
        _ => dec!(100),
    }
}

fn default_history_score(history: &[LoanAggregate]) -> Decimal {
    match history
        .iter()
        .filter(|a| a.loan.status == LoanStatus::Defaulted)
        .count()
    {
        0 => Decimal::ZERO,
        1 => dec!(80),
        _ => dec!(100),
    }
}

fn recommendation(level: RiskLevel, components: &RiskComponents) -> String {
    let mut text = String::from(match level {
        RiskLevel::Low => "Low risk borrower. Eligible for premium loan terms.",
        RiskLevel::Medium => "Moderate risk. Standard loan terms apply. ",
        RiskLevel::High => "High risk borrower. Consider requiring collateral or guarantor. ",
        RiskLevel::Critical => "Critical risk. Loan approval not recommended. ",
    });
    if components.payment_history > dec!(60) {
        text.push_str("Payment history shows concerns. ");
    }
    if components.default_history > Decimal::ZERO {
        text.push_str("Has previous default(s). ");
    }
    if components.concurrency > dec!(60) {
        text.push_str("Has multiple active loans. ");
    }
    text.trim_end().to_string()
}
