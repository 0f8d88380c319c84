pub mod collections;
pub mod config;
pub mod decimal;
pub mod engine;
pub mod errors;
pub mod events;
pub mod interest;
pub mod lifecycle;
pub mod loan;
pub mod locks;
pub mod repository;
pub mod risk;
pub mod schedule;
pub mod types;

// re-export key types
pub use collections::{CollectionsJob, JobKind, JobReport, LoanFailure};
pub use config::{CollectionsConfig, EngineConfig, RiskConfig};
pub use decimal::{Money, Rate};
pub use engine::LoanEngine;
pub use errors::{LedgerError, Result};
pub use events::{Event, EventStore, Notifier};
pub use interest::{
    compound_interest, emi_breakdown, flat_rate_emi, late_payment_penalty, prepayment_savings,
    reducing_balance_emi, simple_interest, total_interest_reducing_balance, total_payable,
    CompoundingFrequency, EmiBreakdown, DEFAULT_PENALTY_RATE,
};
pub use lifecycle::{LoanSummary, NextInstallment, PaymentOutcome};
pub use loan::{Installment, Loan, LoanAggregate, LoanBuilder};
pub use locks::LoanLocks;
pub use repository::{InMemoryRepository, LoanRepository};
pub use risk::{RiskAssessment, RiskComponents, RiskScorer};
pub use schedule::{AmortizationStrategy, ScheduleGenerator, SchedulePreview, ScheduleRow};
pub use types::{
    BorrowerId, EmiType, InstallmentId, InstallmentStatus, LenderId, LoanId, LoanStatus,
    OverpaymentPolicy, RiskLevel,
};

// re-export external dependencies that users will need
pub use chrono;
pub use hourglass_rs::{SafeTimeProvider, TimeSource};
pub use rust_decimal::Decimal;
pub use uuid::Uuid;
