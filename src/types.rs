use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::errors::LedgerError;

/// unique identifier for a loan aggregate
pub type LoanId = Uuid;

/// unique identifier for a single installment
pub type InstallmentId = Uuid;

/// opaque reference to a borrower, resolved outside this crate
pub type BorrowerId = Uuid;

/// opaque reference to a lender, resolved outside this crate
pub type LenderId = Uuid;

/// equal-installment calculation method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EmiType {
    /// interest on the original principal for the whole term, spread evenly
    Flat,
    /// interest on the outstanding principal each month
    #[default]
    ReducingBalance,
}

impl fmt::Display for EmiType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmiType::Flat => write!(f, "FLAT"),
            EmiType::ReducingBalance => write!(f, "REDUCING_BALANCE"),
        }
    }
}

impl FromStr for EmiType {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "FLAT" => Ok(EmiType::Flat),
            "REDUCING_BALANCE" | "REDUCING" => Ok(EmiType::ReducingBalance),
            other => Err(LedgerError::invalid_argument(format!("unknown emi type: {other}"))),
        }
    }
}

/// loan status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoanStatus {
    /// offer created, no schedule yet
    Pending,
    /// schedule generated, payments ongoing
    Active,
    /// remaining balance reached zero
    Completed,
    /// an installment stayed unpaid past the default threshold
    Defaulted,
    /// withdrawn before activation
    Cancelled,
}

impl LoanStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LoanStatus::Completed | LoanStatus::Defaulted | LoanStatus::Cancelled
        )
    }
}

impl fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LoanStatus::Pending => "PENDING",
            LoanStatus::Active => "ACTIVE",
            LoanStatus::Completed => "COMPLETED",
            LoanStatus::Defaulted => "DEFAULTED",
            LoanStatus::Cancelled => "CANCELLED",
        };
        f.write_str(s)
    }
}

/// installment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstallmentStatus {
    /// not yet due
    Pending,
    /// due today
    Due,
    /// fully paid, penalty included
    Paid,
    /// some amount received, short of the total due
    Partial,
    /// past due date and unpaid
    Overdue,
    /// penalty forgiven
    Waived,
}

impl InstallmentStatus {
    /// excluded from penalty accrual
    pub fn is_settled(&self) -> bool {
        matches!(self, InstallmentStatus::Paid | InstallmentStatus::Waived)
    }
}

impl fmt::Display for InstallmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InstallmentStatus::Pending => "PENDING",
            InstallmentStatus::Due => "DUE",
            InstallmentStatus::Paid => "PAID",
            InstallmentStatus::Partial => "PARTIAL",
            InstallmentStatus::Overdue => "OVERDUE",
            InstallmentStatus::Waived => "WAIVED",
        };
        f.write_str(s)
    }
}

/// discrete borrower risk band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
            RiskLevel::Critical => "CRITICAL",
        };
        f.write_str(s)
    }
}

/// what to do with a payment against an installment that is already paid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OverpaymentPolicy {
    /// fail with an invalid state error
    #[default]
    RejectOnPaid,
    /// add the amount to what was paid without touching the loan balance
    AllowOnPaid,
}
