use rust_decimal::Decimal;
use tracing::debug;

use crate::decimal::{Money, Rate};
use crate::errors::{LedgerError, Result};
use crate::interest::{checked, validate_rate};

/// annual late-payment rate applied when a loan does not carry its own
pub const DEFAULT_PENALTY_RATE: Rate = Rate::DEFAULT_PENALTY;

/// Penalty on an overdue amount: amount × rate × days / 365.
///
/// Falls back to [`DEFAULT_PENALTY_RATE`] when no rate is given. Zero for
/// `days_overdue <= 0`.
pub fn late_payment_penalty(
    overdue_amount: Money,
    annual_penalty_rate: Option<Rate>,
    days_overdue: i64,
) -> Result<Money> {
    if overdue_amount.is_negative() {
        return Err(LedgerError::invalid_argument(format!(
            "overdue amount must not be negative, got {overdue_amount}"
        )));
    }
    let rate = annual_penalty_rate.unwrap_or(DEFAULT_PENALTY_RATE);
    validate_rate(rate)?;
    debug!(%overdue_amount, %rate, days_overdue, "calculating late payment penalty");

    if days_overdue <= 0 {
        return Ok(Money::ZERO);
    }

    let accrued = checked(
        overdue_amount
            .as_decimal()
            .checked_mul(rate.as_decimal())
            .and_then(|v| v.checked_mul(Decimal::from(days_overdue))),
        "late payment penalty",
    )?;
    Ok(Money::from_decimal(accrued / Decimal::from(365)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_basic_penalty() {
        // 1066.19 × 2% × 30 / 365 = 1.7526...
        let penalty = late_payment_penalty(Money::from_str_exact("1066.19").unwrap(), None, 30).unwrap();
        assert_eq!(penalty.as_decimal(), dec!(1.75));
    }

    #[test]
    fn test_explicit_rate() {
        let penalty = late_payment_penalty(
            Money::from_major(10_000),
            Some(Rate::from_percentage(18)),
            365,
        )
        .unwrap();
        assert_eq!(penalty, Money::from_major(1_800));
    }

    #[test]
    fn test_no_penalty_before_due_date() {
        let amount = Money::from_major(1_000);
        assert_eq!(late_payment_penalty(amount, None, 0).unwrap(), Money::ZERO);
        assert_eq!(late_payment_penalty(amount, None, -5).unwrap(), Money::ZERO);
    }

    #[test]
    fn test_penalty_grows_with_days() {
        let amount = Money::from_major(5_000);
        let rate = Some(Rate::from_percentage(2));
        let early = late_payment_penalty(amount, rate, 10).unwrap();
        let late = late_payment_penalty(amount, rate, 40).unwrap();
        assert!(late > early);
    }

    #[test]
    fn test_negative_inputs_rejected() {
        assert!(late_payment_penalty(Money::from_major(-1), None, 10).is_err());
        assert!(late_payment_penalty(Money::from_major(1), Some(Rate::from_decimal(dec!(-0.02))), 10).is_err());
    }
}
