//! Fixed-payment (French) amortization

use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use thiserror::Error;

const HUNDRED: f64 = 100.0;
const MONTHS_PER_YEAR: f64 = 12.0;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AmortizationError {
    #[error("{0}")]
    InvalidArgument(String),
}

/// Monthly installment for `principal` repaid over `term_months` at an
/// effective annual rate of `annual_rate_percent`.
///
/// The annual rate is converted to its equivalent monthly rate,
/// `(1 + r/100)^(1/12) - 1`. A zero monthly rate degenerates to straight
/// division. The result is rounded half-up to cents.
pub fn monthly_payment(
    principal: Decimal,
    annual_rate_percent: Decimal,
    term_months: Decimal,
) -> Result<Decimal, AmortizationError> {
    if principal <= Decimal::ZERO {
        return Err(AmortizationError::InvalidArgument(format!(
            "principal must be greater than 0, got {principal}"
        )));
    }
    if term_months <= Decimal::ZERO {
        return Err(AmortizationError::InvalidArgument(format!(
            "term must be greater than 0 months, got {term_months}"
        )));
    }

    let rate = to_f64(annual_rate_percent, "annual rate")?;
    if rate <= -HUNDRED {
        return Err(AmortizationError::InvalidArgument(format!(
            "annual rate must be greater than -100%, got {annual_rate_percent}"
        )));
    }

    let monthly_rate = (1.0 + rate / HUNDRED).powf(1.0 / MONTHS_PER_YEAR) - 1.0;

    let payment = if monthly_rate == 0.0 {
        principal.checked_div(term_months).ok_or_else(|| {
            AmortizationError::InvalidArgument(format!(
                "installment of {principal} over {term_months} months is out of range"
            ))
        })?
    } else {
        let principal = to_f64(principal, "principal")?;
        let term = to_f64(term_months, "term")?;
        let installment =
            principal * monthly_rate / (1.0 - (1.0 + monthly_rate).powf(-term));
        installment_to_decimal(installment)?
    };

    Ok(round_cents(payment))
}

/// Exact decimal for the shortest text that round-trips `installment`.
/// `Decimal::from_f64` trims digits first, which would round twice.
fn installment_to_decimal(installment: f64) -> Result<Decimal, AmortizationError> {
    Decimal::from_str(&installment.to_string()).map_err(|_| {
        AmortizationError::InvalidArgument(format!(
            "installment is not representable: {installment}"
        ))
    })
}

fn round_cents(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

fn to_f64(value: Decimal, what: &str) -> Result<f64, AmortizationError> {
    value
        .to_f64()
        .filter(|v| v.is_finite())
        .ok_or_else(|| AmortizationError::InvalidArgument(format!("{what} out of range: {value}")))
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn test_zero_rate_is_straight_division() {
        assert_eq!(
            monthly_payment(dec!(1000000), Decimal::ZERO, dec!(12)).unwrap(),
            dec!(83333.33)
        );
        assert_eq!(
            monthly_payment(dec!(1000), Decimal::ZERO, dec!(4)).unwrap(),
            dec!(250.00)
        );
    }

    #[test]
    fn test_zero_rate_rounds_half_up() {
        // 0.125 per month
        assert_eq!(
            monthly_payment(dec!(1), Decimal::ZERO, dec!(8)).unwrap(),
            dec!(0.13)
        );
    }

    #[test]
    fn test_known_installments() {
        assert_eq!(
            monthly_payment(dec!(10000), dec!(12), dec!(12)).unwrap(),
            dec!(885.62)
        );
        assert_eq!(
            monthly_payment(dec!(1000000), dec!(5), dec!(36)).unwrap(),
            dec!(29921.06)
        );
    }

    #[test]
    fn test_overflowing_division_is_an_error() {
        assert!(matches!(
            monthly_payment(Decimal::MAX, Decimal::ZERO, dec!(0.5)),
            Err(AmortizationError::InvalidArgument(_))
        ));
        assert!(matches!(
            monthly_payment(dec!(10000000000000000), Decimal::ZERO, dec!(0.0000000000001)),
            Err(AmortizationError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_installment_rounds_once_from_full_value() {
        // Just under the midpoint; trimming to 0.035 first would give 0.04
        let parsed = installment_to_decimal(0.034999999999999996).unwrap();
        assert_eq!(parsed, dec!(0.034999999999999996));
        assert_eq!(round_cents(parsed), dec!(0.03));

        assert!(installment_to_decimal(f64::MAX).is_err());
    }

    #[test]
    fn test_rejects_non_positive_inputs() {
        assert!(matches!(
            monthly_payment(Decimal::ZERO, dec!(5), dec!(12)),
            Err(AmortizationError::InvalidArgument(_))
        ));
        assert!(monthly_payment(dec!(-10), dec!(5), dec!(12)).is_err());
        assert!(monthly_payment(dec!(1000), dec!(5), Decimal::ZERO).is_err());
        assert!(monthly_payment(dec!(1000), dec!(5), dec!(-3)).is_err());
        assert!(monthly_payment(dec!(1000), dec!(-100), dec!(12)).is_err());
    }
}
