//! Spreadsheet-compatible decimal arithmetic.
//!
//! `rust_decimal` rounds half-to-even by default (`round_dp`), which is not
//! what the workbook's `ROUND` does. Every rounding point in the liquidation
//! path goes through [`round_excel`] so ties always move away from zero.

use rust_decimal::{Decimal, MathematicalOps, RoundingStrategy};
use rust_decimal_macros::dec;

use crate::error::PensionLoanError;
use crate::PensionLoanResult;

/// Places kept on the annual effective rate (`ROUND(...; 6)`).
pub const ANNUAL_RATE_DP: u32 = 6;
/// Places kept on daily rates, compounding factors and the PMT rate.
pub const INTERMEDIATE_DP: u32 = 15;
/// Places kept on billed amounts (whole pesos).
pub const MONEY_DP: u32 = 0;

const ROOT_MAX_ITERATIONS: u32 = 100;
const ROOT_EPSILON: Decimal = dec!(0.000000000000000000000001);

/// Excel `ROUND(value; places)`: half away from zero.
pub fn round_excel(value: Decimal, places: u32) -> Decimal {
    value.round_dp_with_strategy(places, RoundingStrategy::MidpointAwayFromZero)
}

/// Round to the intermediate precision used for rates and factors.
pub fn round_intermediate(value: Decimal) -> Decimal {
    round_excel(value, INTERMEDIATE_DP)
}

/// Round to whole monetary units.
pub fn round_money(value: Decimal) -> Decimal {
    round_excel(value, MONEY_DP)
}

/// Integer power with overflow reported as an error rather than a panic.
pub fn checked_pow(base: Decimal, exponent: u64) -> PensionLoanResult<Decimal> {
    base.checked_powu(exponent).ok_or_else(|| {
        PensionLoanError::FinancialImpossibility(format!(
            "{base}^{exponent} overflows decimal range"
        ))
    })
}

/// Principal n-th root of a positive decimal, `value^(1/n)`.
///
/// `powd` goes through `exp(ln(x) * y)` and loses digits well before the
/// 15th place, so it only seeds Newton's method here.
pub fn nth_root(value: Decimal, n: u32) -> PensionLoanResult<Decimal> {
    if n == 0 {
        return Err(PensionLoanError::InvalidInput {
            field: "n".into(),
            reason: "Root degree must be at least 1".into(),
        });
    }
    if value <= Decimal::ZERO {
        return Err(PensionLoanError::InvalidInput {
            field: "value".into(),
            reason: "Root base must be positive".into(),
        });
    }
    if n == 1 || value == Decimal::ONE {
        return Ok(value);
    }

    let degree = Decimal::from(n);
    let mut x = value
        .checked_powd(Decimal::ONE / degree)
        .filter(|seed| *seed > Decimal::ZERO)
        .unwrap_or(Decimal::ONE + (value - Decimal::ONE) / degree);

    let mut delta = Decimal::ZERO;
    for _ in 0..ROOT_MAX_ITERATIONS {
        let lower = checked_pow(x, u64::from(n - 1))?;
        let denominator = degree * lower;
        if denominator.is_zero() {
            break;
        }
        delta = (lower * x - value) / denominator;
        x -= delta;
        if delta.abs() < ROOT_EPSILON {
            return Ok(x);
        }
    }

    Err(PensionLoanError::ConvergenceFailure {
        function: format!("{n}-th root"),
        iterations: ROOT_MAX_ITERATIONS,
        last_delta: delta,
    })
}
