use rust_decimal::Decimal;

use crate::error::PensionLoanError;
use crate::rounding::{checked_pow, round_intermediate, round_money};
use crate::types::{Money, Rate};
use crate::PensionLoanResult;

/// Level annuity payment before the final `ROUND(...; 0)`.
///
/// `PV * r * (1+r)^n / ((1+r)^n - 1)` with `r` and `(1+r)^n` each rounded to
/// 15 places before they are combined. Falls back to `PV / n` when the
/// rounded rate is zero or the denominator collapses.
pub fn annuity_payment(rate: Rate, nper: u32, present_value: Money) -> PensionLoanResult<Money> {
    if nper == 0 {
        return Err(PensionLoanError::InvalidInput {
            field: "nper".into(),
            reason: "Number of periods must be > 0".into(),
        });
    }

    let periods = Decimal::from(nper);
    let rate15 = round_intermediate(rate);
    if rate15.is_zero() {
        return Ok(present_value / periods);
    }

    let one_plus_r = round_intermediate(Decimal::ONE + rate15);
    let factor = round_intermediate(checked_pow(one_plus_r, u64::from(nper))?);
    let denominator = factor - Decimal::ONE;
    if denominator.is_zero() {
        return Ok(present_value / periods);
    }

    let numerator = present_value
        .checked_mul(rate15)
        .and_then(|v| v.checked_mul(factor))
        .ok_or_else(|| {
            PensionLoanError::FinancialImpossibility(format!(
                "PMT numerator overflows for present value {present_value}"
            ))
        })?;

    Ok(numerator / denominator)
}

/// Payment (PMT) as the workbook bills it: `ROUND(PMT(r; n; -PV); 0)`.
pub fn pmt_excel(rate: Rate, nper: u32, present_value: Money) -> PensionLoanResult<Money> {
    Ok(round_money(annuity_payment(rate, nper, present_value)?))
}

/// Present value that a financial installment amortizes: the closed-form
/// inverse of [`pmt_excel`], `inst * (1 - (1+r)^-n) / r`, rounded to 0 dp.
///
/// `(1+r)^-n` is rounded to 15 places. Since the forward payment is rounded
/// to whole units, this is only exact to within one installment's rounding.
pub fn present_value_from_installment(
    rate: Rate,
    nper: u32,
    installment: Money,
) -> PensionLoanResult<Money> {
    if nper == 0 {
        return Err(PensionLoanError::InvalidInput {
            field: "nper".into(),
            reason: "Number of periods must be > 0".into(),
        });
    }

    let periods = Decimal::from(nper);
    let rate15 = round_intermediate(rate);
    if rate15.is_zero() {
        return Ok(round_money(installment * periods));
    }

    let one_plus_r = round_intermediate(Decimal::ONE + rate15);
    let growth = checked_pow(one_plus_r, u64::from(nper))?;
    if growth.is_zero() {
        return Err(PensionLoanError::FinancialImpossibility(
            "Discount factor underflows to zero".into(),
        ));
    }
    let discount = round_intermediate(Decimal::ONE / growth);
    let annuity_factor = (Decimal::ONE - discount) / rate15;

    Ok(round_money(installment * annuity_factor))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_pmt_excel_reference_loan() {
        let result = pmt_excel(dec!(0.0146), 156, dec!(15234479.72738622)).unwrap();
        assert_eq!(result, dec!(248305));
    }

    #[test]
    fn test_annuity_payment_unrounded() {
        let result = annuity_payment(dec!(0.0146), 12, dec!(1_000_000)).unwrap();
        assert!((result - dec!(91451.70938549926)).abs() < dec!(0.000001));
        assert_eq!(pmt_excel(dec!(0.0146), 12, dec!(1_000_000)).unwrap(), dec!(91452));
    }

    #[test]
    fn test_pmt_zero_rate_is_linear() {
        let result = pmt_excel(Decimal::ZERO, 12, dec!(1_200_000)).unwrap();
        assert_eq!(result, dec!(100_000));
    }

    #[test]
    fn test_pmt_rate_below_intermediate_precision_is_linear() {
        // rounds to 0 at 15 places
        let result = annuity_payment(dec!(0.0000000000000001), 4, dec!(1000)).unwrap();
        assert_eq!(result, dec!(250));
    }

    #[test]
    fn test_pmt_zero_periods_rejected() {
        assert!(pmt_excel(dec!(0.0146), 0, dec!(1000)).is_err());
        assert!(present_value_from_installment(dec!(0.0146), 0, dec!(1000)).is_err());
    }

    #[test]
    fn test_present_value_from_installment_reference_loan() {
        let pv = present_value_from_installment(dec!(0.0146), 156, dec!(248305)).unwrap();
        assert_eq!(pv, dec!(15234494));
        // within one installment rounding of the financed principal
        assert!((pv - dec!(15234479.72738622)).abs() < dec!(100));
    }

    #[test]
    fn test_present_value_zero_rate() {
        let pv = present_value_from_installment(Decimal::ZERO, 24, dec!(50_000)).unwrap();
        assert_eq!(pv, dec!(1_200_000));
    }
}
