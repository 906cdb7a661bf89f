//! Monthly rate → annual effective rate → daily rate → grace-period factor.
//!
//! Each step is rounded exactly where the workbook rounds it. The rounded
//! annual rate (6 dp), not the raw one, feeds the daily rate.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::PensionLoanError;
use crate::rounding::{checked_pow, nth_root, round_excel, round_intermediate, ANNUAL_RATE_DP};
use crate::types::Rate;
use crate::PensionLoanResult;

pub const MONTHS_PER_YEAR: u32 = 12;
/// Commercial year used for the daily rate.
pub const DAYS_PER_YEAR: u32 = 360;

/// Every rate the liquidation derives from a monthly tier rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedRates {
    pub monthly_rate: Rate,
    pub annual_effective_rate: Rate,
    pub daily_rate: Rate,
    /// Interest per unit of principal accrued over the grace window.
    pub grace_interest_factor: Rate,
}

/// `ROUND((1 + monthly)^12 - 1; 6)`
pub fn annual_effective_rate(monthly_rate: Rate) -> PensionLoanResult<Rate> {
    let compounded = checked_pow(Decimal::ONE + monthly_rate, u64::from(MONTHS_PER_YEAR))?;
    Ok(round_excel(compounded - Decimal::ONE, ANNUAL_RATE_DP))
}

/// `ROUND((1 + annual)^(1/360) - 1; 15)`
pub fn daily_rate(annual_effective_rate: Rate) -> PensionLoanResult<Rate> {
    let base = Decimal::ONE + annual_effective_rate;
    if base <= Decimal::ZERO {
        return Err(PensionLoanError::InvalidInput {
            field: "annual_effective_rate".into(),
            reason: "Annual effective rate must be greater than -100%".into(),
        });
    }
    let root = nth_root(base, DAYS_PER_YEAR)?;
    Ok(round_intermediate(root - Decimal::ONE))
}

/// `ROUND((1 + daily)^days; 15) - 1`
///
/// The power is rounded before 1 is subtracted.
pub fn grace_interest_factor(daily_rate: Rate, grace_days: u32) -> PensionLoanResult<Rate> {
    let growth = checked_pow(Decimal::ONE + daily_rate, u64::from(grace_days))?;
    Ok(round_intermediate(growth) - Decimal::ONE)
}

/// Run the full derivation chain for a monthly rate and grace window.
pub fn derive_rates(monthly_rate: Rate, grace_days: u32) -> PensionLoanResult<DerivedRates> {
    let annual = annual_effective_rate(monthly_rate)?;
    let daily = daily_rate(annual)?;
    let grace = grace_interest_factor(daily, grace_days)?;
    Ok(DerivedRates {
        monthly_rate,
        annual_effective_rate: annual,
        daily_rate: daily,
        grace_interest_factor: grace,
    })
}
