//! Period-by-period payment plan.
//!
//! The builder amortizes with the level installment it is given and never
//! forces the last row to close. Whatever balance remains is reported as
//! `residual_balance`. The amortizing installment may differ from the billed
//! one: the liquidation amortizes with the unrounded annuity payment and bills
//! the rounded installment.

use chrono::{Months, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::PensionLoanError;
use crate::types::{Money, Rate};
use crate::PensionLoanResult;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleInput {
    pub financed_principal: Money,
    pub monthly_rate: Rate,
    /// Level installment the balance is amortized with (interest + principal).
    pub installment: Money,
    /// Financial installment actually billed each period.
    pub billed_installment: Money,
    /// Insurance premium billed every period on top of the installment.
    pub monthly_insurance: Money,
    pub term_months: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_due_date: Option<NaiveDate>,
}

/// One period of the plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstallmentRow {
    /// 1-based period index.
    pub period: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    pub opening_balance: Money,
    pub principal: Money,
    pub interest: Money,
    pub insurance: Money,
    /// Billed installment plus insurance.
    pub total_payment: Money,
    pub remaining_balance: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmortizationSchedule {
    pub rows: Vec<InstallmentRow>,
    /// Balance after the last row. Non-zero when the installment was rounded.
    pub residual_balance: Money,
    pub total_principal: Money,
    pub total_interest: Money,
    pub total_insurance: Money,
    pub total_paid: Money,
}

/// Build the plan in one pass.
pub fn build_schedule(input: &ScheduleInput) -> PensionLoanResult<AmortizationSchedule> {
    if input.term_months == 0 {
        return Err(PensionLoanError::InvalidInput {
            field: "term_months".into(),
            reason: "Term must be at least one month".into(),
        });
    }
    if input.financed_principal < Decimal::ZERO {
        return Err(PensionLoanError::InvalidInput {
            field: "financed_principal".into(),
            reason: "Financed principal cannot be negative".into(),
        });
    }

    let mut rows = Vec::with_capacity(input.term_months as usize);
    let mut balance = input.financed_principal;
    let total_payment = input.billed_installment + input.monthly_insurance;

    for period in 1..=input.term_months {
        let opening_balance = balance;
        let interest = opening_balance * input.monthly_rate;
        let principal = input.installment - interest;
        balance = opening_balance - principal;

        rows.push(InstallmentRow {
            period,
            due_date: due_date(input.first_due_date, period)?,
            opening_balance,
            principal,
            interest,
            insurance: input.monthly_insurance,
            total_payment,
            remaining_balance: balance,
        });
    }

    let total_principal: Money = rows.iter().map(|r| r.principal).sum();
    let total_interest: Money = rows.iter().map(|r| r.interest).sum();
    let total_insurance = input.monthly_insurance * Decimal::from(input.term_months);
    let total_paid = total_payment * Decimal::from(input.term_months);

    Ok(AmortizationSchedule {
        rows,
        residual_balance: balance,
        total_principal,
        total_interest,
        total_insurance,
        total_paid,
    })
}

fn due_date(first: Option<NaiveDate>, period: u32) -> PensionLoanResult<Option<NaiveDate>> {
    let Some(first) = first else {
        return Ok(None);
    };
    first
        .checked_add_months(Months::new(period - 1))
        .map(Some)
        .ok_or_else(|| {
            PensionLoanError::DateError(format!("Due date for period {period} is out of range"))
        })
}
