//! Pension-backed loan liquidation: the forward engine (amount → installment),
//! its bisection inverse (installment → amount) and the payment plan.
//!
//! Field names accept the workbook's historical aliases (`edad`,
//! `plazo_meses`, `monto_solicitado`, ...) so request payloads can be passed
//! through unchanged.

pub mod forward;
pub mod inverse;
pub mod rates;
pub mod schedule;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{Money, Rate};

pub use forward::{liquidate, InstallmentBreakdown, PricingTerms};
pub use inverse::{solve_principal, SolverConfig, SolverStatus};
pub use rates::DerivedRates;
pub use schedule::{build_schedule, AmortizationSchedule, InstallmentRow, ScheduleInput};

pub const DEFAULT_GRACE_DAYS: u32 = 30;

fn default_grace_days() -> u32 {
    DEFAULT_GRACE_DAYS
}

// ---------------------------------------------------------------------------
// Input Types
// ---------------------------------------------------------------------------

/// Borrower income and payroll deductions. Carried for reporting only; the
/// liquidation never reads these figures.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IncomeProfile {
    #[serde(default, alias = "ingresos_totales", skip_serializing_if = "Option::is_none")]
    pub total_income: Option<Money>,
    #[serde(default, alias = "salud", skip_serializing_if = "Option::is_none")]
    pub health_contribution: Option<Money>,
    #[serde(default, alias = "pension_aporte", skip_serializing_if = "Option::is_none")]
    pub pension_contribution: Option<Money>,
    #[serde(default, alias = "retencion_fuente", skip_serializing_if = "Option::is_none")]
    pub withholding_tax: Option<Money>,
    #[serde(default, alias = "fondo_solidaridad", skip_serializing_if = "Option::is_none")]
    pub solidarity_fund: Option<Money>,
    #[serde(default, alias = "deducciones_totales", skip_serializing_if = "Option::is_none")]
    pub total_deductions: Option<Money>,
    /// Installment of any debt being bought out by this loan.
    #[serde(default, alias = "cuota_compra_cartera", skip_serializing_if = "Option::is_none")]
    pub portfolio_purchase_installment: Option<Money>,
    /// Legal monthly minimum wage in force.
    #[serde(default, alias = "smmlv", skip_serializing_if = "Option::is_none")]
    pub minimum_wage: Option<Money>,
    #[serde(default, alias = "codigo_pagaduria", skip_serializing_if = "Option::is_none")]
    pub payer_code: Option<u32>,
}

/// Request for the forward liquidation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanParameters {
    /// Borrower age in whole years.
    #[serde(alias = "edad")]
    pub age: u32,
    /// Number of monthly installments.
    #[serde(alias = "plazo_meses", alias = "plazo")]
    pub term_months: u32,
    /// Principal requested by the borrower, before capitalization.
    #[serde(alias = "monto_solicitado", alias = "monto")]
    pub requested_amount: Money,
    /// Rate tier index; absent or unknown tiers use the table default.
    #[serde(default, alias = "indice_tasa", skip_serializing_if = "Option::is_none")]
    pub rate_tier: Option<u32>,
    /// Days between disbursement and the start of amortization.
    #[serde(default = "default_grace_days", alias = "dias_gracia")]
    pub grace_days: u32,
    /// Extra premium applied multiplicatively to the band cost (0.25 = +25%).
    #[serde(default, alias = "extraprima_seguro", alias = "extraprima")]
    pub insurance_surcharge: Rate,
    /// Attach the period-by-period payment plan.
    #[serde(default)]
    pub include_schedule: bool,
    /// Attach unrounded intermediate amounts.
    #[serde(default)]
    pub audit: bool,
    /// When set, schedule rows carry due dates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disbursement_date: Option<NaiveDate>,
    #[serde(flatten)]
    pub income: IncomeProfile,
}

impl LoanParameters {
    /// Minimal request: everything optional takes its documented default.
    pub fn new(age: u32, term_months: u32, requested_amount: Money) -> Self {
        Self {
            age,
            term_months,
            requested_amount,
            rate_tier: None,
            grace_days: DEFAULT_GRACE_DAYS,
            insurance_surcharge: Decimal::ZERO,
            include_schedule: false,
            audit: false,
            disbursement_date: None,
            income: IncomeProfile::default(),
        }
    }

    pub fn with_rate_tier(mut self, tier: u32) -> Self {
        self.rate_tier = Some(tier);
        self
    }
}

/// Request for the inverse solve: which principal yields this net installment?
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InverseInput {
    #[serde(alias = "edad")]
    pub age: u32,
    #[serde(default, alias = "indice_tasa", skip_serializing_if = "Option::is_none")]
    pub rate_tier: Option<u32>,
    #[serde(alias = "plazo_meses", alias = "plazo")]
    pub term_months: u32,
    /// Net installment (financial installment plus insurance) to match.
    #[serde(alias = "cuota_neta", alias = "cuota")]
    pub target_net_installment: Money,
    #[serde(default = "default_grace_days", alias = "dias_gracia")]
    pub grace_days: u32,
    #[serde(default, alias = "extraprima_seguro", alias = "extraprima")]
    pub insurance_surcharge: Rate,
}

impl InverseInput {
    pub fn new(age: u32, term_months: u32, target_net_installment: Money) -> Self {
        Self {
            age,
            rate_tier: None,
            term_months,
            target_net_installment,
            grace_days: DEFAULT_GRACE_DAYS,
            insurance_surcharge: Decimal::ZERO,
        }
    }

    pub fn with_rate_tier(mut self, tier: u32) -> Self {
        self.rate_tier = Some(tier);
        self
    }
}

// ---------------------------------------------------------------------------
// Output Types
// ---------------------------------------------------------------------------

/// Result of a liquidation. Monetary totals are rounded to whole units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Liquidation {
    /// Financial-only installment, `ROUND(PMT(...); 0)`.
    pub installment: Money,
    /// Installment plus the monthly insurance premium.
    pub net_installment: Money,
    /// Tier whose rate was applied.
    pub rate_tier: u32,
    pub monthly_rate: Rate,
    pub annual_effective_rate: Rate,
    pub daily_rate: Rate,
    pub grace_interest_factor: Rate,
    /// Monthly insurance cost per million of principal, surcharge included.
    pub insurance_per_million: Money,
    pub capitalized_interest: Money,
    pub first_month_insurance: Money,
    pub amount_to_capitalize: Money,
    pub financed_principal: Money,
    pub schedule: Vec<InstallmentRow>,
    /// Balance left after the last scheduled row; rounding drift, not debt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule_residual_balance: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audit: Option<LiquidationAudit>,
}

/// Unrounded intermediate amounts, for reconciliation against the workbook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquidationAudit {
    pub requested_amount: Money,
    pub capitalized_interest: Money,
    pub first_month_insurance: Money,
    pub amount_to_capitalize: Money,
    pub financed_principal: Money,
    /// PMT before the final rounding to whole units.
    pub annuity_payment: Money,
    pub net_installment: Money,
}

/// Result of the inverse solve. The flattened liquidation is the forward
/// recomputation from the rounded principal, not the bisection midpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InverseSolution {
    /// Principal that forward-produces the target, rounded to whole units.
    pub requested_amount: Money,
    pub target_net_installment: Money,
    pub status: SolverStatus,
    pub bracket_doublings: u32,
    pub iterations: u32,
    /// |net_installment(midpoint) - target| at the accepted midpoint.
    pub final_gap: Money,
    /// Closed-form present value of the recomputed financial installment.
    pub annuity_present_value: Money,
    pub term_months: u32,
    #[serde(flatten)]
    pub liquidation: Liquidation,
}
