//! Forward liquidation: requested amount → installment.
//!
//! The constants a request depends on (tier rate, derived rates, insurance
//! band) are resolved once into [`PricingTerms`]; the per-principal part is
//! [`PricingTerms::breakdown`], which the inverse solver evaluates repeatedly.

use chrono::{Days, NaiveDate};
use log::{debug, warn};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use super::rates::{derive_rates, DerivedRates};
use super::schedule::{build_schedule, AmortizationSchedule, ScheduleInput};
use super::{Liquidation, LiquidationAudit, LoanParameters};
use crate::error::PensionLoanError;
use crate::rounding::{round_excel, round_intermediate, round_money};
use crate::tariff::insurance::COST_UNIT;
use crate::tariff::{BandLookup, BandPlacement, RateLookup, TariffTables};
use crate::time_value::annuity_payment;
use crate::types::{with_metadata, ComputationOutput, Money, Rate};
use crate::PensionLoanResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Everything about a loan that does not depend on the principal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingTerms {
    pub rate: RateLookup,
    pub band: BandLookup,
    pub rates: DerivedRates,
    pub term_months: u32,
    pub grace_days: u32,
    pub insurance_surcharge: Rate,
    /// Band cost scaled by the surcharge.
    pub insurance_per_million: Money,
}

/// Exact (unrounded) amounts for one principal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstallmentBreakdown {
    pub principal: Money,
    pub capitalized_interest: Money,
    pub first_month_insurance: Money,
    pub amount_to_capitalize: Money,
    pub financed_principal: Money,
    pub annuity_payment: Money,
    /// `ROUND(annuity_payment; 0)`
    pub installment: Money,
    /// `installment + first_month_insurance`
    pub net_installment: Money,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Liquidate a loan the way the reference workbook does.
pub fn liquidate(
    input: &LoanParameters,
    tables: &TariffTables,
) -> PensionLoanResult<ComputationOutput<Liquidation>> {
    let start = Instant::now();

    validate_loan_parameters(input)?;

    let terms = PricingTerms::resolve(
        tables,
        input.rate_tier,
        input.age,
        input.term_months,
        input.grace_days,
        input.insurance_surcharge,
    )?;
    let mut warnings = terms.warnings();

    let breakdown = terms.breakdown(input.requested_amount)?;
    let mut liquidation = terms.liquidation(&breakdown, input.audit);

    if input.include_schedule {
        let first_due_date = match input.disbursement_date {
            Some(date) => Some(first_due_date(date, input.grace_days)?),
            None => None,
        };
        let plan = terms.schedule(&breakdown, first_due_date)?;
        let residual = round_excel(plan.residual_balance, 2);
        if !residual.is_zero() {
            warnings.push(format!(
                "Payment plan leaves a residual balance of {residual}"
            ));
        }
        liquidation.schedule_residual_balance = Some(plan.residual_balance);
        liquidation.schedule = plan.rows;
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Pension loan liquidation — capitalized grace interest, banded insurance, ROUND(PMT, 0)",
        &serde_json::json!({
            "age": input.age,
            "term_months": input.term_months,
            "requested_amount": input.requested_amount.to_string(),
            "rate_tier": terms.rate.tier,
            "grace_days": input.grace_days,
            "insurance_surcharge": input.insurance_surcharge.to_string(),
            "insurance_band": terms.band.band,
            "income": input.income,
        }),
        warnings,
        elapsed,
        liquidation,
    ))
}

impl PricingTerms {
    /// Resolve tier rate, derived rates and insurance band. Unknown tiers and
    /// out-of-band ages resolve through the tables' fallbacks.
    pub fn resolve(
        tables: &TariffTables,
        rate_tier: Option<u32>,
        age: u32,
        term_months: u32,
        grace_days: u32,
        insurance_surcharge: Rate,
    ) -> PensionLoanResult<Self> {
        if term_months == 0 {
            return Err(PensionLoanError::InvalidInput {
                field: "term_months".into(),
                reason: "Term must be at least one month".into(),
            });
        }

        let rate = tables.rates.resolve(rate_tier);
        let rates = derive_rates(rate.monthly_rate, grace_days)?;
        let band = tables.insurance.resolve(age);
        let insurance_per_million = tables.insurance.insurance_cost(age, insurance_surcharge)?;

        if rate.fallback {
            warn!(
                "rate tier {:?} not found, using default tier {}",
                rate.requested_tier, rate.tier
            );
        }
        if band.is_fallback() {
            warn!(
                "age {} outside insurance bands ({:?}), using {}-{}",
                age, band.placement, band.band.age_min, band.band.age_max
            );
        }

        Ok(Self {
            rate,
            band,
            rates,
            term_months,
            grace_days,
            insurance_surcharge,
            insurance_per_million,
        })
    }

    /// Insurance premium per unit of principal per month.
    pub fn insurance_per_unit(&self) -> Rate {
        self.insurance_per_million / COST_UNIT
    }

    /// Forward computation for one principal, in workbook order.
    pub fn breakdown(&self, principal: Money) -> PensionLoanResult<InstallmentBreakdown> {
        let capitalized_interest = principal
            .checked_mul(self.rates.grace_interest_factor)
            .ok_or_else(|| overflow("capitalized interest", principal))?;
        let first_month_insurance = principal
            .checked_mul(self.insurance_per_unit())
            .ok_or_else(|| overflow("first month insurance", principal))?;
        let amount_to_capitalize = capitalized_interest
            .checked_add(first_month_insurance)
            .ok_or_else(|| overflow("amount to capitalize", principal))?;
        let financed_principal = principal
            .checked_add(amount_to_capitalize)
            .ok_or_else(|| overflow("financed principal", principal))?;

        let annuity = annuity_payment(self.rates.monthly_rate, self.term_months, financed_principal)?;
        let installment = round_money(annuity);
        let net_installment = installment
            .checked_add(first_month_insurance)
            .ok_or_else(|| overflow("net installment", principal))?;

        Ok(InstallmentBreakdown {
            principal,
            capitalized_interest,
            first_month_insurance,
            amount_to_capitalize,
            financed_principal,
            annuity_payment: annuity,
            installment,
            net_installment,
        })
    }

    /// Unrounded net installment for a principal.
    pub fn net_installment(&self, principal: Money) -> PensionLoanResult<Money> {
        Ok(self.breakdown(principal)?.net_installment)
    }

    /// Fallback decisions worth surfacing to the caller.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.rate.fallback {
            let requested = self
                .rate
                .requested_tier
                .map(|t| t.to_string())
                .unwrap_or_else(|| "none".into());
            warnings.push(format!(
                "Rate tier {requested} not found; using default tier {} ({})",
                self.rate.tier, self.rate.monthly_rate
            ));
        }
        match self.band.placement {
            BandPlacement::Within => {}
            BandPlacement::ClampedAbove | BandPlacement::ClampedBelow => {
                warnings.push(format!(
                    "Age {} is outside the insurance bands; clamped to band {}-{} ({} per million)",
                    self.band.age,
                    self.band.band.age_min,
                    self.band.band.age_max,
                    self.band.band.cost_per_million
                ));
            }
            BandPlacement::FirstBandFallback => {
                warnings.push(format!(
                    "Age {} is outside the insurance bands; using first band {}-{} ({} per million)",
                    self.band.age,
                    self.band.band.age_min,
                    self.band.band.age_max,
                    self.band.band.cost_per_million
                ));
            }
        }
        if round_intermediate(self.rates.monthly_rate).is_zero() {
            warnings.push("Monthly rate is zero; installment is financed principal / term".into());
        }
        warnings
    }

    /// Assemble the rounded result from a breakdown.
    pub(crate) fn liquidation(&self, b: &InstallmentBreakdown, include_audit: bool) -> Liquidation {
        debug!(
            "liquidation principal={} financed={} installment={} net={}",
            b.principal, b.financed_principal, b.installment, b.net_installment
        );
        Liquidation {
            installment: b.installment,
            net_installment: round_money(b.net_installment),
            rate_tier: self.rate.tier,
            monthly_rate: self.rates.monthly_rate,
            annual_effective_rate: self.rates.annual_effective_rate,
            daily_rate: self.rates.daily_rate,
            grace_interest_factor: self.rates.grace_interest_factor,
            insurance_per_million: self.insurance_per_million,
            capitalized_interest: round_money(b.capitalized_interest),
            first_month_insurance: round_money(b.first_month_insurance),
            amount_to_capitalize: round_money(b.amount_to_capitalize),
            financed_principal: round_money(b.financed_principal),
            schedule: Vec::new(),
            schedule_residual_balance: None,
            audit: include_audit.then(|| LiquidationAudit {
                requested_amount: b.principal,
                capitalized_interest: b.capitalized_interest,
                first_month_insurance: b.first_month_insurance,
                amount_to_capitalize: b.amount_to_capitalize,
                financed_principal: b.financed_principal,
                annuity_payment: b.annuity_payment,
                net_installment: b.net_installment,
            }),
        }
    }

    /// Payment plan for a breakdown. Rows amortize with the unrounded annuity
    /// payment so the balance closes; `total_payment` is what is billed.
    pub fn schedule(
        &self,
        b: &InstallmentBreakdown,
        first_due_date: Option<NaiveDate>,
    ) -> PensionLoanResult<AmortizationSchedule> {
        build_schedule(&ScheduleInput {
            financed_principal: b.financed_principal,
            monthly_rate: round_intermediate(self.rates.monthly_rate),
            installment: b.annuity_payment,
            billed_installment: b.installment,
            monthly_insurance: b.first_month_insurance,
            term_months: self.term_months,
            first_due_date,
        })
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Surcharges are extra premium on top of the band cost.
pub(crate) fn validate_surcharge(surcharge: Rate) -> PensionLoanResult<()> {
    if surcharge < Decimal::ZERO {
        return Err(PensionLoanError::InvalidInput {
            field: "insurance_surcharge".into(),
            reason: "Insurance surcharge cannot be negative".into(),
        });
    }
    Ok(())
}

fn validate_loan_parameters(input: &LoanParameters) -> PensionLoanResult<()> {
    if input.term_months == 0 {
        return Err(PensionLoanError::InvalidInput {
            field: "term_months".into(),
            reason: "Term must be at least one month".into(),
        });
    }
    if input.requested_amount < Decimal::ZERO {
        return Err(PensionLoanError::InvalidInput {
            field: "requested_amount".into(),
            reason: "Requested amount cannot be negative".into(),
        });
    }
    validate_surcharge(input.insurance_surcharge)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn first_due_date(disbursement: NaiveDate, grace_days: u32) -> PensionLoanResult<NaiveDate> {
    disbursement
        .checked_add_days(Days::new(u64::from(grace_days)))
        .ok_or_else(|| {
            PensionLoanError::DateError(format!(
                "{disbursement} plus {grace_days} grace days is out of range"
            ))
        })
}

fn overflow(what: &str, principal: Money) -> PensionLoanError {
    PensionLoanError::FinancialImpossibility(format!(
        "{what} overflows decimal range for principal {principal}"
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tariff::{AgeBand, InsuranceTable, OutOfBandPolicy, RateRow, RateTable};
    use rust_decimal_macros::dec;

    /// Reference workbook case: age 75, 156 months, 15M, tier 6.
    fn reference_loan() -> LoanParameters {
        LoanParameters::new(75, 156, dec!(15_000_000)).with_rate_tier(6)
    }

    fn zero_rate_tables() -> TariffTables {
        TariffTables::new(
            RateTable::new(
                vec![RateRow {
                    tier: 1,
                    monthly_rate: Decimal::ZERO,
                }],
                1,
            )
            .unwrap(),
            InsuranceTable::new(
                vec![AgeBand {
                    age_min: 18,
                    age_max: 99,
                    cost_per_million: Decimal::ZERO,
                }],
                OutOfBandPolicy::ClampToNearest,
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_reference_loan_net_installment() {
        let result = liquidate(&reference_loan(), &TariffTables::default()).unwrap();
        let l = &result.result;
        assert_eq!(l.installment, dec!(248305));
        assert_eq!(l.net_installment, dec!(263785));
    }

    #[test]
    fn test_reference_loan_intermediates() {
        let result = liquidate(&reference_loan(), &TariffTables::default()).unwrap();
        let l = &result.result;
        assert_eq!(l.monthly_rate, dec!(0.0146));
        assert_eq!(l.annual_effective_rate, dec!(0.189976));
        assert_eq!(l.daily_rate, dec!(0.000483264342529));
        assert_eq!(l.grace_interest_factor, dec!(0.014599981825748));
        assert_eq!(l.insurance_per_million, dec!(1032));
        assert_eq!(l.capitalized_interest, dec!(219000));
        assert_eq!(l.first_month_insurance, dec!(15480));
        assert_eq!(l.amount_to_capitalize, dec!(234480));
        assert_eq!(l.financed_principal, dec!(15234480));
        assert!(l.schedule.is_empty());
        assert!(l.audit.is_none());
    }

    #[test]
    fn test_audit_fields_are_unrounded() {
        let mut input = reference_loan();
        input.audit = true;
        let result = liquidate(&input, &TariffTables::default()).unwrap();
        let audit = result.result.audit.unwrap();
        assert_eq!(audit.capitalized_interest, dec!(218999.72738622));
        assert_eq!(audit.financed_principal, dec!(15234479.72738622));
        assert_eq!(audit.net_installment, dec!(263785));
        assert!((audit.annuity_payment - dec!(248304.77155868632)).abs() < dec!(0.000001));
    }

    #[test]
    fn test_net_installment_is_installment_plus_insurance() {
        let input = LoanParameters::new(77, 60, dec!(8_000_000)).with_rate_tier(2);
        let result = liquidate(&input, &TariffTables::default()).unwrap();
        let l = &result.result;
        // 8M * 5272 / 1M = 42176
        assert_eq!(l.first_month_insurance, dec!(42176));
        assert_eq!(l.net_installment, l.installment + dec!(42176));
    }

    #[test]
    fn test_unknown_tier_uses_default_and_warns() {
        let input = LoanParameters::new(75, 156, dec!(15_000_000)).with_rate_tier(99);
        let result = liquidate(&input, &TariffTables::default()).unwrap();
        assert_eq!(result.result.rate_tier, 6);
        assert_eq!(result.result.net_installment, dec!(263785));
        assert!(result.warnings.iter().any(|w| w.contains("Rate tier 99")));
    }

    #[test]
    fn test_age_above_bands_is_clamped() {
        let input = LoanParameters::new(85, 24, dec!(2_000_000)).with_rate_tier(6);
        let result = liquidate(&input, &TariffTables::default()).unwrap();
        assert_eq!(result.result.insurance_per_million, dec!(13421));
        assert!(result.warnings.iter().any(|w| w.contains("Age 85")));
    }

    #[test]
    fn test_surcharge_raises_insurance() {
        let mut input = reference_loan();
        input.insurance_surcharge = dec!(0.5);
        let result = liquidate(&input, &TariffTables::default()).unwrap();
        assert_eq!(result.result.insurance_per_million, dec!(1548));
        assert_eq!(result.result.first_month_insurance, dec!(23220));
    }

    #[test]
    fn test_zero_rate_installment_is_linear() {
        let input = LoanParameters::new(40, 12, dec!(1_200_000)).with_rate_tier(1);
        let result = liquidate(&input, &zero_rate_tables()).unwrap();
        let l = &result.result;
        assert_eq!(l.financed_principal, dec!(1_200_000));
        assert_eq!(l.installment, dec!(100_000));
        assert_eq!(l.net_installment, dec!(100_000));
        assert!(result.warnings.iter().any(|w| w.contains("Monthly rate is zero")));
    }

    #[test]
    fn test_zero_principal_is_valid() {
        let input = LoanParameters::new(60, 12, Decimal::ZERO);
        let result = liquidate(&input, &TariffTables::default()).unwrap();
        assert_eq!(result.result.installment, Decimal::ZERO);
        assert_eq!(result.result.net_installment, Decimal::ZERO);
    }

    #[test]
    fn test_zero_term_rejected() {
        let input = LoanParameters::new(60, 0, dec!(1_000_000));
        match liquidate(&input, &TariffTables::default()) {
            Err(PensionLoanError::InvalidInput { field, .. }) => assert_eq!(field, "term_months"),
            other => panic!("expected InvalidInput, got {other:?}"),
        }
    }

    #[test]
    fn test_negative_principal_rejected() {
        let input = LoanParameters::new(60, 12, dec!(-1));
        assert!(liquidate(&input, &TariffTables::default()).is_err());
    }

    #[test]
    fn test_schedule_attached_on_request() {
        let mut input = reference_loan();
        input.include_schedule = true;
        input.disbursement_date = NaiveDate::from_ymd_opt(2025, 1, 15);
        let result = liquidate(&input, &TariffTables::default()).unwrap();
        let l = &result.result;
        assert_eq!(l.schedule.len(), 156);
        assert_eq!(l.schedule[0].due_date, NaiveDate::from_ymd_opt(2025, 2, 14));
        assert_eq!(l.schedule[1].due_date, NaiveDate::from_ymd_opt(2025, 3, 14));
        assert!(l.schedule_residual_balance.is_some());
    }

    #[test]
    fn test_returned_schedule_closes_and_bills_rounded_installment() {
        let mut input = reference_loan();
        input.include_schedule = true;
        let result = liquidate(&input, &TariffTables::default()).unwrap();
        let l = &result.result;
        let residual = l.schedule_residual_balance.unwrap();
        assert!(residual.abs() < dec!(1), "residual {residual}");
        assert!(l.schedule.iter().all(|r| r.total_payment == dec!(263785)));
        assert!(!result.warnings.iter().any(|w| w.contains("residual")));
    }

    #[test]
    fn test_negative_surcharge_rejected() {
        let mut input = reference_loan();
        input.insurance_surcharge = dec!(-3);
        match liquidate(&input, &TariffTables::default()) {
            Err(PensionLoanError::InvalidInput { field, .. }) => {
                assert_eq!(field, "insurance_surcharge")
            }
            other => panic!("expected InvalidInput, got {other:?}"),
        }
    }

    #[test]
    fn test_overflowing_surcharge_is_error_not_panic() {
        let mut input = reference_loan();
        input.insurance_surcharge = Decimal::MAX;
        assert!(matches!(
            liquidate(&input, &TariffTables::default()),
            Err(PensionLoanError::FinancialImpossibility(_))
        ));
    }

    #[test]
    fn test_large_surcharge_overflow_in_breakdown_is_error() {
        let mut input = LoanParameters::new(75, 156, dec!(1_000_000_000_000_000_000));
        input.insurance_surcharge = dec!(1_000_000_000_000_000);
        assert!(matches!(
            liquidate(&input, &TariffTables::default()),
            Err(PensionLoanError::FinancialImpossibility(_))
        ));
    }

    #[test]
    fn test_breakdown_monotone_in_principal() {
        let terms = PricingTerms::resolve(
            &TariffTables::default(),
            Some(6),
            75,
            156,
            30,
            Decimal::ZERO,
        )
        .unwrap();
        let mut previous = Decimal::MIN;
        let mut principal = Decimal::ZERO;
        while principal <= dec!(20_000_000) {
            let net = terms.net_installment(principal).unwrap();
            assert!(net >= previous, "net installment fell at principal {principal}");
            previous = net;
            principal += dec!(250_013);
        }
    }

    #[test]
    fn test_metadata_populated() {
        let result = liquidate(&reference_loan(), &TariffTables::default()).unwrap();
        assert!(result.methodology.contains("liquidation"));
        assert_eq!(result.metadata.precision, "rust_decimal_128bit");
        assert!(result.warnings.is_empty());
    }
}
