//! Inverse liquidation: target net installment → requested amount.
//!
//! `P ↦ net_installment(P)` is monotone non-decreasing but piecewise constant
//! (the installment is rounded to whole units), so the principal is found by
//! bracket expansion followed by bisection. Both loops are bounded by
//! [`SolverConfig`].

use log::{debug, warn};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use super::forward::{validate_surcharge, PricingTerms};
use super::{InverseInput, InverseSolution};
use crate::error::PensionLoanError;
use crate::rounding::{round_excel, round_money};
use crate::tariff::TariffTables;
use crate::time_value::present_value_from_installment;
use crate::types::{with_metadata, ComputationOutput, Money};
use crate::PensionLoanResult;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Iteration budgets and tolerance for the inverse solve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// First upper bound tried before doubling.
    pub initial_high: Money,
    /// Doublings allowed while looking for an upper bound.
    pub max_doublings: u32,
    /// Bisection steps allowed once the target is bracketed.
    pub max_iterations: u32,
    /// Accepted |net_installment(mid) - target|, in monetary units.
    pub tolerance: Money,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            initial_high: Decimal::ONE,
            max_doublings: 80,
            max_iterations: 120,
            tolerance: dec!(0.5),
        }
    }
}

impl SolverConfig {
    pub fn validate(&self) -> PensionLoanResult<()> {
        if self.initial_high <= Decimal::ZERO {
            return Err(PensionLoanError::InvalidInput {
                field: "initial_high".into(),
                reason: "Initial upper bound must be positive".into(),
            });
        }
        if self.max_iterations == 0 {
            return Err(PensionLoanError::InvalidInput {
                field: "max_iterations".into(),
                reason: "At least one bisection step is required".into(),
            });
        }
        if self.tolerance < Decimal::ZERO {
            return Err(PensionLoanError::InvalidInput {
                field: "tolerance".into(),
                reason: "Tolerance cannot be negative".into(),
            });
        }
        Ok(())
    }
}

/// Whether bisection met the tolerance inside its budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolverStatus {
    Converged,
    /// Budget exhausted; the closest midpoint seen was returned.
    Approximate,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Find the requested amount whose net installment matches the target.
///
/// The returned liquidation is recomputed forward from the rounded principal,
/// so its `net_installment` is what the borrower would actually be billed.
pub fn solve_principal(
    input: &InverseInput,
    tables: &TariffTables,
    config: &SolverConfig,
) -> PensionLoanResult<ComputationOutput<InverseSolution>> {
    let start = Instant::now();

    validate_inverse_input(input)?;
    config.validate()?;

    let terms = PricingTerms::resolve(
        tables,
        input.rate_tier,
        input.age,
        input.term_months,
        input.grace_days,
        input.insurance_surcharge,
    )?;
    let mut warnings = terms.warnings();
    let target = input.target_net_installment;

    let (high, bracket_doublings) = expand_bracket(&terms, target, config)?;
    let search = bisect(&terms, target, high, config)?;

    if search.status == SolverStatus::Approximate {
        warn!(
            "inverse solve stopped after {} iterations, gap {}",
            search.iterations, search.gap
        );
        warnings.push(format!(
            "Solver did not reach tolerance {} within {} iterations; result is approximate (gap {})",
            config.tolerance,
            config.max_iterations,
            round_excel(search.gap, 6)
        ));
    }

    let principal = round_money(search.midpoint);
    let breakdown = terms.breakdown(principal)?;
    let liquidation = terms.liquidation(&breakdown, true);
    let annuity_present_value = present_value_from_installment(
        terms.rates.monthly_rate,
        terms.term_months,
        breakdown.installment,
    )?;

    debug!(
        "inverse target={} principal={} recomputed net={} pv={}",
        target, principal, breakdown.net_installment, annuity_present_value
    );

    let solution = InverseSolution {
        requested_amount: principal,
        target_net_installment: round_money(target),
        status: search.status,
        bracket_doublings,
        iterations: search.iterations,
        final_gap: search.gap,
        annuity_present_value,
        term_months: input.term_months,
        liquidation,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Inverse pension loan liquidation — bracket doubling and bisection on net installment",
        &serde_json::json!({
            "age": input.age,
            "term_months": input.term_months,
            "target_net_installment": target.to_string(),
            "rate_tier": terms.rate.tier,
            "grace_days": input.grace_days,
            "insurance_surcharge": input.insurance_surcharge.to_string(),
            "initial_high": config.initial_high.to_string(),
            "max_doublings": config.max_doublings,
            "max_iterations": config.max_iterations,
            "tolerance": config.tolerance.to_string(),
        }),
        warnings,
        elapsed,
        solution,
    ))
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate_inverse_input(input: &InverseInput) -> PensionLoanResult<()> {
    if input.term_months == 0 {
        return Err(PensionLoanError::InvalidInput {
            field: "term_months".into(),
            reason: "Term must be at least one month".into(),
        });
    }
    if input.target_net_installment <= Decimal::ZERO {
        return Err(PensionLoanError::InvalidInput {
            field: "target_net_installment".into(),
            reason: "Target net installment must be positive".into(),
        });
    }
    validate_surcharge(input.insurance_surcharge)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

struct BisectionOutcome {
    midpoint: Money,
    gap: Money,
    iterations: u32,
    status: SolverStatus,
}

/// Double `high` until it reaches the target. Returns the bound and the
/// number of doublings taken.
fn expand_bracket(
    terms: &PricingTerms,
    target: Money,
    config: &SolverConfig,
) -> PensionLoanResult<(Money, u32)> {
    let mut high = config.initial_high;
    let mut doublings = 0u32;

    loop {
        let net = terms.net_installment(high)?;
        if net >= target {
            debug!("bracket found: high={} net={} after {} doublings", high, net, doublings);
            return Ok((high, doublings));
        }
        if doublings >= config.max_doublings {
            return Err(PensionLoanError::ConvergenceFailure {
                function: "inverse bracket expansion".into(),
                iterations: doublings,
                last_delta: target - net,
            });
        }
        high = high.checked_mul(dec!(2)).ok_or_else(|| {
            PensionLoanError::FinancialImpossibility(format!(
                "Upper bound overflows while bracketing target {target}"
            ))
        })?;
        doublings += 1;
    }
}

fn bisect(
    terms: &PricingTerms,
    target: Money,
    high: Money,
    config: &SolverConfig,
) -> PensionLoanResult<BisectionOutcome> {
    let mut low = Decimal::ZERO;
    let mut high = high;
    let mut best: Option<(Money, Money)> = None;

    for iter in 1..=config.max_iterations {
        let mid = (low + high) / dec!(2);
        let net = terms.net_installment(mid)?;
        let gap = (net - target).abs();

        if gap <= config.tolerance {
            debug!("bisection converged: mid={} gap={} iterations={}", mid, gap, iter);
            return Ok(BisectionOutcome {
                midpoint: mid,
                gap,
                iterations: iter,
                status: SolverStatus::Converged,
            });
        }
        if best.map_or(true, |(_, g)| gap < g) {
            best = Some((mid, gap));
        }

        if net < target {
            low = mid;
        } else {
            high = mid;
        }
    }

    // max_iterations >= 1 is validated, so at least one midpoint was seen.
    let (midpoint, gap) = best.unwrap_or((high, Decimal::MAX));
    Ok(BisectionOutcome {
        midpoint,
        gap,
        iterations: config.max_iterations,
        status: SolverStatus::Approximate,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tariff::{AgeBand, InsuranceTable, OutOfBandPolicy, RateRow, RateTable};

    fn solve(target: Money) -> ComputationOutput<InverseSolution> {
        let input = InverseInput::new(75, 156, target).with_rate_tier(6);
        solve_principal(&input, &TariffTables::default(), &SolverConfig::default()).unwrap()
    }

    #[test]
    fn test_reference_target_recovers_principal() {
        let out = solve(dec!(263785));
        let s = &out.result;
        assert_eq!(s.requested_amount, dec!(15_000_000));
        assert_eq!(s.status, SolverStatus::Converged);
        assert_eq!(s.liquidation.net_installment, dec!(263785));
        assert_eq!(s.liquidation.installment, dec!(248305));
        assert_eq!(s.bracket_doublings, 24);
        assert!(s.iterations <= 120);
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn test_round_trip_other_principals() {
        for (target, principal) in [
            (dec!(17586), dec!(1_000_000)),
            (dec!(87928), dec!(5_000_000)),
            (dec!(879283), dec!(50_000_000)),
        ] {
            let s = solve(target).result;
            assert_eq!(s.requested_amount, principal, "target {target}");
            assert_eq!(s.liquidation.net_installment, target);
        }
    }

    #[test]
    fn test_off_grid_target_lands_within_one_unit() {
        let s = solve(dec!(100_000)).result;
        assert_eq!(s.requested_amount, dec!(5686464));
        assert!((s.liquidation.net_installment - dec!(100_000)).abs() <= Decimal::ONE);
    }

    #[test]
    fn test_audit_trail_reflects_recomputed_principal() {
        let s = solve(dec!(263785)).result;
        let audit = s.liquidation.audit.expect("inverse always attaches the audit");
        assert_eq!(audit.requested_amount, s.requested_amount);
        assert_eq!(audit.financed_principal, dec!(15234479.72738622));
        assert_eq!(s.liquidation.financed_principal, dec!(15234480));
        assert_eq!(s.annuity_present_value, dec!(15234494));
    }

    #[test]
    fn test_bracket_budget_exhausted() {
        let input = InverseInput::new(75, 156, dec!(263785)).with_rate_tier(6);
        let config = SolverConfig {
            max_doublings: 3,
            ..SolverConfig::default()
        };
        match solve_principal(&input, &TariffTables::default(), &config) {
            Err(PensionLoanError::ConvergenceFailure {
                function,
                iterations,
                last_delta,
            }) => {
                assert_eq!(function, "inverse bracket expansion");
                assert_eq!(iterations, 3);
                assert!(last_delta > Decimal::ZERO);
            }
            other => panic!("expected ConvergenceFailure, got {other:?}"),
        }
    }

    #[test]
    fn test_iteration_budget_flags_approximate() {
        let input = InverseInput::new(75, 156, dec!(263785)).with_rate_tier(6);
        let config = SolverConfig {
            max_iterations: 1,
            ..SolverConfig::default()
        };
        let out = solve_principal(&input, &TariffTables::default(), &config).unwrap();
        assert_eq!(out.result.status, SolverStatus::Approximate);
        assert_eq!(out.result.iterations, 1);
        // 2^24 brackets the target; the only midpoint tried is 2^23.
        assert_eq!(out.result.requested_amount, dec!(8388608));
        assert!(out.warnings.iter().any(|w| w.contains("approximate")));
    }

    #[test]
    fn test_non_positive_target_rejected() {
        for target in [Decimal::ZERO, dec!(-10)] {
            let input = InverseInput::new(75, 156, target);
            match solve_principal(&input, &TariffTables::default(), &SolverConfig::default()) {
                Err(PensionLoanError::InvalidInput { field, .. }) => {
                    assert_eq!(field, "target_net_installment")
                }
                other => panic!("expected InvalidInput, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_negative_surcharge_rejected() {
        let mut input = InverseInput::new(75, 156, dec!(263785)).with_rate_tier(6);
        input.insurance_surcharge = dec!(-3);
        match solve_principal(&input, &TariffTables::default(), &SolverConfig::default()) {
            Err(PensionLoanError::InvalidInput { field, .. }) => {
                assert_eq!(field, "insurance_surcharge")
            }
            other => panic!("expected InvalidInput, got {other:?}"),
        }
    }

    #[test]
    fn test_overflowing_surcharge_is_error() {
        let mut input = InverseInput::new(75, 156, dec!(263785)).with_rate_tier(6);
        input.insurance_surcharge = Decimal::MAX;
        assert!(matches!(
            solve_principal(&input, &TariffTables::default(), &SolverConfig::default()),
            Err(PensionLoanError::FinancialImpossibility(_))
        ));
    }

    #[test]
    fn test_zero_term_rejected() {
        let input = InverseInput::new(75, 0, dec!(100_000));
        assert!(solve_principal(&input, &TariffTables::default(), &SolverConfig::default()).is_err());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let input = InverseInput::new(75, 156, dec!(263785));
        let config = SolverConfig {
            initial_high: Decimal::ZERO,
            ..SolverConfig::default()
        };
        assert!(solve_principal(&input, &TariffTables::default(), &config).is_err());
    }

    #[test]
    fn test_zero_rate_tables() {
        let tables = TariffTables::new(
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
        );
        let input = InverseInput::new(40, 12, dec!(100_000));
        let out = solve_principal(&input, &tables, &SolverConfig::default()).unwrap();
        let s = &out.result;
        assert_eq!(s.status, SolverStatus::Converged);
        assert_eq!(s.liquidation.net_installment, dec!(100_000));
        assert!((s.requested_amount - dec!(1_200_000)).abs() <= dec!(6));
        assert_eq!(s.annuity_present_value, dec!(1_200_000));
    }

    #[test]
    fn test_target_is_echoed_rounded() {
        let s = solve(dec!(263785.4)).result;
        assert_eq!(s.target_net_installment, dec!(263785));
    }
}
