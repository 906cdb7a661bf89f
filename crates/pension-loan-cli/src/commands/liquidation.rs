use chrono::NaiveDate;
use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use pension_loan_core::liquidation::{
    self, InverseInput, LoanParameters, SolverConfig, DEFAULT_GRACE_DAYS,
};

use crate::input;

/// Arguments for the forward liquidation
#[derive(Args)]
pub struct LiquidateArgs {
    /// Path to JSON request file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Borrower age in whole years
    #[arg(long, alias = "edad")]
    pub age: Option<u32>,

    /// Number of monthly installments
    #[arg(long, alias = "plazo")]
    pub term_months: Option<u32>,

    /// Requested amount before capitalization
    #[arg(long, alias = "monto")]
    pub amount: Option<Decimal>,

    /// Rate tier index (unknown tiers use the table default)
    #[arg(long)]
    pub rate_tier: Option<u32>,

    /// Days between disbursement and first amortization
    #[arg(long)]
    pub grace_days: Option<u32>,

    /// Insurance surcharge as a decimal (0.25 = +25%)
    #[arg(long)]
    pub surcharge: Option<Decimal>,

    /// Disbursement date (YYYY-MM-DD); schedule rows get due dates
    #[arg(long)]
    pub disbursement_date: Option<NaiveDate>,

    /// Attach unrounded intermediate amounts
    #[arg(long)]
    pub audit: bool,
}

/// Arguments for the inverse solve
#[derive(Args)]
pub struct SolveArgs {
    /// Path to JSON request file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Borrower age in whole years
    #[arg(long, alias = "edad")]
    pub age: Option<u32>,

    /// Number of monthly installments
    #[arg(long, alias = "plazo")]
    pub term_months: Option<u32>,

    /// Net installment to match (installment plus insurance)
    #[arg(long, alias = "cuota")]
    pub target: Option<Decimal>,

    /// Rate tier index (unknown tiers use the table default)
    #[arg(long)]
    pub rate_tier: Option<u32>,

    /// Days between disbursement and first amortization
    #[arg(long)]
    pub grace_days: Option<u32>,

    /// Insurance surcharge as a decimal (0.25 = +25%)
    #[arg(long)]
    pub surcharge: Option<Decimal>,

    /// First upper bound tried before doubling
    #[arg(long)]
    pub initial_high: Option<Decimal>,

    /// Doublings allowed while bracketing the target
    #[arg(long)]
    pub max_doublings: Option<u32>,

    /// Bisection steps allowed
    #[arg(long)]
    pub max_iterations: Option<u32>,

    /// Accepted gap between recomputed and target net installment
    #[arg(long)]
    pub tolerance: Option<Decimal>,
}

pub fn run_liquidate(
    args: LiquidateArgs,
    tables: Option<&str>,
) -> Result<Value, Box<dyn std::error::Error>> {
    let params = loan_parameters(args)?;
    let tables = input::file::read_tables(tables)?;
    let result = liquidation::liquidate(&params, &tables)?;
    Ok(serde_json::to_value(result)?)
}

/// Forward liquidation with the payment plan attached.
pub fn run_schedule(
    args: LiquidateArgs,
    tables: Option<&str>,
) -> Result<Value, Box<dyn std::error::Error>> {
    let mut params = loan_parameters(args)?;
    params.include_schedule = true;
    let tables = input::file::read_tables(tables)?;
    let result = liquidation::liquidate(&params, &tables)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_solve(args: SolveArgs, tables: Option<&str>) -> Result<Value, Box<dyn std::error::Error>> {
    let config = solver_config(&args);

    let request: InverseInput = if let Some(ref path) = args.input {
        input::file::read_json(path)?
    } else if let Some(request) = input::stdin::read_stdin()? {
        request
    } else {
        InverseInput {
            age: args.age.ok_or("--age is required (or provide --input)")?,
            rate_tier: args.rate_tier,
            term_months: args
                .term_months
                .ok_or("--term-months is required (or provide --input)")?,
            target_net_installment: args
                .target
                .ok_or("--target is required (or provide --input)")?,
            grace_days: args.grace_days.unwrap_or(DEFAULT_GRACE_DAYS),
            insurance_surcharge: args.surcharge.unwrap_or(Decimal::ZERO),
        }
    };

    let tables = input::file::read_tables(tables)?;
    let result = liquidation::solve_principal(&request, &tables, &config)?;
    Ok(serde_json::to_value(result)?)
}

/// Budget flags override the matching `SolverConfig` defaults.
fn solver_config(args: &SolveArgs) -> SolverConfig {
    let defaults = SolverConfig::default();
    SolverConfig {
        initial_high: args.initial_high.unwrap_or(defaults.initial_high),
        max_doublings: args.max_doublings.unwrap_or(defaults.max_doublings),
        max_iterations: args.max_iterations.unwrap_or(defaults.max_iterations),
        tolerance: args.tolerance.unwrap_or(defaults.tolerance),
    }
}

fn loan_parameters(args: LiquidateArgs) -> Result<LoanParameters, Box<dyn std::error::Error>> {
    let mut params: LoanParameters = if let Some(ref path) = args.input {
        input::file::read_json(path)?
    } else if let Some(request) = input::stdin::read_stdin()? {
        request
    } else {
        let mut params = LoanParameters::new(
            args.age.ok_or("--age is required (or provide --input)")?,
            args.term_months
                .ok_or("--term-months is required (or provide --input)")?,
            args.amount.ok_or("--amount is required (or provide --input)")?,
        );
        params.rate_tier = args.rate_tier;
        params.grace_days = args.grace_days.unwrap_or(DEFAULT_GRACE_DAYS);
        params.insurance_surcharge = args.surcharge.unwrap_or(Decimal::ZERO);
        params.disbursement_date = args.disbursement_date;
        params
    };
    params.audit |= args.audit;
    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct SolveCli {
        #[command(flatten)]
        args: SolveArgs,
    }

    fn parse(flags: &[&str]) -> SolveArgs {
        let argv = std::iter::once("solve").chain(flags.iter().copied());
        SolveCli::try_parse_from(argv).unwrap().args
    }

    #[test]
    fn test_solver_flags_override_every_budget() {
        let config = solver_config(&parse(&[
            "--initial-high",
            "1000",
            "--max-doublings",
            "10",
            "--max-iterations",
            "30",
            "--tolerance",
            "0.25",
        ]));
        assert_eq!(
            config,
            SolverConfig {
                initial_high: Decimal::from(1000),
                max_doublings: 10,
                max_iterations: 30,
                tolerance: Decimal::new(25, 2),
            }
        );
    }

    #[test]
    fn test_solver_defaults_without_flags() {
        assert_eq!(solver_config(&parse(&[])), SolverConfig::default());
    }
}
