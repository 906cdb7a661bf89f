mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;

use commands::liquidation::{LiquidateArgs, SolveArgs};

/// Pension-backed loan liquidation with spreadsheet parity
#[derive(Parser)]
#[command(
    name = "ploan",
    version,
    about = "Pension-backed loan liquidation with spreadsheet parity",
    long_about = "Liquidates pension-backed payroll loans exactly as the reference workbook \
                  does: capitalized grace interest, age-banded insurance and ROUND(PMT, 0). \
                  Also solves the requested amount for a target net installment."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Tariff tables file (JSON or YAML); defaults to the reference tables
    #[arg(long, global = true)]
    tables: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Installment for a requested amount
    Liquidate(LiquidateArgs),
    /// Requested amount for a target net installment
    Solve(SolveArgs),
    /// Liquidation with the period-by-period payment plan
    Schedule(LiquidateArgs),
    /// Print the active tariff tables
    Tables,
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    let tables = cli.tables.as_deref();

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Liquidate(args) => commands::liquidation::run_liquidate(args, tables),
        Commands::Solve(args) => commands::liquidation::run_solve(args, tables),
        Commands::Schedule(args) => commands::liquidation::run_schedule(args, tables),
        Commands::Tables => commands::tables::run_tables(tables),
        Commands::Version => {
            println!("ploan {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
