use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Amounts in the loan currency (whole pesos once billed). Plain alias over
/// `Decimal`; the name only documents intent.
pub type Money = Decimal;

/// Per-period rates as fractions (0.0146 = 1.46% per month), never percents.
pub type Rate = Decimal;

/// Envelope every liquidation entry point returns: the result plus the
/// fallbacks that were applied to reach it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationOutput<T: Serialize> {
    pub result: T,
    /// One-line description of the method applied.
    pub methodology: String,
    /// Echo of the resolved request: tier, band, grace days, solver budgets.
    pub assumptions: serde_json::Value,
    /// Unknown tiers, clamped ages, zero rates, approximate solves.
    pub warnings: Vec<String>,
    pub metadata: ComputationMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationMetadata {
    /// Crate version that produced the figures.
    pub version: String,
    pub computation_time_us: u64,
    pub precision: String,
}

/// Wrap a result in the envelope, stamping version and precision.
pub fn with_metadata<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    elapsed_us: u64,
    result: T,
) -> ComputationOutput<T> {
    ComputationOutput {
        result,
        methodology: methodology.to_string(),
        assumptions: serde_json::to_value(assumptions).unwrap_or_default(),
        warnings,
        metadata: ComputationMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            computation_time_us: elapsed_us,
            precision: "rust_decimal_128bit".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_metadata_stamps_envelope() {
        let out = with_metadata(
            "test",
            &serde_json::json!({"tier": 6}),
            vec!["fallback".into()],
            42,
            1u32,
        );
        assert_eq!(out.result, 1);
        assert_eq!(out.assumptions["tier"], 6);
        assert_eq!(out.warnings, vec!["fallback".to_string()]);
        assert_eq!(out.metadata.computation_time_us, 42);
        assert_eq!(out.metadata.version, env!("CARGO_PKG_VERSION"));
    }
}
