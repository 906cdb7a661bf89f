use rust_decimal::Decimal;
use thiserror::Error;

/// Failures of a liquidation or inverse solve.
///
/// Unknown tiers and out-of-band ages are not errors: they resolve through
/// the tariff fallbacks and surface as warnings on the output envelope.
#[derive(Debug, Error)]
pub enum PensionLoanError {
    /// A request or tariff field outside its domain (zero term, negative
    /// amount or surcharge, malformed table).
    #[error("Invalid input: {field} — {reason}")]
    InvalidInput { field: String, reason: String },

    /// An amount no decimal can hold, e.g. an absurd principal or surcharge.
    #[error("Financial impossibility: {0}")]
    FinancialImpossibility(String),

    /// Bracket expansion or a root iteration ran out of budget.
    #[error("{function} did not converge after {iterations} iterations (last delta {last_delta})")]
    ConvergenceFailure {
        function: String,
        iterations: u32,
        last_delta: Decimal,
    },

    /// A schedule due date fell outside the calendar range.
    #[error("Date out of range: {0}")]
    DateError(String),

    /// Request or tariff payload could not be (de)serialized.
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for PensionLoanError {
    fn from(e: serde_json::Error) -> Self {
        PensionLoanError::SerializationError(e.to_string())
    }
}
