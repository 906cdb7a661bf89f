pub mod error;
pub mod rounding;
pub mod tariff;
pub mod time_value;
pub mod types;

#[cfg(feature = "liquidation")]
pub mod liquidation;

pub use error::PensionLoanError;
pub use types::*;

/// Standard result type for all pension-loan operations
pub type PensionLoanResult<T> = Result<T, PensionLoanError>;
