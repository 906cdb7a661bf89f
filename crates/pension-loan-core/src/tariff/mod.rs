pub mod insurance;
pub mod rates;

use serde::{Deserialize, Serialize};

use crate::PensionLoanResult;

pub use insurance::{AgeBand, BandLookup, BandPlacement, InsuranceTable, OutOfBandPolicy};
pub use rates::{RateLookup, RateRow, RateTable};

/// Read-only tariff configuration shared by every liquidation.
///
/// Tables are validated on construction and never mutated afterwards, so a
/// single instance can be shared across threads without locking.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TariffTables {
    pub rates: RateTable,
    pub insurance: InsuranceTable,
}

impl TariffTables {
    pub fn new(rates: RateTable, insurance: InsuranceTable) -> Self {
        Self { rates, insurance }
    }

    /// Load tables from a JSON document.
    pub fn from_json(json: &str) -> PensionLoanResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    #[test]
    fn test_default_is_reference_workbook() {
        let tables = TariffTables::default();
        assert_eq!(tables.rates.monthly_rate(None), dec!(0.0146));
        assert_eq!(tables.insurance.insurance_cost(75, Decimal::ZERO).unwrap(), dec!(1032));
    }

    #[test]
    fn test_json_round_trip_of_reference_tables() {
        let tables = TariffTables::default();
        let json = serde_json::to_string(&tables).unwrap();
        let restored = TariffTables::from_json(&json).unwrap();
        assert_eq!(restored, tables);
    }

    #[test]
    fn test_from_json_rejects_invalid_tables() {
        let json = r#"{
            "rates": {"rows": [{"tier": 1, "monthly_rate": "0.01"}], "default_tier": 9},
            "insurance": {"bands": [{"age_min": 18, "age_max": 99, "cost_per_million": "0"}]}
        }"#;
        assert!(TariffTables::from_json(json).is_err());
    }
}
