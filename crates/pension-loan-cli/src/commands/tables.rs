use serde_json::{json, Value};

use crate::input;

/// Show the tariff tables a run would use.
pub fn run_tables(tables: Option<&str>) -> Result<Value, Box<dyn std::error::Error>> {
    let tables = input::file::read_tables(tables)?;

    Ok(json!({
        "result": {
            "default_tier": tables.rates.default_tier(),
            "out_of_band": tables.insurance.out_of_band(),
            "rates": tables.rates.rows(),
            "insurance_bands": tables.insurance.bands(),
        },
        "warnings": [],
    }))
}
