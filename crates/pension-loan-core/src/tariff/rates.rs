//! Monthly rate tiers.
//!
//! Unknown or missing tier indices never fail: they resolve to the table's
//! default tier and the lookup records that a fallback happened.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::PensionLoanError;
use crate::types::Rate;
use crate::PensionLoanResult;

/// Tier used when a request names no tier or an unknown one.
pub const REFERENCE_DEFAULT_TIER: u32 = 6;

/// A tier index to monthly rate mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateRow {
    pub tier: u32,
    /// Monthly rate as a decimal (0.0146 = 1.46%).
    pub monthly_rate: Rate,
}

/// Raw, unvalidated shape of a [`RateTable`] as it appears in config files.
#[derive(Debug, Clone, Deserialize)]
pub struct RateTableSpec {
    pub rows: Vec<RateRow>,
    pub default_tier: u32,
}

/// Validated rate table. Construct with [`RateTable::new`] or deserialize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RateTableSpec")]
pub struct RateTable {
    rows: Vec<RateRow>,
    default_tier: u32,
}

/// Outcome of resolving a tier index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLookup {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested_tier: Option<u32>,
    /// Tier whose rate was applied.
    pub tier: u32,
    pub monthly_rate: Rate,
    /// True when the requested tier was absent or unknown.
    pub fallback: bool,
}

impl RateTable {
    pub fn new(rows: Vec<RateRow>, default_tier: u32) -> PensionLoanResult<Self> {
        if rows.is_empty() {
            return Err(PensionLoanError::InvalidInput {
                field: "rates.rows".into(),
                reason: "At least one rate tier is required".into(),
            });
        }
        for (i, row) in rows.iter().enumerate() {
            if row.monthly_rate <= dec!(-1) {
                return Err(PensionLoanError::InvalidInput {
                    field: format!("rates.rows[{i}].monthly_rate"),
                    reason: "Monthly rate must be greater than -100%".into(),
                });
            }
            if rows[..i].iter().any(|prev| prev.tier == row.tier) {
                return Err(PensionLoanError::InvalidInput {
                    field: format!("rates.rows[{i}].tier"),
                    reason: format!("Tier {} is listed more than once", row.tier),
                });
            }
        }
        if !rows.iter().any(|row| row.tier == default_tier) {
            return Err(PensionLoanError::InvalidInput {
                field: "rates.default_tier".into(),
                reason: format!("Default tier {default_tier} is not in the table"),
            });
        }
        Ok(Self { rows, default_tier })
    }

    /// Maximum pensioner rates from the reference workbook.
    pub fn reference() -> Self {
        let rows = [
            (1, dec!(0.0179)),
            (2, dec!(0.0173)),
            (3, dec!(0.0182)),
            (4, dec!(0.0176)),
            (5, dec!(0.0160)),
            (6, dec!(0.0146)),
        ]
        .into_iter()
        .map(|(tier, monthly_rate)| RateRow { tier, monthly_rate })
        .collect();
        Self {
            rows,
            default_tier: REFERENCE_DEFAULT_TIER,
        }
    }

    pub fn rows(&self) -> &[RateRow] {
        &self.rows
    }

    pub fn default_tier(&self) -> u32 {
        self.default_tier
    }

    /// Resolve a tier index, falling back to the default tier.
    pub fn resolve(&self, tier: Option<u32>) -> RateLookup {
        let found = tier.and_then(|t| self.rows.iter().find(|row| row.tier == t));
        match found {
            Some(row) => RateLookup {
                requested_tier: tier,
                tier: row.tier,
                monthly_rate: row.monthly_rate,
                fallback: false,
            },
            None => RateLookup {
                requested_tier: tier,
                tier: self.default_tier,
                monthly_rate: self.default_rate(),
                fallback: true,
            },
        }
    }

    /// Monthly rate for a tier. Never fails.
    pub fn monthly_rate(&self, tier: Option<u32>) -> Rate {
        self.resolve(tier).monthly_rate
    }

    fn default_rate(&self) -> Rate {
        self.rows
            .iter()
            .find(|row| row.tier == self.default_tier)
            .map(|row| row.monthly_rate)
            .unwrap_or(Decimal::ZERO)
    }
}

impl TryFrom<RateTableSpec> for RateTable {
    type Error = PensionLoanError;

    fn try_from(spec: RateTableSpec) -> Result<Self, Self::Error> {
        RateTable::new(spec.rows, spec.default_tier)
    }
}

impl Default for RateTable {
    fn default() -> Self {
        Self::reference()
    }
}
