//! Life-insurance premium bands by borrower age.
//!
//! Costs are quoted per million of requested principal per month. A request
//! surcharge (extra premium) scales the matched band multiplicatively.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::PensionLoanError;
use crate::types::{Money, Rate};
use crate::PensionLoanResult;

/// Principal unit the band costs are quoted against.
pub const COST_UNIT: Decimal = dec!(1_000_000);

/// A contiguous, inclusive age range and its monthly cost per million.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgeBand {
    pub age_min: u32,
    pub age_max: u32,
    pub cost_per_million: Money,
}

impl AgeBand {
    pub fn contains(&self, age: u32) -> bool {
        self.age_min <= age && age <= self.age_max
    }
}

/// What to do with an age no band contains.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutOfBandPolicy {
    /// Use the nearest band: the first for young ages, the last for old ones.
    #[default]
    ClampToNearest,
    /// Use the first (lowest) band for every out-of-range age.
    FirstBand,
}

/// Where an age landed relative to the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BandPlacement {
    Within,
    ClampedBelow,
    ClampedAbove,
    FirstBandFallback,
}

/// Outcome of resolving an age against the table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandLookup {
    pub age: u32,
    pub band: AgeBand,
    pub placement: BandPlacement,
}

impl BandLookup {
    pub fn is_fallback(&self) -> bool {
        self.placement != BandPlacement::Within
    }
}

/// Raw, unvalidated shape of an [`InsuranceTable`].
#[derive(Debug, Clone, Deserialize)]
pub struct InsuranceTableSpec {
    pub bands: Vec<AgeBand>,
    #[serde(default)]
    pub out_of_band: OutOfBandPolicy,
}

/// Validated insurance table: sorted, gap-free, non-overlapping bands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "InsuranceTableSpec")]
pub struct InsuranceTable {
    bands: Vec<AgeBand>,
    out_of_band: OutOfBandPolicy,
}

impl InsuranceTable {
    pub fn new(bands: Vec<AgeBand>, out_of_band: OutOfBandPolicy) -> PensionLoanResult<Self> {
        if bands.is_empty() {
            return Err(PensionLoanError::InvalidInput {
                field: "insurance.bands".into(),
                reason: "At least one age band is required".into(),
            });
        }
        for (i, band) in bands.iter().enumerate() {
            if band.age_min > band.age_max {
                return Err(PensionLoanError::InvalidInput {
                    field: format!("insurance.bands[{i}]"),
                    reason: format!("age_min {} exceeds age_max {}", band.age_min, band.age_max),
                });
            }
            if band.cost_per_million < Decimal::ZERO {
                return Err(PensionLoanError::InvalidInput {
                    field: format!("insurance.bands[{i}].cost_per_million"),
                    reason: "Insurance cost cannot be negative".into(),
                });
            }
            if i > 0 && bands[i - 1].age_max.checked_add(1) != Some(band.age_min) {
                return Err(PensionLoanError::InvalidInput {
                    field: format!("insurance.bands[{i}].age_min"),
                    reason: format!(
                        "Band must start at {} to follow the previous band without gap or overlap",
                        bands[i - 1].age_max.saturating_add(1)
                    ),
                });
            }
        }
        Ok(Self { bands, out_of_band })
    }

    /// Age bands from the reference workbook.
    pub fn reference() -> Self {
        let bands = [
            (18, 75, dec!(1032)),
            (76, 78, dec!(5272)),
            (79, 81, dec!(8071)),
            (82, 84, dec!(13421)),
        ]
        .into_iter()
        .map(|(age_min, age_max, cost_per_million)| AgeBand {
            age_min,
            age_max,
            cost_per_million,
        })
        .collect();
        Self {
            bands,
            out_of_band: OutOfBandPolicy::ClampToNearest,
        }
    }

    /// Same bands, different boundary policy.
    pub fn with_policy(mut self, out_of_band: OutOfBandPolicy) -> Self {
        self.out_of_band = out_of_band;
        self
    }

    pub fn bands(&self) -> &[AgeBand] {
        &self.bands
    }

    pub fn out_of_band(&self) -> OutOfBandPolicy {
        self.out_of_band
    }

    /// Find the band for an age. Never fails: out-of-range ages follow the
    /// table's [`OutOfBandPolicy`].
    pub fn resolve(&self, age: u32) -> BandLookup {
        // bands is non-empty by construction
        let first = &self.bands[0];
        let last = &self.bands[self.bands.len() - 1];

        if let Some(band) = self.bands.iter().find(|b| b.contains(age)) {
            return BandLookup {
                age,
                band: band.clone(),
                placement: BandPlacement::Within,
            };
        }

        let (band, placement) = match self.out_of_band {
            OutOfBandPolicy::FirstBand => (first, BandPlacement::FirstBandFallback),
            OutOfBandPolicy::ClampToNearest if age > last.age_max => {
                (last, BandPlacement::ClampedAbove)
            }
            OutOfBandPolicy::ClampToNearest => (first, BandPlacement::ClampedBelow),
        };
        BandLookup {
            age,
            band: band.clone(),
            placement,
        }
    }

    /// Monthly cost per million of principal, including the surcharge:
    /// `band.cost * (1 + surcharge)`. Surcharges are extra premium, so a
    /// negative one is rejected.
    pub fn insurance_cost(&self, age: u32, surcharge: Rate) -> PensionLoanResult<Money> {
        if surcharge < Decimal::ZERO {
            return Err(PensionLoanError::InvalidInput {
                field: "insurance_surcharge".into(),
                reason: "Insurance surcharge cannot be negative".into(),
            });
        }
        let cost = self.resolve(age).band.cost_per_million;
        Decimal::ONE
            .checked_add(surcharge)
            .and_then(|factor| cost.checked_mul(factor))
            .ok_or_else(|| {
                PensionLoanError::FinancialImpossibility(format!(
                    "Insurance cost {cost} with surcharge {surcharge} overflows decimal range"
                ))
            })
    }
}

impl TryFrom<InsuranceTableSpec> for InsuranceTable {
    type Error = PensionLoanError;

    fn try_from(spec: InsuranceTableSpec) -> Result<Self, Self::Error> {
        InsuranceTable::new(spec.bands, spec.out_of_band)
    }
}

impl Default for InsuranceTable {
    fn default() -> Self {
        Self::reference()
    }
}
