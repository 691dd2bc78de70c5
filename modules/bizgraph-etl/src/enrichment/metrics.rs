//! Features derived from a batch of metrics rows before classification.

use bizgraph_sources::rows::{MetricsRow, AGE_BRACKETS};

use super::classify::{AgeBand, EducationTier};

/// Midpoint age of each 5-year bracket, 0-4 through 85+.
pub const AGE_MIDPOINTS: [f64; AGE_BRACKETS] = [
    2.5, 7.5, 12.5, 17.5, 22.5, 27.5, 32.5, 37.5, 42.5, 47.5, 52.5, 57.5, 62.5, 67.5, 72.5, 77.5,
    82.5, 87.5,
];

/// Min-max bounds over a batch. A batch with a single distinct value
/// normalizes everything to 0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinMax {
    pub min: f64,
    pub max: f64,
}

impl MinMax {
    /// Bounds over the finite values; `None` when there are none.
    pub fn over(values: impl IntoIterator<Item = f64>) -> Option<Self> {
        values
            .into_iter()
            .filter(|v| v.is_finite())
            .fold(None, |acc: Option<Self>, v| match acc {
                None => Some(Self { min: v, max: v }),
                Some(b) => Some(Self {
                    min: b.min.min(v),
                    max: b.max.max(v),
                }),
            })
    }

    pub fn normalize(&self, value: f64) -> f64 {
        let span = self.max - self.min;
        if span > 0.0 {
            (value - self.min) / span
        } else {
            0.0
        }
    }
}

/// Block-group key from tract and block-group codes: the tract as an integer
/// (leading zeros dropped) followed by the block-group code.
pub fn block_group_key(tractce: &str, blkgrpce: &str) -> Result<String, String> {
    let tract = tractce.trim();
    let tract = tract
        .parse::<u64>()
        .ok()
        .or_else(|| {
            tract
                .parse::<f64>()
                .ok()
                .filter(|t| t.is_finite() && *t >= 0.0 && t.fract() == 0.0)
                .map(|t| t as u64)
        })
        .ok_or_else(|| format!("tract code {tractce:?} is not an integer"))?;
    let group = blkgrpce.trim();
    if group.is_empty() {
        return Err("block group code is empty".to_string());
    }
    Ok(format!("{tract}{group}"))
}

pub fn fast_food_spend(row: &MetricsRow) -> f64 {
    row.fast_food.iter().sum()
}

/// Per-row features with batch-level normalization applied.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedMetrics {
    pub ct_block_group: String,
    pub total_population: f64,
    pub population_growth: f64,
    /// `None` when the block group has no population.
    pub average_age: Option<f64>,
    pub normalized_wealth: f64,
    pub crime_index: f64,
    pub normalized_spend: f64,
    pub age_bands: Vec<(AgeBand, f64)>,
    pub education: Vec<(EducationTier, f64)>,
}

fn age_band_totals(row: &MetricsRow) -> Vec<(AgeBand, f64)> {
    AgeBand::ALL
        .iter()
        .map(|band| {
            let total: f64 = band.brackets().map(|i| row.male[i] + row.female[i]).sum();
            (*band, total)
        })
        .collect()
}

fn education_totals(row: &MetricsRow) -> Vec<(EducationTier, f64)> {
    vec![
        (EducationTier::Basic, row.no_high_school + row.some_high_school),
        (
            EducationTier::Secondary,
            row.high_school_graduate + row.ged + row.some_college,
        ),
        (
            EducationTier::Higher,
            row.associate_degree + row.bachelor_degree + row.graduate_degree,
        ),
    ]
}

fn finite_inputs(row: &MetricsRow) -> bool {
    [
        row.total_population,
        row.population_growth,
        row.wealth_index,
        row.crime_index,
        row.no_high_school,
        row.some_high_school,
        row.high_school_graduate,
        row.ged,
        row.some_college,
        row.associate_degree,
        row.bachelor_degree,
        row.graduate_degree,
    ]
    .iter()
    .chain(row.male.iter())
    .chain(row.female.iter())
    .chain(row.fast_food.iter())
    .all(|v| v.is_finite())
}

/// Derive features for every row. Normalization bounds span the whole
/// batch. Rows that cannot be keyed or carry non-finite inputs come back
/// as errors, keyed by whatever identifies them.
pub fn derive(rows: &[MetricsRow]) -> Vec<(String, Result<DerivedMetrics, String>)> {
    let wealth = MinMax::over(rows.iter().map(|r| r.wealth_index));
    let spend = MinMax::over(rows.iter().map(fast_food_spend));

    rows.iter()
        .map(|row| {
            let key = block_group_key(&row.tractce, &row.blkgrpce);
            let label = key
                .clone()
                .unwrap_or_else(|_| format!("{}/{}", row.tractce, row.blkgrpce));
            let derived = key.and_then(|ct_block_group| {
                if !finite_inputs(row) {
                    return Err("metrics row has non-finite values".to_string());
                }
                let weighted: f64 = (0..AGE_BRACKETS)
                    .map(|i| (row.male[i] + row.female[i]) * AGE_MIDPOINTS[i])
                    .sum();
                let average_age =
                    (row.total_population > 0.0).then(|| weighted / row.total_population);
                Ok(DerivedMetrics {
                    ct_block_group,
                    total_population: row.total_population,
                    population_growth: row.population_growth,
                    average_age,
                    normalized_wealth: wealth.map_or(0.0, |b| b.normalize(row.wealth_index)),
                    crime_index: row.crime_index,
                    normalized_spend: spend.map_or(0.0, |b| b.normalize(fast_food_spend(row))),
                    age_bands: age_band_totals(row),
                    education: education_totals(row),
                })
            });
            (label, derived)
        })
        .collect()
}
