use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::info;

use crate::error::SourceError;
use crate::rows::{MetricsRow, ZipcodeRow, AGE_BRACKETS};
use crate::traits::{MetricsSource, ZipcodeSource};

fn file_error(path: &Path, e: impl std::fmt::Display) -> SourceError {
    SourceError::File {
        path: path.display().to_string(),
        message: e.to_string(),
    }
}

/// Zipcode boundary table (`ZIP`, `the_geom`).
pub struct ZipcodeCsv {
    path: PathBuf,
}

impl ZipcodeCsv {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

pub fn read_zipcodes(reader: impl Read, path: &Path) -> Result<Vec<ZipcodeRow>, SourceError> {
    let mut csv = csv::Reader::from_reader(reader);
    let mut rows = Vec::new();
    for (i, record) in csv.deserialize::<ZipcodeRow>().enumerate() {
        let mut row = record.map_err(|e| SourceError::Row {
            path: path.display().to_string(),
            row: i as u64 + 1,
            message: e.to_string(),
        })?;
        row.zip = row.zip.trim().to_string();
        row.geometry = row.geometry.filter(|g| !g.trim().is_empty());
        rows.push(row);
    }
    Ok(rows)
}

#[async_trait]
impl ZipcodeSource for ZipcodeCsv {
    async fn zipcodes(&self) -> Result<Vec<ZipcodeRow>, SourceError> {
        let file = std::fs::File::open(&self.path).map_err(|e| file_error(&self.path, e))?;
        let rows = read_zipcodes(file, &self.path)?;
        info!(count = rows.len(), path = %self.path.display(), "Read zipcode rows");
        Ok(rows)
    }
}

/// Block-group metrics table, located by column name.
pub struct MetricsCsv {
    path: PathBuf,
}

impl MetricsCsv {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

const AGE_STARTS: [u32; AGE_BRACKETS] = [
    0, 5, 10, 15, 20, 25, 30, 35, 40, 45, 50, 55, 60, 65, 70, 75, 80, 85,
];

struct Columns(HashMap<String, usize>);

impl Columns {
    fn index(&self, name: &str) -> Result<usize, String> {
        self.0
            .get(name)
            .copied()
            .ok_or_else(|| format!("missing column {name}"))
    }
}

pub fn read_metrics(reader: impl Read, path: &Path) -> Result<Vec<MetricsRow>, SourceError> {
    let mut csv = csv::Reader::from_reader(reader);
    let headers = csv.headers().map_err(|e| file_error(path, e))?;
    let columns = Columns(
        headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.trim().to_string(), i))
            .collect(),
    );

    let mut rows = Vec::new();
    for (i, record) in csv.records().enumerate() {
        let row_error = |message: String| SourceError::Row {
            path: path.display().to_string(),
            row: i as u64 + 1,
            message,
        };
        let record = record.map_err(|e| row_error(e.to_string()))?;

        let text = |name: &str| -> Result<String, String> {
            let idx = columns.index(name)?;
            Ok(record.get(idx).unwrap_or_default().trim().to_string())
        };
        let number = |name: &str| -> Result<f64, String> {
            let raw = text(name)?;
            raw.parse::<f64>()
                .map_err(|_| format!("column {name}: {raw:?} is not a number"))
        };
        let brackets = |prefix: &str| -> Result<[f64; AGE_BRACKETS], String> {
            let mut out = [0.0; AGE_BRACKETS];
            for (slot, start) in out.iter_mut().zip(AGE_STARTS) {
                *slot = number(&format!("{prefix}{start}"))?;
            }
            Ok(out)
        };

        let parsed = (|| -> Result<MetricsRow, String> {
            Ok(MetricsRow {
                tractce: text("tractce")?,
                blkgrpce: text("blkgrpce")?,
                total_population: number("totpop_cy")?,
                population_growth: number("popgrwcyfy")?,
                male: brackets("male")?,
                female: brackets("fem")?,
                wealth_index: number("wlthindxcy")?,
                crime_index: number("crmcytotc")?,
                fast_food: [number("x1133_a")?, number("x1138_a")?, number("x1148_a")?],
                no_high_school: number("nohs_cy")?,
                some_high_school: number("somehs_cy")?,
                high_school_graduate: number("hsgrad_cy")?,
                ged: number("ged_cy")?,
                some_college: number("smcoll_cy")?,
                associate_degree: number("asscdeg_cy")?,
                bachelor_degree: number("bachdeg_cy")?,
                graduate_degree: number("graddeg_cy")?,
            })
        })();
        rows.push(parsed.map_err(row_error)?);
    }
    Ok(rows)
}

#[async_trait]
impl MetricsSource for MetricsCsv {
    async fn metrics(&self) -> Result<Vec<MetricsRow>, SourceError> {
        let file = std::fs::File::open(&self.path).map_err(|e| file_error(&self.path, e))?;
        let rows = read_metrics(file, &self.path)?;
        info!(count = rows.len(), path = %self.path.display(), "Read metrics rows");
        Ok(rows)
    }
}
