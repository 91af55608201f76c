use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Label shown for the aggregate-average series.
pub const AGGREGATE_LABEL: &str = "All countries";

/// Identifies which rows a series was built from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeriesLabel {
    Country(String),
    Aggregate,
}

impl SeriesLabel {
    /// Parses a user selection; the aggregate label matches case-insensitively.
    pub fn parse(selection: &str) -> Self {
        let trimmed = selection.trim();
        if trimmed.eq_ignore_ascii_case(AGGREGATE_LABEL) || trimmed.eq_ignore_ascii_case("all") {
            SeriesLabel::Aggregate
        } else {
            SeriesLabel::Country(trimmed.to_string())
        }
    }
}

impl fmt::Display for SeriesLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeriesLabel::Country(name) => write!(f, "{}", name),
            SeriesLabel::Aggregate => write!(f, "{}", AGGREGATE_LABEL),
        }
    }
}

/// One yearly data point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub year: i32,
    pub value: f64,
}

impl Observation {
    pub fn new(year: i32, value: f64) -> Self {
        Self { year, value }
    }
}

/// Year-ordered observations for one country or the aggregate.
///
/// A `Series` always holds at least one observation, no two observations
/// share a year, and every value is finite and non-negative. Years need not
/// be contiguous.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    label: SeriesLabel,
    observations: Vec<Observation>,
}

impl Series {
    pub fn new(label: SeriesLabel, mut observations: Vec<Observation>) -> ForecastResult<Self> {
        if observations.is_empty() {
            return Err(ForecastError::InsufficientData {
                required: 1,
                actual: 0,
            });
        }

        if let Some(bad) = observations
            .iter()
            .find(|obs| !obs.value.is_finite() || obs.value < 0.0)
        {
            return Err(ForecastError::InvalidSeries(format!(
                "{}: value {} in {} is not a non-negative number",
                label, bad.value, bad.year
            )));
        }

        observations.sort_by_key(|obs| obs.year);
        if let Some(pair) = observations.windows(2).find(|pair| pair[0].year == pair[1].year) {
            return Err(ForecastError::InvalidSeries(format!(
                "{}: duplicate year {}",
                label, pair[0].year
            )));
        }

        Ok(Self {
            label,
            observations,
        })
    }

    pub fn from_pairs(label: SeriesLabel, pairs: &[(i32, f64)]) -> ForecastResult<Self> {
        let observations = pairs
            .iter()
            .map(|&(year, value)| Observation::new(year, value))
            .collect();
        Self::new(label, observations)
    }

    pub fn label(&self) -> &SeriesLabel {
        &self.label
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn min_year(&self) -> i32 {
        self.observations[0].year
    }

    pub fn max_year(&self) -> i32 {
        self.observations[self.observations.len() - 1].year
    }

    pub fn value_at(&self, year: i32) -> Option<f64> {
        self.observations
            .binary_search_by_key(&year, |obs| obs.year)
            .ok()
            .map(|idx| self.observations[idx].value)
    }

    pub fn years(&self) -> Vec<f64> {
        self.observations.iter().map(|obs| obs.year as f64).collect()
    }

    pub fn values(&self) -> Vec<f64> {
        self.observations.iter().map(|obs| obs.value).collect()
    }
}

/// Inclusive span of whole years.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearRange {
    pub start: i32,
    pub end: i32,
}

impl YearRange {
    pub fn new(start: i32, end: i32) -> Self {
        Self { start, end }
    }

    pub fn years(&self) -> impl Iterator<Item = i32> {
        self.start..=self.end
    }

    pub fn len(&self) -> usize {
        if self.end < self.start {
            0
        } else {
            (self.end - self.start) as usize + 1
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, year: i32) -> bool {
        (self.start..=self.end).contains(&year)
    }
}

/// A model value for one year, optionally with an uncertainty band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Estimate {
    pub value: f64,
    pub lower: Option<f64>,
    pub upper: Option<f64>,
}

impl Estimate {
    pub fn point(value: f64) -> Self {
        Self {
            value,
            lower: None,
            upper: None,
        }
    }

    pub fn banded(value: f64, lower: f64, upper: f64) -> Self {
        Self {
            value,
            lower: Some(lower),
            upper: Some(upper),
        }
    }
}

/// Year → estimate produced by one extrapolator.
pub type Projection = BTreeMap<i32, Estimate>;

/// One merged row of the comparison table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub year: i32,
    pub polynomial_estimate: Option<f64>,
    pub trend_estimate: Option<f64>,
    pub trend_lower: Option<f64>,
    pub trend_upper: Option<f64>,
    pub observed: Option<f64>,
}

impl ForecastPoint {
    pub fn empty(year: i32) -> Self {
        Self {
            year,
            polynomial_estimate: None,
            trend_estimate: None,
            trend_lower: None,
            trend_upper: None,
            observed: None,
        }
    }
}

/// Errors raised while fitting or projecting a series.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ForecastError {
    #[error("insufficient data: need at least {required} distinct years, got {actual}")]
    InsufficientData { required: usize, actual: usize },
    #[error("invalid forecast range: future year {future_year} must be after last observed year {last_year} and within the configured horizon")]
    InvalidForecastRange { last_year: i32, future_year: i32 },
    #[error("fit divergence: {0}")]
    FitDivergence(String),
    #[error("invalid series: {0}")]
    InvalidSeries(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type ForecastResult<T> = Result<T, ForecastError>;

/// A forecasting strategy: fit a series and project it over a year range.
///
/// Implementations must be deterministic and keep no state between calls.
pub trait Extrapolator: Send + Sync {
    fn name(&self) -> &str;
    fn extrapolate(&self, series: &Series, range: YearRange) -> ForecastResult<Projection>;
}
