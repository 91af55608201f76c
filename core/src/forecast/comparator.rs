use crate::forecast::polynomial::PolynomialExtrapolator;
use crate::forecast::trend::{TrendConfig, TrendExtrapolator, DEFAULT_MAX_HORIZON};
use crate::prelude::{
    Extrapolator, ForecastError, ForecastPoint, ForecastResult, Projection, Series, SeriesLabel,
    YearRange,
};
use crate::telemetry::log::LogManager;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Fewest distinct years a comparison accepts.
pub const MIN_FIT_POINTS: usize = 3;

/// Merged comparison of both extrapolations for one series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastTable {
    pub label: SeriesLabel,
    pub last_observed_year: i32,
    pub future_year: i32,
    pub polynomial_model: String,
    pub trend_model: String,
    pub points: Vec<ForecastPoint>,
}

/// Runs a quadratic and a trend extrapolation over the same years and merges
/// them with the observed values.
pub struct ForecastComparator {
    polynomial: Box<dyn Extrapolator>,
    trend: Box<dyn Extrapolator>,
    max_horizon: u32,
    logger: LogManager,
}

impl ForecastComparator {
    pub fn new(trend_config: TrendConfig) -> ForecastResult<Self> {
        let max_horizon = trend_config.max_horizon;
        Ok(Self::with_extrapolators(
            Box::new(PolynomialExtrapolator::new()),
            Box::new(TrendExtrapolator::new(trend_config)?),
        )
        .with_max_horizon(max_horizon))
    }

    /// Substitutes either strategy; the merge is unchanged.
    pub fn with_extrapolators(
        polynomial: Box<dyn Extrapolator>,
        trend: Box<dyn Extrapolator>,
    ) -> Self {
        Self {
            polynomial,
            trend,
            max_horizon: DEFAULT_MAX_HORIZON,
            logger: LogManager::new("comparator"),
        }
    }

    /// Caps how many years past the last observation a comparison may reach.
    pub fn with_max_horizon(mut self, years: u32) -> Self {
        self.max_horizon = years;
        self
    }

    pub fn max_horizon(&self) -> u32 {
        self.max_horizon
    }

    /// Checks the input and returns the year range both models are evaluated on.
    pub fn evaluation_range(&self, series: &Series, future_year: i32) -> ForecastResult<YearRange> {
        if series.len() < MIN_FIT_POINTS {
            return Err(ForecastError::InsufficientData {
                required: MIN_FIT_POINTS,
                actual: series.len(),
            });
        }

        let last_year = series.max_year();
        let horizon = i64::from(future_year) - i64::from(last_year);
        if horizon <= 0 || horizon > i64::from(self.max_horizon) {
            return Err(ForecastError::InvalidForecastRange {
                last_year,
                future_year,
            });
        }

        Ok(YearRange::new(series.min_year(), future_year))
    }

    pub fn compare(&self, series: &Series, future_year: i32) -> ForecastResult<ForecastTable> {
        let range = self.evaluation_range(series, future_year)?;

        let polynomial = self.polynomial.extrapolate(series, range)?;
        let trend = self.trend.extrapolate(series, range)?;
        let points = merge_projections(&polynomial, &trend, series);

        self.logger.record(&format!(
            "{}: compared {} and {} over {}-{} ({} rows)",
            series.label(),
            self.polynomial.name(),
            self.trend.name(),
            range.start,
            range.end,
            points.len()
        ));

        Ok(ForecastTable {
            label: series.label().clone(),
            last_observed_year: series.max_year(),
            future_year,
            polynomial_model: self.polynomial.name().to_string(),
            trend_model: self.trend.name().to_string(),
            points,
        })
    }
}

/// Outer-joins the two projections on year, then left-joins the observations.
///
/// Trend bounds are widened where needed so that lower ≤ estimate ≤ upper.
pub fn merge_projections(
    polynomial: &Projection,
    trend: &Projection,
    series: &Series,
) -> Vec<ForecastPoint> {
    let mut rows: BTreeMap<i32, ForecastPoint> = BTreeMap::new();

    for (&year, estimate) in polynomial {
        rows.entry(year)
            .or_insert_with(|| ForecastPoint::empty(year))
            .polynomial_estimate = Some(estimate.value);
    }

    for (&year, estimate) in trend {
        let row = rows.entry(year).or_insert_with(|| ForecastPoint::empty(year));
        row.trend_estimate = Some(estimate.value);
        row.trend_lower = estimate.lower.map(|lower| lower.min(estimate.value));
        row.trend_upper = estimate.upper.map(|upper| upper.max(estimate.value));
    }

    for (year, row) in rows.iter_mut() {
        row.observed = series.value_at(*year);
    }

    rows.into_values().collect()
}
