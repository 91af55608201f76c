use crate::math::{MatrixHelper, StatsHelper};
use crate::prelude::{
    Estimate, Extrapolator, ForecastError, ForecastResult, Projection, Series, YearRange,
};
use crate::telemetry::log::LogManager;
use ndarray::{Array1, Array2};
use rand::distributions::Open01;
use rand::{rngs::StdRng, Rng, SeedableRng};
use rand_distr::{Distribution, Poisson, StandardNormal};
use serde::{Deserialize, Serialize};

/// Prior scale on the base slope and offset (scaled units).
const BASE_PRIOR_SCALE: f64 = 5.0;
/// Lower bound on the residual standard deviation (scaled units).
const NOISE_FLOOR: f64 = 1e-3;
/// Keeps the changepoint magnitude scale strictly positive.
const DELTA_SCALE_EPSILON: f64 = 1e-8;
/// Years past the last observation a projection may reach by default.
pub const DEFAULT_MAX_HORIZON: u32 = 100;

/// Settings of the additive trend model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendConfig {
    /// Upper bound on potential changepoints in the history.
    pub n_changepoints: usize,
    /// Fraction of the history in which changepoints may be placed.
    pub changepoint_range: f64,
    /// Standard deviation of the prior on each changepoint's rate change.
    pub changepoint_prior_scale: f64,
    /// Probability mass covered by the uncertainty band.
    pub interval_width: f64,
    pub uncertainty_samples: usize,
    pub seed: u64,
    /// Furthest year past the last observation that may be projected.
    pub max_horizon: u32,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            n_changepoints: 25,
            changepoint_range: 0.8,
            changepoint_prior_scale: 0.05,
            interval_width: 0.8,
            uncertainty_samples: 1000,
            seed: 0,
            max_horizon: DEFAULT_MAX_HORIZON,
        }
    }
}

impl TrendConfig {
    pub fn validate(&self) -> ForecastResult<()> {
        if !(self.changepoint_range > 0.0 && self.changepoint_range <= 1.0) {
            return Err(ForecastError::InvalidConfig(format!(
                "changepoint_range {} must be in (0, 1]",
                self.changepoint_range
            )));
        }
        if !(self.changepoint_prior_scale.is_finite() && self.changepoint_prior_scale > 0.0) {
            return Err(ForecastError::InvalidConfig(format!(
                "changepoint_prior_scale {} must be positive",
                self.changepoint_prior_scale
            )));
        }
        if !(self.interval_width > 0.0 && self.interval_width < 1.0) {
            return Err(ForecastError::InvalidConfig(format!(
                "interval_width {} must be in (0, 1)",
                self.interval_width
            )));
        }
        if self.uncertainty_samples == 0 {
            return Err(ForecastError::InvalidConfig(
                "uncertainty_samples must be at least 1".into(),
            ));
        }
        if self.max_horizon == 0 {
            return Err(ForecastError::InvalidConfig(
                "max_horizon must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Fitted piecewise-linear trend, in scaled time and value units.
///
/// Time is `(year - origin) / span`, so the history covers `[0, 1]`; values
/// are divided by `value_scale`.
#[derive(Debug, Clone, PartialEq)]
pub struct TrendFit {
    pub origin: f64,
    pub span: f64,
    pub value_scale: f64,
    pub offset: f64,
    pub slope: f64,
    pub changepoints: Vec<f64>,
    pub deltas: Vec<f64>,
    /// Residual standard deviation of the fit.
    pub sigma: f64,
}

impl TrendFit {
    pub fn scaled_time(&self, year: i32) -> f64 {
        (year as f64 - self.origin) / self.span
    }

    /// Trend at scaled time `t`, in scaled value units.
    pub fn trend_at(&self, t: f64) -> f64 {
        let bends: f64 = self
            .changepoints
            .iter()
            .zip(self.deltas.iter())
            .map(|(&s, &delta)| delta * (t - s).max(0.0))
            .sum();
        self.offset + self.slope * t + bends
    }

    pub fn predict(&self, year: i32) -> f64 {
        self.trend_at(self.scaled_time(year)) * self.value_scale
    }
}

/// Additive trend decomposition with changepoints and no seasonal terms.
///
/// The band comes from simulating future trend changes at the historical
/// changepoint rate plus observation noise, then taking quantiles.
pub struct TrendExtrapolator {
    config: TrendConfig,
    logger: LogManager,
}

impl TrendExtrapolator {
    pub fn new(config: TrendConfig) -> ForecastResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            logger: LogManager::new("trend"),
        })
    }

    pub fn config(&self) -> &TrendConfig {
        &self.config
    }

    fn changepoint_times(&self, times: &[f64]) -> Vec<f64> {
        let hist_size = (times.len() as f64 * self.config.changepoint_range).floor() as usize;
        let count = self
            .config
            .n_changepoints
            .min(hist_size.saturating_sub(1));
        if count == 0 {
            return Vec::new();
        }

        let last = (hist_size - 1) as f64;
        (1..=count)
            .map(|step| {
                let idx = (last * step as f64 / count as f64).round() as usize;
                times[idx]
            })
            .collect()
    }

    pub fn fit(&self, series: &Series) -> ForecastResult<TrendFit> {
        if series.len() < 2 {
            return Err(ForecastError::InsufficientData {
                required: 2,
                actual: series.len(),
            });
        }

        let origin = series.min_year() as f64;
        let span = (series.max_year() - series.min_year()) as f64;
        let times: Vec<f64> = series.years().iter().map(|y| (y - origin) / span).collect();

        let values = series.values();
        let max_abs = values.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
        let value_scale = if max_abs > 0.0 { max_abs } else { 1.0 };
        let target = Array1::from_iter(values.iter().map(|v| v / value_scale));

        let changepoints = self.changepoint_times(&times);

        // Noise level for weighting the priors, from a plain line.
        let line_design = Array2::from_shape_fn((times.len(), 2), |(row, col)| {
            if col == 0 {
                1.0
            } else {
                times[row]
            }
        });
        let line = MatrixHelper::least_squares(line_design.view(), target.view()).ok_or_else(
            || {
                ForecastError::FitDivergence(format!(
                    "linear trend for {} is singular",
                    series.label()
                ))
            },
        )?;
        let line_residuals: Vec<f64> = times
            .iter()
            .zip(target.iter())
            .map(|(&t, &y)| y - (line[0] + line[1] * t))
            .collect();
        let noise_variance = StatsHelper::rms(&line_residuals).max(NOISE_FLOOR).powi(2);

        let columns = 2 + changepoints.len();
        let design = Array2::from_shape_fn((times.len(), columns), |(row, col)| match col {
            0 => 1.0,
            1 => times[row],
            _ => (times[row] - changepoints[col - 2]).max(0.0),
        });
        let base_penalty = noise_variance / BASE_PRIOR_SCALE.powi(2);
        let delta_penalty = noise_variance / self.config.changepoint_prior_scale.powi(2);
        let penalty = Array1::from_shape_fn(columns, |col| {
            if col < 2 {
                base_penalty
            } else {
                delta_penalty
            }
        });

        let beta = MatrixHelper::penalized_least_squares(
            design.view(),
            target.view(),
            penalty.view(),
        )
        .ok_or_else(|| {
            ForecastError::FitDivergence(format!(
                "trend normal equations for {} did not converge",
                series.label()
            ))
        })?;

        let fitted = design.dot(&beta);
        let residuals: Vec<f64> = target
            .iter()
            .zip(fitted.iter())
            .map(|(y, f)| y - f)
            .collect();
        let sigma = StatsHelper::rms(&residuals).max(NOISE_FLOOR);
        if !sigma.is_finite() {
            return Err(ForecastError::FitDivergence(format!(
                "residual scale for {} is not finite",
                series.label()
            )));
        }

        let fit = TrendFit {
            origin,
            span,
            value_scale,
            offset: beta[0],
            slope: beta[1],
            changepoints,
            deltas: beta.iter().skip(2).copied().collect(),
            sigma,
        };

        self.logger.detail(&format!(
            "{} slope {:.4} with {} changepoints, sigma {:.4}",
            series.label(),
            fit.slope,
            fit.changepoints.len(),
            fit.sigma
        ));

        Ok(fit)
    }

    /// Simulated values (original units) per year of `range`, one row per year.
    fn sample_paths(&self, fit: &TrendFit, range: YearRange) -> ForecastResult<Vec<Vec<f64>>> {
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let times: Vec<f64> = range.years().map(|year| fit.scaled_time(year)).collect();
        let horizon = times.iter().fold(1.0_f64, |acc, &t| acc.max(t));

        let change_rate = fit.changepoints.len() as f64 * (horizon - 1.0);
        let poisson = if change_rate > 0.0 {
            Some(Poisson::new(change_rate).map_err(|err| {
                ForecastError::FitDivergence(format!("changepoint rate {}: {}", change_rate, err))
            })?)
        } else {
            None
        };
        let delta_scale = StatsHelper::mean(
            &fit.deltas.iter().map(|delta| delta.abs()).collect::<Vec<_>>(),
        )
        .unwrap_or(0.0)
            + DELTA_SCALE_EPSILON;

        let base: Vec<f64> = times.iter().map(|&t| fit.trend_at(t)).collect();
        let mut samples = vec![Vec::with_capacity(self.config.uncertainty_samples); times.len()];
        for _ in 0..self.config.uncertainty_samples {
            let change_count = match &poisson {
                Some(distribution) => {
                    let draw: f64 = distribution.sample(&mut rng);
                    draw as usize
                }
                None => 0,
            };
            let mut new_changes: Vec<(f64, f64)> = (0..change_count)
                .map(|_| {
                    let u: f64 = rng.sample(Open01);
                    let at = 1.0 + u * (horizon - 1.0);
                    (at, sample_laplace(&mut rng, delta_scale))
                })
                .collect();
            new_changes.sort_by(|a, b| a.0.total_cmp(&b.0));

            // Times ascend, so Σ δ·(t − s)₊ is kept as rate·t − Σ δ·s over passed changes.
            let mut passed = 0;
            let mut rate = 0.0;
            let mut anchor = 0.0;
            for (row, &t) in times.iter().enumerate() {
                while let Some(&(at, delta)) = new_changes.get(passed) {
                    if at >= t {
                        break;
                    }
                    rate += delta;
                    anchor += delta * at;
                    passed += 1;
                }
                let noise: f64 = rng.sample::<f64, _>(StandardNormal) * fit.sigma;
                samples[row].push((base[row] + rate * t - anchor + noise) * fit.value_scale);
            }
        }

        Ok(samples)
    }
}

impl Default for TrendExtrapolator {
    fn default() -> Self {
        Self {
            config: TrendConfig::default(),
            logger: LogManager::new("trend"),
        }
    }
}

impl Extrapolator for TrendExtrapolator {
    fn name(&self) -> &str {
        "trend"
    }

    fn extrapolate(&self, series: &Series, range: YearRange) -> ForecastResult<Projection> {
        let last_year = series.max_year();
        if i64::from(range.end) - i64::from(last_year) > i64::from(self.config.max_horizon) {
            return Err(ForecastError::InvalidForecastRange {
                last_year,
                future_year: range.end,
            });
        }

        let fit = self.fit(series)?;
        let samples = self.sample_paths(&fit, range)?;

        let lower_q = (1.0 - self.config.interval_width) / 2.0;
        let upper_q = (1.0 + self.config.interval_width) / 2.0;

        let mut projection = Projection::new();
        for (year, mut draws) in range.years().zip(samples) {
            let value = fit.predict(year);
            draws.sort_by(|a, b| a.total_cmp(b));
            let (lower, upper) = match (
                StatsHelper::quantile_sorted(&draws, lower_q),
                StatsHelper::quantile_sorted(&draws, upper_q),
            ) {
                (Some(lower), Some(upper)) => (lower.min(value), upper.max(value)),
                _ => (value, value),
            };
            if !(value.is_finite() && lower.is_finite() && upper.is_finite()) {
                return Err(ForecastError::FitDivergence(format!(
                    "trend projection for {} in {} is not finite",
                    series.label(),
                    year
                )));
            }
            projection.insert(year, Estimate::banded(value, lower, upper));
        }

        Ok(projection)
    }
}

fn sample_laplace<R: Rng>(rng: &mut R, scale: f64) -> f64 {
    let u: f64 = rng.sample(Open01);
    if u < 0.5 {
        scale * (2.0 * u).ln()
    } else {
        -scale * (2.0 * (1.0 - u)).ln()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prelude::SeriesLabel;

    fn series(pairs: &[(i32, f64)]) -> Series {
        Series::from_pairs(SeriesLabel::Country("Malaysia".into()), pairs).unwrap()
    }

    fn noisy_series() -> Series {
        let wobble = [0.12, -0.08, 0.05, -0.15, 0.1, -0.02, 0.07, -0.11, 0.04, 0.0];
        let pairs: Vec<(i32, f64)> = (0..10)
            .map(|i| (2005 + i as i32, 4.0 + 0.3 * i as f64 + wobble[i]))
            .collect();
        series(&pairs)
    }

    #[test]
    fn config_validation_rejects_bad_width() {
        let config = TrendConfig {
            interval_width: 1.0,
            ..Default::default()
        };
        assert!(matches!(
            TrendExtrapolator::new(config),
            Err(ForecastError::InvalidConfig(_))
        ));
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let config: TrendConfig = serde_json::from_str(r#"{"seed": 7}"#).unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.n_changepoints, 25);
    }

    #[test]
    fn changepoints_stay_in_leading_history() {
        let extrapolator = TrendExtrapolator::default();
        let fit = extrapolator
            .fit(&series(&[
                (2015, 1.0),
                (2016, 1.2),
                (2017, 1.5),
                (2018, 1.9),
                (2019, 2.4),
            ]))
            .unwrap();
        // floor(5 * 0.8) = 4 usable points, so three changepoints at indices 1..=3.
        assert_eq!(fit.changepoints, vec![0.25, 0.5, 0.75]);
    }

    #[test]
    fn linear_series_extrapolates_the_line() {
        let pairs: Vec<(i32, f64)> = (2000..2010)
            .map(|year| (year, 2.0 + 0.5 * (year - 2000) as f64))
            .collect();
        let extrapolator = TrendExtrapolator::default();
        let projection = extrapolator
            .extrapolate(&series(&pairs), YearRange::new(2000, 2012))
            .unwrap();
        let expected = 2.0 + 0.5 * 12.0;
        assert!((projection[&2012].value - expected).abs() < 1e-3);
    }

    #[test]
    fn bands_bracket_estimates() {
        let extrapolator = TrendExtrapolator::default();
        let projection = extrapolator
            .extrapolate(&noisy_series(), YearRange::new(2005, 2020))
            .unwrap();
        assert_eq!(projection.len(), 16);
        for estimate in projection.values() {
            let lower = estimate.lower.unwrap();
            let upper = estimate.upper.unwrap();
            assert!(lower <= estimate.value && estimate.value <= upper);
        }
    }

    #[test]
    fn band_widens_beyond_history() {
        let extrapolator = TrendExtrapolator::default();
        let projection = extrapolator
            .extrapolate(&noisy_series(), YearRange::new(2005, 2030))
            .unwrap();
        let width = |year: i32| {
            let estimate = projection[&year];
            estimate.upper.unwrap() - estimate.lower.unwrap()
        };
        assert!(width(2030) > width(2014));
    }

    #[test]
    fn same_seed_gives_identical_projection() {
        let extrapolator = TrendExtrapolator::default();
        let range = YearRange::new(2005, 2025);
        let first = extrapolator.extrapolate(&noisy_series(), range).unwrap();
        let second = extrapolator.extrapolate(&noisy_series(), range).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn zero_horizon_is_rejected() {
        let config = TrendConfig {
            max_horizon: 0,
            ..Default::default()
        };
        assert!(matches!(
            TrendExtrapolator::new(config),
            Err(ForecastError::InvalidConfig(_))
        ));
    }

    #[test]
    fn projection_stops_at_max_horizon() {
        let extrapolator = TrendExtrapolator::new(TrendConfig {
            max_horizon: 10,
            ..Default::default()
        })
        .unwrap();
        assert!(extrapolator
            .extrapolate(&noisy_series(), YearRange::new(2005, 2024))
            .is_ok());
        assert_eq!(
            extrapolator
                .extrapolate(&noisy_series(), YearRange::new(2005, 2025))
                .unwrap_err(),
            ForecastError::InvalidForecastRange {
                last_year: 2014,
                future_year: 2025
            }
        );
    }

    #[test]
    fn far_horizon_stays_bracketed() {
        let extrapolator = TrendExtrapolator::default();
        let projection = extrapolator
            .extrapolate(&noisy_series(), YearRange::new(2005, 2114))
            .unwrap();
        assert_eq!(projection.len(), 110);
        let last = projection[&2114];
        assert!(last.lower.unwrap() <= last.value && last.value <= last.upper.unwrap());
        assert!(last.upper.unwrap() - last.lower.unwrap() > 0.0);
    }

    #[test]
    fn laplace_samples_are_finite() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..1000 {
            assert!(sample_laplace(&mut rng, 0.5).is_finite());
        }
    }
}
