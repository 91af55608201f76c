use crate::math::MatrixHelper;
use crate::prelude::{
    Estimate, Extrapolator, ForecastError, ForecastResult, Projection, Series, YearRange,
};
use crate::telemetry::log::LogManager;
use ndarray::{Array1, Array2};

/// Degree of the curve fitted by [`PolynomialExtrapolator::new`].
pub const QUADRATIC_DEGREE: usize = 2;

/// Least-squares polynomial in the (centred) year.
#[derive(Debug, Clone, PartialEq)]
pub struct PolynomialFit {
    /// Coefficients in ascending powers of `year - center`.
    pub coefficients: Vec<f64>,
    pub center: f64,
}

impl PolynomialFit {
    pub fn evaluate(&self, year: i32) -> f64 {
        let x = year as f64 - self.center;
        self.coefficients
            .iter()
            .rev()
            .fold(0.0, |acc, &coefficient| acc * x + coefficient)
    }
}

/// Ordinary least-squares polynomial regression of value on year.
pub struct PolynomialExtrapolator {
    degree: usize,
    logger: LogManager,
}

impl PolynomialExtrapolator {
    pub fn new() -> Self {
        Self::with_degree(QUADRATIC_DEGREE)
    }

    pub fn with_degree(degree: usize) -> Self {
        Self {
            degree,
            logger: LogManager::new("polynomial"),
        }
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn fit(&self, series: &Series) -> ForecastResult<PolynomialFit> {
        let required = self.degree + 1;
        if series.len() < required {
            return Err(ForecastError::InsufficientData {
                required,
                actual: series.len(),
            });
        }

        let years = series.years();
        let center = years.iter().sum::<f64>() / years.len() as f64;
        let columns = self.degree + 1;
        let design = Array2::from_shape_fn((years.len(), columns), |(row, power)| {
            (years[row] - center).powi(power as i32)
        });
        let target = Array1::from(series.values());

        let coefficients = MatrixHelper::least_squares(design.view(), target.view())
            .ok_or_else(|| {
                ForecastError::FitDivergence(format!(
                    "degree-{} normal equations for {} are singular",
                    self.degree,
                    series.label()
                ))
            })?
            .to_vec();

        self.logger.detail(&format!(
            "{} coefficients {:?} centred on {:.1}",
            series.label(),
            coefficients,
            center
        ));

        Ok(PolynomialFit {
            coefficients,
            center,
        })
    }
}

impl Default for PolynomialExtrapolator {
    fn default() -> Self {
        Self::new()
    }
}

impl Extrapolator for PolynomialExtrapolator {
    fn name(&self) -> &str {
        "polynomial"
    }

    fn extrapolate(&self, series: &Series, range: YearRange) -> ForecastResult<Projection> {
        let fit = self.fit(series)?;
        let projection: Projection = range
            .years()
            .map(|year| (year, Estimate::point(fit.evaluate(year))))
            .collect();

        if projection.values().any(|estimate| !estimate.value.is_finite()) {
            return Err(ForecastError::FitDivergence(format!(
                "polynomial projection for {} is not finite",
                series.label()
            )));
        }

        Ok(projection)
    }
}
