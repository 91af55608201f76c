//! Forecast-comparison core for the ASEAN CO₂ emissions dashboard.
//!
//! The crate turns already-loaded emission rows into per-country or aggregate
//! series and compares two extrapolations of a series (a quadratic
//! least-squares curve and an additive trend model with an uncertainty band)
//! on a common year axis. Rendering is left to the caller.

pub mod dataset;
pub mod forecast;
pub mod math;
pub mod prelude;
pub mod telemetry;

pub use dataset::{DatasetError, EmissionRecord, EmissionTable};
pub use forecast::{
    ForecastComparator, ForecastTable, PolynomialExtrapolator, TrendConfig, TrendExtrapolator,
};
pub use prelude::{
    Extrapolator, ForecastError, ForecastPoint, ForecastResult, Observation, Series, SeriesLabel,
};
