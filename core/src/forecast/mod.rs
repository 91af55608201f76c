pub mod comparator;
pub mod polynomial;
pub mod trend;

pub use comparator::{merge_projections, ForecastComparator, ForecastTable, MIN_FIT_POINTS};
pub use polynomial::{PolynomialExtrapolator, PolynomialFit};
pub use trend::{TrendConfig, TrendExtrapolator, TrendFit, DEFAULT_MAX_HORIZON};
