pub mod coords;
pub mod record;
pub mod table;

pub use coords::GeoPoint;
pub use record::EmissionRecord;
pub use table::{DatasetError, EmissionTable};
