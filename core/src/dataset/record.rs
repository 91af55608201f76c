use serde::{Deserialize, Serialize};

use super::coords::GeoPoint;

/// One cleaned row of the emissions dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmissionRecord {
    pub country: String,
    pub year: i32,
    /// Tonnes of CO₂ per person.
    pub co2_per_capita: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
}

impl EmissionRecord {
    pub fn new(country: impl Into<String>, year: i32, co2_per_capita: f64) -> Self {
        Self {
            country: country.into(),
            year,
            co2_per_capita,
            latitude: None,
            longitude: None,
        }
    }

    /// Coordinates carried by the row itself, when both columns are present.
    pub fn location(&self) -> Option<GeoPoint> {
        match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Some(GeoPoint {
                latitude,
                longitude,
            }),
            _ => None,
        }
    }
}
