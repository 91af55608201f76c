use crate::telemetry::log::LogManager;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub const ORIGIN: GeoPoint = GeoPoint {
        latitude: 0.0,
        longitude: 0.0,
    };
}

/// Approximate geographic centres of the ASEAN member states.
const ASEAN_CENTRES: [(&str, f64, f64); 10] = [
    ("Indonesia", -0.7893, 113.9213),
    ("Malaysia", 4.2105, 101.9758),
    ("Thailand", 15.8700, 100.9925),
    ("Vietnam", 14.0583, 108.2772),
    ("Philippines", 12.8797, 121.7740),
    ("Singapore", 1.3521, 103.8198),
    ("Myanmar", 21.9162, 95.9560),
    ("Cambodia", 12.5657, 104.9910),
    ("Laos", 19.8563, 102.4955),
    ("Brunei", 4.5353, 114.7277),
];

pub fn lookup(country: &str) -> Option<GeoPoint> {
    ASEAN_CENTRES
        .iter()
        .find(|(name, _, _)| name.eq_ignore_ascii_case(country.trim()))
        .map(|&(_, latitude, longitude)| GeoPoint {
            latitude,
            longitude,
        })
}

/// Like [`lookup`], but unknown countries are placed at (0, 0).
pub fn locate(country: &str) -> GeoPoint {
    lookup(country).unwrap_or_else(|| {
        LogManager::new("dataset").warn(&format!(
            "no coordinates for {}, placing it at (0, 0)",
            country
        ));
        GeoPoint::ORIGIN
    })
}
