use clap::ValueEnum;
use co2core::dataset::{EmissionRecord, GeoPoint};
use co2core::forecast::ForecastTable;
use co2core::prelude::{Observation, SeriesLabel};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ViewKind {
    Map,
    Line,
    Bar,
    Forecast,
}

impl ViewKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViewKind::Map => "map",
            ViewKind::Line => "line",
            ViewKind::Bar => "bar",
            ViewKind::Forecast => "forecast",
        }
    }
}

impl fmt::Display for ViewKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ViewKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "map" => Ok(ViewKind::Map),
            "line" => Ok(ViewKind::Line),
            "bar" => Ok(ViewKind::Bar),
            "forecast" => Ok(ViewKind::Forecast),
            other => Err(format!("unknown view {}", other)),
        }
    }
}

/// What the caller asked to see; unset fields fall back to the config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewRequest {
    pub kind: ViewKind,
    pub year: Option<i32>,
    /// Country filter for the line view; empty means all.
    pub countries: Vec<String>,
    /// Country name or "All countries" for the forecast view.
    pub series: Option<String>,
    pub future_year: Option<i32>,
}

impl ViewRequest {
    pub fn new(kind: ViewKind) -> Self {
        Self {
            kind,
            year: None,
            countries: Vec::new(),
            series: None,
            future_year: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapMarker {
    pub country: String,
    pub co2_per_capita: f64,
    pub location: GeoPoint,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapView {
    pub year: i32,
    pub markers: Vec<MapMarker>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineView {
    pub focus_year: i32,
    pub first_year: i32,
    pub last_year: i32,
    pub rows: Vec<EmissionRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarEntry {
    pub rank: usize,
    pub country: String,
    pub co2_per_capita: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarView {
    pub year: i32,
    pub bars: Vec<BarEntry>,
}

/// Forecast comparison, or the history alone when the forecast failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastView {
    pub label: SeriesLabel,
    pub future_year: i32,
    pub history: Vec<Observation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comparison: Option<ForecastTable>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Payload handed to the external renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum VisualizationModel {
    Map(MapView),
    Line(LineView),
    Bar(BarView),
    Forecast(ForecastView),
}

impl VisualizationModel {
    pub fn kind(&self) -> ViewKind {
        match self {
            VisualizationModel::Map(_) => ViewKind::Map,
            VisualizationModel::Line(_) => ViewKind::Line,
            VisualizationModel::Bar(_) => ViewKind::Bar,
            VisualizationModel::Forecast(_) => ViewKind::Forecast,
        }
    }

    /// True when a forecast view carries only historical data.
    pub fn is_fallback(&self) -> bool {
        matches!(self, VisualizationModel::Forecast(view) if view.comparison.is_none())
    }

    pub fn summary(&self) -> String {
        match self {
            VisualizationModel::Map(view) => {
                format!("map {} -> {} markers", view.year, view.markers.len())
            }
            VisualizationModel::Line(view) => format!(
                "line {}-{} (focus {}) -> {} rows",
                view.first_year,
                view.last_year,
                view.focus_year,
                view.rows.len()
            ),
            VisualizationModel::Bar(view) => {
                format!("bar {} -> {} countries", view.year, view.bars.len())
            }
            VisualizationModel::Forecast(view) => match (&view.comparison, &view.error) {
                (Some(table), _) => format!(
                    "forecast {} through {} -> {} rows",
                    view.label,
                    view.future_year,
                    table.points.len()
                ),
                (None, Some(error)) => format!(
                    "forecast {} unavailable ({}), {} historical points",
                    view.label,
                    error,
                    view.history.len()
                ),
                (None, None) => format!("forecast {} -> no rows", view.label),
            },
        }
    }
}
