use anyhow::Context;
use co2core::forecast::TrendConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Dashboard settings, loaded from YAML or assembled from CLI defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub data_path: PathBuf,
    /// Year shown when a view request names none.
    pub default_year: i32,
    /// Forecast horizon used when a request names none.
    pub future_year: i32,
    pub bind_address: SocketAddr,
    pub trend: TrendConfig,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("co2_emission_asean_clean.csv"),
            default_year: 2020,
            future_year: 2030,
            bind_address: SocketAddr::from(([127, 0, 0, 1], 9000)),
            trend: TrendConfig::default(),
        }
    }
}

impl DashboardConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading dashboard config {}", path_ref.display()))?;
        let config: DashboardConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing dashboard config {}", path_ref.display()))?;
        Ok(config)
    }

    pub fn from_args(data_path: PathBuf, default_year: i32, future_year: i32) -> Self {
        Self {
            data_path,
            default_year,
            future_year,
            ..Default::default()
        }
    }
}
