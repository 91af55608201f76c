use crate::gui_bridge::model::{
    BarEntry, BarView, ForecastView, LineView, MapMarker, MapView, ViewKind, ViewRequest,
    VisualizationModel,
};
use crate::workflow::config::DashboardConfig;
use anyhow::{anyhow, Context};
use co2core::dataset::{coords, EmissionTable};
use co2core::forecast::ForecastComparator;
use co2core::prelude::SeriesLabel;
use log::{info, warn};

/// Builds view models from the loaded table; holds nothing that changes per request.
pub struct Runner {
    config: DashboardConfig,
    table: EmissionTable,
    comparator: ForecastComparator,
}

impl Runner {
    pub fn new(config: DashboardConfig, table: EmissionTable) -> anyhow::Result<Self> {
        let comparator = ForecastComparator::new(config.trend.clone())
            .context("building forecast comparator")?;
        Ok(Self {
            config,
            table,
            comparator,
        })
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    /// Country names plus the aggregate label, as offered for selection.
    pub fn selections(&self) -> Vec<String> {
        let mut selections = vec![SeriesLabel::Aggregate.to_string()];
        selections.extend(self.table.countries());
        selections
    }

    fn resolve_year(&self, requested: Option<i32>) -> anyhow::Result<i32> {
        let year = requested.unwrap_or(self.config.default_year);
        self.table
            .clamp_year(year)
            .ok_or_else(|| anyhow!("no emission rows loaded"))
    }

    pub fn execute(&self, request: &ViewRequest) -> anyhow::Result<VisualizationModel> {
        let model = match request.kind {
            ViewKind::Map => VisualizationModel::Map(self.map_view(request.year)?),
            ViewKind::Line => {
                VisualizationModel::Line(self.line_view(request.year, &request.countries)?)
            }
            ViewKind::Bar => VisualizationModel::Bar(self.bar_view(request.year)?),
            ViewKind::Forecast => VisualizationModel::Forecast(
                self.forecast_view(request.series.as_deref(), request.future_year)?,
            ),
        };
        info!("{}", model.summary());
        Ok(model)
    }

    pub fn map_view(&self, year: Option<i32>) -> anyhow::Result<MapView> {
        let year = self.resolve_year(year)?;
        let markers = self
            .table
            .snapshot(year)
            .into_iter()
            .map(|record| MapMarker {
                country: record.country.clone(),
                co2_per_capita: record.co2_per_capita,
                location: record
                    .location()
                    .unwrap_or_else(|| coords::locate(&record.country)),
            })
            .collect();
        Ok(MapView { year, markers })
    }

    pub fn line_view(&self, year: Option<i32>, countries: &[String]) -> anyhow::Result<LineView> {
        let focus_year = self.resolve_year(year)?;
        let (first_year, last_year) = self
            .table
            .year_bounds()
            .ok_or_else(|| anyhow!("no emission rows loaded"))?;
        let rows = self
            .table
            .history(countries)
            .into_iter()
            .cloned()
            .collect();
        Ok(LineView {
            focus_year,
            first_year,
            last_year,
            rows,
        })
    }

    pub fn bar_view(&self, year: Option<i32>) -> anyhow::Result<BarView> {
        let year = self.resolve_year(year)?;
        let bars = self
            .table
            .ranking(year)
            .into_iter()
            .enumerate()
            .map(|(idx, record)| BarEntry {
                rank: idx + 1,
                country: record.country.clone(),
                co2_per_capita: record.co2_per_capita,
            })
            .collect();
        Ok(BarView { year, bars })
    }

    /// Forecast comparison for one selection.
    ///
    /// Fit failures are not errors here: the view keeps the history and
    /// carries the message instead. Unknown countries are errors.
    pub fn forecast_view(
        &self,
        selection: Option<&str>,
        future_year: Option<i32>,
    ) -> anyhow::Result<ForecastView> {
        let label = selection
            .map(SeriesLabel::parse)
            .unwrap_or(SeriesLabel::Aggregate);
        let future_year = future_year.unwrap_or(self.config.future_year);
        let series = self
            .table
            .series(&label)
            .with_context(|| format!("selecting series {}", label))?;
        let history = series.observations().to_vec();

        match self.comparator.compare(&series, future_year) {
            Ok(table) => Ok(ForecastView {
                label: table.label.clone(),
                future_year,
                history,
                comparison: Some(table),
                error: None,
            }),
            Err(err) => {
                warn!("forecast for {} fell back to history: {}", label, err);
                Ok(ForecastView {
                    label: series.label().clone(),
                    future_year,
                    history,
                    comparison: None,
                    error: Some(err.to_string()),
                })
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use co2core::dataset::{EmissionRecord, GeoPoint};
    use std::path::PathBuf;

    pub(crate) fn sample_runner() -> Runner {
        let mut rows = Vec::new();
        for (offset, year) in (2012..=2021).enumerate() {
            let step = offset as f64;
            rows.push(EmissionRecord::new("Indonesia", year, 1.8 + 0.08 * step));
            rows.push(EmissionRecord::new("Singapore", year, 8.9 - 0.05 * step));
            rows.push(EmissionRecord::new("Vietnam", year, 1.6 + 0.15 * step));
        }
        rows.push(EmissionRecord::new("Timor-Leste", 2020, 0.4));
        rows.push(EmissionRecord::new("Timor-Leste", 2021, 0.5));
        let config = DashboardConfig::from_args(PathBuf::from("unused.csv"), 2020, 2025);
        Runner::new(config, EmissionTable::new(rows)).unwrap()
    }

    #[test]
    fn runner_builds_bar_ranking() {
        let runner = sample_runner();
        let view = runner.bar_view(Some(2015)).unwrap();
        assert_eq!(view.year, 2015);
        assert_eq!(view.bars[0].country, "Singapore");
        assert_eq!(view.bars[0].rank, 1);
        assert_eq!(view.bars.len(), 3);
    }

    #[test]
    fn map_view_clamps_year_and_locates_markers() {
        let runner = sample_runner();
        let view = runner.map_view(Some(2050)).unwrap();
        assert_eq!(view.year, 2021);
        let timor = view
            .markers
            .iter()
            .find(|m| m.country == "Timor-Leste")
            .unwrap();
        assert_eq!(timor.location, GeoPoint::ORIGIN);
        let vietnam = view.markers.iter().find(|m| m.country == "Vietnam").unwrap();
        assert!(vietnam.location.longitude > 100.0);
    }

    #[test]
    fn line_view_uses_default_year() {
        let runner = sample_runner();
        let view = runner
            .line_view(None, &["Vietnam".to_string()])
            .unwrap();
        assert_eq!(view.focus_year, 2020);
        assert_eq!((view.first_year, view.last_year), (2012, 2021));
        assert_eq!(view.rows.len(), 10);
    }

    #[test]
    fn forecast_view_compares_aggregate_by_default() {
        let runner = sample_runner();
        let view = runner.forecast_view(None, None).unwrap();
        assert_eq!(view.label, SeriesLabel::Aggregate);
        let table = view.comparison.unwrap();
        assert_eq!(table.points.first().unwrap().year, 2012);
        assert_eq!(table.points.last().unwrap().year, 2025);
        assert!(view.error.is_none());
    }

    #[test]
    fn forecast_failure_falls_back_to_history() {
        let runner = sample_runner();
        let view = runner.forecast_view(Some("Timor-Leste"), None).unwrap();
        assert!(view.comparison.is_none());
        assert_eq!(view.history.len(), 2);
        assert!(view.error.unwrap().contains("insufficient data"));

        let model = runner
            .execute(&ViewRequest {
                future_year: Some(2019),
                series: Some("Vietnam".into()),
                ..ViewRequest::new(ViewKind::Forecast)
            })
            .unwrap();
        assert!(model.is_fallback());
    }

    #[test]
    fn divergent_fit_falls_back_to_history() {
        let rows = (2015..=2018)
            .map(|year| EmissionRecord::new("Brunei", year, f64::MAX))
            .collect();
        let config = DashboardConfig::from_args(PathBuf::from("unused.csv"), 2018, 2022);
        let runner = Runner::new(config, EmissionTable::new(rows)).unwrap();

        let view = runner.forecast_view(Some("Brunei"), None).unwrap();
        assert!(view.comparison.is_none());
        assert_eq!(view.history.len(), 4);
        assert!(view.error.unwrap().starts_with("fit divergence"));
    }

    #[test]
    fn horizon_beyond_limit_falls_back_to_history() {
        let runner = sample_runner();
        let view = runner
            .forecast_view(Some("Vietnam"), Some(100_000))
            .unwrap();
        assert!(view.comparison.is_none());
        assert_eq!(view.history.len(), 10);
        assert!(view.error.unwrap().contains("invalid forecast range"));
    }

    #[test]
    fn unknown_country_is_an_error() {
        let runner = sample_runner();
        assert!(runner.forecast_view(Some("Atlantis"), None).is_err());
    }

    #[test]
    fn selections_start_with_aggregate() {
        let runner = sample_runner();
        let selections = runner.selections();
        assert_eq!(selections[0], "All countries");
        assert_eq!(selections.len(), 5);
    }
}
