use super::record::EmissionRecord;
use crate::prelude::{ForecastError, Observation, Series, SeriesLabel};
use std::collections::BTreeMap;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum DatasetError {
    #[error("unknown country: {0}")]
    UnknownCountry(String),
    #[error("dataset has no rows")]
    Empty,
    #[error(transparent)]
    Series(#[from] ForecastError),
}

/// In-memory emissions table, ordered by country (ignoring ASCII case) then year.
#[derive(Debug, Clone, Default)]
pub struct EmissionTable {
    records: Vec<EmissionRecord>,
}

impl EmissionTable {
    pub fn new(mut records: Vec<EmissionRecord>) -> Self {
        records.sort_by_cached_key(|r| (r.country.to_ascii_lowercase(), r.year));
        Self { records }
    }

    pub fn records(&self) -> &[EmissionRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn countries(&self) -> Vec<String> {
        let mut countries: Vec<String> = self.records.iter().map(|r| r.country.clone()).collect();
        countries.dedup_by(|a, b| a.eq_ignore_ascii_case(b.as_str()));
        countries
    }

    pub fn year_bounds(&self) -> Option<(i32, i32)> {
        let min = self.records.iter().map(|r| r.year).min()?;
        let max = self.records.iter().map(|r| r.year).max()?;
        Some((min, max))
    }

    /// Clamps a requested year into the table's year bounds.
    pub fn clamp_year(&self, year: i32) -> Option<i32> {
        self.year_bounds().map(|(min, max)| year.clamp(min, max))
    }

    fn canonical_country(&self, country: &str) -> Option<&str> {
        let wanted = country.trim();
        self.records
            .iter()
            .find(|r| r.country.eq_ignore_ascii_case(wanted))
            .map(|r| r.country.as_str())
    }

    pub fn series_for(&self, country: &str) -> Result<Series, DatasetError> {
        let name = self
            .canonical_country(country)
            .ok_or_else(|| DatasetError::UnknownCountry(country.to_string()))?;
        let observations = self
            .records
            .iter()
            .filter(|r| r.country.eq_ignore_ascii_case(name))
            .map(|r| Observation::new(r.year, r.co2_per_capita))
            .collect();
        Ok(Series::new(
            SeriesLabel::Country(name.to_string()),
            observations,
        )?)
    }

    /// Per-year mean over the countries that report that year.
    pub fn average_series(&self) -> Result<Series, DatasetError> {
        if self.records.is_empty() {
            return Err(DatasetError::Empty);
        }
        if let Some(pair) = self.records.windows(2).find(|pair| {
            pair[0].year == pair[1].year && pair[0].country.eq_ignore_ascii_case(&pair[1].country)
        }) {
            return Err(ForecastError::InvalidSeries(format!(
                "{}: duplicate year {}",
                pair[1].country, pair[1].year
            ))
            .into());
        }

        let mut totals: BTreeMap<i32, (f64, usize)> = BTreeMap::new();
        for record in &self.records {
            let entry = totals.entry(record.year).or_insert((0.0, 0));
            entry.0 += record.co2_per_capita;
            entry.1 += 1;
        }

        let observations = totals
            .into_iter()
            .map(|(year, (sum, count))| Observation::new(year, sum / count as f64))
            .collect();
        Ok(Series::new(SeriesLabel::Aggregate, observations)?)
    }

    pub fn series(&self, label: &SeriesLabel) -> Result<Series, DatasetError> {
        match label {
            SeriesLabel::Country(name) => self.series_for(name),
            SeriesLabel::Aggregate => self.average_series(),
        }
    }

    pub fn snapshot(&self, year: i32) -> Vec<&EmissionRecord> {
        self.records.iter().filter(|r| r.year == year).collect()
    }

    /// Rows of `year`, highest emitter first.
    pub fn ranking(&self, year: i32) -> Vec<&EmissionRecord> {
        let mut rows = self.snapshot(year);
        rows.sort_by(|a, b| {
            b.co2_per_capita
                .total_cmp(&a.co2_per_capita)
                .then_with(|| a.country.cmp(&b.country))
        });
        rows
    }

    /// Rows of the given countries (all countries when empty).
    pub fn history(&self, countries: &[String]) -> Vec<&EmissionRecord> {
        self.records
            .iter()
            .filter(|r| {
                countries.is_empty()
                    || countries
                        .iter()
                        .any(|wanted| wanted.trim().eq_ignore_ascii_case(&r.country))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> EmissionTable {
        EmissionTable::new(vec![
            EmissionRecord::new("Vietnam", 2019, 3.5),
            EmissionRecord::new("Brunei", 2018, 16.0),
            EmissionRecord::new("Vietnam", 2018, 3.1),
            EmissionRecord::new("Brunei", 2019, 17.0),
            EmissionRecord::new("Laos", 2019, 3.5),
            EmissionRecord::new("Brunei", 2020, 15.0),
        ])
    }

    #[test]
    fn countries_are_sorted_and_unique() {
        assert_eq!(table().countries(), vec!["Brunei", "Laos", "Vietnam"]);
        assert_eq!(table().year_bounds(), Some((2018, 2020)));
        assert_eq!(table().clamp_year(2030), Some(2020));
    }

    #[test]
    fn series_for_matches_case_insensitively() {
        let series = table().series_for("vietnam").unwrap();
        assert_eq!(series.label(), &SeriesLabel::Country("Vietnam".into()));
        assert_eq!(series.values(), vec![3.1, 3.5]);
    }

    #[test]
    fn unknown_country_is_reported() {
        assert_eq!(
            table().series_for("Atlantis").unwrap_err(),
            DatasetError::UnknownCountry("Atlantis".into())
        );
    }

    #[test]
    fn average_uses_reporting_countries_only() {
        let series = table().average_series().unwrap();
        assert_eq!(series.label(), &SeriesLabel::Aggregate);
        assert!((series.value_at(2018).unwrap() - 9.55).abs() < 1e-9);
        assert!((series.value_at(2019).unwrap() - 8.0).abs() < 1e-9);
        assert!((series.value_at(2020).unwrap() - 15.0).abs() < 1e-9);
    }

    #[test]
    fn ranking_orders_by_value_then_name() {
        let table = table();
        let ranking: Vec<&str> = table
            .ranking(2019)
            .iter()
            .map(|r| r.country.as_str())
            .collect();
        assert_eq!(ranking, vec!["Brunei", "Laos", "Vietnam"]);
    }

    #[test]
    fn history_filters_selected_countries() {
        let table = table();
        assert_eq!(table.history(&[]).len(), 6);
        let laos = table.history(&["laos".to_string()]);
        assert_eq!(laos.len(), 1);
        assert_eq!(laos[0].year, 2019);
    }

    #[test]
    fn duplicate_rows_surface_as_series_error() {
        let table = EmissionTable::new(vec![
            EmissionRecord::new("Laos", 2019, 3.5),
            EmissionRecord::new("Laos", 2019, 3.6),
        ]);
        assert!(matches!(
            table.series_for("Laos"),
            Err(DatasetError::Series(ForecastError::InvalidSeries(_)))
        ));
    }

    #[test]
    fn duplicate_rows_are_rejected_by_average_too() {
        let table = EmissionTable::new(vec![
            EmissionRecord::new("Laos", 2018, 3.0),
            EmissionRecord::new("Laos", 2019, 3.5),
            EmissionRecord::new("Brunei", 2019, 17.0),
            EmissionRecord::new("LAOS", 2019, 3.6),
        ]);
        assert!(matches!(
            table.average_series(),
            Err(DatasetError::Series(ForecastError::InvalidSeries(_)))
        ));
        assert!(matches!(
            table.series(&SeriesLabel::Aggregate),
            Err(DatasetError::Series(ForecastError::InvalidSeries(_)))
        ));
    }

    #[test]
    fn mixed_case_spellings_form_one_country() {
        let table = EmissionTable::new(vec![
            EmissionRecord::new("Vietnam", 2018, 3.1),
            EmissionRecord::new("Thailand", 2018, 3.8),
            EmissionRecord::new("vietnam", 2019, 3.5),
            EmissionRecord::new("VIETNAM", 2020, 3.7),
        ]);
        assert_eq!(table.countries(), vec!["Thailand", "Vietnam"]);
        let series = table.series_for("Vietnam").unwrap();
        assert_eq!(series.values(), vec![3.1, 3.5, 3.7]);
        assert_eq!(series.label(), &SeriesLabel::Country("Vietnam".into()));
    }

    #[test]
    fn empty_table_has_no_average() {
        assert_eq!(
            EmissionTable::default().average_series().unwrap_err(),
            DatasetError::Empty
        );
    }
}
