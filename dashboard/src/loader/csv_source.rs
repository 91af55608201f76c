use anyhow::{bail, Context};
use co2core::dataset::EmissionRecord;
use log::info;
use std::io::Read;
use std::path::Path;

/// Reads `country,year,co2_per_capita[,latitude,longitude]` rows.
pub fn read_records<R: Read>(input: R, source: &str) -> anyhow::Result<Vec<EmissionRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(input);

    let mut records = Vec::new();
    for (idx, row) in reader.deserialize::<EmissionRecord>().enumerate() {
        // Header is line 1.
        let record = row.with_context(|| format!("parsing line {} of {}", idx + 2, source))?;
        records.push(record);
    }

    if records.is_empty() {
        bail!("{} contains no emission rows", source);
    }

    info!("loaded {} emission rows from {}", records.len(), source);
    Ok(records)
}

pub fn load_records<P: AsRef<Path>>(path: P) -> anyhow::Result<Vec<EmissionRecord>> {
    let path_ref = path.as_ref();
    let file = std::fs::File::open(path_ref)
        .with_context(|| format!("opening emissions data {}", path_ref.display()))?;
    read_records(file, &path_ref.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn load_reads_required_columns() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(b"country,year,co2_per_capita\nLaos, 2019 ,3.5\nBrunei,2019,17.0\n")
            .unwrap();
        let path = temp.into_temp_path();
        let records = load_records(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0], EmissionRecord::new("Laos", 2019, 3.5));
        assert_eq!(records[1].location(), None);
    }

    #[test]
    fn optional_coordinates_are_kept() {
        let data = "country,year,co2_per_capita,latitude,longitude\n\
                    Vietnam,2020,3.7,14.1,108.3\n\
                    Laos,2020,3.4,,\n";
        let records = read_records(data.as_bytes(), "inline").unwrap();
        let location = records[0].location().unwrap();
        assert!((location.latitude - 14.1).abs() < 1e-9);
        assert_eq!(records[1].location(), None);
    }

    #[test]
    fn malformed_row_reports_line() {
        let data = "country,year,co2_per_capita\nLaos,2019,3.5\nLaos,twenty,3.6\n";
        let err = read_records(data.as_bytes(), "inline").unwrap_err();
        assert!(format!("{:#}", err).contains("line 3 of inline"));
    }

    #[test]
    fn header_only_file_is_rejected() {
        let err = read_records("country,year,co2_per_capita\n".as_bytes(), "inline").unwrap_err();
        assert!(err.to_string().contains("no emission rows"));
    }

    #[test]
    fn missing_file_has_context() {
        let err = load_records("does/not/exist.csv").unwrap_err();
        assert!(err.to_string().contains("opening emissions data"));
    }
}
