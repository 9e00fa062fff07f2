//! River monitoring CSV reader.
use std::io::Read;
use std::path::Path;

use csv::StringRecord;

use crate::data_handling::{LabeledSamples, WaterSample, FEATURE_NAMES, N_BASE_FEATURES};
use crate::error::{EnsembleError, Result};

/// Configuration for reading river monitoring CSV files.
#[derive(Debug, Clone)]
pub struct RiverCsvConfig {
    /// Column holding the river status class.
    pub label_column: String,
    /// Header names for the eight measurements, in `FEATURE_NAMES` order.
    pub feature_columns: Vec<String>,
    pub delimiter: u8,
}

impl Default for RiverCsvConfig {
    fn default() -> Self {
        Self {
            label_column: "RIVER STATUS".to_string(),
            feature_columns: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            delimiter: b',',
        }
    }
}

/// Read a river monitoring CSV with the default column names.
pub fn read_river_csv<P: AsRef<Path>>(path: P) -> Result<LabeledSamples> {
    read_river_csv_with_config(path, &RiverCsvConfig::default())
}

/// Read a river monitoring CSV using a custom configuration.
///
/// Values such as `<0.01` have the inequality marker stripped before parsing.
/// Rows with a missing, unparseable or non-finite measurement, or an empty
/// label, are dropped; the number of dropped rows is logged.
pub fn read_river_csv_with_config<P: AsRef<Path>>(
    path: P,
    config: &RiverCsvConfig,
) -> Result<LabeledSamples> {
    let reader = csv::ReaderBuilder::new()
        .delimiter(config.delimiter)
        .has_headers(true)
        .flexible(true)
        .from_path(&path)?;
    let data = read_records(reader, config)?;
    log::info!(
        "Loaded {} samples from {}",
        data.len(),
        path.as_ref().display()
    );
    Ok(data)
}

pub(crate) fn read_records<R: Read>(
    mut reader: csv::Reader<R>,
    config: &RiverCsvConfig,
) -> Result<LabeledSamples> {
    if config.feature_columns.len() != N_BASE_FEATURES {
        return Err(EnsembleError::InvalidConfig(format!(
            "expected {} feature columns, got {}",
            N_BASE_FEATURES,
            config.feature_columns.len()
        )));
    }

    let headers = reader.headers()?.clone();
    let label_idx = find_column(&headers, &config.label_column)
        .ok_or_else(|| EnsembleError::MissingField(config.label_column.clone()))?;
    let feature_indices = config
        .feature_columns
        .iter()
        .map(|name| {
            find_column(&headers, name).ok_or_else(|| EnsembleError::MissingField(name.clone()))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut data = LabeledSamples::default();
    let mut dropped = 0usize;
    for result in reader.records() {
        let record = result?;
        let label = record.get(label_idx).map(str::trim).unwrap_or_default();
        let values: Option<Vec<f64>> = feature_indices
            .iter()
            .map(|&idx| record.get(idx).and_then(parse_measurement))
            .collect();

        match values {
            Some(values) if !label.is_empty() => match WaterSample::from_slice(&values) {
                Ok(sample) => data.push(sample, label),
                Err(_) => dropped += 1,
            },
            _ => dropped += 1,
        }
    }

    if dropped > 0 {
        log::warn!("Dropped {} rows with missing or non-numeric values", dropped);
    }
    Ok(data)
}

/// Parse one measurement, stripping `<` detection-limit markers.
fn parse_measurement(raw: &str) -> Option<f64> {
    let cleaned = raw.trim().replace('<', "");
    cleaned
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

/// Collapse runs of whitespace so `RIVER  STATUS ` matches `RIVER STATUS`.
fn normalize_header(header: &str) -> String {
    header.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn find_column(headers: &StringRecord, name: &str) -> Option<usize> {
    let name = normalize_header(name);
    headers
        .iter()
        .position(|header| normalize_header(header).eq_ignore_ascii_case(&name))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reader(text: &str) -> csv::Reader<&[u8]> {
        csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(text.as_bytes())
    }

    #[test]
    fn strips_inequality_markers_and_drops_bad_rows() {
        let text = "\
DO,DO_Sat,BOD,COD,SS,pH,NH3N,TEMP,RIVER STATUS
6.0,80,<1,12,20,7.0,0.10,28,Clean
5.5,70,2,n/a,25,7.1,0.30,29,Slightly Polluted
2.0,25,9,60,300,6.5,<0.01,30,Polluted
3.0,40,6,40,90,6.8,1.2,29,
";
        let data = read_records(reader(text), &RiverCsvConfig::default()).unwrap();
        assert_eq!(data.len(), 2);
        assert_eq!(data.labels, vec!["Clean", "Polluted"]);
        assert_eq!(data.samples[0].bod, 1.0);
        assert_eq!(data.samples[1].ammoniacal_nitrogen, 0.01);
    }

    #[test]
    fn missing_label_column_is_reported() {
        let text = "DO,DO_SAT,BOD,COD,SS,pH,NH3N,TEMP\n1,2,3,4,5,6,7,8\n";
        let err = read_records(reader(text), &RiverCsvConfig::default()).unwrap_err();
        assert!(matches!(err, EnsembleError::MissingField(ref c) if c == "RIVER STATUS"));
    }

    #[test]
    fn parse_measurement_rejects_garbage() {
        assert_eq!(parse_measurement(" <0.5 "), Some(0.5));
        assert_eq!(parse_measurement("ND"), None);
        assert_eq!(parse_measurement("NaN"), None);
    }
}
