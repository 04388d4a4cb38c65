use crate::error::ProcessingError;
use csv::ReaderBuilder;
use rustc_hash::FxHashMap as HashMap;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use log::{debug, info, warn};

/// Columns every historical corpus has to carry, in encoding order
pub const REQUIRED_COLUMNS: [&str; 6] = [
    "location",
    "month",
    "temperature_c",
    "humidity_pct",
    "wind_kmh",
    "condition",
];

const NUMERIC_FIELDS: usize = 3;

/// One observed weather row from the historical corpus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalSample {
    pub location: String,
    pub month: u8,
    pub temperature_c: f64,
    pub humidity_pct: f64,
    pub wind_kmh: f64,
    pub condition: String,
}

/// Conditions to find neighbours for; same shape as a sample, minus the label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherQuery {
    pub location: String,
    pub month: u8,
    pub temperature_c: f64,
    pub humidity_pct: f64,
    pub wind_kmh: f64,
}

impl WeatherQuery {
    fn numeric(&self) -> [f64; NUMERIC_FIELDS] {
        [self.temperature_c, self.humidity_pct, self.wind_kmh]
    }
}

impl HistoricalSample {
    fn numeric(&self) -> [f64; NUMERIC_FIELDS] {
        [self.temperature_c, self.humidity_pct, self.wind_kmh]
    }

    /// Strip the label so a sample can be encoded like a query
    pub fn as_query(&self) -> WeatherQuery {
        WeatherQuery {
            location: self.location.clone(),
            month: self.month,
            temperature_c: self.temperature_c,
            humidity_pct: self.humidity_pct,
            wind_kmh: self.wind_kmh,
        }
    }
}

/// Load a historical corpus from a CSV file
pub fn load_samples_csv<P: AsRef<Path>>(path: P) -> Result<Vec<HistoricalSample>, ProcessingError> {
    let path = path.as_ref();
    let file = File::open(path)?;
    read_samples(BufReader::new(file), &path.display().to_string())
}

/// Read a historical corpus from any CSV source
///
/// Process:
/// 1. Check the header row for every required column, reporting all that are missing
/// 2. Parse each data row by column position (extra columns are ignored)
/// 3. Range-check month, humidity and wind, naming the 1-based data row on failure
pub fn read_samples<R: Read>(reader: R, source_name: &str) -> Result<Vec<HistoricalSample>, ProcessingError> {
    let mut csv_reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    let mut positions = [0usize; REQUIRED_COLUMNS.len()];
    let mut missing = Vec::new();
    for (slot, column) in REQUIRED_COLUMNS.iter().enumerate() {
        match headers.iter().position(|h| h == *column) {
            Some(index) => positions[slot] = index,
            None => missing.push(column.to_string()),
        }
    }

    if !missing.is_empty() {
        return Err(ProcessingError::Schema {
            source_name: source_name.to_string(),
            missing,
        });
    }

    let mut samples = Vec::new();
    for (index, record) in csv_reader.records().enumerate() {
        let row = index + 1;
        let record = record?;
        let field = |slot: usize| record.get(positions[slot]).unwrap_or("");

        let sample = HistoricalSample {
            location: field(0).to_string(),
            month: parse_field(field(1), "month", row)?,
            temperature_c: parse_field(field(2), "temperature_c", row)?,
            humidity_pct: parse_field(field(3), "humidity_pct", row)?,
            wind_kmh: parse_field(field(4), "wind_kmh", row)?,
            condition: field(5).to_string(),
        };
        validate_sample(&sample, row)?;
        samples.push(sample);
    }

    info!("Loaded {} historical samples from {}", samples.len(), source_name);
    Ok(samples)
}

fn parse_field<T: std::str::FromStr>(value: &str, column: &str, row: usize) -> Result<T, ProcessingError> {
    value.parse().map_err(|_| ProcessingError::InvalidSample {
        row,
        reason: format!("{} value '{}' is not a number", column, value),
    })
}

fn validate_sample(sample: &HistoricalSample, row: usize) -> Result<(), ProcessingError> {
    let reason = if !(1..=12).contains(&sample.month) {
        Some(format!("month {} is outside 1-12", sample.month))
    } else if !(0.0..=100.0).contains(&sample.humidity_pct) {
        Some(format!("humidity_pct {} is outside 0-100", sample.humidity_pct))
    } else if !(sample.wind_kmh >= 0.0) {
        Some(format!("wind_kmh {} is negative", sample.wind_kmh))
    } else if !sample.temperature_c.is_finite() {
        Some(format!("temperature_c {} is not finite", sample.temperature_c))
    } else {
        None
    };

    match reason {
        Some(reason) => Err(ProcessingError::InvalidSample { row, reason }),
        None => Ok(()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct ColumnStats {
    mean: f64,
    std: f64,
}

impl ColumnStats {
    fn fit(values: impl Iterator<Item = f64> + Clone) -> Self {
        let count = values.clone().count();
        if count == 0 {
            return Self { mean: 0.0, std: 0.0 };
        }
        let mean = values.clone().sum::<f64>() / count as f64;
        let variance = values.map(|v| (v - mean).powi(2)).sum::<f64>() / count as f64;
        Self { mean, std: variance.sqrt() }
    }

    /// Z-score; constant columns and non-finite results contribute 0
    fn standardize(&self, value: f64) -> f64 {
        if self.std == 0.0 {
            return 0.0;
        }
        let z = (value - self.mean) / self.std;
        if z.is_finite() { z } else { 0.0 }
    }
}

/// Fitted one-hot + z-score encoder
///
/// Layout of an encoded vector: one slot per known location, one slot per
/// known month, then standardized temperature, humidity and wind. Both
/// vocabularies are sorted so the layout does not depend on row order.
#[derive(Debug, Clone)]
pub struct FeatureEncoder {
    locations: Vec<String>,
    location_index: HashMap<String, usize>,
    months: Vec<u8>,
    month_index: HashMap<u8, usize>,
    numeric_stats: [ColumnStats; NUMERIC_FIELDS],
}

impl FeatureEncoder {
    /// Learn vocabularies and column statistics from the historical corpus
    pub fn fit(samples: &[HistoricalSample]) -> Result<Self, ProcessingError> {
        if samples.is_empty() {
            return Err(ProcessingError::EmptyCorpus);
        }

        let mut locations: Vec<String> = samples.iter().map(|s| s.location.clone()).collect();
        locations.sort();
        locations.dedup();
        let location_index = locations
            .iter()
            .enumerate()
            .map(|(i, l)| (l.clone(), i))
            .collect();

        let mut months: Vec<u8> = samples.iter().map(|s| s.month).collect();
        months.sort_unstable();
        months.dedup();
        let month_index = months.iter().enumerate().map(|(i, m)| (*m, i)).collect();

        let numeric_stats = [0, 1, 2].map(|column| ColumnStats::fit(samples.iter().map(move |s| s.numeric()[column])));

        info!(
            "Fitted encoder on {} samples ({} locations, {} months)",
            samples.len(),
            locations.len(),
            months.len()
        );

        Ok(Self {
            locations,
            location_index,
            months,
            month_index,
            numeric_stats,
        })
    }

    pub fn dimension(&self) -> usize {
        self.locations.len() + self.months.len() + NUMERIC_FIELDS
    }

    pub fn locations(&self) -> &[String] {
        &self.locations
    }

    pub fn months(&self) -> &[u8] {
        &self.months
    }

    /// Encode a row; unseen categories leave their block all zeros and
    /// non-finite numeric fields encode as 0
    pub fn encode(&self, query: &WeatherQuery) -> Vec<f64> {
        let mut vector = vec![0.0; self.dimension()];

        match self.location_index.get(&query.location) {
            Some(&i) => vector[i] = 1.0,
            None => warn!("Unseen location '{}', encoding as all zeros", query.location),
        }

        let month_offset = self.locations.len();
        match self.month_index.get(&query.month) {
            Some(&i) => vector[month_offset + i] = 1.0,
            None => warn!("Unseen month {}, encoding as all zeros", query.month),
        }

        let numeric_offset = month_offset + self.months.len();
        for (i, (value, stats)) in query.numeric().iter().zip(&self.numeric_stats).enumerate() {
            if !value.is_finite() {
                warn!("Non-finite numeric field {} in query, encoding as 0", i);
            }
            vector[numeric_offset + i] = stats.standardize(*value);
        }

        debug!("Encoded query into {} dimensions", vector.len());
        vector
    }

    pub fn encode_sample(&self, sample: &HistoricalSample) -> Vec<f64> {
        self.encode(&sample.as_query())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(location: &str, month: u8, temperature_c: f64, condition: &str) -> HistoricalSample {
        HistoricalSample {
            location: location.to_string(),
            month,
            temperature_c,
            humidity_pct: 50.0,
            wind_kmh: 10.0,
            condition: condition.to_string(),
        }
    }

    #[test]
    fn test_read_samples_ignores_extra_columns_and_order() {
        let csv = "condition,station,location,month,temperature_c,humidity_pct,wind_kmh\n\
                   Sunny,A1,Pune,4,31.5,40,12\n\
                   Rainy,B2,Mumbai,7,27.0,90,25\n";
        let samples = read_samples(csv.as_bytes(), "inline").unwrap();

        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].location, "Pune");
        assert_eq!(samples[1].condition, "Rainy");
        assert_eq!(samples[1].humidity_pct, 90.0);
    }

    #[test]
    fn test_missing_columns_all_reported() {
        let csv = "location,month,temperature_c\nPune,4,31.5\n";
        let err = read_samples(csv.as_bytes(), "inline").unwrap_err();

        match err {
            ProcessingError::Schema { source_name, missing } => {
                assert_eq!(source_name, "inline");
                assert_eq!(missing, vec!["humidity_pct", "wind_kmh", "condition"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_out_of_range_row_is_rejected_with_row_number() {
        let csv = "location,month,temperature_c,humidity_pct,wind_kmh,condition\n\
                   Pune,4,31.5,40,12,Sunny\n\
                   Pune,13,31.5,40,12,Sunny\n";
        let err = read_samples(csv.as_bytes(), "inline").unwrap_err();
        assert!(matches!(err, ProcessingError::InvalidSample { row: 2, .. }));
    }

    #[test]
    fn test_unparseable_number_is_invalid_sample() {
        let csv = "location,month,temperature_c,humidity_pct,wind_kmh,condition\n\
                   Pune,4,hot,40,12,Sunny\n";
        let err = read_samples(csv.as_bytes(), "inline").unwrap_err();
        assert!(err.to_string().contains("temperature_c"));
    }

    #[test]
    fn test_encoder_layout_and_standardization() {
        let samples = vec![
            sample("Pune", 4, 30.0, "Sunny"),
            sample("Delhi", 1, 10.0, "Foggy"),
        ];
        let encoder = FeatureEncoder::fit(&samples).unwrap();

        assert_eq!(encoder.locations(), &["Delhi".to_string(), "Pune".to_string()]);
        assert_eq!(encoder.months(), &[1, 4]);
        assert_eq!(encoder.dimension(), 7);

        let vector = encoder.encode_sample(&samples[0]);
        assert_eq!(&vector[..4], &[0.0, 1.0, 0.0, 1.0]);
        // mean 20, population std 10
        assert!((vector[4] - 1.0).abs() < 1e-12);
        // humidity and wind are constant, so they contribute nothing
        assert_eq!(vector[5], 0.0);
        assert_eq!(vector[6], 0.0);
    }

    #[test]
    fn test_unseen_location_zeroes_its_block() {
        let samples = vec![sample("Pune", 4, 30.0, "Sunny"), sample("Delhi", 1, 10.0, "Foggy")];
        let encoder = FeatureEncoder::fit(&samples).unwrap();

        let query = WeatherQuery {
            location: "Atlantis".to_string(),
            month: 4,
            temperature_c: 20.0,
            humidity_pct: 50.0,
            wind_kmh: 10.0,
        };
        let vector = encoder.encode(&query);
        assert_eq!(&vector[..2], &[0.0, 0.0]);
        assert_eq!(vector[3], 1.0);
    }

    #[test]
    fn test_non_finite_numeric_fields_encode_as_zero() {
        let samples = vec![sample("Pune", 4, 30.0, "Sunny"), sample("Delhi", 1, 10.0, "Foggy")];
        let encoder = FeatureEncoder::fit(&samples).unwrap();

        let mut query = samples[0].as_query();
        query.temperature_c = f64::NAN;
        assert_eq!(encoder.encode(&query)[4], 0.0);

        query.temperature_c = f64::INFINITY;
        let vector = encoder.encode(&query);
        assert_eq!(vector[4], 0.0);
        assert!(vector.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_empty_corpus_cannot_be_fitted() {
        assert!(matches!(FeatureEncoder::fit(&[]), Err(ProcessingError::EmptyCorpus)));
    }
}
