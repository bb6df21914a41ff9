//! Canonical sample-by-feature dataset and its on-disk CSV form

use crate::error::{DeckError, Result};
use csv::{ReaderBuilder, WriterBuilder};
use ndarray::Array2;

/// Column name reserved for the sample axis in the canonical CSV layout.
pub const SAMPLE_ID_COLUMN: &str = "sample_id";

/// A canonical dataset: rows are samples, columns are features.
///
/// Cells are kept as raw strings so the validator can report missing or
/// non-numeric content precisely; after validation every cell parses as `f64`
/// and [`Dataset::numeric`] cannot fail.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub sample_ids: Vec<String>,
    pub feature_names: Vec<String>,
    /// Row-major cells, `cells[sample][feature]`
    pub cells: Vec<Vec<String>>,
}

impl Dataset {
    /// Get number of samples (rows)
    #[must_use]
    pub fn n_samples(&self) -> usize {
        self.sample_ids.len()
    }

    /// Get number of features (columns)
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    /// Get column index by feature name
    #[must_use]
    pub fn feature_index(&self, name: &str) -> Option<usize> {
        self.feature_names.iter().position(|f| f == name)
    }

    /// Get a feature column as raw strings
    #[must_use]
    pub fn column(&self, index: usize) -> Option<Vec<&str>> {
        if index >= self.n_features() {
            return None;
        }
        Some(
            self.cells
                .iter()
                .filter_map(|row| row.get(index).map(String::as_str))
                .collect(),
        )
    }

    /// Get a feature column parsed as `f64`
    ///
    /// # Errors
    /// Returns `Computation` if the column is absent, a row is too short to
    /// reach it, or any cell fails to parse
    pub fn numeric_column(&self, name: &str) -> Result<Vec<f64>> {
        let idx = self
            .feature_index(name)
            .ok_or_else(|| DeckError::Computation(format!("no column named '{name}'")))?;
        self.cells
            .iter()
            .zip(&self.sample_ids)
            .map(|(row, sample)| {
                let cell = row.get(idx).ok_or_else(|| {
                    DeckError::Computation(format!(
                        "sample '{sample}' has no value in column '{name}'"
                    ))
                })?;
                cell.trim().parse::<f64>().map_err(|_| {
                    DeckError::Computation(format!(
                        "non-numeric cell '{cell}' in column '{name}'"
                    ))
                })
            })
            .collect()
    }

    /// View the whole body as a numeric matrix, samples by features
    ///
    /// # Errors
    /// Returns `Computation` if any cell fails to parse or is non-finite.
    /// Post-validation datasets never hit this path.
    pub fn numeric(&self) -> Result<Array2<f64>> {
        let mut flat = Vec::with_capacity(self.n_samples() * self.n_features());
        for (row, sample) in self.cells.iter().zip(&self.sample_ids) {
            for cell in row {
                let v: f64 = cell.trim().parse().map_err(|_| {
                    DeckError::Computation(format!(
                        "non-numeric cell '{cell}' in sample '{sample}'"
                    ))
                })?;
                if !v.is_finite() {
                    return Err(DeckError::Computation(format!(
                        "non-finite value in sample '{sample}'"
                    )));
                }
                flat.push(v);
            }
        }
        Array2::from_shape_vec((self.n_samples(), self.n_features()), flat)
            .map_err(|e| DeckError::Computation(format!("bad matrix shape: {e}")))
    }

    /// Serialize to the canonical on-disk CSV form:
    /// header `sample_id,<features...>`, one row per sample.
    ///
    /// # Errors
    /// Returns error if CSV serialization fails
    pub fn to_canonical_csv(&self) -> Result<Vec<u8>> {
        let mut writer = WriterBuilder::new().from_writer(Vec::new());

        let mut header = Vec::with_capacity(self.n_features() + 1);
        header.push(SAMPLE_ID_COLUMN.to_string());
        header.extend(self.feature_names.iter().cloned());
        writer.write_record(&header)?;

        for (sample, row) in self.sample_ids.iter().zip(&self.cells) {
            let mut record = Vec::with_capacity(row.len() + 1);
            record.push(sample.clone());
            record.extend(row.iter().cloned());
            writer.write_record(&record)?;
        }

        writer
            .into_inner()
            .map_err(|e| DeckError::Parse(format!("CSV writer flush failed: {e}")))
    }

    /// Parse the canonical on-disk CSV form back into a dataset
    ///
    /// # Errors
    /// Returns `Parse` if the header row is missing or malformed
    pub fn from_canonical_csv(bytes: &[u8]) -> Result<Self> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(bytes);

        let headers = reader.headers()?.clone();
        let mut fields = headers.iter();
        match fields.next() {
            Some(SAMPLE_ID_COLUMN) => {}
            _ => {
                return Err(DeckError::Parse(format!(
                    "canonical CSV must start with a '{SAMPLE_ID_COLUMN}' column"
                )))
            }
        }
        let feature_names: Vec<String> = fields.map(String::from).collect();

        let mut sample_ids = Vec::new();
        let mut cells = Vec::new();
        for record in reader.records() {
            let record = record?;
            let mut iter = record.iter();
            let sample = iter
                .next()
                .ok_or_else(|| DeckError::Parse("empty row in canonical CSV".into()))?;
            sample_ids.push(sample.to_string());
            cells.push(iter.map(String::from).collect());
        }

        Ok(Self {
            sample_ids,
            feature_names,
            cells,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_dataset() -> Dataset {
        Dataset {
            sample_ids: vec!["s1".into(), "s2".into()],
            feature_names: vec!["g1".into(), "g2".into()],
            cells: vec![
                vec!["1.5".into(), "2.0".into()],
                vec!["3.25".into(), "4.0".into()],
            ],
        }
    }

    #[test]
    fn test_numeric_matrix() {
        let ds = sample_dataset();
        let m = ds.numeric().expect("numeric view");
        assert_eq!(m.shape(), &[2, 2]);
        assert!((m[[1, 0]] - 3.25).abs() < 1e-12);
    }

    #[test]
    fn test_numeric_rejects_bad_cell() {
        let mut ds = sample_dataset();
        ds.cells[0][1] = "oops".into();
        assert!(ds.numeric().is_err());
    }

    #[test]
    fn test_canonical_round_trip() {
        let ds = sample_dataset();
        let bytes = ds.to_canonical_csv().expect("serialize");
        let back = Dataset::from_canonical_csv(&bytes).expect("parse");
        assert_eq!(ds, back);
    }

    #[test]
    fn test_canonical_header_required() {
        let bytes = b"id,g1\ns1,1.0\n";
        assert!(Dataset::from_canonical_csv(bytes).is_err());
    }

    #[test]
    fn test_numeric_column_by_name() {
        let ds = sample_dataset();
        let col = ds.numeric_column("g2").expect("column");
        assert_eq!(col, vec![2.0, 4.0]);
    }

    #[test]
    fn test_numeric_column_reports_short_row() {
        // A stored CSV truncated mid-row parses leniently; the short row must
        // surface as an error, not an index panic
        let bytes = b"sample_id,g1,g2\ns1,1.0,2.0\ns2,3.0\n";
        let ds = Dataset::from_canonical_csv(bytes).expect("parse");
        let err = ds.numeric_column("g2").unwrap_err();
        assert!(matches!(err, DeckError::Computation(_)));
    }
}
