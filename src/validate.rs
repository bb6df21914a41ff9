//! Structural validation of canonical datasets before they are accepted

use crate::dataset::Dataset;
use crate::error::Result;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Reserved clinical column: event indicator, 0 = censored, 1 = event
pub const EVENT_COLUMN: &str = "event";
/// Reserved clinical column: non-negative event time
pub const TIME_COLUMN: &str = "time";

/// What an uploaded dataset claims to be
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Omics,
    Clinical,
}

impl FileKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Omics => "omics",
            Self::Clinical => "clinical",
        }
    }
}

/// Specific, enumerable reasons a dataset is rejected
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationFailure {
    #[error("dataset has no feature columns")]
    NoColumns,

    #[error("duplicate sample identifiers: {}", .0.join(", "))]
    DuplicateSamples(Vec<String>),

    #[error("duplicate feature identifiers: {}", .0.join(", "))]
    DuplicateFeatures(Vec<String>),

    #[error("{0} missing cell(s)")]
    MissingCells(usize),

    #[error("non-numeric columns: {}", .0.join(", "))]
    NonNumericColumns(Vec<String>),

    #[error("clinical dataset missing reserved columns: {}", .0.join(", "))]
    MissingClinicalColumns(Vec<String>),

    #[error("event indicator column '{EVENT_COLUMN}' must contain only 0 or 1, found '{0}'")]
    BadEventIndicator(String),

    #[error("event time column '{TIME_COLUMN}' must be non-negative, found '{0}'")]
    NegativeEventTime(String),
}

/// Validate a dataset for the given kind. Strict and non-recoverable: the
/// first failed check rejects the whole dataset, nothing is repaired.
///
/// # Errors
/// Returns `Validation` with the specific [`ValidationFailure`]
pub fn validate(dataset: &Dataset, kind: FileKind) -> Result<()> {
    if dataset.n_features() == 0 {
        return Err(ValidationFailure::NoColumns.into());
    }

    let dup_samples = duplicates(&dataset.sample_ids);
    if !dup_samples.is_empty() {
        return Err(ValidationFailure::DuplicateSamples(dup_samples).into());
    }

    let dup_features = duplicates(&dataset.feature_names);
    if !dup_features.is_empty() {
        return Err(ValidationFailure::DuplicateFeatures(dup_features).into());
    }

    match kind {
        FileKind::Omics => validate_omics(dataset),
        FileKind::Clinical => validate_clinical(dataset),
    }
}

fn validate_omics(dataset: &Dataset) -> Result<()> {
    let missing = dataset
        .cells
        .iter()
        .flatten()
        .filter(|cell| cell.trim().is_empty())
        .count();
    if missing > 0 {
        return Err(ValidationFailure::MissingCells(missing).into());
    }

    // A column is non-numeric if any cell in it fails to parse
    let bad_columns: Vec<String> = dataset
        .feature_names
        .iter()
        .enumerate()
        .filter(|(i, _)| {
            dataset.column(*i).is_some_and(|col| {
                col.iter().any(|cell| cell.trim().parse::<f64>().is_err())
            })
        })
        .map(|(_, name)| name.clone())
        .collect();
    if !bad_columns.is_empty() {
        return Err(ValidationFailure::NonNumericColumns(bad_columns).into());
    }

    Ok(())
}

fn validate_clinical(dataset: &Dataset) -> Result<()> {
    let missing: Vec<String> = [EVENT_COLUMN, TIME_COLUMN]
        .iter()
        .filter(|name| dataset.feature_index(name).is_none())
        .map(|name| (*name).to_string())
        .collect();
    if !missing.is_empty() {
        return Err(ValidationFailure::MissingClinicalColumns(missing).into());
    }

    for name in [EVENT_COLUMN, TIME_COLUMN] {
        // Presence checked above
        let Some(idx) = dataset.feature_index(name) else {
            continue;
        };
        let bad = dataset
            .column(idx)
            .into_iter()
            .flatten()
            .any(|cell| cell.trim().parse::<f64>().is_err());
        if bad {
            return Err(ValidationFailure::NonNumericColumns(vec![name.to_string()]).into());
        }
    }

    let events = dataset.numeric_column(EVENT_COLUMN)?;
    if let Some(bad) = events.iter().find(|v| **v != 0.0 && **v != 1.0) {
        return Err(ValidationFailure::BadEventIndicator(bad.to_string()).into());
    }

    let times = dataset.numeric_column(TIME_COLUMN)?;
    if let Some(bad) = times.iter().find(|v| **v < 0.0 || !v.is_finite()) {
        return Err(ValidationFailure::NegativeEventTime(bad.to_string()).into());
    }

    Ok(())
}

/// Identifiers appearing more than once, in first-seen order
fn duplicates(ids: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut dups = Vec::new();
    for id in ids {
        if !seen.insert(id.as_str()) && !dups.contains(id) {
            dups.push(id.clone());
        }
    }
    dups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DeckError;

    fn omics_dataset() -> Dataset {
        Dataset {
            sample_ids: vec!["s1".into(), "s2".into()],
            feature_names: vec!["g1".into(), "g2".into()],
            cells: vec![
                vec!["1.0".into(), "2.0".into()],
                vec!["3.0".into(), "4.0".into()],
            ],
        }
    }

    fn clinical_dataset() -> Dataset {
        Dataset {
            sample_ids: vec!["s1".into(), "s2".into()],
            feature_names: vec!["event".into(), "time".into()],
            cells: vec![
                vec!["1".into(), "10.0".into()],
                vec!["0".into(), "20.0".into()],
            ],
        }
    }

    #[test]
    fn test_valid_omics_passes() {
        validate(&omics_dataset(), FileKind::Omics).expect("valid");
    }

    #[test]
    fn test_duplicate_sample_reported_by_name() {
        let mut ds = omics_dataset();
        ds.sample_ids[1] = "s1".into();
        let err = validate(&ds, FileKind::Omics).unwrap_err();
        match err {
            DeckError::Validation(ValidationFailure::DuplicateSamples(dups)) => {
                assert_eq!(dups, vec!["s1"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_duplicate_feature_reported_by_name() {
        let mut ds = omics_dataset();
        ds.feature_names[1] = "g1".into();
        let err = validate(&ds, FileKind::Omics).unwrap_err();
        assert!(matches!(
            err,
            DeckError::Validation(ValidationFailure::DuplicateFeatures(_))
        ));
    }

    #[test]
    fn test_missing_cells_counted() {
        let mut ds = omics_dataset();
        ds.cells[0][0] = String::new();
        ds.cells[1][1] = " ".into();
        let err = validate(&ds, FileKind::Omics).unwrap_err();
        assert!(matches!(
            err,
            DeckError::Validation(ValidationFailure::MissingCells(2))
        ));
    }

    #[test]
    fn test_non_numeric_column_named() {
        let mut ds = omics_dataset();
        ds.cells[1][1] = "high".into();
        let err = validate(&ds, FileKind::Omics).unwrap_err();
        match err {
            DeckError::Validation(ValidationFailure::NonNumericColumns(cols)) => {
                assert_eq!(cols, vec!["g2"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_no_columns_rejected() {
        let ds = Dataset {
            sample_ids: vec!["s1".into()],
            feature_names: vec![],
            cells: vec![vec![]],
        };
        let err = validate(&ds, FileKind::Omics).unwrap_err();
        assert!(matches!(
            err,
            DeckError::Validation(ValidationFailure::NoColumns)
        ));
    }

    #[test]
    fn test_valid_clinical_passes() {
        validate(&clinical_dataset(), FileKind::Clinical).expect("valid");
    }

    #[test]
    fn test_clinical_requires_reserved_columns() {
        let mut ds = clinical_dataset();
        ds.feature_names[0] = "status".into();
        let err = validate(&ds, FileKind::Clinical).unwrap_err();
        match err {
            DeckError::Validation(ValidationFailure::MissingClinicalColumns(cols)) => {
                assert_eq!(cols, vec!["event"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_event_indicator_must_be_binary() {
        let mut ds = clinical_dataset();
        ds.cells[0][0] = "2".into();
        let err = validate(&ds, FileKind::Clinical).unwrap_err();
        assert!(matches!(
            err,
            DeckError::Validation(ValidationFailure::BadEventIndicator(_))
        ));
    }

    #[test]
    fn test_event_time_must_be_non_negative() {
        let mut ds = clinical_dataset();
        ds.cells[1][1] = "-5".into();
        let err = validate(&ds, FileKind::Clinical).unwrap_err();
        assert!(matches!(
            err,
            DeckError::Validation(ValidationFailure::NegativeEventTime(_))
        ));
    }
}
