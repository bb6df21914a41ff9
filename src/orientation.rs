//! Raw table orientation tags and their layout triples

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// How a raw upload is laid out: which axis holds samples and which axes
/// carry names. Twelve tags: the eight layout combinations plus four
/// file-type-conventional aliases the upload UI exposes. Every tag resolves
/// to one [`Layout`] triple in a single exhaustive match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Orientation {
    /// Rows are samples; header row of feature names, index column of sample ids
    SampleRowsBoth,
    /// Rows are samples; header row of feature names, no sample ids
    SampleRowsFeatures,
    /// Rows are samples; index column of sample ids, no feature names
    SampleRowsSamples,
    /// Rows are samples; no names on either axis
    SampleRowsPlain,
    /// Rows are features; header row of sample ids, index column of feature names
    FeatureRowsBoth,
    /// Rows are features; header row of sample ids, no feature names
    FeatureRowsSamples,
    /// Rows are features; index column of feature names, no sample ids
    FeatureRowsFeatures,
    /// Rows are features; no names on either axis
    FeatureRowsPlain,
    /// Conventional omics export: features in rows, both axes named
    OmicsMatrix,
    /// Bare omics matrix: features in rows, no names
    OmicsPlain,
    /// Conventional clinical table: samples in rows, both axes named
    ClinicalTable,
    /// Bare clinical table: samples in rows, no names
    ClinicalPlain,
}

/// Parse-time consequences of an orientation tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    /// First raw row holds names for the column axis
    pub has_header: bool,
    /// First raw column holds names for the row axis
    pub has_index: bool,
    /// Raw table is feature-major and must be transposed to sample-major
    pub transpose: bool,
}

impl Orientation {
    #[must_use]
    pub const fn layout(self) -> Layout {
        let (has_header, has_index, transpose) = match self {
            Self::SampleRowsBoth | Self::ClinicalTable => (true, true, false),
            Self::SampleRowsFeatures => (true, false, false),
            Self::SampleRowsSamples => (false, true, false),
            Self::SampleRowsPlain | Self::ClinicalPlain => (false, false, false),
            Self::FeatureRowsBoth | Self::OmicsMatrix => (true, true, true),
            Self::FeatureRowsSamples => (true, false, true),
            Self::FeatureRowsFeatures => (false, true, true),
            Self::FeatureRowsPlain | Self::OmicsPlain => (false, false, true),
        };
        Layout {
            has_header,
            has_index,
            transpose,
        }
    }

    /// All twelve tags, for exhaustive tests and UI enumeration
    pub const ALL: [Self; 12] = [
        Self::SampleRowsBoth,
        Self::SampleRowsFeatures,
        Self::SampleRowsSamples,
        Self::SampleRowsPlain,
        Self::FeatureRowsBoth,
        Self::FeatureRowsSamples,
        Self::FeatureRowsFeatures,
        Self::FeatureRowsPlain,
        Self::OmicsMatrix,
        Self::OmicsPlain,
        Self::ClinicalTable,
        Self::ClinicalPlain,
    ];
}
