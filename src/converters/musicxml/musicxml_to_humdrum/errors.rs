//! Error types for MusicXML to Humdrum conversion
//!
//! Fatal problems (unreadable XML, parts that disagree on measure count,
//! a non-positive `<divisions>`) abort the conversion. Anything the
//! converter merely cannot express is reported as a `SkippedElement`
//! instead.

use thiserror::Error;

use crate::grid::{DurationError, GridError};

/// Top-level conversion error type
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversionError {
    /// Fatal XML parsing error
    #[error("XML parsing failed: {0}")]
    ParseError(#[from] ParseError),

    /// Parts must all report the same number of measures
    #[error("Part {part_id} has {found} measures, expected {expected}")]
    MeasureCountMismatch {
        part_id: String,
        expected: usize,
        found: usize,
    },

    /// `<divisions>` must be a positive tick count
    #[error("Invalid divisions value: {0} (must be positive)")]
    InvalidDivisions(i64),

    /// Internal conversion error (should be rare, indicates a bug)
    #[error("Internal conversion error: {0}")]
    InternalError(String),
}

/// Fatal XML parsing errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// XML is malformed (not well-formed)
    #[error("Invalid XML: {0}")]
    InvalidXml(String),

    /// MusicXML format not supported (e.g., timewise instead of partwise)
    #[error("Unsupported MusicXML format: {0}")]
    UnsupportedFormat(String),

    /// Required structural element is missing
    #[error("Missing required element: {0}")]
    MissingRequiredElement(String),

    /// Element present but its content cannot be used
    #[error("Invalid value for {element}: {value}")]
    InvalidValue { element: String, value: String },
}

impl From<DurationError> for ConversionError {
    fn from(err: DurationError) -> Self {
        match err {
            DurationError::NonPositiveTicksPerQuarter(ticks) => ConversionError::InvalidDivisions(ticks),
        }
    }
}

impl From<GridError> for ConversionError {
    fn from(err: GridError) -> Self {
        ConversionError::InternalError(err.to_string())
    }
}
