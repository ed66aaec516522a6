//! MusicXML format converters
//!
//! This module contains converters for MusicXML format.

pub mod musicxml_to_humdrum;

// Re-export for convenience
pub use musicxml_to_humdrum::{
    convert_musicxml_to_humdrum,
    convert_to_file,
    ConversionError,
    ConversionResult,
    ConversionSettings,
    ParseError,
    SkippedElement,
};
