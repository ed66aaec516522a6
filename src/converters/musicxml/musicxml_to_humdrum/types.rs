//! Public API types for MusicXML to Humdrum conversion

use serde::{Deserialize, Serialize};

/// Result of MusicXML to Humdrum conversion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionResult {
    /// Generated Humdrum document, newline-terminated lines
    pub humdrum_source: String,

    /// List of elements that couldn't be converted
    pub skipped_elements: Vec<SkippedElement>,
}

/// Information about a skipped/unsupported element
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedElement {
    /// MusicXML element tag name (e.g., "figured-bass")
    pub element_type: String,

    /// Measure number where element appears (if in measure context)
    pub measure_number: Option<i64>,

    /// Part ID where element appears (if in part context)
    pub part_id: Option<String>,

    /// Human-readable explanation of why skipped
    pub reason: String,
}

/// Configuration options for conversion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionSettings {
    /// Emit a leading `**recip` column with the duration of every line
    pub recip_spine: bool,

    /// Emit one `**text` column per lyric verse
    pub convert_lyrics: bool,

    /// Emit `<direction>` words as layout comments
    pub convert_directions: bool,

    /// Joins chord members inside one token
    pub chord_separator: String,
}

impl Default for ConversionSettings {
    fn default() -> Self {
        Self {
            recip_spine: false,
            convert_lyrics: true,
            convert_directions: true,
            chord_separator: " ".to_string(),
        }
    }
}

// ============================================================================
// MUSICAL ATTRIBUTE TYPES
// ============================================================================

/// Written pitch of a note
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pitch {
    /// Diatonic step letter, upper case (`C`..`B`)
    pub step: char,
    /// Chromatic alteration in semitones (`-1` flat, `1` sharp)
    pub alter: i32,
    pub octave: i32,
}

/// Clef sign, staff line and octave transposition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClefSpec {
    pub sign: String,
    pub line: Option<i32>,
    pub octave_change: i32,
}

/// Time signature as written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeSpec {
    /// May be additive, e.g. `3+2`
    pub beats: String,
    pub beat_type: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_partial_json_uses_defaults() {
        let settings: ConversionSettings = serde_json::from_str(r#"{"recip_spine": true}"#).unwrap();
        assert!(settings.recip_spine);
        assert!(settings.convert_lyrics);
        assert_eq!(settings.chord_separator, " ");
    }

    #[test]
    fn test_result_serializes_to_json() {
        let result = ConversionResult {
            humdrum_source: "**kern\n*-\n".to_string(),
            skipped_elements: vec![SkippedElement {
                element_type: "harmony".to_string(),
                measure_number: Some(3),
                part_id: Some("P1".to_string()),
                reason: "Chord symbols are not converted".to_string(),
            }],
        };
        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("\"humdrum_source\""));
        assert!(json.contains("\"measure_number\":3"));
    }
}
