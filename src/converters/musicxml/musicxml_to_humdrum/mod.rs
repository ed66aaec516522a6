//! MusicXML to Humdrum converter module
//!
//! Converts partwise MusicXML documents to Humdrum `**kern` text.
//!
//! # Overview
//!
//! The converter follows a four-stage pipeline:
//! 1. **Parse**: Parse MusicXML using roxmltree (zero-copy)
//! 2. **Extract**: Walk each part and render timed events to token text
//! 3. **Stitch**: Merge simultaneous events of all parts into grid slices
//! 4. **Serialize**: Finalize the grid (sustains, barlines, spine
//!    manipulators) and write one line per slice
//!
//! # Basic Usage
//!
//! ```ignore
//! use musicxml2hum::converters::musicxml::convert_musicxml_to_humdrum;
//!
//! let musicxml = r#"<?xml version="1.0"?>
//! <score-partwise>
//!   <part-list><score-part id="P1"/></part-list>
//!   <part id="P1">
//!     <measure number="1">
//!       <attributes>
//!         <divisions>1</divisions>
//!       </attributes>
//!       <note>
//!         <pitch><step>C</step><octave>4</octave></pitch>
//!         <duration>4</duration>
//!         <type>whole</type>
//!       </note>
//!     </measure>
//!   </part>
//! </score-partwise>"#;
//!
//! let result = convert_musicxml_to_humdrum(musicxml, None)?;
//! println!("{}", result.humdrum_source);
//! ```

pub mod errors;
pub mod events;
pub mod kern;
pub mod parser;
pub mod stitch;
pub mod types;

// Re-export main API
pub use errors::{ConversionError, ParseError};
pub use types::{ConversionResult, ConversionSettings, SkippedElement};

use log::debug;

use crate::grid::HumdrumFile;

/// Convert a MusicXML document to a Humdrum document.
///
/// # Arguments
///
/// * `musicxml` - partwise MusicXML document as string
/// * `settings` - Optional conversion settings (uses defaults if None)
///
/// # Returns
///
/// * `Ok(ConversionResult)` - Humdrum text and the list of skipped elements
/// * `Err(ConversionError)` - Fatal error; no document is produced
pub fn convert_musicxml_to_humdrum(
    musicxml: &str,
    settings: Option<ConversionSettings>,
) -> Result<ConversionResult, ConversionError> {
    let (file, skipped_elements) = convert_to_file(musicxml, settings)?;
    Ok(ConversionResult {
        humdrum_source: file.to_string(),
        skipped_elements,
    })
}

/// Same as [`convert_musicxml_to_humdrum`], returning the structured line
/// sink (for writing to a file) alongside the skipped elements.
pub fn convert_to_file(
    musicxml: &str,
    settings: Option<ConversionSettings>,
) -> Result<(HumdrumFile, Vec<SkippedElement>), ConversionError> {
    use events::{extract_part, ExtractionContext};
    use parser::XmlDocument;
    use stitch::stitch_parts;

    // Use provided settings or defaults
    let settings = settings.unwrap_or_default();

    // Parse XML document
    let doc = XmlDocument::parse(musicxml)?;
    let part_list = doc.extract_part_list();
    let part_nodes = doc.extract_parts()?;

    let mut all_skipped_elements = Vec::new();

    // Order parts as declared in <part-list>; fall back to document order
    let mut ordered: Vec<parser::PartNode> = Vec::new();
    if part_list.is_empty() {
        ordered.extend(part_nodes.iter().copied());
    } else {
        for score_part in &part_list {
            if ordered.iter().any(|p| p.get_part_id() == score_part.id) {
                continue;
            }
            match part_nodes.iter().find(|p| p.get_part_id() == score_part.id) {
                Some(node) => ordered.push(*node),
                None => all_skipped_elements.push(SkippedElement {
                    element_type: "score-part".to_string(),
                    measure_number: None,
                    part_id: Some(score_part.id.clone()),
                    reason: "Declared in part-list but has no part content".to_string(),
                }),
            }
        }
        for node in &part_nodes {
            let id = node.get_part_id();
            if !part_list.iter().any(|p| p.id == id) {
                all_skipped_elements.push(SkippedElement {
                    element_type: "part".to_string(),
                    measure_number: None,
                    part_id: Some(id),
                    reason: "Part is not declared in part-list".to_string(),
                });
            }
        }
    }

    // Extract each part
    let mut parts = Vec::new();
    for (index, part) in ordered.into_iter().enumerate() {
        let mut context = ExtractionContext::new(part.get_part_id(), index, &settings);
        parts.push(extract_part(part, &mut context)?);
        all_skipped_elements.extend(context.skipped_elements);
    }

    // Build and serialize the grid
    let grid = stitch_parts(&parts, &settings)?;
    let mut file = HumdrumFile::new();
    grid.transfer_tokens(&mut file);

    debug!(
        "converted {} parts into {} lines ({} skipped elements)",
        parts.len(),
        file.line_count(),
        all_skipped_elements.len()
    );

    Ok((file, all_skipped_elements))
}
