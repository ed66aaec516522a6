//! XML parsing layer for MusicXML documents
//!
//! Thin wrappers around roxmltree: the score root, the part list, part and
//! measure nodes, plus parsers for the attribute elements the converter
//! renders (pitch, key, time, clef, divisions).

use roxmltree::{Document, Node, ParsingOptions};

use crate::converters::musicxml::musicxml_to_humdrum::errors::ParseError;
use crate::converters::musicxml::musicxml_to_humdrum::types::{ClefSpec, Pitch, TimeSpec};

// ============================================================================
// XML DOCUMENT WRAPPER
// ============================================================================

/// Wrapper around roxmltree::Document for MusicXML parsing
pub struct XmlDocument<'input> {
    doc: Document<'input>,
}

/// One `<score-part>` entry of the `<part-list>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScorePart {
    pub id: String,
    pub name: Option<String>,
}

impl<'input> XmlDocument<'input> {
    /// Parse XML string into XmlDocument
    pub fn parse(xml: &'input str) -> Result<Self, ParseError> {
        // MusicXML files normally carry a DOCTYPE; roxmltree rejects it by default
        let mut options = ParsingOptions::default();
        options.allow_dtd = true;
        let doc = Document::parse_with_options(xml, options)
            .map_err(|e| ParseError::InvalidXml(format!("XML parse error: {}", e)))?;
        Ok(Self { doc })
    }

    /// Get the root score-partwise element
    pub fn get_score_partwise(&self) -> Result<Node<'_, 'input>, ParseError> {
        let root = self.doc.root_element();

        if root.tag_name().name() != "score-partwise" {
            return Err(ParseError::UnsupportedFormat(format!(
                "Expected score-partwise, found {}",
                root.tag_name().name()
            )));
        }

        Ok(root)
    }

    /// `<score-part>` entries in declaration order
    pub fn extract_part_list(&self) -> Vec<ScorePart> {
        let Ok(score) = self.get_score_partwise() else {
            return Vec::new();
        };
        let Some(part_list) = get_child(score, "part-list") else {
            return Vec::new();
        };

        part_list
            .children()
            .filter(|n| n.is_element() && n.tag_name().name() == "score-part")
            .filter_map(|n| {
                let id = n.attribute("id")?;
                Some(ScorePart {
                    id: id.to_string(),
                    name: get_child_text(n, "part-name").map(|s| s.trim().to_string()),
                })
            })
            .collect()
    }

    /// Extract all `<part>` elements in document order
    pub fn extract_parts(&self) -> Result<Vec<PartNode<'_, 'input>>, ParseError> {
        let score = self.get_score_partwise()?;

        let parts: Vec<PartNode> = score
            .children()
            .filter(|n| n.is_element() && n.tag_name().name() == "part")
            .map(PartNode::new)
            .collect();

        if parts.is_empty() {
            return Err(ParseError::MissingRequiredElement(
                "No parts found in score".to_string(),
            ));
        }

        Ok(parts)
    }
}

// ============================================================================
// PART AND MEASURE NODES
// ============================================================================

/// Wrapper around a MusicXML <part> element
#[derive(Clone, Copy)]
pub struct PartNode<'a, 'input> {
    node: Node<'a, 'input>,
}

impl<'a, 'input> PartNode<'a, 'input> {
    pub fn new(node: Node<'a, 'input>) -> Self {
        Self { node }
    }

    /// Get the part ID from the id attribute
    pub fn get_part_id(&self) -> String {
        self.node.attribute("id").unwrap_or("unknown").to_string()
    }

    /// Get all measures in this part
    pub fn get_measures(&self) -> Vec<MeasureNode<'a, 'input>> {
        self.node
            .children()
            .filter(|n| n.is_element() && n.tag_name().name() == "measure")
            .map(MeasureNode::new)
            .collect()
    }
}

/// Wrapper around a MusicXML <measure> element
#[derive(Clone, Copy)]
pub struct MeasureNode<'a, 'input> {
    node: Node<'a, 'input>,
}

impl<'a, 'input> MeasureNode<'a, 'input> {
    pub fn new(node: Node<'a, 'input>) -> Self {
        Self { node }
    }

    /// Get the measure number (leading digits of the attribute; `"12a"` is 12)
    pub fn get_number(&self) -> i64 {
        self.node
            .attribute("number")
            .map(|s| {
                s.chars()
                    .take_while(|c| c.is_ascii_digit() || *c == '-')
                    .collect::<String>()
            })
            .and_then(|s| s.parse().ok())
            .unwrap_or(0)
    }

    /// Get all children (in document order)
    pub fn get_children(&self) -> Vec<Node<'a, 'input>> {
        self.node.children().filter(|n| n.is_element()).collect()
    }

    /// True when a barline in this measure uses the closing light-heavy style
    pub fn has_final_barline(&self) -> bool {
        self.node
            .children()
            .filter(|n| n.is_element() && n.tag_name().name() == "barline")
            .any(|barline| get_child_text(barline, "bar-style").as_deref() == Some("light-heavy"))
    }
}

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Get first child element with given tag name
pub fn get_child<'a, 'input>(node: Node<'a, 'input>, tag: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|n| n.is_element() && n.tag_name().name() == tag)
}

/// Get all child elements with given tag name
pub fn get_children<'a, 'input>(node: Node<'a, 'input>, tag: &str) -> Vec<Node<'a, 'input>> {
    node.children()
        .filter(|n| n.is_element() && n.tag_name().name() == tag)
        .collect()
}

/// Get text content of a node
pub fn get_text(node: Node) -> Option<String> {
    node.text().map(|s| s.to_string())
}

/// Get text content of first child with given tag
pub fn get_child_text(node: Node, tag: &str) -> Option<String> {
    get_child(node, tag).and_then(get_text)
}

/// Parse an integer child element, reporting unparseable content
pub fn parse_child_int(node: Node, tag: &str) -> Result<Option<i64>, ParseError> {
    match get_child_text(node, tag) {
        Some(text) => text
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| ParseError::InvalidValue {
                element: tag.to_string(),
                value: text,
            }),
        None => Ok(None),
    }
}

// ============================================================================
// PITCH PARSING
// ============================================================================

/// Parse a MusicXML <pitch> element to Pitch
pub fn parse_pitch(pitch_node: Node) -> Result<Pitch, ParseError> {
    let step_str = get_child_text(pitch_node, "step").ok_or_else(|| {
        ParseError::MissingRequiredElement("pitch missing step element".to_string())
    })?;

    let step = match step_str.trim() {
        s @ ("C" | "D" | "E" | "F" | "G" | "A" | "B") => s.chars().next().unwrap_or('C'),
        _ => {
            return Err(ParseError::InvalidValue {
                element: "step".to_string(),
                value: step_str,
            })
        }
    };

    let octave = parse_child_int(pitch_node, "octave")?.ok_or_else(|| {
        ParseError::MissingRequiredElement("pitch missing octave element".to_string())
    })?;

    // Microtonal alterations are rounded to the nearest semitone
    let alter = get_child_text(pitch_node, "alter")
        .and_then(|s| s.trim().parse::<f32>().ok())
        .map(|a| a.round() as i32)
        .unwrap_or(0);

    Ok(Pitch {
        step,
        alter,
        octave: octave as i32,
    })
}

// ============================================================================
// ATTRIBUTE PARSING HELPERS
// ============================================================================

/// Parse divisions (ticks per quarter note) from an attributes element
pub fn parse_divisions(attributes_node: Node) -> Result<Option<i64>, ParseError> {
    parse_child_int(attributes_node, "divisions")
}

/// Parse key signature (circle-of-fifths position) from a <key> element
pub fn parse_key(key_node: Node) -> Option<i32> {
    get_child_text(key_node, "fifths").and_then(|s| s.trim().parse().ok())
}

/// Parse time signature from a <time> element
pub fn parse_time(time_node: Node) -> Option<TimeSpec> {
    let beats = get_child_text(time_node, "beats")?;
    let beat_type = get_child_text(time_node, "beat-type")?;

    Some(TimeSpec {
        beats: beats.trim().to_string(),
        beat_type: beat_type.trim().to_string(),
    })
}

/// Parse clef from a <clef> element
pub fn parse_clef(clef_node: Node) -> Option<ClefSpec> {
    let sign = get_child_text(clef_node, "sign")?;
    let line = get_child_text(clef_node, "line").and_then(|s| s.trim().parse().ok());
    let octave_change = get_child_text(clef_node, "clef-octave-change")
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(0);

    Some(ClefSpec {
        sign: sign.trim().to_string(),
        line,
        octave_change,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_doctype() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE score-partwise PUBLIC "-//Recordare//DTD MusicXML 3.1 Partwise//EN" "http://www.musicxml.org/dtds/partwise.dtd">
<score-partwise version="3.1">
  <part-list>
    <score-part id="P1"><part-name>Flute</part-name></score-part>
    <score-part id="P2"/>
  </part-list>
  <part id="P1"><measure number="1"/></part>
  <part id="P2"><measure number="1"/></part>
</score-partwise>"#;

        let doc = XmlDocument::parse(xml).unwrap();
        let list = doc.extract_part_list();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].id, "P1");
        assert_eq!(list[0].name.as_deref(), Some("Flute"));
        assert_eq!(list[1].name, None);
        assert_eq!(doc.extract_parts().unwrap().len(), 2);
    }

    #[test]
    fn test_timewise_is_unsupported() {
        let doc = XmlDocument::parse("<score-timewise/>").unwrap();
        assert!(matches!(
            doc.extract_parts(),
            Err(ParseError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_malformed_xml() {
        assert!(matches!(
            XmlDocument::parse("<score-partwise>"),
            Err(ParseError::InvalidXml(_))
        ));
    }

    #[test]
    fn test_measure_number_and_final_barline() {
        let xml = r#"<score-partwise><part id="P1">
  <measure number="12a">
    <barline location="right"><bar-style>light-heavy</bar-style></barline>
  </measure>
  <measure number="13"/>
</part></score-partwise>"#;
        let doc = XmlDocument::parse(xml).unwrap();
        let parts = doc.extract_parts().unwrap();
        let measures = parts[0].get_measures();
        assert_eq!(measures[0].get_number(), 12);
        assert!(measures[0].has_final_barline());
        assert!(!measures[1].has_final_barline());
    }

    #[test]
    fn test_parse_attribute_elements() {
        let xml = r#"<attributes>
  <divisions>24</divisions>
  <key><fifths>-3</fifths></key>
  <time><beats>6</beats><beat-type>8</beat-type></time>
  <clef><sign>G</sign><line>2</line><clef-octave-change>-1</clef-octave-change></clef>
  <pitch><step>F</step><alter>1</alter><octave>5</octave></pitch>
</attributes>"#;
        let doc = Document::parse(xml).unwrap();
        let root = doc.root_element();

        assert_eq!(parse_divisions(root).unwrap(), Some(24));
        assert_eq!(parse_key(get_child(root, "key").unwrap()), Some(-3));
        let time = parse_time(get_child(root, "time").unwrap()).unwrap();
        assert_eq!((time.beats.as_str(), time.beat_type.as_str()), ("6", "8"));
        let clef = parse_clef(get_child(root, "clef").unwrap()).unwrap();
        assert_eq!(clef.sign, "G");
        assert_eq!(clef.line, Some(2));
        assert_eq!(clef.octave_change, -1);
        let pitch = parse_pitch(get_child(root, "pitch").unwrap()).unwrap();
        assert_eq!(pitch, Pitch { step: 'F', alter: 1, octave: 5 });
    }

    #[test]
    fn test_bad_divisions_value() {
        let doc = Document::parse("<attributes><divisions>four</divisions></attributes>").unwrap();
        assert!(matches!(
            parse_divisions(doc.root_element()),
            Err(ParseError::InvalidValue { .. })
        ));
    }
}
