//! Per-part event extraction
//!
//! Walks each measure in document order with a time cursor (moved by note
//! durations, `<backup>` and `<forward>`), renders every note, rest and
//! attribute change to token text, and stamps it with an absolute start
//! time. Voice numbers are mapped to layer indices per staff per measure.

use std::collections::{BTreeMap, BTreeSet};

use log::debug;
use roxmltree::Node;

use crate::converters::musicxml::musicxml_to_humdrum::errors::{ConversionError, ParseError};
use crate::converters::musicxml::musicxml_to_humdrum::kern::{
    clef_token, direction_token, key_token, lyric_text, meter_token, note_token, recip_for,
    rest_token, time_signature_duration, TieState,
};
use crate::converters::musicxml::musicxml_to_humdrum::parser::{
    get_child, get_child_text, get_children, parse_child_int, parse_clef, parse_divisions,
    parse_key, parse_pitch, parse_time, MeasureNode, PartNode,
};
use crate::converters::musicxml::musicxml_to_humdrum::types::{ConversionSettings, SkippedElement};
use crate::grid::duration::{ticks_to_duration, zero, Rational, MAX_DOTS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventCategory {
    Note,
    Rest,
    Clef,
    KeySignature,
    TimeSignature,
    Direction,
}

/// One rendered item with its position in the score
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub part_index: usize,
    /// 0-based staff within the part
    pub staff_index: usize,
    /// 0-based layer within the staff for this measure
    pub voice_index: usize,
    /// Absolute onset in whole notes
    pub start_time: Rational,
    pub duration: Rational,
    pub text: String,
    pub is_zero_duration: bool,
    pub category: EventCategory,
    /// Shares its onset and column with the previous note (`<chord/>`)
    pub is_chord_member: bool,
    /// (0-based verse, syllable text)
    pub lyrics: Vec<(usize, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeasureData {
    pub number: i64,
    pub start_time: Rational,
    pub duration: Rational,
    pub time_signature_duration: Rational,
    pub is_final: bool,
    pub events: Vec<Event>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartData {
    pub id: String,
    pub staff_count: usize,
    pub verse_count: usize,
    pub measures: Vec<MeasureData>,
}

/// Extraction state that carries across measures of one part
pub struct ExtractionContext {
    pub divisions: i64,
    pub current_measure: i64,
    pub current_part_id: String,
    pub part_index: usize,
    pub staff_count: usize,
    pub time_signature_duration: Rational,
    pub convert_lyrics: bool,
    pub convert_directions: bool,
    pub skipped_elements: Vec<SkippedElement>,
}

impl ExtractionContext {
    pub fn new(part_id: String, part_index: usize, settings: &ConversionSettings) -> Self {
        Self {
            divisions: 1,
            current_measure: 0,
            current_part_id: part_id,
            part_index,
            staff_count: 1,
            time_signature_duration: zero(),
            convert_lyrics: settings.convert_lyrics,
            convert_directions: settings.convert_directions,
            skipped_elements: Vec::new(),
        }
    }

    pub fn add_skipped(&mut self, element_type: &str, reason: &str) {
        self.skipped_elements.push(SkippedElement {
            element_type: element_type.to_string(),
            measure_number: if self.current_measure > 0 {
                Some(self.current_measure)
            } else {
                None
            },
            part_id: Some(self.current_part_id.clone()),
            reason: reason.to_string(),
        });
    }

    fn ticks(&self, ticks: i64) -> Result<Rational, ConversionError> {
        Ok(ticks_to_duration(ticks, self.divisions)?)
    }
}

/// Event before its voice number has been mapped to a layer index
struct PendingEvent {
    event: Event,
    voice_number: i64,
}

/// Time cursor within one measure
struct MeasureCursor {
    measure_start: Rational,
    position: Rational,
    furthest: Rational,
    last_note_start: Rational,
}

impl MeasureCursor {
    fn new(measure_start: Rational) -> Self {
        Self {
            measure_start,
            position: zero(),
            furthest: zero(),
            last_note_start: zero(),
        }
    }

    fn advance(&mut self, duration: Rational) {
        self.position += duration;
        if self.position > self.furthest {
            self.furthest = self.position;
        }
    }

    fn retreat(&mut self, duration: Rational) {
        self.position -= duration;
        if self.position < zero() {
            self.position = zero();
        }
    }

    fn absolute(&self, local: Rational) -> Rational {
        self.measure_start + local
    }
}

/// Extract every measure of one part
pub fn extract_part(
    part: PartNode,
    context: &mut ExtractionContext,
) -> Result<PartData, ConversionError> {
    let mut measures = Vec::new();
    let mut start = zero();
    let mut staff_count = 1;
    let mut verse_count = 0;

    for measure in part.get_measures() {
        let data = extract_measure(measure, start, context)?;
        start = data.start_time + data.duration;

        for event in &data.events {
            staff_count = staff_count.max(event.staff_index + 1);
            for (verse, _) in &event.lyrics {
                verse_count = verse_count.max(verse + 1);
            }
        }
        measures.push(data);
    }
    staff_count = staff_count.max(context.staff_count);

    debug!(
        "part {}: {} measures, {} staves, {} verses",
        context.current_part_id,
        measures.len(),
        staff_count,
        verse_count
    );

    Ok(PartData {
        id: context.current_part_id.clone(),
        staff_count,
        verse_count,
        measures,
    })
}

/// Extract the events of one measure starting at absolute time `start`
pub fn extract_measure(
    measure: MeasureNode,
    start: Rational,
    context: &mut ExtractionContext,
) -> Result<MeasureData, ConversionError> {
    context.current_measure = measure.get_number();
    let mut cursor = MeasureCursor::new(start);
    let mut pending = Vec::new();

    for child in measure.get_children() {
        match child.tag_name().name() {
            "attributes" => extract_attributes(child, &cursor, context, &mut pending)?,
            "note" => extract_note(child, &mut cursor, context, &mut pending)?,
            "backup" => {
                let ticks = required_ticks(child)?;
                cursor.retreat(context.ticks(ticks)?);
            }
            "forward" => {
                let ticks = required_ticks(child)?;
                cursor.advance(context.ticks(ticks)?);
            }
            "direction" => {
                if context.convert_directions {
                    extract_direction(child, &cursor, context, &mut pending)?;
                }
            }
            "harmony" => context.add_skipped("harmony", "Chord symbols are not converted"),
            "figured-bass" => context.add_skipped("figured-bass", "Figured bass is not converted"),
            _ => {}
        }
    }

    let duration = if cursor.furthest > zero() {
        cursor.furthest
    } else {
        context.time_signature_duration
    };

    Ok(MeasureData {
        number: context.current_measure,
        start_time: start,
        duration,
        time_signature_duration: context.time_signature_duration,
        is_final: measure.has_final_barline(),
        events: assign_layers(pending),
    })
}

fn required_ticks(node: Node) -> Result<i64, ConversionError> {
    parse_child_int(node, "duration")?.ok_or_else(|| {
        ConversionError::from(ParseError::MissingRequiredElement(format!(
            "{} missing duration element",
            node.tag_name().name()
        )))
    })
}

/// 0-based staff index from a `<staff>` child, defaulting to the first staff
fn staff_index(node: Node) -> Result<usize, ConversionError> {
    let staff = parse_child_int(node, "staff")?.unwrap_or(1);
    Ok(staff.max(1) as usize - 1)
}

/// Map voice numbers to layer indices: ascending order, per staff
fn assign_layers(pending: Vec<PendingEvent>) -> Vec<Event> {
    let mut voices: BTreeMap<usize, BTreeSet<i64>> = BTreeMap::new();
    for item in &pending {
        if matches!(item.event.category, EventCategory::Note | EventCategory::Rest) {
            voices
                .entry(item.event.staff_index)
                .or_default()
                .insert(item.voice_number);
        }
    }

    pending
        .into_iter()
        .map(|item| {
            let mut event = item.event;
            if matches!(event.category, EventCategory::Note | EventCategory::Rest) {
                event.voice_index = voices
                    .get(&event.staff_index)
                    .and_then(|set| set.iter().position(|v| *v == item.voice_number))
                    .unwrap_or(0);
            }
            event
        })
        .collect()
}

fn interpretation(
    context: &ExtractionContext,
    cursor: &MeasureCursor,
    staff_index: usize,
    category: EventCategory,
    text: String,
) -> PendingEvent {
    PendingEvent {
        event: Event {
            part_index: context.part_index,
            staff_index,
            voice_index: 0,
            start_time: cursor.absolute(cursor.position),
            duration: zero(),
            text,
            is_zero_duration: true,
            category,
            is_chord_member: false,
            lyrics: Vec::new(),
        },
        voice_number: 0,
    }
}

/// Staves an attribute applies to: the one named by `number`, or all of them
fn target_staves(node: Node, staff_count: usize) -> Vec<usize> {
    match node.attribute("number").and_then(|n| n.parse::<usize>().ok()) {
        Some(number) if number >= 1 => vec![number - 1],
        _ => (0..staff_count).collect(),
    }
}

fn extract_attributes(
    node: Node,
    cursor: &MeasureCursor,
    context: &mut ExtractionContext,
    pending: &mut Vec<PendingEvent>,
) -> Result<(), ConversionError> {
    if let Some(divisions) = parse_divisions(node)? {
        if divisions <= 0 {
            return Err(ConversionError::InvalidDivisions(divisions));
        }
        context.divisions = divisions;
    }

    // <staves> follows <key>/<time> in the schema but decides how many staves they cover
    if let Some(staves) = parse_child_int(node, "staves")? {
        context.staff_count = context.staff_count.max(staves.max(1) as usize);
    }

    for clef_node in get_children(node, "clef") {
        let Some(clef) = parse_clef(clef_node) else {
            context.add_skipped("clef", "Clef without a sign");
            continue;
        };
        let staff = clef_node
            .attribute("number")
            .and_then(|n| n.parse::<usize>().ok())
            .unwrap_or(1)
            .max(1)
            - 1;
        context.staff_count = context.staff_count.max(staff + 1);
        pending.push(interpretation(context, cursor, staff, EventCategory::Clef, clef_token(&clef)));
    }

    for key_node in get_children(node, "key") {
        let Some(fifths) = parse_key(key_node) else {
            context.add_skipped("key", "Only traditional (fifths) key signatures are converted");
            continue;
        };
        for staff in target_staves(key_node, context.staff_count) {
            pending.push(interpretation(
                context,
                cursor,
                staff,
                EventCategory::KeySignature,
                key_token(fifths),
            ));
        }
    }

    for time_node in get_children(node, "time") {
        let Some(time) = parse_time(time_node) else {
            context.add_skipped("time", "Time signature without beats/beat-type");
            continue;
        };
        if let Some(duration) = time_signature_duration(&time) {
            context.time_signature_duration = duration;
        }
        for staff in target_staves(time_node, context.staff_count) {
            pending.push(interpretation(
                context,
                cursor,
                staff,
                EventCategory::TimeSignature,
                meter_token(&time),
            ));
        }
    }

    Ok(())
}

fn extract_note(
    node: Node,
    cursor: &mut MeasureCursor,
    context: &mut ExtractionContext,
    pending: &mut Vec<PendingEvent>,
) -> Result<(), ConversionError> {
    if get_child(node, "grace").is_some() {
        context.add_skipped("grace", "Grace notes are not converted");
        return Ok(());
    }

    let is_chord = get_child(node, "chord").is_some();
    let duration = context.ticks(required_ticks(node)?)?;
    let local_start = if is_chord {
        cursor.last_note_start
    } else {
        cursor.position
    };
    let staff = staff_index(node)?;
    let voice_number = parse_child_int(node, "voice")?.unwrap_or(1);

    // Explicit dots only mean something next to an explicit <type>
    let mut dots = get_child(node, "type").map(|_| get_children(node, "dot").len());
    if dots.is_some_and(|count| count > MAX_DOTS as usize) {
        context.add_skipped("dot", "Too many augmentation dots; rhythm taken from the duration");
        dots = None;
    }
    let recip = recip_for(duration, dots.map(|count| count as u32));

    let (category, text) = if get_child(node, "rest").is_some() {
        (EventCategory::Rest, rest_token(&recip))
    } else if let Some(pitch_node) = get_child(node, "pitch") {
        let pitch = parse_pitch(pitch_node)?;
        let tie_types: Vec<String> = get_children(node, "tie")
            .into_iter()
            .filter_map(|tie| tie.attribute("type").map(str::to_string))
            .collect();
        let tie = TieState::from_flags(
            tie_types.iter().any(|t| t == "start"),
            tie_types.iter().any(|t| t == "stop"),
        );
        (EventCategory::Note, note_token(&recip, &pitch, tie))
    } else {
        context.add_skipped("unpitched", "Unpitched notes are rendered as rests");
        (EventCategory::Rest, rest_token(&recip))
    };

    let lyrics = if context.convert_lyrics {
        get_children(node, "lyric")
            .into_iter()
            .filter_map(|lyric| {
                let text = get_child_text(lyric, "text")?;
                let verse = lyric
                    .attribute("number")
                    .and_then(|n| n.parse::<usize>().ok())
                    .unwrap_or(1)
                    .max(1);
                let syllabic = get_child_text(lyric, "syllabic");
                Some((verse - 1, lyric_text(syllabic.as_deref(), &text)))
            })
            .collect()
    } else {
        Vec::new()
    };

    pending.push(PendingEvent {
        event: Event {
            part_index: context.part_index,
            staff_index: staff,
            voice_index: 0,
            start_time: cursor.absolute(local_start),
            duration,
            text,
            is_zero_duration: duration == zero(),
            category,
            is_chord_member: is_chord,
            lyrics,
        },
        voice_number,
    });

    if !is_chord {
        cursor.last_note_start = cursor.position;
        cursor.advance(duration);
    }
    Ok(())
}

fn extract_direction(
    node: Node,
    cursor: &MeasureCursor,
    context: &mut ExtractionContext,
    pending: &mut Vec<PendingEvent>,
) -> Result<(), ConversionError> {
    let words: Vec<String> = get_children(node, "direction-type")
        .into_iter()
        .flat_map(|direction_type| get_children(direction_type, "words"))
        .filter_map(|words| words.text().map(|t| t.trim().to_string()))
        .filter(|t| !t.is_empty())
        .collect();

    if words.is_empty() {
        context.add_skipped("direction", "Only text (<words>) directions are converted");
        return Ok(());
    }

    let staff = staff_index(node)?;
    let text = direction_token(&words.join(" "), node.attribute("placement"));
    pending.push(interpretation(context, cursor, staff, EventCategory::Direction, text));
    Ok(())
}
