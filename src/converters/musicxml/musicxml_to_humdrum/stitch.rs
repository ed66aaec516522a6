//! Merge the events of all parts into grid slices, one measure at a time
//!
//! Within a measure every distinct (onset, kind) pair becomes one
//! `GridSlice`; at equal onsets interpretation lines come before layout
//! comments, which come before notes.

use std::collections::BTreeMap;

use log::{debug, warn};

use crate::converters::musicxml::musicxml_to_humdrum::errors::ConversionError;
use crate::converters::musicxml::musicxml_to_humdrum::events::{Event, EventCategory, PartData};
use crate::converters::musicxml::musicxml_to_humdrum::types::ConversionSettings;
use crate::grid::duration::{zero, Rational};
use crate::grid::{GridMeasure, GridSlice, GridToken, HumGrid, PartShape, SliceKind};

/// Slice kind an event is placed in
pub fn slice_kind(category: EventCategory) -> SliceKind {
    match category {
        EventCategory::Note | EventCategory::Rest => SliceKind::Notes,
        EventCategory::Clef => SliceKind::Clefs,
        EventCategory::KeySignature => SliceKind::KeySignatures,
        EventCategory::TimeSignature => SliceKind::TimeSignatures,
        EventCategory::Direction => SliceKind::Layout,
    }
}

/// Every part must report the same number of measures
pub fn check_measure_counts(parts: &[PartData]) -> Result<usize, ConversionError> {
    let Some(first) = parts.first() else {
        return Ok(0);
    };
    let expected = first.measures.len();
    for part in &parts[1..] {
        if part.measures.len() != expected {
            return Err(ConversionError::MeasureCountMismatch {
                part_id: part.id.clone(),
                expected,
                found: part.measures.len(),
            });
        }
    }
    Ok(expected)
}

/// Column layout of each part; verse columns only when lyrics are converted
pub fn part_shapes(parts: &[PartData], settings: &ConversionSettings) -> Vec<PartShape> {
    parts
        .iter()
        .map(|part| {
            let verses = if settings.convert_lyrics { part.verse_count } else { 0 };
            PartShape::new(part.staff_count, verses)
        })
        .collect()
}

/// Build the grid for all parts
pub fn stitch_parts(
    parts: &[PartData],
    settings: &ConversionSettings,
) -> Result<HumGrid, ConversionError> {
    let measure_count = check_measure_counts(parts)?;
    let shapes = part_shapes(parts, settings);

    let mut grid = HumGrid::new();
    grid.set_recip(settings.recip_spine);

    for m in 0..measure_count {
        let first = &parts[0].measures[m];
        let duration = parts
            .iter()
            .map(|part| part.measures[m].duration)
            .max()
            .unwrap_or_else(zero);

        let mut measure = GridMeasure::new(first.number, first.start_time, duration);
        measure.time_signature_duration = first.time_signature_duration;
        if m + 1 == measure_count && parts.iter().any(|part| part.measures[m].is_final) {
            measure.make_final();
        }

        let events = parts.iter().flat_map(|part| part.measures[m].events.iter());
        for slice in build_slices(events, &shapes, &settings.chord_separator) {
            measure.push_slice(slice);
        }
        if measure.is_empty() {
            debug!("measure {} has no events", first.number);
        }

        grid.add_measure(measure)?;
    }

    Ok(grid)
}

/// Group events by onset and kind, in time order
pub fn build_slices<'e>(
    events: impl Iterator<Item = &'e Event>,
    shapes: &[PartShape],
    chord_separator: &str,
) -> Vec<GridSlice> {
    let mut slices: BTreeMap<(Rational, SliceKind), GridSlice> = BTreeMap::new();

    for event in events {
        let kind = slice_kind(event.category);
        let slice = slices
            .entry((event.start_time, kind))
            .or_insert_with(|| GridSlice::with_shape(event.start_time, kind, shapes));
        place_event(slice, event, chord_separator);
    }

    slices.into_values().collect()
}

fn place_event(slice: &mut GridSlice, event: &Event, chord_separator: &str) {
    let token = GridToken::new(event.text.clone(), event.duration);

    let Some(part) = slice.part_mut(event.part_index) else {
        warn!("event for missing part {} dropped", event.part_index + 1);
        return;
    };

    for (verse, text) in &event.lyrics {
        part.set_verse(*verse, GridToken::structural(text.clone()));
    }

    let Some(staff) = part.staff_mut(event.staff_index) else {
        warn!(
            "event for missing staff {} of part {} dropped",
            event.staff_index + 1,
            event.part_index + 1
        );
        return;
    };

    if event.is_chord_member {
        staff.append(event.voice_index, token, chord_separator);
    } else if event.category == EventCategory::Direction {
        // several directions at one onset share the comment
        staff.append(event.voice_index, token, " ");
    } else {
        if staff.get(event.voice_index).is_some() {
            warn!(
                "part {} staff {} voice {}: two events start at {}, keeping the later",
                event.part_index + 1,
                event.staff_index + 1,
                event.voice_index + 1,
                event.start_time
            );
        }
        staff.set(event.voice_index, token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converters::musicxml::musicxml_to_humdrum::events::MeasureData;

    fn r(n: i64, d: i64) -> Rational {
        Rational::new(n, d)
    }

    fn note(part_index: usize, start: Rational, duration: Rational, text: &str) -> Event {
        Event {
            part_index,
            staff_index: 0,
            voice_index: 0,
            start_time: start,
            duration,
            text: text.to_string(),
            is_zero_duration: false,
            category: EventCategory::Note,
            is_chord_member: false,
            lyrics: Vec::new(),
        }
    }

    fn part(id: &str, measures: Vec<Vec<Event>>) -> PartData {
        PartData {
            id: id.to_string(),
            staff_count: 1,
            verse_count: 0,
            measures: measures
                .into_iter()
                .enumerate()
                .map(|(i, events)| MeasureData {
                    number: i as i64 + 1,
                    start_time: r(i as i64, 1),
                    duration: r(1, 1),
                    time_signature_duration: r(1, 1),
                    is_final: false,
                    events,
                })
                .collect(),
        }
    }

    #[test]
    fn test_measure_count_mismatch() {
        let parts = vec![
            part("P1", vec![vec![], vec![], vec![]]),
            part("P2", vec![vec![], vec![]]),
        ];
        let err = stitch_parts(&parts, &ConversionSettings::default()).unwrap_err();
        assert_eq!(
            err,
            ConversionError::MeasureCountMismatch {
                part_id: "P2".to_string(),
                expected: 3,
                found: 2,
            }
        );
    }

    #[test]
    fn test_simultaneous_events_share_a_slice() {
        let events = vec![
            note(0, zero(), r(1, 2), "2c"),
            note(1, zero(), r(1, 1), "1C"),
            note(0, r(1, 2), r(1, 2), "2d"),
            Event {
                category: EventCategory::Clef,
                text: "*clefF4".to_string(),
                duration: zero(),
                is_zero_duration: true,
                ..note(1, zero(), zero(), "")
            },
        ];
        let shapes = vec![PartShape::new(1, 0), PartShape::new(1, 0)];
        let slices = build_slices(events.iter(), &shapes, " ");

        let summary: Vec<(Rational, SliceKind)> = slices.iter().map(|s| (s.timestamp, s.kind)).collect();
        assert_eq!(
            summary,
            vec![
                (zero(), SliceKind::Clefs),
                (zero(), SliceKind::Notes),
                (r(1, 2), SliceKind::Notes),
            ]
        );
        let first_notes = &slices[1];
        assert_eq!(first_notes.staff(0, 0).unwrap().get(0).unwrap().text(), Some("2c"));
        assert_eq!(first_notes.staff(1, 0).unwrap().get(0).unwrap().text(), Some("1C"));
    }

    #[test]
    fn test_chord_members_join_one_token() {
        let mut upper = note(0, zero(), r(1, 4), "4e");
        upper.is_chord_member = true;
        let events = vec![note(0, zero(), r(1, 4), "4c"), upper];
        let slices = build_slices(events.iter(), &[PartShape::new(1, 0)], " ");
        assert_eq!(slices.len(), 1);
        assert_eq!(slices[0].staff(0, 0).unwrap().get(0).unwrap().text(), Some("4c 4e"));
    }

    #[test]
    fn test_last_measure_final_flag() {
        let mut parts = vec![part("P1", vec![vec![note(0, zero(), r(1, 1), "1c")]])];
        parts[0].measures[0].is_final = true;
        let grid = stitch_parts(&parts, &ConversionSettings::default()).unwrap();
        assert_eq!(grid.measure_count(), 1);
        assert!(grid.measure(0).unwrap().is_final());
    }
}
