//! Token text for `**kern` and `**text` columns

use crate::converters::musicxml::musicxml_to_humdrum::types::{ClefSpec, Pitch, TimeSpec};
use crate::grid::duration::{duration_to_recip_with_dots, infer_dots, Rational};

/// Order in which sharps enter a key signature; flats use the reverse
const SHARP_ORDER: [char; 7] = ['f', 'c', 'g', 'd', 'a', 'e', 'b'];

/// Where a note sits in a chain of tied notes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TieState {
    #[default]
    None,
    Start,
    Continue,
    Stop,
}

impl TieState {
    pub fn from_flags(starts: bool, stops: bool) -> Self {
        match (starts, stops) {
            (true, true) => TieState::Continue,
            (true, false) => TieState::Start,
            (false, true) => TieState::Stop,
            (false, false) => TieState::None,
        }
    }
}

/// Kern pitch: octave 4 and up in lower case, repeated once per octave above
/// 3; lower octaves in upper case, repeated once per octave below 4.
pub fn pitch_to_kern(pitch: &Pitch) -> String {
    let (letter, count) = if pitch.octave >= 4 {
        (pitch.step.to_ascii_lowercase(), pitch.octave - 3)
    } else {
        (pitch.step.to_ascii_uppercase(), 4 - pitch.octave)
    };

    let mut kern: String = std::iter::repeat(letter).take(count as usize).collect();
    let accidental = if pitch.alter > 0 { '#' } else { '-' };
    kern.extend(std::iter::repeat(accidental).take(pitch.alter.unsigned_abs() as usize));
    kern
}

/// Rhythm code for a note or rest. `dots` comes from the `<dot/>` count when
/// the note states its `<type>`; otherwise it is inferred from the duration.
pub fn recip_for(duration: Rational, dots: Option<u32>) -> String {
    let dots = dots.unwrap_or_else(|| infer_dots(duration));
    duration_to_recip_with_dots(duration, dots)
}

/// Full note token, e.g. `[4.cc#`
pub fn note_token(recip: &str, pitch: &Pitch, tie: TieState) -> String {
    let body = format!("{}{}", recip, pitch_to_kern(pitch));
    match tie {
        TieState::None => body,
        TieState::Start => format!("[{}", body),
        TieState::Continue => format!("{}_", body),
        TieState::Stop => format!("{}]", body),
    }
}

pub fn rest_token(recip: &str) -> String {
    format!("{}r", recip)
}

/// `*clefG2`, `*clefGv2` (sounds an octave lower), `*clefX` (percussion)
pub fn clef_token(clef: &ClefSpec) -> String {
    let sign = match clef.sign.as_str() {
        "percussion" => return "*clefX".to_string(),
        "TAB" => return "*clefTAB".to_string(),
        other => other,
    };

    let transposition = if clef.octave_change < 0 { 'v' } else { '^' };
    let octave_marks: String = std::iter::repeat(transposition)
        .take(clef.octave_change.unsigned_abs() as usize)
        .collect();
    let line = clef.line.map(|l| l.to_string()).unwrap_or_default();

    format!("*clef{}{}{}", sign, octave_marks, line)
}

/// `*k[f#c#]` for two sharps, `*k[b-e-a-]` for three flats
pub fn key_token(fifths: i32) -> String {
    let count = fifths.unsigned_abs().min(7) as usize;
    let accidentals: String = if fifths >= 0 {
        SHARP_ORDER.iter().take(count).map(|c| format!("{}#", c)).collect()
    } else {
        SHARP_ORDER.iter().rev().take(count).map(|c| format!("{}-", c)).collect()
    };
    format!("*k[{}]", accidentals)
}

pub fn meter_token(time: &TimeSpec) -> String {
    format!("*M{}/{}", time.beats, time.beat_type)
}

/// Whole-note length of one full measure, summing additive numerators (`3+2`)
pub fn time_signature_duration(time: &TimeSpec) -> Option<Rational> {
    let beats = time
        .beats
        .split('+')
        .map(|part| part.trim().parse::<i64>().ok())
        .sum::<Option<i64>>()?;
    let beat_type = time.beat_type.trim().parse::<i64>().ok()?;
    if beats <= 0 || beat_type <= 0 {
        return None;
    }
    Some(Rational::new(beats, beat_type))
}

/// Lyric syllable with hyphenation marks (`-` toward the neighboring syllable)
pub fn lyric_text(syllabic: Option<&str>, text: &str) -> String {
    // Spaces would split the token
    let text = text.trim().replace(' ', "\u{00a0}");
    match syllabic {
        Some("begin") => format!("{}-", text),
        Some("middle") => format!("-{}-", text),
        Some("end") => format!("-{}", text),
        _ => text,
    }
}

/// Layout comment placing text above (`a`) or below (`b`) the staff
pub fn direction_token(words: &str, placement: Option<&str>) -> String {
    let position = match placement {
        Some("below") => ":b",
        Some("above") => ":a",
        _ => "",
    };
    format!("!LO:TX{}:t={}", position, words.trim().replace('\t', " "))
}
