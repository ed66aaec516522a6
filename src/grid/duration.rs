//! Exact durations and the rhythm-code (recip) codec
//!
//! Every timestamp and duration in the grid is a reduced fraction of a whole
//! note. Using `num_rational` keeps long timelines free of rounding drift:
//! a slice at bar 400 of a 7/8 piece sits exactly where the sum of its
//! predecessors says it does.

use num_rational::Rational64;
use thiserror::Error;

/// Re-export Rational for duration calculations (whole-note units)
pub type Rational = Rational64;

/// Rhythm code emitted for zero-duration (grace) items
pub const GRACE_MARKER: &str = "q";

/// Dot character appended once per augmentation dot
pub const DOT_MARKER: char = '.';

/// Largest augmentation-dot count the codec encodes or decodes
pub const MAX_DOTS: u32 = 8;

/// Errors raised while building durations from source ticks
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DurationError {
    /// Ticks-per-quarter-note must be strictly positive
    #[error("ticks per quarter note must be positive, got {0}")]
    NonPositiveTicksPerQuarter(i64),
}

/// The exact zero duration
pub fn zero() -> Rational {
    Rational::from_integer(0)
}

/// Convert a tick count to a whole-note duration.
///
/// `ticks_per_quarter` is the MusicXML `<divisions>` value in effect. A
/// non-positive divisor is rejected instead of producing an invalid fraction.
pub fn ticks_to_duration(ticks: i64, ticks_per_quarter: i64) -> Result<Rational, DurationError> {
    if ticks_per_quarter <= 0 {
        return Err(DurationError::NonPositiveTicksPerQuarter(ticks_per_quarter));
    }
    Ok(Rational::new(ticks, ticks_per_quarter * 4))
}

/// Encode a whole-note duration as a recip rhythm code.
///
/// - zero → [`GRACE_MARKER`]
/// - numerator 1 → the denominator alone (`1/4` → `"4"`)
/// - otherwise → `"<denominator>%<numerator>"` (`2/3` → `"3%2"`)
pub fn duration_to_recip(duration: Rational) -> String {
    if duration == zero() {
        return GRACE_MARKER.to_string();
    }
    if *duration.numer() == 1 {
        return duration.denom().to_string();
    }
    format!("{}%{}", duration.denom(), duration.numer())
}

/// Encode a dotted duration with an explicit dot count.
///
/// The dotted inflation is removed first (`base = d × 2^n / (2^(n+1) − 1)`),
/// the base is encoded with [`duration_to_recip`], then `n` dots are appended.
/// More than [`MAX_DOTS`] dots encodes the duration undotted.
pub fn duration_to_recip_with_dots(duration: Rational, dots: u32) -> String {
    if dots == 0 || dots > MAX_DOTS || duration == zero() {
        return duration_to_recip(duration);
    }
    let base = duration * dot_deflation(dots);
    let mut recip = duration_to_recip(base);
    recip.extend(std::iter::repeat(DOT_MARKER).take(dots as usize));
    recip
}

/// Smallest dot count (up to three) whose undotted base is a simple `1/n`
/// value. Used when the source does not state the dots explicitly, such as
/// whole-measure rests.
pub fn infer_dots(duration: Rational) -> u32 {
    (0..=3)
        .find(|&dots| *(duration * dot_deflation(dots)).numer() == 1)
        .unwrap_or(0)
}

/// Decode a recip rhythm code back into its whole-note duration.
///
/// Returns `None` for text that is not a rhythm code.
pub fn recip_to_duration(recip: &str) -> Option<Rational> {
    if recip == GRACE_MARKER {
        return Some(zero());
    }
    let undotted = recip.trim_end_matches(DOT_MARKER);
    let dots = (recip.len() - undotted.len()) as u32;
    if dots > MAX_DOTS {
        return None;
    }

    let (denominator, numerator) = match undotted.split_once('%') {
        Some((d, n)) => (d.parse::<i64>().ok()?, n.parse::<i64>().ok()?),
        None => (undotted.parse::<i64>().ok()?, 1),
    };
    if denominator <= 0 || numerator <= 0 {
        return None;
    }

    let base = Rational::new(numerator, denominator);
    Some(base / dot_deflation(dots))
}

/// `2^n / (2^(n+1) − 1)`: multiply a dotted value by this to get its base
fn dot_deflation(dots: u32) -> Rational {
    let power = 1i64 << dots;
    Rational::new(power, (power << 1) - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticks_to_duration_reduces() {
        assert_eq!(ticks_to_duration(480, 480).unwrap(), Rational::new(1, 4));
        assert_eq!(ticks_to_duration(2, 6).unwrap(), Rational::new(1, 12));
        assert_eq!(ticks_to_duration(0, 4).unwrap(), zero());
    }

    #[test]
    fn test_ticks_to_duration_rejects_non_positive_divisor() {
        assert_eq!(
            ticks_to_duration(4, 0),
            Err(DurationError::NonPositiveTicksPerQuarter(0))
        );
        assert_eq!(
            ticks_to_duration(4, -2),
            Err(DurationError::NonPositiveTicksPerQuarter(-2))
        );
    }

    #[test]
    fn test_recip_simple_values() {
        assert_eq!(duration_to_recip(Rational::from_integer(1)), "1");
        assert_eq!(duration_to_recip(Rational::new(1, 4)), "4");
        assert_eq!(duration_to_recip(Rational::new(1, 12)), "12");
        assert_eq!(duration_to_recip(Rational::new(2, 3)), "3%2");
        assert_eq!(duration_to_recip(Rational::new(3, 4)), "4%3");
        assert_eq!(duration_to_recip(zero()), GRACE_MARKER);
    }

    #[test]
    fn test_recip_with_dots() {
        assert_eq!(duration_to_recip_with_dots(Rational::new(3, 8), 1), "4.");
        assert_eq!(duration_to_recip_with_dots(Rational::new(3, 4), 1), "2.");
        assert_eq!(duration_to_recip_with_dots(Rational::new(7, 16), 2), "4..");
        assert_eq!(duration_to_recip_with_dots(Rational::new(1, 4), 0), "4");
        // dotted triplet eighth: 1/12 * 3/2
        assert_eq!(duration_to_recip_with_dots(Rational::new(1, 8), 1), "12.");
    }

    #[test]
    fn test_excessive_dots_encode_undotted() {
        assert_eq!(duration_to_recip_with_dots(Rational::new(1, 1), 63), "1");
        assert_eq!(duration_to_recip_with_dots(Rational::new(3, 4), MAX_DOTS + 1), "4%3");
        assert_eq!(duration_to_recip_with_dots(Rational::new(511, 256), MAX_DOTS), "1........");
        assert_eq!(recip_to_duration("4........."), None);
    }

    #[test]
    fn test_infer_dots() {
        assert_eq!(infer_dots(Rational::new(3, 4)), 1);
        assert_eq!(infer_dots(Rational::new(1, 1)), 0);
        assert_eq!(infer_dots(Rational::new(7, 8)), 2);
        assert_eq!(infer_dots(Rational::new(9, 16)), 0);
    }

    #[test]
    fn test_recip_decode_restores_duration() {
        for (numer, denom) in [(1, 1), (1, 4), (2, 3), (5, 8), (3, 2), (7, 48)] {
            let duration = Rational::new(numer, denom);
            let recip = duration_to_recip(duration);
            assert_eq!(recip_to_duration(&recip), Some(duration), "recip {}", recip);
        }
        assert_eq!(recip_to_duration("4."), Some(Rational::new(3, 8)));
        assert_eq!(recip_to_duration("q"), Some(zero()));
        assert_eq!(recip_to_duration("4cc"), None);
        assert_eq!(recip_to_duration("0%1"), None);
    }
}
