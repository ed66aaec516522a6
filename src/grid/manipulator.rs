//! Spine manipulator synthesis
//!
//! When a staff leaves one line with `v1` spines and the next line expects
//! `v2`, a manipulator line is placed between them. Its tokens are chosen so
//! that expanding them reaches exactly `v2`:
//!
//! | case | tokens |
//! |---|---|
//! | `v1 == v2` | `v1 × *` |
//! | `v2 == 2·v1` | `v1 × *^` |
//! | `v2 > 2·v1` | `(v1−1) × *^`, then `*^N` with `N = v2 − 2(v1−1)` |
//! | `v1 < v2 < 2·v1` | `(v1−g) × *`, then `g × *^` |
//! | `v1 > v2` | `(v2−1) × *`, then `(v1−v2+1) × *v` |
//!
//! Two staves merging side by side would put their `*v` runs next to each
//! other, which Humdrum reads as a single merge. The later staff then waits
//! one line; the reconciliation loop emits its merge next.

use log::{debug, warn};

use crate::grid::slice::{GridSlice, SliceKind};
use crate::grid::token::{GridToken, NULL_INTERPRETATION};

pub const SPLIT: &str = "*^";
pub const MERGE: &str = "*v";

/// Build the manipulator line needed between `left` and `right`, if any.
///
/// Returns `None` when every staff already agrees, or when the two slices
/// disagree on part/staff layout (logged, left unresolved).
pub fn manipulator_check(left: &GridSlice, right: &GridSlice) -> Option<GridSlice> {
    let shapes = left.shapes();
    if shapes.len() != right.part_count() {
        warn!(
            "part count differs between slices at {} ({}) and {} ({}); no manipulator inserted",
            left.timestamp,
            shapes.len(),
            right.timestamp,
            right.part_count()
        );
        return None;
    }
    for (p, shape) in shapes.iter().enumerate() {
        let right_staves = right.part(p).map_or(0, |part| part.staff_count());
        if shape.staff_count != right_staves {
            warn!(
                "staff count differs in part {} between slices at {} and {}; no manipulator inserted",
                p + 1,
                left.timestamp,
                right.timestamp
            );
            return None;
        }
    }

    let needed = shapes.iter().enumerate().any(|(p, shape)| {
        (0..shape.staff_count)
            .any(|s| left.outgoing_voice_count(p, s) != right.voice_count(p, s))
    });
    if !needed {
        return None;
    }

    let mut manipulator = GridSlice::with_shape(right.timestamp, SliceKind::Manipulator, &shapes);
    // Walk the columns in output order. A `*v` run that would touch the
    // previous column's `*v` run reads as one merge across both staves,
    // so that staff keeps its spines here and merges on the next line.
    let mut previous_merges = false;
    for (p, shape) in shapes.iter().enumerate().rev() {
        for s in (0..shape.staff_count).rev() {
            let v1 = left.outgoing_voice_count(p, s);
            let v2 = right.voice_count(p, s);
            let mut tokens = manipulator_tokens(v1, v2);
            if previous_merges && tokens.first().map(String::as_str) == Some(MERGE) {
                debug!(
                    "part {} staff {}: merge deferred to keep it apart from the neighboring staff",
                    p + 1,
                    s + 1
                );
                tokens = manipulator_tokens(v1, v1);
            }
            previous_merges = tokens.last().map(String::as_str) == Some(MERGE);
            if let Some(staff) = manipulator.staff_mut(p, s) {
                for text in tokens {
                    staff.push(GridToken::structural(text));
                }
            }
        }
        if let Some(part) = manipulator.part_mut(p) {
            if part.verse_count() > 0 {
                previous_merges = false;
            }
            for slot in part.verses_mut() {
                *slot = Some(GridToken::structural(NULL_INTERPRETATION));
            }
        }
    }
    Some(manipulator)
}

/// True when one staff's `*v` run ends right where the next staff's (in
/// output order) begins, so the two runs would read as a single merge.
pub fn has_touching_merges(slice: &GridSlice) -> bool {
    let mut previous_merges = false;
    for part in slice.parts().iter().rev() {
        for staff in part.staves().iter().rev() {
            let texts: Vec<&str> = staff
                .voices()
                .iter()
                .map(|token| token.as_ref().and_then(|t| t.text()).unwrap_or(NULL_INTERPRETATION))
                .collect();
            if previous_merges && texts.first() == Some(&MERGE) {
                return true;
            }
            previous_merges = texts.last() == Some(&MERGE);
        }
        if part.verse_count() > 0 {
            previous_merges = false;
        }
    }
    false
}

/// Tokens turning `v1` incoming spines into `v2` outgoing ones.
///
/// Both counts are at least 1: an empty staff still occupies one spine.
pub fn manipulator_tokens(v1: usize, v2: usize) -> Vec<String> {
    let keep = |n: usize| std::iter::repeat(NULL_INTERPRETATION.to_string()).take(n);
    let split = |n: usize| std::iter::repeat(SPLIT.to_string()).take(n);

    if v1 == v2 {
        return keep(v1).collect();
    }
    if v2 > v1 {
        let grow = v2 - v1;
        if grow == v1 {
            return split(v1).collect();
        }
        if grow > v1 {
            let extra = v2 - (v1 - 1) * 2;
            return split(v1 - 1)
                .chain(std::iter::once(format!("{}{}", SPLIT, extra)))
                .collect();
        }
        return keep(v1 - grow).chain(split(grow)).collect();
    }

    let shrink = v1 - v2 + 1;
    keep(v1 - shrink)
        .chain(std::iter::repeat(MERGE.to_string()).take(shrink))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::duration::{zero, Rational};
    use crate::grid::staff::PartShape;

    fn notes_with_voices(voices: &[usize], verses: usize) -> GridSlice {
        let shapes: Vec<PartShape> = voices.iter().map(|_| PartShape::new(1, verses)).collect();
        let mut slice = GridSlice::with_shape(zero(), SliceKind::Notes, &shapes);
        for (p, &count) in voices.iter().enumerate() {
            let staff = slice.staff_mut(p, 0).unwrap();
            for _ in 0..count {
                staff.push(GridToken::new("4c", Rational::new(1, 4)));
            }
        }
        slice
    }

    #[test]
    fn test_every_voice_splits() {
        assert_eq!(manipulator_tokens(2, 4), vec!["*^", "*^"]);
        assert_eq!(manipulator_tokens(1, 2), vec!["*^"]);
    }

    #[test]
    fn test_wide_growth_uses_fanout() {
        assert_eq!(manipulator_tokens(3, 7), vec!["*^", "*^", "*^3"]);
        assert_eq!(manipulator_tokens(1, 3), vec!["*^3"]);
    }

    #[test]
    fn test_trailing_voices_split() {
        assert_eq!(manipulator_tokens(3, 4), vec!["*", "*", "*^"]);
        assert_eq!(manipulator_tokens(3, 5), vec!["*", "*^", "*^"]);
    }

    #[test]
    fn test_trailing_voices_merge() {
        assert_eq!(manipulator_tokens(4, 2), vec!["*", "*v", "*v", "*v"]);
        assert_eq!(manipulator_tokens(2, 1), vec!["*v", "*v"]);
    }

    #[test]
    fn test_tokens_reach_target_count() {
        for v1 in 1..6 {
            for v2 in 1..12 {
                let left = notes_with_voices(&[v1], 0);
                let right = notes_with_voices(&[v2], 0);
                match manipulator_check(&left, &right) {
                    Some(manipulator) => {
                        assert_ne!(v1, v2);
                        assert_eq!(manipulator.voice_count(0, 0), v1);
                        assert_eq!(manipulator.outgoing_voice_count(0, 0), v2, "{} -> {}", v1, v2);
                    }
                    None => assert_eq!(v1, v2),
                }
            }
        }
    }

    #[test]
    fn test_manipulator_line_layout() {
        let left = notes_with_voices(&[1, 2], 1);
        let mut right = notes_with_voices(&[2, 2], 1);
        right.timestamp = Rational::new(1, 2);

        let mut manipulator = manipulator_check(&left, &right).unwrap();
        assert!(manipulator.is_manipulator_slice());
        assert_eq!(manipulator.timestamp, Rational::new(1, 2));
        assert_eq!(
            manipulator.transfer_tokens(false).to_string(),
            "*\t*\t*\t*^\t*"
        );
    }

    fn grand_staff(upper: usize, lower: usize) -> GridSlice {
        let mut slice = GridSlice::with_shape(zero(), SliceKind::Notes, &[PartShape::new(2, 0)]);
        for (s, count) in [(0, upper), (1, lower)] {
            let staff = slice.staff_mut(0, s).unwrap();
            for _ in 0..count {
                staff.push(GridToken::new("2c", Rational::new(1, 2)));
            }
        }
        slice
    }

    #[test]
    fn test_neighboring_merges_are_staggered() {
        let left = grand_staff(2, 2);
        let right = grand_staff(1, 1);

        let mut first = manipulator_check(&left, &right).unwrap();
        assert!(!has_touching_merges(&first));
        assert_eq!(first.outgoing_voice_count(0, 1), 1);
        assert_eq!(first.outgoing_voice_count(0, 0), 2);

        let mut second = manipulator_check(&first, &right).unwrap();
        assert!(!has_touching_merges(&second));
        assert_eq!(second.outgoing_voice_count(0, 0), 1);
        assert!(manipulator_check(&second, &right).is_none());

        assert_eq!(first.transfer_tokens(false).to_string(), "*v\t*v\t*\t*");
        assert_eq!(second.transfer_tokens(false).to_string(), "*\t*v\t*v");
    }

    fn two_parts(shapes: &[PartShape], count: usize) -> GridSlice {
        let mut slice = GridSlice::with_shape(zero(), SliceKind::Notes, shapes);
        for p in 0..shapes.len() {
            let staff = slice.staff_mut(p, 0).unwrap();
            for _ in 0..count {
                staff.push(GridToken::new("2c", Rational::new(1, 2)));
            }
        }
        slice
    }

    #[test]
    fn test_merges_are_staggered_across_parts() {
        let shapes = [PartShape::new(1, 0), PartShape::new(1, 0)];
        let mut manipulator = manipulator_check(&two_parts(&shapes, 2), &two_parts(&shapes, 1)).unwrap();
        assert_eq!(manipulator.outgoing_voice_count(1, 0), 1);
        assert_eq!(manipulator.outgoing_voice_count(0, 0), 2);
        assert_eq!(manipulator.transfer_tokens(false).to_string(), "*v\t*v\t*\t*");
    }

    #[test]
    fn test_verse_column_separates_merges() {
        // output order: part 2's staff, its verse, then part 1's staff
        let shapes = [PartShape::new(1, 0), PartShape::new(1, 1)];
        let mut manipulator = manipulator_check(&two_parts(&shapes, 2), &two_parts(&shapes, 1)).unwrap();
        assert!(!has_touching_merges(&manipulator));
        assert_eq!(manipulator.outgoing_voice_count(0, 0), 1);
        assert_eq!(manipulator.transfer_tokens(false).to_string(), "*v\t*v\t*\t*v\t*v");
    }

    #[test]
    fn test_cardinality_mismatch_is_skipped() {
        let left = notes_with_voices(&[1, 1], 0);
        let right = notes_with_voices(&[2], 0);
        assert!(manipulator_check(&left, &right).is_none());
    }
}
