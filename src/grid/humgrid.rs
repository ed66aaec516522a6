//! HumGrid: owns every measure and runs the finishing passes
//!
//! The caller appends measures and slices while the grid is accumulating.
//! `finalize` then runs, once and in order:
//!
//! 1. flatten and compute each slice's `duration_to_next`
//! 2. extend sustained notes with continuation tokens
//! 3. insert barline slices between measures and after the last one
//! 4. flatten again (barlines changed the slice count)
//! 5. insert manipulator lines until adjacent voice counts agree
//!
//! `transfer_tokens` consumes the grid and writes the document.

use log::{debug, warn};
use thiserror::Error;

use crate::grid::duration::{zero, Rational};
use crate::grid::manipulator::{has_touching_merges, manipulator_check};
use crate::grid::measure::GridMeasure;
use crate::grid::output::{HumdrumFile, HumdrumLine};
use crate::grid::slice::{GridSlice, SliceKind};
use crate::grid::staff::PartShape;
use crate::grid::token::GridToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum GridState {
    Accumulating,
    Flattening,
    ExtendingSustains,
    InsertingBarlines,
    Reflattening,
    ReconcilingManipulators,
    /// Every pass has run; the grid is ready to serialize. Serializing
    /// consumes the grid, so no state follows this one.
    Finalized,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GridError {
    #[error("grid no longer accepts measures (state {0:?})")]
    NotAccumulating(GridState),
}

/// Position of a slice: (measure index, slice index within the measure)
type SlicePosition = (usize, usize);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HumGrid {
    measures: Vec<GridMeasure>,
    recip: bool,
    state: GridState,
}

impl Default for HumGrid {
    fn default() -> Self {
        Self::new()
    }
}

impl HumGrid {
    pub fn new() -> Self {
        Self {
            measures: Vec::new(),
            recip: false,
            state: GridState::Accumulating,
        }
    }

    /// Enable the leading `**recip` rhythm-summary column
    pub fn set_recip(&mut self, recip: bool) {
        self.recip = recip;
    }

    pub fn state(&self) -> GridState {
        self.state
    }

    /// Append a measure and hand it back for filling
    pub fn add_measure(&mut self, measure: GridMeasure) -> Result<&mut GridMeasure, GridError> {
        if self.state != GridState::Accumulating {
            return Err(GridError::NotAccumulating(self.state));
        }
        self.measures.push(measure);
        let last = self.measures.len() - 1;
        Ok(&mut self.measures[last])
    }

    pub fn measures(&self) -> &[GridMeasure] {
        &self.measures
    }

    pub fn measure(&self, index: usize) -> Option<&GridMeasure> {
        self.measures.get(index)
    }

    pub fn measure_mut(&mut self, index: usize) -> Option<&mut GridMeasure> {
        if self.state != GridState::Accumulating {
            return None;
        }
        self.measures.get_mut(index)
    }

    pub fn previous_measure(&self, index: usize) -> Option<&GridMeasure> {
        index.checked_sub(1).and_then(|i| self.measures.get(i))
    }

    pub fn next_measure(&self, index: usize) -> Option<&GridMeasure> {
        self.measures.get(index + 1)
    }

    pub fn measure_count(&self) -> usize {
        self.measures.len()
    }

    /// Every slice in serialization order, as positions into the measures
    pub fn flatten(&self) -> Vec<SlicePosition> {
        self.measures
            .iter()
            .enumerate()
            .flat_map(|(m, measure)| (0..measure.len()).map(move |s| (m, s)))
            .collect()
    }

    pub fn slice(&self, position: SlicePosition) -> Option<&GridSlice> {
        self.measures
            .get(position.0)
            .and_then(|measure| measure.slices().get(position.1))
    }

    fn slice_mut(&mut self, position: SlicePosition) -> Option<&mut GridSlice> {
        self.measures
            .get_mut(position.0)
            .and_then(|measure| measure.slices_mut().get_mut(position.1))
    }

    /// Run every finishing pass. Does nothing if already finalized.
    pub fn finalize(&mut self) {
        if self.state != GridState::Accumulating {
            return;
        }

        self.state = GridState::Flattening;
        self.calculate_durations();

        self.state = GridState::ExtendingSustains;
        self.add_null_tokens();

        self.state = GridState::InsertingBarlines;
        self.add_measure_lines();
        self.add_last_measure();

        self.state = GridState::Reflattening;
        self.calculate_durations();

        self.state = GridState::ReconcilingManipulators;
        let passes = self.reconcile_manipulators();
        self.calculate_durations();
        self.state = GridState::Finalized;

        for position in self.flatten() {
            if let Some(slice) = self.slice(position).filter(|slice| has_touching_merges(slice)) {
                warn!("manipulator line at {} merges across two staves", slice.timestamp);
            }
        }

        debug!(
            "grid finalized: {} measures, {} slices, {} manipulator passes",
            self.measures.len(),
            self.flatten().len(),
            passes
        );
    }

    /// Set `duration_to_next` from consecutive timestamps. The last slice
    /// takes the first nonzero token duration it holds, else zero.
    fn calculate_durations(&mut self) {
        let order = self.flatten();
        for (i, &position) in order.iter().enumerate() {
            let duration = match (self.slice(position), order.get(i + 1).and_then(|&n| self.slice(n))) {
                (Some(current), Some(next)) => next.timestamp - current.timestamp,
                (Some(current), None) => current.first_nonzero_duration().unwrap_or_else(zero),
                _ => continue,
            };
            if let Some(slice) = self.slice_mut(position) {
                slice.duration_to_next = duration;
            }
        }
    }

    /// Fill the slices a note spans with continuation tokens
    fn add_null_tokens(&mut self) {
        let order = self.flatten();
        for i in 0..order.len() {
            let Some(slice) = self.slice(order[i]) else {
                continue;
            };
            if !slice.is_notes_slice() {
                continue;
            }

            let mut sustained = Vec::new();
            for (p, part) in slice.parts().iter().enumerate() {
                for (s, staff) in part.staves().iter().enumerate() {
                    for (v, token) in staff.voices().iter().enumerate() {
                        if let Some(token) = token {
                            if !token.is_null() && token.forward_remaining() > zero() {
                                sustained.push((p, s, v, token.clone()));
                            }
                        }
                    }
                }
            }

            for (p, s, v, token) in sustained {
                self.extend_duration_token(&order, i, p, s, v, &token);
            }
        }
    }

    fn extend_duration_token(
        &mut self,
        order: &[SlicePosition],
        start: usize,
        part: usize,
        staff: usize,
        voice: usize,
        token: &GridToken,
    ) {
        let mut elapsed = match self.slice(order[start]) {
            Some(slice) => slice.duration_to_next,
            None => return,
        };
        let mut current = token.continued(elapsed, "");

        for &position in &order[start + 1..] {
            if current.forward_remaining() <= zero() {
                break;
            }
            let Some(slice) = self.slice_mut(position) else {
                break;
            };
            let marker = slice.kind.null_token();
            elapsed = slice.duration_to_next;
            let timestamp = slice.timestamp;

            let Some(grid_staff) = slice.staff_mut(part, staff) else {
                warn!(
                    "sustained note in part {} staff {} has no staff at {}",
                    part + 1,
                    staff + 1,
                    timestamp
                );
                return;
            };
            if grid_staff.get(voice).is_some() {
                warn!(
                    "note in part {} staff {} voice {} overlaps a later event at {}",
                    part + 1,
                    staff + 1,
                    voice + 1,
                    timestamp
                );
                return;
            }

            let continuation = GridToken::continuation(
                marker,
                current.forward_remaining(),
                current.backward_elapsed(),
            );
            current = continuation.continued(elapsed, "");
            grid_staff.set(voice, continuation);
        }

        if current.forward_remaining() < zero() {
            warn!(
                "note in part {} staff {} voice {} ends inside a slice ({} past the boundary)",
                part + 1,
                staff + 1,
                voice + 1,
                -current.forward_remaining()
            );
        }
    }

    /// Barline between each pair of measures, at the next measure's start.
    /// Each staff gets as many `=` tokens as the fewer of the two voice counts.
    fn add_measure_lines(&mut self) {
        for m in 0..self.measures.len().saturating_sub(1) {
            let (Some(end), Some(next)) = (self.measures[m].back(), self.measures[m + 1].front()) else {
                continue;
            };

            let shapes = next.shapes();
            let mut barline = GridSlice::with_shape(next.timestamp, SliceKind::Barline, &shapes);
            for (p, shape) in shapes.iter().enumerate() {
                for s in 0..shape.staff_count {
                    let layers = end.outgoing_voice_count(p, s).min(next.voice_count(p, s));
                    if let Some(staff) = barline.staff_mut(p, s) {
                        for _ in 0..layers {
                            staff.push(GridToken::structural("="));
                        }
                    }
                }
                fill_verses(&mut barline, p, "=");
            }
            self.measures[m].push_slice(barline);
        }
    }

    /// Closing barline: one token per staff, `==` when the measure is final
    fn add_last_measure(&mut self) {
        let Some(measure) = self.measures.last_mut() else {
            return;
        };
        let Some(model) = measure.back() else {
            return;
        };

        let timestamp = if measure.duration > zero() {
            measure.end_timestamp()
        } else {
            model.timestamp + model.duration_to_next
        };
        let text = if measure.is_final() { "==" } else { "=" };
        let shapes = model.shapes();

        let mut barline = GridSlice::with_shape(timestamp, SliceKind::Barline, &shapes);
        for (p, shape) in shapes.iter().enumerate() {
            for s in 0..shape.staff_count {
                if let Some(staff) = barline.staff_mut(p, s) {
                    staff.push(GridToken::structural(text));
                }
            }
            fill_verses(&mut barline, p, text);
        }
        measure.push_slice(barline);
    }

    /// Insert manipulator lines until every adjacent pair agrees.
    /// Returns the number of passes that inserted something.
    fn reconcile_manipulators(&mut self) -> usize {
        let mut passes = 0;
        while self.manipulator_pass() > 0 {
            passes += 1;
        }
        passes
    }

    fn manipulator_pass(&mut self) -> usize {
        let mut inserted = 0;
        for m in 0..self.measures.len() {
            let mut s = 0;
            while s < self.measures[m].len() {
                let left = &self.measures[m].slices()[s];
                let right = if s + 1 < self.measures[m].len() {
                    self.measures[m].slices().get(s + 1)
                } else {
                    self.measures.get(m + 1).and_then(GridMeasure::front)
                };
                let Some(right) = right else {
                    break;
                };

                match manipulator_check(left, right) {
                    Some(manipulator) => {
                        self.measures[m].insert_slice(s + 1, manipulator);
                        inserted += 1;
                        s += 2;
                    }
                    None => s += 1,
                }
            }
        }
        inserted
    }

    /// Finalize if needed, then move every token into `outfile`
    pub fn transfer_tokens(mut self, outfile: &mut HumdrumFile) {
        self.finalize();

        let Some(shapes) = self
            .measures
            .iter()
            .find_map(GridMeasure::front)
            .map(GridSlice::shapes)
        else {
            return;
        };

        outfile.append_line(self.exclusive_interpretation_line(&shapes));
        outfile.append_line(self.part_indication_line(&shapes));
        if shapes.iter().any(|shape| shape.staff_count > 1) {
            outfile.append_line(self.staff_indication_line(&shapes));
        }

        let recip = self.recip;
        for measure in &mut self.measures {
            measure.transfer_tokens(outfile, recip);
        }

        outfile.append_line(self.spine_line(&shapes, "*-", |_, _| "*-".to_string(), |_| "*-".to_string()));
    }

    fn exclusive_interpretation_line(&self, shapes: &[PartShape]) -> HumdrumLine {
        self.spine_line(
            shapes,
            "**recip",
            |_, _| "**kern".to_string(),
            |_| "**text".to_string(),
        )
    }

    fn part_indication_line(&self, shapes: &[PartShape]) -> HumdrumLine {
        self.spine_line(
            shapes,
            "*",
            |p, _| format!("*part{}", p + 1),
            |p| format!("*part{}", p + 1),
        )
    }

    /// Staves are numbered across the whole score, lowest part first
    fn staff_indication_line(&self, shapes: &[PartShape]) -> HumdrumLine {
        let first_staff: Vec<usize> = shapes
            .iter()
            .scan(1, |next, shape| {
                let first = *next;
                *next += shape.staff_count;
                Some(first)
            })
            .collect();
        self.spine_line(
            shapes,
            "*",
            |p, s| format!("*staff{}", first_staff[p] + s),
            |p| format!("*staff{}", first_staff[p]),
        )
    }

    /// One token per column in output order: optional recip column, then
    /// parts and staves from the highest index down, verses after staves.
    fn spine_line(
        &self,
        shapes: &[PartShape],
        recip_token: &str,
        staff_token: impl Fn(usize, usize) -> String,
        verse_token: impl Fn(usize) -> String,
    ) -> HumdrumLine {
        let mut line = HumdrumLine::new();
        if self.recip {
            line.push(recip_token);
        }
        for (p, shape) in shapes.iter().enumerate().rev() {
            for s in (0..shape.staff_count).rev() {
                line.push(staff_token(p, s));
            }
            for _ in 0..shape.verse_count {
                line.push(verse_token(p));
            }
        }
        line
    }
}

fn fill_verses(slice: &mut GridSlice, part: usize, text: &str) {
    if let Some(grid_part) = slice.part_mut(part) {
        for slot in grid_part.verses_mut() {
            *slot = Some(GridToken::structural(text));
        }
    }
}

/// Absolute durations of the slices, for callers inspecting a finalized grid
pub fn slice_durations(grid: &HumGrid) -> Vec<Rational> {
    grid.flatten()
        .into_iter()
        .filter_map(|position| grid.slice(position).map(|slice| slice.duration_to_next))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(n: i64, d: i64) -> Rational {
        Rational::new(n, d)
    }

    fn notes(timestamp: Rational, shapes: &[PartShape], tokens: &[(usize, usize, usize, &str, Rational)]) -> GridSlice {
        let mut slice = GridSlice::with_shape(timestamp, SliceKind::Notes, shapes);
        for &(p, s, v, text, duration) in tokens {
            slice.staff_mut(p, s).unwrap().set(v, GridToken::new(text, duration));
        }
        slice
    }

    fn render(grid: HumGrid) -> Vec<String> {
        let mut file = HumdrumFile::new();
        grid.transfer_tokens(&mut file);
        file.lines().iter().map(ToString::to_string).collect()
    }

    fn two_single_staff_parts() -> Vec<PartShape> {
        vec![PartShape::new(1, 0), PartShape::new(1, 0)]
    }

    #[test]
    fn test_two_parts_one_measure() {
        let shapes = two_single_staff_parts();
        let mut grid = HumGrid::new();
        let measure = grid.add_measure(GridMeasure::new(1, zero(), r(1, 1))).unwrap();
        measure.push_slice(notes(
            zero(),
            &shapes,
            &[(0, 0, 0, "2c", r(1, 2)), (1, 0, 0, "1C", r(1, 1))],
        ));
        measure.push_slice(notes(r(1, 2), &shapes, &[(0, 0, 0, "2d", r(1, 2))]));
        measure.make_final();

        let lines = render(grid);
        assert_eq!(
            lines,
            vec!["**kern\t**kern", "*part2\t*part1", "1C\t2c", ".\t2d", "==\t==", "*-\t*-"]
        );
    }

    #[test]
    fn test_recip_column() {
        let shapes = two_single_staff_parts();
        let mut grid = HumGrid::new();
        grid.set_recip(true);
        let measure = grid.add_measure(GridMeasure::new(1, zero(), r(1, 1))).unwrap();
        measure.push_slice(notes(
            zero(),
            &shapes,
            &[(0, 0, 0, "2c", r(1, 2)), (1, 0, 0, "1C", r(1, 1))],
        ));
        measure.push_slice(notes(r(1, 2), &shapes, &[(0, 0, 0, "2d", r(1, 2))]));

        let lines = render(grid);
        assert_eq!(lines[0], "**recip\t**kern\t**kern");
        assert_eq!(lines[1], "*\t*part2\t*part1");
        assert_eq!(lines[2], "2\t1C\t2c");
        assert_eq!(lines[3], "2\t.\t2d");
        assert_eq!(lines[4], "=\t=\t=");
        assert_eq!(lines[5], "*-\t*-\t*-");
    }

    #[test]
    fn test_sustain_conserves_duration() {
        let shapes = vec![PartShape::new(1, 0), PartShape::new(1, 0)];
        let mut grid = HumGrid::new();
        let measure = grid.add_measure(GridMeasure::new(1, zero(), r(1, 1))).unwrap();
        measure.push_slice(notes(
            zero(),
            &shapes,
            &[(0, 0, 0, "4c", r(1, 4)), (1, 0, 0, "1C", r(1, 1))],
        ));
        let mut clef = GridSlice::with_shape(r(1, 4), SliceKind::Clefs, &shapes);
        clef.staff_mut(0, 0).unwrap().set(0, GridToken::structural("*clefF4"));
        measure.push_slice(clef);
        for (i, text) in ["4d", "4e", "4f"].into_iter().enumerate() {
            let onset = r(i as i64 + 1, 4);
            measure.push_slice(notes(onset, &shapes, &[(0, 0, 0, text, r(1, 4))]));
        }
        grid.finalize();

        let order = grid.flatten();
        let mut seen = Vec::new();
        for &position in &order {
            let slice = grid.slice(position).unwrap();
            if let Some(token) = slice.staff(1, 0).and_then(|staff| staff.get(0)) {
                if slice.is_barline_slice() {
                    continue;
                }
                assert_eq!(token.duration(), r(1, 1));
                seen.push((token.text().unwrap().to_string(), token.forward_remaining()));
            }
        }
        assert_eq!(
            seen,
            vec![
                ("1C".to_string(), r(1, 1)),
                ("*".to_string(), r(3, 4)),
                (".".to_string(), r(3, 4)),
                (".".to_string(), r(1, 2)),
                (".".to_string(), r(1, 4)),
            ]
        );
    }

    #[test]
    fn test_flattening_is_deterministic() {
        let shapes = vec![PartShape::new(1, 0)];
        let mut grid = HumGrid::new();
        for m in 0..3 {
            let start = r(m, 1);
            let measure = grid.add_measure(GridMeasure::new(m + 1, start, r(1, 1))).unwrap();
            measure.push_slice(notes(start, &shapes, &[(0, 0, 0, "4.c", r(3, 8))]));
            measure.push_slice(notes(start + r(3, 8), &shapes, &[(0, 0, 0, "8d", r(1, 8))]));
            measure.push_slice(notes(start + r(1, 2), &shapes, &[(0, 0, 0, "2e", r(1, 2))]));
        }
        grid.finalize();
        let first = slice_durations(&grid);
        grid.calculate_durations();
        assert_eq!(slice_durations(&grid), first);

        let order = grid.flatten();
        for pair in order.windows(2) {
            let a = grid.slice(pair[0]).unwrap();
            let b = grid.slice(pair[1]).unwrap();
            assert_eq!(a.duration_to_next, b.timestamp - a.timestamp);
        }
    }

    #[test]
    fn test_voice_split_and_merge_across_barline() {
        let shapes = vec![PartShape::new(1, 0)];
        let mut grid = HumGrid::new();
        let first = grid.add_measure(GridMeasure::new(1, zero(), r(1, 1))).unwrap();
        first.push_slice(notes(zero(), &shapes, &[(0, 0, 0, "1c", r(1, 1))]));
        let second = grid.add_measure(GridMeasure::new(2, r(1, 1), r(1, 1))).unwrap();
        second.push_slice(notes(
            r(1, 1),
            &shapes,
            &[(0, 0, 0, "1e", r(1, 1)), (0, 0, 1, "1C", r(1, 1))],
        ));

        let lines = render(grid);
        assert_eq!(
            lines,
            vec!["**kern", "*part1", "1c", "=", "*^", "1e\t1C", "*v\t*v", "=", "*-"]
        );
    }

    #[test]
    fn test_adjacent_voice_counts_converge() {
        let shapes = vec![PartShape::new(2, 0)];
        let mut grid = HumGrid::new();
        let measure = grid.add_measure(GridMeasure::new(1, zero(), r(1, 1))).unwrap();
        measure.push_slice(notes(zero(), &shapes, &[(0, 0, 0, "4c", r(1, 4))]));
        measure.push_slice(notes(
            r(1, 4),
            &shapes,
            &[
                (0, 0, 0, "4d", r(1, 4)),
                (0, 0, 1, "4f", r(1, 4)),
                (0, 0, 2, "4a", r(1, 4)),
                (0, 1, 0, "4C", r(1, 4)),
                (0, 1, 1, "4E", r(1, 4)),
            ],
        ));
        measure.push_slice(notes(r(1, 2), &shapes, &[(0, 1, 0, "2G", r(1, 2))]));
        grid.finalize();

        let order = grid.flatten();
        for pair in order.windows(2) {
            let left = grid.slice(pair[0]).unwrap();
            let right = grid.slice(pair[1]).unwrap();
            assert!(!has_touching_merges(left));
            for s in 0..2 {
                assert_eq!(
                    left.outgoing_voice_count(0, s),
                    right.voice_count(0, s),
                    "staff {} between {:?} and {:?}",
                    s,
                    left.kind,
                    right.kind
                );
            }
        }
    }

    #[test]
    fn test_add_measure_after_finalize_fails() {
        let mut grid = HumGrid::new();
        grid.finalize();
        assert_eq!(
            grid.add_measure(GridMeasure::new(1, zero(), zero())).unwrap_err(),
            GridError::NotAccumulating(GridState::Finalized)
        );
        assert!(grid.measure_mut(0).is_none());
    }

    #[test]
    fn test_empty_grid_serializes_nothing() {
        let lines = render(HumGrid::new());
        assert!(lines.is_empty());
    }
}
