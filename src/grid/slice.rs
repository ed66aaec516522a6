//! One vertical time-cut of the score

use crate::grid::duration::{duration_to_recip, zero, Rational};
use crate::grid::output::HumdrumLine;
use crate::grid::staff::{GridPart, GridStaff, PartShape};
use crate::grid::token::{NULL_DATA, NULL_INTERPRETATION, NULL_LOCAL_COMMENT};

/// What a slice carries; decides its null placeholder and its rhythm token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SliceKind {
    Clefs,
    KeySignatures,
    TimeSignatures,
    Layout,
    Notes,
    Manipulator,
    Barline,
}

impl SliceKind {
    /// Placeholder for an empty voice slot on a line of this kind
    pub fn null_token(self) -> &'static str {
        match self {
            SliceKind::Notes => NULL_DATA,
            SliceKind::Layout => NULL_LOCAL_COMMENT,
            SliceKind::Barline => "=",
            SliceKind::Clefs
            | SliceKind::KeySignatures
            | SliceKind::TimeSignatures
            | SliceKind::Manipulator => NULL_INTERPRETATION,
        }
    }

    pub fn is_interpretation(self) -> bool {
        matches!(
            self,
            SliceKind::Clefs
                | SliceKind::KeySignatures
                | SliceKind::TimeSignatures
                | SliceKind::Manipulator
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridSlice {
    /// Absolute onset in whole notes
    pub timestamp: Rational,
    /// Time until the next slice in serialization order (set when the grid is flattened)
    pub duration_to_next: Rational,
    pub kind: SliceKind,
    parts: Vec<GridPart>,
}

impl GridSlice {
    pub fn new(timestamp: Rational, kind: SliceKind) -> Self {
        Self {
            timestamp,
            duration_to_next: zero(),
            kind,
            parts: Vec::new(),
        }
    }

    pub fn with_shape(timestamp: Rational, kind: SliceKind, shapes: &[PartShape]) -> Self {
        let mut slice = Self::new(timestamp, kind);
        slice.initialize(shapes);
        slice
    }

    /// Discard any content and rebuild an empty part/staff tree
    pub fn initialize(&mut self, shapes: &[PartShape]) {
        self.parts = shapes.iter().map(|&shape| GridPart::with_shape(shape)).collect();
    }

    pub fn shapes(&self) -> Vec<PartShape> {
        self.parts.iter().map(GridPart::shape).collect()
    }

    pub fn part_count(&self) -> usize {
        self.parts.len()
    }

    pub fn parts(&self) -> &[GridPart] {
        &self.parts
    }

    pub fn part(&self, part: usize) -> Option<&GridPart> {
        self.parts.get(part)
    }

    pub fn part_mut(&mut self, part: usize) -> Option<&mut GridPart> {
        self.parts.get_mut(part)
    }

    pub fn staff(&self, part: usize, staff: usize) -> Option<&GridStaff> {
        self.parts.get(part).and_then(|p| p.staff(staff))
    }

    pub fn staff_mut(&mut self, part: usize, staff: usize) -> Option<&mut GridStaff> {
        self.parts.get_mut(part).and_then(|p| p.staff_mut(staff))
    }

    pub fn is_notes_slice(&self) -> bool {
        self.kind == SliceKind::Notes
    }

    pub fn is_clef_slice(&self) -> bool {
        self.kind == SliceKind::Clefs
    }

    pub fn is_key_signature_slice(&self) -> bool {
        self.kind == SliceKind::KeySignatures
    }

    pub fn is_time_signature_slice(&self) -> bool {
        self.kind == SliceKind::TimeSignatures
    }

    pub fn is_manipulator_slice(&self) -> bool {
        self.kind == SliceKind::Manipulator
    }

    pub fn is_barline_slice(&self) -> bool {
        self.kind == SliceKind::Barline
    }

    pub fn is_layout_slice(&self) -> bool {
        self.kind == SliceKind::Layout
    }

    /// Spines entering this line for one staff (occupied or placeholder)
    pub fn voice_count(&self, part: usize, staff: usize) -> usize {
        self.staff(part, staff).map_or(1, GridStaff::voice_count)
    }

    /// Spines leaving this line for one staff.
    ///
    /// Equal to `voice_count` except on manipulator lines, where `*^` yields
    /// two spines, `*^N` yields N, and each run of adjacent `*v` yields one.
    pub fn outgoing_voice_count(&self, part: usize, staff: usize) -> usize {
        let Some(grid_staff) = self.staff(part, staff) else {
            return 1;
        };
        if !self.is_manipulator_slice() || grid_staff.is_empty() {
            return grid_staff.voice_count();
        }

        let mut count = 0;
        let mut in_merge = false;
        for token in grid_staff.voices() {
            let text = token.as_ref().and_then(|t| t.text()).unwrap_or(NULL_INTERPRETATION);
            if text == "*v" {
                if !in_merge {
                    count += 1;
                }
                in_merge = true;
                continue;
            }
            in_merge = false;
            count += match text.strip_prefix("*^") {
                Some("") => 2,
                Some(fanout) => fanout.parse::<usize>().unwrap_or(2),
                None => 1,
            };
        }
        count
    }

    /// Duration of the first token in this slice that has time left to run
    pub fn first_nonzero_duration(&self) -> Option<Rational> {
        self.parts
            .iter()
            .flat_map(|part| part.staves())
            .flat_map(|staff| staff.voices())
            .flatten()
            .map(|token| token.forward_remaining())
            .find(|duration| *duration > zero())
    }

    /// Leading rhythm-summary token for this line
    pub fn recip_token(&self) -> String {
        match self.kind {
            SliceKind::Notes => duration_to_recip(self.duration_to_next),
            SliceKind::Clefs => NULL_INTERPRETATION.to_string(),
            kind => kind.null_token().to_string(),
        }
    }

    /// Move this slice's token texts into one output line.
    ///
    /// Parts and staves are visited highest index first; voices left to
    /// right; verse columns follow the staves of their part.
    pub fn transfer_tokens(&mut self, recip: bool) -> HumdrumLine {
        let mut line = HumdrumLine::new();
        if recip {
            line.push(self.recip_token());
        }

        let null = self.kind.null_token();
        for part in self.parts.iter_mut().rev() {
            for staff in part.staves_mut().iter_mut().rev() {
                if staff.is_empty() {
                    line.push(null);
                    continue;
                }
                for slot in staff.voices_mut() {
                    let text = slot.as_mut().and_then(|token| token.take_text());
                    line.push(text.unwrap_or_else(|| null.to_string()));
                }
            }
            for slot in part.verses_mut() {
                let text = slot.as_mut().and_then(|token| token.take_text());
                line.push(text.unwrap_or_else(|| null.to_string()));
            }
        }
        line
    }
}
