//! Sparse voice containers: `GridStaff` (voices of one staff) and
//! `GridPart` (staves and verse columns of one instrument).

use crate::grid::token::GridToken;

/// Declared column structure of one part: staff count and lyric verse count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PartShape {
    pub staff_count: usize,
    pub verse_count: usize,
}

impl PartShape {
    pub fn new(staff_count: usize, verse_count: usize) -> Self {
        Self {
            staff_count,
            verse_count,
        }
    }
}

/// Voice/layer slots of one staff at one instant.
///
/// Slots are grown on demand; intervening slots stay `None` and serialize
/// as null placeholders.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GridStaff {
    voices: Vec<Option<GridToken>>,
}

impl GridStaff {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of allocated voice slots (occupied or not)
    pub fn len(&self) -> usize {
        self.voices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }

    /// Number of columns this staff occupies on its line.
    ///
    /// An empty staff still emits one null placeholder, so it counts as one.
    pub fn voice_count(&self) -> usize {
        self.voices.len().max(1)
    }

    pub fn get(&self, voice: usize) -> Option<&GridToken> {
        self.voices.get(voice).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, voice: usize) -> Option<&mut GridToken> {
        self.voices.get_mut(voice).and_then(Option::as_mut)
    }

    /// Store `token` at `voice`, replacing any previous occupant
    pub fn set(&mut self, voice: usize, token: GridToken) {
        self.grow_to(voice);
        self.voices[voice] = Some(token);
    }

    /// Store `token` at `voice`; if the slot is taken, join the texts with
    /// `separator` (chord members share one column).
    pub fn append(&mut self, voice: usize, token: GridToken, separator: &str) {
        self.grow_to(voice);
        match self.voices[voice].as_mut() {
            Some(existing) => {
                if let Some(text) = token.text() {
                    existing.append_text(separator, text);
                }
            }
            None => self.voices[voice] = Some(token),
        }
    }

    /// Append a token in the next free voice slot
    pub fn push(&mut self, token: GridToken) {
        self.voices.push(Some(token));
    }

    pub fn voices(&self) -> &[Option<GridToken>] {
        &self.voices
    }

    pub fn voices_mut(&mut self) -> &mut [Option<GridToken>] {
        &mut self.voices
    }

    fn grow_to(&mut self, voice: usize) {
        if voice >= self.voices.len() {
            self.voices.resize(voice + 1, None);
        }
    }
}

/// Staves (and lyric verse columns) of one instrumental part at one instant
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GridPart {
    staves: Vec<GridStaff>,
    verses: Vec<Option<GridToken>>,
}

impl GridPart {
    /// Fresh part with every staff and verse column empty
    pub fn with_shape(shape: PartShape) -> Self {
        Self {
            staves: vec![GridStaff::new(); shape.staff_count],
            verses: vec![None; shape.verse_count],
        }
    }

    pub fn shape(&self) -> PartShape {
        PartShape::new(self.staves.len(), self.verses.len())
    }

    pub fn staff_count(&self) -> usize {
        self.staves.len()
    }

    pub fn verse_count(&self) -> usize {
        self.verses.len()
    }

    pub fn staff(&self, index: usize) -> Option<&GridStaff> {
        self.staves.get(index)
    }

    pub fn staff_mut(&mut self, index: usize) -> Option<&mut GridStaff> {
        self.staves.get_mut(index)
    }

    pub fn staves(&self) -> &[GridStaff] {
        &self.staves
    }

    pub fn staves_mut(&mut self) -> &mut [GridStaff] {
        &mut self.staves
    }

    pub fn verse(&self, index: usize) -> Option<&GridToken> {
        self.verses.get(index).and_then(Option::as_ref)
    }

    /// Store a lyric syllable; returns false if the part has no such verse column
    pub fn set_verse(&mut self, index: usize, token: GridToken) -> bool {
        match self.verses.get_mut(index) {
            Some(slot) => {
                *slot = Some(token);
                true
            }
            None => false,
        }
    }

    pub fn verses_mut(&mut self) -> &mut [Option<GridToken>] {
        &mut self.verses
    }
}
