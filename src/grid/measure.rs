use crate::grid::duration::{zero, Rational};
use crate::grid::output::HumdrumFile;
use crate::grid::slice::GridSlice;

/// Time-ordered slices of one measure plus its metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridMeasure {
    slices: Vec<GridSlice>,
    /// Source measure number
    pub number: i64,
    /// Absolute start in whole notes
    pub timestamp: Rational,
    /// Actual filled duration
    pub duration: Rational,
    /// Nominal duration implied by the time signature
    pub time_signature_duration: Rational,
    is_final: bool,
}

impl GridMeasure {
    pub fn new(number: i64, timestamp: Rational, duration: Rational) -> Self {
        Self {
            slices: Vec::new(),
            number,
            timestamp,
            duration,
            time_signature_duration: zero(),
            is_final: false,
        }
    }

    pub fn push_slice(&mut self, slice: GridSlice) {
        self.slices.push(slice);
    }

    pub fn insert_slice(&mut self, index: usize, slice: GridSlice) {
        let index = index.min(self.slices.len());
        self.slices.insert(index, slice);
    }

    pub fn slices(&self) -> &[GridSlice] {
        &self.slices
    }

    pub fn slices_mut(&mut self) -> &mut [GridSlice] {
        &mut self.slices
    }

    pub fn front(&self) -> Option<&GridSlice> {
        self.slices.first()
    }

    pub fn back(&self) -> Option<&GridSlice> {
        self.slices.last()
    }

    pub fn len(&self) -> usize {
        self.slices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }

    pub fn end_timestamp(&self) -> Rational {
        self.timestamp + self.duration
    }

    /// Mark as the closing measure of the piece (`==` barline)
    pub fn make_final(&mut self) {
        self.is_final = true;
    }

    pub fn is_final(&self) -> bool {
        self.is_final
    }

    pub fn transfer_tokens(&mut self, outfile: &mut HumdrumFile, recip: bool) {
        for slice in &mut self.slices {
            outfile.append_line(slice.transfer_tokens(recip));
        }
    }
}
