//! One cell of the grid
//!
//! A `GridToken` owns its rendered text until serialization moves it into a
//! `HumdrumLine`. The move is `Option::take`, so a token can be consumed at
//! most once; a consumed token reports `text() == None`.

use crate::grid::duration::{zero, Rational};

/// Null data token (sustained note or empty voice on a data line)
pub const NULL_DATA: &str = ".";

/// Null interpretation token ("unchanged" on an interpretation line)
pub const NULL_INTERPRETATION: &str = "*";

/// Null local comment token
pub const NULL_LOCAL_COMMENT: &str = "!";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridToken {
    text: Option<String>,
    /// Duration still ahead of this cell (to the end of the note)
    forward_remaining: Rational,
    /// Duration already elapsed since the note began
    backward_elapsed: Rational,
}

impl GridToken {
    /// A token starting a note/rest (or a zero-duration item when `duration` is 0)
    pub fn new(text: impl Into<String>, duration: Rational) -> Self {
        Self {
            text: Some(text.into()),
            forward_remaining: duration,
            backward_elapsed: zero(),
        }
    }

    /// A zero-duration token (barlines, manipulators, interpretations)
    pub fn structural(text: impl Into<String>) -> Self {
        Self::new(text, zero())
    }

    /// A placeholder for a note begun in an earlier slice
    pub fn continuation(
        text: impl Into<String>,
        forward_remaining: Rational,
        backward_elapsed: Rational,
    ) -> Self {
        Self {
            text: Some(text.into()),
            forward_remaining,
            backward_elapsed,
        }
    }

    /// Rendered text, or `None` once consumed
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn is_consumed(&self) -> bool {
        self.text.is_none()
    }

    /// Move the text out of the token. Only the first call returns `Some`.
    pub fn take_text(&mut self) -> Option<String> {
        self.text.take()
    }

    /// Concatenate chord members: `existing + separator + other`
    pub fn append_text(&mut self, separator: &str, other: &str) {
        match self.text.as_mut() {
            Some(text) => {
                text.push_str(separator);
                text.push_str(other);
            }
            None => self.text = Some(other.to_string()),
        }
    }

    pub fn forward_remaining(&self) -> Rational {
        self.forward_remaining
    }

    pub fn backward_elapsed(&self) -> Rational {
        self.backward_elapsed
    }

    /// Total duration of the sustained item (constant along its continuations)
    pub fn duration(&self) -> Rational {
        self.forward_remaining + self.backward_elapsed
    }

    /// True for `.` placeholders
    pub fn is_null(&self) -> bool {
        self.text.as_deref() == Some(NULL_DATA)
    }

    /// Continuation of this token after `elapsed` more time, rendered with `marker`
    pub fn continued(&self, elapsed: Rational, marker: &str) -> GridToken {
        GridToken::continuation(
            marker,
            self.forward_remaining - elapsed,
            self.backward_elapsed + elapsed,
        )
    }
}
