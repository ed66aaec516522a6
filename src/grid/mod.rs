//! Time-aligned spine grid
//!
//! Events from every part are placed into `GridSlice`s (one per distinct
//! onset and kind), slices into `GridMeasure`s, measures into a `HumGrid`.
//! Finalizing the grid fills sustained notes, adds barlines and spine
//! manipulators; serializing it yields a column-aligned Humdrum document.

pub mod duration;
pub mod humgrid;
pub mod manipulator;
pub mod measure;
pub mod output;
pub mod slice;
pub mod staff;
pub mod token;

pub use duration::{
    duration_to_recip, duration_to_recip_with_dots, recip_to_duration, ticks_to_duration,
    DurationError, Rational,
};
pub use humgrid::{GridError, GridState, HumGrid};
pub use manipulator::{has_touching_merges, manipulator_check};
pub use measure::GridMeasure;
pub use output::{HumdrumFile, HumdrumLine};
pub use slice::{GridSlice, SliceKind};
pub use staff::{GridPart, GridStaff, PartShape};
pub use token::GridToken;
