//! WASM API
//!
//! JavaScript-facing entry points and the console logging helpers they use.
//!
//! # Module Structure
//!
//! - `helpers`: logging macros and error conversion
//! - `convert`: `convertMusicXMLToHumdrum` and settings helpers

pub mod helpers;
pub mod convert;

pub use convert::{convert_musicxml_to_humdrum_js, default_humdrum_settings};
