//! MusicXML to Humdrum WASM Module
//!
//! Converts partwise MusicXML into Humdrum `**kern` by aligning every
//! part's events on a shared time grid. Usable natively (as an rlib) and
//! from JavaScript (as a cdylib through wasm-bindgen).

pub mod api;
pub mod converters;
pub mod grid;

// Re-export commonly used types
pub use converters::musicxml::{
    convert_musicxml_to_humdrum, ConversionError, ConversionResult, ConversionSettings,
    ParseError, SkippedElement,
};
pub use grid::{HumGrid, HumdrumFile};

use wasm_bindgen::prelude::*;

// This is like the `main` function, but for WASM modules.
#[wasm_bindgen(start)]
pub fn main() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();

    init_logging();

    log::info!("musicxml2hum WASM module initialized");
}

#[cfg(feature = "console_log")]
fn init_logging() {
    if let Err(e) = console_log::init_with_level(log::Level::Debug) {
        crate::wasm_warn!("logger already initialized: {}", e);
    }
}

#[cfg(not(feature = "console_log"))]
fn init_logging() {}
