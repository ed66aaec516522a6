//! Conversion entry points exposed to JavaScript

use wasm_bindgen::prelude::*;

use crate::api::helpers::js_error;
use crate::converters::musicxml::{convert_musicxml_to_humdrum, ConversionSettings};
use crate::{wasm_info, wasm_log, wasm_warn};

/// Convert MusicXML to Humdrum
///
/// # Parameters
/// * `musicxml` - partwise MusicXML document
/// * `settings_json` - optional `ConversionSettings` as JSON; missing fields use defaults
///
/// # Returns
/// `ConversionResult` as JSON: `{ humdrum_source, skipped_elements }`
#[wasm_bindgen(js_name = convertMusicXMLToHumdrum)]
pub fn convert_musicxml_to_humdrum_js(
    musicxml: String,
    settings_json: Option<String>,
) -> Result<String, JsValue> {
    wasm_info!("convertMusicXMLToHumdrum called ({} bytes)", musicxml.len());

    let settings = parse_settings(settings_json.as_deref()).map_err(|e| js_error("Settings parse error", e))?;

    let result = convert_musicxml_to_humdrum(&musicxml, settings)
        .map_err(|e| js_error("Conversion error", e))?;

    let result_json =
        serde_json::to_string(&result).map_err(|e| js_error("Result serialization error", e))?;

    wasm_info!("  Humdrum generated: {} bytes", result.humdrum_source.len());
    if !result.skipped_elements.is_empty() {
        wasm_warn!("  Skipped {} elements during conversion", result.skipped_elements.len());
        for skipped in &result.skipped_elements {
            wasm_log!(
                "    {} (part {:?}, measure {:?}): {}",
                skipped.element_type,
                skipped.part_id,
                skipped.measure_number,
                skipped.reason
            );
        }
    }
    wasm_info!("convertMusicXMLToHumdrum completed successfully");

    Ok(result_json)
}

/// Default conversion settings as JSON, for UIs building a settings form
#[wasm_bindgen(js_name = defaultHumdrumSettings)]
pub fn default_humdrum_settings() -> Result<String, JsValue> {
    serde_json::to_string(&ConversionSettings::default())
        .map_err(|e| js_error("Settings serialization error", e))
}

/// Parse optional settings JSON; blank input means defaults
pub fn parse_settings(json: Option<&str>) -> Result<Option<ConversionSettings>, serde_json::Error> {
    match json.map(str::trim) {
        Some(text) if !text.is_empty() => serde_json::from_str(text).map(Some),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_settings() {
        assert_eq!(parse_settings(None).unwrap(), None);
        assert_eq!(parse_settings(Some("  ")).unwrap(), None);

        let settings = parse_settings(Some(r#"{"recip_spine": true, "chord_separator": "|"}"#))
            .unwrap()
            .unwrap();
        assert!(settings.recip_spine);
        assert_eq!(settings.chord_separator, "|");
        assert!(settings.convert_directions);

        assert!(parse_settings(Some("{not json")).is_err());
    }
}
