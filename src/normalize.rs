//! Field Normalization
//!
//! Turns a [`RawAttributeMap`] into typed, sectioned [`NormalizedSettings`].
//! Every recognized field ends up populated: absent or unparseable values fall
//! back to the editor's documented default. Unknown attributes are ignored so
//! newer sidecars keep working.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::debug;

use crate::preset::{
    ColorAdjustments, DetailSettings, EffectSettings, HueBand, HueTable, LensCorrections,
    SourceMetadata, ToneAdjustments, WhiteBalanceMode,
};
use crate::sidecar::RawAttributeMap;

/// Sidecar value meaning "use the camera's white balance"
pub const AS_SHOT: &str = "As Shot";

/// White balance as read from the sidecar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhiteBalanceSettings {
    pub mode: WhiteBalanceMode,
    pub temperature_kelvin: Option<i64>,
    pub tint: Option<i64>,
}

/// Typed intermediate form between extraction and conversion.
///
/// Tone values are still in editor units (hundredths).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedSettings {
    pub tone: ToneAdjustments,
    pub color_adjustments: ColorAdjustments,
    pub detail: DetailSettings,
    pub lens: LensCorrections,
    pub effects: EffectSettings,
    pub source_meta: SourceMetadata,
    pub white_balance: WhiteBalanceSettings,
}

impl Default for NormalizedSettings {
    fn default() -> Self {
        normalize(&RawAttributeMap::new())
    }
}

/// Normalize raw sidecar attributes. Never fails.
pub fn normalize(attrs: &RawAttributeMap) -> NormalizedSettings {
    let get_str = |key: &str| -> Option<&str> {
        attrs.get(key).map(|v| v.trim()).filter(|v| !v.is_empty())
    };

    let get_f64 = |key: &str, default: f64| -> f64 {
        get_str(key)
            .and_then(|v| parse_finite(key, v))
            .unwrap_or(default)
    };

    let get_i64 = |key: &str| -> Option<i64> { get_str(key).and_then(|v| parse_int(key, v)) };

    let get_i32 = |key: &str, default: i32| -> i32 {
        get_i64(key)
            .and_then(|v| i32::try_from(v).ok())
            .unwrap_or(default)
    };

    let get_bool = |key: &str| -> bool { get_str(key).map(is_truthy).unwrap_or(false) };

    let tone = ToneAdjustments {
        exposure: get_f64("Exposure2012", 0.0),
        contrast: get_f64("Contrast2012", 0.0),
        highlights: get_f64("Highlights2012", 0.0),
        shadows: get_f64("Shadows2012", 0.0),
        whites: get_f64("Whites2012", 0.0),
        blacks: get_f64("Blacks2012", 0.0),
        texture: get_f64("Texture", 0.0),
        clarity: get_f64("Clarity2012", 0.0),
        dehaze: get_f64("Dehaze", 0.0),
        vibrance: get_f64("Vibrance", 0.0),
        saturation: get_f64("Saturation", 0.0),
    };

    let hue_table = |prefix: &str| -> HueTable {
        let mut table = HueTable::default();
        for band in HueBand::ALL {
            let key = format!("{}Adjustment{}", prefix, band.attribute_suffix());
            table.set(band, get_i32(&key, 0));
        }
        table
    };

    let color_adjustments = ColorAdjustments {
        hue: hue_table("Hue"),
        saturation: hue_table("Saturation"),
        luminance: hue_table("Luminance"),
    };

    let defaults = DetailSettings::default();
    let detail = DetailSettings {
        sharpness: get_i32("Sharpness", defaults.sharpness),
        sharpen_radius: get_f64("SharpenRadius", defaults.sharpen_radius),
        sharpen_detail: get_i32("SharpenDetail", defaults.sharpen_detail),
        noise_reduction: get_i32("ColorNoiseReduction", defaults.noise_reduction),
        luminance_smoothing: get_i32("LuminanceSmoothing", defaults.luminance_smoothing),
    };

    let lens = LensCorrections {
        lens_profile_enabled: get_bool("LensProfileEnable"),
        auto_lateral_ca: get_bool("AutoLateralCA"),
        vignette_amount: get_i32("VignetteAmount", 0),
    };

    let effects = EffectSettings {
        grain_amount: get_i32("GrainAmount", 0),
        post_crop_vignette_amount: get_i32("PostCropVignetteAmount", 0),
    };

    let source_meta = SourceMetadata {
        format_version: get_str("Version").map(str::to_string),
        process_version: get_str("ProcessVersion").map(str::to_string),
        preset_type_label: get_str("PresetType").map(str::to_string),
        has_explicit_settings: get_bool("HasSettings"),
    };

    let mode = match get_str("WhiteBalance") {
        Some(AS_SHOT) => WhiteBalanceMode::Camera,
        _ => WhiteBalanceMode::Custom,
    };

    let white_balance = WhiteBalanceSettings {
        mode,
        temperature_kelvin: get_i64("Temperature"),
        tint: get_i64("Tint"),
    };

    NormalizedSettings {
        tone,
        color_adjustments,
        detail,
        lens,
        effects,
        source_meta,
        white_balance,
    }
}

/// "True" (any case) or "1"
pub fn is_truthy(value: &str) -> bool {
    let value = value.trim();
    value == "1" || value.eq_ignore_ascii_case("true")
}

fn parse_logged<T: FromStr>(key: &str, value: &str) -> Option<T> {
    match value.parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            debug!("ignoring unparseable {}={:?}", key, value);
            None
        }
    }
}

/// NaN and infinities parse as f64 but cannot be stored as JSON numbers
fn parse_finite(key: &str, value: &str) -> Option<f64> {
    let parsed = parse_logged::<f64>(key, value)?;
    if parsed.is_finite() {
        Some(parsed)
    } else {
        debug!("ignoring non-finite {}={:?}", key, value);
        None
    }
}

/// Integers are sometimes written as decimals ("4726.0")
fn parse_int(key: &str, value: &str) -> Option<i64> {
    if let Ok(v) = value.parse::<i64>() {
        return Some(v);
    }
    let rounded = parse_finite(key, value)?.round();
    // i64::MAX as f64 rounds up to 2^63, which is already out of range
    if rounded >= -(i64::MAX as f64) - 1.0 && rounded < i64::MAX as f64 {
        Some(rounded as i64)
    } else {
        debug!("ignoring out-of-range {}={:?}", key, value);
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(pairs: &[(&str, &str)]) -> RawAttributeMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_when_empty() {
        let settings = normalize(&RawAttributeMap::new());

        assert_eq!(settings.tone, ToneAdjustments::default());
        assert_eq!(settings.detail.sharpness, 40);
        assert!((settings.detail.sharpen_radius - 1.0).abs() < 1e-9);
        assert_eq!(settings.detail.sharpen_detail, 25);
        assert_eq!(settings.detail.noise_reduction, 25);
        assert_eq!(settings.detail.luminance_smoothing, 0);
        assert!(!settings.lens.lens_profile_enabled);
        assert!(!settings.lens.auto_lateral_ca);
        assert_eq!(settings.effects, EffectSettings::default());
        assert_eq!(settings.white_balance.mode, WhiteBalanceMode::Custom);
        assert_eq!(settings.white_balance.temperature_kelvin, None);
        assert_eq!(settings.source_meta.preset_type_label, None);
        assert!(!settings.source_meta.has_explicit_settings);
    }

    #[test]
    fn test_typed_coercion() {
        let settings = normalize(&attrs(&[
            ("Exposure2012", "+0.50"),
            ("Contrast2012", "-12"),
            ("SharpenRadius", "+1.2"),
            ("Sharpness", "55"),
            ("Temperature", "4726"),
            ("Tint", "-2"),
            ("LensProfileEnable", "1"),
            ("AutoLateralCA", "True"),
            ("HasSettings", "False"),
            ("HueAdjustmentAqua", "-8"),
            ("LuminanceAdjustmentOrange", "+14"),
            ("ProcessVersion", "11.0"),
            ("PresetType", "Normal"),
        ]));

        assert!((settings.tone.exposure - 0.5).abs() < 1e-9);
        assert!((settings.tone.contrast + 12.0).abs() < 1e-9);
        assert!((settings.detail.sharpen_radius - 1.2).abs() < 1e-9);
        assert_eq!(settings.detail.sharpness, 55);
        assert_eq!(settings.white_balance.temperature_kelvin, Some(4726));
        assert_eq!(settings.white_balance.tint, Some(-2));
        assert!(settings.lens.lens_profile_enabled);
        assert!(settings.lens.auto_lateral_ca);
        assert!(!settings.source_meta.has_explicit_settings);
        assert_eq!(settings.color_adjustments.hue.aqua, -8);
        assert_eq!(settings.color_adjustments.luminance.orange, 14);
        assert_eq!(settings.source_meta.process_version.as_deref(), Some("11.0"));
        assert_eq!(settings.source_meta.preset_type_label.as_deref(), Some("Normal"));
    }

    #[test]
    fn test_white_balance_mode() {
        let as_shot = normalize(&attrs(&[("WhiteBalance", "As Shot")]));
        assert_eq!(as_shot.white_balance.mode, WhiteBalanceMode::Camera);

        let custom = normalize(&attrs(&[("WhiteBalance", "Custom")]));
        assert_eq!(custom.white_balance.mode, WhiteBalanceMode::Custom);

        let daylight = normalize(&attrs(&[("WhiteBalance", "Daylight")]));
        assert_eq!(daylight.white_balance.mode, WhiteBalanceMode::Custom);
    }

    #[test]
    fn test_unparseable_values_fall_back() {
        let settings = normalize(&attrs(&[
            ("Sharpness", "lots"),
            ("Clarity2012", ""),
            ("Temperature", "4726.4"),
            ("Tint", "n/a"),
            ("SomeFutureSetting", "42"),
        ]));

        assert_eq!(settings.detail.sharpness, 40);
        assert_eq!(settings.tone.clarity, 0.0);
        assert_eq!(settings.white_balance.temperature_kelvin, Some(4726));
        assert_eq!(settings.white_balance.tint, None);
    }

    #[test]
    fn test_non_finite_and_overflowing_numbers_fall_back() {
        let settings = normalize(&attrs(&[
            ("Exposure2012", "NaN"),
            ("Contrast2012", "inf"),
            ("Highlights2012", "-infinity"),
            ("Shadows2012", "1e999"),
            ("Temperature", "1e999"),
            ("Tint", "9223372036854775808"),
            ("Sharpness", "1e30"),
            ("SharpenRadius", "NaN"),
        ]));

        let tone = &settings.tone;
        assert_eq!(tone.exposure, 0.0);
        assert_eq!(tone.contrast, 0.0);
        assert_eq!(tone.highlights, 0.0);
        assert_eq!(tone.shadows, 0.0);
        assert_eq!(settings.white_balance.temperature_kelvin, None);
        assert_eq!(settings.white_balance.tint, None);
        assert_eq!(settings.detail.sharpness, DetailSettings::default().sharpness);
        assert_eq!(
            settings.detail.sharpen_radius,
            DetailSettings::default().sharpen_radius
        );

        // Still serializes to a JSON document with numbers only
        let value = serde_json::to_value(&settings).unwrap();
        assert_eq!(value["tone"]["exposure"], serde_json::json!(0.0));
    }

    #[test]
    fn test_large_integers_in_range() {
        assert_eq!(parse_int("Temperature", "-9.2e18"), Some(-9_200_000_000_000_000_000));
        assert_eq!(parse_int("Temperature", "9223372036854775807"), Some(i64::MAX));
        assert_eq!(parse_int("Temperature", "9.3e18"), None);
    }

    #[test]
    fn test_truthy() {
        assert!(is_truthy("True"));
        assert!(is_truthy("true"));
        assert!(is_truthy("1"));
        assert!(!is_truthy("0"));
        assert!(!is_truthy("False"));
        assert!(!is_truthy("yes"));
    }
}
