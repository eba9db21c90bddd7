//! Built-in preset catalogue
//!
//! Shipped presets plus the default camera mapping table that points at them.
//! Built-ins are seeded once into the repository and never change.

use chrono::{DateTime, Utc};

use crate::config::{CameraMapping, PresetConfig};
use crate::convert::{ConvertOptions, PresetConverter};
use crate::normalize::NormalizedSettings;
use crate::preset::{Preset, ToneAdjustments, WhiteBalanceMode};

pub const CANON_STANDARD: &str = "builtin-canon-standard";
pub const CANON_EOS_R: &str = "builtin-canon-eos-r";
pub const NIKON_Z: &str = "builtin-nikon-z";
pub const SONY_ALPHA: &str = "builtin-sony-alpha";
pub const FUJIFILM_X: &str = "builtin-fujifilm-x";
pub const PORTRAIT: &str = "builtin-portrait";
pub const LANDSCAPE: &str = "builtin-landscape";

/// A shipped preset and its applicability metadata
#[derive(Debug, Clone)]
pub struct BuiltinPreset {
    pub id: &'static str,
    pub preset: Preset,
    pub photo_type: Option<&'static str>,
}

/// 2024-01-01T00:00:00Z
const CATALOGUE_EPOCH_SECS: i64 = 1_704_067_200;

/// Fixed timestamp so built-in content, and therefore ids, never drift
pub fn catalogue_epoch() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(CATALOGUE_EPOCH_SECS, 0).unwrap_or_default()
}

/// Ordered make → model-substring table. More specific substrings come first.
pub fn default_camera_mappings() -> Vec<CameraMapping> {
    vec![
        CameraMapping::new("canon", "eos r", CANON_EOS_R),
        CameraMapping::new("canon", "eos", CANON_STANDARD),
        CameraMapping::new("nikon", "z", NIKON_Z),
        CameraMapping::new("nikon corporation", "z", NIKON_Z),
        CameraMapping::new("sony", "ilce-7", SONY_ALPHA),
        CameraMapping::new("sony", "a7", SONY_ALPHA),
        CameraMapping::new("fujifilm", "x-t", FUJIFILM_X),
        CameraMapping::new("fujifilm", "x-h", FUJIFILM_X),
    ]
}

/// Build the catalogue with the given configuration's output directives
pub fn catalogue(config: &PresetConfig) -> Vec<BuiltinPreset> {
    let converter = PresetConverter::new(config);
    let build = |id: &'static str,
                 name: &str,
                 description: &str,
                 models: &[&str],
                 photo_type: Option<&'static str>,
                 settings: NormalizedSettings| {
        let options = ConvertOptions {
            name: Some(name.to_string()),
            description: Some(description.to_string()),
            camera_models: models.iter().map(|m| m.to_string()).collect(),
            original_filename: None,
        };
        BuiltinPreset {
            id,
            preset: converter.convert_at(&settings, options, catalogue_epoch()),
            photo_type,
        }
    };

    vec![
        build(
            CANON_STANDARD,
            "Canon Standard",
            "Neutral rendering for Canon EOS bodies",
            &["Canon EOS"],
            None,
            settings(camera_white_balance(), |t| {
                t.contrast = 10.0;
                t.clarity = 5.0;
            }),
        ),
        build(
            CANON_EOS_R,
            "Canon EOS R Series",
            "Tuned for Canon full-frame mirrorless sensors",
            &["Canon EOS R5", "Canon EOS R6", "Canon EOS R3"],
            None,
            settings(camera_white_balance(), |t| {
                t.contrast = 12.0;
                t.highlights = -20.0;
                t.shadows = 15.0;
                t.vibrance = 8.0;
            }),
        ),
        build(
            NIKON_Z,
            "Nikon Z Neutral",
            "Flat starting point for Nikon Z bodies",
            &["Nikon Z 6", "Nikon Z 7", "Nikon Z 8", "Nikon Z 9"],
            None,
            settings(camera_white_balance(), |t| {
                t.highlights = -15.0;
                t.shadows = 10.0;
            }),
        ),
        build(
            SONY_ALPHA,
            "Sony Alpha Natural",
            "Warms and softens Sony Alpha colour",
            &["Sony ILCE-7M4", "Sony ILCE-7RM5", "Sony A7 IV"],
            None,
            settings(custom_white_balance(5600, 4), |t| {
                t.contrast = 8.0;
                t.saturation = -4.0;
            }),
        ),
        build(
            FUJIFILM_X,
            "Fujifilm X Classic",
            "Subdued film-like tones for Fujifilm X-Trans bodies",
            &["Fujifilm X-T5", "Fujifilm X-H2"],
            None,
            settings(camera_white_balance(), |t| {
                t.contrast = 15.0;
                t.highlights = -25.0;
                t.blacks = -10.0;
                t.saturation = -10.0;
            }),
        ),
        build(
            PORTRAIT,
            "Portrait Soft Skin",
            "Lower texture and clarity for faces",
            &[],
            Some("portrait"),
            settings(custom_white_balance(5200, 5), |t| {
                t.texture = -15.0;
                t.clarity = -10.0;
                t.vibrance = 5.0;
            }),
        ),
        build(
            LANDSCAPE,
            "Landscape Vivid",
            "Punchy skies and foliage",
            &[],
            Some("landscape"),
            settings(camera_white_balance(), |t| {
                t.clarity = 20.0;
                t.dehaze = 10.0;
                t.vibrance = 20.0;
                t.highlights = -30.0;
            }),
        ),
    ]
}

fn camera_white_balance() -> (WhiteBalanceMode, Option<i64>, Option<i64>) {
    (WhiteBalanceMode::Camera, None, None)
}

fn custom_white_balance(kelvin: i64, tint: i64) -> (WhiteBalanceMode, Option<i64>, Option<i64>) {
    (WhiteBalanceMode::Custom, Some(kelvin), Some(tint))
}

/// Editor-unit settings with the given white balance and tone tweaks
fn settings(
    (mode, temperature_kelvin, tint): (WhiteBalanceMode, Option<i64>, Option<i64>),
    tone: impl FnOnce(&mut ToneAdjustments),
) -> NormalizedSettings {
    let mut settings = NormalizedSettings::default();
    settings.white_balance.mode = mode;
    settings.white_balance.temperature_kelvin = temperature_kelvin;
    settings.white_balance.tint = tint;
    settings.lens.lens_profile_enabled = true;
    settings.lens.auto_lateral_ca = true;
    settings.source_meta.has_explicit_settings = true;
    tone(&mut settings.tone);
    settings
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_catalogue_epoch_is_fixed() {
        assert_eq!(catalogue_epoch().to_rfc3339(), "2024-01-01T00:00:00+00:00");
        assert_eq!(catalogue_epoch(), catalogue_epoch());
    }

    #[test]
    fn test_catalogue_ids_and_names_unique() {
        let catalogue = catalogue(&PresetConfig::default());
        let ids: HashSet<_> = catalogue.iter().map(|b| b.id).collect();
        let names: HashSet<_> = catalogue.iter().map(|b| b.preset.name.clone()).collect();
        assert_eq!(ids.len(), catalogue.len());
        assert_eq!(names.len(), catalogue.len());
        assert!(catalogue.iter().all(|b| b.id.starts_with("builtin-")));
    }

    #[test]
    fn test_mappings_point_at_catalogue() {
        let catalogue = catalogue(&PresetConfig::default());
        for mapping in default_camera_mappings() {
            assert!(
                catalogue.iter().any(|b| b.id == mapping.preset_id),
                "dangling mapping {:?}",
                mapping
            );
        }
    }

    #[test]
    fn test_builtins_are_scaled() {
        let catalogue = catalogue(&PresetConfig::default());
        let landscape = catalogue.iter().find(|b| b.id == LANDSCAPE).unwrap();
        assert!((landscape.preset.tone_adjustments.clarity - 0.2).abs() < 1e-9);
        assert_eq!(landscape.photo_type, Some("landscape"));
        assert!(landscape.preset.upload_info.is_none());
    }
}
