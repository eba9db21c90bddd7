//! Canonical Preset Document
//!
//! The versioned JSON schema handed to the processing worker and persisted by
//! the surrounding system. Field names serialize as snake_case and match the
//! keys checked by [`crate::validation`].
//!
//! ## Sections
//!
//! - **raw_params**: white balance plus fixed LibRaw-style output directives
//! - **tone_adjustments**: fractions (editor hundredths divided by 100)
//! - **color_adjustments**: per-hue HSL tables, editor units
//! - **detail / lens_corrections / effects**: editor units, copied through
//! - **source_metadata**: provenance from the sidecar

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::OutputDirectives;

/// Current schema version written by the converter
pub const SCHEMA_VERSION: &str = "1.0";

/// Color temperature assumed when a sidecar carries none
pub const DEFAULT_TEMPERATURE_KELVIN: i64 = 5500;

/// Top-level keys every stored preset must carry
pub const REQUIRED_FIELDS: [&str; 3] = ["name", "raw_params", "tone_adjustments"];

// ============================================================================
// Preset Document
// ============================================================================

/// Canonical preset document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default = "default_schema_version")]
    pub schema_version: String,

    #[serde(default)]
    pub author: String,

    /// Camera models this preset targets; empty means universal
    #[serde(default)]
    pub camera_models: Vec<String>,

    pub raw_params: RawParams,

    pub tone_adjustments: ToneAdjustments,

    #[serde(default)]
    pub color_adjustments: ColorAdjustments,

    #[serde(default)]
    pub detail: DetailSettings,

    #[serde(default)]
    pub lens_corrections: LensCorrections,

    #[serde(default)]
    pub effects: EffectSettings,

    #[serde(default)]
    pub source_metadata: SourceMetadata,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_info: Option<UploadInfo>,
}

fn default_schema_version() -> String {
    SCHEMA_VERSION.to_string()
}

impl Preset {
    /// Serialize to a JSON value (infallible for this type)
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    /// Add camera models, dropping blanks and case-insensitive duplicates
    pub fn add_camera_models<I, S>(&mut self, models: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for model in models {
            let model = model.as_ref().trim();
            if model.is_empty() {
                continue;
            }
            let exists = self
                .camera_models
                .iter()
                .any(|m| m.eq_ignore_ascii_case(model));
            if !exists {
                self.camera_models.push(model.to_string());
            }
        }
    }

    /// True when no camera models are declared
    pub fn is_universal(&self) -> bool {
        self.camera_models.is_empty()
    }
}

// ============================================================================
// Raw Processing Parameters
// ============================================================================

/// White balance handling for the worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WhiteBalanceMode {
    /// Use the camera's as-shot multipliers
    Camera,
    /// Use the explicit temperature/tint
    Custom,
}

/// White balance block of `raw_params`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WhiteBalance {
    pub mode: WhiteBalanceMode,
    pub temperature_kelvin: Option<i64>,
    pub tint: Option<i64>,
}

impl Default for WhiteBalance {
    fn default() -> Self {
        Self {
            mode: WhiteBalanceMode::Camera,
            temperature_kelvin: Some(DEFAULT_TEMPERATURE_KELVIN),
            tint: None,
        }
    }
}

/// Parameters consumed by the external RAW worker
///
/// Partial documents are completed from [`OutputDirectives::default`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawParams {
    pub white_balance: WhiteBalance,

    /// Output bit depth (8 or 16)
    pub output_bps: u8,

    /// Output color space, LibRaw numbering (1 = sRGB, 2 = Adobe RGB, 4 = ProPhoto)
    pub output_color: u8,

    /// Gamma curve (power, slope)
    pub gamma: [f64; 2],

    /// Disable LibRaw auto-brightness
    pub no_auto_bright: bool,

    /// Wavelet denoise threshold
    pub noise_threshold: f64,
}

impl Default for RawParams {
    fn default() -> Self {
        let output = OutputDirectives::default();
        Self {
            white_balance: WhiteBalance::default(),
            output_bps: output.output_bps,
            output_color: output.color_space as u8,
            gamma: output.gamma,
            no_auto_bright: !output.auto_brightness,
            noise_threshold: output.noise_threshold,
        }
    }
}

// ============================================================================
// Adjustment Sections
// ============================================================================

/// Global tone controls.
///
/// Inside [`crate::normalize::NormalizedSettings`] these hold editor units
/// (hundredths). Inside a [`Preset`] they hold fractions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToneAdjustments {
    pub exposure: f64,
    pub contrast: f64,
    pub highlights: f64,
    pub shadows: f64,
    pub whites: f64,
    pub blacks: f64,
    pub texture: f64,
    pub clarity: f64,
    pub dehaze: f64,
    pub vibrance: f64,
    pub saturation: f64,
}

impl ToneAdjustments {
    /// Divide every field by `divisor`
    pub fn scaled(&self, divisor: f64) -> Self {
        Self {
            exposure: self.exposure / divisor,
            contrast: self.contrast / divisor,
            highlights: self.highlights / divisor,
            shadows: self.shadows / divisor,
            whites: self.whites / divisor,
            blacks: self.blacks / divisor,
            texture: self.texture / divisor,
            clarity: self.clarity / divisor,
            dehaze: self.dehaze / divisor,
            vibrance: self.vibrance / divisor,
            saturation: self.saturation / divisor,
        }
    }
}

/// The eight hue bands of the HSL panel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HueBand {
    Red,
    Orange,
    Yellow,
    Green,
    Aqua,
    Blue,
    Purple,
    Magenta,
}

impl HueBand {
    pub const ALL: [HueBand; 8] = [
        HueBand::Red,
        HueBand::Orange,
        HueBand::Yellow,
        HueBand::Green,
        HueBand::Aqua,
        HueBand::Blue,
        HueBand::Purple,
        HueBand::Magenta,
    ];

    /// Capitalized suffix used in sidecar attribute names
    pub fn attribute_suffix(self) -> &'static str {
        match self {
            HueBand::Red => "Red",
            HueBand::Orange => "Orange",
            HueBand::Yellow => "Yellow",
            HueBand::Green => "Green",
            HueBand::Aqua => "Aqua",
            HueBand::Blue => "Blue",
            HueBand::Purple => "Purple",
            HueBand::Magenta => "Magenta",
        }
    }
}

/// One 8-entry HSL table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HueTable {
    pub red: i32,
    pub orange: i32,
    pub yellow: i32,
    pub green: i32,
    pub aqua: i32,
    pub blue: i32,
    pub purple: i32,
    pub magenta: i32,
}

impl HueTable {
    pub fn set(&mut self, band: HueBand, value: i32) {
        let slot = match band {
            HueBand::Red => &mut self.red,
            HueBand::Orange => &mut self.orange,
            HueBand::Yellow => &mut self.yellow,
            HueBand::Green => &mut self.green,
            HueBand::Aqua => &mut self.aqua,
            HueBand::Blue => &mut self.blue,
            HueBand::Purple => &mut self.purple,
            HueBand::Magenta => &mut self.magenta,
        };
        *slot = value;
    }
}

/// HSL panel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorAdjustments {
    pub hue: HueTable,
    pub saturation: HueTable,
    pub luminance: HueTable,
}

/// Sharpening and noise reduction
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetailSettings {
    pub sharpness: i32,
    pub sharpen_radius: f64,
    pub sharpen_detail: i32,
    pub noise_reduction: i32,
    pub luminance_smoothing: i32,
}

impl Default for DetailSettings {
    fn default() -> Self {
        Self {
            sharpness: 40,
            sharpen_radius: 1.0,
            sharpen_detail: 25,
            noise_reduction: 25,
            luminance_smoothing: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LensCorrections {
    pub lens_profile_enabled: bool,
    pub auto_lateral_ca: bool,
    pub vignette_amount: i32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectSettings {
    pub grain_amount: i32,
    pub post_crop_vignette_amount: i32,
}

/// Provenance carried over from the sidecar
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceMetadata {
    pub format_version: Option<String>,
    pub process_version: Option<String>,
    pub preset_type_label: Option<String>,
    pub has_explicit_settings: bool,
}

/// Present on presets that came through the upload path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadInfo {
    pub uploaded_at: DateTime<Utc>,
    pub original_filename: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tone_scaling() {
        let tone = ToneAdjustments {
            exposure: 50.0,
            blacks: -25.0,
            ..Default::default()
        };
        let scaled = tone.scaled(100.0);
        assert!((scaled.exposure - 0.5).abs() < 1e-9);
        assert!((scaled.blacks + 0.25).abs() < 1e-9);
        assert_eq!(scaled.clarity, 0.0);
    }

    #[test]
    fn test_hue_table_set() {
        let mut table = HueTable::default();
        for (i, band) in HueBand::ALL.iter().enumerate() {
            table.set(*band, i as i32 * 10);
        }
        assert_eq!(table.red, 0);
        assert_eq!(table.orange, 10);
        assert_eq!(table.aqua, 40);
        assert_eq!(table.magenta, 70);
    }

    #[test]
    fn test_camera_models_deduplicated() {
        let mut preset: Preset = serde_json::from_value(serde_json::json!({
            "name": "Test",
            "raw_params": {
                "white_balance": {"mode": "camera", "temperature_kelvin": 5500, "tint": null},
                "output_bps": 16, "output_color": 2, "gamma": [2.2, 4.5],
                "no_auto_bright": true, "noise_threshold": 100.0
            },
            "tone_adjustments": {}
        }))
        .unwrap();

        preset.add_camera_models(["Canon EOS R5", " canon eos r5 ", "", "Nikon Z6"]);
        assert_eq!(preset.camera_models, vec!["Canon EOS R5", "Nikon Z6"]);
        assert_eq!(preset.schema_version, SCHEMA_VERSION);
        assert_eq!(preset.detail.sharpness, 40);
    }
}
