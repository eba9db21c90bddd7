//! Preset Configuration
//!
//! Everything the converter, repository and selector need is carried in an
//! explicit [`PresetConfig`] handed over at construction time. The struct can
//! be loaded from TOML; every section has defaults so a partial file works.
//!
//! ```toml
//! source_editor = "Lightroom"
//! default_temperature_kelvin = 5500
//!
//! [output]
//! output_bps = 16
//! color_space = "adobe_rgb"
//!
//! [[camera_mappings]]
//! make = "canon"
//! model_contains = "eos r5"
//! preset_id = "builtin-canon-eos-r"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::builtins;
use crate::error::PresetError;
use crate::preset;

pub type Result<T> = std::result::Result<T, PresetError>;

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PresetConfig {
    /// Editor name used in synthesized preset names and descriptions
    pub source_editor: String,

    /// Author written into converted presets
    pub author: String,

    /// White balance temperature used when the sidecar has none
    pub default_temperature_kelvin: i64,

    /// Fixed directives attached to every preset's raw_params
    pub output: OutputDirectives,

    /// Plausibility ranges for diagnostics
    pub diagnostics: DiagnosticLimits,

    /// Ordered make/model-substring → preset table consulted first by the selector
    pub camera_mappings: Vec<CameraMapping>,

    /// Seed the built-in catalogue when the repository is opened
    pub seed_builtins: bool,

    /// Directory for persisted preset records (None = in-memory only)
    pub store_dir: Option<PathBuf>,
}

impl Default for PresetConfig {
    fn default() -> Self {
        Self {
            source_editor: "Lightroom".to_string(),
            author: "soma_presets".to_string(),
            default_temperature_kelvin: preset::DEFAULT_TEMPERATURE_KELVIN,
            output: OutputDirectives::default(),
            diagnostics: DiagnosticLimits::default(),
            camera_mappings: builtins::default_camera_mappings(),
            seed_builtins: true,
            store_dir: None,
        }
    }
}

impl PresetConfig {
    /// Load from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| PresetError::Config(format!("Read {} failed: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    /// Parse TOML text and validate the result
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: PresetConfig = toml::from_str(content)
            .map_err(|e| PresetError::Config(format!("Parse TOML failed: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make conversion or selection meaningless
    pub fn validate(&self) -> Result<()> {
        if self.default_temperature_kelvin <= 0 {
            return Err(PresetError::Config(
                "default_temperature_kelvin must be positive".to_string(),
            ));
        }
        if !matches!(self.output.output_bps, 8 | 16) {
            return Err(PresetError::Config(format!(
                "output_bps must be 8 or 16, got {}",
                self.output.output_bps
            )));
        }
        let limits = &self.diagnostics;
        if limits.temperature_min > limits.temperature_max || limits.tint_min > limits.tint_max {
            return Err(PresetError::Config(
                "diagnostic ranges must have min <= max".to_string(),
            ));
        }
        for (i, mapping) in self.camera_mappings.iter().enumerate() {
            if mapping.make.trim().is_empty() || mapping.preset_id.trim().is_empty() {
                return Err(PresetError::Config(format!(
                    "camera_mappings[{}] needs a make and a preset_id",
                    i
                )));
            }
        }
        Ok(())
    }
}

/// Output color space, numbered as LibRaw's `output_color`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputColorSpace {
    /// Raw color space
    Raw = 0,
    /// sRGB (D65)
    Srgb = 1,
    /// Adobe RGB (1998) (D65)
    AdobeRgb = 2,
    /// Wide-gamut RGB (D50)
    WideGamutRgb = 3,
    /// Kodak ProPhoto RGB (D50)
    ProPhotoRgb = 4,
    /// XYZ
    Xyz = 5,
}

/// Processing-worker defaults; not derived from the sidecar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputDirectives {
    pub output_bps: u8,
    pub color_space: OutputColorSpace,
    /// Gamma curve (power, slope)
    pub gamma: [f64; 2],
    pub auto_brightness: bool,
    pub noise_threshold: f64,
}

impl Default for OutputDirectives {
    fn default() -> Self {
        Self {
            output_bps: 16,
            color_space: OutputColorSpace::AdobeRgb,
            gamma: [2.2, 4.5],
            auto_brightness: false,
            noise_threshold: 100.0,
        }
    }
}

/// Ranges used by [`crate::validation::run_diagnostics`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticLimits {
    pub temperature_min: i64,
    pub temperature_max: i64,
    pub tint_min: i64,
    pub tint_max: i64,
    /// Largest plausible |tone value| after scaling
    pub tone_abs_max: f64,
}

impl Default for DiagnosticLimits {
    fn default() -> Self {
        Self {
            temperature_min: 2000,
            temperature_max: 50000,
            tint_min: -150,
            tint_max: 150,
            tone_abs_max: 2.0,
        }
    }
}

/// One row of the built-in camera mapping table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraMapping {
    /// Camera make, compared case-insensitively for equality
    pub make: String,
    /// Substring looked for in the lower-cased model
    pub model_contains: String,
    pub preset_id: String,
}

impl CameraMapping {
    pub fn new(make: &str, model_contains: &str, preset_id: &str) -> Self {
        Self {
            make: make.to_string(),
            model_contains: model_contains.to_string(),
            preset_id: preset_id.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = PresetConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.output.color_space as u8, 2);
        assert!(!config.camera_mappings.is_empty());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = PresetConfig::from_toml_str(
            r#"
            source_editor = "Camera Raw"

            [diagnostics]
            tone_abs_max = 1.5

            [[camera_mappings]]
            make = "leica"
            model_contains = "q3"
            preset_id = "up-0011223344556677"
            "#,
        )
        .unwrap();

        assert_eq!(config.source_editor, "Camera Raw");
        assert_eq!(config.default_temperature_kelvin, 5500);
        assert_eq!(config.diagnostics.tone_abs_max, 1.5);
        assert_eq!(config.diagnostics.tint_max, 150);
        assert_eq!(config.camera_mappings.len(), 1);
        assert_eq!(config.camera_mappings[0].make, "leica");
        assert_eq!(config.output.output_bps, 16);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let err = PresetConfig::from_toml_str("[output]\noutput_bps = 12\n").unwrap_err();
        assert!(matches!(err, PresetError::Config(_)));

        let err = PresetConfig::from_toml_str("source_editor = ").unwrap_err();
        assert!(matches!(err, PresetError::Config(_)));
    }
}
