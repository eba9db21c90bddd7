//! Preset Conversion
//!
//! Builds a canonical [`Preset`] from [`NormalizedSettings`].
//!
//! ## Scaling
//!
//! The editor stores tone controls in hundredths; the preset schema stores
//! fractions. Every tone field is divided by [`TONE_SCALE`]. Nothing else is
//! rescaled.

use chrono::{DateTime, Utc};

use crate::config::{OutputDirectives, PresetConfig};
use crate::normalize::NormalizedSettings;
use crate::preset::{
    Preset, RawParams, UploadInfo, WhiteBalance, SCHEMA_VERSION,
};

/// Editor tone units per preset unit
pub const TONE_SCALE: f64 = 100.0;

/// Caller-supplied values for one conversion
#[derive(Debug, Clone, Default)]
pub struct ConvertOptions {
    pub name: Option<String>,
    pub description: Option<String>,
    pub camera_models: Vec<String>,
    /// Set for uploads; produces `upload_info`
    pub original_filename: Option<String>,
}

/// Converts normalized settings into presets
#[derive(Debug, Clone)]
pub struct PresetConverter {
    source_editor: String,
    author: String,
    default_temperature_kelvin: i64,
    output: OutputDirectives,
}

impl PresetConverter {
    pub fn new(config: &PresetConfig) -> Self {
        Self {
            source_editor: config.source_editor.clone(),
            author: config.author.clone(),
            default_temperature_kelvin: config.default_temperature_kelvin,
            output: config.output.clone(),
        }
    }

    pub fn convert(&self, settings: &NormalizedSettings, options: ConvertOptions) -> Preset {
        self.convert_at(settings, options, Utc::now())
    }

    /// Convert with an explicit clock, used for synthesized names and upload info
    pub fn convert_at(
        &self,
        settings: &NormalizedSettings,
        options: ConvertOptions,
        now: DateTime<Utc>,
    ) -> Preset {
        let name = options
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| self.synthesize_name(settings, now));

        let description = options
            .description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("Converted from {} XMP sidecar", self.source_editor));

        let upload_info = options.original_filename.map(|filename| UploadInfo {
            uploaded_at: now,
            original_filename: Some(filename),
        });

        let mut preset = Preset {
            name,
            description,
            schema_version: SCHEMA_VERSION.to_string(),
            author: self.author.clone(),
            camera_models: Vec::new(),
            raw_params: self.raw_params(settings),
            tone_adjustments: settings.tone.scaled(TONE_SCALE),
            color_adjustments: settings.color_adjustments,
            detail: settings.detail,
            lens_corrections: settings.lens,
            effects: settings.effects,
            source_metadata: settings.source_meta.clone(),
            upload_info,
        };
        preset.add_camera_models(&options.camera_models);
        preset
    }

    fn raw_params(&self, settings: &NormalizedSettings) -> RawParams {
        let wb = &settings.white_balance;
        RawParams {
            white_balance: WhiteBalance {
                mode: wb.mode,
                temperature_kelvin: Some(
                    wb.temperature_kelvin
                        .unwrap_or(self.default_temperature_kelvin),
                ),
                tint: wb.tint,
            },
            output_bps: self.output.output_bps,
            output_color: self.output.color_space as u8,
            gamma: self.output.gamma,
            no_auto_bright: !self.output.auto_brightness,
            noise_threshold: self.output.noise_threshold,
        }
    }

    fn synthesize_name(&self, settings: &NormalizedSettings, now: DateTime<Utc>) -> String {
        let suffix = settings
            .source_meta
            .preset_type_label
            .clone()
            .unwrap_or_else(|| now.format("%Y-%m-%d %H:%M:%S").to_string());
        format!("Preset {} - {}", self.source_editor, suffix)
    }
}
