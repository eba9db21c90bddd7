//! Preset validation and diagnostics
//!
//! Works on raw JSON values so incomplete documents can still be inspected.
//! Diagnostics report; they never fail. Only a missing required field blocks
//! storage.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::config::DiagnosticLimits;
use crate::error::PresetError;
use crate::preset::REQUIRED_FIELDS;

pub type Result<T> = std::result::Result<T, PresetError>;

/// Result of [`validate_structure`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructureReport {
    pub valid: bool,
    pub missing_fields: Vec<String>,
}

impl StructureReport {
    /// Convert an invalid report into [`PresetError::StructuralInvalid`]
    pub fn into_result(self) -> Result<()> {
        if self.valid {
            Ok(())
        } else {
            Err(PresetError::StructuralInvalid {
                missing_fields: self.missing_fields,
            })
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticStatus {
    Pass,
    Warning,
    Fail,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub check: String,
    pub status: DiagnosticStatus,
    pub detail: String,
}

impl Diagnostic {
    fn new(check: &str, status: DiagnosticStatus, detail: impl Into<String>) -> Self {
        Self {
            check: check.to_string(),
            status,
            detail: detail.into(),
        }
    }
}

/// Check that `name`, `raw_params` and `tone_adjustments` are present
pub fn validate_structure(preset: &Value) -> StructureReport {
    let missing_fields: Vec<String> = REQUIRED_FIELDS
        .iter()
        .filter(|field| is_missing(preset, field))
        .map(|field| field.to_string())
        .collect();

    StructureReport {
        valid: missing_fields.is_empty(),
        missing_fields,
    }
}

fn is_missing(preset: &Value, field: &str) -> bool {
    match preset.get(field) {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(_) => false,
    }
}

/// Run every plausibility check against a preset document
pub fn run_diagnostics(preset: &Value, limits: &DiagnosticLimits) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::with_capacity(5);

    let structure = validate_structure(preset);
    diagnostics.push(if structure.valid {
        Diagnostic::new("required_fields", DiagnosticStatus::Pass, "all required fields present")
    } else {
        Diagnostic::new(
            "required_fields",
            DiagnosticStatus::Fail,
            format!("missing: {}", structure.missing_fields.join(", ")),
        )
    });

    let wb = &preset["raw_params"]["white_balance"];
    diagnostics.push(range_check(
        "white_balance_temperature",
        &wb["temperature_kelvin"],
        limits.temperature_min,
        limits.temperature_max,
        "K",
    ));
    diagnostics.push(range_check(
        "white_balance_tint",
        &wb["tint"],
        limits.tint_min,
        limits.tint_max,
        "",
    ));

    diagnostics.push(tone_check(&preset["tone_adjustments"], limits.tone_abs_max));
    diagnostics.push(coverage_check(&preset["camera_models"]));

    for d in diagnostics.iter().filter(|d| d.status != DiagnosticStatus::Pass) {
        warn!("diagnostic {} {:?}: {}", d.check, d.status, d.detail);
    }

    diagnostics
}

/// True when a diagnostic set must block storage
pub fn blocks_storage(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(|d| d.status == DiagnosticStatus::Fail)
}

fn range_check(check: &str, value: &Value, min: i64, max: i64, unit: &str) -> Diagnostic {
    match value.as_f64() {
        None => Diagnostic::new(check, DiagnosticStatus::Pass, "not set"),
        Some(v) if v < min as f64 || v > max as f64 => Diagnostic::new(
            check,
            DiagnosticStatus::Warning,
            format!("{}{} outside [{}, {}]{}", v, unit, min, max, unit),
        ),
        Some(v) => Diagnostic::new(check, DiagnosticStatus::Pass, format!("{}{}", v, unit)),
    }
}

fn tone_check(tone: &Value, abs_max: f64) -> Diagnostic {
    let Some(fields) = tone.as_object() else {
        return Diagnostic::new("tone_range", DiagnosticStatus::Pass, "no tone adjustments");
    };

    let mut out_of_range: Vec<String> = fields
        .iter()
        .filter_map(|(key, value)| {
            let v = value.as_f64()?;
            (v.abs() > abs_max).then(|| format!("{}={}", key, v))
        })
        .collect();
    out_of_range.sort();

    if out_of_range.is_empty() {
        Diagnostic::new(
            "tone_range",
            DiagnosticStatus::Pass,
            format!("all tone values within ±{}", abs_max),
        )
    } else {
        Diagnostic::new(
            "tone_range",
            DiagnosticStatus::Warning,
            format!(
                "exceeds ±{} (unscaled input?): {}",
                abs_max,
                out_of_range.join(", ")
            ),
        )
    }
}

fn coverage_check(models: &Value) -> Diagnostic {
    let count = models.as_array().map(Vec::len).unwrap_or(0);
    if count == 0 {
        Diagnostic::new("camera_coverage", DiagnosticStatus::Pass, "universal preset")
    } else {
        Diagnostic::new(
            "camera_coverage",
            DiagnosticStatus::Pass,
            format!("{} camera model(s)", count),
        )
    }
}

/// Validate input against a JSON schema
pub fn validate_input(input: &Value, schema: &Value) -> Result<()> {
    // Get required fields from schema
    if let Some(required) = schema.get("required").and_then(|r| r.as_array()) {
        for field_name in required {
            let field_str = field_name.as_str().ok_or_else(|| {
                PresetError::Config("Invalid schema: required field not a string".to_string())
            })?;

            if input.get(field_str).is_none() {
                return Err(PresetError::StructuralInvalid {
                    missing_fields: vec![field_str.to_string()],
                });
            }
        }
    }

    // Validate property types
    if let Some(properties) = schema.get("properties").and_then(|p| p.as_object()) {
        if let Some(input_obj) = input.as_object() {
            for (key, value) in input_obj {
                if let Some(prop_schema) = properties.get(key) {
                    validate_type(key, value, prop_schema)?;
                }
            }
        }
    }

    Ok(())
}

/// Validate that a value matches the expected type
fn validate_type(key: &str, value: &Value, schema: &Value) -> Result<()> {
    if let Some(expected_type) = schema.get("type").and_then(|t| t.as_str()) {
        let valid = match expected_type {
            "string" => value.is_string(),
            "integer" => value.is_i64() || value.is_u64(),
            "number" => value.is_number(),
            "boolean" => value.is_boolean(),
            "array" => value.is_array(),
            "object" => value.is_object(),
            "null" => value.is_null(),
            _ => true, // Unknown types pass validation
        };

        if !valid {
            return Err(PresetError::MalformedInput(format!(
                "Type mismatch for {}: expected {}, got {}",
                key, expected_type, value
            )));
        }
    }

    Ok(())
}
