//! Ingestion pipeline
//!
//! sidecar bytes → [`extract_attributes`] → [`normalize`] → [`PresetConverter`]
//! → diagnostics → [`PresetRepository::insert`]
//!
//! Canonical JSON documents skip straight to diagnostics.

use std::sync::Arc;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::config::{DiagnosticLimits, PresetConfig};
use crate::convert::{ConvertOptions, PresetConverter};
use crate::error::PresetError;
use crate::normalize::normalize;
use crate::preset::Preset;
use crate::repository::{InsertOptions, PresetRecord, PresetRepository};
use crate::sidecar::extract_attributes;
use crate::validation::{blocks_storage, run_diagnostics, validate_structure, Diagnostic};

pub type Result<T> = std::result::Result<T, PresetError>;

/// A converted preset with its diagnostics, not yet stored
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckedPreset {
    pub preset: Preset,
    pub diagnostics: Vec<Diagnostic>,
}

/// A stored preset with the diagnostics that accompanied it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestOutcome {
    pub record: PresetRecord,
    pub diagnostics: Vec<Diagnostic>,
}

/// One sidecar in a batch upload
#[derive(Debug, Clone, Default)]
pub struct SidecarUpload {
    pub content: Vec<u8>,
    pub convert: ConvertOptions,
    pub insert: InsertOptions,
}

/// Sidecar bytes to preset, without diagnostics or storage
pub fn convert_sidecar(
    converter: &PresetConverter,
    content: &[u8],
    options: ConvertOptions,
) -> Result<Preset> {
    let attrs = extract_attributes(content)?;
    let settings = normalize(&attrs);
    Ok(converter.convert(&settings, options))
}

pub struct Ingestor {
    repo: Arc<PresetRepository>,
    converter: PresetConverter,
    limits: DiagnosticLimits,
}

impl Ingestor {
    pub fn new(repo: Arc<PresetRepository>, config: &PresetConfig) -> Self {
        Self {
            repo,
            converter: PresetConverter::new(config),
            limits: config.diagnostics.clone(),
        }
    }

    pub fn converter(&self) -> &PresetConverter {
        &self.converter
    }

    /// Convert and diagnose a sidecar without storing it
    pub fn check_sidecar(&self, content: &[u8], options: ConvertOptions) -> Result<CheckedPreset> {
        let preset = convert_sidecar(&self.converter, content, options)?;
        let diagnostics = run_diagnostics(&preset.to_value(), &self.limits);
        Ok(CheckedPreset {
            preset,
            diagnostics,
        })
    }

    /// Validate and diagnose a canonical JSON document without storing it
    pub fn check_json(&self, document: &Value) -> Result<CheckedPreset> {
        let diagnostics = run_diagnostics(document, &self.limits);
        if blocks_storage(&diagnostics) {
            validate_structure(document).into_result()?;
        }
        let mut preset: Preset = serde_json::from_value(document.clone())?;
        // Same trimming and case-insensitive dedup as the converter applies
        let models = std::mem::take(&mut preset.camera_models);
        preset.add_camera_models(models);
        Ok(CheckedPreset {
            preset,
            diagnostics,
        })
    }

    pub fn ingest_sidecar(
        &self,
        content: &[u8],
        convert: ConvertOptions,
        insert: InsertOptions,
    ) -> Result<IngestOutcome> {
        let checked = self.check_sidecar(content, convert)?;
        self.store(checked, insert)
    }

    pub fn ingest_json(&self, document: &Value, insert: InsertOptions) -> Result<IngestOutcome> {
        let checked = self.check_json(document)?;
        self.store(checked, insert)
    }

    /// Convert many sidecars in parallel, then insert them in input order.
    ///
    /// Each entry succeeds or fails on its own.
    pub fn ingest_batch(&self, uploads: Vec<SidecarUpload>) -> Vec<Result<IngestOutcome>> {
        let checked: Vec<(Result<CheckedPreset>, InsertOptions)> = uploads
            .into_par_iter()
            .map(|upload| (self.check_sidecar(&upload.content, upload.convert), upload.insert))
            .collect();

        let results: Vec<Result<IngestOutcome>> = checked
            .into_iter()
            .map(|(checked, insert)| checked.and_then(|c| self.store(c, insert)))
            .collect();

        let stored = results.iter().filter(|r| r.is_ok()).count();
        info!("batch ingest: {}/{} stored", stored, results.len());
        results
    }

    fn store(&self, checked: CheckedPreset, insert: InsertOptions) -> Result<IngestOutcome> {
        debug!(
            "storing '{}' with {} diagnostic(s)",
            checked.preset.name,
            checked.diagnostics.len()
        );
        let record = self.repo.insert(checked.preset, insert)?;
        Ok(IngestOutcome {
            record,
            diagnostics: checked.diagnostics,
        })
    }
}
