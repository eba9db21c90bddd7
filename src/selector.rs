//! Preset Selection
//!
//! Picks the preset for a camera. Stages run in order and the first hit wins:
//!
//! 1. Built-in mapping table (make equality, model substring), declared order
//! 2. Uploaded presets whose `camera_models` mention both make and model
//! 3. The default record
//! 4. Nothing
//!
//! Every selection reads one consistent repository snapshot, so the same query
//! against an unchanged repository always returns the same record.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::camera::read_camera_identity;
use crate::config::{CameraMapping, PresetConfig};
use crate::error::PresetError;
use crate::repository::{PresetRecord, PresetRepository, SourceKind};

pub type Result<T> = std::result::Result<T, PresetError>;

/// Free-text camera identity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionQuery {
    pub camera_make: String,
    pub camera_model: String,
}

impl SelectionQuery {
    pub fn new(camera_make: impl Into<String>, camera_model: impl Into<String>) -> Self {
        Self {
            camera_make: camera_make.into(),
            camera_model: camera_model.into(),
        }
    }

    /// Build a query from the EXIF Make/Model of an image
    pub fn from_image(path: &Path) -> Result<Self> {
        let identity = read_camera_identity(path)?;
        Ok(Self::new(identity.make, identity.model))
    }

    /// Lower-cased, trimmed (make, model)
    pub fn normalized(&self) -> (String, String) {
        (normalize_text(&self.camera_make), normalize_text(&self.camera_model))
    }
}

fn normalize_text(s: &str) -> String {
    s.trim().to_lowercase()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionStage {
    BuiltinMapping,
    UploadedMatch,
    PhotoType,
    Default,
    NotFound,
}

impl SelectionStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectionStage::BuiltinMapping => "builtin_mapping",
            SelectionStage::UploadedMatch => "uploaded_match",
            SelectionStage::PhotoType => "photo_type",
            SelectionStage::Default => "default",
            SelectionStage::NotFound => "not_found",
        }
    }
}

/// Outcome of a selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    pub stage: SelectionStage,
    pub record: Option<PresetRecord>,
}

impl Selection {
    fn found(stage: SelectionStage, record: &PresetRecord) -> Self {
        Self {
            stage,
            record: Some(record.clone()),
        }
    }

    fn not_found() -> Self {
        Self {
            stage: SelectionStage::NotFound,
            record: None,
        }
    }

    pub fn is_found(&self) -> bool {
        self.record.is_some()
    }
}

/// Camera text matching used by the mapping and uploaded stages.
///
/// All arguments arrive already lower-cased and trimmed.
pub trait CameraMatcher: Send + Sync {
    /// Does a mapping row's model pattern apply to this model?
    fn mapping_matches(&self, model_pattern: &str, model: &str) -> bool;

    /// Does a preset's `camera_models` entry cover this make/model?
    fn entry_matches(&self, entry: &str, make: &str, model: &str) -> bool;
}

/// Substring containment on free text
#[derive(Debug, Clone, Copy, Default)]
pub struct SubstringMatcher;

impl CameraMatcher for SubstringMatcher {
    fn mapping_matches(&self, model_pattern: &str, model: &str) -> bool {
        model.contains(model_pattern)
    }

    fn entry_matches(&self, entry: &str, make: &str, model: &str) -> bool {
        let entry = normalize_text(entry);
        entry.contains(make) && entry.contains(model)
    }
}

pub struct PresetSelector {
    repo: Arc<PresetRepository>,
    mappings: Vec<CameraMapping>,
    matcher: Box<dyn CameraMatcher>,
}

impl PresetSelector {
    pub fn new(repo: Arc<PresetRepository>, config: &PresetConfig) -> Self {
        Self::with_matcher(repo, config, Box::new(SubstringMatcher))
    }

    pub fn with_matcher(
        repo: Arc<PresetRepository>,
        config: &PresetConfig,
        matcher: Box<dyn CameraMatcher>,
    ) -> Self {
        let mappings = config
            .camera_mappings
            .iter()
            .map(|m| CameraMapping {
                make: normalize_text(&m.make),
                model_contains: normalize_text(&m.model_contains),
                preset_id: m.preset_id.trim().to_string(),
            })
            .collect();

        Self {
            repo,
            mappings,
            matcher,
        }
    }

    /// Select the preset for a camera make/model
    pub fn select(&self, query: &SelectionQuery) -> Selection {
        let (make, model) = query.normalized();

        let selection = self
            .repo
            .with_snapshot(|records| self.select_from(records, &make, &model));

        debug!(
            "select({:?}, {:?}) -> {} {:?}",
            make,
            model,
            selection.stage.as_str(),
            selection.record.as_ref().map(|r| r.id.as_str())
        );
        selection
    }

    /// Select the preset for the camera that shot `path`
    pub fn select_for_image(&self, path: &Path) -> Result<Selection> {
        let query = SelectionQuery::from_image(path)?;
        Ok(self.select(&query))
    }

    /// First record classified with `photo_type`, else the default
    pub fn select_for_photo_type(&self, photo_type: &str) -> Selection {
        let wanted = normalize_text(photo_type);

        self.repo.with_snapshot(|records| {
            let by_type = (!wanted.is_empty())
                .then(|| {
                    records.iter().find(|r| {
                        r.photo_type
                            .as_deref()
                            .is_some_and(|p| p.trim().eq_ignore_ascii_case(&wanted))
                    })
                })
                .flatten();

            match by_type {
                Some(record) => Selection::found(SelectionStage::PhotoType, record),
                None => default_stage(records),
            }
        })
    }

    fn select_from(&self, records: &[PresetRecord], make: &str, model: &str) -> Selection {
        if let Some(record) = self.builtin_mapping_stage(records, make, model) {
            return Selection::found(SelectionStage::BuiltinMapping, record);
        }
        if let Some(record) = self.uploaded_stage(records, make, model) {
            return Selection::found(SelectionStage::UploadedMatch, record);
        }
        default_stage(records)
    }

    fn builtin_mapping_stage<'a>(
        &self,
        records: &'a [PresetRecord],
        make: &str,
        model: &str,
    ) -> Option<&'a PresetRecord> {
        self.mappings
            .iter()
            .filter(|m| m.make == make && self.matcher.mapping_matches(&m.model_contains, model))
            .find_map(|m| {
                let record = records.iter().find(|r| r.id == m.preset_id);
                if record.is_none() {
                    debug!("mapping target {} no longer exists", m.preset_id);
                }
                record
            })
    }

    fn uploaded_stage<'a>(
        &self,
        records: &'a [PresetRecord],
        make: &str,
        model: &str,
    ) -> Option<&'a PresetRecord> {
        records.iter().find(|r| {
            r.source_kind == SourceKind::Uploaded
                && r.preset
                    .camera_models
                    .iter()
                    .any(|entry| self.matcher.entry_matches(entry, make, model))
        })
    }
}

fn default_stage(records: &[PresetRecord]) -> Selection {
    match records.iter().find(|r| r.is_default) {
        Some(record) => Selection::found(SelectionStage::Default, record),
        None => Selection::not_found(),
    }
}
