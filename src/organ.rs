//! UMA Organ Interface for soma_presets
//!
//! Exposes conversion, validation, selection and repository administration
//! through the Universal Module Architecture (UMA) stimulus/response interface.
//!
//! ## Available Operations
//!
//! 1. `preset.ingest_sidecar` - Convert an XMP sidecar and store it
//! 2. `preset.ingest_json` - Validate and store a canonical preset document
//! 3. `preset.convert` - Convert an XMP sidecar without storing it
//! 4. `preset.validate` - Structure check plus diagnostics
//! 5. `preset.select` - Pick the preset for a camera, image or photo type
//! 6. `preset.list` / `preset.get` - Browse the repository
//! 7. `preset.delete` / `preset.set_default` - Administer uploaded presets
//! 8. `presets.capabilities` - Capability card query
//! 9. `metrics` - Counter snapshot
//!
//! ## Example
//!
//! ```rust,no_run
//! use soma_presets::organ::{PresetOrgan, Organ, Stimulus};
//! use soma_presets::PresetConfig;
//! use serde_json::json;
//! use std::collections::HashMap;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let organ = PresetOrgan::open(PresetConfig::default())?;
//!
//! let response = organ.stimulate(Stimulus {
//!     op: "preset.select".to_string(),
//!     input: json!({"camera_make": "Canon", "camera_model": "EOS R5"}),
//!     context: HashMap::new(),
//! }).await?;
//! println!("{}", response.output["stage"]);
//! # Ok(())
//! # }
//! ```

use crate::config::PresetConfig;
use crate::convert::ConvertOptions;
use crate::error::PresetError;
use crate::metrics::Metrics;
use crate::pipeline::Ingestor;
use crate::repository::{InsertOptions, PresetRecord, PresetRepository, SourceKind};
use crate::selector::{PresetSelector, SelectionQuery};
use crate::store::{JsonDirStore, PresetStore};
use crate::validation::{run_diagnostics, validate_input, validate_structure};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::warn;

/// UMA Stimulus - input to organ operations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stimulus {
    pub op: String,
    pub input: Value,
    #[serde(default)]
    pub context: HashMap<String, String>,
}

/// UMA Response - output from organ operations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub ok: bool,
    pub output: Value,
    pub latency_ms: u64,
    pub cost: Option<f64>,
}

/// Organ trait - all SOMA organs implement this
#[async_trait]
pub trait Organ: Send + Sync {
    async fn stimulate(&self, stimulus: Stimulus) -> Result<Response, OrganError>;
    fn describe(&self) -> OrganCard;
}

/// Organ-level errors
#[derive(Debug, Error)]
pub enum OrganError {
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Preset(#[from] PresetError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl OrganError {
    /// Value of the `error` field in a failed response
    pub fn kind(&self) -> &'static str {
        match self {
            OrganError::UnsupportedOperation(_) => "UnsupportedOperation",
            OrganError::InvalidInput(_) => "InvalidInput",
            OrganError::Preset(e) => e.kind(),
            OrganError::SerializationError(_) => "Serialization",
        }
    }
}

/// Organ capability card
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganCard {
    pub name: String,
    pub version: String,
    pub description: String,
    pub division: String,
    pub subsystem: String,
    pub tags: Vec<String>,
    pub execution_modes: Vec<String>,
    pub functions: Vec<FunctionCard>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
}

/// Function capability card
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCard {
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
    pub examples: Vec<String>,
    pub idempotent: bool,
    pub side_effects: Vec<String>,
    pub input_schema: Option<Value>,
    pub output_schema: Value,
}

/// Preset Organ
pub struct PresetOrgan {
    config: PresetConfig,
    repo: Arc<PresetRepository>,
    ingestor: Ingestor,
    selector: PresetSelector,
    metrics: Arc<Metrics>,
    card: OrganCard,
}

impl PresetOrgan {
    pub fn new(config: PresetConfig, repo: Arc<PresetRepository>) -> Self {
        Self::with_metrics(config, repo, Metrics::new())
    }

    pub fn with_metrics(
        config: PresetConfig,
        repo: Arc<PresetRepository>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            ingestor: Ingestor::new(Arc::clone(&repo), &config),
            selector: PresetSelector::new(Arc::clone(&repo), &config),
            card: organ_card(),
            config,
            repo,
            metrics,
        }
    }

    /// Open the repository described by `config` (its store directory, if any)
    pub fn open(config: PresetConfig) -> Result<Self, PresetError> {
        let store = match &config.store_dir {
            Some(dir) => Some(Box::new(JsonDirStore::open(dir)?) as Box<dyn PresetStore>),
            None => None,
        };
        let repo = Arc::new(PresetRepository::open(config.clone(), store)?);
        Ok(Self::new(config, repo))
    }

    pub fn metrics(&self) -> Arc<Metrics> {
        Arc::clone(&self.metrics)
    }

    pub fn repository(&self) -> Arc<PresetRepository> {
        Arc::clone(&self.repo)
    }

    fn available_operations(&self) -> Vec<String> {
        self.card
            .functions
            .iter()
            .map(|f| f.name.clone())
            .chain(std::iter::once("metrics".to_string()))
            .collect()
    }

    fn check_input(&self, op: &str, input: &Value) -> Result<(), OrganError> {
        let schema = self
            .card
            .functions
            .iter()
            .find(|f| f.name == op)
            .and_then(|f| f.input_schema.as_ref());

        match schema {
            Some(schema) => validate_input(input, schema).map_err(|e| match e {
                PresetError::StructuralInvalid { missing_fields } => {
                    OrganError::InvalidInput(format!("Missing {}", missing_fields.join(", ")))
                }
                other => OrganError::InvalidInput(other.to_string()),
            }),
            None => Ok(()),
        }
    }

    fn dispatch(&self, op: &str, input: Value) -> Result<Value, OrganError> {
        self.check_input(op, &input)?;

        match op {
            "preset.ingest_sidecar" => self.handle_ingest_sidecar(&input),
            "preset.ingest_json" => self.handle_ingest_json(&input),
            "preset.convert" => self.handle_convert(&input),
            "preset.validate" => self.handle_validate(&input),
            "preset.select" => self.handle_select(&input),
            "preset.list" => self.handle_list(&input),
            "preset.get" => self.handle_get(&input),
            "preset.delete" => self.handle_delete(&input),
            "preset.set_default" => self.handle_set_default(&input),
            "presets.capabilities" => self.handle_capabilities(),
            "metrics" => Ok(json!(self.metrics.snapshot())),
            other => Err(OrganError::UnsupportedOperation(other.to_string())),
        }
    }

    /// Handle preset.ingest_sidecar operation
    fn handle_ingest_sidecar(&self, input: &Value) -> Result<Value, OrganError> {
        let content = required_str(input, "content")?;
        let outcome = self.ingestor.ingest_sidecar(
            content.as_bytes(),
            convert_options(input),
            insert_options(input),
        )?;

        Ok(json!({
            "id": outcome.record.id,
            "record": outcome.record,
            "diagnostics": outcome.diagnostics,
        }))
    }

    /// Handle preset.ingest_json operation
    fn handle_ingest_json(&self, input: &Value) -> Result<Value, OrganError> {
        let outcome = self
            .ingestor
            .ingest_json(&input["preset"], insert_options(input))?;

        Ok(json!({
            "id": outcome.record.id,
            "record": outcome.record,
            "diagnostics": outcome.diagnostics,
        }))
    }

    /// Handle preset.convert operation - conversion and diagnostics only
    fn handle_convert(&self, input: &Value) -> Result<Value, OrganError> {
        let content = required_str(input, "content")?;
        let checked = self
            .ingestor
            .check_sidecar(content.as_bytes(), convert_options(input))?;
        Ok(serde_json::to_value(&checked)?)
    }

    /// Handle preset.validate operation
    fn handle_validate(&self, input: &Value) -> Result<Value, OrganError> {
        let document = &input["preset"];
        let report = validate_structure(document);
        let diagnostics = run_diagnostics(document, &self.config.diagnostics);

        Ok(json!({
            "valid": report.valid,
            "missing_fields": report.missing_fields,
            "diagnostics": diagnostics,
            "accepted": report.valid,
        }))
    }

    /// Handle preset.select operation
    fn handle_select(&self, input: &Value) -> Result<Value, OrganError> {
        let camera_make = input["camera_make"].as_str();
        let camera_model = input["camera_model"].as_str();

        let selection = if let Some(path) = input["image_path"].as_str() {
            self.selector.select_for_image(Path::new(path))?
        } else if camera_make.is_none() && camera_model.is_none() {
            match input["photo_type"].as_str() {
                Some(photo_type) => self.selector.select_for_photo_type(photo_type),
                None => self.selector.select(&SelectionQuery::default()),
            }
        } else {
            self.selector.select(&SelectionQuery::new(
                camera_make.unwrap_or_default(),
                camera_model.unwrap_or_default(),
            ))
        };
        self.metrics.record_selection(selection.stage);

        let usage_count = match (&selection.record, input["record_usage"].as_bool()) {
            (Some(record), Some(true)) => Some(self.repo.record_usage(&record.id)?),
            _ => None,
        };

        Ok(json!({
            "stage": selection.stage,
            "found": selection.is_found(),
            "record": selection.record,
            "usage_count": usage_count,
        }))
    }

    /// Handle preset.list operation
    fn handle_list(&self, input: &Value) -> Result<Value, OrganError> {
        let kind = match input["source_kind"].as_str() {
            Some("builtin") => Some(SourceKind::Builtin),
            Some("uploaded") => Some(SourceKind::Uploaded),
            Some(other) => {
                return Err(OrganError::InvalidInput(format!(
                    "Unknown source_kind: {}",
                    other
                )))
            }
            None => None,
        };

        let presets: Vec<Value> = self
            .repo
            .list()
            .iter()
            .filter(|r| kind.map_or(true, |k| r.source_kind == k))
            .map(summary)
            .collect();

        Ok(json!({
            "count": presets.len(),
            "presets": presets,
        }))
    }

    /// Handle preset.get operation
    fn handle_get(&self, input: &Value) -> Result<Value, OrganError> {
        let id = required_str(input, "id")?;
        let record = self
            .repo
            .get(id)
            .ok_or_else(|| PresetError::NotFound(id.to_string()))?;
        Ok(serde_json::to_value(&record)?)
    }

    /// Handle preset.delete operation
    fn handle_delete(&self, input: &Value) -> Result<Value, OrganError> {
        let id = required_str(input, "id")?;
        let removed = self.repo.delete(id)?;
        Ok(json!({
            "deleted": removed.id,
            "name": removed.preset.name,
        }))
    }

    /// Handle preset.set_default operation
    fn handle_set_default(&self, input: &Value) -> Result<Value, OrganError> {
        let id = required_str(input, "id")?;
        self.repo.set_default(id)?;
        Ok(json!({ "default": id }))
    }

    /// Handle presets.capabilities operation
    fn handle_capabilities(&self) -> Result<Value, OrganError> {
        serde_json::to_value(&self.card).map_err(OrganError::SerializationError)
    }
}

fn required_str<'a>(input: &'a Value, key: &str) -> Result<&'a str, OrganError> {
    input[key]
        .as_str()
        .ok_or_else(|| OrganError::InvalidInput(format!("Missing {}", key)))
}

fn optional_string(input: &Value, key: &str) -> Option<String> {
    input[key].as_str().map(str::to_string)
}

fn convert_options(input: &Value) -> ConvertOptions {
    ConvertOptions {
        name: optional_string(input, "name"),
        description: optional_string(input, "description"),
        camera_models: input["camera_models"]
            .as_array()
            .map(|models| {
                models
                    .iter()
                    .filter_map(|m| m.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default(),
        original_filename: optional_string(input, "original_filename"),
    }
}

fn insert_options(input: &Value) -> InsertOptions {
    InsertOptions {
        photo_type: optional_string(input, "photo_type"),
        make_default: input["make_default"].as_bool().unwrap_or(false),
    }
}

fn summary(record: &PresetRecord) -> Value {
    json!({
        "id": record.id,
        "name": record.preset.name,
        "source_kind": record.source_kind,
        "is_default": record.is_default,
        "photo_type": record.photo_type,
        "camera_models": record.preset.camera_models,
        "usage_count": record.usage_count,
    })
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn ingest_output_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "id": { "type": "string" },
            "record": { "type": "object" },
            "diagnostics": { "type": "array" }
        }
    })
}

fn organ_card() -> OrganCard {
    OrganCard {
        name: "soma_presets".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        description: "Converts editor XMP sidecars into RAW-processing presets and selects presets per camera".to_string(),
        division: "media".to_string(),
        subsystem: "presets".to_string(),
        tags: strings(&["media", "raw", "xmp", "presets", "lightroom", "white-balance", "selection"]),
        execution_modes: strings(&["embedded", "sidecar", "server"]),
        author: Some("SOMA Media Team".to_string()),
        repository: None,
        functions: vec![
            FunctionCard {
                name: "preset.ingest_sidecar".to_string(),
                description: "Convert an XMP sidecar into a preset, run diagnostics and store it".to_string(),
                tags: strings(&["xmp", "conversion", "upload"]),
                examples: strings(&[
                    "Upload a Lightroom sidecar as a reusable preset",
                    "Store a camera-specific look for Canon EOS R5 files",
                ]),
                idempotent: false,
                side_effects: strings(&["stores preset", "may change default preset"]),
                input_schema: Some(json!({
                    "type": "object",
                    "properties": {
                        "content": { "type": "string", "description": "XMP sidecar text" },
                        "name": { "type": "string", "description": "Preset name (synthesized when absent)" },
                        "description": { "type": "string" },
                        "camera_models": { "type": "array", "items": { "type": "string" } },
                        "original_filename": { "type": "string" },
                        "photo_type": { "type": "string" },
                        "make_default": { "type": "boolean" }
                    },
                    "required": ["content"]
                })),
                output_schema: ingest_output_schema(),
            },
            FunctionCard {
                name: "preset.ingest_json".to_string(),
                description: "Validate a canonical preset document and store it".to_string(),
                tags: strings(&["json", "upload"]),
                examples: strings(&["Re-import a preset exported from another instance"]),
                idempotent: false,
                side_effects: strings(&["stores preset", "may change default preset"]),
                input_schema: Some(json!({
                    "type": "object",
                    "properties": {
                        "preset": { "type": "object", "description": "Canonical preset document" },
                        "photo_type": { "type": "string" },
                        "make_default": { "type": "boolean" }
                    },
                    "required": ["preset"]
                })),
                output_schema: ingest_output_schema(),
            },
            FunctionCard {
                name: "preset.convert".to_string(),
                description: "Convert an XMP sidecar into a preset without storing it".to_string(),
                tags: strings(&["xmp", "conversion", "preview"]),
                examples: strings(&["Preview the preset a sidecar would produce"]),
                idempotent: true,
                side_effects: vec![],
                input_schema: Some(json!({
                    "type": "object",
                    "properties": {
                        "content": { "type": "string", "description": "XMP sidecar text" },
                        "name": { "type": "string" },
                        "description": { "type": "string" },
                        "camera_models": { "type": "array", "items": { "type": "string" } }
                    },
                    "required": ["content"]
                })),
                output_schema: json!({
                    "type": "object",
                    "properties": {
                        "preset": { "type": "object" },
                        "diagnostics": { "type": "array" }
                    }
                }),
            },
            FunctionCard {
                name: "preset.validate".to_string(),
                description: "Check required fields and run plausibility diagnostics on a preset document".to_string(),
                tags: strings(&["validation", "diagnostics"]),
                examples: strings(&["Check a hand-edited preset before uploading it"]),
                idempotent: true,
                side_effects: vec![],
                input_schema: Some(json!({
                    "type": "object",
                    "properties": {
                        "preset": { "type": "object" }
                    },
                    "required": ["preset"]
                })),
                output_schema: json!({
                    "type": "object",
                    "properties": {
                        "valid": { "type": "boolean" },
                        "missing_fields": { "type": "array", "items": { "type": "string" } },
                        "diagnostics": { "type": "array" },
                        "accepted": { "type": "boolean" }
                    }
                }),
            },
            FunctionCard {
                name: "preset.select".to_string(),
                description: "Select the preset for a camera make/model, an image file or a photo type".to_string(),
                tags: strings(&["selection", "camera", "exif"]),
                examples: strings(&[
                    "Which preset applies to a Canon EOS R5?",
                    "Pick the preset for the camera that shot IMG_0001.CR3",
                    "Get the landscape preset",
                ]),
                idempotent: true,
                side_effects: strings(&["increments usage count when record_usage is set"]),
                input_schema: Some(json!({
                    "type": "object",
                    "properties": {
                        "camera_make": { "type": "string" },
                        "camera_model": { "type": "string" },
                        "image_path": { "type": "string", "description": "Read make/model from EXIF" },
                        "photo_type": { "type": "string" },
                        "record_usage": { "type": "boolean" }
                    }
                })),
                output_schema: json!({
                    "type": "object",
                    "properties": {
                        "stage": { "type": "string", "enum": ["builtin_mapping", "uploaded_match", "photo_type", "default", "not_found"] },
                        "found": { "type": "boolean" },
                        "record": { "type": ["object", "null"] },
                        "usage_count": { "type": ["integer", "null"] }
                    }
                }),
            },
            FunctionCard {
                name: "preset.list".to_string(),
                description: "List stored presets".to_string(),
                tags: strings(&["repository", "browse"]),
                examples: strings(&["List all uploaded presets"]),
                idempotent: true,
                side_effects: vec![],
                input_schema: Some(json!({
                    "type": "object",
                    "properties": {
                        "source_kind": { "type": "string", "enum": ["builtin", "uploaded"] }
                    }
                })),
                output_schema: json!({
                    "type": "object",
                    "properties": {
                        "count": { "type": "integer" },
                        "presets": { "type": "array" }
                    }
                }),
            },
            FunctionCard {
                name: "preset.get".to_string(),
                description: "Fetch one preset record by id".to_string(),
                tags: strings(&["repository"]),
                examples: strings(&["Show the full Canon EOS R preset"]),
                idempotent: true,
                side_effects: vec![],
                input_schema: Some(json!({
                    "type": "object",
                    "properties": { "id": { "type": "string" } },
                    "required": ["id"]
                })),
                output_schema: json!({ "type": "object" }),
            },
            FunctionCard {
                name: "preset.delete".to_string(),
                description: "Delete an uploaded preset; built-ins cannot be deleted".to_string(),
                tags: strings(&["repository", "admin"]),
                examples: strings(&["Remove an outdated uploaded preset"]),
                idempotent: false,
                side_effects: strings(&["removes preset"]),
                input_schema: Some(json!({
                    "type": "object",
                    "properties": { "id": { "type": "string" } },
                    "required": ["id"]
                })),
                output_schema: json!({
                    "type": "object",
                    "properties": {
                        "deleted": { "type": "string" },
                        "name": { "type": "string" }
                    }
                }),
            },
            FunctionCard {
                name: "preset.set_default".to_string(),
                description: "Make one preset the fallback default; clears the previous default".to_string(),
                tags: strings(&["repository", "admin", "default"]),
                examples: strings(&["Use the portrait preset when no camera matches"]),
                idempotent: true,
                side_effects: strings(&["changes default preset"]),
                input_schema: Some(json!({
                    "type": "object",
                    "properties": { "id": { "type": "string" } },
                    "required": ["id"]
                })),
                output_schema: json!({
                    "type": "object",
                    "properties": { "default": { "type": "string" } }
                }),
            },
            FunctionCard {
                name: "presets.capabilities".to_string(),
                description: "Return organ capability card with all available functions and metadata".to_string(),
                tags: strings(&["metadata", "discovery", "mcp"]),
                examples: strings(&["Discover available preset operations"]),
                idempotent: true,
                side_effects: vec![],
                input_schema: None,
                output_schema: json!({
                    "type": "object",
                    "properties": {
                        "name": { "type": "string" },
                        "version": { "type": "string" },
                        "functions": { "type": "array" }
                    }
                }),
            },
        ],
    }
}

#[async_trait]
impl Organ for PresetOrgan {
    async fn stimulate(&self, stimulus: Stimulus) -> Result<Response, OrganError> {
        let start = Instant::now();
        let op = stimulus.op;

        let result = self.dispatch(&op, stimulus.input);
        let latency = start.elapsed().as_millis() as u64;
        self.metrics.record_request(&op, result.is_ok(), latency);

        let output = match result {
            Ok(output) => {
                return Ok(Response {
                    ok: true,
                    output,
                    latency_ms: latency,
                    cost: None,
                })
            }
            Err(OrganError::UnsupportedOperation(_)) => json!({
                "error": "UnsupportedOperation",
                "op": op,
                "available_operations": self.available_operations(),
            }),
            Err(e) => {
                warn!("{} failed: {}", op, e);
                json!({
                    "error": e.kind(),
                    "op": op,
                    "message": e.to_string(),
                })
            }
        };

        Ok(Response {
            ok: false,
            output,
            latency_ms: latency,
            cost: None,
        })
    }

    fn describe(&self) -> OrganCard {
        self.card.clone()
    }
}
