//! soma_presets - XMP sidecar to RAW-processing preset conversion for SOMA platform
//!
//! Converts editor sidecars (Adobe camera-raw-settings namespace) into
//! normalized presets, keeps them in a repository next to a built-in
//! catalogue, and picks the right preset for a camera.
//!
//! ## Modules
//!
//! - [`sidecar`] / [`normalize`] / [`convert`] - sidecar bytes to [`Preset`]
//! - [`validation`] - required fields and plausibility diagnostics
//! - [`repository`] / [`store`] / [`builtins`] - preset storage
//! - [`selector`] / [`camera`] - per-camera selection
//! - [`pipeline`] - ingestion glue, including parallel batches
//! - [`organ`] - UMA stimulus/response surface served by the daemon

pub mod builtins;
pub mod camera;
pub mod config;
pub mod convert;
pub mod error;
pub mod metrics;
pub mod normalize;
pub mod organ;
pub mod pipeline;
pub mod preset;
pub mod repository;
pub mod selector;
pub mod sidecar;
pub mod store;
pub mod validation;

pub use config::{CameraMapping, DiagnosticLimits, OutputColorSpace, OutputDirectives, PresetConfig};
pub use convert::{ConvertOptions, PresetConverter};
pub use error::PresetError;
pub use normalize::{normalize, NormalizedSettings};
pub use pipeline::{IngestOutcome, Ingestor, SidecarUpload};
pub use preset::Preset;
pub use repository::{InsertOptions, PresetRecord, PresetRepository, SourceKind};
pub use selector::{PresetSelector, Selection, SelectionQuery, SelectionStage};
pub use sidecar::{extract_attributes, RawAttributeMap};
pub use store::{JsonDirStore, PresetStore};
pub use validation::{Diagnostic, DiagnosticStatus, StructureReport};

pub type Result<T> = std::result::Result<T, PresetError>;
