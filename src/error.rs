use thiserror::Error;

#[derive(Error, Debug)]
pub enum PresetError {
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("No camera-raw-settings attributes found in sidecar")]
    NoVendorData,

    #[error("Preset is missing required fields: {}", missing_fields.join(", "))]
    StructuralInvalid { missing_fields: Vec<String> },

    #[error("A preset named '{0}' already exists")]
    DuplicateName(String),

    #[error("Preset not found: {0}")]
    NotFound(String),

    #[error("Built-in preset cannot be modified: {0}")]
    BuiltinImmutable(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PresetError {
    /// Stable identifier used in organ responses.
    pub fn kind(&self) -> &'static str {
        match self {
            PresetError::MalformedInput(_) => "MalformedInput",
            PresetError::NoVendorData => "NoVendorData",
            PresetError::StructuralInvalid { .. } => "StructuralInvalid",
            PresetError::DuplicateName(_) => "DuplicateName",
            PresetError::NotFound(_) => "NotFound",
            PresetError::BuiltinImmutable(_) => "BuiltinImmutable",
            PresetError::Config(_) => "Config",
            PresetError::Json(_) => "Json",
            PresetError::Io(_) => "Io",
        }
    }
}

pub type Result<T> = std::result::Result<T, PresetError>;
