//! Camera identity from image files
//!
//! Reads EXIF Make/Model so the selector can be driven by an image instead of
//! free text.
//!
//! ## Backend Priority
//!
//! 1. **kamadak-exif** (pure Rust) - JPEG, TIFF, DNG, most TIFF-based RAW
//! 2. **ExifTool** (fallback) - containers kamadak-exif cannot open (CR3, RAF, ...)

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::process::Command;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::PresetError;

pub type Result<T> = std::result::Result<T, PresetError>;

/// Make and model as recorded by the camera
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraIdentity {
    pub make: String,
    pub model: String,
}

/// Read the camera identity of an image file
pub fn read_camera_identity(path: &Path) -> Result<CameraIdentity> {
    match read_with_kamadak_exif(path) {
        Ok(identity) => return Ok(identity),
        Err(e) => debug!("kamadak-exif failed for {}: {}", path.display(), e),
    }

    read_with_exiftool(path)
}

fn read_with_kamadak_exif(path: &Path) -> Result<CameraIdentity> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);

    let exif_data = exif::Reader::new()
        .read_from_container(&mut reader)
        .map_err(|e| PresetError::MalformedInput(format!("EXIF parse error: {}", e)))?;

    let get_ascii = |tag: exif::Tag| -> Option<String> {
        let field = exif_data.get_field(tag, exif::In::PRIMARY)?;
        match field.value {
            exif::Value::Ascii(ref parts) => parts
                .first()
                .map(|bytes| clean_exif_string(&String::from_utf8_lossy(bytes))),
            _ => None,
        }
    };

    identity_from(get_ascii(exif::Tag::Make), get_ascii(exif::Tag::Model))
}

fn read_with_exiftool(path: &Path) -> Result<CameraIdentity> {
    let output = Command::new("exiftool")
        .args(["-j", "-Make", "-Model"])
        .arg(path)
        .output()
        .map_err(|e| PresetError::MalformedInput(format!("ExifTool failed: {}", e)))?;

    if !output.status.success() {
        return Err(PresetError::MalformedInput(
            String::from_utf8_lossy(&output.stderr).to_string(),
        ));
    }

    let parsed: Vec<HashMap<String, serde_json::Value>> = serde_json::from_slice(&output.stdout)?;
    let tags = parsed
        .into_iter()
        .next()
        .ok_or_else(|| PresetError::MalformedInput("No metadata found".to_string()))?;

    let get_str = |key: &str| -> Option<String> {
        tags.get(key)
            .and_then(|v| v.as_str())
            .map(clean_exif_string)
    };

    identity_from(get_str("Make"), get_str("Model"))
}

fn identity_from(make: Option<String>, model: Option<String>) -> Result<CameraIdentity> {
    let make = make.filter(|m| !m.is_empty());
    let model = model.filter(|m| !m.is_empty());

    if make.is_none() && model.is_none() {
        return Err(PresetError::MalformedInput(
            "image has no camera make/model".to_string(),
        ));
    }

    Ok(CameraIdentity {
        make: make.unwrap_or_default(),
        model: model.unwrap_or_default(),
    })
}

/// EXIF ASCII values are NUL-padded and often space-padded
fn clean_exif_string(s: &str) -> String {
    s.trim_matches(|c: char| c == '\0' || c.is_whitespace())
        .to_string()
}
