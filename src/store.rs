//! Preset record persistence
//!
//! The repository writes through a [`PresetStore`] so records survive a
//! restart. [`JsonDirStore`] keeps one `<id>.json` per record; anything
//! relational lives outside this crate behind the same trait.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::PresetError;
use crate::repository::PresetRecord;

pub type Result<T> = std::result::Result<T, PresetError>;

/// Durable backing for [`crate::repository::PresetRepository`]
pub trait PresetStore: Send + Sync {
    /// Every persisted record, oldest first
    fn load_all(&self) -> Result<Vec<PresetRecord>>;
    fn save(&self, record: &PresetRecord) -> Result<()>;
    fn remove(&self, id: &str) -> Result<()>;
}

/// Reject ids that could escape the store directory
pub fn validate_record_id(id: &str) -> Result<()> {
    let invalid = |reason: &str| Err(PresetError::MalformedInput(format!("record id {}", reason)));

    if id.is_empty() {
        return invalid("cannot be empty");
    }
    if id.contains('/') || id.contains('\\') {
        return invalid("cannot contain path separators");
    }
    if id.contains("..") {
        return invalid("cannot contain '..'");
    }
    if id.starts_with('.') {
        return invalid("cannot start with '.'");
    }
    if id.contains('\0') {
        return invalid("cannot contain null bytes");
    }
    Ok(())
}

/// One JSON file per record in a directory
#[derive(Debug, Clone)]
pub struct JsonDirStore {
    dir: PathBuf,
}

impl JsonDirStore {
    /// Open (creating if needed) a store directory
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, id: &str) -> Result<PathBuf> {
        validate_record_id(id)?;
        Ok(self.dir.join(format!("{}.json", id)))
    }
}

impl PresetStore for JsonDirStore {
    fn load_all(&self) -> Result<Vec<PresetRecord>> {
        let mut records = Vec::new();

        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }

            let bytes = fs::read(&path)?;
            match serde_json::from_slice::<PresetRecord>(&bytes) {
                Ok(record) => records.push(record),
                // One corrupt file should not take the whole library down
                Err(e) => warn!("skipping unreadable record {}: {}", path.display(), e),
            }
        }

        records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        debug!("loaded {} record(s) from {}", records.len(), self.dir.display());
        Ok(records)
    }

    fn save(&self, record: &PresetRecord) -> Result<()> {
        let path = self.record_path(&record.id)?;
        let tmp = path.with_extension("json.tmp");

        let json = serde_json::to_vec_pretty(record)?;
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, id: &str) -> Result<()> {
        let path = self.record_path(id)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
