//! Preset Repository
//!
//! Content-addressed collection of built-in and uploaded presets.
//!
//! ## Invariants
//!
//! - Uploaded preset names are unique among uploaded presets
//! - Built-ins are seeded once and can be neither deleted nor replaced
//! - At most one record is the default; swapping it happens under one write lock
//!
//! All mutations hold the write lock for their whole duration, including the
//! write-through to the [`PresetStore`], so readers never see a half-applied
//! change. Every record a mutation touches is written to the store before any
//! of them is applied in memory; if one write fails the earlier writes are
//! rolled back and the in-memory state is left as it was.

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use xxhash_rust::xxh3::xxh3_64;

use crate::builtins;
use crate::config::PresetConfig;
use crate::error::PresetError;
use crate::preset::Preset;
use crate::store::PresetStore;
use crate::validation::validate_structure;

pub type Result<T> = std::result::Result<T, PresetError>;

/// Prefix for content-addressed ids of uploaded presets
pub const UPLOADED_ID_PREFIX: &str = "up-";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Builtin,
    Uploaded,
}

/// A preset plus its applicability metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresetRecord {
    pub id: String,
    pub preset: Preset,
    pub is_default: bool,
    pub photo_type: Option<String>,
    pub source_kind: SourceKind,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub usage_count: u64,
}

impl PresetRecord {
    pub fn is_builtin(&self) -> bool {
        self.source_kind == SourceKind::Builtin
    }
}

/// Applicability metadata supplied on insert
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InsertOptions {
    pub photo_type: Option<String>,
    pub make_default: bool,
}

/// `up-<xxh3 hex>` over the preset's JSON
pub fn content_id(preset: &Preset) -> Result<String> {
    let bytes = serde_json::to_vec(preset)?;
    Ok(format!("{}{:016x}", UPLOADED_ID_PREFIX, xxh3_64(&bytes)))
}

#[derive(Default)]
struct RepoState {
    records: Vec<PresetRecord>,
    builtins_seeded: bool,
}

impl RepoState {
    fn position(&self, id: &str) -> Option<usize> {
        self.records.iter().position(|r| r.id == id)
    }

    /// Changes that drop the default flag from every record except `keep`
    fn clear_default_changes(&self, keep: Option<usize>) -> Vec<Change> {
        self.records
            .iter()
            .enumerate()
            .filter(|(index, r)| r.is_default && Some(*index) != keep)
            .map(|(index, r)| {
                let mut updated = r.clone();
                updated.is_default = false;
                Change::replace(index, r, updated)
            })
            .collect()
    }
}

/// One pending record write
struct Change {
    /// Slot in `RepoState::records`; `None` appends
    index: Option<usize>,
    previous: Option<PresetRecord>,
    updated: PresetRecord,
}

impl Change {
    fn replace(index: usize, previous: &PresetRecord, updated: PresetRecord) -> Self {
        Self {
            index: Some(index),
            previous: Some(previous.clone()),
            updated,
        }
    }

    fn append(record: PresetRecord) -> Self {
        Self {
            index: None,
            previous: None,
            updated: record,
        }
    }
}

pub struct PresetRepository {
    config: PresetConfig,
    state: RwLock<RepoState>,
    store: Option<Box<dyn PresetStore>>,
}

impl PresetRepository {
    /// In-memory repository; built-ins are not seeded
    pub fn new(config: PresetConfig) -> Self {
        Self {
            config,
            state: RwLock::new(RepoState::default()),
            store: None,
        }
    }

    /// Load persisted records from `store` and seed built-ins if configured
    pub fn open(config: PresetConfig, store: Option<Box<dyn PresetStore>>) -> Result<Self> {
        let records = match &store {
            Some(store) => store.load_all()?,
            None => Vec::new(),
        };
        let seed = config.seed_builtins;

        let repo = Self {
            config,
            state: RwLock::new(RepoState {
                records,
                builtins_seeded: false,
            }),
            store,
        };

        // A store may hold several defaults if it was edited by hand
        repo.repair_default_flag()?;

        if seed {
            repo.seed_builtins()?;
        }

        info!("preset repository opened with {} record(s)", repo.len());
        Ok(repo)
    }

    fn read(&self) -> RwLockReadGuard<'_, RepoState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RepoState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Write every change through to the store, then apply them to `state`
    fn commit(&self, state: &mut RepoState, changes: Vec<Change>) -> Result<()> {
        if let Some(store) = &self.store {
            for (written, change) in changes.iter().enumerate() {
                if let Err(e) = store.save(&change.updated) {
                    roll_back(&**store, &changes[..written]);
                    return Err(e);
                }
            }
        }

        for change in changes {
            match change.index {
                Some(index) => state.records[index] = change.updated,
                None => state.records.push(change.updated),
            }
        }
        Ok(())
    }

    /// Insert the built-in catalogue. Only the first call does anything.
    ///
    /// Returns the number of records added.
    pub fn seed_builtins(&self) -> Result<usize> {
        let mut state = self.write();
        if state.builtins_seeded {
            return Ok(0);
        }

        let changes: Vec<Change> = builtins::catalogue(&self.config)
            .into_iter()
            // Already restored from the store, possibly carrying the default flag
            .filter(|builtin| state.position(builtin.id).is_none())
            .map(|builtin| {
                Change::append(PresetRecord {
                    id: builtin.id.to_string(),
                    preset: builtin.preset,
                    is_default: false,
                    photo_type: builtin.photo_type.map(str::to_string),
                    source_kind: SourceKind::Builtin,
                    created_at: builtins::catalogue_epoch(),
                    usage_count: 0,
                })
            })
            .collect();

        let added = changes.len();
        self.commit(&mut state, changes)?;

        state.builtins_seeded = true;
        info!("seeded {} built-in preset(s)", added);
        Ok(added)
    }

    /// Insert an uploaded preset
    pub fn insert(&self, preset: Preset, options: InsertOptions) -> Result<PresetRecord> {
        validate_structure(&preset.to_value()).into_result()?;

        let mut state = self.write();

        let name = preset.name.trim();
        let duplicate = state
            .records
            .iter()
            .any(|r| r.source_kind == SourceKind::Uploaded && r.preset.name.trim() == name);
        if duplicate {
            return Err(PresetError::DuplicateName(name.to_string()));
        }

        let id = content_id(&preset)?;
        if state.position(&id).is_some() {
            return Err(PresetError::DuplicateName(name.to_string()));
        }

        let record = PresetRecord {
            id,
            preset,
            is_default: options.make_default,
            photo_type: options
                .photo_type
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty()),
            source_kind: SourceKind::Uploaded,
            created_at: Utc::now(),
            usage_count: 0,
        };

        let mut changes = if record.is_default {
            state.clear_default_changes(None)
        } else {
            Vec::new()
        };
        changes.push(Change::append(record.clone()));
        self.commit(&mut state, changes)?;

        info!(
            "inserted preset '{}' ({}){}",
            record.preset.name,
            record.id,
            if record.is_default { " as default" } else { "" }
        );
        Ok(record)
    }

    /// Delete an uploaded preset
    pub fn delete(&self, id: &str) -> Result<PresetRecord> {
        let mut state = self.write();
        let index = state
            .position(id)
            .ok_or_else(|| PresetError::NotFound(id.to_string()))?;

        if state.records[index].is_builtin() {
            return Err(PresetError::BuiltinImmutable(id.to_string()));
        }

        if let Some(store) = &self.store {
            store.remove(id)?;
        }
        let record = state.records.remove(index);
        info!("deleted preset '{}' ({})", record.preset.name, record.id);
        Ok(record)
    }

    /// Make `id` the only default
    pub fn set_default(&self, id: &str) -> Result<()> {
        let mut state = self.write();
        let index = state
            .position(id)
            .ok_or_else(|| PresetError::NotFound(id.to_string()))?;

        let mut changes = state.clear_default_changes(Some(index));
        let current = &state.records[index];
        if !current.is_default {
            let mut updated = current.clone();
            updated.is_default = true;
            changes.push(Change::replace(index, current, updated));
        }
        self.commit(&mut state, changes)?;

        info!("default preset is now {}", id);
        Ok(())
    }

    /// Remove the default flag from every record
    pub fn clear_default(&self) -> Result<()> {
        let mut state = self.write();
        let changes = state.clear_default_changes(None);
        self.commit(&mut state, changes)
    }

    /// Keep only the first default when loaded data carries several
    fn repair_default_flag(&self) -> Result<()> {
        let mut state = self.write();
        let first = state.records.iter().position(|r| r.is_default);
        if first.is_some() {
            let changes = state.clear_default_changes(first);
            if !changes.is_empty() {
                debug!("clearing {} extra default flag(s)", changes.len());
            }
            self.commit(&mut state, changes)?;
        }
        Ok(())
    }

    /// Bump the usage counter after a preset has been dispatched
    pub fn record_usage(&self, id: &str) -> Result<u64> {
        let mut state = self.write();
        let index = state
            .position(id)
            .ok_or_else(|| PresetError::NotFound(id.to_string()))?;

        let current = &state.records[index];
        let mut updated = current.clone();
        updated.usage_count += 1;
        let count = updated.usage_count;
        let change = Change::replace(index, current, updated);
        self.commit(&mut state, vec![change])?;
        Ok(count)
    }

    pub fn get(&self, id: &str) -> Option<PresetRecord> {
        self.read().records.iter().find(|r| r.id == id).cloned()
    }

    /// First record with this exact (trimmed) name, uploaded presets first
    pub fn find_by_name(&self, name: &str) -> Option<PresetRecord> {
        let name = name.trim();
        let state = self.read();
        let matching = |kind: SourceKind| {
            state
                .records
                .iter()
                .find(|r| r.source_kind == kind && r.preset.name.trim() == name)
        };
        matching(SourceKind::Uploaded)
            .or_else(|| matching(SourceKind::Builtin))
            .cloned()
    }

    pub fn list(&self) -> Vec<PresetRecord> {
        self.read().records.clone()
    }

    pub fn default_record(&self) -> Option<PresetRecord> {
        self.read().records.iter().find(|r| r.is_default).cloned()
    }

    pub fn len(&self) -> usize {
        self.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run `f` against a consistent view of all records
    pub fn with_snapshot<R>(&self, f: impl FnOnce(&[PresetRecord]) -> R) -> R {
        let state = self.read();
        f(&state.records)
    }
}

/// Undo already-saved changes, newest first
fn roll_back(store: &dyn PresetStore, written: &[Change]) {
    for change in written.iter().rev() {
        let restored = match &change.previous {
            Some(previous) => store.save(previous),
            None => store.remove(&change.updated.id),
        };
        if let Err(e) = restored {
            warn!("failed to roll back record {}: {}", change.updated.id, e);
        }
    }
}
