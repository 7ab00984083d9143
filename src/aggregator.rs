//! Concurrent record aggregation and durable CSV checkpoints.
//!
//! The aggregator is shared across detail workers behind an `Arc`. Records
//! land in insertion order, keyed by profile id, first occurrence wins.
//! `checkpoint()` snapshots everything collected so far and writes one CSV
//! atomically: the bytes go to a temp file first and land under the final
//! name via rename, so a crash mid-write never leaves a torn file. The
//! first checkpoint of a run picks the lowest unused versioned filename
//! and pins it; the whole run rewrites that one file and never touches a
//! previous run's output.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

use indexmap::IndexMap;
use tracing::info;
use unicode_normalization::UnicodeNormalization;

use crate::error::CheckpointError;
use crate::types::ProfileRecord;

/// Output column order. Uppercase, fixed, identity columns last.
pub const CSV_COLUMNS: [&str; 12] = [
    "NAME",
    "POSITION",
    "AFFILIATION",
    "DEPARTMENT",
    "SUPERVISOR",
    "INTERESTS",
    "EMAIL",
    "WEBSITE",
    "FUNDING_LIKELIHOOD",
    "PROFILE_ID",
    "ORCID",
    "PROFILE_URL",
];

/// Shared, checkpointable record store for one harvest run.
pub struct Aggregator {
    records: RwLock<IndexMap<String, ProfileRecord>>,
    dir: PathBuf,
    stem: String,
    pinned: Mutex<Option<PathBuf>>,
}

impl Aggregator {
    /// `dir` is the output directory, `stem` the checkpoint filename stem
    /// (`{stem}_v{N}.csv`). Nothing touches the filesystem until the first
    /// checkpoint.
    pub fn new(dir: impl Into<PathBuf>, stem: impl Into<String>) -> Self {
        Self {
            records: RwLock::new(IndexMap::new()),
            dir: dir.into(),
            stem: stem.into(),
            pinned: Mutex::new(None),
        }
    }

    /// Inserts a record unless its profile id is already present.
    /// Returns whether the record went in.
    pub fn add(&self, record: ProfileRecord) -> bool {
        let mut records = self.records.write().unwrap();
        if records.contains_key(&record.profile_id) {
            return false;
        }
        records.insert(record.profile_id.clone(), record);
        true
    }

    pub fn len(&self) -> usize {
        self.records.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().unwrap().is_empty()
    }

    /// Clones the current records, sorted by cleaned name for output.
    pub fn snapshot(&self) -> Vec<ProfileRecord> {
        let records = self.records.read().unwrap();
        let mut rows: Vec<ProfileRecord> = records.values().cloned().collect();
        drop(records);
        rows.sort_by_cached_key(|record| clean_name(&record.name).to_lowercase());
        rows
    }

    /// Writes the run's checkpoint file and returns its path.
    ///
    /// Safe to call after every page batch; each call rewrites the same
    /// pinned file with everything collected so far.
    pub fn checkpoint(&self) -> Result<PathBuf, CheckpointError> {
        let path = self.pinned_path()?;
        let tmp = path.with_extension("csv.tmp");

        let rows = self.snapshot();
        let mut writer = csv::WriterBuilder::new().from_path(&tmp)?;
        writer.write_record(CSV_COLUMNS)?;
        for record in &rows {
            writer.write_record(csv_row(record))?;
        }
        writer.flush()?;
        drop(writer);
        fs::rename(&tmp, &path)?;

        info!(path = %path.display(), records = rows.len(), "checkpoint written");
        Ok(path)
    }

    /// Path of the checkpoint file this run writes to, if pinned already.
    pub fn checkpoint_path(&self) -> Option<PathBuf> {
        self.pinned.lock().unwrap().clone()
    }

    fn pinned_path(&self) -> Result<PathBuf, CheckpointError> {
        let mut pinned = self.pinned.lock().unwrap();
        if let Some(path) = pinned.as_ref() {
            return Ok(path.clone());
        }
        fs::create_dir_all(&self.dir)?;
        let path = next_free_version(&self.dir, &self.stem);
        *pinned = Some(path.clone());
        Ok(path)
    }
}

fn next_free_version(dir: &Path, stem: &str) -> PathBuf {
    let mut version = 1;
    loop {
        let candidate = dir.join(format!("{stem}_v{version}.csv"));
        if !candidate.exists() {
            return candidate;
        }
        version += 1;
    }
}

fn csv_row(record: &ProfileRecord) -> [String; 12] {
    [
        clean_name(&record.name),
        fold_cell(record.position.as_deref()),
        fold_cell(record.affiliation.as_deref()),
        fold_cell(record.department.as_deref()),
        fold_cell(record.supervisor.as_deref()),
        fold_cell(record.interests.as_deref()),
        record.email.clone().unwrap_or_default(),
        record.website.clone().unwrap_or_default(),
        record.funding.as_str().to_string(),
        record.profile_id.clone(),
        record.orcid.clone().unwrap_or_default(),
        record.url.clone(),
    ]
}

fn fold_cell(value: Option<&str>) -> String {
    value.map(fold_ascii).unwrap_or_default()
}

/// NFKD-decomposes, keeps the ASCII residue, collapses whitespace.
/// Accents fold to their base letters; characters with no decomposition
/// (e.g. `ł`) drop out.
pub fn fold_ascii(text: &str) -> String {
    let decomposed: String = text.nfkd().filter(char::is_ascii).collect();
    decomposed.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Output form of a name: folded, with any trailing bracketed annotation
/// (lab name, ORCID note) stripped.
pub fn clean_name(name: &str) -> String {
    let folded = fold_ascii(name);
    match folded.split_once('[') {
        Some((before, _)) => before.trim().to_string(),
        None => folded.trim().to_string(),
    }
}
