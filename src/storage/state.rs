// Chapterize - Audible audiobook chapter splitter
// Copyright (C) 2025 Henning Berge
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


//! File-backed processing state, safe across processes
//!
//! # Files
//! - `<output_dir>/.books.json` - the record
//! - `<output_dir>/.books.json.lock` - advisory lock (`fs2`)
//! - `<output_dir>/.books.json.tmp` - staging file for atomic replace
//!
//! Every mutation takes the exclusive lock, re-reads the whole record from
//! disk, merges, writes the staging file and renames it over the record.
//! Nothing is cached between calls, so several workers or several daemons
//! pointed at the same output directory all see each other's writes.
//!
//! # Damaged records
//! A missing record is empty. An unparsable record is reported as a warning
//! and read as empty; the next mutation moves it aside to
//! `.books.json.corrupt` before writing a fresh record.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;
use fs2::FileExt;

use crate::error::{ChapterizeError, Result};
use crate::file::paths::normalize_path;
use crate::storage::models::{FileState, FileStatus, Section, StateRecord, StateUpdate};

pub const STATE_FILE_NAME: &str = ".books.json";

enum Loaded {
    Missing,
    Valid(StateRecord),
    Corrupt(String),
}

/// Cross-process state store for one output directory
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
    lock_path: PathBuf,
}

impl StateStore {
    /// Store backed by `path`
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let lock_path = sibling(&path, "lock");
        Self { path, lock_path }
    }

    /// Store living in an output directory
    pub fn in_dir(output_dir: &Path) -> Self {
        Self::open(output_dir.join(STATE_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current state of `file`, if it has ever been recorded
    pub fn get(&self, file: &Path) -> Result<Option<FileState>> {
        let key = record_key(file)?;
        let _lock = self.lock(false)?;

        let record = match self.load()? {
            Loaded::Missing => return Ok(None),
            Loaded::Valid(record) => record,
            Loaded::Corrupt(reason) => {
                tracing::warn!(path = %self.path.display(), %reason, "State file is corrupt, treating as empty");
                return Ok(None);
            }
        };

        Ok(record.get(&key).map(FileState::from_section))
    }

    /// `false` only when `file` is recorded as processed
    pub fn should_process(&self, file: &Path) -> Result<bool> {
        Ok(self
            .get(file)?
            .map(|state| state.should_process())
            .unwrap_or(true))
    }

    /// Merge `update` into the section of `file` and persist it
    pub fn update(&self, file: &Path, update: &StateUpdate) -> Result<FileState> {
        self.modify(file, |section| {
            update.apply(section);
            true
        })
        .map(|(state, _)| state)
    }

    /// Atomically mark `file` as processing
    ///
    /// Refuses (returns `false`) if another writer already recorded it as
    /// processed; otherwise sets `PROCESSING` and a fresh `start_date`.
    pub fn claim(&self, file: &Path) -> Result<bool> {
        self.modify(file, |section| {
            if FileState::from_section(section).status == Some(FileStatus::Processed) {
                return false;
            }
            StateUpdate::new()
                .status(FileStatus::Processing)
                .start_date(Local::now())
                .apply(section);
            true
        })
        .map(|(_, claimed)| claimed)
    }

    /// Record `file` as discovered unless it already has a section
    pub fn discover(&self, file: &Path) -> Result<FileState> {
        self.modify(file, |section| {
            if section.is_empty() {
                StateUpdate::new()
                    .status(FileStatus::Discovered)
                    .apply(section);
                true
            } else {
                false
            }
        })
        .map(|(state, _)| state)
    }

    /// Every recorded path with its state
    pub fn snapshot(&self) -> Result<BTreeMap<PathBuf, FileState>> {
        let _lock = self.lock(false)?;
        let record = match self.load()? {
            Loaded::Valid(record) => record,
            Loaded::Missing | Loaded::Corrupt(_) => StateRecord::new(),
        };
        Ok(record
            .iter()
            .map(|(k, v)| (PathBuf::from(k), FileState::from_section(v)))
            .collect())
    }

    /// Read-modify-write of one section under the exclusive lock
    ///
    /// `change` returns whether it modified the section; unchanged sections
    /// are not written back.
    fn modify<F>(&self, file: &Path, change: F) -> Result<(FileState, bool)>
    where
        F: FnOnce(&mut Section) -> bool,
    {
        let key = record_key(file)?;
        let _lock = self.lock(true)?;

        let mut record = match self.load()? {
            Loaded::Missing => StateRecord::new(),
            Loaded::Valid(record) => record,
            Loaded::Corrupt(reason) => {
                self.quarantine(&reason)?;
                StateRecord::new()
            }
        };

        let section = record.entry(key).or_default();
        let changed = change(section);
        let state = FileState::from_section(section);

        if changed {
            self.save(&record)?;
        }

        // Lock released when `_lock` is dropped
        Ok((state, changed))
    }

    fn lock(&self, exclusive: bool) -> Result<File> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&self.lock_path)
            .map_err(|e| {
                ChapterizeError::state_file(&self.lock_path, format!("Failed to open lock file: {}", e))
            })?;

        let locked = if exclusive {
            FileExt::lock_exclusive(&file)
        } else {
            FileExt::lock_shared(&file)
        };
        locked.map_err(|e| {
            ChapterizeError::state_file(&self.lock_path, format!("Failed to acquire lock: {}", e))
        })?;

        Ok(file)
    }

    fn load(&self) -> Result<Loaded> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Loaded::Missing),
            Err(e) => {
                return Err(ChapterizeError::state_file(
                    &self.path,
                    format!("Failed to read: {}", e),
                ))
            }
        };

        if content.trim().is_empty() {
            return Ok(Loaded::Missing);
        }

        Ok(match serde_json::from_str::<StateRecord>(&content) {
            Ok(record) => Loaded::Valid(record),
            Err(e) => Loaded::Corrupt(e.to_string()),
        })
    }

    fn save(&self, record: &StateRecord) -> Result<()> {
        let staging = sibling(&self.path, "tmp");
        let json = serde_json::to_string_pretty(record)?;

        let write = || -> std::io::Result<()> {
            let mut file = File::create(&staging)?;
            file.write_all(json.as_bytes())?;
            file.write_all(b"\n")?;
            file.sync_all()?;
            std::fs::rename(&staging, &self.path)
        };

        write().map_err(|e| ChapterizeError::state_file(&self.path, format!("Failed to write: {}", e)))
    }

    fn quarantine(&self, reason: &str) -> Result<()> {
        let aside = sibling(&self.path, "corrupt");
        tracing::warn!(
            path = %self.path.display(),
            moved_to = %aside.display(),
            %reason,
            "State file is corrupt, starting a fresh record"
        );
        std::fs::rename(&self.path, &aside).map_err(|e| {
            ChapterizeError::state_file(&self.path, format!("Failed to move corrupt record aside: {}", e))
        })
    }
}

fn record_key(file: &Path) -> Result<String> {
    Ok(normalize_path(file)?.to_string_lossy().into_owned())
}

/// `<path>.<suffix>` next to `path`
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}
