//! State record models for Chapterize
//!
//! A record maps an absolute input path to a section of string fields. The
//! known fields are typed through [`FileState`]; any other field found in a
//! section is carried along untouched.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Local};

use crate::error::{ChapterizeError, Result};

pub const STATUS_FIELD: &str = "status";
pub const START_DATE_FIELD: &str = "start_date";
pub const END_DATE_FIELD: &str = "end_date";

/// Raw fields of one path's section
pub type Section = BTreeMap<String, String>;

/// Whole state file: absolute path → section
pub type StateRecord = BTreeMap<String, Section>;

/// Processing status of an input file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileStatus {
    Discovered,
    Processing,
    Processed,
    Error,
}

impl FileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileStatus::Discovered => "DISCOVERED",
            FileStatus::Processing => "PROCESSING",
            FileStatus::Processed => "PROCESSED",
            FileStatus::Error => "ERROR",
        }
    }

    pub fn from_str(s: &str) -> Result<Self> {
        match s {
            "DISCOVERED" => Ok(FileStatus::Discovered),
            "PROCESSING" => Ok(FileStatus::Processing),
            "PROCESSED" => Ok(FileStatus::Processed),
            "ERROR" => Ok(FileStatus::Error),
            _ => Err(ChapterizeError::internal(format!("Invalid file status: {}", s))),
        }
    }

    /// Check if status is terminal (processed or error)
    pub fn is_terminal(&self) -> bool {
        matches!(self, FileStatus::Processed | FileStatus::Error)
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed view of one section
#[derive(Debug, Clone, PartialEq)]
pub struct FileState {
    pub status: Option<FileStatus>,
    pub start_date: Option<DateTime<Local>>,
    pub end_date: Option<DateTime<Local>>,
    /// Every raw field, including the ones above
    pub fields: Section,
}

impl FileState {
    pub fn from_section(section: &Section) -> Self {
        Self {
            status: section
                .get(STATUS_FIELD)
                .and_then(|s| FileStatus::from_str(s).ok()),
            start_date: section.get(START_DATE_FIELD).and_then(|s| parse_date(s)),
            end_date: section.get(END_DATE_FIELD).and_then(|s| parse_date(s)),
            fields: section.clone(),
        }
    }

    /// A path is processed again unless it already succeeded
    pub fn should_process(&self) -> bool {
        self.status != Some(FileStatus::Processed)
    }
}

/// Fields to merge into a section
#[derive(Debug, Clone, Default)]
pub struct StateUpdate {
    fields: Vec<(String, String)>,
}

impl StateUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(self, status: FileStatus) -> Self {
        self.field(STATUS_FIELD, status.as_str())
    }

    pub fn start_date(self, at: DateTime<Local>) -> Self {
        self.field(START_DATE_FIELD, at.to_rfc3339())
    }

    pub fn end_date(self, at: DateTime<Local>) -> Self {
        self.field(END_DATE_FIELD, at.to_rfc3339())
    }

    /// Set an arbitrary field
    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    /// Merge into `section`; later fields win, untouched fields survive
    pub fn apply(&self, section: &mut Section) {
        for (name, value) in &self.fields {
            section.insert(name.clone(), value.clone());
        }
    }
}

fn parse_date(s: &str) -> Option<DateTime<Local>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|d| d.with_timezone(&Local))
}
