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


//! Book metadata and chapter list, read from FFprobe output
//!
//! # Tag Fallbacks
//! - Author: `artist`, then `album_artist`, then `"Unknown"`
//! - Title: `title`, then `album`, then the input file stem
//! - Empty tag values count as missing
//!
//! # Chapter Markers
//! Start and end times are kept as the strings FFprobe printed (seconds with
//! a fractional part) and handed back to FFmpeg verbatim, so no precision is
//! lost converting through floats.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::crypto::ActivationKey;
use crate::error::{ChapterizeError, Result};

pub const UNKNOWN_AUTHOR: &str = "Unknown";

/// One chapter of the source book
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chapter {
    pub title: String,
    /// Start time in seconds, as printed by FFprobe
    pub start: String,
    /// End time in seconds, as printed by FFprobe
    pub end: String,
}

/// Everything the export stages need to know about a book
#[derive(Debug, Clone)]
pub struct MetaData {
    pub author: String,
    pub title: String,
    /// Activation bytes that decrypted the file; `None` for unencrypted input
    pub key: Option<ActivationKey>,
    pub chapters: Vec<Chapter>,
}

impl MetaData {
    /// Build metadata from a successful probe
    pub fn from_probe(input: &Path, probe: ProbeOutput, key: Option<ActivationKey>) -> Self {
        let tags = probe.format.tags.unwrap_or_default();

        let author = tag(&tags, "artist")
            .or_else(|| tag(&tags, "album_artist"))
            .unwrap_or(UNKNOWN_AUTHOR)
            .to_string();

        let title = tag(&tags, "title")
            .or_else(|| tag(&tags, "album"))
            .map(str::to_string)
            .unwrap_or_else(|| file_stem(input));

        let chapters = probe
            .chapters
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .map(|(index, c)| {
                let title = c
                    .tags
                    .as_ref()
                    .and_then(|t| tag(t, "title"))
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("Chapter {}", index + 1));
                Chapter {
                    title,
                    start: c.start_time,
                    end: c.end_time,
                }
            })
            .collect();

        Self {
            author,
            title,
            key,
            chapters,
        }
    }

    /// Replace probed author and title with user supplied values
    ///
    /// Blank overrides are ignored.
    pub fn apply_overrides(&mut self, author: Option<&str>, title: Option<&str>) {
        if let Some(author) = author.map(str::trim).filter(|a| !a.is_empty()) {
            self.author = author.to_string();
        }
        if let Some(title) = title.map(str::trim).filter(|t| !t.is_empty()) {
            self.title = title.to_string();
        }
    }
}

/// FFprobe `-print_format json -show_format -show_chapters` output
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProbeOutput {
    #[serde(default)]
    pub format: ProbeFormat,
    pub chapters: Option<Vec<ProbeChapter>>,
}

impl ProbeOutput {
    /// Parse FFprobe JSON for the given input file
    pub fn from_json(input: &Path, json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| ChapterizeError::ProbeParseFailed {
            file: input.to_path_buf(),
            reason: e.to_string(),
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProbeFormat {
    pub tags: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProbeChapter {
    pub start_time: String,
    pub end_time: String,
    pub tags: Option<HashMap<String, String>>,
}

/// Look up a tag case-insensitively, ignoring blank values
fn tag<'a>(tags: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    tags.get(name)
        .or_else(|| {
            tags.iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v)
        })
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

fn file_stem(input: &Path) -> String {
    input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROBE_JSON: &str = r#"{
        "chapters": [
            {"id": 0, "start_time": "0.000000", "end_time": "1234.567000", "tags": {"title": "Opening Credits"}},
            {"id": 1, "start_time": "1234.567000", "end_time": "4000.000000", "tags": {"title": "Chapter 1"}},
            {"id": 2, "start_time": "4000.000000", "end_time": "5000.000000"}
        ],
        "format": {
            "filename": "book.aax",
            "tags": {"title": "Dune", "artist": "Frank Herbert", "album": "Dune (Unabridged)"}
        }
    }"#;

    #[test]
    fn test_from_probe_reads_tags_and_chapters() {
        let probe = ProbeOutput::from_json(Path::new("book.aax"), PROBE_JSON).unwrap();
        let meta = MetaData::from_probe(Path::new("/in/book.aax"), probe, None);

        assert_eq!(meta.author, "Frank Herbert");
        assert_eq!(meta.title, "Dune");
        assert_eq!(meta.chapters.len(), 3);
        assert_eq!(meta.chapters[0].title, "Opening Credits");
        assert_eq!(meta.chapters[1].start, "1234.567000");
        assert_eq!(meta.chapters[1].end, "4000.000000");
        assert_eq!(meta.chapters[2].title, "Chapter 3");
    }

    #[test]
    fn test_fallbacks() {
        let json = r#"{"format": {"tags": {"album": "Album Name", "album_artist": "Someone", "artist": " "}}}"#;
        let probe = ProbeOutput::from_json(Path::new("x.m4b"), json).unwrap();
        let meta = MetaData::from_probe(Path::new("/in/x.m4b"), probe, None);
        assert_eq!(meta.author, "Someone");
        assert_eq!(meta.title, "Album Name");
        assert!(meta.chapters.is_empty());
    }

    #[test]
    fn test_missing_tags_use_defaults() {
        let probe = ProbeOutput::from_json(Path::new("x.aax"), r#"{"format": {}}"#).unwrap();
        let meta = MetaData::from_probe(Path::new("/in/My Book.aax"), probe, None);
        assert_eq!(meta.author, UNKNOWN_AUTHOR);
        assert_eq!(meta.title, "My Book");
    }

    #[test]
    fn test_uppercase_tag_keys() {
        let json = r#"{"format": {"tags": {"TITLE": "Loud", "ARTIST": "Caps"}}}"#;
        let probe = ProbeOutput::from_json(Path::new("x.aax"), json).unwrap();
        let meta = MetaData::from_probe(Path::new("x.aax"), probe, None);
        assert_eq!(meta.title, "Loud");
        assert_eq!(meta.author, "Caps");
    }

    #[test]
    fn test_apply_overrides() {
        let probe = ProbeOutput::from_json(Path::new("book.aax"), PROBE_JSON).unwrap();
        let mut meta = MetaData::from_probe(Path::new("book.aax"), probe, None);
        meta.apply_overrides(Some("F. Herbert"), None);
        assert_eq!(meta.author, "F. Herbert");
        assert_eq!(meta.title, "Dune");
    }

    #[test]
    fn test_blank_overrides_keep_tag_values() {
        let probe = ProbeOutput::from_json(Path::new("book.aax"), PROBE_JSON).unwrap();
        let mut meta = MetaData::from_probe(Path::new("book.aax"), probe, None);
        meta.apply_overrides(Some(""), Some("   "));
        assert_eq!(meta.author, "Frank Herbert");
        assert_eq!(meta.title, "Dune");
    }

    #[test]
    fn test_invalid_json() {
        let err = ProbeOutput::from_json(Path::new("book.aax"), "not json").unwrap_err();
        assert!(matches!(err, ChapterizeError::ProbeParseFailed { .. }));
    }
}
