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


//! Input container detection
//!
//! # Supported Formats
//! - AAX: Encrypted M4B (AAC codec), needs activation bytes
//! - AAC: Unencrypted AAC stream
//! - M4B: Unencrypted M4B audiobook

use std::fmt;
use std::path::Path;

use crate::error::{ChapterizeError, Result};

/// Input container format, detected from the file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    /// AAX - Audible's encrypted AAC format
    Aax,
    /// AAC - Unencrypted AAC audio
    Aac,
    /// M4B - Unencrypted M4B audiobook
    M4b,
}

impl InputFormat {
    /// Every accepted format, in the order they are listed to users
    pub const SUPPORTED: [InputFormat; 3] = [Self::Aax, Self::Aac, Self::M4b];

    /// Detect format from file extension (without the dot, any case)
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "aax" => Some(Self::Aax),
            "aac" => Some(Self::Aac),
            "m4b" => Some(Self::M4b),
            _ => None,
        }
    }

    /// Detect format from a path, failing with `UnsupportedFileType`
    pub fn from_path(path: &Path) -> Result<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
            .ok_or_else(|| ChapterizeError::UnsupportedFileType {
                file: path.to_path_buf(),
                supported: Self::supported_list(),
            })
    }

    /// Get file extension for this format
    pub fn to_extension(&self) -> &'static str {
        match self {
            Self::Aax => "aax",
            Self::Aac => "aac",
            Self::M4b => "m4b",
        }
    }

    /// Check if format needs activation bytes to decode
    pub fn is_encrypted(&self) -> bool {
        matches!(self, Self::Aax)
    }

    /// Comma separated list of accepted extensions, e.g. `aax, aac, m4b`
    pub fn supported_list() -> String {
        Self::SUPPORTED
            .iter()
            .map(|f| f.to_extension())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for InputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_extension())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_extension_any_case() {
        assert_eq!(InputFormat::from_extension("aax"), Some(InputFormat::Aax));
        assert_eq!(InputFormat::from_extension("AAX"), Some(InputFormat::Aax));
        assert_eq!(InputFormat::from_extension("M4b"), Some(InputFormat::M4b));
        assert_eq!(InputFormat::from_extension("aac"), Some(InputFormat::Aac));
        assert_eq!(InputFormat::from_extension("mp3"), None);
        assert_eq!(InputFormat::from_extension("aaxc"), None);
    }

    #[test]
    fn test_from_path() {
        assert_eq!(
            InputFormat::from_path(Path::new("/books/Dune.AAX")).unwrap(),
            InputFormat::Aax
        );

        let err = InputFormat::from_path(Path::new("/books/cover.jpg")).unwrap_err();
        match err {
            ChapterizeError::UnsupportedFileType { file, supported } => {
                assert_eq!(file, Path::new("/books/cover.jpg"));
                assert_eq!(supported, "aax, aac, m4b");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        assert!(InputFormat::from_path(Path::new("/books/no_extension")).is_err());
    }

    #[test]
    fn test_only_aax_is_encrypted() {
        assert!(InputFormat::Aax.is_encrypted());
        assert!(!InputFormat::Aac.is_encrypted());
        assert!(!InputFormat::M4b.is_encrypted());
    }
}
