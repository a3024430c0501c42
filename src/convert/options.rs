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


use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::Settings;
use crate::file::paths::short_label;

/// Options shared by every file of a run
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertOptions {
    pub output_dir: PathBuf,
    /// Explicit activation bytes, possibly a comma separated list
    pub activation_bytes: Option<String>,
    pub author: Option<String>,
    pub title: Option<String>,
    pub use_author_dir: bool,
    pub use_title_dir: bool,
    /// Carry on when cover art cannot be exported
    pub force: bool,
}

impl ConvertOptions {
    /// Options seeded from environment settings, without overrides
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            output_dir: settings.output_dir.clone(),
            activation_bytes: settings.activation_bytes.clone(),
            author: None,
            title: None,
            use_author_dir: settings.use_author_dir,
            use_title_dir: settings.use_title_dir,
            force: false,
        }
    }

    /// Per-file configuration for `input`
    pub fn for_file(&self, input: impl Into<PathBuf>) -> ParseConfig {
        ParseConfig {
            input: input.into(),
            options: self.clone(),
        }
    }
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

/// Everything needed to convert one file; immutable for the attempt
#[derive(Debug, Clone, PartialEq)]
pub struct ParseConfig {
    pub input: PathBuf,
    pub options: ConvertOptions,
}

/// Per-file logging context
///
/// Carries a short label derived from the file name so that interleaved log
/// lines from concurrent workers can be told apart.
#[derive(Debug, Clone)]
pub struct BookContext {
    label: String,
}

impl BookContext {
    pub fn for_path(path: &Path) -> Self {
        Self {
            label: short_label(path),
        }
    }
}

impl fmt::Display for BookContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_file_copies_options() {
        let options = ConvertOptions {
            author: Some("Override".to_string()),
            force: true,
            ..ConvertOptions::default()
        };
        let config = options.for_file("/in/book.aax");
        assert_eq!(config.input, PathBuf::from("/in/book.aax"));
        assert_eq!(config.options, options);
    }

    #[test]
    fn test_defaults_follow_settings() {
        let options = ConvertOptions::default();
        assert_eq!(options.output_dir, PathBuf::from("."));
        assert!(options.use_author_dir);
        assert!(options.use_title_dir);
        assert!(!options.force);
    }

    #[test]
    fn test_context_label() {
        let ctx = BookContext::for_path(Path::new("/in/AVeryLongTitle.aax"));
        assert_eq!(ctx.to_string(), "AVeryLongT...");
    }
}
