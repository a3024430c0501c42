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


//! Output naming and path normalization
//!
//! # Layout
//! ```text
//! <output_dir>/[<author>/][<title>/]cover.jpg
//! <output_dir>/[<author>/][<title>/]<NN> - <chapter title>.mp3
//! ```
//! Track numbers are zero padded to the digit width of the chapter count.

use std::path::{Component, Path, PathBuf};

use crate::error::Result;

/// Longest single path component most filesystems accept (bytes)
const MAX_COMPONENT_LENGTH: usize = 255;

pub const COVER_FILE_NAME: &str = "cover.jpg";

/// Decimal digit width of the chapter count
pub fn padding_width(chapter_count: usize) -> usize {
    chapter_count.max(1).to_string().len()
}

/// File name for a chapter track, e.g. `007 - Title.mp3`
///
/// `track` is 1-based.
pub fn track_file_name(track: usize, chapter_count: usize, title: &str) -> String {
    let width = padding_width(chapter_count);
    let title = sanitize_filename(title);
    // Reserve room for the number, " - " and ".mp3"
    let budget = MAX_COMPONENT_LENGTH.saturating_sub(width + 3 + 4);
    format!(
        "{:0width$} - {}.mp3",
        track,
        truncate_component(&title, budget),
        width = width
    )
}

/// Sanitize filename (removes/replaces invalid characters for filenames)
pub fn sanitize_filename(name: &str) -> String {
    sanitize(name, "file")
}

/// Sanitize a single directory name (author or title)
///
/// Slashes inside the name are replaced, never treated as separators, so a
/// title can never escape the output directory.
pub fn sanitize_dir_name(name: &str) -> String {
    let sanitized = sanitize(name, "folder");
    truncate_component(&sanitized, MAX_COMPONENT_LENGTH)
}

fn sanitize(name: &str, fallback: &str) -> String {
    let mut result: String = name.chars().map(replace_char).collect();

    // Trim leading/trailing whitespace and dots
    result = result
        .trim()
        .trim_start_matches('.')
        .trim_end_matches('.')
        .trim()
        .to_string();

    if cfg!(target_os = "windows") {
        result = handle_windows_reserved_names(&result);
    }

    if result.is_empty() {
        result = fallback.to_string();
    }

    result
}

/// Replace invalid character with safe alternative
fn replace_char(c: char) -> char {
    match c {
        '<' => '＜', // U+FF1C fullwidth less-than sign
        '>' => '＞', // U+FF1E fullwidth greater-than sign
        ':' => '_',
        '"' => '＂', // U+FF02 fullwidth quotation mark
        '|' => '⏐', // U+23D0 vertical line extension
        '?' => '？', // U+FF1F fullwidth question mark
        '*' => '✱', // U+2731 heavy asterisk
        '/' => '∕', // U+2215 division slash
        '\\' => '_',
        c if c.is_control() => '_',
        c => c,
    }
}

fn handle_windows_reserved_names(name: &str) -> String {
    let upper = name.to_uppercase();
    let reserved = [
        "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7",
        "COM8", "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
    ];

    for reserved_name in &reserved {
        if upper == *reserved_name || upper.starts_with(&format!("{}.", reserved_name)) {
            return format!("_{}", name);
        }
    }

    name.to_string()
}

/// Truncate path component to fit within byte limit
pub fn truncate_component(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }

    // Find valid UTF-8 boundary
    let mut index = max_bytes;
    while index > 0 && !text.is_char_boundary(index) {
        index -= 1;
    }

    text[..index].trim_end().to_string()
}

/// Absolute, lexically cleaned form of `path`
///
/// Relative paths are resolved against the current directory and `.` / `..`
/// components are folded. Symlinks are not resolved, so the result is stable
/// even after the file has been deleted.
pub fn normalize_path(path: &Path) -> Result<PathBuf> {
    let absolute = std::path::absolute(path)?;

    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    Ok(normalized)
}

/// Short label for log lines: the file name, cut to 10 characters
pub fn short_label(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());

    if name.chars().count() > 10 {
        format!("{}...", name.chars().take(10).collect::<String>())
    } else {
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_padding_width() {
        assert_eq!(padding_width(0), 1);
        assert_eq!(padding_width(7), 1);
        assert_eq!(padding_width(9), 1);
        assert_eq!(padding_width(10), 2);
        assert_eq!(padding_width(99), 2);
        assert_eq!(padding_width(100), 3);
        assert_eq!(padding_width(125), 3);
    }

    #[test]
    fn test_track_file_name() {
        assert_eq!(track_file_name(3, 7, "Title"), "3 - Title.mp3");
        assert_eq!(track_file_name(7, 125, "Title"), "007 - Title.mp3");
        assert_eq!(track_file_name(10, 12, "Part 1/2"), "10 - Part 1∕2.mp3");
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("What? Why: *now*"), "What？ Why_ ✱now✱");
        assert_eq!(sanitize_filename("  ...  "), "file");
        assert_eq!(sanitize_filename("Book."), "Book");
    }

    #[test]
    fn test_sanitize_dir_name_cannot_escape() {
        assert_eq!(sanitize_dir_name("../etc"), "∕etc");
        assert_eq!(sanitize_dir_name(".."), "folder");
        assert_eq!(sanitize_dir_name("AC/DC"), "AC∕DC");
        assert!(!sanitize_dir_name("a\\b/c").contains('/'));
    }

    #[test]
    fn test_truncate_component_respects_char_boundary() {
        let text = "ééééé"; // 10 bytes
        let truncated = truncate_component(text, 5);
        assert_eq!(truncated, "éé");
        assert_eq!(truncate_component("short", 255), "short");
    }

    #[test]
    fn test_normalize_path() {
        let cwd = std::env::current_dir().unwrap();
        assert_eq!(
            normalize_path(Path::new("books/./a/../b.aax")).unwrap(),
            normalize_path(&cwd.join("books/b.aax")).unwrap()
        );
        assert_eq!(
            normalize_path(Path::new("/srv/in/../in/./x.aax")).unwrap(),
            PathBuf::from("/srv/in/x.aax")
        );
    }

    #[test]
    fn test_short_label() {
        assert_eq!(short_label(Path::new("/in/abc.aax")), "abc.aax");
        assert_eq!(
            short_label(Path::new("/in/TheLongBookName.aax")),
            "TheLongBoo..."
        );
    }
}
