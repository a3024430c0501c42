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


//! File discovery and path utilities
//!
//! This module handles input discovery (watch scan, batch globs), output
//! naming, and path normalization.

pub mod paths;
pub mod scanner;

// Re-export commonly used types
pub use paths::{normalize_path, sanitize_dir_name, track_file_name};
pub use scanner::{expand_patterns, scan_candidates, CandidateFilter};
