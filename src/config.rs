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


//! Environment-backed settings
//!
//! Every command-line flag has an environment variable supplying its default.
//! Command-line values win over the environment, which wins over the built-in
//! defaults below.
//!
//! # Variables
//! | Variable          | Type   | Default |
//! |-------------------|--------|---------|
//! | `OUTPUT_DIR`      | string | `""` (current directory) |
//! | `INPUT_DIR`       | string | unset |
//! | `USE_AUTHOR_DIR`  | bool   | `true` |
//! | `USE_TITLE_DIR`   | bool   | `true` |
//! | `ACTIVATION_BYTES`| string | `""` |
//! | `THREADS`         | int    | `1` |
//! | `INTERVAL`        | int    | `5` (seconds) |
//! | `VERBOSITY`       | int    | `0` |

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{ChapterizeError, Result};

pub const OUTPUT_DIR: &str = "OUTPUT_DIR";
pub const INPUT_DIR: &str = "INPUT_DIR";
pub const USE_AUTHOR_DIR: &str = "USE_AUTHOR_DIR";
pub const USE_TITLE_DIR: &str = "USE_TITLE_DIR";
pub const ACTIVATION_BYTES: &str = "ACTIVATION_BYTES";
pub const THREADS: &str = "THREADS";
pub const INTERVAL: &str = "INTERVAL";
pub const VERBOSITY: &str = "VERBOSITY";

const TRUE_VALUES: &[&str] = &["true", "1", "t", "yes", "y"];
const FALSE_VALUES: &[&str] = &["false", "0", "f", "no", "n"];

/// Cast a raw variable value to a boolean
///
/// Accepts `true/1/t/yes/y` and `false/0/f/no/n`, trimmed and
/// case-insensitive.
pub fn cast_bool(name: &str, value: &str) -> Result<bool> {
    let normalized = value.trim().to_lowercase();
    if TRUE_VALUES.contains(&normalized.as_str()) {
        Ok(true)
    } else if FALSE_VALUES.contains(&normalized.as_str()) {
        Ok(false)
    } else {
        Err(ChapterizeError::invalid_env(name, value, "a boolean"))
    }
}

/// Cast a raw variable value to an integer type
pub fn cast_int<T: FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| ChapterizeError::invalid_env(name, value, "a number"))
}

/// Source of raw variable values
///
/// `Settings::from_env` reads the process environment; tests pass a map.
pub trait VarSource {
    fn var(&self, name: &str) -> Option<String>;
}

/// The process environment
pub struct ProcessEnv;

impl VarSource for ProcessEnv {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

impl<F> VarSource for F
where
    F: Fn(&str) -> Option<String>,
{
    fn var(&self, name: &str) -> Option<String> {
        self(name)
    }
}

/// Settings resolved from the environment, before command-line overrides
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub output_dir: PathBuf,
    pub input_dir: Option<PathBuf>,
    pub use_author_dir: bool,
    pub use_title_dir: bool,
    pub activation_bytes: Option<String>,
    pub threads: usize,
    pub interval: Duration,
    pub verbosity: u8,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            input_dir: None,
            use_author_dir: true,
            use_title_dir: true,
            activation_bytes: None,
            threads: 1,
            interval: Duration::from_secs(5),
            verbosity: 0,
        }
    }
}

impl Settings {
    /// Resolve settings from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_source(&ProcessEnv)
    }

    /// Resolve settings from any variable source
    pub fn from_source<S: VarSource + ?Sized>(source: &S) -> Result<Self> {
        let defaults = Settings::default();

        let output_dir = match non_empty(source.var(OUTPUT_DIR)) {
            Some(dir) => PathBuf::from(dir),
            None => defaults.output_dir,
        };
        let input_dir = non_empty(source.var(INPUT_DIR)).map(PathBuf::from);

        let use_author_dir = match non_empty(source.var(USE_AUTHOR_DIR)) {
            Some(v) => cast_bool(USE_AUTHOR_DIR, &v)?,
            None => defaults.use_author_dir,
        };
        let use_title_dir = match non_empty(source.var(USE_TITLE_DIR)) {
            Some(v) => cast_bool(USE_TITLE_DIR, &v)?,
            None => defaults.use_title_dir,
        };

        let activation_bytes = non_empty(source.var(ACTIVATION_BYTES));

        let threads = match non_empty(source.var(THREADS)) {
            Some(v) => cast_int::<usize>(THREADS, &v)?,
            None => defaults.threads,
        };
        if threads == 0 {
            return Err(ChapterizeError::invalid_env(THREADS, "0", "a positive number"));
        }

        let interval = match non_empty(source.var(INTERVAL)) {
            Some(v) => Duration::from_secs(cast_int::<u64>(INTERVAL, &v)?),
            None => defaults.interval,
        };

        let verbosity = match non_empty(source.var(VERBOSITY)) {
            Some(v) => cast_int::<u8>(VERBOSITY, &v)?,
            None => defaults.verbosity,
        };

        Ok(Self {
            output_dir,
            input_dir,
            use_author_dir,
            use_title_dir,
            activation_bytes,
            threads,
            interval,
            verbosity,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
