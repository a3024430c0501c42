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


//! Activation bytes candidates
//!
//! # What are Activation Bytes?
//! - 4-byte key derived from Audible account credentials
//! - Used to decrypt AAX files (AES encryption)
//! - Usually written as 8 hex characters (e.g., "1CEB00DA")
//!
//! Values are not validated syntactically here. Whether a candidate is
//! correct is only known after the engine has tried it against a file.
//!
//! # Storage
//! - Never log or expose in plaintext; `Display` and `Debug` are masked

use std::fmt;

/// One activation bytes candidate
///
/// `Display` and `Debug` print a masked form such as `1C****DA`. Use
/// [`ActivationKey::expose`] only when handing the value to the engine.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ActivationKey(String);

impl ActivationKey {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw value, for the engine command line
    pub fn expose(&self) -> &str {
        &self.0
    }

    fn masked(&self) -> String {
        let chars: Vec<char> = self.0.chars().collect();
        if chars.len() < 6 {
            return "*".repeat(chars.len().max(4));
        }
        let head: String = chars[..2].iter().collect();
        let tail: String = chars[chars.len() - 2..].iter().collect();
        format!("{}{}{}", head, "*".repeat(chars.len() - 4), tail)
    }
}

impl fmt::Display for ActivationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.masked())
    }
}

impl fmt::Debug for ActivationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ActivationKey").field(&self.masked()).finish()
    }
}

/// Split a comma separated list into candidates, in order
///
/// Entries are trimmed; empty entries are dropped.
pub fn parse_candidates(raw: &str) -> Vec<ActivationKey> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ActivationKey::new)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_candidates_keeps_order() {
        let keys = parse_candidates(" bad1, bad2 ,,good ");
        let raw: Vec<&str> = keys.iter().map(|k| k.expose()).collect();
        assert_eq!(raw, vec!["bad1", "bad2", "good"]);
    }

    #[test]
    fn test_parse_candidates_empty() {
        assert!(parse_candidates("").is_empty());
        assert!(parse_candidates(" , ").is_empty());
    }

    #[test]
    fn test_display_is_masked() {
        let key = ActivationKey::new("1CEB00DA");
        assert_eq!(key.to_string(), "1C****DA");
        assert!(!format!("{:?}", key).contains("1CEB00DA"));
        assert_eq!(ActivationKey::new("abc").to_string(), "****");
    }
}
