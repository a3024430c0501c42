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


//! Activation bytes resolution
//!
//! Candidates come from the explicit value if one was given, otherwise from
//! the auth file. They are probed in order and probing stops at the first
//! success:
//! - checksum mismatch → try the next candidate
//! - FFmpeg missing → abort immediately
//! - anything else → abort, the file is broken regardless of the key

use std::path::Path;

use crate::audio::engine::MediaEngine;
use crate::audio::metadata::ProbeOutput;
use crate::crypto::activation::{parse_candidates, ActivationKey};
use crate::crypto::auth::AuthFile;
use crate::error::{ChapterizeError, Result};

/// Successful probe together with the key that unlocked it
#[derive(Debug)]
pub struct ResolvedKey {
    pub key: ActivationKey,
    pub probe: ProbeOutput,
    /// Number of probe invocations it took, including the successful one
    pub attempts: usize,
}

/// Produces and tests activation bytes candidates
#[derive(Debug, Clone)]
pub struct KeyResolver {
    explicit: Option<String>,
    auth_file: AuthFile,
}

impl KeyResolver {
    pub fn new(explicit: Option<String>, auth_file: AuthFile) -> Self {
        Self {
            explicit,
            auth_file,
        }
    }

    /// Ordered candidate list
    ///
    /// # Errors
    /// - ActivationBytesNotFound when neither source yields a candidate
    pub fn candidates(&self) -> Result<Vec<ActivationKey>> {
        if let Some(explicit) = &self.explicit {
            let keys = parse_candidates(explicit);
            if !keys.is_empty() {
                return Ok(keys);
            }
        }

        if let Some(cached) = self.auth_file.read_activation_bytes()? {
            let keys = parse_candidates(&cached);
            if !keys.is_empty() {
                return Ok(keys);
            }
        }

        Err(ChapterizeError::ActivationBytesNotFound(format!(
            "no explicit value and nothing usable in {}",
            self.auth_file.path().display()
        )))
    }

    /// Find the candidate that decrypts `input`
    pub async fn resolve(&self, engine: &dyn MediaEngine, input: &Path) -> Result<ResolvedKey> {
        let candidates = self.candidates()?;
        probe_candidates(engine, input, &candidates).await
    }
}

/// Probe `input` with each candidate in turn
pub async fn probe_candidates(
    engine: &dyn MediaEngine,
    input: &Path,
    candidates: &[ActivationKey],
) -> Result<ResolvedKey> {
    let mut last_error = None;

    for (index, key) in candidates.iter().enumerate() {
        let attempts = index + 1;
        tracing::debug!(file = %input.display(), key = %key, attempt = attempts, "probing with activation bytes");

        match engine.probe(input, Some(key)).await {
            Ok(probe) => {
                return Ok(ResolvedKey {
                    key: key.clone(),
                    probe,
                    attempts,
                })
            }
            Err(e) if e.is_key_mismatch() => {
                tracing::debug!(file = %input.display(), key = %key, "activation bytes rejected");
                last_error = Some(e);
            }
            Err(e) => return Err(e),
        }
    }

    match last_error {
        Some(last_error) => Err(ChapterizeError::KeyResolutionFailed {
            file: input.to_path_buf(),
            attempts: candidates.len(),
            last_error: Box::new(last_error),
        }),
        None => Err(ChapterizeError::ActivationBytesNotFound(format!(
            "no candidates to try for {}",
            input.display()
        ))),
    }
}
