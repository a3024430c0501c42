//! Shared helpers for integration tests
//!
//! `FakeEngine` stands in for FFmpeg: it answers probes from a scripted
//! chapter list, rejects every activation key except the configured one and
//! writes empty files where FFmpeg would write real ones.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chapterize::audio::{ChapterExport, MediaEngine, ProbeChapter, ProbeFormat, ProbeOutput};
use chapterize::crypto::ActivationKey;
use chapterize::{ChapterizeError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Probe { input: PathBuf, key: Option<String> },
    Cover { output: PathBuf },
    Chapter { output: PathBuf, track: usize },
}

pub struct FakeEngine {
    pub valid_key: Option<String>,
    pub chapter_titles: Vec<String>,
    pub author: String,
    pub title: String,
    pub missing: bool,
    pub fail_cover: bool,
    /// Passes the startup check, then disappears once chapter export begins
    pub vanishes_on_export: bool,
    /// Time each chapter export takes
    pub chapter_delay: Option<Duration>,
    calls: Mutex<Vec<Call>>,
}

impl FakeEngine {
    /// Engine that only accepts `valid_key` (any key when `None`) and
    /// reports `chapters` chapters named `Part N`
    pub fn new(valid_key: Option<&str>, chapters: usize) -> Self {
        Self {
            valid_key: valid_key.map(str::to_string),
            chapter_titles: (1..=chapters).map(|i| format!("Part {}", i)).collect(),
            author: "Jane Doe".to_string(),
            title: "A Book".to_string(),
            missing: false,
            fail_cover: false,
            vanishes_on_export: false,
            chapter_delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_titles(mut self, titles: &[&str]) -> Self {
        self.chapter_titles = titles.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn missing() -> Self {
        Self {
            missing: true,
            ..Self::new(None, 0)
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn probe_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Probe { .. }))
            .count()
    }

    pub fn chapter_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Chapter { .. }))
            .count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn check_key(&self, input: &Path, key: Option<&ActivationKey>) -> Result<()> {
        match (&self.valid_key, key) {
            (None, _) => Ok(()),
            (Some(valid), Some(key)) if key.expose() == valid => Ok(()),
            _ => Err(ChapterizeError::ActivationBytesMismatch(input.to_path_buf())),
        }
    }
}

#[async_trait]
impl MediaEngine for FakeEngine {
    async fn check_available(&self) -> Result<()> {
        if self.missing {
            return Err(ChapterizeError::FfmpegNotFound);
        }
        Ok(())
    }

    async fn probe(&self, input: &Path, key: Option<&ActivationKey>) -> Result<ProbeOutput> {
        self.record(Call::Probe {
            input: input.to_path_buf(),
            key: key.map(|k| k.expose().to_string()),
        });
        if self.missing {
            return Err(ChapterizeError::FfmpegNotFound);
        }
        self.check_key(input, key)?;

        let mut tags = HashMap::new();
        tags.insert("artist".to_string(), self.author.clone());
        tags.insert("title".to_string(), self.title.clone());

        let chapters = self
            .chapter_titles
            .iter()
            .enumerate()
            .map(|(i, title)| {
                let mut tags = HashMap::new();
                tags.insert("title".to_string(), title.clone());
                ProbeChapter {
                    start_time: format!("{}.000000", i * 60),
                    end_time: format!("{}.000000", (i + 1) * 60),
                    tags: Some(tags),
                }
            })
            .collect();

        Ok(ProbeOutput {
            format: ProbeFormat { tags: Some(tags) },
            chapters: Some(chapters),
        })
    }

    async fn extract_cover(
        &self,
        input: &Path,
        key: Option<&ActivationKey>,
        output: &Path,
    ) -> Result<()> {
        self.record(Call::Cover {
            output: output.to_path_buf(),
        });
        self.check_key(input, key)?;
        if self.fail_cover {
            return Err(ChapterizeError::ffmpeg("ffmpeg", "no cover stream"));
        }
        std::fs::write(output, b"")?;
        Ok(())
    }

    async fn export_chapter(
        &self,
        input: &Path,
        key: Option<&ActivationKey>,
        export: &ChapterExport,
    ) -> Result<()> {
        self.record(Call::Chapter {
            output: export.output.clone(),
            track: export.track,
        });
        if self.vanishes_on_export {
            return Err(ChapterizeError::FfmpegNotFound);
        }
        self.check_key(input, key)?;
        if let Some(delay) = self.chapter_delay {
            tokio::time::sleep(delay).await;
        }
        std::fs::write(&export.output, b"")?;
        Ok(())
    }
}

/// Write a placeholder input file
pub fn touch(path: &Path) -> PathBuf {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, b"not really audio").unwrap();
    path.to_path_buf()
}
