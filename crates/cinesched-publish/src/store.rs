//! Artifact storage: atomic publish and read-back.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset};
use cinesched_core::{Schedule, ValidationReport};
use tempfile::NamedTempFile;
use tracing::instrument;

use crate::artifact::{Artifact, LoadedArtifact};
use crate::error::PublishError;

/// Report file written beside the artifact.
const REPORT_FILE: &str = "report.json";

/// Where the schedule artifact lives.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    path: PathBuf,
}

/// What a successful publish wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReceipt {
    /// Artifact path.
    pub path: PathBuf,
    /// `generatedAt` stamped into the artifact.
    pub generated_at: DateTime<FixedOffset>,
    /// Showings published.
    pub showings: usize,
    /// Artifact size in bytes.
    pub bytes: usize,
    /// Whether `report.json` was written too.
    pub report_written: bool,
}

impl ArtifactStore {
    /// Creates a store for the artifact at `path`.
    #[must_use]
    pub const fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Artifact path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the validation report beside the artifact.
    #[must_use]
    pub fn report_path(&self) -> PathBuf {
        self.path.with_file_name(REPORT_FILE)
    }

    /// Loads the currently published artifact, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_current(&self) -> Result<Option<LoadedArtifact>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read {}", self.path.display()))?;
        let raw_result: std::result::Result<LoadedArtifact, _> = serde_json::from_str(&content);
        let loaded =
            raw_result.with_context(|| format!("failed to parse {}", self.path.display()))?;
        Ok(Some(loaded))
    }

    /// Publishes `schedule`, replacing the current artifact atomically.
    ///
    /// The report is written afterwards on a best-effort basis: a report
    /// failure is logged and does not undo the publish.
    ///
    /// # Errors
    ///
    /// Returns `PublishError` if the schedule is empty or the artifact cannot
    /// be serialized or written. The previous artifact is untouched.
    #[instrument(skip_all, fields(path = %self.path.display()))]
    pub fn publish(
        &self,
        schedule: &Schedule,
        report: &ValidationReport,
    ) -> Result<PublishReceipt, PublishError> {
        if schedule.showings.is_empty() {
            return Err(PublishError::EmptySchedule);
        }

        let artifact = Artifact::new(schedule);
        let bytes = serde_json::to_vec_pretty(&artifact)?;
        write_atomically(&self.path, &bytes)?;

        tracing::info!(
            showings = schedule.showings.len(),
            bytes = bytes.len(),
            generated_at = %artifact.generated_at,
            "Artifact published"
        );

        let report_path = self.report_path();
        let report_written = match serde_json::to_vec_pretty(report)
            .map_err(PublishError::from)
            .and_then(|b| write_atomically(&report_path, &b))
        {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    path = %report_path.display(),
                    error = %e,
                    "Failed to write validation report"
                );
                false
            }
        };

        Ok(PublishReceipt {
            path: self.path.clone(),
            generated_at: artifact.generated_at,
            showings: schedule.showings.len(),
            bytes: bytes.len(),
            report_written,
        })
    }
}

/// Writes `bytes` to a temp file beside `path`, syncs it, renames it over
/// `path` and syncs the directory so the rename survives a crash. On a
/// failure before the rename the temp file is removed and `path` is
/// unchanged.
fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), PublishError> {
    let write_err = |source| PublishError::Write {
        path: path.to_path_buf(),
        source,
    };

    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).map_err(write_err)?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(bytes).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    sync_dir(dir).map_err(write_err)?;

    Ok(())
}

/// Flushes directory entries (renames) in `dir` to disk.
fn sync_dir(dir: &Path) -> std::io::Result<()> {
    fs::File::open(dir)?.sync_all()
}
