//! Offset checkpoint persistence
//!
//! The only state the pipeline persists is a resume offset, written after
//! each fully completed batch and cleared when a run finishes. Stale
//! checkpoints are ignored on load so an abandoned run does not silently
//! skip a fresh export.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::error::{LabelerError, Result};

/// Checkpoints older than this are ignored on load.
const STALE_AFTER_HOURS: i64 = 24;

const CHECKPOINT_FILE: &str = "checkpoint.json";

/// A resume point: the record offset after the last fully completed batch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Checkpoint {
    /// Index of the last completed batch
    pub batch_index: u64,
    /// Batch size the offset was computed with
    pub batch_size: usize,
    /// Source-record offset to resume from
    pub offset: u64,
    /// When this checkpoint was written
    pub saved_at: DateTime<Utc>,
}

impl Checkpoint {
    pub fn new(batch_index: u64, batch_size: usize, offset: u64) -> Self {
        Self {
            batch_index,
            batch_size,
            offset,
            saved_at: Utc::now(),
        }
    }

    fn is_stale(&self, now: DateTime<Utc>) -> bool {
        now - self.saved_at > Duration::hours(STALE_AFTER_HOURS)
    }
}

/// File-backed checkpoint store
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    /// Create a store rooted at `state_dir`, creating the directory if needed.
    pub fn new(state_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(state_dir)
            .map_err(|e| LabelerError::Checkpoint(format!("creating {}: {e}", state_dir.display())))?;
        Ok(Self {
            path: state_dir.join(CHECKPOINT_FILE),
        })
    }

    /// Persist a checkpoint, replacing any previous one.
    pub fn save(&self, checkpoint: &Checkpoint) -> Result<()> {
        let json = serde_json::to_string_pretty(checkpoint)
            .map_err(|e| LabelerError::Checkpoint(e.to_string()))?;
        std::fs::write(&self.path, json)
            .map_err(|e| LabelerError::Checkpoint(format!("writing {}: {e}", self.path.display())))?;
        Ok(())
    }

    /// Load the checkpoint if one exists and is fresh enough to trust.
    ///
    /// An unreadable or stale checkpoint is reported and treated as absent.
    pub fn load(&self) -> Option<Checkpoint> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(_) => return None,
        };

        let checkpoint: Checkpoint = match serde_json::from_str(&raw) {
            Ok(cp) => cp,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to parse checkpoint, starting fresh");
                return None;
            }
        };

        if checkpoint.is_stale(Utc::now()) {
            info!(
                saved_at = %checkpoint.saved_at,
                "Checkpoint is older than {STALE_AFTER_HOURS} hours, starting fresh"
            );
            return None;
        }

        Some(checkpoint)
    }

    /// Remove the checkpoint file after successful completion.
    pub fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(LabelerError::Checkpoint(format!(
                "removing {}: {e}",
                self.path.display()
            ))),
        }
    }
}
