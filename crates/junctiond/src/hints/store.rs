//! File-backed hint mailbox.
//!
//! Every junction owns one record, `<hints_dir>/junction-<id>`. Neighbours
//! read it, only the owner writes it. Writes go to a hidden temporary file in
//! the same directory and are renamed over the record, so a reader sees the
//! previous hint or the new one, never a torn write.

use junction_common::constants::junction_name;
use junction_common::{JunctionError, JunctionId};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Hint area shared by every junction on this host
#[derive(Debug, Clone)]
pub struct HintStore {
    dir: PathBuf,
}

impl HintStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of a junction's record
    pub fn record_path(&self, id: JunctionId) -> PathBuf {
        self.dir.join(junction_name(id))
    }

    /// Read a junction's current hint
    ///
    /// Returns `Ok(None)` when the junction has never published. A record
    /// that is not valid UTF-8 is a [`JunctionError::MalformedHint`].
    pub async fn read(&self, id: JunctionId) -> Result<Option<String>, JunctionError> {
        let path = self.record_path(id);
        match tokio::fs::read_to_string(&path).await {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) if e.kind() == ErrorKind::InvalidData => Err(JunctionError::MalformedHint {
                junction: id,
                reason: "record is not valid UTF-8".to_string(),
            }),
            Err(e) => Err(JunctionError::HintIo {
                record: path.display().to_string(),
                source: e,
            }),
        }
    }

    /// Replace a junction's record with `message`
    ///
    /// With `provision` set the hint area is created first. Without it, a
    /// missing area yields [`JunctionError::StoreUnavailable`] and nothing is
    /// written.
    pub async fn publish(
        &self,
        id: JunctionId,
        message: &str,
        provision: bool,
    ) -> Result<(), JunctionError> {
        if provision {
            tokio::fs::create_dir_all(&self.dir)
                .await
                .map_err(|e| JunctionError::HintIo {
                    record: self.dir.display().to_string(),
                    source: e,
                })?;
        }

        let record = self.record_path(id);
        let staging = self.dir.join(format!(".{}.tmp", junction_name(id)));

        if let Err(e) = tokio::fs::write(&staging, message).await {
            return Err(self.write_error(&staging, e));
        }

        if let Err(e) = tokio::fs::rename(&staging, &record).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(self.write_error(&record, e));
        }

        tracing::trace!(record = %record.display(), message = message, "Hint published");

        Ok(())
    }

    fn write_error(&self, path: &Path, e: std::io::Error) -> JunctionError {
        if e.kind() == ErrorKind::NotFound {
            JunctionError::StoreUnavailable(self.dir.display().to_string())
        } else {
            JunctionError::HintIo {
                record: path.display().to_string(),
                source: e,
            }
        }
    }
}
