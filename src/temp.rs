//! Scratch-file hygiene.
//!
//! Every request owns a unique path under a process-scoped temp dir. A
//! `ScratchFile` unlinks its path on drop, so cleanup happens on every exit
//! path — success, error, timeout, cancellation, or panic unwind — without
//! each call site having to remember to do it.

use std::path::{Path, PathBuf};

/// The process-scoped scratch directory, `$TMPDIR/whisperapi`.
pub fn scratch_dir() -> PathBuf {
    std::env::temp_dir().join("whisperapi")
}

pub async fn ensure_scratch_dir() -> std::io::Result<PathBuf> {
    let dir = scratch_dir();
    tokio::fs::create_dir_all(&dir).await?;
    Ok(dir)
}

/// A scratch file path that deletes itself when dropped.
///
/// Holding this for the lifetime of a `TranscriptionJob` is what makes the
/// temp-file hygiene invariant (`SPEC_FULL.md` §8) structural rather than
/// something every handler has to remember.
#[derive(Debug)]
pub struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    /// Allocate a new scratch path with the given extension, without
    /// creating the file yet.
    pub fn new_path(extension: &str) -> Self {
        let dir = scratch_dir();
        let name = format!("{}.{}", uuid::Uuid::new_v4(), extension);
        Self { path: dir.join(name) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        if self.path.exists() {
            if let Err(err) = std::fs::remove_file(&self.path) {
                tracing::debug!(path = %self.path.display(), error = %err, "failed to remove scratch file");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drop_removes_the_file() {
        std::fs::create_dir_all(scratch_dir()).unwrap();
        let scratch = ScratchFile::new_path("wav");
        std::fs::write(scratch.path(), b"hello").unwrap();
        let path = scratch.path().to_path_buf();
        assert!(path.exists());
        drop(scratch);
        assert!(!path.exists());
    }

    #[test]
    fn drop_on_never_created_file_is_a_no_op() {
        let scratch = ScratchFile::new_path("wav");
        drop(scratch);
    }
}
