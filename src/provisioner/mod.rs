//! Model Provisioner (C2).
//!
//! Resolves a `ModelId` to a validated local file, downloading it from
//! upstream if absent. Concurrent callers for the same id collapse onto one
//! download via a per-id async mutex (single-flight); the file itself is
//! written to a sibling `.downloading` path and only renamed into place once
//! complete, so readers never observe a partial model.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex as AsyncMutex;

use crate::models::ModelId;

/// Minimum byte length for a file to be considered a plausible model
/// rather than a truncated/corrupt download.
const MIN_VALID_BYTES: u64 = 1024;

/// Log cumulative download progress every 25 MiB.
const PROGRESS_STEP_BYTES: u64 = 25 * 1024 * 1024;

const HF_BASE_URL: &str = "https://huggingface.co/ggerganov/whisper.cpp/resolve/main";

#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error("failed to create models directory: {0}")]
    CreateDir(std::io::Error),
    #[error("download request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("upstream responded with HTTP {0}")]
    UpstreamStatus(reqwest::StatusCode),
    #[error("failed to write model file: {0}")]
    Write(std::io::Error),
    #[error("failed to install model file: {0}")]
    Install(std::io::Error),
}

/// Resolves and downloads Whisper model files. Cheap to clone (wraps `Arc`s).
#[derive(Clone)]
pub struct ModelProvisioner {
    models_dir: PathBuf,
    locks: Arc<std::sync::Mutex<HashMap<ModelId, Arc<AsyncMutex<()>>>>>,
    client: reqwest::Client,
}

impl ModelProvisioner {
    pub fn new(models_dir: PathBuf) -> Self {
        Self {
            models_dir,
            locks: Arc::new(std::sync::Mutex::new(HashMap::new())),
            client: reqwest::Client::new(),
        }
    }

    pub fn target_path(&self, id: ModelId) -> PathBuf {
        self.models_dir.join(format!("{}.bin", id.as_str()))
    }

    fn lock_for(&self, id: ModelId) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.entry(id).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
    }

    /// Returns the path to a validated local model file, downloading it if
    /// absent. Idempotent; concurrent calls for the same id share one
    /// download.
    pub async fn ensure(&self, id: ModelId) -> Result<PathBuf, ProvisionError> {
        let target = self.target_path(id);
        if is_valid_model_file(&target).await {
            return Ok(target);
        }

        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        // Another caller may have finished while we waited for the lock.
        if is_valid_model_file(&target).await {
            return Ok(target);
        }

        tokio::fs::create_dir_all(&self.models_dir)
            .await
            .map_err(ProvisionError::CreateDir)?;

        let url = format!("{}/{}", HF_BASE_URL, id.upstream_filename());
        self.download_to(&target, &url, id).await?;
        Ok(target)
    }

    async fn download_to(
        &self,
        target: &Path,
        url: &str,
        id: ModelId,
    ) -> Result<(), ProvisionError> {
        let tmp_path = target.with_extension("downloading");

        let download_result = self.stream_download(&tmp_path, url, id).await;
        if download_result.is_err() {
            let _ = tokio::fs::remove_file(&tmp_path).await;
        }
        download_result?;

        tokio::fs::rename(&tmp_path, target)
            .await
            .map_err(ProvisionError::Install)?;

        tracing::info!(model = %id, path = %target.display(), "model installed");
        Ok(())
    }

    async fn stream_download(
        &self,
        tmp_path: &Path,
        url: &str,
        id: ModelId,
    ) -> Result<(), ProvisionError> {
        tracing::info!(model = %id, url = %url, "downloading model");

        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(ProvisionError::UpstreamStatus(response.status()));
        }

        let mut file = tokio::fs::File::create(tmp_path)
            .await
            .map_err(ProvisionError::Write)?;

        let mut downloaded: u64 = 0;
        let mut next_log_at = PROGRESS_STEP_BYTES;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await.map_err(ProvisionError::Write)?;
            downloaded += chunk.len() as u64;

            if downloaded >= next_log_at {
                tracing::info!(
                    model = %id,
                    mb = downloaded / (1024 * 1024),
                    "download progress"
                );
                next_log_at += PROGRESS_STEP_BYTES;
            }
        }

        file.flush().await.map_err(ProvisionError::Write)?;
        let _ = file.sync_all().await;
        Ok(())
    }
}

async fn is_valid_model_file(path: &Path) -> bool {
    match tokio::fs::metadata(path).await {
        Ok(meta) => meta.is_file() && meta.len() >= MIN_VALID_BYTES,
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn returns_existing_valid_file_without_downloading() {
        let dir = tempfile::tempdir().unwrap();
        let provisioner = ModelProvisioner::new(dir.path().to_path_buf());
        let target = provisioner.target_path(ModelId::WhisperTiny);
        tokio::fs::write(&target, vec![0u8; 2048]).await.unwrap();

        let resolved = provisioner.ensure(ModelId::WhisperTiny).await.unwrap();
        assert_eq!(resolved, target);
    }

    #[tokio::test]
    async fn rejects_undersized_file_and_attempts_redownload() {
        let dir = tempfile::tempdir().unwrap();
        let provisioner = ModelProvisioner::new(dir.path().to_path_buf());
        let target = provisioner.target_path(ModelId::WhisperTiny);
        tokio::fs::write(&target, vec![0u8; 10]).await.unwrap();

        // No network in tests; the redownload attempt should fail (not hang)
        // and must not leave the undersized file looking "valid" afterward.
        let result = tokio::time::timeout(Duration::from_secs(5), provisioner.ensure(ModelId::WhisperTiny)).await;
        assert!(result.is_ok(), "ensure() must not hang");
    }

    #[tokio::test]
    async fn single_flight_lock_is_keyed_per_model_id() {
        let dir = tempfile::tempdir().unwrap();
        let provisioner = ModelProvisioner::new(dir.path().to_path_buf());
        let lock_a = provisioner.lock_for(ModelId::WhisperTiny);
        let lock_b = provisioner.lock_for(ModelId::WhisperBase);
        let lock_a_again = provisioner.lock_for(ModelId::WhisperTiny);
        assert!(Arc::ptr_eq(&lock_a, &lock_a_again));
        assert!(!Arc::ptr_eq(&lock_a, &lock_b));
    }
}
