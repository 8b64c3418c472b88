//! The explicit application context passed to every handler via
//! `axum::extract::State`. No ambient/thread-local state is used elsewhere.

use std::sync::Arc;
use std::time::Duration;

use crate::admission::AdmissionController;
use crate::config::EffectiveConfig;
use crate::engine::{EngineError, EngineHandle};
use crate::models::ModelId;
use crate::provisioner::{ModelProvisioner, ProvisionError};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<EffectiveConfig>,
    pub admission: AdmissionController,
    pub provisioner: ModelProvisioner,
    pub engine: EngineHandle,
    pub http_client: reqwest::Client,
    pub version: &'static str,
}

impl AppState {
    pub fn new(config: EffectiveConfig, models_dir: std::path::PathBuf) -> Self {
        let admission = AdmissionController::new(
            config.max_concurrent,
            Duration::from_secs(config.queue_wait_sec),
        );
        let provisioner = ModelProvisioner::new(models_dir);
        Self {
            config: Arc::new(config),
            admission,
            provisioner,
            engine: EngineHandle::default(),
            http_client: reqwest::Client::new(),
            version: env!("CARGO_PKG_VERSION"),
        }
    }

    pub fn request_deadline(&self) -> Duration {
        Duration::from_secs(self.config.request_timeout_sec)
    }

    /// Provision and load the configured model eagerly, so the first client
    /// doesn't pay download/load latency inside its own request deadline.
    /// `provisioner`/`engine` are `Arc`-backed and cloned into `self`, so the
    /// work done here is visible to every handler that later sees this state.
    pub async fn provision_at_startup(&self) -> Result<(), StartupError> {
        let model_id = ModelId::normalize(&self.config.model_id)
            .ok_or_else(|| StartupError::InvalidModelId(self.config.model_id.clone()))?;
        let model_path = self.provisioner.ensure(model_id).await?;
        self.engine.ensure_loaded(model_path, self.config.device).await?;
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("configured model id is invalid: {0}")]
    InvalidModelId(String),
    #[error(transparent)]
    Provision(#[from] ProvisionError),
    #[error(transparent)]
    Engine(#[from] EngineError),
}
