//! Transcriber Engine Adapter (C3).
//!
//! Holds at most one loaded engine instance per process, lazily initialized
//! and serialized behind a `OnceCell` (first caller loads, everyone else
//! reads the cached factory). Each request still gets its own transcription
//! run — the engine is read-only after load, not locked per call.
//!
//! The concrete acoustic model is an interchangeable collaborator behind
//! `TranscriptionEngine`: the production implementation wraps `whisper-rs`
//! (feature `whisper`); a deterministic stub backs the default build and the
//! test suite so the request pipeline is exercisable without a native
//! toolchain or a real GGML file.

#[cfg(feature = "whisper")]
mod whisper_engine;
#[cfg(not(feature = "whisper"))]
mod stub_engine;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::OnceCell;

use crate::config::Device;

/// One transcribed utterance span, in engine-native order.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSegment {
    pub start_sec: f64,
    pub end_sec: f64,
    pub text: String,
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("model file at {0} is missing or invalid")]
    ModelNotReady(PathBuf),
    #[error("transcription exceeded its deadline")]
    Timeout,
    #[error("engine failure: {0}")]
    Internal(String),
}

/// The narrow contract any acoustic-model backend must satisfy: load once
/// from a file, then transcribe 16 kHz mono f32 PCM into an ordered sequence
/// of segments.
pub trait TranscriptionEngine: Send + Sync {
    fn load(model_path: &Path, device: Device) -> Result<Self, EngineError>
    where
        Self: Sized;

    fn transcribe(&self, samples: &[f32], language: &str) -> Result<Vec<RawSegment>, EngineError>;
}

#[cfg(feature = "whisper")]
type ConcreteEngine = whisper_engine::WhisperEngine;
#[cfg(not(feature = "whisper"))]
type ConcreteEngine = stub_engine::StubEngine;

/// Owns the single, lazily-loaded engine instance for the process.
#[derive(Clone)]
pub struct EngineHandle {
    cell: Arc<OnceCell<Arc<ConcreteEngine>>>,
}

impl Default for EngineHandle {
    fn default() -> Self {
        Self { cell: Arc::new(OnceCell::new()) }
    }
}

impl EngineHandle {
    /// Return the cached engine, loading it from `model_path` on first call.
    /// Concurrent callers during the first load all await the same
    /// in-flight initialization (`OnceCell::get_or_try_init`'s guarantee).
    pub async fn ensure_loaded(
        &self,
        model_path: PathBuf,
        device: Device,
    ) -> Result<Arc<ConcreteEngine>, EngineError> {
        self.cell
            .get_or_try_init(|| async move {
                let path = model_path.clone();
                tokio::task::spawn_blocking(move || {
                    ConcreteEngine::load(&path, device).map(Arc::new)
                })
                .await
                .map_err(|e| EngineError::Internal(format!("loader task panicked: {e}")))?
            })
            .await
            .cloned()
    }

    /// Run one transcription under a deadline. The CPU-bound inference runs
    /// on a blocking thread so it never occupies the async dispatch pool.
    pub async fn transcribe_with_deadline(
        engine: Arc<ConcreteEngine>,
        samples: Vec<f32>,
        language: String,
        deadline: Duration,
    ) -> Result<Vec<RawSegment>, EngineError> {
        let task = tokio::task::spawn_blocking(move || engine.transcribe(&samples, &language));

        match tokio::time::timeout(deadline, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(EngineError::Internal(format!("engine task panicked: {join_err}"))),
            Err(_elapsed) => Err(EngineError::Timeout),
        }
    }
}

/// Assemble ordered segments (monotonically increasing `id`) and the
/// derived `text`/`duration` fields from raw engine output.
pub fn into_job_result(raw: Vec<RawSegment>) -> (String, f64, Vec<crate::http::response::Segment>) {
    let mut segments = Vec::with_capacity(raw.len());
    let mut text_parts = Vec::with_capacity(raw.len());
    for (id, seg) in raw.into_iter().enumerate() {
        text_parts.push(seg.text.trim().to_string());
        segments.push(crate::http::response::Segment {
            id: id as u64,
            start: seg.start_sec,
            end: seg.end_sec,
            text: seg.text,
        });
    }
    let duration = segments.last().map(|s| s.end).unwrap_or(0.0);
    let text = text_parts.join(" ").trim().to_string();
    (text, duration, segments)
}
