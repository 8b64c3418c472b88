//! Real acoustic-model backend, wrapping `whisper-rs` (FFI to whisper.cpp).
//!
//! Loads a GGML model and caches a `WhisperState` so repeated requests reuse
//! the ~200MB working buffer instead of reallocating it per call, mirroring
//! the caching strategy whisper.cpp-backed engines in this codebase's
//! lineage use. The state is guarded by a mutex since whisper.cpp's
//! inference call is not reentrant.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use super::{EngineError, RawSegment, TranscriptionEngine};
use crate::config::Device;

const MIN_VALID_MODEL_BYTES: u64 = 1024;

fn inference_threads() -> i32 {
    let cores = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4);
    (cores / 2).clamp(1, 8) as i32
}

struct WhisperInner {
    ctx: WhisperContext,
    cached_state: Option<whisper_rs::WhisperState>,
}

// SAFETY: access to `WhisperContext`/`WhisperState` is always serialized
// through the enclosing `Mutex`.
unsafe impl Send for WhisperInner {}
unsafe impl Sync for WhisperInner {}

pub struct WhisperEngine {
    inner: Mutex<WhisperInner>,
    n_threads: i32,
    model_path: PathBuf,
}

impl TranscriptionEngine for WhisperEngine {
    fn load(model_path: &Path, device: Device) -> Result<Self, EngineError> {
        let valid = std::fs::metadata(model_path)
            .map(|m| m.is_file() && m.len() >= MIN_VALID_MODEL_BYTES)
            .unwrap_or(false);
        if !valid {
            return Err(EngineError::ModelNotReady(model_path.to_path_buf()));
        }

        let mut ctx_params = WhisperContextParameters::default();
        ctx_params.use_gpu(!matches!(device, Device::Cpu));

        let ctx = WhisperContext::new_with_params(
            model_path.to_str().ok_or_else(|| {
                EngineError::Internal("model path is not valid UTF-8".to_string())
            })?,
            ctx_params,
        )
        .map_err(|e| EngineError::Internal(format!("failed to load whisper model: {e}")))?;

        let n_threads = inference_threads();
        tracing::info!(path = %model_path.display(), threads = n_threads, "whisper engine loaded");

        Ok(Self {
            inner: Mutex::new(WhisperInner { ctx, cached_state: None }),
            n_threads,
            model_path: model_path.to_path_buf(),
        })
    }

    fn transcribe(&self, samples: &[f32], language: &str) -> Result<Vec<RawSegment>, EngineError> {
        if samples.is_empty() {
            return Ok(Vec::new());
        }

        let mut guard = self
            .inner
            .lock()
            .map_err(|e| EngineError::Internal(format!("whisper context lock poisoned: {e}")))?;

        if guard.cached_state.is_none() {
            let state = guard
                .ctx
                .create_state()
                .map_err(|e| EngineError::Internal(format!("failed to create whisper state: {e}")))?;
            guard.cached_state = Some(state);
        }
        let state = guard.cached_state.as_mut().expect("just inserted above");

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        let lang = if language.eq_ignore_ascii_case("auto") { None } else { Some(language) };
        params.set_language(lang);
        params.set_n_threads(self.n_threads);
        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);
        params.set_suppress_non_speech_tokens(true);

        state
            .full(params, samples)
            .map_err(|e| EngineError::Internal(format!("whisper inference failed: {e}")))?;

        let num_segments = state
            .full_n_segments()
            .map_err(|e| EngineError::Internal(format!("failed to read segment count: {e}")))?;

        let mut segments = Vec::with_capacity(num_segments as usize);
        for i in 0..num_segments {
            let text = state
                .full_get_segment_text(i)
                .map_err(|e| EngineError::Internal(format!("failed to read segment text: {e}")))?;
            let t0 = state
                .full_get_segment_t0(i)
                .map_err(|e| EngineError::Internal(format!("failed to read segment start: {e}")))?;
            let t1 = state
                .full_get_segment_t1(i)
                .map_err(|e| EngineError::Internal(format!("failed to read segment end: {e}")))?;
            // whisper.cpp reports timestamps in centiseconds.
            segments.push(RawSegment {
                start_sec: t0 as f64 / 100.0,
                end_sec: t1 as f64 / 100.0,
                text,
            });
        }

        tracing::info!(model = %self.model_path.display(), segments = segments.len(), "whisper transcription complete");
        Ok(segments)
    }
}
