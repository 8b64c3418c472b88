//! Deterministic stand-in for the real acoustic model, used whenever the
//! `whisper` feature is disabled. Mirrors the shape of a real engine closely
//! enough (load-from-file validation, one segment per ~2s of audio) that
//! the admission/ingress/normalize/response pipeline is fully exercisable
//! in CI without a GGML file or a C++ toolchain.

use std::path::{Path, PathBuf};

use super::{EngineError, RawSegment, TranscriptionEngine};
use crate::config::Device;

const MIN_VALID_MODEL_BYTES: u64 = 1024;
const SECONDS_PER_SYNTHETIC_SEGMENT: f64 = 2.0;

pub struct StubEngine {
    model_path: PathBuf,
}

impl TranscriptionEngine for StubEngine {
    fn load(model_path: &Path, _device: Device) -> Result<Self, EngineError> {
        let valid = std::fs::metadata(model_path)
            .map(|m| m.is_file() && m.len() >= MIN_VALID_MODEL_BYTES)
            .unwrap_or(false);
        if !valid {
            return Err(EngineError::ModelNotReady(model_path.to_path_buf()));
        }
        Ok(Self { model_path: model_path.to_path_buf() })
    }

    fn transcribe(&self, samples: &[f32], language: &str) -> Result<Vec<RawSegment>, EngineError> {
        tracing::debug!(model = %self.model_path.display(), "stub engine transcribing");
        if samples.is_empty() {
            return Ok(Vec::new());
        }

        let total_sec = samples.len() as f64 / 16_000.0;
        let mut segments = Vec::new();
        let mut start = 0.0;
        let mut index = 0usize;
        while start < total_sec {
            let end = (start + SECONDS_PER_SYNTHETIC_SEGMENT).min(total_sec);
            segments.push(RawSegment {
                start_sec: start,
                end_sec: end,
                text: format!("[stub transcript segment {index} language={language}]"),
            });
            start = end;
            index += 1;
        }
        Ok(segments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_missing_model_file() {
        let result = StubEngine::load(Path::new("/nonexistent/model.bin"), Device::Auto);
        assert!(matches!(result, Err(EngineError::ModelNotReady(_))));
    }

    #[test]
    fn segments_cover_the_whole_input_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let model_path = dir.path().join("model.bin");
        std::fs::write(&model_path, vec![0u8; 2048]).unwrap();
        let engine = StubEngine::load(&model_path, Device::Auto).unwrap();

        let samples = vec![0.0f32; 16_000 * 5];
        let segments = engine.transcribe(&samples, "auto").unwrap();
        assert!(segments.len() >= 2);
        assert_eq!(segments[0].start_sec, 0.0);
        assert_eq!(segments.last().unwrap().end_sec, 5.0);
        assert!(segments.windows(2).all(|w| w[0].end_sec <= w[1].start_sec));
    }
}
