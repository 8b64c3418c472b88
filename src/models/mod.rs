//! The closed set of Whisper model ids and the alias table that normalizes
//! user-facing spellings onto it.
//!
//! Used by both `/v1/models` enumeration and the provisioner/admission path,
//! per the spec's note that both must share one closed set rather than
//! drifting apart.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A canonical Whisper model id, drawn from the closed upstream set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelId {
    WhisperTiny,
    WhisperTinyEn,
    WhisperBase,
    WhisperBaseEn,
    WhisperSmall,
    WhisperSmallEn,
    WhisperMedium,
    WhisperMediumEn,
    WhisperLargeV1,
    WhisperLargeV2,
    WhisperLargeV3,
}

/// The full closed set, in enumeration order for `/v1/models`.
pub const ALL_MODEL_IDS: &[ModelId] = &[
    ModelId::WhisperTiny,
    ModelId::WhisperTinyEn,
    ModelId::WhisperBase,
    ModelId::WhisperBaseEn,
    ModelId::WhisperSmall,
    ModelId::WhisperSmallEn,
    ModelId::WhisperMedium,
    ModelId::WhisperMediumEn,
    ModelId::WhisperLargeV1,
    ModelId::WhisperLargeV2,
    ModelId::WhisperLargeV3,
];

impl ModelId {
    /// The canonical string form, also the model file's base name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::WhisperTiny => "whisper-tiny",
            Self::WhisperTinyEn => "whisper-tiny.en",
            Self::WhisperBase => "whisper-base",
            Self::WhisperBaseEn => "whisper-base.en",
            Self::WhisperSmall => "whisper-small",
            Self::WhisperSmallEn => "whisper-small.en",
            Self::WhisperMedium => "whisper-medium",
            Self::WhisperMediumEn => "whisper-medium.en",
            Self::WhisperLargeV1 => "whisper-large-v1",
            Self::WhisperLargeV2 => "whisper-large-v2",
            Self::WhisperLargeV3 => "whisper-large-v3",
        }
    }

    /// The upstream GGML file name in `ggerganov/whisper.cpp`'s HuggingFace repo.
    pub fn upstream_filename(self) -> &'static str {
        match self {
            Self::WhisperTiny => "ggml-tiny.bin",
            Self::WhisperTinyEn => "ggml-tiny.en.bin",
            Self::WhisperBase => "ggml-base.bin",
            Self::WhisperBaseEn => "ggml-base.en.bin",
            Self::WhisperSmall => "ggml-small.bin",
            Self::WhisperSmallEn => "ggml-small.en.bin",
            Self::WhisperMedium => "ggml-medium.bin",
            Self::WhisperMediumEn => "ggml-medium.en.bin",
            Self::WhisperLargeV1 => "ggml-large-v1.bin",
            Self::WhisperLargeV2 => "ggml-large-v2.bin",
            Self::WhisperLargeV3 => "ggml-large-v3.bin",
        }
    }

    /// Normalize a user-supplied id or alias, rejecting anything outside the
    /// closed set. Matching is case-insensitive.
    pub fn normalize(raw: &str) -> Option<ModelId> {
        let lower = raw.trim().to_lowercase();
        let canonical = match lower.as_str() {
            "whisper-tiny" | "tiny" => Self::WhisperTiny,
            "whisper-tiny.en" | "tiny.en" | "tiny-en" => Self::WhisperTinyEn,
            "whisper-base" | "base" => Self::WhisperBase,
            "whisper-base.en" | "base.en" | "base-en" => Self::WhisperBaseEn,
            "whisper-small" | "small" => Self::WhisperSmall,
            "whisper-small.en" | "small.en" | "small-en" => Self::WhisperSmallEn,
            "whisper-medium" | "medium" => Self::WhisperMedium,
            "whisper-medium.en" | "medium.en" | "medium-en" => Self::WhisperMediumEn,
            "whisper-large-v1" | "large-v1" | "large" => Self::WhisperLargeV1,
            "whisper-large-v2" | "large-v2" => Self::WhisperLargeV2,
            "whisper-large-v3" | "large-v3" | "whisper-v3" => Self::WhisperLargeV3,
            _ => return None,
        };
        Some(canonical)
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_known_aliases() {
        assert_eq!(ModelId::normalize("base"), Some(ModelId::WhisperBase));
        assert_eq!(ModelId::normalize("TINY"), Some(ModelId::WhisperTiny));
        assert_eq!(ModelId::normalize("whisper-v3"), Some(ModelId::WhisperLargeV3));
        assert_eq!(ModelId::normalize("  whisper-base  "), Some(ModelId::WhisperBase));
    }

    #[test]
    fn rejects_unknown_ids() {
        assert_eq!(ModelId::normalize("whisper-xxl"), None);
        assert_eq!(ModelId::normalize(""), None);
    }

    #[test]
    fn every_id_round_trips_through_its_own_string_form() {
        for id in ALL_MODEL_IDS {
            assert_eq!(ModelId::normalize(id.as_str()), Some(*id));
        }
    }
}
