//! Response Shaper (C7) — the JSON shapes returned to clients.

use serde::Serialize;

/// One transcribed utterance span in the success response.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Segment {
    pub id: u64,
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// The OpenAI-shaped transcription success body.
#[derive(Debug, Clone, Serialize)]
pub struct TranscriptionResponse {
    pub text: String,
    pub duration: f64,
    pub language: String,
    pub segments: Vec<Segment>,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub message: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub param: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub error: ErrorDetail,
}

impl ErrorEnvelope {
    pub fn new(message: impl Into<String>, kind: &'static str, code: Option<&'static str>) -> Self {
        Self {
            error: ErrorDetail { message: message.into(), kind, param: None, code },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct ModelEntry {
    pub id: String,
    pub object: &'static str,
    pub owned_by: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ModelsListResponse {
    pub object: &'static str,
    pub data: Vec<ModelEntry>,
}
