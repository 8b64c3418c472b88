//! Ingress Handlers (C6) for the three transcription request shapes, and
//! the shared tail (normalize → transcribe → shape) they all hand off to.

use std::path::PathBuf;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use base64::Engine;
use futures_util::StreamExt;
use serde::Deserialize;
use tokio::io::AsyncWriteExt;

use crate::audio;
use crate::http::error::AppError;
use crate::http::extract::{AppJson, AppMultipart};
use crate::http::response::TranscriptionResponse;
use crate::http::state::AppState;
use crate::models::ModelId;
use crate::temp::ScratchFile;

/// Shared optional fields carried by all three request shapes. `model` is
/// validated against the closed set before `run_job` is called but is not
/// itself runtime-switchable — the process serves one configured model.
struct RequestFields {
    filename: String,
    language: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Base64Request {
    pub audio: String,
    pub filename: Option<String>,
    pub model: Option<String>,
    pub language: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UrlRequest {
    pub url: String,
    pub filename: Option<String>,
    pub model: Option<String>,
    pub language: Option<String>,
}

fn validate_model_field(model: &Option<String>) -> Result<(), AppError> {
    if let Some(raw) = model {
        if ModelId::normalize(raw).is_none() {
            return Err(AppError::UnknownModel(raw.clone()));
        }
    }
    Ok(())
}

/// `POST /v1/audio/transcriptions` — multipart upload.
///
/// Streams the upload body directly to a scratch file, enforcing the size
/// cap mid-transfer rather than buffering the whole payload in memory.
pub async fn transcribe_multipart(
    State(state): State<AppState>,
    AppMultipart(mut multipart): AppMultipart,
) -> Result<Json<TranscriptionResponse>, AppError> {
    let ticket = state.admission.try_enter().await?;
    crate::temp::ensure_scratch_dir()
        .await
        .map_err(|e| AppError::Internal(format!("failed to create scratch directory: {e}")))?;

    let mut filename: Option<String> = None;
    let mut model: Option<String> = None;
    let mut language: Option<String> = None;
    let mut scratch: Option<ScratchFile> = None;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidRequest(format!("malformed multipart body: {e}")))?
    {
        match field.name().unwrap_or_default() {
            "file" => {
                let original_name = field.file_name().unwrap_or("upload.bin").to_string();
                let extension = std::path::Path::new(&original_name)
                    .extension()
                    .map(|e| e.to_string_lossy().to_lowercase())
                    .unwrap_or_default();
                if !audio::SUPPORTED_EXTENSIONS.contains(&extension.as_str()) {
                    return Err(AppError::UnsupportedMediaType);
                }

                let dest = ScratchFile::new_path(&extension);
                let mut file = tokio::fs::File::create(dest.path())
                    .await
                    .map_err(|e| AppError::Internal(format!("failed to create scratch file: {e}")))?;

                let cap = state.config.max_file_size_bytes();
                let mut written: u64 = 0;
                while let Some(chunk) = field
                    .chunk()
                    .await
                    .map_err(|e| AppError::InvalidRequest(format!("error reading upload body: {e}")))?
                {
                    written += chunk.len() as u64;
                    if written > cap {
                        drop(file);
                        return Err(AppError::FileTooLarge);
                    }
                    file.write_all(&chunk)
                        .await
                        .map_err(|e| AppError::Internal(format!("failed to write scratch file: {e}")))?;
                }
                file.flush().await.ok();

                filename = Some(original_name);
                scratch = Some(dest);
            }
            "model" => {
                model = field.text().await.ok();
            }
            "language" => {
                language = field.text().await.ok();
            }
            _ => {
                let _ = field.bytes().await;
            }
        }
    }

    let scratch = scratch.ok_or(AppError::MissingFile)?;
    let filename = filename.unwrap_or_else(|| "upload.bin".to_string());
    validate_model_field(&model)?;

    run_job(&state, ticket, scratch, RequestFields { filename, language }).await
}

/// `POST /v1/audio/transcriptions/base64` — base64-encoded JSON body.
pub async fn transcribe_base64(
    State(state): State<AppState>,
    AppJson(body): AppJson<Base64Request>,
) -> Result<Json<TranscriptionResponse>, AppError> {
    let ticket = state.admission.try_enter().await?;
    crate::temp::ensure_scratch_dir()
        .await
        .map_err(|e| AppError::Internal(format!("failed to create scratch directory: {e}")))?;
    validate_model_field(&body.model)?;

    let decoded = base64::engine::general_purpose::STANDARD
        .decode(body.audio.trim())
        .map_err(|_| AppError::InvalidBase64)?;

    let cap = state.config.max_file_size_bytes();
    if decoded.len() as u64 > cap {
        return Err(AppError::FileTooLarge);
    }

    let filename = body.filename.unwrap_or_else(|| "upload.wav".to_string());
    let extension = std::path::Path::new(&filename)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    if !audio::SUPPORTED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(AppError::UnsupportedMediaType);
    }

    let scratch = ScratchFile::new_path(&extension);
    tokio::fs::write(scratch.path(), &decoded)
        .await
        .map_err(|e| AppError::Internal(format!("failed to write scratch file: {e}")))?;

    run_job(
        &state,
        ticket,
        scratch,
        RequestFields { filename, language: body.language },
    )
    .await
}

/// `POST /v1/audio/transcriptions/url` — fetch the audio from a URL first.
pub async fn transcribe_url(
    State(state): State<AppState>,
    AppJson(body): AppJson<UrlRequest>,
) -> Result<Json<TranscriptionResponse>, AppError> {
    let ticket = state.admission.try_enter().await?;
    crate::temp::ensure_scratch_dir()
        .await
        .map_err(|e| AppError::Internal(format!("failed to create scratch directory: {e}")))?;
    validate_model_field(&body.model)?;

    let filename = body
        .filename
        .clone()
        .or_else(|| {
            body.url
                .rsplit('/')
                .next()
                .filter(|s| !s.is_empty())
                .map(|s| s.to_string())
        })
        .unwrap_or_else(|| "download.wav".to_string());
    let extension = std::path::Path::new(&filename)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    if !audio::SUPPORTED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(AppError::UnsupportedMediaType);
    }

    let cap = state.config.max_file_size_bytes();
    let fetch_timeout = Duration::from_secs(state.config.url_fetch_timeout_sec());

    let response = state
        .http_client
        .get(&body.url)
        .timeout(fetch_timeout)
        .send()
        .await
        .map_err(|e| AppError::UrlFetchFailed {
            status: if e.is_timeout() { StatusCode::GATEWAY_TIMEOUT } else { StatusCode::BAD_GATEWAY },
            message: format!("request to {} failed: {e}", body.url),
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(AppError::UrlFetchFailed {
            status: StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::BAD_GATEWAY),
            message: format!("upstream returned {status}"),
        });
    }

    if let Some(len) = response.content_length() {
        if len > cap {
            return Err(AppError::FileTooLarge);
        }
    }

    let scratch = ScratchFile::new_path(&extension);
    let mut file = tokio::fs::File::create(scratch.path())
        .await
        .map_err(|e| AppError::Internal(format!("failed to create scratch file: {e}")))?;

    let mut written: u64 = 0;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| AppError::UrlFetchFailed {
            status: if e.is_timeout() { StatusCode::GATEWAY_TIMEOUT } else { StatusCode::BAD_GATEWAY },
            message: format!("stream error: {e}"),
        })?;
        written += chunk.len() as u64;
        if written > cap {
            drop(file);
            return Err(AppError::FileTooLarge);
        }
        file.write_all(&chunk)
            .await
            .map_err(|e| AppError::Internal(format!("failed to write scratch file: {e}")))?;
    }
    file.flush().await.ok();

    run_job(
        &state,
        ticket,
        scratch,
        RequestFields { filename, language: body.language },
    )
    .await
}

/// The common tail shared by all three ingress shapes: normalize → ensure
/// the configured model is loaded → transcribe under the request deadline →
/// shape the response. `ticket` is held until this function returns, whether
/// by success or error.
async fn run_job(
    state: &AppState,
    ticket: crate::admission::AdmissionTicket,
    input: ScratchFile,
    fields: RequestFields,
) -> Result<Json<TranscriptionResponse>, AppError> {
    let deadline = state.request_deadline();
    let language = fields.language.unwrap_or_else(|| state.config.language.clone());

    let result = tokio::time::timeout(deadline, async {
        let input_path: PathBuf = input.path().to_path_buf();
        let wav = audio::normalize(input_path, fields.filename.clone(), state.config.sample_rate).await?;

        let model_id = ModelId::normalize(&state.config.model_id)
            .ok_or_else(|| AppError::Internal(format!("configured model id is invalid: {}", state.config.model_id)))?;
        let model_path = state.provisioner.ensure(model_id).await?;
        let engine = state.engine.ensure_loaded(model_path, state.config.device).await?;

        let samples = audio::read_wav_samples_f32(wav.path())?;
        let remaining = deadline; // engine timeout is bounded by the outer timeout anyway
        let raw_segments =
            crate::engine::EngineHandle::transcribe_with_deadline(engine, samples, language.clone(), remaining)
                .await?;

        drop(wav);
        Ok::<_, AppError>(raw_segments)
    })
    .await;

    drop(ticket);
    drop(input);

    let raw_segments = match result {
        Ok(inner) => inner?,
        Err(_elapsed) => return Err(AppError::Timeout),
    };

    let (text, duration, segments) = crate::engine::into_job_result(raw_segments);
    Ok(Json(TranscriptionResponse { text, duration, language, segments }))
}
