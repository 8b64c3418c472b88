//! Thin wrappers over axum's built-in extractors so a bad `Content-Type` or
//! malformed body surfaces through `AppError`/`IntoResponse` like every other
//! failure, instead of axum's own plain-text rejection body (C7, §4.6/§7).

use async_trait::async_trait;
use axum::extract::{FromRequest, Multipart, Request};
use axum::Json;
use serde::de::DeserializeOwned;

use super::error::AppError;

/// `multipart/form-data` extraction; any rejection (missing/wrong
/// `Content-Type`, malformed boundary, ...) becomes
/// `AppError::InvalidRequest`.
pub struct AppMultipart(pub Multipart);

#[async_trait]
impl<S> FromRequest<S> for AppMultipart
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        Multipart::from_request(req, state)
            .await
            .map(AppMultipart)
            .map_err(|rejection| {
                AppError::InvalidRequest(format!(
                    "content-type must be multipart/form-data: {rejection}"
                ))
            })
    }
}

/// JSON body extraction; any rejection (missing/wrong `Content-Type`,
/// malformed JSON, schema mismatch, ...) becomes `AppError::InvalidRequest`.
pub struct AppJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for AppJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        Json::<T>::from_request(req, state)
            .await
            .map(|Json(value)| AppJson(value))
            .map_err(|rejection| {
                AppError::InvalidRequest(format!("invalid JSON request body: {rejection}"))
            })
    }
}
