use async_trait::async_trait;
use axum::extract::{FromRequest, Request};
use axum::Json;
use serde::de::DeserializeOwned;

use crate::api::errors::ApiError;

/// `Json` with rejections reported as the API's own 400 body.
pub(crate) struct AppJson<T>(pub(crate) T);

#[async_trait]
impl<T, S> FromRequest<S> for AppJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(AppJson(value)),
            Err(rejection) => {
                let message = format!("Invalid request body: {}", rejection.body_text());
                tracing::warn!("{message}");
                Err(ApiError::BadRequest(message))
            }
        }
    }
}
