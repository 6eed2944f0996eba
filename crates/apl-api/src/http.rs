use std::sync::Arc;

use axum::{
    Form, Json, Router,
    extract::{FromRequest, Multipart, Request, State},
    http::header::CONTENT_TYPE,
    response::IntoResponse,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::{error::ApiError, handler::ApiHandler};

/// HTTP API service builder.
pub struct HttpApi<H> {
    handler: Arc<H>,
}

impl<H> HttpApi<H>
where
    H: ApiHandler,
{
    /// Create new HTTP API with the given handler.
    pub fn new(handler: Arc<H>) -> Self {
        Self { handler }
    }

    /// Build axum router with mounted endpoints.
    ///
    /// Routes:
    /// - POST /secret - Store a secret (form fields `key`, `value`, urlencoded or multipart)
    /// - GET /health - Liveness probe
    pub fn router(self) -> Router {
        Router::new()
            .route("/secret", post(save_secret::<H>))
            .route("/health", get(health))
            .with_state(self.handler)
    }
}

// ============================================================================
// Request/Response types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
struct SaveSecretForm {
    key: Option<String>,
    value: Option<String>,
}

impl<S> FromRequest<S> for SaveSecretForm
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let multipart = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("multipart/form-data"));
        if !multipart {
            let Form(form) = Form::<SaveSecretForm>::from_request(req, state)
                .await
                .map_err(|e| ApiError::InvalidRequest(e.body_text()))?;
            return Ok(form);
        }

        let mut parts = Multipart::from_request(req, state)
            .await
            .map_err(|e| ApiError::InvalidRequest(e.body_text()))?;
        let mut form = SaveSecretForm::default();
        while let Some(field) = parts
            .next_field()
            .await
            .map_err(|e| ApiError::InvalidRequest(e.body_text()))?
        {
            let slot = match field.name() {
                Some("key") => &mut form.key,
                Some("value") => &mut form.value,
                _ => continue,
            };
            // First occurrence wins.
            if slot.is_none() {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::InvalidRequest(e.body_text()))?;
                *slot = Some(text);
            }
        }
        Ok(form)
    }
}

/// Body of every secret API reply, successful or not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub code: u16,
    pub message: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /secret
async fn save_secret<H>(
    State(handler): State<Arc<H>>,
    form: SaveSecretForm,
) -> Result<impl IntoResponse, ApiError>
where
    H: ApiHandler,
{
    let key = form.key.unwrap_or_default();
    if key.is_empty() {
        return Err(ApiError::InvalidRequest("key cannot be empty".into()));
    }
    // Values never reach the log.
    debug!(%key, "saving secret");
    handler
        .save_secret(key, form.value.unwrap_or_default())
        .await?;

    Ok(Json(StatusResponse {
        code: 200,
        message: "update secret successful".into(),
    }))
}

/// GET /health
async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}
