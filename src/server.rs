//! HTTP front end: a static page plus `POST /generate`, which maps a
//! `(format, sub_type)` pair to a generator and returns the document.

use crate::core::registry::{FormatKind, Registry, SubType, FORMAT_ALIASES};
use crate::error::DocgenError;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

pub const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

#[derive(Debug, Clone)]
pub struct AppState {
    pub registry: Registry,
    pub base_dir: PathBuf,
}

impl AppState {
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Self {
        let base_dir = base_dir.as_ref().to_path_buf();
        Self { registry: Registry::new(&base_dir), base_dir }
    }

    pub fn with_registry(mut self, registry: Registry) -> Self {
        self.registry = registry;
        self
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub sub_type: Option<String>,
    #[serde(default)]
    pub deliver: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deliver {
    Attachment,
    Json,
}

impl Deliver {
    fn parse(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("json") => Deliver::Json,
            _ => Deliver::Attachment,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub ok: bool,
    pub filename: String,
    pub path: String,
}

#[derive(Debug, Serialize)]
pub struct FormatsResponse {
    pub formats: Vec<FormatKind>,
    pub aliases: Vec<(String, FormatKind)>,
    pub sub_types: Vec<SubType>,
}

/// Errors returned as `{"error": "..."}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<DocgenError> for ApiError {
    fn from(err: DocgenError) -> Self {
        if err.is_client_error() {
            warn!("rejected request: {}", err);
            let message = match err {
                DocgenError::UnknownSubType(_) => "Subtipo no valido",
                _ => "Formato no valido",
            };
            return ApiError::BadRequest(message.to_string());
        }
        match err {
            DocgenError::ConfigNotFound(path) => {
                error!("configuration missing: {}", path.display());
                ApiError::Internal(format!("JSON no encontrado: {}", path.display()))
            }
            DocgenError::OutputMissing(path) => {
                error!("no output at {}", path.display());
                ApiError::Internal("El generador corrio pero no genero el DOCX".to_string())
            }
            other => {
                error!("generation failed: {}", other);
                ApiError::Internal("Fallo la generacion interna. Revisa consola.".to_string())
            }
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(|| async { "ok" }))
        .route("/formats", get(formats))
        .route("/generate", post(generate))
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(state))
}

/// Bind `addr` and serve until the process is stopped.
pub async fn serve(addr: SocketAddr, state: AppState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn index(State(state): State<Arc<AppState>>) -> Result<Html<String>, ApiError> {
    for candidate in [state.base_dir.join("view").join("index.html"), state.base_dir.join("index.html")] {
        if let Ok(page) = tokio::fs::read_to_string(&candidate).await {
            return Ok(Html(page));
        }
    }
    Err(ApiError::NotFound("index.html no encontrado".to_string()))
}

async fn formats() -> Json<FormatsResponse> {
    Json(FormatsResponse {
        formats: FormatKind::ALL.to_vec(),
        aliases: FORMAT_ALIASES.iter().map(|(alias, kind)| (alias.to_string(), *kind)).collect(),
        sub_types: SubType::ALL.to_vec(),
    })
}

async fn generate(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            warn!("unreadable generate request: {}", rejection);
            GenerateRequest::default()
        }
    };
    let format = request.format.unwrap_or_default();
    let sub_type = request.sub_type.unwrap_or_default();
    let deliver = Deliver::parse(request.deliver.as_deref());

    // Reject bad keys before touching the blocking pool
    state.registry.resolve(&format, &sub_type)?;

    let registry = state.registry.clone();
    let document = tokio::task::spawn_blocking(move || registry.generate(&format, &sub_type))
        .await
        .map_err(|e| {
            error!("generation task panicked: {}", e);
            ApiError::Internal("Fallo la generacion interna. Revisa consola.".to_string())
        })??;

    match deliver {
        Deliver::Json => Ok(Json(GenerateResponse {
            ok: true,
            filename: document.download_name,
            path: document.path.display().to_string(),
        })
        .into_response()),
        Deliver::Attachment => {
            let bytes = tokio::fs::read(&document.path).await.map_err(|e| {
                error!("reading {}: {}", document.path.display(), e);
                ApiError::Internal("No se pudo leer el documento generado".to_string())
            })?;
            let disposition = format!("attachment; filename=\"{}\"", document.download_name);
            Ok((
                [(header::CONTENT_TYPE, DOCX_MIME.to_string()), (header::CONTENT_DISPOSITION, disposition)],
                bytes,
            )
                .into_response())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/generate")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[test]
    fn deliver_defaults_to_attachment() {
        assert_eq!(Deliver::parse(None), Deliver::Attachment);
        assert_eq!(Deliver::parse(Some("JSON")), Deliver::Json);
        assert_eq!(Deliver::parse(Some("zip")), Deliver::Attachment);
    }

    #[test]
    fn client_errors_become_bad_requests() {
        let cases = [
            DocgenError::UnknownFormat("doctorado".into()),
            DocgenError::UnknownSubType("mixto".into()),
            DocgenError::ConfigNotFound(PathBuf::from("formats/x.json")),
            DocgenError::OutputMissing(PathBuf::from("docs/x.docx")),
            DocgenError::Generation(anyhow::anyhow!("boom")),
        ];
        for (i, err) in cases.into_iter().enumerate() {
            let client = err.is_client_error();
            assert_eq!(client, i < 2);
            let status = ApiError::from(err).into_response().status();
            let expected = if client { StatusCode::BAD_REQUEST } else { StatusCode::INTERNAL_SERVER_ERROR };
            assert_eq!(status, expected);
        }
    }

    #[tokio::test]
    async fn health_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let response = router(AppState::new(dir.path()))
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_format_is_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let response = router(AppState::new(dir.path()))
            .oneshot(post_json(r#"{"format": "doctorado", "sub_type": "cuant"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "Formato no valido");
    }

    #[tokio::test]
    async fn unknown_sub_type_is_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let response = router(AppState::new(dir.path()))
            .oneshot(post_json(r#"{"format": "pregrado", "sub_type": "mixto"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "Subtipo no valido");
    }

    #[tokio::test]
    async fn empty_body_is_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let response = router(AppState::new(dir.path()))
            .oneshot(Request::builder().method("POST").uri("/generate").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn missing_config_is_internal_error() {
        let dir = tempfile::tempdir().unwrap();
        let response = router(AppState::new(dir.path()))
            .oneshot(post_json(r#"{"format": "maestria", "sub_type": "cual"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert!(body["error"].as_str().unwrap().starts_with("JSON no encontrado"));
    }

    #[tokio::test]
    async fn index_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let response = router(AppState::new(dir.path()))
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn formats_lists_aliases() {
        let dir = tempfile::tempdir().unwrap();
        let response = router(AppState::new(dir.path()))
            .oneshot(Request::builder().uri("/formats").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["formats"], json!(["proyecto", "informe", "maestria"]));
        assert_eq!(body["aliases"][0], json!(["pregrado", "informe"]));
        assert_eq!(body["sub_types"], json!(["cuant", "cual"]));
    }
}
