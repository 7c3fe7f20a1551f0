//! HTTP surface: an axum [`Router`] over the operations in [`crate::workbook`].
//!
//! Handlers are thin: decode the request, call one operation, encode the
//! result. Failures become `{"detail": "..."}` bodies through [`ApiError`];
//! caller mistakes are 400s, everything else is a 500 whose detail carries
//! the endpoint's context prefix. Bodies the extractors reject (bad JSON,
//! a non-multipart upload) get the same envelope with axum's own status.
//!
//! # Routes
//!
//! - `POST /api/generate` multipart upload (`file`) → `{pages:[...]}`
//! - `POST /api/rewrite_page` → `{code}`
//! - `POST /api/rewrite_global` → parsed object or `{changes}`
//! - `POST /api/brand` → `{css}`
//! - `POST /api/export-pdf` → `application/pdf`
//! - `POST /api/execute-code` → [`ExecutionResult`], 200 for any decodable body
//! - `GET /health`

use crate::config::ServerConfig;
use crate::error::WorkbookError;
use crate::model::{
    BrandRequest, ExecuteCodeRequest, ExecutionResult, ExportPdfRequest, RewriteGlobalRequest,
    RewritePageRequest,
};
use crate::pipeline::brand;
use crate::pipeline::export::PdfExporter;
use crate::pipeline::llm::LlmSession;
use crate::pipeline::sandbox::{self, SandboxBackend};
use crate::workbook;
use axum::body::Bytes;
use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

/// Shared, immutable state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub session: Arc<dyn LlmSession>,
    pub exporter: Arc<dyn PdfExporter>,
    /// `None` when no sandbox URL is configured.
    pub sandbox: Option<Arc<dyn SandboxBackend>>,
}

/// Build the application router with CORS, body limit and request tracing.
pub fn router(state: AppState) -> Router {
    let body_limit = DefaultBodyLimit::max(state.config.max_upload_bytes);
    let cors = cors_layer(&state.config.cors_origins);

    Router::new()
        .route("/api/generate", post(generate))
        .route("/api/rewrite_page", post(rewrite_page))
        .route("/api/rewrite_global", post(rewrite_global))
        .route("/api/brand", post(brand_css))
        .route("/api/export-pdf", post(export_pdf))
        .route("/api/execute-code", post(execute_code))
        .route("/health", get(health))
        .with_state(state)
        .layer(body_limit)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Listed origins only, with credentials; methods and headers mirror the
/// preflight request.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring CORS origin that is not a valid header value: {:?}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

// ── Errors ───────────────────────────────────────────────────────────────

/// An error response: `status` plus a `{"detail": ...}` body.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub detail: String,
}

impl ApiError {
    /// Map a [`WorkbookError`] raised while serving one endpoint.
    ///
    /// Client errors keep their own message; server errors are prefixed
    /// with `context`.
    pub fn from_workbook(context: &str, err: WorkbookError) -> Self {
        if err.is_client_error() {
            ApiError {
                status: StatusCode::BAD_REQUEST,
                detail: err.to_string(),
            }
        } else {
            error!("{}{}", context, err);
            ApiError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                detail: format!("{context}{err}"),
            }
        }
    }
}

/// Undecodable JSON bodies keep axum's status (400, 415 or 422).
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError {
            status: rejection.status(),
            detail: rejection.body_text(),
        }
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        ApiError {
            status: rejection.status(),
            detail: WorkbookError::InvalidUpload(rejection.body_text()).to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}

// ── Handlers ─────────────────────────────────────────────────────────────

async fn generate(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Value>, ApiError> {
    let (filename, bytes) = read_upload(multipart?).await?;
    workbook::generate(state.session.as_ref(), &state.config, &bytes, &filename)
        .await
        .map(Json)
        .map_err(|e| ApiError::from_workbook("Error generating workbook: ", e))
}

/// Pull the `file` field out of a multipart body; other fields are skipped.
async fn read_upload(mut multipart: Multipart) -> Result<(String, Bytes), ApiError> {
    let upload_error = |e: axum::extract::multipart::MultipartError| ApiError {
        status: e.status(),
        detail: WorkbookError::InvalidUpload(e.body_text()).to_string(),
    };

    while let Some(field) = multipart.next_field().await.map_err(upload_error)? {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await.map_err(upload_error)?;
        return Ok((filename, bytes));
    }

    Err(ApiError::from_workbook(
        "",
        WorkbookError::InvalidUpload("multipart body has no 'file' field".to_string()),
    ))
}

async fn rewrite_page(
    State(state): State<AppState>,
    req: Result<Json<RewritePageRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(req) = req?;
    workbook::rewrite_page(state.session.as_ref(), req.page_index, &req.code, &req.instruction)
        .await
        .map(Json)
        .map_err(|e| ApiError::from_workbook("Error rewriting page: ", e))
}

async fn rewrite_global(
    State(state): State<AppState>,
    req: Result<Json<RewriteGlobalRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(req) = req?;
    workbook::rewrite_global(state.session.as_ref(), &req.code, &req.instruction)
        .await
        .map(Json)
        .map_err(|e| ApiError::from_workbook("Error applying global changes: ", e))
}

async fn brand_css(
    req: Result<Json<BrandRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(req) = req?;
    Ok(Json(json!({ "css": brand::brand_css(&req) })))
}

async fn export_pdf(
    State(state): State<AppState>,
    req: Result<Json<ExportPdfRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(req) = req?;
    let pdf = workbook::export_pdf(state.exporter.as_ref(), &req.pages, &req.brand_kit)
        .await
        .map_err(|e| ApiError::from_workbook("Error generating PDF: ", e))?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf"),
            (header::CONTENT_DISPOSITION, "attachment; filename=workbook.pdf"),
        ],
        pdf,
    )
        .into_response())
}

async fn execute_code(
    State(state): State<AppState>,
    req: Result<Json<ExecuteCodeRequest>, JsonRejection>,
) -> Result<Json<ExecutionResult>, ApiError> {
    let Json(req) = req?;
    Ok(Json(
        sandbox::execute(&state.config, state.sandbox.as_deref(), req.code, req.language).await,
    ))
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
