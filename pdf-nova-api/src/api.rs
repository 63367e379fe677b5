use crate::assets;
use crate::error::AppError;
use crate::form::FormData;
use crate::state::AppState;
use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::{header, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use pdf_nova::artifact::INFO_HEADER;
use pdf_nova::operations::{
    self, input_bytes, video::parse_consent, BlankOptions, CompressionLevel, ConvertMode,
    OcrOptions, RotateOptions, RotationAngle, SplitOptions, VideoOptions, WatermarkOptions,
};
use pdf_nova::{
    registry, Artifact, Capabilities, NovaError, NovaInfo, SizeReport, ToolDescriptor, APP_ID,
    VERSION,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Response of `GET /api/health`
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub app: String,
    pub version: String,
}

/// Build the application router with all routes configured
pub fn app(state: AppState) -> Router {
    let body_limit = state.limits.body_limit();
    let static_dir = state.config.static_dir.clone();

    let router = Router::new()
        .route("/", get(assets::index))
        .route("/api/health", get(health_check))
        .route("/api/capabilities", get(capabilities))
        .route("/api/tools", get(list_tools))
        // PDF operations
        .route("/api/merge", post(merge_handler))
        .route("/api/split", post(split_handler))
        .route("/api/extract", post(extract_handler))
        .route("/api/rotate", post(rotate_handler))
        .route("/api/watermark", post(watermark_handler))
        .route("/api/images-to-pdf", post(images_handler))
        .route("/api/compress", post(compress_handler))
        .route("/api/remove-blank", post(remove_blank_handler))
        // External tools
        .route("/api/ocr-text", post(ocr_handler))
        .route("/api/video-extract", post(video_handler))
        .route("/api/convert", post(convert_handler));

    let router = match static_dir {
        Some(dir) => router.nest_service("/static", ServeDir::new(dir)),
        None => router.route("/static/{*file}", get(assets::static_file)),
    };

    router
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check used by the front end and the CLI to find a live server
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        app: APP_ID.to_string(),
        version: VERSION.to_string(),
    })
}

pub async fn capabilities(State(state): State<AppState>) -> Json<Capabilities> {
    Json(Capabilities::detect(&state.locator).await)
}

pub async fn list_tools() -> Json<&'static [ToolDescriptor]> {
    Json(registry())
}

/// Download response with the `X-Nova-Info` summary header
fn artifact_response(artifact: Artifact, operation: &str, files: usize, input: u64) -> Response {
    let info = NovaInfo::new(operation, files, SizeReport::new(input, artifact.len() as u64));
    info!(
        operation,
        files,
        input,
        output = artifact.len(),
        file_name = %artifact.file_name,
        "artifact ready"
    );

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, artifact.media_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", artifact.file_name),
            ),
            (HeaderName::from_static("x-nova-info"), info.to_header_value()),
        ],
        artifact.data,
    )
        .into_response()
}

/// Run a CPU-bound operation off the async workers
async fn blocking<F>(operation: F) -> Result<Artifact, AppError>
where
    F: FnOnce() -> pdf_nova::Result<Artifact> + Send + 'static,
{
    Ok(tokio::task::spawn_blocking(operation).await??)
}

/// Non-negative integer field
fn count_field(form: &FormData, name: &str, default: i64) -> Result<usize, AppError> {
    let value: i64 = form.number(name, default)?;
    usize::try_from(value).map_err(|_| AppError::BadField(format!("{name} must be >= 0.")))
}

pub async fn merge_handler(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let form = FormData::collect(multipart, &state.limits).await?;
    let files = form.files;
    let (count, input) = (files.len(), input_bytes(&files));
    let limits = state.limits;

    let artifact = blocking(move || operations::merge(&files, &limits)).await?;
    Ok(artifact_response(artifact, "merge", count, input))
}

pub async fn split_handler(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let mut form = FormData::collect(multipart, &state.limits).await?;
    let chunk: i64 = form.number("chunk_size", 1)?;
    // Zero and negatives are rejected by the operation itself
    let options = SplitOptions {
        chunk_size: usize::try_from(chunk).unwrap_or(0),
    };
    let upload = form.single_file()?;
    let input = upload.len() as u64;

    let artifact = blocking(move || operations::split(&upload, &options)).await?;
    Ok(artifact_response(artifact, "split", 1, input))
}

pub async fn extract_handler(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let mut form = FormData::collect(multipart, &state.limits).await?;
    let pages = form.text_or("pages", "").to_string();
    let upload = form.single_file()?;
    let input = upload.len() as u64;

    let artifact = blocking(move || operations::extract(&upload, &pages)).await?;
    Ok(artifact_response(artifact, "extract", 1, input))
}

pub async fn rotate_handler(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let mut form = FormData::collect(multipart, &state.limits).await?;
    let options = RotateOptions {
        angle: RotationAngle::from_degrees(form.number("angle", 90)?)?,
        pages: form.text_or("pages", "").to_string(),
    };
    let upload = form.single_file()?;
    let input = upload.len() as u64;

    let artifact = blocking(move || operations::rotate(&upload, &options)).await?;
    Ok(artifact_response(artifact, "rotate", 1, input))
}

pub async fn watermark_handler(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let mut form = FormData::collect(multipart, &state.limits).await?;
    let options = WatermarkOptions {
        text: form.text_or("text", "").to_string(),
        opacity: form.number("opacity", WatermarkOptions::default().opacity)?,
    };
    let upload = form.single_file()?;
    let input = upload.len() as u64;

    let artifact = blocking(move || operations::watermark(&upload, &options)).await?;
    Ok(artifact_response(artifact, "watermark", 1, input))
}

pub async fn images_handler(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let form = FormData::collect(multipart, &state.limits).await?;
    let files = form.files;
    let (count, input) = (files.len(), input_bytes(&files));
    let limits = state.limits;

    let artifact = blocking(move || operations::images_to_pdf(&files, &limits)).await?;
    Ok(artifact_response(artifact, "images-to-pdf", count, input))
}

pub async fn compress_handler(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let mut form = FormData::collect(multipart, &state.limits).await?;
    let level: CompressionLevel = form.text_or("level", "balanced").parse()?;
    let upload = form.single_file()?;
    let input = upload.len() as u64;

    let artifact = blocking(move || operations::compress(&upload, level)).await?;
    Ok(artifact_response(artifact, "compress", 1, input))
}

pub async fn remove_blank_handler(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let mut form = FormData::collect(multipart, &state.limits).await?;
    let default = BlankOptions::default().content_threshold as i64;
    let options = BlankOptions {
        content_threshold: count_field(&form, "content_threshold", default)?,
    };
    let upload = form.single_file()?;
    let input = upload.len() as u64;

    let artifact = blocking(move || operations::remove_blank(&upload, &options)).await?;
    Ok(artifact_response(artifact, "remove-blank", 1, input))
}

pub async fn ocr_handler(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let mut form = FormData::collect(multipart, &state.limits).await?;
    let defaults = OcrOptions::default();
    let options = OcrOptions {
        lang: form.text_or("lang", &defaults.lang).to_string(),
        min_chars: count_field(&form, "min_chars", defaults.min_chars as i64)?,
    };
    let upload = form.single_file()?;
    let workspace = state.workspace()?;

    let artifact = operations::ocr_text(&upload, &options, &state.locator, &workspace).await?;
    Ok(artifact_response(artifact, "ocr-text", 1, upload.len() as u64))
}

pub async fn video_handler(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let form = FormData::collect(multipart, &state.limits).await?;
    let options = VideoOptions {
        url: form.text_or("video_url", "").to_string(),
        source: form.text_or("source", "").to_string(),
        owns_rights: parse_consent(form.text_or("owns_rights", "false")),
    };
    let workspace = state.workspace()?;

    let artifact = operations::video_extract(&options, &state.locator, &workspace).await?;
    Ok(artifact_response(artifact, "video-extract", 0, 0))
}

pub async fn convert_handler(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let mut form = FormData::collect(multipart, &state.limits).await?;
    let mode: ConvertMode = form
        .text("mode")
        .ok_or_else(|| NovaError::InvalidInput("mode is required.".to_string()))?
        .parse()?;
    let upload = form.single_file()?;
    let workspace = state.workspace()?;

    let artifact = operations::convert(&upload, mode, &state.locator, &workspace).await?;
    Ok(artifact_response(artifact, "convert", 1, upload.len() as u64))
}
