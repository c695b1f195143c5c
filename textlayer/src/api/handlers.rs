//! HTTP handlers: the OCR endpoint plus the info/diagnostic surface.
//!
//! `run_ocr` owns the request lifecycle: parse form → validate → acquire
//! workspace → invoke tool → build response. The workspace guard releases
//! the scratch directory on every exit path.

use std::collections::BTreeMap;

use axum::body::{Body, Bytes};
use axum::extract::multipart::Field;
use axum::extract::{Multipart, State};
use axum::http::{header, StatusCode};
use axum::response::Response;
use axum::Json;
use serde::Serialize;
use serde_json::json;

use crate::api::state::AppState;
use crate::error::{OcrJobError, Result};
use crate::invoker::{Language, OcrOptions, ToolchainVersions};
use crate::validate;
use crate::workspace::Workspace;

const FALLBACK_DOWNLOAD_NAME: &str = "processed_document.pdf";

/// `GET /`
#[utoipa::path(
    get,
    path = "/",
    tag = "info",
    responses(
        (status = 200, description = "Service liveness and usage hint"),
    )
)]
pub async fn root() -> Json<serde_json::Value> {
    let languages: Vec<&str> = Language::ALL.iter().map(Language::as_arg).collect();
    Json(json!({
        "message": format!(
            "textlayer is running. Use POST /ocr/ to process PDFs. Supported languages: {languages:?}"
        )
    }))
}

/// `GET /supported-languages/`
#[utoipa::path(
    get,
    path = "/supported-languages/",
    tag = "info",
    responses(
        (status = 200, description = "Supported language selectors and descriptions"),
    )
)]
pub async fn supported_languages() -> Json<BTreeMap<&'static str, &'static str>> {
    let table = Language::ALL
        .iter()
        .map(|l| (l.as_arg(), l.description()))
        .collect();
    Json(table)
}

/// Health data: toolchain availability plus configured resource ceilings.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct HealthData {
    pub status: String,
    pub version: String,
    pub toolchain: ToolchainVersions,
    pub limits: LimitsData,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct LimitsData {
    pub max_upload_mb: u64,
    pub max_pages: usize,
    pub timeout_secs: u64,
    pub jobs: u32,
}

/// `GET /health`
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Toolchain availability and configured ceilings", body = HealthData),
    )
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthData> {
    let toolchain = state.invoker.probe().await;
    let status = if toolchain.is_available() {
        "ok"
    } else {
        "degraded"
    };

    Json(HealthData {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        toolchain,
        limits: LimitsData {
            max_upload_mb: state.config.limits.max_upload_mb,
            max_pages: state.config.limits.max_pages,
            timeout_secs: state.config.ocr.timeout_secs,
            jobs: state.config.ocr.jobs,
        },
    })
}

/// `POST /ocr/`
///
/// Accepts a multipart form with a required `pdf_file` and optional
/// `language`, `force_ocr`, `deskew`, and `optimize` fields. Returns the
/// processed PDF with a derived download name.
#[utoipa::path(
    post,
    path = "/ocr/",
    tag = "ocr",
    request_body(
        content_type = "multipart/form-data",
        content = String,
        description = "pdf_file (required), language (eng|chi_sim|eng+chi_sim), force_ocr, deskew, optimize (0-3)"
    ),
    responses(
        (status = 200, description = "Processed PDF", content_type = "application/pdf"),
        (status = 400, description = "Invalid input: wrong file type, oversized, too many pages, corrupt, encrypted, or bad parameters"),
        (status = 422, description = "Malformed multipart form"),
        (status = 500, description = "OCR processing failed"),
        (status = 503, description = "OCR toolchain unavailable"),
        (status = 504, description = "OCR processing timed out"),
    )
)]
pub async fn run_ocr(State(state): State<AppState>, multipart: Multipart) -> Result<Response> {
    let form = parse_form(multipart).await?;

    // Cheap checks first: filename, then size, before any disk work.
    validate::check_filename(form.filename.as_deref().unwrap_or(""))?;
    validate::check_size(form.bytes.len() as u64, state.config.limits.max_upload_mb)?;

    let workspace = Workspace::acquire(state.config.ocr.temp_root.as_deref())?;
    tracing::info!(
        workspace = %workspace.id(),
        filename = form.filename.as_deref().unwrap_or("<unnamed>"),
        bytes = form.bytes.len(),
        "Processing OCR request"
    );

    tokio::fs::write(workspace.input_path(), &form.bytes).await?;

    let input = workspace.input_path().to_path_buf();
    let max_pages = state.config.limits.max_pages;
    tokio::task::spawn_blocking(move || validate::check_page_count(&input, max_pages))
        .await
        .map_err(|e| OcrJobError::InternalUnexpected(format!("page-count task failed: {e}")))??;

    state
        .invoker
        .invoke(workspace.input_path(), workspace.output_path(), &form.options)
        .await?;

    let output = tokio::fs::read(workspace.output_path()).await.map_err(|e| {
        tracing::error!(error = %e, "Output file unreadable after successful invocation");
        OcrJobError::OutputMissing
    })?;

    // The bytes are fully in memory; releasing now cannot race the body.
    workspace.release();

    let download_name = download_name(form.filename.as_deref());
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/pdf")
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{download_name}\""),
        )
        .body(Body::from(output))
        .map_err(|e| OcrJobError::InternalUnexpected(format!("failed to build response: {e}")))
}

struct OcrForm {
    bytes: Bytes,
    filename: Option<String>,
    options: OcrOptions,
}

async fn parse_form(mut multipart: Multipart) -> Result<OcrForm> {
    let mut bytes: Option<Bytes> = None;
    let mut filename: Option<String> = None;
    let mut options = OcrOptions::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| OcrJobError::MalformedForm(e.to_string()))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "pdf_file" => {
                filename = field.file_name().map(str::to_string);
                bytes = Some(field.bytes().await.map_err(|e| {
                    OcrJobError::MalformedForm(format!("failed to read pdf_file: {e}"))
                })?);
            }
            "language" => {
                let raw = field_text(field).await?;
                options.language = Language::parse(raw.trim()).ok_or_else(|| {
                    OcrJobError::BadParameters(format!(
                        "unsupported language '{}'; choose one of eng, chi_sim, eng+chi_sim",
                        raw.trim()
                    ))
                })?;
            }
            "force_ocr" => {
                let raw = field_text(field).await?;
                options.force_ocr = parse_form_bool(&raw).ok_or_else(|| {
                    OcrJobError::BadParameters(format!("force_ocr must be a boolean, got '{raw}'"))
                })?;
            }
            "deskew" => {
                let raw = field_text(field).await?;
                options.deskew = parse_form_bool(&raw).ok_or_else(|| {
                    OcrJobError::BadParameters(format!("deskew must be a boolean, got '{raw}'"))
                })?;
            }
            "optimize" => {
                let raw = field_text(field).await?;
                let value = raw.trim().parse::<i64>().map_err(|_| {
                    OcrJobError::BadParameters(format!("optimize must be an integer, got '{raw}'"))
                })?;
                options.optimize = OcrOptions::clamp_optimize(value);
            }
            _ => {}
        }
    }

    let bytes = bytes
        .ok_or_else(|| OcrJobError::MalformedForm("missing required 'pdf_file' field".to_string()))?;

    Ok(OcrForm {
        bytes,
        filename,
        options,
    })
}

async fn field_text(field: Field<'_>) -> Result<String> {
    field
        .text()
        .await
        .map_err(|e| OcrJobError::MalformedForm(e.to_string()))
}

fn parse_form_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Derived download name: `ocr_<original>`, with quote and control
/// characters stripped so the Content-Disposition header stays well-formed.
fn download_name(original: Option<&str>) -> String {
    match original {
        Some(name) if !name.is_empty() => {
            let safe: String = name
                .chars()
                .map(|c| {
                    if c == '"' || c == '\\' || c.is_control() {
                        '_'
                    } else {
                        c
                    }
                })
                .collect();
            format!("ocr_{safe}")
        }
        _ => FALLBACK_DOWNLOAD_NAME.to_string(),
    }
}
