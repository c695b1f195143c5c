use axum::Json;
use utoipa::OpenApi;

use super::handlers;
use crate::invoker;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "textlayer API",
        version = "1.0.0",
        description = "Adds a searchable OCR text layer (English/Simplified Chinese) to uploaded PDFs via the OCRmyPDF toolchain.",
    ),
    paths(
        handlers::root,
        handlers::supported_languages,
        handlers::health_check,
        handlers::run_ocr,
    ),
    components(schemas(
        invoker::Language,
        invoker::ToolchainVersions,
        handlers::HealthData,
        handlers::LimitsData,
    )),
    tags(
        (name = "info", description = "Liveness and language discovery"),
        (name = "health", description = "Toolchain diagnostics"),
        (name = "ocr", description = "PDF OCR processing"),
    )
)]
pub struct ApiDoc;

pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
