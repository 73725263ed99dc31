//! Handlers for the `/bulk` resource: presets, templates, exports, imports.
//!
//! The engine is synchronous and CPU-bound, so every call into it runs on the
//! blocking pool once the request body has been read.

use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, Path};
use axum::http::StatusCode;
use axum::Json;
use pesantren_core::bulk::presets::{self, FlowPreset};
use pesantren_core::bulk::{
    export_to_csv, export_to_excel, generate_excel_template, import_from_csv, import_from_excel,
    ColumnSpec, ExportOptions, ImportResult, Record, TemplateColumnSpec, ValidationRule,
};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::response::{DataResponse, Download};

/// Multipart field carrying the uploaded document.
pub const FILE_FIELD: &str = "file";
/// Multipart field carrying a JSON array of validation rules.
pub const RULES_FIELD: &str = "rules";
/// Multipart field naming a built-in preset whose rules apply.
pub const PRESET_FIELD: &str = "preset";

/// Run engine work on the blocking pool.
async fn blocking<T, F>(work: F) -> AppResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| AppError::InternalError(format!("Engine task failed: {e}")))
}

fn find_preset(name: &str) -> AppResult<FlowPreset> {
    presets::preset(name).ok_or_else(|| AppError::NotFound(format!("Unknown preset '{name}'")))
}

// ── Presets ──────────────────────────────────────────────────────────

/// One entry of the preset listing.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresetSummary {
    pub name: &'static str,
    pub label: &'static str,
    pub column_count: usize,
}

/// GET /api/v1/bulk/presets
pub async fn list_presets() -> Json<DataResponse<Vec<PresetSummary>>> {
    let data = presets::all()
        .into_iter()
        .map(|p| PresetSummary {
            name: p.name,
            label: p.label,
            column_count: p.columns.len(),
        })
        .collect();
    Json(DataResponse { data })
}

/// GET /api/v1/bulk/presets/{name}
pub async fn get_preset(Path(name): Path<String>) -> AppResult<Json<DataResponse<FlowPreset>>> {
    let preset = find_preset(&name)?;
    Ok(Json(DataResponse { data: preset }))
}

/// GET /api/v1/bulk/presets/{name}/template
pub async fn preset_template(Path(name): Path<String>) -> AppResult<Download> {
    let preset = find_preset(&name)?;
    let filename = format!("template-{}", preset.name);
    let artifact =
        blocking(move || generate_excel_template(&preset.columns, Some(filename.as_str())))
            .await??;
    Ok(Download(artifact))
}

// ── Template ─────────────────────────────────────────────────────────

/// Request body for an ad-hoc template.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateRequest {
    pub columns: Vec<TemplateColumnSpec>,
    #[serde(default)]
    pub filename: Option<String>,
}

/// POST /api/v1/bulk/template
pub async fn template(Json(input): Json<TemplateRequest>) -> AppResult<Download> {
    let artifact =
        blocking(move || generate_excel_template(&input.columns, input.filename.as_deref()))
            .await??;
    Ok(Download(artifact))
}

// ── Export ───────────────────────────────────────────────────────────

/// Request body for both export formats.
///
/// Columns come from `columns`, or from `preset` when `columns` is empty.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRequest {
    #[serde(default)]
    pub preset: Option<String>,
    #[serde(default)]
    pub columns: Vec<ColumnSpec>,
    #[serde(default)]
    pub records: Vec<Record>,
    #[serde(flatten)]
    pub options: ExportOptions,
}

impl ExportRequest {
    fn into_parts(self) -> AppResult<(Vec<ColumnSpec>, Vec<Record>, ExportOptions)> {
        let columns = match (self.columns.is_empty(), self.preset.as_deref()) {
            (false, _) => self.columns,
            (true, Some(name)) => find_preset(name)?.column_specs(),
            (true, None) => {
                return Err(AppError::BadRequest(
                    "Either 'columns' or 'preset' is required".into(),
                ))
            }
        };
        Ok((columns, self.records, self.options))
    }
}

/// POST /api/v1/bulk/export/xlsx
pub async fn export_xlsx(Json(input): Json<ExportRequest>) -> AppResult<Download> {
    let (columns, records, options) = input.into_parts()?;
    let artifact = blocking(move || export_to_excel(&records, &columns, &options)).await??;
    tracing::info!(filename = %artifact.filename, size = artifact.bytes.len(), "Spreadsheet export ready");
    Ok(Download(artifact))
}

/// POST /api/v1/bulk/export/csv
pub async fn export_csv(Json(input): Json<ExportRequest>) -> AppResult<Download> {
    let (columns, records, options) = input.into_parts()?;
    let artifact = blocking(move || export_to_csv(&records, &columns, &options)).await??;
    tracing::info!(filename = %artifact.filename, size = artifact.bytes.len(), "CSV export ready");
    Ok(Download(artifact))
}

// ── Import ───────────────────────────────────────────────────────────

/// A parsed import upload.
#[derive(Debug)]
pub struct ImportUpload {
    pub filename: Option<String>,
    pub bytes: Vec<u8>,
    pub rules: Vec<ValidationRule>,
}

fn upload_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(err.body_text())
    } else {
        AppError::BadRequest(err.body_text())
    }
}

/// Read the `file` field plus either `rules` (JSON) or `preset`.
async fn read_upload(mut multipart: Multipart) -> AppResult<ImportUpload> {
    let mut filename = None;
    let mut bytes = None;
    let mut rules_json = None;
    let mut preset_name = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(upload_error)?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            FILE_FIELD => {
                filename = field.file_name().map(str::to_string);
                let data = field
                    .bytes()
                    .await
                    .map_err(upload_error)?;
                bytes = Some(data.to_vec());
            }
            RULES_FIELD => {
                let text = field
                    .text()
                    .await
                    .map_err(upload_error)?;
                rules_json = Some(text);
            }
            PRESET_FIELD => {
                let text = field
                    .text()
                    .await
                    .map_err(upload_error)?;
                preset_name = Some(text.trim().to_string());
            }
            other => tracing::debug!(field = other, "Ignoring unknown multipart field"),
        }
    }

    let bytes = bytes.ok_or_else(|| AppError::BadRequest(format!("Missing '{FILE_FIELD}' field")))?;

    let rules = match (rules_json, preset_name) {
        (Some(json), _) => serde_json::from_str::<Vec<ValidationRule>>(&json)
            .map_err(|e| AppError::BadRequest(format!("Invalid rules: {e}")))?,
        (None, Some(name)) => find_preset(&name)?.rules,
        (None, None) => {
            return Err(AppError::BadRequest(format!(
                "Either '{RULES_FIELD}' or '{PRESET_FIELD}' is required"
            )))
        }
    };
    if rules.is_empty() {
        return Err(AppError::BadRequest("At least one rule is required".into()));
    }

    Ok(ImportUpload {
        filename,
        bytes,
        rules,
    })
}

fn log_import(format: &str, upload_name: Option<&str>, result: &ImportResult) {
    tracing::info!(
        format,
        file = upload_name.unwrap_or("-"),
        success = result.success,
        total = result.total_rows,
        valid = result.valid_rows,
        invalid = result.error_rows,
        "Import processed"
    );
}

/// POST /api/v1/bulk/import/xlsx
///
/// Always 200 once the upload is read: unreadable documents and bad rows are
/// reported inside the [`ImportResult`].
pub async fn import_xlsx(multipart: Multipart) -> AppResult<Json<DataResponse<ImportResult>>> {
    let upload = read_upload(multipart).await?;
    let filename = upload.filename.clone();
    let result = blocking(move || import_from_excel(&upload.bytes, &upload.rules, None)).await?;
    log_import("xlsx", filename.as_deref(), &result);
    Ok(Json(DataResponse { data: result }))
}

/// POST /api/v1/bulk/import/csv
pub async fn import_csv(multipart: Multipart) -> AppResult<Json<DataResponse<ImportResult>>> {
    let upload = read_upload(multipart).await?;
    let filename = upload.filename.clone();
    let result = blocking(move || import_from_csv(&upload.bytes, &upload.rules, None)).await?;
    log_import("csv", filename.as_deref(), &result);
    Ok(Json(DataResponse { data: result }))
}
