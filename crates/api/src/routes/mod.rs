pub mod bulk;
pub mod health;

use axum::extract::DefaultBodyLimit;
use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /bulk/presets                      list built-in flows
/// /bulk/presets/{name}               columns + rules of a flow
/// /bulk/presets/{name}/template      template workbook of a flow
/// /bulk/template                     template workbook from JSON columns (POST)
/// /bulk/export/xlsx                  spreadsheet export (POST)
/// /bulk/export/csv                   CSV export (POST)
/// /bulk/import/xlsx                  spreadsheet import, multipart (POST)
/// /bulk/import/csv                   CSV import, multipart (POST)
/// ```
///
/// Request bodies (JSON exports and multipart uploads alike) are capped at
/// `max_upload_bytes`.
pub fn api_routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .nest("/bulk", bulk::router())
        .layer(DefaultBodyLimit::max(max_upload_bytes))
}
