//! Route definitions for the `/bulk` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::bulk;
use crate::state::AppState;

/// Routes mounted at `/bulk`.
///
/// ```text
/// GET    /presets                  -> list_presets
/// GET    /presets/{name}           -> get_preset
/// GET    /presets/{name}/template  -> preset_template
/// POST   /template                 -> template
/// POST   /export/xlsx              -> export_xlsx
/// POST   /export/csv               -> export_csv
/// POST   /import/xlsx              -> import_xlsx   (multipart)
/// POST   /import/csv               -> import_csv    (multipart)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/presets", get(bulk::list_presets))
        .route("/presets/{name}", get(bulk::get_preset))
        .route("/presets/{name}/template", get(bulk::preset_template))
        .route("/template", post(bulk::template))
        .route("/export/xlsx", post(bulk::export_xlsx))
        .route("/export/csv", post(bulk::export_csv))
        .route("/import/xlsx", post(bulk::import_xlsx))
        .route("/import/csv", post(bulk::import_csv))
}
