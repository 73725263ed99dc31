//! Shared response types for API handlers.
//!
//! JSON responses use a `{ "data": ... }` envelope. Generated documents are
//! sent as attachments through [`Download`].

use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use pesantren_core::bulk::ExportArtifact;
use serde::Serialize;

/// Standard `{ "data": T }` response envelope.
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}

/// A generated document returned as a file download.
#[derive(Debug)]
pub struct Download(pub ExportArtifact);

impl IntoResponse for Download {
    fn into_response(self) -> Response {
        let artifact = self.0;
        let disposition = format!("attachment; filename=\"{}\"", artifact.filename);
        (
            StatusCode::OK,
            [
                (CONTENT_TYPE, artifact.content_type().to_string()),
                (CONTENT_DISPOSITION, disposition),
            ],
            artifact.bytes,
        )
            .into_response()
    }
}
