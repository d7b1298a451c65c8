//! HTTP routes for the file catalog.
//!
//! Served from the same listener as the socket endpoint. No authentication —
//! deployments front this with whatever access control they already have.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use matlist_protocol::Row;
use serde_json::json;

use crate::catalog::{Catalog, CatalogError};

impl IntoResponse for CatalogError {
    fn into_response(self) -> Response {
        let status = match &self {
            CatalogError::NotFound(_) => StatusCode::NOT_FOUND,
            CatalogError::InvalidFilename(_)
            | CatalogError::UnsupportedType(_)
            | CatalogError::Parse { .. } => StatusCode::BAD_REQUEST,
            CatalogError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Build the file-API router over a shared catalog.
pub fn router(catalog: Arc<Catalog>) -> Router {
    Router::new()
        .route("/files", get(list_files))
        .route(
            "/files/{name}",
            get(open_file)
                .put(save_file)
                .post(upload_file)
                .delete(delete_file),
        )
        .with_state(catalog)
}

async fn list_files(State(catalog): State<Arc<Catalog>>) -> Result<Response, CatalogError> {
    let files = catalog.list().await?;
    Ok(Json(json!({ "files": files })).into_response())
}

async fn open_file(
    State(catalog): State<Arc<Catalog>>,
    Path(name): Path<String>,
) -> Result<Response, CatalogError> {
    let rows = catalog.load(&name).await?;
    Ok(Json(json!({ "filename": name, "rows": rows })).into_response())
}

async fn save_file(
    State(catalog): State<Arc<Catalog>>,
    Path(name): Path<String>,
    Json(rows): Json<Vec<Row>>,
) -> Result<Response, CatalogError> {
    let entry = catalog.save(&name, &rows).await?;
    Ok(Json(json!({ "success": true, "file": entry })).into_response())
}

async fn upload_file(
    State(catalog): State<Arc<Catalog>>,
    Path(name): Path<String>,
    body: String,
) -> Result<Response, CatalogError> {
    let rows = catalog.import(&name, &body).await?;
    Ok(Json(json!({ "filename": name, "rows": rows })).into_response())
}

async fn delete_file(
    State(catalog): State<Arc<Catalog>>,
    Path(name): Path<String>,
) -> Result<Response, CatalogError> {
    catalog.delete(&name).await?;
    Ok(Json(json!({ "success": true })).into_response())
}
