use axum::{
    body::Body,
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

use crate::error::{CertError, Result};
use crate::preview::render_preview;
use crate::state::AppState;
use crate::storage::{batch_dir, check_component, load_manifest, BatchManifest, ARCHIVE_FILENAME};

pub async fn download_archive(
    State(state): State<Arc<AppState>>,
    Path(batch_id): Path<String>,
) -> Result<Response> {
    let manifest = load_manifest(&state.config.output_folder, &batch_id)?;
    let filename = manifest
        .archive_filename
        .as_deref()
        .unwrap_or(ARCHIVE_FILENAME);

    let path = batch_dir(&state.config.output_folder, &batch_id)?.join(check_component(filename)?);
    let content = tokio::fs::read(&path).await?;
    Ok(attachment(content, "application/zip", ARCHIVE_FILENAME))
}

pub async fn download_certificate(
    State(state): State<Arc<AppState>>,
    Path((batch_id, filename)): Path<(String, String)>,
) -> Result<Response> {
    let manifest = load_manifest(&state.config.output_folder, &batch_id)?;
    let filename = check_component(&filename)?;
    if !manifest.has_certificate_file(filename) {
        return Err(CertError::InvalidPath(filename.to_string()));
    }

    let path = batch_dir(&state.config.output_folder, &batch_id)?.join(filename);
    let content = tokio::fs::read(&path).await?;
    let mime = mime_guess::from_path(filename)
        .first_raw()
        .unwrap_or("application/octet-stream");
    Ok(attachment(content, mime, filename))
}

pub async fn preview_image(
    State(state): State<Arc<AppState>>,
    Path((batch_id, index)): Path<(String, usize)>,
) -> Result<Response> {
    let manifest = load_manifest(&state.config.output_folder, &batch_id)?;
    let record = manifest
        .certificate(index)
        .ok_or_else(|| CertError::BatchNotFound(format!("{} certificate {}", batch_id, index)))?;

    let path = batch_dir(&state.config.output_folder, &batch_id)?.join(&record.filename);
    let pdf = tokio::fs::read(&path).await?;

    let width = state.config.preview_width;
    let library_dir = state.config.pdfium_library_path.clone();
    let png = tokio::task::spawn_blocking(move || render_preview(&pdf, width, library_dir.as_deref()))
        .await
        .map_err(|e| CertError::Render(e.to_string()))??;

    Ok((
        [
            (header::CONTENT_TYPE, "image/png"),
            (header::CACHE_CONTROL, "no-store"),
        ],
        png,
    )
        .into_response())
}

pub async fn batch_status(
    State(state): State<Arc<AppState>>,
    Path(batch_id): Path<String>,
) -> Result<Json<BatchManifest>> {
    Ok(Json(load_manifest(&state.config.output_folder, &batch_id)?))
}

fn attachment(content: Vec<u8>, mime: &str, filename: &str) -> Response {
    (
        [
            (header::CONTENT_TYPE, mime.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename.replace('"', "")),
            ),
        ],
        Body::from(content),
    )
        .into_response()
}
