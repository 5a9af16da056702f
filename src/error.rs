use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CertError>;

#[derive(Debug, Error)]
pub enum CertError {
    // ── Files ───────────────────────────────────────────────────────────────
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid path component: {0}")]
    InvalidPath(String),

    #[error("Unsupported file type: {0}")]
    UnsupportedUpload(String),

    // ── Input data ──────────────────────────────────────────────────────────
    #[error("Spreadsheet error: {0}")]
    Spreadsheet(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Wrong spreadsheet format! Missing columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("The spreadsheet has no recipients")]
    EmptyRoster,

    #[error("Invalid layout: {0}")]
    InvalidLayout(String),

    // ── Output ──────────────────────────────────────────────────────────────
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("Template PDF is not usable: {0}")]
    Template(String),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Preview unavailable: {0}")]
    PreviewUnavailable(String),

    #[error("Preview rendering failed: {0}")]
    Render(String),

    #[error("Manifest error: {0}")]
    Manifest(#[from] serde_json::Error),

    #[error("Batch not found: {0}")]
    BatchNotFound(String),
}

impl CertError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            CertError::InvalidPath(_)
            | CertError::UnsupportedUpload(_)
            | CertError::MissingColumns(_)
            | CertError::EmptyRoster
            | CertError::InvalidLayout(_)
            | CertError::Spreadsheet(_)
            | CertError::Csv(_)
            | CertError::Template(_)
            | CertError::Pdf(_) => StatusCode::BAD_REQUEST,
            CertError::BatchNotFound(_) => StatusCode::NOT_FOUND,
            CertError::PreviewUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for CertError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("{}", self);
        }
        (status, self.to_string()).into_response()
    }
}

impl From<calamine::Error> for CertError {
    fn from(err: calamine::Error) -> Self {
        CertError::Spreadsheet(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_columns_lists_every_name() {
        let err = CertError::MissingColumns(vec!["NIP".into(), "Jabatan".into()]);
        assert_eq!(
            err.to_string(),
            "Wrong spreadsheet format! Missing columns: NIP, Jabatan"
        );
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn preview_errors_map_to_service_unavailable() {
        let err = CertError::PreviewUnavailable("no library".into());
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
