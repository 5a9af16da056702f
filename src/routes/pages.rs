use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tera::Context;
use tracing::{error, info, warn};

use crate::config::parse_list;
use crate::error::{CertError, Result};
use crate::generate::{generate_batch, GenerationRequest};
use crate::layout::{
    CertificateLayout, FontFamily, DEFAULT_COLOR, DEFAULT_FONT_SIZE, DEFAULT_X, DEFAULT_Y,
    FONT_SIZE_RANGE, POSITION_RANGE,
};
use crate::numbering::validate_start_number;
use crate::roster::Roster;
use crate::state::AppState;
use crate::storage::{
    batch_dir, generate_batch_id, load_manifest, upload_file_name, TEMPLATE_FILENAME,
};

const ROSTER_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xls", "ods", "csv"];

// Checkbox lists repeat the `attributes` key, so the query is read as raw pairs.
pub async fn index(
    State(state): State<Arc<AppState>>,
    Query(query): Query<Vec<(String, String)>>,
) -> impl IntoResponse {
    let submitted: Vec<&str> = query
        .iter()
        .filter(|(key, _)| key == "attributes")
        .map(|(_, value)| value.as_str())
        .collect();
    let selected = if submitted.is_empty() {
        state.config.default_attributes.clone()
    } else {
        selected_attributes(&state, submitted)
    };
    render_form(&state, &selected, None, &HashMap::new())
}

/// Keeps the offered attribute choices in submission order, without repeats.
fn selected_attributes<'a>(state: &AppState, values: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let joined = values.into_iter().collect::<Vec<_>>().join(",");
    parse_list(&joined)
        .into_iter()
        .filter(|name| state.config.attribute_choices.contains(name))
        .collect()
}

struct Upload {
    filename: String,
    data: Vec<u8>,
}

#[derive(Default)]
struct GenerateForm {
    fields: HashMap<String, String>,
    attributes: Vec<String>,
    template: Option<Upload>,
    roster: Option<Upload>,
}

async fn read_form(mut multipart: Multipart) -> Result<GenerateForm> {
    let mut form = GenerateForm::default();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return Err(CertError::UnsupportedUpload(format!("malformed upload: {}", e))),
        };
        let name = field.name().unwrap_or("").to_string();
        let filename = field.file_name().map(str::to_string);

        match name.as_str() {
            "template" | "roster" => {
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| CertError::UnsupportedUpload(format!("upload failed: {}", e)))?
                    .to_vec();
                let upload = Upload {
                    filename: filename.unwrap_or_default(),
                    data,
                };
                if name == "template" {
                    form.template = Some(upload);
                } else {
                    form.roster = Some(upload);
                }
            }
            _ => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| CertError::UnsupportedUpload(format!("field {}: {}", name, e)))?;
                if name == "attributes" {
                    form.attributes.extend(parse_list(&text));
                } else {
                    form.fields.insert(name, text);
                }
            }
        }
    }

    Ok(form)
}

fn require_upload(upload: Option<Upload>, what: &str, extensions: &[&str]) -> Result<Upload> {
    let upload = match upload {
        Some(u) if !u.data.is_empty() => u,
        _ => return Err(CertError::UnsupportedUpload(format!("{} file is required", what))),
    };

    let ext = std::path::Path::new(&upload.filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();
    if !extensions.contains(&ext.as_str()) {
        return Err(CertError::UnsupportedUpload(format!(
            "{} must be one of: {}",
            what,
            extensions.join(", ")
        )));
    }
    Ok(upload)
}

pub async fn generate_handler(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Response {
    let form = match read_form(multipart).await {
        Ok(form) => form,
        Err(e) => {
            warn!("Rejected upload: {}", e);
            let selected = state.config.default_attributes.clone();
            return with_status(e.status_code(), render_form(&state, &selected, Some(&e), &HashMap::new()));
        }
    };

    let selected = selected_attributes(&state, form.attributes.iter().map(String::as_str));
    let fields = form.fields.clone();

    match run_generation(&state, form, &selected).await {
        Ok(batch_id) => Redirect::to(&format!("/batches/{}", batch_id)).into_response(),
        Err(e) => {
            if e.status_code().is_server_error() {
                error!("Certificate generation failed: {}", e);
            } else {
                warn!("Certificate generation rejected: {}", e);
            }
            with_status(e.status_code(), render_form(&state, &selected, Some(&e), &fields))
        }
    }
}

async fn run_generation(state: &AppState, form: GenerateForm, selected: &[String]) -> Result<String> {
    let template = require_upload(form.template, "Template (PDF)", &["pdf"])?;
    let roster_upload = require_upload(form.roster, "Participant list", ROSTER_EXTENSIONS)?;
    let start_number =
        validate_start_number(form.fields.get("start_number").map(String::as_str).unwrap_or(""))?;
    let layout = CertificateLayout::from_fields(&form.fields, selected)?;

    let batch_id = generate_batch_id();
    let roster_name = upload_file_name(&roster_upload.filename, "roster");
    let roster_path = state
        .config
        .upload_folder
        .join(format!("{}_{}", batch_id, roster_name));
    let output_dir = batch_dir(&state.config.output_folder, &batch_id)?;

    info!(
        "Batch {}: template {} ({} bytes), roster {}",
        batch_id,
        template.filename,
        template.data.len(),
        roster_name
    );

    let name_column = state.config.name_column.clone();
    let id = batch_id.clone();
    let dir = output_dir.clone();
    let upload_path = roster_path.clone();
    let result = async move {
        tokio::fs::create_dir_all(&dir).await?;
        tokio::fs::write(dir.join(TEMPLATE_FILENAME), &template.data).await?;
        tokio::fs::write(&upload_path, &roster_upload.data).await?;

        tokio::task::spawn_blocking(move || {
            let roster = Roster::from_path(&upload_path);
            if let Err(e) = std::fs::remove_file(&upload_path) {
                warn!("Could not remove {}: {}", upload_path.display(), e);
            }
            generate_batch(&GenerationRequest {
                batch_id: &id,
                output_dir: &dir,
                template: &template.data,
                template_filename: &template.filename,
                roster: &roster?,
                roster_filename: &roster_name,
                layout: &layout,
                start_number: &start_number,
                name_column: &name_column,
            })
        })
        .await
        .map_err(|e| CertError::Io(std::io::Error::other(e)))?
    }
    .await;

    if result.is_err() {
        for removal in [
            tokio::fs::remove_dir_all(&output_dir).await,
            tokio::fs::remove_file(&roster_path).await,
        ] {
            if let Err(e) = removal {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!("Could not clean up batch {}: {}", batch_id, e);
                }
            }
        }
    }

    result.map(|manifest| manifest.batch_id)
}

#[derive(Deserialize)]
pub struct BatchQuery {
    preview: Option<usize>,
}

pub async fn view_batch(
    State(state): State<Arc<AppState>>,
    Path(batch_id): Path<String>,
    Query(query): Query<BatchQuery>,
) -> Response {
    let manifest = match load_manifest(&state.config.output_folder, &batch_id) {
        Ok(m) => m,
        Err(CertError::BatchNotFound(_)) | Err(CertError::InvalidPath(_)) => {
            return Redirect::to("/").into_response()
        }
        Err(e) => return e.into_response(),
    };

    let last = manifest.certificates.len().saturating_sub(1);
    let preview_index = query.preview.unwrap_or(0).min(last);

    let mut ctx = Context::new();
    ctx.insert("batch_id", &manifest.batch_id);
    ctx.insert("count", &manifest.certificates.len());
    ctx.insert("certificates", &manifest.certificates);
    ctx.insert("preview_index", &preview_index);
    ctx.insert("preview", &manifest.certificate(preview_index));
    ctx.insert("archive_filename", &manifest.archive_filename);

    render_template("batch.html", ctx).into_response()
}

#[derive(Serialize)]
struct AttributeField {
    name: String,
    field: FieldDefaults,
}

#[derive(Serialize)]
struct FieldDefaults {
    x: String,
    y: String,
    size: String,
    font: String,
    color: String,
    bold: bool,
}

impl FieldDefaults {
    fn for_prefix(prefix: &str, submitted: &HashMap<String, String>) -> Self {
        let value = |key: &str, default: String| {
            submitted
                .get(&format!("{}.{}", prefix, key))
                .filter(|v| !v.trim().is_empty())
                .cloned()
                .unwrap_or(default)
        };
        Self {
            x: value("x", DEFAULT_X.to_string()),
            y: value("y", DEFAULT_Y.to_string()),
            size: value("size", DEFAULT_FONT_SIZE.to_string()),
            font: value("font", FontFamily::default().id().to_string()),
            color: value("color", DEFAULT_COLOR.to_string()),
            bold: submitted.contains_key(&format!("{}.bold", prefix)),
        }
    }
}

fn render_form(
    state: &AppState,
    selected: &[String],
    error: Option<&CertError>,
    submitted: &HashMap<String, String>,
) -> Html<String> {
    let fonts: Vec<&str> = FontFamily::ALL.iter().map(|f| f.id()).collect();
    let attributes: Vec<AttributeField> = selected
        .iter()
        .map(|name| AttributeField {
            name: name.clone(),
            field: FieldDefaults::for_prefix(name, submitted),
        })
        .collect();

    let mut ctx = Context::new();
    ctx.insert("attribute_choices", &state.config.attribute_choices);
    ctx.insert("selected", &selected.join(","));
    ctx.insert("selected_attributes", selected);
    ctx.insert("attributes", &attributes);
    ctx.insert("number", &FieldDefaults::for_prefix(crate::layout::NUMBER_KEY, submitted));
    ctx.insert("fonts", &fonts);
    ctx.insert("position_max", &(POSITION_RANGE.1 as u32));
    ctx.insert("size_min", &(FONT_SIZE_RANGE.0 as u32));
    ctx.insert("size_max", &(FONT_SIZE_RANGE.1 as u32));
    ctx.insert(
        "start_number",
        submitted.get("start_number").map(String::as_str).unwrap_or(""),
    );
    ctx.insert("error", &error.map(|e| e.to_string()));

    render_template("index.html", ctx)
}

fn with_status(status: StatusCode, page: Html<String>) -> Response {
    (status, page).into_response()
}

fn render_template(name: &str, ctx: Context) -> Html<String> {
    let tera = crate::templates::get_tera();
    let rendered = tera.render(name, &ctx).unwrap_or_else(|e| {
        error!("Template {} failed to render: {}", name, e);
        format!("Template error: {}", name)
    });
    Html(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::pdf::tests::template_pdf;
    use std::path::{Path, PathBuf};

    fn state() -> AppState {
        state_in(Path::new("uploads"), Path::new("generated_certificates"))
    }

    fn state_in(upload_folder: &Path, output_folder: &Path) -> AppState {
        AppState {
            config: Arc::new(Config {
                upload_folder: upload_folder.to_path_buf(),
                output_folder: output_folder.to_path_buf(),
                pdfium_library_path: None,
                preview_width: 800,
                max_upload_bytes: 1024,
                attribute_choices: vec!["Nama".into(), "NIP".into(), "Jabatan".into()],
                default_attributes: vec!["Nama".into(), "NIP".into()],
                name_column: "Nama".into(),
                host: "127.0.0.1".into(),
                port: 0,
            }),
        }
    }

    fn upload(filename: &str, data: &[u8]) -> Option<Upload> {
        Some(Upload {
            filename: filename.to_string(),
            data: data.to_vec(),
        })
    }

    #[test]
    fn uploads_are_checked_for_presence_and_extension() {
        assert!(require_upload(upload("Template.PDF", b"%PDF"), "Template", &["pdf"]).is_ok());
        assert!(matches!(
            require_upload(upload("template.docx", b"x"), "Template", &["pdf"]),
            Err(CertError::UnsupportedUpload(_))
        ));
        assert!(matches!(
            require_upload(upload("peserta.xlsx", b""), "Participant list", ROSTER_EXTENSIONS),
            Err(CertError::UnsupportedUpload(_))
        ));
        assert!(require_upload(None, "Template", &["pdf"]).is_err());
    }

    #[test]
    fn form_renders_controls_for_each_selected_attribute() {
        let selected = vec!["Nama".to_string(), "Jabatan".to_string()];
        let mut submitted = HashMap::new();
        submitted.insert("Jabatan.x".to_string(), "321".to_string());
        submitted.insert("start_number".to_string(), "045".to_string());
        let error = CertError::MissingColumns(vec!["Jabatan".to_string()]);

        let Html(page) = render_form(&state(), &selected, Some(&error), &submitted);

        assert!(page.contains(r#"name="number.x""#));
        assert!(page.contains(r#"name="Nama.font""#));
        assert!(page.contains(r#"name="Jabatan.x" min="0" max="500" step="1" value="321""#));
        assert!(page.contains(r#"value="045""#));
        assert!(page.contains("Missing columns: Jabatan"));
        assert!(!page.contains(r#"name="NIP.x""#));
    }

    #[test]
    fn attribute_choices_render_as_checkboxes() {
        let selected = vec!["NIP".to_string()];
        let Html(page) = render_form(&state(), &selected, None, &HashMap::new());

        assert!(page.contains(r#"type="checkbox" name="attributes" value="NIP" checked"#));
        assert!(page.contains(r#"type="checkbox" name="attributes" value="Jabatan">"#));
        assert!(page.contains(r#"type="hidden" name="attributes" value="NIP""#));
    }

    #[test]
    fn selection_keeps_only_offered_choices() {
        let selected = selected_attributes(&state(), ["Jabatan", "", "number", "Nama,Jabatan", "Alamat"]);
        assert_eq!(selected, vec!["Jabatan", "Nama"]);
    }

    fn generation_form(roster_filename: &str, roster: &str) -> GenerateForm {
        let mut fields = HashMap::new();
        fields.insert("start_number".to_string(), "045".to_string());
        GenerateForm {
            fields,
            attributes: vec!["Nama".to_string()],
            template: upload("sertifikat.pdf", &template_pdf()),
            roster: upload(roster_filename, roster.as_bytes()),
        }
    }

    fn entries(dir: &Path) -> Vec<PathBuf> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect()
    }

    #[tokio::test]
    async fn dotted_roster_names_are_accepted_and_the_upload_copy_removed() {
        let uploads = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let state = state_in(uploads.path(), output.path());
        let form = generation_form("peserta..final.csv", "Nama\nBudi\nSiti\n");

        let batch_id = run_generation(&state, form, &["Nama".to_string()]).await.unwrap();

        let manifest = load_manifest(output.path(), &batch_id).unwrap();
        assert_eq!(manifest.roster_filename, "peserta_final.csv");
        assert_eq!(manifest.certificates.len(), 2);
        assert!(output.path().join(&batch_id).join(TEMPLATE_FILENAME).exists());
        assert!(entries(uploads.path()).is_empty());
    }

    #[tokio::test]
    async fn failed_generation_leaves_no_batch_or_upload_behind() {
        let uploads = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let state = state_in(uploads.path(), output.path());
        let form = generation_form("C:\\Users\\a\\peserta.csv", "NIP\n1985\n");

        let err = run_generation(&state, form, &["Nama".to_string()]).await.unwrap_err();

        assert!(matches!(err, CertError::MissingColumns(_)));
        assert!(entries(output.path()).is_empty());
        assert!(entries(uploads.path()).is_empty());
    }

    #[tokio::test]
    async fn truncated_text_fields_are_rejected() {
        use axum::extract::FromRequest;

        let body = "--X\r\nContent-Disposition: form-data; name=\"start_number\"\r\n\r\n045";
        let request = axum::http::Request::builder()
            .method("POST")
            .header("content-type", "multipart/form-data; boundary=X")
            .body(axum::body::Body::from(body))
            .unwrap();
        let multipart = Multipart::from_request(request, &()).await.unwrap();

        assert!(matches!(read_form(multipart).await, Err(CertError::UnsupportedUpload(_))));
    }
}
