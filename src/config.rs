use std::path::PathBuf;

#[derive(Clone, Debug)]
pub struct Config {
    pub upload_folder: PathBuf,
    pub output_folder: PathBuf,
    pub pdfium_library_path: Option<PathBuf>,
    pub preview_width: u16,
    pub max_upload_bytes: usize,
    pub attribute_choices: Vec<String>,
    pub default_attributes: Vec<String>,
    pub name_column: String,
    pub host: String,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        dotenvy::dotenv().ok();

        let base_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let upload_folder = base_dir.join(
            std::env::var("UPLOAD_FOLDER").unwrap_or_else(|_| "uploads".to_string()),
        );
        let output_folder = base_dir.join(
            std::env::var("OUTPUT_FOLDER").unwrap_or_else(|_| "generated_certificates".to_string()),
        );
        let pdfium_library_path = std::env::var("PDFIUM_LIBRARY_PATH").ok().map(PathBuf::from);

        let preview_width: u16 = std::env::var("PREVIEW_WIDTH")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|w| *w > 0)
            .unwrap_or(1000);
        let max_upload_mb: usize = std::env::var("MAX_UPLOAD_MB")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(25);

        let attribute_choices = parse_list(
            &std::env::var("ATTRIBUTE_CHOICES")
                .unwrap_or_else(|_| "Nama,NIP,Jabatan,Tanggal,Alamat".to_string()),
        );
        let default_attributes =
            parse_list(&std::env::var("DEFAULT_ATTRIBUTES").unwrap_or_else(|_| "Nama,NIP".to_string()));
        let name_column = std::env::var("NAME_COLUMN").unwrap_or_else(|_| "Nama".to_string());

        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "8501".to_string())
            .parse()
            .unwrap_or(8501);

        Ok(Self {
            upload_folder,
            output_folder,
            pdfium_library_path,
            preview_width,
            max_upload_bytes: max_upload_mb * 1024 * 1024,
            attribute_choices,
            default_attributes,
            name_column,
            host,
            port,
        })
    }
}

/// Splits a comma-separated list, dropping blanks and duplicates while keeping order.
pub fn parse_list(raw: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for item in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if !out.iter().any(|existing| existing == item) {
            out.push(item.to_string());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::parse_list;

    #[test]
    fn parse_list_trims_and_dedupes() {
        assert_eq!(parse_list(" Nama, NIP ,,Nama,Jabatan "), vec!["Nama", "NIP", "Jabatan"]);
        assert!(parse_list("  ").is_empty());
    }
}
