mod models;

pub use models::*;

use chrono::Utc;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use uuid::Uuid;

use crate::error::{CertError, Result};

pub const MANIFEST_FILENAME: &str = "manifest.json";
pub const ARCHIVE_FILENAME: &str = "sertifikat.zip";
pub const TEMPLATE_FILENAME: &str = "template.pdf";

pub fn generate_batch_id() -> String {
    format!(
        "{}_{}",
        Utc::now().format("%Y%m%d"),
        &Uuid::new_v4().simple().to_string()[..8]
    )
}

pub fn ensure_dirs(upload_folder: &Path, output_folder: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(upload_folder)?;
    std::fs::create_dir_all(output_folder)?;
    Ok(())
}

/// Rejects anything that could escape its parent directory.
pub fn check_component(name: &str) -> Result<&str> {
    if name.is_empty()
        || name.contains("..")
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0')
    {
        return Err(CertError::InvalidPath(name.to_string()));
    }
    Ok(name)
}

pub fn batch_dir(output_folder: &Path, batch_id: &str) -> Result<PathBuf> {
    Ok(output_folder.join(check_component(batch_id)?))
}

/// Makes a recipient name usable as a file stem.
pub fn sanitize_file_stem(name: &str) -> String {
    static UNSAFE: OnceLock<Regex> = OnceLock::new();
    let unsafe_chars =
        UNSAFE.get_or_init(|| Regex::new(r#"[\\/:*?"<>|\x00-\x1f]+"#).expect("valid regex"));

    let cleaned = unsafe_chars.replace_all(name.trim(), "_");
    let cleaned = cleaned.trim_matches(|c: char| c == '.' || c.is_whitespace());
    cleaned.replace("..", "_")
}

/// Reduces a browser-supplied upload name to a safe base name, keeping its extension.
pub fn upload_file_name(raw: &str, fallback: &str) -> String {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or("");
    let (stem, ext) = match base.rsplit_once('.') {
        Some((stem, ext)) => (stem, Some(ext)),
        None => (base, None),
    };

    let stem = match sanitize_file_stem(stem) {
        s if s.is_empty() => fallback.to_string(),
        s => s,
    };
    match ext.map(sanitize_file_stem).filter(|e| !e.is_empty()) {
        Some(ext) => format!("{}.{}", stem, ext.to_lowercase()),
        None => stem,
    }
}

pub fn save_manifest(dir: &Path, manifest: &BatchManifest) -> Result<()> {
    let json = serde_json::to_vec_pretty(manifest)?;
    std::fs::write(dir.join(MANIFEST_FILENAME), json)?;
    Ok(())
}

pub fn load_manifest(output_folder: &Path, batch_id: &str) -> Result<BatchManifest> {
    let path = batch_dir(output_folder, batch_id)?.join(MANIFEST_FILENAME);
    let data = match std::fs::read(&path) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(CertError::BatchNotFound(batch_id.to_string()))
        }
        Err(e) => return Err(e.into()),
    };
    Ok(serde_json::from_slice(&data)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_ids_are_dated_and_short() {
        let id = generate_batch_id();
        let (date, suffix) = id.split_once('_').unwrap();
        assert_eq!(date.len(), 8);
        assert!(date.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(suffix.len(), 8);
        assert!(check_component(&id).is_ok());
    }

    #[test]
    fn traversal_components_are_rejected() {
        for bad in ["", "..", "../etc", "a/b", "a\\b"] {
            assert!(matches!(check_component(bad), Err(CertError::InvalidPath(_))), "{bad}");
        }
        assert!(check_component("Budi_sertifikat.pdf").is_ok());
    }

    #[test]
    fn file_stems_drop_separators_and_reserved_characters() {
        assert_eq!(sanitize_file_stem("  Budi Santoso "), "Budi Santoso");
        assert_eq!(sanitize_file_stem("A/B: C?"), "A_B_ C_");
        assert_eq!(sanitize_file_stem("../secret"), "_secret");
        assert_eq!(sanitize_file_stem("..."), "");
    }

    #[test]
    fn upload_names_keep_their_extension_but_lose_directories() {
        assert_eq!(upload_file_name("peserta..final.xlsx", "roster"), "peserta_final.xlsx");
        assert_eq!(upload_file_name("C:\\Users\\a\\peserta.XLSX", "roster"), "peserta.xlsx");
        assert_eq!(upload_file_name("../../etc/daftar.csv", "roster"), "daftar.csv");
        assert_eq!(upload_file_name("..csv", "roster"), "roster.csv");
        assert_eq!(upload_file_name("", "roster"), "roster");
        for name in ["peserta..final.xlsx", "C:\\a\\b.csv", "..csv"] {
            assert!(check_component(&upload_file_name(name, "roster")).is_ok());
        }
    }

    #[test]
    fn manifest_is_stored_in_the_batch_directory() {
        let output = tempfile::tempdir().unwrap();
        let id = "20261014_abcdef12";
        let dir = batch_dir(output.path(), id).unwrap();
        std::fs::create_dir_all(&dir).unwrap();

        let manifest = BatchManifest {
            batch_id: id.to_string(),
            created_at: Utc::now(),
            start_number: "045".to_string(),
            template_filename: "template.pdf".to_string(),
            roster_filename: "peserta.csv".to_string(),
            attributes: vec!["Nama".to_string()],
            certificates: vec![CertificateRecord {
                index: 0,
                number: "045.01".to_string(),
                recipient: "Budi".to_string(),
                filename: "Budi_sertifikat.pdf".to_string(),
            }],
            archive_filename: Some(ARCHIVE_FILENAME.to_string()),
        };
        save_manifest(&dir, &manifest).unwrap();

        let loaded = load_manifest(output.path(), id).unwrap();
        assert_eq!(loaded, manifest);
        assert!(loaded.has_certificate_file("Budi_sertifikat.pdf"));
        assert!(matches!(
            load_manifest(output.path(), "20261014_00000000"),
            Err(CertError::BatchNotFound(_))
        ));
    }
}
