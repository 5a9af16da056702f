use std::fs::File;
use std::io::{BufWriter, Seek, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{CertError, Result};

/// Zips `files` into `dest`, naming each entry by its base name.
pub fn create_zip(files: &[impl AsRef<Path>], dest: &Path) -> Result<()> {
    let writer = BufWriter::new(File::create(dest)?);
    write_zip(files, writer)?;
    Ok(())
}

pub fn write_zip<W: Write + Seek>(files: &[impl AsRef<Path>], writer: W) -> Result<W> {
    let mut zip = ZipWriter::new(writer);
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o644);

    for path in files {
        let path = path.as_ref();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| CertError::InvalidPath(path.display().to_string()))?;
        let content = std::fs::read(path)?;
        zip.start_file(name, options)?;
        zip.write_all(&content)?;
    }

    Ok(zip.finish()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Read};

    #[test]
    fn entries_use_base_names_and_deflate() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("batch");
        std::fs::create_dir_all(&nested).unwrap();
        let a = nested.join("Budi_sertifikat.pdf");
        let b = nested.join("Siti_sertifikat.pdf");
        std::fs::write(&a, b"%PDF-1.7 budi").unwrap();
        std::fs::write(&b, b"%PDF-1.7 siti").unwrap();

        let dest = dir.path().join("sertifikat.zip");
        create_zip(&[&a, &b], &dest).unwrap();

        let mut archive = zip::ZipArchive::new(File::open(&dest).unwrap()).unwrap();
        assert_eq!(archive.len(), 2);
        let mut entry = archive.by_name("Siti_sertifikat.pdf").unwrap();
        assert_eq!(entry.compression(), CompressionMethod::Deflated);
        let mut body = String::new();
        entry.read_to_string(&mut body).unwrap();
        assert_eq!(body, "%PDF-1.7 siti");
    }

    #[test]
    fn missing_input_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.pdf");
        let result = write_zip(&[missing], Cursor::new(Vec::new()));
        assert!(matches!(result, Err(CertError::Io(_))));
    }
}
