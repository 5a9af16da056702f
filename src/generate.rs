use chrono::Utc;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::archive::create_zip;
use crate::error::{CertError, Result};
use crate::layout::CertificateLayout;
use crate::numbering::certificate_number;
use crate::pdf::{stamp_first_page, TextStamp};
use crate::roster::Roster;
use crate::storage::{
    sanitize_file_stem, save_manifest, BatchManifest, CertificateRecord, ARCHIVE_FILENAME,
};

const OUTPUT_SUFFIX: &str = "_sertifikat.pdf";

pub struct GenerationRequest<'a> {
    pub batch_id: &'a str,
    pub output_dir: &'a Path,
    pub template: &'a [u8],
    pub template_filename: &'a str,
    pub roster: &'a Roster,
    pub roster_filename: &'a str,
    pub layout: &'a CertificateLayout,
    pub start_number: &'a str,
    pub name_column: &'a str,
}

/// Stamps one certificate per roster row, zips them and records the batch manifest.
pub fn generate_batch(req: &GenerationRequest<'_>) -> Result<BatchManifest> {
    req.roster.require_columns(&req.layout.attribute_names())?;
    if req.roster.is_empty() {
        return Err(CertError::EmptyRoster);
    }

    std::fs::create_dir_all(req.output_dir)?;

    let mut used_names = HashSet::new();
    let mut records = Vec::with_capacity(req.roster.len());
    let mut paths: Vec<PathBuf> = Vec::with_capacity(req.roster.len());

    for (index, row) in req.roster.rows.iter().enumerate() {
        let number = certificate_number(req.start_number, index);

        let mut stamps = Vec::with_capacity(req.layout.attributes.len() + 1);
        stamps.push(TextStamp::new(number.clone(), req.layout.number));
        for (attribute, placement) in &req.layout.attributes {
            stamps.push(TextStamp::new(row.get(attribute), *placement));
        }

        let pdf = stamp_first_page(req.template, &stamps)?;

        let recipient = row.get(req.name_column).trim().to_string();
        let filename = output_filename(&recipient, &number, index, &mut used_names);
        let path = req.output_dir.join(&filename);
        std::fs::write(&path, pdf)?;

        records.push(CertificateRecord {
            index,
            number,
            recipient,
            filename,
        });
        paths.push(path);
    }

    create_zip(&paths, &req.output_dir.join(ARCHIVE_FILENAME))?;

    let manifest = BatchManifest {
        batch_id: req.batch_id.to_string(),
        created_at: Utc::now(),
        start_number: req.start_number.to_string(),
        template_filename: req.template_filename.to_string(),
        roster_filename: req.roster_filename.to_string(),
        attributes: req
            .layout
            .attribute_names()
            .into_iter()
            .map(str::to_string)
            .collect(),
        certificates: records,
        archive_filename: Some(ARCHIVE_FILENAME.to_string()),
    };
    save_manifest(req.output_dir, &manifest)?;

    info!(
        "Batch {} generated {} certificates",
        req.batch_id,
        manifest.certificates.len()
    );
    Ok(manifest)
}

// Name from the recipient column, falling back to the certificate number; never reuses a name.
fn output_filename(
    recipient: &str,
    number: &str,
    index: usize,
    used: &mut HashSet<String>,
) -> String {
    let stem = [recipient, number]
        .into_iter()
        .map(sanitize_file_stem)
        .find(|s| !s.is_empty())
        .unwrap_or_else(|| format!("certificate_{}", index + 1));

    let mut candidate = format!("{}{}", stem, OUTPUT_SUFFIX);
    let mut n = 2;
    while used.contains(&candidate) {
        candidate = format!("{}_{}{}", stem, n, OUTPUT_SUFFIX);
        n += 1;
    }
    used.insert(candidate.clone());
    candidate
}
