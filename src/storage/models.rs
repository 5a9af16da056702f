use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchManifest {
    pub batch_id: String,
    pub created_at: DateTime<Utc>,
    pub start_number: String,
    pub template_filename: String,
    pub roster_filename: String,
    pub attributes: Vec<String>,
    pub certificates: Vec<CertificateRecord>,
    pub archive_filename: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CertificateRecord {
    pub index: usize,
    pub number: String,
    pub recipient: String,
    pub filename: String,
}

impl BatchManifest {
    pub fn certificate(&self, index: usize) -> Option<&CertificateRecord> {
        self.certificates.get(index)
    }

    pub fn has_certificate_file(&self, filename: &str) -> bool {
        self.certificates.iter().any(|c| c.filename == filename)
    }
}
