use crate::error::{CertError, Result};

/// `"{start}.{NN}"` with the 1-based row index padded to two digits.
pub fn certificate_number(start: &str, index: usize) -> String {
    format!("{}.{:02}", start, index + 1)
}

pub fn validate_start_number(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(CertError::InvalidLayout(
            "starting certificate number is required".to_string(),
        ));
    }
    Ok(trimmed.to_string())
}
