use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use crate::domain::DomainError;

const MAX_FILENAME_CHARS: usize = 128;

/// Replaces anything outside `[A-Za-z0-9_.-]` with `_` and caps the length.
/// An empty name becomes `"file"`.
pub fn safe_filename(name: &str) -> String {
    static UNSAFE: OnceLock<Regex> = OnceLock::new();
    let unsafe_chars =
        UNSAFE.get_or_init(|| Regex::new(r"[^A-Za-z0-9_\-.]").expect("filename pattern is valid"));

    if name.is_empty() {
        return "file".to_string();
    }
    unsafe_chars
        .replace_all(name, "_")
        .chars()
        .take(MAX_FILENAME_CHARS)
        .collect()
}

/// Writes an uploaded payload to `dest`, creating its directory first.
pub async fn save_upload(bytes: &[u8], dest: &Path, max_bytes: usize) -> Result<(), DomainError> {
    if bytes.len() > max_bytes {
        return Err(DomainError::TooLarge("Uploaded file too large".to_string()));
    }
    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(dest, bytes).await?;
    Ok(())
}
