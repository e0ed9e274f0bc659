//! Temp storage for uploaded PDFs.
//!
//! Uploads land as plain files in a process-owned temp directory and are
//! addressed by an opaque temp id. A periodic purge removes files older than
//! the configured horizon; a successful fill removes its source immediately.

use std::path::{Path, PathBuf};
use std::time::Duration;

use axum::extract::Multipart;

pub struct UploadedPdf {
    pub filename: String,
    pub data: Vec<u8>,
}

/// Pull the first file part out of a multipart body.
///
/// Accepts any part name; the reference frontend sends `pdf`. Errors are
/// user-facing strings for the 400 reply.
pub async fn read_pdf_part(
    multipart: &mut Multipart,
    max_bytes: usize,
) -> Result<UploadedPdf, String> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| format!("Ungültiger Upload: {e}"))?
    {
        if field.file_name().is_none() {
            continue;
        }
        let filename = field
            .file_name()
            .map(sanitize_filename)
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| "upload.pdf".to_string());
        let data = field
            .bytes()
            .await
            .map_err(|e| format!("Upload abgebrochen: {e}"))?
            .to_vec();

        if data.len() > max_bytes {
            return Err(format!(
                "Die Datei ist zu groß (maximal {} MB).",
                max_bytes / (1024 * 1024)
            ));
        }
        if !is_pdf(&data) {
            return Err("Nur PDF-Dateien werden unterstützt.".to_string());
        }
        return Ok(UploadedPdf { filename, data });
    }
    Err("Keine Datei im Upload gefunden.".to_string())
}

/// PDF files start with the `%PDF-` magic.
pub fn is_pdf(data: &[u8]) -> bool {
    data.starts_with(b"%PDF-")
}

/// Keep only filesystem-safe characters and bound the length.
///
/// Dot runs are collapsed and leading dots dropped: the name becomes part of
/// a temp id, and ids containing `..` are rejected by [`resolve_temp`].
pub fn sanitize_filename(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .take(64)
        .collect();
    while out.contains("..") {
        out = out.replace("..", ".");
    }
    out.trim_start_matches('.').to_string()
}

/// Write the upload to disk and return its temp id (which is the file name).
pub fn save_upload(dir: &Path, file: &UploadedPdf) -> std::io::Result<String> {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let temp_id = format!("upload_{:x}_{}", nanos, file.filename);
    std::fs::write(dir.join(&temp_id), &file.data)?;
    Ok(temp_id)
}

/// Resolve a temp id back to its path. Ids are single path components;
/// anything that could escape the upload dir is rejected.
pub fn resolve_temp(dir: &Path, temp_id: &str) -> Option<PathBuf> {
    if temp_id.is_empty()
        || temp_id.contains('/')
        || temp_id.contains('\\')
        || temp_id.contains("..")
    {
        return None;
    }
    let path = dir.join(temp_id);
    path.is_file().then_some(path)
}

/// Delete uploads older than `ttl`. Returns how many were removed.
pub fn purge_expired(dir: &Path, ttl: Duration) -> usize {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return 0;
    };
    let mut removed = 0;
    for entry in entries.flatten() {
        let expired = entry
            .metadata()
            .and_then(|m| m.modified())
            .ok()
            .and_then(|t| t.elapsed().ok())
            .is_some_and(|age| age > ttl);
        if expired && std::fs::remove_file(entry.path()).is_ok() {
            removed += 1;
        }
    }
    removed
}
