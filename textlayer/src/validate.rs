//! Upload validation, ordered cheapest-first: filename extension before any
//! disk work, byte length once the body is read, page count after staging.

use std::path::Path;

use crate::error::{OcrJobError, Result};

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Filename must end in `.pdf`, case-insensitive. Runs before a workspace
/// is allocated.
pub fn check_filename(filename: &str) -> Result<()> {
    if filename.to_lowercase().ends_with(".pdf") {
        Ok(())
    } else {
        Err(OcrJobError::InvalidFileType)
    }
}

/// Byte length must not exceed the configured ceiling. The reported actual
/// size rounds up so a rejected upload always shows actual > limit.
pub fn check_size(len_bytes: u64, max_upload_mb: u64) -> Result<()> {
    if len_bytes > max_upload_mb * BYTES_PER_MB {
        Err(OcrJobError::FileTooLarge {
            actual_mb: len_bytes.div_ceil(BYTES_PER_MB),
            limit_mb: max_upload_mb,
        })
    } else {
        Ok(())
    }
}

/// Page count parsed from the document's structural metadata, never
/// rendered. A document that cannot be parsed at all is rejected as
/// corrupt; the ceiling itself is best-effort, not safety-critical.
pub fn check_page_count(path: &Path, max_pages: usize) -> Result<()> {
    let doc = lopdf::Document::load(path).map_err(|e| {
        tracing::warn!(path = %path.display(), error = %e, "Failed to parse PDF structure");
        OcrJobError::CorruptDocument
    })?;

    let actual = doc.get_pages().len();
    if actual > max_pages {
        return Err(OcrJobError::TooManyPages {
            actual,
            limit: max_pages,
        });
    }
    Ok(())
}
