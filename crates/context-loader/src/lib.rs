//! Decodes raw bytes plus a MIME/extension hint into canonical UTF-8 text,
//! per format, per spec §4.1.

mod csv_like;
mod docx;
mod pdf;
mod plain;
mod xlsx;

use context_core::{Error, FormatAttributes, Result};

/// Formats the loader can decode, independent of how the caller spelled
/// the MIME type or extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectedFormat {
    PlainText,
    Markdown,
    Pdf,
    Docx,
    Csv,
    Tsv,
    Xlsx,
}

impl DetectedFormat {
    /// Detects format from a MIME hint, falling back to the filename
    /// extension when the MIME is absent or generic.
    pub fn detect(mime: Option<&str>, filename: &str) -> Option<DetectedFormat> {
        if let Some(m) = mime {
            if let Some(f) = Self::from_mime(m) {
                return Some(f);
            }
        }
        Self::from_extension(filename)
    }

    fn from_mime(mime: &str) -> Option<DetectedFormat> {
        match mime {
            "text/plain" => Some(DetectedFormat::PlainText),
            "text/markdown" => Some(DetectedFormat::Markdown),
            "application/pdf" => Some(DetectedFormat::Pdf),
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
                Some(DetectedFormat::Docx)
            }
            "text/csv" => Some(DetectedFormat::Csv),
            "text/tab-separated-values" => Some(DetectedFormat::Tsv),
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => {
                Some(DetectedFormat::Xlsx)
            }
            _ => None,
        }
    }

    fn from_extension(filename: &str) -> Option<DetectedFormat> {
        let ext = filename.rsplit('.').next()?.to_ascii_lowercase();
        match ext.as_str() {
            "txt" => Some(DetectedFormat::PlainText),
            "md" => Some(DetectedFormat::Markdown),
            "pdf" => Some(DetectedFormat::Pdf),
            "docx" => Some(DetectedFormat::Docx),
            "csv" => Some(DetectedFormat::Csv),
            "tsv" => Some(DetectedFormat::Tsv),
            "xlsx" => Some(DetectedFormat::Xlsx),
            _ => None,
        }
    }
}

/// Canonical text plus whatever structural hints the format yields.
#[derive(Debug, Clone)]
pub struct LoadResult {
    pub text: String,
    pub attributes: FormatAttributes,
}

/// Default size ceiling enforced by callers before invoking the loader
/// (spec §4.1: "rejected upstream; loader assumes it fits in memory").
pub const DEFAULT_MAX_FILE_SIZE_BYTES: u64 = 50 * 1024 * 1024;

/// Decodes `bytes` according to `format`, producing canonical UTF-8 text.
pub fn load(format: DetectedFormat, bytes: &[u8]) -> Result<LoadResult> {
    match format {
        DetectedFormat::PlainText | DetectedFormat::Markdown => plain::load(bytes),
        DetectedFormat::Pdf => pdf::load(bytes),
        DetectedFormat::Docx => docx::load(bytes),
        DetectedFormat::Csv => csv_like::load(bytes, b','),
        DetectedFormat::Tsv => csv_like::load(bytes, b'\t'),
        DetectedFormat::Xlsx => xlsx::load(bytes),
    }
}

/// Top-level entry point: detect the format, enforce the size ceiling, and
/// load. Returns `UnsupportedFormat` when neither MIME nor extension match
/// a known format.
pub fn load_upload(
    mime: Option<&str>,
    filename: &str,
    bytes: &[u8],
    max_file_size_bytes: u64,
) -> Result<LoadResult> {
    if bytes.len() as u64 > max_file_size_bytes {
        return Err(Error::Oversize {
            size_bytes: bytes.len() as u64,
            limit_bytes: max_file_size_bytes,
        });
    }
    let format = DetectedFormat::detect(mime, filename).ok_or_else(|| {
        Error::UnsupportedFormat(format!(
            "mime={:?} filename={filename}",
            mime.unwrap_or("<none>")
        ))
    })?;
    load(format, bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_by_extension_when_mime_missing() {
        assert_eq!(
            DetectedFormat::detect(None, "report.md"),
            Some(DetectedFormat::Markdown)
        );
        assert_eq!(DetectedFormat::detect(None, "data.csv"), Some(DetectedFormat::Csv));
    }

    #[test]
    fn unknown_format_is_rejected() {
        let err = load_upload(None, "file.exe", b"MZ", DEFAULT_MAX_FILE_SIZE_BYTES).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat(_)));
    }

    #[test]
    fn oversize_is_rejected_before_decoding() {
        let err = load_upload(Some("text/plain"), "a.txt", b"hello", 2).unwrap_err();
        assert!(matches!(err, Error::Oversize { .. }));
    }
}
