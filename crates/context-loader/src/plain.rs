use context_core::{FormatAttributes, Result};

/// UTF-8 decode with BOM stripping and replacement-character substitution
/// for invalid bytes, then normalize line endings to `\n`.
pub fn load(bytes: &[u8]) -> Result<super::LoadResult> {
    let without_bom = strip_bom(bytes);
    let decoded = String::from_utf8_lossy(without_bom).into_owned();
    let normalized = normalize_newlines(&decoded);
    Ok(super::LoadResult {
        text: normalized,
        attributes: FormatAttributes::default(),
    })
}

fn strip_bom(bytes: &[u8]) -> &[u8] {
    const BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];
    if bytes.starts_with(&BOM) {
        &bytes[3..]
    } else {
        bytes
    }
}

fn normalize_newlines(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}
