use context_core::{Error, FormatAttributes, Result};

/// Extracts text page by page, inserting `\n\n[Page K]\n` markers between
/// pages (K starting at 1). Empty pages still emit a marker (spec §4.1).
pub fn load(bytes: &[u8]) -> Result<super::LoadResult> {
    let pages = pdf_extract::extract_text_from_mem_by_pages(bytes)
        .map_err(|e| Error::DecodeError(format!("pdf: {e}")))?;

    let mut text = String::new();
    for (i, page) in pages.iter().enumerate() {
        text.push_str(&format!("\n\n[Page {}]\n", i + 1));
        text.push_str(page.trim_end());
    }

    Ok(super::LoadResult {
        text,
        attributes: FormatAttributes {
            page_count: Some(pages.len() as u32),
            row_count: None,
        },
    })
}

#[cfg(test)]
mod tests {
    // Exercised through integration fixtures (`tests/`); constructing a
    // minimal valid PDF byte stream here would duplicate pdf-extract's own
    // test suite.
}
