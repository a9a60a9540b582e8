use std::io::Cursor;

use calamine::{Reader, Xlsx};
use context_core::{Error, FormatAttributes, Result};

/// For each sheet, emits a `# Sheet: <name>` banner followed by CSV-like
/// row serialization (spec §4.1).
pub fn load(bytes: &[u8]) -> Result<super::LoadResult> {
    let mut workbook: Xlsx<_> =
        Xlsx::new(Cursor::new(bytes)).map_err(|e| Error::DecodeError(format!("xlsx: {e}")))?;

    let sheet_names = workbook.sheet_names().to_vec();
    let mut text = String::new();
    let mut row_count = 0u32;

    for name in &sheet_names {
        let range = workbook
            .worksheet_range(name)
            .map_err(|e| Error::DecodeError(format!("xlsx sheet '{name}': {e}")))?;

        text.push_str(&format!("# Sheet: {name}\n"));
        for row in range.rows() {
            row_count += 1;
            let line = row
                .iter()
                .map(|cell| cell.to_string())
                .collect::<Vec<_>>()
                .join(",");
            text.push_str(&line);
            text.push('\n');
        }
        text.push('\n');
    }

    Ok(super::LoadResult {
        text,
        attributes: FormatAttributes {
            page_count: None,
            row_count: Some(row_count),
        },
    })
}
