use context_core::{Error, FormatAttributes, Result};

const NARROW_COLUMN_THRESHOLD: usize = 4;

/// Parses headers, then emits a header row followed by each data row as a
/// human-readable line: column/value pairs when a row is wide, tab-joined
/// when narrow. Falls back to sniffing the first kilobyte if the
/// MIME-implied delimiter does not actually appear in the data (spec §4.1).
pub fn load(bytes: &[u8], mime_delimiter: u8) -> Result<super::LoadResult> {
    let delimiter = sniff_delimiter(bytes, mime_delimiter);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(bytes);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| Error::DecodeError(format!("csv headers: {e}")))?
        .iter()
        .map(|s| s.to_string())
        .collect();

    let mut text = String::new();
    text.push_str(&headers.join("\t"));
    text.push('\n');

    let mut row_count = 0u32;
    for record in reader.records() {
        let record = record.map_err(|e| Error::DecodeError(format!("csv row: {e}")))?;
        row_count += 1;
        text.push_str(&render_row(&headers, &record));
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

fn render_row(headers: &[String], record: &csv::StringRecord) -> String {
    if record.len() <= NARROW_COLUMN_THRESHOLD {
        record.iter().collect::<Vec<_>>().join("\t")
    } else {
        headers
            .iter()
            .zip(record.iter())
            .map(|(h, v)| format!("{h}: {v}"))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn sniff_delimiter(bytes: &[u8], mime_delimiter: u8) -> u8 {
    let sample = &bytes[..bytes.len().min(1024)];
    let counts = |b: u8| sample.iter().filter(|&&c| c == b).count();
    if counts(mime_delimiter) > 0 {
        return mime_delimiter;
    }
    let (comma, tab) = (counts(b','), counts(b'\t'));
    if tab > comma {
        b'\t'
    } else {
        b','
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn narrow_rows_are_tab_joined() {
        let bytes = b"a,b\n1,2\n3,4\n";
        let result = load(bytes, b',').unwrap();
        assert!(result.text.contains("1\t2"));
        assert_eq!(result.attributes.row_count, Some(2));
    }

    #[test]
    fn wide_rows_use_column_value_pairs() {
        let bytes = b"a,b,c,d,e\n1,2,3,4,5\n";
        let result = load(bytes, b',').unwrap();
        assert!(result.text.contains("a: 1"));
    }

    #[test]
    fn sniffs_tab_when_mime_says_comma_but_data_is_tsv() {
        let bytes = b"a\tb\n1\t2\n";
        let result = load(bytes, b',').unwrap();
        assert!(result.text.contains("1\t2"));
    }
}
