use context_core::{Error, FormatAttributes, Result};
use docx_rs::{read_docx, DocumentChild, ParagraphChild, RunChild, TableCellContent, TableChild, TableRowChild};

/// Concatenates body paragraphs in document order; for each table, emits
/// rows as tab-separated lines followed by a blank line (spec §4.1).
pub fn load(bytes: &[u8]) -> Result<super::LoadResult> {
    let docx = read_docx(bytes).map_err(|e| Error::DecodeError(format!("docx: {e}")))?;

    let mut text = String::new();
    for child in &docx.document.children {
        match child {
            DocumentChild::Paragraph(p) => {
                text.push_str(&paragraph_text(&p.children));
                text.push('\n');
            }
            DocumentChild::Table(t) => {
                text.push_str(&table_text(t));
                text.push('\n');
            }
            _ => {}
        }
    }

    Ok(super::LoadResult {
        text,
        attributes: FormatAttributes::default(),
    })
}

fn paragraph_text(children: &[ParagraphChild]) -> String {
    let mut s = String::new();
    for child in children {
        if let ParagraphChild::Run(run) = child {
            for rc in &run.children {
                if let RunChild::Text(t) = rc {
                    s.push_str(&t.text);
                }
            }
        }
    }
    s
}

fn table_text(table: &docx_rs::Table) -> String {
    let mut s = String::new();
    for row_child in &table.rows {
        let TableChild::TableRow(row) = row_child;
        let mut cells = Vec::new();
        for cell_child in &row.cells {
            let TableRowChild::TableCell(cell) = cell_child;
            let mut cell_text = String::new();
            for content in &cell.children {
                if let TableCellContent::Paragraph(p) = content {
                    cell_text.push_str(&paragraph_text(&p.children));
                }
            }
            cells.push(cell_text);
        }
        s.push_str(&cells.join("\t"));
        s.push('\n');
    }
    s
}
