//! Word template access.
//!
//! Reports are produced by loading the school's `.docx` template, writing
//! into its top-level paragraphs and tables by position, and packing the
//! result. Positions follow python-docx conventions: table `n` is the n-th
//! table directly in the document body, rows and cells are zero-based.

use std::fs::File;
use std::path::{Path, PathBuf};

use docx_rs::{
    read_docx, AlignmentType, DocumentChild, Docx, Paragraph, ParagraphChild, Run, RunChild,
    RunFonts, Table, TableCell, TableCellContent, TableChild, TableRow, TableRowChild, WidthType,
};

use crate::error::ReportError;

pub const TEMPLATE_CANDIDATES: &[&str] = &["word_template - Copy.docx", "word_template.docx"];

const FONT: &str = "Arial";
/// Half-points, as Word stores them.
const BODY_FONT_SIZE: usize = 24;
const TABLE_FONT_SIZE: usize = 22;
/// Only the header, session and feedback tables get the house font.
const STYLED_TABLES: usize = 4;

/// First template candidate that exists under `dir`.
pub fn locate(dir: &Path) -> Option<PathBuf> {
    TEMPLATE_CANDIDATES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.is_file())
}

pub struct ReportDocument {
    docx: Docx,
}

impl ReportDocument {
    pub fn open(path: &Path) -> Result<Self, ReportError> {
        if !path.is_file() {
            return Err(ReportError::TemplateMissing(path.to_path_buf()));
        }
        let bytes = std::fs::read(path)
            .map_err(|e| ReportError::Template(format!("{}: {e}", path.display())))?;
        Self::from_bytes(&bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ReportError> {
        let docx = read_docx(bytes).map_err(|e| ReportError::Template(e.to_string()))?;
        Ok(Self { docx })
    }

    pub fn table_count(&self) -> usize {
        self.docx
            .document
            .children
            .iter()
            .filter(|c| matches!(c, DocumentChild::Table(_)))
            .count()
    }

    pub fn paragraph_texts(&self) -> Vec<String> {
        self.docx
            .document
            .children
            .iter()
            .filter_map(|c| match c {
                DocumentChild::Paragraph(p) => Some(paragraph_text(p)),
                _ => None,
            })
            .collect()
    }

    pub fn has_paragraph(&self, marker: &str) -> bool {
        self.paragraph_texts().iter().any(|t| t.contains(marker))
    }

    /// Appends `text` to every body paragraph containing `marker`; returns how
    /// many were touched.
    pub fn append_to_paragraphs(&mut self, marker: &str, text: &str) -> usize {
        let mut touched = 0;
        for child in self.docx.document.children.iter_mut() {
            if let DocumentChild::Paragraph(p) = child {
                let paragraph: &mut Paragraph = p;
                if !paragraph_text(paragraph).contains(marker) {
                    continue;
                }
                let taken = std::mem::replace(paragraph, Paragraph::new());
                *paragraph = taken.add_run(styled_run(text, Some(BODY_FONT_SIZE)));
                touched += 1;
            }
        }
        touched
    }

    pub fn row_count(&self, table: usize) -> Option<usize> {
        self.table(table).map(|t| t.rows.len())
    }

    /// Plain text of every cell, row by row.
    pub fn table_text(&self, table: usize) -> Option<Vec<Vec<String>>> {
        let table = self.table(table)?;
        Some(
            table
                .rows
                .iter()
                .map(|row| {
                    let row = match row {
                        TableChild::TableRow(row) => row,
                    };
                    row.cells
                        .iter()
                        .map(|cell| {
                            let cell = match cell {
                                TableRowChild::TableCell(cell) => cell,
                            };
                            cell_text(cell)
                        })
                        .collect()
                })
                .collect(),
        )
    }

    /// Replaces the content of one existing cell, keeping its paragraph
    /// formatting unless `align` overrides it.
    pub fn set_cell(
        &mut self,
        table: usize,
        row: usize,
        col: usize,
        text: &str,
        align: Option<AlignmentType>,
    ) -> Result<(), ReportError> {
        let size = (table < STYLED_TABLES).then_some(TABLE_FONT_SIZE);
        let target = self
            .table_mut(table)
            .ok_or_else(|| ReportError::Template(format!("table {table} does not exist")))?;
        let row_child = target.rows.get_mut(row).ok_or_else(|| {
            ReportError::Template(format!("table {table} has no row {row}"))
        })?;
        let row_ref = match row_child {
            TableChild::TableRow(r) => r,
        };
        let cell_child = row_ref.cells.get_mut(col).ok_or_else(|| {
            ReportError::Template(format!("table {table} row {row} has no cell {col}"))
        })?;
        let cell: &mut TableCell = match cell_child {
            TableRowChild::TableCell(c) => c,
        };

        let mut paragraph = Paragraph::new().add_run(styled_run(text, size));
        if let Some(property) = first_paragraph_property(cell) {
            paragraph.property = property;
        }
        if let Some(align) = align {
            paragraph = paragraph.align(align);
        }

        let mut taken = std::mem::replace(cell, TableCell::new());
        taken.children.clear();
        *cell = taken.add_paragraph(paragraph);
        Ok(())
    }

    /// Adds a row sized to the table's grid (or first row) and fills it from
    /// `values`; surplus values are ignored.
    pub fn append_row(&mut self, table: usize, values: &[String]) -> Result<(), ReportError> {
        let size = (table < STYLED_TABLES).then_some(TABLE_FONT_SIZE);
        let target = self
            .table_mut(table)
            .ok_or_else(|| ReportError::Template(format!("table {table} does not exist")))?;

        let widths: Vec<Option<usize>> = if target.grid.is_empty() {
            let columns = match target.rows.first() {
                Some(TableChild::TableRow(first)) => first.cells.len(),
                None => 0,
            };
            vec![None; columns]
        } else {
            target.grid.iter().map(|w| Some(*w)).collect()
        };
        if widths.is_empty() {
            return Err(ReportError::Template(format!(
                "table {table} has no columns to extend"
            )));
        }

        let cells: Vec<TableCell> = widths
            .iter()
            .enumerate()
            .map(|(i, width)| {
                let text = values.get(i).map(String::as_str).unwrap_or("");
                let cell = TableCell::new().add_paragraph(Paragraph::new().add_run(styled_run(text, size)));
                match width {
                    Some(w) => cell.width(*w, WidthType::Dxa),
                    None => cell,
                }
            })
            .collect();

        let taken = std::mem::replace(target, Table::new(vec![]));
        *target = taken.add_row(TableRow::new(cells));
        Ok(())
    }

    pub fn save(self, path: &Path) -> Result<(), ReportError> {
        let file = File::create(path).map_err(|e| ReportError::Save {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        self.docx.build().pack(file).map_err(|e| ReportError::Save {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    fn table(&self, index: usize) -> Option<&Table> {
        self.docx
            .document
            .children
            .iter()
            .filter_map(|c| match c {
                DocumentChild::Table(t) => Some(t.as_ref()),
                _ => None,
            })
            .nth(index)
    }

    fn table_mut(&mut self, index: usize) -> Option<&mut Table> {
        self.docx
            .document
            .children
            .iter_mut()
            .filter_map(|c| match c {
                DocumentChild::Table(t) => Some(t.as_mut()),
                _ => None,
            })
            .nth(index)
    }
}

fn styled_run(text: &str, size: Option<usize>) -> Run {
    let run = Run::new().add_text(text);
    match size {
        Some(size) => run
            .fonts(
                RunFonts::new()
                    .ascii(FONT)
                    .hi_ansi(FONT)
                    .east_asia(FONT)
                    .cs(FONT),
            )
            .size(size),
        None => run,
    }
}

fn paragraph_text(paragraph: &Paragraph) -> String {
    let mut buffer = String::new();
    for child in &paragraph.children {
        if let ParagraphChild::Run(run) = child {
            for rc in &run.children {
                if let RunChild::Text(t) = rc {
                    buffer.push_str(&t.text);
                }
            }
        }
    }
    buffer
}

fn cell_text(cell: &TableCell) -> String {
    cell.children
        .iter()
        .filter_map(|content| match content {
            TableCellContent::Paragraph(p) => Some(paragraph_text(p)),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn first_paragraph_property(cell: &TableCell) -> Option<docx_rs::ParagraphProperty> {
    cell.children.iter().find_map(|content| match content {
        TableCellContent::Paragraph(p) => Some(p.property.clone()),
        _ => None,
    })
}

/// Minimal eight-table template in the school's layout, for tests.
#[cfg(test)]
pub(crate) fn sample_template_bytes(table_count: usize) -> Vec<u8> {
    sample_template_with_blank_table(table_count, None)
}

/// Same layout, with table `blank` (if any) left without rows or columns.
#[cfg(test)]
pub(crate) fn sample_template_with_blank_table(table_count: usize, blank: Option<usize>) -> Vec<u8> {
    fn row(cells: usize) -> TableRow {
        TableRow::new(
            (0..cells)
                .map(|_| TableCell::new().add_paragraph(Paragraph::new()))
                .collect(),
        )
    }
    fn labelled(label: &str, cells: usize) -> TableRow {
        let mut all = vec![TableCell::new().add_paragraph(Paragraph::new().add_run(Run::new().add_text(label)))];
        all.extend((1..cells).map(|_| TableCell::new().add_paragraph(Paragraph::new())));
        TableRow::new(all)
    }

    let mut docx = Docx::new()
        .add_paragraph(Paragraph::new().add_run(Run::new().add_text("BÁO CÁO TIẾN ĐỘ")))
        .add_paragraph(
            Paragraph::new().add_run(Run::new().add_text("Tổng số bài học cho đến thời điểm báo cáo: ")),
        );

    let layouts: Vec<Table> = vec![
        Table::new(vec![labelled("Logo", 2)]),
        Table::new(vec![labelled("Lớp", 3), labelled("Khóa", 3), labelled("Ngày", 3)]),
        Table::new(vec![labelled("Tuần", 6), row(6), row(6), row(6)]),
        Table::new(vec![labelled("STT", 3)]),
        Table::new(vec![labelled("STT", 8)]),
        Table::new(vec![labelled("STT", 8)]),
        Table::new(vec![labelled("STT", 8)]),
        Table::new(vec![labelled("STT", 4)]),
    ];
    for (index, table) in layouts.into_iter().enumerate().take(table_count) {
        if blank == Some(index) {
            docx = docx.add_table(Table::new(vec![]));
        } else {
            docx = docx.add_table(table);
        }
    }
    docx = docx.add_paragraph(Paragraph::new().add_run(Run::new().add_text("Tóm tắt tình hình lớp:")));

    let mut buffer = std::io::Cursor::new(Vec::new());
    docx.build().pack(&mut buffer).unwrap();
    buffer.into_inner()
}
