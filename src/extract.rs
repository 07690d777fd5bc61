//! Multi-format text extraction for uploaded documents.
//!
//! The format is chosen from the file extension alone (no content
//! sniffing). PDFs become their page texts concatenated in page order;
//! spreadsheets and CSV files are read into a [`Table`] and rendered by the
//! [tabular normalizer](crate::tabular::normalize).
//!
//! Extraction is stateless: the output is a pure function of the bytes and
//! the format.

use std::io::Cursor;
use std::path::Path;

use calamine::{Data, Range, Reader};
use serde::Serialize;

use crate::error::ExtractError;
use crate::tabular::{self, Table};

/// Supported document formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Pdf,
    Xlsx,
    Xls,
    Csv,
}

impl DocumentFormat {
    /// Every accepted format, in the order uploads are usually described.
    pub const ALL: [DocumentFormat; 4] = [Self::Pdf, Self::Xlsx, Self::Xls, Self::Csv];

    /// Resolve a format from a bare extension (case-insensitive).
    pub fn from_extension(ext: &str) -> Result<Self, ExtractError> {
        let ext = ext.to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|format| format.as_str() == ext)
            .ok_or(ExtractError::UnsupportedFormat(ext))
    }

    /// Resolve a format from a file name such as `report.PDF`.
    pub fn from_file_name(file_name: &str) -> Result<Self, ExtractError> {
        let ext = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");
        Self::from_extension(ext)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Xlsx => "xlsx",
            Self::Xls => "xls",
            Self::Csv => "csv",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Pdf => "PDF",
            Self::Xlsx | Self::Xls => "spreadsheet",
            Self::Csv => "CSV",
        }
    }
}

impl std::fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An uploaded file: its name (for the extension) and raw content.
#[derive(Debug, Clone)]
pub struct Document {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl Document {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }

    pub fn format(&self) -> Result<DocumentFormat, ExtractError> {
        DocumentFormat::from_file_name(&self.file_name)
    }
}

/// Extract normalized text from a document, dispatching on its extension.
pub fn extract(doc: &Document) -> Result<String, ExtractError> {
    extract_text(&doc.bytes, doc.format()?)
}

/// Extract normalized text from raw bytes of a known format.
pub fn extract_text(bytes: &[u8], format: DocumentFormat) -> Result<String, ExtractError> {
    match format {
        DocumentFormat::Pdf => extract_pdf(bytes),
        DocumentFormat::Xlsx | DocumentFormat::Xls => {
            let table = read_spreadsheet(bytes, format)?;
            Ok(tabular::normalize(&table))
        }
        DocumentFormat::Csv => {
            let table = read_csv(bytes)?;
            Ok(tabular::normalize(&table))
        }
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    let label = DocumentFormat::Pdf.label();
    // pdf-extract panics on some malformed inputs instead of returning Err.
    let pages = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem_by_pages(bytes))
        .map_err(|_| ExtractError::failure(label, "parser aborted on malformed input"))?
        .map_err(|e| ExtractError::failure(label, e))?;
    Ok(pages.concat())
}

/// Read a delimited-text file with a header row.
pub fn read_csv(bytes: &[u8]) -> Result<Table, ExtractError> {
    let label = DocumentFormat::Csv.label();
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);

    let columns: Vec<String> = reader
        .headers()
        .map_err(|e| ExtractError::failure(label, e))?
        .iter()
        .enumerate()
        .map(|(i, h)| header_name(i, tabular::cell(h)))
        .collect();

    let mut table = Table::new(columns);
    for record in reader.records() {
        let record = record.map_err(|e| ExtractError::failure(label, e))?;
        table.push_row(record.iter().map(tabular::cell).collect());
    }
    Ok(table)
}

/// Read the first worksheet of an xlsx/xls workbook.
pub fn read_spreadsheet(bytes: &[u8], format: DocumentFormat) -> Result<Table, ExtractError> {
    let label = format.label();
    let mut workbook = calamine::open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|e| ExtractError::failure(label, e))?;

    let sheet = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| ExtractError::failure(label, "workbook has no worksheets"))?;
    let range = workbook
        .worksheet_range(&sheet)
        .map_err(|e| ExtractError::failure(label, e))?;

    Ok(table_from_range(&range))
}

/// Convert a worksheet range into a [`Table`], using its first row as the header.
pub fn table_from_range(range: &Range<Data>) -> Table {
    let mut rows = range.rows();
    let columns = match rows.next() {
        Some(header) => header
            .iter()
            .enumerate()
            .map(|(i, c)| header_name(i, cell_text(c)))
            .collect(),
        None => Vec::new(),
    };

    let mut table = Table::new(columns);
    for row in rows {
        table.push_row(row.iter().map(cell_text).collect());
    }
    table
}

fn header_name(position: usize, value: Option<String>) -> String {
    value.unwrap_or_else(|| tabular::unnamed_column(position))
}

fn cell_text(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty => None,
        Data::String(s) => tabular::cell(s),
        Data::Float(f) => Some(f.to_string()),
        Data::Int(i) => Some(i.to_string()),
        Data::Bool(b) => Some(b.to_string()),
        Data::DateTime(dt) => Some(dt.to_string()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => tabular::cell(s),
        _ => None,
    }
}
