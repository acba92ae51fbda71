//! Lesson documents: page text sources and the wrapped layout the page view
//! draws from.

#[cfg(feature = "pdf")]
mod pdf;
mod text;

#[cfg(feature = "pdf")]
pub use pdf::PdfDocument;
pub use text::TextDocument;

use std::path::{Path, PathBuf};

use log::info;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("document not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("unsupported document format: {0}")]
    Unsupported(String),

    #[error("page {page} is out of range (document has {count} pages)")]
    PageOutOfRange { page: usize, count: usize },

    #[error("I/O: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "pdf")]
    #[error("PDF engine: {0}")]
    Pdf(#[from] mupdf::error::Error),
}

/// A paginated document. Page numbers are 1-based.
pub trait PageSource {
    fn page_count(&self) -> usize;

    fn page_text(&self, page: usize) -> Result<String, DocumentError>;

    fn title(&self) -> Option<String> {
        None
    }

    fn check_page(&self, page: usize) -> Result<(), DocumentError> {
        let count = self.page_count();
        if page == 0 || page > count {
            return Err(DocumentError::PageOutOfRange { page, count });
        }
        Ok(())
    }
}

/// Opens a lesson document, choosing the page source by file extension.
pub fn open_document(path: &Path) -> Result<Box<dyn PageSource>, DocumentError> {
    if !path.exists() {
        return Err(DocumentError::NotFound(path.to_path_buf()));
    }

    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();

    info!("Opening document {path:?}");
    match extension.as_str() {
        "txt" | "md" | "text" => Ok(Box::new(TextDocument::open(path)?)),
        #[cfg(feature = "pdf")]
        "pdf" => Ok(Box::new(PdfDocument::open(path)?)),
        #[cfg(not(feature = "pdf"))]
        "pdf" => Err(DocumentError::Unsupported(
            "pdf (built without the `pdf` feature)".to_string(),
        )),
        other => Err(DocumentError::Unsupported(other.to_string())),
    }
}

/// One wrapped display line and where it starts in the page text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayLine {
    pub text: String,
    /// Byte offset of `text` within the page text
    pub offset: usize,
}

impl DisplayLine {
    /// Width of the line in terminal cells.
    pub fn width(&self) -> usize {
        self.text.width()
    }

    /// Characters that take up cells, with the column each one starts at.
    /// Zero-width marks belong to the character before them.
    pub fn cells(&self) -> Vec<(usize, char)> {
        let mut column = 0;
        let mut cells = Vec::new();
        for c in self.text.chars() {
            let width = c.width().unwrap_or(0);
            if width == 0 {
                continue;
            }
            cells.push((column, c));
            column += width;
        }
        cells
    }

    /// Byte index of the character covering the given cell, clamped to the
    /// line end.
    pub fn byte_at_column(&self, column: usize) -> usize {
        let mut cell = 0;
        for (idx, c) in self.text.char_indices() {
            let width = c.width().unwrap_or(0);
            if width > 0 && column < cell + width {
                return idx;
            }
            cell += width;
        }
        self.text.len()
    }

    /// Byte index of the first character starting at or after the given
    /// cell. Used for exclusive ends, so a wide character cut by `column` is
    /// kept whole along with any marks after it.
    pub fn end_byte_at_column(&self, column: usize) -> usize {
        let mut cell = 0;
        for (idx, c) in self.text.char_indices() {
            let width = c.width().unwrap_or(0);
            if width > 0 && cell >= column {
                return idx;
            }
            cell += width;
        }
        self.text.len()
    }

    /// Cell where the character at the given byte index starts.
    pub fn column_at_byte(&self, byte: usize) -> usize {
        let mut end = byte.min(self.text.len());
        while !self.text.is_char_boundary(end) {
            end -= 1;
        }
        self.text[..end].width()
    }
}

/// A page wrapped to a fixed width.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub page_number: usize,
    pub width: u16,
    text: String,
    lines: Vec<DisplayLine>,
}

impl RenderedPage {
    pub fn layout(page_number: usize, text: &str, width: u16) -> Self {
        let wrap_width = usize::from(width.max(1));
        let mut lines = Vec::new();
        let mut line_offset = 0;

        for source_line in text.split('\n') {
            if source_line.trim().is_empty() {
                lines.push(DisplayLine {
                    text: String::new(),
                    offset: line_offset,
                });
            } else {
                let mut cursor = 0;
                for piece in textwrap::wrap(source_line, wrap_width) {
                    let start = source_line[cursor..]
                        .find(piece.as_ref())
                        .map(|pos| cursor + pos)
                        .unwrap_or(cursor);
                    lines.push(DisplayLine {
                        text: piece.to_string(),
                        offset: line_offset + start,
                    });
                    cursor = (start + piece.len()).min(source_line.len());
                }
            }
            line_offset += source_line.len() + 1;
        }

        Self {
            page_number,
            width,
            text: text.to_string(),
            lines,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn lines(&self) -> &[DisplayLine] {
        &self.lines
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn line(&self, index: usize) -> Option<&DisplayLine> {
        self.lines.get(index)
    }

    /// Page-text byte offset of a display cell.
    pub fn byte_offset(&self, line: usize, column: usize) -> usize {
        match self.lines.get(line) {
            Some(display) => display.offset + display.byte_at_column(column),
            None => self.text.len(),
        }
    }

    /// Page-text byte offset for an exclusive selection end.
    pub fn end_offset(&self, line: usize, column: usize) -> usize {
        match self.lines.get(line) {
            Some(display) => display.offset + display.end_byte_at_column(column),
            None => self.text.len(),
        }
    }

    /// Display cell holding the given page-text byte offset.
    pub fn position_of(&self, offset: usize) -> Option<(usize, usize)> {
        let line_idx = self
            .lines
            .iter()
            .rposition(|display| display.offset <= offset)?;
        let display = &self.lines[line_idx];
        Some((line_idx, display.column_at_byte(offset - display.offset)))
    }
}
