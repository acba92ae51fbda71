//! PDF page text through MuPDF

use std::path::Path;

use log::debug;
use mupdf::text_page::TextBlockType;
use mupdf::{Document, TextPageFlags};

use super::{DocumentError, PageSource};

pub struct PdfDocument {
    doc: Document,
    page_count: usize,
    title: Option<String>,
}

impl PdfDocument {
    pub fn open(path: &Path) -> Result<Self, DocumentError> {
        let doc = Document::open(path.to_string_lossy().as_ref())?;
        let page_count = doc.page_count()?.max(0) as usize;

        let title = doc
            .metadata(mupdf::MetadataName::Title)
            .ok()
            .filter(|t| !t.is_empty());

        debug!("Opened PDF {path:?} with {page_count} pages");
        Ok(Self {
            doc,
            page_count,
            title,
        })
    }
}

impl PageSource for PdfDocument {
    fn page_count(&self) -> usize {
        self.page_count
    }

    fn page_text(&self, page: usize) -> Result<String, DocumentError> {
        self.check_page(page)?;

        let pdf_page = self.doc.load_page(page as i32 - 1)?;
        let text_page = pdf_page.to_text_page(TextPageFlags::empty())?;

        let mut text = String::new();
        for block in text_page.blocks() {
            if block.r#type() != TextBlockType::Text {
                continue;
            }
            for line in block.lines() {
                for ch in line.chars() {
                    if let Some(c) = ch.char() {
                        text.push(c);
                    }
                }
                text.push('\n');
            }
            // Blank line between blocks keeps paragraphs apart when wrapped
            text.push('\n');
        }

        Ok(text.trim_end().to_string())
    }

    fn title(&self) -> Option<String> {
        self.title.clone()
    }
}
