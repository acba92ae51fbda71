use std::fs;
use std::path::Path;

use super::{DocumentError, PageSource};

const PAGE_BREAK: char = '\x0c';

/// Plain-text lesson. Pages are separated by form feeds, the same layout
/// `pdftotext` produces.
pub struct TextDocument {
    title: Option<String>,
    pages: Vec<String>,
}

impl TextDocument {
    pub fn open(path: &Path) -> Result<Self, DocumentError> {
        let content = fs::read_to_string(path)?;
        let title = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .map(str::to_string);
        Ok(Self::from_text(title, &content))
    }

    pub fn from_text(title: Option<String>, content: &str) -> Self {
        let normalized = content.replace("\r\n", "\n");
        let mut pages: Vec<String> = normalized
            .split(PAGE_BREAK)
            .map(|page| page.trim_matches('\n').to_string())
            .collect();

        // A trailing form feed does not start a new page
        if pages.len() > 1 && pages.last().is_some_and(|page| page.trim().is_empty()) {
            pages.pop();
        }

        Self { title, pages }
    }
}

impl PageSource for TextDocument {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_text(&self, page: usize) -> Result<String, DocumentError> {
        self.check_page(page)?;
        Ok(self.pages[page - 1].clone())
    }

    fn title(&self) -> Option<String> {
        self.title.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_pages_on_form_feed() {
        let doc = TextDocument::from_text(None, "first page\n\x0csecond page\r\nline two\x0c");
        assert_eq!(doc.page_count(), 2);
        assert_eq!(doc.page_text(1).unwrap(), "first page");
        assert_eq!(doc.page_text(2).unwrap(), "second page\nline two");
    }

    #[test]
    fn page_numbers_are_one_based() {
        let doc = TextDocument::from_text(None, "only page");
        assert!(matches!(
            doc.page_text(0),
            Err(DocumentError::PageOutOfRange { page: 0, count: 1 })
        ));
        assert!(doc.page_text(2).is_err());
        assert_eq!(doc.page_text(1).unwrap(), "only page");
    }

    #[test]
    fn open_uses_file_stem_as_title() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("rivers.txt");
        fs::write(&path, "water").unwrap();

        let doc = TextDocument::open(&path).unwrap();
        assert_eq!(doc.title().as_deref(), Some("rivers"));
    }
}
