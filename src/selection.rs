//! Text selection inside the page view and the `SelectionInfo` handed to
//! annotation panels.

use serde::{Deserialize, Serialize};

use crate::document::RenderedPage;

/// A display cell: wrapped line index and terminal column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SelectionPoint {
    pub line: usize,
    pub column: usize,
}

impl SelectionPoint {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

/// Terminal cell coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScreenPosition {
    pub x: u16,
    pub y: u16,
}

impl ScreenPosition {
    pub fn new(x: u16, y: u16) -> Self {
        Self { x, y }
    }
}

/// Byte range into a page's text; `end` is exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextRange {
    pub start: usize,
    pub end: usize,
}

impl TextRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self {
            start: start.min(end),
            end: start.max(end),
        }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn contains(&self, offset: usize) -> bool {
        offset >= self.start && offset < self.end
    }
}

/// What the user selected, transient until a panel saves or closes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionInfo {
    pub text: String,
    pub position: ScreenPosition,
    pub source_page: usize,
    pub range: Option<TextRange>,
}

#[derive(Debug, Clone, Default)]
pub struct TextSelection {
    pub start: Option<SelectionPoint>,
    pub end: Option<SelectionPoint>,
    pub is_selecting: bool,
}

impl TextSelection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_selection(&mut self, line: usize, column: usize) {
        let point = SelectionPoint::new(line, column);
        self.start = Some(point);
        self.end = Some(point);
        self.is_selecting = true;
    }

    pub fn update_selection(&mut self, line: usize, column: usize) {
        if self.is_selecting {
            self.end = Some(SelectionPoint::new(line, column));
        }
    }

    pub fn end_selection(&mut self) {
        self.is_selecting = false;
    }

    pub fn clear_selection(&mut self) {
        self.start = None;
        self.end = None;
        self.is_selecting = false;
    }

    /// Selection spanning two cells inclusively, as keyboard visual mode does.
    pub fn set_inclusive(&mut self, anchor: SelectionPoint, cursor: SelectionPoint) {
        let (first, last) = if anchor <= cursor {
            (anchor, cursor)
        } else {
            (cursor, anchor)
        };
        self.start = Some(first);
        self.end = Some(SelectionPoint::new(last.line, last.column + 1));
        self.is_selecting = false;
    }

    pub fn has_selection(&self) -> bool {
        matches!((self.start, self.end), (Some(start), Some(end)) if start != end)
    }

    /// Normalized `(start, end)` with `end` exclusive.
    pub fn get_selection_range(&self) -> Option<(SelectionPoint, SelectionPoint)> {
        match (self.start, self.end) {
            (Some(a), Some(b)) if a != b => Some(if a <= b { (a, b) } else { (b, a) }),
            _ => None,
        }
    }

    pub fn is_selected(&self, line: usize, column: usize) -> bool {
        let Some((start, end)) = self.get_selection_range() else {
            return false;
        };
        let point = SelectionPoint::new(line, column);
        point >= start && point < end
    }

    pub fn select_word_at(&mut self, line: usize, column: usize, page: &RenderedPage) {
        let Some(display) = page.line(line) else {
            return;
        };
        let cells = display.cells();
        let Some(hit) = cells.iter().rposition(|(start, _)| *start <= column) else {
            return;
        };
        if column >= display.width() || !is_word_char(cells[hit].1) {
            return;
        }

        let mut first = hit;
        while first > 0 && is_word_char(cells[first - 1].1) {
            first -= 1;
        }
        let mut last = hit;
        while last + 1 < cells.len() && is_word_char(cells[last + 1].1) {
            last += 1;
        }

        self.set_inclusive(
            SelectionPoint::new(line, cells[first].0),
            SelectionPoint::new(line, cells[last].0),
        );
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '\'' || c == '-' || c == '_'
}

/// Turns the current selection into a `SelectionInfo`. Returns `None` when
/// nothing, or only whitespace, is selected.
pub fn capture(
    selection: &TextSelection,
    page: &RenderedPage,
    position: ScreenPosition,
) -> Option<SelectionInfo> {
    let (start, end) = selection.get_selection_range()?;
    let start_offset = page.byte_offset(start.line, start.column);
    let end_offset = page.end_offset(end.line, end.column);
    let raw = page.text().get(start_offset..end_offset)?;

    let trimmed_start = raw.trim_start();
    let leading = raw.len() - trimmed_start.len();
    let text = trimmed_start.trim_end();
    if text.is_empty() {
        return None;
    }

    let range_start = start_offset + leading;
    Some(SelectionInfo {
        text: text.to_string(),
        position,
        source_page: page.page_number,
        range: Some(TextRange::new(range_start, range_start + text.len())),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> RenderedPage {
        RenderedPage::layout(
            3,
            "Harappa was a planned city.\nIts streets ran in a grid.",
            40,
        )
    }

    #[test]
    fn drag_selection_is_normalized() {
        let mut selection = TextSelection::new();
        selection.start_selection(1, 10);
        selection.update_selection(0, 4);
        selection.end_selection();

        let (start, end) = selection.get_selection_range().unwrap();
        assert_eq!(start, SelectionPoint::new(0, 4));
        assert_eq!(end, SelectionPoint::new(1, 10));
        assert!(selection.is_selected(0, 20));
        assert!(!selection.is_selected(1, 10));
    }

    #[test]
    fn capture_extracts_text_and_range() {
        let page = page();
        let mut selection = TextSelection::new();
        selection.set_inclusive(SelectionPoint::new(0, 0), SelectionPoint::new(0, 6));

        let info = capture(&selection, &page, ScreenPosition::new(5, 2)).unwrap();
        assert_eq!(info.text, "Harappa");
        assert_eq!(info.source_page, 3);
        assert_eq!(info.position, ScreenPosition::new(5, 2));
        assert_eq!(info.range, Some(TextRange::new(0, 7)));
    }

    #[test]
    fn capture_across_lines_trims_whitespace() {
        let page = page();
        let mut selection = TextSelection::new();
        selection.start_selection(0, 22);
        selection.update_selection(1, 3);

        let info = capture(&selection, &page, ScreenPosition::default()).unwrap();
        assert_eq!(info.text, "city.\nIts");
        let range = info.range.unwrap();
        assert_eq!(&page.text()[range.start..range.end], "city.\nIts");
    }

    #[test]
    fn whitespace_only_selection_captures_nothing() {
        let page = RenderedPage::layout(1, "word     word", 40);
        let mut selection = TextSelection::new();
        selection.set_inclusive(SelectionPoint::new(0, 5), SelectionPoint::new(0, 7));
        assert!(capture(&selection, &page, ScreenPosition::default()).is_none());
    }

    #[test]
    fn empty_selection_captures_nothing() {
        let mut selection = TextSelection::new();
        selection.start_selection(0, 2);
        assert!(!selection.has_selection());
        assert!(capture(&selection, &page(), ScreenPosition::default()).is_none());
    }

    #[test]
    fn double_click_selects_word() {
        let page = page();
        let mut selection = TextSelection::new();
        selection.select_word_at(1, 5, &page);

        let info = capture(&selection, &page, ScreenPosition::default()).unwrap();
        assert_eq!(info.text, "streets");
    }
    #[test]
    fn wide_characters_are_captured_whole() {
        let page = RenderedPage::layout(1, "The 長江 river", 40);
        let mut selection = TextSelection::new();
        // Cursor on the right half of the second character
        selection.set_inclusive(SelectionPoint::new(0, 4), SelectionPoint::new(0, 7));
        let info = capture(&selection, &page, ScreenPosition::default()).unwrap();
        assert_eq!(info.text, "長江");

        let mut selection = TextSelection::new();
        selection.select_word_at(0, 9, &page);
        let info = capture(&selection, &page, ScreenPosition::default()).unwrap();
        assert_eq!(info.text, "river");
    }
}
