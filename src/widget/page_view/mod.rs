//! The lesson page on screen: paging, cursor, selection and highlights

mod navigation;
mod rendering;

pub use navigation::{MouseOutcome, PageViewAction};

use std::path::{Path, PathBuf};

use log::{debug, warn};
use ratatui::layout::Rect;

use crate::document::{DocumentError, PageSource, RenderedPage, open_document};
use crate::inputs::MouseTracker;
use crate::lessons::LessonRecord;
use crate::selection::{self, ScreenPosition, SelectionInfo, SelectionPoint, TextSelection};

const SCROLLOFF: usize = 2;

pub struct PageView {
    lesson_id: u32,
    document_path: PathBuf,
    title: String,
    source: Box<dyn PageSource>,
    current_page: usize,
    page_text: String,
    layout: Option<RenderedPage>,
    load_error: Option<String>,
    scroll: usize,
    cursor: SelectionPoint,
    visual_anchor: Option<SelectionPoint>,
    selection: TextSelection,
    /// Text area inside the borders, from the last draw
    content_area: Rect,
    mouse_tracker: MouseTracker,
}

impl PageView {
    pub fn open(lesson: &LessonRecord) -> Result<Self, DocumentError> {
        let source = open_document(&lesson.document)?;
        if let Some(doc_title) = source.title() {
            debug!("Lesson {} document title: {doc_title}", lesson.id);
        }
        let title = format!("{}. {}", lesson.number, lesson.title);
        Ok(Self::from_source(lesson.id, &lesson.document, title, source))
    }

    pub fn from_source(
        lesson_id: u32,
        document_path: &Path,
        title: String,
        source: Box<dyn PageSource>,
    ) -> Self {
        let mut view = Self {
            lesson_id,
            document_path: document_path.to_path_buf(),
            title,
            source,
            current_page: 0,
            page_text: String::new(),
            layout: None,
            load_error: None,
            scroll: 0,
            cursor: SelectionPoint::new(0, 0),
            visual_anchor: None,
            selection: TextSelection::new(),
            content_area: Rect::default(),
            mouse_tracker: MouseTracker::new(),
        };
        view.go_to_page(1);
        view
    }

    pub fn lesson_id(&self) -> u32 {
        self.lesson_id
    }

    pub fn document_path(&self) -> &Path {
        &self.document_path
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn page_count(&self) -> usize {
        self.source.page_count()
    }

    /// Currently visible page, starting at 1. Zero for an empty document.
    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn load_error(&self) -> Option<&str> {
        self.load_error.as_deref()
    }

    pub fn cursor(&self) -> SelectionPoint {
        self.cursor
    }

    pub fn content_area(&self) -> Rect {
        self.content_area
    }

    pub fn is_visual_mode(&self) -> bool {
        self.visual_anchor.is_some()
    }

    pub fn rendered(&self) -> Option<&RenderedPage> {
        self.layout.as_ref()
    }

    /// Jumps to a page, clamped into the document. Returns true if the
    /// visible page changed.
    pub fn go_to_page(&mut self, page: usize) -> bool {
        let count = self.source.page_count();
        if count == 0 {
            self.load_error = Some("This document has no pages".to_string());
            return false;
        }
        let page = page.clamp(1, count);
        if page == self.current_page {
            return false;
        }

        match self.source.page_text(page) {
            Ok(text) => {
                self.page_text = text;
                self.load_error = None;
            }
            Err(e) => {
                warn!("Failed to load page {page} of {:?}: {e}", self.document_path);
                self.page_text.clear();
                self.load_error = Some(e.to_string());
            }
        }
        debug!("Showing page {page}/{count} of lesson {}", self.lesson_id);

        self.current_page = page;
        self.layout = None;
        self.scroll = 0;
        self.cursor = SelectionPoint::new(0, 0);
        self.clear_selection();
        true
    }

    pub fn next_page(&mut self) -> bool {
        self.go_to_page(self.current_page + 1)
    }

    pub fn previous_page(&mut self) -> bool {
        self.go_to_page(self.current_page.saturating_sub(1).max(1))
    }

    /// Re-wraps the page when the text width changed.
    pub fn ensure_layout(&mut self, width: u16) {
        let stale = self.layout.as_ref().is_none_or(|layout| layout.width != width);
        if stale && self.current_page > 0 {
            self.layout = Some(RenderedPage::layout(
                self.current_page,
                &self.page_text,
                width,
            ));
            self.clamp_cursor();
        }
    }

    /// Records where the text is drawn and lays the page out for it.
    pub fn set_content_area(&mut self, area: Rect) {
        self.content_area = area;
        self.ensure_layout(area.width);
        self.keep_cursor_visible();
    }

    pub fn has_selection(&self) -> bool {
        self.selection.has_selection()
    }

    pub fn text_selection(&self) -> &TextSelection {
        &self.selection
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear_selection();
        self.visual_anchor = None;
    }

    /// Current selection as a `SelectionInfo`, anchored at the screen cell of
    /// its last character.
    pub fn capture_selection(&self) -> Option<SelectionInfo> {
        let layout = self.layout.as_ref()?;
        let (_, end) = self.selection.get_selection_range()?;
        let last = SelectionPoint::new(end.line, end.column.saturating_sub(1));
        let position = self
            .cell_to_screen(last)
            .unwrap_or_else(|| ScreenPosition::new(self.content_area.x, self.content_area.y));
        selection::capture(&self.selection, layout, position)
    }

    pub fn visible_height(&self) -> usize {
        usize::from(self.content_area.height.max(1))
    }

    /// Screen cell of a display cell, if it is currently visible.
    pub fn cell_to_screen(&self, point: SelectionPoint) -> Option<ScreenPosition> {
        if point.line < self.scroll || point.line >= self.scroll + self.visible_height() {
            return None;
        }
        let column = u16::try_from(point.column).ok()?;
        if column >= self.content_area.width {
            return None;
        }
        let row = u16::try_from(point.line - self.scroll).ok()?;
        Some(ScreenPosition::new(
            self.content_area.x + column,
            self.content_area.y + row,
        ))
    }

    /// Display cell under a screen position, clamped to the text of its line.
    pub fn screen_to_cell(&self, column: u16, row: u16) -> Option<SelectionPoint> {
        let area = self.content_area;
        if column < area.x
            || column >= area.x + area.width
            || row < area.y
            || row >= area.y + area.height
        {
            return None;
        }
        let layout = self.layout.as_ref()?;
        if layout.line_count() == 0 {
            return None;
        }
        let line = (self.scroll + usize::from(row - area.y)).min(layout.line_count() - 1);
        let max_column = layout.line(line).map_or(0, |l| l.width());
        let col = usize::from(column - area.x).min(max_column);
        let col = if col < max_column {
            self.snap_column(line, col)
        } else {
            col
        };
        Some(SelectionPoint::new(line, col))
    }

    fn line_len(&self, line: usize) -> usize {
        self.layout
            .as_ref()
            .and_then(|layout| layout.line(line))
            .map_or(0, |l| l.width())
    }

    fn line_count(&self) -> usize {
        self.layout.as_ref().map_or(0, RenderedPage::line_count)
    }

    fn clamp_cursor(&mut self) {
        let lines = self.line_count();
        if lines == 0 {
            self.cursor = SelectionPoint::new(0, 0);
            return;
        }
        self.cursor.line = self.cursor.line.min(lines - 1);
        let column = self
            .cursor
            .column
            .min(self.line_len(self.cursor.line).saturating_sub(1));
        self.cursor.column = self.snap_column(self.cursor.line, column);
    }

    /// Start cell of the character covering `column`, so nothing rests on
    /// the right half of a wide character.
    fn snap_column(&self, line: usize, column: usize) -> usize {
        self.layout
            .as_ref()
            .and_then(|layout| layout.line(line))
            .and_then(|line| {
                line.cells()
                    .into_iter()
                    .map(|(start, _)| start)
                    .take_while(|start| *start <= column)
                    .last()
            })
            .unwrap_or(column)
    }

    fn keep_cursor_visible(&mut self) {
        let height = self.visible_height();
        let lines = self.line_count();
        let margin = SCROLLOFF.min(height.saturating_sub(1) / 2);

        if self.cursor.line < self.scroll + margin {
            self.scroll = self.cursor.line.saturating_sub(margin);
        } else if self.cursor.line + margin >= self.scroll + height {
            self.scroll = self.cursor.line + margin + 1 - height;
        }
        let max_scroll = lines.saturating_sub(height);
        self.scroll = self.scroll.min(max_scroll);
    }
}
