//! Highlights for the annotations of the page on screen
//!
//! Placement comes from what was stored with the annotation: the page-text
//! range when it still holds the same text, otherwise the first occurrence of
//! the source text, otherwise a single marker at the saved screen position.

use crate::annotations::{Annotation, AnnotationId, AnnotationKind};
use crate::document::RenderedPage;
use crate::selection::{ScreenPosition, TextRange};

/// Highlighted cells on one display line; `end_column` is exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HighlightSpan {
    pub line: usize,
    pub start_column: usize,
    pub end_column: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    Text(Vec<HighlightSpan>),
    /// Absolute terminal cell, used when the page text no longer holds the
    /// annotated passage
    Marker(ScreenPosition),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Highlight {
    pub annotation_id: AnnotationId,
    pub kind: AnnotationKind,
    pub title: String,
    pub placement: Placement,
}

impl Highlight {
    pub fn covers(&self, line: usize, column: usize) -> bool {
        match &self.placement {
            Placement::Text(spans) => spans.iter().any(|span| {
                span.line == line && column >= span.start_column && column < span.end_column
            }),
            Placement::Marker(_) => false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct HighlightOverlay {
    highlights: Vec<Highlight>,
}

impl HighlightOverlay {
    /// One highlight per annotation, in the order given.
    pub fn build(page: &RenderedPage, annotations: &[Annotation]) -> Self {
        let highlights = annotations
            .iter()
            .map(|annotation| Highlight {
                annotation_id: annotation.id,
                kind: annotation.kind(),
                title: annotation.title(),
                placement: place(page, annotation),
            })
            .collect();
        Self { highlights }
    }

    pub fn highlights(&self) -> &[Highlight] {
        &self.highlights
    }

    pub fn len(&self) -> usize {
        self.highlights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.highlights.is_empty()
    }

    /// Annotation covering a display cell. Later annotations win where
    /// highlights overlap, as they are drawn on top.
    pub fn highlight_at(&self, line: usize, column: usize) -> Option<&Highlight> {
        self.highlights
            .iter()
            .rev()
            .find(|highlight| highlight.covers(line, column))
    }

    /// Marker sitting on an absolute terminal cell.
    pub fn marker_at(&self, position: ScreenPosition) -> Option<&Highlight> {
        self.highlights
            .iter()
            .rev()
            .find(|highlight| highlight.placement == Placement::Marker(position))
    }

    /// Kind of the topmost highlight on a display cell, for styling.
    pub fn kind_at(&self, line: usize, column: usize) -> Option<AnnotationKind> {
        self.highlight_at(line, column).map(|h| h.kind)
    }
}

fn place(page: &RenderedPage, annotation: &Annotation) -> Placement {
    let text = page.text();
    let stored = annotation.range.filter(|range| {
        text.get(range.start..range.end) == Some(annotation.source_text.as_str())
    });
    let range = stored.or_else(|| {
        if annotation.source_text.is_empty() {
            return None;
        }
        text.find(&annotation.source_text)
            .map(|start| TextRange::new(start, start + annotation.source_text.len()))
    });

    match range.map(|range| spans_for(page, range)) {
        Some(spans) if !spans.is_empty() => Placement::Text(spans),
        _ => Placement::Marker(annotation.position),
    }
}

fn spans_for(page: &RenderedPage, range: TextRange) -> Vec<HighlightSpan> {
    let mut spans = Vec::new();
    for (idx, line) in page.lines().iter().enumerate() {
        let line_start = line.offset;
        let line_end = line.offset + line.text.len();
        if line_end <= range.start || line_start >= range.end {
            continue;
        }

        let from = range.start.max(line_start) - line_start;
        let to = range.end.min(line_end) - line_start;
        let start_column = line.column_at_byte(from);
        let end_column = line.column_at_byte(to);
        if end_column > start_column {
            spans.push(HighlightSpan {
                line: idx,
                start_column,
                end_column,
            });
        }
    }
    spans
}
