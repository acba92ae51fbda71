use anyhow::Context;
use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::ai::AiAction;
use crate::selection::{ScreenPosition, SelectionInfo, TextRange};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnnotationId(pub u64);

impl std::fmt::Display for AnnotationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationKind {
    Note,
    Ai,
}

impl AnnotationKind {
    pub fn label(&self) -> &'static str {
        match self {
            AnnotationKind::Note => "Note",
            AnnotationKind::Ai => "AI",
        }
    }
}

/// Kind-specific payload of an annotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnnotationBody {
    Note { heading: String, content: String },
    Ai { action: AiAction, response: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    pub id: AnnotationId,
    pub lesson_id: u32,
    pub page_number: usize,
    pub source_text: String,
    pub position: ScreenPosition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<TextRange>,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub body: AnnotationBody,
}

impl Annotation {
    pub fn kind(&self) -> AnnotationKind {
        match self.body {
            AnnotationBody::Note { .. } => AnnotationKind::Note,
            AnnotationBody::Ai { .. } => AnnotationKind::Ai,
        }
    }

    /// Short label used for highlight tooltips and lists.
    pub fn title(&self) -> String {
        match &self.body {
            AnnotationBody::Note { heading, .. } => heading.clone(),
            AnnotationBody::Ai { action, .. } => format!("AI: {}", action.label()),
        }
    }

    pub fn matches_page(&self, lesson_id: u32, page_number: usize) -> bool {
        self.lesson_id == lesson_id && self.page_number == page_number
    }
}

/// Fields collected by the notes panel.
#[derive(Debug, Clone)]
pub struct NewNote {
    pub lesson_id: u32,
    pub page_number: usize,
    pub selection: SelectionInfo,
    pub heading: String,
    pub content: String,
}

/// Fields collected by the AI panel.
#[derive(Debug, Clone)]
pub struct NewAiAnnotation {
    pub lesson_id: u32,
    pub page_number: usize,
    pub selection: SelectionInfo,
    pub action: AiAction,
    pub response: String,
}

#[derive(Debug, thiserror::Error)]
pub enum AnnotationError {
    #[error("annotation has no source text")]
    EmptySourceText,

    #[error("page numbers start at 1")]
    InvalidPage,

    #[error("note heading is empty")]
    EmptyHeading,

    #[error("AI response is empty")]
    EmptyResponse,

    #[error("annotation {0} not found")]
    NotFound(AnnotationId),

    #[error("failed to persist annotations: {0:#}")]
    Persist(anyhow::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PageKey {
    lesson_id: u32,
    page_number: usize,
}

#[derive(Serialize, Deserialize, Default)]
struct StoreFile {
    #[serde(default)]
    next_id: u64,
    #[serde(default)]
    annotations: Vec<Annotation>,
}

/// Notes and AI explanations of one reading session, grouped by lesson page
/// in creation order.
pub struct AnnotationStore {
    file_path: Option<PathBuf>,
    pages: HashMap<PageKey, Vec<Annotation>>,
    next_id: u64,
}

impl AnnotationStore {
    /// A store that lives only as long as the session.
    pub fn in_memory() -> Self {
        Self {
            file_path: None,
            pages: HashMap::new(),
            next_id: 1,
        }
    }

    /// Opens (or creates on first save) a store backed by a YAML file.
    pub fn open(file_path: &Path) -> anyhow::Result<Self> {
        let mut store = Self::in_memory();
        store.file_path = Some(file_path.to_path_buf());

        if file_path.exists() {
            let content =
                fs::read_to_string(file_path).context("Failed to read annotations file")?;
            if !content.trim().is_empty() {
                let file: StoreFile =
                    serde_yaml::from_str(&content).context("Failed to parse annotations YAML")?;
                let count = file.annotations.len();
                for annotation in file.annotations {
                    store.next_id = store.next_id.max(annotation.id.0 + 1);
                    store.insert(annotation);
                }
                store.next_id = store.next_id.max(file.next_id);
                info!("Loaded {count} annotations from {file_path:?}");
            }
        }

        Ok(store)
    }

    /// Store file for a lesson set, named after the catalog location so that
    /// different lesson directories keep separate annotations.
    pub fn default_path(annotations_dir: &Path, lessons_dir: &Path) -> PathBuf {
        let key = lessons_dir
            .canonicalize()
            .unwrap_or_else(|_| lessons_dir.to_path_buf());
        let digest = md5::compute(key.to_string_lossy().as_bytes());
        annotations_dir.join(format!("lessons_{digest:x}.yaml"))
    }

    pub fn file_path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }

    pub fn add_note(&mut self, note: NewNote) -> Result<AnnotationId, AnnotationError> {
        let heading = note.heading.trim();
        if heading.is_empty() {
            return Err(AnnotationError::EmptyHeading);
        }
        let body = AnnotationBody::Note {
            heading: heading.to_string(),
            content: note.content.trim().to_string(),
        };
        self.append(note.lesson_id, note.page_number, note.selection, body)
    }

    pub fn add_ai_annotation(
        &mut self,
        annotation: NewAiAnnotation,
    ) -> Result<AnnotationId, AnnotationError> {
        if annotation.response.trim().is_empty() {
            return Err(AnnotationError::EmptyResponse);
        }
        let body = AnnotationBody::Ai {
            action: annotation.action,
            response: annotation.response,
        };
        self.append(
            annotation.lesson_id,
            annotation.page_number,
            annotation.selection,
            body,
        )
    }

    /// Annotations of one lesson page in creation order; empty when none exist.
    pub fn annotations_by_page(&self, lesson_id: u32, page_number: usize) -> &[Annotation] {
        self.pages
            .get(&PageKey {
                lesson_id,
                page_number,
            })
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// All annotations of a lesson, ordered by page then creation.
    pub fn lesson_annotations(&self, lesson_id: u32) -> Vec<&Annotation> {
        let mut keys: Vec<&PageKey> = self
            .pages
            .keys()
            .filter(|key| key.lesson_id == lesson_id)
            .collect();
        keys.sort_by_key(|key| key.page_number);
        keys.into_iter()
            .flat_map(|key| self.pages[key].iter())
            .collect()
    }

    pub fn get(&self, id: AnnotationId) -> Option<&Annotation> {
        self.pages
            .values()
            .flat_map(|annotations| annotations.iter())
            .find(|annotation| annotation.id == id)
    }

    pub fn delete(&mut self, id: AnnotationId) -> Result<Annotation, AnnotationError> {
        let key = self
            .pages
            .iter()
            .find(|(_, annotations)| annotations.iter().any(|a| a.id == id))
            .map(|(key, _)| *key)
            .ok_or(AnnotationError::NotFound(id))?;

        let annotations = self.pages.get_mut(&key).ok_or(AnnotationError::NotFound(id))?;
        let idx = annotations
            .iter()
            .position(|a| a.id == id)
            .ok_or(AnnotationError::NotFound(id))?;
        let removed = annotations.remove(idx);
        if annotations.is_empty() {
            self.pages.remove(&key);
        }

        if let Err(e) = self.save_to_disk() {
            self.pages.entry(key).or_default().insert(idx, removed);
            return Err(AnnotationError::Persist(e));
        }
        debug!("Deleted annotation {id}");
        Ok(removed)
    }

    pub fn len(&self) -> usize {
        self.pages.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn append(
        &mut self,
        lesson_id: u32,
        page_number: usize,
        selection: SelectionInfo,
        body: AnnotationBody,
    ) -> Result<AnnotationId, AnnotationError> {
        if selection.text.trim().is_empty() {
            return Err(AnnotationError::EmptySourceText);
        }
        if page_number == 0 {
            return Err(AnnotationError::InvalidPage);
        }

        let id = AnnotationId(self.next_id);
        self.next_id += 1;

        let annotation = Annotation {
            id,
            lesson_id,
            page_number,
            source_text: selection.text,
            position: selection.position,
            range: selection.range,
            created_at: Utc::now(),
            body,
        };
        debug!(
            "Adding {} annotation {id} to lesson {lesson_id} page {page_number}",
            annotation.kind().label()
        );
        let key = PageKey {
            lesson_id,
            page_number,
        };
        self.insert(annotation);

        if let Err(e) = self.save_to_disk() {
            // Unsaved records never stay in memory, so a retry cannot duplicate them
            if let Some(annotations) = self.pages.get_mut(&key) {
                annotations.pop();
                if annotations.is_empty() {
                    self.pages.remove(&key);
                }
            }
            self.next_id -= 1;
            return Err(AnnotationError::Persist(e));
        }
        Ok(id)
    }

    fn insert(&mut self, annotation: Annotation) {
        self.pages
            .entry(PageKey {
                lesson_id: annotation.lesson_id,
                page_number: annotation.page_number,
            })
            .or_default()
            .push(annotation);
    }

    fn save_to_disk(&self) -> anyhow::Result<()> {
        let Some(path) = &self.file_path else {
            return Ok(());
        };

        let mut annotations: Vec<&Annotation> = self.pages.values().flatten().collect();
        annotations.sort_by_key(|a| a.id);

        #[derive(Serialize)]
        struct StoreFileRef<'a> {
            next_id: u64,
            annotations: Vec<&'a Annotation>,
        }

        let yaml = serde_yaml::to_string(&StoreFileRef {
            next_id: self.next_id,
            annotations,
        })
        .context("Failed to serialize annotations")?;

        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent).context("Failed to create annotations directory")?;
            }
        }
        fs::write(path, yaml).context("Failed to write annotations file")?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn selection(text: &str) -> SelectionInfo {
        SelectionInfo {
            text: text.to_string(),
            position: ScreenPosition::new(10, 4),
            source_page: 2,
            range: Some(TextRange::new(0, text.len())),
        }
    }

    fn note(lesson_id: u32, page_number: usize, heading: &str, content: &str) -> NewNote {
        NewNote {
            lesson_id,
            page_number,
            selection: selection("latitude"),
            heading: heading.to_string(),
            content: content.to_string(),
        }
    }

    #[test]
    fn empty_page_returns_empty_slice() {
        let store = AnnotationStore::in_memory();
        for lesson in 1..=14 {
            for page in 1..=5 {
                assert!(store.annotations_by_page(lesson, page).is_empty());
            }
        }
    }

    #[test]
    fn saved_note_reads_back() {
        let mut store = AnnotationStore::in_memory();
        store.add_note(note(1, 2, "H", "C")).unwrap();

        let page = store.annotations_by_page(1, 2);
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].kind(), AnnotationKind::Note);
        assert_eq!(
            page[0].body,
            AnnotationBody::Note {
                heading: "H".to_string(),
                content: "C".to_string()
            }
        );
        assert_eq!(page[0].source_text, "latitude");
        assert_eq!(page[0].position, ScreenPosition::new(10, 4));
    }

    #[test]
    fn creation_order_is_preserved() {
        let mut store = AnnotationStore::in_memory();
        let first = store.add_note(note(3, 1, "first", "")).unwrap();
        let second = store
            .add_ai_annotation(NewAiAnnotation {
                lesson_id: 3,
                page_number: 1,
                selection: selection("longitude"),
                action: AiAction::Explain,
                response: "Detailed Explanation:".to_string(),
            })
            .unwrap();
        let third = store.add_note(note(3, 1, "third", "")).unwrap();

        let ids: Vec<AnnotationId> = store
            .annotations_by_page(3, 1)
            .iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(ids, vec![first, second, third]);
    }

    #[test]
    fn pages_are_kept_apart() {
        let mut store = AnnotationStore::in_memory();
        store.add_note(note(1, 1, "one", "")).unwrap();
        store.add_note(note(1, 2, "two", "")).unwrap();
        store.add_note(note(2, 1, "other lesson", "")).unwrap();

        assert_eq!(store.annotations_by_page(1, 1).len(), 1);
        assert_eq!(store.annotations_by_page(1, 2).len(), 1);
        assert_eq!(store.annotations_by_page(2, 1)[0].title(), "other lesson");
        assert_eq!(store.lesson_annotations(1).len(), 2);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn invalid_records_are_rejected() {
        let mut store = AnnotationStore::in_memory();

        assert!(matches!(
            store.add_note(note(1, 1, "   ", "content")),
            Err(AnnotationError::EmptyHeading)
        ));
        assert!(matches!(
            store.add_note(note(1, 0, "H", "")),
            Err(AnnotationError::InvalidPage)
        ));

        let mut blank = note(1, 1, "H", "");
        blank.selection.text = " \n ".to_string();
        assert!(matches!(
            store.add_note(blank),
            Err(AnnotationError::EmptySourceText)
        ));

        assert!(store.is_empty());
    }

    #[test]
    fn note_fields_are_trimmed() {
        let mut store = AnnotationStore::in_memory();
        let id = store.add_note(note(1, 1, "  Heading ", " body\n")).unwrap();

        match &store.get(id).unwrap().body {
            AnnotationBody::Note { heading, content } => {
                assert_eq!(heading, "Heading");
                assert_eq!(content, "body");
            }
            other => panic!("unexpected body {other:?}"),
        }
    }

    #[test]
    fn delete_removes_only_target() {
        let mut store = AnnotationStore::in_memory();
        let keep = store.add_note(note(1, 1, "keep", "")).unwrap();
        let gone = store.add_note(note(1, 1, "gone", "")).unwrap();

        let removed = store.delete(gone).unwrap();
        assert_eq!(removed.id, gone);
        assert_eq!(store.annotations_by_page(1, 1).len(), 1);
        assert_eq!(store.annotations_by_page(1, 1)[0].id, keep);
        assert!(matches!(
            store.delete(gone),
            Err(AnnotationError::NotFound(_))
        ));
    }

    #[test]
    fn file_store_persists_in_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("annotations.yaml");

        {
            let mut store = AnnotationStore::open(&path).unwrap();
            store.add_note(note(5, 4, "a", "")).unwrap();
            store
                .add_ai_annotation(NewAiAnnotation {
                    lesson_id: 5,
                    page_number: 4,
                    selection: selection("Harappa"),
                    action: AiAction::Simplify,
                    response: "Simplified version:\n\nHarappa".to_string(),
                })
                .unwrap();
            store.add_note(note(5, 4, "c", "")).unwrap();
        }

        let mut reopened = AnnotationStore::open(&path).unwrap();
        let titles: Vec<String> = reopened
            .annotations_by_page(5, 4)
            .iter()
            .map(Annotation::title)
            .collect();
        assert_eq!(titles, vec!["a", "AI: Simplify", "c"]);

        let next = reopened.add_note(note(5, 4, "d", "")).unwrap();
        assert_eq!(next, AnnotationId(4));
    }

    #[test]
    fn default_path_depends_on_lessons_dir() {
        let dir = TempDir::new().unwrap();
        let a = AnnotationStore::default_path(dir.path(), Path::new("/lessons/a"));
        let b = AnnotationStore::default_path(dir.path(), Path::new("/lessons/b"));
        assert_ne!(a, b);
        assert!(a.starts_with(dir.path()));
    }
    #[test]
    fn failed_write_keeps_nothing_in_memory() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "not a directory").unwrap();
        let mut store = AnnotationStore::open(&blocker.join("annotations.yaml")).unwrap();

        for _ in 0..2 {
            let result = store.add_note(note(1, 1, "H", "C"));
            assert!(matches!(result, Err(AnnotationError::Persist(_))));
        }
        assert!(store.annotations_by_page(1, 1).is_empty());
        assert!(store.is_empty());

        fs::remove_file(&blocker).unwrap();
        let id = store.add_note(note(1, 1, "H", "C")).unwrap();
        assert_eq!(id, AnnotationId(1));
    }

    #[test]
    fn failed_delete_restores_the_record() {
        let dir = TempDir::new().unwrap();
        let sub = dir.path().join("sub");
        let mut store = AnnotationStore::open(&sub.join("annotations.yaml")).unwrap();
        let first = store.add_note(note(2, 3, "first", "")).unwrap();
        let second = store.add_note(note(2, 3, "second", "")).unwrap();

        fs::remove_dir_all(&sub).unwrap();
        fs::write(&sub, "not a directory").unwrap();

        assert!(matches!(
            store.delete(first),
            Err(AnnotationError::Persist(_))
        ));
        let ids: Vec<AnnotationId> = store
            .annotations_by_page(2, 3)
            .iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(ids, vec![first, second]);
    }
}
