use anyhow::{Context, Result, bail};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

pub const CATALOG_FILENAME: &str = "catalog.yaml";

/// A single lesson: metadata plus the document shown when it is opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonRecord {
    pub id: u32,
    pub number: u32,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub document: PathBuf,
}

/// Immutable list of lessons, loaded once at startup.
#[derive(Debug, Clone)]
pub struct LessonCatalog {
    lessons: Vec<LessonRecord>,
}

const BUILTIN_LESSONS: &[(&str, &str)] = &[
    (
        "Locating Places on the Earth",
        "Directions on maps, latitude, longitude, time zones, and the International Date Line.",
    ),
    (
        "Oceans and Continents",
        "Identification of continents, oceans, climate, and their effect on patterns of life and resources.",
    ),
    (
        "Landforms and Life",
        "Types of landforms, their features, and how they shape local to global livelihoods.",
    ),
    (
        "Timeline and Sources of History",
        "Measuring time in history and recognizing sources and life of early humans.",
    ),
    (
        "The Beginning of Indian Civilization",
        "Distinctive features of important towns (e.g., Harappa) and continuity of civilization.",
    ),
    (
        "India, That Is Bharat",
        "Roots of India's name, unity in diversity, and heritage.",
    ),
    (
        "India's Cultural Roots",
        "Tracing the roots and traditions that shaped Indian society.",
    ),
    (
        "Unity in Diversity",
        "How diversity enriches our country through food, festivals, textiles, and epics.",
    ),
    (
        "Family and Community",
        "Importance and role of family and community in nation-building.",
    ),
    (
        "Grassroot Democracy (Governance)",
        "Levels and parts of governance, power sharing, and the Constitution.",
    ),
    (
        "Grassroot Democracy – Local Government in Rural Areas",
        "Functioning of rural administration and local self-government.",
    ),
    (
        "Grassroot Democracy – Local Government in Urban Areas",
        "Role of urban local bodies and civic administration.",
    ),
    (
        "The Value of Work",
        "Difference between economic and non-economic activity, value of community work.",
    ),
    (
        "Economic Activities Around Us",
        "Production, trade, consumption, and differentiating economic sectors.",
    ),
];

fn builtin_document(lessons_dir: &Path, number: u32) -> PathBuf {
    let pdf = lessons_dir.join(format!("lesson{number}.pdf"));
    let txt = lessons_dir.join(format!("lesson{number}.txt"));
    if !pdf.exists() && txt.exists() { txt } else { pdf }
}

impl LessonCatalog {
    pub fn new(lessons: Vec<LessonRecord>) -> Result<Self> {
        if lessons.is_empty() {
            bail!("Lesson catalog is empty");
        }

        let mut seen = HashSet::new();
        for lesson in &lessons {
            if !seen.insert(lesson.id) {
                bail!("Duplicate lesson id {} ({})", lesson.id, lesson.title);
            }
        }

        Ok(Self { lessons })
    }

    /// The lessons shipped with the application, with documents expected at
    /// `lessons_dir/lesson{n}.pdf`. A plain-text `lesson{n}.txt` is used
    /// instead when only that one exists.
    pub fn builtin(lessons_dir: &Path) -> Self {
        let lessons = BUILTIN_LESSONS
            .iter()
            .enumerate()
            .map(|(idx, (title, description))| {
                let number = idx as u32 + 1;
                LessonRecord {
                    id: number,
                    number,
                    title: (*title).to_string(),
                    description: (*description).to_string(),
                    document: builtin_document(lessons_dir, number),
                }
            })
            .collect();

        Self { lessons }
    }

    /// Loads a YAML catalog. Relative document paths are resolved against the
    /// directory holding the catalog file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read lesson catalog {}", path.display()))?;
        let mut lessons: Vec<LessonRecord> = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse lesson catalog {}", path.display()))?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        for lesson in &mut lessons {
            if lesson.document.is_relative() {
                lesson.document = base.join(&lesson.document);
            }
        }

        debug!("Loaded {} lessons from {path:?}", lessons.len());
        Self::new(lessons)
    }

    /// Uses `lessons_dir/catalog.yaml` when present, the built-in list otherwise.
    pub fn discover(lessons_dir: &Path) -> Result<Self> {
        let catalog_path = lessons_dir.join(CATALOG_FILENAME);
        if catalog_path.exists() {
            Self::load(&catalog_path)
        } else {
            info!(
                "No {CATALOG_FILENAME} in {}, using built-in lessons",
                lessons_dir.display()
            );
            Ok(Self::builtin(lessons_dir))
        }
    }

    pub fn lessons(&self) -> &[LessonRecord] {
        &self.lessons
    }

    pub fn len(&self) -> usize {
        self.lessons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lessons.is_empty()
    }

    pub fn get(&self, id: u32) -> Option<&LessonRecord> {
        self.lessons.iter().find(|lesson| lesson.id == id)
    }

    pub fn position(&self, id: u32) -> Option<usize> {
        self.lessons.iter().position(|lesson| lesson.id == id)
    }

    pub fn at(&self, index: usize) -> Option<&LessonRecord> {
        self.lessons.get(index)
    }
}
