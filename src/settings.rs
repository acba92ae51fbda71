use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{LazyLock, RwLock};

pub const CURRENT_VERSION: u32 = 2;
const SETTINGS_FILENAME: &str = "config.yaml";
const APP_NAME: &str = "studylens";

pub const MIN_CLASS_LEVEL: u8 = 5;
pub const MAX_CLASS_LEVEL: u8 = 10;

/// Where AI explanations come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AiBackend {
    /// Templated responses produced locally after a fixed delay
    #[default]
    Simulated,
    /// Explanations requested from the lesson backend's chat endpoint
    Remote,
}

impl AiBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            AiBackend::Simulated => "Simulated",
            AiBackend::Remote => "Remote",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            AiBackend::Simulated => AiBackend::Remote,
            AiBackend::Remote => AiBackend::Simulated,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default = "default_theme")]
    pub theme: String,

    #[serde(default = "default_class_level")]
    pub class_level: u8,

    #[serde(default = "default_subject")]
    pub preferred_subject: String,

    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default)]
    pub ai_backend: AiBackend,

    #[serde(default = "default_ai_delay_ms")]
    pub ai_delay_ms: u64,

    /// Mirror newly saved annotations to the backend
    #[serde(default)]
    pub sync_annotations: bool,

    #[serde(default = "default_true")]
    pub show_sidebar: bool,
}

fn default_true() -> bool {
    true
}

fn default_version() -> u32 {
    CURRENT_VERSION
}

fn default_theme() -> String {
    "Oceanic Next".to_string()
}

fn default_class_level() -> u8 {
    6
}

fn default_subject() -> String {
    "Social Science".to_string()
}

fn default_api_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_ai_delay_ms() -> u64 {
    1500
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            theme: default_theme(),
            class_level: default_class_level(),
            preferred_subject: default_subject(),
            api_url: default_api_url(),
            ai_backend: AiBackend::default(),
            ai_delay_ms: default_ai_delay_ms(),
            sync_annotations: false,
            show_sidebar: true,
        }
    }
}

static SETTINGS: LazyLock<RwLock<Settings>> = LazyLock::new(|| RwLock::new(Settings::default()));
static PERSIST: AtomicBool = AtomicBool::new(true);

/// Keeps settings in memory only. Used by tests and `--no-config` runs.
pub fn disable_persistence() {
    PERSIST.store(false, Ordering::Relaxed);
}

fn preferred_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|config| config.join(APP_NAME).join(SETTINGS_FILENAME))
}

pub fn load_settings() {
    let Some(path) = preferred_config_path() else {
        warn!("Could not determine config directory, using default settings");
        return;
    };
    if path.exists() {
        load_settings_from_path(&path);
    } else if PERSIST.load(Ordering::Relaxed) {
        info!("Settings file not found, creating with defaults at {path:?}");
        if let Ok(settings) = SETTINGS.read() {
            save_settings_to_file(&settings, &path);
        }
    }
}

pub fn load_settings_from_path(path: &Path) {
    match fs::read_to_string(path) {
        Ok(content) => match serde_yaml::from_str::<Settings>(&content) {
            Ok(mut settings) => {
                debug!("Loaded settings from {path:?}");

                if settings.version < CURRENT_VERSION {
                    migrate_settings(&mut settings);
                    if PERSIST.load(Ordering::Relaxed) {
                        save_settings_to_file(&settings, path);
                    }
                }

                if let Ok(mut global) = SETTINGS.write() {
                    *global = settings;
                }
            }
            Err(e) => {
                error!("Failed to parse settings file {path:?}: {e}");
            }
        },
        Err(e) => {
            error!("Failed to read settings file {path:?}: {e}");
        }
    }
}

fn migrate_settings(settings: &mut Settings) {
    info!(
        "Migrating settings from v{} to v{}",
        settings.version, CURRENT_VERSION
    );

    // v1 stored the class level without bounds
    if settings.version < 2 {
        settings.class_level = settings.class_level.clamp(MIN_CLASS_LEVEL, MAX_CLASS_LEVEL);
    }

    settings.version = CURRENT_VERSION;
}

pub fn save_settings() {
    if !PERSIST.load(Ordering::Relaxed) {
        return;
    }
    let Some(path) = preferred_config_path() else {
        warn!("Could not determine config directory, cannot save settings");
        return;
    };

    if let Ok(settings) = SETTINGS.read() {
        save_settings_to_file(&settings, &path);
    }
}

fn save_settings_to_file(settings: &Settings, path: &Path) {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            if let Err(e) = fs::create_dir_all(parent) {
                error!("Failed to create config directory {parent:?}: {e}");
                return;
            }
        }
    }

    let content = generate_settings_yaml(settings);

    match fs::write(path, content) {
        Ok(()) => debug!("Saved settings to {path:?}"),
        Err(e) => error!("Failed to save settings to {path:?}: {e}"),
    }
}

fn generate_settings_yaml(settings: &Settings) -> String {
    let mut content = String::new();

    content.push_str(&format!("version: {}\n", settings.version));
    content.push_str(&format!("theme: \"{}\"\n", settings.theme));
    content.push('\n');
    content.push_str("# Student profile, sent along with AI explanation requests\n");
    content.push_str(&format!("class_level: {}\n", settings.class_level));
    content.push_str(&format!(
        "preferred_subject: \"{}\"\n",
        settings.preferred_subject
    ));
    content.push('\n');
    content.push_str(AI_TEMPLATE);
    content.push_str(&format!("api_url: \"{}\"\n", settings.api_url));
    let backend_str = match settings.ai_backend {
        AiBackend::Simulated => "simulated",
        AiBackend::Remote => "remote",
    };
    content.push_str(&format!("ai_backend: {backend_str}\n"));
    content.push_str(&format!("ai_delay_ms: {}\n", settings.ai_delay_ms));
    content.push_str(&format!("sync_annotations: {}\n", settings.sync_annotations));
    content.push('\n');
    content.push_str(&format!("show_sidebar: {}\n", settings.show_sidebar));

    content
}

const AI_TEMPLATE: &str = r#"# ============================================================================
# AI explanations
# ============================================================================
# ai_backend: "simulated" answers locally after ai_delay_ms milliseconds,
#             "remote" posts the selected text to {api_url}/api/chat.
# sync_annotations: also POST every saved annotation to {api_url}/api/annotations
"#;

// Public API for accessing/modifying settings

pub fn snapshot() -> Settings {
    SETTINGS.read().map(|s| s.clone()).unwrap_or_default()
}

pub fn get_theme_name() -> String {
    SETTINGS
        .read()
        .map(|s| s.theme.clone())
        .unwrap_or_else(|_| default_theme())
}

pub fn set_theme_name(name: &str) {
    if let Ok(mut settings) = SETTINGS.write() {
        settings.theme = name.to_string();
    }
    save_settings();
}

pub fn get_class_level() -> u8 {
    SETTINGS
        .read()
        .map(|s| s.class_level)
        .unwrap_or_else(|_| default_class_level())
}

pub fn set_class_level(level: u8) {
    if let Ok(mut settings) = SETTINGS.write() {
        settings.class_level = level.clamp(MIN_CLASS_LEVEL, MAX_CLASS_LEVEL);
    }
    save_settings();
}

pub fn get_preferred_subject() -> String {
    SETTINGS
        .read()
        .map(|s| s.preferred_subject.clone())
        .unwrap_or_else(|_| default_subject())
}

pub fn set_preferred_subject(subject: &str) {
    if let Ok(mut settings) = SETTINGS.write() {
        settings.preferred_subject = subject.to_string();
    }
    save_settings();
}

pub fn get_api_url() -> String {
    SETTINGS
        .read()
        .map(|s| s.api_url.clone())
        .unwrap_or_else(|_| default_api_url())
}

pub fn set_api_url(url: &str) {
    if let Ok(mut settings) = SETTINGS.write() {
        settings.api_url = url.trim_end_matches('/').to_string();
    }
    save_settings();
}

pub fn get_ai_backend() -> AiBackend {
    SETTINGS.read().map(|s| s.ai_backend).unwrap_or_default()
}

pub fn set_ai_backend(backend: AiBackend) {
    if let Ok(mut settings) = SETTINGS.write() {
        settings.ai_backend = backend;
    }
    save_settings();
}

pub fn get_ai_delay_ms() -> u64 {
    SETTINGS
        .read()
        .map(|s| s.ai_delay_ms)
        .unwrap_or_else(|_| default_ai_delay_ms())
}

pub fn set_ai_delay_ms(delay_ms: u64) {
    if let Ok(mut settings) = SETTINGS.write() {
        settings.ai_delay_ms = delay_ms;
    }
    save_settings();
}

pub fn is_sync_annotations() -> bool {
    SETTINGS.read().map(|s| s.sync_annotations).unwrap_or(false)
}

pub fn set_sync_annotations(enabled: bool) {
    if let Ok(mut settings) = SETTINGS.write() {
        settings.sync_annotations = enabled;
    }
    save_settings();
}

pub fn is_sidebar_shown() -> bool {
    SETTINGS.read().map(|s| s.show_sidebar).unwrap_or(true)
}

pub fn set_sidebar_shown(shown: bool) {
    if let Ok(mut settings) = SETTINGS.write() {
        settings.show_sidebar = shown;
    }
    save_settings();
}
