use std::any::Any;
use std::path::Path;
#[cfg(any(test, feature = "test-utils"))]
use std::sync::Mutex;

use log::info;

/// Hands lesson documents to the platform's default viewer.
pub trait SystemCommandExecutor: Send {
    fn open_file(&self, path: &Path) -> Result<(), String>;

    /// Opens the document at a page. Viewers without page addressing
    /// just open the file.
    fn open_file_at_page(&self, path: &Path, page: usize) -> Result<(), String> {
        let _ = page;
        self.open_file(path)
    }

    fn as_any(&self) -> &dyn Any;
}

pub struct RealSystemCommandExecutor;

impl SystemCommandExecutor for RealSystemCommandExecutor {
    fn open_file(&self, path: &Path) -> Result<(), String> {
        if !path.exists() {
            return Err(format!("File not found: {}", path.display()));
        }
        info!("Opening {} in the system viewer", path.display());
        open::that(path).map_err(|e| format!("Failed to open {}: {e}", path.display()))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Records requested paths instead of launching anything.
#[cfg(any(test, feature = "test-utils"))]
#[derive(Default)]
pub struct MockSystemCommandExecutor {
    executed_commands: Mutex<Vec<String>>,
    fail_with: Option<String>,
}

#[cfg(any(test, feature = "test-utils"))]
impl MockSystemCommandExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(message: &str) -> Self {
        Self {
            executed_commands: Mutex::new(Vec::new()),
            fail_with: Some(message.to_string()),
        }
    }

    pub fn get_executed_commands(&self) -> Vec<String> {
        self.executed_commands
            .lock()
            .map(|commands| commands.clone())
            .unwrap_or_default()
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl SystemCommandExecutor for MockSystemCommandExecutor {
    fn open_file(&self, path: &Path) -> Result<(), String> {
        self.open_file_at_page(path, 1)
    }

    fn open_file_at_page(&self, path: &Path, page: usize) -> Result<(), String> {
        if let Ok(mut commands) = self.executed_commands.lock() {
            commands.push(format!("{}@page{page}", path.display()));
        }
        match &self.fail_with {
            Some(message) => Err(message.clone()),
            None => Ok(()),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_records_page_requests() {
        let mock = MockSystemCommandExecutor::new();
        mock.open_file_at_page(Path::new("lessons/lesson3.pdf"), 4)
            .unwrap();
        mock.open_file(Path::new("lessons/lesson1.txt")).unwrap();
        assert_eq!(
            mock.get_executed_commands(),
            vec!["lessons/lesson3.pdf@page4", "lessons/lesson1.txt@page1"]
        );
    }

    #[test]
    fn real_executor_rejects_missing_files() {
        let result = RealSystemCommandExecutor.open_file(Path::new("/nonexistent/lesson.pdf"));
        assert!(result.unwrap_err().contains("not found"));
    }
}
