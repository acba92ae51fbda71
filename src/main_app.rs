use crate::ai::{AiContext, AiPanel, AiService, ResponseGenerator, build_generator};
use crate::annotations::{AnnotationId, AnnotationStore};
use crate::api::{ApiClient, spawn_annotation_sync};
use crate::event_source::EventSource;
use crate::inputs::{ClickType, MouseTracker};
use crate::lessons::{LessonCatalog, LessonRecord};
use crate::notification::{NotificationLevel, NotificationManager};
use crate::overlay::HighlightOverlay;
use crate::selection::{ScreenPosition, SelectionInfo, SelectionPoint};
use crate::settings;
use crate::system_command::{RealSystemCommandExecutor, SystemCommandExecutor};
use crate::theme::{Base16Palette, current_theme};
use crate::widget::ai_panel::{self, AiPanelAction};
use crate::widget::annotation_viewer::{AnnotationViewer, AnnotationViewerAction, annotation_to_text};
use crate::widget::help_popup::{HelpPopup, HelpPopupAction};
use crate::widget::lesson_list::LessonList;
use crate::widget::notes_panel::{NotesPanel, NotesPanelAction};
use crate::widget::page_view::{MouseOutcome, PageView, PageViewAction};
use crate::widget::selection_menu::{SelectionMenu, SelectionMenuAction};
use crate::widget::settings_popup::{SettingsAction, SettingsPopup};

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use crossterm::event::{
    Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use log::{debug, error, info, warn};
use ratatui::{
    Terminal,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppAction {
    Quit,
}

#[derive(PartialEq, Debug, Clone, Copy)]
pub enum FocusedPanel {
    Main(MainPanel),
    Popup(PopupWindow),
}

#[derive(PartialEq, Debug, Clone, Copy)]
pub enum MainPanel {
    LessonList,
    Content,
}

#[derive(PartialEq, Debug, Clone, Copy)]
pub enum PopupWindow {
    SelectionMenu,
    Notes,
    Ai,
    Annotations,
    Settings,
    Help,
}

/// What the app is started with. Everything is owned by the app for the
/// whole session.
pub struct AppOptions {
    pub catalog: LessonCatalog,
    pub store: AnnotationStore,
    pub generator: Arc<dyn ResponseGenerator>,
    pub api_client: Option<ApiClient>,
    pub system_executor: Box<dyn SystemCommandExecutor>,
}

impl AppOptions {
    pub fn new(
        catalog: LessonCatalog,
        store: AnnotationStore,
        generator: Arc<dyn ResponseGenerator>,
    ) -> Self {
        Self {
            catalog,
            store,
            generator,
            api_client: None,
            system_executor: Box::new(RealSystemCommandExecutor),
        }
    }

    pub fn with_api_client(mut self, client: ApiClient) -> Self {
        self.api_client = Some(client);
        self
    }

    pub fn with_system_executor(mut self, executor: Box<dyn SystemCommandExecutor>) -> Self {
        self.system_executor = executor;
        self
    }
}

pub struct App {
    catalog: LessonCatalog,
    pub lesson_list: LessonList,
    page_view: Option<PageView>,
    store: AnnotationStore,
    ai: AiService,
    api_client: Option<ApiClient>,
    pub focused_panel: FocusedPanel,
    previous_main_panel: MainPanel,
    pub system_command_executor: Box<dyn SystemCommandExecutor>,
    selection_menu: Option<SelectionMenu>,
    notes_panel: Option<NotesPanel>,
    ai_panel: Option<AiPanel>,
    annotation_viewer: Option<AnnotationViewer>,
    settings_popup: Option<SettingsPopup>,
    help_popup: Option<HelpPopup>,
    /// Highlights of the page as last drawn, for hit-testing clicks
    overlay: HighlightOverlay,
    notifications: NotificationManager,
    mouse_tracker: MouseTracker,
    lesson_list_area: Rect,
    page_area: Rect,
    tick: usize,
}

impl App {
    pub fn new(options: AppOptions) -> Self {
        let AppOptions {
            catalog,
            store,
            generator,
            api_client,
            system_executor,
        } = options;

        info!(
            "Starting with {} lessons and {} stored annotations",
            catalog.len(),
            store.len()
        );
        let lesson_list = LessonList::new(&catalog);

        Self {
            catalog,
            lesson_list,
            page_view: None,
            store,
            ai: AiService::new(generator),
            api_client,
            focused_panel: FocusedPanel::Main(MainPanel::LessonList),
            previous_main_panel: MainPanel::LessonList,
            system_command_executor: system_executor,
            selection_menu: None,
            notes_panel: None,
            ai_panel: None,
            annotation_viewer: None,
            settings_popup: None,
            help_popup: None,
            overlay: HighlightOverlay::default(),
            notifications: NotificationManager::new(),
            mouse_tracker: MouseTracker::new(),
            lesson_list_area: Rect::default(),
            page_area: Rect::default(),
            tick: 0,
        }
    }

    pub fn catalog(&self) -> &LessonCatalog {
        &self.catalog
    }

    pub fn store(&self) -> &AnnotationStore {
        &self.store
    }

    pub fn page_view(&self) -> Option<&PageView> {
        self.page_view.as_ref()
    }

    pub fn page_view_mut(&mut self) -> Option<&mut PageView> {
        self.page_view.as_mut()
    }

    pub fn ai_panel(&self) -> Option<&AiPanel> {
        self.ai_panel.as_ref()
    }

    pub fn notes_panel(&self) -> Option<&NotesPanel> {
        self.notes_panel.as_ref()
    }

    pub fn annotation_viewer(&self) -> Option<&AnnotationViewer> {
        self.annotation_viewer.as_ref()
    }

    pub fn selection_menu(&self) -> Option<&SelectionMenu> {
        self.selection_menu.as_ref()
    }

    pub fn overlay(&self) -> &HighlightOverlay {
        &self.overlay
    }

    pub fn notifications(&self) -> &NotificationManager {
        &self.notifications
    }

    pub fn current_lesson(&self) -> Option<&LessonRecord> {
        self.page_view
            .as_ref()
            .and_then(|page| self.catalog.get(page.lesson_id()))
    }

    pub fn is_main_panel(&self, panel: MainPanel) -> bool {
        self.focused_panel == FocusedPanel::Main(panel)
    }

    pub fn has_active_popup(&self) -> bool {
        matches!(self.focused_panel, FocusedPanel::Popup(_))
    }

    pub fn show_info(&mut self, message: impl Into<String>) {
        self.notifications.info(message);
    }

    pub fn show_warning(&mut self, message: impl Into<String>) {
        self.notifications.warn(message);
    }

    pub fn show_error(&mut self, message: impl Into<String>) {
        self.notifications.error(message);
    }

    fn set_main_panel_focus(&mut self, panel: MainPanel) {
        self.previous_main_panel = panel;
        self.focused_panel = FocusedPanel::Main(panel);
    }

    fn open_popup(&mut self, popup: PopupWindow) {
        if let FocusedPanel::Main(panel) = self.focused_panel {
            self.previous_main_panel = panel;
        }
        self.focused_panel = FocusedPanel::Popup(popup);
    }

    fn close_popup(&mut self) {
        self.focused_panel = FocusedPanel::Main(self.previous_main_panel);
    }

    /// Opens a lesson on its first page. A document that cannot be opened
    /// leaves the current view alone and is reported as a notification.
    pub fn open_lesson(&mut self, lesson_id: u32) -> bool {
        let Some(lesson) = self.catalog.get(lesson_id) else {
            warn!("Unknown lesson id {lesson_id}");
            return false;
        };

        match PageView::open(lesson) {
            Ok(view) => {
                info!("Opened lesson {} from {:?}", lesson.id, lesson.document);
                self.close_transient_popups();
                self.page_view = Some(view);
                self.overlay = HighlightOverlay::default();
                if let Some(idx) = self.catalog.position(lesson_id) {
                    self.lesson_list.set_selection_to_index(idx);
                }
                self.set_main_panel_focus(MainPanel::Content);
                true
            }
            Err(e) => {
                error!("Failed to open lesson {lesson_id}: {e}");
                self.show_error(format!("Could not open lesson: {e}"));
                false
            }
        }
    }

    /// Closes every panel tied to the page on screen. A pending AI request
    /// is cancelled.
    fn close_transient_popups(&mut self) {
        if let Some(mut panel) = self.ai_panel.take() {
            panel.close(&mut self.ai);
        }
        self.notes_panel = None;
        self.selection_menu = None;
        self.annotation_viewer = None;
        if matches!(
            self.focused_panel,
            FocusedPanel::Popup(
                PopupWindow::Ai
                    | PopupWindow::Notes
                    | PopupWindow::SelectionMenu
                    | PopupWindow::Annotations
            )
        ) {
            self.close_popup();
        }
    }

    /// Collects finished AI generations and expires notifications. Returns
    /// true when the screen needs a redraw.
    pub fn tick(&mut self) -> bool {
        self.tick = self.tick.wrapping_add(1);
        let mut changed = false;

        for completion in self.ai.poll() {
            let applied = self
                .ai_panel
                .as_mut()
                .is_some_and(|panel| panel.complete(&completion));
            if !applied {
                debug!("Ignoring completion of request {:?}", completion.id);
                continue;
            }
            changed = true;
            if let Err(e) = &completion.result {
                self.notifications
                    .notify(format!("AI request failed: {e}"), NotificationLevel::Error);
            }
        }

        if self.notifications.update() {
            changed = true;
        }
        // Spinner
        if self.ai_panel.as_ref().is_some_and(AiPanel::is_processing) {
            changed = true;
        }
        changed
    }

    pub fn handle_key_event(&mut self, key: KeyEvent) -> Option<AppAction> {
        if key.kind == KeyEventKind::Release {
            return None;
        }
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            return Some(AppAction::Quit);
        }

        match self.focused_panel {
            FocusedPanel::Popup(popup) => {
                self.handle_popup_key(popup, key);
                None
            }
            FocusedPanel::Main(panel) => {
                if key.code == KeyCode::Char('q') {
                    return Some(AppAction::Quit);
                }
                if self.handle_global_hotkeys(key) {
                    return None;
                }
                match panel {
                    MainPanel::LessonList => self.handle_lesson_list_key(key),
                    MainPanel::Content => self.handle_content_key(key),
                }
                None
            }
        }
    }

    fn handle_global_hotkeys(&mut self, key: KeyEvent) -> bool {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Tab => {
                if settings::is_sidebar_shown() {
                    let next = if self.is_main_panel(MainPanel::LessonList) {
                        MainPanel::Content
                    } else {
                        MainPanel::LessonList
                    };
                    self.set_main_panel_focus(next);
                }
                true
            }
            KeyCode::Char('b') if ctrl => {
                let shown = !settings::is_sidebar_shown();
                settings::set_sidebar_shown(shown);
                if !shown {
                    self.set_main_panel_focus(MainPanel::Content);
                }
                true
            }
            KeyCode::Char('o') if ctrl => {
                self.open_with_system_viewer();
                true
            }
            KeyCode::Char(',') => {
                self.settings_popup = Some(SettingsPopup::new());
                self.open_popup(PopupWindow::Settings);
                true
            }
            KeyCode::Char('?') => {
                self.help_popup = Some(HelpPopup::new());
                self.open_popup(PopupWindow::Help);
                true
            }
            KeyCode::Char('H') => {
                self.open_annotation_viewer(None);
                true
            }
            _ => false,
        }
    }

    fn handle_lesson_list_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('j') | KeyCode::Down => self.lesson_list.move_selection_down(),
            KeyCode::Char('k') | KeyCode::Up => self.lesson_list.move_selection_up(),
            KeyCode::Enter | KeyCode::Char('l') | KeyCode::Right => {
                if let Some(id) = self.lesson_list.selected_lesson().map(|l| l.id) {
                    self.open_lesson(id);
                }
            }
            KeyCode::Esc => {
                self.notifications.dismiss_current();
            }
            _ => {}
        }
    }

    fn handle_content_key(&mut self, key: KeyEvent) {
        let Some(page) = self.page_view.as_mut() else {
            if key.code == KeyCode::Esc {
                self.notifications.dismiss_current();
            }
            return;
        };

        if key.code == KeyCode::Esc && !page.has_selection() {
            self.notifications.dismiss_current();
            return;
        }

        match page.handle_key(key) {
            Some(PageViewAction::AskAi) => self.open_ai_panel(),
            Some(PageViewAction::AddNote) => self.open_notes_panel(),
            Some(PageViewAction::CopySelection) => self.copy_page_selection(),
            Some(PageViewAction::OpenHighlight(point)) => {
                if let Some(id) = self.highlight_at_cell(point) {
                    self.open_annotation_viewer(Some(id));
                }
            }
            Some(PageViewAction::PageChanged) => {
                self.overlay = HighlightOverlay::default();
            }
            None => {}
        }
    }

    fn handle_popup_key(&mut self, popup: PopupWindow, key: KeyEvent) {
        match popup {
            PopupWindow::SelectionMenu => {
                let action = self
                    .selection_menu
                    .as_mut()
                    .and_then(|menu| menu.handle_key(key));
                if let Some(action) = action {
                    self.apply_selection_menu_action(action);
                }
            }
            PopupWindow::Notes => {
                let action = self
                    .notes_panel
                    .as_mut()
                    .and_then(|panel| panel.handle_key(key));
                match action {
                    Some(NotesPanelAction::Save) => self.save_note(),
                    Some(NotesPanelAction::Cancel) => self.close_notes_panel(),
                    None => {}
                }
            }
            PopupWindow::Ai => {
                let action = self
                    .ai_panel
                    .as_mut()
                    .and_then(|panel| ai_panel::handle_key(panel, key));
                if let Some(action) = action {
                    self.apply_ai_panel_action(action);
                }
            }
            PopupWindow::Annotations => {
                let action = self
                    .annotation_viewer
                    .as_mut()
                    .and_then(|viewer| viewer.handle_key(key));
                match action {
                    Some(AnnotationViewerAction::Close) => {
                        self.annotation_viewer = None;
                        self.close_popup();
                    }
                    Some(AnnotationViewerAction::Delete(id)) => self.delete_annotation(id),
                    Some(AnnotationViewerAction::Copy(id)) => {
                        if let Some(text) = self.store.get(id).map(annotation_to_text) {
                            self.copy_to_clipboard(text, "Annotation copied");
                        }
                    }
                    None => {}
                }
            }
            PopupWindow::Settings => {
                let action = self
                    .settings_popup
                    .as_mut()
                    .and_then(|popup| popup.handle_key(key));
                match action {
                    Some(SettingsAction::Close) => {
                        self.settings_popup = None;
                        self.close_popup();
                    }
                    Some(SettingsAction::SettingsChanged { backend_changed }) => {
                        if backend_changed {
                            self.rebuild_ai_service();
                        }
                    }
                    None => {}
                }
            }
            PopupWindow::Help => {
                let action = self
                    .help_popup
                    .as_mut()
                    .and_then(|help| help.handle_key(key));
                if action == Some(HelpPopupAction::Close) {
                    self.help_popup = None;
                    self.close_popup();
                }
            }
        }
    }

    fn apply_selection_menu_action(&mut self, action: SelectionMenuAction) {
        self.selection_menu = None;
        self.close_popup();
        match action {
            SelectionMenuAction::OpenAi => self.open_ai_panel(),
            SelectionMenuAction::OpenNote => self.open_notes_panel(),
            SelectionMenuAction::Copy => {
                self.copy_page_selection();
                self.clear_page_selection();
            }
            SelectionMenuAction::Dismiss => self.clear_page_selection(),
        }
    }

    fn apply_ai_panel_action(&mut self, action: AiPanelAction) {
        let Some(panel) = self.ai_panel.as_mut() else {
            return;
        };
        match action {
            AiPanelAction::Choose(action) => {
                panel.choose_action(action, &mut self.ai);
            }
            AiPanelAction::Regenerate => {
                panel.regenerate(&mut self.ai);
            }
            AiPanelAction::ChangeAction => panel.change_action(&mut self.ai),
            AiPanelAction::Save => match panel.save(&mut self.store) {
                Ok(Some(id)) => {
                    self.on_annotation_saved(id, "AI explanation saved");
                    self.close_ai_panel();
                }
                Ok(None) => {}
                Err(e) => {
                    error!("Failed to save AI annotation: {e}");
                    self.show_error(format!("Could not save: {e}"));
                }
            },
            AiPanelAction::Copy => {
                if let Some(response) = panel.response().map(str::to_string) {
                    self.copy_to_clipboard(response, "Response copied");
                }
            }
            AiPanelAction::Close => self.close_ai_panel(),
        }
    }

    fn open_ai_panel(&mut self) {
        let Some((lesson_id, page_number, selection)) = self.page_target() else {
            self.show_warning("Open a lesson first");
            return;
        };
        if selection.is_none() {
            self.show_warning("Select some text to ask about");
        }
        let chapter = self
            .catalog
            .get(lesson_id)
            .map_or(lesson_id, |lesson| lesson.number);
        let context = AiContext {
            chapter,
            class_level: settings::get_class_level(),
            subject: settings::get_preferred_subject(),
        };
        self.ai_panel = Some(AiPanel::new(selection, lesson_id, page_number, context));
        self.open_popup(PopupWindow::Ai);
    }

    /// Lesson, page and captured selection a new panel works on.
    fn page_target(&self) -> Option<(u32, usize, Option<SelectionInfo>)> {
        self.page_view
            .as_ref()
            .map(|page| (page.lesson_id(), page.current_page(), page.capture_selection()))
    }

    fn close_ai_panel(&mut self) {
        if let Some(mut panel) = self.ai_panel.take() {
            panel.close(&mut self.ai);
        }
        self.clear_page_selection();
        if self.focused_panel == FocusedPanel::Popup(PopupWindow::Ai) {
            self.close_popup();
        }
    }

    fn open_notes_panel(&mut self) {
        let Some((lesson_id, page_number, selection)) = self.page_target() else {
            self.show_warning("Open a lesson first");
            return;
        };
        if selection.is_none() {
            self.show_warning("Select some text to annotate");
        }
        self.notes_panel = Some(NotesPanel::new(selection, lesson_id, page_number));
        self.open_popup(PopupWindow::Notes);
    }

    fn save_note(&mut self) {
        let Some(panel) = self.notes_panel.as_mut() else {
            return;
        };
        match panel.save(&mut self.store) {
            Ok(Some(id)) => {
                self.on_annotation_saved(id, "Note saved");
                self.close_notes_panel();
            }
            Ok(None) => {}
            Err(e) => {
                error!("Failed to save note: {e}");
                self.show_error(format!("Could not save: {e}"));
            }
        }
    }

    fn close_notes_panel(&mut self) {
        self.notes_panel = None;
        self.clear_page_selection();
        if self.focused_panel == FocusedPanel::Popup(PopupWindow::Notes) {
            self.close_popup();
        }
    }

    fn on_annotation_saved(&mut self, id: AnnotationId, message: &str) {
        self.show_info(message);
        if !settings::is_sync_annotations() {
            return;
        }
        if let (Some(client), Some(annotation)) = (&self.api_client, self.store.get(id)) {
            spawn_annotation_sync(client.clone(), annotation.clone());
        }
    }

    fn open_annotation_viewer(&mut self, focus: Option<AnnotationId>) {
        let Some(page) = self.page_view.as_ref() else {
            self.show_warning("Open a lesson first");
            return;
        };
        let viewer = AnnotationViewer::new(
            &self.store,
            page.lesson_id(),
            page.current_page(),
            focus,
        );
        self.annotation_viewer = Some(viewer);
        self.open_popup(PopupWindow::Annotations);
    }

    fn delete_annotation(&mut self, id: AnnotationId) {
        match self.store.delete(id) {
            Ok(annotation) => {
                info!("Deleted annotation {id}");
                self.show_info(format!("Deleted \"{}\"", annotation.title()));
            }
            Err(e) => {
                error!("Failed to delete annotation {id}: {e}");
                self.show_error(format!("Could not delete: {e}"));
            }
        }
        if let Some(viewer) = self.annotation_viewer.as_mut() {
            viewer.refresh(&self.store);
        }
    }

    fn rebuild_ai_service(&mut self) {
        if let Some(mut panel) = self.ai_panel.take() {
            panel.close(&mut self.ai);
        }
        let backend = settings::get_ai_backend();
        let client = match &self.api_client {
            Some(client) => Some(client.clone()),
            None => ApiClient::new(&settings::get_api_url())
                .map_err(|e| warn!("Could not create API client: {e}"))
                .ok(),
        };
        let generator = build_generator(
            backend,
            Duration::from_millis(settings::get_ai_delay_ms()),
            client,
        );
        self.ai = AiService::new(generator);
        self.show_info(format!("AI backend: {}", backend.as_str()));
    }

    fn highlight_at_cell(&self, point: SelectionPoint) -> Option<AnnotationId> {
        self.overlay
            .highlight_at(point.line, point.column)
            .map(|h| h.annotation_id)
    }

    fn clear_page_selection(&mut self) {
        if let Some(page) = self.page_view.as_mut() {
            page.clear_selection();
        }
    }

    fn copy_page_selection(&mut self) {
        let text = self
            .page_view
            .as_ref()
            .and_then(PageView::capture_selection)
            .map(|selection| selection.text);
        match text {
            Some(text) => self.copy_to_clipboard(text, "Copied selection"),
            None => self.show_warning("Nothing selected"),
        }
    }

    fn copy_to_clipboard(&mut self, text: String, message: &str) {
        let result = arboard::Clipboard::new()
            .map_err(|e| format!("Failed to access clipboard: {e}"))
            .and_then(|mut clipboard| {
                clipboard
                    .set_text(text)
                    .map_err(|e| format!("Failed to copy to clipboard: {e}"))
            });
        match result {
            Ok(()) => self.show_info(message),
            Err(e) => {
                warn!("{e}");
                self.show_error(e);
            }
        }
    }

    pub fn open_with_system_viewer(&mut self) {
        let Some(page) = self.page_view.as_ref() else {
            self.show_warning("No lesson open");
            return;
        };
        let page_number = page.current_page();
        match self
            .system_command_executor
            .open_file_at_page(page.document_path(), page_number)
        {
            Ok(()) => {
                info!("Opened {:?} at page {page_number}", page.document_path());
                self.show_info("Opened in external viewer");
            }
            Err(e) => {
                error!("Failed to open lesson document: {e}");
                self.show_error(format!("Failed to open in external viewer: {e}"));
            }
        }
    }

    pub fn handle_mouse_event(&mut self, mouse: MouseEvent) {
        match self.focused_panel {
            FocusedPanel::Popup(PopupWindow::SelectionMenu) => {
                if mouse.kind == MouseEventKind::Down(MouseButton::Left) {
                    let action = self
                        .selection_menu
                        .as_ref()
                        .map_or(SelectionMenuAction::Dismiss, |menu| {
                            menu.handle_click(mouse.column, mouse.row)
                        });
                    self.apply_selection_menu_action(action);
                }
            }
            FocusedPanel::Popup(PopupWindow::Settings) => {
                if mouse.kind == MouseEventKind::Down(MouseButton::Left)
                    && self
                        .settings_popup
                        .as_ref()
                        .is_some_and(|popup| popup.is_outside_popup_area(mouse.column, mouse.row))
                {
                    self.settings_popup = None;
                    self.close_popup();
                }
            }
            FocusedPanel::Popup(_) => {}
            FocusedPanel::Main(_) => {
                if contains(self.lesson_list_area, mouse.column, mouse.row) {
                    self.handle_lesson_list_mouse(mouse);
                } else if contains(self.page_area, mouse.column, mouse.row)
                    || matches!(mouse.kind, MouseEventKind::Drag(_) | MouseEventKind::Up(_))
                {
                    self.handle_page_mouse(mouse);
                }
            }
        }
    }

    fn handle_lesson_list_mouse(&mut self, mouse: MouseEvent) {
        match mouse.kind {
            MouseEventKind::ScrollDown => self.lesson_list.move_selection_down(),
            MouseEventKind::ScrollUp => self.lesson_list.move_selection_up(),
            MouseEventKind::Down(MouseButton::Left) => {
                self.set_main_panel_focus(MainPanel::LessonList);
                if self
                    .lesson_list
                    .handle_mouse_click(mouse.row, self.lesson_list_area)
                    && self.mouse_tracker.detect_click_type(mouse.column, mouse.row)
                        == ClickType::Double
                    && let Some(id) = self.lesson_list.selected_lesson().map(|l| l.id)
                {
                    self.open_lesson(id);
                }
            }
            _ => {}
        }
    }

    fn handle_page_mouse(&mut self, mouse: MouseEvent) {
        if mouse.kind == MouseEventKind::Down(MouseButton::Left) {
            self.set_main_panel_focus(MainPanel::Content);
            let position = ScreenPosition::new(mouse.column, mouse.row);
            if let Some(id) = self.overlay.marker_at(position).map(|h| h.annotation_id) {
                self.open_annotation_viewer(Some(id));
                return;
            }
        }

        let Some(page) = self.page_view.as_mut() else {
            return;
        };
        match page.handle_mouse(mouse) {
            MouseOutcome::Selected => match page.capture_selection() {
                Some(selection) => {
                    debug!(
                        "Selected {} chars on page {}",
                        selection.text.len(),
                        selection.source_page
                    );
                    self.selection_menu = Some(SelectionMenu::new(selection.position));
                    self.open_popup(PopupWindow::SelectionMenu);
                }
                None => page.clear_selection(),
            },
            MouseOutcome::Clicked(point) => {
                if let Some(id) = self.highlight_at_cell(point) {
                    self.open_annotation_viewer(Some(id));
                }
            }
            MouseOutcome::Handled | MouseOutcome::Ignored => {}
        }
    }

    pub fn draw(&mut self, f: &mut ratatui::Frame) {
        let palette = current_theme();
        let background_block = Block::default().style(Style::default().bg(palette.base_00));
        f.render_widget(background_block, f.area());

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(0), Constraint::Length(3)])
            .split(f.area());

        let content_area = if settings::is_sidebar_shown() {
            let main_chunks = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Percentage(30), Constraint::Percentage(70)])
                .split(chunks[0]);

            let note_counts: Vec<usize> = self
                .catalog
                .lessons()
                .iter()
                .map(|lesson| self.store.lesson_annotations(lesson.id).len())
                .collect();
            let current_lesson = self.page_view.as_ref().map(PageView::lesson_id);
            let list_focused = self.is_main_panel(MainPanel::LessonList);
            self.lesson_list.render(
                f,
                main_chunks[0],
                list_focused,
                palette,
                current_lesson,
                &note_counts,
            );
            self.lesson_list_area = main_chunks[0];
            main_chunks[1]
        } else {
            self.lesson_list_area = Rect::default();
            chunks[0]
        };
        self.page_area = content_area;

        let content_focused = self.is_main_panel(MainPanel::Content)
            || self.focused_panel == FocusedPanel::Popup(PopupWindow::SelectionMenu);
        if let Some(page) = self.page_view.as_mut() {
            let annotations = self
                .store
                .annotations_by_page(page.lesson_id(), page.current_page());
            self.overlay = page.render(f, content_area, content_focused, palette, annotations);
        } else {
            self.render_default_content(f, content_area, palette);
        }

        self.render_help_bar(f, chunks[1], palette);
        self.render_popups(f, palette);
    }

    fn render_popups(&mut self, f: &mut ratatui::Frame, palette: &Base16Palette) {
        let FocusedPanel::Popup(popup) = self.focused_panel else {
            return;
        };

        if popup == PopupWindow::SelectionMenu {
            if let Some(menu) = self.selection_menu.as_mut() {
                menu.render(f, self.page_area, palette);
            }
            return;
        }

        let dim_block = Block::default().style(
            Style::default()
                .bg(palette.base_00)
                .add_modifier(Modifier::DIM),
        );
        f.render_widget(dim_block, f.area());

        let area = f.area();
        match popup {
            PopupWindow::Notes => {
                if let Some(panel) = self.notes_panel.as_ref() {
                    panel.render(f, area, palette);
                }
            }
            PopupWindow::Ai => {
                if let Some(panel) = self.ai_panel.as_ref() {
                    ai_panel::render(f, area, panel, palette, self.tick);
                }
            }
            PopupWindow::Annotations => {
                if let Some(viewer) = self.annotation_viewer.as_mut() {
                    viewer.render(f, area, &self.store, palette);
                }
            }
            PopupWindow::Settings => {
                if let Some(settings_popup) = self.settings_popup.as_mut() {
                    settings_popup.render(f, area, palette);
                }
            }
            PopupWindow::Help => {
                if let Some(help) = self.help_popup.as_mut() {
                    help.render(f, area, palette);
                }
            }
            PopupWindow::SelectionMenu => {}
        }
    }

    fn render_default_content(&self, f: &mut ratatui::Frame, area: Rect, palette: &Base16Palette) {
        let (text_color, border_color, _bg_color) =
            palette.get_panel_colors(self.is_main_panel(MainPanel::Content));

        let content_border = Block::default()
            .borders(Borders::ALL)
            .title(" Lesson ")
            .border_style(Style::default().fg(border_color))
            .style(Style::default().bg(palette.base_00));

        let paragraph = Paragraph::new("Select a lesson to start reading")
            .block(content_border)
            .style(Style::default().fg(text_color).bg(palette.base_00));

        f.render_widget(paragraph, area);
    }

    fn render_help_bar(&self, f: &mut ratatui::Frame, area: Rect, palette: &Base16Palette) {
        let (_, border_color, _) = palette.get_panel_colors(false);

        let line = if let Some(notification) = self.notifications.current() {
            Line::from(vec![
                Span::styled(
                    notification.message.clone(),
                    Style::default().fg(notification.level.color(palette)),
                ),
                Span::styled(" | ESC: Dismiss", Style::default().fg(palette.base_03)),
            ])
        } else {
            let has_selection = self
                .page_view
                .as_ref()
                .is_some_and(PageView::has_selection);
            let help_text = match self.focused_panel {
                FocusedPanel::Main(MainPanel::Content) if has_selection => {
                    "a: Ask AI | n: Add note | y: Copy | ESC: Clear selection"
                }
                FocusedPanel::Main(MainPanel::LessonList) => {
                    "j/k: Navigate | Enter: Open | Tab: Switch | ,: Settings | ?: Help | q: Quit"
                }
                FocusedPanel::Main(MainPanel::Content) => {
                    "hjkl: Move | v: Select | ]/[: Page | H: Annotations | Tab: Switch | q: Quit"
                }
                FocusedPanel::Popup(PopupWindow::SelectionMenu) => {
                    "a: Ask AI | n: Add note | y: Copy | ESC: Dismiss"
                }
                FocusedPanel::Popup(PopupWindow::Notes) => {
                    "Tab: Switch field | Ctrl+s: Save | ESC: Cancel"
                }
                FocusedPanel::Popup(PopupWindow::Ai) => {
                    "1-4: Action | r: Regenerate | c: Change | s: Save | ESC: Close"
                }
                FocusedPanel::Popup(PopupWindow::Annotations) => {
                    "j/k: Navigate | d: Delete | y: Copy | ESC: Close"
                }
                FocusedPanel::Popup(PopupWindow::Settings) => {
                    "j/k: Navigate | h/l: Change | ESC: Close"
                }
                FocusedPanel::Popup(PopupWindow::Help) => {
                    "j/k/Ctrl+d/u: Scroll | g/G: Top/Bottom | ESC/?: Close"
                }
            };
            Line::from(Span::styled(help_text, Style::default().fg(palette.base_04)))
        };

        let help_bar = Paragraph::new(line).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(border_color))
                .style(Style::default().bg(palette.base_00)),
        );
        f.render_widget(help_bar, area);
    }
}

impl Drop for App {
    fn drop(&mut self) {
        if let Some(mut panel) = self.ai_panel.take() {
            panel.close(&mut self.ai);
        }
    }
}

fn contains(area: Rect, column: u16, row: u16) -> bool {
    column >= area.x && column < area.x + area.width && row >= area.y && row < area.y + area.height
}

pub fn run_app_with_event_source<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    event_source: &mut dyn EventSource,
) -> Result<()>
where
    B::Error: Send + Sync + 'static,
{
    let tick_rate = Duration::from_millis(50);
    let mut last_tick = std::time::Instant::now();
    let mut first_render = true;
    loop {
        let mut events_processed = 0;
        let mut should_quit = false;
        while event_source.poll(Duration::from_millis(0))? && events_processed < 50 {
            let event = event_source.read()?;
            events_processed += 1;

            match event {
                Event::Key(key) => {
                    if app.handle_key_event(key) == Some(AppAction::Quit) {
                        should_quit = true;
                    }
                }
                Event::Mouse(mouse_event) => match mouse_event.kind {
                    // Horizontal scroll floods the queue on trackpads
                    MouseEventKind::ScrollLeft | MouseEventKind::ScrollRight => {}
                    _ => app.handle_mouse_event(mouse_event),
                },
                _ => {}
            }

            if should_quit {
                break;
            }
            // Mouse coordinates depend on the layout, keep it current between events
            terminal.draw(|f| app.draw(f))?;
        }

        let mut needs_redraw = events_processed > 0;
        if first_render {
            needs_redraw = true;
            first_render = false;
        }

        if last_tick.elapsed() >= tick_rate {
            if app.tick() {
                needs_redraw = true;
            }
            last_tick = std::time::Instant::now();
        }

        if should_quit {
            info!("Quitting");
            return Ok(());
        }

        if needs_redraw {
            terminal.draw(|f| app.draw(f))?;
        }

        if events_processed == 0 {
            let timeout = tick_rate
                .checked_sub(last_tick.elapsed())
                .unwrap_or_else(|| Duration::from_secs(0));
            let _ = event_source.poll(timeout);
        }
    }
}
