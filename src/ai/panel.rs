//! State of the AI explanation panel
//!
//! The panel walks `Idle -> ActionChosen -> Processing -> ResponseReady`.
//! Every generation is tied to the `RequestId` it was submitted under, so a
//! completion arriving after the panel moved on is ignored.

use log::{debug, info};

use super::{AiAction, AiCompletion, AiRequester, GenerationRequest, RequestId};
use crate::annotations::{AnnotationError, AnnotationId, AnnotationStore, NewAiAnnotation};
use crate::selection::SelectionInfo;

/// Reader context sent along with each generation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AiContext {
    pub chapter: u32,
    pub class_level: u8,
    pub subject: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AiPhase {
    Idle,
    ActionChosen {
        action: AiAction,
    },
    Processing {
        action: AiAction,
        request: RequestId,
    },
    ResponseReady {
        action: AiAction,
        response: String,
    },
}

impl AiPhase {
    pub fn action(&self) -> Option<AiAction> {
        match self {
            AiPhase::Idle => None,
            AiPhase::ActionChosen { action }
            | AiPhase::Processing { action, .. }
            | AiPhase::ResponseReady { action, .. } => Some(*action),
        }
    }
}

pub struct AiPanel {
    selection: Option<SelectionInfo>,
    lesson_id: u32,
    page_number: usize,
    context: AiContext,
    phase: AiPhase,
    highlighted: usize,
    last_error: Option<String>,
}

impl AiPanel {
    pub fn new(
        selection: Option<SelectionInfo>,
        lesson_id: u32,
        page_number: usize,
        context: AiContext,
    ) -> Self {
        Self {
            selection,
            lesson_id,
            page_number,
            context,
            phase: AiPhase::Idle,
            highlighted: 0,
            last_error: None,
        }
    }

    pub fn phase(&self) -> &AiPhase {
        &self.phase
    }

    pub fn selection(&self) -> Option<&SelectionInfo> {
        self.selection.as_ref()
    }

    pub fn selected_text(&self) -> &str {
        self.selection.as_ref().map_or("", |s| s.text.as_str())
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn context(&self) -> &AiContext {
        &self.context
    }

    pub fn highlighted_action(&self) -> AiAction {
        AiAction::ALL[self.highlighted]
    }

    pub fn highlight_next(&mut self) {
        self.highlighted = (self.highlighted + 1) % AiAction::ALL.len();
    }

    pub fn highlight_previous(&mut self) {
        self.highlighted = (self.highlighted + AiAction::ALL.len() - 1) % AiAction::ALL.len();
    }

    pub fn response(&self) -> Option<&str> {
        match &self.phase {
            AiPhase::ResponseReady { response, .. } => Some(response),
            _ => None,
        }
    }

    pub fn pending_request(&self) -> Option<RequestId> {
        match self.phase {
            AiPhase::Processing { request, .. } => Some(request),
            _ => None,
        }
    }

    pub fn is_processing(&self) -> bool {
        self.pending_request().is_some()
    }

    /// Picks an action and immediately starts generating. Only valid from
    /// `Idle`; without selected text nothing happens.
    pub fn choose_action(&mut self, action: AiAction, requester: &mut dyn AiRequester) -> bool {
        if self.phase != AiPhase::Idle || self.selected_text().trim().is_empty() {
            return false;
        }
        if let Some(idx) = AiAction::ALL.iter().position(|a| *a == action) {
            self.highlighted = idx;
        }
        self.phase = AiPhase::ActionChosen { action };
        self.start_generation(action, requester);
        true
    }

    /// Generates again with the same action, from a ready response or after a
    /// failed attempt.
    pub fn regenerate(&mut self, requester: &mut dyn AiRequester) -> bool {
        let action = match &self.phase {
            AiPhase::ResponseReady { action, .. } | AiPhase::ActionChosen { action } => *action,
            _ => return false,
        };
        self.start_generation(action, requester);
        true
    }

    /// Back to `Idle`. Any unsaved response is discarded.
    pub fn change_action(&mut self, requester: &mut dyn AiRequester) {
        self.cancel_pending(requester);
        self.phase = AiPhase::Idle;
        self.last_error = None;
    }

    /// Applies a finished generation. Returns false when it belongs to a
    /// request this panel no longer waits for.
    pub fn complete(&mut self, completion: &AiCompletion) -> bool {
        let action = match self.phase {
            AiPhase::Processing { action, request } if request == completion.id => action,
            _ => {
                debug!("Ignoring stale completion {:?}", completion.id);
                return false;
            }
        };

        match &completion.result {
            Ok(response) => {
                self.phase = AiPhase::ResponseReady {
                    action,
                    response: response.clone(),
                };
            }
            Err(message) => {
                self.last_error = Some(message.clone());
                self.phase = AiPhase::ActionChosen { action };
            }
        }
        true
    }

    pub fn can_save(&self) -> bool {
        !self.selected_text().trim().is_empty()
            && matches!(&self.phase, AiPhase::ResponseReady { response, .. } if !response.trim().is_empty())
    }

    /// Stores the response as an annotation and resets the panel. Returns
    /// `None` when there is nothing to save yet.
    pub fn save(
        &mut self,
        store: &mut AnnotationStore,
    ) -> Result<Option<AnnotationId>, AnnotationError> {
        if !self.can_save() {
            return Ok(None);
        }
        let AiPhase::ResponseReady { action, response } = &self.phase else {
            return Ok(None);
        };
        let Some(selection) = self.selection.clone() else {
            return Ok(None);
        };

        let id = store.add_ai_annotation(NewAiAnnotation {
            lesson_id: self.lesson_id,
            page_number: self.page_number,
            selection,
            action: *action,
            response: response.clone(),
        })?;
        info!(
            "Saved AI annotation {id} ({}) on lesson {} page {}",
            action.id(),
            self.lesson_id,
            self.page_number
        );
        self.reset();
        Ok(Some(id))
    }

    /// Cancels outstanding work and drops the selection.
    pub fn close(&mut self, requester: &mut dyn AiRequester) {
        self.cancel_pending(requester);
        self.reset();
    }

    fn reset(&mut self) {
        self.phase = AiPhase::Idle;
        self.selection = None;
        self.last_error = None;
        self.highlighted = 0;
    }

    fn cancel_pending(&mut self, requester: &mut dyn AiRequester) {
        if let Some(id) = self.pending_request() {
            requester.cancel(id);
        }
    }

    fn start_generation(&mut self, action: AiAction, requester: &mut dyn AiRequester) {
        self.cancel_pending(requester);
        self.last_error = None;
        let request = requester.submit(GenerationRequest {
            action,
            text: self.selected_text().to_string(),
            chapter: self.context.chapter,
            class_level: self.context.class_level,
            subject: self.context.subject.clone(),
        });
        self.phase = AiPhase::Processing { action, request };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::simulated_response;
    use crate::selection::ScreenPosition;

    #[derive(Default)]
    struct RecordingRequester {
        submitted: Vec<GenerationRequest>,
        cancelled: Vec<RequestId>,
        next: u64,
    }

    impl AiRequester for RecordingRequester {
        fn submit(&mut self, request: GenerationRequest) -> RequestId {
            self.submitted.push(request);
            self.next += 1;
            RequestId::new(self.next)
        }

        fn cancel(&mut self, id: RequestId) {
            self.cancelled.push(id);
        }
    }

    fn selection(text: &str) -> SelectionInfo {
        SelectionInfo {
            text: text.to_string(),
            position: ScreenPosition::new(4, 9),
            source_page: 2,
            range: None,
        }
    }

    fn panel(text: &str) -> AiPanel {
        AiPanel::new(
            Some(selection(text)),
            1,
            2,
            AiContext {
                chapter: 1,
                class_level: 6,
                subject: "History".to_string(),
            },
        )
    }

    fn finish(panel: &mut AiPanel, text: &str) -> bool {
        let id = panel.pending_request().unwrap();
        let action = panel.phase().action().unwrap();
        panel.complete(&AiCompletion {
            id,
            result: Ok(simulated_response(action, text)),
        })
    }

    #[test]
    fn full_cycle_saves_and_resets() {
        let mut requester = RecordingRequester::default();
        let mut store = AnnotationStore::in_memory();
        let mut panel = panel("T");

        assert!(panel.choose_action(AiAction::Simplify, &mut requester));
        assert!(panel.is_processing());
        assert_eq!(requester.submitted[0].text, "T");
        assert_eq!(requester.submitted[0].subject, "History");
        assert!(!panel.can_save());

        assert!(finish(&mut panel, "T"));
        assert!(panel.response().unwrap().contains("Simplified"));
        assert!(panel.can_save());

        let id = panel.save(&mut store).unwrap().unwrap();
        assert_eq!(*panel.phase(), AiPhase::Idle);
        assert!(panel.selection().is_none());

        let saved = store.annotations_by_page(1, 2);
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].id, id);
        assert_eq!(saved[0].source_text, "T");
    }

    #[test]
    fn closing_mid_processing_cancels_and_ignores_late_completion() {
        let mut requester = RecordingRequester::default();
        let mut store = AnnotationStore::in_memory();
        let mut panel = panel("T");

        panel.choose_action(AiAction::Explain, &mut requester);
        let pending = panel.pending_request().unwrap();
        panel.close(&mut requester);
        assert_eq!(requester.cancelled, vec![pending]);

        let applied = panel.complete(&AiCompletion {
            id: pending,
            result: Ok("late".to_string()),
        });
        assert!(!applied);
        assert_eq!(panel.save(&mut store).unwrap(), None);
        assert!(store.is_empty());
    }

    #[test]
    fn regenerate_uses_same_action_and_new_request() {
        let mut requester = RecordingRequester::default();
        let mut panel = panel("T");

        panel.choose_action(AiAction::Examples, &mut requester);
        let first = panel.pending_request().unwrap();
        finish(&mut panel, "T");

        assert!(panel.regenerate(&mut requester));
        let second = panel.pending_request().unwrap();
        assert_ne!(first, second);
        assert_eq!(requester.submitted[1].action, AiAction::Examples);

        // The first request is long gone
        assert!(!panel.complete(&AiCompletion {
            id: first,
            result: Ok("old".to_string()),
        }));
        assert!(panel.is_processing());
    }

    #[test]
    fn change_action_discards_response() {
        let mut requester = RecordingRequester::default();
        let mut panel = panel("T");

        panel.choose_action(AiAction::Refine, &mut requester);
        finish(&mut panel, "T");
        panel.change_action(&mut requester);

        assert_eq!(*panel.phase(), AiPhase::Idle);
        assert!(panel.response().is_none());
        assert!(panel.selection().is_some());
        assert!(panel.choose_action(AiAction::Explain, &mut requester));
    }

    #[test]
    fn change_action_while_processing_cancels_request() {
        let mut requester = RecordingRequester::default();
        let mut panel = panel("T");

        panel.choose_action(AiAction::Refine, &mut requester);
        let pending = panel.pending_request().unwrap();
        panel.change_action(&mut requester);
        assert_eq!(requester.cancelled, vec![pending]);
    }

    #[test]
    fn failure_returns_to_action_chosen_with_error() {
        let mut requester = RecordingRequester::default();
        let mut panel = panel("T");

        panel.choose_action(AiAction::Simplify, &mut requester);
        let id = panel.pending_request().unwrap();
        panel.complete(&AiCompletion {
            id,
            result: Err("backend returned 500".to_string()),
        });

        assert_eq!(
            *panel.phase(),
            AiPhase::ActionChosen {
                action: AiAction::Simplify
            }
        );
        assert_eq!(panel.last_error(), Some("backend returned 500"));
        assert!(!panel.can_save());

        assert!(panel.regenerate(&mut requester));
        assert!(panel.last_error().is_none());
        assert_eq!(requester.submitted.len(), 2);
    }

    #[test]
    fn no_selection_means_no_request() {
        let mut requester = RecordingRequester::default();
        let mut panel = panel("   ");

        assert!(!panel.choose_action(AiAction::Simplify, &mut requester));
        assert!(requester.submitted.is_empty());
        assert_eq!(*panel.phase(), AiPhase::Idle);
    }

    #[test]
    fn highlight_wraps_around() {
        let mut panel = panel("T");
        panel.highlight_previous();
        assert_eq!(panel.highlighted_action(), AiAction::Explain);
        panel.highlight_next();
        assert_eq!(panel.highlighted_action(), AiAction::Simplify);
    }
}
