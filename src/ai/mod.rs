//! AI explanations for selected text: the four actions, response generators
//! and the worker service that runs them off the UI thread.

pub mod panel;
pub mod service;

pub use panel::{AiContext, AiPanel, AiPhase};
pub use service::{AiCompletion, AiRequester, AiService, RequestId};

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::api::{ApiClient, ApiError, ExplainRequest};
use crate::settings::AiBackend;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiAction {
    Simplify,
    Refine,
    Examples,
    Explain,
}

impl AiAction {
    pub const ALL: [AiAction; 4] = [
        AiAction::Simplify,
        AiAction::Refine,
        AiAction::Examples,
        AiAction::Explain,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            AiAction::Simplify => "simplify",
            AiAction::Refine => "refine",
            AiAction::Examples => "examples",
            AiAction::Explain => "explain",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AiAction::Simplify => "Simplify",
            AiAction::Refine => "Refine",
            AiAction::Examples => "Examples",
            AiAction::Explain => "Explain",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            AiAction::Simplify => "Make it easier to understand",
            AiAction::Refine => "Improve and enhance the text",
            AiAction::Examples => "Provide practical examples",
            AiAction::Explain => "Detailed explanation",
        }
    }

    /// Explanation mode understood by the lesson backend's chat endpoint.
    pub fn backend_mode(&self) -> &'static str {
        match self {
            AiAction::Simplify => "simple",
            AiAction::Refine => "summary",
            AiAction::Examples => "example",
            AiAction::Explain => "meaning",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|action| action.id() == id)
    }
}

/// Deterministic placeholder answer for an action.
pub fn simulated_response(action: AiAction, text: &str) -> String {
    match action {
        AiAction::Simplify => format!(
            "Simplified version:\n\n{text}\n\nThis text explains the concept in simpler terms..."
        ),
        AiAction::Refine => format!(
            "Refined version:\n\n{text}\n\nEnhanced with better clarity and structure..."
        ),
        AiAction::Examples => format!(
            "Examples:\n\n1. Example one related to: {text}\n2. Example two...\n3. Example three..."
        ),
        AiAction::Explain => {
            format!("Detailed Explanation:\n\n{text}\n\nThis concept works by...")
        }
    }
}

/// Everything a generator needs to answer one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub action: AiAction,
    pub text: String,
    pub chapter: u32,
    pub class_level: u8,
    pub subject: String,
}

/// Shared flag a worker checks to drop work nobody waits for anymore.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("request was cancelled")]
    Cancelled,

    #[error(transparent)]
    Api(#[from] ApiError),
}

pub trait ResponseGenerator: Send + Sync {
    fn generate(
        &self,
        request: &GenerationRequest,
        cancel: &CancelToken,
    ) -> Result<String, GenerationError>;
}

/// Answers with the templated response after a fixed delay.
pub struct SimulatedGenerator {
    delay: Duration,
}

const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(10);

impl SimulatedGenerator {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl ResponseGenerator for SimulatedGenerator {
    fn generate(
        &self,
        request: &GenerationRequest,
        cancel: &CancelToken,
    ) -> Result<String, GenerationError> {
        let deadline = Instant::now() + self.delay;
        loop {
            if cancel.is_cancelled() {
                return Err(GenerationError::Cancelled);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            std::thread::sleep(remaining.min(CANCEL_POLL_INTERVAL));
        }

        Ok(simulated_response(request.action, &request.text))
    }
}

/// Asks the lesson backend for the explanation.
pub struct RemoteGenerator {
    client: ApiClient,
}

impl RemoteGenerator {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

impl ResponseGenerator for RemoteGenerator {
    fn generate(
        &self,
        request: &GenerationRequest,
        cancel: &CancelToken,
    ) -> Result<String, GenerationError> {
        if cancel.is_cancelled() {
            return Err(GenerationError::Cancelled);
        }

        let response = self.client.explain(&ExplainRequest {
            highlight_text: &request.text,
            mode: request.action.backend_mode(),
            class_level: request.class_level,
            subject: &request.subject,
            chapter: request.chapter,
        })?;

        if cancel.is_cancelled() {
            return Err(GenerationError::Cancelled);
        }
        Ok(response.answer)
    }
}

/// Generator for the configured backend. Remote needs a client; without one
/// the simulated generator is used.
pub fn build_generator(
    backend: AiBackend,
    delay: Duration,
    client: Option<ApiClient>,
) -> Arc<dyn ResponseGenerator> {
    match (backend, client) {
        (AiBackend::Remote, Some(client)) => {
            info!("AI explanations come from {}", client.base_url());
            Arc::new(RemoteGenerator::new(client))
        }
        (AiBackend::Remote, None) => {
            warn!("Remote AI backend selected without a usable API client, simulating");
            Arc::new(SimulatedGenerator::new(delay))
        }
        (AiBackend::Simulated, _) => Arc::new(SimulatedGenerator::new(delay)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(action: AiAction, text: &str) -> GenerationRequest {
        GenerationRequest {
            action,
            text: text.to_string(),
            chapter: 1,
            class_level: 6,
            subject: "Social Science".to_string(),
        }
    }

    #[test]
    fn simplify_template_mentions_text() {
        let response = simulated_response(AiAction::Simplify, "T");
        assert!(response.contains("Simplified"));
        assert!(response.contains('T'));
        assert!(response.starts_with("Simplified version:\n\nT\n\n"));
    }

    #[test]
    fn every_action_embeds_the_selection() {
        for action in AiAction::ALL {
            let response = simulated_response(action, "the Indus valley");
            assert!(response.contains("the Indus valley"), "{action:?}");
        }
        assert!(simulated_response(AiAction::Examples, "x").starts_with("Examples:"));
        assert!(simulated_response(AiAction::Explain, "x").starts_with("Detailed Explanation:"));
        assert!(simulated_response(AiAction::Refine, "x").starts_with("Refined version:"));
    }

    #[test]
    fn action_ids_round_trip() {
        for action in AiAction::ALL {
            assert_eq!(AiAction::from_id(action.id()), Some(action));
        }
        assert_eq!(AiAction::from_id("summarize"), None);
    }

    #[test]
    fn simulated_generator_waits_for_delay() {
        let generator = SimulatedGenerator::new(Duration::from_millis(30));
        let started = Instant::now();
        let response = generator
            .generate(&request(AiAction::Simplify, "T"), &CancelToken::new())
            .unwrap();

        assert!(started.elapsed() >= Duration::from_millis(30));
        assert!(response.contains("Simplified"));
    }

    #[test]
    fn simulated_generator_stops_when_cancelled() {
        let generator = SimulatedGenerator::new(Duration::from_secs(10));
        let cancel = CancelToken::new();
        cancel.cancel();

        let started = Instant::now();
        let result = generator.generate(&request(AiAction::Explain, "T"), &cancel);
        assert!(matches!(result, Err(GenerationError::Cancelled)));
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
