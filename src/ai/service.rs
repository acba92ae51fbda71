//! AI service - hands generation requests to worker threads

use std::collections::HashMap;
use std::sync::Arc;

use flume::{Receiver, Sender};
use log::{debug, warn};

use super::{CancelToken, GenerationError, GenerationRequest, ResponseGenerator};

const DEFAULT_WORKERS: usize = 2;

/// Unique identifier for generation requests
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RequestId(pub u64);

impl RequestId {
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }
}

enum WorkerRequest {
    Generate {
        id: RequestId,
        request: GenerationRequest,
        cancel: CancelToken,
    },
    Shutdown,
}

/// Finished generation. Errors are carried as display strings, ready for the
/// panel to show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AiCompletion {
    pub id: RequestId,
    pub result: Result<String, String>,
}

/// Where panels send generation requests. Implemented by `AiService`; tests
/// substitute a recorder.
pub trait AiRequester {
    fn submit(&mut self, request: GenerationRequest) -> RequestId;

    fn cancel(&mut self, id: RequestId);
}

pub struct AiService {
    request_tx: Sender<WorkerRequest>,
    response_rx: Receiver<AiCompletion>,
    next_request_id: u64,
    pending: HashMap<RequestId, CancelToken>,
    num_workers: usize,
}

impl AiService {
    #[must_use]
    pub fn new(generator: Arc<dyn ResponseGenerator>) -> Self {
        Self::with_workers(generator, DEFAULT_WORKERS)
    }

    #[must_use]
    pub fn with_workers(generator: Arc<dyn ResponseGenerator>, num_workers: usize) -> Self {
        // Workers share one request queue, so the receiver has to be cloneable
        let (request_tx, request_rx) = flume::unbounded();
        let (response_tx, response_rx) = flume::unbounded();

        for _ in 0..num_workers.max(1) {
            let rx = request_rx.clone();
            let tx = response_tx.clone();
            let generator = generator.clone();

            std::thread::spawn(move || {
                generation_worker(generator, rx, tx);
            });
        }

        Self {
            request_tx,
            response_rx,
            next_request_id: 1,
            pending: HashMap::new(),
            num_workers: num_workers.max(1),
        }
    }

    pub fn is_pending(&self, id: RequestId) -> bool {
        self.pending.contains_key(&id)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Drains finished generations. Completions of cancelled requests are
    /// dropped here even if a worker already produced them.
    pub fn poll(&mut self) -> Vec<AiCompletion> {
        let mut completions = Vec::new();
        for completion in self.response_rx.try_iter() {
            if self.pending.remove(&completion.id).is_some() {
                completions.push(completion);
            } else {
                debug!("Dropping completion of cancelled request {:?}", completion.id);
            }
        }
        completions
    }

    pub fn shutdown(&self) {
        for _ in 0..self.num_workers {
            let _ = self.request_tx.send(WorkerRequest::Shutdown);
        }
    }

    fn next_id(&mut self) -> RequestId {
        let id = RequestId::new(self.next_request_id);
        self.next_request_id += 1;
        id
    }
}

impl AiRequester for AiService {
    fn submit(&mut self, request: GenerationRequest) -> RequestId {
        let id = self.next_id();
        let cancel = CancelToken::new();
        debug!(
            "Submitting {} request {:?} ({} chars)",
            request.action.id(),
            id,
            request.text.len()
        );

        if self
            .request_tx
            .send(WorkerRequest::Generate {
                id,
                request,
                cancel: cancel.clone(),
            })
            .is_err()
        {
            warn!("AI workers are gone, request {id:?} will never complete");
        }
        self.pending.insert(id, cancel);
        id
    }

    fn cancel(&mut self, id: RequestId) {
        if let Some(cancel) = self.pending.remove(&id) {
            debug!("Cancelling request {id:?}");
            cancel.cancel();
        }
    }
}

impl Drop for AiService {
    fn drop(&mut self) {
        for cancel in self.pending.values() {
            cancel.cancel();
        }
        self.shutdown();
    }
}

fn generation_worker(
    generator: Arc<dyn ResponseGenerator>,
    rx: Receiver<WorkerRequest>,
    tx: Sender<AiCompletion>,
) {
    while let Ok(message) = rx.recv() {
        match message {
            WorkerRequest::Generate {
                id,
                request,
                cancel,
            } => {
                if cancel.is_cancelled() {
                    continue;
                }
                let result = match generator.generate(&request, &cancel) {
                    Ok(response) => Ok(response),
                    Err(GenerationError::Cancelled) => continue,
                    Err(e) => {
                        warn!("Generation {id:?} failed: {e}");
                        Err(e.to_string())
                    }
                };
                if cancel.is_cancelled() {
                    continue;
                }
                if tx.send(AiCompletion { id, result }).is_err() {
                    break;
                }
            }
            WorkerRequest::Shutdown => break,
        }
    }
}
