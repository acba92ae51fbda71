//! HTTP client for the lesson backend
//!
//! Only the chat contract is spoken here: `POST /api/chat` answers a
//! highlighted passage, `POST /api/annotations` mirrors saved annotations and
//! `GET /health` tells whether the backend is up.

use std::time::Duration;

use log::{debug, error, warn};
use serde::{Deserialize, Serialize};

use crate::annotations::Annotation;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const HEALTH_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("backend returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unexpected response body: {0}")]
    Decode(serde_json::Error),
}

/// Body of `POST /api/chat`.
#[derive(Debug, Serialize)]
pub struct ExplainRequest<'a> {
    pub highlight_text: &'a str,
    pub mode: &'a str,
    pub class_level: u8,
    pub subject: &'a str,
    pub chapter: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExplainResponse {
    pub answer: String,
    #[serde(default)]
    pub source_chunks: Vec<serde_json::Value>,
}

#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    http: reqwest::blocking::Client,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn explain(&self, request: &ExplainRequest<'_>) -> Result<ExplainResponse, ApiError> {
        debug!(
            "POST /api/chat mode={} chapter={} ({} chars)",
            request.mode,
            request.chapter,
            request.highlight_text.len()
        );
        let response = self.http.post(self.url("/api/chat")).json(request).send()?;
        let body = read_success_body(response)?;
        serde_json::from_str(&body).map_err(ApiError::Decode)
    }

    /// True when `GET /health` answers with a success status.
    pub fn health_check(&self) -> bool {
        match self
            .http
            .get(self.url("/health"))
            .timeout(HEALTH_TIMEOUT)
            .send()
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!("Health check against {} failed: {e}", self.base_url);
                false
            }
        }
    }

    pub fn submit_annotation_create(&self, annotation: &Annotation) -> Result<(), ApiError> {
        let response = self
            .http
            .post(self.url("/api/annotations"))
            .json(annotation)
            .send()?;
        read_success_body(response)?;
        debug!("Synced annotation {}", annotation.id);
        Ok(())
    }
}

fn read_success_body(response: reqwest::blocking::Response) -> Result<String, ApiError> {
    let status = response.status();
    let body = response.text()?;
    if !status.is_success() {
        warn!("Backend returned {status}");
        return Err(ApiError::Status {
            status: status.as_u16(),
            body,
        });
    }
    Ok(body)
}

/// Mirrors a saved annotation to the backend without blocking the UI. Errors
/// are logged only.
pub fn spawn_annotation_sync(client: ApiClient, annotation: Annotation) {
    std::thread::spawn(move || {
        if let Err(e) = client.submit_annotation_create(&annotation) {
            error!("Failed to sync annotation {}: {e}", annotation.id);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotations::{AnnotationBody, AnnotationId};
    use crate::selection::ScreenPosition;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::sync::mpsc;

    struct Captured {
        request_line: String,
        body: String,
    }

    /// Serves a single request with the given status and body, reporting
    /// what the client sent.
    fn one_shot_server(status: &str, body: &str) -> (String, mpsc::Receiver<Captured>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let status = status.to_string();
        let body = body.to_string();
        let (tx, rx) = mpsc::channel();

        std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());

            let mut request_line = String::new();
            reader.read_line(&mut request_line).unwrap();

            let mut content_length = 0;
            loop {
                let mut header = String::new();
                reader.read_line(&mut header).unwrap();
                let header = header.trim_end();
                if header.is_empty() {
                    break;
                }
                if let Some((name, value)) = header.split_once(':')
                    && name.eq_ignore_ascii_case("content-length")
                {
                    content_length = value.trim().parse().unwrap();
                }
            }
            let mut request_body = vec![0; content_length];
            reader.read_exact(&mut request_body).unwrap();

            let mut stream = stream;
            write!(
                stream,
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            )
            .unwrap();
            stream.flush().unwrap();

            tx.send(Captured {
                request_line: request_line.trim_end().to_string(),
                body: String::from_utf8(request_body).unwrap(),
            })
            .unwrap();
        });

        (format!("http://{addr}"), rx)
    }

    fn explain_request() -> ExplainRequest<'static> {
        ExplainRequest {
            highlight_text: "monsoon winds",
            mode: "simple",
            class_level: 7,
            subject: "Geography",
            chapter: 4,
        }
    }

    #[test]
    fn explain_posts_chat_contract() {
        let (url, captured) =
            one_shot_server("200 OK", r#"{"answer":"Seasonal winds.","source_chunks":[{"page":3}]}"#);
        let client = ApiClient::new(&url).unwrap();

        let response = client.explain(&explain_request()).unwrap();
        assert_eq!(response.answer, "Seasonal winds.");
        assert_eq!(response.source_chunks.len(), 1);

        let captured = captured.recv().unwrap();
        assert_eq!(captured.request_line, "POST /api/chat HTTP/1.1");
        let sent: serde_json::Value = serde_json::from_str(&captured.body).unwrap();
        assert_eq!(sent["highlight_text"], "monsoon winds");
        assert_eq!(sent["mode"], "simple");
        assert_eq!(sent["class_level"], 7);
        assert_eq!(sent["subject"], "Geography");
        assert_eq!(sent["chapter"], 4);
    }

    #[test]
    fn missing_source_chunks_default_to_empty() {
        let (url, _captured) = one_shot_server("200 OK", r#"{"answer":"ok"}"#);
        let client = ApiClient::new(&url).unwrap();
        let response = client.explain(&explain_request()).unwrap();
        assert!(response.source_chunks.is_empty());
    }

    #[test]
    fn error_status_is_reported_with_body() {
        let (url, _captured) =
            one_shot_server("500 Internal Server Error", r#"{"detail":"model offline"}"#);
        let client = ApiClient::new(&url).unwrap();

        match client.explain(&explain_request()) {
            Err(ApiError::Status { status, body }) => {
                assert_eq!(status, 500);
                assert!(body.contains("model offline"));
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[test]
    fn malformed_body_is_a_decode_error() {
        let (url, _captured) = one_shot_server("200 OK", r#"{"reply":"wrong shape"}"#);
        let client = ApiClient::new(&url).unwrap();
        assert!(matches!(
            client.explain(&explain_request()),
            Err(ApiError::Decode(_))
        ));
    }

    #[test]
    fn health_check_reports_backend_state() {
        let (url, captured) = one_shot_server("200 OK", r#"{"status":"ok"}"#);
        let client = ApiClient::new(&url).unwrap();
        assert!(client.health_check());
        assert_eq!(captured.recv().unwrap().request_line, "GET /health HTTP/1.1");

        // Nothing listens on a freshly closed port
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let client = ApiClient::new(&format!("http://{addr}")).unwrap();
        assert!(!client.health_check());
    }

    #[test]
    fn annotation_create_posts_json() {
        let (url, captured) = one_shot_server("201 Created", "{}");
        let client = ApiClient::new(&format!("{url}/")).unwrap();

        let annotation = Annotation {
            id: AnnotationId(3),
            lesson_id: 2,
            page_number: 5,
            source_text: "delta".to_string(),
            position: ScreenPosition::new(1, 1),
            range: None,
            created_at: chrono::Utc::now(),
            body: AnnotationBody::Note {
                heading: "Rivers".to_string(),
                content: String::new(),
            },
        };
        client.submit_annotation_create(&annotation).unwrap();

        let captured = captured.recv().unwrap();
        assert_eq!(captured.request_line, "POST /api/annotations HTTP/1.1");
        let sent: serde_json::Value = serde_json::from_str(&captured.body).unwrap();
        assert_eq!(sent["kind"], "note");
        assert_eq!(sent["heading"], "Rivers");
        assert_eq!(sent["lesson_id"], 2);
    }
}
