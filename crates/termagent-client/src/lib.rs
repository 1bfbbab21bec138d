use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use serde_json::{Value, json};
use std::error::Error as StdError;
use std::io::Read;
use std::time::Duration;
use termagent_core::{MessageRequest, ServerStatus, StreamCallback, StreamEvent};
use termagent_observe::Observer;
use thiserror::Error;
use uuid::Uuid;

mod decoder;

pub use decoder::{DecodedLine, StreamDecoder, decode_body, decode_line};

const READ_CHUNK_BYTES: usize = 4096;

#[derive(Debug, Error)]
pub enum ClientError {
    /// The server answered with a non-2xx status.
    #[error("HTTP error! status: {status}{}", detail_suffix(.detail))]
    Http { status: u16, detail: String },
    /// The request never produced a response (connect, DNS, timeout).
    #[error("{0}")]
    Transport(String),
    /// The response body failed part-way through.
    #[error("stream read error: {0}")]
    Read(String),
    /// A non-stream body could not be decoded.
    #[error("unexpected response body: {0}")]
    Decode(String),
}

fn detail_suffix(detail: &str) -> String {
    if detail.is_empty() {
        String::new()
    } else {
        format!(" ({detail})")
    }
}

/// What one `/api/stream` call produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamSummary {
    pub request_id: String,
    pub events: usize,
    pub skipped_lines: usize,
    pub saw_end: bool,
}

pub trait AgentClient: Send + Sync {
    /// `GET /api/status`. Any successful, decodable response means "online".
    fn status(&self) -> Result<ServerStatus, ClientError>;

    /// `POST /api/stream`. Invokes `cb` for each decoded event as it arrives
    /// and returns once the body is exhausted.
    fn stream(&self, message: &str, cb: StreamCallback) -> Result<StreamSummary, ClientError>;

    /// `POST /api/clear`. Drops the server-side conversation history.
    fn clear(&self) -> Result<(), ClientError>;

    /// `POST /api/chat`. Non-streaming variant returning the whole reply.
    fn chat(&self, message: &str) -> Result<String, ClientError>;

    /// `GET /api/health`.
    fn health(&self) -> Result<bool, ClientError>;
}

#[derive(Debug, Clone)]
pub struct HttpAgentClient {
    base_url: String,
    client: Client,
    observer: Option<Observer>,
}

impl HttpAgentClient {
    pub fn new(base_url: &str, timeout_seconds: u64) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds.max(1)))
            .build()
            .map_err(|e| format_transport_error(&e))?;
        Ok(Self {
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            client,
            observer: None,
        })
    }

    pub fn with_observer(mut self, observer: Observer) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/{path}", self.base_url)
    }

    fn warn(&self, msg: &str) {
        if let Some(observer) = &self.observer {
            observer.warn_log(msg);
        }
    }

    fn verbose(&self, msg: &str) {
        if let Some(observer) = &self.observer {
            observer.verbose_log(msg);
        }
    }

    fn record(&self, kind: &str, payload: Value) {
        if let Some(observer) = &self.observer {
            let _ = observer.record(kind, payload);
        }
    }

    fn drain_stream(
        &self,
        mut resp: Response,
        request_id: &str,
        cb: &StreamCallback,
    ) -> Result<StreamSummary, ClientError> {
        let mut summary = StreamSummary {
            request_id: request_id.to_string(),
            ..StreamSummary::default()
        };
        let mut decoder = StreamDecoder::new();
        let mut buf = vec![0_u8; READ_CHUNK_BYTES];
        loop {
            let read = match resp.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) => {
                    self.warn(&format!("stream {request_id}: read failed: {e}"));
                    return Err(ClientError::Read(e.to_string()));
                }
            };
            for line in decoder.feed(&buf[..read]) {
                self.dispatch(line, request_id, &mut summary, cb);
            }
        }
        for line in decoder.finish() {
            self.dispatch(line, request_id, &mut summary, cb);
        }
        Ok(summary)
    }

    fn dispatch(
        &self,
        line: DecodedLine,
        request_id: &str,
        summary: &mut StreamSummary,
        cb: &StreamCallback,
    ) {
        match line {
            DecodedLine::Event(event) => {
                summary.events += 1;
                if event == StreamEvent::End {
                    summary.saw_end = true;
                }
                cb(event);
            }
            DecodedLine::Malformed { payload, error } => {
                summary.skipped_lines += 1;
                let preview: String = payload.chars().take(120).collect();
                self.verbose(&format!(
                    "stream {request_id}: skipping unparseable line ({error}): {preview}"
                ));
            }
        }
    }
}

impl AgentClient for HttpAgentClient {
    fn status(&self) -> Result<ServerStatus, ClientError> {
        let resp = self
            .client
            .get(self.endpoint("status"))
            .send()
            .map_err(|e| format_transport_error(&e))?;
        let resp = ensure_success(resp)?;
        let body: Value = resp
            .json()
            .map_err(|e| ClientError::Decode(e.to_string()))?;
        Ok(status_from_body(&body))
    }

    fn stream(&self, message: &str, cb: StreamCallback) -> Result<StreamSummary, ClientError> {
        let request_id = Uuid::now_v7().to_string();
        self.record(
            "stream.started",
            json!({ "request_id": request_id, "chars": message.chars().count() }),
        );
        let resp = self
            .client
            .post(self.endpoint("stream"))
            .json(&MessageRequest {
                message: message.to_string(),
            })
            .send()
            .map_err(|e| format_transport_error(&e))?;
        let resp = ensure_success(resp)?;
        let summary = self.drain_stream(resp, &request_id, &cb)?;
        self.record(
            "stream.finished",
            json!({
                "request_id": request_id,
                "events": summary.events,
                "skipped_lines": summary.skipped_lines,
                "saw_end": summary.saw_end,
            }),
        );
        Ok(summary)
    }

    fn clear(&self) -> Result<(), ClientError> {
        let resp = self
            .client
            .post(self.endpoint("clear"))
            .json(&json!({}))
            .send()
            .map_err(|e| format_transport_error(&e))?;
        ensure_success(resp)?;
        self.record("history.cleared", json!({}));
        Ok(())
    }

    fn chat(&self, message: &str) -> Result<String, ClientError> {
        let resp = self
            .client
            .post(self.endpoint("chat"))
            .json(&MessageRequest {
                message: message.to_string(),
            })
            .send()
            .map_err(|e| format_transport_error(&e))?;
        let resp = ensure_success(resp)?;
        let body: Value = resp
            .json()
            .map_err(|e| ClientError::Decode(e.to_string()))?;
        body.get("response")
            .and_then(|v| v.as_str())
            .map(ToString::to_string)
            .ok_or_else(|| ClientError::Decode("missing `response` field".to_string()))
    }

    fn health(&self) -> Result<bool, ClientError> {
        let resp = self
            .client
            .get(self.endpoint("health"))
            .send()
            .map_err(|e| format_transport_error(&e))?;
        let resp = ensure_success(resp)?;
        let body: Value = resp
            .json()
            .map_err(|e| ClientError::Decode(e.to_string()))?;
        Ok(body.get("status").and_then(|v| v.as_str()) == Some("healthy"))
    }
}

/// Any JSON body counts as online; fields that are not strings are ignored.
fn status_from_body(body: &Value) -> ServerStatus {
    let field = |name: &str| {
        body.get(name)
            .and_then(Value::as_str)
            .map(ToString::to_string)
    };
    ServerStatus {
        status: field("status"),
        model: field("model"),
        message: field("message"),
    }
}

fn ensure_success(resp: Response) -> Result<Response, ClientError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().unwrap_or_default();
    Err(format_http_error(status, &body))
}

/// Build an error from a non-2xx response, preferring the server's
/// `{"error": ...}` message over the raw body.
fn format_http_error(status: StatusCode, body: &str) -> ClientError {
    let detail = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message").or(Some(e)))
                .and_then(|m| m.as_str().map(ToString::to_string))
        })
        .unwrap_or_else(|| body.trim().chars().take(200).collect());
    ClientError::Http {
        status: status.as_u16(),
        detail,
    }
}

/// Produce a user-friendly error from a transport/network failure.
fn format_transport_error(err: &reqwest::Error) -> ClientError {
    let inner_msg = err
        .source()
        .map(|e| e.to_string())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let is_dns = inner_msg.contains("dns")
        || inner_msg.contains("resolve")
        || inner_msg.contains("name or service not known")
        || inner_msg.contains("no such host")
        || inner_msg.contains("getaddrinfo");

    let msg = if err.is_timeout() {
        "Request timed out. The agent server did not respond in time; \
         raise server.timeout_seconds if replies are slow."
            .to_string()
    } else if is_dns {
        "DNS resolution failed. Could not resolve the agent server hostname; \
         check server.base_url or TERMAGENT_URL."
            .to_string()
    } else if err.is_connect() {
        "Connection refused. Could not reach the agent server; \
         is it running at the configured server.base_url?"
            .to_string()
    } else {
        format!("Network error: {err}")
    };
    ClientError::Transport(msg)
}
