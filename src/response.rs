//! Response write path: the [`ResponseSink`] capability, the buffered
//! [`ResponseWriter`] backing it, and the [`StatusSink`] decorator.
//!
//! Handlers do not return a response value — they write into a sink, the way
//! a streaming transport would be driven. That shape is what makes the rest
//! of the pipeline possible: a handler can commit a status and then panic,
//! and the recovery guard and access logger still see exactly what the
//! client saw.
//!
//! The write contract is *first write wins*: the first `write_head` (or an
//! implicit 200 on the first body write) commits the status, and later
//! status or header writes are ignored, matching a transport that has
//! already put the head on the wire.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue};
use http::StatusCode;
use http_body_util::Full;
use tracing::warn;

/// The write side of one in-flight response.
///
/// Shared per request as a [`Sink`]; every method takes `&self` so the same
/// handle can be held by the recovery guard, the logger, and the handler at
/// once.
pub trait ResponseSink: Send + Sync {
    /// Commits the response status. Only the first call has any effect.
    fn write_head(&self, status: StatusCode);

    /// Adds a response header. Ignored once the status is committed.
    fn insert_header(&self, name: &str, value: &str);

    /// Appends body bytes. Commits an implicit 200 if no status was written.
    fn write(&self, chunk: &[u8]);
}

/// A shared handle to one request's response sink.
pub type Sink = Arc<dyn ResponseSink>;

// ── ResponseWriter ────────────────────────────────────────────────────────────

/// The real response sink: buffers status, headers, and body until the
/// server hands them to the transport.
///
/// Deliberately does *not* expose the committed status — stages that need it
/// wrap the sink in a [`StatusSink`] instead of introspecting the transport.
pub struct ResponseWriter {
    state: Mutex<ResponseState>,
}

#[derive(Default)]
struct ResponseState {
    status: Option<StatusCode>,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl ResponseWriter {
    pub fn new() -> Self {
        Self { state: Mutex::new(ResponseState::default()) }
    }

    // A panicking handler can never poison this mutex mid-write (no sink
    // method panics while holding it), so a poisoned lock still carries a
    // consistent state worth returning to the client.
    fn lock(&self) -> MutexGuard<'_, ResponseState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Drains the buffered response into the transport representation.
    /// Responses that never committed a status go out as 200, like a
    /// handler that returned without writing.
    pub fn finish(&self) -> http::Response<Full<Bytes>> {
        let mut state = self.lock();
        let status = state.status.unwrap_or(StatusCode::OK);
        let headers = std::mem::take(&mut state.headers);
        let body = std::mem::take(&mut state.body);

        let mut response = http::Response::new(Full::new(Bytes::from(body)));
        *response.status_mut() = status;
        for (name, value) in headers {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(&value),
            ) {
                (Ok(name), Ok(value)) => {
                    response.headers_mut().append(name, value);
                }
                _ => warn!(header = %name, "dropping invalid response header"),
            }
        }
        response
    }
}

impl Default for ResponseWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseSink for ResponseWriter {
    fn write_head(&self, status: StatusCode) {
        let mut state = self.lock();
        if state.status.is_none() {
            state.status = Some(status);
        }
    }

    fn insert_header(&self, name: &str, value: &str) {
        let mut state = self.lock();
        if state.status.is_none() {
            state.headers.push((name.to_owned(), value.to_owned()));
        }
    }

    fn write(&self, chunk: &[u8]) {
        let mut state = self.lock();
        if state.status.is_none() {
            state.status = Some(StatusCode::OK);
        }
        state.body.extend_from_slice(chunk);
    }
}

// ── StatusSink ────────────────────────────────────────────────────────────────

/// Transparent decorator that remembers the first status written through it.
///
/// The underlying sink keeps the committed status to itself, so every stage
/// that needs it after the fact — the access logger for its record, the
/// recovery guard to decide whether a 500 is still safe to write — wraps the
/// sink it hands downstream in one of these. Constructed once per request,
/// per interested stage; stacking them is harmless.
pub struct StatusSink {
    inner: Sink,
    status: Mutex<Option<StatusCode>>,
}

impl StatusSink {
    pub fn new(inner: Sink) -> Self {
        Self { inner, status: Mutex::new(None) }
    }

    fn record(&self, status: StatusCode) {
        let mut seen = self.status.lock().unwrap_or_else(PoisonError::into_inner);
        if seen.is_none() {
            *seen = Some(status);
        }
    }

    /// The captured status; 200 if the handler never wrote one.
    pub fn status(&self) -> StatusCode {
        self.status
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .unwrap_or(StatusCode::OK)
    }

    /// Whether any write has committed a status downstream of this sink.
    pub fn written(&self) -> bool {
        self.status
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl ResponseSink for StatusSink {
    fn write_head(&self, status: StatusCode) {
        self.record(status);
        self.inner.write_head(status);
    }

    fn insert_header(&self, name: &str, value: &str) {
        self.inner.insert_header(name, value);
    }

    fn write(&self, chunk: &[u8]) {
        // A body write commits an implicit 200 at the transport.
        self.record(StatusCode::OK);
        self.inner.write(chunk);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uncommitted_response_defaults_to_200() {
        let writer = ResponseWriter::new();
        assert_eq!(writer.finish().status(), StatusCode::OK);
    }

    #[test]
    fn first_status_write_wins() {
        let writer = ResponseWriter::new();
        writer.write_head(StatusCode::CREATED);
        writer.write_head(StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(writer.finish().status(), StatusCode::CREATED);
    }

    #[test]
    fn headers_after_commit_are_ignored() {
        let writer = ResponseWriter::new();
        writer.insert_header("x-early", "yes");
        writer.write_head(StatusCode::OK);
        writer.insert_header("x-late", "no");
        let response = writer.finish();
        assert!(response.headers().contains_key("x-early"));
        assert!(!response.headers().contains_key("x-late"));
    }

    #[test]
    fn body_write_commits_implicit_200() {
        let writer = ResponseWriter::new();
        writer.write(b"hello");
        writer.write_head(StatusCode::NOT_FOUND);
        assert_eq!(writer.finish().status(), StatusCode::OK);
    }

    #[test]
    fn status_sink_captures_first_status() {
        let writer: Sink = Arc::new(ResponseWriter::new());
        let sink = StatusSink::new(writer);
        assert!(!sink.written());
        assert_eq!(sink.status(), StatusCode::OK);

        sink.write_head(StatusCode::CREATED);
        sink.write_head(StatusCode::INTERNAL_SERVER_ERROR);
        assert!(sink.written());
        assert_eq!(sink.status(), StatusCode::CREATED);
    }

    #[test]
    fn status_sink_records_implicit_200_on_body_write() {
        let writer: Sink = Arc::new(ResponseWriter::new());
        let sink = StatusSink::new(writer);
        sink.write(b"body");
        assert!(sink.written());
        assert_eq!(sink.status(), StatusCode::OK);
    }
}
