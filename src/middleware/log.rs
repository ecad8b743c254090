//! Access logger.

use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error};

use super::Middleware;
use super::record::ClientOs;
use crate::handler::{BoxedHandler, ErasedHandler as _, Handler};
use crate::request::Request;
use crate::response::{Sink, StatusSink};

/// One access-log line. Built after the inner handler returns, serialized,
/// and dropped — never retained.
///
/// `OS` is always present; an undetected client OS is the empty string.
#[derive(Serialize)]
struct AccessLogRecord {
    #[serde(rename = "Timestamp")]
    timestamp: DateTime<Utc>,
    #[serde(rename = "Latency")]
    latency_ms: i64,
    #[serde(rename = "Path")]
    path: String,
    #[serde(rename = "OS")]
    os: String,
    #[serde(rename = "Status")]
    status: u16,
}

/// Emits one JSON access-log line per request.
///
/// The line goes to the configured sink — stdout by default — as a single
/// write under a lock: records from concurrent requests may interleave in
/// any order, but never mid-line. A failed write is logged and swallowed; a
/// logging failure must never fail the request it describes.
pub struct AccessLog {
    out: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl AccessLog {
    /// Logs to standard output.
    pub fn new() -> Self {
        Self::with_writer(std::io::stdout())
    }

    /// Logs to an arbitrary sink. This is also the test seam.
    pub fn with_writer(out: impl Write + Send + 'static) -> Self {
        Self { out: Arc::new(Mutex::new(Box::new(out))) }
    }

    fn emit(out: &Mutex<Box<dyn Write + Send>>, record: &AccessLogRecord) {
        let mut line = match serde_json::to_vec(record) {
            Ok(line) => line,
            Err(err) => {
                error!(%err, "could not serialize access log record");
                return;
            }
        };
        line.push(b'\n');
        let mut out = out.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(err) = out.write_all(&line) {
            error!(%err, "could not write access log");
        }
    }
}

impl Default for AccessLog {
    fn default() -> Self {
        Self::new()
    }
}

impl Middleware for AccessLog {
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler {
        let out = Arc::clone(&self.out);
        Handler::into_boxed_handler(move |req: Request, res: Sink| {
            let next = Arc::clone(&next);
            let out = Arc::clone(&out);
            async move {
                // The recorder runs outside this middleware, so the label is
                // already on the context. Its absence is not an error — the
                // record carries an empty string either way.
                let os = match req.value::<ClientOs>() {
                    Some(os) => os.as_str().to_owned(),
                    None => {
                        debug!("client os not recorded for this request");
                        String::new()
                    }
                };
                let path = req.path().to_owned();
                let timestamp = Utc::now();
                let start = Instant::now();

                let status = Arc::new(StatusSink::new(res));
                next.call(req, Arc::clone(&status) as Sink).await;

                let record = AccessLogRecord {
                    timestamp,
                    latency_ms: i64::try_from(start.elapsed().as_millis()).unwrap_or(i64::MAX),
                    path,
                    os,
                    status: status.status().as_u16(),
                };
                Self::emit(&out, &record);
            }
        })
    }
}
