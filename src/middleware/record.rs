//! User-agent recorder.

use std::sync::Arc;

use super::Middleware;
use crate::handler::{BoxedHandler, ErasedHandler as _, Handler};
use crate::request::Request;
use crate::response::Sink;

/// The client operating system detected from the `User-Agent` header,
/// attached to the propagation context before the rest of the chain runs.
///
/// The constructor is private: [`UserAgentRecord`] is the only writer of
/// this key, everything downstream only reads it.
pub struct ClientOs(String);

impl ClientOs {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Attaches a [`ClientOs`] label to every request.
///
/// Detection is best-effort: an absent or unrecognized `User-Agent` yields
/// an empty label, never an error.
pub struct UserAgentRecord;

impl Middleware for UserAgentRecord {
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler {
        Handler::into_boxed_handler(move |req: Request, res: Sink| {
            let next = Arc::clone(&next);
            async move {
                let os = detect_os(req.header("user-agent").unwrap_or(""));
                let req = req.with_value(ClientOs(os.to_owned()));
                next.call(req, res).await;
            }
        })
    }
}

/// Maps a user-agent string to an OS label.
///
/// Ordering matters: iOS agents also claim `Mac OS X`, Android agents also
/// claim `Linux`, so the more specific token is checked first.
fn detect_os(user_agent: &str) -> &'static str {
    if user_agent.contains("iPhone") || user_agent.contains("iPad") {
        "iOS"
    } else if user_agent.contains("Android") {
        "Android"
    } else if user_agent.contains("Windows") {
        "Windows"
    } else if user_agent.contains("Mac OS X") || user_agent.contains("Macintosh") {
        "macOS"
    } else if user_agent.contains("CrOS") {
        "ChromeOS"
    } else if user_agent.contains("Linux") || user_agent.contains("X11") {
        "Linux"
    } else {
        ""
    }
}
