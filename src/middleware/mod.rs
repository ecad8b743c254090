//! Middleware layer.
//!
//! Middleware intercepts requests and responses and is the home of
//! cross-cutting concerns: client-OS detection, access logging, panic
//! recovery, and authentication gating.
//!
//! A middleware is anything that can wrap a handler in another handler:
//!
//! ```text
//! wrap(next: BoxedHandler) -> BoxedHandler
//! ```
//!
//! [`with`] folds an ordered sequence of middleware around a terminal
//! handler, left to right: index 0 becomes the innermost wrapper and the
//! last index the outermost. At request time execution runs outermost-first,
//! so the *last* listed middleware observes the request first and the
//! response last.
//!
//! That ordering is load-bearing. The canonical stack is
//! `[BasicAuth (sub-tree only), Recovery, AccessLog, UserAgentRecord]`:
//! the recorder runs before the logger so the OS label exists when the log
//! record is built, and recovery sits inside the logger so a panicking
//! terminal handler is still logged with its resulting 500. A panic inside
//! the logger or recorder itself is deliberately outside the guard — the
//! transport's own fallback owns that.

mod auth;
mod log;
mod record;
mod recovery;

pub use auth::BasicAuth;
pub use log::AccessLog;
pub use record::{ClientOs, UserAgentRecord};
pub use recovery::Recovery;

use crate::handler::BoxedHandler;

/// A composable request-handling wrapper.
///
/// Implementations act before and/or after delegating to `next` — or skip
/// the delegation entirely to short-circuit (the auth gate's 401). `wrap` is
/// called once, at composition time; whatever per-request state a middleware
/// needs lives in the propagation context or a per-request sink, never on
/// the middleware itself, which is why one composed chain is safe to share
/// across all in-flight requests.
pub trait Middleware: Send + Sync {
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler;
}

/// Composes `layers` around `handler`, innermost-first.
///
/// ```rust
/// use todod::middleware::{self, AccessLog, Recovery, UserAgentRecord};
/// use todod::{Request, Sink};
///
/// async fn terminal(_req: Request, _res: Sink) {}
///
/// let chain = middleware::with(
///     terminal,
///     &[&Recovery, &AccessLog::new(), &UserAgentRecord],
/// );
/// # let _ = chain;
/// ```
pub fn with(handler: impl crate::Handler, layers: &[&dyn Middleware]) -> BoxedHandler {
    layers
        .iter()
        .fold(handler.into_boxed_handler(), |next, layer| layer.wrap(next))
}
