//! Path-prefix request router and application assembly.
//!
//! Routing here is deliberately simple: exact paths plus mounted sub-trees.
//! No parameters, no per-method trees — the TODO handler dispatches on the
//! method itself, and everything else is a fixed path. What the router *is*
//! responsible for is scope: the auth gate guards exactly the mounted
//! sub-tree, and the global middleware stack wraps the router as a whole.

use std::collections::HashMap;
use std::sync::Arc;

use http::StatusCode;
use tracing::debug;

use crate::basicauth::Credential;
use crate::handler::{BoxFuture, BoxedHandler, ErasedHandler, Handler};
use crate::health;
use crate::middleware::{self, AccessLog, BasicAuth, Middleware, Recovery, UserAgentRecord};
use crate::request::Request;
use crate::response::Sink;
use crate::todo::{self, TodoStore};

/// The application router.
///
/// Build it once at startup, erase it with [`Router::into_handler`], and
/// share it across every connection. Registration methods return `self` so
/// calls chain.
pub struct Router {
    exact: HashMap<String, BoxedHandler>,
    mounts: Vec<(String, BoxedHandler)>,
}

impl Router {
    pub fn new() -> Self {
        Self { exact: HashMap::new(), mounts: Vec::new() }
    }

    /// Registers `handler` for exactly `path`.
    pub fn handle(mut self, path: &str, handler: impl Handler) -> Self {
        self.exact.insert(path.to_owned(), handler.into_boxed_handler());
        self
    }

    /// Mounts `handler` under every path starting with `prefix`. The prefix
    /// is stripped before dispatch, so the mounted handler (often another
    /// router) stays prefix-agnostic.
    pub fn mount(mut self, prefix: &str, handler: impl Handler) -> Self {
        self.mounts
            .push((prefix.trim_end_matches('/').to_owned(), handler.into_boxed_handler()));
        self
    }

    pub fn into_handler(self) -> BoxedHandler {
        Arc::new(self)
    }

    fn lookup(&self, path: &str) -> Option<(BoxedHandler, Option<String>)> {
        if let Some(handler) = self.exact.get(path) {
            return Some((Arc::clone(handler), None));
        }
        for (prefix, handler) in &self.mounts {
            if let Some(rest) = strip_mount(path, prefix) {
                return Some((Arc::clone(handler), Some(rest)));
            }
        }
        None
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl ErasedHandler for Router {
    fn call(&self, req: Request, res: Sink) -> BoxFuture {
        match self.lookup(req.path()) {
            Some((handler, stripped)) => {
                let req = match stripped {
                    Some(path) => req.with_path(path),
                    None => req,
                };
                Box::pin(async move { handler.call(req, res).await })
            }
            None => {
                debug!(path = req.path(), "no route");
                Box::pin(async move { res.write_head(StatusCode::NOT_FOUND) })
            }
        }
    }
}

/// `/api` matches `/api` and `/api/…`, never `/apix`.
fn strip_mount(path: &str, prefix: &str) -> Option<String> {
    let rest = path.strip_prefix(prefix)?;
    if rest.is_empty() {
        Some("/".to_owned())
    } else if rest.starts_with('/') {
        Some(rest.to_owned())
    } else {
        None
    }
}

// ── Application assembly ──────────────────────────────────────────────────────

/// Prefix of the authenticated sub-tree.
const API_PREFIX: &str = "/api";

/// Builds the complete application chain.
///
/// Routes:
/// - `/healthz` — always open; probes must not depend on credentials.
/// - `/todos` — the legacy unauthenticated mount, kept for old clients.
/// - `/api/todos` — the same handler behind the basic-auth gate, mounted
///   only when a credential is configured.
///
/// The stack composes as
/// `[BasicAuth (sub-tree only), Recovery, AccessLog, UserAgentRecord]`:
/// recorder before logger, recovery inside the logger and outside the
/// handlers.
pub fn app(store: Arc<TodoStore>, credential: Option<Credential>, access_log: AccessLog) -> BoxedHandler {
    let mut router = Router::new()
        .handle("/healthz", health::healthz)
        .handle("/todos", todo::handler(Arc::clone(&store)));

    if let Some(cred) = credential {
        let api = Router::new()
            .handle("/todos", todo::handler(Arc::clone(&store)))
            .into_handler();
        router = router.mount(API_PREFIX, BasicAuth::new(cred).wrap(api));
    }

    middleware::with(
        router.into_handler(),
        &[&Recovery, &access_log, &UserAgentRecord],
    )
}
