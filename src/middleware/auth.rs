//! Basic-auth gate.

use std::sync::Arc;

use http::StatusCode;
use tracing::debug;

use super::Middleware;
use crate::basicauth::Credential;
use crate::handler::{BoxedHandler, ErasedHandler as _, Handler};
use crate::request::Request;
use crate::response::Sink;

/// Rejects requests that do not carry the configured credential.
///
/// On failure the gate answers 401 with a `WWW-Authenticate` challenge and
/// never invokes the wrapped handler. Mount it around the authenticated
/// sub-tree only — a liveness probe must never be blocked by a credential
/// failure.
pub struct BasicAuth {
    cred: Arc<Credential>,
}

impl BasicAuth {
    pub fn new(cred: Credential) -> Self {
        Self { cred: Arc::new(cred) }
    }
}

impl Middleware for BasicAuth {
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler {
        let cred = Arc::clone(&self.cred);
        Handler::into_boxed_handler(move |req: Request, res: Sink| {
            let cred = Arc::clone(&cred);
            let next = Arc::clone(&next);
            async move {
                if let Err(err) = cred.authenticate(&req) {
                    debug!(path = req.path(), %err, "rejecting request");
                    res.insert_header("WWW-Authenticate", &cred.challenge());
                    res.write_head(StatusCode::UNAUTHORIZED);
                    return;
                }
                next.call(req, res).await;
            }
        })
    }
}
