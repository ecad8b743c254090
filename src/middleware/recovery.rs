//! Panic-recovery guard.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use http::StatusCode;
use tracing::error;

use super::Middleware;
use crate::handler::{BoxedHandler, ErasedHandler as _, Handler};
use crate::request::Request;
use crate::response::{ResponseSink, Sink, StatusSink};

/// Hard fault boundary around the inner chain.
///
/// A panic below this middleware is caught, logged, and answered with 500 —
/// unless the handler already committed a status before panicking, in which
/// case the committed status stands (the transport may have put it on the
/// wire). The panic never propagates past this point, and there is no
/// retry: one panic ends that one request.
///
/// Panics in middleware *outside* this guard are not its problem; compose it
/// inside the logger, directly around the handlers it is meant to contain.
pub struct Recovery;

impl Middleware for Recovery {
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler {
        Handler::into_boxed_handler(move |req: Request, res: Sink| {
            let next = Arc::clone(&next);
            async move {
                let status = Arc::new(StatusSink::new(res));
                let inner = next.call(req, Arc::clone(&status) as Sink);
                if let Err(panic) = AssertUnwindSafe(inner).catch_unwind().await {
                    error!(panic = panic_message(panic.as_ref()), "handler panicked");
                    if !status.written() {
                        status.write_head(StatusCode::INTERNAL_SERVER_ERROR);
                    }
                }
            }
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}
