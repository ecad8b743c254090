//! # todod
//!
//! A small TODO HTTP service. Nothing more. Nothing less.
//!
//! ## The contract
//!
//! The reverse proxy in front of this service owns TLS, rate limiting, and
//! body-size limits. todod owns what changes between applications: the
//! request-processing pipeline.
//!
//! - **Middleware composition** — [`middleware::with`] folds an ordered
//!   stack around a terminal handler; last listed runs outermost.
//! - **Propagation context** — typed, append-only per-request metadata
//!   ([`Context`]), written once, read anywhere downstream.
//! - **Basic auth** — a [`Credential`] validated at startup, enforced by a
//!   gate around the `/api` sub-tree only.
//! - **Access logging** — one JSON line per request on stdout:
//!   `Timestamp`, `Latency`, `Path`, `OS`, `Status`.
//! - **Panic recovery** — a panicking handler becomes a logged 500, never a
//!   dead connection, never an overwritten committed status.
//! - **Graceful shutdown** — SIGTERM / Ctrl-C stops accepting at once and
//!   drains in-flight requests under a 5 s grace period; one signal can
//!   drain any number of servers.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use todod::middleware::AccessLog;
//! use todod::{router, shutdown, Credential, Server, TodoStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), todod::Error> {
//!     let store = Arc::new(TodoStore::in_memory());
//!     let credential = Some(Credential::new("admin", "secret")?);
//!     let app = router::app(store, credential, AccessLog::new());
//!
//!     let (trigger, signal) = shutdown::channel();
//!     tokio::spawn(async move {
//!         shutdown::terminated().await;
//!         trigger.trigger();
//!     });
//!
//!     Server::bind("127.0.0.1:8080".parse().unwrap())
//!         .await?
//!         .serve(app, signal)
//!         .await
//! }
//! ```

mod basicauth;
mod context;
mod error;
mod handler;
mod request;
mod response;
mod server;
mod todo;

pub mod health;
pub mod middleware;
pub mod router;
pub mod shutdown;

pub use basicauth::{AuthError, Credential, ValidationError};
pub use context::Context;
pub use error::Error;
#[doc(hidden)]
pub use handler::ErasedHandler;
pub use handler::{BoxedHandler, Handler};
pub use request::Request;
pub use response::{ResponseSink, ResponseWriter, Sink, StatusSink};
pub use router::Router;
pub use server::Server;
pub use todo::{StoreError, Todo, TodoStore};
