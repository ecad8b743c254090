//! HTTP server and graceful shutdown.
//!
//! Lifecycle: `starting → serving → shutting-down → stopped`. Binding moves
//! the server to `serving`; the shared shutdown [`Signal`](crate::shutdown::Signal)
//! moves it to `shutting-down`, at which point the listener is dropped —
//! new connections are refused immediately — while every in-flight
//! connection task runs on. `stopped` is reached when the last task drains
//! or the grace period runs out, whichever comes first.
//!
//! When several servers share one signal, each owns its own listener and
//! drain; the process-level `JoinSet` in `main` is the barrier that keeps
//! the process alive until all of them have stopped.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::error::Error;
use crate::handler::{BoxedHandler, ErasedHandler as _};
use crate::request::Request;
use crate::response::{ResponseWriter, Sink};
use crate::shutdown::Signal;

/// How long in-flight connections get to finish after the shutdown signal.
/// Overrunning the period is reported, never escalated to an abort.
const GRACE_PERIOD: Duration = Duration::from_secs(5);

/// The HTTP server.
pub struct Server {
    listener: TcpListener,
    addr: SocketAddr,
}

impl Server {
    /// Binds the listener. A bind failure is fatal to startup — there is no
    /// point constructing the rest of the service around a dead socket.
    pub async fn bind(addr: SocketAddr) -> Result<Self, Error> {
        let listener = TcpListener::bind(addr).await?;
        // Asking for port 0 means the real port is only known now.
        let addr = listener.local_addr()?;
        Ok(Self { listener, addr })
    }

    /// The bound address.
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Accepts connections and dispatches them through `handler` until
    /// `shutdown` is raised, then drains.
    ///
    /// Returns only after the drain completes or the grace period elapses.
    pub async fn serve(self, handler: BoxedHandler, mut shutdown: Signal) -> Result<(), Error> {
        info!(addr = %self.addr, "listening");

        // JoinSet tracks every spawned connection task so the drain below
        // can wait for them.
        let mut tasks = tokio::task::JoinSet::new();

        loop {
            tokio::select! {
                // `biased` makes select! check arms top-to-bottom. Shutdown
                // is first so a raised signal stops accepting even when more
                // connections are already queued on the socket.
                biased;

                () = shutdown.raised() => {
                    info!(in_flight = tasks.len(), "shutdown signal received, draining");
                    break;
                }

                res = self.listener.accept() => {
                    let (stream, remote_addr) = match res {
                        Ok(conn) => conn,
                        Err(err) => {
                            error!(%err, "accept error");
                            continue;
                        }
                    };

                    let handler = Arc::clone(&handler);
                    // TokioIo adapts tokio's AsyncRead/AsyncWrite to the
                    // hyper IO traits.
                    let io = TokioIo::new(stream);

                    tasks.spawn(async move {
                        // `service_fn` is called once per request on the
                        // connection, not once per connection.
                        let svc = service_fn(move |req| {
                            let handler = Arc::clone(&handler);
                            async move { dispatch(handler, req).await }
                        });

                        // `auto::Builder` speaks both HTTP/1.1 and HTTP/2 —
                        // whatever the client negotiates.
                        if let Err(err) = ConnBuilder::new(TokioExecutor::new())
                            .serve_connection(io, svc)
                            .await
                        {
                            error!(peer = %remote_addr, %err, "connection error");
                        }
                    });
                }

                // Reap finished connection tasks so the JoinSet does not
                // grow without bound on long-running servers.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        // Refuse new connections from this instant on.
        drop(self.listener);

        // Drain, bounded by the grace period. In-flight handlers are never
        // cancelled; tasks still running at the deadline are detached and
        // finish (or die) with the process.
        let drained = tokio::time::timeout(GRACE_PERIOD, async {
            while tasks.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            warn!(
                remaining = tasks.len(),
                grace_secs = GRACE_PERIOD.as_secs(),
                "grace period elapsed before all connections drained"
            );
            tasks.detach_all();
        }

        info!(addr = %self.addr, "stopped");
        Ok(())
    }
}

// ── Request dispatch ──────────────────────────────────────────────────────────

/// Core hot path: runs one request through the composed chain.
///
/// The error type is [`Infallible`] — every failure becomes an HTTP status
/// inside the chain, so hyper never sees an error from us.
async fn dispatch(
    handler: BoxedHandler,
    req: hyper::Request<Incoming>,
) -> Result<http::Response<Full<Bytes>>, Infallible> {
    let (parts, body) = req.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(err) => {
            error!(%err, "could not read request body");
            let mut response = http::Response::new(Full::new(Bytes::new()));
            *response.status_mut() = StatusCode::BAD_REQUEST;
            return Ok(response);
        }
    };

    let request = Request::from_http(parts, body);
    let writer = Arc::new(ResponseWriter::new());
    handler.call(request, Arc::clone(&writer) as Sink).await;
    Ok(writer.finish())
}
