//! Handler trait and type erasure.
//!
//! # How async handlers are stored
//!
//! The router and the middleware chain need to hold handlers of *different*
//! concrete types behind one interface, so handlers are erased to trait
//! objects. The chain from user code to vtable call is:
//!
//! ```text
//! async fn healthz(req: Request, res: Sink) { … }   ← user writes this
//!        ↓ router.handle("/healthz", healthz)
//! healthz.into_boxed_handler()                      ← Handler blanket impl
//!        ↓
//! Arc::new(FnHandler(healthz))                      ← heap-allocated wrapper
//!        ↓  stored as BoxedHandler = Arc<dyn ErasedHandler>
//! handler.call(req, sink)  at request time          ← one vtable dispatch
//! ```
//!
//! A handler writes its response into the [`Sink`] rather than returning a
//! value; that is what lets middleware observe partial responses (a status
//! committed before a panic, say). The per-request cost is one `Arc` clone
//! plus one virtual call — negligible next to network I/O.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::request::Request;
use crate::response::Sink;

// ── Internal types ────────────────────────────────────────────────────────────

/// A heap-allocated, type-erased future.
///
/// `Pin<Box<…>>` because the runtime polls the future in place; `Send +
/// 'static` so tokio may move it across worker threads.
pub(crate) type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Internal dispatch interface.
///
/// `#[doc(hidden)] pub` rather than `pub(crate)` because it appears in the
/// return type of the public `Handler` trait's `into_boxed_handler` method.
#[doc(hidden)]
pub trait ErasedHandler {
    fn call(&self, req: Request, res: Sink) -> BoxFuture;
}

/// A heap-allocated, type-erased handler shared across concurrent requests.
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

// ── Public Handler trait ──────────────────────────────────────────────────────

/// Implemented for every valid handler.
///
/// You never implement this yourself. It is automatically satisfied for any
/// `async fn` (or capturing closure) with the signature:
///
/// ```text
/// async fn name(req: Request, res: Sink)
/// ```
///
/// and for [`BoxedHandler`] itself, so a wrapped chain slots in anywhere a
/// plain handler does. The trait is **sealed**: only the impls below can
/// satisfy it.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

/// The sealing module. Because `Sealed` is private, external crates cannot
/// name it and therefore cannot implement `Handler` on their own types.
mod private {
    pub trait Sealed {}
}

// ── Blanket implementations ───────────────────────────────────────────────────

impl<F, Fut> private::Sealed for F
where
    F: Fn(Request, Sink) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
}

impl<F, Fut> Handler for F
where
    F: Fn(Request, Sink) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

/// An already-erased handler is trivially a handler. This is what lets a
/// middleware-wrapped chain be mounted on the router like any `async fn`.
impl private::Sealed for BoxedHandler {}

impl Handler for BoxedHandler {
    fn into_boxed_handler(self) -> BoxedHandler {
        self
    }
}

// ── Concrete wrapper ──────────────────────────────────────────────────────────

/// Newtype that holds a concrete handler `F` and implements
/// [`ErasedHandler`], bridging the typed world to the trait-object world.
struct FnHandler<F>(F);

impl<F, Fut> ErasedHandler for FnHandler<F>
where
    F: Fn(Request, Sink) -> Fut + Send + Sync,
    Fut: Future<Output = ()> + Send + 'static,
{
    fn call(&self, req: Request, res: Sink) -> BoxFuture {
        Box::pin((self.0)(req, res))
    }
}
