//! Per-request propagation context.
//!
//! Middleware that derives something from a request (the client OS, say)
//! attaches it here so downstream stages can read it without re-deriving it.
//! The context is an ordered, append-only list keyed by Rust type: attaching
//! consumes the request and yields a new view, so a stage can never mutate
//! metadata attached upstream, and concurrent requests share nothing.
//!
//! The type is the key. Give each value its own newtype and keep the
//! constructor private to its module — then that module is provably the only
//! writer:
//!
//! ```rust
//! use todod::Context;
//!
//! struct TraceId(String);
//!
//! let ctx = Context::new().with(TraceId("abc".into()));
//! assert!(ctx.get::<TraceId>().is_some());
//! ```

use std::any::{Any, TypeId};

/// Typed, append-only request metadata.
#[derive(Default)]
pub struct Context {
    entries: Vec<(TypeId, Box<dyn Any + Send + Sync>)>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a new context carrying everything in `self` plus `value`.
    pub fn with<T: Any + Send + Sync>(mut self, value: T) -> Self {
        self.entries.push((TypeId::of::<T>(), Box::new(value)));
        self
    }

    /// Returns the most recently attached value of type `T`, if any.
    pub fn get<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.entries
            .iter()
            .rev()
            .find(|(id, _)| *id == TypeId::of::<T>())
            .and_then(|(_, value)| value.downcast_ref())
    }
}
