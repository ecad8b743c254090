//! Incoming HTTP request type.

use bytes::Bytes;
use http::Method;

use crate::context::Context;

/// An incoming HTTP request plus its propagation [`Context`].
pub struct Request {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
    context: Context,
}

impl Request {
    /// Builds a request by hand — the handler-test equivalent of a real
    /// inbound request. Pair with [`ResponseWriter`](crate::ResponseWriter)
    /// to exercise a handler without a socket.
    pub fn new(method: Method, path: &str) -> Self {
        Self {
            method,
            path: path.to_owned(),
            query: Vec::new(),
            headers: Vec::new(),
            body: Vec::new(),
            context: Context::new(),
        }
    }

    /// Adds a header. Returns `self` so calls chain.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_owned(), value.to_owned()));
        self
    }

    /// Adds a query parameter.
    pub fn with_query(mut self, name: &str, value: &str) -> Self {
        self.query.push((name.to_owned(), value.to_owned()));
        self
    }

    /// Replaces the body.
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Attaches a typed value to the propagation context, consuming the
    /// request and returning a new view. Metadata attached upstream is
    /// carried along untouched.
    pub fn with_value<T: Send + Sync + 'static>(mut self, value: T) -> Self {
        self.context = self.context.with(value);
        self
    }

    pub(crate) fn from_http(parts: http::request::Parts, body: Bytes) -> Self {
        let query = parts.uri.query().map(parse_query).unwrap_or_default();
        let headers = parts
            .headers
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_owned(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        Self {
            method: parts.method,
            path: parts.uri.path().to_owned(),
            query,
            headers,
            body: body.to_vec(),
            context: Context::new(),
        }
    }

    /// Replaces the path. Used by the router when dispatching under a
    /// mounted prefix, so inner handlers stay prefix-agnostic.
    pub(crate) fn with_path(mut self, path: String) -> Self {
        self.path = path;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns the first query parameter named `name`.
    pub fn query(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Reads the most recently attached context value of type `T`.
    pub fn value<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.context.get()
    }
}

fn parse_query(raw: &str) -> Vec<(String, String)> {
    raw.split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => (k.to_owned(), v.to_owned()),
            None => (pair.to_owned(), String::new()),
        })
        .collect()
}
