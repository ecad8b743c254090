//! TODO resource: store and terminal handler.
//!
//! The pipeline treats this module as an opaque terminal handler — it
//! consumes a [`Request`], writes a response or an error status, and knows
//! nothing about middleware. The store keeps everything in memory and can
//! mirror itself to a JSON file so restarts keep data.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use http::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::error::Error;
use crate::handler::Handler;
use crate::request::Request;
use crate::response::Sink;

/// One TODO entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Todo {
    pub id: i64,
    pub subject: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("todo {0} not found")]
    NotFound(i64),
    #[error("could not persist store: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not encode store: {0}")]
    Encode(#[from] serde_json::Error),
}

// ── Store ─────────────────────────────────────────────────────────────────────

/// In-memory TODO store with optional JSON-file persistence.
///
/// The mutex guards short, non-async critical sections only; no lock is held
/// across an await point.
pub struct TodoStore {
    path: Option<PathBuf>,
    inner: Mutex<Vec<Todo>>,
}

impl TodoStore {
    /// A store that lives and dies with the process.
    pub fn in_memory() -> Self {
        Self { path: None, inner: Mutex::new(Vec::new()) }
    }

    /// A store mirrored to `path`. A missing file starts empty; an
    /// unreadable or unparsable file refuses to start.
    pub fn open(path: PathBuf) -> Result<Self, Error> {
        let todos = match std::fs::read(&path) {
            Ok(raw) => serde_json::from_slice(&raw)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(err) => return Err(err.into()),
        };
        Ok(Self { path: Some(path), inner: Mutex::new(todos) })
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Todo>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, todos: &[Todo]) -> Result<(), StoreError> {
        if let Some(path) = &self.path {
            let raw = serde_json::to_vec_pretty(todos)?;
            std::fs::write(path, raw)?;
        }
        Ok(())
    }

    pub fn create(&self, subject: &str, description: &str) -> Result<Todo, StoreError> {
        let mut todos = self.lock();
        let now = Utc::now();
        let todo = Todo {
            id: todos.last().map_or(1, |last| last.id + 1),
            subject: subject.to_owned(),
            description: description.to_owned(),
            created_at: now,
            updated_at: now,
        };
        todos.push(todo.clone());
        self.persist(&todos)?;
        Ok(todo)
    }

    /// Newest first. A `prev_id` of zero means "from the top"; a positive
    /// `prev_id` restricts to ids strictly below it — the pagination cursor.
    pub fn list(&self, prev_id: i64, size: i64) -> Vec<Todo> {
        let todos = self.lock();
        todos
            .iter()
            .rev()
            .filter(|todo| prev_id == 0 || todo.id < prev_id)
            .take(usize::try_from(size).unwrap_or(0))
            .cloned()
            .collect()
    }

    pub fn update(
        &self,
        id: i64,
        subject: &str,
        description: &str,
    ) -> Result<Todo, StoreError> {
        let mut todos = self.lock();
        let todo = todos
            .iter_mut()
            .find(|todo| todo.id == id)
            .ok_or(StoreError::NotFound(id))?;
        todo.subject = subject.to_owned();
        todo.description = description.to_owned();
        todo.updated_at = Utc::now();
        let updated = todo.clone();
        self.persist(&todos)?;
        Ok(updated)
    }

    /// Removes every listed id; fails without removing anything if any id is
    /// unknown.
    pub fn delete(&self, ids: &[i64]) -> Result<(), StoreError> {
        let mut todos = self.lock();
        for &id in ids {
            if !todos.iter().any(|todo| todo.id == id) {
                return Err(StoreError::NotFound(id));
            }
        }
        todos.retain(|todo| !ids.contains(&todo.id));
        self.persist(&todos)?;
        Ok(())
    }
}

// ── Wire types ────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct CreateTodoRequest {
    subject: String,
    #[serde(default)]
    description: String,
}

#[derive(Deserialize)]
struct UpdateTodoRequest {
    #[serde(default)]
    id: i64,
    subject: String,
    #[serde(default)]
    description: String,
}

#[derive(Deserialize)]
struct DeleteTodoRequest {
    ids: Vec<i64>,
}

#[derive(Serialize)]
struct TodoEnvelope {
    todo: Todo,
}

#[derive(Serialize)]
struct TodoListEnvelope {
    todos: Vec<Todo>,
}

#[derive(Serialize)]
struct Empty {}

// ── Handler ───────────────────────────────────────────────────────────────────

/// The terminal handler for the TODO resource.
pub fn handler(store: Arc<TodoStore>) -> impl Handler {
    move |req: Request, res: Sink| {
        let store = Arc::clone(&store);
        async move { serve(&store, req, res).await }
    }
}

async fn serve(store: &TodoStore, req: Request, res: Sink) {
    match req.method() {
        &Method::GET => {
            let prev_id = match parse_param(&req, "prev_id", 0) {
                Ok(n) => n,
                Err(()) => return res.write_head(StatusCode::BAD_REQUEST),
            };
            let size = match parse_param(&req, "size", 5) {
                Ok(n) => n,
                Err(()) => return res.write_head(StatusCode::BAD_REQUEST),
            };
            respond_json(&res, &TodoListEnvelope { todos: store.list(prev_id, size) });
        }
        &Method::POST => {
            let Ok(body) = serde_json::from_slice::<CreateTodoRequest>(req.body()) else {
                return res.write_head(StatusCode::BAD_REQUEST);
            };
            if body.subject.is_empty() {
                return res.write_head(StatusCode::BAD_REQUEST);
            }
            match store.create(&body.subject, &body.description) {
                Ok(todo) => respond_json(&res, &TodoEnvelope { todo }),
                Err(err) => respond_store_error(&res, err),
            }
        }
        &Method::PUT => {
            let Ok(body) = serde_json::from_slice::<UpdateTodoRequest>(req.body()) else {
                return res.write_head(StatusCode::BAD_REQUEST);
            };
            if body.id == 0 || body.subject.is_empty() {
                return res.write_head(StatusCode::BAD_REQUEST);
            }
            match store.update(body.id, &body.subject, &body.description) {
                Ok(todo) => respond_json(&res, &TodoEnvelope { todo }),
                Err(err) => respond_store_error(&res, err),
            }
        }
        &Method::DELETE => {
            let Ok(body) = serde_json::from_slice::<DeleteTodoRequest>(req.body()) else {
                return res.write_head(StatusCode::BAD_REQUEST);
            };
            if body.ids.is_empty() {
                return res.write_head(StatusCode::BAD_REQUEST);
            }
            match store.delete(&body.ids) {
                Ok(()) => respond_json(&res, &Empty {}),
                Err(err) => respond_store_error(&res, err),
            }
        }
        _ => res.write_head(StatusCode::METHOD_NOT_ALLOWED),
    }
}

fn parse_param(req: &Request, name: &str, default: i64) -> Result<i64, ()> {
    match req.query(name) {
        None | Some("") => Ok(default),
        Some(raw) => raw.parse().map_err(|_| ()),
    }
}

fn respond_json<T: Serialize>(res: &Sink, value: &T) {
    match serde_json::to_vec(value) {
        Ok(body) => {
            res.insert_header("content-type", "application/json");
            res.write(&body);
        }
        Err(err) => {
            error!(%err, "could not encode response");
            res.write_head(StatusCode::INTERNAL_SERVER_ERROR);
        }
    }
}

fn respond_store_error(res: &Sink, err: StoreError) {
    match err {
        StoreError::NotFound(_) => res.write_head(StatusCode::NOT_FOUND),
        StoreError::Io(err) => {
            error!(%err, "store write failed");
            res.write_head(StatusCode::INTERNAL_SERVER_ERROR);
        }
        StoreError::Encode(err) => {
            error!(%err, "store encode failed");
            res.write_head(StatusCode::INTERNAL_SERVER_ERROR);
        }
    }
}

#[cfg(test)]
mod tests {
    use http_body_util::BodyExt;

    use super::*;
    use crate::handler::ErasedHandler as _;
    use crate::response::ResponseWriter;

    fn store_with(subjects: &[&str]) -> TodoStore {
        let store = TodoStore::in_memory();
        for subject in subjects {
            store.create(subject, "").unwrap();
        }
        store
    }

    #[test]
    fn create_assigns_increasing_ids() {
        let store = store_with(&["first", "second"]);
        let third = store.create("third", "details").unwrap();
        assert_eq!(third.id, 3);
        assert_eq!(third.description, "details");
    }

    #[test]
    fn list_is_newest_first_with_cursor() {
        let store = store_with(&["a", "b", "c", "d"]);

        let top: Vec<i64> = store.list(0, 2).iter().map(|t| t.id).collect();
        assert_eq!(top, [4, 3]);

        let next: Vec<i64> = store.list(3, 5).iter().map(|t| t.id).collect();
        assert_eq!(next, [2, 1]);
    }

    #[test]
    fn update_unknown_id_is_not_found() {
        let store = store_with(&["only"]);
        assert!(matches!(
            store.update(9, "x", ""),
            Err(StoreError::NotFound(9))
        ));
        let updated = store.update(1, "renamed", "").unwrap();
        assert_eq!(updated.subject, "renamed");
    }

    #[test]
    fn delete_is_all_or_nothing() {
        let store = store_with(&["a", "b"]);
        assert!(matches!(
            store.delete(&[1, 9]),
            Err(StoreError::NotFound(9))
        ));
        assert_eq!(store.list(0, 10).len(), 2, "partial failure must not remove");

        store.delete(&[1, 2]).unwrap();
        assert!(store.list(0, 10).is_empty());
    }

    #[test]
    fn open_round_trips_through_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("todo.json");

        let store = TodoStore::open(path.clone()).unwrap();
        store.create("persisted", "on disk").unwrap();
        drop(store);

        let reopened = TodoStore::open(path).unwrap();
        let todos = reopened.list(0, 10);
        assert_eq!(todos.len(), 1);
        assert_eq!(todos[0].subject, "persisted");
    }

    async fn call(store: &Arc<TodoStore>, req: Request) -> (StatusCode, serde_json::Value) {
        let writer = Arc::new(ResponseWriter::new());
        let chain = handler(Arc::clone(store)).into_boxed_handler();
        chain.call(req, Arc::clone(&writer) as Sink).await;
        let response = writer.finish();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let value = if body.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn post_rejects_empty_subject() {
        let store = Arc::new(TodoStore::in_memory());
        let req = Request::new(Method::POST, "/todos").with_body(r#"{"subject":""}"#);
        let (status, _) = call(&store, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn post_then_get_round_trip() {
        let store = Arc::new(TodoStore::in_memory());

        let req = Request::new(Method::POST, "/todos")
            .with_body(r#"{"subject":"write tests","description":"soon"}"#);
        let (status, body) = call(&store, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["todo"]["subject"], "write tests");

        let (status, body) = call(&store, Request::new(Method::GET, "/todos")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["todos"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn get_rejects_unparseable_cursor() {
        let store = Arc::new(TodoStore::in_memory());
        let req = Request::new(Method::GET, "/todos").with_query("prev_id", "abc");
        let (status, _) = call(&store, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn put_unknown_id_is_404() {
        let store = Arc::new(TodoStore::in_memory());
        let req = Request::new(Method::PUT, "/todos")
            .with_body(r#"{"id":5,"subject":"nope"}"#);
        let (status, _) = call(&store, req).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unsupported_method_is_405() {
        let store = Arc::new(TodoStore::in_memory());
        let (status, _) = call(&store, Request::new(Method::PATCH, "/todos")).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    }
}
