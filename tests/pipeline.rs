//! End-to-end pipeline tests: the composed application chain driven
//! in-process, without a socket.

use std::io::Write;
use std::sync::{Arc, Mutex};

use http::{Method, StatusCode};
use http_body_util::BodyExt;

use todod::middleware::{self, AccessLog, Recovery, UserAgentRecord};
use todod::ErasedHandler as _;
use todod::{router, Credential, Request, ResponseWriter, Sink, TodoStore};

#[derive(Clone, Default)]
struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    fn records(&self) -> Vec<serde_json::Value> {
        let buf = self.0.lock().unwrap();
        std::str::from_utf8(&buf)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

async fn call(
    chain: &todod::BoxedHandler,
    req: Request,
) -> http::Response<http_body_util::Full<bytes::Bytes>> {
    let writer = Arc::new(ResponseWriter::new());
    chain.call(req, Arc::clone(&writer) as Sink).await;
    writer.finish()
}

fn guarded_app(log: &SharedBuf) -> todod::BoxedHandler {
    router::app(
        Arc::new(TodoStore::in_memory()),
        Some(Credential::new("admin", "secret").unwrap()),
        AccessLog::with_writer(log.clone()),
    )
}

#[tokio::test]
async fn healthz_is_never_gated() {
    let log = SharedBuf::default();
    let app = guarded_app(&log);

    let response = call(&app, Request::new(Method::GET, "/healthz")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(value["Message"], "OK");
}

#[tokio::test]
async fn legacy_todos_stays_open() {
    let log = SharedBuf::default();
    let app = guarded_app(&log);

    let response = call(&app, Request::new(Method::GET, "/todos")).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn api_subtree_requires_credentials() {
    let log = SharedBuf::default();
    let app = guarded_app(&log);

    let response = call(&app, Request::new(Method::GET, "/api/todos")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.headers()["www-authenticate"],
        r#"Basic realm="Authorization Required Area""#
    );

    let req = Request::new(Method::GET, "/api/todos")
        .with_header("Authorization", "Basic YWRtaW46c2VjcmV0");
    let response = call(&app, req).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn api_requests_are_logged_with_their_status() {
    let log = SharedBuf::default();
    let app = guarded_app(&log);

    call(&app, Request::new(Method::GET, "/api/todos")).await;

    let records = log.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["Path"], "/api/todos");
    assert_eq!(records[0]["Status"], 401);
    assert_eq!(records[0]["OS"], "");
}

#[tokio::test]
async fn when_no_credential_is_configured_the_subtree_is_absent() {
    let log = SharedBuf::default();
    let app = router::app(
        Arc::new(TodoStore::in_memory()),
        None,
        AccessLog::with_writer(log.clone()),
    );

    let response = call(&app, Request::new(Method::GET, "/api/todos")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = call(&app, Request::new(Method::GET, "/todos")).await;
    assert_eq!(response.status(), StatusCode::OK);
}

// ── Canonical stack semantics ─────────────────────────────────────────────────

fn canonical_stack(terminal: impl todod::Handler, log: &SharedBuf) -> todod::BoxedHandler {
    middleware::with(
        terminal,
        &[
            &Recovery,
            &AccessLog::with_writer(log.clone()),
            &UserAgentRecord,
        ],
    )
}

#[tokio::test]
async fn panicking_handler_yields_a_logged_500() {
    async fn terminal(_req: Request, _res: Sink) {
        panic!("kaboom");
    }

    let log = SharedBuf::default();
    let chain = canonical_stack(terminal, &log);

    let response = call(&chain, Request::new(Method::GET, "/todos")).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    // Recovery sits inside the logger, so the record reflects the 500.
    let records = log.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["Status"], 500);
}

#[tokio::test]
async fn status_committed_before_a_panic_survives() {
    async fn terminal(_req: Request, res: Sink) {
        res.write_head(StatusCode::CREATED);
        panic!("too late to change the status");
    }

    let log = SharedBuf::default();
    let chain = canonical_stack(terminal, &log);

    let response = call(&chain, Request::new(Method::GET, "/todos")).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(log.records()[0]["Status"], 201);
}

#[tokio::test]
async fn detected_os_reaches_the_log_record() {
    async fn terminal(_req: Request, res: Sink) {
        res.write(b"ok");
    }

    let log = SharedBuf::default();
    let chain = canonical_stack(terminal, &log);

    let req = Request::new(Method::GET, "/todos").with_header(
        "User-Agent",
        "Mozilla/5.0 (Windows NT 6.1; WOW64) AppleWebKit/537.36 Chrome/59.0 Safari/537.36",
    );
    call(&chain, req).await;

    assert_eq!(log.records()[0]["OS"], "Windows");
}
