//! Health-check handler.
//!
//! Registered outside the authenticated sub-tree and never gated: a
//! liveness probe that can be failed by a credential mix-up restarts
//! healthy processes.

use serde::Serialize;
use tracing::error;

use crate::request::Request;
use crate::response::Sink;

#[derive(Serialize)]
struct HealthzResponse {
    #[serde(rename = "Message")]
    message: &'static str,
}

/// `GET /healthz` — answers `{"Message":"OK"}`.
///
/// Intentionally dependency-free: if the process can answer HTTP at all, it
/// is alive.
pub async fn healthz(_req: Request, res: Sink) {
    match serde_json::to_vec(&HealthzResponse { message: "OK" }) {
        Ok(body) => {
            res.insert_header("content-type", "application/json");
            res.write(&body);
        }
        Err(err) => error!(%err, "could not encode healthz response"),
    }
}
