//! Process bootstrap: read the environment, wire the pipeline, supervise
//! the server until shutdown completes.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::error;

use todod::middleware::AccessLog;
use todod::{router, shutdown, Credential, Error, Server, TodoStore};

#[tokio::main]
async fn main() {
    // Diagnostics go to stderr so the access log owns stdout.
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    if let Err(err) = run().await {
        error!(%err, "failed to exit successfully");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Error> {
    let config = Config::from_env()?;

    let store = match &config.store_path {
        Some(path) => Arc::new(TodoStore::open(path.clone())?),
        None => Arc::new(TodoStore::in_memory()),
    };

    let app = router::app(store, config.credential()?, AccessLog::new());
    let server = Server::bind(config.addr).await?;

    let (trigger, signal) = shutdown::channel();
    tokio::spawn(async move {
        shutdown::terminated().await;
        trigger.trigger();
    });

    // One supervised server today. The signal is cloneable and the JoinSet
    // is the completion barrier, so adding listeners means adding spawns —
    // one signal still drains them all, and the process exits only after
    // every one has stopped.
    let mut servers = JoinSet::new();
    servers.spawn(server.serve(app, signal.clone()));

    while let Some(joined) = servers.join_next().await {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(err)) => error!(%err, "server exited with error"),
            Err(err) => error!(%err, "server task panicked"),
        }
    }

    Ok(())
}

// ── Configuration ─────────────────────────────────────────────────────────────

struct Config {
    addr: SocketAddr,
    store_path: Option<PathBuf>,
    auth_user_id: String,
    auth_password: String,
}

impl Config {
    const DEFAULT_ADDR: &'static str = "0.0.0.0:8080";

    fn from_env() -> Result<Self, Error> {
        let addr = env_or("LISTEN_ADDR", Self::DEFAULT_ADDR);
        let addr = addr
            .parse()
            .map_err(|_| Error::Config(format!("LISTEN_ADDR `{addr}` is not host:port")))?;

        Ok(Self {
            addr,
            store_path: std::env::var("STORE_PATH").ok().filter(|p| !p.is_empty()).map(PathBuf::from),
            auth_user_id: env_or("BASIC_AUTH_USER_ID", ""),
            auth_password: env_or("BASIC_AUTH_PASSWORD", ""),
        })
    }

    /// No credential at all is a deliberate open deployment; a partial or
    /// invalid one is a configuration mistake and refuses startup.
    fn credential(&self) -> Result<Option<Credential>, Error> {
        if self.auth_user_id.is_empty() && self.auth_password.is_empty() {
            return Ok(None);
        }
        Ok(Some(Credential::new(&self.auth_user_id, &self.auth_password)?))
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}
