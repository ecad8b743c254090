//! Coordinated graceful shutdown.
//!
//! One [`Trigger`] fans out to any number of [`Signal`] clones over a
//! latched watch channel, so a single SIGTERM drains every server that
//! shares the pair. The completion side is a plain `JoinSet` in `main`: one
//! task per supervised server, awaited to the last before the process
//! exits.
//!
//! The signal is advisory — it tells accept loops to stop accepting.
//! Nothing here cancels in-flight work; the server's grace period bounds
//! how long the drain may take.

use tokio::sync::watch;

/// Creates a linked trigger/signal pair.
pub fn channel() -> (Trigger, Signal) {
    let (tx, rx) = watch::channel(false);
    (Trigger { tx }, Signal { rx })
}

/// The sending half. Raise it once; raising it again is harmless.
pub struct Trigger {
    tx: watch::Sender<bool>,
}

impl Trigger {
    pub fn trigger(&self) {
        // Receivers may all be gone already; that is not an error.
        let _ = self.tx.send(true);
    }
}

/// The receiving half. Clone one per server.
#[derive(Clone)]
pub struct Signal {
    rx: watch::Receiver<bool>,
}

impl Signal {
    /// Resolves once the trigger has been raised — immediately if it was
    /// raised before this call. A dropped [`Trigger`] counts as raised, so
    /// an aborted supervisor still winds its servers down.
    pub async fn raised(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                return;
            }
        }
    }
}

/// Resolves on the first termination request the process receives.
///
/// On Unix this listens for both **SIGTERM** (sent by init systems and the
/// Kubernetes control plane) and **SIGINT** (Ctrl-C, for local dev). On
/// other platforms only Ctrl-C is available.
pub async fn terminated() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let sigterm = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    // `pending()` never resolves — on non-Unix platforms the SIGTERM arm is
    // effectively disabled.
    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c  => {}
        () = sigterm => {}
    }
}
