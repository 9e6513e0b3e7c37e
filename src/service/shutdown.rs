use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::signal;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Server-wide stop request.
///
/// Clones share one notification: triggering any of them wakes every
/// pending [`Shutdown::wait`], and a wait started after the trigger returns
/// at once. The accept loop has no terminal state of its own, so this is the
/// only way it ends.
#[derive(Debug, Clone)]
pub struct Shutdown {
    triggered: Arc<AtomicBool>,
    notify: broadcast::Sender<()>,
}

impl Default for Shutdown {
    fn default() -> Self {
        Shutdown::new()
    }
}

impl Shutdown {
    pub fn new() -> Shutdown {
        let (notify, _) = broadcast::channel(1);
        Shutdown {
            triggered: Arc::new(AtomicBool::new(false)),
            notify,
        }
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// Idempotent.
    pub fn trigger(&self) {
        if !self.triggered.swap(true, Ordering::SeqCst) {
            // no receiver just means nobody is waiting yet
            let _ = self.notify.send(());
        }
    }

    /// Resolves once the stop has been requested.
    pub async fn wait(&self) {
        // subscribe before the flag check so a concurrent trigger is not missed
        let mut notify = self.notify.subscribe();
        if self.is_triggered() {
            return;
        }
        let _ = notify.recv().await;
    }

    /// Triggers on the first Ctrl-C. If no signal handler can be installed
    /// the task logs and never triggers, leaving the server to run until
    /// killed.
    pub fn forward_ctrl_c(&self) -> JoinHandle<()> {
        let shutdown = self.clone();
        tokio::spawn(async move {
            if let Err(err) = signal::ctrl_c().await {
                error!(cause = %err, "failed to listen for shutdown signal");
                return;
            }
            info!("get shutdown signal");
            shutdown.trigger();
        })
    }
}
