//! One supervised task per exchange connector.
//!
//! [`Supervisor::spawn`] starts [`Exchange::run`] for every enabled exchange
//! and returns a [`SupervisorHandle`]. Shutting the handle down flips the
//! shared `watch` channel and waits for every task to exit. A connector that
//! fails or panics is logged and never takes the others down.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::exchange::Exchange;

/// Starts connector tasks.
#[derive(Default)]
pub struct Supervisor {
    exchanges: Vec<Arc<dyn Exchange>>,
}

impl Supervisor {
    pub fn new(exchanges: Vec<Arc<dyn Exchange>>) -> Self {
        Self { exchanges }
    }

    pub fn add(&mut self, exchange: Arc<dyn Exchange>) {
        self.exchanges.push(exchange);
    }

    /// Spawn a run task for every enabled exchange.
    pub fn spawn(self) -> SupervisorHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut tasks = Vec::new();

        for exchange in self.exchanges {
            if !exchange.is_enabled() {
                info!(exchange = %exchange.name(), "exchange disabled, not starting");
                continue;
            }
            let name = exchange.name().to_string();
            let rx = shutdown_rx.clone();
            let handle = tokio::spawn(async move {
                if let Err(err) = exchange.run(rx).await {
                    error!(exchange = %exchange.name(), error = %err, "exchange task failed");
                }
            });
            tasks.push((name, handle));
        }

        info!(count = tasks.len(), "exchange tasks started");
        SupervisorHandle {
            shutdown: shutdown_tx,
            tasks,
        }
    }
}

/// Running connector tasks.
pub struct SupervisorHandle {
    shutdown: watch::Sender<bool>,
    tasks: Vec<(String, JoinHandle<()>)>,
}

impl SupervisorHandle {
    /// Names of the exchanges that were started.
    pub fn exchanges(&self) -> Vec<&str> {
        self.tasks.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Number of tasks still running.
    pub fn running(&self) -> usize {
        self.tasks.iter().filter(|(_, h)| !h.is_finished()).count()
    }

    /// Signal every task to stop and wait for them.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for (name, handle) in self.tasks {
            if let Err(err) = handle.await {
                error!(exchange = %name, error = %err, "exchange task panicked");
            }
        }
        info!("all exchange tasks stopped");
    }
}
