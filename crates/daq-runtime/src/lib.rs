//! Worker Loop: the long-running supervisor that starts subscriptions,
//! periodically triggers time-based flush, detects disconnection, drives
//! recovery, and performs orderly shutdown.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use daq_batch::BatchSink;
use daq_core::DaqError;
use daq_subscription::SubscriptionManager;
use tracing::{error, info};

pub struct WorkerLoop {
    subscriptions: Arc<dyn SubscriptionManager>,
    sink: Arc<BatchSink>,
    tick_interval: Duration,
}

impl WorkerLoop {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionManager>,
        sink: Arc<BatchSink>,
        tick_interval: Duration,
    ) -> Self {
        Self {
            subscriptions,
            sink,
            tick_interval,
        }
    }

    /// Starts subscriptions and runs the periodic tick until `shutdown`
    /// resolves. On shutdown: stops subscriptions first so no new items
    /// arrive, then issues one final, uninterruptible flush before returning.
    pub async fn run<F>(&self, shutdown: F) -> Result<(), DaqError>
    where
        F: Future<Output = ()>,
    {
        self.subscriptions.start().await?;
        info!("subscriptions started");

        let mut ticker = tokio::time::interval(self.tick_interval);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick().await;
                }
                _ = &mut shutdown => {
                    info!("shutdown signal received");
                    break;
                }
            }
        }

        self.subscriptions.stop().await?;
        info!("subscriptions stopped, issuing final flush");
        self.sink.flush().await?;
        Ok(())
    }

    async fn tick(&self) {
        if !self.subscriptions.is_connected().await {
            if let Err(e) = self.subscriptions.reconnect().await {
                error!(error = %e, "reconnect attempt failed");
            }
        }

        if self.sink.pending_count() > 0 {
            if let Err(e) = self.sink.flush().await {
                error!(error = %e, "time-triggered flush failed");
            }
        }

        if let Err(e) = self.sink.try_recover().await {
            error!(error = %e, "recovery attempt failed");
        }
    }
}
