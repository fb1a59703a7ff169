use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::config::FulfillmentConfig;
use crate::services::fulfillment::FulfillmentJob;

/// Drains the fulfillment queue and assigns a delivery rider per job.
///
/// Rider dispatch is simulated: each assignment waits for the configured
/// delay in its own task, so the queue keeps draining while riders are
/// located. At most `max_concurrent_assignments` run at once.
pub struct FulfillmentWorker {
    receiver: mpsc::Receiver<FulfillmentJob>,
    config: FulfillmentConfig,
    slots: Arc<Semaphore>,
    assignments: JoinSet<()>,
    processed: u64,
}

impl FulfillmentWorker {
    pub fn new(receiver: mpsc::Receiver<FulfillmentJob>, config: FulfillmentConfig) -> Self {
        let slots = Arc::new(Semaphore::new(config.max_concurrent_assignments.max(1)));
        Self {
            receiver,
            config,
            slots,
            assignments: JoinSet::new(),
            processed: 0,
        }
    }

    /// Run until shutdown is signalled or every trigger has been dropped.
    /// Assignments already started are awaited; returns the number completed.
    pub async fn run(mut self, mut shutdown_rx: watch::Receiver<bool>) -> u64 {
        info!(
            queue_capacity = self.config.queue_capacity,
            max_concurrent = self.config.max_concurrent_assignments,
            rider_delay_ms = self.config.rider_assignment_delay.as_millis() as u64,
            "fulfillment worker started"
        );

        loop {
            tokio::select! {
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("fulfillment worker stopping");
                        break;
                    }
                }
                Some(result) = self.assignments.join_next(), if !self.assignments.is_empty() => {
                    self.record(result);
                }
                job = self.receiver.recv() => {
                    match job {
                        Some(job) => {
                            if !self.start_assignment(job).await {
                                break;
                            }
                        }
                        None => {
                            info!("fulfillment queue closed");
                            break;
                        }
                    }
                }
            }
        }

        self.receiver.close();
        let mut abandoned = 0usize;
        while self.receiver.try_recv().is_ok() {
            abandoned += 1;
        }
        if abandoned > 0 {
            warn!(abandoned, "fulfillment jobs left in queue at shutdown");
        }

        while let Some(result) = self.assignments.join_next().await {
            self.record(result);
        }

        info!(processed = self.processed, "fulfillment worker stopped");
        self.processed
    }

    /// Spawn the assignment once a slot frees up; `false` if the slots are gone
    async fn start_assignment(&mut self, job: FulfillmentJob) -> bool {
        let permit = match self.slots.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => return false,
        };
        let delay = self.config.rider_assignment_delay;
        self.assignments.spawn(async move {
            assign_rider(job, delay).await;
            drop(permit);
        });
        true
    }

    fn record(&mut self, result: Result<(), tokio::task::JoinError>) {
        match result {
            Ok(()) => self.processed += 1,
            Err(e) => warn!(error = %e, "rider assignment task failed"),
        }
    }
}

async fn assign_rider(job: FulfillmentJob, delay: Duration) {
    info!(
        order_id = %job.order_id,
        method = %job.method,
        status = %job.status,
        "Locating delivery rider"
    );

    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    let wait = chrono::Utc::now() - job.triggered_at;
    info!(
        order_id = %job.order_id,
        has_address = job.delivery_address.is_some(),
        total_amount = %job.total_amount,
        queued_ms = wait.num_milliseconds(),
        "Rider assigned"
    );
}

/// Wait for a worker handle, giving up after `timeout`
pub async fn join_with_timeout<T>(
    handle: tokio::task::JoinHandle<T>,
    timeout: Duration,
) -> Option<T> {
    match tokio::time::timeout(timeout, handle).await {
        Ok(Ok(value)) => Some(value),
        Ok(Err(e)) => {
            warn!(error = %e, "worker task failed");
            None
        }
        Err(_) => {
            warn!(timeout_ms = timeout.as_millis() as u64, "timed out waiting for worker");
            None
        }
    }
}
