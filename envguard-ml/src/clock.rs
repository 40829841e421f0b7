//! Retraining clock
//!
//! A tokio task that runs a training cycle once per period. The first cycle
//! runs one full period after start; startup training is
//! [`TrainingOrchestrator::initialize`]'s job. Cycles run on the blocking
//! pool so fitting never stalls other tasks on the runtime, and a cycle that
//! overruns its period delays the next tick instead of queueing a burst.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::TrainingOrchestrator;

/// Starts the periodic retraining task
pub struct RetrainingClock;

impl RetrainingClock {
    /// Spawn the clock on the current tokio runtime
    ///
    /// Must be called from within a runtime. The clock stops when the
    /// returned handle is shut down or dropped.
    pub fn start(orchestrator: Arc<TrainingOrchestrator>, period: Duration) -> RetrainingHandle {
        // tokio intervals panic on a zero period
        let period = period.max(Duration::from_millis(1));
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let cycles = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&cycles);

        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            log::info!("Retraining clock started, period {:?}", period);

            loop {
                tokio::select! {
                    biased;

                    // Resolves on an explicit shutdown and when the handle is dropped
                    _ = &mut shutdown_rx => break,

                    _ = ticker.tick() => {
                        let trainer = Arc::clone(&orchestrator);
                        match tokio::task::spawn_blocking(move || trainer.run_training_cycle()).await {
                            Ok(Ok(report)) => log::info!(
                                "Scheduled training cycle done, {} parameters trained",
                                report.trained().len()
                            ),
                            Ok(Err(err)) => log::error!("Scheduled training cycle failed: {}", err),
                            Err(err) => log::error!("Scheduled training cycle aborted: {}", err),
                        }
                        counter.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }

            log::info!("Retraining clock stopped");
        });

        RetrainingHandle {
            shutdown: Some(shutdown_tx),
            task,
            cycles,
        }
    }
}

/// Control handle for a running [`RetrainingClock`]
pub struct RetrainingHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
    cycles: Arc<AtomicU64>,
}

impl RetrainingHandle {
    /// Cycles attempted so far
    pub fn cycles_run(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    /// Stop the clock and wait for it to exit
    ///
    /// A cycle already in progress finishes first. Returns the number of
    /// cycles attempted.
    pub async fn shutdown(mut self) -> u64 {
        if let Some(tx) = self.shutdown.take() {
            // Err means the task is already gone
            let _ = tx.send(());
        }
        if let Err(err) = (&mut self.task).await {
            log::error!("Retraining clock task ended abnormally: {}", err);
        }
        self.cycles_run()
    }
}
