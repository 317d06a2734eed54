//! Tokio-driven scheduler loop, per spec.md §4.9.
//!
//! Grounded in the teacher's `scheduler::tokio_scheduler::TokioScheduler`
//! for the overall shape (watch-channel stop signal, `Arc<Self>`
//! construction) but replaces its per-second ticker and job-execution
//! machinery with the single cooperative non-reentrant loop the
//! specification describes: sleep `interval` seconds, then fully process
//! one tick (query, fire, reschedule) before sleeping again.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;

use crate::agent::OutputText;
use crate::bus::traits::{EventBus, topics};

use super::schedule::recompute_next_run;
use super::task_repo::TaskRepository;

/// Default tick interval, per spec.md §4.9.
pub const DEFAULT_INTERVAL_SECS: u64 = 30;

pub struct TokioScheduler {
    repo: Arc<dyn TaskRepository>,
    bus: Arc<dyn EventBus>,
    interval: Duration,
    stop_tx: watch::Sender<bool>,
    stop_rx: watch::Receiver<bool>,
}

impl TokioScheduler {
    pub fn new(repo: Arc<dyn TaskRepository>, bus: Arc<dyn EventBus>) -> Arc<Self> {
        Self::with_interval(repo, bus, Duration::from_secs(DEFAULT_INTERVAL_SECS))
    }

    pub fn with_interval(repo: Arc<dyn TaskRepository>, bus: Arc<dyn EventBus>, interval: Duration) -> Arc<Self> {
        let (stop_tx, stop_rx) = watch::channel(false);
        Arc::new(Self {
            repo,
            bus,
            interval,
            stop_tx,
            stop_rx,
        })
    }

    /// Spawn the background loop. Idempotent only in the sense that calling
    /// it twice spawns two independent loops — callers are expected to call
    /// it once per scheduler instance.
    pub fn start(self: &Arc<Self>) {
        let this = Arc::clone(self);
        let mut stop_rx = this.stop_rx.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(this.interval) => {
                        this.tick().await;
                    }
                    Ok(()) = stop_rx.changed() => {
                        if *stop_rx.borrow() {
                            break;
                        }
                    }
                }
            }
        });
    }

    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }

    /// Process exactly one tick: query due tasks, fire each in order,
    /// recompute its `next_run`. Awaited to completion before the loop
    /// sleeps again — ticks never overlap.
    async fn tick(&self) {
        let now = Utc::now();
        let due = match self.repo.due_tasks(now).await {
            Ok(tasks) => tasks,
            Err(err) => {
                tracing::warn!(error = %err, "scheduler: failed to query due tasks");
                return;
            }
        };

        for task in due {
            let message = OutputText::new(&task.session_id, format!("Task due: {}", task.message_text()));
            if let Ok(value) = serde_json::to_value(&message) {
                if let Err(err) = self.bus.publish(topics::OUTPUT_TEXT, value).await {
                    tracing::warn!(error = %err, task_id = %task.id, "scheduler: failed to publish output.text");
                }
            }

            let next_run = match recompute_next_run(&task.schedule, now) {
                Ok(next_run) => next_run,
                Err(err) => {
                    tracing::warn!(error = %err, task_id = %task.id, "scheduler: invalid schedule, disabling task");
                    None
                }
            };

            if let Err(err) = self.repo.record_fire(&task.id, now, next_run).await {
                tracing::warn!(error = %err, task_id = %task.id, "scheduler: failed to record task fire");
            }
        }
    }
}
