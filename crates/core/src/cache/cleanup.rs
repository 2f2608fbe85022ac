//! Periodic expiry sweeps.
//!
//! Two independent jobs: one deletes expired rows from the persistent tier,
//! the other drops expired entries from the memory tier. Both stop when
//! [`CleanupScheduler::stop`] is called or the scheduler is dropped.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::connection::CacheDb;
use super::memory::MemoryTier;
use super::{Error, bounded};

/// Delete expired persistent entries once.
pub async fn sweep_persistent(db: &CacheDb, io_timeout: Duration) -> Result<u64, Error> {
    let deleted = bounded("purge_expired_entries", io_timeout, db.purge_expired_entries()).await?;
    if deleted > 0 {
        tracing::info!(deleted, "persistent tier sweep removed expired entries");
    }
    Ok(deleted)
}

/// Drop expired memory entries once.
pub fn sweep_memory(memory: &MemoryTier) -> usize {
    let removed = memory.purge_expired();
    if removed > 0 {
        tracing::info!(removed, remaining = memory.len(), "memory tier sweep removed expired entries");
    }
    removed
}

/// Handle to the running sweep jobs.
#[derive(Debug)]
pub struct CleanupScheduler {
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl CleanupScheduler {
    /// Spawn the sweep jobs on the current runtime.
    ///
    /// The persistent job is only spawned when a database is available.
    /// Persistent sweep failures are counted in `errors`.
    pub fn start(
        db: Option<CacheDb>, memory: Arc<MemoryTier>, errors: Arc<AtomicU64>, persistent_every: Duration,
        memory_every: Duration, io_timeout: Duration,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        let mut tasks = Vec::with_capacity(2);

        if let Some(db) = db {
            let mut stop = shutdown.subscribe();
            tasks.push(tokio::spawn(async move {
                let mut ticker = tokio::time::interval(persistent_every);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                ticker.tick().await;
                loop {
                    tokio::select! {
                        _ = ticker.tick() => {
                            if let Err(e) = sweep_persistent(&db, io_timeout).await {
                                errors.fetch_add(1, Ordering::Relaxed);
                                tracing::warn!(error = %e, "persistent tier sweep failed");
                            }
                        }
                        _ = stop.changed() => break,
                    }
                }
                tracing::debug!("persistent tier sweep stopped");
            }));
        }

        let mut stop = shutdown.subscribe();
        tasks.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(memory_every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        sweep_memory(&memory);
                    }
                    _ = stop.changed() => break,
                }
            }
            tracing::debug!("memory tier sweep stopped");
        }));

        tracing::info!(
            persistent_every_secs = persistent_every.as_secs(),
            memory_every_secs = memory_every.as_secs(),
            jobs = tasks.len(),
            "cleanup scheduler started"
        );

        Self { shutdown, tasks }
    }

    /// Number of running jobs.
    pub fn job_count(&self) -> usize {
        self.tasks.len()
    }

    /// Signal both jobs to stop and wait for them to finish.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        for task in self.tasks {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "cleanup job ended abnormally");
            }
        }
        tracing::info!("cleanup scheduler stopped");
    }
}
