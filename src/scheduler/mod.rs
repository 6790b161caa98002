//! Named recurring jobs on cron-style triggers, all in one timezone.
//!
//! The scheduler is an explicit instance constructed at process start and
//! handed its job set; there is no global. Each firing reports started /
//! completed / failed events to the external [`JobLog`] collaborator with
//! the elapsed duration. A per-job `try_lock` guard skips a firing while
//! the previous run of the same job is still active.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono_tz::Tz;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn};

// ── Collaborator traits ───────────────────────────────────────────────────────

/// External job-log sink. The pipeline only records these three events and
/// never inspects stored log rows.
#[async_trait]
pub trait JobLog: Send + Sync {
    async fn log_job_start(&self, name: &str) -> Result<i64>;
    async fn log_job_complete(&self, id: i64, summary: &str, duration: Duration) -> Result<()>;
    async fn log_job_fail(&self, id: i64, error: &str, duration: Duration) -> Result<()>;
}

/// One schedulable unit of work. Returns a one-line summary for the log.
#[async_trait]
pub trait JobTask: Send + Sync {
    async fn run(&self) -> Result<String>;
}

// ── Scheduler ─────────────────────────────────────────────────────────────────

struct JobDef {
    name: String,
    cron: String,
    task: Arc<dyn JobTask>,
}

pub struct Scheduler {
    tz: Tz,
    log: Arc<dyn JobLog>,
    jobs: Vec<JobDef>,
}

impl Scheduler {
    pub fn new(tz: Tz, log: Arc<dyn JobLog>) -> Self {
        Self {
            tz,
            log,
            jobs: Vec::new(),
        }
    }

    pub fn register(&mut self, name: &str, cron: &str, task: Arc<dyn JobTask>) {
        self.jobs.push(JobDef {
            name: name.to_string(),
            cron: cron.to_string(),
            task,
        });
    }

    /// Build the cron jobs, start the scheduler, and run until Ctrl-C.
    pub async fn run(self) -> Result<()> {
        let sched = JobScheduler::new()
            .await
            .map_err(|e| anyhow!("failed to create scheduler: {e}"))?;

        for def in self.jobs {
            let name = def.name.clone();
            let log = Arc::clone(&self.log);
            let task = Arc::clone(&def.task);
            let guard = Arc::new(Mutex::new(()));

            let job = Job::new_async_tz(def.cron.as_str(), self.tz, move |_id, _sched| {
                let name = name.clone();
                let log = Arc::clone(&log);
                let task = Arc::clone(&task);
                let guard = Arc::clone(&guard);
                Box::pin(async move {
                    fire_job(&name, task, log, guard).await;
                })
            })
            .map_err(|e| anyhow!("failed to build job '{}' ({}): {e}", def.name, def.cron))?;

            sched
                .add(job)
                .await
                .map_err(|e| anyhow!("failed to add job '{}': {e}", def.name))?;

            info!("registered job '{}' on '{}' ({})", def.name, def.cron, self.tz);
        }

        sched
            .start()
            .await
            .map_err(|e| anyhow!("failed to start scheduler: {e}"))?;

        info!("scheduler running; press Ctrl-C to stop");
        tokio::signal::ctrl_c().await?;
        info!("shutting down");
        Ok(())
    }
}

/// One firing: overlap guard → started event → task → completed/failed event.
async fn fire_job(name: &str, task: Arc<dyn JobTask>, log: Arc<dyn JobLog>, guard: Arc<Mutex<()>>) {
    let Ok(_held) = guard.try_lock() else {
        warn!("{}: previous run still active, skipping this firing", name);
        return;
    };

    let started = Instant::now();
    let id = match log.log_job_start(name).await {
        Ok(id) => id,
        Err(e) => {
            error!("{}: could not record job start: {:#}", name, e);
            return;
        }
    };

    info!("{}: started", name);

    match task.run().await {
        Ok(summary) => {
            let elapsed = started.elapsed();
            info!("{}: completed in {:.2?} — {}", name, elapsed, summary);
            if let Err(e) = log.log_job_complete(id, &summary, elapsed).await {
                error!("{}: could not record completion: {:#}", name, e);
            }
        }
        Err(e) => {
            let elapsed = started.elapsed();
            let msg = format!("{:#}", e);
            error!("{}: failed after {:.2?}: {}", name, elapsed, msg);
            if let Err(e) = log.log_job_fail(id, &msg, elapsed).await {
                error!("{}: could not record failure: {:#}", name, e);
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct RecordingLog {
        events: StdMutex<Vec<String>>,
    }

    #[async_trait]
    impl JobLog for RecordingLog {
        async fn log_job_start(&self, name: &str) -> Result<i64> {
            self.events
                .lock()
                .unwrap()
                .push(format!("start:{}", name));
            Ok(7)
        }

        async fn log_job_complete(&self, id: i64, summary: &str, _d: Duration) -> Result<()> {
            self.events
                .lock()
                .unwrap()
                .push(format!("complete:{}:{}", id, summary));
            Ok(())
        }

        async fn log_job_fail(&self, id: i64, error: &str, _d: Duration) -> Result<()> {
            self.events
                .lock()
                .unwrap()
                .push(format!("fail:{}:{}", id, error));
            Ok(())
        }
    }

    struct OkTask;
    #[async_trait]
    impl JobTask for OkTask {
        async fn run(&self) -> Result<String> {
            Ok("5 symbols".to_string())
        }
    }

    struct FailTask;
    #[async_trait]
    impl JobTask for FailTask {
        async fn run(&self) -> Result<String> {
            Err(anyhow!("listing unreachable"))
        }
    }

    struct StuckTask;
    #[async_trait]
    impl JobTask for StuckTask {
        async fn run(&self) -> Result<String> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(String::new())
        }
    }

    #[tokio::test]
    async fn test_successful_firing_records_start_and_complete() {
        let log = Arc::new(RecordingLog::default());
        fire_job(
            "daily-prices",
            Arc::new(OkTask),
            Arc::clone(&log) as Arc<dyn JobLog>,
            Arc::new(Mutex::new(())),
        )
        .await;

        let events = log.events.lock().unwrap().clone();
        assert_eq!(events, vec!["start:daily-prices", "complete:7:5 symbols"]);
    }

    #[tokio::test]
    async fn test_failed_firing_records_fail_event() {
        let log = Arc::new(RecordingLog::default());
        fire_job(
            "weekly-full",
            Arc::new(FailTask),
            Arc::clone(&log) as Arc<dyn JobLog>,
            Arc::new(Mutex::new(())),
        )
        .await;

        let events = log.events.lock().unwrap().clone();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], "start:weekly-full");
        assert!(events[1].starts_with("fail:7:"));
        assert!(events[1].contains("listing unreachable"));
    }

    #[tokio::test]
    async fn test_overlapping_firing_is_skipped() {
        let log = Arc::new(RecordingLog::default());
        let guard = Arc::new(Mutex::new(()));

        let first = tokio::spawn(fire_job(
            "weekly-full",
            Arc::new(StuckTask),
            Arc::clone(&log) as Arc<dyn JobLog>,
            Arc::clone(&guard),
        ));

        // Let the first firing take the guard
        tokio::time::sleep(Duration::from_millis(50)).await;

        fire_job(
            "weekly-full",
            Arc::new(OkTask),
            Arc::clone(&log) as Arc<dyn JobLog>,
            Arc::clone(&guard),
        )
        .await;

        // Only the stuck run's start event exists; the overlap was skipped
        let events = log.events.lock().unwrap().clone();
        assert_eq!(events, vec!["start:weekly-full"]);

        first.abort();
    }
}
