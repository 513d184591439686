use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Local;
use tracing::{debug, info, warn};

use corvid_core::{CorvidError, Result};

use crate::cron::CronExpr;

/// Matches the original fixed-size job table.
pub const CRON_MAX_JOBS: usize = 256;

struct JobSlot {
    name: String,
    expr: CronExpr,
    callback: Arc<dyn Fn() + Send + Sync>,
    last_run: AtomicI64,
    active: AtomicBool,
}

/// Registration (`add`/`remove`) is safe to call concurrently with the run
/// loop; jobs are kept behind a coarse `Mutex` and removed jobs are
/// tombstoned rather than shifted out of the vector.
pub struct Scheduler {
    jobs: Mutex<Vec<JobSlot>>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self { jobs: Mutex::new(Vec::new()) }
    }

    pub fn add(&self, name: impl Into<String>, expr: CronExpr, callback: Arc<dyn Fn() + Send + Sync>) -> Result<()> {
        let mut jobs = self.jobs.lock().unwrap();
        let active_count = jobs.iter().filter(|j| j.active.load(Ordering::SeqCst)).count();
        if active_count >= CRON_MAX_JOBS {
            warn!(max = CRON_MAX_JOBS, "scheduler overflow, job rejected");
            return Err(CorvidError::SchedulerOverflow { max: CRON_MAX_JOBS });
        }

        let name = name.into();
        info!(name = %name, "cron job registered");
        jobs.push(JobSlot {
            name,
            expr,
            callback,
            last_run: AtomicI64::new(0),
            active: AtomicBool::new(true),
        });
        Ok(())
    }

    /// Tombstone the named job. Returns whether an active job was found.
    pub fn remove(&self, name: &str) -> bool {
        let jobs = self.jobs.lock().unwrap();
        for job in jobs.iter() {
            if job.name == name && job.active.load(Ordering::SeqCst) {
                job.active.store(false, Ordering::SeqCst);
                info!(name, "cron job removed");
                return true;
            }
        }
        false
    }

    /// Check all active jobs once against the current local time, firing any
    /// whose expression matches and that have not already fired this minute.
    pub fn tick(&self) {
        let now = Local::now();
        let minute_start = now.timestamp() - (now.timestamp() % 60);

        let jobs = self.jobs.lock().unwrap();
        for job in jobs.iter() {
            if !job.active.load(Ordering::SeqCst) {
                continue;
            }
            if job.last_run.load(Ordering::SeqCst) >= minute_start {
                continue;
            }
            if job.expr.matches(&now) {
                debug!(name = %job.name, "firing cron job");
                job.last_run.store(now.timestamp(), Ordering::SeqCst);
                (job.callback)();
            }
        }
    }

    /// Run forever, checking every 30 seconds for due jobs. Intended to be
    /// spawned as its own task alongside the front-ends.
    pub async fn run(self: Arc<Self>) {
        info!("cron scheduler started");
        loop {
            self.tick();
            tokio::time::sleep(std::time::Duration::from_secs(30)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn tick_fires_matching_job_at_most_once_per_minute() {
        let sched = Scheduler::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();

        sched
            .add("always", CronExpr::parse("* * * * *").unwrap(), Arc::new(move || {
                count_clone.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();

        sched.tick();
        sched.tick();
        sched.tick();

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn removed_job_does_not_fire() {
        let sched = Scheduler::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();

        sched
            .add("job", CronExpr::parse("* * * * *").unwrap(), Arc::new(move || {
                count_clone.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();
        assert!(sched.remove("job"));
        sched.tick();

        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn overflow_past_max_jobs_is_rejected() {
        let sched = Scheduler::new();
        for i in 0..CRON_MAX_JOBS {
            sched
                .add(format!("job{i}"), CronExpr::parse("* * * * *").unwrap(), Arc::new(|| {}))
                .unwrap();
        }
        let result = sched.add("one-too-many", CronExpr::parse("* * * * *").unwrap(), Arc::new(|| {}));
        assert!(matches!(result, Err(CorvidError::SchedulerOverflow { max: CRON_MAX_JOBS })));
    }
}
