//! Periodic job dispatch: per-job cadence, initial-run policy, and
//! self-unsubscribe when a job reports it no longer wants to run.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("job {0:?} is already scheduled")]
    DuplicateJob(String),
    #[error("job {0:?} declined to run: not enabled")]
    NotEnabled(String),
}

/// A periodic unit of work. `run` decides for itself whether it should keep
/// being scheduled by returning `continue = false`; a job whose `run`
/// returns `(false, _)` is unscheduled after that invocation.
#[async_trait::async_trait]
pub trait Job: Send + Sync {
    fn id(&self) -> &str;

    /// `(interval, start_immediately)`.
    fn interval(&self) -> (Duration, bool);

    /// Probes whether this job should be scheduled at all; combines the
    /// instance/project/config three-tier override for the credential job,
    /// or is trivially `true` for jobs with no such override.
    async fn should_enable(&self, token: &CancellationToken) -> bool;

    /// Runs one iteration. Errors are logged by the scheduler; they do not
    /// by themselves unschedule the job — it remains scheduled so the next
    /// tick may recover.
    async fn run(&self, token: &CancellationToken) -> (bool, Option<anyhow_like::Error>);
}

/// A minimal boxed-error alias so `Job::run` doesn't force every job's error
/// type through the scheduler's own enum; jobs log their own detailed errors
/// and report only a display string upward.
pub mod anyhow_like {
    pub type Error = Box<dyn std::error::Error + Send + Sync + 'static>;
}

struct Entry {
    handle: JoinHandle<()>,
}

/// Owns the `{jobId -> entry}` table. Not a global: the binary entrypoint
/// constructs one `Scheduler` and holds it for the process lifetime.
#[derive(Default)]
pub struct Scheduler {
    entries: Mutex<HashMap<String, Entry>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules `job`. If `!job.should_enable()`, returns
    /// `SchedulerError::NotEnabled` and schedules nothing. A duplicate id is
    /// a no-op success, matching "Duplicate id ⇒ no-op".
    pub async fn schedule_job(
        &self,
        job: Arc<dyn Job>,
        synchronous: bool,
        token: CancellationToken,
    ) -> Result<(), SchedulerError> {
        let id = job.id().to_string();
        {
            let entries = self.entries.lock().await;
            if entries.contains_key(&id) {
                return Ok(());
            }
        }

        if !job.should_enable(&token).await {
            return Err(SchedulerError::NotEnabled(id));
        }

        let (interval, start_immediately) = job.interval();

        if start_immediately && synchronous {
            run_once_logged(job.as_ref(), &token).await;
        }

        let spawned_job = job.clone();
        let spawned_token = token.clone();
        let handle = tokio::spawn(async move {
            if start_immediately && !synchronous {
                if !run_once_logged(spawned_job.as_ref(), &spawned_token).await {
                    return;
                }
            }
            run_periodic(spawned_job, interval, spawned_token).await;
        });

        self.entries.lock().await.insert(id, Entry { handle });
        Ok(())
    }

    /// Fans out scheduling across `jobs`; if `synchronous`, each job's first
    /// run blocks `schedule_job` before it returns.
    pub async fn schedule_jobs(
        &self,
        jobs: Vec<Arc<dyn Job>>,
        synchronous: bool,
        token: CancellationToken,
    ) {
        for job in jobs {
            if let Err(error) = self.schedule_job(job, synchronous, token.clone()).await {
                warn!(%error, "job not scheduled");
            }
        }
    }
}

/// Runs one iteration of `job`, logging any error; returns whether the
/// caller should keep rescheduling it.
async fn run_once_logged(job: &dyn Job, token: &CancellationToken) -> bool {
    let (keep_going, error) = job.run(token).await;
    if let Some(error) = error {
        error!(job = job.id(), %error, "job run failed");
    }
    keep_going
}

async fn run_periodic(job: Arc<dyn Job>, interval: Duration, token: CancellationToken) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => {
                info!(job = job.id(), "scheduler stopping job: cancelled");
                return;
            }
            _ = ticker.tick() => {
                if !run_once_logged(job.as_ref(), &token).await {
                    info!(job = job.id(), "job unsubscribed itself");
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingJob {
        id: String,
        runs: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl Job for CountingJob {
        fn id(&self) -> &str {
            &self.id
        }

        fn interval(&self) -> (Duration, bool) {
            (Duration::from_millis(5), true)
        }

        async fn should_enable(&self, _token: &CancellationToken) -> bool {
            true
        }

        async fn run(&self, _token: &CancellationToken) -> (bool, Option<anyhow_like::Error>) {
            self.runs.fetch_add(1, Ordering::SeqCst);
            (self.runs.load(Ordering::SeqCst) < 3, None)
        }
    }

    #[tokio::test]
    async fn job_unschedules_itself_after_reporting_continue_false() {
        let scheduler = Scheduler::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let job = Arc::new(CountingJob {
            id: "counting".to_string(),
            runs: runs.clone(),
        });
        let token = CancellationToken::new();

        scheduler
            .schedule_job(job, true, token.clone())
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn duplicate_job_id_is_a_no_op() {
        let scheduler = Scheduler::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let token = CancellationToken::new();
        let job_a = Arc::new(CountingJob {
            id: "dup".to_string(),
            runs: runs.clone(),
        });
        let job_b = Arc::new(CountingJob {
            id: "dup".to_string(),
            runs: runs.clone(),
        });

        scheduler
            .schedule_job(job_a, false, token.clone())
            .await
            .unwrap();
        scheduler
            .schedule_job(job_b, false, token.clone())
            .await
            .unwrap();
        assert_eq!(scheduler.entries.lock().await.len(), 1);
    }
}
