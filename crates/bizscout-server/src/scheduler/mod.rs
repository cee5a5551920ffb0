//! Task scheduler.
//!
//! Owns one [`JobScheduler`] and the map from a task's correlation id to the
//! recurring job currently bound to it. Every active task has exactly one live
//! job; inactive tasks have none. Runs of the same task never overlap, in this
//! process or across processes sharing the task store: a firing that finds its
//! task already running is skipped, and a run-now request is refused with
//! [`SchedulerError::AlreadyRunning`].

mod default_search;
mod lock;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};
use uuid::Uuid;

use bizscout_core::{CoreError, RunStats, SearchSeed, Task, TaskDraft, TaskFilter, TaskPatch};
use bizscout_db::{DbError, RunClaim, TaskStore};
use bizscout_extractor::{Extractor, ExtractorError, RunOutcome};

use lock::RunLocks;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("task {id} not found")]
    NotFound { id: i64 },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid schedule \"{expression}\": {reason}")]
    InvalidSchedule { expression: String, reason: String },

    #[error("task {task_id} is already running")]
    AlreadyRunning { task_id: i64 },

    #[error(transparent)]
    Extraction(#[from] ExtractorError),

    #[error("task store error: {0}")]
    Store(#[from] DbError),

    #[error("job scheduler error: {0}")]
    Scheduler(#[from] JobSchedulerError),
}

impl From<CoreError> for SchedulerError {
    fn from(error: CoreError) -> Self {
        match error {
            CoreError::InvalidInput(message) => Self::InvalidInput(message),
            CoreError::InvalidCron { expression, reason } => {
                Self::InvalidSchedule { expression, reason }
            }
        }
    }
}

impl SchedulerError {
    /// Store error for task `id`, with a missing row reported as [`SchedulerError::NotFound`].
    fn for_task(id: i64, error: DbError) -> Self {
        match error {
            DbError::NotFound => Self::NotFound { id },
            other => Self::Store(other),
        }
    }
}

/// The recurring job bound to one task.
#[derive(Debug, Clone)]
struct LiveJob {
    job_id: Uuid,
    schedule: String,
}

/// What a single firing of a task's job did. Consumed by [`log_firing`].
#[derive(Debug)]
enum FiringOutcome {
    Completed { collected: i32 },
    SkippedRunning,
    SkippedMissing,
    SkippedInactive,
    Failed(SchedulerError),
}

/// State shared with job closures. Holds no reference back to the scheduler.
struct Runner {
    tasks: Arc<dyn TaskStore>,
    extractor: Arc<Extractor>,
    locks: RunLocks,
}

impl Runner {
    /// Run the extraction for `task` and write its statistics.
    async fn execute(
        &self,
        task: &Task,
        next_run: impl std::future::Future<Output = Option<DateTime<Utc>>>,
    ) -> Result<RunOutcome, SchedulerError> {
        let seed = SearchSeed::from_task(task)?;
        let outcome = self.extractor.run(&seed).await?;
        let stats = RunStats {
            last_run: Utc::now(),
            next_run: next_run.await,
            profiles_collected: outcome.profiles_collected(),
        };
        self.tasks
            .record_run(task.id, &stats)
            .await
            .map_err(|e| SchedulerError::for_task(task.id, e))?;
        Ok(outcome)
    }

    async fn fire(
        &self,
        task_id: i64,
        correlation_id: Uuid,
        jobs: JobScheduler,
        job_id: Uuid,
    ) -> FiringOutcome {
        let Some(_guard) = self.locks.try_acquire(correlation_id) else {
            return FiringOutcome::SkippedRunning;
        };
        let claim = match self.tasks.try_claim_run(correlation_id).await {
            Ok(Some(claim)) => claim,
            Ok(None) => return FiringOutcome::SkippedRunning,
            Err(e) => return FiringOutcome::Failed(SchedulerError::Store(e)),
        };

        let outcome = self.fire_claimed(task_id, jobs, job_id).await;
        release_claim(task_id, claim).await;
        outcome
    }

    async fn fire_claimed(&self, task_id: i64, jobs: JobScheduler, job_id: Uuid) -> FiringOutcome {
        // Reload so edits made since scheduling apply to this firing.
        let task = match self.tasks.get_task(task_id).await {
            Ok(task) => task,
            Err(DbError::NotFound) => return FiringOutcome::SkippedMissing,
            Err(e) => return FiringOutcome::Failed(SchedulerError::Store(e)),
        };
        if !task.active {
            return FiringOutcome::SkippedInactive;
        }

        match self.execute(&task, next_tick(jobs, job_id)).await {
            Ok(outcome) => FiringOutcome::Completed {
                collected: outcome.profiles_collected(),
            },
            Err(e) => FiringOutcome::Failed(e),
        }
    }
}

async fn release_claim(task_id: i64, claim: RunClaim) {
    if let Err(e) = claim.release().await {
        tracing::warn!(task_id, error = %e, "scheduler: run claim release failed");
    }
}

fn log_firing(task_id: i64, outcome: &FiringOutcome) {
    match outcome {
        FiringOutcome::Completed { collected } => {
            tracing::info!(task_id, collected, "scheduler: task run complete");
        }
        FiringOutcome::SkippedRunning => {
            tracing::warn!(task_id, "scheduler: previous run still in flight; skipping firing");
        }
        FiringOutcome::SkippedMissing => {
            tracing::warn!(task_id, "scheduler: task no longer exists; skipping firing");
        }
        FiringOutcome::SkippedInactive => {
            tracing::info!(task_id, "scheduler: task inactive; skipping firing");
        }
        FiringOutcome::Failed(e) => {
            tracing::error!(task_id, error = %e, "scheduler: task run failed");
        }
    }
}

/// The trigger library's expression for a five-field cron schedule: a zero
/// seconds field is prepended.
fn trigger_expression(schedule: &str) -> Result<String, SchedulerError> {
    bizscout_core::validate_cron_shape(schedule)?;
    Ok(format!("0 {}", schedule.trim()))
}

fn invalid_schedule(schedule: &str, error: &JobSchedulerError) -> SchedulerError {
    SchedulerError::InvalidSchedule {
        expression: schedule.to_string(),
        reason: error.to_string(),
    }
}

/// Next firing of `job_id` as the trigger library computes it.
async fn next_tick(mut jobs: JobScheduler, job_id: Uuid) -> Option<DateTime<Utc>> {
    match jobs.next_tick_for_job(job_id).await {
        Ok(next) => next,
        Err(e) => {
            tracing::warn!(%job_id, error = %e, "scheduler: next tick unavailable");
            None
        }
    }
}

/// Fails with [`SchedulerError::InvalidSchedule`] unless the trigger library accepts `schedule`.
fn check_schedule(schedule: &str) -> Result<(), SchedulerError> {
    let expression = trigger_expression(schedule)?;
    Job::new_async(expression.as_str(), |_uuid, _lock| Box::pin(async {}))
        .map(|_| ())
        .map_err(|e| invalid_schedule(schedule, &e))
}

pub struct TaskScheduler {
    jobs: JobScheduler,
    runner: Arc<Runner>,
    live: Mutex<HashMap<Uuid, LiveJob>>,
}

impl TaskScheduler {
    /// # Errors
    ///
    /// Returns [`SchedulerError::Scheduler`] if the job scheduler cannot be created.
    pub async fn new(
        tasks: Arc<dyn TaskStore>,
        extractor: Arc<Extractor>,
    ) -> Result<Self, SchedulerError> {
        Ok(Self {
            jobs: JobScheduler::new().await?,
            runner: Arc::new(Runner {
                tasks,
                extractor,
                locks: RunLocks::default(),
            }),
            live: Mutex::new(HashMap::new()),
        })
    }

    #[must_use]
    pub fn tasks(&self) -> &Arc<dyn TaskStore> {
        &self.runner.tasks
    }

    // -----------------------------------------------------------------------
    // Task lifecycle
    // -----------------------------------------------------------------------

    /// Persist a new task and schedule it when active.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::InvalidInput`] or [`SchedulerError::InvalidSchedule`]
    /// when the draft is rejected (nothing is persisted), otherwise store or
    /// scheduler failures.
    pub async fn create(&self, draft: TaskDraft) -> Result<Task, SchedulerError> {
        let draft = draft.normalized()?;
        check_schedule(&draft.schedule)?;

        let mut task = self.runner.tasks.create_task(&draft).await?;
        if task.active {
            task.next_run = Some(self.schedule(&task).await?);
        }
        tracing::info!(task_id = task.id, active = task.active, "scheduler: task created");
        Ok(task)
    }

    /// Apply `patch` to task `id`, keeping its live job in step.
    ///
    /// A deactivated task is unscheduled before the patch is persisted, and
    /// scheduled again if the store then refuses the patch. A task that is
    /// active afterwards is rescheduled when its schedule changed or it was
    /// previously inactive.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::NotFound`] for an unknown id; validation errors leave
    /// the stored task and its live job untouched.
    pub async fn update(&self, id: i64, patch: TaskPatch) -> Result<Task, SchedulerError> {
        let existing = self
            .runner
            .tasks
            .get_task(id)
            .await
            .map_err(|e| SchedulerError::for_task(id, e))?;
        let patch = patch.normalized_against(&existing)?;
        if let Some(schedule) = &patch.schedule {
            check_schedule(schedule)?;
        }

        let now_active = patch.active.unwrap_or(existing.active);
        let reschedule = now_active && (patch.changes_schedule(&existing) || !existing.active);

        let deactivating = existing.active && !now_active;
        if deactivating {
            self.unschedule(existing.correlation_id).await?;
        }
        let mut task = match self.runner.tasks.update_task(id, &patch).await {
            Ok(task) => task,
            Err(e) => {
                if deactivating {
                    self.restore_job(&existing).await;
                }
                return Err(SchedulerError::for_task(id, e));
            }
        };
        if reschedule {
            task.next_run = Some(self.schedule(&task).await?);
        }
        tracing::info!(task_id = id, active = task.active, rescheduled = reschedule, "scheduler: task updated");
        Ok(task)
    }

    /// Unschedule and delete task `id`. A run already in flight is not cancelled.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::NotFound`] when the task does not exist.
    pub async fn delete(&self, id: i64) -> Result<(), SchedulerError> {
        let task = self
            .runner
            .tasks
            .get_task(id)
            .await
            .map_err(|e| SchedulerError::for_task(id, e))?;
        self.unschedule(task.correlation_id).await?;
        self.runner
            .tasks
            .delete_task(id)
            .await
            .map_err(|e| SchedulerError::for_task(id, e))?;
        tracing::info!(task_id = id, "scheduler: task deleted");
        Ok(())
    }

    /// Run task `id` immediately, outside its recurring trigger.
    ///
    /// # Errors
    ///
    /// - [`SchedulerError::NotFound`] for an unknown id.
    /// - [`SchedulerError::AlreadyRunning`] when a run of the task is in flight.
    /// - [`SchedulerError::Extraction`] when the run cannot start.
    pub async fn run_now(&self, id: i64) -> Result<RunOutcome, SchedulerError> {
        let task = self
            .runner
            .tasks
            .get_task(id)
            .await
            .map_err(|e| SchedulerError::for_task(id, e))?;
        let _guard = self
            .runner
            .locks
            .try_acquire(task.correlation_id)
            .ok_or(SchedulerError::AlreadyRunning { task_id: id })?;
        let claim = self
            .runner
            .tasks
            .try_claim_run(task.correlation_id)
            .await?
            .ok_or(SchedulerError::AlreadyRunning { task_id: id })?;

        tracing::info!(task_id = id, "scheduler: manual run started");
        let result = self
            .runner
            .execute(&task, std::future::ready(None))
            .await;
        release_claim(id, claim).await;
        let outcome = result?;
        tracing::info!(
            task_id = id,
            collected = outcome.profiles_collected(),
            "scheduler: manual run complete"
        );
        Ok(outcome)
    }

    // -----------------------------------------------------------------------
    // Live jobs
    // -----------------------------------------------------------------------

    /// Bind `task` to a recurring job, replacing any job it already has, and
    /// persist the next firing time.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::InvalidSchedule`] when the expression is rejected, or
    /// [`SchedulerError::Scheduler`] when the job scheduler refuses the change.
    /// Either way the task's existing job, if any, is left in place.
    pub async fn schedule(&self, task: &Task) -> Result<DateTime<Utc>, SchedulerError> {
        let job = self.build_job(task)?;
        let job_id = job.guid();

        let mut live = self.live.lock().await;
        // The replacement goes live before the previous job is removed.
        self.jobs.add(job).await?;
        let replaced = live.insert(
            task.correlation_id,
            LiveJob {
                job_id,
                schedule: task.schedule.clone(),
            },
        );
        if let Some(previous) = replaced {
            if let Err(e) = self.jobs.remove(&previous.job_id).await {
                live.insert(task.correlation_id, previous);
                if let Err(undo) = self.jobs.remove(&job_id).await {
                    tracing::error!(task_id = task.id, error = %undo, "scheduler: replacement job left behind");
                }
                return Err(e.into());
            }
        }
        drop(live);

        let next_run = match next_tick(self.jobs.clone(), job_id).await {
            Some(next) => next,
            None => {
                tracing::warn!(
                    task_id = task.id,
                    schedule = %task.schedule,
                    "scheduler: could not compute next run; assuming 24h"
                );
                Utc::now() + Duration::hours(24)
            }
        };
        self.runner
            .tasks
            .set_next_run(task.id, next_run)
            .await
            .map_err(|e| SchedulerError::for_task(task.id, e))?;

        tracing::info!(
            task_id = task.id,
            schedule = %task.schedule,
            next_run = %next_run,
            "scheduler: task scheduled"
        );
        Ok(next_run)
    }

    /// Stop and forget the job bound to `correlation_id`. No-op when none exists.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::Scheduler`] if the job scheduler refuses the removal.
    pub async fn unschedule(&self, correlation_id: Uuid) -> Result<(), SchedulerError> {
        let mut live = self.live.lock().await;
        if let Some(job) = live.remove(&correlation_id) {
            self.jobs.remove(&job.job_id).await?;
            tracing::info!(%correlation_id, schedule = %job.schedule, "scheduler: task unscheduled");
        }
        Ok(())
    }

    /// Schedule every active task. Returns how many were scheduled.
    ///
    /// A task whose stored schedule is rejected is logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Store`] if active tasks cannot be listed.
    pub async fn initialize(&self) -> Result<usize, SchedulerError> {
        let tasks = self.runner.tasks.list_tasks(TaskFilter::active_only()).await?;
        let mut scheduled = 0;
        for task in &tasks {
            match self.schedule(task).await {
                Ok(_) => scheduled += 1,
                Err(e) => {
                    tracing::error!(task_id = task.id, error = %e, "scheduler: failed to restore task");
                }
            }
        }
        tracing::info!(active = tasks.len(), scheduled, "scheduler: live jobs restored");
        Ok(scheduled)
    }

    /// # Errors
    ///
    /// Returns [`SchedulerError::Scheduler`] if the job scheduler fails to start.
    pub async fn start(&self) -> Result<(), SchedulerError> {
        self.jobs.start().await?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`SchedulerError::Scheduler`] if the job scheduler fails to stop cleanly.
    pub async fn shutdown(&self) -> Result<(), SchedulerError> {
        let mut jobs = self.jobs.clone();
        jobs.shutdown().await?;
        Ok(())
    }

    #[cfg(test)]
    pub async fn has_live_job(&self, correlation_id: Uuid) -> bool {
        self.live.lock().await.contains_key(&correlation_id)
    }

    pub async fn live_job_count(&self) -> usize {
        self.live.lock().await.len()
    }

    /// Put back the job of a task whose deactivation was not persisted.
    async fn restore_job(&self, task: &Task) {
        match self.schedule(task).await {
            Ok(_) => tracing::info!(task_id = task.id, "scheduler: job restored after failed update"),
            Err(e) => {
                tracing::error!(task_id = task.id, error = %e, "scheduler: active task left without a job");
            }
        }
    }

    fn build_job(&self, task: &Task) -> Result<Job, SchedulerError> {
        let expression = trigger_expression(&task.schedule)?;
        let runner = Arc::clone(&self.runner);
        let task_id = task.id;
        let correlation_id = task.correlation_id;

        Job::new_async(expression.as_str(), move |job_id, jobs| {
            let runner = Arc::clone(&runner);
            Box::pin(async move {
                tracing::debug!(task_id, "scheduler: task firing");
                let outcome = runner.fire(task_id, correlation_id, jobs, job_id).await;
                log_firing(task_id, &outcome);
            })
        })
        .map_err(|e| invalid_schedule(&task.schedule, &e))
    }
}
