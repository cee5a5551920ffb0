//! The process-wide default search, driven by the stored search settings.

use std::sync::Arc;

use tokio_cron_scheduler::Job;
use uuid::Uuid;

use bizscout_core::SearchSeed;
use bizscout_db::SettingsStore;

use super::{invalid_schedule, trigger_expression, Runner, SchedulerError, TaskScheduler};

/// Run-lock key for the default search; no task has the nil correlation id.
const DEFAULT_SEARCH_KEY: Uuid = Uuid::nil();

#[derive(Debug)]
pub(crate) enum DefaultSearchOutcome {
    Completed { collected: i32 },
    Disabled,
    SkippedRunning,
    Failed(SchedulerError),
}

impl TaskScheduler {
    /// Register the recurring default search on `schedule` (five-field cron, UTC).
    ///
    /// # Errors
    ///
    /// [`SchedulerError::InvalidSchedule`] when `schedule` is rejected, or
    /// [`SchedulerError::Scheduler`] when the job cannot be added.
    pub async fn register_default_search(
        &self,
        settings: Arc<dyn SettingsStore>,
        schedule: &str,
    ) -> Result<Uuid, SchedulerError> {
        let expression = trigger_expression(schedule)?;
        let runner = Arc::clone(&self.runner);

        let job = Job::new_async(expression.as_str(), move |_uuid, _lock| {
            let runner = Arc::clone(&runner);
            let settings = Arc::clone(&settings);
            Box::pin(async move {
                let outcome = run_default_search(&runner, settings.as_ref()).await;
                log_default_search(&outcome);
            })
        })
        .map_err(|e| invalid_schedule(schedule, &e))?;

        let job_id = self.jobs.add(job).await?;
        tracing::info!(schedule, "scheduler: default search registered");
        Ok(job_id)
    }
}

/// One pass of the default search, as a firing runs it.
pub(super) async fn run_default_search(
    runner: &Runner,
    settings: &dyn SettingsStore,
) -> DefaultSearchOutcome {
    let Some(_guard) = runner.locks.try_acquire(DEFAULT_SEARCH_KEY) else {
        return DefaultSearchOutcome::SkippedRunning;
    };

    let settings = match settings.get_search_settings().await {
        Ok(settings) => settings,
        Err(e) => return DefaultSearchOutcome::Failed(SchedulerError::Store(e)),
    };
    if !settings.enabled {
        return DefaultSearchOutcome::Disabled;
    }
    let seed = match SearchSeed::from_settings(&settings) {
        Ok(seed) => seed,
        Err(e) => return DefaultSearchOutcome::Failed(e.into()),
    };

    match runner.extractor.run(&seed).await {
        Ok(outcome) => DefaultSearchOutcome::Completed {
            collected: outcome.profiles_collected(),
        },
        Err(e) => DefaultSearchOutcome::Failed(e.into()),
    }
}

fn log_default_search(outcome: &DefaultSearchOutcome) {
    match outcome {
        DefaultSearchOutcome::Completed { collected } => {
            tracing::info!(collected, "scheduler: default search complete");
        }
        DefaultSearchOutcome::Disabled => {
            tracing::debug!("scheduler: default search disabled; skipping");
        }
        DefaultSearchOutcome::SkippedRunning => {
            tracing::warn!("scheduler: default search still running; skipping firing");
        }
        DefaultSearchOutcome::Failed(e) => {
            tracing::error!(error = %e, "scheduler: default search failed");
        }
    }
}
