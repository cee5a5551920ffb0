//! Task command handlers for the CLI.
//!
//! `run` executes a stored task once, outside any live schedule. It takes the
//! same run claim as the server's scheduler, so it refuses to start while a
//! firing or run-now of the task is in flight. The task's `next_run` is left
//! as the server last computed it.

use chrono::{DateTime, Utc};
use clap::Subcommand;

use bizscout_core::{AppConfig, RunStats, SearchSeed, Task, TaskFilter};
use bizscout_db::{PgTaskStore, TaskStore};
use bizscout_extractor::{Extractor, RunOutcome};

/// Sub-commands available under `tasks`.
#[derive(Debug, Subcommand)]
pub enum TasksCommands {
    /// List stored tasks
    List {
        /// Only active tasks
        #[arg(long)]
        active: bool,
    },
    /// Run one task now and record its statistics
    Run { id: i64 },
}

pub(crate) async fn run_tasks(
    pool: &sqlx::PgPool,
    config: &AppConfig,
    command: TasksCommands,
) -> anyhow::Result<()> {
    let store = PgTaskStore::new(pool.clone());
    match command {
        TasksCommands::List { active } => {
            let filter = if active {
                TaskFilter::active_only()
            } else {
                TaskFilter::default()
            };
            list_tasks(&store, filter).await
        }
        TasksCommands::Run { id } => run_task(pool, config, &store, id).await,
    }
}

async fn list_tasks(store: &dyn TaskStore, filter: TaskFilter) -> anyhow::Result<()> {
    let tasks = store.list_tasks(filter).await?;
    if tasks.is_empty() {
        println!("no tasks found");
        return Ok(());
    }

    println!("{}", task_header());
    for task in &tasks {
        println!("{}", task_row(task));
    }
    Ok(())
}

async fn run_task(
    pool: &sqlx::PgPool,
    config: &AppConfig,
    store: &dyn TaskStore,
    id: i64,
) -> anyhow::Result<()> {
    let extractor = crate::extract::build_extractor(pool, config)?;
    let (task, outcome) = execute_task(store, &extractor, id).await?;

    println!(
        "task {id} ({}): {} profiles collected, {} failed to persist",
        task.name,
        outcome.profiles_collected(),
        outcome.failed_persists
    );
    Ok(())
}

/// Run task `id` once under its run claim and record its statistics.
///
/// # Errors
///
/// Returns an error if the task does not exist, its terms are rejected, a run
/// of the same task is already in flight anywhere, or the extraction or the
/// statistics write fails.
pub(crate) async fn execute_task(
    store: &dyn TaskStore,
    extractor: &Extractor,
    id: i64,
) -> anyhow::Result<(Task, RunOutcome)> {
    let task = store
        .get_task(id)
        .await
        .map_err(|e| anyhow::anyhow!("task {id}: {e}"))?;
    let seed = SearchSeed::from_task(&task)?;
    let Some(claim) = store.try_claim_run(task.correlation_id).await? else {
        anyhow::bail!("task {id} is already running");
    };

    tracing::info!(task_id = id, name = %task.name, "running task");
    let result = run_and_record(store, extractor, id, &seed).await;
    if let Err(e) = claim.release().await {
        tracing::warn!(task_id = id, error = %e, "run claim release failed");
    }
    let outcome = result?;
    Ok((task, outcome))
}

async fn run_and_record(
    store: &dyn TaskStore,
    extractor: &Extractor,
    id: i64,
    seed: &SearchSeed,
) -> anyhow::Result<RunOutcome> {
    let outcome = extractor.run(seed).await?;
    store
        .record_run(
            id,
            &RunStats {
                last_run: Utc::now(),
                next_run: None,
                profiles_collected: outcome.profiles_collected(),
            },
        )
        .await?;
    Ok(outcome)
}

pub(crate) fn fmt_datetime(value: Option<DateTime<Utc>>) -> String {
    value.map_or_else(|| "-".to_string(), |d| d.format("%Y-%m-%d %H:%M").to_string())
}

pub(crate) fn task_header() -> String {
    format!(
        "{:<6}{:<24}{:<16}{:<8}{:<18}{:<18}COLLECTED",
        "ID", "NAME", "SCHEDULE", "ACTIVE", "LAST RUN", "NEXT RUN"
    )
}

pub(crate) fn task_row(task: &Task) -> String {
    format!(
        "{:<6}{:<24}{:<16}{:<8}{:<18}{:<18}{}",
        task.id,
        crate::profiles::truncate(&task.name, 21),
        task.schedule,
        if task.active { "yes" } else { "no" },
        fmt_datetime(task.last_run),
        fmt_datetime(task.next_run),
        task.profiles_collected
    )
}
