//! Persisted definitions of recurring extraction work.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::CoreError;

/// A persisted extraction task.
///
/// `correlation_id` is generated once at creation and binds the task to its
/// live trigger for its whole lifetime. `last_run`, `next_run` and
/// `profiles_collected` are written only when the task runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub name: String,
    pub keywords: Vec<String>,
    pub hashtags: Vec<String>,
    pub limit: i32,
    pub schedule: String,
    pub active: bool,
    pub correlation_id: Uuid,
    pub last_run: Option<DateTime<Utc>>,
    pub next_run: Option<DateTime<Utc>>,
    pub profiles_collected: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied when creating a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDraft {
    pub name: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub hashtags: Vec<String>,
    pub limit: i32,
    pub schedule: String,
    #[serde(default)]
    pub active: bool,
}

/// Sparse update. `None` leaves the stored value unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskPatch {
    pub name: Option<String>,
    pub keywords: Option<Vec<String>>,
    pub hashtags: Option<Vec<String>>,
    pub limit: Option<i32>,
    pub schedule: Option<String>,
    pub active: Option<bool>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskFilter {
    pub active: Option<bool>,
}

impl TaskFilter {
    #[must_use]
    pub fn active_only() -> Self {
        Self { active: Some(true) }
    }

    #[must_use]
    pub fn matches(&self, task: &Task) -> bool {
        self.active.is_none_or(|active| task.active == active)
    }
}

/// Statistics written after a run completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunStats {
    pub last_run: DateTime<Utc>,
    pub next_run: Option<DateTime<Utc>>,
    pub profiles_collected: i32,
}

impl TaskDraft {
    /// Trim the name and drop blank keywords/hashtags, then validate.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidInput`] when the name is blank, no keyword
    /// or hashtag remains, or `limit` is not positive, and
    /// [`CoreError::InvalidCron`] when the schedule is not five fields.
    pub fn normalized(self) -> Result<Self, CoreError> {
        let draft = Self {
            name: self.name.trim().to_string(),
            keywords: clean_terms(self.keywords),
            hashtags: clean_terms(self.hashtags),
            limit: self.limit,
            schedule: self.schedule.trim().to_string(),
            active: self.active,
        };

        if draft.name.is_empty() {
            return Err(CoreError::InvalidInput("name is required".to_string()));
        }
        validate_terms(&draft.keywords, &draft.hashtags)?;
        validate_limit(draft.limit)?;
        validate_cron_shape(&draft.schedule)?;
        Ok(draft)
    }
}

impl TaskPatch {
    /// Normalize the present fields and check that the patched task stays valid.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError`] under the same rules as [`TaskDraft::normalized`],
    /// evaluated against the task as it would look after the patch.
    pub fn normalized_against(self, existing: &Task) -> Result<Self, CoreError> {
        let patch = Self {
            name: self.name.map(|n| n.trim().to_string()),
            keywords: self.keywords.map(clean_terms),
            hashtags: self.hashtags.map(clean_terms),
            limit: self.limit,
            schedule: self.schedule.map(|s| s.trim().to_string()),
            active: self.active,
        };

        if patch.name.as_deref().is_some_and(str::is_empty) {
            return Err(CoreError::InvalidInput("name must not be blank".to_string()));
        }
        validate_terms(
            patch.keywords.as_ref().unwrap_or(&existing.keywords),
            patch.hashtags.as_ref().unwrap_or(&existing.hashtags),
        )?;
        if let Some(limit) = patch.limit {
            validate_limit(limit)?;
        }
        if let Some(schedule) = &patch.schedule {
            validate_cron_shape(schedule)?;
        }
        Ok(patch)
    }

    /// Whether applying this patch changes the stored schedule string.
    #[must_use]
    pub fn changes_schedule(&self, existing: &Task) -> bool {
        self.schedule
            .as_deref()
            .is_some_and(|s| s != existing.schedule)
    }
}

/// Check that `expression` is a standard five-field cron expression.
///
/// Only the shape is checked here; the trigger library performs the full parse.
///
/// # Errors
///
/// Returns [`CoreError::InvalidCron`] when the field count is not five or a
/// field contains characters no cron dialect accepts.
pub fn validate_cron_shape(expression: &str) -> Result<(), CoreError> {
    let fields: Vec<&str> = expression.split_whitespace().collect();
    if fields.len() != 5 {
        return Err(CoreError::InvalidCron {
            expression: expression.to_string(),
            reason: format!("expected 5 fields, found {}", fields.len()),
        });
    }

    let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '*' | ',' | '-' | '/' | '?');
    if let Some(bad) = fields.iter().find(|f| !f.chars().all(allowed)) {
        return Err(CoreError::InvalidCron {
            expression: expression.to_string(),
            reason: format!("unexpected characters in field '{bad}'"),
        });
    }
    Ok(())
}

fn clean_terms(terms: Vec<String>) -> Vec<String> {
    terms
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

fn validate_terms(keywords: &[String], hashtags: &[String]) -> Result<(), CoreError> {
    if keywords.is_empty() && hashtags.is_empty() {
        return Err(CoreError::InvalidInput(
            "at least one keyword or hashtag is required".to_string(),
        ));
    }
    Ok(())
}

fn validate_limit(limit: i32) -> Result<(), CoreError> {
    if limit <= 0 {
        return Err(CoreError::InvalidInput(format!(
            "limit must be greater than zero, got {limit}"
        )));
    }
    Ok(())
}

#[cfg(test)]
#[path = "tasks_test.rs"]
mod tests;
