//! In-process store implementations with the same semantics as the Postgres
//! ones. Used by tests and by offline CLI runs.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use uuid::Uuid;

use bizscout_core::{
    Candidate, CompanyProfile, InstagramProfile, ProfileListQuery, ProfilePage, RunStats,
    SearchSettings, Task, TaskDraft, TaskFilter, TaskPatch, INSTAGRAM_SOURCE,
};

use crate::store::{ProfileStore, SettingsStore, TaskStore};
use crate::{DbError, RunClaim};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct TaskTable {
    next_id: i64,
    rows: BTreeMap<i64, Task>,
    rejecting_updates: bool,
}

#[derive(Debug, Default)]
pub struct MemoryTaskStore {
    inner: Mutex<TaskTable>,
    claims: Arc<Mutex<HashSet<Uuid>>>,
}

impl MemoryTaskStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later `update_task` fail with [`DbError::Rejected`].
    pub fn reject_updates(&self) {
        lock(&self.inner).rejecting_updates = true;
    }
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    async fn list_tasks(&self, filter: TaskFilter) -> Result<Vec<Task>, DbError> {
        let table = lock(&self.inner);
        Ok(table
            .rows
            .values()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect())
    }

    async fn get_task(&self, id: i64) -> Result<Task, DbError> {
        lock(&self.inner)
            .rows
            .get(&id)
            .cloned()
            .ok_or(DbError::NotFound)
    }

    async fn create_task(&self, draft: &TaskDraft) -> Result<Task, DbError> {
        let mut table = lock(&self.inner);
        table.next_id += 1;
        let now = Utc::now();
        let task = Task {
            id: table.next_id,
            name: draft.name.clone(),
            keywords: draft.keywords.clone(),
            hashtags: draft.hashtags.clone(),
            limit: draft.limit,
            schedule: draft.schedule.clone(),
            active: draft.active,
            correlation_id: Uuid::new_v4(),
            last_run: None,
            next_run: None,
            profiles_collected: 0,
            created_at: now,
            updated_at: now,
        };
        table.rows.insert(task.id, task.clone());
        Ok(task)
    }

    async fn update_task(&self, id: i64, patch: &TaskPatch) -> Result<Task, DbError> {
        let mut table = lock(&self.inner);
        if table.rejecting_updates {
            return Err(DbError::Rejected(format!("update of task {id} refused")));
        }
        let task = table.rows.get_mut(&id).ok_or(DbError::NotFound)?;
        if let Some(name) = &patch.name {
            task.name.clone_from(name);
        }
        if let Some(keywords) = &patch.keywords {
            task.keywords.clone_from(keywords);
        }
        if let Some(hashtags) = &patch.hashtags {
            task.hashtags.clone_from(hashtags);
        }
        if let Some(limit) = patch.limit {
            task.limit = limit;
        }
        if let Some(schedule) = &patch.schedule {
            task.schedule.clone_from(schedule);
        }
        if let Some(active) = patch.active {
            task.active = active;
        }
        task.updated_at = Utc::now();
        Ok(task.clone())
    }

    async fn delete_task(&self, id: i64) -> Result<(), DbError> {
        lock(&self.inner)
            .rows
            .remove(&id)
            .map(|_| ())
            .ok_or(DbError::NotFound)
    }

    async fn record_run(&self, id: i64, stats: &RunStats) -> Result<(), DbError> {
        let mut table = lock(&self.inner);
        let task = table.rows.get_mut(&id).ok_or(DbError::NotFound)?;
        task.last_run = Some(stats.last_run);
        if stats.next_run.is_some() {
            task.next_run = stats.next_run;
        }
        task.profiles_collected = stats.profiles_collected;
        task.updated_at = Utc::now();
        Ok(())
    }

    async fn set_next_run(&self, id: i64, next_run: DateTime<Utc>) -> Result<(), DbError> {
        let mut table = lock(&self.inner);
        let task = table.rows.get_mut(&id).ok_or(DbError::NotFound)?;
        task.next_run = Some(next_run);
        task.updated_at = Utc::now();
        Ok(())
    }

    async fn try_claim_run(&self, correlation_id: Uuid) -> Result<Option<RunClaim>, DbError> {
        Ok(RunClaim::in_memory(&self.claims, correlation_id))
    }
}

// ---------------------------------------------------------------------------
// Profiles
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct ProfileTable {
    next_id: i64,
    rows: BTreeMap<i64, CompanyProfile>,
    by_username: HashMap<String, i64>,
    rejected: HashSet<String>,
}

#[derive(Debug, Default)]
pub struct MemoryProfileStore {
    inner: Mutex<ProfileTable>,
}

impl MemoryProfileStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every upsert of `username` fail with [`DbError::Rejected`].
    pub fn reject_username(&self, username: &str) {
        lock(&self.inner).rejected.insert(username.to_string());
    }

    /// Store an aggregate whose top-level fields come from another source.
    pub fn insert_foreign(&self, name: &str, primary_source: &str) -> CompanyProfile {
        let mut table = lock(&self.inner);
        table.next_id += 1;
        let now = Utc::now();
        let profile = CompanyProfile {
            id: table.next_id,
            name: name.to_string(),
            description: None,
            website: None,
            email: None,
            phone: None,
            primary_source: primary_source.to_string(),
            data_sources: json!({ primary_source: { "name": name } }),
            instagram: None,
            last_updated: now,
            created_at: now,
        };
        table.rows.insert(profile.id, profile.clone());
        profile
    }

    /// Attach the aggregate `company_id` to an Instagram username.
    pub fn link_username(&self, company_id: i64, username: &str) {
        lock(&self.inner)
            .by_username
            .insert(username.to_string(), company_id);
    }

    #[must_use]
    pub fn get(&self, username: &str) -> Option<CompanyProfile> {
        let table = lock(&self.inner);
        let id = table.by_username.get(username)?;
        table.rows.get(id).cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.inner).rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn upsert_instagram_profile(
        &self,
        candidate: &Candidate,
    ) -> Result<CompanyProfile, DbError> {
        let mut table = lock(&self.inner);
        if table.rejected.contains(&candidate.username) {
            return Err(DbError::Rejected(format!(
                "upsert of '{}' refused",
                candidate.username
            )));
        }

        let now = Utc::now();
        let instagram = InstagramProfile::from_candidate(candidate, now);
        let source_entry = json!({ "username": candidate.username, "last_synced": now });
        let description = Some(candidate.biography.clone()).filter(|b| !b.trim().is_empty());

        if let Some(id) = table.by_username.get(&candidate.username).copied() {
            let profile = table.rows.get_mut(&id).ok_or(DbError::NotFound)?;
            if profile.primary_source == INSTAGRAM_SOURCE {
                profile.name = candidate.display_name().to_string();
                profile.description = description;
                profile.website.clone_from(&candidate.external_url);
                profile.email.clone_from(&candidate.business_email);
                profile.phone.clone_from(&candidate.business_phone);
            }
            match profile.data_sources.as_object_mut() {
                Some(sources) => {
                    sources.insert(INSTAGRAM_SOURCE.to_string(), source_entry);
                }
                None => profile.data_sources = json!({ INSTAGRAM_SOURCE: source_entry }),
            }
            profile.instagram = Some(instagram);
            profile.last_updated = now;
            return Ok(profile.clone());
        }

        table.next_id += 1;
        let profile = CompanyProfile {
            id: table.next_id,
            name: candidate.display_name().to_string(),
            description,
            website: candidate.external_url.clone(),
            email: candidate.business_email.clone(),
            phone: candidate.business_phone.clone(),
            primary_source: INSTAGRAM_SOURCE.to_string(),
            data_sources: json!({ INSTAGRAM_SOURCE: source_entry }),
            instagram: Some(instagram),
            last_updated: now,
            created_at: now,
        };
        table
            .by_username
            .insert(candidate.username.clone(), profile.id);
        table.rows.insert(profile.id, profile.clone());
        Ok(profile)
    }

    async fn list_company_profiles(
        &self,
        query: &ProfileListQuery,
    ) -> Result<ProfilePage, DbError> {
        let table = lock(&self.inner);
        let mut matching: Vec<&CompanyProfile> = table
            .rows
            .values()
            .filter(|p| {
                query
                    .source
                    .as_deref()
                    .is_none_or(|s| p.data_sources.get(s).is_some())
            })
            .collect();
        matching.sort_by(|a, b| {
            b.last_updated
                .cmp(&a.last_updated)
                .then_with(|| b.id.cmp(&a.id))
        });

        let total = i64::try_from(matching.len()).unwrap_or(i64::MAX);
        let offset = usize::try_from(query.offset()).unwrap_or(usize::MAX);
        let page_size = usize::try_from(query.page_size).unwrap_or(usize::MAX);
        let items = matching
            .into_iter()
            .skip(offset)
            .take(page_size)
            .cloned()
            .collect();

        Ok(ProfilePage {
            items,
            page: query.page,
            page_size: query.page_size,
            total,
        })
    }
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    inner: Mutex<Option<SearchSettings>>,
}

impl MemorySettingsStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the stored record, as an operator editing it would.
    pub fn put(&self, settings: SearchSettings) {
        *lock(&self.inner) = Some(settings);
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn ensure_search_settings(
        &self,
        defaults: &SearchSettings,
    ) -> Result<SearchSettings, DbError> {
        Ok(lock(&self.inner).get_or_insert_with(|| defaults.clone()).clone())
    }

    async fn get_search_settings(&self) -> Result<SearchSettings, DbError> {
        lock(&self.inner).clone().ok_or(DbError::NotFound)
    }
}
