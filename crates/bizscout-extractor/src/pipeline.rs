//! Search runs and single-account syncs.
//!
//! A run opens one browsing session, walks hashtag pages first and keyword
//! search pages second, and stops navigating as soon as the seed's limit of
//! accepted candidates is reached. Page-level failures are logged and
//! skipped; only a session that cannot be started fails the run.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use bizscout_core::{Candidate, Classifier, CompanyProfile, SearchSeed};
use bizscout_db::ProfileStore;
use bizscout_scraper::{
    absolute_url, account_url, collect_account_links, collect_post_links, extract_candidate,
    hashtag_url, keyword_search_url, resolve_post_author, username_from_href, BrowserLauncher,
    BrowserSession, HASHTAG_CONTENT_SELECTOR, SEARCH_CONTENT_SELECTOR,
};

use crate::config::ExtractorConfig;
use crate::error::ExtractorError;

/// Result of one search run.
#[derive(Debug, Clone, Default)]
pub struct RunOutcome {
    /// Accepted candidates in discovery order, including any whose persist failed.
    pub candidates: Vec<Candidate>,
    /// Profiles written for the accepted candidates.
    pub persisted: Vec<CompanyProfile>,
    pub failed_persists: usize,
}

impl RunOutcome {
    /// Number of accepted candidates, saturating at `i32::MAX`.
    #[must_use]
    pub fn profiles_collected(&self) -> i32 {
        i32::try_from(self.candidates.len()).unwrap_or(i32::MAX)
    }
}

pub struct Extractor {
    launcher: Arc<dyn BrowserLauncher>,
    profiles: Arc<dyn ProfileStore>,
    classifier: Classifier,
    config: ExtractorConfig,
}

impl std::fmt::Debug for Extractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Extractor")
            .field("classifier", &self.classifier)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Per-run accumulation. Never shared between runs.
struct RunState {
    limit: usize,
    deadline: Instant,
    deadline_hit: bool,
    accepted: Vec<Candidate>,
    accepted_names: HashSet<String>,
}

impl RunState {
    fn new(limit: usize, deadline: Instant) -> Self {
        Self {
            limit,
            deadline,
            deadline_hit: false,
            accepted: Vec::new(),
            accepted_names: HashSet::new(),
        }
    }

    fn quota_reached(&self) -> bool {
        self.accepted.len() >= self.limit
    }

    /// Whether another navigation is allowed: quota open and deadline not passed.
    fn may_navigate(&mut self) -> bool {
        if self.quota_reached() || self.deadline_hit {
            return false;
        }
        if Instant::now() >= self.deadline {
            self.deadline_hit = true;
            tracing::warn!(
                accepted = self.accepted.len(),
                limit = self.limit,
                "extractor: run deadline reached, returning partial results"
            );
            return false;
        }
        true
    }

    fn accept(&mut self, candidate: Candidate) {
        self.accepted_names.insert(candidate.username.clone());
        self.accepted.push(candidate);
    }
}

impl Extractor {
    #[must_use]
    pub fn new(
        launcher: Arc<dyn BrowserLauncher>,
        profiles: Arc<dyn ProfileStore>,
        classifier: Classifier,
        config: ExtractorConfig,
    ) -> Self {
        Self {
            launcher,
            profiles,
            classifier,
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Run a search for `seed`, persisting every accepted candidate.
    ///
    /// Returns at most `seed.limit` candidates. Fewer is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractorError::CapabilityUnavailable`] when no browsing
    /// session can be started. Page and persist failures are logged only.
    pub async fn run(&self, seed: &SearchSeed) -> Result<RunOutcome, ExtractorError> {
        let started = Instant::now();
        let mut session = self.open_session().await?;

        let mut state = RunState::new(seed.limit, started + self.config.run_deadline);
        self.collect_hashtags(session.get(), &seed.hashtags, &mut state)
            .await;
        if !state.quota_reached() {
            self.collect_keywords(session.get(), &seed.keywords, &mut state)
                .await;
        }
        session.close().await;

        let (persisted, failed_persists) = self.persist_all(&state.accepted).await;
        tracing::info!(
            accepted = state.accepted.len(),
            persisted = persisted.len(),
            failed_persists,
            limit = seed.limit,
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "extractor: run complete"
        );
        Ok(RunOutcome {
            candidates: state.accepted,
            persisted,
            failed_persists,
        })
    }

    /// Fetch one account and persist it whether or not it classifies as business.
    ///
    /// # Errors
    ///
    /// - [`ExtractorError::InvalidInput`] for an empty or malformed username.
    /// - [`ExtractorError::CapabilityUnavailable`] when no session can be started.
    /// - [`ExtractorError::Extraction`] when the account page fails to load or render.
    /// - [`ExtractorError::Store`] when the upsert fails.
    pub async fn sync_username(&self, username: &str) -> Result<CompanyProfile, ExtractorError> {
        let username = username.trim().trim_start_matches('@');
        if username.is_empty() {
            return Err(ExtractorError::InvalidInput(
                "username must not be empty".to_string(),
            ));
        }
        if username_from_href(&format!("/{username}/")).as_deref() != Some(username) {
            return Err(ExtractorError::InvalidInput(format!(
                "'{username}' is not a valid account name"
            )));
        }

        let mut session = self.open_session().await?;
        let fetched = self.fetch_account(session.get(), username).await;
        session.close().await;

        let candidate = fetched.map_err(ExtractorError::Extraction)?;
        let profile = self.profiles.upsert_instagram_profile(&candidate).await?;
        tracing::info!(
            username = %candidate.username,
            company_profile_id = profile.id,
            business = self.classifier.is_business(&candidate),
            "extractor: account synced"
        );
        Ok(profile)
    }

    async fn open_session(&self) -> Result<SessionGuard, ExtractorError> {
        let session = self
            .launcher
            .launch()
            .await
            .map_err(ExtractorError::CapabilityUnavailable)?;
        Ok(SessionGuard {
            session,
            closed: false,
        })
    }

    async fn collect_hashtags(
        &self,
        session: &mut dyn BrowserSession,
        hashtags: &[String],
        state: &mut RunState,
    ) {
        let mut authors_seen: HashSet<String> = HashSet::new();

        for hashtag in hashtags {
            if !state.may_navigate() {
                return;
            }
            let url = hashtag_url(&self.config.base_url, hashtag);
            if let Err(e) = session
                .navigate(&url, self.config.navigation_timeout)
                .await
            {
                tracing::warn!(hashtag = %hashtag, error = %e, "extractor: hashtag page failed");
                continue;
            }
            if let Err(e) = session
                .wait_for_element(HASHTAG_CONTENT_SELECTOR, self.config.content_timeout)
                .await
            {
                tracing::warn!(hashtag = %hashtag, error = %e, "extractor: hashtag page empty");
                continue;
            }
            let posts = match collect_post_links(&*session) {
                Ok(posts) => posts,
                Err(e) => {
                    tracing::warn!(hashtag = %hashtag, error = %e, "extractor: post links unreadable");
                    continue;
                }
            };
            tracing::debug!(hashtag = %hashtag, posts = posts.len(), "extractor: hashtag page loaded");

            for post in posts {
                if !state.may_navigate() {
                    return;
                }
                let post_url = absolute_url(&self.config.base_url, &post);
                if let Err(e) = session.navigate(&post_url, self.config.item_timeout).await {
                    tracing::warn!(url = %post_url, error = %e, "extractor: post page failed");
                    continue;
                }
                let author = match resolve_post_author(&*session) {
                    Ok(Some(author)) => author,
                    Ok(None) => {
                        tracing::debug!(url = %post_url, "extractor: post has no author link");
                        continue;
                    }
                    Err(e) => {
                        tracing::warn!(url = %post_url, error = %e, "extractor: post author unreadable");
                        continue;
                    }
                };
                if !authors_seen.insert(author.clone()) {
                    continue;
                }
                self.visit_account(session, &author, state).await;
            }
        }
    }

    async fn collect_keywords(
        &self,
        session: &mut dyn BrowserSession,
        keywords: &[String],
        state: &mut RunState,
    ) {
        let mut visited: HashSet<String> = HashSet::new();

        for keyword in keywords {
            if !state.may_navigate() {
                return;
            }
            let url = keyword_search_url(&self.config.base_url, keyword);
            if let Err(e) = session
                .navigate(&url, self.config.navigation_timeout)
                .await
            {
                tracing::warn!(keyword = %keyword, error = %e, "extractor: search page failed");
                continue;
            }
            if let Err(e) = session
                .wait_for_element(SEARCH_CONTENT_SELECTOR, self.config.content_timeout)
                .await
            {
                tracing::warn!(keyword = %keyword, error = %e, "extractor: search page empty");
                continue;
            }
            let usernames = match collect_account_links(&*session) {
                Ok(usernames) => usernames,
                Err(e) => {
                    tracing::warn!(keyword = %keyword, error = %e, "extractor: account links unreadable");
                    continue;
                }
            };

            for username in usernames {
                if state.accepted_names.contains(&username) || !visited.insert(username.clone()) {
                    continue;
                }
                if !state.may_navigate() {
                    return;
                }
                self.visit_account(session, &username, state).await;
            }
        }
    }

    /// Open `username`'s page, extract it and accept it if it classifies as business.
    async fn visit_account(
        &self,
        session: &mut dyn BrowserSession,
        username: &str,
        state: &mut RunState,
    ) {
        if !state.may_navigate() {
            return;
        }
        match self.fetch_account(session, username).await {
            Ok(candidate) if self.classifier.is_business(&candidate) => {
                tracing::debug!(username = %username, "extractor: candidate accepted");
                state.accept(candidate);
            }
            Ok(_) => tracing::debug!(username = %username, "extractor: candidate not a business"),
            Err(e) => {
                tracing::warn!(username = %username, error = %e, "extractor: account extraction failed");
            }
        }
    }

    async fn fetch_account(
        &self,
        session: &mut dyn BrowserSession,
        username: &str,
    ) -> Result<Candidate, bizscout_scraper::ScraperError> {
        let url = account_url(&self.config.base_url, username);
        session.navigate(&url, self.config.item_timeout).await?;
        extract_candidate(session, username, self.config.content_timeout).await
    }

    async fn persist_all(&self, accepted: &[Candidate]) -> (Vec<CompanyProfile>, usize) {
        let mut persisted = Vec::with_capacity(accepted.len());
        let mut failed = 0;
        for candidate in accepted {
            match self.profiles.upsert_instagram_profile(candidate).await {
                Ok(profile) => persisted.push(profile),
                Err(e) => {
                    failed += 1;
                    tracing::warn!(
                        username = %candidate.username,
                        error = %e,
                        "extractor: failed to persist candidate"
                    );
                }
            }
        }
        (persisted, failed)
    }
}

/// A run's browsing session. Closed explicitly when the run finishes; if the
/// run future is dropped first, the session is abandoned instead.
struct SessionGuard {
    session: Box<dyn BrowserSession>,
    closed: bool,
}

impl SessionGuard {
    fn get(&mut self) -> &mut dyn BrowserSession {
        self.session.as_mut()
    }

    /// Close the session, logging rather than propagating a failure.
    async fn close(mut self) {
        let result = self.session.close().await;
        self.closed = true;
        if let Err(e) = result {
            tracing::warn!(error = %e, "extractor: failed to close browsing session");
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if !self.closed {
            tracing::warn!("extractor: run dropped before finishing; abandoning browsing session");
            self.session.abandon();
        }
    }
}
