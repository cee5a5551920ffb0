//! Extraction command handlers: ad-hoc search and single-account sync.
//!
//! Both go through the same [`Extractor`] the server uses, backed by the
//! configured Browserless endpoint and the Postgres profile store.

use std::sync::Arc;

use bizscout_core::{AppConfig, Candidate, Classifier, SearchSeed};
use bizscout_db::PgProfileStore;
use bizscout_extractor::{Extractor, ExtractorConfig};
use bizscout_scraper::BrowserlessLauncher;

pub(crate) fn build_extractor(pool: &sqlx::PgPool, config: &AppConfig) -> anyhow::Result<Extractor> {
    Ok(Extractor::new(
        Arc::new(BrowserlessLauncher::from_config(config)?),
        Arc::new(PgProfileStore::new(pool.clone())),
        Classifier::from_config(config),
        ExtractorConfig::from_app_config(config),
    ))
}

/// Run one extraction pass for the given terms and print what was accepted.
///
/// # Errors
///
/// Returns an error if the terms are rejected, the browser is unavailable, or
/// the run fails before any candidate is accepted.
pub(crate) async fn run_search(
    pool: &sqlx::PgPool,
    config: &AppConfig,
    keywords: Vec<String>,
    hashtags: Vec<String>,
    limit: i64,
) -> anyhow::Result<()> {
    let seed = SearchSeed::new(keywords, hashtags, limit)?;
    let extractor = build_extractor(pool, config)?;

    let outcome = extractor.run(&seed).await?;
    if outcome.candidates.is_empty() {
        println!("no business profiles found");
        return Ok(());
    }

    println!("{}", candidate_header());
    for candidate in &outcome.candidates {
        println!("{}", candidate_row(candidate));
    }
    println!(
        "\n{} accepted, {} persisted, {} failed to persist",
        outcome.candidates.len(),
        outcome.persisted.len(),
        outcome.failed_persists
    );
    Ok(())
}

/// # Errors
///
/// Returns an error if the username is invalid, the account cannot be read, or
/// the upsert fails.
pub(crate) async fn run_sync(
    pool: &sqlx::PgPool,
    config: &AppConfig,
    username: &str,
) -> anyhow::Result<()> {
    let extractor = build_extractor(pool, config)?;
    let profile = extractor.sync_username(username).await?;

    println!("company profile #{}: {}", profile.id, profile.name);
    if let Some(instagram) = &profile.instagram {
        println!(
            "  @{}  followers={}  business={}",
            instagram.username, instagram.followers_count, instagram.is_business_account
        );
    }
    println!("  website: {}", profile.website.as_deref().unwrap_or("-"));
    println!("  email:   {}", profile.email.as_deref().unwrap_or("-"));
    println!("  phone:   {}", profile.phone.as_deref().unwrap_or("-"));
    Ok(())
}

pub(crate) fn candidate_header() -> String {
    format!(
        "{:<32}{:>11}  {:<32}WEBSITE",
        "USERNAME", "FOLLOWERS", "EMAIL"
    )
}

pub(crate) fn candidate_row(candidate: &Candidate) -> String {
    format!(
        "{:<32}{:>11}  {:<32}{}",
        format!("@{}", candidate.username),
        candidate.followers_count,
        candidate.business_email.as_deref().unwrap_or("-"),
        candidate.external_url.as_deref().unwrap_or("-"),
    )
}
