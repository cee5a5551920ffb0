//! Offline pipeline tests: a `StaticBrowser` serves fixed pages and a
//! `MemoryProfileStore` stands in for Postgres.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bizscout_core::{Classifier, SearchSeed};
use bizscout_db::MemoryProfileStore;
use bizscout_extractor::{Extractor, ExtractorConfig, ExtractorError};
use bizscout_scraper::{BrowserLauncher, BrowserSession, PageSnapshot, ScraperError, StaticBrowser};

const BASE: &str = "https://ig.test";

fn config() -> ExtractorConfig {
    ExtractorConfig {
        base_url: BASE.to_string(),
        navigation_timeout: Duration::from_secs(1),
        item_timeout: Duration::from_secs(1),
        content_timeout: Duration::from_secs(1),
        run_deadline: Duration::from_secs(60),
    }
}

fn extractor(browser: &StaticBrowser, store: &Arc<MemoryProfileStore>) -> Extractor {
    extractor_with(browser, store, config())
}

fn extractor_with(
    browser: &StaticBrowser,
    store: &Arc<MemoryProfileStore>,
    config: ExtractorConfig,
) -> Extractor {
    Extractor::new(
        Arc::new(browser.clone()),
        store.clone(),
        Classifier::default(),
        config,
    )
}

fn seed(keywords: &[&str], hashtags: &[&str], limit: i64) -> SearchSeed {
    SearchSeed::new(
        keywords.iter().map(ToString::to_string).collect(),
        hashtags.iter().map(ToString::to_string).collect(),
        limit,
    )
    .unwrap()
}

fn business_account(username: &str) -> String {
    format!(
        r#"<html><body><header><img src="https://cdn.test/{username}.jpg"><section>
            <h2>{username} Ltd</h2>
            <div><span>Official store</span></div>
            <ul><li>40 posts</li><li>2,000 followers</li><li>12 following</li></ul>
            <a href="https://{username}.example">site</a>
        </section></header></body></html>"#
    )
}

fn personal_account(username: &str) -> String {
    format!(
        r#"<html><body><header><section>
            <h2>{username}</h2>
            <ul><li>3 posts</li><li>50 followers</li><li>80 following</li></ul>
        </section></header></body></html>"#
    )
}

fn post_page(author: &str) -> String {
    format!(r#"<html><body><a href="/{author}/" role="link">{author}</a></body></html>"#)
}

/// A hashtag page with `authors.len()` posts, post `i` authored by `authors[i]`,
/// plus each post page and a business account page for every author.
fn with_hashtag(mut browser: StaticBrowser, tag: &str, authors: &[String]) -> StaticBrowser {
    let links: String = (0..authors.len())
        .map(|i| format!(r#"<a href="/p/{tag}{i}/">post</a>"#))
        .collect();
    browser = browser.with_page(
        format!("{BASE}/explore/tags/{tag}/"),
        format!("<html><body><article>{links}</article></body></html>"),
    );
    for (i, author) in authors.iter().enumerate() {
        browser = browser
            .with_page(format!("{BASE}/p/{tag}{i}/"), post_page(author))
            .with_page(format!("{BASE}/{author}/"), business_account(author));
    }
    browser
}

fn authors(tag: &str, n: usize) -> Vec<String> {
    (0..n).map(|i| format!("{tag}_acct_{i}")).collect()
}

// ---------------------------------------------------------------------------
// Quota and ordering
// ---------------------------------------------------------------------------

#[tokio::test]
async fn run_stops_navigating_once_the_limit_is_reached() {
    let mut browser = StaticBrowser::new();
    for tag in ["alpha", "beta", "gamma"] {
        browser = with_hashtag(browser, tag, &authors(tag, 10));
    }
    let store = Arc::new(MemoryProfileStore::new());

    let outcome = extractor(&browser, &store)
        .run(&seed(&[], &["alpha", "beta", "gamma"], 5))
        .await
        .expect("run should succeed");

    assert_eq!(outcome.candidates.len(), 5);
    assert_eq!(outcome.persisted.len(), 5);
    assert_eq!(outcome.profiles_collected(), 5);
    assert_eq!(store.len(), 5);

    // One hashtag page, then a post page and an account page per accepted candidate.
    let navigations = browser.navigations();
    assert_eq!(navigations.len(), 11, "navigations: {navigations:?}");
    assert_eq!(navigations.last().unwrap(), &format!("{BASE}/alpha_acct_4/"));
    assert!(navigations.iter().all(|url| !url.contains("beta")));
    assert_eq!(browser.open_sessions(), 0);
}

#[tokio::test]
async fn hashtags_are_walked_before_keywords() {
    let browser = with_hashtag(StaticBrowser::new(), "alpha", &authors("alpha", 1))
        .with_page(
            format!("{BASE}/explore/search/keyword/?q=design"),
            r#"<html><body><a href="/alpha_acct_0/">a</a><a href="/kw_shop/">k</a></body></html>"#,
        )
        .with_page(format!("{BASE}/kw_shop/"), business_account("kw_shop"));
    let store = Arc::new(MemoryProfileStore::new());

    let outcome = extractor(&browser, &store)
        .run(&seed(&["design"], &["alpha"], 10))
        .await
        .unwrap();

    let names: Vec<&str> = outcome
        .candidates
        .iter()
        .map(|c| c.username.as_str())
        .collect();
    assert_eq!(names, vec!["alpha_acct_0", "kw_shop"]);

    // The account accepted in the hashtag phase is not visited again.
    let visits = browser
        .navigations()
        .iter()
        .filter(|url| url.as_str() == format!("{BASE}/alpha_acct_0/"))
        .count();
    assert_eq!(visits, 1);
}

#[tokio::test]
async fn non_business_accounts_are_not_returned() {
    let browser = StaticBrowser::new()
        .with_page(
            format!("{BASE}/explore/search/keyword/?q=coffee"),
            r#"<html><body><a href="/home_barista/">h</a><a href="/roastery/">r</a></body></html>"#,
        )
        .with_page(format!("{BASE}/home_barista/"), personal_account("home_barista"))
        .with_page(format!("{BASE}/roastery/"), business_account("roastery"));
    let store = Arc::new(MemoryProfileStore::new());

    let outcome = extractor(&browser, &store)
        .run(&seed(&["coffee"], &[], 10))
        .await
        .unwrap();

    assert_eq!(outcome.candidates.len(), 1);
    assert_eq!(outcome.candidates[0].username, "roastery");
    assert!(store.get("home_barista").is_none());
}

// ---------------------------------------------------------------------------
// Page-level failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn empty_or_missing_pages_are_skipped() {
    let browser = with_hashtag(StaticBrowser::new(), "good", &authors("good", 2))
        // Renders but never shows posts: treated as zero results.
        .with_page(
            format!("{BASE}/explore/tags/empty/"),
            "<html><body><p>nothing</p></body></html>",
        )
        // Lists a post whose page does not load.
        .with_page(
            format!("{BASE}/explore/tags/broken/"),
            r#"<html><body><article><a href="/p/missing/">x</a></article></body></html>"#,
        );
    let store = Arc::new(MemoryProfileStore::new());

    let outcome = extractor(&browser, &store)
        .run(&seed(&[], &["empty", "broken", "unknown", "good"], 10))
        .await
        .expect("page failures must not fail the run");

    assert_eq!(outcome.candidates.len(), 2);
    assert_eq!(browser.open_sessions(), 0);
}

#[tokio::test]
async fn failed_persist_keeps_the_candidate() {
    let browser = with_hashtag(StaticBrowser::new(), "alpha", &authors("alpha", 2));
    let store = Arc::new(MemoryProfileStore::new());
    store.reject_username("alpha_acct_0");

    let outcome = extractor(&browser, &store)
        .run(&seed(&[], &["alpha"], 2))
        .await
        .unwrap();

    assert_eq!(outcome.candidates.len(), 2);
    assert_eq!(outcome.persisted.len(), 1);
    assert_eq!(outcome.failed_persists, 1);
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn expired_deadline_returns_without_navigating() {
    let browser = with_hashtag(StaticBrowser::new(), "alpha", &authors("alpha", 3));
    let store = Arc::new(MemoryProfileStore::new());
    let config = ExtractorConfig {
        run_deadline: Duration::ZERO,
        ..config()
    };

    let outcome = extractor_with(&browser, &store, config)
        .run(&seed(&[], &["alpha"], 3))
        .await
        .unwrap();

    assert!(outcome.candidates.is_empty());
    assert!(browser.navigations().is_empty());
    assert_eq!(browser.open_sessions(), 0);
}

#[tokio::test]
async fn unavailable_browser_fails_the_run() {
    let browser = StaticBrowser::unavailable();
    let store = Arc::new(MemoryProfileStore::new());

    let result = extractor(&browser, &store)
        .run(&seed(&["x"], &[], 1))
        .await;

    assert!(matches!(
        result,
        Err(ExtractorError::CapabilityUnavailable(_))
    ));
}

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

/// Sessions from a [`StaticBrowser`] whose page loads never finish in time.
struct HangingBrowser(StaticBrowser);

struct HangingSession(Box<dyn BrowserSession>);

#[async_trait]
impl BrowserLauncher for HangingBrowser {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, ScraperError> {
        Ok(Box::new(HangingSession(self.0.launch().await?)))
    }
}

#[async_trait]
impl BrowserSession for HangingSession {
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), ScraperError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        self.0.navigate(url, timeout).await
    }

    async fn wait_for_element(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), ScraperError> {
        self.0.wait_for_element(selector, timeout).await
    }

    async fn close(&mut self) -> Result<(), ScraperError> {
        self.0.close().await
    }

    fn abandon(&mut self) {
        self.0.abandon();
    }

    fn page(&self) -> &PageSnapshot {
        self.0.page()
    }
}

fn hanging_extractor(browser: &StaticBrowser, store: &Arc<MemoryProfileStore>) -> Extractor {
    Extractor::new(
        Arc::new(HangingBrowser(browser.clone())),
        store.clone(),
        Classifier::default(),
        config(),
    )
}

#[tokio::test]
async fn cancelled_run_releases_its_session() {
    let browser = with_hashtag(StaticBrowser::new(), "alpha", &authors("alpha", 1));
    let store = Arc::new(MemoryProfileStore::new());
    let extractor = hanging_extractor(&browser, &store);

    let result = tokio::time::timeout(
        Duration::from_millis(100),
        extractor.run(&seed(&[], &["alpha"], 1)),
    )
    .await;

    assert!(result.is_err(), "run should still be waiting on the page");
    assert_eq!(browser.open_sessions(), 0);
    assert!(store.is_empty());
}

#[tokio::test]
async fn cancelled_sync_releases_its_session() {
    let browser = StaticBrowser::new().with_page(format!("{BASE}/acme/"), business_account("acme"));
    let store = Arc::new(MemoryProfileStore::new());
    let extractor = hanging_extractor(&browser, &store);

    let result =
        tokio::time::timeout(Duration::from_millis(100), extractor.sync_username("acme")).await;

    assert!(result.is_err(), "sync should still be waiting on the page");
    assert_eq!(browser.open_sessions(), 0);
}

// ---------------------------------------------------------------------------
// Repeated passes and direct sync
// ---------------------------------------------------------------------------

#[tokio::test]
async fn second_pass_updates_instead_of_duplicating() {
    let browser = with_hashtag(StaticBrowser::new(), "alpha", &authors("alpha", 2));
    let store = Arc::new(MemoryProfileStore::new());
    let extractor = extractor(&browser, &store);
    let seed = seed(&[], &["alpha"], 2);

    let first = extractor.run(&seed).await.unwrap();
    let second = extractor.run(&seed).await.unwrap();

    assert_eq!(store.len(), 2);
    for (before, after) in first.persisted.iter().zip(&second.persisted) {
        assert_eq!(before.id, after.id);
        let before_sync = before.instagram.as_ref().unwrap().last_synced;
        let after_sync = after.instagram.as_ref().unwrap().last_synced;
        assert!(after_sync >= before_sync);
    }
}

#[tokio::test]
async fn sync_persists_regardless_of_classification() {
    let browser = StaticBrowser::new()
        .with_page(format!("{BASE}/home_barista/"), personal_account("home_barista"));
    let store = Arc::new(MemoryProfileStore::new());
    let extractor = extractor(&browser, &store);

    let first = extractor.sync_username("@home_barista").await.unwrap();
    let second = extractor.sync_username("home_barista").await.unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(store.len(), 1);
    assert_eq!(
        second.instagram.as_ref().map(|ig| ig.followers_count),
        Some(50)
    );
    assert_eq!(browser.open_sessions(), 0);
}

#[tokio::test]
async fn sync_rejects_blank_and_malformed_usernames() {
    let browser = StaticBrowser::new();
    let store = Arc::new(MemoryProfileStore::new());
    let extractor = extractor(&browser, &store);

    for bad in ["", "  ", "explore", "a/b"] {
        let result = extractor.sync_username(bad).await;
        assert!(
            matches!(result, Err(ExtractorError::InvalidInput(_))),
            "expected InvalidInput for {bad:?}, got {result:?}"
        );
    }
    assert!(browser.navigations().is_empty());
}

#[tokio::test]
async fn sync_of_missing_account_is_an_extraction_error() {
    let browser = StaticBrowser::new();
    let store = Arc::new(MemoryProfileStore::new());

    let result = extractor(&browser, &store).sync_username("ghost").await;

    assert!(matches!(result, Err(ExtractorError::Extraction(_))));
    assert!(store.is_empty());
    assert_eq!(browser.open_sessions(), 0);
}
