//! Page addresses and link collection on the source platform.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::browser::BrowserSession;
use crate::error::ScraperError;

/// Present once a hashtag grid has rendered its posts.
pub const HASHTAG_CONTENT_SELECTOR: &str = "article a";
const POST_LINK_SELECTOR: &str = r#"article a[href^="/p/"]"#;
const POST_AUTHOR_SELECTOR: &str = r#"a[href^="/"][role="link"]"#;
/// Present once keyword search results have rendered.
pub const SEARCH_CONTENT_SELECTOR: &str = r#"a[href^="/"]"#;

/// First path segments that are platform routes rather than accounts.
const RESERVED_SEGMENTS: &[&str] = &[
    "p", "explore", "reel", "reels", "stories", "accounts", "direct", "about", "legal",
    "developer", "web", "tv",
];

/// Characters kept unescaped in a search query: unreserved per RFC 3986.
const QUERY: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'.').remove(b'_').remove(b'~');

#[must_use]
pub fn hashtag_url(base_url: &str, hashtag: &str) -> String {
    let tag = hashtag.trim().trim_start_matches('#');
    format!(
        "{base_url}/explore/tags/{}/",
        utf8_percent_encode(tag, QUERY)
    )
}

#[must_use]
pub fn keyword_search_url(base_url: &str, keyword: &str) -> String {
    format!(
        "{base_url}/explore/search/keyword/?q={}",
        utf8_percent_encode(keyword.trim(), QUERY)
    )
}

#[must_use]
pub fn account_url(base_url: &str, username: &str) -> String {
    format!("{base_url}/{username}/")
}

/// Absolute URL for a site-relative `href` such as `/p/abc/`.
#[must_use]
pub fn absolute_url(base_url: &str, href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        href.to_string()
    } else {
        format!("{base_url}/{}", href.trim_start_matches('/'))
    }
}

/// Username addressed by a site-relative account link such as `/acme.studio/`.
///
/// Returns `None` for post, explore and other platform routes.
#[must_use]
pub fn username_from_href(href: &str) -> Option<String> {
    let path = href.split(['?', '#']).next().unwrap_or_default();
    if !path.starts_with('/') {
        return None;
    }
    let mut segments = path.split('/').filter(|s| !s.is_empty());
    let first = segments.next()?;
    if segments.next().is_some() || RESERVED_SEGMENTS.contains(&first) {
        return None;
    }
    let valid = first
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_');
    valid.then(|| first.to_string())
}

/// Post links on a rendered hashtag page, deduplicated, in page order.
///
/// # Errors
///
/// Returns [`ScraperError::InvalidSelector`] only if the built-in selector is rejected.
pub fn collect_post_links(session: &dyn BrowserSession) -> Result<Vec<String>, ScraperError> {
    let hrefs = session.read_all_attributes(POST_LINK_SELECTOR, "href")?;
    Ok(dedup_in_order(hrefs))
}

/// Username of the account that authored the rendered post page.
///
/// # Errors
///
/// Returns [`ScraperError::InvalidSelector`] only if the built-in selector is rejected.
pub fn resolve_post_author(session: &dyn BrowserSession) -> Result<Option<String>, ScraperError> {
    let hrefs = session.read_all_attributes(POST_AUTHOR_SELECTOR, "href")?;
    Ok(hrefs.iter().find_map(|href| username_from_href(href)))
}

/// Account usernames linked from a rendered keyword search page, in page order.
///
/// # Errors
///
/// Returns [`ScraperError::InvalidSelector`] only if the built-in selector is rejected.
pub fn collect_account_links(session: &dyn BrowserSession) -> Result<Vec<String>, ScraperError> {
    let hrefs = session.read_all_attributes(SEARCH_CONTENT_SELECTOR, "href")?;
    let usernames = hrefs
        .iter()
        .filter(|href| !href.contains("/explore/") && !href.contains("/p/"))
        .filter_map(|href| username_from_href(href))
        .collect();
    Ok(dedup_in_order(usernames))
}

fn dedup_in_order(items: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}
