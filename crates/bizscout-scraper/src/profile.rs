//! Field extraction from a rendered account page.

use std::time::Duration;

use serde_json::Value;

use bizscout_core::Candidate;

use crate::browser::BrowserSession;
use crate::error::ScraperError;
use crate::parse::{extract_email, extract_phone, parse_count};

/// The account header; once present the rest of the page is readable.
pub const PROFILE_CONTENT_SELECTOR: &str = "header section";

const FULL_NAME: &str = "header h2";
const BIOGRAPHY: &str = "header > section > div:nth-child(3) > span";
const EXTERNAL_URL: &str = r#"header a[href^="http"]"#;
const VERIFIED_BADGE: &str = r#"header span[aria-label="Verified"]"#;
const STATS: &str = "header section ul li";
const PRIVATE_HINT: &str = "h2 ~ div";
const HEADINGS: &str = "h2";
const CATEGORY_LINK: &str = r#"header a[href*="directory"]"#;
const AVATAR: &str = "header img";
const CONTACT_LINK: &str = r#"a[href^="mailto:"], a[href^="tel:"]"#;
const ANY_DIRECTORY_LINK: &str = r#"a[href*="directory"]"#;
const BUTTONS: &str = r#"button, div[role="button"]"#;
const JSON_LD: &str = r#"script[type="application/ld+json"]"#;

const CONTACT_BUTTON_WORDS: &[&str] = &["contact", "email", "message"];

/// Extract a [`Candidate`] from the account page the session has loaded.
///
/// Waits for the profile header; every other field degrades to an empty,
/// zero, `None` or `false` value when its element is missing.
///
/// # Errors
///
/// Returns [`ScraperError::Timeout`] when the header does not render within
/// `content_timeout`, or whatever the session reports while waiting.
pub async fn extract_candidate(
    session: &mut dyn BrowserSession,
    username: &str,
    content_timeout: Duration,
) -> Result<Candidate, ScraperError> {
    session
        .wait_for_element(PROFILE_CONTENT_SELECTOR, content_timeout)
        .await?;
    Ok(read_candidate(&*session, username))
}

fn read_candidate(session: &dyn BrowserSession, username: &str) -> Candidate {
    let text = |selector: &str| session.read_text(selector).ok().flatten();
    let attr = |selector: &str, name: &str| session.read_attribute(selector, name).ok().flatten();
    let exists = |selector: &str| session.exists(selector).unwrap_or(false);
    let all_text = |selector: &str| session.read_all_text(selector).unwrap_or_default();

    let biography = text(BIOGRAPHY).unwrap_or_default();

    let stats = all_text(STATS);
    let (posts_count, followers_count, following_count) = match stats.as_slice() {
        [posts, followers, following, ..] => (
            parse_count(posts),
            parse_count(followers),
            parse_count(following),
        ),
        _ => (0, 0, 0),
    };

    let is_private = all_text(PRIVATE_HINT)
        .iter()
        .any(|t| t.contains("Private"))
        || all_text(HEADINGS)
            .iter()
            .any(|t| t.to_lowercase().contains("this account is private"));

    let has_contact_button = all_text(BUTTONS).iter().any(|t| {
        let lower = t.to_lowercase();
        CONTACT_BUTTON_WORDS.iter().any(|w| lower.contains(w))
    });
    let is_business_account =
        exists(ANY_DIRECTORY_LINK) || exists(CONTACT_LINK) || has_contact_button;

    Candidate {
        username: username.to_string(),
        user_id: structured_identifier(&all_text(JSON_LD)).unwrap_or_default(),
        full_name: text(FULL_NAME).unwrap_or_default(),
        followers_count,
        following_count,
        posts_count,
        is_private,
        is_verified: exists(VERIFIED_BADGE),
        external_url: attr(EXTERNAL_URL, "href").filter(|u| !u.is_empty()),
        profile_pic_url: attr(AVATAR, "src").unwrap_or_default(),
        business_email: extract_email(&biography),
        business_phone: extract_phone(&biography),
        is_business_account,
        business_category: text(CATEGORY_LINK).filter(|c| !c.is_empty()),
        biography,
    }
}

/// `mainEntityOfPage.identifier` from the first JSON-LD block that carries it.
fn structured_identifier(blocks: &[String]) -> Option<String> {
    blocks
        .iter()
        .filter_map(|raw| serde_json::from_str::<Value>(raw).ok())
        .find_map(|doc| {
            let entity = doc
                .get("mainEntityOfPage")
                .or_else(|| doc.get("mainEntityofPage"))?;
            match entity.get("identifier")? {
                Value::String(s) if !s.is_empty() => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                Value::Object(obj) => obj.get("value").and_then(|v| match v {
                    Value::String(s) => Some(s.clone()),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                }),
                _ => None,
            }
        })
}
