//! Browsing capability and page-level extraction for the source platform.

pub mod browser;
pub mod error;
pub mod pages;
pub mod parse;
pub mod profile;

pub use browser::{
    BrowserLauncher, BrowserSession, BrowserlessLauncher, BrowserlessSession, PageSnapshot,
    StaticBrowser,
};
pub use error::ScraperError;
pub use pages::{
    account_url, absolute_url, collect_account_links, collect_post_links, hashtag_url,
    keyword_search_url, resolve_post_author, username_from_href, HASHTAG_CONTENT_SELECTOR,
    SEARCH_CONTENT_SELECTOR,
};
pub use parse::{extract_email, extract_phone, parse_count};
pub use profile::{extract_candidate, PROFILE_CONTENT_SELECTOR};
