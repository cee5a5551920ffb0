//! Extracted candidates and the company-profile aggregate they are merged into.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Data-source key under which Instagram-derived fields are recorded.
pub const INSTAGRAM_SOURCE: &str = "instagram";

/// A profile extracted during one run. Transient until classified and persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub username: String,
    pub user_id: String,
    pub full_name: String,
    pub followers_count: i64,
    pub following_count: i64,
    pub posts_count: i64,
    pub is_private: bool,
    pub is_verified: bool,
    pub biography: String,
    pub external_url: Option<String>,
    pub profile_pic_url: String,
    pub business_email: Option<String>,
    pub business_phone: Option<String>,
    /// Page affordances suggest a business account (category link, contact
    /// links or contact buttons). Recorded, not used for acceptance.
    pub is_business_account: bool,
    pub business_category: Option<String>,
}

impl Candidate {
    /// Display name for the aggregate: the full name, or the username when blank.
    #[must_use]
    pub fn display_name(&self) -> &str {
        let name = self.full_name.trim();
        if name.is_empty() {
            &self.username
        } else {
            name
        }
    }
}

/// Source-specific sub-record of a [`CompanyProfile`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstagramProfile {
    pub username: String,
    pub user_id: String,
    pub full_name: String,
    pub followers_count: i64,
    pub following_count: i64,
    pub posts_count: i64,
    pub is_private: bool,
    pub is_verified: bool,
    pub biography: String,
    pub external_url: Option<String>,
    pub profile_pic_url: String,
    pub business_email: Option<String>,
    pub business_phone: Option<String>,
    pub is_business_account: bool,
    pub business_category: Option<String>,
    pub last_synced: DateTime<Utc>,
}

impl InstagramProfile {
    #[must_use]
    pub fn from_candidate(candidate: &Candidate, synced_at: DateTime<Utc>) -> Self {
        Self {
            username: candidate.username.clone(),
            user_id: candidate.user_id.clone(),
            full_name: candidate.full_name.clone(),
            followers_count: candidate.followers_count,
            following_count: candidate.following_count,
            posts_count: candidate.posts_count,
            is_private: candidate.is_private,
            is_verified: candidate.is_verified,
            biography: candidate.biography.clone(),
            external_url: candidate.external_url.clone(),
            profile_pic_url: candidate.profile_pic_url.clone(),
            business_email: candidate.business_email.clone(),
            business_phone: candidate.business_phone.clone(),
            is_business_account: candidate.is_business_account,
            business_category: candidate.business_category.clone(),
            last_synced: synced_at,
        }
    }
}

/// The persisted company aggregate, keyed for this source by Instagram username.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyProfile {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub website: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    /// Source the top-level fields are currently derived from.
    pub primary_source: String,
    pub data_sources: serde_json::Value,
    pub instagram: Option<InstagramProfile>,
    pub last_updated: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Paging and filtering for company-profile listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileListQuery {
    pub page: u32,
    pub page_size: u32,
    pub source: Option<String>,
}

impl ProfileListQuery {
    pub const DEFAULT_PAGE_SIZE: u32 = 25;
    pub const MAX_PAGE_SIZE: u32 = 100;

    /// Build a query, clamping `page` to at least 1 and `page_size` to `1..=100`.
    #[must_use]
    pub fn new(page: Option<u32>, page_size: Option<u32>, source: Option<String>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            page_size: page_size
                .unwrap_or(Self::DEFAULT_PAGE_SIZE)
                .clamp(1, Self::MAX_PAGE_SIZE),
            source: source
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty()),
        }
    }

    #[must_use]
    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.page_size)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfilePage {
    pub items: Vec<CompanyProfile>,
    pub page: u32,
    pub page_size: u32,
    pub total: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_falls_back_to_username() {
        let mut candidate = Candidate {
            username: "acme.studio".to_string(),
            full_name: "  ".to_string(),
            ..Candidate::default()
        };
        assert_eq!(candidate.display_name(), "acme.studio");

        candidate.full_name = "Acme Studio".to_string();
        assert_eq!(candidate.display_name(), "Acme Studio");
    }

    #[test]
    fn list_query_clamps_bounds() {
        let q = ProfileListQuery::new(Some(0), Some(1_000), Some("  Instagram ".to_string()));
        assert_eq!(q.page, 1);
        assert_eq!(q.page_size, 100);
        assert_eq!(q.source.as_deref(), Some("instagram"));
        assert_eq!(q.offset(), 0);

        let q = ProfileListQuery::new(Some(3), None, Some(String::new()));
        assert_eq!(q.page_size, 25);
        assert_eq!(q.offset(), 50);
        assert!(q.source.is_none());
    }

    #[test]
    fn instagram_profile_copies_candidate_fields() {
        let candidate = Candidate {
            username: "acme".to_string(),
            followers_count: 1_200,
            business_email: Some("hi@acme.io".to_string()),
            ..Candidate::default()
        };
        let now = Utc::now();
        let profile = InstagramProfile::from_candidate(&candidate, now);
        assert_eq!(profile.username, "acme");
        assert_eq!(profile.followers_count, 1_200);
        assert_eq!(profile.business_email.as_deref(), Some("hi@acme.io"));
        assert_eq!(profile.last_synced, now);
    }
}
