//! Database operations for `company_profiles` and `instagram_profiles`.
//!
//! A company profile owns at most one Instagram sub-record, and each Instagram
//! username maps to at most one company profile.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::PgPool;

use bizscout_core::{
    Candidate, CompanyProfile, InstagramProfile, ProfileListQuery, ProfilePage, INSTAGRAM_SOURCE,
};

use crate::store::ProfileStore;
use crate::DbError;

const PROFILE_SELECT: &str = "SELECT cp.id, cp.name, cp.description, cp.website, cp.email, \
            cp.phone, cp.primary_source, cp.data_sources, cp.last_updated, cp.created_at, \
            ig.username AS ig_username, ig.user_id AS ig_user_id, \
            ig.full_name AS ig_full_name, ig.followers_count AS ig_followers_count, \
            ig.following_count AS ig_following_count, ig.posts_count AS ig_posts_count, \
            ig.is_private AS ig_is_private, ig.is_verified AS ig_is_verified, \
            ig.biography AS ig_biography, ig.external_url AS ig_external_url, \
            ig.profile_pic_url AS ig_profile_pic_url, \
            ig.business_email AS ig_business_email, ig.business_phone AS ig_business_phone, \
            ig.is_business_account AS ig_is_business_account, \
            ig.business_category AS ig_business_category, ig.last_synced AS ig_last_synced \
     FROM company_profiles cp \
     LEFT JOIN instagram_profiles ig ON ig.company_profile_id = cp.id";

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A `company_profiles` row left-joined with its Instagram sub-record.
///
/// Every `ig_*` column is `NULL` when the aggregate has no Instagram record.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CompanyProfileRow {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub website: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub primary_source: String,
    pub data_sources: serde_json::Value,
    pub last_updated: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub ig_username: Option<String>,
    pub ig_user_id: Option<String>,
    pub ig_full_name: Option<String>,
    pub ig_followers_count: Option<i64>,
    pub ig_following_count: Option<i64>,
    pub ig_posts_count: Option<i64>,
    pub ig_is_private: Option<bool>,
    pub ig_is_verified: Option<bool>,
    pub ig_biography: Option<String>,
    pub ig_external_url: Option<String>,
    pub ig_profile_pic_url: Option<String>,
    pub ig_business_email: Option<String>,
    pub ig_business_phone: Option<String>,
    pub ig_is_business_account: Option<bool>,
    pub ig_business_category: Option<String>,
    pub ig_last_synced: Option<DateTime<Utc>>,
}

impl From<CompanyProfileRow> for CompanyProfile {
    fn from(row: CompanyProfileRow) -> Self {
        let instagram = match (row.ig_username, row.ig_last_synced) {
            (Some(username), Some(last_synced)) => Some(InstagramProfile {
                username,
                user_id: row.ig_user_id.unwrap_or_default(),
                full_name: row.ig_full_name.unwrap_or_default(),
                followers_count: row.ig_followers_count.unwrap_or_default(),
                following_count: row.ig_following_count.unwrap_or_default(),
                posts_count: row.ig_posts_count.unwrap_or_default(),
                is_private: row.ig_is_private.unwrap_or_default(),
                is_verified: row.ig_is_verified.unwrap_or_default(),
                biography: row.ig_biography.unwrap_or_default(),
                external_url: row.ig_external_url,
                profile_pic_url: row.ig_profile_pic_url.unwrap_or_default(),
                business_email: row.ig_business_email,
                business_phone: row.ig_business_phone,
                is_business_account: row.ig_is_business_account.unwrap_or_default(),
                business_category: row.ig_business_category,
                last_synced,
            }),
            _ => None,
        };

        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            website: row.website,
            email: row.email,
            phone: row.phone,
            primary_source: row.primary_source,
            data_sources: row.data_sources,
            instagram,
            last_updated: row.last_updated,
            created_at: row.created_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Upsert
// ---------------------------------------------------------------------------

/// Create or merge-update the company profile keyed by `candidate.username`.
///
/// The Instagram sub-record is overwritten with the candidate's values and its
/// `last_synced` set to now. The aggregate's name/description/website/email/
/// phone are overwritten only while `primary_source` is Instagram. The lookup
/// row is locked so two upserts of one username inside the database serialize;
/// two first-time inserts racing each other surface as a unique violation.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any statement fails; the transaction is rolled back.
pub async fn upsert_instagram_profile(
    pool: &PgPool,
    candidate: &Candidate,
) -> Result<CompanyProfile, DbError> {
    let now = Utc::now();
    let source_entry = json!({
        INSTAGRAM_SOURCE: { "username": candidate.username, "last_synced": now }
    });

    let mut tx = pool.begin().await?;

    let existing = sqlx::query_scalar::<_, i64>(
        "SELECT company_profile_id FROM instagram_profiles WHERE username = $1 FOR UPDATE",
    )
    .bind(&candidate.username)
    .fetch_optional(&mut *tx)
    .await?;

    let company_id = if let Some(company_id) = existing {
        sqlx::query(
            "UPDATE company_profiles SET \
               name = CASE WHEN primary_source = $2 THEN $3 ELSE name END, \
               description = CASE WHEN primary_source = $2 THEN $4 ELSE description END, \
               website = CASE WHEN primary_source = $2 THEN $5 ELSE website END, \
               email = CASE WHEN primary_source = $2 THEN $6 ELSE email END, \
               phone = CASE WHEN primary_source = $2 THEN $7 ELSE phone END, \
               data_sources = data_sources || $8, \
               last_updated = $9 \
             WHERE id = $1",
        )
        .bind(company_id)
        .bind(INSTAGRAM_SOURCE)
        .bind(candidate.display_name())
        .bind(non_empty(&candidate.biography))
        .bind(candidate.external_url.as_deref())
        .bind(candidate.business_email.as_deref())
        .bind(candidate.business_phone.as_deref())
        .bind(&source_entry)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE instagram_profiles SET \
               user_id = $2, full_name = $3, followers_count = $4, following_count = $5, \
               posts_count = $6, is_private = $7, is_verified = $8, biography = $9, \
               external_url = $10, profile_pic_url = $11, business_email = $12, \
               business_phone = $13, is_business_account = $14, business_category = $15, \
               last_synced = $16, updated_at = NOW() \
             WHERE company_profile_id = $1",
        )
        .bind(company_id)
        .bind(&candidate.user_id)
        .bind(&candidate.full_name)
        .bind(candidate.followers_count)
        .bind(candidate.following_count)
        .bind(candidate.posts_count)
        .bind(candidate.is_private)
        .bind(candidate.is_verified)
        .bind(&candidate.biography)
        .bind(candidate.external_url.as_deref())
        .bind(&candidate.profile_pic_url)
        .bind(candidate.business_email.as_deref())
        .bind(candidate.business_phone.as_deref())
        .bind(candidate.is_business_account)
        .bind(candidate.business_category.as_deref())
        .bind(now)
        .execute(&mut *tx)
        .await?;

        company_id
    } else {
        let company_id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO company_profiles \
               (name, description, website, email, phone, primary_source, data_sources, \
                last_updated) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING id",
        )
        .bind(candidate.display_name())
        .bind(non_empty(&candidate.biography))
        .bind(candidate.external_url.as_deref())
        .bind(candidate.business_email.as_deref())
        .bind(candidate.business_phone.as_deref())
        .bind(INSTAGRAM_SOURCE)
        .bind(&source_entry)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO instagram_profiles \
               (company_profile_id, username, user_id, full_name, followers_count, \
                following_count, posts_count, is_private, is_verified, biography, \
                external_url, profile_pic_url, business_email, business_phone, \
                is_business_account, business_category, last_synced) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)",
        )
        .bind(company_id)
        .bind(&candidate.username)
        .bind(&candidate.user_id)
        .bind(&candidate.full_name)
        .bind(candidate.followers_count)
        .bind(candidate.following_count)
        .bind(candidate.posts_count)
        .bind(candidate.is_private)
        .bind(candidate.is_verified)
        .bind(&candidate.biography)
        .bind(candidate.external_url.as_deref())
        .bind(&candidate.profile_pic_url)
        .bind(candidate.business_email.as_deref())
        .bind(candidate.business_phone.as_deref())
        .bind(candidate.is_business_account)
        .bind(candidate.business_category.as_deref())
        .bind(now)
        .execute(&mut *tx)
        .await?;

        company_id
    };

    let row = sqlx::query_as::<_, CompanyProfileRow>(&format!("{PROFILE_SELECT} WHERE cp.id = $1"))
        .bind(company_id)
        .fetch_one(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(row.into())
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// # Errors
///
/// Returns [`DbError::NotFound`] if no aggregate has this `id`, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn get_company_profile(pool: &PgPool, id: i64) -> Result<CompanyProfile, DbError> {
    sqlx::query_as::<_, CompanyProfileRow>(&format!("{PROFILE_SELECT} WHERE cp.id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .map(CompanyProfile::from)
        .ok_or(DbError::NotFound)
}

/// One page of company profiles, newest `last_updated` first.
///
/// `query.source` keeps only aggregates whose `data_sources` carries that key.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if either query fails.
pub async fn list_company_profiles(
    pool: &PgPool,
    query: &ProfileListQuery,
) -> Result<ProfilePage, DbError> {
    let rows = sqlx::query_as::<_, CompanyProfileRow>(&format!(
        "{PROFILE_SELECT} \
         WHERE ($1::text IS NULL OR cp.data_sources ? $1) \
         ORDER BY cp.last_updated DESC, cp.id DESC \
         LIMIT $2 OFFSET $3"
    ))
    .bind(query.source.as_deref())
    .bind(i64::from(query.page_size))
    .bind(query.offset())
    .fetch_all(pool)
    .await?;

    let total = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM company_profiles cp \
         WHERE ($1::text IS NULL OR cp.data_sources ? $1)",
    )
    .bind(query.source.as_deref())
    .fetch_one(pool)
    .await?;

    Ok(ProfilePage {
        items: rows.into_iter().map(CompanyProfile::from).collect(),
        page: query.page,
        page_size: query.page_size,
        total,
    })
}

/// Number of Instagram sub-records stored for `username` (0 or 1).
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_instagram_profiles(pool: &PgPool, username: &str) -> Result<i64, DbError> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM instagram_profiles WHERE username = $1",
    )
    .bind(username)
    .fetch_one(pool)
    .await?;

    Ok(count)
}

fn non_empty(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(value)
}

// ---------------------------------------------------------------------------
// ProfileStore adapter
// ---------------------------------------------------------------------------

/// [`ProfileStore`] backed by the profile tables.
#[derive(Debug, Clone)]
pub struct PgProfileStore {
    pool: PgPool,
}

impl PgProfileStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProfileStore for PgProfileStore {
    async fn upsert_instagram_profile(
        &self,
        candidate: &Candidate,
    ) -> Result<CompanyProfile, DbError> {
        upsert_instagram_profile(&self.pool, candidate).await
    }

    async fn list_company_profiles(
        &self,
        query: &ProfileListQuery,
    ) -> Result<ProfilePage, DbError> {
        list_company_profiles(&self.pool, query).await
    }
}
