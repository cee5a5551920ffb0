//! Live integration tests for bizscout-db using `#[sqlx::test]`.
//!
//! Each test gets a fresh, fully-migrated Postgres database spun up by the
//! sqlx test harness. The `migrations` path is relative to the crate root
//! (`crates/bizscout-db/`), so `"../../migrations"` resolves to the workspace
//! migration directory.

use bizscout_core::{
    Candidate, ProfileListQuery, RunStats, SearchSettings, TaskDraft, TaskFilter, TaskPatch,
};
use bizscout_db::{
    count_instagram_profiles, create_task, delete_task, ensure_search_settings, get_task,
    list_company_profiles, list_tasks, record_task_run, set_task_next_run, try_claim_run,
    update_task, upsert_instagram_profile, DbError,
};
use chrono::{Duration, Utc};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn draft(name: &str, active: bool) -> TaskDraft {
    TaskDraft {
        name: name.to_string(),
        keywords: vec!["coffee roaster".to_string()],
        hashtags: vec!["specialtycoffee".to_string()],
        limit: 10,
        schedule: "0 3 * * *".to_string(),
        active,
    }
}

fn candidate(username: &str) -> Candidate {
    Candidate {
        username: username.to_string(),
        user_id: "1234".to_string(),
        full_name: "Acme Coffee".to_string(),
        followers_count: 1_500,
        biography: "Roastery & shop. hello@acme.coffee".to_string(),
        external_url: Some("https://acme.coffee".to_string()),
        business_email: Some("hello@acme.coffee".to_string()),
        ..Candidate::default()
    }
}

// ---------------------------------------------------------------------------
// search_tasks
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn task_crud_round_trip(pool: sqlx::PgPool) {
    let created = create_task(&pool, &draft("roasters", true))
        .await
        .expect("create_task failed");
    assert_eq!(created.profiles_collected, 0);
    assert!(created.next_run.is_none());

    let patch = TaskPatch {
        schedule: Some("30 4 * * *".to_string()),
        hashtags: Some(vec![]),
        ..TaskPatch::default()
    };
    let updated = update_task(&pool, created.id, &patch)
        .await
        .expect("update_task failed");
    assert_eq!(updated.schedule, "30 4 * * *");
    assert!(updated.hashtags.is_empty());
    assert_eq!(updated.keywords, created.keywords);
    assert_eq!(updated.correlation_id, created.correlation_id);
    assert_eq!(updated.name, "roasters");

    delete_task(&pool, created.id).await.expect("delete_task failed");
    assert!(matches!(get_task(&pool, created.id).await, Err(DbError::NotFound)));
    assert!(matches!(delete_task(&pool, created.id).await, Err(DbError::NotFound)));
}

#[sqlx::test(migrations = "../../migrations")]
async fn run_claim_blocks_a_second_session(pool: sqlx::PgPool) {
    let task = create_task(&pool, &draft("roasters", true)).await.unwrap();

    let claim = try_claim_run(&pool, task.correlation_id)
        .await
        .expect("try_claim_run failed")
        .expect("first claim should be granted");
    let second = try_claim_run(&pool, task.correlation_id)
        .await
        .expect("try_claim_run failed");
    assert!(second.is_none(), "a held claim must refuse other sessions");

    let other = create_task(&pool, &draft("florists", true)).await.unwrap();
    assert!(try_claim_run(&pool, other.correlation_id)
        .await
        .unwrap()
        .is_some());

    claim.release().await.expect("release failed");
    assert!(try_claim_run(&pool, task.correlation_id)
        .await
        .unwrap()
        .is_some());
}

#[sqlx::test(migrations = "../../migrations")]
async fn list_tasks_filters_active(pool: sqlx::PgPool) {
    create_task(&pool, &draft("on", true)).await.unwrap();
    create_task(&pool, &draft("off", false)).await.unwrap();

    let all = list_tasks(&pool, TaskFilter::default()).await.unwrap();
    assert_eq!(all.len(), 2);

    let active = list_tasks(&pool, TaskFilter::active_only()).await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].name, "on");
}

#[sqlx::test(migrations = "../../migrations")]
async fn run_stats_preserve_next_run_when_absent(pool: sqlx::PgPool) {
    let task = create_task(&pool, &draft("roasters", true)).await.unwrap();
    let next = Utc::now() + Duration::hours(2);
    set_task_next_run(&pool, task.id, next).await.unwrap();

    let stats = RunStats {
        last_run: Utc::now(),
        next_run: None,
        profiles_collected: 7,
    };
    record_task_run(&pool, task.id, &stats).await.unwrap();

    let stored = get_task(&pool, task.id).await.unwrap();
    assert_eq!(stored.profiles_collected, 7);
    assert!(stored.last_run.is_some());
    let stored_next = stored.next_run.expect("next_run kept");
    assert!((stored_next - next).num_milliseconds().abs() < 1);

    assert!(matches!(
        record_task_run(&pool, task.id + 100, &stats).await,
        Err(DbError::NotFound)
    ));
}

// ---------------------------------------------------------------------------
// company_profiles / instagram_profiles
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn second_upsert_merges_instead_of_duplicating(pool: sqlx::PgPool) {
    let first = upsert_instagram_profile(&pool, &candidate("acme.coffee"))
        .await
        .expect("first upsert failed");
    assert_eq!(first.name, "Acme Coffee");
    assert_eq!(first.primary_source, "instagram");
    assert!(first.data_sources.get("instagram").is_some());

    let mut again = candidate("acme.coffee");
    again.followers_count = 2_400;
    again.external_url = Some("https://acme.coffee/shop".to_string());
    let second = upsert_instagram_profile(&pool, &again)
        .await
        .expect("second upsert failed");

    assert_eq!(second.id, first.id);
    assert_eq!(second.website.as_deref(), Some("https://acme.coffee/shop"));
    let ig = second.instagram.expect("instagram record");
    assert_eq!(ig.followers_count, 2_400);
    assert!(ig.last_synced >= first.instagram.expect("first record").last_synced);

    let count = count_instagram_profiles(&pool, "acme.coffee").await.unwrap();
    assert_eq!(count, 1);
}

#[sqlx::test(migrations = "../../migrations")]
async fn upsert_leaves_fields_of_foreign_primary_source(pool: sqlx::PgPool) {
    let first = upsert_instagram_profile(&pool, &candidate("acme.coffee"))
        .await
        .unwrap();
    sqlx::query(
        "UPDATE company_profiles SET primary_source = 'crunchbase', name = 'Acme Inc' WHERE id = $1",
    )
    .bind(first.id)
    .execute(&pool)
    .await
    .unwrap();

    let merged = upsert_instagram_profile(&pool, &candidate("acme.coffee"))
        .await
        .unwrap();
    assert_eq!(merged.name, "Acme Inc");
    assert_eq!(merged.primary_source, "crunchbase");
}

#[sqlx::test(migrations = "../../migrations")]
async fn list_company_profiles_pages_newest_first(pool: sqlx::PgPool) {
    for name in ["alpha", "bravo", "charlie"] {
        upsert_instagram_profile(&pool, &candidate(name)).await.unwrap();
    }

    let page = list_company_profiles(&pool, &ProfileListQuery::new(Some(1), Some(2), None))
        .await
        .unwrap();
    assert_eq!(page.total, 3);
    assert_eq!(page.items.len(), 2);
    let first_username = page.items[0]
        .instagram
        .as_ref()
        .map(|ig| ig.username.clone());
    assert_eq!(first_username.as_deref(), Some("charlie"));

    let none = list_company_profiles(
        &pool,
        &ProfileListQuery::new(None, None, Some("crunchbase".to_string())),
    )
    .await
    .unwrap();
    assert_eq!(none.total, 0);
    assert!(none.items.is_empty());
}

// ---------------------------------------------------------------------------
// search_settings
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn ensure_search_settings_inserts_once(pool: sqlx::PgPool) {
    let stored = ensure_search_settings(&pool, &SearchSettings::default())
        .await
        .unwrap();
    assert_eq!(stored, SearchSettings::default());

    sqlx::query("UPDATE search_settings SET enabled = TRUE WHERE id = 1")
        .execute(&pool)
        .await
        .unwrap();

    let again = ensure_search_settings(&pool, &SearchSettings::default())
        .await
        .unwrap();
    assert!(again.enabled);
}
