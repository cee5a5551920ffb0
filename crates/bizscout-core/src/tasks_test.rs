use chrono::Utc;
use uuid::Uuid;

use super::*;

fn draft() -> TaskDraft {
    TaskDraft {
        name: "  Coffee shops  ".to_string(),
        keywords: vec!["coffee roaster".to_string()],
        hashtags: vec![" ".to_string(), "#specialtycoffee".to_string()],
        limit: 20,
        schedule: "0 3 * * *".to_string(),
        active: true,
    }
}

fn task() -> Task {
    Task {
        id: 7,
        name: "Coffee shops".to_string(),
        keywords: vec!["coffee roaster".to_string()],
        hashtags: vec![],
        limit: 20,
        schedule: "0 3 * * *".to_string(),
        active: true,
        correlation_id: Uuid::new_v4(),
        last_run: None,
        next_run: None,
        profiles_collected: 0,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

#[test]
fn normalized_trims_name_and_drops_blank_terms() {
    let draft = draft().normalized().expect("valid draft");
    assert_eq!(draft.name, "Coffee shops");
    assert_eq!(draft.hashtags, vec!["#specialtycoffee".to_string()]);
}

#[test]
fn normalized_rejects_blank_name() {
    let mut d = draft();
    d.name = "   ".to_string();
    assert!(matches!(d.normalized(), Err(CoreError::InvalidInput(_))));
}

#[test]
fn normalized_rejects_missing_terms() {
    let mut d = draft();
    d.keywords = vec![" ".to_string()];
    d.hashtags = vec![];
    assert!(matches!(d.normalized(), Err(CoreError::InvalidInput(_))));
}

#[test]
fn normalized_rejects_non_positive_limit() {
    let mut d = draft();
    d.limit = 0;
    assert!(matches!(d.normalized(), Err(CoreError::InvalidInput(_))));
}

#[test]
fn normalized_rejects_six_field_schedule() {
    let mut d = draft();
    d.schedule = "0 0 3 * * *".to_string();
    assert!(matches!(d.normalized(), Err(CoreError::InvalidCron { .. })));
}

#[test]
fn cron_shape_accepts_common_expressions() {
    for expr in ["* * * * *", "*/15 * * * *", "0 9-17 * * MON-FRI", "5 0 1,15 * ?"] {
        assert!(validate_cron_shape(expr).is_ok(), "{expr} should be accepted");
    }
}

#[test]
fn cron_shape_rejects_garbage() {
    assert!(validate_cron_shape("").is_err());
    assert!(validate_cron_shape("every day").is_err());
    assert!(validate_cron_shape("0 3 * * * ;").is_err());
    assert!(validate_cron_shape("0 3 * * $").is_err());
}

#[test]
fn patch_rejects_clearing_all_terms() {
    let patch = TaskPatch {
        keywords: Some(vec![]),
        ..TaskPatch::default()
    };
    assert!(matches!(
        patch.normalized_against(&task()),
        Err(CoreError::InvalidInput(_))
    ));
}

#[test]
fn patch_allows_swapping_keywords_for_hashtags() {
    let patch = TaskPatch {
        keywords: Some(vec![]),
        hashtags: Some(vec!["latteart".to_string()]),
        ..TaskPatch::default()
    };
    assert!(patch.normalized_against(&task()).is_ok());
}

#[test]
fn changes_schedule_ignores_absent_and_identical_values() {
    let existing = task();
    assert!(!TaskPatch::default().changes_schedule(&existing));

    let same = TaskPatch {
        schedule: Some("0 3 * * *".to_string()),
        ..TaskPatch::default()
    };
    assert!(!same.changes_schedule(&existing));

    let different = TaskPatch {
        schedule: Some("30 4 * * *".to_string()),
        ..TaskPatch::default()
    };
    assert!(different.changes_schedule(&existing));
}

#[test]
fn filter_matches_by_active_flag() {
    let mut t = task();
    assert!(TaskFilter::default().matches(&t));
    assert!(TaskFilter::active_only().matches(&t));
    t.active = false;
    assert!(!TaskFilter::active_only().matches(&t));
}
