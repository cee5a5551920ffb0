use bizscout_core::ProfileListQuery;

/// Print one page of stored company profiles, newest first.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub(crate) async fn run_profiles_list(
    pool: &sqlx::PgPool,
    page: u32,
    page_size: u32,
    source: Option<String>,
) -> anyhow::Result<()> {
    let query = ProfileListQuery::new(Some(page), Some(page_size), source);
    let result = bizscout_db::list_company_profiles(pool, &query).await?;

    if result.items.is_empty() {
        println!("no company profiles found; run `search` or `sync` first");
        return Ok(());
    }

    println!("{:<8}{:<36}{:<12}WEBSITE", "ID", "NAME", "SOURCE");
    for profile in &result.items {
        println!(
            "{:<8}{:<36}{:<12}{}",
            profile.id,
            truncate(&profile.name, 34),
            profile.primary_source,
            profile.website.as_deref().unwrap_or("-")
        );
    }
    println!(
        "\npage {} of {} profiles ({} per page)",
        result.page, result.total, result.page_size
    );
    Ok(())
}

pub(crate) fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        format!("{}...", text.chars().take(max_chars).collect::<String>())
    } else {
        text.to_string()
    }
}
