use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the process environment so it can be tested with a plain
/// `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_positive_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        match parse_u64(var, default)? {
            0 => Err(invalid(var, "must be greater than zero".to_string())),
            n => Ok(n),
        }
    };

    let database_url = require("DATABASE_URL")?;

    let env = parse_environment(&or_default("BIZSCOUT_ENV", "development"))
        .map_err(|reason| invalid("BIZSCOUT_ENV", reason))?;

    let bind_addr = or_default("BIZSCOUT_BIND_ADDR", "0.0.0.0:3000")
        .parse::<SocketAddr>()
        .map_err(|e| invalid("BIZSCOUT_BIND_ADDR", e.to_string()))?;
    let log_level = or_default("BIZSCOUT_LOG_LEVEL", "info");

    let db_max_connections = parse_u32("BIZSCOUT_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("BIZSCOUT_DB_MIN_CONNECTIONS", "1")?;
    if db_min_connections > db_max_connections {
        return Err(invalid(
            "BIZSCOUT_DB_MIN_CONNECTIONS",
            format!(
                "min connections ({db_min_connections}) exceeds max connections ({db_max_connections})"
            ),
        ));
    }
    let db_acquire_timeout_secs = parse_u64("BIZSCOUT_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let browserless_url = or_default("BIZSCOUT_BROWSERLESS_URL", "http://localhost:3001");
    let browserless_token = lookup("BROWSERLESS_TOKEN").ok().filter(|t| !t.is_empty());
    let source_base_url = or_default("BIZSCOUT_SOURCE_BASE_URL", "https://www.instagram.com")
        .trim_end_matches('/')
        .to_string();
    let scraper_user_agent = or_default("BIZSCOUT_SCRAPER_USER_AGENT", DEFAULT_USER_AGENT);
    let scraper_navigation_timeout_secs =
        parse_positive_u64("BIZSCOUT_SCRAPER_NAVIGATION_TIMEOUT_SECS", "60")?;
    let scraper_item_timeout_secs = parse_positive_u64("BIZSCOUT_SCRAPER_ITEM_TIMEOUT_SECS", "30")?;
    let scraper_content_timeout_secs =
        parse_positive_u64("BIZSCOUT_SCRAPER_CONTENT_TIMEOUT_SECS", "10")?;
    let run_deadline_secs = parse_positive_u64("BIZSCOUT_RUN_DEADLINE_SECS", "1800")?;

    let classifier_min_followers = or_default("BIZSCOUT_CLASSIFIER_MIN_FOLLOWERS", "1000")
        .parse::<i64>()
        .map_err(|e| invalid("BIZSCOUT_CLASSIFIER_MIN_FOLLOWERS", e.to_string()))?;
    let classifier_keywords = lookup("BIZSCOUT_CLASSIFIER_KEYWORDS")
        .ok()
        .map(|raw| parse_keyword_list(&raw))
        .filter(|keywords| !keywords.is_empty());

    let default_search_cron = or_default("BIZSCOUT_DEFAULT_SEARCH_CRON", "5 * * * *");
    crate::tasks::validate_cron_shape(&default_search_cron)
        .map_err(|e| invalid("BIZSCOUT_DEFAULT_SEARCH_CRON", e.to_string()))?;

    Ok(AppConfig {
        database_url,
        env,
        bind_addr,
        log_level,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        browserless_url,
        browserless_token,
        source_base_url,
        scraper_user_agent,
        scraper_navigation_timeout_secs,
        scraper_item_timeout_secs,
        scraper_content_timeout_secs,
        run_deadline_secs,
        classifier_min_followers,
        classifier_keywords,
        default_search_cron,
    })
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, String> {
    match s {
        "development" => Ok(Environment::Development),
        "production" => Ok(Environment::Production),
        "test" => Ok(Environment::Test),
        other => Err(format!(
            "unknown environment '{other}'; expected development, test, or production"
        )),
    }
}

/// Split a comma-separated keyword list, lowercasing and dropping blanks.
fn parse_keyword_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase)
        .collect()
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
