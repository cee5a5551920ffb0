//! Default-search settings and the seed a single extraction run starts from.

use serde::{Deserialize, Serialize};

use crate::tasks::Task;
use crate::CoreError;

/// Persisted configuration of the built-in default search job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchSettings {
    pub enabled: bool,
    pub keywords: Vec<String>,
    pub hashtags: Vec<String>,
    pub limit: i32,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            keywords: vec!["digital marketing".to_string(), "b2b services".to_string()],
            hashtags: vec!["b2b".to_string(), "marketing".to_string()],
            limit: 10,
        }
    }
}

/// Input to one extraction run.
///
/// Hashtags are stored without a leading `#`. `limit` is the maximum number of
/// accepted candidates the run returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchSeed {
    pub keywords: Vec<String>,
    pub hashtags: Vec<String>,
    pub limit: usize,
}

impl SearchSeed {
    /// Build a seed, stripping leading `#` and dropping blank terms.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidInput`] when `limit` is not positive or no
    /// keyword or hashtag remains.
    pub fn new(keywords: Vec<String>, hashtags: Vec<String>, limit: i64) -> Result<Self, CoreError> {
        let limit = usize::try_from(limit)
            .ok()
            .filter(|l| *l > 0)
            .ok_or_else(|| {
                CoreError::InvalidInput(format!("limit must be greater than zero, got {limit}"))
            })?;

        let keywords: Vec<String> = keywords
            .iter()
            .map(|k| k.trim())
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .collect();
        let hashtags: Vec<String> = hashtags
            .iter()
            .map(|h| h.trim().trim_start_matches('#').trim())
            .filter(|h| !h.is_empty())
            .map(str::to_string)
            .collect();

        if keywords.is_empty() && hashtags.is_empty() {
            return Err(CoreError::InvalidInput(
                "at least one keyword or hashtag is required".to_string(),
            ));
        }
        Ok(Self {
            keywords,
            hashtags,
            limit,
        })
    }

    /// Seed for a run of `task`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidInput`] when the stored task no longer
    /// yields a runnable seed.
    pub fn from_task(task: &Task) -> Result<Self, CoreError> {
        Self::new(
            task.keywords.clone(),
            task.hashtags.clone(),
            i64::from(task.limit),
        )
    }

    /// Seed for a run of the default search.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidInput`] when the settings carry no terms or
    /// a non-positive limit.
    pub fn from_settings(settings: &SearchSettings) -> Result<Self, CoreError> {
        Self::new(
            settings.keywords.clone(),
            settings.hashtags.clone(),
            i64::from(settings.limit),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_are_disabled() {
        let s = SearchSettings::default();
        assert!(!s.enabled);
        assert_eq!(s.limit, 10);
        assert_eq!(s.hashtags, vec!["b2b", "marketing"]);
    }

    #[test]
    fn seed_strips_hash_prefix_and_blanks() {
        let seed = SearchSeed::new(
            vec![" coffee ".to_string(), String::new()],
            vec!["#latte".to_string(), "  #  ".to_string(), "espresso".to_string()],
            5,
        )
        .unwrap();
        assert_eq!(seed.keywords, vec!["coffee"]);
        assert_eq!(seed.hashtags, vec!["latte", "espresso"]);
        assert_eq!(seed.limit, 5);
    }

    #[test]
    fn seed_rejects_zero_and_negative_limits() {
        for limit in [0, -3] {
            let result = SearchSeed::new(vec!["x".to_string()], vec![], limit);
            assert!(matches!(result, Err(CoreError::InvalidInput(_))));
        }
    }

    #[test]
    fn seed_rejects_empty_terms() {
        let result = SearchSeed::new(vec![" ".to_string()], vec!["#".to_string()], 3);
        assert!(matches!(result, Err(CoreError::InvalidInput(_))));
    }

    #[test]
    fn seed_from_default_settings() {
        let seed = SearchSeed::from_settings(&SearchSettings::default()).unwrap();
        assert_eq!(seed.keywords.len(), 2);
        assert_eq!(seed.limit, 10);
    }
}
