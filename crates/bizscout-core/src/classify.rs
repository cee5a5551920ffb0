//! Business-likeness decision over an extracted [`Candidate`].

use crate::app_config::AppConfig;
use crate::profiles::Candidate;

/// Bio keywords that suggest a business account (English and Russian).
pub const DEFAULT_BUSINESS_KEYWORDS: &[&str] = &[
    "company",
    "business",
    "agency",
    "official",
    "store",
    "shop",
    "brand",
    "service",
    "consulting",
    "contact",
    "компания",
    "бизнес",
    "магазин",
    "услуги",
    "контакты",
];

/// Followers strictly above this count make a profile "popular".
pub const DEFAULT_MIN_FOLLOWERS: i64 = 1000;

/// Pure predicate deciding whether a candidate is kept.
///
/// A candidate is accepted when any of these hold:
///
/// - it has an external URL and more than `min_followers` followers
/// - its bio mentions a business keyword and it has an external URL or a
///   business email
/// - it has a business email and more than `min_followers` followers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classifier {
    keywords: Vec<String>,
    min_followers: i64,
}

impl Default for Classifier {
    fn default() -> Self {
        Self {
            keywords: DEFAULT_BUSINESS_KEYWORDS
                .iter()
                .map(|k| (*k).to_string())
                .collect(),
            min_followers: DEFAULT_MIN_FOLLOWERS,
        }
    }
}

impl Classifier {
    /// Keywords are matched case-insensitively as substrings of the bio.
    #[must_use]
    pub fn new(keywords: Vec<String>, min_followers: i64) -> Self {
        Self {
            keywords: keywords.into_iter().map(|k| k.to_lowercase()).collect(),
            min_followers,
        }
    }

    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        match &config.classifier_keywords {
            Some(keywords) => Self::new(keywords.clone(), config.classifier_min_followers),
            None => Self {
                min_followers: config.classifier_min_followers,
                ..Self::default()
            },
        }
    }

    #[must_use]
    pub fn min_followers(&self) -> i64 {
        self.min_followers
    }

    #[must_use]
    pub fn is_business(&self, candidate: &Candidate) -> bool {
        let has_url = candidate
            .external_url
            .as_deref()
            .is_some_and(|u| !u.trim().is_empty());
        let has_email = candidate
            .business_email
            .as_deref()
            .is_some_and(|e| !e.trim().is_empty());
        let popular = candidate.followers_count > self.min_followers;

        (has_url && popular)
            || (self.bio_mentions_business(&candidate.biography) && (has_url || has_email))
            || (has_email && popular)
    }

    fn bio_mentions_business(&self, bio: &str) -> bool {
        if bio.is_empty() {
            return false;
        }
        let bio = bio.to_lowercase();
        self.keywords.iter().any(|k| bio.contains(k.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate() -> Candidate {
        Candidate {
            username: "someone".to_string(),
            ..Candidate::default()
        }
    }

    #[test]
    fn popular_profile_with_website_is_business() {
        let c = Candidate {
            followers_count: 2000,
            external_url: Some("http://x".to_string()),
            ..candidate()
        };
        assert!(Classifier::default().is_business(&c));
    }

    #[test]
    fn bare_profile_is_not_business() {
        let c = Candidate {
            followers_count: 50,
            ..candidate()
        };
        assert!(!Classifier::default().is_business(&c));
    }

    #[test]
    fn contact_bio_with_email_is_business_regardless_of_followers() {
        let c = Candidate {
            biography: "Contact us for orders".to_string(),
            business_email: Some("a@b.co".to_string()),
            followers_count: 10,
            ..candidate()
        };
        assert!(Classifier::default().is_business(&c));
    }

    #[test]
    fn follower_threshold_is_exclusive() {
        let c = Candidate {
            followers_count: 1000,
            external_url: Some("https://acme.io".to_string()),
            ..candidate()
        };
        assert!(!Classifier::default().is_business(&c));
    }

    #[test]
    fn keyword_without_url_or_email_is_not_enough() {
        let c = Candidate {
            biography: "Official brand store".to_string(),
            followers_count: 5_000_000,
            ..candidate()
        };
        assert!(!Classifier::default().is_business(&c));
    }

    #[test]
    fn cyrillic_keywords_match_case_insensitively() {
        let c = Candidate {
            biography: "Наш МАГАЗИН в центре".to_string(),
            external_url: Some("https://shop.example".to_string()),
            ..candidate()
        };
        assert!(Classifier::default().is_business(&c));
    }

    #[test]
    fn custom_keywords_replace_defaults() {
        let classifier = Classifier::new(vec!["Bakery".to_string()], 10_000);
        let bakery = Candidate {
            biography: "Family bakery since 1990".to_string(),
            external_url: Some("https://bread.example".to_string()),
            ..candidate()
        };
        let shop = Candidate {
            biography: "Online shop".to_string(),
            external_url: Some("https://shop.example".to_string()),
            ..candidate()
        };
        assert!(classifier.is_business(&bakery));
        assert!(!classifier.is_business(&shop));
        assert_eq!(classifier.min_followers(), 10_000);
    }
}
