use scraper::{ElementRef, Html, Selector};

use crate::error::ScraperError;

/// Rendered HTML of the last page a session loaded.
///
/// The document is re-parsed per query: `scraper::Html` is not `Send`, and
/// sessions are held across await points.
#[derive(Debug, Clone, Default)]
pub struct PageSnapshot {
    url: Option<String>,
    html: String,
}

impl PageSnapshot {
    #[must_use]
    pub fn new(url: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            html: html.into(),
        }
    }

    #[must_use]
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    #[must_use]
    pub fn html(&self) -> &str {
        &self.html
    }

    /// # Errors
    ///
    /// Returns [`ScraperError::InvalidSelector`] if `selector` does not parse.
    pub fn exists(&self, selector: &str) -> Result<bool, ScraperError> {
        self.select(selector, |mut matches| matches.next().is_some())
    }

    /// First matching element's attribute.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::InvalidSelector`] if `selector` does not parse.
    pub fn attribute(&self, selector: &str, name: &str) -> Result<Option<String>, ScraperError> {
        self.select(selector, |mut matches| {
            matches
                .next()
                .and_then(|el| el.value().attr(name))
                .map(str::to_string)
        })
    }

    /// The attribute of every matching element that carries it, in document order.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::InvalidSelector`] if `selector` does not parse.
    pub fn all_attributes(&self, selector: &str, name: &str) -> Result<Vec<String>, ScraperError> {
        self.select(selector, |matches| {
            matches
                .filter_map(|el| el.value().attr(name))
                .map(str::to_string)
                .collect()
        })
    }

    /// Trimmed text content of the first matching element.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::InvalidSelector`] if `selector` does not parse.
    pub fn text(&self, selector: &str) -> Result<Option<String>, ScraperError> {
        self.select(selector, |mut matches| matches.next().map(text_of))
    }

    /// # Errors
    ///
    /// Returns [`ScraperError::InvalidSelector`] if `selector` does not parse.
    pub fn all_text(&self, selector: &str) -> Result<Vec<String>, ScraperError> {
        self.select(selector, |matches| matches.map(text_of).collect())
    }

    fn select<T>(
        &self,
        selector: &str,
        f: impl FnOnce(scraper::html::Select<'_, '_>) -> T,
    ) -> Result<T, ScraperError> {
        let parsed = Selector::parse(selector).map_err(|e| ScraperError::InvalidSelector {
            selector: selector.to_string(),
            reason: format!("{e:?}"),
        })?;
        let document = Html::parse_document(&self.html);
        Ok(f(document.select(&parsed)))
    }
}

fn text_of(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}
