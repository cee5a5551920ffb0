//! Text parsing helpers for profile pages.

use std::sync::LazyLock;

use regex::Regex;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\w.-]+@[\w.-]+\.\w+").expect("valid regex"));
static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\+?[\d\s()-]{7,}").expect("valid regex"));

/// Minimum digits a phone-pattern match needs to count as a phone number.
const MIN_PHONE_DIGITS: usize = 7;

/// Parses an abbreviated count such as `"1.2k"`, `"3 M"`, `"12,345 posts"` or
/// `"1 234"`.
///
/// The first numeric run in `text` is the value. Spaces (including no-break
/// spaces) between digit groups belong to the run. A standalone `k`/`K` after
/// it, with or without a space, multiplies by 1,000 and `m`/`M` by 1,000,000;
/// otherwise the run's digits are read as an integer. Empty or unparsable text
/// yields 0.
#[must_use]
pub fn parse_count(text: &str) -> i64 {
    let Some(start) = text.find(|c: char| c.is_ascii_digit()) else {
        return 0;
    };
    let mut chars = text[start..].chars().peekable();
    let mut number = String::new();
    while let Some(&c) = chars.peek() {
        if c.is_ascii_digit() || c == '.' || c == ',' {
            number.push(c);
            chars.next();
        } else if is_group_space(c) {
            // Only joins the run when another digit group follows.
            let mut ahead = chars.clone();
            while ahead.peek().is_some_and(|c| is_group_space(*c)) {
                ahead.next();
            }
            if !ahead.peek().is_some_and(char::is_ascii_digit) {
                break;
            }
            chars = ahead;
        } else {
            break;
        }
    }

    while chars.peek().is_some_and(|c| c.is_whitespace()) {
        chars.next();
    }
    let suffix = chars.next();
    let standalone = !chars.next().is_some_and(char::is_alphabetic);
    let multiplier = match suffix {
        Some('k' | 'K') if standalone => Some(1_000.0),
        Some('m' | 'M') if standalone => Some(1_000_000.0),
        _ => None,
    };

    match multiplier {
        Some(multiplier) => decimal_value(&number)
            .map_or(0, |value| round_to_i64(value * multiplier)),
        None => {
            let digits: String = number.chars().filter(char::is_ascii_digit).collect();
            digits.parse::<i64>().unwrap_or(0)
        }
    }
}

fn is_group_space(c: char) -> bool {
    matches!(c, ' ' | '\u{a0}' | '\u{202f}')
}

/// Reads the leading number of an abbreviated count. A lone comma that is not
/// followed by exactly three digits is a decimal comma (`"1,2"`).
fn decimal_value(number: &str) -> Option<f64> {
    let normalized = match number.rsplit_once(',') {
        Some((whole, fraction))
            if !number.contains('.') && !whole.contains(',') && fraction.len() != 3 =>
        {
            format!("{whole}.{fraction}")
        }
        _ => number.replace(',', ""),
    };
    normalized.parse::<f64>().ok()
}

#[allow(clippy::cast_possible_truncation)] // follower counts are far below i64::MAX
fn round_to_i64(value: f64) -> i64 {
    value.round() as i64
}

/// First email-looking token in `text`.
#[must_use]
pub fn extract_email(text: &str) -> Option<String> {
    EMAIL_RE.find(text).map(|m| m.as_str().to_string())
}

/// First phone-looking run in `text`, trimmed.
///
/// Matches made only of spacing and punctuation are skipped.
#[must_use]
pub fn extract_phone(text: &str) -> Option<String> {
    PHONE_RE
        .find_iter(text)
        .map(|m| m.as_str().trim())
        .find(|candidate| candidate.chars().filter(char::is_ascii_digit).count() >= MIN_PHONE_DIGITS)
        .map(str::to_string)
}

#[cfg(test)]
#[path = "parse_test.rs"]
mod tests;
