use super::*;

#[test]
fn parse_count_handles_suffixes() {
    assert_eq!(parse_count("1.2k"), 1_200);
    assert_eq!(parse_count("3M"), 3_000_000);
    assert_eq!(parse_count("2.5m followers"), 2_500_000);
    assert_eq!(parse_count("10K"), 10_000);
}

#[test]
fn parse_count_reads_plain_integers() {
    assert_eq!(parse_count("542"), 542);
    assert_eq!(parse_count("12,345 posts"), 12_345);
    assert_eq!(parse_count("  87 following"), 87);
}

#[test]
fn parse_count_defaults_to_zero() {
    assert_eq!(parse_count(""), 0);
    assert_eq!(parse_count("followers"), 0);
    assert_eq!(parse_count("..k"), 0);
}

#[test]
fn parse_count_ignores_words_after_a_space() {
    // "members" starts with m but is not a suffix.
    assert_eq!(parse_count("5 members"), 5);
}

#[test]
fn extract_email_returns_first_match() {
    assert_eq!(
        extract_email("DM or mail hello@acme.studio / sales@acme.studio").as_deref(),
        Some("hello@acme.studio")
    );
    assert_eq!(extract_email("no contact here"), None);
}

#[test]
fn extract_phone_trims_and_requires_digits() {
    assert_eq!(
        extract_phone("Call +1 (555) 010-9999 today").as_deref(),
        Some("+1 (555) 010-9999")
    );
    assert_eq!(extract_phone("Open 9 to 5"), None);
    assert_eq!(extract_phone("spaced        out"), None);
}

#[test]
fn parse_count_joins_space_separated_thousands() {
    assert_eq!(parse_count("1 234 posts"), 1_234);
    assert_eq!(parse_count("1\u{a0}234"), 1_234);
    assert_eq!(parse_count("12\u{202f}345 followers"), 12_345);
}

#[test]
fn parse_count_accepts_a_spaced_suffix() {
    assert_eq!(parse_count("1.2 k"), 1_200);
    assert_eq!(parse_count("3 M"), 3_000_000);
    assert_eq!(parse_count("4,5\u{a0}k"), 4_500);
    assert_eq!(parse_count("1,234k"), 1_234_000);
}

#[test]
fn parse_count_suffix_must_stand_alone() {
    assert_eq!(parse_count("5 members"), 5);
    assert_eq!(parse_count("7 kitchens"), 7);
}
