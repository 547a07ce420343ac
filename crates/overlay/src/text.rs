use std::sync::OnceLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;

/// Normalize analyzed text for label and term comparison.
///
/// Applies unicode NFC normalization, ligature replacement, lower-casing,
/// punctuation removal, and whitespace collapsing. Label text like
/// `"Patient Name:"` normalizes to `"patient name"`, so synonym phrasings
/// match regardless of trailing colons or spacing.
pub fn normalize_text(text: &str) -> String {
    let mut result: String = text.nfc().collect();

    // Fix ligatures (fi, fl, ffi, ffl) before lower-casing.
    let ligatures = [
        ("\u{FB00}", "ff"),
        ("\u{FB01}", "fi"),
        ("\u{FB02}", "fl"),
        ("\u{FB03}", "ffi"),
        ("\u{FB04}", "ffl"),
    ];
    for (lig, replacement) in &ligatures {
        result = result.replace(lig, replacement);
    }

    result = result.to_lowercase();

    // Strip punctuation, keep word characters and whitespace.
    static RE_PUNCT: OnceLock<Regex> = OnceLock::new();
    let re_punct = RE_PUNCT.get_or_init(|| Regex::new(r"[^\w\s]").unwrap());
    result = re_punct.replace_all(&result, "").to_string();

    // Collapse runs of whitespace to single spaces.
    static RE_SPACES: OnceLock<Regex> = OnceLock::new();
    let re_spaces = RE_SPACES.get_or_init(|| Regex::new(r"\s+").unwrap());
    result = re_spaces.replace_all(&result, " ").to_string();

    result.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passthrough() {
        assert_eq!(normalize_text("patient name"), "patient name");
    }

    #[test]
    fn test_lowercase_and_punctuation() {
        assert_eq!(normalize_text("Patient Name:"), "patient name");
    }

    #[test]
    fn test_whitespace_collapse() {
        assert_eq!(normalize_text("Date  of \t Birth"), "date of birth");
    }

    #[test]
    fn test_ligature_fix() {
        assert_eq!(normalize_text("\u{FB01}rst name"), "first name");
    }

    #[test]
    fn test_nfc_normalization() {
        // e + combining acute should normalize to the composed form.
        assert_eq!(normalize_text("nam\u{0065}\u{0301}"), "nam\u{00E9}");
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(normalize_text(""), "");
    }

    #[test]
    fn test_hyphenated_term() {
        // "e-mail" loses its hyphen, matching the stock "email" phrasing.
        assert_eq!(normalize_text("E-Mail Address:"), "email address");
    }
}
