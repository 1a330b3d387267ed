//! Text normalization shared by training and inference

use regex::Regex;
use std::sync::OnceLock;

/// Inserted for each URL before the character filter runs. The filter then
/// strips its (uppercase) letters, leaving a word boundary.
const URL_PLACEHOLDER: &str = " URL ";

fn url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"http\S+").expect("static regex"))
}

fn non_token_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^a-z0-9 ]+").expect("static regex"))
}

/// Normalize raw message text.
///
/// Order matters: lowercase, replace URLs, drop everything outside
/// `[a-z0-9 ]`, collapse whitespace, trim. The output is idempotent under
/// this function.
pub fn normalize(raw: &str) -> String {
    let lowered = raw.to_lowercase();
    let without_urls = url_regex().replace_all(&lowered, URL_PLACEHOLDER);
    let filtered = non_token_regex().replace_all(&without_urls, " ");

    filtered.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_clean(s: &str) {
        assert!(s.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == ' '));
        assert!(!s.contains("  "));
        assert_eq!(s, s.trim());
    }

    #[test]
    fn test_lowercase_and_punctuation() {
        assert_eq!(normalize("Hello, WORLD!!!"), "hello world");
    }

    #[test]
    fn test_url_removed() {
        let text = "Claim now:\nhttp://reward-1234.claim and https://x.io/a?b=1 today";
        assert_eq!(normalize(text), "claim now and today");
    }

    #[test]
    fn test_bare_http_word_kept() {
        assert_eq!(normalize("the http protocol"), "the http protocol");
    }

    #[test]
    fn test_non_ascii_stripped() {
        assert_eq!(normalize("Payment on hold – verification required"), "payment on hold verification required");
        assert_eq!(normalize("café  naïve"), "caf na ve");
    }

    #[test]
    fn test_whitespace_collapsed() {
        assert_eq!(normalize("  a\t\tb \r\n c  "), "a b c");
        assert_eq!(normalize(""), "");
        assert_eq!(normalize(" \n\t "), "");
    }

    #[test]
    fn test_idempotent() {
        let samples = [
            "SELAMAT!!! Anda menang undian nasional!\nhttp://promo-4821.click",
            "Important!\n\nYour account has detected unusual activity.",
            "httpfoo http x ht-tp:// HTTP://A.B",
            "Ünïcödé — text ½ ² with digits 12345",
            "",
        ];
        for raw in samples {
            let once = normalize(raw);
            assert_clean(&once);
            assert_eq!(normalize(&once), once, "not idempotent for {:?}", raw);
        }
    }
}
