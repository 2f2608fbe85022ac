//! Query normalization for stable cache matching.
//!
//! A normalized query is lowercase, contains only alphanumeric words separated
//! by single spaces, and has no stop words. The same form is used to build the
//! fingerprint and as the synonym lookup key.

/// Words dropped from every query before matching.
const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "at", "by", "can", "do", "for", "from", "get", "how", "i", "in", "is", "me", "my", "near",
    "of", "on", "or", "the", "to", "what", "where", "with",
];

fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.contains(&word)
}

/// Canonicalize a free-text query.
///
/// Lowercases, trims, splits on whitespace, strips punctuation from each word,
/// then drops stop words and empty words. Stop words are checked after
/// punctuation is stripped, so `"the,"` is dropped too and the function is
/// idempotent.
pub fn normalize_query(text: &str) -> String {
    text.trim()
        .to_lowercase()
        .split_whitespace()
        .map(|word| word.chars().filter(|c| c.is_alphanumeric()).collect::<String>())
        .filter(|word| !word.is_empty() && !is_stop_word(word))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_basic() {
        assert_eq!(normalize_query("  The Passport   Application "), "passport application");
        assert_eq!(normalize_query("passport application"), "passport application");
    }

    #[test]
    fn test_normalize_strips_punctuation() {
        assert_eq!(normalize_query("Driver's License, renewal!"), "drivers license renewal");
    }

    #[test]
    fn test_normalize_stop_word_with_punctuation() {
        assert_eq!(normalize_query("where is the, DMV?"), "dmv");
    }

    #[test]
    fn test_normalize_collapses_whitespace() {
        assert_eq!(normalize_query("birth\t\tcertificate \n copy"), "birth certificate copy");
    }

    #[test]
    fn test_normalize_only_stop_words() {
        assert_eq!(normalize_query("how do i get to the"), "");
        assert_eq!(normalize_query("   "), "");
    }

    #[test]
    fn test_normalize_idempotent() {
        let inputs = [
            "  The Passport   Application ",
            "How do I renew my D.L. in Texas?",
            "the, the. a! an?",
            "Ünïcode Straße apply",
            "food-stamps / SNAP benefits",
        ];
        for input in inputs {
            let once = normalize_query(input);
            assert_eq!(normalize_query(&once), once, "not idempotent for {input:?}");
        }
    }
}
