// Language tags and valuable-token extraction.
//
// Ingestion normally delivers articles with their significant terms already
// extracted. When it doesn't, `extract_valuable_tokens` produces an
// equivalent bag of terms from the title and content: markup and URLs are
// stripped, text is split on anything that isn't a letter or digit, and stop
// words for the article's language are dropped.

use std::sync::OnceLock;

use regex_lite::Regex;
use stop_words::{get, LANGUAGE};

/// Shortest token worth keeping.
const MIN_TOKEN_CHARS: usize = 3;

/// Primary language subtag: the lowercase part before any region qualifier.
///
/// "en_US", "en-GB" and "EN" all yield "en".
pub fn primary_subtag(lang: &str) -> String {
    lang.trim()
        .split(['_', '-'])
        .next()
        .unwrap_or_default()
        .to_lowercase()
}

/// Stop word list for a language tag, falling back to English for
/// languages we don't carry a list for.
pub fn stop_words_for(lang: &str) -> Vec<String> {
    let language = match primary_subtag(lang).as_str() {
        "fr" => LANGUAGE::French,
        "de" => LANGUAGE::German,
        "es" => LANGUAGE::Spanish,
        "it" => LANGUAGE::Italian,
        "pt" => LANGUAGE::Portuguese,
        "nl" => LANGUAGE::Dutch,
        _ => LANGUAGE::English,
    };
    get(language)
}

fn noise_pattern() -> &'static Regex {
    static NOISE: OnceLock<Regex> = OnceLock::new();
    // Tags, entities, and bare URLs carry no story signal
    NOISE.get_or_init(|| {
        Regex::new(r"<[^>]*>|&[#a-zA-Z0-9]+;|(?:https?|ftp)://\S+").expect("Invalid regex")
    })
}

/// Extract significant lowercase terms from an article's title and content.
///
/// Order follows the text and repeats are kept, so term frequency survives
/// into the similarity model.
pub fn extract_valuable_tokens(title: &str, content: &str, lang: &str) -> Vec<String> {
    let stop_words = stop_words_for(lang);
    let text = format!("{title} {content}");
    let cleaned = noise_pattern().replace_all(&text, " ");

    cleaned
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| word.chars().count() >= MIN_TOKEN_CHARS)
        .filter(|word| !word.chars().all(|c| c.is_numeric()))
        .map(str::to_lowercase)
        .filter(|word| !stop_words.contains(word))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primary_subtag() {
        assert_eq!(primary_subtag("en_US"), "en");
        assert_eq!(primary_subtag("en-GB"), "en");
        assert_eq!(primary_subtag("FR"), "fr");
        assert_eq!(primary_subtag(""), "");
    }

    #[test]
    fn test_extract_drops_stop_words_and_noise() {
        let tokens = extract_valuable_tokens(
            "The storm hits the region",
            "<p>Flooding reported in 2024, see https://example.com/storm &amp; more</p>",
            "en_US",
        );
        assert!(tokens.contains(&"storm".to_string()));
        assert!(tokens.contains(&"region".to_string()));
        assert!(tokens.contains(&"flooding".to_string()));
        assert!(!tokens.contains(&"the".to_string()));
        assert!(!tokens.contains(&"2024".to_string()));
        assert!(!tokens.iter().any(|t| t == "https" || t == "amp" || t == "example"));
    }

    #[test]
    fn test_extract_keeps_repeats_and_unicode() {
        let tokens = extract_valuable_tokens("Tempête", "La tempête frappe la côte", "fr");
        assert_eq!(tokens.iter().filter(|t| *t == "tempête").count(), 2);
        assert!(tokens.contains(&"côte".to_string()));
    }

    #[test]
    fn test_extract_empty_text() {
        assert!(extract_valuable_tokens("", "", "en").is_empty());
    }
}
