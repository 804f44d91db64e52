use itertools::Itertools;
use std::collections::HashSet;
use std::sync::Arc;

/// Splits text into index terms.
///
/// Text is split on every character that is not alphanumeric, lower-cased,
/// and stripped of stop words. Terms keep their first-occurrence order and
/// appear once.
#[derive(Clone, Default)]
pub struct Tokenizer {
    stop_words: Arc<HashSet<String>>,
}

impl Tokenizer {
    pub fn new(stop_words: HashSet<String>) -> Self {
        Tokenizer {
            stop_words: Arc::new(stop_words),
        }
    }

    pub fn tokenize(&self, text: &str) -> Vec<String> {
        text.split(|c: char| !c.is_alphanumeric())
            .filter(|word| !word.is_empty())
            .map(|word| word.to_lowercase())
            .filter(|word| !self.stop_words.contains(word))
            .unique()
            .collect()
    }

    pub fn is_stop_word(&self, word: &str) -> bool {
        self.stop_words.contains(&word.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenizer(words: &[&str]) -> Tokenizer {
        Tokenizer::new(words.iter().map(|w| w.to_string()).collect())
    }

    #[test]
    fn drops_stop_words() {
        let tokenizer = tokenizer(&["the"]);
        assert_eq!(tokenizer.tokenize("the quick fox"), vec!["quick", "fox"]);
        assert!(tokenizer.tokenize("the").is_empty());
    }

    #[test]
    fn splits_on_non_alphanumerics_and_lower_cases() {
        let tokenizer = tokenizer(&[]);
        assert_eq!(
            tokenizer.tokenize("Hello, World! e-mail_2go"),
            vec!["hello", "world", "e", "mail", "2go"]
        );
    }

    #[test]
    fn stop_words_match_any_case() {
        let tokenizer = tokenizer(&["the", "a"]);
        assert_eq!(tokenizer.tokenize("The Fox and A Dog"), vec!["fox", "and", "dog"]);
        assert!(tokenizer.is_stop_word("THE"));
    }

    #[test]
    fn repeated_words_appear_once() {
        let tokenizer = tokenizer(&[]);
        assert_eq!(tokenizer.tokenize("fox Fox FOX den"), vec!["fox", "den"]);
    }

    #[test]
    fn unicode_letters_are_kept() {
        let tokenizer = tokenizer(&[]);
        assert_eq!(tokenizer.tokenize("Über café"), vec!["über", "café"]);
        assert!(tokenizer.tokenize("  ,;  ").is_empty());
    }
}
