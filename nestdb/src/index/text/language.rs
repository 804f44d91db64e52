use crate::common::DEFAULT_LANGUAGE_TAG;
use crate::errors::{ErrorKind, NestError, NestResult};
use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// A source of stop words for one language.
pub trait Language: Send + Sync {
    /// Tag the language is registered under, such as `en`.
    fn language_tag(&self) -> &str;

    /// Lower-case words dropped from full-text indices.
    fn stop_words(&self) -> HashSet<String>;
}

static ENGLISH_STOP_WORDS: Lazy<HashSet<String>> = Lazy::new(|| {
    [
        "a", "about", "above", "after", "again", "against", "all", "am", "an", "and", "any",
        "are", "as", "at", "be", "because", "been", "before", "being", "below", "between",
        "both", "but", "by", "can", "could", "did", "do", "does", "doing", "down", "during",
        "each", "few", "for", "from", "further", "had", "has", "have", "having", "he", "her",
        "here", "hers", "herself", "him", "himself", "his", "how", "i", "if", "in", "into",
        "is", "it", "its", "itself", "just", "me", "more", "most", "my", "myself", "no", "nor",
        "not", "now", "of", "off", "on", "once", "only", "or", "other", "our", "ours",
        "ourselves", "out", "over", "own", "same", "she", "should", "so", "some", "such",
        "than", "that", "the", "their", "theirs", "them", "themselves", "then", "there",
        "these", "they", "this", "those", "through", "to", "too", "under", "until", "up",
        "very", "was", "we", "were", "what", "when", "where", "which", "while", "who", "whom",
        "why", "will", "with", "would", "you", "your", "yours", "yourself", "yourselves",
    ]
    .iter()
    .map(|word| word.to_string())
    .collect()
});

pub struct English;

impl Language for English {
    fn language_tag(&self) -> &str {
        DEFAULT_LANGUAGE_TAG
    }

    fn stop_words(&self) -> HashSet<String> {
        ENGLISH_STOP_WORDS.clone()
    }
}

/// A caller supplied stop-word table.
#[derive(Debug, Clone)]
pub struct CustomLanguage {
    tag: String,
    stop_words: HashSet<String>,
}

impl CustomLanguage {
    pub fn new<I, S>(tag: &str, stop_words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        CustomLanguage {
            tag: tag.to_string(),
            stop_words: stop_words
                .into_iter()
                .map(|word| word.as_ref().to_lowercase())
                .collect(),
        }
    }
}

impl Language for CustomLanguage {
    fn language_tag(&self) -> &str {
        &self.tag
    }

    fn stop_words(&self) -> HashSet<String> {
        self.stop_words.clone()
    }
}

/// Languages known to a database, looked up by tag.
#[derive(Clone)]
pub struct LanguageRegistry {
    languages: HashMap<String, Arc<dyn Language>>,
}

impl LanguageRegistry {
    pub fn new() -> Self {
        let mut registry = LanguageRegistry {
            languages: HashMap::new(),
        };
        registry.register(English);
        registry
    }

    /// Adds `language`, replacing any language with the same tag.
    pub fn register<L: Language + 'static>(&mut self, language: L) {
        log::debug!("Registering language {}", language.language_tag());
        self.languages
            .insert(language.language_tag().to_string(), Arc::new(language));
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.languages.contains_key(tag)
    }

    pub fn stop_words(&self, tag: &str) -> NestResult<HashSet<String>> {
        match self.languages.get(tag) {
            Some(language) => Ok(language.stop_words()),
            None => {
                log::error!("Language {} is not registered", tag);
                Err(NestError::new(
                    &format!("Language {} is not registered", tag),
                    ErrorKind::InvalidOperation,
                ))
            }
        }
    }
}

impl Default for LanguageRegistry {
    fn default() -> Self {
        Self::new()
    }
}
