//! Keyword matchers for lore entries.

use regex::{Regex, RegexBuilder};

use crate::regex_pipeline::RegexLiteral;

/// A compiled lore key.
///
/// Keys written as `/pattern/flags` are used as regular expressions.
/// Anything else is matched literally, optionally on word boundaries.
#[derive(Debug, Clone)]
pub struct KeyMatcher {
    key: String,
    regex: Regex,
}

impl KeyMatcher {
    /// Compile `key`. Empty keys and invalid regex literals yield `None`.
    pub fn compile(key: &str, case_sensitive: bool, match_whole_words: bool) -> Option<Self> {
        if key.is_empty() {
            return None;
        }

        if let Some(literal) = RegexLiteral::parse(key) {
            let mut builder = literal.builder();
            if !case_sensitive {
                builder.case_insensitive(true);
            }
            return builder.build().ok().map(|regex| Self {
                key: key.to_string(),
                regex,
            });
        }

        let regex = RegexBuilder::new(&plain_pattern(key, match_whole_words))
            .case_insensitive(!case_sensitive)
            .build()
            .ok()?;
        Some(Self {
            key: key.to_string(),
            regex,
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

/// Word boundaries are only added next to ASCII word characters, so keys
/// like `C++` or CJK phrases still match inside running text.
fn plain_pattern(key: &str, match_whole_words: bool) -> String {
    let escaped = regex::escape(key);
    if !match_whole_words {
        return escaped;
    }

    let is_word = |c: Option<char>| c.map_or(false, |c| c.is_ascii_alphanumeric() || c == '_');
    let lead = if is_word(key.chars().next()) { r"\b" } else { "" };
    let trail = if is_word(key.chars().last()) { r"\b" } else { "" };
    format!("{lead}{escaped}{trail}")
}

/// Compile every key, dropping the ones that cannot be matched.
pub fn compile_keys<S: AsRef<str>>(
    keys: &[S],
    case_sensitive: bool,
    match_whole_words: bool,
) -> Vec<KeyMatcher> {
    keys.iter()
        .filter_map(|k| KeyMatcher::compile(k.as_ref(), case_sensitive, match_whole_words))
        .collect()
}
