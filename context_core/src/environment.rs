//! The per-request substitution environment (`{{char}}`, `{{user}}`, ...).

use std::fmt;
use std::sync::Arc;

/// A substitution value: either fixed text or a function producing it on demand.
#[derive(Clone)]
pub enum EnvValue {
    Text(String),
    Computed(Arc<dyn Fn() -> String + Send + Sync>),
}

impl EnvValue {
    /// Produce the text, invoking the function for computed values.
    pub fn resolve(&self) -> String {
        match self {
            EnvValue::Text(text) => text.clone(),
            EnvValue::Computed(f) => f(),
        }
    }
}

impl fmt::Debug for EnvValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnvValue::Text(text) => f.debug_tuple("Text").field(text).finish(),
            EnvValue::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

impl From<&str> for EnvValue {
    fn from(text: &str) -> Self {
        EnvValue::Text(text.to_string())
    }
}

impl From<String> for EnvValue {
    fn from(text: String) -> Self {
        EnvValue::Text(text)
    }
}

/// Immutable-per-request map of named substitution values.
///
/// Insertion order is preserved; it is the order `{{key}}` substitutions run in.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    entries: Vec<(String, EnvValue)>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    /// The conventional environment for playing a character.
    pub fn for_character(
        char_name: impl Into<String>,
        user_name: impl Into<String>,
        model: impl Into<String>,
        char_version: impl Into<String>,
    ) -> Self {
        let version = char_version.into();
        Self::new()
            .with("char", char_name.into())
            .with("user", user_name.into())
            .with("model", model.into())
            .with("charVersion", version.clone())
            .with("char_version", version)
    }

    /// Add or replace a value.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<EnvValue>) -> Self {
        self.set(key, value);
        self
    }

    /// Add or replace a value computed on every lookup.
    pub fn with_computed<F>(self, key: impl Into<String>, f: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        self.with(key, EnvValue::Computed(Arc::new(f)))
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<EnvValue>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Resolve a value by its exact key.
    pub fn get(&self, key: &str) -> Option<String> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.resolve())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &EnvValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_for_character() {
        let env = Environment::for_character("Alice", "Bob", "gpt", "1.2");

        assert_eq!(env.get("char").as_deref(), Some("Alice"));
        assert_eq!(env.get("user").as_deref(), Some("Bob"));
        assert_eq!(env.get("charVersion").as_deref(), Some("1.2"));
        assert_eq!(env.get("char_version").as_deref(), Some("1.2"));
        assert_eq!(env.len(), 5);
    }

    #[test]
    fn test_set_replaces_existing_key() {
        let mut env = Environment::new().with("user", "Bob");
        env.set("user", "Carol");

        assert_eq!(env.len(), 1);
        assert_eq!(env.get("user").as_deref(), Some("Carol"));
    }

    #[test]
    fn test_computed_values_resolve_lazily() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let env = Environment::new().with_computed("group", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            "Alice, Bob".to_string()
        });

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(env.get("group").as_deref(), Some("Alice, Bob"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
