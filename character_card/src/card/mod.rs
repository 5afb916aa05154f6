//! Character definitions - the static half of a playable character.

mod lore;
mod regex_script;

pub use lore::*;
pub use regex_script::*;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::rules::PromptRole;

/// Errors raised while decoding card data.
#[derive(Debug, Error)]
pub enum CardError {
    #[error("Invalid card JSON: {0}")]
    Json(#[from] serde_json::Error),
}

fn default_depth_prompt_depth() -> i64 {
    4
}

/// The character's author's note: a single prompt injected at a fixed depth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepthPrompt {
    #[serde(default = "default_depth_prompt_depth")]
    pub depth: i64,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub role: PromptRole,
}

impl Default for DepthPrompt {
    fn default() -> Self {
        Self {
            depth: default_depth_prompt_depth(),
            prompt: String::new(),
            role: PromptRole::System,
        }
    }
}

/// A full character definition as produced by the card loader.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CharacterDefinition {
    pub name: String,
    #[serde(alias = "character_version")]
    pub character_version: String,
    #[serde(alias = "creator_notes")]
    pub creator_notes: String,

    #[serde(alias = "system_prompt")]
    pub system_prompt: String,
    pub personality: String,
    pub scenario: String,
    pub description: String,

    /// Example dialogues, separated by `<START>` markers.
    #[serde(alias = "mes_example")]
    pub mes_example: String,

    #[serde(alias = "first_mes")]
    pub first_message: String,
    #[serde(alias = "alternate_greetings")]
    pub alternate_greetings: Vec<String>,
    #[serde(alias = "group_greetings")]
    pub group_greetings: Vec<String>,

    /// How eager the character is to speak in group chats.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub talkativeness: Option<f64>,

    #[serde(alias = "depth_prompt", skip_serializing_if = "Option::is_none")]
    pub depth_prompt: Option<DepthPrompt>,

    #[serde(alias = "regex_scripts")]
    pub regex_scripts: Vec<RegexScript>,

    #[serde(alias = "lore_entries")]
    pub lore_entries: Vec<LoreEntry>,

    /// Embedded lore book; `from_json` moves its entries into `lore_entries`.
    #[serde(alias = "character_book", skip_serializing_if = "Option::is_none")]
    pub character_book: Option<LoreBook>,
}

impl CharacterDefinition {
    /// Create an empty character with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Decode a character from its JSON form, folding an embedded lore
    /// book into the lore entries.
    pub fn from_json(json: &str) -> Result<Self, CardError> {
        let mut character: Self = serde_json::from_str(json)?;
        if let Some(book) = character.character_book.take() {
            character = character.with_lore_book(book);
        }
        Ok(character)
    }

    pub fn with_lore(mut self, entry: LoreEntry) -> Self {
        self.lore_entries.push(entry);
        self
    }

    /// Append every entry of `book` after the existing lore.
    pub fn with_lore_book(mut self, book: LoreBook) -> Self {
        self.lore_entries.extend(book.entries);
        self
    }

    pub fn with_regex_script(mut self, script: RegexScript) -> Self {
        self.regex_scripts.push(script);
        self
    }

    pub fn with_depth_prompt(mut self, depth: i64, prompt: impl Into<String>, role: PromptRole) -> Self {
        self.depth_prompt = Some(DepthPrompt {
            depth,
            prompt: prompt.into(),
            role,
        });
        self
    }

    /// First message followed by the alternates, skipping empty ones.
    pub fn greetings(&self) -> Vec<&str> {
        std::iter::once(self.first_message.as_str())
            .chain(self.alternate_greetings.iter().map(String::as_str))
            .filter(|g| !g.is_empty())
            .collect()
    }

    /// Group greetings with duplicates and empty ones removed, first occurrence wins.
    pub fn unique_group_greetings(&self) -> Vec<&str> {
        let mut seen = std::collections::HashSet::new();
        self.group_greetings
            .iter()
            .map(String::as_str)
            .filter(|g| !g.is_empty() && seen.insert(*g))
            .collect()
    }

    /// The author's note text, when the card defines a non-empty one.
    pub fn authors_note(&self) -> Option<&DepthPrompt> {
        self.depth_prompt.as_ref().filter(|d| !d.prompt.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_character() {
        let character = CharacterDefinition::new("Seraphina");
        assert_eq!(character.name, "Seraphina");
        assert!(character.lore_entries.is_empty());
        assert!(character.authors_note().is_none());
    }

    #[test]
    fn test_greetings_skip_empty() {
        let mut character = CharacterDefinition::new("A");
        character.first_message = String::new();
        character.alternate_greetings = vec!["Hi".into(), String::new(), "Hey".into()];

        assert_eq!(character.greetings(), vec!["Hi", "Hey"]);
    }

    #[test]
    fn test_group_greetings_deduplicated() {
        let mut character = CharacterDefinition::new("A");
        character.group_greetings = vec!["Hello all".into(), "Yo".into(), "Hello all".into()];

        assert_eq!(character.unique_group_greetings(), vec!["Hello all", "Yo"]);
    }

    #[test]
    fn test_from_json_with_snake_case_fields() {
        let json = r#"{
            "name": "Seraphina",
            "system_prompt": "Stay in character.",
            "first_mes": "Welcome, traveler.",
            "mes_example": "<START>\n{{user}}: Hi\n{{char}}: Hello",
            "depth_prompt": {"depth": 2, "prompt": "Be kind.", "role": "system"},
            "lore_entries": [{"keys": ["forest"], "content": "The forest is ancient."}]
        }"#;
        let character = CharacterDefinition::from_json(json).unwrap();

        assert_eq!(character.system_prompt, "Stay in character.");
        assert_eq!(character.first_message, "Welcome, traveler.");
        assert_eq!(character.authors_note().map(|d| d.depth), Some(2));
        assert_eq!(character.lore_entries.len(), 1);
    }

    #[test]
    fn test_from_json_folds_character_book() {
        let json = r#"{
            "name": "Seraphina",
            "lore_entries": [{"keys": ["forest"], "content": "The forest is ancient."}],
            "character_book": {
                "name": "Glade",
                "entries": [{"keys": ["glade"], "content": "The glade is sacred."}]
            }
        }"#;
        let character = CharacterDefinition::from_json(json).unwrap();

        let contents: Vec<&str> = character.lore_entries.iter().map(|e| e.content.as_str()).collect();
        assert_eq!(contents, vec!["The forest is ancient.", "The glade is sacred."]);
        assert!(character.character_book.is_none());
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(matches!(
            CharacterDefinition::from_json("not json"),
            Err(CardError::Json(_))
        ));
    }
}
