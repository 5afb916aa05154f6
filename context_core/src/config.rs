//! Engine configuration.
//!
//! Every section has sensible defaults, so an empty TOML document (or no
//! document at all) yields a working engine.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Global defaults for lore matching. Entries may override each of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldInfoSettings {
    /// How many of the most recent messages are scanned for keys.
    pub scan_depth: usize,

    /// Whether keys match case-sensitively.
    pub case_sensitive: bool,

    /// Whether plain-text keys must match whole words.
    pub match_whole_words: bool,
}

impl Default for WorldInfoSettings {
    fn default() -> Self {
        Self {
            scan_depth: 4,
            case_sensitive: false,
            match_whole_words: true,
        }
    }
}

/// Placeholders used when a macro cannot produce a value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MacroSettings {
    /// Replaces `{{roll}}` macros whose formula is not valid dice notation.
    pub invalid_roll_placeholder: String,

    /// Replaces `{{random}}` / `{{pick}}` macros with nothing to choose from.
    pub empty_list_placeholder: String,
}

/// Prefixes for the labelled prompt sections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptLabels {
    pub examples: String,
    pub scenario: String,
    pub personality: String,
    pub description: String,
}

impl Default for PromptLabels {
    fn default() -> Self {
        Self {
            examples: "Example dialogues:\n".to_string(),
            scenario: "Scenario: ".to_string(),
            personality: "Personality: ".to_string(),
            description: "Description: ".to_string(),
        }
    }
}

/// Root configuration for the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub world_info: WorldInfoSettings,
    pub macros: MacroSettings,
    pub prompt: PromptLabels,
}

impl EngineConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }
}
