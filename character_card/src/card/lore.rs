//! Lore ("world info") entries - keyword-triggered blocks of context text.

use serde::{Deserialize, Serialize};

use crate::rules::{LorePosition, PromptRole, SelectiveLogic};

fn default_true() -> bool {
    true
}

fn default_insertion_order() -> i64 {
    100
}

fn default_depth() -> i64 {
    4
}

fn default_probability() -> f64 {
    100.0
}

/// A single lore entry.
///
/// Entries are loaded once per character and never mutated by the engine:
/// activation works on clones, so the canonical entry stays intact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoreEntry {
    #[serde(default)]
    pub id: i64,

    /// Primary trigger keys. Plain text or `/regex/flags` literals.
    #[serde(default, alias = "key")]
    pub keys: Vec<String>,

    /// Secondary keys combined through `selective_logic`.
    #[serde(default, rename = "secondary_keys", alias = "secondaryKeys", alias = "keysecondary")]
    pub secondary_keys: Vec<String>,

    /// Free-form author comment, never sent to the model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    #[serde(default)]
    pub content: String,

    /// Constant entries are active regardless of keys.
    #[serde(default)]
    pub constant: bool,

    #[serde(default)]
    pub selective: bool,

    #[serde(default, alias = "selective_logic")]
    pub selective_logic: SelectiveLogic,

    #[serde(default = "default_insertion_order", rename = "insertion_order", alias = "insertionOrder", alias = "order")]
    pub insertion_order: i64,

    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Placement in the prompt. `None` means "use the default placement".
    #[serde(default)]
    pub position: Option<LorePosition>,

    /// Insertion depth for `LorePosition::AtDepth` entries.
    #[serde(default = "default_depth")]
    pub depth: i64,

    /// Speaker role for `LorePosition::AtDepth` entries.
    #[serde(default)]
    pub role: Option<PromptRole>,

    /// Activation chance in percent.
    #[serde(default = "default_probability")]
    pub probability: f64,

    #[serde(default = "default_true", alias = "use_probability")]
    pub use_probability: bool,

    /// Per-entry override of the global case sensitivity.
    #[serde(default, alias = "case_sensitive")]
    pub case_sensitive: Option<bool>,

    /// Per-entry override of the global whole-word matching.
    #[serde(default, alias = "match_whole_words")]
    pub match_whole_words: Option<bool>,

    /// Per-entry override of how many recent messages are scanned.
    #[serde(default, alias = "scan_depth")]
    pub scan_depth: Option<usize>,

    /// The entry ignores text produced by other activated entries.
    #[serde(default, alias = "exclude_recursion")]
    pub exclude_recursion: bool,

    /// The entry's content never triggers other entries.
    #[serde(default, alias = "prevent_recursion")]
    pub prevent_recursion: bool,

    /// Recursion level the entry becomes eligible at.
    #[serde(default, alias = "delay_until_recursion")]
    pub delay_until_recursion: u32,

    /// Turns the entry stays active after activating.
    #[serde(default)]
    pub sticky: u32,

    /// Turns the entry stays inactive after activating.
    #[serde(default)]
    pub cooldown: u32,

    /// Minimum chat length before the entry can activate.
    #[serde(default)]
    pub delay: u32,
}

impl Default for LoreEntry {
    fn default() -> Self {
        Self {
            id: 0,
            keys: Vec::new(),
            secondary_keys: Vec::new(),
            comment: None,
            content: String::new(),
            constant: false,
            selective: false,
            selective_logic: SelectiveLogic::default(),
            insertion_order: default_insertion_order(),
            enabled: true,
            position: None,
            depth: default_depth(),
            role: None,
            probability: default_probability(),
            use_probability: true,
            case_sensitive: None,
            match_whole_words: None,
            scan_depth: None,
            exclude_recursion: false,
            prevent_recursion: false,
            delay_until_recursion: 0,
            sticky: 0,
            cooldown: 0,
            delay: 0,
        }
    }
}

impl LoreEntry {
    /// Create a new entry triggered by the given keys.
    pub fn new<I, K>(keys: I, content: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
            content: content.into(),
            ..Default::default()
        }
    }

    /// Create a constant entry that is always active.
    pub fn constant(content: impl Into<String>) -> Self {
        Self {
            constant: true,
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = id;
        self
    }

    /// Set secondary keys and the logic combining them.
    pub fn with_secondary_keys<I, K>(mut self, keys: I, logic: SelectiveLogic) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        self.secondary_keys = keys.into_iter().map(Into::into).collect();
        self.selective = true;
        self.selective_logic = logic;
        self
    }

    pub fn with_position(mut self, position: LorePosition) -> Self {
        self.position = Some(position);
        self
    }

    /// Place the entry inside the chat log at the given depth.
    pub fn at_depth(mut self, depth: i64, role: PromptRole) -> Self {
        self.position = Some(LorePosition::AtDepth);
        self.depth = depth;
        self.role = Some(role);
        self
    }

    pub fn with_insertion_order(mut self, order: i64) -> Self {
        self.insertion_order = order;
        self
    }

    /// Set the activation chance in percent.
    pub fn with_probability(mut self, probability: f64) -> Self {
        self.probability = probability.clamp(0.0, 100.0);
        self.use_probability = true;
        self
    }

    pub fn with_sticky(mut self, turns: u32) -> Self {
        self.sticky = turns;
        self
    }

    pub fn with_cooldown(mut self, turns: u32) -> Self {
        self.cooldown = turns;
        self
    }

    pub fn with_delay(mut self, messages: u32) -> Self {
        self.delay = messages;
        self
    }

    pub fn with_delay_until_recursion(mut self, level: u32) -> Self {
        self.delay_until_recursion = level;
        self
    }

    pub fn with_scan_depth(mut self, depth: usize) -> Self {
        self.scan_depth = Some(depth);
        self
    }

    pub fn with_case_sensitive(mut self, sensitive: bool) -> Self {
        self.case_sensitive = Some(sensitive);
        self
    }

    pub fn with_match_whole_words(mut self, whole_words: bool) -> Self {
        self.match_whole_words = Some(whole_words);
        self
    }

    pub fn excluding_recursion(mut self) -> Self {
        self.exclude_recursion = true;
        self
    }

    pub fn preventing_recursion(mut self) -> Self {
        self.prevent_recursion = true;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Keys may only be empty on constant entries.
    pub fn is_well_formed(&self) -> bool {
        self.constant || !self.keys.is_empty()
    }

    /// Placement with the default applied.
    pub fn effective_position(&self) -> LorePosition {
        self.position.unwrap_or_default()
    }

    /// Role with the default applied.
    pub fn effective_role(&self) -> PromptRole {
        self.role.unwrap_or_default()
    }
}

/// A named collection of lore entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoreBook {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub entries: Vec<LoreEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_builder() {
        let entry = LoreEntry::new(["dragon", "wyrm"], "Dragons hoard gold.")
            .with_secondary_keys(["cave"], SelectiveLogic::AndAll)
            .with_sticky(2)
            .with_insertion_order(10);

        assert_eq!(entry.keys, vec!["dragon", "wyrm"]);
        assert!(entry.selective);
        assert_eq!(entry.selective_logic, SelectiveLogic::AndAll);
        assert_eq!(entry.sticky, 2);
        assert_eq!(entry.insertion_order, 10);
        assert!(entry.enabled);
    }

    #[test]
    fn test_well_formed_invariant() {
        assert!(LoreEntry::constant("Always here").is_well_formed());
        assert!(LoreEntry::new(["key"], "text").is_well_formed());
        assert!(!LoreEntry::new(Vec::<String>::new(), "text").is_well_formed());
    }

    #[test]
    fn test_probability_clamping() {
        assert_eq!(LoreEntry::new(["k"], "").with_probability(150.0).probability, 100.0);
        assert_eq!(LoreEntry::new(["k"], "").with_probability(-5.0).probability, 0.0);
    }

    #[test]
    fn test_defaults_from_sparse_json() {
        let entry: LoreEntry =
            serde_json::from_str(r#"{"keys":["moon"],"content":"The moon is red."}"#).unwrap();

        assert_eq!(entry.insertion_order, 100);
        assert_eq!(entry.depth, 4);
        assert_eq!(entry.probability, 100.0);
        assert!(entry.enabled);
        assert_eq!(entry.effective_position(), LorePosition::BeforeChar);
        assert_eq!(entry.effective_role(), PromptRole::System);
    }

    #[test]
    fn test_snake_case_aliases() {
        let json = r#"{
            "keys": ["sword"],
            "secondary_keys": ["blade"],
            "content": "A sword.",
            "selective_logic": "NOT_ANY",
            "insertion_order": 5,
            "position": "after_char",
            "exclude_recursion": true,
            "delay_until_recursion": 2,
            "case_sensitive": true
        }"#;
        let entry: LoreEntry = serde_json::from_str(json).unwrap();

        assert_eq!(entry.secondary_keys, vec!["blade"]);
        assert_eq!(entry.selective_logic, SelectiveLogic::NotAny);
        assert_eq!(entry.insertion_order, 5);
        assert_eq!(entry.position, Some(LorePosition::AfterChar));
        assert!(entry.exclude_recursion);
        assert_eq!(entry.delay_until_recursion, 2);
        assert_eq!(entry.case_sensitive, Some(true));
    }
}
