//! Card rules: the small enumerated vocabularies a card uses to steer
//! lore matching, lore placement and regex script stages.
//!
//! Cards in the wild encode these either as integers or as names, so every
//! enum here deserializes from both and serializes back to its canonical
//! form.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Raw encoding of an enumerated card field.
#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrName {
    Number(i64),
    Name(String),
}

/// Lowercase a name and strip separators so `AND_ANY`, `andAny` and
/// `and-any` all compare equal.
fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '_' | '-' | ' '))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Boolean combinator applied to a lore entry's secondary keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SelectiveLogic {
    /// At least one secondary key must match.
    #[default]
    AndAny,
    /// At least one secondary key must be missing.
    NotAll,
    /// No secondary key may match.
    NotAny,
    /// Every secondary key must match.
    AndAll,
}

impl SelectiveLogic {
    pub fn code(&self) -> u8 {
        match self {
            SelectiveLogic::AndAny => 0,
            SelectiveLogic::NotAll => 1,
            SelectiveLogic::NotAny => 2,
            SelectiveLogic::AndAll => 3,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(SelectiveLogic::AndAny),
            1 => Some(SelectiveLogic::NotAll),
            2 => Some(SelectiveLogic::NotAny),
            3 => Some(SelectiveLogic::AndAll),
            _ => None,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match normalize(name).as_str() {
            "andany" => Some(SelectiveLogic::AndAny),
            "notall" => Some(SelectiveLogic::NotAll),
            "notany" => Some(SelectiveLogic::NotAny),
            "andall" => Some(SelectiveLogic::AndAll),
            _ => None,
        }
    }

    /// Combine per-key match results according to this logic.
    pub fn evaluate(&self, mut matches: impl Iterator<Item = bool>) -> bool {
        match self {
            SelectiveLogic::AndAny => matches.any(|m| m),
            SelectiveLogic::AndAll => matches.all(|m| m),
            SelectiveLogic::NotAny => !matches.any(|m| m),
            SelectiveLogic::NotAll => !matches.all(|m| m),
        }
    }
}

/// Where an activated lore entry is placed in the assembled prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum LorePosition {
    /// Before the character description.
    #[default]
    BeforeChar,
    /// After the character description.
    AfterChar,
    /// Above the author's note.
    AuthorsNoteTop,
    /// Below the author's note.
    AuthorsNoteBottom,
    /// Spliced into the chat log at the entry's depth.
    AtDepth,
    /// Before the example dialogues.
    ExamplesTop,
    /// After the example dialogues.
    ExamplesBottom,
}

impl LorePosition {
    pub fn code(&self) -> u8 {
        match self {
            LorePosition::BeforeChar => 0,
            LorePosition::AfterChar => 1,
            LorePosition::AuthorsNoteTop => 2,
            LorePosition::AuthorsNoteBottom => 3,
            LorePosition::AtDepth => 4,
            LorePosition::ExamplesTop => 5,
            LorePosition::ExamplesBottom => 6,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(LorePosition::BeforeChar),
            1 => Some(LorePosition::AfterChar),
            2 => Some(LorePosition::AuthorsNoteTop),
            3 => Some(LorePosition::AuthorsNoteBottom),
            4 => Some(LorePosition::AtDepth),
            5 => Some(LorePosition::ExamplesTop),
            6 => Some(LorePosition::ExamplesBottom),
            _ => None,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match normalize(name).as_str() {
            "before" | "beforechar" => Some(LorePosition::BeforeChar),
            "after" | "afterchar" => Some(LorePosition::AfterChar),
            "antop" | "authorsnotetop" => Some(LorePosition::AuthorsNoteTop),
            "anbottom" | "authorsnotebottom" => Some(LorePosition::AuthorsNoteBottom),
            "atdepth" | "depth" => Some(LorePosition::AtDepth),
            "emtop" | "examplestop" => Some(LorePosition::ExamplesTop),
            "embottom" | "examplesbottom" => Some(LorePosition::ExamplesBottom),
            _ => None,
        }
    }
}

/// Speaker role attached to injected prompt text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PromptRole {
    #[default]
    System,
    User,
    Assistant,
}

impl PromptRole {
    pub fn code(&self) -> u8 {
        match self {
            PromptRole::System => 0,
            PromptRole::User => 1,
            PromptRole::Assistant => 2,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(PromptRole::System),
            1 => Some(PromptRole::User),
            2 => Some(PromptRole::Assistant),
            _ => None,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match normalize(name).as_str() {
            "system" => Some(PromptRole::System),
            "user" => Some(PromptRole::User),
            "assistant" | "char" | "model" => Some(PromptRole::Assistant),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PromptRole::System => "system",
            PromptRole::User => "user",
            PromptRole::Assistant => "assistant",
        }
    }
}

impl fmt::Display for PromptRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pipeline stage a regex script is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegexPlacement {
    /// Deprecated markdown display stage, kept so old cards still load.
    MarkdownDisplay,
    UserInput,
    AiOutput,
    SlashCommand,
    /// Legacy "send as" stage.
    SendAs,
    WorldInfo,
}

impl RegexPlacement {
    pub fn code(&self) -> u8 {
        match self {
            RegexPlacement::MarkdownDisplay => 0,
            RegexPlacement::UserInput => 1,
            RegexPlacement::AiOutput => 2,
            RegexPlacement::SlashCommand => 3,
            RegexPlacement::SendAs => 4,
            RegexPlacement::WorldInfo => 5,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(RegexPlacement::MarkdownDisplay),
            1 => Some(RegexPlacement::UserInput),
            2 => Some(RegexPlacement::AiOutput),
            3 => Some(RegexPlacement::SlashCommand),
            4 => Some(RegexPlacement::SendAs),
            5 => Some(RegexPlacement::WorldInfo),
            _ => None,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match normalize(name).as_str() {
            "mddisplay" | "markdowndisplay" => Some(RegexPlacement::MarkdownDisplay),
            "userinput" => Some(RegexPlacement::UserInput),
            "aioutput" => Some(RegexPlacement::AiOutput),
            "slashcommand" => Some(RegexPlacement::SlashCommand),
            "sendas" => Some(RegexPlacement::SendAs),
            "worldinfo" | "lore" => Some(RegexPlacement::WorldInfo),
            _ => None,
        }
    }
}

macro_rules! deserialize_number_or_name {
    ($ty:ident, $what:literal) => {
        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let parsed = match NumberOrName::deserialize(deserializer)? {
                    NumberOrName::Number(code) => $ty::from_code(code),
                    NumberOrName::Name(name) => $ty::from_name(&name),
                };
                parsed.ok_or_else(|| serde::de::Error::custom(concat!("unknown ", $what)))
            }
        }
    };
}

deserialize_number_or_name!(SelectiveLogic, "selective logic");
deserialize_number_or_name!(LorePosition, "lore position");
deserialize_number_or_name!(RegexPlacement, "regex placement");
deserialize_number_or_name!(PromptRole, "prompt role");

impl Serialize for SelectiveLogic {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

impl Serialize for LorePosition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

impl Serialize for RegexPlacement {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

impl Serialize for PromptRole {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}
