//! Prompt Assembler - turns a character, activated lore and a chat log into
//! a structured prompt.
//!
//! The assembly works as follows:
//! 1. **Evaluation**: Static character fields are macro-evaluated
//! 2. **Bucketing**: Activated lore is regex-processed and sorted into
//!    position buckets
//! 3. **Author's note**: The depth prompt is wrapped by its lore buckets
//! 4. **Injection**: At-depth lore and the author's note become synthetic
//!    chat messages addressed by depth
//! 5. **Sections**: Everything else becomes ordered, labelled prompt sections

pub mod template;

pub use template::{render_template, render_value};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use character_card::{CharacterDefinition, ChatMessage, ChatRole, LoreEntry, LorePosition, PromptRole};

use crate::config::{EngineConfig, PromptLabels};
use crate::environment::Environment;
use crate::lore::LoreActivator;
use crate::macros::MacroEvaluator;
use crate::memory::{ChatMemory, VariableStore};
use crate::regex_pipeline::{RegexPipeline, ScriptFilter};

static EXAMPLE_SEPARATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:^|\n)<start>").expect("separator pattern is valid"));

/// One labelled block of the prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptSection {
    pub content: String,
    /// Stable identifier of the section's origin, e.g. `char_description`.
    pub description: String,
    /// Relative weight for callers that trim prompts to fit a budget.
    pub importance: i32,
}

impl PromptSection {
    pub fn new(content: impl Into<String>, description: impl Into<String>, importance: i32) -> Self {
        Self {
            content: content.into(),
            description: description.into(),
            importance,
        }
    }
}

/// A message to be spliced into the chat log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntheticMessage {
    pub role: ChatRole,
    pub content: String,
    /// Non-negative depths count from the newest message, negative depths
    /// from the oldest.
    pub depth: i64,
}

impl SyntheticMessage {
    /// Index at which this message is inserted into a log of `log_len` messages.
    pub fn insertion_index(&self, log_len: usize) -> usize {
        if self.depth >= 0 {
            log_len.saturating_sub(self.depth.unsigned_abs() as usize)
        } else {
            (self.depth.unsigned_abs() as usize).min(log_len)
        }
    }
}

/// The assembled prompt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssembledPrompt {
    pub text: Vec<PromptSection>,
    pub additional_chat_log: Vec<SyntheticMessage>,
}

impl AssembledPrompt {
    /// Sections joined by blank lines.
    pub fn to_prompt_string(&self) -> String {
        self.text
            .iter()
            .map(|s| s.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    pub fn section(&self, description: &str) -> Option<&PromptSection> {
        self.text.iter().find(|s| s.description == description)
    }

    /// A copy of `chat_log` with the synthetic messages inserted at their depths.
    pub fn splice_into(&self, chat_log: &[ChatMessage]) -> Vec<ChatMessage> {
        let len = chat_log.len();
        let placed: Vec<(usize, &SyntheticMessage)> = self
            .additional_chat_log
            .iter()
            .map(|m| (m.insertion_index(len), m))
            .collect();

        let mut spliced = Vec::with_capacity(len + placed.len());
        for index in 0..=len {
            spliced.extend(
                placed
                    .iter()
                    .filter(|(at, _)| *at == index)
                    .map(|(_, m)| ChatMessage::new(m.role, m.content.clone())),
            );
            if let Some(message) = chat_log.get(index) {
                spliced.push(message.clone());
            }
        }
        spliced
    }

    /// Values available to `${...}` prompt-format templates.
    pub fn template_context(&self, char_name: &str, user_name: &str) -> Value {
        json!({
            "Charname": char_name,
            "UserCharname": user_name,
            "char_prompt": self.to_prompt_string(),
            "sections": self.text,
            "additional_chat_log": self.additional_chat_log,
        })
    }
}

#[derive(Debug)]
struct DepthBucket {
    depth: i64,
    role: PromptRole,
    entries: Vec<String>,
}

/// Activated lore sorted by placement.
#[derive(Debug, Default)]
struct LoreBuckets {
    before_char: Vec<(i64, String)>,
    after_char: Vec<(i64, String)>,
    authors_note_top: Vec<String>,
    authors_note_bottom: Vec<String>,
    examples_top: Vec<String>,
    examples_bottom: Vec<String>,
    at_depth: Vec<DepthBucket>,
}

impl LoreBuckets {
    /// Later entries are placed in front of earlier ones.
    fn add(&mut self, entry: &LoreEntry, content: String) {
        match entry.effective_position() {
            LorePosition::BeforeChar => self.before_char.insert(0, (entry.insertion_order, content)),
            LorePosition::AfterChar => self.after_char.insert(0, (entry.insertion_order, content)),
            LorePosition::AuthorsNoteTop => self.authors_note_top.insert(0, content),
            LorePosition::AuthorsNoteBottom => self.authors_note_bottom.insert(0, content),
            LorePosition::ExamplesTop => self.examples_top.insert(0, content),
            LorePosition::ExamplesBottom => self.examples_bottom.insert(0, content),
            LorePosition::AtDepth => {
                let role = entry.effective_role();
                match self
                    .at_depth
                    .iter_mut()
                    .find(|b| b.depth == entry.depth && b.role == role)
                {
                    Some(bucket) => bucket.entries.insert(0, content),
                    None => self.at_depth.push(DepthBucket {
                        depth: entry.depth,
                        role,
                        entries: vec![content],
                    }),
                }
            }
        }
    }

    fn joined_by_order(entries: &mut [(i64, String)]) -> String {
        entries.sort_by_key(|(order, _)| *order);
        entries
            .iter()
            .map(|(_, content)| content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Builds prompts for a character.
#[derive(Debug, Clone, Default)]
pub struct PromptAssembler {
    labels: PromptLabels,
    macros: MacroEvaluator,
    activator: LoreActivator,
}

impl PromptAssembler {
    pub fn new(config: &EngineConfig) -> Self {
        let macros = MacroEvaluator::new(config.macros.clone());
        Self {
            labels: config.prompt.clone(),
            activator: LoreActivator::new(config.world_info.clone(), macros.clone()),
            macros,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(&EngineConfig::default())
    }

    pub fn activator(&self) -> &LoreActivator {
        &self.activator
    }

    /// Activate the character's lore, then build the prompt.
    pub fn assemble(
        &self,
        character: &CharacterDefinition,
        chat_log: &[ChatMessage],
        env: &Environment,
        memory: &mut ChatMemory,
    ) -> AssembledPrompt {
        let activated = self
            .activator
            .activate(&character.lore_entries, chat_log, env, memory);
        self.build(character, &activated, chat_log, env, &mut memory.variables)
    }

    /// Build the prompt from lore that has already been activated.
    pub fn build(
        &self,
        character: &CharacterDefinition,
        activated: &[LoreEntry],
        chat_log: &[ChatMessage],
        env: &Environment,
        vars: &mut VariableStore,
    ) -> AssembledPrompt {
        let mut eval = |text: &str| self.macros.evaluate(text, env, vars, chat_log);

        // Step 1: Evaluate static fields
        let system_prompt = eval(&character.system_prompt);
        let personality = eval(&character.personality);
        let scenario = eval(&character.scenario);
        let description = eval(&character.description);
        let mes_example = eval(&character.mes_example);
        let note = character
            .authors_note()
            .map(|note| (note, eval(&note.prompt)));

        // Step 2: Bucket lore
        let lore_scripts = RegexPipeline::compile(&character.regex_scripts, &ScriptFilter::lore());
        let mut buckets = LoreBuckets::default();
        for entry in activated {
            let content = lore_scripts.apply(&entry.content);
            if content.is_empty() {
                continue;
            }
            buckets.add(entry, content);
        }

        // Step 3: Author's note wrapped by its lore
        let authors_note = note.map(|(note, prompt)| {
            let wrapped = format!(
                "{}\n{}\n{}",
                buckets.authors_note_top.join("\n"),
                prompt,
                buckets.authors_note_bottom.join("\n")
            );
            let trimmed = wrapped.strip_prefix('\n').unwrap_or(&wrapped);
            let trimmed = trimmed.strip_suffix('\n').unwrap_or(trimmed);
            (note, trimmed.to_string())
        });

        // Step 4: Synthetic messages by depth
        let mut additional_chat_log = Vec::new();
        for index in 0..chat_log.len() {
            for bucket in buckets
                .at_depth
                .iter()
                .filter(|b| b.depth.unsigned_abs() as usize == index)
            {
                additional_chat_log.push(SyntheticMessage {
                    role: bucket.role.into(),
                    content: bucket.entries.join("\n"),
                    depth: bucket.depth,
                });
            }
            if let Some((note, text)) = &authors_note {
                if note.depth.unsigned_abs() as usize == index {
                    additional_chat_log.push(SyntheticMessage {
                        role: note.role.into(),
                        content: text.clone(),
                        depth: note.depth,
                    });
                }
            }
        }

        // Step 5: Sections
        let examples: Vec<String> = buckets
            .examples_top
            .iter()
            .cloned()
            .chain(
                EXAMPLE_SEPARATOR
                    .split(&mes_example)
                    .map(|block| block.trim().to_string()),
            )
            .chain(buckets.examples_bottom.iter().cloned())
            .filter(|block| !block.is_empty())
            .collect();

        let mut text = Vec::new();
        if !examples.is_empty() {
            text.push(PromptSection::new(
                format!("{}{}", self.labels.examples, examples.join("\n\n")),
                "mes_examples",
                -1,
            ));
        }
        if !system_prompt.is_empty() {
            text.push(PromptSection::new(system_prompt, "system_prompt", 3));
        }
        if !scenario.is_empty() {
            text.push(PromptSection::new(
                format!("{}{}", self.labels.scenario, scenario),
                "scenario",
                1,
            ));
        }
        if !buckets.before_char.is_empty() {
            text.push(PromptSection::new(
                LoreBuckets::joined_by_order(&mut buckets.before_char),
                "lore_before_char",
                1,
            ));
        }
        if !personality.is_empty() {
            text.push(PromptSection::new(
                format!("{}{}", self.labels.personality, personality),
                "personality",
                2,
            ));
        }
        if !description.is_empty() {
            text.push(PromptSection::new(
                format!("{}{}", self.labels.description, description),
                "char_description",
                2,
            ));
        }
        if !buckets.after_char.is_empty() {
            text.push(PromptSection::new(
                LoreBuckets::joined_by_order(&mut buckets.after_char),
                "lore_after_char",
                3,
            ));
        }

        debug!(
            sections = text.len(),
            injected = additional_chat_log.len(),
            lore = activated.len(),
            "Assembled prompt"
        );

        AssembledPrompt {
            text,
            additional_chat_log,
        }
    }
}
