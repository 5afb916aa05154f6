//! A playable character: a definition bound to an engine configuration.
//!
//! [`CharacterRuntime`] is the entry point callers use per chat turn:
//! greetings, prompt assembly, post-processing of model replies and edits.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use character_card::{CharacterDefinition, ChatMessage};

use crate::config::EngineConfig;
use crate::environment::Environment;
use crate::error::{EngineError, Result};
use crate::macros::MacroEvaluator;
use crate::memory::ChatMemory;
use crate::prompt::{render_template, AssembledPrompt, PromptAssembler};
use crate::regex_pipeline::{RegexPipeline, ScriptFilter};

/// A message in its stored and displayed forms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedMessage {
    /// Text kept in the chat log and sent back to the model.
    pub content: String,
    /// Text shown to the user; display-only scripts have run on it.
    pub content_for_show: String,
}

#[derive(Debug, Clone)]
pub struct CharacterRuntime {
    definition: CharacterDefinition,
    assembler: PromptAssembler,
    macros: MacroEvaluator,
}

impl CharacterRuntime {
    pub fn new(definition: CharacterDefinition, config: &EngineConfig) -> Self {
        Self {
            definition,
            assembler: PromptAssembler::new(config),
            macros: MacroEvaluator::new(config.macros.clone()),
        }
    }

    pub fn with_defaults(definition: CharacterDefinition) -> Self {
        Self::new(definition, &EngineConfig::default())
    }

    /// Decode a card from JSON and bind it to `config`.
    pub fn from_card_json(json: &str, config: &EngineConfig) -> Result<Self> {
        let definition = CharacterDefinition::from_json(json)?;
        debug!(
            name = %definition.name,
            lore = definition.lore_entries.len(),
            scripts = definition.regex_scripts.len(),
            "Loaded character card"
        );
        Ok(Self::new(definition, config))
    }

    pub fn definition(&self) -> &CharacterDefinition {
        &self.definition
    }

    /// The standard environment for this character talking to `user_name`.
    pub fn environment(&self, user_name: &str, model: &str) -> Environment {
        Environment::for_character(
            self.definition.name.as_str(),
            user_name,
            model,
            self.definition.character_version.as_str(),
        )
    }

    /// Greeting `index`: the first message, then the alternates.
    pub fn greeting(
        &self,
        index: usize,
        env: &Environment,
        memory: &mut ChatMemory,
        chat_log: &[ChatMessage],
    ) -> Result<RenderedMessage> {
        let greetings = self.definition.greetings();
        self.render_greeting(&greetings, index, env, memory, chat_log)
    }

    /// Group greeting `index`, duplicates removed.
    pub fn group_greeting(
        &self,
        index: usize,
        env: &Environment,
        memory: &mut ChatMemory,
        chat_log: &[ChatMessage],
    ) -> Result<RenderedMessage> {
        let greetings = self.definition.unique_group_greetings();
        self.render_greeting(&greetings, index, env, memory, chat_log)
    }

    fn render_greeting(
        &self,
        greetings: &[&str],
        index: usize,
        env: &Environment,
        memory: &mut ChatMemory,
        chat_log: &[ChatMessage],
    ) -> Result<RenderedMessage> {
        let greeting = greetings
            .get(index)
            .ok_or(EngineError::GreetingOutOfRange {
                index,
                available: greetings.len(),
            })?;
        let text = self
            .macros
            .evaluate(greeting, env, &mut memory.variables, chat_log);
        Ok(self.finish_reply(&text))
    }

    /// Activate lore and assemble the prompt for the next reply.
    pub fn prompt(
        &self,
        chat_log: &[ChatMessage],
        env: &Environment,
        memory: &mut ChatMemory,
    ) -> AssembledPrompt {
        self.assembler.assemble(&self.definition, chat_log, env, memory)
    }

    /// Run the model-output scripts over a reply.
    pub fn finish_reply(&self, text: &str) -> RenderedMessage {
        self.render_output(text, false)
    }

    /// Run the model-output scripts that opted into edits over an edited message.
    pub fn edit_message(&self, text: &str) -> RenderedMessage {
        self.render_output(text, true)
    }

    fn render_output(&self, text: &str, edit: bool) -> RenderedMessage {
        let scripts = &self.definition.regex_scripts;
        let (stored, shown) = if edit {
            (ScriptFilter::ai_output().on_edit(), ScriptFilter::ai_output_for_display().on_edit())
        } else {
            (ScriptFilter::ai_output(), ScriptFilter::ai_output_for_display())
        };

        let content = RegexPipeline::compile(scripts, &stored).apply(text);
        let content_for_show = RegexPipeline::compile(scripts, &shown).apply(text);
        debug!(edit, changed = content != text, "Post-processed reply");

        RenderedMessage {
            content,
            content_for_show,
        }
    }

    /// How eagerly the character speaks in group chats; `1.0` when unset.
    pub fn reply_frequency(&self) -> f64 {
        self.definition
            .talkativeness
            .map_or(1.0, |talkativeness| talkativeness * 2.0)
    }

    /// Render a prompt-format template against an assembled prompt.
    pub fn render_prompt(&self, template: &str, prompt: &AssembledPrompt, user_name: &str) -> String {
        let context: Value = prompt.template_context(&self.definition.name, user_name);
        render_template(template, &context)
    }
}
