//! # Context Core (The Cortex)
//!
//! The "brain" of character chat. This crate reads card data from
//! `character_card` and turns it, together with the running chat log and
//! per-chat memory, into the text actually sent to a language model.
//!
//! ## Core Components
//!
//! - **macros**: `{{...}}` placeholder evaluation with variables, dice, clock and lists
//! - **regex_pipeline**: Ordered find/replace scripts over lore, replies and edits
//! - **lore**: Keyword-triggered lore activation with recursion and timed effects
//! - **prompt**: Assembly of prompt sections and depth-injected messages
//! - **character**: Per-character runtime tying the above together
//!
//! ## Design Philosophy
//!
//! - **Pure Text In, Text Out**: No network, no storage; callers own persistence
//! - **Never Fail on Content**: Malformed macros and patterns degrade to literal text
//! - **Explicit State**: Variables and activation timers live in a `ChatMemory` the caller passes in

pub mod character;
pub mod config;
pub mod environment;
pub mod error;
pub mod lore;
pub mod macros;
pub mod memory;
pub mod prompt;
pub mod random;
pub mod regex_pipeline;

pub use character::*;
pub use config::*;
pub use environment::*;
pub use error::EngineError;
pub use lore::{KeyMatcher, LoreActivator, TimerGate};
pub use macros::{evaluate_macros, MacroEvaluator};
pub use memory::{ActivationMemory, ChatMemory, VariableScope, VariableStore};
pub use prompt::*;
pub use regex_pipeline::{apply_scripts, RegexPipeline, ScriptFilter};
