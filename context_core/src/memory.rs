//! Per-chat persistent memory.
//!
//! # Layout
//!
//! The serialized form is a single JSON object:
//! - `variables` - chat-local variables set by `{{setvar}}` and friends
//! - `globalVariables` - variables shared across chats
//! - `enabledWIEntries` - lore entry index mapped to the chat length at
//!   which the entry last activated
//!
//! The engine mutates this value in place; persisting it is the caller's job.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// Which variable namespace a macro addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableScope {
    Local,
    Global,
}

/// Chat-local and global variables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VariableStore {
    #[serde(default)]
    pub variables: BTreeMap<String, Value>,

    #[serde(default, rename = "globalVariables", alias = "global_variables")]
    pub global_variables: BTreeMap<String, Value>,
}

impl VariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn namespace(&self, scope: VariableScope) -> &BTreeMap<String, Value> {
        match scope {
            VariableScope::Local => &self.variables,
            VariableScope::Global => &self.global_variables,
        }
    }

    pub fn namespace_mut(&mut self, scope: VariableScope) -> &mut BTreeMap<String, Value> {
        match scope {
            VariableScope::Local => &mut self.variables,
            VariableScope::Global => &mut self.global_variables,
        }
    }

    pub fn get(&self, scope: VariableScope, name: &str) -> Option<&Value> {
        self.namespace(scope).get(name)
    }

    pub fn set(&mut self, scope: VariableScope, name: impl Into<String>, value: Value) {
        self.namespace_mut(scope).insert(name.into(), value);
    }

    pub fn remove(&mut self, scope: VariableScope, name: &str) -> Option<Value> {
        self.namespace_mut(scope).remove(name)
    }
}

/// When each lore entry last activated, keyed by its index in the card's lore list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActivationMemory {
    stamps: BTreeMap<usize, usize>,
}

impl ActivationMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Chat length recorded at the entry's last fresh activation.
    pub fn last_activated(&self, index: usize) -> Option<usize> {
        self.stamps.get(&index).copied()
    }

    pub fn record(&mut self, index: usize, chat_len: usize) {
        self.stamps.insert(index, chat_len);
    }

    pub fn forget(&mut self, index: usize) {
        self.stamps.remove(&index);
    }

    pub fn clear(&mut self) {
        self.stamps.clear();
    }

    pub fn len(&self) -> usize {
        self.stamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stamps.is_empty()
    }
}

/// Everything the engine remembers about one chat.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatMemory {
    #[serde(flatten)]
    pub variables: VariableStore,

    #[serde(default, rename = "enabledWIEntries", alias = "enabled_wi_entries")]
    pub activation: ActivationMemory,
}

impl ChatMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Parse text the way a loose numeric conversion would: surrounding
/// whitespace is ignored, and anything other than a finite decimal number
/// is rejected.
pub fn parse_number(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty()
        || trimmed
            .chars()
            .any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E')
    {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Render a number without a trailing `.0` for integral values.
pub fn format_number(n: f64) -> String {
    if n == 0.0 {
        "0".to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        format!("{n:.0}")
    } else {
        n.to_string()
    }
}

/// Store a number as an integer when it is integral, otherwise as a float.
pub fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

/// Text form of a stored value. Structured values render as compact JSON.
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => match n.as_i64() {
            Some(i) => i.to_string(),
            None => n.as_f64().map(format_number).unwrap_or_default(),
        },
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}
