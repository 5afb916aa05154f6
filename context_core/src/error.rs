//! Error types for the context engine.
//!
//! The text engine itself never fails: malformed macros, bad regex literals
//! and unparseable dates degrade to unresolved text. Only the surrounding
//! plumbing (configuration, persistence, caller contract violations)
//! surfaces errors.

use character_card::CardError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Card error: {0}")]
    Card(#[from] CardError),

    #[error("Greeting {index} is out of range ({available} available)")]
    GreetingOutOfRange { index: usize, available: usize },
}

/// Result type alias using our error.
pub type Result<T> = std::result::Result<T, EngineError>;
