//! # Character Card
//!
//! The "Card Bible" crate - the data model for pluggable characters: their
//! static definition, lore book, regex scripts and the chat log they are
//! played against. This crate is the single source of truth for card data
//! and does not contain any prompt or activation logic.

pub mod card;
pub mod chat_log;
pub mod rules;

pub use card::*;
pub use chat_log::*;
pub use rules::*;
