//! Lore Activator - selects the lore entries relevant to the current chat.
//!
//! The activation algorithm works as follows:
//! 1. **Preparation**: Enabled entries are copied and their keys macro-evaluated
//! 2. **Levels**: Entries are grouped by `delay_until_recursion`; each level
//!    sees every entry whose level is at or below it
//! 3. **Scanning**: Each pass matches keys against the recent chat window plus
//!    the content of entries activated in earlier passes
//! 4. **Recursion**: Passes repeat until one activates nothing new
//! 5. **Timers**: Delay, sticky and cooldown are checked against per-chat
//!    activation memory, which is updated for fresh activations
//! 6. **Ordering**: Constants first, then by position and insertion order
//!
//! Activated entries come back with defaults filled in and their content
//! macro-evaluated; the caller's list is never modified.

mod matcher;
mod timers;

pub use matcher::*;
pub use timers::*;

use rand::Rng;
use tracing::{debug, trace};

use character_card::{format_transcript, ChatMessage, LoreEntry};

use crate::config::WorldInfoSettings;
use crate::environment::Environment;
use crate::macros::MacroEvaluator;
use crate::memory::{ActivationMemory, ChatMemory};
use crate::random::seeded_rng;

/// An enabled entry with defaults applied and keys compiled.
#[derive(Debug, Clone)]
struct PreparedEntry {
    /// Position in the caller's entry list; the activation memory key.
    index: usize,
    entry: LoreEntry,
    primary: Vec<KeyMatcher>,
    secondary: Vec<KeyMatcher>,
}

/// Outcome of evaluating one entry in one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Activation {
    Inactive,
    /// Activated by keys, constant or probability; restarts the timers.
    Fresh,
    /// Carried by a sticky window; timers keep their old start.
    Carried,
}

/// Selects lore entries for a chat.
#[derive(Debug, Clone, Default)]
pub struct LoreActivator {
    settings: WorldInfoSettings,
    macros: MacroEvaluator,
}

impl LoreActivator {
    pub fn new(settings: WorldInfoSettings, macros: MacroEvaluator) -> Self {
        Self { settings, macros }
    }

    pub fn with_defaults() -> Self {
        Self::default()
    }

    pub fn settings(&self) -> &WorldInfoSettings {
        &self.settings
    }

    /// Run activation over `entries` for the current chat.
    ///
    /// # Algorithm
    ///
    /// 1. Collect the distinct `delay_until_recursion` levels in ascending order
    /// 2. For each level, repeat passes over the remaining pool:
    ///    a. entries above the level wait for a later one
    ///    b. constants activate unconditionally
    ///    c. timers may block an entry or keep it active
    ///    d. probability and keys decide the rest
    /// 3. After the first level, entries that exclude recursion leave the pool
    /// 4. Order the result for prompt placement
    pub fn activate(
        &self,
        entries: &[LoreEntry],
        chat_log: &[ChatMessage],
        env: &Environment,
        memory: &mut ChatMemory,
    ) -> Vec<LoreEntry> {
        let chat_len = chat_log.len();

        // Step 1: Prepare enabled entries
        let mut pool: Vec<PreparedEntry> = entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.enabled)
            .filter_map(|(index, entry)| self.prepare(index, entry, env, memory, chat_log))
            .collect();

        let mut levels: Vec<u32> = pool.iter().map(|p| p.entry.delay_until_recursion).collect();
        levels.sort_unstable();
        levels.dedup();

        let mut recursion_text: Vec<String> = Vec::new();
        let mut activated: Vec<LoreEntry> = Vec::new();

        // Step 2: Scan level by level
        for (level_index, level) in levels.iter().copied().enumerate() {
            let mut pass = 0;
            loop {
                let mut newly_activated = Vec::new();
                let mut still_waiting = Vec::new();

                for prepared in pool.drain(..) {
                    if prepared.entry.delay_until_recursion > level {
                        still_waiting.push(prepared);
                        continue;
                    }

                    match self.evaluate(&prepared, chat_log, &recursion_text, &memory.activation) {
                        Activation::Inactive => still_waiting.push(prepared),
                        outcome => {
                            if outcome == Activation::Fresh {
                                memory.activation.record(prepared.index, chat_len);
                            }
                            trace!(
                                index = prepared.index,
                                fresh = outcome == Activation::Fresh,
                                "Lore entry activated"
                            );
                            newly_activated.push(prepared);
                        }
                    }
                }
                pool = still_waiting;

                if newly_activated.is_empty() {
                    break;
                }

                pass += 1;
                debug!(level, pass, count = newly_activated.len(), "Lore pass complete");

                // Step 3: Evaluated content feeds later passes
                for mut prepared in newly_activated {
                    prepared.entry.content = self.macros.evaluate(
                        &prepared.entry.content,
                        env,
                        &mut memory.variables,
                        chat_log,
                    );
                    if !prepared.entry.prevent_recursion && !prepared.entry.exclude_recursion {
                        recursion_text.push(prepared.entry.content.clone());
                    }
                    activated.push(prepared.entry);
                }
            }

            if level_index == 0 {
                pool.retain(|p| !p.entry.exclude_recursion);
            }
        }

        debug!(
            candidates = entries.len(),
            activated = activated.len(),
            "Lore activation complete"
        );

        // Step 4: Order for placement
        order_for_prompt(activated)
    }

    fn prepare(
        &self,
        index: usize,
        entry: &LoreEntry,
        env: &Environment,
        memory: &mut ChatMemory,
        chat_log: &[ChatMessage],
    ) -> Option<PreparedEntry> {
        if !entry.is_well_formed() {
            trace!(index, "Skipping lore entry without keys");
            return None;
        }

        let mut entry = entry.clone();
        let mut evaluate_keys = |keys: &[String]| -> Vec<String> {
            keys.iter()
                .map(|k| self.macros.evaluate(k, env, &mut memory.variables, chat_log))
                .collect()
        };
        entry.keys = evaluate_keys(&entry.keys);
        entry.secondary_keys = evaluate_keys(&entry.secondary_keys);

        entry.position = Some(entry.effective_position());
        entry.role = Some(entry.effective_role());
        let case_sensitive = *entry
            .case_sensitive
            .get_or_insert(self.settings.case_sensitive);
        let whole_words = *entry
            .match_whole_words
            .get_or_insert(self.settings.match_whole_words);
        entry.scan_depth.get_or_insert(self.settings.scan_depth);

        let primary = compile_keys(&entry.keys, case_sensitive, whole_words);
        let secondary = compile_keys(&entry.secondary_keys, case_sensitive, whole_words);

        Some(PreparedEntry {
            index,
            entry,
            primary,
            secondary,
        })
    }

    fn evaluate(
        &self,
        prepared: &PreparedEntry,
        chat_log: &[ChatMessage],
        recursion_text: &[String],
        activation: &ActivationMemory,
    ) -> Activation {
        let entry = &prepared.entry;
        if entry.constant {
            return Activation::Fresh;
        }

        let chat_len = chat_log.len();
        match timer_gate(entry, chat_len, activation.last_activated(prepared.index)) {
            gate @ (TimerGate::Delayed | TimerGate::CoolingDown) => {
                trace!(index = prepared.index, ?gate, "Lore entry held back by timer");
                return Activation::Inactive;
            }
            TimerGate::Sticky => {
                let window = self.scan_window(entry, chat_log, recursion_text);
                return if keys_match(prepared, &window) {
                    Activation::Fresh
                } else {
                    Activation::Carried
                };
            }
            TimerGate::Open => {}
        }

        if !passes_probability(entry) {
            return Activation::Inactive;
        }

        let window = self.scan_window(entry, chat_log, recursion_text);
        if keys_match(prepared, &window) {
            Activation::Fresh
        } else {
            Activation::Inactive
        }
    }

    /// The last `scan_depth` messages, plus recursion content unless the
    /// entry excludes it.
    fn scan_window(&self, entry: &LoreEntry, chat_log: &[ChatMessage], recursion_text: &[String]) -> String {
        let depth = entry.scan_depth.unwrap_or(self.settings.scan_depth);
        let start = chat_log.len().saturating_sub(depth);
        let mut window = format_transcript(&chat_log[start..]);

        if !entry.exclude_recursion && !recursion_text.is_empty() {
            window.push('\n');
            window.push_str(&recursion_text.join("\n"));
        }
        window
    }
}

fn keys_match(prepared: &PreparedEntry, window: &str) -> bool {
    if !prepared.primary.iter().any(|m| m.is_match(window)) {
        return false;
    }
    if prepared.secondary.is_empty() {
        return true;
    }
    prepared
        .entry
        .selective_logic
        .evaluate(prepared.secondary.iter().map(|m| m.is_match(window)))
}

/// Deterministic roll seeded by the entry's keys and content.
fn passes_probability(entry: &LoreEntry) -> bool {
    if !entry.use_probability || entry.probability >= 100.0 {
        return true;
    }
    let seed = format!(
        "{}{}{}",
        entry.keys.join(","),
        entry.secondary_keys.join(","),
        entry.content
    );
    let draw: f64 = seeded_rng(&seed).gen();
    draw <= entry.probability / 100.0
}

/// Constants first in activation order, then the rest stably sorted by
/// position and insertion order.
fn order_for_prompt(activated: Vec<LoreEntry>) -> Vec<LoreEntry> {
    let (mut ordered, mut rest): (Vec<_>, Vec<_>) =
        activated.into_iter().partition(|entry| entry.constant);
    rest.sort_by_key(|entry| (entry.effective_position(), entry.insertion_order));
    ordered.extend(rest);
    ordered
}
