//! End-to-end turns against a card loaded from JSON, with memory persisted
//! as JSON between turns.

use character_card::{ChatMessage, LoreEntry};
use context_core::{
    CharacterRuntime, ChatMemory, EngineConfig, LoreActivator, MacroEvaluator, VariableScope,
};
use serde_json::json;

const CARD: &str = r#"{
    "name": "Seraphina",
    "character_version": "1.3",
    "description": "A guardian of {{user}}'s forest.",
    "personality": "Kind.",
    "first_mes": "*{{char}} smiles.* Welcome, {{user}}.{{setvar::visits::1}}",
    "mes_example": "<START>\n{{user}}: Who are you?\n{{char}}: A guardian.",
    "depth_prompt": { "depth": 0, "prompt": "Visit number {{getvar::visits}}.", "role": "system" },
    "regex_scripts": [
        { "scriptName": "strip stars", "findRegex": "/\\*/g", "replaceString": "", "placement": [2], "markdownOnly": true }
    ],
    "lore_entries": [
        { "keys": ["glade"], "content": "The glade is sacred.", "sticky": 1 },
        { "keys": ["wolf"], "content": "Wolves fear {{char}}.", "position": "after_char", "insertion_order": 5 },
        { "keys": [], "content": "Magic is real.", "constant": true, "position": 1, "insertion_order": 1 }
    ]
}"#;

fn config() -> EngineConfig {
    EngineConfig::from_toml_str("[world_info]\nscan_depth = 1\n").unwrap()
}

fn runtime() -> CharacterRuntime {
    CharacterRuntime::from_card_json(CARD, &config()).unwrap()
}

fn persist(memory: &ChatMemory) -> ChatMemory {
    ChatMemory::from_json(&memory.to_json().unwrap()).unwrap()
}

#[test]
fn test_full_conversation() {
    let runtime = runtime();
    let env = runtime.environment("Bob", "test-model");
    let mut memory = ChatMemory::new();
    let mut log = Vec::new();

    // Greeting sets a variable and keeps the stars only in the stored text.
    let greeting = runtime.greeting(0, &env, &mut memory, &log).unwrap();
    assert_eq!(greeting.content, "*Seraphina smiles.* Welcome, Bob.");
    assert_eq!(greeting.content_for_show, "Seraphina smiles. Welcome, Bob.");
    assert_eq!(memory.variables.get(VariableScope::Local, "visits"), Some(&json!("1")));
    log.push(ChatMessage::char(greeting.content).with_name("Seraphina"));

    // Turn 1: the glade is mentioned.
    log.push(ChatMessage::user("Take me to the glade.").with_name("Bob"));
    memory = persist(&memory);
    let prompt = runtime.prompt(&log, &env, &mut memory);

    assert_eq!(
        prompt.section("lore_before_char").unwrap().content,
        "The glade is sacred."
    );
    assert_eq!(
        prompt.section("lore_after_char").unwrap().content,
        "Magic is real."
    );
    assert_eq!(
        prompt.section("mes_examples").unwrap().content,
        "Example dialogues:\nBob: Who are you?\nSeraphina: A guardian."
    );
    assert_eq!(
        prompt.section("char_description").unwrap().content,
        "Description: A guardian of Bob's forest."
    );
    assert_eq!(prompt.additional_chat_log.len(), 1);
    assert_eq!(prompt.additional_chat_log[0].content, "Visit number 1.");
    assert_eq!(memory.activation.last_activated(0), Some(2));

    // Turn 2: the mention left the scan window, but the entry is sticky for one more message.
    log.push(ChatMessage::char("Follow me.").with_name("Seraphina"));
    memory = persist(&memory);
    let prompt = runtime.prompt(&log, &env, &mut memory);
    assert!(prompt
        .section("lore_before_char")
        .is_some_and(|s| s.content == "The glade is sacred."));

    // Turn 3: the sticky window has passed.
    log.push(ChatMessage::user("A wolf!").with_name("Bob"));
    memory = persist(&memory);
    let prompt = runtime.prompt(&log, &env, &mut memory);
    assert!(prompt.section("lore_before_char").is_none());
    assert_eq!(
        prompt.section("lore_after_char").unwrap().content,
        "Magic is real.\nWolves fear Seraphina."
    );

    let spliced = prompt.splice_into(&log);
    assert_eq!(spliced.len(), log.len() + 1);
    assert_eq!(spliced.last().unwrap().content, "Visit number 1.");
}

#[test]
fn test_memory_round_trip_preserves_everything() {
    let runtime = runtime();
    let env = runtime.environment("Bob", "test-model");
    let mut memory = ChatMemory::new();
    memory
        .variables
        .set(VariableScope::Global, "seen", json!(["glade"]));

    let log = vec![ChatMessage::user("the glade")];
    runtime.prompt(&log, &env, &mut memory);

    let restored = persist(&memory);
    assert_eq!(restored, memory);

    let raw: serde_json::Value = serde_json::from_str(&memory.to_json().unwrap()).unwrap();
    assert_eq!(raw["globalVariables"]["seen"], json!(["glade"]));
    assert_eq!(raw["enabledWIEntries"]["0"], 1);
    assert_eq!(raw["enabledWIEntries"]["2"], 1);
}

#[test]
fn test_restored_memory_activates_the_same_lore() {
    let config = config();
    let runtime = runtime();
    let env = runtime.environment("Bob", "test-model");
    let activator = LoreActivator::new(config.world_info.clone(), MacroEvaluator::new(config.macros.clone()));

    let mut entries = runtime.definition().lore_entries.clone();
    entries.push(LoreEntry::new(["howl"], "Howls echo.").with_cooldown(3));
    let contents = |activated: Vec<LoreEntry>| -> Vec<String> {
        activated.into_iter().map(|e| e.content).collect()
    };

    let mut log = vec![ChatMessage::user("the glade and a howl")];
    let mut memory = ChatMemory::new();
    activator.activate(&entries, &log, &env, &mut memory);

    // The glade is carried by its sticky window and the howl is cooling down.
    log.push(ChatMessage::user("a howl again"));
    let mut original = memory.clone();
    let mut restored = persist(&memory);

    let from_original = contents(activator.activate(&entries, &log, &env, &mut original));
    let from_restored = contents(activator.activate(&entries, &log, &env, &mut restored));
    assert_eq!(from_original, vec!["Magic is real.", "The glade is sacred."]);
    assert_eq!(from_restored, from_original);
    assert_eq!(restored, original);

    // Without the remembered timers the same log gives a different set.
    let fresh = contents(activator.activate(&entries, &log, &env, &mut ChatMemory::new()));
    assert_eq!(fresh, vec!["Magic is real.", "Howls echo."]);
}
