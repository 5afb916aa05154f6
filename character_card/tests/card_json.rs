//! Decoding cards in the shapes exporters actually produce.

use character_card::{
    CharacterDefinition, ChatMessage, ChatRole, LoreBook, LorePosition, PromptRole, RegexPlacement,
    SelectiveLogic,
};

#[test]
fn test_snake_case_export() {
    let json = r#"{
        "name": "Seraphina",
        "character_version": "2",
        "first_mes": "Hello",
        "alternate_greetings": ["", "Hi again"],
        "mes_example": "<START>\n{{char}}: hi",
        "talkativeness": 0.5,
        "depth_prompt": { "depth": 2, "prompt": "Be kind.", "role": 2 },
        "regex_scripts": [
            { "scriptName": "dots", "findRegex": "/\\.\\.\\./g", "replaceString": "…", "placement": [2, 5], "runOnEdit": false }
        ],
        "lore_entries": [
            {
                "key": ["forest"],
                "keysecondary": ["night"],
                "selectiveLogic": 3,
                "content": "The forest is dark.",
                "order": 50,
                "position": "at_depth",
                "depth": 3,
                "role": "assistant",
                "probability": 40,
                "useProbability": true
            }
        ]
    }"#;

    let card = CharacterDefinition::from_json(json).unwrap();
    assert_eq!(card.character_version, "2");
    assert_eq!(card.greetings(), vec!["Hello", "Hi again"]);
    assert_eq!(card.talkativeness, Some(0.5));

    let note = card.authors_note().unwrap();
    assert_eq!(note.depth, 2);
    assert_eq!(note.role, PromptRole::Assistant);

    let script = &card.regex_scripts[0];
    assert!(script.applies_to(RegexPlacement::AiOutput));
    assert!(script.applies_to(RegexPlacement::WorldInfo));
    assert!(!script.runs_on_edit());

    let entry = &card.lore_entries[0];
    assert_eq!(entry.keys, vec!["forest"]);
    assert_eq!(entry.secondary_keys, vec!["night"]);
    assert_eq!(entry.selective_logic, SelectiveLogic::AndAll);
    assert_eq!(entry.insertion_order, 50);
    assert_eq!(entry.effective_position(), LorePosition::AtDepth);
    assert_eq!(entry.effective_role(), PromptRole::Assistant);
    assert_eq!(entry.probability, 40.0);
    assert!(entry.enabled);
}

#[test]
fn test_card_survives_round_trip() {
    let card = CharacterDefinition::new("Alice")
        .with_depth_prompt(4, "Note", PromptRole::System);
    let json = serde_json::to_string(&card).unwrap();
    let back = CharacterDefinition::from_json(&json).unwrap();
    assert_eq!(back, card);
}

#[test]
fn test_lore_book_and_chat_log() {
    let book: LoreBook = serde_json::from_str(
        r#"{ "name": "World", "entries": [ { "keys": [], "content": "Always.", "constant": true } ] }"#,
    )
    .unwrap();
    assert_eq!(book.entries.len(), 1);
    assert!(book.entries[0].is_well_formed());

    let log: Vec<ChatMessage> = serde_json::from_str(
        r#"[ { "role": "user", "content": "hi" }, { "role": "char", "name": "Alice", "content": "hello" } ]"#,
    )
    .unwrap();
    assert_eq!(log[1].role, ChatRole::Char);
    assert_eq!(log[1].speaker(), "Alice");
}
