//! Macro evaluation.
//!
//! # Overview
//!
//! [`MacroEvaluator`] rewrites `{{...}}` placeholders (and the `<USER>` /
//! `<BOT>` aliases) in any text that flows into a prompt or a reply.
//!
//! # Stages
//!
//! Stages run in a fixed order; each one sees the output of the previous:
//!
//! 1. Angle-bracket aliases (`<USER>`, `<BOT>`, `<CHAR>`, `<GROUP>`, `<CHARIFNOTGROUP>`)
//! 2. `{{reverse::text}}`
//! 3. `{{roll:formula}}`
//! 4. Variable macros
//! 5. `{{newline}}`, `{{trim}}`, `{{noop}}`, `{{// comment}}`
//! 6. Environment keys (`{{char}}`, `{{user}}`, ...)
//! 7. Clock macros, then `{{timediff}}`
//! 8. `{{banned "word"}}`
//! 9. `{{random}}`, then `{{pick}}`
//! 10. Variable macros again, so values produced above can be stored
//!
//! Text without `{{` after stage 1 is returned unchanged. Macros that cannot
//! be resolved are left as literal text.

pub mod dice;
pub mod lists;
pub mod time;
pub mod variables;

use chrono::{DateTime, Local};
use once_cell::sync::Lazy;
use regex::{Captures, NoExpand, Regex, RegexBuilder};
use tracing::trace;

use character_card::ChatMessage;

use crate::config::MacroSettings;
use crate::environment::Environment;
use crate::memory::VariableStore;

static USER_ALIAS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<user>").expect("alias pattern is valid"));
static CHAR_ALIAS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<bot>|<char>").expect("alias pattern is valid"));
static GROUP_ALIAS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<charifnotgroup>|<group>").expect("alias pattern is valid"));
static REVERSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\{\{reverse::(.*?)\}\}").expect("reverse pattern is valid"));
static NEWLINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\{\{newline\}\}").expect("newline pattern is valid"));
static TRIM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\n*\{\{trim\}\}\n*").expect("trim pattern is valid"));
static NOOP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\{\{noop\}\}").expect("noop pattern is valid"));
static COMMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\{\{//.*?\}\}").expect("comment pattern is valid"));
static BANNED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)\{\{banned "[^"]*"\}\}"#).expect("banned pattern is valid"));

/// Rewrites macros in text.
#[derive(Debug, Clone, Default)]
pub struct MacroEvaluator {
    settings: MacroSettings,
}

impl MacroEvaluator {
    pub fn new(settings: MacroSettings) -> Self {
        Self { settings }
    }

    pub fn with_defaults() -> Self {
        Self::default()
    }

    pub fn settings(&self) -> &MacroSettings {
        &self.settings
    }

    /// Evaluate `content` at the current local time.
    pub fn evaluate(
        &self,
        content: &str,
        env: &Environment,
        vars: &mut VariableStore,
        chat_log: &[ChatMessage],
    ) -> String {
        self.evaluate_at(content, env, vars, chat_log, Local::now())
    }

    /// Evaluate `content` as if the current time were `now`.
    pub fn evaluate_at(
        &self,
        content: &str,
        env: &Environment,
        vars: &mut VariableStore,
        chat_log: &[ChatMessage],
        now: DateTime<Local>,
    ) -> String {
        if content.is_empty() {
            return String::new();
        }

        // Step 1: angle-bracket aliases
        let mut text = replace_alias(&USER_ALIAS, content, env, "user");
        text = replace_alias(&CHAR_ALIAS, &text, env, "char");
        text = replace_alias(&GROUP_ALIAS, &text, env, "group");

        if !text.contains("{{") {
            return text;
        }

        // Step 2: text transforms and dice
        text = REVERSE
            .replace_all(&text, |caps: &Captures| caps[1].chars().rev().collect::<String>())
            .into_owned();
        text = dice::replace_rolls(&text, &self.settings.invalid_roll_placeholder);

        // Step 3: variables
        text = variables::replace_variable_macros(&text, vars);

        // Step 4: structural macros
        text = NEWLINE.replace_all(&text, "\n").into_owned();
        text = TRIM.replace_all(&text, "").into_owned();
        text = NOOP.replace_all(&text, "").into_owned();
        text = COMMENT.replace_all(&text, "").into_owned();

        // Step 5: environment
        text = substitute_environment(&text, env);

        // Step 6: clock
        text = time::replace_time_macros(&text, chat_log, now);
        text = time::replace_timediff(&text);

        // Step 7: banned words are a request to the backend, not prompt text
        text = BANNED.replace_all(&text, "").into_owned();

        // Step 8: lists
        text = lists::replace_random(&text, &self.settings.empty_list_placeholder);
        text = lists::replace_pick(&text, content, &self.settings.empty_list_placeholder);

        // Step 9: variables again
        text = variables::replace_variable_macros(&text, vars);

        trace!(input_len = content.len(), output_len = text.len(), "Evaluated macros");
        text
    }
}

/// Evaluate with default settings at the current time.
pub fn evaluate_macros(
    content: &str,
    env: &Environment,
    vars: &mut VariableStore,
    chat_log: &[ChatMessage],
) -> String {
    MacroEvaluator::with_defaults().evaluate(content, env, vars, chat_log)
}

fn replace_alias(alias: &Regex, text: &str, env: &Environment, key: &str) -> String {
    if !alias.is_match(text) {
        return text.to_string();
    }
    match env.get(key) {
        Some(value) => alias.replace_all(text, NoExpand(&value)).into_owned(),
        None => text.to_string(),
    }
}

/// Replace `{{key}}` (case-insensitively) for every environment key.
/// Computed values are only invoked when their key occurs.
fn substitute_environment(text: &str, env: &Environment) -> String {
    let mut result = text.to_string();
    for (key, value) in env.iter() {
        if !result.contains("{{") {
            break;
        }
        let pattern = format!(r"\{{\{{{}\}}\}}", regex::escape(key));
        let Ok(re) = RegexBuilder::new(&pattern).case_insensitive(true).build() else {
            continue;
        };
        if re.is_match(&result) {
            let resolved = value.resolve();
            result = re.replace_all(&result, NoExpand(&resolved)).into_owned();
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::VariableScope;
    use chrono::TimeZone;
    use serde_json::json;

    fn env() -> Environment {
        Environment::for_character("Alice", "Bob", "test-model", "1.0")
    }

    fn eval(content: &str) -> String {
        let mut vars = VariableStore::new();
        evaluate_macros(content, &env(), &mut vars, &[])
    }

    #[test]
    fn test_plain_text_is_unchanged() {
        let text = "Nothing to see here: {braces} and <tags> stay.";
        assert_eq!(eval(text), text);
        assert_eq!(eval(""), "");
    }

    #[test]
    fn test_environment_substitution() {
        assert_eq!(eval("{{user}} meets {{char}}."), "Bob meets Alice.");
        assert_eq!(eval("{{USER}} / {{Char}}"), "Bob / Alice");
        assert_eq!(eval("v{{charVersion}}"), "v1.0");
    }

    #[test]
    fn test_angle_aliases() {
        assert_eq!(eval("<USER> waves at <BOT>"), "Bob waves at Alice");
        assert_eq!(eval("<char> & <user>"), "Alice & Bob");
    }

    #[test]
    fn test_unresolved_macros_stay_literal() {
        assert_eq!(eval("Hello {{unknown}}"), "Hello {{unknown}}");
        assert_eq!(eval("<GROUP>"), "<GROUP>");
    }

    #[test]
    fn test_group_alias_uses_environment() {
        let env = env().with("group", "Alice, Carol");
        let mut vars = VariableStore::new();
        assert_eq!(
            evaluate_macros("<GROUP> are here", &env, &mut vars, &[]),
            "Alice, Carol are here"
        );
    }

    #[test]
    fn test_structural_macros() {
        assert_eq!(eval("a{{newline}}b"), "a\nb");
        assert_eq!(eval("a\n\n{{trim}}\nb"), "ab");
        assert_eq!(eval("a{{noop}}b"), "ab");
        assert_eq!(eval("a{{// hidden\nnote}}b"), "ab");
        assert_eq!(eval("{{reverse::abc}}"), "cba");
        assert_eq!(eval(r#"x{{banned "word"}}y"#), "xy");
    }

    #[test]
    fn test_variables_round_trip_through_evaluation() {
        let mut vars = VariableStore::new();
        let env = env();
        let evaluator = MacroEvaluator::with_defaults();

        let first = evaluator.evaluate("{{setvar::met::yes}}", &env, &mut vars, &[]);
        assert_eq!(first, "");
        assert_eq!(vars.get(VariableScope::Local, "met"), Some(&json!("yes")));

        evaluator.evaluate("{{setvar::count::2}}", &env, &mut vars, &[]);
        let second = evaluator.evaluate("{{incvar::count}} times", &env, &mut vars, &[]);
        assert_eq!(second, "3 times");
    }

    #[test]
    fn test_rolls_resolve_before_assignment() {
        let mut vars = VariableStore::new();
        evaluate_macros("{{setvar::dice::{{roll:1d1}}}}", &env(), &mut vars, &[]);
        assert_eq!(vars.get(VariableScope::Local, "dice"), Some(&json!("1")));
    }

    #[test]
    fn test_computed_environment_value() {
        let env = Environment::new().with_computed("mood", || "cheerful".to_string());
        let mut vars = VariableStore::new();
        assert_eq!(evaluate_macros("{{mood}}", &env, &mut vars, &[]), "cheerful");
    }

    #[test]
    fn test_environment_value_with_dollar_sign() {
        let env = Environment::new().with("price", "$5");
        let mut vars = VariableStore::new();
        assert_eq!(evaluate_macros("costs {{price}}", &env, &mut vars, &[]), "costs $5");
    }

    #[test]
    fn test_pick_is_stable_across_calls() {
        let text = "{{pick::north,south,east,west,up,down}}";
        let first = eval(text);
        assert!(["north", "south", "east", "west", "up", "down"].contains(&first.as_str()));
        for _ in 0..5 {
            assert_eq!(eval(text), first);
        }
    }

    #[test]
    fn test_pick_is_stable_after_a_roll() {
        let text = "{{roll:1d100}} {{pick::a,b,c,d,e,f,g,h,i,j,k,l}}";
        let pick = |result: String| result.rsplit(' ').next().unwrap_or_default().to_string();
        let first = pick(eval(text));
        for _ in 0..50 {
            assert_eq!(pick(eval(text)), first);
        }
    }

    #[test]
    fn test_malformed_utc_offsets_stay_literal() {
        assert_eq!(eval("{{time_utc+99999999}}"), "{{time_utc+99999999}}");
        assert_eq!(eval("{{time_utc-2147483648}}"), "{{time_utc-2147483648}}");
        assert_eq!(eval("{{time_utc+99999999999999}}"), "{{time_utc+99999999999999}}");
    }

    #[test]
    fn test_invalid_roll_placeholder() {
        let evaluator = MacroEvaluator::new(MacroSettings {
            invalid_roll_placeholder: "[bad roll]".to_string(),
            ..MacroSettings::default()
        });
        let mut vars = VariableStore::new();
        let result = evaluator.evaluate("{{roll:xyz}}", &env(), &mut vars, &[]);
        assert_eq!(result, "[bad roll]");
    }

    #[test]
    fn test_evaluate_at_fixed_time() {
        let now = Local.with_ymd_and_hms(2024, 3, 5, 14, 7, 9).earliest().unwrap();
        let mut vars = VariableStore::new();
        let result = MacroEvaluator::with_defaults().evaluate_at(
            "{{isodate}} {{weekday}}",
            &env(),
            &mut vars,
            &[],
            now,
        );
        assert_eq!(result, "2024-03-05 Tuesday");
    }
}
