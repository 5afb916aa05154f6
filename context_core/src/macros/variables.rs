//! Variable macros: `getvar`, `setvar`, `addvar`, `incvar`, `decvar` and
//! their `global` counterparts.
//!
//! Macros are matched one line at a time, so a macro never spans lines.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;

use crate::memory::{format_number, number_value, parse_number, value_to_text, VariableScope, VariableStore};

static GET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\{\{(getvar|getglobalvar)::([^}]+)\}\}").expect("getvar pattern is valid")
});
static SET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\{\{(setvar|setglobalvar)::([^:]+)::([^}]+)\}\}")
        .expect("setvar pattern is valid")
});
static ADD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\{\{(addvar|addglobalvar)::([^:]+)::([^}]+)\}\}")
        .expect("addvar pattern is valid")
});
static INC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\{\{(incvar|incglobalvar)::([^}]+)\}\}").expect("incvar pattern is valid")
});
static DEC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\{\{(decvar|decglobalvar)::([^}]+)\}\}").expect("decvar pattern is valid")
});

fn scope_of(macro_name: &str) -> VariableScope {
    if macro_name.to_ascii_lowercase().contains("global") {
        VariableScope::Global
    } else {
        VariableScope::Local
    }
}

/// Replace every variable macro in `content`, mutating `store`.
pub fn replace_variable_macros(content: &str, store: &mut VariableStore) -> String {
    if !content.contains("{{") {
        return content.to_string();
    }
    content
        .split('\n')
        .map(|line| replace_in_line(line, store))
        .collect::<Vec<_>>()
        .join("\n")
}

fn replace_in_line(line: &str, store: &mut VariableStore) -> String {
    if !line.contains("{{") {
        return line.to_string();
    }

    // Step 1: reads see the values as they were before this line's writes
    let line = GET
        .replace_all(line, |caps: &Captures| {
            let (name, index) = split_index(&caps[2]);
            read_variable(store, scope_of(&caps[1]), name, index)
        })
        .into_owned();

    // Step 2: assignments
    let line = SET
        .replace_all(&line, |caps: &Captures| {
            store.set(scope_of(&caps[1]), caps[2].trim(), Value::String(caps[3].to_string()));
            String::new()
        })
        .into_owned();

    let line = ADD
        .replace_all(&line, |caps: &Captures| {
            modify_variable(store, scope_of(&caps[1]), caps[2].trim(), &caps[3]);
            String::new()
        })
        .into_owned();

    // Step 3: increments return the new value
    let line = INC
        .replace_all(&line, |caps: &Captures| {
            modify_variable(store, scope_of(&caps[1]), caps[2].trim(), "1")
        })
        .into_owned();

    DEC.replace_all(&line, |caps: &Captures| {
        modify_variable(store, scope_of(&caps[1]), caps[2].trim(), "-1")
    })
    .into_owned()
}

/// `name::index` addresses an element of a JSON array or object variable.
fn split_index(raw: &str) -> (&str, Option<&str>) {
    match raw.split_once("::") {
        Some((name, index)) => (name.trim(), Some(index.trim())),
        None => (raw.trim(), None),
    }
}

/// Read a variable as text. Missing variables read as empty, numeric-looking
/// text is normalized as a number.
pub fn read_variable(
    store: &VariableStore,
    scope: VariableScope,
    name: &str,
    index: Option<&str>,
) -> String {
    let Some(value) = store.get(scope, name) else {
        return String::new();
    };

    let text = match index {
        Some(index) => {
            let structured = match value {
                Value::String(s) => serde_json::from_str::<Value>(s).unwrap_or(Value::Null),
                other => other.clone(),
            };
            let element = match &structured {
                Value::Array(items) => index.parse::<usize>().ok().and_then(|i| items.get(i)),
                Value::Object(map) => map.get(index),
                _ => None,
            };
            element.map(value_to_text).unwrap_or_default()
        }
        None => value_to_text(value),
    };

    match parse_number(&text) {
        Some(n) => format_number(n),
        None => text,
    }
}

/// Apply `addvar` semantics and return the variable's new text.
///
/// - a JSON array value gets `delta` appended
/// - two numbers are summed
/// - anything else is concatenated as text
///
/// A missing or empty variable counts as `0`.
pub fn modify_variable(
    store: &mut VariableStore,
    scope: VariableScope,
    name: &str,
    delta: &str,
) -> String {
    let current = store
        .get(scope, name)
        .filter(|v| !matches!(v, Value::Null) && !value_to_text(v).is_empty())
        .cloned()
        .unwrap_or_else(|| Value::from(0));

    let array = match &current {
        Value::Array(items) => Some(items.clone()),
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(Value::Array(items)) => Some(items),
            _ => None,
        },
        _ => None,
    };

    if let Some(mut items) = array {
        let element = match parse_number(delta) {
            Some(n) => number_value(n),
            None => Value::String(delta.to_string()),
        };
        items.push(element);
        let serialized = Value::Array(items).to_string();
        store.set(scope, name, Value::String(serialized.clone()));
        return serialized;
    }

    let current_text = value_to_text(&current);
    match (parse_number(&current_text), parse_number(delta)) {
        (Some(a), Some(b)) => {
            let sum = a + b;
            store.set(scope, name, number_value(sum));
            format_number(sum)
        }
        _ => {
            let joined = format!("{current_text}{delta}");
            store.set(scope, name, Value::String(joined.clone()));
            joined
        }
    }
}
