//! `{{random}}` and `{{pick}}` list macros.
//!
//! Both accept `{{random::a,b,c}}` (or `{{random a,b,c}}`). Commas escaped as
//! `\,` stay inside an item. `random` draws fresh every time; `pick` is
//! seeded from the unevaluated text and its position among the picks, so the
//! same message always picks the same item.

use once_cell::sync::Lazy;
use rand::Rng;
use regex::{Captures, Regex};

use crate::random::{seeded_rng, sha256_hex};

static RANDOM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)\{\{random\s?::?(.*?)\}\}").expect("random pattern is valid")
});
static PICK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)\{\{pick\s?::?(.*?)\}\}").expect("pick pattern is valid"));

/// Split on commas not preceded by a backslash, unescape `\,` and trim each item.
pub fn split_list(list: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut escaped = false;

    for c in list.chars() {
        match c {
            ',' if escaped => {
                current.pop();
                current.push(',');
            }
            ',' => items.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
        escaped = c == '\\';
    }
    items.push(current);

    items.into_iter().map(|item| item.trim().to_string()).collect()
}

pub fn replace_random(content: &str, empty_placeholder: &str) -> String {
    RANDOM
        .replace_all(content, |caps: &Captures| {
            let items = split_list(&caps[1]);
            if caps[1].trim().is_empty() {
                return empty_placeholder.to_string();
            }
            let index = rand::thread_rng().gen_range(0..items.len());
            items[index].clone()
        })
        .into_owned()
}

/// `seed_text` is the content before any macro ran. Each pick is seeded by
/// that text and its ordinal among the picks, so earlier macros that change
/// the length of the text do not change the outcome.
pub fn replace_pick(content: &str, seed_text: &str, empty_placeholder: &str) -> String {
    let digest = sha256_hex(seed_text);
    let mut ordinal = 0usize;
    PICK.replace_all(content, |caps: &Captures| {
        let seed = format!("{digest}-{ordinal}");
        ordinal += 1;
        let items = split_list(&caps[1]);
        if caps[1].trim().is_empty() {
            return empty_placeholder.to_string();
        }
        let index = seeded_rng(&seed).gen_range(0..items.len());
        items[index].clone()
    })
    .into_owned()
}
