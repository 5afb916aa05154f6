//! Regex post-processing of text.
//!
//! # Overview
//!
//! Character cards carry an ordered list of [`RegexScript`]s. At each stage
//! of the pipeline (lore content, model output, edits) the caller selects the
//! relevant scripts with a [`ScriptFilter`] and folds them over the text in
//! list order.
//!
//! # Patterns
//!
//! - `/pattern/flags` literals honor `g` (replace all), `i`, `m` and `s`
//! - anything else is compiled as a raw pattern and replaces the first match
//! - scripts whose pattern does not compile are skipped with a warning
//!
//! # Replacements
//!
//! The replacement string understands `$$`, `$&`, `$1`..`$99`, `$<name>`
//! and `{{match}}`. Every entry of `trim_strings` is removed from the
//! matched text before it is substituted for `$&` / `{{match}}`.

pub mod literal;

pub use literal::{LiteralFlags, RegexLiteral};

use character_card::{RegexPlacement, RegexScript};
use regex::{Captures, Regex};
use tracing::{trace, warn};

/// Selects which scripts run at a pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptFilter {
    pub placement: RegexPlacement,
    /// Whether display-only scripts run.
    pub include_markdown_only: bool,
    /// Whether prompt-only scripts run.
    pub include_prompt_only: bool,
    /// Only run scripts that opted into edits.
    pub edit_only: bool,
    /// Message depth, checked against each script's depth range.
    pub depth: Option<usize>,
}

impl ScriptFilter {
    pub fn new(placement: RegexPlacement) -> Self {
        Self {
            placement,
            include_markdown_only: true,
            include_prompt_only: true,
            edit_only: false,
            depth: None,
        }
    }

    /// Scripts applied to activated lore content.
    pub fn lore() -> Self {
        Self::new(RegexPlacement::WorldInfo)
    }

    /// Scripts applied to model output before it is stored.
    pub fn ai_output() -> Self {
        Self::new(RegexPlacement::AiOutput)
            .without_markdown_only()
            .without_prompt_only()
    }

    /// Scripts applied to model output before it is shown.
    pub fn ai_output_for_display() -> Self {
        Self::new(RegexPlacement::AiOutput).without_prompt_only()
    }

    /// Scripts applied to user input.
    pub fn user_input() -> Self {
        Self::new(RegexPlacement::UserInput)
            .without_markdown_only()
            .without_prompt_only()
    }

    pub fn without_markdown_only(mut self) -> Self {
        self.include_markdown_only = false;
        self
    }

    pub fn without_prompt_only(mut self) -> Self {
        self.include_prompt_only = false;
        self
    }

    pub fn on_edit(mut self) -> Self {
        self.edit_only = true;
        self
    }

    pub fn at_depth(mut self, depth: usize) -> Self {
        self.depth = Some(depth);
        self
    }

    /// Disabled scripts never pass.
    pub fn accepts(&self, script: &RegexScript) -> bool {
        !script.disabled
            && script.applies_to(self.placement)
            && (self.include_markdown_only || !script.markdown_only)
            && (self.include_prompt_only || !script.prompt_only)
            && (!self.edit_only || script.runs_on_edit())
            && self.depth.map_or(true, |d| script.covers_depth(d))
    }
}

struct CompiledScript<'a> {
    script: &'a RegexScript,
    regex: Regex,
    global: bool,
}

impl<'a> CompiledScript<'a> {
    fn compile(script: &'a RegexScript) -> Option<Self> {
        if script.find_regex.is_empty() {
            return None;
        }

        let compiled = match RegexLiteral::parse(&script.find_regex) {
            Some(literal) => literal.compile().map(|re| (re, literal.flags.global)),
            None => Regex::new(&script.find_regex).map(|re| (re, false)),
        };

        match compiled {
            Ok((regex, global)) => Some(Self {
                script,
                regex,
                global,
            }),
            Err(err) => {
                warn!(
                    script = %script.script_name,
                    pattern = %script.find_regex,
                    error = %err,
                    "Skipping regex script with invalid pattern"
                );
                None
            }
        }
    }

    fn apply(&self, text: &str) -> String {
        let replacer = |caps: &Captures| {
            expand_replacement(&self.script.replace_string, caps, &self.script.trim_strings)
        };
        if self.global {
            self.regex.replace_all(text, replacer).into_owned()
        } else {
            self.regex.replacen(text, 1, replacer).into_owned()
        }
    }
}

/// A set of scripts compiled once and applied to many texts.
///
/// Compiled patterns live only as long as this value; nothing is cached on
/// the scripts themselves.
pub struct RegexPipeline<'a> {
    scripts: Vec<CompiledScript<'a>>,
}

impl<'a> RegexPipeline<'a> {
    /// Compile the scripts accepted by `filter`, preserving list order.
    pub fn compile(scripts: &'a [RegexScript], filter: &ScriptFilter) -> Self {
        Self::compile_where(scripts, |script| filter.accepts(script))
    }

    /// Compile the enabled scripts accepted by an arbitrary predicate.
    pub fn compile_where<F>(scripts: &'a [RegexScript], mut predicate: F) -> Self
    where
        F: FnMut(&RegexScript) -> bool,
    {
        let scripts = scripts
            .iter()
            .filter(|script| !script.disabled && predicate(script))
            .filter_map(CompiledScript::compile)
            .collect();
        Self { scripts }
    }

    pub fn len(&self) -> usize {
        self.scripts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }

    /// Fold every compiled script over `text` in order.
    pub fn apply(&self, text: &str) -> String {
        let mut result = text.to_string();
        for compiled in &self.scripts {
            let next = compiled.apply(&result);
            if next != result {
                trace!(script = %compiled.script.script_name, "Regex script rewrote text");
            }
            result = next;
        }
        result
    }
}

/// Apply the scripts accepted by `filter` to `text`.
pub fn apply_scripts(scripts: &[RegexScript], text: &str, filter: &ScriptFilter) -> String {
    RegexPipeline::compile(scripts, filter).apply(text)
}

/// Expand a replacement template against one match.
pub fn expand_replacement(template: &str, caps: &Captures, trim_strings: &[String]) -> String {
    let whole = trim_match(caps.get(0).map_or("", |m| m.as_str()), trim_strings);
    let group_count = caps.len();
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(pos) = rest.find(['$', '{']) {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];

        if tail.starts_with('{') {
            if tail
                .get(..9)
                .map_or(false, |head| head.eq_ignore_ascii_case("{{match}}"))
            {
                out.push_str(&whole);
                rest = &tail[9..];
            } else {
                out.push('{');
                rest = &tail[1..];
            }
            continue;
        }

        let after = &tail[1..];
        if let Some(stripped) = after.strip_prefix('$') {
            out.push('$');
            rest = stripped;
        } else if let Some(stripped) = after.strip_prefix('&') {
            out.push_str(&whole);
            rest = stripped;
        } else if let Some(stripped) = after.strip_prefix('<') {
            match stripped.find('>') {
                Some(end) => {
                    let name = &stripped[..end];
                    out.push_str(caps.name(name).map_or("", |m| m.as_str()));
                    rest = &stripped[end + 1..];
                }
                None => {
                    out.push('$');
                    rest = after;
                }
            }
        } else {
            let digits: Vec<u32> = after
                .chars()
                .take(2)
                .map_while(|c| c.to_digit(10))
                .collect();
            let two = (digits.len() == 2).then(|| (digits[0] * 10 + digits[1]) as usize);
            let one = digits.first().map(|d| *d as usize);

            match (two, one) {
                (Some(n), _) if n >= 1 && n < group_count => {
                    out.push_str(caps.get(n).map_or("", |m| m.as_str()));
                    rest = &after[2..];
                }
                (_, Some(n)) if n >= 1 && n < group_count => {
                    out.push_str(caps.get(n).map_or("", |m| m.as_str()));
                    rest = &after[1..];
                }
                _ => {
                    out.push('$');
                    rest = after;
                }
            }
        }
    }

    out.push_str(rest);
    out
}

fn trim_match(matched: &str, trim_strings: &[String]) -> String {
    trim_strings
        .iter()
        .filter(|t| !t.is_empty())
        .fold(matched.to_string(), |acc, t| acc.replace(t.as_str(), ""))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output_script(find: &str, replace: &str) -> RegexScript {
        RegexScript::new(find, replace).with_placement(RegexPlacement::AiOutput)
    }

    #[test]
    fn test_global_flag_replaces_all() {
        let scripts = vec![output_script("/cat/g", "dog")];
        let result = apply_scripts(&scripts, "cat cat cat", &ScriptFilter::ai_output());
        assert_eq!(result, "dog dog dog");
    }

    #[test]
    fn test_raw_pattern_replaces_first_match() {
        let scripts = vec![output_script("cat", "dog")];
        let result = apply_scripts(&scripts, "cat cat", &ScriptFilter::ai_output());
        assert_eq!(result, "dog cat");
    }

    #[test]
    fn test_case_insensitive_flag() {
        let scripts = vec![output_script("/hello/gi", "bye")];
        let result = apply_scripts(&scripts, "Hello HELLO", &ScriptFilter::ai_output());
        assert_eq!(result, "bye bye");
    }

    #[test]
    fn test_scripts_apply_in_order() {
        let scripts = vec![output_script("/a/g", "b"), output_script("/b/g", "c")];
        let result = apply_scripts(&scripts, "ab", &ScriptFilter::ai_output());
        assert_eq!(result, "cc");
    }

    #[test]
    fn test_placement_and_disabled_filtering() {
        let scripts = vec![
            RegexScript::new("/x/g", "lore").with_placement(RegexPlacement::WorldInfo),
            output_script("/x/g", "never").disabled(),
        ];

        let result = apply_scripts(&scripts, "x", &ScriptFilter::ai_output());
        assert_eq!(result, "x");

        let lore = apply_scripts(&scripts, "x", &ScriptFilter::lore());
        assert_eq!(lore, "lore");
    }

    #[test]
    fn test_markdown_and_prompt_only_filters() {
        let scripts = vec![
            output_script("/a/g", "md").markdown_only(),
            output_script("/b/g", "prompt").prompt_only(),
        ];

        let stored = apply_scripts(&scripts, "a b", &ScriptFilter::ai_output());
        assert_eq!(stored, "a b");

        let shown = apply_scripts(&scripts, "a b", &ScriptFilter::ai_output_for_display());
        assert_eq!(shown, "md b");
    }

    #[test]
    fn test_edit_and_depth_filters() {
        let scripts = vec![
            output_script("/a/g", "1").with_run_on_edit(false),
            output_script("/b/g", "2").with_depth_range(Some(2), Some(4)),
        ];

        let edited = apply_scripts(&scripts, "ab", &ScriptFilter::ai_output().on_edit());
        assert_eq!(edited, "a2");

        let shallow = apply_scripts(&scripts, "ab", &ScriptFilter::ai_output().at_depth(1));
        assert_eq!(shallow, "1b");
    }

    #[test]
    fn test_invalid_scripts_are_skipped() {
        let scripts = vec![output_script("/(oops/g", "x"), output_script("/a/g", "b")];
        let pipeline = RegexPipeline::compile(&scripts, &ScriptFilter::ai_output());

        assert_eq!(pipeline.len(), 1);
        assert_eq!(pipeline.apply("aa"), "bb");
    }

    #[test]
    fn test_replacement_groups() {
        let scripts = vec![
            output_script(r"/(\w+)@(?P<host>\w+)/g", "$2:$1 [$<host>] $$ $&"),
        ];
        let result = apply_scripts(&scripts, "me@home", &ScriptFilter::ai_output());
        assert_eq!(result, "home:me [home] $ me@home");
    }

    #[test]
    fn test_missing_group_is_literal() {
        let scripts = vec![output_script("/(a)/g", "$1$2$")];
        let result = apply_scripts(&scripts, "a", &ScriptFilter::ai_output());
        assert_eq!(result, "a$2$");
    }

    #[test]
    fn test_match_macro_and_trim_strings() {
        let scripts = vec![output_script(r"/\*[^*]+\*/g", "<i>{{match}}</i>")
            .with_trim_strings(["*"])];
        let result = apply_scripts(&scripts, "she *waves*", &ScriptFilter::ai_output());
        assert_eq!(result, "she <i>waves</i>");
    }

    #[test]
    fn test_custom_predicate() {
        let scripts = vec![output_script("/a/g", "b").with_name("keep")];
        let pipeline = RegexPipeline::compile_where(&scripts, |s| s.script_name == "drop");
        assert!(pipeline.is_empty());
        assert_eq!(pipeline.apply("a"), "a");
    }
}
