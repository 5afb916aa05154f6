//! Regex scripts - find/replace rules a card attaches to pipeline stages.

use serde::{Deserialize, Serialize};

use crate::rules::RegexPlacement;

/// A single find/replace script.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegexScript {
    #[serde(default)]
    pub script_name: String,

    /// A `/pattern/flags` literal or a raw pattern.
    #[serde(default)]
    pub find_regex: String,

    /// Replacement template (`$1`, `$&`, `{{match}}`, ...).
    #[serde(default)]
    pub replace_string: String,

    /// Strings removed from the matched text before it is substituted.
    #[serde(default)]
    pub trim_strings: Vec<String>,

    /// Stages this script runs in.
    #[serde(default)]
    pub placement: Vec<RegexPlacement>,

    #[serde(default)]
    pub disabled: bool,

    /// Only applied to text shown to the user.
    #[serde(default)]
    pub markdown_only: bool,

    /// Only applied to text sent to the model.
    #[serde(default)]
    pub prompt_only: bool,

    /// Whether the script also runs when a message is edited. Defaults to yes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_on_edit: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_depth: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<usize>,
}

impl RegexScript {
    /// Create an enabled script with no placement.
    pub fn new(find_regex: impl Into<String>, replace_string: impl Into<String>) -> Self {
        Self {
            find_regex: find_regex.into(),
            replace_string: replace_string.into(),
            ..Default::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.script_name = name.into();
        self
    }

    /// Attach the script to a pipeline stage.
    pub fn with_placement(mut self, placement: RegexPlacement) -> Self {
        if !self.placement.contains(&placement) {
            self.placement.push(placement);
        }
        self
    }

    pub fn with_trim_strings<I, S>(mut self, trims: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.trim_strings = trims.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_depth_range(mut self, min_depth: Option<usize>, max_depth: Option<usize>) -> Self {
        self.min_depth = min_depth;
        self.max_depth = max_depth;
        self
    }

    pub fn markdown_only(mut self) -> Self {
        self.markdown_only = true;
        self
    }

    pub fn prompt_only(mut self) -> Self {
        self.prompt_only = true;
        self
    }

    pub fn with_run_on_edit(mut self, run_on_edit: bool) -> Self {
        self.run_on_edit = Some(run_on_edit);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }

    pub fn applies_to(&self, placement: RegexPlacement) -> bool {
        self.placement.contains(&placement)
    }

    pub fn runs_on_edit(&self) -> bool {
        self.run_on_edit.unwrap_or(true)
    }

    /// Whether a message at `depth` falls inside the script's depth range.
    pub fn covers_depth(&self, depth: usize) -> bool {
        self.min_depth.map_or(true, |min| depth >= min)
            && self.max_depth.map_or(true, |max| depth <= max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_builder() {
        let script = RegexScript::new("/foo/g", "bar")
            .with_name("foo to bar")
            .with_placement(RegexPlacement::AiOutput)
            .with_placement(RegexPlacement::AiOutput);

        assert_eq!(script.placement, vec![RegexPlacement::AiOutput]);
        assert!(script.applies_to(RegexPlacement::AiOutput));
        assert!(!script.applies_to(RegexPlacement::WorldInfo));
        assert!(script.runs_on_edit());
    }

    #[test]
    fn test_depth_range() {
        let script = RegexScript::new("x", "y").with_depth_range(Some(1), Some(3));

        assert!(!script.covers_depth(0));
        assert!(script.covers_depth(1));
        assert!(script.covers_depth(3));
        assert!(!script.covers_depth(4));
        assert!(RegexScript::new("x", "y").covers_depth(99));
    }

    #[test]
    fn test_script_from_card_json() {
        let json = r#"{
            "scriptName": "strip ooc",
            "findRegex": "/\\(OOC:.*?\\)/gi",
            "replaceString": "",
            "placement": [2, 5],
            "markdownOnly": false,
            "promptOnly": true,
            "runOnEdit": false
        }"#;
        let script: RegexScript = serde_json::from_str(json).unwrap();

        assert_eq!(script.find_regex, "/\\(OOC:.*?\\)/gi");
        assert!(script.applies_to(RegexPlacement::WorldInfo));
        assert!(script.prompt_only);
        assert!(!script.runs_on_edit());
    }
}
