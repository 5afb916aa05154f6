//! Slash-delimited regex literals: `/pattern/flags`.

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};

static LITERAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^/([\s\S]+?)/([gimsuy]*)$").expect("literal pattern is valid")
});

/// Flags carried by a regex literal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LiteralFlags {
    /// `g`: replace every match instead of only the first.
    pub global: bool,
    /// `i`
    pub ignore_case: bool,
    /// `m`: `^`/`$` match at line boundaries.
    pub multi_line: bool,
    /// `s`: `.` matches newlines.
    pub dot_all: bool,
}

/// A parsed `/pattern/flags` literal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegexLiteral {
    pub pattern: String,
    pub flags: LiteralFlags,
}

impl RegexLiteral {
    /// Parse `input` as a literal. Returns `None` for anything not in
    /// `/pattern/flags` form; such text is treated as a plain pattern or key.
    pub fn parse(input: &str) -> Option<Self> {
        let caps = LITERAL.captures(input)?;
        let pattern = caps.get(1)?.as_str().replace("\\/", "/");
        let flag_chars = caps.get(2).map_or("", |m| m.as_str());

        let flags = LiteralFlags {
            global: flag_chars.contains('g'),
            ignore_case: flag_chars.contains('i'),
            multi_line: flag_chars.contains('m'),
            dot_all: flag_chars.contains('s'),
        };
        Some(Self { pattern, flags })
    }

    /// Compile the pattern with its flags applied.
    pub fn compile(&self) -> Result<Regex, regex::Error> {
        self.builder().build()
    }

    /// A builder preloaded with the pattern and flags, for callers that add options.
    pub fn builder(&self) -> RegexBuilder {
        let mut builder = RegexBuilder::new(&self.pattern);
        builder
            .case_insensitive(self.flags.ignore_case)
            .multi_line(self.flags.multi_line)
            .dot_matches_new_line(self.flags.dot_all);
        builder
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_literal() {
        let literal = RegexLiteral::parse("/dra(g|k)on/gi").unwrap();
        assert_eq!(literal.pattern, "dra(g|k)on");
        assert!(literal.flags.global);
        assert!(literal.flags.ignore_case);
        assert!(!literal.flags.multi_line);

        let re = literal.compile().unwrap();
        assert!(re.is_match("DRAKON"));
    }

    #[test]
    fn test_escaped_slashes() {
        let literal = RegexLiteral::parse(r"/a\/b/").unwrap();
        assert_eq!(literal.pattern, "a/b");
        assert_eq!(literal.flags, LiteralFlags::default());

        let nested = RegexLiteral::parse("/a/b/g").unwrap();
        assert_eq!(nested.pattern, "a/b");
        assert!(nested.flags.global);
    }

    #[test]
    fn test_not_a_literal() {
        assert!(RegexLiteral::parse("dragon").is_none());
        assert!(RegexLiteral::parse("//").is_none());
        assert!(RegexLiteral::parse("/abc/xyz").is_none());
    }

    #[test]
    fn test_invalid_pattern_fails_to_compile() {
        let literal = RegexLiteral::parse("/(unclosed/").unwrap();
        assert!(literal.compile().is_err());
    }
}
