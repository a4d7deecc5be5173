//! String formats: compiled patterns, `/body/flags` notation and the named
//! format registry.

use std::fmt;

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};

use crate::error::FormatParseError;

/// Source text of the match-anything pattern (what an empty JS regex reports).
pub const MATCH_ANY_SOURCE: &str = "(?:)";

const SENTINEL_PREFIX: &str = "regexp____";
const SENTINEL_SEPARATOR: &str = "____";

static NOTATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)^/(.*)/([a-z]*)$").expect("static regex"));
static SENTINEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^regexp____(.+)____([a-z]*)$").expect("static regex"));

// ————————————————————————————————————————————————————————————————————————————
// PATTERN
// ————————————————————————————————————————————————————————————————————————————

/// A compiled regular expression that remembers its JS-style source and flags,
/// so it can be written back out losslessly.
#[derive(Clone)]
pub struct Pattern {
    source: String,
    flags: String,
    /// `source` with its class escapes narrowed to ASCII.
    syntax: String,
    regex: Regex,
}

impl Pattern {
    /// Compile `source` with `flags`. `i`, `m` and `s` map onto regex options;
    /// `g`, `y`, `u` and `d` only affect iteration in JS and are kept verbatim.
    pub fn new(source: impl Into<String>, flags: impl Into<String>) -> Result<Self, FormatParseError> {
        let source = source.into();
        let flags = flags.into();
        let syntax = ascii_classes(&source);
        let mut builder = RegexBuilder::new(&syntax);
        for flag in flags.chars() {
            match flag {
                'i' => { builder.case_insensitive(true); }
                'm' => { builder.multi_line(true); }
                's' => { builder.dot_matches_new_line(true); }
                'g' | 'y' | 'u' | 'd' => {}
                other => return Err(FormatParseError::Flag { flag: other }),
            }
        }
        let regex = builder.build().map_err(|source_err| FormatParseError::Regex {
            source_text: source.clone(),
            source: source_err,
        })?;
        Ok(Self { source, flags, syntax, regex })
    }

    /// Pattern that accepts every string.
    pub fn any() -> Self {
        Self {
            source: MATCH_ANY_SOURCE.to_string(),
            flags: String::new(),
            syntax: MATCH_ANY_SOURCE.to_string(),
            regex: Regex::new(MATCH_ANY_SOURCE).expect("empty group compiles"),
        }
    }

    /// Parse `/body/flags` notation.
    pub fn parse_notation(text: &str) -> Result<Self, FormatParseError> {
        let caps = NOTATION.captures(text).ok_or_else(|| FormatParseError::Notation {
            text: text.to_string(),
        })?;
        Self::new(&caps[1], &caps[2])
    }

    /// Like [`Pattern::parse_notation`], but malformed text degrades to
    /// [`Pattern::any`] and is only logged.
    pub fn parse_notation_lenient(text: &str) -> Self {
        match Self::parse_notation(text) {
            Ok(p) => p,
            Err(error) => {
                tracing::warn!(%text, %error, "malformed pattern text; matching anything");
                Self::any()
            }
        }
    }

    /// Decode the codec sentinel `regexp____<source>____<flags>`.
    /// `None` if `text` is not in sentinel form.
    pub fn from_sentinel(text: &str) -> Option<Result<Self, FormatParseError>> {
        let caps = SENTINEL.captures(text)?;
        Some(Self::new(&caps[1], &caps[2]))
    }

    pub fn to_sentinel(&self) -> String {
        format!("{SENTINEL_PREFIX}{}{SENTINEL_SEPARATOR}{}", self.source, self.flags)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// The regex-crate syntax actually compiled.
    pub(crate) fn syntax(&self) -> &str {
        &self.syntax
    }

    pub fn flags(&self) -> &str {
        &self.flags
    }

    pub fn has_flag(&self, flag: char) -> bool {
        self.flags.contains(flag)
    }

    pub fn is_match_any(&self) -> bool {
        self.source == MATCH_ANY_SOURCE
    }

    /// Unanchored search, like `RegExp.prototype.test`.
    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source && self.flags == other.flags
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/{}", self.source, self.flags)
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/{}", self.source, self.flags)
    }
}

const ASCII_WORD: &str = "0-9A-Za-z_";

/// Rewrite `\d`, `\w` and `\b` (and their negations) to the ASCII meaning
/// JS gives them; the regex crate reads them as Unicode classes. Brackets,
/// `&` and `~` inside a class are escaped since JS classes do not nest.
fn ascii_classes(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut in_class = false;
    let mut chars = source.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                let Some(escaped) = chars.next() else {
                    out.push('\\');
                    break;
                };
                match (escaped, in_class) {
                    ('d', false) => out.push_str("[0-9]"),
                    ('d', true) => out.push_str("0-9"),
                    ('D', _) => out.push_str("[^0-9]"),
                    ('w', false) => out.push_str(&format!("[{ASCII_WORD}]")),
                    ('w', true) => out.push_str(ASCII_WORD),
                    ('W', _) => out.push_str(&format!("[^{ASCII_WORD}]")),
                    ('b', false) => out.push_str(r"(?-u:\b)"),
                    ('B', false) => out.push_str(r"(?-u:\B)"),
                    ('b', true) => out.push_str(r"\x08"),
                    (other, _) => {
                        out.push('\\');
                        out.push(other);
                    }
                }
            }
            '[' if !in_class => {
                in_class = true;
                out.push('[');
                if chars.next_if_eq(&'^').is_some() {
                    out.push('^');
                }
                // leading `]` stays literal
                if chars.next_if_eq(&']').is_some() {
                    out.push_str(r"\]");
                }
            }
            ']' if in_class => {
                in_class = false;
                out.push(']');
            }
            '[' | '&' | '~' if in_class => {
                out.push('\\');
                out.push(c);
            }
            other => out.push(other),
        }
    }
    out
}

/// True when `text` should be read as a pattern rather than a format name.
pub fn looks_like_pattern(text: &str) -> bool {
    NOTATION.is_match(text) || SENTINEL.is_match(text)
}

// ————————————————————————————————————————————————————————————————————————————
// REGISTRY
// ————————————————————————————————————————————————————————————————————————————

/// Validation patterns for named formats. Placeholder formats (prose, dates)
/// accept any non-empty text.
static REGISTRY: Lazy<IndexMap<&'static str, Pattern>> = Lazy::new(|| {
    const CJK: &str = r"[\x{4e00}-\x{9fa5}]+";
    const URL: &str = r"^(https?|ftp)://[^\s/$.?#].[^\s]*$";
    const ANY: &str = r".+";
    let table: [(&'static str, &str); 27] = [
        ("cname", CJK),
        ("name", r"[\w\s\.]+"),
        ("email", r"^[a-zA-Z0-9_.+-]+@[a-zA-Z0-9_-]+(\.[a-zA-Z0-9_-]+)+$"),
        ("phone", r"^(13[0-9]|14[579]|15[0-35-9]|16[6]|17[0135678]|18[0-9]|19[89])\d{8}$"),
        ("paragraph", ANY),
        ("cparagraph", ANY),
        ("sentence", ANY),
        ("csentence", ANY),
        ("word", r"\w+"),
        ("cword", CJK),
        ("title", ANY),
        ("ctitle", ANY),
        ("hex", r"^#[\w\d]{6}"),
        ("rgb", r"rgb\(\d{3},\s+\d{3},\s+\d{3}\)"),
        ("rgba", r"rgba\(\d{3},\s+\d{3},\s+\d{3},\s+.+\)"),
        ("hsl", ANY),
        ("image", URL),
        ("dataImage", ANY),
        ("date", ANY),
        ("time", ANY),
        ("datetime", ANY),
        ("now", ANY),
        ("url", URL),
        ("protocol", r"(https?|ftp):"),
        ("domain", ANY),
        ("ip", r"((?:(?:25[0-5]|2[0-4]\d|((1\d{2})|([1-9]?\d)))\.){3}(?:25[0-5]|2[0-4]\d|((1\d{2})|([1-9]?\d))))"),
        ("id", r"^[1-9]\d{5}(18|19|20)\d{2}((0[1-9])|(1[0-2]))(([0-2][1-9])|10|20|30|31)\d{3}[0-9Xx]$"),
    ];
    table
        .into_iter()
        .map(|(name, source)| (name, Pattern::new(source, "").expect("registry pattern compiles")))
        .collect()
});

/// Look up a named format.
pub fn lookup(name: &str) -> Option<&'static Pattern> {
    REGISTRY.get(name)
}

pub fn names() -> impl Iterator<Item = &'static str> {
    REGISTRY.keys().copied()
}

/// How a `string` directive's `__format` attribute constrains text.
#[derive(Clone, Debug, PartialEq)]
pub enum TextFormat {
    /// No format: any string.
    Any,
    /// A registry key.
    Named(&'static str),
    /// A compiled pattern (embedded, or parsed from text).
    Pattern(Pattern),
    /// A name the registry does not know.
    Unknown(String),
}

impl TextFormat {
    /// Resolve the textual form of `__format`. Empty text matches anything,
    /// pattern-looking text is parsed leniently, anything else is a name.
    pub fn from_text(text: &str) -> Self {
        if text.is_empty() {
            return TextFormat::Any;
        }
        if let Some(parsed) = Pattern::from_sentinel(text) {
            return match parsed {
                Ok(p) => TextFormat::Pattern(p),
                Err(error) => {
                    tracing::warn!(%text, %error, "malformed pattern sentinel; matching anything");
                    TextFormat::Any
                }
            };
        }
        if looks_like_pattern(text) {
            return TextFormat::Pattern(Pattern::parse_notation_lenient(text));
        }
        match REGISTRY.get_key_value(text) {
            Some((name, _)) => TextFormat::Named(*name),
            None => TextFormat::Unknown(text.to_string()),
        }
    }

    /// The pattern a candidate must match; `None` for unknown names.
    pub fn validator(&self) -> Option<&Pattern> {
        static ANY: Lazy<Pattern> = Lazy::new(Pattern::any);
        match self {
            TextFormat::Any => Some(&*ANY),
            TextFormat::Named(name) => lookup(name),
            TextFormat::Pattern(p) => Some(p),
            TextFormat::Unknown(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notation_parses_body_and_flags() {
        let p = Pattern::parse_notation(r"/.+\.csv$/gi").unwrap();
        assert_eq!(p.source(), r".+\.csv$");
        assert_eq!(p.flags(), "gi");
        assert!(p.is_match("4S0.CSV"));
        assert!(!p.is_match("4S0.txt"));
    }

    #[test]
    fn malformed_notation_degrades_to_match_anything() {
        let p = Pattern::parse_notation_lenient("/(unclosed/");
        assert!(p.is_match_any());
        assert!(p.is_match("whatever"));
        assert!(Pattern::parse_notation("no slashes").is_err());
        assert!(matches!(Pattern::new("a", "q"), Err(FormatParseError::Flag { flag: 'q' })));
    }

    #[test]
    fn sentinel_round_trips() {
        let p = Pattern::new(r"^\d+____x$", "i").unwrap();
        let text = p.to_sentinel();
        let back = Pattern::from_sentinel(&text).unwrap().unwrap();
        assert_eq!(back, p);
        assert!(Pattern::from_sentinel("regexp but not really").is_none());
    }

    #[test]
    fn registry_patterns_validate() {
        assert!(lookup("email").unwrap().is_match("g.edshb@zjb.eh"));
        assert!(!lookup("email").unwrap().is_match("not-an-email"));
        assert!(lookup("phone").unwrap().is_match("13529277784"));
        assert!(!lookup("phone").unwrap().is_match("12529277784"));
        assert!(lookup("ip").unwrap().is_match("192.168.1.20"));
        assert!(lookup("cword").unwrap().is_match("登陆成功"));
        assert!(!lookup("cword").unwrap().is_match("login"));
        assert!(lookup("id").unwrap().is_match("11010519491231002X"));
        assert_eq!(names().count(), 27);
    }

    #[test]
    fn class_escapes_are_ascii_only() {
        assert_eq!(ascii_classes(r"^\d+$"), "^[0-9]+$");
        assert_eq!(ascii_classes(r"[\w\s\.]+"), r"[0-9A-Za-z_\s\.]+");
        assert_eq!(ascii_classes(r"[^\D]"), "[^[^0-9]]");
        assert_eq!(ascii_classes(r"a\bb[\b]"), r"a(?-u:\b)b[\x08]");
        assert_eq!(ascii_classes(r"[[a&&b]"), r"[\[a\&\&b]");
        assert_eq!(ascii_classes(r"\x{4e00}\\d"), r"\x{4e00}\\d");

        let digits = Pattern::new(r"^\d+$", "").unwrap();
        assert!(digits.is_match("123"));
        assert!(!digits.is_match("١٢٣"));
        assert_eq!(digits.source(), r"^\d+$");
        assert!(!Pattern::new(r"^\w+$", "").unwrap().is_match("héllo"));
        assert!(Pattern::new(r"^\W$", "").unwrap().is_match("é"));
        assert!(!lookup("word").unwrap().is_match("登陆成功"));
        assert!(lookup("word").unwrap().is_match("login"));
    }

    #[test]
    fn format_text_resolution() {
        assert_eq!(TextFormat::from_text(""), TextFormat::Any);
        assert_eq!(TextFormat::from_text("email"), TextFormat::Named("email"));
        assert_eq!(TextFormat::from_text("xx"), TextFormat::Unknown("xx".into()));
        assert!(TextFormat::from_text("xx").validator().is_none());
        match TextFormat::from_text("/^a/") {
            TextFormat::Pattern(p) => assert_eq!(p.source(), "^a"),
            other => panic!("expected pattern, got {other:?}"),
        }
        match TextFormat::from_text("regexp____b+____") {
            TextFormat::Pattern(p) => assert!(p.is_match("abbb")),
            other => panic!("expected pattern, got {other:?}"),
        }
    }
}
