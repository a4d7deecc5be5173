//! Presentation of a [`Diff`] for people: coloured terminal text and HTML.

use colored::Colorize;

use crate::diff::Diff;
use crate::value::Value;

/// One block per leaf change:
///
/// ```text
/// $.n
///   - 11
///   + {"__type":"integer","__min":1,"__max":10}
/// ```
pub fn text(diff: &Diff) -> String {
    let mut out = String::new();
    for (path, leaf) in diff.leaves() {
        out.push_str(&format!("{}\n", path.bold()));
        match leaf {
            Diff::Added(expected) => {
                out.push_str(&format!("  {}\n", format!("+ {}", show(expected)).green()));
            }
            Diff::Removed(actual) => {
                out.push_str(&format!("  {}\n", format!("- {}", show(actual)).red()));
            }
            Diff::Modified { actual, expected } => {
                out.push_str(&format!("  {}\n", format!("- {}", show(actual)).red()));
                out.push_str(&format!("  {}\n", format!("+ {}", show(expected)).green()));
            }
            Diff::Object(_) | Diff::Array(_) => {}
        }
    }
    out
}

/// A self-contained HTML fragment: the document followed by a table of leaf
/// changes. All text is escaped.
pub fn html(diff: &Diff, document: &Value) -> String {
    let mut out = String::from("<div class=\"schemock-report\">\n");
    out.push_str(&format!("<pre class=\"document\">{}</pre>\n", escape(&show_pretty(document))));
    out.push_str("<table class=\"delta\">\n");
    out.push_str("<tr><th>path</th><th>actual</th><th>expected</th></tr>\n");
    for (path, leaf) in diff.leaves() {
        let (class, actual, expected) = match leaf {
            Diff::Added(expected) => ("added", String::new(), show_pretty(expected)),
            Diff::Removed(actual) => ("removed", show_pretty(actual), String::new()),
            Diff::Modified { actual, expected } => ("modified", show_pretty(actual), show_pretty(expected)),
            Diff::Object(_) | Diff::Array(_) => continue,
        };
        out.push_str(&format!(
            "<tr class=\"{class}\"><td class=\"path\">{}</td><td><pre>{}</pre></td><td><pre>{}</pre></td></tr>\n",
            escape(&path),
            escape(&actual),
            escape(&expected),
        ));
    }
    out.push_str("</table>\n</div>\n");
    out
}

fn show(v: &Value) -> String {
    match v {
        Value::Undefined => "undefined".to_string(),
        other => display_json(other).to_string(),
    }
}

fn show_pretty(v: &Value) -> String {
    match v {
        Value::Undefined => "undefined".to_string(),
        other => serde_json::to_string_pretty(&display_json(other)).unwrap_or_else(|_| show(other)),
    }
}

/// JSON view with patterns in `/source/flags` notation.
fn display_json(v: &Value) -> serde_json::Value {
    match v {
        Value::Pattern(p) => serde_json::Value::String(p.to_string()),
        Value::Array(xs) => serde_json::Value::Array(xs.iter().map(display_json).collect()),
        Value::Object(m) => serde_json::Value::Object(
            m.iter()
                .filter(|(_, x)| !x.is_undefined())
                .map(|(k, x)| (k.clone(), display_json(x)))
                .collect(),
        ),
        other => other.to_json(),
    }
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
