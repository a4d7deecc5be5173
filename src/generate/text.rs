//! Text synthesis for `string` directives: named formats and patterns.
//!
//! Every generated string matches the registry pattern of its format, so
//! generated documents verify against the schema that produced them.

use chrono::{DateTime, Utc};
use proptest::strategy::{Strategy, ValueTree};
use proptest::test_runner::TestRunner;
use rand::Rng;
use regex_syntax::hir::{Capture, Class, ClassUnicode, ClassUnicodeRange, Hir, HirKind, Look, Repetition};
use regex_syntax::ParserBuilder;

use crate::error::SchemaError;
use crate::format::{self, Pattern};

use super::clock::Clock;

/// Formats whose registry pattern is precise enough to generate from directly.
const PATTERN_BACKED: [&str; 10] = [
    "email", "phone", "ip", "id", "hex", "rgb", "rgba", "url", "image", "protocol",
];

const WORDS: [&str; 24] = [
    "lorem", "ipsum", "dolor", "sit", "amet", "consectetur", "adipiscing", "elit",
    "sed", "do", "eiusmod", "tempor", "incididunt", "ut", "labore", "et", "dolore",
    "magna", "aliqua", "enim", "minim", "veniam", "quis", "nostrud",
];
const FIRST_NAMES: [&str; 8] = ["Mary", "James", "Linda", "Robert", "Susan", "Thomas", "Karen", "Daniel"];
const LAST_NAMES: [&str; 8] = ["Smith", "Johnson", "Brown", "Taylor", "Miller", "Wilson", "Moore", "Clark"];
const TLDS: [&str; 5] = ["com", "net", "org", "io", "cn"];
const BASE64: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// Common CJK ideographs, the range the `c*` formats validate against.
const CJK_START: u32 = 0x4e00;
const CJK_END: u32 = 0x9fa5;

/// Seconds between 1970-01-01 and 2099-12-31.
const DATE_SPAN_SECS: i64 = 4_102_358_400;

/// Text for a registry format.
pub fn named<R: Rng>(
    name: &str,
    rng: &mut R,
    runner: &mut TestRunner,
    clock: &dyn Clock,
) -> Result<String, SchemaError> {
    if PATTERN_BACKED.contains(&name) {
        let pattern = format::lookup(name).ok_or_else(|| unknown(name))?;
        return from_pattern(pattern, runner);
    }
    let text = match name {
        "word" => word(rng),
        "cword" => cjk(rng, 1, 4),
        "name" => format!("{} {}", pick(rng, &FIRST_NAMES), pick(rng, &LAST_NAMES)),
        "cname" => cjk(rng, 2, 3),
        "title" => title(rng),
        "ctitle" => cjk(rng, 3, 7),
        "sentence" => sentence(rng),
        "csentence" => format!("{}。", cjk(rng, 12, 18)),
        "paragraph" => (0..rng.gen_range(3..=7)).map(|_| sentence(rng)).collect::<Vec<_>>().join(" "),
        "cparagraph" => (0..rng.gen_range(3..=7))
            .map(|_| format!("{}。", cjk(rng, 12, 18)))
            .collect::<String>(),
        "hsl" => format!(
            "hsl({}, {}%, {}%)",
            rng.gen_range(0..360),
            rng.gen_range(0..=100),
            rng.gen_range(0..=100)
        ),
        "dataImage" => {
            let body: String = (0..rng.gen_range(16..=48))
                .map(|_| BASE64[rng.gen_range(0..BASE64.len())] as char)
                .collect();
            format!("data:image/png;base64,{body}")
        }
        "date" => random_instant(rng).format("%Y-%m-%d").to_string(),
        "time" => random_instant(rng).format("%H:%M:%S").to_string(),
        "datetime" => random_instant(rng).format("%Y-%m-%d %H:%M:%S").to_string(),
        "now" => clock.now().format("%Y-%m-%d %H:%M:%S").to_string(),
        "domain" => format!("{}.{}", word(rng), pick(rng, &TLDS)),
        other => return Err(unknown(other)),
    };
    Ok(text)
}

/// Free text for a `string` directive without a format.
pub fn any<R: Rng>(rng: &mut R) -> String {
    word(rng)
}

/// Draw a string from the language of `pattern`.
///
/// Start/end anchors are dropped (validation is an unanchored search) and
/// character classes are narrowed to printable ASCII wherever that leaves
/// them non-empty.
pub fn from_pattern(pattern: &Pattern, runner: &mut TestRunner) -> Result<String, SchemaError> {
    let ungenerable = |reason: String| SchemaError::UngenerablePattern {
        pattern: pattern.source().to_string(),
        reason,
    };
    let hir = ParserBuilder::new()
        .case_insensitive(pattern.has_flag('i'))
        .multi_line(pattern.has_flag('m'))
        .dot_matches_new_line(pattern.has_flag('s'))
        .build()
        .parse(pattern.syntax())
        .map_err(|e| ungenerable(e.to_string()))?;
    let hir = printable(&hir).map_err(ungenerable)?;
    let strategy = proptest::string::string_regex_parsed(&hir).map_err(|e| ungenerable(e.to_string()))?;
    let tree = strategy.new_tree(runner).map_err(|e| ungenerable(format!("{e:?}")))?;
    Ok(tree.current())
}

fn printable(hir: &Hir) -> Result<Hir, String> {
    Ok(match hir.kind() {
        HirKind::Empty | HirKind::Literal(_) | HirKind::Class(Class::Bytes(_)) => hir.clone(),
        HirKind::Class(Class::Unicode(class)) => {
            let ascii = ClassUnicode::new([ClassUnicodeRange::new(' ', '~')]);
            let mut narrowed = class.clone();
            narrowed.intersect(&ascii);
            if narrowed.ranges().is_empty() {
                hir.clone()
            } else {
                Hir::class(Class::Unicode(narrowed))
            }
        }
        HirKind::Look(look) => match look {
            Look::Start | Look::End | Look::StartLF | Look::EndLF | Look::StartCRLF | Look::EndCRLF => {
                Hir::empty()
            }
            other => return Err(format!("assertion {other:?} is unsupported for generation")),
        },
        HirKind::Repetition(rep) => Hir::repetition(Repetition {
            min: rep.min,
            max: rep.max,
            greedy: rep.greedy,
            sub: Box::new(printable(&rep.sub)?),
        }),
        HirKind::Capture(cap) => Hir::capture(Capture {
            index: cap.index,
            name: cap.name.clone(),
            sub: Box::new(printable(&cap.sub)?),
        }),
        HirKind::Concat(xs) => Hir::concat(xs.iter().map(printable).collect::<Result<_, _>>()?),
        HirKind::Alternation(xs) => Hir::alternation(xs.iter().map(printable).collect::<Result<_, _>>()?),
    })
}

fn unknown(name: &str) -> SchemaError {
    SchemaError::UnknownFormat {
        format: name.to_string(),
        path: "$".to_string(),
    }
}

fn pick<'a, R: Rng>(rng: &mut R, xs: &[&'a str]) -> &'a str {
    xs[rng.gen_range(0..xs.len())]
}

fn word<R: Rng>(rng: &mut R) -> String {
    (0..rng.gen_range(3..=10))
        .map(|_| rng.gen_range(b'a'..=b'z') as char)
        .collect()
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn title<R: Rng>(rng: &mut R) -> String {
    (0..rng.gen_range(3..=7))
        .map(|_| capitalize(pick(rng, &WORDS)))
        .collect::<Vec<_>>()
        .join(" ")
}

fn sentence<R: Rng>(rng: &mut R) -> String {
    let words: Vec<&str> = (0..rng.gen_range(12..=18)).map(|_| pick(rng, &WORDS)).collect();
    format!("{}.", capitalize(&words.join(" ")))
}

fn cjk<R: Rng>(rng: &mut R, min: usize, max: usize) -> String {
    (0..rng.gen_range(min..=max))
        .filter_map(|_| char::from_u32(rng.gen_range(CJK_START..=CJK_END)))
        .collect()
}

fn random_instant<R: Rng>(rng: &mut R) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(rng.gen_range(0..DATE_SPAN_SECS), 0).unwrap_or_default()
}
