//! Verification: a schema-aware hook in front of the structural diff.
//!
//! Wherever the expected side is a typed directive, [`SemanticFilter`] judges
//! the candidate against the directive and settles the pair. Everything else
//! (literals, plain records and tuples) is compared structurally.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::diff::{Diff, DiffHook, Differ, Verdict};
use crate::error::SchemaError;
use crate::resolve::{verification_context, PathResolver, RefRequest, ResolveRef};
use crate::schema::{Directive, Node};
use crate::value::{Map, Value};

static INTEGER_TEXT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^-?[0-9]+$").expect("static regex"));
static DECIMAL_TEXT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^-?[0-9]+(\.[0-9]+)?$").expect("static regex"));

/// Verify `document` against `schema`. `None` means it conforms.
pub fn verify(document: &Value, schema: &Value, ref_data: &Map) -> Result<Option<Diff>, SchemaError> {
    Verifier::new(ref_data.clone()).verify(document, schema)
}

pub struct Verifier {
    ref_data: Map,
    resolver: Arc<dyn ResolveRef>,
}

impl Default for Verifier {
    fn default() -> Self {
        Self::new(Map::new())
    }
}

impl Verifier {
    /// `ref_data` is exposed to references next to `self`, which is bound to
    /// the verified document.
    pub fn new(ref_data: Map) -> Self {
        Self {
            ref_data,
            resolver: Arc::new(PathResolver),
        }
    }

    pub fn with_resolver(mut self, resolver: impl ResolveRef + 'static) -> Self {
        self.resolver = Arc::new(resolver);
        self
    }

    pub fn verify(&self, document: &Value, schema: &Value) -> Result<Option<Diff>, SchemaError> {
        let context = verification_context(document, &self.ref_data);
        let filter = SemanticFilter {
            context: &context,
            resolver: self.resolver.as_ref(),
        };
        Differ::new().with_hook(filter).diff(document, schema)
    }
}

/// The directive-owning hook.
pub struct SemanticFilter<'a> {
    pub context: &'a Value,
    pub resolver: &'a dyn ResolveRef,
}

impl DiffHook for SemanticFilter<'_> {
    fn name(&self) -> &'static str {
        "semantic"
    }

    fn before_trivial(
        &self,
        left: &Value,
        right: &Value,
        path: &str,
        differ: &Differ<'_>,
    ) -> Result<Option<Verdict>, SchemaError> {
        let Node::Directive(directive) = Node::parse(right, path)? else {
            return Ok(None);
        };
        let verdict = match directive {
            Directive::String { format } => {
                let ok = match (format.validator(), left.as_str()) {
                    (Some(pattern), Some(text)) => pattern.is_match(text),
                    _ => false,
                };
                Verdict::check(ok, left, right)
            }
            Directive::Integer { min, max, .. } | Directive::BigInt { value: None, min, max } => {
                Verdict::check(numeric(left, true).is_some_and(|n| in_range(n, min, max)), left, right)
            }
            Directive::Float { min, max } => {
                Verdict::check(numeric(left, false).is_some_and(|n| in_range(n, min, max)), left, right)
            }
            Directive::BigInt { value: Some(literal), .. } => {
                match (integer_text(left), integer_text(literal)) {
                    (Some(a), Some(b)) if a == b => Verdict::Pass,
                    _ => Verdict::Fail(Diff::mismatch(left, literal)),
                }
            }
            Directive::Boolean { .. } => Verdict::check(matches!(left, Value::Bool(_)), left, right),
            Directive::Array { item, .. } => {
                // a lone candidate is compared as a one-element array
                let xs = match left {
                    Value::Array(xs) => xs.as_slice(),
                    other => std::slice::from_ref(other),
                };
                let mut items = std::collections::BTreeMap::new();
                for (i, x) in xs.iter().enumerate() {
                    if let Some(d) = differ.diff_at(x, item, &format!("{path}[{i}]"))? {
                        items.insert(i, d);
                    }
                }
                if items.is_empty() { Verdict::Pass } else { Verdict::Fail(Diff::Array(items)) }
            }
            Directive::Ref { json_path } => {
                let target = self.resolver.resolve(&RefRequest {
                    context: self.context,
                    json_path,
                    node: right,
                })?;
                tracing::debug!(%json_path, kind = target.kind(), "verifying against reference");
                Verdict::from(differ.diff_at(left, &target, path)?)
            }
        };
        Ok(Some(verdict))
    }
}

/// Numbers pass by type; strings pass if they look like one.
fn numeric(candidate: &Value, integral: bool) -> Option<f64> {
    match candidate {
        Value::Number(n) => n.as_f64().filter(|f| !integral || f.fract() == 0.0),
        Value::String(s) => {
            let shape = if integral { &INTEGER_TEXT } else { &DECIMAL_TEXT };
            shape.is_match(s).then(|| s.parse::<f64>().ok()).flatten()
        }
        _ => None,
    }
}

fn in_range(n: f64, min: Option<f64>, max: Option<f64>) -> bool {
    n >= min.unwrap_or(f64::NEG_INFINITY) && n <= max.unwrap_or(f64::INFINITY)
}

/// Exact decimal text of an integer-like value, so big literals compare
/// without going through `f64`.
fn integer_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
