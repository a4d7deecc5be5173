//! Structural tree diff with a pre-trivial hook pipeline.
//!
//! `left` is the candidate document, `right` the expected side. Every node
//! pair first goes through the registered [`DiffHook`]s; a hook that returns
//! a [`Verdict`] owns that subtree and the trivial stage never sees it.
//!
//! The serialised form is the jsondiffpatch delta shape:
//!
//! | change       | delta                         |
//! |--------------|-------------------------------|
//! | added        | `[new]`                       |
//! | removed      | `[old, 0, 0]`                 |
//! | modified     | `[old, new]`                  |
//! | object       | `{"field": delta, ...}`       |
//! | array        | `{"_t": "a", "i": delta, "_i": [old, 0, 0]}` |

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::{Serialize, Serializer};
use serde_json::json;

use crate::error::SchemaError;
use crate::schema::display_path;
use crate::value::Value;

// ————————————————————————————————————————————————————————————————————————————
// RESULT
// ————————————————————————————————————————————————————————————————————————————

#[derive(Clone, Debug, PartialEq)]
pub enum Diff {
    /// Present only on the expected side.
    Added(Value),
    /// Present only on the candidate side.
    Removed(Value),
    Modified { actual: Value, expected: Value },
    Object(IndexMap<String, Diff>),
    Array(BTreeMap<usize, Diff>),
}

impl Diff {
    pub fn mismatch(actual: &Value, expected: &Value) -> Self {
        Diff::Modified {
            actual: actual.clone(),
            expected: expected.clone(),
        }
    }

    pub fn to_delta(&self) -> serde_json::Value {
        match self {
            Diff::Added(v) => json!([v.to_json()]),
            Diff::Removed(v) => json!([v.to_json(), 0, 0]),
            Diff::Modified { actual, expected } => json!([actual.to_json(), expected.to_json()]),
            Diff::Object(fields) => serde_json::Value::Object(
                fields.iter().map(|(k, d)| (k.clone(), d.to_delta())).collect(),
            ),
            Diff::Array(items) => {
                let mut out = serde_json::Map::new();
                out.insert("_t".to_string(), json!("a"));
                for (i, d) in items {
                    let key = match d {
                        Diff::Removed(_) => format!("_{i}"),
                        _ => i.to_string(),
                    };
                    out.insert(key, d.to_delta());
                }
                serde_json::Value::Object(out)
            }
        }
    }

    /// Leaf changes with their `$`-rooted location, in document order.
    pub fn leaves(&self) -> Vec<(String, &Diff)> {
        let mut out = Vec::new();
        self.collect_leaves(String::new(), &mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, path: String, out: &mut Vec<(String, &'a Diff)>) {
        match self {
            Diff::Object(fields) => {
                for (k, d) in fields {
                    d.collect_leaves(format!("{path}.{k}"), out);
                }
            }
            Diff::Array(items) => {
                for (i, d) in items {
                    d.collect_leaves(format!("{path}[{i}]"), out);
                }
            }
            leaf => out.push((display_path(&path), leaf)),
        }
    }
}

impl Serialize for Diff {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_delta().serialize(serializer)
    }
}

/// Outcome of a hook that took ownership of a node pair.
#[derive(Clone, Debug, PartialEq)]
pub enum Verdict {
    Pass,
    Fail(Diff),
}

impl Verdict {
    pub fn into_diff(self) -> Option<Diff> {
        match self {
            Verdict::Pass => None,
            Verdict::Fail(d) => Some(d),
        }
    }

    pub fn check(ok: bool, actual: &Value, expected: &Value) -> Self {
        if ok { Verdict::Pass } else { Verdict::Fail(Diff::mismatch(actual, expected)) }
    }
}

impl From<Option<Diff>> for Verdict {
    fn from(diff: Option<Diff>) -> Self {
        diff.map_or(Verdict::Pass, Verdict::Fail)
    }
}

// ————————————————————————————————————————————————————————————————————————————
// PIPELINE
// ————————————————————————————————————————————————————————————————————————————

/// Runs before the trivial-equality stage for every node pair.
pub trait DiffHook {
    fn name(&self) -> &'static str;

    /// `Some` short-circuits the pair; `None` lets the pipeline continue.
    /// Recurse into children through `differ` so nested pairs are hooked too.
    fn before_trivial(
        &self,
        left: &Value,
        right: &Value,
        path: &str,
        differ: &Differ<'_>,
    ) -> Result<Option<Verdict>, SchemaError>;
}

#[derive(Default)]
pub struct Differ<'h> {
    hooks: Vec<Box<dyn DiffHook + 'h>>,
}

impl<'h> Differ<'h> {
    pub fn new() -> Self {
        Self { hooks: Vec::new() }
    }

    pub fn with_hook(mut self, hook: impl DiffHook + 'h) -> Self {
        self.hooks.push(Box::new(hook));
        self
    }

    pub fn diff(&self, left: &Value, right: &Value) -> Result<Option<Diff>, SchemaError> {
        self.diff_at(left, right, "")
    }

    pub fn diff_at(&self, left: &Value, right: &Value, path: &str) -> Result<Option<Diff>, SchemaError> {
        for hook in &self.hooks {
            if let Some(verdict) = hook.before_trivial(left, right, path, self)? {
                tracing::trace!(hook = hook.name(), path = %display_path(path), "pair settled by hook");
                return Ok(verdict.into_diff());
            }
        }
        self.trivial(left, right, path)
    }

    fn trivial(&self, left: &Value, right: &Value, path: &str) -> Result<Option<Diff>, SchemaError> {
        Ok(match (left, right) {
            (Value::Undefined, Value::Undefined) => None,
            (Value::Undefined, _) => Some(Diff::Added(right.clone())),
            (_, Value::Undefined) => Some(Diff::Removed(left.clone())),
            (Value::Array(xs), Value::Array(ys)) => {
                let mut items = BTreeMap::new();
                for i in 0..xs.len().max(ys.len()) {
                    let d = match (xs.get(i), ys.get(i)) {
                        (Some(x), Some(y)) => self.diff_at(x, y, &format!("{path}[{i}]"))?,
                        (Some(x), None) => Some(Diff::Removed(x.clone())),
                        (None, Some(y)) => Some(Diff::Added(y.clone())),
                        (None, None) => None,
                    };
                    if let Some(d) = d {
                        items.insert(i, d);
                    }
                }
                (!items.is_empty()).then_some(Diff::Array(items))
            }
            (Value::Object(a), Value::Object(b)) => {
                let mut fields = IndexMap::new();
                let keys = a.keys().chain(b.keys().filter(|k| !a.contains_key(*k)));
                for k in keys {
                    if let Some(d) = self.diff_at(left.get(k), right.get(k), &format!("{path}.{k}"))? {
                        fields.insert(k.clone(), d);
                    }
                }
                (!fields.is_empty()).then_some(Diff::Object(fields))
            }
            _ if left == right => None,
            _ => Some(Diff::mismatch(left, right)),
        })
    }
}
