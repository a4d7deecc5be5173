//! Reference resolution: turning a `ref` node's path expression into a value.
//!
//! The default resolver evaluates the expression with jq (`jaq`) against a
//! context object. `$`-rooted JSONPath (`$.self.list[0]`, `$['a b']`,
//! `$.xs[*]`) is translated to a jq path first; any other text is taken to be
//! a jq path expression already.

use crate::error::{PathQueryError, SchemaError};
use crate::jq_exec::run_jaq;
use crate::value::{Map, Value};

/// Key under which the root (schema or document) is exposed to references.
pub const SELF_KEY: &str = "self";

/// Everything a resolver gets to see for one `ref` node.
#[derive(Clone, Copy, Debug)]
pub struct RefRequest<'a> {
    pub context: &'a Value,
    pub json_path: &'a str,
    /// The `ref` directive itself.
    pub node: &'a Value,
}

/// Resolves `ref` nodes. An unmatched path is `Ok(Value::Undefined)`, not an error.
pub trait ResolveRef: Send + Sync {
    fn resolve(&self, request: &RefRequest<'_>) -> Result<Value, SchemaError>;
}

impl<F> ResolveRef for F
where
    F: Fn(&RefRequest<'_>) -> Result<Value, SchemaError> + Send + Sync,
{
    fn resolve(&self, request: &RefRequest<'_>) -> Result<Value, SchemaError> {
        self(request)
    }
}

/// Default resolver backed by the jq path-query evaluator.
#[derive(Clone, Copy, Debug, Default)]
pub struct PathResolver;

impl ResolveRef for PathResolver {
    fn resolve(&self, request: &RefRequest<'_>) -> Result<Value, SchemaError> {
        query(request.context, request.json_path)
    }
}

/// Evaluate `expr` against `context` and return the first match.
pub fn query(context: &Value, expr: &str) -> Result<Value, SchemaError> {
    let jq = to_jq_path(expr)?;
    match run_jaq(&format!("path({jq})"), &context.to_json()) {
        Ok(paths) => match paths.first() {
            Some(serde_json::Value::Array(steps)) => Ok(context.walk(steps)),
            _ => Ok(Value::Undefined),
        },
        Err(PathQueryError::Parse(reason)) => Err(SchemaError::InvalidJsonPath {
            json_path: expr.to_string(),
            reason,
        }),
        Err(PathQueryError::Runtime(reason)) => {
            tracing::debug!(json_path = %expr, %reason, "path did not apply; unresolved");
            Ok(Value::Undefined)
        }
    }
}

/// `{ ...args, self: schema }`: the schema root wins over a caller `self`.
pub fn generation_context(args: &Map, schema: &Value) -> Value {
    let mut cx = args.clone();
    cx.insert(SELF_KEY.to_string(), schema.clone());
    Value::Object(cx)
}

/// `{ self: document, ...ref_data }`: caller data wins over the document root.
pub fn verification_context(document: &Value, ref_data: &Map) -> Value {
    let mut cx = Map::with_capacity(ref_data.len() + 1);
    cx.insert(SELF_KEY.to_string(), document.clone());
    for (k, v) in ref_data {
        cx.insert(k.clone(), v.clone());
    }
    Value::Object(cx)
}

// ————————————————————————————————————————————————————————————————————————————
// JSONPATH → JQ
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, PartialEq)]
enum Step {
    Key(String),
    Index(i64),
    Each,
}

fn to_jq_path(expr: &str) -> Result<String, SchemaError> {
    let expr = expr.trim();
    let Some(rest) = expr.strip_prefix('$') else {
        return Ok(expr.to_string());
    };
    let steps = parse_steps(rest).map_err(|reason| SchemaError::InvalidJsonPath {
        json_path: expr.to_string(),
        reason,
    })?;
    if steps.is_empty() {
        return Ok(".".to_string());
    }
    let parts: Vec<String> = steps
        .iter()
        .map(|step| match step {
            Step::Key(k) => format!(".[{}]", serde_json::Value::from(k.as_str())),
            Step::Index(i) => format!(".[{i}]"),
            Step::Each => ".[]".to_string(),
        })
        .collect();
    Ok(parts.join(" | "))
}

fn parse_steps(mut rest: &str) -> Result<Vec<Step>, String> {
    let mut steps = Vec::new();
    while !rest.is_empty() {
        if rest.starts_with("..") {
            return Err("recursive descent is not supported".to_string());
        }
        if let Some(tail) = rest.strip_prefix('.') {
            let end = tail
                .find(|c: char| c == '.' || c == '[')
                .unwrap_or(tail.len());
            let name = &tail[..end];
            match name {
                "" => return Err("empty member name".to_string()),
                "*" => steps.push(Step::Each),
                _ => steps.push(Step::Key(name.to_string())),
            }
            rest = &tail[end..];
        } else if let Some(tail) = rest.strip_prefix('[') {
            let (step, after) = parse_bracket(tail)?;
            steps.push(step);
            rest = after;
        } else {
            return Err(format!("unexpected `{rest}`"));
        }
    }
    Ok(steps)
}

/// Parse the inside of `[...]`; returns the step and the text after `]`.
fn parse_bracket(tail: &str) -> Result<(Step, &str), String> {
    if let Some(quote) = tail.chars().next().filter(|c| *c == '\'' || *c == '"') {
        let body = &tail[1..];
        let close = body
            .find(quote)
            .ok_or_else(|| "unterminated quoted member".to_string())?;
        let after = body[close + 1..]
            .strip_prefix(']')
            .ok_or_else(|| "expected `]` after quoted member".to_string())?;
        return Ok((Step::Key(body[..close].to_string()), after));
    }
    let close = tail.find(']').ok_or_else(|| "unterminated `[`".to_string())?;
    let inner = tail[..close].trim();
    let after = &tail[close + 1..];
    if inner == "*" {
        return Ok((Step::Each, after));
    }
    inner
        .parse::<i64>()
        .map(|i| (Step::Index(i), after))
        .map_err(|_| format!("unsupported subscript `[{inner}]`"))
}
