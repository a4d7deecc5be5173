//! Generator compiler.
//!
//! A schema compiles into a [`Plan`]: a tree of synthesis directives in which
//! references are already substituted and array lengths are already drawn.
//! Realising the plan with a [`Synthesizer`] yields a document.
//!
//! ```text
//! schema ──compile──▶ Plan ──realize──▶ Value
//!        └─resolve_literals──▶ Value (directives kept, refs substituted)
//! ```
pub mod clock;
pub mod synth;
pub mod text;

use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::json;

use crate::error::SchemaError;
use crate::format::TextFormat;
use crate::resolve::{generation_context, PathResolver, RefRequest, ResolveRef};
use crate::schema::{
    self, display_path, Directive, Node, TimestampUnit, DEFAULT_ARRAY_MAX, SAFE_INTEGER_BOUND,
};
use crate::value::{Map, Value};

pub use clock::{Clock, FixedClock, SystemClock};
pub use synth::{RandomSynthesizer, Synthesizer};

const DEFAULT_RATIO: f64 = 0.5;

/// Largest array length generation will expand.
pub const MAX_GENERATED_LENGTH: usize = 100_000;

// ————————————————————————————————————————————————————————————————————————————
// PLAN
// ————————————————————————————————————————————————————————————————————————————

#[derive(Clone, Debug, PartialEq)]
pub enum Plan {
    /// Emitted as-is.
    Literal(Value),
    Integer { min: i64, max: i64 },
    /// Wall-clock time at realisation.
    Timestamp(TimestampUnit),
    Float { min: f64, max: f64 },
    Boolean { ratio: f64 },
    Text(TextFormat),
    List(Vec<Plan>),
    Record(IndexMap<String, Plan>),
}

impl Plan {
    pub fn realize(&self, synth: &mut dyn Synthesizer, clock: &dyn Clock) -> Result<Value, SchemaError> {
        Ok(match self {
            Plan::Literal(v) => v.clone(),
            Plan::Integer { min, max } => Value::from(synth.integer(*min, *max)),
            Plan::Timestamp(unit) => Value::from(clock::timestamp(clock, *unit)),
            Plan::Float { min, max } => {
                let f = synth.float(*min, *max);
                serde_json::Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
            }
            Plan::Boolean { ratio } => Value::Bool(synth.boolean(*ratio)),
            Plan::Text(format) => Value::String(synth.text(format, clock)?),
            Plan::List(xs) => Value::Array(
                xs.iter()
                    .map(|x| x.realize(synth, clock))
                    .collect::<Result<_, _>>()?,
            ),
            Plan::Record(fields) => {
                let mut out = Map::with_capacity(fields.len());
                for (k, p) in fields {
                    out.insert(k.clone(), p.realize(synth, clock)?);
                }
                Value::Object(out)
            }
        })
    }

    /// Mock-template rendering (`"@integer(1, 10)"`, `"@email"`, ...), for
    /// inspecting a plan.
    pub fn template(&self) -> serde_json::Value {
        match self {
            Plan::Literal(v) => v.to_json(),
            Plan::Integer { min, max } => json!(format!("@integer({min}, {max})")),
            Plan::Timestamp(TimestampUnit::Seconds) => json!("@timestamp-seconds"),
            Plan::Timestamp(TimestampUnit::Milliseconds) => json!("@timestamp-milliseconds"),
            Plan::Float { min, max } => json!(format!("@float({min}, {max})")),
            Plan::Boolean { ratio } => json!(format!("@boolean({ratio})")),
            Plan::Text(TextFormat::Any) => json!("@string"),
            Plan::Text(TextFormat::Named(name)) => json!(format!("@{name}")),
            Plan::Text(TextFormat::Pattern(p)) => json!(p.to_string()),
            Plan::Text(TextFormat::Unknown(name)) => json!(format!("@{name}")),
            Plan::List(xs) => serde_json::Value::Array(xs.iter().map(Plan::template).collect()),
            Plan::Record(fields) => serde_json::Value::Object(
                fields.iter().map(|(k, p)| (k.clone(), p.template())).collect(),
            ),
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// GENERATOR
// ————————————————————————————————————————————————————————————————————————————

/// Generation configuration plus the compiler itself.
pub struct Generator {
    synth: Box<dyn Synthesizer>,
    clock: Arc<dyn Clock>,
    resolver: Arc<dyn ResolveRef>,
}

impl Default for Generator {
    fn default() -> Self {
        Self::new()
    }
}

impl Generator {
    pub fn new() -> Self {
        Self::with_parts(Box::new(RandomSynthesizer::from_entropy()))
    }

    pub fn seeded(seed: u64) -> Self {
        Self::with_parts(Box::new(RandomSynthesizer::seeded(seed)))
    }

    fn with_parts(synth: Box<dyn Synthesizer>) -> Self {
        Self {
            synth,
            clock: Arc::new(SystemClock),
            resolver: Arc::new(PathResolver),
        }
    }

    pub fn with_synthesizer(mut self, synth: impl Synthesizer + 'static) -> Self {
        self.synth = Box::new(synth);
        self
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn with_resolver(mut self, resolver: impl ResolveRef + 'static) -> Self {
        self.resolver = Arc::new(resolver);
        self
    }

    /// Compile `schema` into a plan. `args` is exposed to references next to
    /// `self`, which is bound to `schema`.
    pub fn compile(&mut self, schema: &Value, args: &Map) -> Result<Plan, SchemaError> {
        let cx = generation_context(args, schema);
        self.compile_at(schema, &cx, "")
    }

    /// Compile and realise in one go.
    pub fn generate(&mut self, schema: &Value, args: &Map) -> Result<Value, SchemaError> {
        let plan = self.compile(schema, args)?;
        plan.realize(self.synth.as_mut(), self.clock.as_ref())
    }

    /// Like [`Generator::compile`] with the root path supplied by the caller.
    pub fn compile_at(&mut self, node: &Value, cx: &Value, path: &str) -> Result<Plan, SchemaError> {
        match Node::parse(node, path)? {
            Node::Literal(v) => Ok(Plan::Literal(v.clone())),
            Node::Tuple(xs) => xs
                .iter()
                .enumerate()
                .map(|(i, x)| self.compile_at(x, cx, &format!("{path}[{i}]")))
                .collect::<Result<_, _>>()
                .map(Plan::List),
            Node::Record(m) => {
                let mut fields = IndexMap::with_capacity(m.len());
                for (k, v) in m {
                    fields.insert(k.clone(), self.compile_at(v, cx, &format!("{path}.{k}"))?);
                }
                Ok(Plan::Record(fields))
            }
            Node::Directive(d) => self.compile_directive(d, node, cx, path),
        }
    }

    fn compile_directive(
        &mut self,
        directive: Directive<'_>,
        node: &Value,
        cx: &Value,
        path: &str,
    ) -> Result<Plan, SchemaError> {
        match directive {
            Directive::Integer { timestamp: Some(unit), .. } => Ok(Plan::Timestamp(unit)),
            Directive::Integer { min, max, .. } => integer_plan("integer", min, max, path),
            Directive::BigInt { value: Some(v), .. } => Ok(Plan::Literal(v.clone())),
            Directive::BigInt { min, max, .. } => integer_plan("bigint", min, max, path),
            Directive::Float { min, max } => {
                let (lo, hi) = default_bounds(min, max, SAFE_INTEGER_BOUND as f64);
                if hi < lo {
                    return Err(below_min("float", path, hi, lo));
                }
                Ok(Plan::Float { min: lo, max: hi })
            }
            Directive::Boolean { ratio } => Ok(Plan::Boolean { ratio: ratio.unwrap_or(DEFAULT_RATIO) }),
            Directive::String { format: TextFormat::Unknown(format) } => Err(SchemaError::UnknownFormat {
                format,
                path: display_path(path),
            }),
            Directive::String { format } => Ok(Plan::Text(format)),
            Directive::Array { min, max, item } => {
                let lo = min.unwrap_or(0);
                let hi = max.unwrap_or(DEFAULT_ARRAY_MAX.max(lo));
                if let Some((attribute, n)) = [(schema::MIN, lo), (schema::MAX, hi)]
                    .into_iter()
                    .find(|(_, n)| *n > MAX_GENERATED_LENGTH)
                {
                    return Err(SchemaError::InvalidAttribute {
                        tag: "array",
                        attribute,
                        path: display_path(path),
                        reason: format!("{n} exceeds the generation limit of {MAX_GENERATED_LENGTH} items"),
                    });
                }
                let len = self.synth.length(lo, hi);
                tracing::debug!(path = %display_path(path), len, "expanding array");
                let plan = self.compile_at(item, cx, &format!("{path}[]"))?;
                Ok(Plan::List(vec![plan; len]))
            }
            Directive::Ref { json_path } => {
                let resolved = self.resolver.resolve(&RefRequest { context: cx, json_path, node })?;
                tracing::debug!(path = %display_path(path), %json_path, kind = resolved.kind(), "resolved reference");
                self.compile_at(&resolved, cx, path)
            }
        }
    }

    /// No-mock mode: substitute references, timestamps and bigint literals but
    /// keep every other directive as a schema node for later synthesis.
    ///
    /// Timestamp integers read the clock, so the result depends on the time of
    /// the call unless a fixed clock is configured.
    pub fn resolve_literals(&self, schema: &Value, args: &Map) -> Result<Value, SchemaError> {
        let cx = generation_context(args, schema);
        self.literal_at(schema, &cx, "")
    }

    fn literal_at(&self, node: &Value, cx: &Value, path: &str) -> Result<Value, SchemaError> {
        match Node::parse(node, path)? {
            Node::Literal(v) => Ok(v.clone()),
            Node::Tuple(xs) => xs
                .iter()
                .enumerate()
                .map(|(i, x)| self.literal_at(x, cx, &format!("{path}[{i}]")))
                .collect::<Result<_, _>>()
                .map(Value::Array),
            Node::Record(m) => {
                let mut out = Map::with_capacity(m.len());
                for (k, v) in m {
                    out.insert(k.clone(), self.literal_at(v, cx, &format!("{path}.{k}"))?);
                }
                Ok(Value::Object(out))
            }
            Node::Directive(Directive::Integer { timestamp: Some(unit), .. }) => {
                Ok(Value::from(clock::timestamp(self.clock.as_ref(), unit)))
            }
            Node::Directive(Directive::BigInt { value: Some(v), .. }) => Ok(v.clone()),
            Node::Directive(Directive::Array { item, .. }) => {
                let resolved = self.literal_at(item, cx, &format!("{path}[]"))?;
                let mut out = node.as_object().cloned().unwrap_or_default();
                out.insert(schema::ITEM.to_string(), resolved);
                Ok(Value::Object(out))
            }
            Node::Directive(Directive::Ref { json_path }) => {
                let resolved = self.resolver.resolve(&RefRequest { context: cx, json_path, node })?;
                self.literal_at(&resolved, cx, path)
            }
            Node::Directive(_) => Ok(node.clone()),
        }
    }
}

fn below_min(tag: &'static str, path: &str, hi: impl std::fmt::Display, lo: impl std::fmt::Display) -> SchemaError {
    SchemaError::InvalidAttribute {
        tag,
        attribute: schema::MAX,
        path: display_path(path),
        reason: format!("{hi} is below __min {lo}"),
    }
}

/// Fill a missing bound with `±bound`, widened so it never crosses the bound
/// that was given.
fn default_bounds<T: PartialOrd + Copy + std::ops::Neg<Output = T>>(min: Option<T>, max: Option<T>, bound: T) -> (T, T) {
    let wider = |a: T, b: T| if a > b { a } else { b };
    let narrower = |a: T, b: T| if a < b { a } else { b };
    match (min, max) {
        (Some(lo), Some(hi)) => (lo, hi),
        (Some(lo), None) => (lo, wider(lo, bound)),
        (None, Some(hi)) => (narrower(hi, -bound), hi),
        (None, None) => (-bound, bound),
    }
}

fn integer_plan(tag: &'static str, min: Option<f64>, max: Option<f64>, path: &str) -> Result<Plan, SchemaError> {
    let (lo, hi) = default_bounds(
        min.map(|m| m.ceil() as i64),
        max.map(|m| m.floor() as i64),
        SAFE_INTEGER_BOUND,
    );
    if hi < lo {
        return Err(below_min(tag, path, hi, lo));
    }
    Ok(Plan::Integer { min: lo, max: hi })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use serde_json::json;

    fn schema(v: serde_json::Value) -> Value {
        Value::from(v)
    }

    fn fixed() -> FixedClock {
        FixedClock(DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap())
    }

    #[test]
    fn references_resolve_against_the_schema_root() {
        let s = schema(json!({"a": 5, "b": {"__type": "ref", "__jsonPath": "$.self.a"}}));
        let out = Generator::seeded(1).generate(&s, &Map::new()).unwrap();
        assert_eq!(out, schema(json!({"a": 5, "b": 5})));
    }

    #[test]
    fn references_reach_caller_args_and_recompile_targets() {
        let s = schema(json!({
            "n": {"__type": "integer", "__min": 3, "__max": 3},
            "copy": {"__type": "ref", "__jsonPath": "$.self.n"},
            "other": {"__type": "ref", "__jsonPath": "$.other"},
            "missing": {"__type": "ref", "__jsonPath": "$.other1.add"},
        }));
        let mut args = Map::new();
        args.insert("other".into(), Value::from(1));
        let out = Generator::seeded(2).generate(&s, &args).unwrap();
        assert_eq!(out.get("copy"), &Value::from(3));
        assert_eq!(out.get("other"), &Value::from(1));
        assert!(out.get("missing").is_undefined());
        assert_eq!(serde_json::to_value(&out).unwrap(), json!({"n": 3, "copy": 3, "other": 1}));
    }

    #[test]
    fn custom_resolver_overrides_lookup() {
        let s = schema(json!({"x": {"__type": "ref", "__jsonPath": "$.other1.add"}}));
        let out = Generator::seeded(3)
            .with_resolver(|req: &RefRequest<'_>| -> Result<Value, SchemaError> {
                if req.json_path == "$.other1.add" {
                    Ok(Value::from("resolveByCustomer"))
                } else {
                    PathResolver.resolve(req)
                }
            })
            .generate(&s, &Map::new())
            .unwrap();
        assert_eq!(out.get("x"), &Value::from("resolveByCustomer"));
    }

    #[test]
    fn ranges_and_lengths_are_respected() {
        let s = schema(json!({
            "i": {"__type": "integer", "__min": 1, "__max": 10},
            "f": {"__type": "float", "__min": 1.1, "__max": 2.4},
            "xs": {"__type": "array", "__min": 2, "__max": 5, "__item": {"__type": "integer", "__min": -3, "__max": 3}},
            "ys": {"__type": "array", "__item": 0},
        }));
        let mut g = Generator::seeded(4);
        for _ in 0..100 {
            let out = g.generate(&s, &Map::new()).unwrap();
            let i = out.get("i").as_f64().unwrap();
            assert!((1.0..=10.0).contains(&i) && i.fract() == 0.0);
            let f = out.get("f").as_f64().unwrap();
            assert!((1.1..=2.4).contains(&f));
            let xs = out.get("xs").as_array().unwrap();
            assert!((2..=5).contains(&xs.len()));
            assert!(xs.iter().all(|x| (-3.0..=3.0).contains(&x.as_f64().unwrap())));
            assert!(out.get("ys").as_array().unwrap().len() <= DEFAULT_ARRAY_MAX);
        }
    }

    #[test]
    fn tuples_are_positional() {
        let s = schema(json!([1, {"__type": "boolean", "__ratio": 1}, "x"]));
        let out = Generator::seeded(5).generate(&s, &Map::new()).unwrap();
        assert_eq!(out, schema(json!([1, true, "x"])));
    }

    #[test]
    fn timestamps_come_from_the_clock() {
        let s = schema(json!({
            "s": {"__type": "integer", "__formatInteger": "timestamp-seconds"},
            "ms": {"__type": "integer", "__formatInteger": "timestamp-milliseconds"},
        }));
        let out = Generator::seeded(6).with_clock(fixed()).generate(&s, &Map::new()).unwrap();
        assert_eq!(out, schema(json!({"s": 1_700_000_000i64, "ms": 1_700_000_000_000i64})));
    }

    #[test]
    fn schema_errors_fail_fast() {
        let mut g = Generator::seeded(7);
        let missing_item = schema(json!({"a": {"__type": "array"}}));
        assert_eq!(
            g.compile(&missing_item, &Map::new()).unwrap_err(),
            SchemaError::MissingItem { path: "$.a".into() }
        );
        let missing_path = schema(json!([{"__type": "ref"}]));
        assert!(matches!(g.compile(&missing_path, &Map::new()), Err(SchemaError::MissingJsonPath { .. })));
        let unknown = schema(json!({"__type": "ref_env"}));
        assert!(matches!(g.compile(&unknown, &Map::new()), Err(SchemaError::UnknownType { .. })));
        let bad_format = schema(json!({"__type": "string", "__format": "xx"}));
        assert!(matches!(g.compile(&bad_format, &Map::new()), Err(SchemaError::UnknownFormat { .. })));
        let inverted = schema(json!({"__type": "integer", "__min": 5, "__max": 1}));
        assert!(matches!(g.compile(&inverted, &Map::new()), Err(SchemaError::InvalidAttribute { .. })));
    }

    #[test]
    fn one_sided_bounds_widen_the_default_range() {
        let s = schema(json!({
            "f": {"__type": "float", "__min": 1e16},
            "lo": {"__type": "integer", "__max": -1e17},
            "hi": {"__type": "integer", "__min": 1e17},
            "wide": {"__type": "float", "__min": -1.7e308, "__max": 1.7e308},
        }));
        let mut g = Generator::seeded(10);
        let plan = g.compile(&s, &Map::new()).unwrap();
        let Plan::Record(fields) = &plan else { panic!("expected a record plan") };
        assert_eq!(fields["f"], Plan::Float { min: 1e16, max: 1e16 });
        assert_eq!(fields["lo"], Plan::Integer { min: -100_000_000_000_000_000, max: -100_000_000_000_000_000 });
        assert_eq!(fields["hi"], Plan::Integer { min: 100_000_000_000_000_000, max: 100_000_000_000_000_000 });
        for _ in 0..50 {
            let out = g.generate(&s, &Map::new()).unwrap();
            let wide = out.get("wide").as_f64().unwrap();
            assert!((-1.7e308..=1.7e308).contains(&wide));
            assert_eq!(out.get("f").as_f64(), Some(1e16));
        }
    }

    #[test]
    fn oversized_arrays_are_rejected_before_expansion() {
        let mut g = Generator::seeded(11);
        let huge = schema(json!({"__type": "array", "__min": 1e18, "__item": 0}));
        assert!(matches!(
            g.compile(&huge, &Map::new()),
            Err(SchemaError::InvalidAttribute { attribute: schema::MIN, .. })
        ));
        let wide = schema(json!({"__type": "array", "__max": 1e12, "__item": 0}));
        assert!(matches!(
            g.compile(&wide, &Map::new()),
            Err(SchemaError::InvalidAttribute { attribute: schema::MAX, .. })
        ));
        let at_limit = schema(json!({"__type": "array", "__min": 3, "__max": MAX_GENERATED_LENGTH, "__item": 0}));
        assert!(g.compile(&at_limit, &Map::new()).is_ok());
    }

    #[test]
    fn plan_templates_read_like_mock_directives() {
        let s = schema(json!({
            "n": {"__type": "integer", "__min": 1, "__max": 10},
            "e": {"__type": "string", "__format": "email"},
            "xs": {"__type": "array", "__min": 2, "__max": 2, "__item": {"__type": "boolean"}},
        }));
        let plan = Generator::seeded(8).compile(&s, &Map::new()).unwrap();
        assert_eq!(
            plan.template(),
            json!({"n": "@integer(1, 10)", "e": "@email", "xs": ["@boolean(0.5)", "@boolean(0.5)"]})
        );
    }

    #[test]
    fn resolve_literals_keeps_directives_and_substitutes_the_rest() {
        let s = schema(json!({
            "a": 5,
            "n": {"__type": "integer", "__min": 1},
            "r": {"__type": "ref", "__jsonPath": "$.self.a"},
            "t": {"__type": "integer", "__formatInteger": "timestamp-seconds"},
            "big": {"__type": "bigint", "__value": "9007199254740993"},
            "xs": {"__type": "array", "__max": 3, "__item": {"__type": "ref", "__jsonPath": "$.self.n"}},
        }));
        let out = Generator::seeded(9).with_clock(fixed()).resolve_literals(&s, &Map::new()).unwrap();
        assert_eq!(
            out,
            schema(json!({
                "a": 5,
                "n": {"__type": "integer", "__min": 1},
                "r": 5,
                "t": 1_700_000_000i64,
                "big": "9007199254740993",
                "xs": {"__type": "array", "__max": 3, "__item": {"__type": "integer", "__min": 1}},
            }))
        );
    }
}
