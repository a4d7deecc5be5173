//! Schema model: a one-shot parse of a schema value into a tagged node.
//!
//! Any object carrying `__type` is a typed directive; every other object is a
//! plain record. The parse validates the directive's attributes once, so the
//! generator and the verifier dispatch on typed data instead of probing keys.

use crate::error::SchemaError;
use crate::format::TextFormat;
use crate::value::{Map, Value};

pub const TYPE: &str = "__type";
pub const MIN: &str = "__min";
pub const MAX: &str = "__max";
pub const RATIO: &str = "__ratio";
pub const FORMAT: &str = "__format";
pub const FORMAT_INTEGER: &str = "__formatInteger";
pub const ITEM: &str = "__item";
pub const VALUE: &str = "__value";
pub const JSON_PATH: &str = "__jsonPath";

/// Default integer bounds for generation: ±2^53, the exactly representable range.
pub const SAFE_INTEGER_BOUND: i64 = 1 << 53;

/// Upper array length used when `__max` is absent.
pub const DEFAULT_ARRAY_MAX: usize = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimestampUnit {
    Seconds,
    Milliseconds,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Node<'a> {
    /// Scalars, `null`, `undefined` and embedded patterns: match themselves.
    Literal(&'a Value),
    /// Plain array: fixed-arity, positional.
    Tuple(&'a [Value]),
    /// Plain object.
    Record(&'a Map),
    Directive(Directive<'a>),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Directive<'a> {
    Integer {
        min: Option<f64>,
        max: Option<f64>,
        timestamp: Option<TimestampUnit>,
    },
    Float {
        min: Option<f64>,
        max: Option<f64>,
    },
    Boolean {
        ratio: Option<f64>,
    },
    BigInt {
        value: Option<&'a Value>,
        min: Option<f64>,
        max: Option<f64>,
    },
    String {
        format: TextFormat,
    },
    Array {
        min: Option<usize>,
        max: Option<usize>,
        item: &'a Value,
    },
    Ref {
        json_path: &'a str,
    },
}

impl Directive<'_> {
    pub fn tag(&self) -> &'static str {
        match self {
            Directive::Integer { .. } => "integer",
            Directive::Float { .. } => "float",
            Directive::Boolean { .. } => "boolean",
            Directive::BigInt { .. } => "bigint",
            Directive::String { .. } => "string",
            Directive::Array { .. } => "array",
            Directive::Ref { .. } => "ref",
        }
    }
}

impl<'a> Node<'a> {
    /// Classify `value`. `path` only feeds error messages.
    pub fn parse(value: &'a Value, path: &str) -> Result<Self, SchemaError> {
        match value {
            Value::Array(xs) => Ok(Node::Tuple(xs)),
            Value::Object(m) => match m.get(TYPE) {
                None | Some(Value::Undefined) => Ok(Node::Record(m)),
                Some(Value::String(tag)) if !tag.is_empty() => {
                    parse_directive(tag, m, path).map(Node::Directive)
                }
                Some(_) => Err(SchemaError::InvalidTag { path: display_path(path) }),
            },
            _ => Ok(Node::Literal(value)),
        }
    }
}

/// Whether `value` is an object carrying the discriminator.
pub fn is_directive(value: &Value) -> bool {
    value.as_object().is_some_and(|m| m.get(TYPE).is_some_and(|t| !t.is_undefined()))
}

pub(crate) fn display_path(path: &str) -> String {
    if path.is_empty() { "$".to_string() } else { format!("${path}") }
}

fn parse_directive<'a>(tag: &str, m: &'a Map, path: &str) -> Result<Directive<'a>, SchemaError> {
    let attrs = Attrs { m, path };
    match tag {
        "integer" => Ok(Directive::Integer {
            min: attrs.number("integer", MIN)?,
            max: attrs.number("integer", MAX)?,
            timestamp: attrs.timestamp()?,
        }),
        "float" => Ok(Directive::Float {
            min: attrs.number("float", MIN)?,
            max: attrs.number("float", MAX)?,
        }),
        "boolean" => Ok(Directive::Boolean { ratio: attrs.ratio()? }),
        "bigint" => Ok(Directive::BigInt {
            value: attrs.bigint_value()?,
            min: attrs.number("bigint", MIN)?,
            max: attrs.number("bigint", MAX)?,
        }),
        "string" => Ok(Directive::String { format: attrs.format()? }),
        "array" => {
            let item = attrs.get(ITEM);
            if item.is_undefined() {
                return Err(SchemaError::MissingItem { path: display_path(path) });
            }
            let min = attrs.length(MIN)?;
            let max = attrs.length(MAX)?;
            if let (Some(lo), Some(hi)) = (min, max) {
                if hi < lo {
                    return Err(attrs.invalid("array", MAX, format!("{hi} is below __min {lo}")));
                }
            }
            Ok(Directive::Array { min, max, item })
        }
        "ref" => match attrs.get(JSON_PATH) {
            Value::Undefined | Value::Null => Err(SchemaError::MissingJsonPath { path: display_path(path) }),
            Value::String(s) if s.is_empty() => Err(SchemaError::MissingJsonPath { path: display_path(path) }),
            Value::String(s) => Ok(Directive::Ref { json_path: s }),
            other => Err(attrs.invalid("ref", JSON_PATH, format!("expected a string, found {}", other.kind()))),
        },
        other => Err(SchemaError::UnknownType {
            tag: other.to_string(),
            path: display_path(path),
        }),
    }
}

struct Attrs<'a, 'p> {
    m: &'a Map,
    path: &'p str,
}

impl<'a> Attrs<'a, '_> {
    fn get(&self, key: &str) -> &'a Value {
        static UNDEFINED: Value = Value::Undefined;
        self.m.get(key).unwrap_or(&UNDEFINED)
    }

    fn invalid(&self, tag: &'static str, attribute: &'static str, reason: String) -> SchemaError {
        SchemaError::InvalidAttribute {
            tag,
            attribute,
            path: display_path(self.path),
            reason,
        }
    }

    fn number(&self, tag: &'static str, key: &'static str) -> Result<Option<f64>, SchemaError> {
        match self.get(key) {
            Value::Undefined | Value::Null => Ok(None),
            Value::Number(n) => Ok(n.as_f64()),
            other => Err(self.invalid(tag, key, format!("expected a number, found {}", other.kind()))),
        }
    }

    fn length(&self, key: &'static str) -> Result<Option<usize>, SchemaError> {
        match self.number("array", key)? {
            None => Ok(None),
            Some(n) if n >= 0.0 && n.fract() == 0.0 && n <= usize::MAX as f64 => Ok(Some(n as usize)),
            Some(n) => Err(self.invalid("array", key, format!("{n} is not a non-negative integer"))),
        }
    }

    fn ratio(&self) -> Result<Option<f64>, SchemaError> {
        match self.number("boolean", RATIO)? {
            Some(r) if !(0.0..=1.0).contains(&r) => {
                Err(self.invalid("boolean", RATIO, format!("{r} is outside [0, 1]")))
            }
            r => Ok(r),
        }
    }

    fn timestamp(&self) -> Result<Option<TimestampUnit>, SchemaError> {
        match self.get(FORMAT_INTEGER) {
            Value::Undefined | Value::Null => Ok(None),
            Value::String(s) if s == "timestamp-seconds" => Ok(Some(TimestampUnit::Seconds)),
            Value::String(s) if s == "timestamp-milliseconds" => Ok(Some(TimestampUnit::Milliseconds)),
            Value::String(s) => Err(self.invalid(
                "integer",
                FORMAT_INTEGER,
                format!("`{s}` is neither timestamp-seconds nor timestamp-milliseconds"),
            )),
            other => Err(self.invalid("integer", FORMAT_INTEGER, format!("expected a string, found {}", other.kind()))),
        }
    }

    fn bigint_value(&self) -> Result<Option<&'a Value>, SchemaError> {
        match self.get(VALUE) {
            Value::Undefined => Ok(None),
            v @ (Value::String(_) | Value::Number(_)) => Ok(Some(v)),
            other => Err(self.invalid("bigint", VALUE, format!("expected a string or number, found {}", other.kind()))),
        }
    }

    fn format(&self) -> Result<TextFormat, SchemaError> {
        match self.get(FORMAT) {
            Value::Undefined | Value::Null => Ok(TextFormat::Any),
            Value::String(s) => Ok(TextFormat::from_text(s)),
            Value::Pattern(p) => Ok(TextFormat::Pattern(p.clone())),
            other => Err(self.invalid("string", FORMAT, format!("expected a name or pattern, found {}", other.kind()))),
        }
    }
}
