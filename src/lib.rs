//! Schema-driven JSON mock generation and verification.
//!
//! A schema is an ordinary JSON tree in which objects tagged with `__type`
//! are directives (`integer`, `float`, `boolean`, `bigint`, `string`, `array`,
//! `ref`). The same schema drives [`generate`] (produce a conforming document)
//! and [`verify`] (diff a document against it).
pub mod codec;
pub mod diff;
pub mod error;
pub mod format;
pub mod generate;
pub mod jq_exec;
pub mod render;
pub mod resolve;
pub mod schema;
pub mod value;
pub mod verify;

pub use diff::{Diff, Verdict};
pub use error::{CodecError, FormatParseError, SchemaError};
pub use format::{Pattern, TextFormat};
pub use generate::{Generator, Plan};
pub use resolve::{RefRequest, ResolveRef};
pub use value::{Map, Value};
pub use verify::{verify, Verifier};

/// Generate one document from `schema` with an entropy-seeded generator.
pub fn generate(schema: &Value, args: &Map) -> Result<Value, SchemaError> {
    Generator::new().generate(schema, args)
}
