use jaq_core::{compile::Undefined, load, Compiler, Ctx, RcIter};
use jaq_json::Val;
use serde_json::Value;

use crate::error::PathQueryError;

/// Run a jq filter over `input`, collecting every output as JSON.
///
/// Load and compile failures are `Parse` errors; failures while evaluating
/// are `Runtime` errors.
pub fn run_jaq(filter_src: &str, input: &Value) -> Result<Vec<Value>, PathQueryError> {
    let loader = load::Loader::new(jaq_std::defs().chain(jaq_json::defs()));
    let arena = load::Arena::default();
    let program = load::File { code: filter_src, path: () };

    let modules = loader
        .load(&arena, program)
        .map_err(format_parse_errors)?;

    let filter = Compiler::default()
        .with_funs(jaq_std::funs().chain(jaq_json::funs()))
        .compile(modules)
        .map_err(format_undefined_errors)?;

    let inputs = RcIter::new(core::iter::empty());
    let mut it = filter.run((Ctx::new([], &inputs), Val::from(input.clone())));

    let mut out = Vec::new();
    while let Some(item) = it.next() {
        let v = item.map_err(|e| PathQueryError::Runtime(format!("{e:?}")))?;
        let text = format!("{v}"); // Val: Display -> JSON text
        let json = serde_json::from_str::<Value>(&text)
            .map_err(|e| PathQueryError::Runtime(format!("non-JSON output `{text}`: {e}")))?;
        out.push(json);
    }
    Ok(out)
}

fn format_parse_errors(
    errs: Vec<(load::File<&str, ()>, load::Error<&str>)>,
) -> PathQueryError {
    let mut s = String::new();
    for (file, err) in errs {
        s.push_str(&format!("parse error: {err:?} in `{}`\n", file.code));
    }
    PathQueryError::Parse(s.trim_end().to_string())
}

fn format_undefined_errors(
    errs: Vec<(load::File<&str, ()>, Vec<(&str, Undefined)>)>,
) -> PathQueryError {
    let mut s = String::new();
    for (file, list) in errs {
        for (name, undef) in list {
            s.push_str(&format!("undefined `{name}`: {undef:?} in `{}`\n", file.code));
        }
    }
    PathQueryError::Parse(s.trim_end().to_string())
}
