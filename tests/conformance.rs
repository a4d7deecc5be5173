use chrono::{DateTime, Utc};
use json_schemock::generate::FixedClock;
use json_schemock::{codec, verify, Generator, Map, Pattern, SchemaError, Value};
use proptest::prelude::*;
use serde_json::json;

fn v(x: serde_json::Value) -> Value {
    Value::from(x)
}

fn no_args() -> Map {
    Map::new()
}

// ————————————————————————————————————————————————————————————————————————————
// SCENARIOS
// ————————————————————————————————————————————————————————————————————————————

#[test]
fn sibling_reference_is_substituted() {
    let schema = v(json!({"a": 5, "b": {"__type": "ref", "__jsonPath": "$.self.a"}}));
    let doc = Generator::seeded(1).generate(&schema, &no_args()).unwrap();
    assert_eq!(serde_json::to_value(&doc).unwrap(), json!({"a": 5, "b": 5}));
    assert_eq!(verify(&doc, &schema, &no_args()).unwrap(), None);
}

#[test]
fn integer_document_passes_and_fails() {
    let schema = v(json!({"n": {"__type": "integer", "__min": 1, "__max": 10}}));
    assert_eq!(verify(&v(json!({"n": 4})), &schema, &no_args()).unwrap(), None);
    let diff = verify(&v(json!({"n": 11})), &schema, &no_args()).unwrap().unwrap();
    assert_eq!(
        serde_json::to_value(&diff).unwrap(),
        json!({"n": [11, {"__type": "integer", "__min": 1, "__max": 10}]})
    );
}

#[test]
fn array_mismatch_is_isolated_to_the_failing_index() {
    let mut item = Map::new();
    item.insert("__type".into(), Value::from("string"));
    item.insert("__format".into(), Value::Pattern(Pattern::new(r"^\d+$", "").unwrap()));
    let mut arr = Map::new();
    arr.insert("__type".into(), Value::from("array"));
    arr.insert("__min".into(), Value::from(0));
    arr.insert("__max".into(), Value::from(5));
    arr.insert("__item".into(), Value::Object(item));
    let mut schema = Map::new();
    schema.insert("arr".into(), Value::Object(arr));
    let schema = Value::Object(schema);

    let diff = verify(&v(json!({"arr": ["12", "x3"]})), &schema, &no_args()).unwrap().unwrap();
    let leaves = diff.leaves();
    assert_eq!(leaves.len(), 1);
    assert_eq!(leaves[0].0, "$.arr[1]");
    let delta = diff.to_delta();
    assert_eq!(delta["arr"]["_t"], json!("a"));
    assert_eq!(delta["arr"]["1"][0], json!("x3"));
    assert_eq!(delta["arr"]["1"][1], json!({"__type": "string", "__format": "regexp____^\\d+$____"}));
}

#[test]
fn array_without_item_fails_both_ways() {
    let schema = v(json!({"__type": "array"}));
    assert!(matches!(
        Generator::seeded(2).compile(&schema, &no_args()),
        Err(SchemaError::MissingItem { .. })
    ));
    assert!(matches!(verify(&v(json!([])), &schema, &no_args()), Err(SchemaError::MissingItem { .. })));
}

#[test]
fn no_mock_mode_defers_synthesis() {
    let at = DateTime::<Utc>::from_timestamp(1_624_349_648, 0).unwrap();
    let schema = v(json!({
        "id": {"__type": "integer", "__min": 1},
        "createdAt": {"__type": "integer", "__formatInteger": "timestamp-seconds"},
        "owner": {"__type": "ref", "__jsonPath": "$.user"},
    }));
    let mut args = Map::new();
    args.insert("user".into(), Value::from("ada"));
    let out = Generator::seeded(3).with_clock(FixedClock(at)).resolve_literals(&schema, &args).unwrap();
    assert_eq!(
        out,
        v(json!({"id": {"__type": "integer", "__min": 1}, "createdAt": 1_624_349_648i64, "owner": "ada"}))
    );
}

#[test]
fn schema_files_round_trip_through_the_codec() {
    let text = r#"{"code": {"__type": "string", "__format": "regexp____^[A-Z]{3}$____i"}, "n": 1}"#;
    let schema = codec::parse(text).unwrap();
    assert!(matches!(schema.get("code").get("__format"), Value::Pattern(p) if p.has_flag('i')));
    let doc = Generator::seeded(4).generate(&schema, &no_args()).unwrap();
    assert_eq!(verify(&doc, &schema, &no_args()).unwrap(), None);
    assert_eq!(codec::parse(&codec::stringify(&schema).unwrap()).unwrap(), schema);
}

// ————————————————————————————————————————————————————————————————————————————
// PROPERTIES
// ————————————————————————————————————————————————————————————————————————————

const NAMED: [&str; 10] = ["email", "phone", "ip", "id", "word", "cname", "ctitle", "date", "hex", "url"];
const PATTERNS: [&str; 4] = [r"/^\d{3}-[a-z]+$/", "/^(foo|bar)+$/i", r"/^[A-F0-9]{2,6}$/", r"/^\w{2}\W?$/"];
/// Integer bounds well past the ±2^53 defaults.
const LARGE: i64 = 1_000_000_000_000_000_000;

fn leaf() -> impl Strategy<Value = serde_json::Value> {
    prop_oneof![
        any::<i32>().prop_map(|n| json!(n)),
        "[a-z]{0,8}".prop_map(|s| json!(s)),
        Just(json!(null)),
        (any::<i32>(), 0i64..1000).prop_map(|(lo, span)| {
            json!({"__type": "integer", "__min": lo, "__max": i64::from(lo) + span})
        }),
        (-1e6f64..1e6, 0f64..1e3).prop_map(|(lo, span)| json!({"__type": "float", "__min": lo, "__max": lo + span})),
        (-1e300f64..1e300).prop_map(|lo| json!({"__type": "float", "__min": lo})),
        (-1e300f64..1e300).prop_map(|hi| json!({"__type": "float", "__max": hi})),
        Just(json!({"__type": "float", "__min": -1.7e308, "__max": 1.7e308})),
        (-LARGE..LARGE).prop_map(|lo| json!({"__type": "integer", "__min": lo})),
        (-LARGE..LARGE).prop_map(|hi| json!({"__type": "integer", "__max": hi})),
        (0f64..=1.0).prop_map(|r| json!({"__type": "boolean", "__ratio": r})),
        prop::sample::select(NAMED.to_vec()).prop_map(|f| json!({"__type": "string", "__format": f})),
        prop::sample::select(PATTERNS.to_vec()).prop_map(|p| json!({"__type": "string", "__format": p})),
        Just(json!({"__type": "string"})),
        Just(json!({"__type": "bigint", "__value": "123456789012345678901234567890"})),
    ]
}

fn schema() -> impl Strategy<Value = serde_json::Value> {
    leaf().prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(serde_json::Value::Array),
            prop::collection::btree_map("[a-z]{1,6}", inner.clone(), 0..4).prop_map(|m| json!(m)),
            (inner, 0usize..3, 0usize..4).prop_map(|(item, min, extra)| {
                json!({"__type": "array", "__min": min, "__max": min + extra, "__item": item})
            }),
        ]
    })
}

/// Swap `/body/flags` format text for embedded patterns.
fn embed_patterns(value: Value) -> Value {
    match value {
        Value::Object(m) => Value::Object(
            m.into_iter()
                .map(|(k, x)| match x {
                    Value::String(s) if k == "__format" && s.starts_with('/') => {
                        (k, Value::Pattern(Pattern::parse_notation(&s).unwrap()))
                    }
                    other => (k, embed_patterns(other)),
                })
                .collect(),
        ),
        Value::Array(xs) => Value::Array(xs.into_iter().map(embed_patterns).collect()),
        other => other,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn generated_documents_verify_against_their_schema(s in schema(), seed in any::<u64>()) {
        let schema = embed_patterns(v(s));
        let doc = Generator::seeded(seed).generate(&schema, &no_args()).unwrap();
        let diff = verify(&doc, &schema, &no_args()).unwrap();
        prop_assert!(diff.is_none(), "{:?}", diff.map(|d| d.to_delta()));
    }

    #[test]
    fn seeded_generation_repeats(s in schema(), seed in any::<u64>()) {
        let schema = v(s);
        let a = Generator::seeded(seed).generate(&schema, &no_args()).unwrap();
        let b = Generator::seeded(seed).generate(&schema, &no_args()).unwrap();
        prop_assert_eq!(a, b);
    }

    #[test]
    fn numbers_stay_within_bounds(lo in -1_000_000i64..1_000_000, span in 0i64..50, flo in -10.0f64..10.0, fspan in 0.0f64..0.001, seed in any::<u64>()) {
        let schema = v(json!({
            "i": {"__type": "integer", "__min": lo, "__max": lo + span},
            "f": {"__type": "float", "__min": flo, "__max": flo + fspan},
            "xs": {"__type": "array", "__min": 1, "__max": 3, "__item": 0},
        }));
        let doc = Generator::seeded(seed).generate(&schema, &no_args()).unwrap();
        let i = doc.get("i").as_f64().unwrap();
        prop_assert!(i >= lo as f64 && i <= (lo + span) as f64);
        let f = doc.get("f").as_f64().unwrap();
        prop_assert!(f >= flo && f <= flo + fspan);
        let n = doc.get("xs").as_array().unwrap().len();
        prop_assert!((1..=3).contains(&n));
    }

    #[test]
    fn pattern_verdicts_follow_the_pattern(candidate in "[a-eé登]{0,6}") {
        let pattern = Pattern::new("^[a-c]{2,4}$", "").unwrap();
        let mut node = Map::new();
        node.insert("__type".into(), Value::from("string"));
        node.insert("__format".into(), Value::Pattern(pattern.clone()));
        let schema = Value::Object(node);
        let doc = Value::from(candidate.as_str());
        let diff = verify(&doc, &schema, &no_args()).unwrap();
        if pattern.is_match(&candidate) {
            prop_assert!(diff.is_none());
        } else {
            prop_assert_eq!(diff.map(|d| d.to_delta()), Some(json!([candidate, "regexp____^[a-c]{2,4}$____"])));
        }
    }

    #[test]
    fn word_classes_reject_non_ascii_text(candidate in "[a-c1١٢登_é]{0,6}") {
        let pattern = Pattern::new(r"^\w{2,4}$", "").unwrap();
        let mut node = Map::new();
        node.insert("__type".into(), Value::from("string"));
        node.insert("__format".into(), Value::Pattern(pattern));
        let diff = verify(&Value::from(candidate.as_str()), &Value::Object(node), &no_args()).unwrap();
        let width = candidate.chars().count();
        let ascii_word = candidate.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        prop_assert_eq!(diff.is_none(), (2..=4).contains(&width) && ascii_word, "{:?}", candidate);
    }

    #[test]
    fn codec_round_trips(s in schema()) {
        let schema = embed_patterns(v(s));
        let text = codec::stringify(&schema).unwrap();
        prop_assert_eq!(codec::parse(&text).unwrap(), schema);
    }
}
