//! CLI: generate mock documents from a schema, verify documents against it.
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use rayon::prelude::*;
use serde_json::json;

use json_schemock::jq_exec::run_jaq;
use json_schemock::{Diff, Generator, Map, Value, Verifier, codec, format, render};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// generate JSON mock data from a schema, or verify JSON documents against one
#[derive(Parser, Debug)]
#[command(name = "json-schemock", version)]
pub struct CommandLineInterface {
    /// more logging (-v info, -vv debug, -vvv trace); RUST_LOG takes precedence
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// generate documents that conform to a schema
    Generate(GenerateOut),
    /// verify documents against a schema; exits 1 on any mismatch
    Verify(VerifyOut),
    /// list the named string formats and their patterns
    Formats,
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// treat input as newline-delimited JSON (NDJSON)
    #[arg(long, default_value_t = false)]
    ndjson: bool,

    /// JSON Pointer to select a subnode in each document (e.g. /data/items/0/payload)
    #[arg(long)]
    json_pointer: Option<String>,

    /// JQ pre-process filter for each document; every output is verified
    #[arg(long)]
    jq_expr: Option<String>,

    /// One or more inputs. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,
}

#[derive(clap::Parser, Debug)]
struct GenerateOut {
    /// schema file (patterns may be embedded as `regexp____<source>____<flags>`)
    #[arg(long, short)]
    schema: PathBuf,

    /// JSON object exposed to `ref` paths next to `self`
    #[arg(long)]
    args: Option<PathBuf>,

    /// number of documents; more than one prints a JSON array
    #[arg(long, default_value_t = 1)]
    count: usize,

    /// seed for reproducible output
    #[arg(long)]
    seed: Option<u64>,

    /// only substitute references, timestamps and bigint literals; keep the other directives
    #[arg(long)]
    no_mock: bool,

    /// output .json file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(clap::Parser, Debug)]
struct VerifyOut {
    #[command(flatten)]
    input_settings: InputSettings,

    /// schema file
    #[arg(long, short)]
    schema: PathBuf,

    /// JSON object exposed to `ref` paths next to `self`
    #[arg(long)]
    ref_data: Option<PathBuf>,

    /// report format
    #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
    report: ReportFormat,

    /// output report file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum ReportFormat {
    Text,
    Json,
    Html,
}

/// How a successful run ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Clean,
    Mismatch,
}

impl Outcome {
    pub fn exit_code(self) -> ExitCode {
        match self {
            Outcome::Clean => ExitCode::SUCCESS,
            Outcome::Mismatch => ExitCode::from(1),
        }
    }
}

/// One input document, labelled by where it came from.
struct Document {
    label: String,
    value: serde_json::Value,
}

struct Report {
    label: String,
    document: Value,
    diff: Option<Diff>,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl InputSettings {
    fn load(&self) -> anyhow::Result<Vec<Document>> {
        let source_paths = resolve_file_path_patterns(&self.input)
            .context("failed to resolve input file paths")?;
        let per_file = source_paths
            .par_iter()
            .map(|path| self.load_file(path))
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(per_file.into_iter().flatten().collect())
    }

    fn load_file(&self, source_path: &Path) -> anyhow::Result<Vec<Document>> {
        let source_path_str = source_path.to_string_lossy().to_string();
        let source = std::fs::read_to_string(source_path)
            .with_context(|| format!("failed to read source file ({source_path_str})"))?;
        let values = if self.ndjson {
            source
                .lines()
                .enumerate()
                .filter(|(_, line)| !line.trim().is_empty())
                .map(|(n, line)| {
                    codec::from_str_with_path::<serde_json::Value>(line)
                        .with_context(|| format!("failed to parse JSON ({source_path_str}:{})", n + 1))
                })
                .collect::<anyhow::Result<Vec<_>>>()?
        } else {
            vec![
                codec::from_str_with_path::<serde_json::Value>(&source)
                    .with_context(|| format!("failed to parse JSON source file ({source_path_str})"))?,
            ]
        };
        let mut out = Vec::new();
        for value in values {
            let value = match self.json_pointer.as_ref() {
                None => value,
                Some(pointer) => value
                    .pointer(pointer)
                    .cloned()
                    .with_context(|| format!("JSON pointer {pointer} matched nothing in {source_path_str}"))?,
            };
            match self.jq_expr.as_ref() {
                None => out.push(value),
                Some(jq_expr) => {
                    let result = run_jaq(jq_expr, &value).with_context(|| {
                        format!("failed to apply jq expression to source file ({source_path_str})")
                    })?;
                    out.extend(result);
                }
            }
        }
        let many = out.len() > 1;
        Ok(out
            .into_iter()
            .enumerate()
            .map(|(i, value)| Document {
                label: if many { format!("{source_path_str}#{i}") } else { source_path_str.clone() },
                value,
            })
            .collect())
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn verbosity(&self) -> u8 {
        self.verbose
    }

    pub fn run(&self) -> anyhow::Result<Outcome> {
        match &self.cmd {
            Command::Generate(target) => {
                let schema = read_schema(&target.schema)?;
                let args = match target.args.as_ref() {
                    Some(path) => read_object(path)?,
                    None => Map::new(),
                };
                let mut generator = match target.seed {
                    Some(seed) => Generator::seeded(seed),
                    None => Generator::new(),
                };
                let src = if target.no_mock {
                    codec::stringify_pretty(&generator.resolve_literals(&schema, &args)?)?
                } else {
                    let docs = (0..target.count)
                        .map(|_| generator.generate(&schema, &args))
                        .collect::<Result<Vec<_>, _>>()?;
                    match docs.as_slice() {
                        [one] => serde_json::to_string_pretty(one)?,
                        _ => serde_json::to_string_pretty(&docs)?,
                    }
                };
                write_output(target.out.as_deref(), &src)?;
                Ok(Outcome::Clean)
            }
            Command::Verify(target) => {
                let schema = read_schema(&target.schema)?;
                let ref_data = match target.ref_data.as_ref() {
                    Some(path) => read_object(path)?,
                    None => Map::new(),
                };
                let verifier = Verifier::new(ref_data);
                let documents = target.input_settings.load()?;
                tracing::info!(documents = documents.len(), "verifying");
                let reports = documents
                    .into_par_iter()
                    .map(|doc| -> anyhow::Result<Report> {
                        let document = Value::from(doc.value);
                        let diff = verifier
                            .verify(&document, &schema)
                            .with_context(|| format!("cannot verify {}", doc.label))?;
                        Ok(Report { label: doc.label, document, diff })
                    })
                    .collect::<anyhow::Result<Vec<_>>>()?;
                write_output(target.out.as_deref(), &render_reports(target.report, &reports)?)?;
                if reports.iter().any(|r| r.diff.is_some()) {
                    Ok(Outcome::Mismatch)
                } else {
                    Ok(Outcome::Clean)
                }
            }
            Command::Formats => {
                for name in format::names() {
                    if let Some(pattern) = format::lookup(name) {
                        println!("{name:<12} {pattern}");
                    }
                }
                Ok(Outcome::Clean)
            }
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn render_reports(format: ReportFormat, reports: &[Report]) -> anyhow::Result<String> {
    Ok(match format {
        ReportFormat::Text => {
            let mut out = String::new();
            for r in reports {
                match r.diff.as_ref() {
                    None => out.push_str(&format!("{} {}\n", "ok".green(), r.label)),
                    Some(diff) => {
                        out.push_str(&format!("{} {}\n", "mismatch".red().bold(), r.label));
                        out.push_str(&render::text(diff));
                    }
                }
            }
            out
        }
        ReportFormat::Json => {
            let entries: Vec<serde_json::Value> = reports
                .iter()
                .map(|r| json!({"source": r.label, "ok": r.diff.is_none(), "delta": r.diff}))
                .collect();
            serde_json::to_string_pretty(&entries)?
        }
        ReportFormat::Html => {
            let mut out = String::new();
            for r in reports {
                out.push_str(&format!("<h2>{}</h2>\n", r.label.replace('&', "&amp;").replace('<', "&lt;")));
                match r.diff.as_ref() {
                    None => out.push_str("<p class=\"ok\">conforms</p>\n"),
                    Some(diff) => out.push_str(&render::html(diff, &r.document)),
                }
            }
            out
        }
    })
}

fn read_schema(path: &Path) -> anyhow::Result<Value> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read schema file ({})", path.display()))?;
    codec::parse(&source).with_context(|| format!("failed to parse schema file ({})", path.display()))
}

fn read_object(path: &Path) -> anyhow::Result<Map> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    match codec::parse(&source).with_context(|| format!("failed to parse {}", path.display()))? {
        Value::Object(m) => Ok(m),
        other => bail!("{} must hold a JSON object, found {}", path.display(), other.kind()),
    }
}

fn write_output(out: Option<&Path>, src: &str) -> anyhow::Result<()> {
    match out {
        Some(out) => {
            if let Some(parent) = out.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(out, src).with_context(|| format!("failed to write {}", out.display()))
        }
        None => {
            println!("{src}");
            Ok(())
        }
    }
}

fn resolve_file_path_patterns<I>(patterns: I) -> anyhow::Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        // Minimal glob detection for the `glob` crate syntax.
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{' ))
    }

    let mut out = Vec::<PathBuf>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if has_glob_chars(pattern) {
            let mut matched_any = false;
            for entry in glob::glob(pattern)? {
                matched_any = true;
                out.push(entry?);
            }
            if !matched_any {
                // Pattern was explicitly a glob but matched nothing -> surface as an error
                bail!("glob pattern matched no files: {pattern}");
            }
        } else {
            out.push(PathBuf::from(pattern));
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_paths_pass_through_and_empty_globs_fail() {
        let paths = resolve_file_path_patterns(["a.json", "dir/b.json"]).unwrap();
        assert_eq!(paths, [PathBuf::from("a.json"), PathBuf::from("dir/b.json")]);
        assert!(resolve_file_path_patterns(["/nonexistent-schemock-dir/*.json"]).is_err());
    }

    #[test]
    fn json_reports_carry_deltas() {
        let reports = [
            Report { label: "a.json".into(), document: Value::from(1), diff: None },
            Report {
                label: "b.json".into(),
                document: Value::from(11),
                diff: Some(Diff::mismatch(&Value::from(11), &Value::from(1))),
            },
        ];
        let text = render_reports(ReportFormat::Json, &reports).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(
            parsed,
            json!([
                {"source": "a.json", "ok": true, "delta": null},
                {"source": "b.json", "ok": false, "delta": [11, 1]},
            ])
        );
    }

    #[test]
    fn cli_parses_verify_flags() {
        let cli = CommandLineInterface::try_parse_from([
            "json-schemock", "verify", "-s", "schema.json", "-i", "a.json", "b/*.json", "--report", "html", "-vv",
        ])
        .unwrap();
        assert_eq!(cli.verbosity(), 2);
        match cli.cmd {
            Command::Verify(v) => {
                assert_eq!(v.report, ReportFormat::Html);
                assert_eq!(v.input_settings.input, ["a.json", "b/*.json"]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn cli_parses_generate_flags() {
        let cli = CommandLineInterface::try_parse_from([
            "json-schemock", "generate", "-s", "schema.json", "--count", "3", "--seed", "9", "--no-mock",
        ])
        .unwrap();
        match cli.cmd {
            Command::Generate(g) => {
                assert_eq!((g.count, g.seed, g.no_mock), (3, Some(9), true));
                assert!(g.out.is_none());
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(
            CommandLineInterface::try_parse_from(["json-schemock", "generate", "-s", "schema.json", "--no-op"]).is_err()
        );
    }
}
