//! Rendering of run, compare and sample output for stdout

use crate::engine::EngineKind;
use crate::error::Result;
use crate::model::ConfigMap;
use crate::transform::MergeRule;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Yaml,
}

/// Serialize records as a JSON array or YAML sequence
pub fn render_records(records: &[ConfigMap], format: OutputFormat) -> Result<String> {
    Ok(match format {
        OutputFormat::Json => {
            let mut out = serde_json::to_string_pretty(records)?;
            out.push('\n');
            out
        }
        OutputFormat::Yaml | OutputFormat::Text => serde_yaml::to_string(records)?,
    })
}

/// Full report of a run in the requested format
pub fn render_run(
    format: OutputFormat,
    engine: EngineKind,
    input: &[ConfigMap],
    merged: &[ConfigMap],
    rule: &MergeRule,
) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(render_text(engine, input, merged, rule)),
        other => render_records(merged, other),
    }
}

fn render_text(
    engine: EngineKind,
    input: &[ConfigMap],
    merged: &[ConfigMap],
    rule: &MergeRule,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== ConfigMap group-and-merge ({engine} engine) ===");
    let _ = writeln!(out);
    let _ = writeln!(out, "Input ConfigMaps: {}", input.len());
    for (i, cm) in input.iter().enumerate() {
        let _ = writeln!(
            out,
            "  {}. {} ({}: {}, {}: {})",
            i + 1,
            cm.name(),
            rule.group_label,
            cm.label(&rule.group_label).unwrap_or("(none)"),
            rule.merge_key,
            cm.data
                .get(&rule.merge_key)
                .map(String::as_str)
                .unwrap_or("(none)"),
        );
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "Merged ConfigMaps: {}", merged.len());
    for (i, cm) in merged.iter().enumerate() {
        let _ = writeln!(out);
        let _ = writeln!(out, "--- ConfigMap {} ---", i + 1);
        let _ = writeln!(out, "Name: {}", cm.name());
        let _ = writeln!(out, "Namespace: {}", cm.namespace().unwrap_or("(none)"));
        let _ = writeln!(out, "Labels:");
        for (key, value) in &cm.metadata.labels {
            let _ = writeln!(out, "  {key}: {value}");
        }
        let _ = writeln!(out, "Data:");
        for (key, value) in &cm.data {
            let _ = writeln!(out, "  {key}: {value}");
        }
    }
    out
}

/// Result of one engine in a comparison run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Matches,
    Differs,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompareRow {
    pub engine: EngineKind,
    pub groups: Option<usize>,
    pub verdict: Verdict,
}

impl CompareRow {
    pub fn is_ok(&self) -> bool {
        self.verdict == Verdict::Matches
    }
}

/// One line per engine: name, group count, verdict
pub fn render_compare(rows: &[CompareRow]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{:<12} {:>6}  result", "engine", "groups");
    for row in rows {
        let groups = row
            .groups
            .map(|n| n.to_string())
            .unwrap_or_else(|| "-".to_string());
        let verdict = match &row.verdict {
            Verdict::Matches => "matches native".to_string(),
            Verdict::Differs => "DIFFERS from native".to_string(),
            Verdict::Failed(message) => format!("FAILED: {message}"),
        };
        let _ = writeln!(out, "{:<12} {:>6}  {}", row.engine.as_str(), groups, verdict);
    }
    out
}
