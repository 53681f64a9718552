//! Command implementations behind the CLI
//!
//! Each command returns the text destined for stdout; the binary only prints
//! it and maps errors to an exit status.

use crate::config::Config;
use crate::engine::{build_engine, run_ordered, warn_unlabeled, EngineKind, NativeEngine};
use crate::error::Result;
use crate::model::{load_records, sample_config_maps, ConfigMap};
use crate::report::{render_compare, render_records, render_run, CompareRow, OutputFormat, Verdict};
use crate::selection::Selection;
use std::path::Path;
use tracing::{debug, info, warn};

/// Records from `input`, or the built-in sample set
pub fn load_input(input: Option<&Path>) -> Result<Vec<ConfigMap>> {
    match input {
        Some(path) => {
            let records = load_records(path)?;
            info!("Loaded {} ConfigMap(s) from {}", records.len(), path.display());
            Ok(records)
        }
        None => {
            debug!("No input given; using the sample ConfigMaps");
            Ok(sample_config_maps())
        }
    }
}

/// Loaded and filtered records; skipped records are reported here, once per command
fn selected_input(config: &Config, input: Option<&Path>) -> Result<Vec<ConfigMap>> {
    let selection = Selection::new(config.selection.filter.as_deref())?;
    let records = selection.apply(load_input(input)?)?;
    warn_unlabeled(&records, &config.rule);
    Ok(records)
}

/// Run the configured engine and render its report
pub fn run(config: &Config, input: Option<&Path>, format: OutputFormat) -> Result<String> {
    let records = selected_input(config, input)?;
    let engine = build_engine(config.engine, config)?;
    let merged = run_ordered(engine.as_ref(), &records, &config.rule, config.group_order)?;
    render_run(format, config.engine, &records, &merged, &config.rule)
}

/// Outcome of running every engine against the native result
#[derive(Debug, Clone)]
pub struct Comparison {
    pub rows: Vec<CompareRow>,
}

impl Comparison {
    pub fn all_match(&self) -> bool {
        self.rows.iter().all(CompareRow::is_ok)
    }

    pub fn render(&self) -> String {
        render_compare(&self.rows)
    }
}

/// Run every engine on the same input and check it against `native`
pub fn compare(config: &Config, input: Option<&Path>) -> Result<Comparison> {
    let records = selected_input(config, input)?;
    let reference = run_ordered(&NativeEngine::new(), &records, &config.rule, config.group_order)?;

    let rows = EngineKind::ALL
        .into_iter()
        .map(|kind| {
            let outcome = build_engine(kind, config).and_then(|engine| {
                run_ordered(engine.as_ref(), &records, &config.rule, config.group_order)
            });
            match outcome {
                Ok(merged) => {
                    let verdict = if merged == reference {
                        Verdict::Matches
                    } else {
                        warn!("{} engine output differs from native", kind);
                        Verdict::Differs
                    };
                    CompareRow {
                        engine: kind,
                        groups: Some(merged.len()),
                        verdict,
                    }
                }
                Err(err) => {
                    warn!("{} engine failed: {}", kind, err);
                    CompareRow {
                        engine: kind,
                        groups: None,
                        verdict: Verdict::Failed(err.to_string()),
                    }
                }
            }
        })
        .collect();

    Ok(Comparison { rows })
}

/// The sample set, serialized
pub fn sample(format: OutputFormat) -> Result<String> {
    render_records(&sample_config_maps(), format)
}
