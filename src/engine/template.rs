//! Template engine: a tera template renders the merged records
//!
//! The template receives the input records and the merge rule and must emit
//! a whitespace-separated stream of JSON ConfigMap objects. Parse failures are
//! reported with the template line and column.

use super::source::SourceLocation;
use super::{EngineKind, TransformEngine};
use crate::error::{Error, Result};
use crate::model::{ConfigMap, DEFAULT_NAMESPACE};
use crate::transform::MergeRule;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use tera::{Context, Tera};
use tracing::{debug, trace};

const ENGINE: &str = "template";

const BUILTIN_NAME: &str = "group_merge.tera";
const BUILTIN_SOURCE: &str = include_str!("../../assets/templates/group_merge.tera");

/// `--> line:col` as printed by the template parser
static POSITION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"--> (\d+):(\d+)").expect("Invalid regex pattern"));

#[derive(Debug)]
pub struct TemplateEngine {
    tera: Tera,
    name: String,
}

impl TemplateEngine {
    /// The bundled group-and-merge template
    pub fn builtin() -> Result<Self> {
        Self::from_source(BUILTIN_NAME, BUILTIN_SOURCE)
    }

    /// Load a template from disk
    pub fn from_file(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read template {}: {e}", path.display()))
        })?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| BUILTIN_NAME.to_string());
        debug!("Loaded template {} from {}", name, path.display());
        Self::from_source(&name, &source)
    }

    pub fn from_source(name: &str, source: &str) -> Result<Self> {
        let mut tera = Tera::default();
        // Output is JSON; escaping is done by json_encode
        tera.autoescape_on(vec![]);
        tera.add_raw_template(name, source)
            .map_err(|e| template_error(&e, name, source))?;

        Ok(Self {
            tera,
            name: name.to_string(),
        })
    }

    fn context(records: &[ConfigMap], rule: &MergeRule) -> Context {
        let mut context = Context::new();
        context.insert("records", records);
        context.insert("group_label", &rule.group_label);
        context.insert("merge_key", &rule.merge_key);
        context.insert(
            "group_attribute",
            &format!("metadata.labels.{}", rule.group_label),
        );
        context.insert("member_attribute", &format!("data.{}", rule.merge_key));
        context.insert("default_namespace", DEFAULT_NAMESPACE);
        context
    }

    fn render(&self, records: &[ConfigMap], rule: &MergeRule) -> Result<String> {
        let context = Self::context(records, rule);
        self.tera
            .render(&self.name, &context)
            .map_err(|e| Error::engine(ENGINE, describe(&e)))
    }
}

impl TransformEngine for TemplateEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Template
    }

    fn run(&self, records: &[ConfigMap], rule: &MergeRule) -> Result<Vec<ConfigMap>> {
        if rule.group_label.contains('.') || rule.merge_key.contains('.') {
            return Err(Error::engine(
                ENGINE,
                format!(
                    "label and key names containing '.' are not supported ({} / {})",
                    rule.group_label, rule.merge_key
                ),
            ));
        }

        let rendered = self.render(records, rule)?;
        trace!("Rendered {}:\n{}", self.name, rendered);

        serde_json::Deserializer::from_str(&rendered)
            .into_iter::<ConfigMap>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| {
                Error::engine(
                    ENGINE,
                    format!("{} did not render a ConfigMap stream: {e}", self.name),
                )
            })
    }
}

/// Flatten the error chain into one line
fn describe(err: &tera::Error) -> String {
    let mut parts = vec![err.to_string()];
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        let text = cause.to_string();
        // Parser errors carry a multi-line excerpt; keep the `= expected ...` line
        let summary = text
            .lines()
            .rev()
            .find_map(|line| line.trim().strip_prefix("= "))
            .unwrap_or_else(|| text.lines().next().unwrap_or_default())
            .to_string();
        parts.push(summary);
        source = cause.source();
    }
    parts.join(": ")
}

fn template_error(err: &tera::Error, name: &str, source: &str) -> Error {
    let message = describe(err);

    let mut cause: Option<&dyn std::error::Error> = Some(err);
    while let Some(current) = cause {
        if let Some(captures) = POSITION.captures(&current.to_string()) {
            let line = captures[1].parse().unwrap_or(0);
            let column = captures[2].parse().ok();
            return Error::engine_at(ENGINE, message, SourceLocation::new(name, source, line, column));
        }
        cause = current.source();
    }
    Error::engine(ENGINE, message)
}
