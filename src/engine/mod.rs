//! Interchangeable execution engines for the group-and-merge transform
//!
//! Each engine hosts the same logic in a different vehicle:
//!
//! - `native` - the pure Rust transform
//! - `expression` - declarative selection rules in the expression language
//! - `template` - a tera template rendering the merged records as JSON
//! - `script` - a JavaScript or TypeScript program in a sandboxed QuickJS runtime
//!
//! All of them take the same records and rule and must return the same
//! merged records; [`run_ordered`] applies the shared group ordering.

pub mod native;
pub mod rules;
pub mod script;
pub mod source;
pub mod template;
pub mod typescript;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::ConfigMap;
use crate::transform::{GroupOrder, MergeRule};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

pub use native::NativeEngine;
pub use rules::{RuleEngine, RuleSet};
pub use script::{ScriptEngine, ScriptLimits};
pub use source::SourceLocation;
pub use template::TemplateEngine;

/// Available engines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    #[default]
    Native,
    Expression,
    Template,
    Script,
}

impl EngineKind {
    pub const ALL: [EngineKind; 4] = [
        EngineKind::Native,
        EngineKind::Expression,
        EngineKind::Template,
        EngineKind::Script,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EngineKind::Native => "native",
            EngineKind::Expression => "expression",
            EngineKind::Template => "template",
            EngineKind::Script => "script",
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EngineKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        EngineKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                format!("unknown engine '{s}' (expected native, expression, template or script)")
            })
    }
}

/// An execution vehicle for the group-and-merge transform
pub trait TransformEngine {
    fn kind(&self) -> EngineKind;

    /// Group and merge `records`; group order is engine-defined
    fn run(&self, records: &[ConfigMap], rule: &MergeRule) -> Result<Vec<ConfigMap>>;
}

/// Construct an engine from configuration
pub fn build_engine(kind: EngineKind, config: &Config) -> Result<Box<dyn TransformEngine>> {
    debug!("Building {} engine", kind);
    let engine: Box<dyn TransformEngine> = match kind {
        EngineKind::Native => Box::new(NativeEngine::new()),
        EngineKind::Expression => {
            let rules = RuleSet::from_config(&config.expression, &config.rule);
            Box::new(RuleEngine::compile(&rules)?)
        }
        EngineKind::Template => match &config.template.path {
            Some(path) => Box::new(TemplateEngine::from_file(path)?),
            None => Box::new(TemplateEngine::builtin()?),
        },
        EngineKind::Script => {
            let limits = ScriptLimits::from(&config.script);
            match &config.script.path {
                Some(path) => Box::new(ScriptEngine::from_file(path, limits)?),
                None => Box::new(ScriptEngine::builtin(limits)),
            }
        }
    };
    Ok(engine)
}

/// Warn about every record that will not join a group; returns how many
pub fn warn_unlabeled(records: &[ConfigMap], rule: &MergeRule) -> usize {
    let unlabeled = rule.unlabeled(records);
    for name in &unlabeled {
        warn!("ConfigMap {} has no {} label; skipping", name, rule.group_label);
    }
    unlabeled.len()
}

/// Run an engine and sort its groups by `order`
pub fn run_ordered(
    engine: &dyn TransformEngine,
    records: &[ConfigMap],
    rule: &MergeRule,
    order: GroupOrder,
) -> Result<Vec<ConfigMap>> {
    let mut merged = engine.run(records, rule)?;
    check_shape(engine.kind(), &merged)?;
    order.apply(&mut merged, records, rule);
    debug!(
        "{} engine produced {} merged ConfigMap(s)",
        engine.kind(),
        merged.len()
    );
    Ok(merged)
}

/// Basic sanity on engine output: fixed header fields and unique group names
fn check_shape(kind: EngineKind, merged: &[ConfigMap]) -> Result<()> {
    let mut seen = std::collections::HashSet::new();
    for cm in merged {
        if cm.api_version != crate::model::API_VERSION || cm.kind != crate::model::KIND {
            return Err(Error::engine(
                kind.as_str(),
                format!(
                    "produced {}/{} for {}, expected v1/ConfigMap",
                    cm.api_version,
                    cm.kind,
                    cm.name()
                ),
            ));
        }
        if !seen.insert(cm.name()) {
            return Err(Error::engine(
                kind.as_str(),
                format!("produced group {} more than once", cm.name()),
            ));
        }
    }
    Ok(())
}
