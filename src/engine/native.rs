//! Direct call into the Rust transform

use super::{EngineKind, TransformEngine};
use crate::error::Result;
use crate::model::ConfigMap;
use crate::transform::{group_and_merge, MergeRule};
use tracing::{debug, info};

#[derive(Debug, Clone, Default)]
pub struct NativeEngine;

impl NativeEngine {
    pub fn new() -> Self {
        Self
    }
}

impl TransformEngine for NativeEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Native
    }

    fn run(&self, records: &[ConfigMap], rule: &MergeRule) -> Result<Vec<ConfigMap>> {
        let outcome = group_and_merge(records, rule);

        for merged in &outcome.merged {
            info!(
                "{} {}: {} entr{}",
                rule.group_label,
                merged.name(),
                merged.data.len(),
                if merged.data.len() == 1 { "y" } else { "ies" }
            );
            for (key, value) in &merged.data {
                debug!("  added {} = {}", key, value);
            }
        }
        if !outcome.skipped.is_empty() {
            debug!("Skipped {} unlabeled ConfigMap(s)", outcome.skipped.len());
        }

        Ok(outcome.merged)
    }
}
