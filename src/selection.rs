//! Pre-selection of input records with a filter expression

use crate::error::{Error, Result};
use crate::expression::{CompiledFilter, ExpressionEngine};
use crate::model::ConfigMap;
use tracing::{debug, info};

/// Optional filter run before any engine; without one every record passes
#[derive(Debug, Clone, Default)]
pub struct Selection {
    filter: Option<CompiledFilter>,
}

impl Selection {
    pub fn new(filter: Option<&str>) -> Result<Self> {
        let filter = match filter.map(str::trim).filter(|f| !f.is_empty()) {
            Some(source) => Some(
                ExpressionEngine::new()
                    .compile_filter(source)
                    .map_err(|e| Error::Expression(format!("selection filter: {e:#}")))?,
            ),
            None => None,
        };
        Ok(Self { filter })
    }

    /// Keep the records matching the filter, preserving input order
    pub fn apply(&self, records: Vec<ConfigMap>) -> Result<Vec<ConfigMap>> {
        let Some(filter) = &self.filter else {
            return Ok(records);
        };

        let total = records.len();
        let mut selected = Vec::with_capacity(total);
        for record in records {
            let item = serde_json::to_value(&record)?;
            if filter.matches(&item)? {
                selected.push(record);
            } else {
                debug!("Filter `{}` dropped {}", filter.source(), record.name());
            }
        }

        info!(
            "Selected {} of {} ConfigMap(s) with `{}`",
            selected.len(),
            total,
            filter.source()
        );
        Ok(selected)
    }
}
