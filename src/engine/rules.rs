//! Declarative engine: the transform expressed as selection rules
//!
//! Each rule is an expression evaluated against a record's JSON form:
//!
//! | rule           | default                        | must yield                    |
//! |----------------|--------------------------------|-------------------------------|
//! | `group_key`    | `metadata.labels['vpc-id']`    | non-empty string, else skip   |
//! | `member_name`  | `metadata.name`                | string                        |
//! | `member_value` | `data['subnet-id']`            | string, else no contribution  |
//! | `namespace`    | `metadata.namespace`           | non-empty string to override  |
//!
//! Merged entry keys are `<member_name>.<merge_key>`.

use super::{EngineKind, TransformEngine};
use crate::config::ExpressionConfig;
use crate::error::{Error, Result};
use crate::expression::{CompiledExpression, ExpressionEngine};
use crate::model::{ConfigMap, DEFAULT_NAMESPACE};
use crate::transform::MergeRule;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

const ENGINE: &str = "expression";

/// Rule expressions in source form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSet {
    pub group_key: String,
    pub member_name: String,
    pub member_value: String,
    pub namespace: String,
}

impl RuleSet {
    /// Rules equivalent to the native transform for `rule`
    pub fn for_rule(rule: &MergeRule) -> Self {
        Self {
            group_key: format!("metadata.labels['{}']", escape(&rule.group_label)),
            member_name: "metadata.name".to_string(),
            member_value: format!("data['{}']", escape(&rule.merge_key)),
            namespace: "metadata.namespace".to_string(),
        }
    }

    /// Defaults for `rule`, overridden by whatever the configuration sets
    pub fn from_config(config: &ExpressionConfig, rule: &MergeRule) -> Self {
        let defaults = Self::for_rule(rule);
        Self {
            group_key: config.group_key.clone().unwrap_or(defaults.group_key),
            member_name: config.member_name.clone().unwrap_or(defaults.member_name),
            member_value: config.member_value.clone().unwrap_or(defaults.member_value),
            namespace: config.namespace.clone().unwrap_or(defaults.namespace),
        }
    }
}

fn escape(key: &str) -> String {
    key.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Compiled rule set
#[derive(Debug, Clone)]
pub struct RuleEngine {
    group_key: CompiledExpression,
    member_name: CompiledExpression,
    member_value: CompiledExpression,
    namespace: CompiledExpression,
}

struct Group {
    key: String,
    members: Vec<Value>,
}

impl RuleEngine {
    /// Compile every rule; the first invalid one fails the engine
    pub fn compile(rules: &RuleSet) -> Result<Self> {
        let engine = ExpressionEngine::new();
        let compile = |name: &str, source: &str| {
            engine
                .compile(source)
                .map_err(|e| Error::engine(ENGINE, format!("rule `{name}`: {e:#}")))
        };

        Ok(Self {
            group_key: compile("group_key", &rules.group_key)?,
            member_name: compile("member_name", &rules.member_name)?,
            member_value: compile("member_value", &rules.member_value)?,
            namespace: compile("namespace", &rules.namespace)?,
        })
    }

    fn evaluate(expr: &CompiledExpression, item: &Value) -> Result<Value> {
        expr.evaluate(item)
            .map_err(|e| Error::engine(ENGINE, format!("{e:#}")))
    }

    fn partition(&self, records: &[ConfigMap]) -> Result<Vec<Group>> {
        let mut groups: Vec<Group> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        for record in records {
            let item = serde_json::to_value(record)?;
            let key = match Self::evaluate(&self.group_key, &item)? {
                Value::String(key) if !key.is_empty() => key,
                other => {
                    debug!(
                        "{} yields {} for {}; skipping",
                        self.group_key.source(),
                        other,
                        record.name()
                    );
                    continue;
                }
            };

            match index.get(&key) {
                Some(&slot) => groups[slot].members.push(item),
                None => {
                    index.insert(key.clone(), groups.len());
                    groups.push(Group {
                        key,
                        members: vec![item],
                    });
                }
            }
        }

        Ok(groups)
    }

    fn merge(&self, group: &Group, rule: &MergeRule) -> Result<ConfigMap> {
        let mut namespace = DEFAULT_NAMESPACE.to_string();
        let mut data = BTreeMap::new();

        for member in &group.members {
            if let Value::String(ns) = Self::evaluate(&self.namespace, member)? {
                if !ns.is_empty() {
                    namespace = ns;
                }
            }

            let name = match Self::evaluate(&self.member_name, member)? {
                Value::String(name) => name,
                other => {
                    return Err(Error::engine(
                        ENGINE,
                        format!(
                            "rule `member_name` ({}) must yield a string, got {}",
                            self.member_name.source(),
                            other
                        ),
                    ))
                }
            };

            if let Value::String(value) = Self::evaluate(&self.member_value, member)? {
                let entry = rule.entry_key(&name);
                debug!("  added {} = {}", entry, value);
                data.insert(entry, value);
            }
        }

        Ok(rule.merged_record(&group.key, &namespace, data))
    }
}

impl TransformEngine for RuleEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Expression
    }

    fn run(&self, records: &[ConfigMap], rule: &MergeRule) -> Result<Vec<ConfigMap>> {
        let groups = self.partition(records)?;
        groups
            .iter()
            .map(|group| {
                info!(
                    "{} {}: {} ConfigMap(s)",
                    rule.group_label,
                    group.key,
                    group.members.len()
                );
                self.merge(group, rule)
            })
            .collect()
    }
}
