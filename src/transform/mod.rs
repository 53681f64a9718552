//! Group-and-merge transform
//!
//! Partitions ConfigMaps by a label value and folds each partition into one
//! synthetic ConfigMap whose data holds a single key taken from every member.
//! Every engine must agree with [`group_and_merge`] for the same input.

pub mod order;

use crate::model::{ConfigMap, DEFAULT_NAMESPACE};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

pub use order::GroupOrder;

/// Label set on every merged record
pub const MERGED_LABEL: &str = "merged";

/// Which label groups records and which data key gets merged
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeRule {
    pub group_label: String,
    pub merge_key: String,
}

impl Default for MergeRule {
    fn default() -> Self {
        Self {
            group_label: "vpc-id".to_string(),
            merge_key: "subnet-id".to_string(),
        }
    }
}

impl MergeRule {
    /// Key of a merged data entry contributed by `member`
    pub fn entry_key(&self, member: &str) -> String {
        format!("{member}.{}", self.merge_key)
    }

    /// Group key of a record, `None` when the label is missing or empty
    pub fn group_key<'a>(&self, record: &'a ConfigMap) -> Option<&'a str> {
        record.label(&self.group_label)
    }

    /// Names of records that will not join any group
    pub fn unlabeled<'a>(&self, records: &'a [ConfigMap]) -> Vec<&'a str> {
        records
            .iter()
            .filter(|record| self.group_key(record).is_none())
            .map(ConfigMap::name)
            .collect()
    }

    /// Build the merged record for one group
    pub fn merged_record(
        &self,
        key: &str,
        namespace: &str,
        data: BTreeMap<String, String>,
    ) -> ConfigMap {
        let mut merged = ConfigMap::new(key)
            .with_namespace(namespace)
            .with_label(self.group_label.as_str(), key)
            .with_label(MERGED_LABEL, "true");
        merged.data = data;
        merged
    }
}

/// Result of a transform run
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MergeOutcome {
    /// One record per group, in first-seen group order
    pub merged: Vec<ConfigMap>,
    /// Names of input records without a group label
    pub skipped: Vec<String>,
}

/// Records of one group, in input order
struct Group<'a> {
    key: &'a str,
    members: Vec<&'a ConfigMap>,
}

/// Group `records` by the rule's label and merge each group
pub fn group_and_merge(records: &[ConfigMap], rule: &MergeRule) -> MergeOutcome {
    let mut outcome = MergeOutcome::default();
    let mut groups: Vec<Group> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for record in records {
        let Some(key) = rule.group_key(record) else {
            outcome.skipped.push(record.name().to_string());
            continue;
        };
        let slot = *index.entry(key).or_insert_with(|| {
            groups.push(Group {
                key,
                members: Vec::new(),
            });
            groups.len() - 1
        });
        groups[slot].members.push(record);
    }

    outcome.merged = groups.iter().map(|group| merge_group(group, rule)).collect();
    outcome
}

/// Convenience wrapper returning only the merged records, using the default rule
pub fn transform(records: &[ConfigMap]) -> Vec<ConfigMap> {
    group_and_merge(records, &MergeRule::default()).merged
}

fn merge_group(group: &Group, rule: &MergeRule) -> ConfigMap {
    let namespace = group
        .members
        .iter()
        .filter_map(|member| member.namespace())
        .last()
        .unwrap_or(DEFAULT_NAMESPACE);

    let data = group
        .members
        .iter()
        .filter_map(|member| {
            member
                .data
                .get(&rule.merge_key)
                .map(|value| (rule.entry_key(member.name()), value.clone()))
        })
        .collect();

    rule.merged_record(group.key, namespace, data)
}
