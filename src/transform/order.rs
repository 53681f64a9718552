//! Output ordering of merged groups
//!
//! Engines hand back groups in whatever order their runtime iterates maps.
//! The host re-sorts every engine's output with one policy so that all
//! engines print the same thing for the same input.

use super::MergeRule;
use crate::model::ConfigMap;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum GroupOrder {
    /// Order of the first input record carrying each group key
    #[default]
    FirstSeen,
    /// Lexicographic by group key
    ByKey,
}

impl GroupOrder {
    /// Sort merged records in place
    pub fn apply(self, merged: &mut [ConfigMap], input: &[ConfigMap], rule: &MergeRule) {
        match self {
            GroupOrder::FirstSeen => {
                let mut first_seen: HashMap<&str, usize> = HashMap::new();
                for (position, record) in input.iter().enumerate() {
                    if let Some(key) = rule.group_key(record) {
                        first_seen.entry(key).or_insert(position);
                    }
                }
                merged.sort_by_key(|cm| {
                    first_seen
                        .get(cm.name())
                        .copied()
                        .unwrap_or(usize::MAX)
                });
            }
            GroupOrder::ByKey => merged.sort_by(|a, b| a.name().cmp(b.name())),
        }
    }
}

impl std::str::FromStr for GroupOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "first-seen" | "first_seen" => Ok(GroupOrder::FirstSeen),
            "by-key" | "by_key" | "key" => Ok(GroupOrder::ByKey),
            other => Err(format!(
                "unknown group order '{other}' (expected first-seen or by-key)"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::transform;

    fn labeled(name: &str, vpc: &str) -> ConfigMap {
        ConfigMap::new(name)
            .with_label("vpc-id", vpc)
            .with_data("subnet-id", format!("id-{name}"))
    }

    fn names(records: &[ConfigMap]) -> Vec<&str> {
        records.iter().map(ConfigMap::name).collect()
    }

    #[test]
    fn test_first_seen_restores_input_order() {
        let input = vec![labeled("a", "vpc-b"), labeled("b", "vpc-a"), labeled("c", "vpc-b")];
        let mut merged = transform(&input);
        merged.reverse();

        GroupOrder::FirstSeen.apply(&mut merged, &input, &MergeRule::default());

        assert_eq!(names(&merged), vec!["vpc-b", "vpc-a"]);
    }

    #[test]
    fn test_by_key_sorts_lexicographically() {
        let input = vec![labeled("a", "vpc-b"), labeled("b", "vpc-a")];
        let mut merged = transform(&input);

        GroupOrder::ByKey.apply(&mut merged, &input, &MergeRule::default());

        assert_eq!(names(&merged), vec!["vpc-a", "vpc-b"]);
    }

    #[test]
    fn test_first_seen_is_identity_on_native_output() {
        let input = vec![labeled("a", "vpc-z"), labeled("b", "vpc-y"), labeled("c", "vpc-x")];
        let expected = transform(&input);
        let mut merged = expected.clone();

        GroupOrder::FirstSeen.apply(&mut merged, &input, &MergeRule::default());

        assert_eq!(merged, expected);
    }

    #[test]
    fn test_parse_group_order() {
        assert_eq!("first-seen".parse::<GroupOrder>().unwrap(), GroupOrder::FirstSeen);
        assert_eq!("BY_KEY".parse::<GroupOrder>().unwrap(), GroupOrder::ByKey);
        assert!("random".parse::<GroupOrder>().is_err());
    }
}
