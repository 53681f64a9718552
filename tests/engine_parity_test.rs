//! Every engine must agree with the native transform

use configmerge::config::Config;
use configmerge::engine::{build_engine, run_ordered, EngineKind};
use configmerge::model::sample_config_maps;
use configmerge::transform::{transform, GroupOrder};
use configmerge::{ConfigMap, MergeRule};

fn subnet(name: &str, vpc: Option<&str>, subnet_id: Option<&str>) -> ConfigMap {
    let mut cm = ConfigMap::new(name);
    if let Some(vpc) = vpc {
        cm = cm.with_label("vpc-id", vpc);
    }
    if let Some(subnet_id) = subnet_id {
        cm = cm.with_data("subnet-id", subnet_id);
    }
    cm
}

fn assert_parity(records: &[ConfigMap]) {
    let config = Config::default();
    let expected = transform(records);
    for kind in EngineKind::ALL {
        let engine = build_engine(kind, &config).unwrap();
        let merged =
            run_ordered(engine.as_ref(), records, &MergeRule::default(), GroupOrder::FirstSeen)
                .unwrap();
        assert_eq!(merged, expected, "{kind} engine disagrees with native");
    }
}

#[test]
fn test_two_subnets_in_one_vpc() {
    let records = vec![
        subnet("subnet-az1a", Some("vpc-12345"), Some("subnet-aaa111")),
        subnet("subnet-az1c", Some("vpc-12345"), Some("subnet-ccc333")),
    ];
    assert_parity(&records);

    let merged = transform(&records);
    assert_eq!(merged.len(), 1);
    assert_eq!(merged[0].data["subnet-az1a.subnet-id"], "subnet-aaa111");
    assert_eq!(merged[0].data["subnet-az1c.subnet-id"], "subnet-ccc333");
}

#[test]
fn test_unlabeled_record_is_skipped() {
    let records = vec![
        subnet("a", Some("vpc-1"), Some("s-a")),
        subnet("loose", None, Some("s-loose")),
        subnet("b", Some("vpc-1"), Some("s-b")),
    ];
    assert_parity(&records);
    assert_eq!(transform(&records)[0].data.len(), 2);
}

#[test]
fn test_sample_set() {
    assert_parity(&sample_config_maps());
}

#[test]
fn test_namespaces_and_gaps() {
    let records = vec![
        subnet("a", Some("vpc-1"), Some("s-a")).with_namespace("first"),
        subnet("b", Some("vpc-2"), None).with_namespace("other"),
        subnet("c", Some("vpc-1"), Some("s-c")).with_namespace("second"),
        subnet("d", Some("vpc-1"), Some("s-d")),
        subnet("e", Some(""), Some("s-e")),
        subnet("f", Some("vpc-3"), Some("s-f")).with_namespace(""),
    ];
    assert_parity(&records);

    let merged = transform(&records);
    let namespaces: Vec<_> = merged.iter().map(|cm| cm.namespace().unwrap()).collect();
    assert_eq!(namespaces, vec!["second", "other", "default"]);
}

#[test]
fn test_duplicate_names_last_write_wins() {
    let records = vec![
        subnet("shared", Some("vpc-1"), Some("s-first")),
        subnet("other", Some("vpc-1"), Some("s-other")),
        subnet("shared", Some("vpc-1"), Some("s-last")),
        subnet("shared", Some("vpc-2"), Some("s-elsewhere")),
    ];
    assert_parity(&records);

    let merged = transform(&records);
    assert_eq!(merged.len(), 2);
    assert_eq!(merged[0].data.len(), 2);
    assert_eq!(merged[0].data["shared.subnet-id"], "s-last");
    assert_eq!(merged[1].data["shared.subnet-id"], "s-elsewhere");
}

#[test]
fn test_group_order_by_key_across_engines() {
    let records = vec![
        subnet("z", Some("vpc-b"), Some("s-z")),
        subnet("y", Some("vpc-a"), Some("s-y")),
    ];
    let config = Config::default();
    for kind in EngineKind::ALL {
        let engine = build_engine(kind, &config).unwrap();
        let merged =
            run_ordered(engine.as_ref(), &records, &MergeRule::default(), GroupOrder::ByKey)
                .unwrap();
        let names: Vec<&str> = merged.iter().map(ConfigMap::name).collect();
        assert_eq!(names, vec!["vpc-a", "vpc-b"], "{kind}");
    }
}

#[test]
fn test_empty_input() {
    assert_parity(&[]);
}
