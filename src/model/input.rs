//! Loading ConfigMap records from JSON or YAML files
//!
//! Accepted document shapes:
//! - a sequence of ConfigMaps
//! - a `kind: List` object with an `items` sequence
//! - a single ConfigMap object
//!
//! YAML input may contain several documents separated by `---`; each one is
//! read with the same shape rules and the results are concatenated.

use super::{ConfigMap, API_VERSION, KIND};
use crate::error::{Error, Result};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;
use tracing::warn;

/// Input file syntax
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Json,
    Yaml,
}

impl InputFormat {
    /// Pick the format from a file extension; anything but `.json` is YAML
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => InputFormat::Json,
            _ => InputFormat::Yaml,
        }
    }
}

/// Read and validate records from a file
pub fn load_records(path: &Path) -> Result<Vec<ConfigMap>> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Input(format!("failed to read {}: {e}", path.display()))
    })?;
    parse_records(&content, InputFormat::from_path(path))
}

/// Parse and validate records from file content
pub fn parse_records(content: &str, format: InputFormat) -> Result<Vec<ConfigMap>> {
    let documents = match format {
        InputFormat::Json => vec![serde_json::from_str::<Value>(content)?],
        InputFormat::Yaml => serde_yaml::Deserializer::from_str(content)
            .map(Value::deserialize)
            .collect::<std::result::Result<Vec<_>, _>>()?,
    };

    let mut items = Vec::new();
    for document in documents {
        collect_items(document, &mut items)?;
    }

    let records = items
        .into_iter()
        .enumerate()
        .map(|(index, item)| decode_record(index, item))
        .collect::<Result<Vec<_>>>()?;

    warn_on_duplicate_names(&records);
    Ok(records)
}

fn collect_items(document: Value, items: &mut Vec<Value>) -> Result<()> {
    match document {
        Value::Null => Ok(()),
        Value::Array(values) => {
            items.extend(values);
            Ok(())
        }
        Value::Object(mut object) => {
            if object.get("kind").and_then(Value::as_str) == Some("List") {
                match object.remove("items") {
                    Some(Value::Array(values)) => items.extend(values),
                    Some(Value::Null) | None => {}
                    Some(_) => {
                        return Err(Error::Input("List `items` must be a sequence".into()));
                    }
                }
            } else {
                items.push(Value::Object(object));
            }
            Ok(())
        }
        other => Err(Error::Input(format!(
            "expected a ConfigMap, a list of ConfigMaps or a List object, found {}",
            type_name(&other)
        ))),
    }
}

fn decode_record(index: usize, item: Value) -> Result<ConfigMap> {
    let record: ConfigMap = serde_json::from_value(item)
        .map_err(|e| Error::Input(format!("record {index}: {e}")))?;

    if record.api_version != API_VERSION {
        return Err(Error::Input(format!(
            "record {index} ({}): apiVersion must be {API_VERSION:?}, found {:?}",
            record.name(),
            record.api_version
        )));
    }
    if record.kind != KIND {
        return Err(Error::Input(format!(
            "record {index} ({}): kind must be {KIND:?}, found {:?}",
            record.name(),
            record.kind
        )));
    }
    if record.name().is_empty() {
        return Err(Error::Input(format!("record {index}: metadata.name is empty")));
    }

    Ok(record)
}

fn warn_on_duplicate_names(records: &[ConfigMap]) {
    let mut seen = HashSet::new();
    for record in records {
        if !seen.insert(record.name()) {
            warn!(
                "Duplicate ConfigMap name {:?}; later entries overwrite earlier ones when merged",
                record.name()
            );
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a sequence",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MULTI_DOC: &str = r#"
apiVersion: v1
kind: ConfigMap
metadata:
  name: subnet-az1a
  labels:
    vpc-id: vpc-12345
data:
  subnet-id: subnet-aaa111
---
apiVersion: v1
kind: ConfigMap
metadata:
  name: subnet-az1c
  namespace: network
data:
  subnet-id: subnet-ccc333
"#;

    #[test]
    fn test_parse_multi_document_yaml() {
        let records = parse_records(MULTI_DOC, InputFormat::Yaml).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].label("vpc-id"), Some("vpc-12345"));
        assert_eq!(records[1].namespace(), Some("network"));
    }

    #[test]
    fn test_parse_json_array() {
        let content = r#"[
            {"apiVersion": "v1", "kind": "ConfigMap", "metadata": {"name": "a"}},
            {"apiVersion": "v1", "kind": "ConfigMap", "metadata": {"name": "b"}}
        ]"#;
        let records = parse_records(content, InputFormat::Json).unwrap();
        let names: Vec<_> = records.iter().map(|cm| cm.name()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_parse_list_object() {
        let content = r#"
apiVersion: v1
kind: List
items:
  - apiVersion: v1
    kind: ConfigMap
    metadata:
      name: only
"#;
        let records = parse_records(content, InputFormat::Yaml).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name(), "only");
    }

    #[test]
    fn test_rejects_wrong_kind() {
        let content = r#"[{"apiVersion": "v1", "kind": "Secret", "metadata": {"name": "s"}}]"#;
        let err = parse_records(content, InputFormat::Json).unwrap_err();
        assert!(err.to_string().contains("record 0 (s): kind must be"));
    }

    #[test]
    fn test_rejects_non_string_data() {
        let content = r#"[{"apiVersion": "v1", "kind": "ConfigMap", "metadata": {"name": "n"}, "data": {"port": 80}}]"#;
        let err = parse_records(content, InputFormat::Json).unwrap_err();
        assert!(matches!(err, Error::Input(_)));
    }

    #[test]
    fn test_rejects_scalar_document() {
        let err = parse_records("42", InputFormat::Yaml).unwrap_err();
        assert!(err.to_string().contains("found a number"));
    }

    #[test]
    fn test_missing_file_names_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.yaml");
        let err = load_records(&path).unwrap_err();
        assert!(matches!(err, Error::Input(_)));
        assert!(err.to_string().contains("absent.yaml"));
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(InputFormat::from_path(Path::new("in.JSON")), InputFormat::Json);
        assert_eq!(InputFormat::from_path(Path::new("in.yaml")), InputFormat::Yaml);
        assert_eq!(InputFormat::from_path(Path::new("input")), InputFormat::Yaml);
    }
}
