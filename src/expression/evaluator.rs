//! Expression evaluator over JSON values

use super::ast::Expression;
use super::validator::Patterns;
use anyhow::{anyhow, Result};
use regex::Regex;
use serde_json::Value;
use std::cmp::Ordering;

/// Expression evaluator
#[derive(Debug, Clone, Default)]
pub struct ExpressionEvaluator {
    patterns: Patterns,
}

impl ExpressionEvaluator {
    /// Evaluator reusing precompiled literal patterns
    pub fn with_patterns(patterns: Patterns) -> Self {
        Self { patterns }
    }

    /// Evaluate an expression and interpret the result as a boolean
    pub fn evaluate_bool(&self, expr: &Expression, item: &Value) -> Result<bool> {
        Ok(Self::is_truthy(&self.evaluate(expr, item)?))
    }

    /// Evaluate an expression
    pub fn evaluate(&self, expr: &Expression, item: &Value) -> Result<Value> {
        match expr {
            Expression::Number(n) => Ok(Self::to_number_value(*n)),
            Expression::String(s) => Ok(Value::String(s.clone())),
            Expression::Boolean(b) => Ok(Value::Bool(*b)),
            Expression::Null => Ok(Value::Null),

            Expression::Field(path) => Ok(Self::get_field_value(item, path).unwrap_or(Value::Null)),

            Expression::Equal(left, right) => {
                self.evaluate_binary_comparison(left, right, item, Self::values_equal)
            }
            Expression::NotEqual(left, right) => {
                self.evaluate_binary_comparison(left, right, item, |l, r| !Self::values_equal(l, r))
            }
            Expression::GreaterThan(left, right) => {
                self.evaluate_ordering(left, right, item, |ord| ord == Ordering::Greater)
            }
            Expression::LessThan(left, right) => {
                self.evaluate_ordering(left, right, item, |ord| ord == Ordering::Less)
            }
            Expression::GreaterEqual(left, right) => {
                self.evaluate_ordering(left, right, item, |ord| ord != Ordering::Less)
            }
            Expression::LessEqual(left, right) => {
                self.evaluate_ordering(left, right, item, |ord| ord != Ordering::Greater)
            }

            Expression::And(left, right) => {
                if !self.evaluate_bool(left, item)? {
                    return Ok(Value::Bool(false)); // Short-circuit
                }
                Ok(Value::Bool(self.evaluate_bool(right, item)?))
            }
            Expression::Or(left, right) => {
                if self.evaluate_bool(left, item)? {
                    return Ok(Value::Bool(true)); // Short-circuit
                }
                Ok(Value::Bool(self.evaluate_bool(right, item)?))
            }
            Expression::Not(inner) => Ok(Value::Bool(!self.evaluate_bool(inner, item)?)),

            Expression::Contains(str_expr, pattern) => {
                self.evaluate_string_operation(str_expr, pattern, item, |s, p| Ok(s.contains(p)))
            }
            Expression::StartsWith(str_expr, prefix) => {
                self.evaluate_string_operation(str_expr, prefix, item, |s, p| Ok(s.starts_with(p)))
            }
            Expression::EndsWith(str_expr, suffix) => {
                self.evaluate_string_operation(str_expr, suffix, item, |s, p| Ok(s.ends_with(p)))
            }
            Expression::Matches(str_expr, pattern) => {
                self.evaluate_string_operation(str_expr, pattern, item, |s, p| {
                    if let Some(re) = self.patterns.get(p) {
                        return Ok(re.is_match(s));
                    }
                    // Pattern computed from the record
                    let re = Regex::new(p).map_err(|e| anyhow!("Invalid regex '{}': {}", p, e))?;
                    Ok(re.is_match(s))
                })
            }

            Expression::In(expr, values) => {
                let v = self.evaluate(expr, item)?;
                Ok(Value::Bool(
                    values.iter().any(|candidate| Self::values_equal(&v, candidate)),
                ))
            }
            Expression::Length(expr) => {
                let v = self.evaluate(expr, item)?;
                Ok(Value::Number(serde_json::Number::from(
                    Self::compute_length(&v) as u64,
                )))
            }
        }
    }

    /// `false` and `null` are falsy, everything else is truthy
    fn is_truthy(value: &Value) -> bool {
        match value {
            Value::Bool(b) => *b,
            Value::Null => false,
            _ => true,
        }
    }

    /// Pure function: Convert f64 to JSON Number Value
    fn to_number_value(n: f64) -> Value {
        Value::Number(
            serde_json::Number::from_f64(n).unwrap_or_else(|| serde_json::Number::from(0)),
        )
    }

    /// Pure function: Compute length of a value
    fn compute_length(v: &Value) -> usize {
        match v {
            Value::String(s) => s.chars().count(),
            Value::Array(arr) => arr.len(),
            Value::Object(obj) => obj.len(),
            _ => 0,
        }
    }

    /// Walk a field path; numeric segments index into arrays
    fn get_field_value(item: &Value, path: &[String]) -> Option<Value> {
        let mut current = item;
        for segment in path {
            current = match current {
                Value::Object(obj) => obj.get(segment)?,
                Value::Array(arr) => arr.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current.clone())
    }

    /// Equality with numbers compared by value, so `5 == 5.0`
    fn values_equal(a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
            _ => a == b,
        }
    }

    /// Ordering of two values of the same scalar type
    fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
        match (a, b) {
            (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Helper: Evaluate a binary comparison operation
    fn evaluate_binary_comparison<F>(
        &self,
        left: &Expression,
        right: &Expression,
        item: &Value,
        comparator: F,
    ) -> Result<Value>
    where
        F: FnOnce(&Value, &Value) -> bool,
    {
        let left_val = self.evaluate(left, item)?;
        let right_val = self.evaluate(right, item)?;
        Ok(Value::Bool(comparator(&left_val, &right_val)))
    }

    /// Helper: Evaluate an ordering comparison; mismatched types compare false
    fn evaluate_ordering<F>(
        &self,
        left: &Expression,
        right: &Expression,
        item: &Value,
        accept: F,
    ) -> Result<Value>
    where
        F: FnOnce(Ordering) -> bool,
    {
        self.evaluate_binary_comparison(left, right, item, |l, r| {
            Self::compare_values(l, r).is_some_and(accept)
        })
    }

    /// Helper: Evaluate a string operation; non-string operands yield false
    fn evaluate_string_operation<F>(
        &self,
        str_expr: &Expression,
        pattern_expr: &Expression,
        item: &Value,
        operation: F,
    ) -> Result<Value>
    where
        F: FnOnce(&str, &str) -> Result<bool>,
    {
        let str_val = self.evaluate(str_expr, item)?;
        let pattern_val = self.evaluate(pattern_expr, item)?;

        let result = match (str_val, pattern_val) {
            (Value::String(s), Value::String(p)) => operation(&s, &p)?,
            _ => false,
        };

        Ok(Value::Bool(result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::ExpressionParser;
    use serde_json::json;

    fn eval(expr: &str, item: &Value) -> Value {
        let ast = ExpressionParser::new().parse(expr).unwrap();
        ExpressionEvaluator::default().evaluate(&ast, item).unwrap()
    }

    fn config_map() -> Value {
        json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": {
                "name": "subnet-az1a",
                "namespace": "default",
                "labels": {"vpc-id": "vpc-12345", "app.kubernetes.io/name": "net"}
            },
            "data": {"subnet-id": "subnet-aaa111", "cidr-block": "10.0.1.0/24"},
            "ports": [80, 443]
        })
    }

    #[test]
    fn test_field_access() {
        let cm = config_map();
        assert_eq!(eval("metadata.labels.vpc-id", &cm), json!("vpc-12345"));
        assert_eq!(eval("data['subnet-id']", &cm), json!("subnet-aaa111"));
        assert_eq!(eval("metadata.labels['app.kubernetes.io/name']", &cm), json!("net"));
        assert_eq!(eval("ports[1]", &cm), json!(443));
    }

    #[test]
    fn test_missing_field_is_null() {
        let cm = config_map();
        assert_eq!(eval("metadata.labels.zone", &cm), Value::Null);
        assert_eq!(eval("ports[9]", &cm), Value::Null);
        assert_eq!(eval("kind.nested", &cm), Value::Null);
    }

    #[test]
    fn test_number_equality_ignores_representation() {
        let cm = config_map();
        assert_eq!(eval("ports[0] == 80", &cm), json!(true));
        assert_eq!(eval("ports[0] in [80, 8080]", &cm), json!(true));
    }

    #[test]
    fn test_comparisons() {
        let cm = config_map();
        assert_eq!(eval("ports[1] > 80", &cm), json!(true));
        assert_eq!(eval("ports[1] <= 443", &cm), json!(true));
        assert_eq!(eval("kind > 5", &cm), json!(false));
        assert_eq!(eval("metadata.name != 'other'", &cm), json!(true));
    }

    #[test]
    fn test_string_operations() {
        let cm = config_map();
        assert_eq!(eval("metadata.name starts_with 'subnet-'", &cm), json!(true));
        assert_eq!(eval("metadata.name ends_with '1b'", &cm), json!(false));
        assert_eq!(eval("data.cidr-block contains '10.0'", &cm), json!(true));
        assert_eq!(eval("data.subnet-id matches '^subnet-[a-z]+[0-9]+$'", &cm), json!(true));
        assert_eq!(eval("ports contains 'x'", &cm), json!(false));
    }

    #[test]
    fn test_invalid_regex_is_an_error() {
        let ast = ExpressionParser::new().parse("kind matches '('").unwrap();
        assert!(ExpressionEvaluator::default().evaluate(&ast, &config_map()).is_err());
    }

    #[test]
    fn test_precompiled_pattern_is_used() {
        let ast = ExpressionParser::new()
            .parse("metadata.name matches '^subnet-'")
            .unwrap();
        let mut patterns = Patterns::new();
        patterns.insert("^subnet-".to_string(), Regex::new("^never$").unwrap());

        let cm = config_map();
        assert!(!ExpressionEvaluator::with_patterns(patterns)
            .evaluate_bool(&ast, &cm)
            .unwrap());
        assert!(ExpressionEvaluator::default().evaluate_bool(&ast, &cm).unwrap());
    }

    #[test]
    fn test_pattern_from_record() {
        let cm = json!({"name": "subnet-a", "pattern": "^subnet-"});
        assert_eq!(eval("name matches pattern", &cm), json!(true));
    }

    #[test]
    fn test_logical_operators() {
        let cm = config_map();
        assert_eq!(
            eval("kind == 'ConfigMap' && metadata.namespace == 'default'", &cm),
            json!(true)
        );
        assert_eq!(eval("kind == 'Secret' || ports[0] == 80", &cm), json!(true));
        assert_eq!(eval("not metadata.labels.zone", &cm), json!(true));
    }

    #[test]
    fn test_length() {
        let cm = config_map();
        assert_eq!(eval("length(data)", &cm), json!(2));
        assert_eq!(eval("length(metadata.name)", &cm), json!(11));
    }

    #[test]
    fn test_truthiness() {
        let evaluator = ExpressionEvaluator::default();
        let cm = config_map();
        let name = ExpressionParser::new().parse("metadata.name").unwrap();
        let missing = ExpressionParser::new().parse("metadata.missing").unwrap();
        assert!(evaluator.evaluate_bool(&name, &cm).unwrap());
        assert!(!evaluator.evaluate_bool(&missing, &cm).unwrap());
    }
}
