//! Expression validator for checking structure before evaluation

use super::ast::Expression;
use anyhow::{anyhow, Result};
use regex::Regex;
use std::collections::HashMap;

/// Literal `matches` patterns compiled during validation, keyed by source
pub type Patterns = HashMap<String, Regex>;

/// Deepest nesting accepted by the parser and the validator
pub(crate) const MAX_DEPTH: usize = 100;

/// Expression validator
#[derive(Debug, Clone, Default)]
pub struct ExpressionValidator;

impl ExpressionValidator {
    /// Create a new validator
    pub fn new() -> Self {
        Self
    }

    /// Validate an expression, returning its compiled literal patterns
    pub fn validate(&self, expr: &Expression) -> Result<Patterns> {
        let mut patterns = Patterns::new();
        self.validate_expression(expr, 0, &mut patterns)?;
        Ok(patterns)
    }

    /// Recursively validate an expression with depth limit
    fn validate_expression(
        &self,
        expr: &Expression,
        depth: usize,
        patterns: &mut Patterns,
    ) -> Result<()> {
        if depth > MAX_DEPTH {
            return Err(anyhow!(
                "Expression too deeply nested (max depth: {})",
                MAX_DEPTH
            ));
        }

        match expr {
            Expression::Number(_)
            | Expression::String(_)
            | Expression::Boolean(_)
            | Expression::Null => Ok(()),

            Expression::Field(path) => {
                if path.is_empty() {
                    return Err(anyhow!("Empty field path"));
                }
                if path.iter().any(String::is_empty) {
                    return Err(anyhow!("Empty field segment in path {}", path.join(".")));
                }
                Ok(())
            }

            // Literal patterns are compiled once, here
            Expression::Matches(left, right) => {
                if let Expression::String(pattern) = right.as_ref() {
                    if !patterns.contains_key(pattern) {
                        let regex = Regex::new(pattern)
                            .map_err(|e| anyhow!("Invalid regex '{}': {}", pattern, e))?;
                        patterns.insert(pattern.clone(), regex);
                    }
                }
                self.validate_expression(left, depth + 1, patterns)?;
                self.validate_expression(right, depth + 1, patterns)
            }

            Expression::Equal(left, right)
            | Expression::NotEqual(left, right)
            | Expression::GreaterThan(left, right)
            | Expression::LessThan(left, right)
            | Expression::GreaterEqual(left, right)
            | Expression::LessEqual(left, right)
            | Expression::And(left, right)
            | Expression::Or(left, right)
            | Expression::Contains(left, right)
            | Expression::StartsWith(left, right)
            | Expression::EndsWith(left, right) => {
                self.validate_expression(left, depth + 1, patterns)?;
                self.validate_expression(right, depth + 1, patterns)
            }

            Expression::Not(inner) | Expression::Length(inner) => {
                self.validate_expression(inner, depth + 1, patterns)
            }

            Expression::In(expr, values) => {
                self.validate_expression(expr, depth + 1, patterns)?;
                if values.is_empty() {
                    return Err(anyhow!("IN operator requires at least one value"));
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::ExpressionParser;

    fn validate(expr: &str) -> Result<Patterns> {
        let ast = ExpressionParser::new().parse(expr)?;
        ExpressionValidator::new().validate(&ast)
    }

    #[test]
    fn test_valid_expressions() {
        assert!(validate("metadata.labels['vpc-id'] != null").is_ok());
        assert!(validate("kind in ['ConfigMap']").is_ok());
        assert!(validate("metadata.name matches '^subnet-'").is_ok());
    }

    #[test]
    fn test_empty_in_list_rejected() {
        let err = validate("kind in []").unwrap_err();
        assert!(err.to_string().contains("at least one value"));
    }

    #[test]
    fn test_empty_bracket_segment_rejected() {
        assert!(validate("metadata.labels['']").is_err());
    }

    #[test]
    fn test_literal_patterns_are_collected() {
        let patterns =
            validate("metadata.name matches '^subnet-' || data.x matches '^subnet-'").unwrap();
        assert_eq!(patterns.len(), 1);
        assert!(patterns["^subnet-"].is_match("subnet-az1a"));
        assert!(validate("kind == 'ConfigMap'").unwrap().is_empty());
    }

    #[test]
    fn test_bad_literal_regex_rejected() {
        assert!(validate("metadata.name matches '['").is_err());
    }

    #[test]
    fn test_depth_limit() {
        let mut expr = Expression::Boolean(true);
        for _ in 0..150 {
            expr = Expression::Not(Box::new(expr));
        }
        assert!(ExpressionValidator::new().validate(&expr).is_err());
    }
}
