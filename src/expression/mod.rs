//! Selection expression language over JSON values
//!
//! Used to pre-select input records and to describe the declarative rules of
//! the `expression` engine. Supports:
//! - Field paths with dots and bracket subscripts: `metadata.labels['vpc-id']`
//! - Comparison operators: ==, !=, >, <, >=, <=
//! - Logical operators: &&, ||, ! (and, or, not)
//! - String operations: contains, starts_with, ends_with, matches
//! - Membership: `x in ['a', 'b']`
//! - `length(x)` for strings, arrays and objects
//!
//! Missing fields evaluate to `null`.

pub mod ast;
pub mod evaluator;
pub mod parser;
pub mod tokenizer;
pub mod validator;

use anyhow::{Context, Result};
use serde_json::Value;

pub use ast::Expression;
pub use evaluator::ExpressionEvaluator;
pub use parser::ExpressionParser;
pub use validator::ExpressionValidator;

/// A parsed and validated expression producing a value
#[derive(Debug, Clone)]
pub struct CompiledExpression {
    source: String,
    expression: Expression,
    evaluator: ExpressionEvaluator,
}

impl CompiledExpression {
    /// Expression text as written
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluate against an item
    pub fn evaluate(&self, item: &Value) -> Result<Value> {
        self.evaluator
            .evaluate(&self.expression, item)
            .with_context(|| format!("while evaluating `{}`", self.source))
    }
}

/// Compiled filter ready for execution
#[derive(Debug, Clone)]
pub struct CompiledFilter {
    inner: CompiledExpression,
}

impl CompiledFilter {
    pub fn source(&self) -> &str {
        self.inner.source()
    }

    /// Evaluate the filter against an item
    pub fn matches(&self, item: &Value) -> Result<bool> {
        self.inner
            .evaluator
            .evaluate_bool(&self.inner.expression, item)
            .with_context(|| format!("while evaluating filter `{}`", self.inner.source))
    }
}

/// Expression engine for compiling selection expressions
#[derive(Debug, Clone, Default)]
pub struct ExpressionEngine {
    parser: ExpressionParser,
    validator: ExpressionValidator,
}

impl ExpressionEngine {
    /// Create a new expression engine
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile a value expression
    pub fn compile(&self, expr: &str) -> Result<CompiledExpression> {
        let expression = self
            .parser
            .parse(expr)
            .with_context(|| format!("invalid expression `{expr}`"))?;
        let patterns = self
            .validator
            .validate(&expression)
            .with_context(|| format!("invalid expression `{expr}`"))?;

        Ok(CompiledExpression {
            source: expr.to_string(),
            expression,
            evaluator: ExpressionEvaluator::with_patterns(patterns),
        })
    }

    /// Compile a filter expression
    pub fn compile_filter(&self, expr: &str) -> Result<CompiledFilter> {
        Ok(CompiledFilter {
            inner: self.compile(expr)?,
        })
    }
}
