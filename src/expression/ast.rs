//! Abstract Syntax Tree types for selection expressions

use serde_json::Value;

/// Parsed expression AST
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    // Literals
    Number(f64),
    String(String),
    Boolean(bool),
    Null,

    // Field access, one segment per object key or array index
    // (e.g., ["metadata", "labels", "vpc-id"])
    Field(Vec<String>),

    // Comparison operators
    Equal(Box<Expression>, Box<Expression>),
    NotEqual(Box<Expression>, Box<Expression>),
    GreaterThan(Box<Expression>, Box<Expression>),
    LessThan(Box<Expression>, Box<Expression>),
    GreaterEqual(Box<Expression>, Box<Expression>),
    LessEqual(Box<Expression>, Box<Expression>),

    // Logical operators
    And(Box<Expression>, Box<Expression>),
    Or(Box<Expression>, Box<Expression>),
    Not(Box<Expression>),

    // String functions
    Contains(Box<Expression>, Box<Expression>),
    StartsWith(Box<Expression>, Box<Expression>),
    EndsWith(Box<Expression>, Box<Expression>),
    Matches(Box<Expression>, Box<Expression>), // Regex match

    // Membership test against a literal list
    In(Box<Expression>, Vec<Value>),

    Length(Box<Expression>),
}
