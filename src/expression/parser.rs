//! Expression parser for selection expressions

use anyhow::{anyhow, Result};
use serde_json::Value;

use super::ast::Expression;
use super::tokenizer::{tokenize, Token};
use super::validator::MAX_DEPTH;

/// Nesting change contributed by a token
fn depth_delta(token: &Token) -> i32 {
    match token {
        Token::LeftParen | Token::LeftBracket => 1,
        Token::RightParen | Token::RightBracket => -1,
        _ => 0,
    }
}

/// Parse a binary operator expression (OR, AND)
///
/// Splits the token stream at every occurrence of `op` outside parentheses
/// and brackets, parses each part, and folds the parts left to right.
fn parse_binary_operator<F, C>(
    tokens: &[Token],
    op: &Token,
    parse_next: F,
    combine: C,
) -> Result<Expression>
where
    F: Fn(&[Token]) -> Result<Expression>,
    C: Fn(Expression, Expression) -> Expression,
{
    let positions = find_operators(tokens, op)?;

    if positions.is_empty() {
        return parse_next(tokens);
    }

    let mut parts = Vec::with_capacity(positions.len() + 1);
    let mut start = 0;
    for pos in positions.into_iter().chain(std::iter::once(tokens.len())) {
        if pos == start {
            return Err(anyhow!("Missing operand for {:?}", op));
        }
        parts.push(parse_next(&tokens[start..pos])?);
        start = pos + 1;
    }

    parts
        .into_iter()
        .reduce(combine)
        .ok_or_else(|| anyhow!("Empty expression"))
}

/// Find operator positions at the outermost nesting level
fn find_operators(tokens: &[Token], op: &Token) -> Result<Vec<usize>> {
    let mut positions = Vec::new();
    let mut depth = 0;

    for (i, token) in tokens.iter().enumerate() {
        depth += depth_delta(token);
        if depth < 0 {
            return Err(anyhow!("Mismatched parentheses"));
        }
        if depth == 0 && token == op {
            positions.push(i);
        }
    }

    if depth != 0 {
        return Err(anyhow!("Mismatched parentheses"));
    }

    Ok(positions)
}

/// Index of the token closing the group opened at `start`
fn find_closing(tokens: &[Token], start: usize) -> Result<usize> {
    let mut depth = 0;
    for (i, token) in tokens.iter().enumerate().skip(start) {
        depth += depth_delta(token);
        if depth == 0 {
            return Ok(i);
        }
    }
    Err(anyhow!("Mismatched parentheses"))
}

fn is_comparison(token: &Token) -> bool {
    matches!(
        token,
        Token::Equal
            | Token::NotEqual
            | Token::Greater
            | Token::Less
            | Token::GreaterEqual
            | Token::LessEqual
            | Token::Contains
            | Token::StartsWith
            | Token::EndsWith
            | Token::Matches
            | Token::In
    )
}

fn literal_value(token: &Token) -> Option<Value> {
    match token {
        Token::Number(n) => serde_json::Number::from_f64(*n).map(Value::Number),
        Token::String(s) => Some(Value::String(s.clone())),
        Token::Boolean(b) => Some(Value::Bool(*b)),
        Token::Null => Some(Value::Null),
        _ => None,
    }
}

/// Expression parser
#[derive(Debug, Clone, Default)]
pub struct ExpressionParser;

impl ExpressionParser {
    /// Create a new parser
    pub fn new() -> Self {
        Self
    }

    /// Parse an expression string
    pub fn parse(&self, expr: &str) -> Result<Expression> {
        let tokens = tokenize(expr)?;
        if tokens.is_empty() {
            return Err(anyhow!("Empty expression"));
        }
        self.parse_or(&tokens, 0)
    }

    fn parse_or(&self, tokens: &[Token], depth: usize) -> Result<Expression> {
        parse_binary_operator(
            tokens,
            &Token::Or,
            |tokens| self.parse_and(tokens, depth),
            |left, right| Expression::Or(Box::new(left), Box::new(right)),
        )
    }

    fn parse_and(&self, tokens: &[Token], depth: usize) -> Result<Expression> {
        parse_binary_operator(
            tokens,
            &Token::And,
            |tokens| self.parse_comparison(tokens, depth),
            |left, right| Expression::And(Box::new(left), Box::new(right)),
        )
    }

    /// `depth` counts enclosing groups, negations and calls
    fn parse_comparison(&self, tokens: &[Token], depth: usize) -> Result<Expression> {
        if depth > MAX_DEPTH {
            return Err(anyhow!(
                "Expression too deeply nested (max depth: {})",
                MAX_DEPTH
            ));
        }
        if tokens.is_empty() {
            return Err(anyhow!("Empty comparison expression"));
        }

        if tokens[0] == Token::LeftParen && find_closing(tokens, 0)? + 1 == tokens.len() {
            return self.parse_or(&tokens[1..tokens.len() - 1], depth + 1);
        }

        if tokens[0] == Token::Not {
            let expr = self.parse_comparison(&tokens[1..], depth + 1)?;
            return Ok(Expression::Not(Box::new(expr)));
        }

        let mut op_pos = None;
        let mut nesting = 0;
        for (i, token) in tokens.iter().enumerate() {
            nesting += depth_delta(token);
            if nesting == 0 && is_comparison(token) {
                op_pos = Some(i);
                break;
            }
        }

        let Some(pos) = op_pos else {
            return self.parse_primary(tokens, depth);
        };

        let left_tokens = &tokens[..pos];
        let right_tokens = &tokens[pos + 1..];
        if left_tokens.is_empty() || right_tokens.is_empty() {
            return Err(anyhow!("Invalid comparison expression"));
        }

        let left = Box::new(self.parse_primary(left_tokens, depth)?);
        if tokens[pos] == Token::In {
            return Ok(Expression::In(left, self.parse_list(right_tokens)?));
        }
        let right = Box::new(self.parse_primary(right_tokens, depth)?);

        let expr = match &tokens[pos] {
            Token::Equal => Expression::Equal(left, right),
            Token::NotEqual => Expression::NotEqual(left, right),
            Token::Greater => Expression::GreaterThan(left, right),
            Token::Less => Expression::LessThan(left, right),
            Token::GreaterEqual => Expression::GreaterEqual(left, right),
            Token::LessEqual => Expression::LessEqual(left, right),
            Token::Contains => Expression::Contains(left, right),
            Token::StartsWith => Expression::StartsWith(left, right),
            Token::EndsWith => Expression::EndsWith(left, right),
            Token::Matches => Expression::Matches(left, right),
            other => return Err(anyhow!("Unexpected operator: {:?}", other)),
        };

        Ok(expr)
    }

    /// Parse primary expressions (literals, field paths, calls, parenthesized groups)
    fn parse_primary(&self, tokens: &[Token], depth: usize) -> Result<Expression> {
        let first = tokens.first().ok_or_else(|| anyhow!("Expected expression"))?;

        if let Some(value) = literal_value(first) {
            if tokens.len() > 1 {
                return Err(anyhow!("Unexpected token after literal: {:?}", tokens[1]));
            }
            return Ok(match value {
                Value::Number(n) => Expression::Number(n.as_f64().unwrap_or_default()),
                Value::String(s) => Expression::String(s),
                Value::Bool(b) => Expression::Boolean(b),
                _ => Expression::Null,
            });
        }

        match first {
            Token::Length => {
                if tokens.get(1) != Some(&Token::LeftParen) {
                    return Err(anyhow!("Expected '(' after length"));
                }
                let end = find_closing(tokens, 1)?;
                if end + 1 != tokens.len() {
                    return Err(anyhow!("Unexpected tokens after length(...)"));
                }
                let arg = self.parse_or(&tokens[2..end], depth + 1)?;
                Ok(Expression::Length(Box::new(arg)))
            }
            Token::Identifier(_) => self.parse_path(tokens),
            Token::LeftParen => {
                let end = find_closing(tokens, 0)?;
                if end + 1 != tokens.len() {
                    return Err(anyhow!("Unexpected tokens after ')'"));
                }
                self.parse_or(&tokens[1..end], depth + 1)
            }
            other => Err(anyhow!("Unexpected token: {:?}", other)),
        }
    }

    /// Parse a field path such as `metadata.labels['vpc-id']` or `items[0].name`
    fn parse_path(&self, tokens: &[Token]) -> Result<Expression> {
        let mut segments = match &tokens[0] {
            Token::Identifier(name) => vec![name.clone()],
            other => return Err(anyhow!("Expected field name, found {:?}", other)),
        };

        let mut i = 1;
        while i < tokens.len() {
            match &tokens[i] {
                Token::Dot => match tokens.get(i + 1) {
                    Some(Token::Identifier(name)) => {
                        segments.push(name.clone());
                        i += 2;
                    }
                    _ => return Err(anyhow!("Expected field name after '.'")),
                },
                Token::LeftBracket => {
                    let segment = match (tokens.get(i + 1), tokens.get(i + 2)) {
                        (Some(Token::String(key)), Some(Token::RightBracket)) => key.clone(),
                        (Some(Token::Number(n)), Some(Token::RightBracket))
                            if *n >= 0.0 && n.fract() == 0.0 =>
                        {
                            (*n as u64).to_string()
                        }
                        _ => {
                            return Err(anyhow!(
                                "Expected a quoted key or array index inside [...]"
                            ))
                        }
                    };
                    segments.push(segment);
                    i += 3;
                }
                other => return Err(anyhow!("Unexpected token in field path: {:?}", other)),
            }
        }

        Ok(Expression::Field(segments))
    }

    /// Parse a literal list `[a, b, ...]` for the `in` operator
    fn parse_list(&self, tokens: &[Token]) -> Result<Vec<Value>> {
        if tokens.first() != Some(&Token::LeftBracket) || find_closing(tokens, 0)? + 1 != tokens.len()
        {
            return Err(anyhow!("Expected a [...] list after 'in'"));
        }

        let inner = &tokens[1..tokens.len() - 1];
        if inner.is_empty() {
            return Ok(Vec::new());
        }

        inner
            .split(|token| *token == Token::Comma)
            .map(|item| match item {
                [token] => literal_value(token)
                    .ok_or_else(|| anyhow!("List items must be literals, found {:?}", token)),
                _ => Err(anyhow!("List items must be single literals")),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(expr: &str) -> Expression {
        ExpressionParser::new().parse(expr).unwrap()
    }

    fn field(segments: &[&str]) -> Expression {
        Expression::Field(segments.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn test_parse_dotted_path() {
        assert_eq!(
            parse("metadata.labels.vpc-id"),
            field(&["metadata", "labels", "vpc-id"])
        );
    }

    #[test]
    fn test_parse_bracket_path() {
        assert_eq!(
            parse("metadata.labels['app.kubernetes.io/name']"),
            field(&["metadata", "labels", "app.kubernetes.io/name"])
        );
        assert_eq!(parse("items[2].name"), field(&["items", "2", "name"]));
    }

    #[test]
    fn test_parse_comparison() {
        assert_eq!(
            parse("kind == 'ConfigMap'"),
            Expression::Equal(
                Box::new(field(&["kind"])),
                Box::new(Expression::String("ConfigMap".to_string()))
            )
        );
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        let expr = parse("a == 1 || b == 2 && c == 3");
        match expr {
            Expression::Or(left, right) => {
                assert!(matches!(*left, Expression::Equal(_, _)));
                assert!(matches!(*right, Expression::And(_, _)));
            }
            other => panic!("expected Or, got {other:?}"),
        }
    }

    #[test]
    fn test_parenthesized_group() {
        let expr = parse("(a == 1 || b == 2) && c == 3");
        assert!(matches!(expr, Expression::And(_, _)));
    }

    #[test]
    fn test_not_prefix() {
        let expr = parse("!metadata.namespace");
        assert!(matches!(expr, Expression::Not(_)));
    }

    #[test]
    fn test_in_list() {
        let expr = parse("metadata.namespace in ['default', 'network']");
        match expr {
            Expression::In(_, values) => assert_eq!(values.len(), 2),
            other => panic!("expected In, got {other:?}"),
        }
    }

    #[test]
    fn test_length_call() {
        let expr = parse("length(data) > 1");
        match expr {
            Expression::GreaterThan(left, _) => {
                assert!(matches!(*left, Expression::Length(_)))
            }
            other => panic!("expected GreaterThan, got {other:?}"),
        }
    }

    #[test]
    fn test_deep_nesting_is_rejected_without_overflow() {
        let parser = ExpressionParser::new();
        let deep = format!("{}kind == 'ConfigMap'{}", "(".repeat(5000), ")".repeat(5000));
        let err = parser.parse(&deep).unwrap_err();
        assert!(err.to_string().contains("too deeply nested"));

        let negated = format!("{}kind", "!".repeat(5000));
        assert!(parser.parse(&negated).is_err());

        let calls = format!("{}data{} > 0", "length(".repeat(500), ")".repeat(500));
        assert!(parser.parse(&calls).is_err());
    }

    #[test]
    fn test_moderate_nesting_is_accepted() {
        let nested = format!("{}kind == 'ConfigMap'{}", "(".repeat(50), ")".repeat(50));
        assert!(matches!(parse(&nested), Expression::Equal(_, _)));
    }

    #[test]
    fn test_errors() {
        let parser = ExpressionParser::new();
        assert!(parser.parse("").is_err());
        assert!(parser.parse("(a == 1").is_err());
        assert!(parser.parse("a ==").is_err());
        assert!(parser.parse("a || || b").is_err());
        assert!(parser.parse("labels[vpc]").is_err());
        assert!(parser.parse("a.").is_err());
        assert!(parser.parse("kind in 'ConfigMap'").is_err());
        assert!(parser.parse("'x' 'y'").is_err());
    }
}
