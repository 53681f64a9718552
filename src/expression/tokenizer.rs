//! Lexical analysis (tokenization) for selection expressions
//!
//! The tokenizer is a pure function from an expression string to a token
//! sequence. Field paths are split into identifiers, dots and brackets so
//! that keys containing dots or slashes can be addressed with subscripts:
//!
//! ```text
//! metadata.labels['app.kubernetes.io/name'] == "web"
//! ```
//!
//! Identifiers may contain `-` after their first character, which lets
//! Kubernetes-style keys such as `vpc-id` be written without quoting.

use anyhow::{anyhow, Result};
use std::iter::Peekable;
use std::str::Chars;

/// Token types for the lexer
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Literals
    Number(f64),
    String(String),
    Boolean(bool),
    Null,
    Identifier(String),

    // Operators
    Equal,
    NotEqual,
    Greater,
    Less,
    GreaterEqual,
    LessEqual,
    And,
    Or,
    Not,
    In,

    // Functions
    Contains,
    StartsWith,
    EndsWith,
    Matches,
    Length,

    // Punctuation
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    Comma,
    Dot,
}

/// Parse operator tokens (!, !=, =, ==, >, >=, <, <=, &&, ||)
///
/// Returns `Some(Token)` if the character is an operator, `None` otherwise.
fn parse_operator(ch: char, chars: &mut Peekable<Chars>) -> Result<Option<Token>> {
    let token = match ch {
        '!' => {
            chars.next();
            if chars.peek() == Some(&'=') {
                chars.next();
                Token::NotEqual
            } else {
                Token::Not
            }
        }
        '=' => {
            chars.next();
            if chars.peek() == Some(&'=') {
                chars.next();
            }
            Token::Equal
        }
        '>' => {
            chars.next();
            if chars.peek() == Some(&'=') {
                chars.next();
                Token::GreaterEqual
            } else {
                Token::Greater
            }
        }
        '<' => {
            chars.next();
            if chars.peek() == Some(&'=') {
                chars.next();
                Token::LessEqual
            } else {
                Token::Less
            }
        }
        '&' => {
            chars.next();
            if chars.peek() == Some(&'&') {
                chars.next();
                Token::And
            } else {
                return Err(anyhow!("Expected && but got single &"));
            }
        }
        '|' => {
            chars.next();
            if chars.peek() == Some(&'|') {
                chars.next();
                Token::Or
            } else {
                return Err(anyhow!("Expected || but got single |"));
            }
        }
        _ => return Ok(None),
    };
    Ok(Some(token))
}

/// Parse a quoted string literal
///
/// The opening quote has already been consumed. A backslash escapes the
/// next character, so `'it\'s'` yields `it's`.
fn parse_string(quote: char, chars: &mut Peekable<Chars>) -> Result<String> {
    let mut string = String::new();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => match chars.next() {
                Some(escaped) => string.push(escaped),
                None => break,
            },
            _ if ch == quote => return Ok(string),
            _ => string.push(ch),
        }
    }
    Err(anyhow!("Unterminated string literal: {quote}{string}"))
}

/// Parse a numeric literal (integer or float, optionally negative)
fn parse_number(chars: &mut Peekable<Chars>) -> Result<f64> {
    let mut num_str = String::new();
    if chars.peek() == Some(&'-') {
        num_str.push('-');
        chars.next();
    }
    while let Some(&ch) = chars.peek() {
        if ch.is_ascii_digit() || ch == '.' {
            num_str.push(ch);
            chars.next();
        } else {
            break;
        }
    }
    num_str
        .parse::<f64>()
        .map_err(|_| anyhow!("Invalid number: {}", num_str))
}

/// Convert identifier string to keyword token or Identifier token
fn parse_keyword_or_identifier(ident: String) -> Token {
    match ident.to_lowercase().as_str() {
        "true" => Token::Boolean(true),
        "false" => Token::Boolean(false),
        "null" => Token::Null,
        "in" => Token::In,
        "and" => Token::And,
        "or" => Token::Or,
        "not" => Token::Not,
        "contains" => Token::Contains,
        "starts_with" | "startswith" => Token::StartsWith,
        "ends_with" | "endswith" => Token::EndsWith,
        "matches" => Token::Matches,
        "length" => Token::Length,
        _ => Token::Identifier(ident),
    }
}

/// Collect identifier characters: alphanumerics, `_`, and `-` after the first
fn parse_identifier(chars: &mut Peekable<Chars>) -> String {
    let mut ident = String::new();
    while let Some(&ch) = chars.peek() {
        if ch.is_alphanumeric() || ch == '_' || (ch == '-' && !ident.is_empty()) {
            ident.push(ch);
            chars.next();
        } else {
            break;
        }
    }
    ident
}

/// Tokenize an expression string into a sequence of tokens
///
/// ```
/// use configmerge::expression::tokenizer::tokenize;
///
/// let tokens = tokenize("metadata.labels.vpc-id != null").unwrap();
/// assert_eq!(tokens.len(), 7);
/// ```
pub fn tokenize(expr: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = expr.chars().peekable();

    while let Some(&ch) = chars.peek() {
        match ch {
            ' ' | '\t' | '\n' | '\r' => {
                chars.next();
            }
            '(' => {
                tokens.push(Token::LeftParen);
                chars.next();
            }
            ')' => {
                tokens.push(Token::RightParen);
                chars.next();
            }
            '[' => {
                tokens.push(Token::LeftBracket);
                chars.next();
            }
            ']' => {
                tokens.push(Token::RightBracket);
                chars.next();
            }
            ',' => {
                tokens.push(Token::Comma);
                chars.next();
            }
            '.' => {
                tokens.push(Token::Dot);
                chars.next();
            }
            '!' | '=' | '>' | '<' | '&' | '|' => {
                if let Some(token) = parse_operator(ch, &mut chars)? {
                    tokens.push(token);
                }
            }
            '"' | '\'' => {
                chars.next();
                tokens.push(Token::String(parse_string(ch, &mut chars)?));
            }
            '0'..='9' | '-' => {
                tokens.push(Token::Number(parse_number(&mut chars)?));
            }
            _ if ch.is_alphabetic() || ch == '_' => {
                let ident = parse_identifier(&mut chars);
                tokens.push(parse_keyword_or_identifier(ident));
            }
            _ => return Err(anyhow!("Unexpected character '{}' in expression", ch)),
        }
    }

    Ok(tokens)
}
