//! Source positions for failures inside hosted scripts and templates

use std::fmt;

/// Lines shown before the faulting line
const CONTEXT_BEFORE: usize = 2;
/// Lines shown after the faulting line
const CONTEXT_AFTER: usize = 1;
/// Width of the `→ 1234 | ` gutter
const GUTTER_WIDTH: usize = 9;

/// A position in hosted source with a rendered excerpt around it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub file: String,
    /// 1-based
    pub line: usize,
    /// 1-based, when the runtime reports one
    pub column: Option<usize>,
    pub snippet: String,
}

impl SourceLocation {
    pub fn new(file: impl Into<String>, source: &str, line: usize, column: Option<usize>) -> Self {
        Self {
            file: file.into(),
            line,
            column,
            snippet: render_snippet(source, line, column),
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.column {
            Some(column) => write!(f, "{}:{}:{}", self.file, self.line, column),
            None => write!(f, "{}:{}", self.file, self.line),
        }
    }
}

/// Render the lines around `line`, marking it with `→` and a caret under `column`
pub fn render_snippet(source: &str, line: usize, column: Option<usize>) -> String {
    let lines: Vec<&str> = source.lines().collect();
    if line == 0 || line > lines.len() {
        return String::new();
    }

    let start = line.saturating_sub(CONTEXT_BEFORE + 1);
    let end = (line + CONTEXT_AFTER).min(lines.len());

    let mut out = Vec::new();
    for (offset, text) in lines[start..end].iter().enumerate() {
        let number = start + offset + 1;
        let marker = if number == line { "→ " } else { "  " };
        out.push(format!("{marker}{number:4} | {text}"));
        if number == line {
            if let Some(column) = column {
                let pad = " ".repeat(GUTTER_WIDTH + column.saturating_sub(1));
                out.push(format!("{pad}^"));
            }
        }
    }
    out.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = "one\ntwo\nthree\nfour\nfive";

    #[test]
    fn test_snippet_marks_line_and_column() {
        let snippet = render_snippet(SOURCE, 3, Some(2));
        let expected = [
            "     1 | one",
            "     2 | two",
            "→    3 | three",
            "          ^",
            "     4 | four",
        ]
        .join("\n");
        assert_eq!(snippet, expected);
    }

    #[test]
    fn test_snippet_at_first_line_without_column() {
        let snippet = render_snippet(SOURCE, 1, None);
        assert_eq!(snippet, "→    1 | one\n     2 | two");
    }

    #[test]
    fn test_snippet_out_of_range_is_empty() {
        assert!(render_snippet(SOURCE, 0, None).is_empty());
        assert!(render_snippet(SOURCE, 9, None).is_empty());
    }

    #[test]
    fn test_display() {
        let location = SourceLocation::new("group_merge.js", SOURCE, 4, Some(7));
        assert_eq!(location.to_string(), "group_merge.js:4:7");
        assert!(location.snippet.contains("→    4 | four"));
    }
}
