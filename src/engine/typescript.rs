//! TypeScript support for the script engine
//!
//! Types are stripped with oxc before QuickJS sees the code. The emitted
//! source map takes positions in QuickJS stack traces back to the
//! TypeScript file.

use crate::error::{Error, Result};
use oxc_allocator::Allocator;
use oxc_codegen::{Codegen, CodegenOptions};
use oxc_parser::Parser;
use oxc_semantic::SemanticBuilder;
use oxc_span::SourceType;
use oxc_transformer::{TransformOptions, Transformer};
use sourcemap::SourceMap;
use std::path::{Path, PathBuf};
use tracing::debug;

const ENGINE: &str = "script";

/// Scripts named `*.ts` or `*.mts` are transpiled first
pub fn is_typescript(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("ts") || ext.eq_ignore_ascii_case("mts"))
}

/// JavaScript emitted for a TypeScript script
#[derive(Debug)]
pub struct Transpiled {
    pub code: String,
    map: SourceMap,
}

impl Transpiled {
    /// TypeScript position of a 1-based JavaScript line and column
    ///
    /// Without a column the last mapping on the line is used.
    pub fn original_position(
        &self,
        line: usize,
        column: Option<usize>,
    ) -> Option<(usize, Option<usize>)> {
        let js_line = u32::try_from(line.checked_sub(1)?).ok()?;
        let js_column = match column {
            Some(column) => u32::try_from(column.saturating_sub(1)).ok()?,
            None => u32::MAX,
        };

        let token = self.map.lookup_token(js_line, js_column)?;
        let ts_line = token.get_src_line() as usize + 1;
        let ts_column = column.map(|_| token.get_src_col() as usize + 1);
        Some((ts_line, ts_column))
    }
}

/// Strip TypeScript syntax from `source`, keeping a source map
pub fn transpile(name: &str, source: &str) -> Result<Transpiled> {
    let allocator = Allocator::default();
    let parsed = Parser::new(&allocator, source, SourceType::ts()).parse();
    if !parsed.errors.is_empty() {
        return Err(diagnostics(name, "syntax error", &parsed.errors));
    }

    let mut program = parsed.program;
    let scoping = SemanticBuilder::new()
        .build(&program)
        .semantic
        .into_scoping();
    let transformed = Transformer::new(&allocator, Path::new(name), &TransformOptions::default())
        .build_with_scoping(scoping, &mut program);
    if !transformed.errors.is_empty() {
        return Err(diagnostics(name, "cannot transpile", &transformed.errors));
    }

    let printed = Codegen::new()
        .with_options(CodegenOptions {
            source_map_path: Some(PathBuf::from(name)),
            ..CodegenOptions::default()
        })
        .build(&program);
    let map_json = printed
        .map
        .ok_or_else(|| Error::engine(ENGINE, format!("{name}: no source map was emitted")))?
        .to_json_string();
    let map = SourceMap::from_slice(map_json.as_bytes())
        .map_err(|e| Error::engine(ENGINE, format!("{name}: unreadable source map: {e}")))?;

    debug!(
        "Transpiled {} ({} bytes of TypeScript, {} bytes of JavaScript)",
        name,
        source.len(),
        printed.code.len()
    );
    Ok(Transpiled {
        code: printed.code,
        map,
    })
}

fn diagnostics(name: &str, what: &str, errors: &[impl std::fmt::Display]) -> Error {
    let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
    Error::engine(ENGINE, format!("{name}: {what}: {}", messages.join("; ")))
}
