//! Script engine: a `groupAndMerge` function in a QuickJS sandbox
//!
//! Every run gets a fresh runtime with memory, stack and wall-clock limits.
//! The script sees only the language built-ins plus `console.log`, which is
//! forwarded to the `script` log target. Exceptions are mapped back to a line
//! of the script. TypeScript scripts are transpiled once, at construction, and
//! their exceptions are mapped through the source map.

use super::source::SourceLocation;
use super::typescript::{is_typescript, transpile, Transpiled};
use super::{EngineKind, TransformEngine};
use crate::config::ScriptConfig;
use crate::error::{Error, Result};
use crate::model::{ConfigMap, DEFAULT_NAMESPACE};
use crate::transform::MergeRule;
use once_cell::sync::Lazy;
use regex::Regex;
use rquickjs::{CatchResultExt, CaughtError, Context, Ctx, Function, Runtime};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const ENGINE: &str = "script";

const BUILTIN_NAME: &str = "group_merge.js";
const BUILTIN_SOURCE: &str = include_str!("../../assets/scripts/group_merge.js");

/// Entry point every script must define
pub const ENTRY_POINT: &str = "groupAndMerge";

const PRELUDE: &str = r#"
(function () {
  const format = (args) =>
    args.map((a) => (typeof a === "string" ? a : JSON.stringify(a))).join(" ");
  globalThis.console = {
    log: (...args) => __hostPrint("info", format(args)),
    info: (...args) => __hostPrint("info", format(args)),
    warn: (...args) => __hostPrint("warn", format(args)),
    error: (...args) => __hostPrint("warn", format(args)),
    debug: (...args) => __hostPrint("debug", format(args)),
  };
})();
"#;

const CALL: &str = "JSON.stringify(groupAndMerge(JSON.parse(__inputJson), JSON.parse(__ruleJson)))";

/// Innermost `at ...:line[:col]` frame of a QuickJS stack
static FRAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"at [^\n]*?:(\d+)(?::(\d+))?").expect("Invalid regex pattern"));

/// Sandbox limits applied to each run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptLimits {
    pub memory_limit_bytes: usize,
    pub max_stack_bytes: usize,
    pub timeout: Duration,
}

impl Default for ScriptLimits {
    fn default() -> Self {
        Self::from(&ScriptConfig::default())
    }
}

impl From<&ScriptConfig> for ScriptLimits {
    fn from(config: &ScriptConfig) -> Self {
        Self {
            memory_limit_bytes: config.memory_limit_bytes,
            max_stack_bytes: config.max_stack_bytes,
            timeout: Duration::from_millis(config.timeout_ms),
        }
    }
}

#[derive(Debug)]
pub struct ScriptEngine {
    name: String,
    source: String,
    transpiled: Option<Transpiled>,
    limits: ScriptLimits,
}

impl ScriptEngine {
    /// The bundled group-and-merge script
    pub fn builtin(limits: ScriptLimits) -> Self {
        Self {
            name: BUILTIN_NAME.to_string(),
            source: BUILTIN_SOURCE.to_string(),
            transpiled: None,
            limits,
        }
    }

    pub fn from_file(path: &Path, limits: ScriptLimits) -> Result<Self> {
        let source = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read script {}: {e}", path.display())))?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| BUILTIN_NAME.to_string());
        debug!("Loaded script {} from {}", name, path.display());
        Self::from_source(&name, &source, limits)
    }

    /// Script named `name`; a `.ts` name is transpiled from TypeScript
    pub fn from_source(name: &str, source: &str, limits: ScriptLimits) -> Result<Self> {
        let transpiled = if is_typescript(name) {
            Some(transpile(name, source)?)
        } else {
            None
        };
        Ok(Self {
            name: name.to_string(),
            source: source.to_string(),
            transpiled,
            limits,
        })
    }

    /// Code handed to QuickJS
    fn code(&self) -> &str {
        match &self.transpiled {
            Some(transpiled) => &transpiled.code,
            None => &self.source,
        }
    }

    /// Evaluate the script and call its entry point, returning the JSON result
    fn execute(&self, input_json: String, rule_json: String) -> Result<String> {
        let runtime = Runtime::new().map_err(setup_error)?;
        runtime.set_memory_limit(self.limits.memory_limit_bytes);
        runtime.set_max_stack_size(self.limits.max_stack_bytes);
        let deadline = Instant::now() + self.limits.timeout;
        runtime.set_interrupt_handler(Some(Box::new(move || Instant::now() >= deadline)));

        let context = Context::full(&runtime).map_err(setup_error)?;
        context.with(|ctx| {
            install_host(&ctx)?;
            let globals = ctx.globals();
            globals.set("__inputJson", input_json).map_err(setup_error)?;
            globals.set("__ruleJson", rule_json).map_err(setup_error)?;

            ctx.eval::<rquickjs::Value, _>(self.code())
                .catch(&ctx)
                .map_err(|e| self.script_error(e, deadline))?;

            let defined: bool = ctx
                .eval(format!("typeof {ENTRY_POINT} === 'function'"))
                .map_err(setup_error)?;
            if !defined {
                return Err(Error::engine(
                    ENGINE,
                    format!("{} does not define a {ENTRY_POINT} function", self.name),
                ));
            }

            let value: rquickjs::Value = ctx
                .eval(CALL)
                .catch(&ctx)
                .map_err(|e| self.script_error(e, deadline))?;
            match value.as_string() {
                Some(json) => json.to_string().map_err(setup_error),
                None => Err(Error::engine(
                    ENGINE,
                    format!("{ENTRY_POINT} must return an array of ConfigMaps"),
                )),
            }
        })
    }

    fn script_error(&self, err: CaughtError<'_>, deadline: Instant) -> Error {
        if Instant::now() >= deadline {
            return Error::engine(
                ENGINE,
                format!(
                    "{} timed out after {} ms",
                    self.name,
                    self.limits.timeout.as_millis()
                ),
            );
        }

        let (message, stack) = match &err {
            CaughtError::Exception(exception) => (
                exception
                    .message()
                    .unwrap_or_else(|| "uncaught exception".to_string()),
                exception.stack().unwrap_or_default(),
            ),
            other => (other.to_string(), String::new()),
        };
        let message = if message.contains("out of memory") {
            format!(
                "{message} (memory limit is {} bytes)",
                self.limits.memory_limit_bytes
            )
        } else {
            message
        };

        let Some(captures) = FRAME.captures(&stack) else {
            return Error::engine(ENGINE, message);
        };
        let line = captures[1].parse().unwrap_or(0);
        let column = captures.get(2).and_then(|c| c.as_str().parse().ok());

        let (line, column) = match &self.transpiled {
            None => (line, column),
            Some(transpiled) => match transpiled.original_position(line, column) {
                Some(position) => position,
                None => {
                    return Error::engine(
                        ENGINE,
                        format!("{message} (no TypeScript position for JavaScript line {line})"),
                    )
                }
            },
        };
        let location = SourceLocation::new(&self.name, &self.source, line, column);
        Error::engine_at(ENGINE, format!("{message} at {location}"), location)
    }
}

fn setup_error(err: rquickjs::Error) -> Error {
    Error::engine(ENGINE, format!("runtime failure: {err}"))
}

/// Install `console` on top of the `__hostPrint` binding
fn install_host(ctx: &Ctx<'_>) -> Result<()> {
    let print = Function::new(ctx.clone(), |level: String, message: String| {
        match level.as_str() {
            "warn" => warn!(target: "script", "{}", message),
            "debug" => debug!(target: "script", "{}", message),
            _ => info!(target: "script", "{}", message),
        }
    })
    .map_err(setup_error)?;
    ctx.globals().set("__hostPrint", print).map_err(setup_error)?;

    ctx.eval::<rquickjs::Value, _>(PRELUDE)
        .catch(ctx)
        .map_err(|e| Error::engine(ENGINE, format!("prelude failed: {e}")))?;
    Ok(())
}

impl TransformEngine for ScriptEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Script
    }

    fn run(&self, records: &[ConfigMap], rule: &MergeRule) -> Result<Vec<ConfigMap>> {
        let input_json = serde_json::to_string(records)?;
        let rule_json = serde_json::json!({
            "groupLabel": rule.group_label,
            "mergeKey": rule.merge_key,
            "defaultNamespace": DEFAULT_NAMESPACE,
        })
        .to_string();

        let output = self.execute(input_json, rule_json)?;
        serde_json::from_str(&output).map_err(|e| {
            Error::engine(
                ENGINE,
                format!("{ENTRY_POINT} returned something other than ConfigMaps: {e}"),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::sample_config_maps;
    use crate::transform::transform;

    const TYPED_SOURCE: &str = include_str!("../../assets/scripts/group_merge.ts");

    fn run_source(source: &str, limits: ScriptLimits) -> Result<Vec<ConfigMap>> {
        ScriptEngine::from_source("test.js", source, limits)?
            .run(&sample_config_maps(), &MergeRule::default())
    }

    #[test]
    fn test_builtin_matches_native_on_sample() {
        let records = sample_config_maps();
        let merged = ScriptEngine::builtin(ScriptLimits::default())
            .run(&records, &MergeRule::default())
            .unwrap();
        assert_eq!(merged, transform(&records));
    }

    #[test]
    fn test_builtin_matches_native_on_edge_cases() {
        let records = vec![
            ConfigMap::new("a")
                .with_label("vpc-id", "vpc-1")
                .with_namespace("net")
                .with_data("subnet-id", "s-a"),
            ConfigMap::new("orphan").with_data("subnet-id", "s-x"),
            ConfigMap::new("blank")
                .with_label("vpc-id", "")
                .with_data("subnet-id", "s-y"),
            ConfigMap::new("b")
                .with_label("vpc-id", "vpc-1")
                .with_data("cidr-block", "10.0.0.0/24"),
            ConfigMap::new("c").with_label("vpc-id", "vpc-2"),
        ];
        let merged = ScriptEngine::builtin(ScriptLimits::default())
            .run(&records, &MergeRule::default())
            .unwrap();
        assert_eq!(merged, transform(&records));
    }

    #[test]
    fn test_exception_maps_to_script_line() {
        let source = "function groupAndMerge(configMaps, rule) {\n  const count = configMaps.length;\n  throw new Error('boom ' + count);\n}\n";
        let err = run_source(source, ScriptLimits::default()).unwrap_err();
        assert!(err.to_string().contains("boom 5"));

        let location = err.location().unwrap();
        assert_eq!(location.file, "test.js");
        assert_eq!(location.line, 3);
        assert!(location.snippet.contains("throw new Error"));
    }

    #[test]
    fn test_typed_script_matches_native() {
        let records = sample_config_maps();
        let engine =
            ScriptEngine::from_source("group_merge.ts", TYPED_SOURCE, ScriptLimits::default())
                .unwrap();
        let merged = engine.run(&records, &MergeRule::default()).unwrap();
        assert_eq!(merged, transform(&records));
    }

    #[test]
    fn test_typed_exception_maps_to_typescript_line() {
        let source = "interface Rule {\n  groupLabel: string;\n}\n\nfunction groupAndMerge(configMaps: unknown[], rule: Rule): unknown[] {\n  const count: number = configMaps.length;\n  throw new Error('typed boom ' + count);\n}\n";
        let err = ScriptEngine::from_source("typed.ts", source, ScriptLimits::default())
            .unwrap()
            .run(&sample_config_maps(), &MergeRule::default())
            .unwrap_err();
        assert!(err.to_string().contains("typed boom 5"));

        let location = err.location().unwrap();
        assert_eq!(location.file, "typed.ts");
        assert_eq!(location.line, 7);
        assert!(location.snippet.contains("→    7 |   throw new Error"));
        assert!(location.snippet.contains("const count: number"));
    }

    #[test]
    fn test_typescript_syntax_error_at_construction() {
        let err = ScriptEngine::from_source(
            "broken.ts",
            "function groupAndMerge(: string {",
            ScriptLimits::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("broken.ts: syntax error"));
    }

    #[test]
    fn test_missing_entry_point() {
        let err = run_source("const unrelated = 1;\n", ScriptLimits::default()).unwrap_err();
        assert!(err.to_string().contains("does not define a groupAndMerge function"));
    }

    #[test]
    fn test_wrong_return_shape() {
        let err = run_source(
            "function groupAndMerge() { return [{ answer: 42 }]; }",
            ScriptLimits::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("other than ConfigMaps"));
    }

    #[test]
    fn test_infinite_loop_hits_timeout() {
        let limits = ScriptLimits {
            timeout: Duration::from_millis(100),
            ..ScriptLimits::default()
        };
        let err = run_source("function groupAndMerge() { while (true) {} }", limits).unwrap_err();
        assert!(err.to_string().contains("timed out after 100 ms"));
    }

    #[test]
    fn test_syntax_error_is_engine_error() {
        let err = run_source("function groupAndMerge( {", ScriptLimits::default()).unwrap_err();
        assert!(err.to_string().starts_with("script engine error"));
    }

    #[test]
    fn test_console_log_is_available() {
        let source = "function groupAndMerge(cms) { console.log('seen', cms.length, { ok: true }); return []; }";
        assert!(run_source(source, ScriptLimits::default()).unwrap().is_empty());
    }

    #[test]
    fn test_limits_from_config() {
        let config = ScriptConfig {
            timeout_ms: 250,
            ..ScriptConfig::default()
        };
        let limits = ScriptLimits::from(&config);
        assert_eq!(limits.timeout, Duration::from_millis(250));
        assert_eq!(limits.memory_limit_bytes, config.memory_limit_bytes);
    }
}
