/// Sandboxed Lua execution for code steps
///
/// User code runs in a fresh Lua 5.4 state with only the `table`, `string`,
/// `math` and `utf8` libraries. Globals that reach outside the state (file
/// loading, chunk loading, GC control) are removed. The code sees two globals:
/// `input` (the current data) and `output` (an empty table it is expected to
/// fill); the final value of `output` is the step result.
///
/// An instruction-count hook enforces a wall-clock budget and the allocator is
/// capped, so a runaway script fails the step instead of stalling the run.
/// Native calls never reach the hook, so the backtracking pattern functions of
/// the `string` library are removed. Code that needs matching uses the `re`
/// table instead, which is backed by the linear-time `regex` crate:
///
/// - `re.is_match(s, pattern)` -> boolean
/// - `re.find(s, pattern)` -> start, end (1-based, inclusive) or nil
/// - `re.match(s, pattern)` -> the capture groups, or the whole match
/// - `re.find_all(s, pattern)` -> list of matched strings
/// - `re.gsub(s, pattern, replacement)` -> new string, count (`$1` expands)

use crate::config::SandboxConfig;
use crate::error::StepError;
use mlua::{HookTriggers, Lua, LuaOptions, LuaSerdeExt, StdLib, Variadic, VmState};
use regex::{Regex, RegexBuilder};
use serde_json::Value;
use std::time::{Duration, Instant};

/// Instructions between budget checks
const HOOK_INTERVAL: u32 = 1_000;

/// How long the caller keeps waiting for the worker after the budget is spent
const JOIN_GRACE: Duration = Duration::from_millis(250);

/// Compiled program size cap for `re` patterns
const REGEX_SIZE_LIMIT: usize = 1 << 20;

const REMOVED_GLOBALS: &[&str] = &["dofile", "loadfile", "load", "loadstring", "collectgarbage", "require"];

const REMOVED_STRING_FUNCTIONS: &[&str] = &["find", "match", "gmatch", "gsub"];

#[derive(Debug, Clone)]
pub struct LuaSandbox {
    time_budget: Duration,
    memory_limit: usize,
}

impl LuaSandbox {
    pub fn new(config: &SandboxConfig) -> Self {
        Self {
            time_budget: Duration::from_millis(config.time_budget_ms),
            memory_limit: config.memory_limit_bytes,
        }
    }

    /// Run `code` on a blocking worker thread and return the final `output`
    ///
    /// The hook stops interpreted code at the deadline. If the worker is still
    /// busy after the grace period, the step fails without waiting for it.
    pub async fn run(&self, code: String, input: Value) -> Result<Value, StepError> {
        let sandbox = self.clone();
        let worker = tokio::task::spawn_blocking(move || sandbox.run_blocking(&code, &input));

        match tokio::time::timeout(self.time_budget + JOIN_GRACE, worker).await {
            Ok(joined) => joined.map_err(|e| StepError::Sandbox(format!("sandbox worker crashed: {}", e)))?,
            Err(_) => {
                tracing::error!("⏱️ Sandbox worker still busy {:?} past its budget; abandoning it", JOIN_GRACE);
                Err(StepError::Sandbox(format!(
                    "execution exceeded time budget of {}ms",
                    self.time_budget.as_millis()
                )))
            }
        }
    }

    fn run_blocking(&self, code: &str, input: &Value) -> Result<Value, StepError> {
        let lua = Lua::new_with(
            StdLib::TABLE | StdLib::STRING | StdLib::MATH | StdLib::UTF8,
            LuaOptions::new(),
        )?;
        lua.set_memory_limit(self.memory_limit)?;

        let globals = lua.globals();
        for name in REMOVED_GLOBALS {
            globals.set(*name, mlua::Nil)?;
        }
        let string: mlua::Table = globals.get("string")?;
        for name in REMOVED_STRING_FUNCTIONS {
            string.set(*name, mlua::Nil)?;
        }
        globals.set("re", regex_table(&lua)?)?;
        globals.set(
            "print",
            lua.create_function(|_, message: mlua::Variadic<mlua::Value>| {
                let parts: Vec<String> = message
                    .iter()
                    .map(|v| v.to_string().unwrap_or_else(|_| "?".to_string()))
                    .collect();
                tracing::debug!("🧪 sandbox: {}", parts.join("\t"));
                Ok(())
            })?,
        )?;

        globals.set("input", lua.to_value(input)?)?;
        globals.set("output", lua.create_table()?)?;

        let deadline = Instant::now() + self.time_budget;
        let budget = self.time_budget;
        lua.set_hook(
            HookTriggers::new().every_nth_instruction(HOOK_INTERVAL),
            move |_lua, _debug| {
                if Instant::now() > deadline {
                    Err(mlua::Error::runtime(format!(
                        "execution exceeded time budget of {}ms",
                        budget.as_millis()
                    )))
                } else {
                    Ok(VmState::Continue)
                }
            },
        )?;

        lua.load(code).set_name("step").exec()?;

        let output: mlua::Value = globals.get("output")?;
        Ok(lua.from_value(output)?)
    }
}

fn compile(pattern: &str) -> mlua::Result<Regex> {
    RegexBuilder::new(pattern)
        .size_limit(REGEX_SIZE_LIMIT)
        .build()
        .map_err(|e| mlua::Error::runtime(format!("invalid pattern: {}", e)))
}

/// The `re` global: regex matching with linear-time guarantees
fn regex_table(lua: &Lua) -> mlua::Result<mlua::Table> {
    let re = lua.create_table()?;

    re.set(
        "is_match",
        lua.create_function(|_, (text, pattern): (String, String)| Ok(compile(&pattern)?.is_match(&text)))?,
    )?;

    re.set(
        "find",
        lua.create_function(|_, (text, pattern): (String, String)| {
            Ok(compile(&pattern)?
                .find(&text)
                .map_or((None, None), |m| (Some(m.start() + 1), Some(m.end()))))
        })?,
    )?;

    re.set(
        "match",
        lua.create_function(|_, (text, pattern): (String, String)| {
            let regex = compile(&pattern)?;
            let Some(caps) = regex.captures(&text) else {
                return Ok(Variadic::from_iter([None]));
            };
            let values: Variadic<Option<String>> = if caps.len() == 1 {
                Variadic::from_iter([Some(caps[0].to_string())])
            } else {
                caps.iter().skip(1).map(|group| group.map(|m| m.as_str().to_string())).collect()
            };
            Ok(values)
        })?,
    )?;

    re.set(
        "find_all",
        lua.create_function(|_, (text, pattern): (String, String)| {
            Ok(compile(&pattern)?
                .find_iter(&text)
                .map(|m| m.as_str().to_string())
                .collect::<Vec<_>>())
        })?,
    )?;

    re.set(
        "gsub",
        lua.create_function(|_, (text, pattern, replacement): (String, String, String)| {
            let regex = compile(&pattern)?;
            let count = regex.find_iter(&text).count();
            Ok((regex.replace_all(&text, replacement.as_str()).into_owned(), count))
        })?,
    )?;

    Ok(re)
}
