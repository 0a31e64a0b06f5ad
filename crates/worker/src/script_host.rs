// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Embeds user scripts inside the Worker process via `rhai`.
//!
//! Scripts never load into the Supervisor's address space (Design Notes);
//! `rhai` is a pure-Rust, sandboxed engine with no dynamic library loading,
//! so a Worker hosting a hostile script can still only touch what the
//! engine exposes.

use std::fs;

use rhai::{Dynamic, Engine, EvalAltResult, Map, Scope, AST};
use sec_core::ArgCapture;
use sec_queue::ShutdownFlag;

#[derive(Debug, thiserror::Error)]
pub enum ScriptHostError {
    #[error("failed to read script source: {0}")]
    Read(#[from] std::io::Error),
    #[error("script does not compile: {0}")]
    Compile(String),
    #[error("{kind} repository scripts are not fetched by this build: {uri}")]
    UnsupportedSource { kind: &'static str, uri: String },
}

/// The outcome of a script call that did not return a value.
#[derive(Debug)]
pub enum CallError {
    /// The engine's `on_progress` callback asked for termination — a
    /// SIGTERM arrived mid-call (§4.1). Not a script defect: the Worker
    /// reports this as `STOPPED`, not `FAILED`.
    Terminated,
    /// The script itself raised an error (an uncaught `throw`, a type
    /// error, a missing function, ...).
    Failed(String),
}

/// Loads and executes one Procedure's script for the lifetime of its
/// Worker process.
pub struct ScriptHost {
    engine: Engine,
    ast: Option<AST>,
    scope: Scope<'static>,
}

impl ScriptHost {
    /// `shutdown` is wired into the engine's progress callback so a
    /// SIGTERM delivered mid-call aborts script execution immediately
    /// rather than waiting for the next work item poll (§4.1).
    pub fn new(shutdown: ShutdownFlag) -> Self {
        let mut engine = Engine::new();
        engine.on_progress(move |_ops| {
            if shutdown.is_set() {
                Some(Dynamic::from("terminate requested".to_string()))
            } else {
                None
            }
        });
        Self { engine, ast: None, scope: Scope::new() }
    }

    /// Resolve and compile `script`, leaving the Worker in `IDLE` on
    /// success or surfacing a `ScriptLoadError` on failure.
    pub fn load(&mut self, script: &sec_core::Script) -> Result<(), ScriptHostError> {
        let source = read_source(script)?;
        let ast = self
            .engine
            .compile(&source)
            .map_err(|err| ScriptHostError::Compile(err.to_string()))?;
        self.ast = Some(ast);
        Ok(())
    }

    /// Whether the loaded script declares a function with this name.
    pub fn has_function(&self, name: &str) -> bool {
        self.ast.as_ref().is_some_and(|ast| ast.iter_functions().any(|f| f.name == name))
    }

    /// Invoke `call.function_name` with its captured arguments.
    ///
    /// Positional arguments map 1:1 to rhai's positional parameters.
    /// Non-empty keyword arguments are passed as one trailing rhai object
    /// map, so a script wanting named parameters declares its last
    /// parameter to receive it.
    pub fn call(&mut self, call: &ArgCapture) -> Result<serde_json::Value, CallError> {
        let ast = self.ast.as_ref().ok_or_else(|| CallError::Failed("no script loaded".to_string()))?;

        let mut args: Vec<Dynamic> = call
            .positional_args
            .iter()
            .map(|v| rhai::serde::to_dynamic(v).unwrap_or(Dynamic::UNIT))
            .collect();

        if !call.keyword_args.is_empty() {
            let mut map = Map::new();
            for (key, value) in &call.keyword_args {
                let dynamic = rhai::serde::to_dynamic(value).unwrap_or(Dynamic::UNIT);
                map.insert(key.as_str().into(), dynamic);
            }
            args.push(Dynamic::from_map(map));
        }

        let result = self
            .engine
            .call_fn_raw(&mut self.scope, ast, false, false, &call.function_name, None, &mut args)
            .map_err(|err| match *err {
                EvalAltResult::ErrorTerminated(..) => CallError::Terminated,
                other => CallError::Failed(other.to_string()),
            })?;

        rhai::serde::from_dynamic(&result).map_err(|err| CallError::Failed(err.to_string()))
    }
}

fn read_source(script: &sec_core::Script) -> Result<String, ScriptHostError> {
    match script {
        sec_core::Script::Filesystem { uri } => {
            let path = uri.strip_prefix("file://").unwrap_or(uri);
            Ok(fs::read_to_string(path)?)
        }
        sec_core::Script::Repo { uri, .. } => {
            Err(ScriptHostError::UnsupportedSource { kind: "repo", uri: uri.clone() })
        }
    }
}

#[cfg(test)]
#[path = "script_host_tests.rs"]
mod tests;
