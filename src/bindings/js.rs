//! QuickJS executor using rquickjs
//!
//! Runs script text in a QuickJS context and hands results back as JSON.
//! `console.*` output is routed to `tracing` under the `executor` target.

use crate::core::{ExecutorError, ExecutorResult};
use crate::scripting::ScriptExecutor;
use rquickjs::{Context, Ctx, Function, Runtime};
use serde_json::Value;

const RESULT_SLOT: &str = "__bridgeLastResult";

const RESULT_JSON_SCRIPT: &str = r#"(function () {
    var value = globalThis.__bridgeLastResult;
    delete globalThis.__bridgeLastResult;
    return JSON.stringify(value);
})()"#;

const CONSOLE_PRELUDE: &str = r#"globalThis.console = (function () {
    function format(args) {
        return Array.prototype.map.call(args, function (arg) {
            if (typeof arg === 'string') return arg;
            try { return JSON.stringify(arg); } catch (e) { return String(arg); }
        }).join(' ');
    }
    function writer(level) {
        return function () { __bridgeLog(level, format(arguments)); };
    }
    return {
        log: writer('log'),
        info: writer('info'),
        warn: writer('warn'),
        error: writer('error'),
        debug: writer('debug'),
    };
})();"#;

pub struct QuickJsExecutor {
    runtime: Runtime,
    context: Context,
}

impl QuickJsExecutor {
    pub const NAME: &'static str = "quickjs";

    pub fn new() -> ExecutorResult<Self> {
        let runtime = Runtime::new().map_err(|e| ExecutorError::RuntimeInit(e.to_string()))?;
        let context = Self::create_context(&runtime)?;
        Ok(Self { runtime, context })
    }

    fn create_context(runtime: &Runtime) -> ExecutorResult<Context> {
        let context = Context::full(runtime).map_err(|e| ExecutorError::RuntimeInit(e.to_string()))?;
        context
            .with(|ctx| install_console(&ctx))
            .map_err(|e| ExecutorError::RuntimeInit(e.to_string()))?;
        Ok(context)
    }

    /// Run queued promise jobs until the job queue is empty
    fn drain_jobs(&self) {
        loop {
            match self.runtime.execute_pending_job() {
                Ok(true) => continue,
                Ok(false) => break,
                Err(_) => {
                    tracing::warn!(target: "executor", "Pending script job threw an exception");
                }
            }
        }
    }
}

fn install_console(ctx: &Ctx<'_>) -> rquickjs::Result<()> {
    let log = Function::new(ctx.clone(), |level: String, message: String| {
        match level.as_str() {
            "error" => tracing::error!(target: "executor", "[JS] {}", message),
            "warn" => tracing::warn!(target: "executor", "[JS] {}", message),
            "debug" => tracing::debug!(target: "executor", "[JS] {}", message),
            _ => tracing::info!(target: "executor", "[JS] {}", message),
        }
    })?
    .with_name("__bridgeLog")?;
    ctx.globals().set("__bridgeLog", log)?;
    ctx.eval::<(), _>(CONSOLE_PRELUDE)
}

/// Turn an rquickjs error into a readable message, pulling the pending
/// exception out of the context when there is one.
fn describe_error(ctx: &Ctx<'_>, error: rquickjs::Error) -> String {
    if !matches!(error, rquickjs::Error::Exception) {
        return error.to_string();
    }
    let thrown = ctx.catch();
    if let Some(exception) = thrown.as_exception() {
        let message = exception.message().unwrap_or_else(|| "unknown exception".to_string());
        return match exception.stack() {
            Some(stack) if !stack.is_empty() => format!("{message}\n{stack}"),
            _ => message,
        };
    }
    if let Some(text) = thrown.as_string().and_then(|s| s.to_string().ok()) {
        return text;
    }
    format!("{thrown:?}")
}

impl ScriptExecutor for QuickJsExecutor {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn evaluate(&mut self, script: &str) -> ExecutorResult<Value> {
        let json = self.context.with(|ctx| -> ExecutorResult<Option<String>> {
            let result: rquickjs::Value = ctx
                .eval(script)
                .map_err(|e| ExecutorError::Evaluation(describe_error(&ctx, e)))?;
            ctx.globals()
                .set(RESULT_SLOT, result)
                .map_err(|e| ExecutorError::Evaluation(describe_error(&ctx, e)))?;
            ctx.eval::<Option<String>, _>(RESULT_JSON_SCRIPT)
                .map_err(|e| ExecutorError::InvalidResult(describe_error(&ctx, e)))
        })?;
        self.drain_jobs();

        match json {
            Some(text) => {
                serde_json::from_str(&text).map_err(|e| ExecutorError::InvalidResult(e.to_string()))
            }
            None => Ok(Value::Null),
        }
    }

    fn set_global(&mut self, name: &str, value: &Value) -> ExecutorResult<()> {
        // The value crosses as a JSON string literal and is parsed inside the context
        let script = format!(
            "globalThis[{}] = JSON.parse({});",
            Value::from(name),
            Value::from(value.to_string())
        );
        self.context.with(|ctx| {
            ctx.eval::<(), _>(script.as_str())
                .map_err(|e| ExecutorError::Evaluation(describe_error(&ctx, e)))
        })
    }

    fn reset(&mut self) -> ExecutorResult<()> {
        self.context = Self::create_context(&self.runtime)?;
        self.runtime.run_gc();
        tracing::debug!(target: "executor", "QuickJS context reset");
        Ok(())
    }
}
