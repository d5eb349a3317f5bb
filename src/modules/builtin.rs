//! 内置模块
//!
//! - `RCTDeviceEventEmitter` / `AppRegistry`: 脚本侧模块，只声明名称和方法，
//!   用于事件派发和应用启动调用的编码
//! - `ExceptionsManager`: 原生模块，接收脚本上报的异常并转交诊断系统

use super::{InvokeContext, MethodDescriptor, MethodSpec, ModuleRegistry, NativeModule};
use crate::core::{DiagnosticKind, ModuleError, ModuleResult, RegistryResult};
use serde_json::Value;

/// 事件派发模块
pub const EVENT_EMITTER_MODULE: &str = "RCTDeviceEventEmitter";
/// 事件派发方法
pub const EMIT_METHOD: &str = "emit";
/// 应用注册模块
pub const APP_REGISTRY_MODULE: &str = "AppRegistry";
/// 应用启动方法
pub const RUN_APPLICATION_METHOD: &str = "runApplication";
/// 异常上报模块
pub const EXCEPTIONS_MANAGER_MODULE: &str = "ExceptionsManager";

/// 补齐尚未注册的内置模块
///
/// 在用户模块之后调用，用户模块的ID从0开始。
pub fn declare_builtins(registry: &mut ModuleRegistry) -> RegistryResult<()> {
    if !registry.contains(EVENT_EMITTER_MODULE) {
        registry.register_declared(EVENT_EMITTER_MODULE, vec![MethodSpec::sync(EMIT_METHOD)])?;
    }
    if !registry.contains(APP_REGISTRY_MODULE) {
        registry.register_declared(
            APP_REGISTRY_MODULE,
            vec![MethodSpec::sync(RUN_APPLICATION_METHOD)],
        )?;
    }
    if !registry.contains(EXCEPTIONS_MANAGER_MODULE) {
        registry.register_module(Box::new(ExceptionsManager::default()))?;
    }
    Ok(())
}

/// 脚本异常上报
#[derive(Debug, Default)]
pub struct ExceptionsManager {
    reported: u64,
}

impl ExceptionsManager {
    pub fn reported(&self) -> u64 {
        self.reported
    }

    fn describe(args: &[Value]) -> ModuleResult<String> {
        let message = args
            .first()
            .and_then(Value::as_str)
            .ok_or_else(|| ModuleError::InvalidArguments("expected a message string".into()))?;
        match args.get(1) {
            Some(stack) if !stack.is_null() => Ok(format!("{message}\n{stack}")),
            _ => Ok(message.to_string()),
        }
    }
}

impl NativeModule for ExceptionsManager {
    fn name(&self) -> &str {
        EXCEPTIONS_MANAGER_MODULE
    }

    fn methods(&self) -> Vec<MethodSpec> {
        vec![
            MethodSpec::sync("reportSoftException"),
            MethodSpec::sync("reportFatalException"),
            MethodSpec::sync("dismissRedbox"),
        ]
    }

    fn invoke(
        &mut self,
        method: &MethodDescriptor,
        args: Vec<Value>,
        ctx: &InvokeContext<'_>,
    ) -> ModuleResult<()> {
        match method.name.as_str() {
            "reportSoftException" => {
                self.reported += 1;
                ctx.diagnostics.report(
                    DiagnosticKind::SoftException,
                    EXCEPTIONS_MANAGER_MODULE,
                    Self::describe(&args)?,
                );
            }
            "reportFatalException" => {
                self.reported += 1;
                ctx.diagnostics.report(
                    DiagnosticKind::Evaluation,
                    EXCEPTIONS_MANAGER_MODULE,
                    Self::describe(&args)?,
                );
            }
            "dismissRedbox" => ctx.diagnostics.dismiss(),
            other => return Err(ModuleError::Failed(format!("unsupported method {other}"))),
        }
        Ok(())
    }

    fn invalidate(&mut self) {
        self.reported = 0;
    }
}
