//! 脚本执行器
//!
//! 桥接层只通过 [`ScriptExecutor`] 使用脚本引擎：执行一段脚本并拿回JSON结果，
//! 或者往全局对象上挂一个值。执行器按名称由 [`ExecutorFactory`] 创建。

pub mod thread_safe;

pub use thread_safe::ThreadedExecutor;

use crate::bindings::QuickJsExecutor;
use crate::core::{ExecutorError, ExecutorResult};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// 脚本执行器 Trait
///
/// 从桥接的角度看所有调用都是阻塞的。执行失败只影响这一次调用，不会重试。
pub trait ScriptExecutor {
    /// 执行器名称
    fn name(&self) -> &str;

    /// 执行脚本，返回最后一个表达式的值（`undefined` 视为 `null`）
    fn evaluate(&mut self, script: &str) -> ExecutorResult<Value>;

    /// 设置全局变量
    fn set_global(&mut self, name: &str, value: &Value) -> ExecutorResult<()>;

    /// 丢弃脚本上下文中的所有状态
    fn reset(&mut self) -> ExecutorResult<()>;
}

/// 执行器构造函数
pub type ExecutorConstructor =
    Arc<dyn Fn() -> ExecutorResult<Box<dyn ScriptExecutor>> + Send + Sync>;

/// 按名称创建执行器
#[derive(Clone, Default)]
pub struct ExecutorFactory {
    constructors: HashMap<String, ExecutorConstructor>,
}

impl fmt::Debug for ExecutorFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutorFactory")
            .field("names", &self.names())
            .finish()
    }
}

impl ExecutorFactory {
    /// 内置执行器名称：同线程 QuickJS
    pub const QUICKJS: &'static str = "quickjs";
    /// 内置执行器名称：工作线程 QuickJS
    pub const QUICKJS_WORKER: &'static str = "quickjs-worker";

    /// 创建空工厂
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建带内置执行器的工厂
    pub fn with_builtins() -> Self {
        let mut factory = Self::new();
        factory.register(Self::QUICKJS, || {
            Ok(Box::new(QuickJsExecutor::new()?) as Box<dyn ScriptExecutor>)
        });
        factory.register(Self::QUICKJS_WORKER, || {
            let executor = ThreadedExecutor::spawn(Self::QUICKJS_WORKER, || {
                Ok(Box::new(QuickJsExecutor::new()?) as Box<dyn ScriptExecutor>)
            })?;
            Ok(Box::new(executor) as Box<dyn ScriptExecutor>)
        });
        factory
    }

    /// 注册执行器，同名覆盖
    pub fn register<F>(&mut self, name: impl Into<String>, constructor: F)
    where
        F: Fn() -> ExecutorResult<Box<dyn ScriptExecutor>> + Send + Sync + 'static,
    {
        self.constructors.insert(name.into(), Arc::new(constructor));
    }

    /// 创建执行器
    pub fn create(&self, name: &str) -> ExecutorResult<Box<dyn ScriptExecutor>> {
        let constructor = self
            .constructors
            .get(name)
            .ok_or_else(|| ExecutorError::UnknownExecutor(name.to_string()))?;
        let executor = constructor()?;
        tracing::info!(target: "executor", executor = name, "Script executor created");
        Ok(executor)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// 已注册的名称（排序后）
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
