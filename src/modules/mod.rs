//! 原生模块系统
//!
//! 原生模块是暴露给脚本的能力提供者。每个模块在注册时分配一个稳定的整数ID，
//! 模块内的方法也按声明顺序分配整数ID，脚本侧用这两个ID发起调用。

use crate::bridge::{BridgeHandle, HostHandles, UiManager};
use crate::core::{Diagnostics, ModuleResult};
use crate::dispatch::CallbackCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

pub mod builtin;
pub mod manifest;
pub mod registry;

pub use builtin::ExceptionsManager;
pub use manifest::{ManifestModule, ModuleManifest};
pub use registry::ModuleRegistry;

/// 模块ID（按注册顺序分配）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleId(pub u32);

/// 方法ID（在模块内按声明顺序分配）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MethodId(pub u32);

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for MethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 方法类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MethodKind {
    /// 不返回结果
    #[default]
    Sync,
    /// 最后一个参数是回调码，结果通过 promise 回调返回
    Promise,
}

/// 注册时声明的方法
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodSpec {
    pub name: String,
    #[serde(default)]
    pub kind: MethodKind,
}

impl MethodSpec {
    pub fn sync(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: MethodKind::Sync,
        }
    }

    pub fn promise(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: MethodKind::Promise,
        }
    }
}

/// 已分配ID的方法描述
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MethodDescriptor {
    pub id: MethodId,
    pub name: String,
    pub kind: MethodKind,
}

/// 模块描述
///
/// 注入脚本上下文后不可变。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleDescriptor {
    pub id: ModuleId,
    pub name: String,
    pub methods: Vec<MethodDescriptor>,
}

impl ModuleDescriptor {
    /// 按ID查找方法
    pub fn method(&self, id: MethodId) -> Option<&MethodDescriptor> {
        self.methods.get(id.0 as usize)
    }

    /// 按名称查找方法
    pub fn method_by_name(&self, name: &str) -> Option<&MethodDescriptor> {
        self.methods.iter().find(|m| m.name == name)
    }
}

/// 调用原生方法时的上下文
///
/// 模块通过它拿到桥接句柄（异步回传结果、派发事件）和宿主协作者。
pub struct InvokeContext<'a> {
    /// 被调用模块的ID
    pub module_id: ModuleId,
    /// 桥接句柄
    pub handle: &'a BridgeHandle,
    /// 宿主传入的不透明句柄
    pub host: &'a HostHandles,
    /// UI管理器
    pub ui_manager: &'a dyn UiManager,
    /// 诊断收集器
    pub diagnostics: &'a Diagnostics,
    /// promise 方法的回调码
    pub promise: Option<CallbackCode>,
}

impl InvokeContext<'_> {
    /// 解决当前调用关联的 promise
    ///
    /// 结果在桥接拥有者线程的下一次 `pump` 中送回脚本。非 promise 方法返回 `false`。
    pub fn resolve_promise(&self, args: Vec<Value>) -> bool {
        match self.promise {
            Some(code) => self.handle.invoke_promise_callback(code, args),
            None => false,
        }
    }
}

/// 原生模块 Trait
pub trait NativeModule {
    /// 模块名称
    fn name(&self) -> &str;

    /// 暴露给脚本的方法，顺序决定方法ID
    fn methods(&self) -> Vec<MethodSpec>;

    /// 执行一次调用
    ///
    /// promise 方法的回调码已经从 `args` 末尾移除，放在 `ctx.promise` 中。
    fn invoke(
        &mut self,
        method: &MethodDescriptor,
        args: Vec<Value>,
        ctx: &InvokeContext<'_>,
    ) -> ModuleResult<()>;

    /// 脚本上下文被销毁（重载或关闭）
    fn invalidate(&mut self) {}
}
