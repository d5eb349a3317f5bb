//! 统一错误处理模块
//!
//! 提供桥接层范围内的统一错误类型定义
//!
//! ## 错误类型分层
//!
//! - **生命周期错误** (`BridgeError::MissingCollaborator`, `BridgeError::InvalidState`):
//!   初始化失败或在错误状态下调用操作
//! - **子系统错误** (`RegistryError`, `ProtocolError`, `ExecutorError`, ...):
//!   各子系统自己的错误，通过 `#[from]` 汇聚到 `BridgeError`
//!
//! 只有初始化类和加载类错误会改变桥接状态，其余错误都是按调用报告的局部错误。

use crate::bridge::BridgeState;
use crate::config::ConfigError;
use crate::dispatch::CallbackCode;
use crate::modules::{MethodId, ModuleId};
use thiserror::Error;

/// 桥接核心错误类型
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Initialization error: missing required collaborator `{0}`")]
    MissingCollaborator(&'static str),

    #[error("Initialization error: {0}")]
    Init(String),

    #[error("Operation `{operation}` is not valid in state {state}")]
    InvalidState {
        operation: &'static str,
        state: BridgeState,
    },

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Executor error: {0}")]
    Executor(#[from] ExecutorError),

    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Promise error: {0}")]
    Promise(#[from] PromiseError),

    #[error("Module error: {0}")]
    Module(#[from] ModuleError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// 模块注册表错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Module not found: id {0}")]
    ModuleNotFound(ModuleId),

    #[error("Method not found: module {module_id}, method {method_id}")]
    MethodNotFound {
        module_id: ModuleId,
        method_id: MethodId,
    },

    #[error("Unknown module: {0}")]
    UnknownModule(String),

    #[error("Unknown method: {module}.{method}")]
    UnknownMethod { module: String, method: String },

    #[error("Duplicate module: {0}")]
    DuplicateModule(String),

    #[error("Duplicate method: {module}.{method}")]
    DuplicateMethod { module: String, method: String },

    #[error("Registry is sealed, cannot register `{0}` once the bridge is ready")]
    Sealed(String),

    #[error("Module `{0}` is declared by the script and has no native implementation")]
    NotInvocable(String),
}

/// 调用编码/解码错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProtocolError {
    #[error(
        "Misaligned call batch: {module_ids} module ids, {method_ids} method ids, {params} argument lists"
    )]
    Misaligned {
        module_ids: usize,
        method_ids: usize,
        params: usize,
    },

    #[error("Malformed call batch: {0}")]
    Malformed(String),

    #[error("Invalid {field} at index {index}: {value}")]
    InvalidEntry {
        field: &'static str,
        index: usize,
        value: String,
    },
}

/// 脚本执行器错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExecutorError {
    #[error("Script evaluation failed: {0}")]
    Evaluation(String),

    #[error("Failed to create script runtime: {0}")]
    RuntimeInit(String),

    #[error("Script result is not valid JSON: {0}")]
    InvalidResult(String),

    #[error("Executor worker is gone")]
    WorkerGone,

    #[error("Unknown executor: {0}")]
    UnknownExecutor(String),
}

/// 源码加载错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SourceError {
    #[error("Invalid bundle url `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Unsupported bundle url scheme: {0}")]
    UnsupportedScheme(String),

    #[error("Failed to read bundle {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("Bundle url is not set")]
    MissingUrl,

    #[error("Bundle evaluation failed: {0}")]
    Evaluation(String),

    #[error("Failed to watch bundle: {0}")]
    Watch(String),
}

/// Promise 关联错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PromiseError {
    #[error("Callback code {0} is already pending")]
    Duplicate(CallbackCode),

    #[error("Invalid callback code: {0}")]
    InvalidCode(String),
}

/// 原生模块调用错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModuleError {
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Module call failed: {0}")]
    Failed(String),
}

/// 桥接结果类型别名
pub type BridgeResult<T> = Result<T, BridgeError>;
pub type RegistryResult<T> = Result<T, RegistryError>;
pub type ProtocolResult<T> = Result<T, ProtocolError>;
pub type ExecutorResult<T> = Result<T, ExecutorError>;
pub type SourceResult<T> = Result<T, SourceError>;
pub type PromiseResult<T> = Result<T, PromiseError>;
pub type ModuleResult<T> = Result<T, ModuleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion() {
        let registry_err = RegistryError::UnknownModule("Timing".to_string());
        let bridge_err: BridgeError = registry_err.into();
        assert!(matches!(bridge_err, BridgeError::Registry(_)));

        let executor_err = ExecutorError::WorkerGone;
        let bridge_err: BridgeError = executor_err.into();
        assert!(matches!(bridge_err, BridgeError::Executor(_)));
    }

    #[test]
    fn test_error_display() {
        let err = RegistryError::MethodNotFound {
            module_id: ModuleId(3),
            method_id: MethodId(7),
        };
        assert_eq!(err.to_string(), "Method not found: module 3, method 7");

        let err = BridgeError::InvalidState {
            operation: "load_bundle",
            state: BridgeState::Uninitialized,
        };
        assert_eq!(
            err.to_string(),
            "Operation `load_bundle` is not valid in state Uninitialized"
        );
    }
}
