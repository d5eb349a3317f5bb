//! 核心模块
//!
//! 包含桥接层共用的基础设施：
//! - `error` - 错误类型定义
//! - `diagnostics` - 诊断收集和错误浮层接口
//! - `logging` - 日志初始化
//! - `utils` - 工具函数

pub mod diagnostics;
pub mod error;
pub mod logging;
pub mod utils;
#[macro_use]
pub mod macros;

// 重新导出错误类型
pub use error::{
    BridgeError, BridgeResult, ExecutorError, ExecutorResult, ModuleError, ModuleResult,
    PromiseError, PromiseResult, ProtocolError, ProtocolResult, RegistryError, RegistryResult,
    SourceError, SourceResult,
};

// 重新导出诊断类型
pub use diagnostics::{
    DiagnosticKind, DiagnosticRecord, DiagnosticSink, DiagnosticStats, Diagnostics, LogSink,
};
