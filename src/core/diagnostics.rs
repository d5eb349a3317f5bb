//! 诊断收集和报告模块
//!
//! 桥接层所有可报告的异常都汇聚到这里：
//! - 用户可见的失败（初始化、加载、脚本执行）会转发给 [`DiagnosticSink`]（错误浮层）
//! - 局部异常（ID解析失败、未知的回调码等）只记录和打日志，不向外传播

use crate::core::utils::current_timestamp_ms;
use crate::impl_default_and_new;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// 诊断类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticKind {
    /// 初始化失败（缺少协作者等）
    Init,
    /// 源码加载失败
    LoadFailure,
    /// 脚本执行失败
    Evaluation,
    /// 调用批次中某一项的模块/方法无法解析
    Resolution,
    /// 原生模块调用返回错误
    Module,
    /// 未知或已消费的回调码
    UnknownPromise,
    /// 结果文档格式错误
    Protocol,
    /// 脚本上报的非致命异常
    SoftException,
}

impl DiagnosticKind {
    /// 是否需要展示给用户
    pub fn is_user_visible(self) -> bool {
        matches!(
            self,
            DiagnosticKind::Init | DiagnosticKind::LoadFailure | DiagnosticKind::Evaluation
        )
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// 诊断记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticRecord {
    /// 诊断类型
    pub kind: DiagnosticKind,
    /// 来源（子系统名）
    pub source: String,
    /// 消息
    pub message: String,
    /// 时间戳（毫秒）
    pub timestamp_ms: u64,
}

impl DiagnosticRecord {
    pub fn new(kind: DiagnosticKind, source: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            source: source.into(),
            message: message.into(),
            timestamp_ms: current_timestamp_ms(),
        }
    }
}

/// 错误浮层协作者
///
/// 桥接层只负责把用户可见的失败交给它，具体怎么展示由宿主决定。
pub trait DiagnosticSink: Send + Sync {
    /// 展示一条失败
    fn show(&self, record: &DiagnosticRecord);

    /// 关闭当前展示
    fn dismiss(&self) {}
}

/// 只写日志的浮层实现，宿主未提供浮层时使用
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn show(&self, record: &DiagnosticRecord) {
        tracing::error!(
            target: "diagnostics",
            kind = %record.kind,
            source = %record.source,
            "{}",
            record.message
        );
    }
}

/// 诊断统计信息
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiagnosticStats {
    /// 总数
    pub total_count: u64,
    /// 按类型分组的计数
    pub by_kind: HashMap<DiagnosticKind, u64>,
    /// 最近的记录（最多保留N条）
    pub recent: VecDeque<DiagnosticRecord>,
}

/// 诊断收集器
///
/// 可克隆，克隆体共享同一份统计，可以交给原生模块使用。
#[derive(Clone)]
pub struct Diagnostics {
    stats: Arc<Mutex<DiagnosticStats>>,
    sink: Arc<dyn DiagnosticSink>,
    max_recent: usize,
}

impl_default_and_new!(Diagnostics {
    stats: Arc::new(Mutex::new(DiagnosticStats::default())),
    sink: Arc::new(LogSink),
    max_recent: 256,
});

impl fmt::Debug for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Diagnostics")
            .field("total", &self.total())
            .field("max_recent", &self.max_recent)
            .finish()
    }
}

impl Diagnostics {
    /// 创建带浮层的收集器
    pub fn with_sink(sink: Arc<dyn DiagnosticSink>) -> Self {
        Self {
            sink,
            ..Self::default()
        }
    }

    /// 替换浮层，已有统计保留
    pub fn set_sink(&mut self, sink: Arc<dyn DiagnosticSink>) {
        self.sink = sink;
    }

    fn lock(&self) -> MutexGuard<'_, DiagnosticStats> {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 报告一条诊断
    pub fn report(&self, kind: DiagnosticKind, source: &str, message: impl Into<String>) {
        let record = DiagnosticRecord::new(kind, source, message);

        if kind.is_user_visible() {
            tracing::error!(target: "diagnostics", kind = %kind, source, "{}", record.message);
            self.sink.show(&record);
        } else {
            tracing::warn!(target: "diagnostics", kind = %kind, source, "{}", record.message);
        }

        let mut stats = self.lock();
        stats.total_count += 1;
        *stats.by_kind.entry(kind).or_insert(0) += 1;
        stats.recent.push_back(record);
        while stats.recent.len() > self.max_recent {
            stats.recent.pop_front();
        }
    }

    /// 关闭浮层
    pub fn dismiss(&self) {
        self.sink.dismiss();
    }

    /// 某类诊断的数量
    pub fn count(&self, kind: DiagnosticKind) -> u64 {
        self.lock().by_kind.get(&kind).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.lock().total_count
    }

    /// 最近的记录，按时间先后
    pub fn recent(&self) -> Vec<DiagnosticRecord> {
        self.lock().recent.iter().cloned().collect()
    }

    /// 获取统计快照
    pub fn stats(&self) -> DiagnosticStats {
        self.lock().clone()
    }

    /// 清除所有统计
    pub fn clear(&self) {
        *self.lock() = DiagnosticStats::default();
    }

    /// 导出报告（JSON格式）
    pub fn export_report(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.stats())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct CollectingSink {
        shown: Mutex<Vec<DiagnosticRecord>>,
    }

    impl DiagnosticSink for CollectingSink {
        fn show(&self, record: &DiagnosticRecord) {
            self.shown.lock().unwrap().push(record.clone());
        }
    }

    #[test]
    fn test_counts_by_kind() {
        let diagnostics = Diagnostics::new();
        diagnostics.report(DiagnosticKind::Resolution, "bridge", "unknown module 9");
        diagnostics.report(DiagnosticKind::Resolution, "bridge", "unknown module 10");
        diagnostics.report(DiagnosticKind::UnknownPromise, "dispatch", "code 42");

        assert_eq!(diagnostics.total(), 3);
        assert_eq!(diagnostics.count(DiagnosticKind::Resolution), 2);
        assert_eq!(diagnostics.count(DiagnosticKind::UnknownPromise), 1);
        assert_eq!(diagnostics.count(DiagnosticKind::LoadFailure), 0);
    }

    #[test]
    fn test_only_user_visible_reach_sink() {
        let sink = Arc::new(CollectingSink::default());
        let diagnostics = Diagnostics::with_sink(sink.clone());

        diagnostics.report(DiagnosticKind::UnknownPromise, "dispatch", "code 42");
        diagnostics.report(DiagnosticKind::Evaluation, "executor", "ReferenceError: x");

        let shown = sink.shown.lock().unwrap();
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].kind, DiagnosticKind::Evaluation);
    }

    #[test]
    fn test_recent_is_bounded() {
        let diagnostics = Diagnostics {
            max_recent: 2,
            ..Diagnostics::default()
        };
        for i in 0..5 {
            diagnostics.report(DiagnosticKind::Module, "test", format!("failure {i}"));
        }
        let recent = diagnostics.recent();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[1].message, "failure 4");
        assert_eq!(diagnostics.total(), 5);
    }

    #[test]
    fn test_clones_share_stats() {
        let diagnostics = Diagnostics::new();
        let clone = diagnostics.clone();
        clone.report(DiagnosticKind::Protocol, "bridge", "bad document");
        assert_eq!(diagnostics.count(DiagnosticKind::Protocol), 1);

        diagnostics.clear();
        assert_eq!(clone.total(), 0);
    }

    #[test]
    fn test_export_report() {
        let diagnostics = Diagnostics::new();
        diagnostics.report(DiagnosticKind::Module, "Timing", "bad timer id");
        let report = diagnostics.export_report().unwrap();
        assert!(report.contains("bad timer id"));
    }
}
