//! 就绪状态机

use serde::{Deserialize, Serialize};
use std::fmt;

/// 桥接状态
///
/// ```text
/// Uninitialized → Initializing → LoadingSource → Ready
///                                   ↑     │        │
///                                   │     v        v
///                              Reloading ←──── Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BridgeState {
    #[default]
    Uninitialized,
    Initializing,
    LoadingSource,
    Ready,
    Reloading,
    Failed,
}

impl BridgeState {
    /// 状态转换是否合法
    pub fn can_transition_to(self, next: BridgeState) -> bool {
        use BridgeState::*;
        match (self, next) {
            // shutdown
            (_, Uninitialized) => true,
            (Uninitialized, Initializing) => true,
            (Uninitialized, _) => false,
            (_, Reloading) => true,
            (Initializing | Ready | Failed | Reloading, LoadingSource) => true,
            (LoadingSource, Ready) => true,
            (LoadingSource | Ready | Reloading, Failed) => true,
            _ => false,
        }
    }

    /// 是否已经初始化（可以加载或重载）
    pub fn is_initialized(self) -> bool {
        self != BridgeState::Uninitialized
    }
}

impl fmt::Display for BridgeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
