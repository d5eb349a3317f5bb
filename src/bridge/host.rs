//! 宿主协作者
//!
//! UI 管理器是初始化的必需协作者；视觉父节点、UI 引擎和网络访问管理器
//! 对桥接核心来说是不透明句柄，只负责原样转交给原生模块。

use super::handle::BridgeHandle;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// UI 管理器
pub trait UiManager {
    fn name(&self) -> &str;

    /// 桥接进入就绪状态
    fn bridge_ready(&self, _handle: &BridgeHandle) {}

    /// 脚本上下文被销毁
    fn invalidate(&self) {}
}

/// 无界面的 UI 管理器
#[derive(Debug, Default, Clone, Copy)]
pub struct HeadlessUiManager;

impl UiManager for HeadlessUiManager {
    fn name(&self) -> &str {
        "headless"
    }

    fn bridge_ready(&self, _handle: &BridgeHandle) {
        tracing::debug!(target: "bridge", "Headless UI manager attached");
    }
}

type OpaqueHandle = Arc<dyn Any + Send + Sync>;

/// 宿主传入的不透明句柄
#[derive(Clone, Default)]
pub struct HostHandles {
    visual_parent: Option<OpaqueHandle>,
    ui_engine: Option<OpaqueHandle>,
    network_access_manager: Option<OpaqueHandle>,
}

impl fmt::Debug for HostHandles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostHandles")
            .field("visual_parent", &self.visual_parent.is_some())
            .field("ui_engine", &self.ui_engine.is_some())
            .field("network_access_manager", &self.network_access_manager.is_some())
            .finish()
    }
}

impl HostHandles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_visual_parent<T: Any + Send + Sync>(mut self, parent: T) -> Self {
        self.visual_parent = Some(Arc::new(parent));
        self
    }

    pub fn with_ui_engine<T: Any + Send + Sync>(mut self, engine: T) -> Self {
        self.ui_engine = Some(Arc::new(engine));
        self
    }

    pub fn with_network_access_manager<T: Any + Send + Sync>(mut self, manager: T) -> Self {
        self.network_access_manager = Some(Arc::new(manager));
        self
    }

    pub fn visual_parent<T: Any>(&self) -> Option<&T> {
        self.visual_parent.as_deref()?.downcast_ref()
    }

    pub fn ui_engine<T: Any>(&self) -> Option<&T> {
        self.ui_engine.as_deref()?.downcast_ref()
    }

    pub fn network_access_manager<T: Any>(&self) -> Option<&T> {
        self.network_access_manager.as_deref()?.downcast_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Window(u32);

    #[test]
    fn test_handles_downcast() {
        let host = HostHandles::new()
            .with_visual_parent(Window(7))
            .with_network_access_manager(String::from("nam"));

        assert_eq!(host.visual_parent::<Window>(), Some(&Window(7)));
        assert!(host.visual_parent::<String>().is_none());
        assert!(host.ui_engine::<Window>().is_none());
        assert_eq!(
            host.network_access_manager::<String>().map(String::as_str),
            Some("nam")
        );
    }
}
