//! 事件派发
//!
//! 原生事件和普通模块调用走同一条路径：编码成对
//! `RCTDeviceEventEmitter.emit(name, payload)` 的调用，进入出站队列。

use crate::bridge::BridgeHandle;
use serde_json::Value;

/// 事件派发器
#[derive(Debug, Clone)]
pub struct EventDispatcher {
    handle: BridgeHandle,
}

impl EventDispatcher {
    pub fn new(handle: BridgeHandle) -> Self {
        Self { handle }
    }

    /// 派发事件
    ///
    /// 桥接已销毁时返回 `false`。
    pub fn dispatch_event(&self, name: &str, payload: Value) -> bool {
        tracing::trace!(target: "dispatch", event = name, "Dispatching event");
        self.handle.dispatch_event(name, payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::PendingCall;
    use crate::bridge::BridgeMessage;
    use serde_json::json;

    #[test]
    fn test_event_becomes_emit_call() {
        let (handle, inbox) = BridgeHandle::channel();
        let dispatcher = EventDispatcher::new(handle);
        assert!(dispatcher.dispatch_event("keyboardDidShow", json!({ "height": 300 })));

        match inbox.try_recv().unwrap() {
            BridgeMessage::EnqueueCall(call) => assert_eq!(
                call,
                PendingCall::new(
                    "RCTDeviceEventEmitter",
                    "emit",
                    vec![json!("keyboardDidShow"), json!({ "height": 300 })]
                )
            ),
            other => panic!("unexpected message {other:?}"),
        }
    }

    #[test]
    fn test_dispatch_after_bridge_dropped() {
        let (handle, inbox) = BridgeHandle::channel();
        drop(inbox);
        assert!(!EventDispatcher::new(handle).dispatch_event("tick", Value::Null));
    }
}
