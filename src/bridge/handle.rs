//! 跨线程桥接句柄
//!
//! 桥接本身只在拥有者线程上使用。协作者拿到的是 [`BridgeHandle`]，
//! 它只往拥有者的收件箱里投递消息，从不阻塞；消息在拥有者调用
//! `Bridge::pump` 时按到达顺序处理。

use crate::bindings::PendingCall;
use crate::core::SourceError;
use crate::dispatch::CallbackCode;
use crate::modules::builtin::{EMIT_METHOD, EVENT_EMITTER_MODULE};
use crossbeam_channel::{unbounded, Receiver, Sender};
use serde_json::Value;

/// 投递给拥有者线程的消息
#[derive(Debug)]
pub enum BridgeMessage {
    /// 出站调用
    EnqueueCall(PendingCall),
    /// 解决 promise
    PromiseCallback { code: CallbackCode, args: Vec<Value> },
    /// 源码加载成功
    SourcesFinished { generation: u64, source: String },
    /// 源码加载失败
    SourcesLoadFailed { generation: u64, error: SourceError },
    /// 请求重载
    Reload,
}

/// 可克隆、可跨线程的桥接句柄
#[derive(Debug, Clone)]
pub struct BridgeHandle {
    sender: Sender<BridgeMessage>,
}

impl BridgeHandle {
    /// 创建句柄和对应的收件箱
    pub fn channel() -> (Self, Receiver<BridgeMessage>) {
        let (sender, receiver) = unbounded();
        (Self { sender }, receiver)
    }

    /// 投递消息，桥接已销毁时返回 `false`
    pub fn send(&self, message: BridgeMessage) -> bool {
        self.sender.send(message).is_ok()
    }

    /// 入队一个发往脚本的调用
    pub fn enqueue_js_call(&self, module: &str, method: &str, args: Vec<Value>) -> bool {
        self.send(BridgeMessage::EnqueueCall(PendingCall::new(module, method, args)))
    }

    /// 派发事件
    pub fn dispatch_event(&self, name: &str, payload: Value) -> bool {
        self.enqueue_js_call(
            EVENT_EMITTER_MODULE,
            EMIT_METHOD,
            vec![Value::String(name.to_string()), payload],
        )
    }

    /// 解决回调码
    pub fn invoke_promise_callback(&self, code: CallbackCode, args: Vec<Value>) -> bool {
        self.send(BridgeMessage::PromiseCallback { code, args })
    }

    /// 请求重载
    pub fn request_reload(&self) -> bool {
        self.send(BridgeMessage::Reload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::thread;

    #[test]
    fn test_messages_arrive_in_order() {
        let (handle, inbox) = BridgeHandle::channel();
        let worker = handle.clone();
        thread::spawn(move || {
            worker.enqueue_js_call("Timing", "createTimer", vec![json!(1)]);
            worker.invoke_promise_callback(CallbackCode(9), vec![json!("ok")]);
            worker.request_reload();
        })
        .join()
        .unwrap();

        let messages: Vec<_> = inbox.try_iter().collect();
        assert_eq!(messages.len(), 3);
        assert!(matches!(messages[0], BridgeMessage::EnqueueCall(_)));
        assert!(matches!(
            messages[1],
            BridgeMessage::PromiseCallback { code: CallbackCode(9), .. }
        ));
        assert!(matches!(messages[2], BridgeMessage::Reload));
    }

    #[test]
    fn test_send_after_drop() {
        let (handle, inbox) = BridgeHandle::channel();
        drop(inbox);
        assert!(!handle.request_reload());
    }
}
