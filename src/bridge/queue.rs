//! 出站调用队列
//!
//! 未就绪时缓冲，就绪后按入队顺序整体取出，不重排也不合并。

use crate::bindings::PendingCall;
use std::collections::VecDeque;

#[derive(Debug, Default)]
pub struct CallQueue {
    calls: VecDeque<PendingCall>,
}

impl CallQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, call: PendingCall) {
        self.calls.push_back(call);
    }

    /// 按入队顺序取出所有调用
    pub fn drain(&mut self) -> Vec<PendingCall> {
        self.calls.drain(..).collect()
    }

    /// 丢弃所有调用，返回丢弃的数量
    pub fn clear(&mut self) -> usize {
        let count = self.calls.len();
        self.calls.clear();
        count
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PendingCall> {
        self.calls.iter()
    }
}
