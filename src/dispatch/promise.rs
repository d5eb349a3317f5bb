//! Promise 关联
//!
//! 脚本调用 promise 类原生方法时附带一个回调码，桥接登记这个码，
//! 原生侧完成后按码回调脚本。每个码最多解决一次：
//! 取出和判定"已解决"在同一把锁内完成。

use crate::core::{PromiseError, PromiseResult};
use crate::impl_default_and_new;
use futures::channel::oneshot;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// 回调码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallbackCode(pub u64);

impl CallbackCode {
    /// 从脚本传来的值解析回调码（脚本数字是双精度浮点）
    pub fn from_value(value: &Value) -> PromiseResult<Self> {
        if let Some(code) = value.as_u64() {
            return Ok(Self(code));
        }
        match value.as_f64() {
            Some(code) if code >= 0.0 && code.fract() == 0.0 && code <= u64::MAX as f64 => {
                Ok(Self(code as u64))
            }
            _ => Err(PromiseError::InvalidCode(value.to_string())),
        }
    }
}

impl fmt::Display for CallbackCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for CallbackCode {
    fn from(code: u64) -> Self {
        Self(code)
    }
}

/// 等待 promise 结果的接收端
///
/// 码被放弃（重载或关闭）时接收端得到 `Canceled`。
pub type PromiseReceiver = oneshot::Receiver<Vec<Value>>;

/// 未解决的回调码表
///
/// 可克隆，克隆体共享同一张表。
#[derive(Clone)]
pub struct PromiseRegistry {
    pending: Arc<Mutex<HashMap<CallbackCode, Vec<oneshot::Sender<Vec<Value>>>>>>,
}

impl_default_and_new!(PromiseRegistry {
    pending: Arc::new(Mutex::new(HashMap::new())),
});

impl fmt::Debug for PromiseRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PromiseRegistry")
            .field("pending", &self.len())
            .finish()
    }
}

impl PromiseRegistry {
    fn lock(&self) -> MutexGuard<'_, HashMap<CallbackCode, Vec<oneshot::Sender<Vec<Value>>>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 登记回调码
    ///
    /// 同一个码在解决之前不能重复登记。
    pub fn register(&self, code: CallbackCode) -> PromiseResult<()> {
        let mut pending = self.lock();
        if pending.contains_key(&code) {
            tracing::warn!(
                target: "dispatch",
                event = "promise.register.duplicate",
                code = code.0,
                "Callback code is already pending"
            );
            return Err(PromiseError::Duplicate(code));
        }
        pending.insert(code, Vec::new());
        tracing::trace!(
            target: "dispatch",
            event = "promise.register",
            code = code.0,
            pending_count = pending.len(),
            "Registered pending promise"
        );
        Ok(())
    }

    /// 订阅某个码的结果，码未登记时返回 `None`
    pub fn subscribe(&self, code: CallbackCode) -> Option<PromiseReceiver> {
        let mut pending = self.lock();
        let waiters = pending.get_mut(&code)?;
        let (sender, receiver) = oneshot::channel();
        waiters.push(sender);
        Some(receiver)
    }

    /// 解决回调码
    ///
    /// 返回 `false` 表示码未登记或已经解决，这种情况不影响其他码。
    pub fn resolve(&self, code: CallbackCode, args: &[Value]) -> bool {
        let Some(waiters) = self.lock().remove(&code) else {
            tracing::warn!(
                target: "dispatch",
                event = "promise.resolve.not_found",
                code = code.0,
                "Resolution for unknown callback code"
            );
            return false;
        };

        tracing::trace!(
            target: "dispatch",
            event = "promise.resolve",
            code = code.0,
            waiters = waiters.len(),
            "Resolving pending promise"
        );
        for waiter in waiters {
            let _ = waiter.send(args.to_vec());
        }
        true
    }

    /// 放弃一个回调码，等待者收到 `Canceled`
    pub fn abandon(&self, code: CallbackCode) -> bool {
        let removed = self.lock().remove(&code).is_some();
        if removed {
            tracing::trace!(target: "dispatch", event = "promise.abandon", code = code.0, "Abandoned pending promise");
        }
        removed
    }

    /// 放弃所有回调码，返回放弃的数量
    pub fn abandon_all(&self) -> usize {
        let abandoned = {
            let mut pending = self.lock();
            let count = pending.len();
            pending.clear();
            count
        };
        if abandoned > 0 {
            tracing::debug!(
                target: "dispatch",
                event = "promise.abandon_all",
                abandoned,
                "Abandoned pending promises"
            );
        }
        abandoned
    }

    pub fn is_pending(&self, code: CallbackCode) -> bool {
        self.lock().contains_key(&code)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// 未解决的回调码（升序）
    pub fn pending_codes(&self) -> Vec<CallbackCode> {
        let mut codes: Vec<_> = self.lock().keys().copied().collect();
        codes.sort_unstable();
        codes
    }
}
