//! 事件和 Promise 派发
//!
//! - `events`: 原生事件 → 脚本
//! - `promise`: 回调码登记和一次性解决

pub mod events;
pub mod promise;

pub use events::EventDispatcher;
pub use promise::{CallbackCode, PromiseReceiver, PromiseRegistry};
